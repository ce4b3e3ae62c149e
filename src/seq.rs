use crate::format::Version;
use crate::opcode;

/// A single typed operand.  Branch targets are held symbolically; raw
/// 24-bit deltas never appear in the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    U8(u8),
    S16(i16),
    /// Unsigned varlen value.
    Var(u32),
    /// Resolved branch target.
    Label(String),
    /// The instruction a prefix opcode defers to.
    Nested(Box<Instruction>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Note { pitch: u8, velocity: u8, gate: u32 },
    Mml { opcode: u8, args: Vec<Operand> },
    MmlEx { opcode: u8, args: Vec<Operand> },
}

impl Instruction {
    /// True when this instruction ends a track chunk (`fin`, `ret` or an
    /// unconditional `jump`).
    pub fn is_terminator(&self) -> bool {
        match self {
            Instruction::Mml { opcode, .. } => {
                opcode::mml_for_opcode(*opcode).map_or(false, |d| d.terminator)
            }
            _ => false,
        }
    }
}

/// One decoded instruction chunk and the labels naming its entry point.
/// Several labels may alias the same chunk.
#[derive(Debug, Clone)]
pub struct Track {
    /// Entry-point names, in file order.
    pub labels: Vec<String>,
    pub body: Vec<Instruction>,
    /// Minted by the decoder for an unnamed branch target; omitted from
    /// the LABL section on encode.
    pub synthetic: bool,
    /// Payload offset this track was decoded from.  Presentation data
    /// for listing output; not part of structural equality.
    pub origin: Option<u32>,
}

impl PartialEq for Track {
    fn eq(&self, other: &Track) -> bool {
        self.labels == other.labels
            && self.synthetic == other.synthetic
            && self.body == other.body
    }
}

impl Eq for Track {}

/// A parsed sequence container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqFile {
    pub version: Version,
    /// Ascending by entry offset; order is authoritative for encode.
    pub tracks: Vec<Track>,
}

impl SeqFile {
    /// All label names in file order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.tracks.iter().flat_map(|t| t.labels.iter().map(String::as_str))
    }

    pub fn track_of(&self, label: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.labels.iter().any(|l| l == label))
    }
}

/// Name minted for an unnamed branch target at the given payload offset.
pub fn synthetic_name(target: u32) -> String {
    format!("_symb_0x{:x}", target)
}

/// Whether `name` has the shape of a decoder-minted target name.
pub fn is_synthetic_name(name: &str) -> bool {
    match name.strip_prefix("_symb_0x") {
        Some(hex) => {
            !hex.is_empty()
                && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        }
        None => false,
    }
}
