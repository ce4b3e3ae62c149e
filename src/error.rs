use std::fmt;
use std::io;

/// Everything that can go wrong while decoding, encoding, parsing or
/// formatting a sequence.  Binary diagnostics carry the absolute byte
/// offset of the failed read, text diagnostics the line/column of the
/// offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqError {
    BadSignature { expected: [u8; 4], read: [u8; 4], at: usize },
    UnsupportedBom(u16),
    UnknownVersion(u16),
    TruncatedHeader,
    TruncatedSection { at: usize },
    TruncatedInstruction { at: usize },
    UnknownOpcode { opcode: u8, at: usize },
    VarlenTooLong { at: usize },
    PrefixTooDeep { at: usize },
    BadLabelName { at: usize },
    U24Overflow { delta: i64 },
    UndefinedLabel(String),
    DuplicateLabel(String),
    TextParse { line: usize, column: usize, message: String },
    Io(String),
    UnknownExtension(String),
}

impl fmt::Display for SeqError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqError::BadSignature { expected, read, at } => write!(
                f,
                "bad signature at 0x{:x}: expected {:?}, read {:?}",
                at,
                String::from_utf8_lossy(expected),
                String::from_utf8_lossy(read)
            ),
            SeqError::UnsupportedBom(bom) => {
                write!(f, "unsupported byte order mark 0x{:04x} (big endian only)", bom)
            }
            SeqError::UnknownVersion(v) => write!(f, "unknown file version 0x{:04x}", v),
            SeqError::TruncatedHeader => write!(f, "file too small for a sequence header"),
            SeqError::TruncatedSection { at } => write!(f, "truncated section at 0x{:x}", at),
            SeqError::TruncatedInstruction { at } => {
                write!(f, "truncated instruction at 0x{:x}", at)
            }
            SeqError::UnknownOpcode { opcode, at } => {
                write!(f, "unknown opcode 0x{:02x} at 0x{:x}", opcode, at)
            }
            SeqError::VarlenTooLong { at } => {
                write!(f, "variable-length value longer than 4 bytes at 0x{:x}", at)
            }
            SeqError::PrefixTooDeep { at } => {
                write!(f, "prefix chain nested too deep at 0x{:x}", at)
            }
            SeqError::BadLabelName { at } => {
                write!(f, "label name at 0x{:x} is not printable ascii", at)
            }
            SeqError::U24Overflow { delta } => {
                write!(f, "branch target delta {} does not fit in 24 bits", delta)
            }
            SeqError::UndefinedLabel(name) => write!(f, "undefined label `{}`", name),
            SeqError::DuplicateLabel(name) => write!(f, "duplicate label `{}`", name),
            SeqError::TextParse { line, column, message } => {
                write!(f, "line {}, column {}: {}", line, column, message)
            }
            SeqError::Io(msg) => write!(f, "io error: {}", msg),
            SeqError::UnknownExtension(path) => {
                write!(f, "`{}` is neither a .brseq nor a .rseq file", path)
            }
        }
    }
}

impl std::error::Error for SeqError {}

impl From<io::Error> for SeqError {
    fn from(e: io::Error) -> SeqError {
        SeqError::Io(e.to_string())
    }
}
