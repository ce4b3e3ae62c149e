// The MML / MMLEX instruction grammar.  One static table per opcode
// space is the source of truth for both decode (byte -> row) and encode
// (mnemonic -> row); the reverse direction is derived by iterating the
// same rows, so the two can never drift apart.

/// Operand kinds an opcode row may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    /// One unsigned byte.
    U8,
    /// Two bytes, signed.
    S16,
    /// Three bytes, a branch target relative to the track base.
    U24,
    /// Unsigned varlen, 1-4 bytes.
    Varlen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpDesc {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub args: &'static [Arg],
    /// Defers to the instruction that follows; the decoder reads one
    /// nested instruction after the inline operands.
    pub prefix: bool,
    /// Ends the current track chunk.
    pub terminator: bool,
}

/// High bit clear means the opcode byte is a note pitch.
pub const NOTE_MASK: u8 = 0x80;

/// Escape byte into the extended opcode table.
pub const MML_EX_COMMAND: u8 = 0xF0;

pub const MML_OPEN_TRACK: u8 = 0x88;
pub const MML_JUMP: u8 = 0x89;
pub const MML_CALL: u8 = 0x8A;

const NONE: &[Arg] = &[];
const U8_1: &[Arg] = &[Arg::U8];
const S16_1: &[Arg] = &[Arg::S16];
const VAR_1: &[Arg] = &[Arg::Varlen];
const ADDR: &[Arg] = &[Arg::U24];
const TRACK_ADDR: &[Arg] = &[Arg::U8, Arg::U24];
const RANDOM: &[Arg] = &[Arg::S16, Arg::S16];
const VAR_S16: &[Arg] = &[Arg::U8, Arg::S16];

macro_rules! op {
    ($opcode:expr, $mnemonic:expr, $args:expr) => {
        OpDesc { opcode: $opcode, mnemonic: $mnemonic, args: $args, prefix: false, terminator: false }
    };
    ($opcode:expr, $mnemonic:expr, $args:expr, prefix) => {
        OpDesc { opcode: $opcode, mnemonic: $mnemonic, args: $args, prefix: true, terminator: false }
    };
    ($opcode:expr, $mnemonic:expr, $args:expr, terminator) => {
        OpDesc { opcode: $opcode, mnemonic: $mnemonic, args: $args, prefix: false, terminator: true }
    };
}

/// Base MML opcode space (notes and 0xF0 are dispatched separately).
pub static MML_OPS: &[OpDesc] = &[
    op!(0x80, "wait", VAR_1),
    op!(0x81, "prg", VAR_1),
    // Control flow.
    op!(0x88, "opentrack", TRACK_ADDR),
    op!(0x89, "jump", ADDR, terminator),
    op!(0x8A, "call", ADDR),
    // Prefixes.
    op!(0xA0, "_r", RANDOM, prefix),
    op!(0xA1, "_v", U8_1, prefix),
    op!(0xA2, "_if", NONE, prefix),
    op!(0xA3, "_t", S16_1, prefix),
    op!(0xA4, "_tr", S16_1, prefix),
    op!(0xA5, "_tv", S16_1, prefix),
    // U8 parameters.
    op!(0xB0, "timebase", U8_1),
    op!(0xB1, "env_hold", U8_1),
    op!(0xB2, "monophonic_", U8_1),
    op!(0xB3, "velocity_range", U8_1),
    op!(0xB4, "biquad_type", U8_1),
    op!(0xB5, "biquad_value", U8_1),
    op!(0xC0, "pan", U8_1),
    op!(0xC1, "volume", U8_1),
    op!(0xC2, "main_volume", U8_1),
    op!(0xC3, "transpose", U8_1),
    op!(0xC4, "pitch_bend", U8_1),
    op!(0xC5, "bend_range", U8_1),
    op!(0xC6, "prio", U8_1),
    op!(0xC7, "notewait_", U8_1),
    op!(0xC8, "tie", U8_1),
    op!(0xC9, "porta", U8_1),
    op!(0xCA, "mod_depth", U8_1),
    op!(0xCB, "mod_speed", U8_1),
    op!(0xCC, "mod_type", U8_1),
    op!(0xCD, "mod_range", U8_1),
    op!(0xCE, "porta_", U8_1),
    op!(0xCF, "porta_time", U8_1),
    op!(0xD0, "attack", U8_1),
    op!(0xD1, "decay", U8_1),
    op!(0xD2, "sustain", U8_1),
    op!(0xD3, "release", U8_1),
    op!(0xD4, "loop_start", U8_1),
    op!(0xD5, "volume2", U8_1),
    op!(0xD6, "printvar", U8_1),
    op!(0xD7, "span", U8_1),
    op!(0xD8, "lpf_cutoff", U8_1),
    op!(0xD9, "fxsend_a", U8_1),
    op!(0xDA, "fxsend_b", U8_1),
    op!(0xDB, "mainsend", U8_1),
    op!(0xDC, "init_pan", U8_1),
    op!(0xDD, "mute", U8_1),
    op!(0xDE, "fxsend_c", U8_1),
    op!(0xDF, "damper_", U8_1),
    // S16 parameters.
    op!(0xE0, "mod_delay", S16_1),
    op!(0xE1, "tempo", S16_1),
    op!(0xE3, "sweep_pitch", S16_1),
    // Other.
    op!(0xFB, "env_reset", NONE),
    op!(0xFC, "loop_end", NONE),
    op!(0xFD, "ret", NONE, terminator),
    op!(0xFE, "alloctrack", S16_1),
    op!(0xFF, "fin", NONE, terminator),
];

/// Extended opcode space, entered through 0xF0.
pub static MMLEX_OPS: &[OpDesc] = &[
    // Variable arithmetic.
    op!(0x80, "setvar", VAR_S16),
    op!(0x81, "addvar", VAR_S16),
    op!(0x82, "subvar", VAR_S16),
    op!(0x83, "mulvar", VAR_S16),
    op!(0x84, "divvar", VAR_S16),
    op!(0x85, "shiftvar", VAR_S16),
    op!(0x86, "randvar", VAR_S16),
    op!(0x87, "andvar", VAR_S16),
    op!(0x88, "orvar", VAR_S16),
    op!(0x89, "xorvar", VAR_S16),
    op!(0x8A, "notvar", VAR_S16),
    op!(0x8B, "modvar", VAR_S16),
    // Comparisons.
    op!(0x90, "cmp_eq", VAR_S16),
    op!(0x91, "cmp_ge", VAR_S16),
    op!(0x92, "cmp_gt", VAR_S16),
    op!(0x93, "cmp_le", VAR_S16),
    op!(0x94, "cmp_lt", VAR_S16),
    op!(0x95, "cmp_ne", VAR_S16),
    op!(0xE0, "userproc", S16_1),
];

pub fn mml_for_opcode(opcode: u8) -> Option<&'static OpDesc> {
    MML_OPS.iter().find(|d| d.opcode == opcode)
}

pub fn mmlex_for_opcode(opcode: u8) -> Option<&'static OpDesc> {
    MMLEX_OPS.iter().find(|d| d.opcode == opcode)
}

pub fn lookup(mnemonic: &str) -> Option<&'static OpDesc> {
    MML_OPS.iter().find(|d| d.mnemonic == mnemonic)
}

pub fn lookup_ex(mnemonic: &str) -> Option<&'static OpDesc> {
    MMLEX_OPS.iter().find(|d| d.mnemonic == mnemonic)
}

// Note pitches.  Twelve chroma stems per octave, octaves -1 ("m1")
// through 9, truncated to the 126 valid opcodes 0x00-0x7D; 0x7E and
// 0x7F are reserved.

const PITCH_STEMS: [&str; 12] = [
    "cn", "cs", "dn", "ds", "en", "fn", "fs", "gn", "gs", "an", "as", "bn",
];

/// Count of valid note opcodes.
pub const NOTE_COUNT: u8 = 126;

/// Pitch mnemonic for a note opcode, `None` for 0x7E and up.
pub fn note_name(opcode: u8) -> Option<String> {
    if opcode >= NOTE_COUNT {
        return None;
    }
    let stem = PITCH_STEMS[usize::from(opcode % 12)];
    let octave = i32::from(opcode / 12) - 1;
    if octave < 0 {
        Some(format!("{}m1", stem))
    } else {
        Some(format!("{}{}", stem, octave))
    }
}

/// Note opcode for a pitch mnemonic, `None` if it is not one.
pub fn note_opcode(name: &str) -> Option<u8> {
    if name.len() < 3 || !name.is_ascii() {
        return None;
    }
    let (stem, octave) = name.split_at(2);
    let chroma = PITCH_STEMS.iter().position(|s| *s == stem)?;
    let octave: i32 = if octave == "m1" {
        -1
    } else if octave.len() == 1 && octave.as_bytes()[0].is_ascii_digit() {
        i32::from(octave.as_bytes()[0] - b'0')
    } else {
        return None;
    };
    let opcode = (octave + 1) * 12 + chroma as i32;
    if opcode < i32::from(NOTE_COUNT) {
        Some(opcode as u8)
    } else {
        None
    }
}
