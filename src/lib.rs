//! Codec for the RSEQ binary music-sequence container (`.brseq`) and its
//! assembler-listing counterpart (`.rseq`).

pub mod bytes;
pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod label;
pub mod opcode;
pub mod seq;
pub mod text;

pub use crate::error::SeqError;
pub use crate::format::Version;
pub use crate::format::DEFAULT_VERSION;
pub use crate::seq::{Instruction, Operand, SeqFile, Track};

use std::fs;
use std::path::Path;
use std::path::PathBuf;

pub const BINARY_EXT: &str = "brseq";
pub const TEXT_EXT: &str = "rseq";

/// Parses a binary image into a `SeqFile`.
pub fn decode_binary(data: &[u8]) -> Result<SeqFile, SeqError> {
    decode::decode(data)
}

/// Encodes a `SeqFile` into a fresh binary image.
pub fn encode_binary(file: &SeqFile) -> Result<Vec<u8>, SeqError> {
    encode::encode(file)
}

/// Parses a textual listing into a `SeqFile`.
pub fn parse_text(input: &str) -> Result<SeqFile, SeqError> {
    text::parse(input)
}

/// Formats the canonical listing for a `SeqFile`.
pub fn format_text(file: &SeqFile) -> String {
    text::format(file)
}

/// Converts a file to its counterpart representation next to it,
/// dispatching on the extension: `.brseq` becomes `.rseq` and back.
/// Returns the path written.
pub fn convert<P: AsRef<Path>>(path: P) -> Result<PathBuf, SeqError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(BINARY_EXT) => {
            let data = fs::read(path)?;
            let file = decode_binary(&data)?;
            let out = path.with_extension(TEXT_EXT);
            fs::write(&out, format_text(&file))?;
            Ok(out)
        }
        Some(TEXT_EXT) => {
            let input = fs::read_to_string(path)?;
            let file = parse_text(&input)?;
            let out = path.with_extension(BINARY_EXT);
            fs::write(&out, encode_binary(&file)?)?;
            Ok(out)
        }
        _ => Err(SeqError::UnknownExtension(path.display().to_string())),
    }
}
