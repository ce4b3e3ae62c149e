use std::collections::HashMap;
use std::collections::HashSet;

use twiddle::Twiddle;

use crate::bytes::{varlen_len, ByteWriter};
use crate::error::SeqError;
use crate::format;
use crate::format::FileHeader;
use crate::label;
use crate::seq::{Instruction, Operand, SeqFile};

/// Label placement computed by the sizing pass.
pub(crate) struct Layout {
    /// Payload offset of every label.
    pub offsets: HashMap<String, u32>,
    /// Payload offset of every track, parallel to `file.tracks`.
    pub bases: Vec<u32>,
}

/// Pass 1: walk every track, accumulate minimal instruction sizes and
/// pin down each label's payload offset.
pub(crate) fn layout(file: &SeqFile) -> Result<Layout, SeqError> {
    let mut offsets = HashMap::new();
    let mut seen = HashSet::new();
    let mut bases = Vec::with_capacity(file.tracks.len());
    let mut cursor: u32 = 0;

    for track in &file.tracks {
        for name in &track.labels {
            if !seen.insert(name.clone()) {
                return Err(SeqError::DuplicateLabel(name.clone()));
            }
            offsets.insert(name.clone(), cursor);
        }
        bases.push(cursor);
        for inst in &track.body {
            cursor += instruction_size(inst) as u32;
        }
    }
    Ok(Layout { offsets, bases })
}

/// Byte size of the minimal encoding of one instruction.
pub(crate) fn instruction_size(inst: &Instruction) -> usize {
    match inst {
        Instruction::Note { gate, .. } => 2 + varlen_len(*gate),
        Instruction::Mml { args, .. } => 1 + args_size(args),
        Instruction::MmlEx { args, .. } => 2 + args_size(args),
    }
}

fn args_size(args: &[Operand]) -> usize {
    args.iter()
        .map(|arg| match arg {
            Operand::U8(_) => 1,
            Operand::S16(_) => 2,
            Operand::Var(v) => varlen_len(*v),
            Operand::Label(_) => 3,
            Operand::Nested(inner) => instruction_size(inner),
        })
        .sum()
}

/// Encodes a `SeqFile` into a complete binary image.
pub fn encode(file: &SeqFile) -> Result<Vec<u8>, SeqError> {
    let layout = layout(file)?;

    // Pass 2: emit, lowering every label operand against its track base.
    let mut payload = ByteWriter::new();
    for (track, base) in file.tracks.iter().zip(&layout.bases) {
        for inst in &track.body {
            emit_instruction(&mut payload, inst, *base, &layout.offsets)?;
        }
    }
    let payload = payload.into_vec();

    let names: Vec<(&str, u32)> = file
        .tracks
        .iter()
        .filter(|t| !t.synthetic)
        .flat_map(|t| t.labels.iter())
        .map(|name| (name.as_str(), layout.offsets[name]))
        .collect();

    let data_size = format::DATA_HEADER_SIZE + payload.len() as u32;
    let label_offset = u32::from(format::HEADER_SIZE) + data_size;
    let header = FileHeader {
        version: file.version,
        file_size: label_offset + label::section_bytes(&names),
        data_offset: u32::from(format::HEADER_SIZE),
        data_size,
        label_offset,
        label_size: label::section_size(&names),
    };

    let mut w = ByteWriter::new();
    header.write(&mut w);
    w.write_tag(format::DATA_TAG);
    w.write_u32(data_size);
    w.write_u32(format::DATA_BASE_FIELD);
    w.write_bytes(&payload);
    label::write_labels(&names, &mut w);
    Ok(w.into_vec())
}

fn emit_instruction(
    w: &mut ByteWriter,
    inst: &Instruction,
    base: u32,
    offsets: &HashMap<String, u32>,
) -> Result<(), SeqError> {
    match inst {
        Instruction::Note { pitch, velocity, gate } => {
            w.write_u8(*pitch);
            w.write_u8(*velocity);
            w.write_varlen(*gate);
        }
        Instruction::Mml { opcode, args } => {
            w.write_u8(*opcode);
            emit_args(w, args, base, offsets)?;
        }
        Instruction::MmlEx { opcode, args } => {
            w.write_u8(crate::opcode::MML_EX_COMMAND);
            w.write_u8(*opcode);
            emit_args(w, args, base, offsets)?;
        }
    }
    Ok(())
}

fn emit_args(
    w: &mut ByteWriter,
    args: &[Operand],
    base: u32,
    offsets: &HashMap<String, u32>,
) -> Result<(), SeqError> {
    for arg in args {
        match arg {
            Operand::U8(v) => w.write_u8(*v),
            Operand::S16(v) => w.write_i16(*v),
            Operand::Var(v) => w.write_varlen(*v),
            Operand::Label(name) => {
                let target = *offsets
                    .get(name)
                    .ok_or_else(|| SeqError::UndefinedLabel(name.clone()))?;
                let delta = i64::from(target) - i64::from(base);
                if delta < 0 || delta as u64 & !u64::from(u32::mask(23..=0)) != 0 {
                    return Err(SeqError::U24Overflow { delta });
                }
                w.write_u24(delta as u32);
            }
            Operand::Nested(inner) => emit_instruction(w, inner, base, offsets)?,
        }
    }
    Ok(())
}
