use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::bytes::ByteReader;
use crate::error::SeqError;
use crate::format;
use crate::format::FileHeader;
use crate::label::LabelTable;
use crate::opcode;
use crate::opcode::Arg;
use crate::seq::{synthetic_name, Instruction, Operand, SeqFile, Track};

/// Prefix opcodes defer to the instruction that follows; this bounds the
/// nesting so hostile input cannot recurse the decoder off the stack.
const MAX_PREFIX_DEPTH: usize = 8;

/// Decodes a complete binary image into a `SeqFile`.
pub fn decode(data: &[u8]) -> Result<SeqFile, SeqError> {
    let mut r = ByteReader::new(data);
    let header = FileHeader::read(&mut r)?;

    r.seek(header.label_offset as usize);
    let table = LabelTable::read(&mut r)?;

    r.seek(header.data_offset as usize);
    let data_size = format::expect_section(&mut r, format::DATA_TAG)?;
    if data_size < format::DATA_HEADER_SIZE {
        return Err(SeqError::TruncatedSection { at: header.data_offset as usize });
    }
    let _base_field = r.read_u32()?;

    let payload = header.data_offset as usize + format::DATA_HEADER_SIZE as usize;
    let end = header.data_offset as usize + data_size as usize;

    let mut named: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for entry in table.entries() {
        named.entry(entry.data_offset).or_default().push(entry.name.clone());
    }

    let mut dec = Decoder {
        r,
        payload,
        end,
        named,
        decoded: BTreeMap::new(),
        pending: BTreeSet::new(),
    };

    // Named tracks first, ascending by offset; chunks shared by several
    // labels decode once.
    let offsets: Vec<u32> = dec.named.keys().copied().collect();
    for off in offsets {
        dec.decode_chunk(off)?;
    }

    // Branch targets no label covered become synthetic tracks; decoding
    // them may surface further targets.
    while let Some(off) = dec.pending.iter().next().copied() {
        dec.pending.remove(&off);
        dec.decode_chunk(off)?;
    }

    let mut tracks = Vec::with_capacity(dec.decoded.len());
    for (off, body) in dec.decoded {
        let track = match dec.named.get(&off) {
            Some(names) => Track {
                labels: names.clone(),
                body,
                synthetic: false,
                origin: Some(off),
            },
            None => Track {
                labels: vec![synthetic_name(off)],
                body,
                synthetic: true,
                origin: Some(off),
            },
        };
        tracks.push(track);
    }

    Ok(SeqFile { version: header.version, tracks })
}

struct Decoder<'a> {
    r: ByteReader<'a>,
    /// Absolute offset of the DATA payload start.
    payload: usize,
    /// Absolute offset one past the DATA section.
    end: usize,
    named: BTreeMap<u32, Vec<String>>,
    decoded: BTreeMap<u32, Vec<Instruction>>,
    pending: BTreeSet<u32>,
}

impl<'a> Decoder<'a> {
    fn decode_chunk(&mut self, base: u32) -> Result<(), SeqError> {
        if self.decoded.contains_key(&base) {
            return Ok(());
        }
        self.r.seek(self.payload + base as usize);
        let mut body = Vec::new();
        loop {
            let inst = self.decode_instruction(base, 0)?;
            let done = inst.is_terminator();
            body.push(inst);
            if done {
                break;
            }
        }
        self.decoded.insert(base, body);
        Ok(())
    }

    fn decode_instruction(&mut self, base: u32, depth: usize) -> Result<Instruction, SeqError> {
        let at = self.r.position();
        let b = self.read_u8(at)?;

        if b & opcode::NOTE_MASK == 0 {
            if opcode::note_name(b).is_none() {
                return Err(SeqError::UnknownOpcode { opcode: b, at });
            }
            let velocity = self.read_u8(at)?;
            let gate = self.read_varlen(at)?;
            return Ok(Instruction::Note { pitch: b, velocity, gate });
        }

        if b == opcode::MML_EX_COMMAND {
            let ex_at = self.r.position();
            let ex = self.read_u8(ex_at)?;
            let desc = opcode::mmlex_for_opcode(ex)
                .ok_or(SeqError::UnknownOpcode { opcode: ex, at: ex_at })?;
            let args = self.read_args(desc.args, base)?;
            return Ok(Instruction::MmlEx { opcode: ex, args });
        }

        let desc =
            opcode::mml_for_opcode(b).ok_or(SeqError::UnknownOpcode { opcode: b, at })?;
        let mut args = self.read_args(desc.args, base)?;
        if desc.prefix {
            if depth >= MAX_PREFIX_DEPTH {
                return Err(SeqError::PrefixTooDeep { at });
            }
            let inner = self.decode_instruction(base, depth + 1)?;
            args.push(Operand::Nested(Box::new(inner)));
        }
        Ok(Instruction::Mml { opcode: b, args })
    }

    fn read_args(&mut self, schema: &[Arg], base: u32) -> Result<Vec<Operand>, SeqError> {
        let mut args = Vec::with_capacity(schema.len() + 1);
        for arg in schema {
            let at = self.r.position();
            let operand = match arg {
                Arg::U8 => Operand::U8(self.read_u8(at)?),
                Arg::S16 => Operand::S16(self.read_i16(at)?),
                Arg::Varlen => Operand::Var(self.read_varlen(at)?),
                Arg::U24 => {
                    let delta = self.read_u24(at)?;
                    let target = base
                        .checked_add(delta)
                        .ok_or(SeqError::TruncatedInstruction { at })?;
                    Operand::Label(self.resolve(target))
                }
            };
            args.push(operand);
        }
        Ok(args)
    }

    /// Symbolic name for an absolute payload target; unnamed targets are
    /// minted and queued for a synthetic decode pass.
    fn resolve(&mut self, target: u32) -> String {
        match self.named.get(&target) {
            Some(names) => names[0].clone(),
            None => {
                if !self.decoded.contains_key(&target) {
                    self.pending.insert(target);
                }
                synthetic_name(target)
            }
        }
    }

    // Instruction-level reads are clamped to the DATA section; anything
    // past it is a truncated instruction, not a truncated section.

    fn check(&self, at: usize) -> Result<(), SeqError> {
        if self.r.position() > self.end {
            Err(SeqError::TruncatedInstruction { at })
        } else {
            Ok(())
        }
    }

    fn read_u8(&mut self, at: usize) -> Result<u8, SeqError> {
        let v = self.r.read_u8().map_err(|_| SeqError::TruncatedInstruction { at })?;
        self.check(at)?;
        Ok(v)
    }

    fn read_i16(&mut self, at: usize) -> Result<i16, SeqError> {
        let v = self.r.read_i16().map_err(|_| SeqError::TruncatedInstruction { at })?;
        self.check(at)?;
        Ok(v)
    }

    fn read_u24(&mut self, at: usize) -> Result<u32, SeqError> {
        let v = self.r.read_u24().map_err(|_| SeqError::TruncatedInstruction { at })?;
        self.check(at)?;
        Ok(v)
    }

    fn read_varlen(&mut self, at: usize) -> Result<u32, SeqError> {
        let v = self.r.read_varlen().map_err(|e| match e {
            SeqError::VarlenTooLong { at } => SeqError::VarlenTooLong { at },
            _ => SeqError::TruncatedInstruction { at },
        })?;
        self.check(at)?;
        Ok(v)
    }
}
