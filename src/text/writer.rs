use std::collections::HashMap;

use crate::encode;
use crate::opcode;
use crate::seq::{Instruction, Operand, SeqFile};

/// Formats the canonical listing: labels at column zero, instructions
/// indented four spaces, decimal operands, branch lines annotated with
/// their direction and delta.
pub fn format(file: &SeqFile) -> String {
    let layout = annotations(file);
    let mut out = String::new();
    for (ti, track) in file.tracks.iter().enumerate() {
        for name in &track.labels {
            out.push_str(name);
            out.push_str(":\n");
        }
        let mut pos = layout.as_ref().map(|l| l.bases[ti]);
        for inst in &track.body {
            out.push_str("    ");
            write_instruction(&mut out, inst);
            if let (Some(l), Some(p)) = (layout.as_ref(), pos) {
                let after = p + encode::instruction_size(inst) as u32;
                if let Some(comment) = branch_comment(inst, l.bases[ti], after, l) {
                    out.push_str(&comment);
                }
            }
            out.push('\n');
            pos = pos.map(|p| p + encode::instruction_size(inst) as u32);
        }
    }
    out
}

/// Offsets for branch annotations: the decode origins when present,
/// otherwise a fresh sizing pass over the model.
fn annotations(file: &SeqFile) -> Option<encode::Layout> {
    let mut offsets = HashMap::new();
    let mut bases = Vec::with_capacity(file.tracks.len());
    for track in &file.tracks {
        match track.origin {
            Some(origin) => {
                bases.push(origin);
                for name in &track.labels {
                    offsets.insert(name.clone(), origin);
                }
            }
            None => return encode::layout(file).ok(),
        }
    }
    Some(encode::Layout { offsets, bases })
}

fn write_instruction(out: &mut String, inst: &Instruction) {
    match inst {
        Instruction::Note { pitch, velocity, gate } => {
            if let Some(name) = opcode::note_name(*pitch) {
                out.push_str(&name);
            }
            out.push(' ');
            out.push_str(&velocity.to_string());
            out.push_str(", ");
            out.push_str(&gate.to_string());
        }
        Instruction::Mml { opcode: op, args } => {
            if let Some(desc) = opcode::mml_for_opcode(*op) {
                out.push_str(desc.mnemonic);
            }
            write_args(out, args);
        }
        Instruction::MmlEx { opcode: op, args } => {
            if let Some(desc) = opcode::mmlex_for_opcode(*op) {
                out.push_str(desc.mnemonic);
            }
            write_args(out, args);
        }
    }
}

fn write_args(out: &mut String, args: &[Operand]) {
    let mut first = true;
    for arg in args {
        match arg {
            Operand::Nested(inner) => {
                out.push_str(": ");
                write_instruction(out, inner);
            }
            other => {
                out.push_str(if first { " " } else { ", " });
                match other {
                    Operand::U8(v) => out.push_str(&v.to_string()),
                    Operand::S16(v) => out.push_str(&v.to_string()),
                    Operand::Var(v) => out.push_str(&v.to_string()),
                    Operand::Label(name) => out.push_str(name),
                    Operand::Nested(_) => (),
                }
            }
        }
        first = false;
    }
}

/// The informative trailing comment for a `jump`/`call` line, also
/// found at the end of a prefix chain.
fn branch_comment(
    inst: &Instruction,
    base: u32,
    after: u32,
    layout: &encode::Layout,
) -> Option<String> {
    let (op, args) = match inst {
        Instruction::Mml { opcode, args } => (*opcode, args),
        _ => return None,
    };
    if op == opcode::MML_JUMP || op == opcode::MML_CALL {
        if let Some(Operand::Label(name)) = args.first() {
            let target = *layout.offsets.get(name)?;
            let delta = i64::from(target) - i64::from(base);
            let direction = if i64::from(target) > i64::from(after) {
                "forward"
            } else {
                "backwards"
            };
            return Some(format!(
                " ; {} jump by {} bytes relative to the start offset of this sequence",
                direction, delta
            ));
        }
        return None;
    }
    match args.last() {
        Some(Operand::Nested(inner)) => branch_comment(inner, base, after, layout),
        _ => None,
    }
}

#[cfg(test)]
mod test_writer {
    use super::*;
    use crate::text::parse;

    #[test]
    fn test_canonical_form_is_stable() {
        let input = "main:\n    wait 96\n    cn4 127, 96\n    fin\n";
        let file = parse(input).unwrap();
        assert_eq!(format(&file), input);
    }

    #[test]
    fn test_prefix_chain_on_one_line() {
        let input = "main:\n    _tr 16: _r 1, 10: volume 100\n    fin\n";
        let file = parse(input).unwrap();
        assert_eq!(format(&file), input);
    }

    #[test]
    fn test_jump_annotations() {
        let file = parse("main:\n    jump next\nnext:\n    fin\n").unwrap();
        let text = format(&file);
        assert!(text.contains(
            "jump next ; backwards jump by 4 bytes relative to the start offset of this sequence"
        ));

        let file = parse("main:\n    jump end\nmid:\n    fin\nend:\n    fin\n").unwrap();
        let text = format(&file);
        assert!(text.contains(
            "jump end ; forward jump by 5 bytes relative to the start offset of this sequence"
        ));
    }

    #[test]
    fn test_backwards_self_loop() {
        let file = parse("main:\n    wait 96\n    jump main\n").unwrap();
        let text = format(&file);
        assert!(text.contains(
            "jump main ; backwards jump by 0 bytes relative to the start offset of this sequence"
        ));
    }

    #[test]
    fn test_normalizes_whitespace_and_radix() {
        let input = "main:\n\twait   0x60\n    fin\n";
        let file = parse(input).unwrap();
        assert_eq!(format(&file), "main:\n    wait 96\n    fin\n");
    }
}
