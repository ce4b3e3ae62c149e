use std::collections::HashSet;

use nom::IResult;
use nom::Parser;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::bytes::complete::take_while;
use nom::bytes::complete::take_while1;
use nom::character::complete::one_of;
use nom::character::complete::satisfy;
use nom::character::complete::space1;
use nom::combinator::recognize;
use nom::combinator::success;
use nom::combinator::value;
use nom::sequence::pair;

use num_traits::Num;
use twiddle::Twiddle;

use crate::error::SeqError;
use crate::format;
use crate::opcode;
use crate::seq::{is_synthetic_name, Instruction, Operand, SeqFile, Track};

const MAX_PREFIX_DEPTH: usize = 8;

/// Parses a listing into a `SeqFile`.  Line oriented: blank lines and
/// `;` comments are skipped, `name:` opens a track (consecutive
/// declarations alias one track), everything else is one instruction.
pub fn parse(input: &str) -> Result<SeqFile, SeqError> {
    let mut tracks: Vec<Track> = Vec::new();
    let mut current: Option<Track> = None;
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, raw) in input.lines().enumerate() {
        let line = idx + 1;
        let content = match raw.find(';') {
            Some(p) => &raw[..p],
            None => raw,
        };
        let content = content.trim_end();
        if content.trim().is_empty() {
            continue;
        }
        let mut cur = Cursor { line, full: content, rest: content };
        cur.skip_space();

        if let Some(name) = try_label_decl(&cur) {
            if !seen.insert(name.clone()) {
                return Err(SeqError::DuplicateLabel(name));
            }
            match current.as_mut() {
                // Consecutive declarations alias the same entry point.
                Some(track) if track.body.is_empty() => track.labels.push(name),
                _ => {
                    if let Some(track) = current.take() {
                        tracks.push(track);
                    }
                    current = Some(Track {
                        labels: vec![name],
                        body: Vec::new(),
                        synthetic: false,
                        origin: None,
                    });
                }
            }
            continue;
        }

        let inst = parse_instruction(&mut cur, 0)?;
        cur.skip_space();
        if !cur.at_end() {
            return Err(cur.err("unexpected trailing input"));
        }
        match current.as_mut() {
            Some(track) => track.body.push(inst),
            None => {
                return Err(SeqError::TextParse {
                    line,
                    column: 1,
                    message: "instruction before the first label".into(),
                })
            }
        }
    }
    if let Some(track) = current.take() {
        tracks.push(track);
    }

    // Decoder-minted names keep their synthetic status through a text
    // round trip so re-encoding leaves them out of LABL.
    for track in &mut tracks {
        track.synthetic =
            !track.labels.is_empty() && track.labels.iter().all(|l| is_synthetic_name(l));
    }

    for track in &tracks {
        for inst in &track.body {
            check_refs(inst, &seen)?;
        }
    }

    Ok(SeqFile { version: format::DEFAULT_VERSION, tracks })
}

/// A lone identifier followed by `:` and nothing else.
fn try_label_decl(cur: &Cursor) -> Option<String> {
    let (rest, name) = identifier(cur.rest).ok()?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix(':')?;
    if rest.trim().is_empty() {
        Some(name.to_string())
    } else {
        None
    }
}

fn parse_instruction(cur: &mut Cursor, depth: usize) -> Result<Instruction, SeqError> {
    let start = cur.col();
    let mnemonic = cur.apply(identifier, "a mnemonic")?;

    if let Some(pitch) = opcode::note_opcode(mnemonic) {
        cur.apply(space1, "a velocity operand")?;
        let velocity = cur.apply(number::<u8>, "a velocity in 0..=255")?;
        comma(cur)?;
        let gate = varlen_value(cur, "a gate length")?;
        return Ok(Instruction::Note { pitch, velocity, gate });
    }

    if let Some(desc) = opcode::lookup(mnemonic) {
        let mut args = parse_args(cur, desc.args)?;
        if desc.prefix {
            if depth >= MAX_PREFIX_DEPTH {
                return Err(cur.err_at(start, "prefix chain nested too deep"));
            }
            cur.skip_space();
            cur.apply(tag(":"), "`:` and a prefixed instruction")?;
            cur.skip_space();
            let inner = parse_instruction(cur, depth + 1)?;
            args.push(Operand::Nested(Box::new(inner)));
        }
        return Ok(Instruction::Mml { opcode: desc.opcode, args });
    }

    if let Some(desc) = opcode::lookup_ex(mnemonic) {
        let args = parse_args(cur, desc.args)?;
        return Ok(Instruction::MmlEx { opcode: desc.opcode, args });
    }

    Err(cur.err_at(start, format!("unknown mnemonic `{}`", mnemonic)))
}

fn parse_args(cur: &mut Cursor, schema: &[opcode::Arg]) -> Result<Vec<Operand>, SeqError> {
    let mut args = Vec::with_capacity(schema.len() + 1);
    for (i, arg) in schema.iter().enumerate() {
        if i == 0 {
            cur.apply(space1, "an operand")?;
        } else {
            comma(cur)?;
        }
        let operand = match arg {
            opcode::Arg::U8 => Operand::U8(cur.apply(number::<u8>, "a value in 0..=255")?),
            opcode::Arg::S16 => Operand::S16(cur.apply(number::<i16>, "a 16-bit value")?),
            opcode::Arg::Varlen => Operand::Var(varlen_value(cur, "a value")?),
            opcode::Arg::U24 => {
                Operand::Label(cur.apply(identifier, "a label name")?.to_string())
            }
        };
        args.push(operand);
    }
    Ok(args)
}

fn comma(cur: &mut Cursor) -> Result<(), SeqError> {
    cur.skip_space();
    cur.apply(tag(","), "`,`")?;
    cur.skip_space();
    Ok(())
}

fn varlen_value(cur: &mut Cursor, what: &str) -> Result<u32, SeqError> {
    let col = cur.col();
    let v = cur.apply(number::<u32>, what)?;
    if v & !u32::mask(27..=0) != 0 {
        return Err(cur.err_at(col, "value does not fit in a varlen (4 bytes of 7 bits)"));
    }
    Ok(v)
}

fn check_refs(inst: &Instruction, seen: &HashSet<String>) -> Result<(), SeqError> {
    if let Instruction::Mml { args, .. } | Instruction::MmlEx { args, .. } = inst {
        for arg in args {
            match arg {
                Operand::Label(name) if !seen.contains(name) => {
                    return Err(SeqError::UndefinedLabel(name.clone()));
                }
                Operand::Nested(inner) => check_refs(inner, seen)?,
                _ => (),
            }
        }
    }
    Ok(())
}

/// Tracks the unparsed remainder of one line and turns nom failures
/// into positioned `TextParse` errors.
struct Cursor<'a> {
    line: usize,
    full: &'a str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn col(&self) -> usize {
        self.full.len() - self.rest.len() + 1
    }

    fn err(&self, message: impl Into<String>) -> SeqError {
        self.err_at(self.col(), message)
    }

    fn err_at(&self, column: usize, message: impl Into<String>) -> SeqError {
        SeqError::TextParse { line: self.line, column, message: message.into() }
    }

    fn apply<O, P>(&mut self, mut p: P, what: &str) -> Result<O, SeqError>
    where
        P: Parser<&'a str, O, nom::error::Error<&'a str>>,
    {
        match p.parse(self.rest) {
            Ok((rest, out)) => {
                self.rest = rest;
                Ok(out)
            }
            Err(_) => Err(self.err(format!("expected {}", what))),
        }
    }

    fn skip_space(&mut self) {
        self.rest = self.rest.trim_start_matches(|c: char| c == ' ' || c == '\t');
    }

    fn at_end(&self) -> bool {
        self.rest.trim().is_empty()
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

fn radix(input: &str) -> IResult<&str, u32> {
    alt((
        value(16, tag("0x")),
        value(8, tag("0o")),
        value(2, tag("0b")),
        success(10),
    ))
    .parse(input)
}

fn sign(input: &str) -> IResult<&str, char> {
    alt((one_of("+-"), success('+'))).parse(input)
}

// Canonical listings are decimal, but the other radix prefixes are
// accepted on input.
fn number<T: Num<FromStrRadixErr = std::num::ParseIntError>>(input: &str) -> IResult<&str, T> {
    let (input, (sign, radix)) = pair(sign, radix).parse(input)?;
    let (input, digits) =
        take_while1(|c: char| c.is_digit(radix) || c == '_').parse(input)?;

    let integer = T::from_str_radix(&str::replace(&(sign.to_string() + digits), "_", ""), radix);
    match integer {
        Ok(n) => Ok((input, n)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Fail,
        ))),
    }
}
