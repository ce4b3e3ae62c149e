use std::collections::HashSet;

use crate::bytes::{ByteReader, ByteWriter};
use crate::error::SeqError;
use crate::format;

/// One LABL entry: a name and the payload offset it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub name: String,
    pub data_offset: u32,
}

/// The decoded LABL section, in file order.
#[derive(Debug, Default)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
}

impl LabelTable {
    /// Reads the LABL section.  The reader must sit on the section tag.
    pub fn read(r: &mut ByteReader) -> Result<LabelTable, SeqError> {
        let base = r.position();
        format::expect_section(r, format::LABL_TAG)?;
        let count = r.read_u32()?;

        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            offsets.push(r.read_u32()?);
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(count as usize);
        for entry_off in offsets {
            // Entries are addressed relative to the section start + 8.
            r.seek(base + 8 + entry_off as usize);
            let data_offset = r.read_u32()?;
            let len = r.read_u32()? as usize;
            let at = r.position();
            let raw = r.read_bytes(len)?;
            if raw.is_empty() || !raw.iter().all(|b| b.is_ascii_graphic()) {
                return Err(SeqError::BadLabelName { at });
            }
            let name = String::from_utf8(raw.to_vec()).map_err(|_| SeqError::BadLabelName { at })?;
            if !seen.insert(name.clone()) {
                return Err(SeqError::DuplicateLabel(name));
            }
            entries.push(LabelEntry { name, data_offset });
        }
        Ok(LabelTable { entries })
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    /// First label (in file order) naming the given offset.
    pub fn by_offset(&self, offset: u32) -> Option<&LabelEntry> {
        self.entries.iter().find(|e| e.data_offset == offset)
    }

    /// Labels sorted ascending by offset, stable over file order.
    pub fn sorted_by_offset(&self) -> Vec<&LabelEntry> {
        let mut sorted: Vec<&LabelEntry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| e.data_offset);
        sorted
    }

    /// Ascending offsets with every alias name attached, file order kept
    /// within a group.
    pub fn grouped_by_offset(&self) -> Vec<(u32, Vec<&str>)> {
        let mut groups: Vec<(u32, Vec<&str>)> = Vec::new();
        for entry in self.sorted_by_offset() {
            match groups.last_mut() {
                Some((off, names)) if *off == entry.data_offset => names.push(&entry.name),
                _ => groups.push((entry.data_offset, vec![&entry.name])),
            }
        }
        groups
    }
}

/// Emits a complete LABL section for the given `(name, offset)` pairs,
/// preserving their order.
pub fn write_labels(names: &[(&str, u32)], w: &mut ByteWriter) {
    w.write_tag(format::LABL_TAG);
    w.write_u32(section_size(names));
    w.write_u32(names.len() as u32);

    // Entry offset table; entries are packed right behind it.
    let mut off = 4 + 4 * names.len() as u32;
    for (name, _) in names {
        w.write_u32(off);
        off += pad4(8 + name.len()) as u32;
    }
    for (name, data_offset) in names {
        w.write_u32(*data_offset);
        w.write_u32(name.len() as u32);
        w.write_bytes(name.as_bytes());
        for _ in name.len()..pad4(8 + name.len()) - 8 {
            w.write_u8(0);
        }
    }
}

/// Size field for a LABL section holding the given names.
pub fn section_size(names: &[(&str, u32)]) -> u32 {
    let entries: usize = names.iter().map(|(name, _)| pad4(8 + name.len())).sum();
    (8 + 4 * names.len() + entries) as u32
}

/// Bytes the emitted section occupies in the file.
pub fn section_bytes(names: &[(&str, u32)]) -> u32 {
    section_size(names) + 4
}

fn pad4(n: usize) -> usize {
    (n + 3) & !3
}
