use crate::bytes::{ByteReader, ByteWriter};
use crate::error::SeqError;

// Container framing.  Everything is big endian; there is no little
// endian variant of this format.

pub const SIGNATURE: [u8; 4] = *b"RSEQ";
pub const DATA_TAG: [u8; 4] = *b"DATA";
pub const LABL_TAG: [u8; 4] = *b"LABL";

/// Byte order mark, always big endian.
pub const BOM: u16 = 0xFEFF;

/// Smallest header any file may declare.
pub const MIN_HEADER_SIZE: u16 = 16;

/// Header size written for new files: the fixed part plus the DATA/LABL
/// offset table.
pub const HEADER_SIZE: u16 = 0x20;

pub const SECTION_COUNT: u16 = 2;

/// The instruction payload starts this far into the DATA section
/// (tag, size and the reserved base-offset field).
pub const DATA_HEADER_SIZE: u32 = 0x0C;

/// Value written into the reserved DATA base-offset field.
pub const DATA_BASE_FIELD: u32 = 0x0C;

/// File format version, `(major << 8) | minor` on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    major: u8,
    minor: u8,
}

/// Every version this codec accepts.
pub const SUPPORTED_VERSIONS: [Version; 5] = [
    Version { major: 1, minor: 0 },
    Version { major: 1, minor: 1 },
    Version { major: 1, minor: 2 },
    Version { major: 1, minor: 3 },
    Version { major: 1, minor: 4 },
];

/// Version stamped into freshly encoded files.
pub const DEFAULT_VERSION: Version = Version { major: 1, minor: 4 };

impl Version {
    pub fn from_word(word: u16) -> Result<Version, SeqError> {
        SUPPORTED_VERSIONS
            .iter()
            .copied()
            .find(|v| v.word() == word)
            .ok_or(SeqError::UnknownVersion(word))
    }

    pub fn word(&self) -> u16 {
        (u16::from(self.major) << 8) | u16::from(self.minor)
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }

    fn index(&self) -> usize {
        SUPPORTED_VERSIONS.iter().position(|v| v == self).unwrap_or(0)
    }

    /// The next supported version up, saturating at the newest.
    pub fn next_higher(&self) -> Version {
        let i = self.index();
        if i + 1 < SUPPORTED_VERSIONS.len() {
            SUPPORTED_VERSIONS[i + 1]
        } else {
            *self
        }
    }

    /// The next supported version down, saturating at the oldest.
    pub fn next_lower(&self) -> Version {
        let i = self.index();
        if i > 0 {
            SUPPORTED_VERSIONS[i - 1]
        } else {
            *self
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The fixed file header plus the DATA/LABL offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version: Version,
    pub file_size: u32,
    pub data_offset: u32,
    pub data_size: u32,
    pub label_offset: u32,
    pub label_size: u32,
}

impl FileHeader {
    /// Reads and validates the header.  The reader must be at offset 0.
    pub fn read(r: &mut ByteReader) -> Result<FileHeader, SeqError> {
        let sig = r.read_tag().map_err(|_| SeqError::TruncatedHeader)?;
        if sig != SIGNATURE {
            return Err(SeqError::BadSignature { expected: SIGNATURE, read: sig, at: 0 });
        }
        let bom = r.read_u16().map_err(|_| SeqError::TruncatedHeader)?;
        if bom != BOM {
            return Err(SeqError::UnsupportedBom(bom));
        }
        let version = Version::from_word(r.read_u16().map_err(|_| SeqError::TruncatedHeader)?)?;
        let file_size = r.read_u32().map_err(|_| SeqError::TruncatedHeader)?;
        let header_size = r.read_u16().map_err(|_| SeqError::TruncatedHeader)?;
        let sections = r.read_u16().map_err(|_| SeqError::TruncatedHeader)?;
        if header_size < MIN_HEADER_SIZE || sections < 1 {
            return Err(SeqError::TruncatedHeader);
        }
        let data_offset = r.read_u32().map_err(|_| SeqError::TruncatedHeader)?;
        let data_size = r.read_u32().map_err(|_| SeqError::TruncatedHeader)?;
        let label_offset = r.read_u32().map_err(|_| SeqError::TruncatedHeader)?;
        let label_size = r.read_u32().map_err(|_| SeqError::TruncatedHeader)?;
        Ok(FileHeader {
            version,
            file_size,
            data_offset,
            data_size,
            label_offset,
            label_size,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        w.write_tag(SIGNATURE);
        w.write_u16(BOM);
        w.write_u16(self.version.word());
        w.write_u32(self.file_size);
        w.write_u16(HEADER_SIZE);
        w.write_u16(SECTION_COUNT);
        w.write_u32(self.data_offset);
        w.write_u32(self.data_size);
        w.write_u32(self.label_offset);
        w.write_u32(self.label_size);
    }
}

/// Reads a section tag and its size field, leaving the reader just past
/// the size.  The tag must match `expected`.
pub fn expect_section(r: &mut ByteReader, expected: [u8; 4]) -> Result<u32, SeqError> {
    let at = r.position();
    let tag = r.read_tag()?;
    if tag != expected {
        return Err(SeqError::BadSignature { expected, read: tag, at });
    }
    r.read_u32()
}

#[cfg(test)]
mod test_format {
    use super::*;

    fn sample_header() -> FileHeader {
        FileHeader {
            version: DEFAULT_VERSION,
            file_size: 0x54,
            data_offset: 0x20,
            data_size: 0x12,
            label_offset: 0x32,
            label_size: 0x1E,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let header = sample_header();
        let mut w = ByteWriter::new();
        header.write(&mut w);
        let bytes = w.into_vec();
        assert_eq!(bytes.len(), HEADER_SIZE as usize);
        assert_eq!(&bytes[0..4], b"RSEQ");
        assert_eq!(&bytes[4..8], &[0xFE, 0xFF, 0x01, 0x04]);

        let mut r = ByteReader::new(&bytes);
        assert_eq!(FileHeader::read(&mut r), Ok(header));
    }

    #[test]
    fn test_header_rejects() {
        let good = {
            let mut w = ByteWriter::new();
            sample_header().write(&mut w);
            w.into_vec()
        };

        let mut bad_sig = good.clone();
        bad_sig[0..4].copy_from_slice(b"RSAR");
        assert_eq!(
            FileHeader::read(&mut ByteReader::new(&bad_sig)),
            Err(SeqError::BadSignature { expected: SIGNATURE, read: *b"RSAR", at: 0 })
        );

        let mut bad_bom = good.clone();
        bad_bom[4..6].copy_from_slice(&[0xFF, 0xFF]);
        assert_eq!(
            FileHeader::read(&mut ByteReader::new(&bad_bom)),
            Err(SeqError::UnsupportedBom(0xFFFF))
        );

        let mut bad_version = good.clone();
        bad_version[6..8].copy_from_slice(&[0x02, 0x00]);
        assert_eq!(
            FileHeader::read(&mut ByteReader::new(&bad_version)),
            Err(SeqError::UnknownVersion(0x0200))
        );

        let truncated = &good[..10];
        assert_eq!(
            FileHeader::read(&mut ByteReader::new(truncated)),
            Err(SeqError::TruncatedHeader)
        );
    }

    #[test]
    fn test_version_navigation() {
        let v10 = Version::from_word(0x0100).unwrap();
        let v14 = Version::from_word(0x0104).unwrap();
        assert_eq!(v10.next_lower(), v10);
        assert_eq!(v10.next_higher().word(), 0x0101);
        assert_eq!(v14.next_higher(), v14);
        assert_eq!(v14.next_lower().word(), 0x0103);
        assert_eq!(Version::from_word(0x0105), Err(SeqError::UnknownVersion(0x0105)));
        assert_eq!(format!("{}", v14), "1.4");
    }

    #[test]
    fn test_expect_section() {
        let mut w = ByteWriter::new();
        w.write_tag(DATA_TAG);
        w.write_u32(0x30);
        let bytes = w.into_vec();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(expect_section(&mut r, DATA_TAG), Ok(0x30));

        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            expect_section(&mut r, LABL_TAG),
            Err(SeqError::BadSignature { expected: LABL_TAG, read: DATA_TAG, at: 0 })
        );
    }
}
