//! Documents and their per-segment control blocks

use crate::model::gap_buffer::GapBuffer;

/// Longest document name stored in a control block, in bytes.
pub const NAME_MAX: usize = 64;

/// Size of an encoded control block:
/// name length | name | modified | overwrite-confirm | part | gap_begin | gap_end
pub const HEADER_SIZE: usize = 1 + NAME_MAX + 1 + 1 + 1 + 4 + 4;

/// Document metadata kept in each segment's control block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentHeader {
    pub name: String,
    pub modified: bool,
    pub needs_overwrite_confirm: bool,
    /// 0 for a standalone document, otherwise the 1-based position in a
    /// multi-segment chain.
    pub part: u8,
}

impl DocumentHeader {
    /// Set the name, truncated to `NAME_MAX` bytes on a char boundary.
    pub fn set_name(&mut self, name: &str) {
        let mut end = name.len().min(NAME_MAX);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        self.name = name[..end].to_string();
    }

    /// Encode this header together with a gap position.
    pub fn encode(&self, gap_begin: usize, gap_end: usize) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let name = self.name.as_bytes();
        let len = name.len().min(NAME_MAX);
        out[0] = len as u8;
        out[1..1 + len].copy_from_slice(&name[..len]);
        let mut at = 1 + NAME_MAX;
        out[at] = self.modified as u8;
        at += 1;
        out[at] = self.needs_overwrite_confirm as u8;
        at += 1;
        out[at] = self.part;
        at += 1;
        out[at..at + 4].copy_from_slice(&(gap_begin as u32).to_le_bytes());
        at += 4;
        out[at..at + 4].copy_from_slice(&(gap_end as u32).to_le_bytes());
        out
    }

    /// Decode a control block into a header and its gap position.
    pub fn decode(block: &[u8; HEADER_SIZE]) -> (Self, usize, usize) {
        let len = (block[0] as usize).min(NAME_MAX);
        let name = String::from_utf8_lossy(&block[1..1 + len]).into_owned();
        let mut at = 1 + NAME_MAX;
        let modified = block[at] != 0;
        at += 1;
        let needs_overwrite_confirm = block[at] != 0;
        at += 1;
        let part = block[at];
        at += 1;
        let gap_begin = u32::from_le_bytes([block[at], block[at + 1], block[at + 2], block[at + 3]]);
        at += 4;
        let gap_end = u32::from_le_bytes([block[at], block[at + 1], block[at + 2], block[at + 3]]);
        (
            Self {
                name,
                modified,
                needs_overwrite_confirm,
                part,
            },
            gap_begin as usize,
            gap_end as usize,
        )
    }
}

/// The document currently hosted by the active segment.
#[derive(Debug)]
pub struct Document {
    pub header: DocumentHeader,
    pub buffer: GapBuffer,
}

impl Document {
    pub fn new(header: DocumentHeader, buffer: GapBuffer) -> Self {
        Self { header, buffer }
    }

    /// A segment is unused when it holds nothing worth keeping.
    pub fn is_unused(&self) -> bool {
        self.header.name.is_empty() && self.buffer.is_empty() && !self.header.modified
    }

    pub fn mark_modified(&mut self) {
        self.header.modified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = DocumentHeader {
            name: "letters.txt".to_string(),
            modified: true,
            needs_overwrite_confirm: false,
            part: 3,
        };
        let block = header.encode(120, 47000);
        let (decoded, begin, end) = DocumentHeader::decode(&block);
        assert_eq!(decoded, header);
        assert_eq!(begin, 120);
        assert_eq!(end, 47000);
    }

    #[test]
    fn test_empty_block_decodes_to_unused_header() {
        let (header, begin, end) = DocumentHeader::decode(&[0u8; HEADER_SIZE]);
        assert_eq!(header, DocumentHeader::default());
        assert_eq!((begin, end), (0, 0));
    }

    #[test]
    fn test_name_truncated() {
        let mut header = DocumentHeader::default();
        header.set_name(&"x".repeat(100));
        assert_eq!(header.name.len(), NAME_MAX);
        let (decoded, _, _) = DocumentHeader::decode(&header.encode(0, 0));
        assert_eq!(decoded.name.len(), NAME_MAX);
    }
}
