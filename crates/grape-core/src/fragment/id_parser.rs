//! Global vertex id layout
//!
//! ```text
//! [fid: fid_bits][label: label_bits][offset: remaining bits]
//! ```

use super::{FragId, Gid, LabelId};

/// Packs and unpacks `(fid, label, offset)` triples into a [`Gid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParser {
    fid_offset: u32,
    label_offset: u32,
    label_mask: u64,
    offset_mask: u64,
}

impl IdParser {
    /// Create a parser for `fnum` fragments and `label_num` labels
    pub fn new(fnum: FragId, label_num: LabelId) -> Self {
        let fid_bits = bits_needed(fnum);
        let label_bits = bits_needed(label_num);
        let fid_offset = 64 - fid_bits;
        let label_offset = fid_offset - label_bits;

        Self {
            fid_offset,
            label_offset,
            label_mask: ((1u64 << label_bits) - 1) << label_offset,
            offset_mask: (1u64 << label_offset) - 1,
        }
    }

    /// Build a global id
    pub fn generate(&self, fid: FragId, label: LabelId, offset: usize) -> Gid {
        ((fid as u64) << self.fid_offset)
            | ((label as u64) << self.label_offset)
            | (offset as u64 & self.offset_mask)
    }

    /// Owning fragment of a global id
    pub fn fid(&self, gid: Gid) -> FragId {
        (gid >> self.fid_offset) as FragId
    }

    /// Label of a global id
    pub fn label(&self, gid: Gid) -> LabelId {
        ((gid & self.label_mask) >> self.label_offset) as LabelId
    }

    /// Offset of the vertex within its owner's inner range
    pub fn offset(&self, gid: Gid) -> usize {
        (gid & self.offset_mask) as usize
    }

    /// Largest offset representable under this layout
    pub fn max_offset(&self) -> usize {
        self.offset_mask as usize
    }
}

fn bits_needed(n: u32) -> u32 {
    if n <= 1 { 1 } else { 32 - (n - 1).leading_zeros() }
}
