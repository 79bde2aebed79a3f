use bitvec::{bitvec, vec::BitVec};

/// One bit per byte of a line.
pub type ByteMask = BitVec;

#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, strum::IntoStaticStr)]
pub enum Status {
    #[default]
    INVALID,
    VALID,
    MODIFIED,
}

/// One way of a cache set.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Line {
    pub tag: u64,
    pub status: Status,
    pub data: Box<[u8]>,
    /// Bytes of `data` holding known content.
    ///
    /// Only lines installed without a block have unknown bytes. They read
    /// as zero until the line is filled from memory.
    pub byte_mask: ByteMask,
}

impl std::fmt::Debug for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Line")
            .field("tag", &format!("{:#x}", self.tag))
            .field("status", &self.status)
            .field("filled", &self.byte_mask.count_ones())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let status: &'static str = self.status.into();
        write!(f, "Line(tag={:#x}, {status})", self.tag)
    }
}

impl Line {
    #[must_use]
    pub fn new(line_size: usize) -> Self {
        Self {
            tag: 0,
            status: Status::INVALID,
            data: vec![0; line_size].into_boxed_slice(),
            byte_mask: bitvec![0; line_size],
        }
    }

    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status != Status::INVALID
    }

    #[inline]
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.status == Status::MODIFIED
    }

    #[inline]
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.status == Status::INVALID
    }

    /// Replace the line with a new block.
    ///
    /// The line becomes valid and clean. Without `block`, no byte of the
    /// line is known.
    pub fn allocate(&mut self, tag: u64, block: Option<&[u8]>) {
        self.tag = tag;
        self.status = Status::VALID;
        match block {
            Some(block) => {
                self.data.copy_from_slice(block);
                self.byte_mask.fill(true);
            }
            None => {
                self.data.fill(0);
                self.byte_mask.fill(false);
            }
        }
    }

    /// Whether all bytes in `offset..offset + len` are known.
    #[inline]
    #[must_use]
    pub fn is_filled(&self, offset: usize, len: usize) -> bool {
        self.byte_mask[offset..offset + len].all()
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.byte_mask.all()
    }

    /// Take the unknown bytes from `block`.
    ///
    /// Known bytes are kept, so the line holds the newer data.
    pub fn fill(&mut self, block: &[u8]) {
        for i in self.byte_mask.iter_zeros() {
            self.data[i] = block[i];
        }
        self.byte_mask.fill(true);
    }

    #[inline]
    #[must_use]
    pub fn read(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    /// Overwrite bytes at `offset` and mark the line modified.
    #[inline]
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.byte_mask[offset..offset + bytes.len()].fill(true);
        self.status = Status::MODIFIED;
    }

    #[inline]
    pub fn set_clean(&mut self) {
        if self.status == Status::MODIFIED {
            self.status = Status::VALID;
        }
    }

    #[inline]
    pub fn invalidate(&mut self) {
        self.status = Status::INVALID;
    }
}
