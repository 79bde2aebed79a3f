use crate::{
    cache::block::{ByteMask, Line},
    config,
};

/// Location of a set: the bank group and the set index within it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SetId {
    pub bank: u64,
    pub index: u64,
}

impl std::fmt::Display for SetId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.bank, self.index)
    }
}

/// Content of a dirty line about to be replaced.
///
/// Only bytes set in `byte_mask` hold data. The line is stored at the
/// address rebuilt from `tag` and its set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvictedLine {
    pub tag: u64,
    pub data: Box<[u8]>,
    pub byte_mask: ByteMask,
}

/// Tag array.
///
/// Holds `bank_count x sets_per_bank x associativity` lines. Lines of a set
/// are stored next to each other and addressed by way id.
#[derive(Debug, Clone)]
pub struct TagArray {
    lines: Vec<Line>,
    associativity: usize,
    sets_per_bank: usize,
    num_dirty: usize,
}

impl TagArray {
    #[must_use]
    pub fn new(geometry: &config::Geometry) -> Self {
        let lines = (0..geometry.total_lines())
            .map(|_| Line::new(geometry.line_size))
            .collect();
        Self {
            lines,
            associativity: geometry.associativity,
            sets_per_bank: geometry.sets_per_bank,
            num_dirty: 0,
        }
    }

    /// Flat number of a set across all banks.
    #[inline]
    #[must_use]
    pub fn set_number(&self, set: SetId) -> usize {
        set.bank as usize * self.sets_per_bank + set.index as usize
    }

    #[inline]
    fn line_index(&self, set: SetId, way: usize) -> usize {
        debug_assert!(way < self.associativity);
        self.set_number(set) * self.associativity + way
    }

    /// Lines of a set, indexed by way.
    #[must_use]
    pub fn set(&self, set: SetId) -> &[Line] {
        let start = self.set_number(set) * self.associativity;
        &self.lines[start..start + self.associativity]
    }

    /// Way holding a valid line with `tag`, if any.
    #[must_use]
    pub fn lookup(&self, set: SetId, tag: u64) -> Option<usize> {
        let way = self
            .set(set)
            .iter()
            .position(|line| line.is_valid() && line.tag == tag);
        debug_assert!(
            self.set(set)
                .iter()
                .filter(|line| line.is_valid() && line.tag == tag)
                .count()
                <= 1,
            "tag {tag:#x} is resident in more than one way of set {set}"
        );
        way
    }

    #[must_use]
    pub fn get_block(&self, set: SetId, way: usize) -> &Line {
        &self.lines[self.line_index(set, way)]
    }

    #[must_use]
    pub fn read(&self, set: SetId, way: usize, offset: usize, len: usize) -> &[u8] {
        self.get_block(set, way).read(offset, len)
    }

    /// Write bytes into a resident line and mark it dirty.
    pub fn write(&mut self, set: SetId, way: usize, offset: usize, bytes: &[u8]) {
        let idx = self.line_index(set, way);
        let line = &mut self.lines[idx];
        debug_assert!(line.is_valid());
        if !line.is_modified() {
            self.num_dirty += 1;
        }
        line.write(offset, bytes);
    }

    /// Install a block into a way, replacing whatever was there.
    ///
    /// The line is valid and clean afterwards. Without `block` none of its
    /// bytes are known.
    pub fn install(
        &mut self,
        set: SetId,
        way: usize,
        tag: u64,
        block: Option<&[u8]>,
    ) {
        let idx = self.line_index(set, way);
        let line = &mut self.lines[idx];
        if line.is_modified() {
            self.num_dirty -= 1;
        }
        log::trace!(
            "tag_array::install(set={}, way={}, tag={:#x}) replaces {}",
            set,
            way,
            tag,
            line
        );
        line.allocate(tag, block);
    }

    /// Prior content of a way if it is dirty.
    ///
    /// The line is left untouched: it stays dirty until it is replaced by
    /// [`TagArray::install`].
    #[must_use]
    pub fn evict_if_dirty(&self, set: SetId, way: usize) -> Option<EvictedLine> {
        let line = self.get_block(set, way);
        line.is_modified().then(|| EvictedLine {
            tag: line.tag,
            data: line.data.clone(),
            byte_mask: line.byte_mask.clone(),
        })
    }

    /// Complete a partially known line with `block` from memory.
    pub fn fill(&mut self, set: SetId, way: usize, block: &[u8]) {
        let idx = self.line_index(set, way);
        self.lines[idx].fill(block);
    }

    /// Mark a line clean after its content reached memory.
    pub fn mark_clean(&mut self, set: SetId, way: usize) {
        let idx = self.line_index(set, way);
        let line = &mut self.lines[idx];
        if line.is_modified() {
            self.num_dirty -= 1;
        }
        line.set_clean();
    }

    /// Hand every dirty line and its set to `store` and mark it clean.
    ///
    /// # Returns
    /// The number of dirty lines flushed.
    pub fn flush<E>(
        &mut self,
        mut store: impl FnMut(SetId, &Line) -> Result<(), E>,
    ) -> Result<usize, E> {
        let mut flushed = 0;
        let (associativity, sets_per_bank) = (self.associativity, self.sets_per_bank);
        for (idx, line) in self.lines.iter_mut().enumerate() {
            if !line.is_modified() {
                continue;
            }
            let set_number = idx / associativity;
            let set = SetId {
                bank: (set_number / sets_per_bank) as u64,
                index: (set_number % sets_per_bank) as u64,
            };
            store(set, line)?;
            line.set_clean();
            self.num_dirty -= 1;
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Invalidates all tags stored in this array.
    ///
    /// Dirty data is dropped.
    pub fn invalidate(&mut self) {
        for line in &mut self.lines {
            line.invalidate();
        }
        self.num_dirty = 0;
    }

    #[inline]
    #[must_use]
    pub fn num_dirty(&self) -> usize {
        self.num_dirty
    }

    #[must_use]
    pub fn num_valid(&self) -> usize {
        self.lines.iter().filter(|line| line.is_valid()).count()
    }

    /// The maximum number of lines this array can hold.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.lines.iter()
    }
}
