use smallvec::SmallVec;

/// Chooses which way of a set to evict.
pub trait ReplacementPolicy: std::fmt::Debug + Send + Sync + 'static {
    /// Record an access to `way` of `set`.
    fn touch(&mut self, set: usize, way: usize);

    /// The way to evict from `set`.
    ///
    /// Must not change any state.
    #[must_use]
    fn victim(&self, set: usize) -> usize;

    /// Forget all access history.
    fn reset(&mut self);
}

/// Recency stack of a single set, most recently used way first.
pub type RecencyOrder = SmallVec<[u8; 8]>;

/// Least recently used replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lru {
    associativity: usize,
    sets: Vec<RecencyOrder>,
}

impl Lru {
    #[must_use]
    pub fn new(num_sets: usize, associativity: usize) -> Self {
        debug_assert!(associativity <= crate::config::MAX_ASSOCIATIVITY);
        let sets = (0..num_sets)
            .map(|_| Self::cold_order(associativity))
            .collect();
        Self {
            associativity,
            sets,
        }
    }

    /// Ways of a fresh set ordered so that way 0 is evicted first.
    fn cold_order(associativity: usize) -> RecencyOrder {
        (0..associativity).rev().map(|way| way as u8).collect()
    }

    /// Recency order of `set`, most recently used first.
    #[must_use]
    pub fn order(&self, set: usize) -> &[u8] {
        &self.sets[set]
    }
}

impl ReplacementPolicy for Lru {
    fn touch(&mut self, set: usize, way: usize) {
        let order = &mut self.sets[set];
        let way = way as u8;
        if let Some(pos) = order.iter().position(|w| *w == way) {
            order.remove(pos);
        }
        order.insert(0, way);
        log::trace!("lru: set {} order {:?}", set, order.as_slice());
    }

    fn victim(&self, set: usize) -> usize {
        let order = &self.sets[set];
        order.last().map_or(0, |way| usize::from(*way))
    }

    fn reset(&mut self) {
        for order in &mut self.sets {
            *order = Self::cold_order(self.associativity);
        }
    }
}
