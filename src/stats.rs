use crate::cache::{Kind, RequestStatus};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Hit and miss counts of one request kind.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub hits: usize,
    pub misses: usize,
}

impl Counts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.hits + self.misses
    }

    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.hits as f64 / total as f64),
        }
    }
}

/// A single counted access outcome.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct AccessStat {
    pub kind: Kind,
    pub status: RequestStatus,
}

impl std::fmt::Display for AccessStat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let status: &'static str = self.status.into();
        f.pad(&format!("{}[{}]", self.kind, status))
    }
}

/// Cache statistics.
///
/// Write-init accesses count their true lookup outcome even though their
/// responses never report a hit.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stats {
    pub read: Counts,
    pub write: Counts,
    pub write_init: Counts,
    /// Lines fetched from backing memory.
    pub fetches: usize,
    /// Dirty lines stored to backing memory.
    pub writebacks: usize,
    /// Valid lines replaced by another line.
    pub evictions: usize,
}

impl Stats {
    #[must_use]
    pub fn counts(&self, kind: Kind) -> &Counts {
        match kind {
            Kind::Read => &self.read,
            Kind::Write => &self.write,
            Kind::WriteInit => &self.write_init,
        }
    }

    fn counts_mut(&mut self, kind: Kind) -> &mut Counts {
        match kind {
            Kind::Read => &mut self.read,
            Kind::Write => &mut self.write,
            Kind::WriteInit => &mut self.write_init,
        }
    }

    pub fn inc(&mut self, kind: Kind, status: RequestStatus) {
        let counts = self.counts_mut(kind);
        match status {
            RequestStatus::HIT => counts.hits += 1,
            RequestStatus::MISS => counts.misses += 1,
        }
    }

    #[must_use]
    pub fn get(&self, stat: AccessStat) -> usize {
        let counts = self.counts(stat.kind);
        match stat.status {
            RequestStatus::HIT => counts.hits,
            RequestStatus::MISS => counts.misses,
        }
    }

    /// Total number of accesses.
    #[must_use]
    pub fn total(&self) -> usize {
        Kind::iter().map(|kind| self.counts(kind).total()).sum()
    }

    /// All non-zero access counts.
    pub fn iter(&self) -> impl Iterator<Item = (AccessStat, usize)> + '_ {
        Kind::iter()
            .cartesian_product(RequestStatus::iter())
            .map(|(kind, status)| AccessStat { kind, status })
            .map(|stat| (stat, self.get(stat)))
            .filter(|(_, count)| *count > 0)
    }
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for (stat, count) in self.iter() {
            writeln!(f, "{stat:<12} {count:>8}")?;
        }
        writeln!(f, "{:<12} {:>8}", "fetches", self.fetches)?;
        writeln!(f, "{:<12} {:>8}", "writebacks", self.writebacks)?;
        write!(f, "{:<12} {:>8}", "evictions", self.evictions)
    }
}
