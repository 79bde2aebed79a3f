use crate::{is_power_of_two, WORD_SIZE};
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on ways per set.
///
/// Way ids are stored as `u8` in the recency order of each set.
pub const MAX_ASSOCIATIVITY: usize = 256;

/// Default backing memory size (1 MiB).
pub const DEFAULT_MEMORY_SIZE: usize = 1 << 20;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a non-zero power of two (got {value})")]
    NotPowerOfTwo { name: &'static str, value: usize },

    #[error("line size of {line_size} bytes is smaller than a {} byte word", WORD_SIZE)]
    LineTooSmall { line_size: usize },

    #[error("associativity {associativity} exceeds the {num_lines} lines of a {total_size} byte bank")]
    AssociativityTooLarge {
        associativity: usize,
        num_lines: usize,
        total_size: usize,
    },

    #[error("associativity {associativity} exceeds the supported maximum of {}", MAX_ASSOCIATIVITY)]
    TooManyWays { associativity: usize },

    #[error("memory size {memory_size} is not a non-zero multiple of the {line_size} byte line size")]
    MemorySize {
        memory_size: usize,
        line_size: usize,
    },
}

/// How write-init requests treat the line they install.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteInitPolicy {
    /// Line is left dirty and reaches memory on eviction.
    #[default]
    WriteBack,
    /// Line is stored to memory right away and left clean.
    WriteThrough,
}

/// Cache configuration.
///
/// `total_size_bytes` is the capacity of a single bank group, so a cache with
/// `bank_count` banks holds `bank_count * total_size_bytes` bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Cache {
    pub total_size_bytes: usize,
    pub line_size_bytes: usize,
    pub associativity: usize,
    pub bank_count: usize,
    pub write_init_policy: WriteInitPolicy,
}

impl Default for Cache {
    fn default() -> Self {
        Self::direct_mapped()
    }
}

impl std::fmt::Display for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let size = human_bytes::human_bytes(self.total_size_bytes as f64);
        write!(
            f,
            "{size} ({}-way, {} byte line, {} bank(s))",
            self.associativity, self.line_size_bytes, self.bank_count
        )
    }
}

impl Cache {
    /// 256B direct-mapped cache with 16B lines.
    #[must_use]
    pub fn direct_mapped() -> Self {
        Self {
            total_size_bytes: 256,
            line_size_bytes: 16,
            associativity: 1,
            bank_count: 1,
            write_init_policy: WriteInitPolicy::WriteBack,
        }
    }

    /// 256B two-way set-associative cache with 16B lines.
    #[must_use]
    pub fn set_associative() -> Self {
        Self {
            associativity: 2,
            ..Self::direct_mapped()
        }
    }

    #[must_use]
    pub fn with_banks(self, bank_count: usize) -> Self {
        Self { bank_count, ..self }
    }

    #[must_use]
    pub fn with_associativity(self, associativity: usize) -> Self {
        Self {
            associativity,
            ..self
        }
    }

    #[must_use]
    pub fn with_write_init_policy(self, write_init_policy: WriteInitPolicy) -> Self {
        Self {
            write_init_policy,
            ..self
        }
    }

    /// Validate the configuration and derive the cache geometry.
    pub fn geometry(&self) -> Result<Geometry, ConfigError> {
        let checks = [
            ("total size", self.total_size_bytes),
            ("line size", self.line_size_bytes),
            ("associativity", self.associativity),
            ("bank count", self.bank_count),
        ];
        for (name, value) in checks {
            if !is_power_of_two(value) {
                return Err(ConfigError::NotPowerOfTwo { name, value });
            }
        }
        if self.line_size_bytes < WORD_SIZE {
            return Err(ConfigError::LineTooSmall {
                line_size: self.line_size_bytes,
            });
        }
        let num_lines = self.total_size_bytes / self.line_size_bytes;
        if num_lines == 0 || self.associativity > num_lines {
            return Err(ConfigError::AssociativityTooLarge {
                associativity: self.associativity,
                num_lines,
                total_size: self.total_size_bytes,
            });
        }
        if self.associativity > MAX_ASSOCIATIVITY {
            return Err(ConfigError::TooManyWays {
                associativity: self.associativity,
            });
        }
        let sets_per_bank = num_lines / self.associativity;
        Ok(Geometry {
            line_size: self.line_size_bytes,
            associativity: self.associativity,
            bank_count: self.bank_count,
            sets_per_bank,
            line_size_log2: self.line_size_bytes.ilog2(),
            bank_count_log2: self.bank_count.ilog2(),
            sets_per_bank_log2: sets_per_bank.ilog2(),
        })
    }
}

/// Validated cache geometry.
///
/// All sizes are powers of two, so every address field has a fixed bit width.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub line_size: usize,
    pub associativity: usize,
    pub bank_count: usize,
    pub sets_per_bank: usize,
    pub line_size_log2: u32,
    pub bank_count_log2: u32,
    pub sets_per_bank_log2: u32,
}

impl Geometry {
    /// Number of sets across all banks.
    #[inline]
    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.sets_per_bank * self.bank_count
    }

    /// Number of lines in total.
    #[inline]
    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.num_sets() * self.associativity
    }

    /// The total size of the cache in bytes.
    #[inline]
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_lines() * self.line_size
    }
}

/// Top-level simulation config: the cache plus its backing memory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: Cache,
    pub memory_size_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: Cache::default(),
            memory_size_bytes: DEFAULT_MEMORY_SIZE,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<Geometry, ConfigError> {
        let geometry = self.cache.geometry()?;
        if self.memory_size_bytes == 0 || self.memory_size_bytes % geometry.line_size != 0 {
            return Err(ConfigError::MemorySize {
                memory_size: self.memory_size_bytes,
                line_size: geometry.line_size,
            });
        }
        Ok(geometry)
    }

    /// Load a config from a YAML or JSON file, chosen by file extension.
    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| eyre::eyre!("failed to read config {}", path.display()))?;
        let config: Self = crate::trace::parse_by_extension(path, &content)?;
        config.validate()?;
        Ok(config)
    }
}
