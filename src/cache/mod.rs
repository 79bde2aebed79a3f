pub mod block;
pub mod engine;
pub mod replacement;

pub use engine::{Cache, State};
pub use replacement::{Lru, ReplacementPolicy};

use crate::{address, mem, WORD_SIZE};
use serde::{Deserialize, Serialize};

/// Outcome of a tag lookup.
#[derive(Debug, strum::EnumIter, strum::IntoStaticStr, Clone, Copy, Hash, PartialEq, Eq)]
pub enum RequestStatus {
    HIT = 0,
    MISS,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum Kind {
    #[serde(rename = "rd")]
    #[strum(serialize = "rd")]
    Read,
    #[serde(rename = "wr")]
    #[strum(serialize = "wr")]
    Write,
    /// Seeds a line without reading backing memory.
    #[serde(rename = "in")]
    #[strum(serialize = "in")]
    WriteInit,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{name}")
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("access of {len} bytes at {addr:#x} is outside of the {size} byte memory")]
    OutOfRange { addr: address, len: usize, size: usize },

    #[error("invalid access length {len} (at most {} bytes)", WORD_SIZE)]
    InvalidLength { len: u8 },

    #[error("access of {len} bytes at {addr:#x} crosses a {line_size} byte line")]
    CrossesLine {
        addr: address,
        len: usize,
        line_size: usize,
    },

    #[error(transparent)]
    Memory(#[from] mem::Error),
}

/// A request to the cache.
///
/// `len` of zero accesses a full word, otherwise `len` bytes.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub kind: Kind,
    #[serde(default)]
    pub opaque: u32,
    pub addr: address,
    #[serde(default)]
    pub len: u8,
    #[serde(default)]
    pub data: u32,
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}[{:#06x}]", self.kind, self.addr)?;
        if self.len != 0 {
            write!(f, "/{}", self.len)?;
        }
        if self.kind != Kind::Read {
            write!(f, " = {:#010x}", self.data)?;
        }
        write!(f, " #{}", self.opaque)
    }
}

impl Request {
    #[must_use]
    pub fn new(kind: Kind, addr: address, data: u32) -> Self {
        Self {
            kind,
            opaque: 0,
            addr,
            len: 0,
            data,
        }
    }

    #[must_use]
    pub fn read(addr: address) -> Self {
        Self::new(Kind::Read, addr, 0)
    }

    #[must_use]
    pub fn write(addr: address, data: u32) -> Self {
        Self::new(Kind::Write, addr, data)
    }

    #[must_use]
    pub fn write_init(addr: address, data: u32) -> Self {
        Self::new(Kind::WriteInit, addr, data)
    }

    #[must_use]
    pub fn with_len(self, len: u8) -> Self {
        Self { len, ..self }
    }

    #[must_use]
    pub fn with_opaque(self, opaque: u32) -> Self {
        Self { opaque, ..self }
    }

    /// Number of bytes accessed.
    #[inline]
    #[must_use]
    pub fn num_bytes(&self) -> usize {
        match self.len {
            0 => WORD_SIZE,
            len => len as usize,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self.kind, Kind::Write | Kind::WriteInit)
    }
}

/// The answer to exactly one request.
///
/// `hit` is serialized as `0` or `1`. Write-init responses never report a
/// hit, and only reads carry data.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub kind: Kind,
    #[serde(default)]
    pub opaque: u32,
    #[serde(with = "hit_flag")]
    pub hit: bool,
    #[serde(default)]
    pub len: u8,
    #[serde(default)]
    pub data: u32,
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let hit = if self.hit { "hit" } else { "miss" };
        write!(f, "{} {hit} data={:#010x}", self.kind, self.data)?;
        if self.len != 0 {
            write!(f, "/{}", self.len)?;
        }
        write!(f, " #{}", self.opaque)
    }
}

impl Response {
    #[must_use]
    pub fn new(req: &Request, hit: bool, data: u32) -> Self {
        Self {
            kind: req.kind,
            opaque: req.opaque,
            hit,
            len: req.len,
            data,
        }
    }

    #[must_use]
    pub fn with_opaque(self, opaque: u32) -> Self {
        Self { opaque, ..self }
    }
}

mod hit_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hit: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*hit))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(serde::de::Error::custom(format!(
                "hit flag must be 0 or 1 (got {other})"
            ))),
        }
    }
}
