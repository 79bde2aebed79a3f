#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]

pub mod addrdec;
pub mod cache;
pub mod config;
pub mod fifo;
pub mod mem;
pub mod sim;
pub mod stats;
pub mod tag_array;
pub mod trace;


pub use cache::{Cache, Kind, Request, Response};
pub use mem::{BackingMemory, FlatMemory};
pub use sim::Simulator;

pub type address = u64;

/// Width of a data word in bytes.
pub const WORD_SIZE: usize = 4;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Access(#[from] cache::AccessError),
}

/// Returns true if n is a non-zero power of two.
#[must_use]
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
