use crate::{
    address,
    cache::{Request, Response},
    config::Config,
    mem::FlatMemory,
    sim::Simulator,
    stats::Stats,
};
use color_eyre::eyre::{self, WrapErr};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// Parse YAML or JSON content, chosen by the extension of `path`.
pub fn parse_by_extension<T: DeserializeOwned>(path: &Path, content: &str) -> eyre::Result<T> {
    let extension = path
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(content)
            .wrap_err_with(|| eyre::eyre!("failed to parse YAML {}", path.display())),
        Some("json") => serde_json::from_str(content)
            .wrap_err_with(|| eyre::eyre!("failed to parse JSON {}", path.display())),
        other => Err(eyre::eyre!(
            "unknown file extension {:?} of {} (expected yaml, yml or json)",
            other,
            path.display()
        )),
    }
}

/// Word written to backing memory before the trace runs.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preload {
    pub addr: address,
    pub data: u32,
}

/// One request of a trace with its optional expected response.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(flatten)]
    pub request: Request,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Response>,
}

impl From<Request> for Entry {
    fn from(request: Request) -> Self {
        Self {
            request,
            expect: None,
        }
    }
}

/// A request trace.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
    #[serde(default)]
    pub preload: Vec<Preload>,
    #[serde(default)]
    pub requests: Vec<Entry>,
}

/// A response that differs from the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub index: usize,
    pub request: Request,
    pub expected: Response,
    pub actual: Response,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "request {} ({}): expected {} but got {}",
            self.index, self.request, self.expected, self.actual
        )
    }
}

/// Result of replaying a trace.
#[derive(Debug, Clone)]
pub struct Replay {
    pub responses: Vec<Response>,
    pub mismatches: Vec<Mismatch>,
    pub stats: Stats,
    pub memory: FlatMemory,
}

impl Trace {
    pub fn from_path(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| eyre::eyre!("failed to read trace {}", path.display()))?;
        parse_by_extension(path, &content)
    }

    /// Run the trace against a fresh cache and memory built from `config`.
    ///
    /// Dirty lines are not flushed, so `memory` holds what reached backing
    /// memory through evictions only.
    pub fn replay(&self, config: &Config) -> eyre::Result<Replay> {
        config.validate()?;
        let mut memory = FlatMemory::new(config.memory_size_bytes);
        for preload in &self.preload {
            memory
                .write_word(preload.addr, preload.data)
                .wrap_err_with(|| eyre::eyre!("failed to preload {:#x}", preload.addr))?;
        }
        log::debug!(
            "replaying {} requests on {} with {} preloaded words",
            self.requests.len(),
            config.cache,
            self.preload.len()
        );

        let mut sim = Simulator::new(config.cache.clone(), memory)?;
        sim.extend(self.requests.iter().map(|entry| entry.request));
        sim.run()?;
        let responses = sim.drain_responses();

        let mismatches = self
            .requests
            .iter()
            .zip(responses.iter())
            .enumerate()
            .filter_map(|(index, (entry, actual))| {
                let expected = entry.expect?;
                (expected != *actual).then_some(Mismatch {
                    index,
                    request: entry.request,
                    expected,
                    actual: *actual,
                })
            })
            .collect();

        let stats = sim.stats().clone();
        Ok(Replay {
            responses,
            mismatches,
            stats,
            memory: sim.cache.into_backing(),
        })
    }
}
