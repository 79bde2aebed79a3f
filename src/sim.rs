use crate::{
    cache::{self, Request, Response},
    config,
    fifo::Fifo,
    mem::BackingMemory,
    stats::Stats,
    Error,
};

/// Feeds requests to a cache in arrival order and collects its responses.
///
/// Every request yields exactly one response, in the same order. Opaque
/// tags are passed through and never checked for uniqueness.
#[derive(Debug)]
pub struct Simulator<M> {
    pub cache: cache::Cache<M>,
    requests: Fifo<Request>,
    responses: Fifo<Response>,
    cycle: u64,
}

impl<M> Simulator<M>
where
    M: BackingMemory,
{
    pub fn new(config: config::Cache, memory: M) -> Result<Self, Error> {
        Ok(Self::from_cache(cache::Cache::new(config, memory)?))
    }

    #[must_use]
    pub fn from_cache(cache: cache::Cache<M>) -> Self {
        Self {
            cache,
            requests: Fifo::default(),
            responses: Fifo::default(),
            cycle: 0,
        }
    }

    /// Queue a request behind all previously pushed requests.
    pub fn push(&mut self, req: Request) {
        log::trace!("sim: push {}", req);
        self.requests.enqueue(req);
    }

    pub fn extend(&mut self, reqs: impl IntoIterator<Item = Request>) {
        for req in reqs {
            self.push(req);
        }
    }

    /// Process the oldest pending request.
    ///
    /// # Returns
    /// The response, or `None` if no request is pending.
    pub fn step(&mut self) -> Result<Option<Response>, Error> {
        let Some(req) = self.requests.dequeue() else {
            return Ok(None);
        };
        self.cycle += 1;
        let resp = self.cache.access(&req)?;
        log::debug!("sim: cycle {}: {} => {}", self.cycle, req, resp);
        self.responses.enqueue(resp);
        Ok(Some(resp))
    }

    /// Process all pending requests.
    ///
    /// Stops at the first request that fails. Requests after it stay queued.
    ///
    /// # Returns
    /// The number of requests processed.
    pub fn run(&mut self) -> Result<usize, Error> {
        let mut processed = 0;
        while self.step()?.is_some() {
            processed += 1;
        }
        Ok(processed)
    }

    /// Take all responses produced so far, oldest first.
    pub fn drain_responses(&mut self) -> Vec<Response> {
        self.responses.drain().collect()
    }

    #[must_use]
    pub fn responses(&self) -> &Fifo<Response> {
        &self.responses
    }

    #[must_use]
    pub fn num_pending(&self) -> usize {
        self.requests.len()
    }

    /// Number of requests processed.
    #[must_use]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[must_use]
    pub fn stats(&self) -> &Stats {
        self.cache.stats()
    }
}
