use super::{AccessError, Kind, Lru, ReplacementPolicy, Request, RequestStatus, Response};
use crate::{
    addrdec::{AddressDecoder, DecodedAddress},
    config::{self, ConfigError, WriteInitPolicy},
    mem::{self, BackingMemory},
    stats::Stats,
    tag_array::{SetId, TagArray},
    WORD_SIZE,
};

/// Where the engine is in processing a request.
///
/// Requests are processed one at a time, so the engine is back to
/// [`State::Idle`] whenever [`Cache::access`] returns.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, strum::IntoStaticStr)]
pub enum State {
    #[default]
    Idle,
    Decoding,
    Lookup,
    HitPath,
    MissPath,
    Responding,
}

/// Blocking, write-back, write-allocate set-associative cache.
///
/// Direct-mapped, set-associative and banked caches are all instances of
/// this one engine, differing only in their [`config::Cache`].
#[derive(Debug)]
pub struct Cache<M> {
    config: config::Cache,
    geometry: config::Geometry,
    decoder: AddressDecoder,
    tag_array: TagArray,
    replacement: Box<dyn ReplacementPolicy>,
    memory: M,
    fill_buffer: Box<[u8]>,
    state: State,
    stats: Stats,
}

impl<M> std::fmt::Display for Cache<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Cache({})", self.config)
    }
}

impl<M> Cache<M>
where
    M: BackingMemory,
{
    pub fn new(config: config::Cache, memory: M) -> Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        if memory.size() == 0 || memory.size() % geometry.line_size != 0 {
            return Err(ConfigError::MemorySize {
                memory_size: memory.size(),
                line_size: geometry.line_size,
            });
        }
        let replacement = Lru::new(geometry.num_sets(), geometry.associativity);
        log::debug!(
            "new cache {} with {} sets ({} per bank)",
            config,
            geometry.num_sets(),
            geometry.sets_per_bank
        );
        Ok(Self {
            decoder: AddressDecoder::new(&geometry),
            tag_array: TagArray::new(&geometry),
            replacement: Box::new(replacement),
            fill_buffer: vec![0; geometry.line_size].into_boxed_slice(),
            memory,
            state: State::Idle,
            stats: Stats::default(),
            config,
            geometry,
        })
    }

    /// Replace the replacement policy.
    ///
    /// Should be called before the first access.
    #[must_use]
    pub fn with_replacement_policy(self, policy: impl ReplacementPolicy) -> Self {
        Self {
            replacement: Box::new(policy),
            ..self
        }
    }

    /// Process a single request to completion.
    ///
    /// Misses write back a dirty victim and refill the line from backing
    /// memory before the request is served from the cache.
    pub fn access(&mut self, req: &Request) -> Result<Response, AccessError> {
        log::trace!("cache::access({})", req);
        self.state = State::Decoding;
        let result = self.process(req);
        self.state = State::Idle;
        match &result {
            Ok(resp) => log::trace!("cache::access({}) => {}", req, resp),
            Err(err) => log::debug!("cache::access({}) failed: {}", req, err),
        }
        result
    }

    fn validate(&self, req: &Request) -> Result<DecodedAddress, AccessError> {
        if req.len as usize > WORD_SIZE {
            return Err(AccessError::InvalidLength { len: req.len });
        }
        let len = req.num_bytes();
        let size = self.memory.size();
        let in_range = req
            .addr
            .checked_add(len as u64)
            .is_some_and(|end| end <= size as u64);
        if !in_range {
            return Err(AccessError::OutOfRange {
                addr: req.addr,
                len,
                size,
            });
        }
        let decoded = self.decoder.decode(req.addr);
        if decoded.offset as usize + len > self.geometry.line_size {
            return Err(AccessError::CrossesLine {
                addr: req.addr,
                len,
                line_size: self.geometry.line_size,
            });
        }
        Ok(decoded)
    }

    fn process(&mut self, req: &Request) -> Result<Response, AccessError> {
        let decoded = self.validate(req)?;
        let set = decoded.set_id();
        let offset = decoded.offset as usize;
        let len = req.num_bytes();
        log::trace!("{} decoded to {}", req, decoded);

        self.state = State::Lookup;
        let way = self.tag_array.lookup(set, decoded.tag);
        let status = if way.is_some() {
            RequestStatus::HIT
        } else {
            RequestStatus::MISS
        };

        let (way, data) = match req.kind {
            Kind::Read | Kind::Write => {
                let way = match way {
                    Some(way) => {
                        self.state = State::HitPath;
                        self.touch(set, way);
                        way
                    }
                    None => {
                        self.state = State::MissPath;
                        self.refill(set, &decoded, req)?
                    }
                };
                let data = if req.kind == Kind::Read {
                    if !self.tag_array.get_block(set, way).is_filled(offset, len) {
                        self.fill(set, way, req)?;
                    }
                    let mut word = [0; WORD_SIZE];
                    word[..len].copy_from_slice(self.tag_array.read(set, way, offset, len));
                    u32::from_le_bytes(word)
                } else {
                    let bytes = req.data.to_le_bytes();
                    self.tag_array.write(set, way, offset, &bytes[..len]);
                    0
                };
                (way, data)
            }
            Kind::WriteInit => {
                let way = match way {
                    Some(way) => {
                        self.state = State::HitPath;
                        way
                    }
                    None => {
                        self.state = State::MissPath;
                        self.install_empty(set, &decoded, req)?
                    }
                };
                let bytes = req.data.to_le_bytes();
                self.tag_array.write(set, way, offset, &bytes[..len]);
                if self.config.write_init_policy == WriteInitPolicy::WriteThrough {
                    let line = self.tag_array.get_block(set, way);
                    let block_addr = self.decoder.block_addr(req.addr);
                    log::debug!("write-init: write through {} to {:#x}", line, block_addr);
                    self.memory
                        .store_line_masked(block_addr, &line.data, &line.byte_mask)?;
                    self.tag_array.mark_clean(set, way);
                    self.stats.writebacks += 1;
                }
                self.touch(set, way);
                (way, 0)
            }
        };

        self.state = State::Responding;
        self.stats.inc(req.kind, status);
        let hit = req.kind != Kind::WriteInit && status == RequestStatus::HIT;
        log::trace!("{} served from set {} way {} ({:?})", req, set, way, status);
        Ok(Response::new(req, hit, data))
    }

    fn touch(&mut self, set: SetId, way: usize) {
        let set_number = self.tag_array.set_number(set);
        self.replacement.touch(set_number, way);
    }

    /// Choose the victim way of a set and write it back if it is dirty.
    fn evict(&mut self, set: SetId) -> Result<usize, mem::Error> {
        let way = self.replacement.victim(self.tag_array.set_number(set));
        if let Some(evicted) = self.tag_array.evict_if_dirty(set, way) {
            let addr = self.decoder.line_addr(evicted.tag, set);
            log::debug!(
                "evict dirty line {:#x} from set {} way {}",
                addr,
                set,
                way
            );
            self.memory
                .store_line_masked(addr, &evicted.data, &evicted.byte_mask)?;
            self.stats.writebacks += 1;
        }
        if self.tag_array.get_block(set, way).is_valid() {
            self.stats.evictions += 1;
        }
        Ok(way)
    }

    /// Bring the line of a missed request into the cache.
    fn refill(
        &mut self,
        set: SetId,
        decoded: &DecodedAddress,
        req: &Request,
    ) -> Result<usize, mem::Error> {
        let way = self.evict(set)?;
        let block_addr = self.decoder.block_addr(req.addr);
        log::debug!(
            "{} missed: fetch line {:#x} into set {} way {}",
            req,
            block_addr,
            set,
            way
        );
        self.memory.fetch_line(block_addr, &mut self.fill_buffer)?;
        self.stats.fetches += 1;
        self.tag_array
            .install(set, way, decoded.tag, Some(&self.fill_buffer[..]));
        self.touch(set, way);
        Ok(way)
    }

    /// Complete a resident line whose requested bytes were never written.
    ///
    /// Such lines were installed by a write-init miss. Bytes written since
    /// then are kept.
    fn fill(&mut self, set: SetId, way: usize, req: &Request) -> Result<(), mem::Error> {
        let block_addr = self.decoder.block_addr(req.addr);
        log::debug!(
            "{} reads unknown bytes: fill line {:#x} in set {} way {}",
            req,
            block_addr,
            set,
            way
        );
        self.memory.fetch_line(block_addr, &mut self.fill_buffer)?;
        self.stats.fetches += 1;
        self.tag_array.fill(set, way, &self.fill_buffer);
        Ok(())
    }

    /// Make room for a write-init miss without reading backing memory.
    ///
    /// The installed line knows none of its bytes until they are written
    /// or filled.
    fn install_empty(
        &mut self,
        set: SetId,
        decoded: &DecodedAddress,
        req: &Request,
    ) -> Result<usize, mem::Error> {
        let way = self.evict(set)?;
        let block_addr = self.decoder.block_addr(req.addr);
        log::debug!(
            "{} missed: install empty line {:#x} into set {} way {}",
            req,
            block_addr,
            set,
            way
        );
        self.tag_array.install(set, way, decoded.tag, None);
        Ok(way)
    }

    /// Write every dirty line back to memory.
    ///
    /// Lines stay resident and become clean.
    ///
    /// # Returns
    /// The number of lines written back.
    pub fn flush(&mut self) -> Result<usize, mem::Error> {
        let memory = &mut self.memory;
        let decoder = &self.decoder;
        let flushed = self.tag_array.flush(|set, line| {
            let addr = decoder.line_addr(line.tag, set);
            memory.store_line_masked(addr, &line.data, &line.byte_mask)
        })?;
        self.stats.writebacks += flushed;
        log::debug!("flushed {} dirty lines", flushed);
        Ok(flushed)
    }

    /// Drop all lines without writing them back and reset recency.
    pub fn invalidate(&mut self) {
        self.tag_array.invalidate();
        self.replacement.reset();
    }

    /// Way holding the line of `addr`, if resident.
    ///
    /// Does not update recency or statistics.
    #[must_use]
    pub fn probe(&self, addr: crate::address) -> Option<usize> {
        let decoded = self.decoder.decode(addr);
        self.tag_array.lookup(decoded.set_id(), decoded.tag)
    }

    /// Whether the line of `addr` is resident and dirty.
    #[must_use]
    pub fn is_dirty(&self, addr: crate::address) -> bool {
        let decoded = self.decoder.decode(addr);
        let set = decoded.set_id();
        self.tag_array
            .lookup(set, decoded.tag)
            .is_some_and(|way| self.tag_array.get_block(set, way).is_modified())
    }

    #[must_use]
    pub fn decode(&self, addr: crate::address) -> DecodedAddress {
        self.decoder.decode(addr)
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    #[must_use]
    pub fn config(&self) -> &config::Cache {
        &self.config
    }

    #[must_use]
    pub fn geometry(&self) -> &config::Geometry {
        &self.geometry
    }

    #[must_use]
    pub fn tag_array(&self) -> &TagArray {
        &self.tag_array
    }

    #[must_use]
    pub fn backing(&self) -> &M {
        &self.memory
    }

    /// Direct access to backing memory, bypassing the cache.
    pub fn backing_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn into_backing(self) -> M {
        self.memory
    }
}
