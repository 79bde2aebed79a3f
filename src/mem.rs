use crate::{address, config, WORD_SIZE};
use bitvec::slice::BitSlice;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("access of {len} bytes at {addr:#x} exceeds memory of {size} bytes")]
    OutOfRange { addr: address, len: usize, size: usize },

    #[error("address {addr:#x} is not aligned to {align} bytes")]
    Unaligned { addr: address, align: usize },
}

/// Line-granular memory behind a cache.
///
/// The cache only moves whole lines: fetches on a miss and stores when a
/// dirty line is written back or flushed.
pub trait BackingMemory: std::fmt::Debug {
    /// Fill `buf` with the bytes starting at `addr`.
    fn fetch_line(&mut self, addr: address, buf: &mut [u8]) -> Result<(), Error>;

    /// Write `data` to memory starting at `addr`.
    fn store_line(&mut self, addr: address, data: &[u8]) -> Result<(), Error>;

    /// Write only the bytes of `data` selected by `mask`.
    ///
    /// Memory keeps its content where the mask is unset. The provided
    /// implementation merges with the current line and stores all of it.
    fn store_line_masked(
        &mut self,
        addr: address,
        data: &[u8],
        mask: &BitSlice,
    ) -> Result<(), Error> {
        if mask.all() {
            return self.store_line(addr, data);
        }
        let mut line = vec![0; data.len()];
        self.fetch_line(addr, &mut line)?;
        for i in mask.iter_ones() {
            line[i] = data[i];
        }
        self.store_line(addr, &line)
    }

    /// Size of the memory in bytes.
    fn size(&self) -> usize;
}

impl<M> BackingMemory for &mut M
where
    M: BackingMemory + ?Sized,
{
    fn fetch_line(&mut self, addr: address, buf: &mut [u8]) -> Result<(), Error> {
        (**self).fetch_line(addr, buf)
    }

    fn store_line(&mut self, addr: address, data: &[u8]) -> Result<(), Error> {
        (**self).store_line(addr, data)
    }

    fn store_line_masked(
        &mut self,
        addr: address,
        data: &[u8],
        mask: &BitSlice,
    ) -> Result<(), Error> {
        (**self).store_line_masked(addr, data, mask)
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

impl<M> BackingMemory for Box<M>
where
    M: BackingMemory + ?Sized,
{
    fn fetch_line(&mut self, addr: address, buf: &mut [u8]) -> Result<(), Error> {
        (**self).fetch_line(addr, buf)
    }

    fn store_line(&mut self, addr: address, data: &[u8]) -> Result<(), Error> {
        (**self).store_line(addr, data)
    }

    fn store_line_masked(
        &mut self,
        addr: address,
        data: &[u8],
        mask: &BitSlice,
    ) -> Result<(), Error> {
        (**self).store_line_masked(addr, data, mask)
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}

/// Flat, zero-initialized byte-addressable memory.
#[derive(Clone, PartialEq, Eq)]
pub struct FlatMemory {
    data: Vec<u8>,
    num_fetches: usize,
    num_stores: usize,
}

impl std::fmt::Debug for FlatMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("FlatMemory")
            .field("size", &self.data.len())
            .field("num_fetches", &self.num_fetches)
            .field("num_stores", &self.num_stores)
            .finish()
    }
}

impl Default for FlatMemory {
    fn default() -> Self {
        Self::new(config::DEFAULT_MEMORY_SIZE)
    }
}

impl FlatMemory {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            num_fetches: 0,
            num_stores: 0,
        }
    }

    fn range(&self, addr: address, len: usize) -> Result<std::ops::Range<usize>, Error> {
        let size = self.data.len();
        let out_of_range = Error::OutOfRange { addr, len, size };
        let start = usize::try_from(addr).map_err(|_| out_of_range.clone())?;
        let end = start.checked_add(len).ok_or(out_of_range.clone())?;
        if end > size {
            return Err(out_of_range);
        }
        Ok(start..end)
    }

    /// Copy `data` into memory at `addr` without counting it as a store.
    pub fn preload(&mut self, addr: address, data: &[u8]) -> Result<(), Error> {
        let range = self.range(addr, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    /// Seed memory with `(addr, word)` pairs.
    pub fn preload_words(&mut self, words: &[(address, u32)]) -> Result<(), Error> {
        for (addr, value) in words {
            self.write_word(*addr, *value)?;
        }
        Ok(())
    }

    /// Bytes at `addr`, bypassing any cache.
    pub fn bytes(&self, addr: address, len: usize) -> Result<&[u8], Error> {
        let range = self.range(addr, len)?;
        Ok(&self.data[range])
    }

    pub fn read_word(&self, addr: address) -> Result<u32, Error> {
        if addr % WORD_SIZE as u64 != 0 {
            return Err(Error::Unaligned {
                addr,
                align: WORD_SIZE,
            });
        }
        let bytes = self.bytes(addr, WORD_SIZE)?;
        let mut word = [0; WORD_SIZE];
        word.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_word(&mut self, addr: address, value: u32) -> Result<(), Error> {
        if addr % WORD_SIZE as u64 != 0 {
            return Err(Error::Unaligned {
                addr,
                align: WORD_SIZE,
            });
        }
        self.preload(addr, &value.to_le_bytes())
    }

    #[must_use]
    pub fn num_fetches(&self) -> usize {
        self.num_fetches
    }

    #[must_use]
    pub fn num_stores(&self) -> usize {
        self.num_stores
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl BackingMemory for FlatMemory {
    fn fetch_line(&mut self, addr: address, buf: &mut [u8]) -> Result<(), Error> {
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        self.num_fetches += 1;
        log::trace!("mem: fetch {} bytes at {:#x}", buf.len(), addr);
        Ok(())
    }

    fn store_line(&mut self, addr: address, data: &[u8]) -> Result<(), Error> {
        let range = self.range(addr, data.len())?;
        self.data[range].copy_from_slice(data);
        self.num_stores += 1;
        log::trace!("mem: store {} bytes at {:#x}", data.len(), addr);
        Ok(())
    }

    fn store_line_masked(
        &mut self,
        addr: address,
        data: &[u8],
        mask: &BitSlice,
    ) -> Result<(), Error> {
        let range = self.range(addr, data.len())?;
        let line = &mut self.data[range];
        for i in mask.iter_ones() {
            line[i] = data[i];
        }
        self.num_stores += 1;
        log::trace!(
            "mem: store {} of {} bytes at {:#x}",
            mask.count_ones(),
            data.len(),
            addr
        );
        Ok(())
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}
