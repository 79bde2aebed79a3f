use crate::{address, config, tag_array::SetId};

/// Lowest and highest (exclusive) set bit positions of a mask.
///
/// An empty mask yields `(0, 0)`.
#[must_use]
pub fn mask_limit(mask: address) -> (u8, u8) {
    if mask == 0 {
        return (0, 0);
    }
    let low = mask.trailing_zeros() as u8;
    let high = (64 - mask.leading_zeros()) as u8;
    (low, high)
}

/// Contiguous bit field of an address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Mask {
    pub mask: address,
    pub low: u8,
    pub high: u8,
}

impl From<address> for Mask {
    fn from(mask: address) -> Self {
        let (low, high) = mask_limit(mask);
        Self { mask, low, high }
    }
}

impl std::fmt::Debug for Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut out = f.debug_struct("Mask");
        out.field("mask", &format!("{:016x}", self.mask));
        out.field("low", &self.low);
        out.field("high", &self.high);
        out.finish()
    }
}

impl Mask {
    /// Mask of `num_bits` bits starting at bit `low`.
    #[must_use]
    pub fn field(low: u32, num_bits: u32) -> Self {
        let ones = if num_bits >= 64 {
            address::MAX
        } else {
            (1 << num_bits) - 1
        };
        let mask = ones.checked_shl(low).unwrap_or(0);
        Self {
            mask,
            low: low as u8,
            high: (low + num_bits) as u8,
        }
    }

    #[inline]
    #[must_use]
    pub fn num_bits(&self) -> u32 {
        self.mask.count_ones()
    }

    /// Extract the field value of an address.
    #[inline]
    #[must_use]
    pub fn extract(&self, addr: address) -> u64 {
        (addr & self.mask) >> self.low
    }

    /// Place a field value at its position in an address.
    #[inline]
    #[must_use]
    pub fn insert(&self, value: u64) -> address {
        (value << self.low) & self.mask
    }
}

/// An address split into its cache fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecodedAddress {
    pub tag: u64,
    pub bank: u64,
    pub index: u64,
    pub offset: u64,
}

impl DecodedAddress {
    #[inline]
    #[must_use]
    pub fn set_id(&self) -> SetId {
        SetId {
            bank: self.bank,
            index: self.index,
        }
    }
}

impl std::fmt::Display for DecodedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "tag={:#x} bank={} index={} offset={}",
            self.tag, self.bank, self.index, self.offset
        )
    }
}

/// Splits byte addresses into `{tag, index, bank, offset}`.
///
/// From low to high bits: the byte offset within a line, the bank select
/// bits, the set index within the bank group, and the tag. Bank bits sit
/// between offset and index so that line-sized strides rotate through the
/// banks before they wrap around the sets of a bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressDecoder {
    pub offset: Mask,
    pub bank: Mask,
    pub index: Mask,
    tag_start: u32,
}

impl AddressDecoder {
    #[must_use]
    pub fn new(geometry: &config::Geometry) -> Self {
        let offset = Mask::field(0, geometry.line_size_log2);
        let bank = Mask::field(geometry.line_size_log2, geometry.bank_count_log2);
        let index = Mask::field(
            geometry.line_size_log2 + geometry.bank_count_log2,
            geometry.sets_per_bank_log2,
        );
        let tag_start =
            geometry.line_size_log2 + geometry.bank_count_log2 + geometry.sets_per_bank_log2;
        log::trace!(
            "address decoder: offset={:?} bank={:?} index={:?} tag starts at bit {}",
            offset,
            bank,
            index,
            tag_start
        );
        Self {
            offset,
            bank,
            index,
            tag_start,
        }
    }

    #[inline]
    #[must_use]
    pub fn decode(&self, addr: address) -> DecodedAddress {
        DecodedAddress {
            tag: addr.checked_shr(self.tag_start).unwrap_or(0),
            bank: self.bank.extract(addr),
            index: self.index.extract(addr),
            offset: self.offset.extract(addr),
        }
    }

    /// Address of the first byte of the line containing `addr`.
    #[inline]
    #[must_use]
    pub fn block_addr(&self, addr: address) -> address {
        addr & !self.offset.mask
    }

    /// Rebuild the block address of a line from its tag, bank and index.
    #[inline]
    #[must_use]
    pub fn line_addr(&self, tag: u64, set: SetId) -> address {
        tag.checked_shl(self.tag_start).unwrap_or(0)
            | self.index.insert(set.index)
            | self.bank.insert(set.bank)
    }

    #[inline]
    #[must_use]
    pub fn tag_start(&self) -> u32 {
        self.tag_start
    }
}
