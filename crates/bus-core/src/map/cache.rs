//! Page-granular decode cache accelerating the dispatch hot path.
//!
//! The cache is a pure performance layer: every lookup either resolves to
//! the same entry an exact reverse scan of the range tables would find, or
//! punts back to that scan. Pages whose addresses do not all resolve to one
//! entry are marked for scanning rather than decoded per address.

use crate::map::table::DirectionMap;

/// Smallest page granularity the cache will use.
pub const MIN_PAGE_SHIFT: u32 = 8;

/// Upper bound on decode pages per direction; the page size grows with the
/// address mask so the slot array never exceeds this.
pub const MAX_DECODE_PAGES: u64 = 1 << 16;

/// Decode state of one cache page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSlot {
    /// No entry matches any address in the page.
    Unmapped,
    /// Entries cover the page only partially or ambiguously.
    NeedsScan,
    /// Every address in the page resolves to this entry.
    Resolved { tier: u8, index: u32 },
}

/// Per-direction decode cache over masked addresses.
#[derive(Debug, Clone)]
pub struct DecodeCache {
    page_shift: u32,
    slots: Box<[PageSlot]>,
}

/// Page shift for a given address mask: byte pages up to 64 KiB spaces,
/// widening so the page count stays at [`MAX_DECODE_PAGES`] beyond that.
pub const fn page_shift_for_mask(addr_mask: u64) -> u32 {
    let addr_bits = 64 - addr_mask.leading_zeros();
    if addr_bits > MIN_PAGE_SHIFT + 16 {
        addr_bits - 16
    } else {
        MIN_PAGE_SHIFT
    }
}

impl DecodeCache {
    pub fn new(addr_mask: u64) -> Self {
        let page_shift = page_shift_for_mask(addr_mask);
        let pages = page_count(addr_mask, page_shift);
        Self {
            page_shift,
            slots: vec![PageSlot::Unmapped; pages].into_boxed_slice(),
        }
    }

    pub const fn page_shift(&self) -> u32 {
        self.page_shift
    }

    /// Looks up the decode state of the page holding the masked `addr`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn lookup(&self, addr: u64) -> PageSlot {
        self.slots[(addr >> self.page_shift) as usize]
    }

    /// Recomputes every page slot from the installed entries. Runs at
    /// configuration time, after each install.
    pub fn rebuild(&mut self, map: &DirectionMap) {
        self.slots.fill(PageSlot::Unmapped);
        let page_mask = (1_u64 << self.page_shift) - 1;

        // Walk entries lowest priority first so a later full cover simply
        // overwrites the slot.
        for (tier, index, entry) in map.entries_by_seq() {
            for (page, slot) in self.slots.iter_mut().enumerate() {
                let page_base = (page as u64) << self.page_shift;
                let fixed = page_base & !entry.mirror();
                let free = page_mask & !entry.mirror();
                // Stripped addresses within this page form exactly the set
                // {fixed | s : s subset of free}, bounded by:
                let lowest = fixed;
                let highest = fixed | free;

                if entry.start() <= lowest && highest <= entry.end() {
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        *slot = PageSlot::Resolved {
                            tier: tier as u8,
                            index: index as u32,
                        };
                    }
                } else if highest >= entry.start() && lowest <= entry.end() {
                    // Possible partial cover; exact resolution is left to
                    // the scan path.
                    *slot = PageSlot::NeedsScan;
                }
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn page_count(addr_mask: u64, page_shift: u32) -> usize {
    ((addr_mask >> page_shift) + 1) as usize
}
