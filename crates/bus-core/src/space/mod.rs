//! Address spaces: configuration, installation, and the dispatch core.

mod builder;

pub use builder::AddressSpaceBuilder;

use std::cell::RefCell;
use std::rc::Rc;

use crate::bank::BankSelector;
use crate::device::SharedHandler;
use crate::error::{AccessError, BankError, ConfigError};
use crate::map::{
    validate_geometry, DecodeCache, Direction, DirectionMap, HandlerEntry, HandlerId, PageSlot,
    SegmentId, Target, TargetKind, DIRECTION_COUNT,
};
use crate::segment::SharedSegment;
use crate::width::{
    combine_halves, extract_lanes, merge_lanes, split_halves, AccessWidth, Endianness,
};

/// Shape of one address space, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SpaceConfig {
    /// Name of the device owning the space, e.g. `maincpu`.
    pub device: String,
    /// Name of the space within its device, e.g. `program` or `io`.
    pub name: String,
    /// Widest access the space accepts.
    pub native_width: AccessWidth,
    /// Byte-lane convention for sub-native and split accesses.
    pub endianness: Endianness,
    /// Addresses are AND-ed with this mask before decode; it bounds the
    /// decodable region and makes out-of-range addresses wrap.
    pub addr_mask: u64,
    /// Value returned (masked to the access width) by unmapped reads.
    pub open_bus: u64,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            device: "maincpu".to_owned(),
            name: "program".to_owned(),
            native_width: AccessWidth::Byte,
            endianness: Endianness::Little,
            addr_mask: 0xFFFF,
            open_bus: u64::MAX,
        }
    }
}

/// One row of a map report: an installed entry in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MapEntryReport {
    /// Direction the entry serves.
    pub direction: Direction,
    /// Inclusive start address.
    pub start: u64,
    /// Inclusive end address.
    pub end: u64,
    /// Installed width tier.
    pub width: AccessWidth,
    /// Mirror mask, zero when unmirrored.
    pub mirror: u64,
    /// Target classification.
    pub kind: TargetKind,
}

#[derive(Debug)]
struct BankBinding {
    selector: BankSelector,
    pages: Vec<SegmentId>,
}

/// A memory-mapped address space: per-direction range tables, their decode
/// caches, and the arenas backing installed targets.
///
/// Built through [`AddressSpaceBuilder`]; once built, the map is immutable
/// and only dispatch (and bank selection through [`BankSelector`] handles)
/// mutates state.
pub struct AddressSpace {
    config: SpaceConfig,
    maps: [DirectionMap; DIRECTION_COUNT],
    caches: [DecodeCache; DIRECTION_COUNT],
    segments: Vec<SharedSegment>,
    handlers: Vec<SharedHandler>,
    banks: Vec<BankBinding>,
    next_seq: u64,
}

impl AddressSpace {
    pub(crate) fn new(config: SpaceConfig) -> Self {
        let caches = [
            DecodeCache::new(config.addr_mask),
            DecodeCache::new(config.addr_mask),
        ];
        Self {
            config,
            maps: [DirectionMap::default(), DirectionMap::default()],
            caches,
            segments: Vec::new(),
            handlers: Vec::new(),
            banks: Vec::new(),
            next_seq: 0,
        }
    }

    /// The space's construction-time shape.
    #[must_use]
    pub const fn config(&self) -> &SpaceConfig {
        &self.config
    }

    /// Reads a `width`-wide value at `addr`.
    ///
    /// The address is masked by the space's address mask before decode.
    /// Unmapped addresses read back the configured open-bus constant; that
    /// is deliberate soft-fail behavior, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnsupportedWidth`] when `width` is wider than
    /// the space's native width.
    pub fn read(&mut self, addr: u64, width: AccessWidth) -> Result<u64, AccessError> {
        self.check_width(addr, width)?;
        self.read_at(addr & self.config.addr_mask, width)
    }

    /// Writes a `width`-wide value at `addr`.
    ///
    /// Unmapped and read-only addresses discard the write silently (traced,
    /// never an error), matching open-bus hardware behavior.
    ///
    /// # Errors
    ///
    /// Returns [`AccessError::UnsupportedWidth`] when `width` is wider than
    /// the space's native width.
    pub fn write(&mut self, addr: u64, width: AccessWidth, value: u64) -> Result<(), AccessError> {
        self.check_width(addr, width)?;
        self.write_at(addr & self.config.addr_mask, width, value)
    }

    /// Selects the page a bank window exposes, by bank identifier. The
    /// identifier is the one carried by the [`BankSelector`] returned at
    /// install time.
    ///
    /// # Errors
    ///
    /// Returns [`BankError::UnknownBank`] for an uninstalled identifier, and
    /// [`BankError::OutOfRange`] per the bank's policy.
    pub fn select_bank(&self, bank: usize, page: usize) -> Result<usize, BankError> {
        let Some(binding) = self.banks.get(bank) else {
            return Err(BankError::UnknownBank {
                bank,
                banks: self.banks.len(),
            });
        };
        binding.selector.select(page)
    }

    /// Installed entries for one direction in priority order, lowest first.
    #[must_use]
    pub fn map_report(&self, direction: Direction) -> Vec<MapEntryReport> {
        self.maps[direction.index()]
            .entries_by_seq()
            .into_iter()
            .map(|(_, _, entry)| MapEntryReport {
                direction,
                start: entry.start(),
                end: entry.end(),
                width: entry.width(),
                mirror: entry.mirror(),
                kind: entry.kind(),
            })
            .collect()
    }

    fn check_width(&self, addr: u64, width: AccessWidth) -> Result<(), AccessError> {
        if width.bytes() > self.config.native_width.bytes() {
            return Err(AccessError::UnsupportedWidth {
                device: self.config.device.clone(),
                space: self.config.name.clone(),
                addr,
                width,
                native: self.config.native_width,
            });
        }
        Ok(())
    }

    fn read_at(&self, addr: u64, width: AccessWidth) -> Result<u64, AccessError> {
        let Some(entry) = self.resolve(Direction::Read, addr) else {
            tracing::trace!(
                device = %self.config.device,
                space = %self.config.name,
                addr = format_args!("{addr:#X}"),
                width = %width,
                "unmapped read, returning open bus"
            );
            return Ok(self.config.open_bus & width.value_mask());
        };

        if width.bytes() > entry.width().bytes() || !entry.fits(addr, width) {
            return self.read_split(addr, width);
        }

        match &entry.target {
            Target::Ram(segment) | Target::Rom(segment) => Ok(self.segments[segment.0]
                .read_value(entry.local_offset(addr), width, self.config.endianness)),
            Target::Bank(bank) => {
                let binding = &self.banks[bank.0];
                let page = binding.pages[binding.selector.current()];
                Ok(self.segments[page.0].read_value(
                    entry.local_offset(addr),
                    width,
                    self.config.endianness,
                ))
            }
            Target::Device(handler) => Ok(self.device_read(entry, &self.handlers[handler.0], addr, width)),
            Target::Hole => {
                tracing::trace!(
                    device = %self.config.device,
                    space = %self.config.name,
                    addr = format_args!("{addr:#X}"),
                    width = %width,
                    "read from hole, returning open bus"
                );
                Ok(self.config.open_bus & width.value_mask())
            }
            Target::SubBus { space, base } => {
                self.forwarded_read(entry, space, *base, addr, width)
            }
        }
    }

    fn write_at(&self, addr: u64, width: AccessWidth, value: u64) -> Result<(), AccessError> {
        let Some(entry) = self.resolve(Direction::Write, addr) else {
            tracing::trace!(
                device = %self.config.device,
                space = %self.config.name,
                addr = format_args!("{addr:#X}"),
                width = %width,
                value = format_args!("{value:#X}"),
                "unmapped write discarded"
            );
            return Ok(());
        };

        if width.bytes() > entry.width().bytes() || !entry.fits(addr, width) {
            return self.write_split(addr, width, value);
        }

        match &entry.target {
            Target::Ram(segment) => {
                self.segments[segment.0].write_value(
                    entry.local_offset(addr),
                    width,
                    self.config.endianness,
                    value,
                );
                Ok(())
            }
            Target::Rom(_) => {
                tracing::trace!(
                    device = %self.config.device,
                    space = %self.config.name,
                    addr = format_args!("{addr:#X}"),
                    value = format_args!("{value:#X}"),
                    "write to rom discarded"
                );
                Ok(())
            }
            Target::Bank(bank) => {
                let binding = &self.banks[bank.0];
                let page = binding.pages[binding.selector.current()];
                self.segments[page.0].write_value(
                    entry.local_offset(addr),
                    width,
                    self.config.endianness,
                    value,
                );
                Ok(())
            }
            Target::Device(handler) => {
                self.device_write(entry, &self.handlers[handler.0], addr, width, value);
                Ok(())
            }
            Target::Hole => {
                tracing::trace!(
                    device = %self.config.device,
                    space = %self.config.name,
                    addr = format_args!("{addr:#X}"),
                    value = format_args!("{value:#X}"),
                    "write to hole discarded"
                );
                Ok(())
            }
            Target::SubBus { space, base } => {
                self.forwarded_write(entry, space, *base, addr, width, value)
            }
        }
    }

    /// Splits a read into two half-width reads and recombines them per the
    /// space's lane convention. Used when the request is wider than the
    /// matched entry or straddles its window.
    fn read_split(&self, addr: u64, width: AccessWidth) -> Result<u64, AccessError> {
        let Some(half) = width.half() else {
            return Ok(self.config.open_bus & width.value_mask());
        };
        let low_addr = self.read_at(addr, half)?;
        let high_addr =
            self.read_at(addr.wrapping_add(half.bytes()) & self.config.addr_mask, half)?;
        Ok(combine_halves(
            self.config.endianness,
            half,
            low_addr,
            high_addr,
        ))
    }

    fn write_split(&self, addr: u64, width: AccessWidth, value: u64) -> Result<(), AccessError> {
        let Some(half) = width.half() else {
            return Ok(());
        };
        let (low_addr, high_addr) = split_halves(self.config.endianness, half, value);
        self.write_at(addr, half, low_addr)?;
        self.write_at(
            addr.wrapping_add(half.bytes()) & self.config.addr_mask,
            half,
            high_addr,
        )
    }

    /// Device read at the entry's granularity, extracting the requested
    /// lanes when the CPU access is narrower than the device cell.
    fn device_read(
        &self,
        entry: &HandlerEntry,
        handler: &SharedHandler,
        addr: u64,
        width: AccessWidth,
    ) -> u64 {
        let cell = entry.width();
        let aligned = addr & !(cell.bytes() - 1);
        let offset = entry.local_offset(aligned);
        if width == cell {
            return handler.borrow_mut().read(offset, cell) & cell.value_mask();
        }
        let wide = handler.borrow_mut().read(offset, cell);
        extract_lanes(self.config.endianness, cell, width, addr - aligned, wide)
    }

    /// Device write at the entry's granularity. Narrow CPU writes become a
    /// read-modify-write so only the addressed lanes change.
    fn device_write(
        &self,
        entry: &HandlerEntry,
        handler: &SharedHandler,
        addr: u64,
        width: AccessWidth,
        value: u64,
    ) {
        let cell = entry.width();
        let aligned = addr & !(cell.bytes() - 1);
        let offset = entry.local_offset(aligned);
        if width == cell {
            handler.borrow_mut().write(offset, cell, value & cell.value_mask());
            return;
        }
        let mut device = handler.borrow_mut();
        let wide = device.read(offset, cell);
        let merged = merge_lanes(
            self.config.endianness,
            cell,
            width,
            addr - aligned,
            wide,
            value,
        );
        device.write(offset, cell, merged);
    }

    fn forwarded_read(
        &self,
        entry: &HandlerEntry,
        space: &Rc<RefCell<AddressSpace>>,
        base: u64,
        addr: u64,
        width: AccessWidth,
    ) -> Result<u64, AccessError> {
        let mut target = space.borrow_mut();
        if width.bytes() > target.config.native_width.bytes() {
            drop(target);
            return self.read_split(addr, width);
        }
        target.read(base + entry.local_offset(addr), width)
    }

    fn forwarded_write(
        &self,
        entry: &HandlerEntry,
        space: &Rc<RefCell<AddressSpace>>,
        base: u64,
        addr: u64,
        width: AccessWidth,
        value: u64,
    ) -> Result<(), AccessError> {
        let mut target = space.borrow_mut();
        if width.bytes() > target.config.native_width.bytes() {
            drop(target);
            return self.write_split(addr, width, value);
        }
        target.write(base + entry.local_offset(addr), width, value)
    }

    /// Resolves the winning entry for a masked address, through the decode
    /// cache when the page is unambiguous and by exact scan otherwise.
    fn resolve(&self, direction: Direction, addr: u64) -> Option<&HandlerEntry> {
        let map = &self.maps[direction.index()];
        match self.caches[direction.index()].lookup(addr) {
            PageSlot::Resolved { tier, index } => {
                Some(map.entry_at(usize::from(tier), index_to_usize(index)))
            }
            PageSlot::NeedsScan => map.scan(addr),
            PageSlot::Unmapped => None,
        }
    }

    /// Exact-scan resolution bypassing the decode cache; the cache must
    /// always agree with this.
    #[cfg(test)]
    fn resolve_by_scan(&self, direction: Direction, addr: u64) -> Option<&HandlerEntry> {
        self.maps[direction.index()].scan(addr)
    }

    pub(crate) fn add_segment(&mut self, segment: SharedSegment) -> SegmentId {
        self.segments.push(segment);
        SegmentId(self.segments.len() - 1)
    }

    pub(crate) fn add_handler(&mut self, handler: SharedHandler) -> HandlerId {
        self.handlers.push(handler);
        HandlerId(self.handlers.len() - 1)
    }

    pub(crate) fn add_bank(&mut self, selector: BankSelector, pages: Vec<SegmentId>) {
        self.banks.push(BankBinding { selector, pages });
    }

    pub(crate) fn bank_count(&self) -> usize {
        self.banks.len()
    }

    /// Installs a validated entry in one direction and eagerly rebuilds the
    /// direction's decode cache.
    pub(crate) fn install(
        &mut self,
        direction: Direction,
        start: u64,
        end: u64,
        width: AccessWidth,
        mirror: u64,
        target: Target,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let index = direction.index();
        self.maps[index].install(HandlerEntry {
            start,
            end,
            width,
            mirror,
            seq,
            target,
        });
        self.caches[index].rebuild(&self.maps[index]);
    }

    /// Installs a pass-through window into another space. Only reachable
    /// through the machine builder, which validates the resulting graph.
    pub(crate) fn install_forward(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        space: &Rc<RefCell<AddressSpace>>,
        base: u64,
    ) -> Result<(), ConfigError> {
        validate_geometry(
            start,
            end,
            self.config.native_width,
            mirror,
            self.config.native_width,
            self.config.addr_mask,
        )?;
        for direction in [Direction::Read, Direction::Write] {
            self.install(
                direction,
                start,
                end,
                self.config.native_width,
                mirror,
                Target::SubBus {
                    space: Rc::clone(space),
                    base,
                },
            );
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn index_to_usize(index: u32) -> usize {
    index as usize
}
