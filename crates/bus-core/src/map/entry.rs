//! Handler entries: one bound unit of address range, width, and target.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ConfigError;
use crate::space::AddressSpace;
use crate::width::AccessWidth;

/// Number of bus access directions.
pub const DIRECTION_COUNT: usize = 2;

/// Direction of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// CPU-visible load path.
    Read,
    /// CPU-visible store path.
    Write,
}

impl Direction {
    /// Returns the index into per-direction tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Read => 0,
            Self::Write => 1,
        }
    }
}

/// Public classification of a handler entry's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TargetKind {
    /// Writable raw storage.
    Ram,
    /// Read-only raw storage; writes are discarded.
    Rom,
    /// Banked storage window resolved through a [`crate::BankSelector`].
    Bank,
    /// Device delegate handler.
    Device,
    /// Explicitly unmapped hole (open-bus reads, discarded writes).
    Hole,
    /// Pass-through into another address space.
    SubBus,
}

/// Index of a storage segment within its owning space's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentId(pub usize);

/// Index of a registered handler object within its owning space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(pub usize);

/// Index of a bank binding within its owning space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankId(pub usize);

/// Resolved dispatch target of a handler entry.
#[derive(Clone)]
pub enum Target {
    Ram(SegmentId),
    Rom(SegmentId),
    Bank(BankId),
    Device(HandlerId),
    Hole,
    SubBus {
        space: Rc<RefCell<AddressSpace>>,
        base: u64,
    },
}

impl Target {
    pub const fn kind(&self) -> TargetKind {
        match self {
            Self::Ram(_) => TargetKind::Ram,
            Self::Rom(_) => TargetKind::Rom,
            Self::Bank(_) => TargetKind::Bank,
            Self::Device(_) => TargetKind::Device,
            Self::Hole => TargetKind::Hole,
            Self::SubBus { .. } => TargetKind::SubBus,
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind())
    }
}

/// One immutable installed mapping: an inclusive address range, an access
/// width, an optional mirror mask, and a dispatch target.
///
/// A mirror mask `m` makes the entry match every alias reachable by OR-ing
/// any subset of `m` into the base range; matching strips the mirror bits
/// with `addr & !m` instead of enumerating aliases.
#[derive(Debug, Clone)]
pub struct HandlerEntry {
    pub(crate) start: u64,
    pub(crate) end: u64,
    pub(crate) width: AccessWidth,
    pub(crate) mirror: u64,
    pub(crate) seq: u64,
    pub(crate) target: Target,
}

impl HandlerEntry {
    /// Inclusive start address.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Inclusive end address.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Access width tier the entry was installed at.
    #[must_use]
    pub const fn width(&self) -> AccessWidth {
        self.width
    }

    /// Mirror mask, zero when the entry is not mirrored.
    #[must_use]
    pub const fn mirror(&self) -> u64 {
        self.mirror
    }

    /// Target classification.
    #[must_use]
    pub const fn kind(&self) -> TargetKind {
        self.target.kind()
    }

    /// Byte span of the base range.
    #[must_use]
    pub const fn span(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Returns `true` when `addr` (or one of its mirror aliases) falls in
    /// the base range.
    #[must_use]
    pub const fn matches(&self, addr: u64) -> bool {
        let base = addr & !self.mirror;
        base >= self.start && base <= self.end
    }

    /// Byte offset of `addr` from the range start, mirror bits stripped.
    /// Callers guarantee [`Self::matches`] holds.
    #[must_use]
    pub const fn local_offset(&self, addr: u64) -> u64 {
        (addr & !self.mirror) - self.start
    }

    /// Returns `true` when a `width`-wide access at `addr` lies entirely
    /// inside the base range. Callers guarantee [`Self::matches`] holds.
    pub(crate) const fn fits(&self, addr: u64, width: AccessWidth) -> bool {
        self.end - (addr & !self.mirror) >= width.bytes() - 1
    }
}

/// Validates install geometry against the owning space's shape.
pub const fn validate_geometry(
    start: u64,
    end: u64,
    width: AccessWidth,
    mirror: u64,
    native: AccessWidth,
    addr_mask: u64,
) -> Result<(), ConfigError> {
    if start > end {
        return Err(ConfigError::InvalidRange { start, end });
    }
    if start & !addr_mask != 0 || end & !addr_mask != 0 {
        return Err(ConfigError::RangeOutsideMask {
            start,
            end,
            addr_mask,
        });
    }
    if mirror & !addr_mask != 0 {
        return Err(ConfigError::MirrorOutsideMask { mirror, addr_mask });
    }
    if (start | end) & mirror != 0 {
        return Err(ConfigError::MirrorOverlapsRange { mirror, start, end });
    }
    if width.bytes() > native.bytes() {
        return Err(ConfigError::UnsupportedInstallWidth { width, native });
    }
    Ok(())
}

/// Validates that a device window is aligned to its access granularity and
/// spans a whole number of cells.
pub const fn validate_device_alignment(
    start: u64,
    end: u64,
    width: AccessWidth,
) -> Result<(), ConfigError> {
    let cell = width.bytes();
    if start % cell != 0 || (end - start + 1) % cell != 0 {
        return Err(ConfigError::MisalignedWindow { start, end, width });
    }
    Ok(())
}
