//! Address map internals: handler entries, per-tier range tables, and the
//! page-granular decode cache.

mod cache;
mod entry;
mod table;

pub use entry::{Direction, HandlerEntry, TargetKind, DIRECTION_COUNT};
pub use table::RangeTable;

pub use cache::{MAX_DECODE_PAGES, MIN_PAGE_SHIFT};

pub(crate) use cache::{DecodeCache, PageSlot};
pub(crate) use entry::{
    validate_device_alignment, validate_geometry, BankId, HandlerId, SegmentId, Target,
};
pub(crate) use table::DirectionMap;
