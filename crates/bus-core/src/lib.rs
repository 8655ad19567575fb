//! Memory-mapped address space dispatch and device bus wiring for hardware
//! emulators.
//!
//! A machine is assembled in two phases. At configuration time,
//! [`AddressSpaceBuilder`] installs RAM, ROM, bank windows, device handlers,
//! and holes into per-direction range tables, validating geometry eagerly;
//! [`MachineBuilder`] then registers the built spaces, wires forwarding
//! windows between them, and validates the whole bus graph at
//! [`MachineBuilder::freeze`]. At run time, dispatch resolves each access
//! through a page-granular decode cache (falling back to an exact scan for
//! ambiguous pages), converts between CPU access width and device
//! granularity via byte-lane extraction and read-modify-write merges, and
//! soft-fails unmapped accesses as open bus.
//!
//! Machines are single-threaded by construction: spaces, storage segments,
//! and handlers are shared with `Rc`/`RefCell`, one machine per thread.

pub mod bank;
pub mod device;
pub mod error;
pub mod graph;
pub mod map;
pub mod segment;
pub mod space;
pub mod width;

pub use bank::{BankPolicy, BankSelector};
pub use device::{shared_handler, BusHandler, SharedHandler};
pub use error::{AccessError, BankError, ConfigError};
pub use graph::{Machine, MachineBuilder, SpaceHandle};
pub use map::{Direction, HandlerEntry, RangeTable, TargetKind};
pub use segment::{SharedSegment, ROM_FILL};
pub use space::{AddressSpace, AddressSpaceBuilder, MapEntryReport, SpaceConfig};
pub use width::{AccessWidth, Endianness, WIDTH_TIERS, WIDTH_TIER_COUNT};

// Dev-dependencies exercised by the integration suites.
#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
