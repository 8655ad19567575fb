//! Device delegate contract consumed by address-space dispatch.

use std::cell::RefCell;
use std::rc::Rc;

use crate::width::AccessWidth;

/// Capability object a device registers for the register block it owns.
///
/// The dispatcher calls these methods synchronously. `offset` is the byte
/// distance from the installed range's start, stripped of mirror bits and
/// aligned down to the declared granularity; `width` always equals
/// [`BusHandler::granularity`]. Narrower CPU accesses are converted by the
/// dispatcher through a read-modify-write lane merge, wider ones are split
/// into multiple granularity-wide calls.
pub trait BusHandler {
    /// Widest access the device decodes natively.
    fn granularity(&self) -> AccessWidth;

    /// Reads a `width`-wide value at `offset`.
    fn read(&mut self, offset: u64, width: AccessWidth) -> u64;

    /// Writes a `width`-wide value at `offset`.
    fn write(&mut self, offset: u64, width: AccessWidth, value: u64);
}

/// Shared handle to a registered handler object.
///
/// Handlers are shared between the address space that dispatches into them
/// and the device model that owns their state, on the single-threaded
/// `Rc`/`RefCell` machine model.
pub type SharedHandler = Rc<RefCell<dyn BusHandler>>;

/// Wraps a handler object into a [`SharedHandler`].
#[must_use]
pub fn shared_handler<H: BusHandler + 'static>(handler: H) -> SharedHandler {
    Rc::new(RefCell::new(handler))
}
