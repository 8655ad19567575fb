//! Shared byte-storage segments backing RAM, ROM windows, and bank pages.
//!
//! Segments are reference-counted so one backing store can be installed into
//! several address spaces (dual-port and shared RAM patterns) and inspected
//! by front-ends without copying.

use std::cell::RefCell;
use std::rc::Rc;

use crate::width::{AccessWidth, Endianness};

/// Fill byte for ROM padding beyond the provided image.
pub const ROM_FILL: u8 = 0xFF;

/// A shared, byte-addressable storage segment.
///
/// Cloning shares the underlying bytes; all clones observe writes
/// immediately. Single-threaded by construction (`Rc`), matching the
/// one-machine-per-thread execution model.
#[derive(Debug, Clone)]
pub struct SharedSegment {
    bytes: Rc<RefCell<Box<[u8]>>>,
}

impl SharedSegment {
    /// Allocates a zero-filled segment of `len` bytes.
    #[must_use]
    pub fn zeroed(len: u64) -> Self {
        Self {
            bytes: Rc::new(RefCell::new(vec![0; to_usize(len)].into_boxed_slice())),
        }
    }

    /// Allocates a segment of `len` bytes holding `data`, padded with
    /// [`ROM_FILL`] when the image is shorter than the window.
    #[must_use]
    pub fn from_image(data: &[u8], len: u64) -> Self {
        let len = to_usize(len);
        let mut bytes = vec![ROM_FILL; len];
        let copied = data.len().min(len);
        bytes[..copied].copy_from_slice(&data[..copied]);
        Self {
            bytes: Rc::new(RefCell::new(bytes.into_boxed_slice())),
        }
    }

    /// Returns the segment length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.borrow().len() as u64
    }

    /// Returns `true` when the segment holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.borrow().is_empty()
    }

    /// Reads one byte at `offset`.
    #[must_use]
    pub fn peek(&self, offset: u64) -> u8 {
        self.bytes.borrow()[to_usize(offset)]
    }

    /// Writes one byte at `offset`.
    pub fn poke(&self, offset: u64, value: u8) {
        self.bytes.borrow_mut()[to_usize(offset)] = value;
    }

    /// Copies the segment contents out, for snapshots and assertions.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.borrow().to_vec()
    }

    /// Returns `true` when both handles share one backing store.
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Reads a `width`-wide value at byte `offset` using the given lane
    /// convention. Callers guarantee the access fits within the segment.
    pub(crate) fn read_value(&self, offset: u64, width: AccessWidth, endianness: Endianness) -> u64 {
        let bytes = self.bytes.borrow();
        let base = to_usize(offset);
        let count = to_usize(width.bytes());
        let mut value = 0_u64;
        for lane in 0..count {
            let shift = match endianness {
                Endianness::Little => lane * 8,
                Endianness::Big => (count - 1 - lane) * 8,
            };
            value |= u64::from(bytes[base + lane]) << shift;
        }
        value
    }

    /// Writes a `width`-wide value at byte `offset` using the given lane
    /// convention. Callers guarantee the access fits within the segment.
    pub(crate) fn write_value(
        &self,
        offset: u64,
        width: AccessWidth,
        endianness: Endianness,
        value: u64,
    ) {
        let mut bytes = self.bytes.borrow_mut();
        let base = to_usize(offset);
        let count = to_usize(width.bytes());
        for lane in 0..count {
            let shift = match endianness {
                Endianness::Little => lane * 8,
                Endianness::Big => (count - 1 - lane) * 8,
            };
            bytes[base + lane] = lane_byte(value, shift);
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn lane_byte(value: u64, shift: usize) -> u8 {
    (value >> shift) as u8
}

#[allow(clippy::cast_possible_truncation)]
const fn to_usize(value: u64) -> usize {
    value as usize
}
