//! Bank windows: runtime re-pointing of a fixed address window to one of
//! several storage pages.
//!
//! Selection goes through one shared level of indirection, so a select is
//! O(1), takes effect on the very next access, and never requires a decode
//! cache rebuild.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::BankError;

/// Policy applied when a bank selection is out of range.
///
/// Which behavior is correct is device-specific: some hardware latches fewer
/// select lines than the register width (wrap), some saturates (clamp), and
/// for some an out-of-range select indicates emulator misconfiguration
/// (fatal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BankPolicy {
    /// Saturate to the last installed page.
    Clamp,
    /// Select modulo the installed page count.
    Wrap,
    /// Fail with [`BankError::OutOfRange`].
    #[default]
    Fatal,
}

#[derive(Debug)]
struct BankCell {
    id: usize,
    pages: usize,
    policy: BankPolicy,
    current: Cell<usize>,
}

/// Handle controlling which page a bank window exposes.
///
/// The installing address space keeps one clone; the configuring code keeps
/// another and typically hands it to the device modeling the bank-select
/// register.
#[derive(Debug, Clone)]
pub struct BankSelector {
    cell: Rc<BankCell>,
}

impl BankSelector {
    pub(crate) fn new(id: usize, pages: usize, policy: BankPolicy) -> Self {
        Self {
            cell: Rc::new(BankCell {
                id,
                pages,
                policy,
                current: Cell::new(0),
            }),
        }
    }

    /// Identifier of this bank within its owning space.
    #[must_use]
    pub fn id(&self) -> usize {
        self.cell.id
    }

    /// Number of installed pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.cell.pages
    }

    /// Out-of-range policy of this bank.
    #[must_use]
    pub fn policy(&self) -> BankPolicy {
        self.cell.policy
    }

    /// Currently selected page index.
    #[must_use]
    pub fn current(&self) -> usize {
        self.cell.current.get()
    }

    /// Selects the page the window exposes, returning the effective index.
    ///
    /// # Errors
    ///
    /// Returns [`BankError::OutOfRange`] when `page` is beyond the installed
    /// pages and the bank's policy is [`BankPolicy::Fatal`].
    pub fn select(&self, page: usize) -> Result<usize, BankError> {
        let effective = if page < self.cell.pages {
            page
        } else {
            match self.cell.policy {
                BankPolicy::Clamp => {
                    let clamped = self.cell.pages - 1;
                    tracing::warn!(
                        bank = self.cell.id,
                        requested = page,
                        pages = self.cell.pages,
                        clamped,
                        "bank selection clamped"
                    );
                    clamped
                }
                BankPolicy::Wrap => {
                    let wrapped = page % self.cell.pages;
                    tracing::trace!(
                        bank = self.cell.id,
                        requested = page,
                        pages = self.cell.pages,
                        wrapped,
                        "bank selection wrapped"
                    );
                    wrapped
                }
                BankPolicy::Fatal => {
                    return Err(BankError::OutOfRange {
                        bank: self.cell.id,
                        requested: page,
                        pages: self.cell.pages,
                    })
                }
            }
        };
        self.cell.current.set(effective);
        Ok(effective)
    }
}
