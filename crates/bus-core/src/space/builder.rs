//! Explicit install API constructing one address space.

use crate::bank::{BankPolicy, BankSelector};
use crate::device::SharedHandler;
use crate::error::ConfigError;
use crate::map::{validate_device_alignment, validate_geometry, Direction, Target};
use crate::segment::SharedSegment;
use crate::space::{AddressSpace, SpaceConfig};
use crate::width::AccessWidth;

/// Builds an [`AddressSpace`] through explicit install calls.
///
/// Installs are validated eagerly and keep the decode cache current, so a
/// successful `build` yields a space that is immediately dispatchable.
/// Overlapping installs are legal; the later install wins where they
/// overlap.
pub struct AddressSpaceBuilder {
    space: AddressSpace,
}

impl AddressSpaceBuilder {
    /// Starts an empty space with the given shape.
    #[must_use]
    pub fn new(config: SpaceConfig) -> Self {
        Self {
            space: AddressSpace::new(config),
        }
    }

    /// Installs zero-filled RAM over `start..=end`, readable and writable,
    /// returning a handle to the backing storage.
    ///
    /// # Errors
    ///
    /// Fails when the range geometry is invalid for this space.
    pub fn install_ram(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
    ) -> Result<SharedSegment, ConfigError> {
        self.validate(start, end, self.native(), mirror)?;
        let segment = SharedSegment::zeroed(end - start + 1);
        let id = self.space.add_segment(segment.clone());
        self.install_both(start, end, mirror, Target::Ram(id));
        Ok(segment)
    }

    /// Installs ROM over `start..=end` holding `image`, padded with
    /// [`crate::ROM_FILL`] when the image is shorter than the window.
    /// Writes into the window are discarded.
    ///
    /// # Errors
    ///
    /// Fails when the range geometry is invalid for this space.
    pub fn install_rom(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        image: &[u8],
    ) -> Result<SharedSegment, ConfigError> {
        self.validate(start, end, self.native(), mirror)?;
        let segment = SharedSegment::from_image(image, end - start + 1);
        let id = self.space.add_segment(segment.clone());
        self.install_both(start, end, mirror, Target::Rom(id));
        Ok(segment)
    }

    /// Installs an existing segment over `start..=end`, readable and
    /// writable. Installing one segment into several spaces models shared
    /// and dual-port RAM.
    ///
    /// # Errors
    ///
    /// Fails when the geometry is invalid or the segment's length does not
    /// equal the window span.
    pub fn install_shared(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        segment: &SharedSegment,
    ) -> Result<(), ConfigError> {
        self.validate(start, end, self.native(), mirror)?;
        let span = end - start + 1;
        if segment.len() != span {
            return Err(ConfigError::SegmentLengthMismatch {
                expected: span,
                actual: segment.len(),
            });
        }
        let id = self.space.add_segment(segment.clone());
        self.install_both(start, end, mirror, Target::Ram(id));
        Ok(())
    }

    /// Installs a device handler over `start..=end` for both directions at
    /// its declared granularity.
    ///
    /// # Errors
    ///
    /// Fails when the geometry is invalid, the window is misaligned for
    /// `width`, or `width` differs from the handler's declared granularity.
    pub fn install_device(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        width: AccessWidth,
        handler: &SharedHandler,
    ) -> Result<(), ConfigError> {
        let id = self.validate_device(start, end, mirror, width, handler)?;
        self.install_both(start, end, mirror, Target::Device(id));
        Ok(())
    }

    /// Installs a device handler for reads only; writes into the window
    /// remain whatever was installed before (or unmapped).
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::install_device`].
    pub fn install_read_device(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        width: AccessWidth,
        handler: &SharedHandler,
    ) -> Result<(), ConfigError> {
        let id = self.validate_device(start, end, mirror, width, handler)?;
        self.space
            .install(Direction::Read, start, end, width, mirror, Target::Device(id));
        Ok(())
    }

    /// Installs a device handler for writes only.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::install_device`].
    pub fn install_write_device(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        width: AccessWidth,
        handler: &SharedHandler,
    ) -> Result<(), ConfigError> {
        let id = self.validate_device(start, end, mirror, width, handler)?;
        self.space
            .install(Direction::Write, start, end, width, mirror, Target::Device(id));
        Ok(())
    }

    /// Installs an explicit hole: reads return open bus, writes are
    /// discarded. Useful to shadow part of an earlier, larger install.
    ///
    /// # Errors
    ///
    /// Fails when the range geometry is invalid for this space.
    pub fn install_hole(&mut self, start: u64, end: u64, mirror: u64) -> Result<(), ConfigError> {
        self.validate(start, end, self.native(), mirror)?;
        self.install_both(start, end, mirror, Target::Hole);
        Ok(())
    }

    /// Installs a bank window over `start..=end` backed by `pages`,
    /// returning the selector that re-points the window. Page 0 is selected
    /// initially; selection is O(1) and takes effect on the next access.
    ///
    /// # Errors
    ///
    /// Fails when the geometry is invalid, `pages` is empty, or any page's
    /// length differs from the window span.
    pub fn install_bank(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        pages: &[SharedSegment],
        policy: BankPolicy,
    ) -> Result<BankSelector, ConfigError> {
        self.validate(start, end, self.native(), mirror)?;
        if pages.is_empty() {
            return Err(ConfigError::EmptyBank);
        }
        let span = end - start + 1;
        for (index, page) in pages.iter().enumerate() {
            if page.len() != span {
                return Err(ConfigError::BankPageLengthMismatch {
                    window: span,
                    page: index,
                    actual: page.len(),
                });
            }
        }

        let bank_id = self.space.bank_count();
        let selector = BankSelector::new(bank_id, pages.len(), policy);
        let page_ids = pages
            .iter()
            .map(|page| self.space.add_segment(page.clone()))
            .collect();
        self.space.add_bank(selector.clone(), page_ids);
        self.install_both(start, end, mirror, Target::Bank(crate::map::BankId(bank_id)));
        Ok(selector)
    }

    /// Finishes construction.
    #[must_use]
    pub fn build(self) -> AddressSpace {
        self.space
    }

    fn native(&self) -> AccessWidth {
        self.space.config().native_width
    }

    fn validate(
        &self,
        start: u64,
        end: u64,
        width: AccessWidth,
        mirror: u64,
    ) -> Result<(), ConfigError> {
        let config = self.space.config();
        validate_geometry(start, end, width, mirror, config.native_width, config.addr_mask)
    }

    fn validate_device(
        &mut self,
        start: u64,
        end: u64,
        mirror: u64,
        width: AccessWidth,
        handler: &SharedHandler,
    ) -> Result<crate::map::HandlerId, ConfigError> {
        self.validate(start, end, width, mirror)?;
        validate_device_alignment(start, end, width)?;
        let declared = handler.borrow().granularity();
        if declared != width {
            return Err(ConfigError::GranularityMismatch {
                declared,
                installed: width,
            });
        }
        Ok(self.space.add_handler(handler.clone()))
    }

    /// Installs the same target in both directions. Storage-backed targets
    /// use the space's native width so aligned native accesses stay on the
    /// direct path.
    fn install_both(&mut self, start: u64, end: u64, mirror: u64, target: Target) {
        let width = self.native();
        for direction in [Direction::Read, Direction::Write] {
            self.space
                .install(direction, start, end, width, mirror, target.clone());
        }
    }
}
