//! Error taxonomy for configuration, runtime access, and bank selection.

use thiserror::Error;

use crate::width::AccessWidth;

/// Fatal configuration-time failures.
///
/// Any of these abort machine construction entirely; a machine value is never
/// produced from a topology that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An installed range has `start > end`.
    #[error("invalid range: start=0x{start:X} end=0x{end:X}")]
    InvalidRange {
        /// Inclusive start address of the rejected install.
        start: u64,
        /// Inclusive end address of the rejected install.
        end: u64,
    },
    /// An installed range lies (partially or fully) outside the space's
    /// address mask.
    #[error("range outside address mask: start=0x{start:X} end=0x{end:X} mask=0x{addr_mask:X}")]
    RangeOutsideMask {
        /// Inclusive start address of the rejected install.
        start: u64,
        /// Inclusive end address of the rejected install.
        end: u64,
        /// Address mask of the owning space.
        addr_mask: u64,
    },
    /// A mirror mask has bits outside the space's address mask.
    #[error("mirror outside address mask: mirror=0x{mirror:X} mask=0x{addr_mask:X}")]
    MirrorOutsideMask {
        /// Rejected mirror mask.
        mirror: u64,
        /// Address mask of the owning space.
        addr_mask: u64,
    },
    /// A mirror mask overlaps the base range's address bits. Mirror bits must
    /// be clear in both `start` and `end` so every alias decodes to one base
    /// address.
    #[error("mirror overlaps base range: mirror=0x{mirror:X} start=0x{start:X} end=0x{end:X}")]
    MirrorOverlapsRange {
        /// Rejected mirror mask.
        mirror: u64,
        /// Inclusive start address of the rejected install.
        start: u64,
        /// Inclusive end address of the rejected install.
        end: u64,
    },
    /// An install requested a width tier wider than the space's native bus
    /// width.
    #[error("install width {width} exceeds native width {native}")]
    UnsupportedInstallWidth {
        /// Width requested by the install.
        width: AccessWidth,
        /// Native width of the owning space.
        native: AccessWidth,
    },
    /// A device window is not aligned to its access granularity, or does not
    /// span a whole number of granularity-wide cells.
    #[error("misaligned {width} window: start=0x{start:X} end=0x{end:X}")]
    MisalignedWindow {
        /// Inclusive start address of the rejected install.
        start: u64,
        /// Inclusive end address of the rejected install.
        end: u64,
        /// Access granularity of the window.
        width: AccessWidth,
    },
    /// A device install's width does not match the handler's declared access
    /// granularity.
    #[error("device granularity mismatch: handler declares {declared}, install requested {installed}")]
    GranularityMismatch {
        /// Granularity declared by the handler object.
        declared: AccessWidth,
        /// Width requested by the install.
        installed: AccessWidth,
    },
    /// A shared segment's length does not match the installed window span.
    #[error("segment length mismatch: window spans 0x{expected:X} bytes, segment holds 0x{actual:X}")]
    SegmentLengthMismatch {
        /// Byte span of the installed window.
        expected: u64,
        /// Byte length of the provided segment.
        actual: u64,
    },
    /// A bank install provided no pages.
    #[error("bank install has no pages")]
    EmptyBank,
    /// A bank page's length does not match the bank window span.
    #[error("bank page length mismatch: window spans 0x{window:X} bytes, page {page} holds 0x{actual:X}")]
    BankPageLengthMismatch {
        /// Byte span of the bank window.
        window: u64,
        /// Index of the offending page.
        page: usize,
        /// Byte length of the offending page.
        actual: u64,
    },
    /// A forward edge references a space that was never registered with the
    /// machine builder.
    #[error("forward target space '{space}' is not registered")]
    ForwardTargetNotRegistered {
        /// Name of the unregistered space.
        space: String,
    },
    /// The device bus graph contains a forwarding cycle.
    #[error("cyclic bus forwarding: {path}")]
    ForwardingCycle {
        /// Human-readable cycle path, e.g. `cpu:program -> sub:io -> cpu:program`.
        path: String,
    },
}

/// Fatal runtime dispatch failures.
///
/// Unmapped accesses are deliberately *not* errors (open-bus reads, discarded
/// writes); only programmer-error conditions surface here, carrying enough
/// context to identify the offending device, address, and width.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// A caller requested a width the space never advertised.
    #[error("unsupported {width} access at 0x{addr:X} in space '{space}' of device '{device}' (native width {native})")]
    UnsupportedWidth {
        /// Name of the device owning the space.
        device: String,
        /// Name of the address space.
        space: String,
        /// Offending (pre-mask) address.
        addr: u64,
        /// Requested access width.
        width: AccessWidth,
        /// Native width advertised by the space.
        native: AccessWidth,
    },
}

/// Recoverable, policy-driven bank selection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BankError {
    /// A bank selection requested a page index beyond the installed pages
    /// while the bank's policy is [`crate::BankPolicy::Fatal`].
    #[error("bank {bank} selection out of range: requested page {requested} of {pages}")]
    OutOfRange {
        /// Identifier of the bank within its space.
        bank: usize,
        /// Requested page index.
        requested: usize,
        /// Number of installed pages.
        pages: usize,
    },
    /// A selection named a bank identifier the space never installed.
    #[error("unknown bank {bank}: space has {banks} banks")]
    UnknownBank {
        /// Requested bank identifier.
        bank: usize,
        /// Number of banks installed in the space.
        banks: usize,
    },
}
