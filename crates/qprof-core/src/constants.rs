//! Workspace-wide constants.

/// Default page size for change-ledger queries when the caller does not set one.
pub const DEFAULT_CHANGE_PAGE_SIZE: usize = 50;

/// Hard ceiling on a single change-ledger page.
pub const MAX_CHANGE_PAGE_SIZE: usize = 500;
