//! Cache keys shared by the server's readers and writers.

/// Display-ordered snapshot of the latest stored deals. Every listing query
/// is answered by searching and filtering this one entry.
pub const ALL_DEALS: &str = "all_deals";
