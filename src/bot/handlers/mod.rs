//! Discord interaction handlers
//!
//! Follow-up interactions that are not commands themselves, and the helpers
//! commands share to turn engine outcomes into replies.

/// Helpers for requester extraction and error replies
pub mod replies;
/// The server picker shown by `/create`
pub mod server_select;
