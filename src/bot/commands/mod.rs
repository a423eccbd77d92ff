//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// OAuth authorization link
pub mod account;

/// General utility commands
pub mod general;

/// `/send`
pub mod messaging;

/// Staff role configuration
pub mod settings;

/// Ticket creation and closure
pub mod tickets;

// Export commands
pub use account::*;
pub use general::*;
pub use messaging::*;
pub use settings::*;
pub use tickets::*;
