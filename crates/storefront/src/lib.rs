//! Text-menu storefront client.
//!
//! Wires the stock lookup, the cart and the checkout coordinator into one
//! customer session behind a line-based [`Prompt`].

pub mod config;
pub mod error;
pub mod prompt;
pub mod session;

pub use config::Config;
pub use error::SessionError;
pub use prompt::{Prompt, TerminalPrompt};
pub use session::{Session, status_line};
