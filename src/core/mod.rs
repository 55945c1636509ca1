//! Chat session state
//!
//! The session store owns one conversation with a fixed agent and reconciles
//! optimistic user turns against the completion transport.

mod failure;
mod session;

pub use failure::{describe_failure, FALLBACK_MESSAGE};
pub use session::{IgnoreReason, SendOutcome, SessionState, SessionStore};
