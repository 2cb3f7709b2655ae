//! Request handler module
//!
//! Responsible for request routing dispatch. The catalog logic itself lives
//! in [`crate::catalog`].

pub mod router;

// Re-export main entry point
pub use router::handle_request;
