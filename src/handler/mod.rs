//! Request handler module
//!
//! Responsible for request routing dispatch: static file serving and the
//! optional image scan endpoint.

pub mod router;
pub mod scan_endpoint;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
