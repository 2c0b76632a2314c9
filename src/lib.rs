//! opdshelf: a personal ebook shelf served over OPDS.
//!
//! The server lists a directory of books as an OPDS 1.2 acquisition feed and
//! a small admin UI. Its core is the archive inspector in [`formats`], which
//! pulls covers and Dublin Core metadata out of EPUB, zipped FictionBook and
//! plain zip/CBZ archives without trusting their structure.
//!
//! # Features
//!
//! - OPDS 1.2 acquisition feed with sort facets
//! - Cover extraction (EPUB 2 and 3, FB2, image-only archives)
//! - Metadata extraction for the book details page
//! - Upload, rename and delete from the browser
//! - Optional admin login (session cookie or HTTP Basic)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Admin authentication and sessions.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Error types.
pub mod error;
/// Archive inspection: covers and metadata.
pub mod formats;
/// Books directory listing.
pub mod library;
/// OPDS feed generation.
pub mod opds;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use error::{AppError, InspectError, Result};
pub use formats::{BookMetadata, CoverResult, InspectMode, Inspection};
pub use server::AppState;
