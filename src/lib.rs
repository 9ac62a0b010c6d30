//! Image uploads for the AI tools directory and blog
//!
//! Stores uploaded images on the local filesystem, a remote blob store or an
//! external image CDN behind one adapter trait, and records the resulting
//! URLs on blog posts kept in a flat JSON file.

pub mod app;
pub mod error;
pub mod mime;
pub mod models;
pub mod policy;
pub mod posts;
pub mod upload;

pub use error::{Error, ErrorKind, Result};
