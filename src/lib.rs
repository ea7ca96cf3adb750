//! zipsnap: point-in-time backup and restore of configured filesystem paths.
//!
//! This crate provides the concurrent archive engine behind the `zsnap` CLI:
//! path enumeration with exclusion rules, a bounded worker pool streaming
//! files into one shared zip writer, the path map that makes restoration
//! order-independent, and the symmetric concurrent extraction engine.

pub mod archive;
pub mod backup;
pub mod commands;
pub mod config;
pub mod error;
pub mod filemap;
pub mod filter;
pub mod restore;
pub mod sysexits;
pub mod walker;

pub use error::{Error, Result};
