//! Storage engine module for cxdb
//!
//! This module provides the core storage functionality including:
//! - Counterexample records and the in-memory entry table
//! - Pluggable compression codecs and their registry
//! - The binary file format used for the database file and exports

pub mod compression;
pub mod entry;
pub mod entry_store;
pub mod format;

pub use compression::*;
pub use entry::*;
pub use entry_store::*;
