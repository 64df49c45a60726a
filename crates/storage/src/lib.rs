//! Storage abstraction and implementations for Venturi.
//!
//! This crate provides a bucketed key-value storage interface with a JSON
//! file reference implementation and a volatile in-memory one.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory_storage;

pub use trait_::{sanitize_key, Bucket, Result, Storage, StorageError, StorageExt};
pub use json_storage::JsonStorage;
pub use memory_storage::MemoryStorage;
