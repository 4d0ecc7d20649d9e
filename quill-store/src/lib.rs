//! Object-store access layer for Quill.
//!
//! Everything above this crate talks to the store through the [`ObjectStore`]
//! trait. Two implementations ship:
//! - [`S3ObjectStore`] — production adapter over the AWS SDK (works against
//!   any S3-compatible endpoint, including MinIO).
//! - [`MemoryObjectStore`] — in-memory fake with fault injection for tests.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod s3;

pub use client::{ObjectMeta, ObjectStore};
pub use config::S3Config;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
