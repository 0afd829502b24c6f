//! Storage abstraction for keyrack.
//!
//! Backend crates (e.g., keyrack-store-sqlite) implement the [`Store`] trait so the
//! core engine doesn't depend on any specific database engine or schema details.

use thiserror::Error;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("backend error: {0}")]
    Backend(String),
}

mod store;
mod types;

pub use store::Store;
pub use types::*;

#[cfg(feature = "test-support")]
pub use store::MockStore;
