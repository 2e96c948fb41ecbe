// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted reconciliation state and exclusive locking, behind one
//! [`StateBackend`] trait with a local-file and an Azure Blob implementation.

mod backend;
mod blob;
mod error;
mod factory;
mod local;

pub use backend::StateBackend;
pub use blob::BlobStateBackend;
pub use error::StateError;
pub use factory::{BackendArgs, build_backend};
pub use local::LocalStateBackend;
