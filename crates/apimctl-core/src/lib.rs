// SPDX-License-Identifier: MIT OR Apache-2.0
//! Artifact model, canonical hashing and reference resolution.
//!
//! This crate holds everything that is common to every artifact kind and
//! every backend: the [`Artifact`] and [`State`] shapes, the canonical
//! hashing contract, and the `$ref-`/`$refs-` sibling-file resolver. Nothing
//! here talks to the network or the filesystem directly except the
//! resolver, which reads sibling files relative to a base directory handed
//! to it by a caller.

mod error;
mod hash;
mod model;
mod resolve;

pub use error::CoreError;
pub use hash::{canonical_json, content_hash, sha256_hex};
pub use model::{Artifact, State, STATE_VERSION, empty_state};
pub use resolve::resolve_refs;
