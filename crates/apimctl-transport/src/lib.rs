// SPDX-License-Identifier: MIT OR Apache-2.0
//! REST transport for the gateway management API: authentication, typed
//! retry, and error classification.

mod client;
mod error;
mod token;

pub use client::ApimClient;
pub use error::{Classification, TransportError, classify};
pub use token::{CachingTokenSource, ClientCredentialTokenSource, EnvTokenSource, TokenSource};
