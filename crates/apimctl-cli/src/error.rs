// SPDX-License-Identifier: MIT OR Apache-2.0
use thiserror::Error;

/// Top-level CLI failure, wrapping every crate's error type so `main` has
/// one thing to print and map to an exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    State(#[from] apimctl_state::StateError),

    #[error(transparent)]
    Transport(#[from] apimctl_transport::TransportError),

    #[error(transparent)]
    Engine(#[from] apimctl_engine::EngineError),

    #[error("{0}")]
    Apply(String),
}
