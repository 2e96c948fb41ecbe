// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;

use apimctl_core::State;

use crate::error::StateError;

/// Persisted reconciliation memory plus an exclusive lock, behind one
/// interface so the planner/applier never know which concrete backend
/// they are talking to.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Creates a brand new, empty state for `subscription_id`/`resource_group`/
    /// `service_name`. Errors if a state already exists at this location.
    async fn init(
        &self,
        subscription_id: &str,
        resource_group: &str,
        service_name: &str,
    ) -> Result<(), StateError>;

    /// Reads the current state. Errors if `init` has never been called.
    async fn read(&self) -> Result<State, StateError>;

    /// Atomically persists `state`.
    async fn write(&self, state: &State) -> Result<(), StateError>;

    /// Acquires the exclusive lock, blocking concurrent `apply`/`plan`
    /// invocations against the same state until [`StateBackend::unlock`] is
    /// called. Returns an error if another holder already has it.
    async fn lock(&self) -> Result<(), StateError>;

    /// Releases a lock acquired by this process. A no-op (not an error) if
    /// no lock is currently held by anyone, mirroring the original tool's
    /// idempotent unlock.
    async fn unlock(&self) -> Result<(), StateError>;

    /// Releases the lock regardless of who holds it; used by the
    /// `force-unlock` command to recover from a crashed `apply`.
    async fn force_unlock(&self) -> Result<(), StateError>;
}
