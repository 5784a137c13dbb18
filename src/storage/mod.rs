//! Dataset persistence.
//!
//! Two tiers: the always-available [`local::LocalCache`] and an optional
//! [`remote::RemoteStore`]. [`sync::SyncCoordinator`] keeps them consistent.

pub mod credential;
pub mod local;
#[cfg(test)]
pub mod memory;
pub mod remote;
pub mod sync;

pub use credential::{mask_token, CredentialStore};
pub use local::LocalCache;
pub use remote::{GitHubStore, RemoteStore};
pub use sync::{RemoteOutcome, SyncCoordinator};
