//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports. `HttpsOrdererAdmin` and `FileIdentityStore`
//! talk to real infrastructure; the in-memory adapters back tests and local
//! runs.

mod directory;
mod https_admin;
mod identity_store;
mod orderer_admin;
mod ordering_service;
mod sinks;

pub use directory::StaticOrganizationDirectory;
pub use https_admin::{HttpsOrdererAdmin, CONFIG_BLOCK_FIELD, PARTICIPATION_PATH};
pub use identity_store::{FileIdentityStore, InMemoryIdentityStore};
pub use orderer_admin::InMemoryOrdererAdmin;
pub use ordering_service::InMemoryOrderingService;
pub use sinks::{InMemorySnapshotSink, RecordingStatusSink};
