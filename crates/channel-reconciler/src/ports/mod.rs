//! Ports module for channel reconciliation

pub mod inbound;
pub mod outbound;

pub use inbound::{PassChange, PassOutcome, ReconcileApi};
pub use outbound::{
    AdminEndpoint, AdminResponse, AdminTlsCredentials, CaMaterial, ConfigSnapshotSink,
    IdentityMaterial, IdentityStore, JoinRequest, OrdererAdmin, OrderingService,
    OrganizationDirectory, PassReport, PassStatus, StatusSink, SubmitReceipt,
};
