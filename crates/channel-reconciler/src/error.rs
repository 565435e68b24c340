//! Error types for channel reconciliation
//!
//! Every variant aborts the current pass. The `Display` output is what the
//! status sink receives, so messages carry the full diagnostic.

use thiserror::Error;

/// Channel reconciliation errors
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// PEM or X.509 material could not be decoded
    #[error("Certificate parse error ({context}): {reason}")]
    CertificateParse { context: String, reason: String },

    /// An organization referenced by the channel spec could not be resolved
    #[error("Organization {msp_id} could not be resolved: {reason}")]
    OrganizationResolution { msp_id: String, reason: String },

    /// The current channel configuration is malformed
    #[error("Config diff computation failed: {reason}")]
    DiffComputation { reason: String },

    /// The signature set does not satisfy the admin policy
    #[error("Insufficient signatures: have {have}, need {need}, missing {missing:?}")]
    InsufficientSignatures {
        have: usize,
        need: usize,
        missing: Vec<String>,
    },

    /// An ordering node refused to join the channel
    #[error("Orderer {url} failed to join channel {channel}: {detail}")]
    JoinProtocol {
        url: String,
        channel: String,
        status: Option<u16>,
        detail: String,
    },

    /// The ordering service did not return the configuration in time
    #[error("Timeout querying orderer channel {channel} after {waited_ms}ms")]
    ConvergenceTimeout { channel: String, waited_ms: u64 },

    /// The ordering service rejected the signed envelope
    #[error("Ordering service rejected config update for channel {channel}: {reason}")]
    SubmissionRejected { channel: String, reason: String },

    /// The channel spec carries a value that cannot be interpreted
    #[error("Invalid channel spec: {reason}")]
    InvalidSpec { reason: String },

    /// The ordering service could not be queried
    #[error("Failed to get block from channel {channel} after {attempts} attempts: {reason}")]
    OrderingService {
        channel: String,
        attempts: u32,
        reason: String,
    },

    /// A status or snapshot collaborator failed to persist
    #[error("Sink error: {reason}")]
    Sink { reason: String },
}

impl ReconcileError {
    /// Short, stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CertificateParse { .. } => "certificate_parse",
            Self::OrganizationResolution { .. } => "organization_resolution",
            Self::DiffComputation { .. } => "diff_computation",
            Self::InsufficientSignatures { .. } => "insufficient_signatures",
            Self::JoinProtocol { .. } => "join_protocol",
            Self::ConvergenceTimeout { .. } => "convergence_timeout",
            Self::SubmissionRejected { .. } => "submission_rejected",
            Self::InvalidSpec { .. } => "invalid_spec",
            Self::OrderingService { .. } => "ordering_service",
            Self::Sink { .. } => "sink",
        }
    }
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;
