//! # channel-reconciler
//!
//! Reconciles a declarative description of a ledger channel against the
//! signed configuration held by the ordering service.
//!
//! ## Overview
//!
//! A pass turns a [`ChannelSpec`] into the live channel configuration:
//! - **Organization Mapper**: PEM roots → canonical organization records
//! - **Channel Config Builder**: spec + organizations → target config
//! - **Config Differ**: live config vs target → minimal config update
//! - **Signature Collector**: admin quorum over the update payload
//! - **Orderer Join Coordinator**: genesis block → every ordering node
//! - **Convergence Poller**: bounded wait until the update is visible
//!
//! ## Architecture
//!
//! ```text
//!                         ┌──────────────────────┐
//!   watch layer ─spec──→  │  ChannelReconciler   │ ──report──→ StatusSink
//!                         └──────────┬───────────┘ ──publish─→ ConfigSnapshotSink
//!          ┌─────────────────┬───────┴─────────┬──────────────────┐
//!          ↓                 ↓                 ↓                  ↓
//!  OrganizationDirectory  IdentityStore   OrdererAdmin     OrderingService
//!   (CA roots, nodes)    (admin keys)   (join, mTLS)   (fetch, submit)
//! ```
//!
//! ## Error Outcomes
//!
//! | Error | Raised by |
//! |-------|-----------|
//! | `CertificateParse` | mapper, signing |
//! | `OrganizationResolution` | builder, join |
//! | `DiffComputation` | differ |
//! | `InsufficientSignatures` | collector |
//! | `JoinProtocol` | join |
//! | `SubmissionRejected` | ordering service |
//! | `ConvergenceTimeout` | poller |
//!
//! ## Example
//!
//! ```rust,ignore
//! use channel_reconciler::{ChannelReconciler, ReconcilerConfig, ReconcilerPorts, ReconcileApi};
//!
//! let reconciler = ChannelReconciler::new(ReconcilerConfig::from_env(), ports);
//! let outcome = reconciler.reconcile(&spec).await?;
//! ```

pub mod adapters;
pub mod collector;
pub mod config;
pub mod convergence;
pub mod domain;
pub mod error;
pub mod join;
pub mod metrics;
pub mod ports;
pub mod service;

pub use collector::collect_signatures;
pub use config::ReconcilerConfig;
pub use convergence::{await_convergence, Convergence};
pub use domain::{
    build_channel_config, compute_update, map_organization, AdminRule, ChannelConfig, ChannelSpec,
    ConfigBlock, ConfigUpdate, DiffOutcome, OrgRole, OrganizationConfig, SignedEnvelope,
    SigningIdentity,
};
pub use error::{ReconcileError, ReconcileResult};
pub use join::{join_orderers, ChannelInfo, JoinResult, JoinSummary};
pub use ports::inbound::{PassChange, PassOutcome, ReconcileApi};
pub use service::{ChannelReconciler, PassPhase, ReconcilerPorts};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::builder::assemble_channel_config;
    use crate::domain::channel::{ChannelConfig, OrganizationMap};
    use crate::domain::identity::SigningIdentity;
    use crate::domain::organization::{map_organization, OrgRole, OrganizationConfig};
    use crate::domain::spec::ChannelSpec;
    use crate::ports::outbound::IdentityMaterial;
    use parking_lot::Mutex;
    use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
    use std::collections::HashMap;
    use std::sync::OnceLock;

    #[derive(Clone)]
    pub struct GeneratedCa {
        pub cert_pem: String,
        pub key_pem: String,
        cn: String,
    }

    fn ca_params(cn: &str) -> CertificateParams {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, cn);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
    }

    /// Self-signed P-256 CA certificate with the given common name
    pub fn generate_ca(cn: &str) -> GeneratedCa {
        let key = KeyPair::generate().unwrap();
        let cert = ca_params(cn).self_signed(&key).unwrap();

        GeneratedCa {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
            cn: cn.to_string(),
        }
    }

    impl GeneratedCa {
        /// Leaf certificate and key issued by this CA
        pub fn issue(&self, cn: &str) -> GeneratedCa {
            let issuer_key = KeyPair::from_pem(&self.key_pem).unwrap();
            // same key and subject, so it verifies leaves against `cert_pem`
            let issuer = ca_params(&self.cn).self_signed(&issuer_key).unwrap();

            let key = KeyPair::generate().unwrap();
            let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
            params.distinguished_name.push(DnType::CommonName, cn);
            let cert = params.signed_by(&key, &issuer, &issuer_key).unwrap();

            GeneratedCa {
                cert_pem: cert.pem(),
                key_pem: key.serialize_pem(),
                cn: cn.to_string(),
            }
        }
    }

    /// Signing CA of `msp_id`, stable for the whole test binary
    pub fn org_ca(msp_id: &str) -> GeneratedCa {
        static ORG_CAS: OnceLock<Mutex<HashMap<String, GeneratedCa>>> = OnceLock::new();
        ORG_CAS
            .get_or_init(Default::default)
            .lock()
            .entry(msp_id.to_string())
            .or_insert_with(|| generate_ca(&format!("{}-ca", msp_id)))
            .clone()
    }

    /// Admin certificate of `msp_id`, issued by its signing CA
    pub fn admin_material(msp_id: &str) -> IdentityMaterial {
        let admin = org_ca(msp_id).issue(&format!("{}-admin", msp_id));
        IdentityMaterial {
            cert_pem: admin.cert_pem,
            key_pem: admin.key_pem,
        }
    }

    pub fn admin_identity(msp_id: &str) -> SigningIdentity {
        SigningIdentity::from_material(msp_id, &admin_material(msp_id)).unwrap()
    }

    pub fn peer_organization(msp_id: &str) -> OrganizationConfig {
        let sign = org_ca(msp_id);
        let tls = generate_ca(&format!("{}-tlsca", msp_id));
        map_organization(msp_id, &sign.cert_pem, &tls.cert_pem, OrgRole::Peer).unwrap()
    }

    pub fn organizations(msp_ids: &[&str]) -> OrganizationMap {
        msp_ids
            .iter()
            .map(|m| (m.to_string(), peer_organization(m)))
            .collect()
    }

    /// Channel with the given peer orgs, one orderer org, `MAJORITY Admins`
    pub fn sample_config(peer_msp_ids: &[&str]) -> ChannelConfig {
        let spec = ChannelSpec {
            name: "demo".to_string(),
            ..Default::default()
        };
        let peers = peer_msp_ids.iter().map(|m| peer_organization(m)).collect();
        let sign = org_ca("OrdererMSP");
        let tls = generate_ca("ord-tlsca");
        let orderer = map_organization(
            "OrdererMSP",
            &sign.cert_pem,
            &tls.cert_pem,
            OrgRole::Orderer {
                endpoints: vec!["orderer0:7050".to_string()],
            },
        )
        .unwrap();

        assemble_channel_config(&spec, peers, vec![orderer]).unwrap()
    }
}
