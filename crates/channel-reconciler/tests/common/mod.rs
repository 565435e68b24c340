//! Shared fixtures: generated certificate authorities and an in-memory
//! network of collaborators.

#![allow(dead_code)]

use channel_reconciler::adapters::{
    InMemoryIdentityStore, InMemoryOrdererAdmin, InMemoryOrderingService, InMemorySnapshotSink,
    RecordingStatusSink, StaticOrganizationDirectory,
};
use channel_reconciler::domain::spec::{
    ConsenterSpec, ExternalOrdererNode, MspRef, OrdererNodeRef, OrdererOrganizationSpec,
    PeerOrganizationSpec,
};
use channel_reconciler::ports::{AdminEndpoint, CaMaterial, IdentityMaterial};
use channel_reconciler::{
    build_channel_config, ChannelReconciler, ChannelSpec, ConfigBlock, ReconcilerConfig,
    ReconcilerPorts,
};
use parking_lot::RwLock;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use std::collections::HashMap;
use std::sync::Arc;

pub const CHANNEL: &str = "demo";
pub const ORDERER_MSP: &str = "OrdererMSP";
pub const NAMESPACE: &str = "default";
pub const EXTERNAL_ORDERER_URL: &str = "https://orderer0.example.com:7053";
pub const CLUSTER_ORDERER_URL: &str = "https://orderer1.default:9443";

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
    /// Leaf certificate and key signed by this CA
    pub fn issue(&self, cn: &str) -> GeneratedCa {
        let issuer_key = KeyPair::from_pem(&self.key_pem).unwrap();
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

fn ca_name(msp_id: &str) -> String {
    format!("{}-ca", msp_id.to_lowercase())
}

/// In-memory collaborators wired like a small network: peer organizations
/// with CAs and admin identities, one ordering organization with an
/// external node and a cluster-managed node.
pub struct Network {
    pub ordering: Arc<InMemoryOrderingService>,
    pub admin: Arc<InMemoryOrdererAdmin>,
    pub directory: Arc<StaticOrganizationDirectory>,
    pub identities: Arc<InMemoryIdentityStore>,
    pub status: Arc<RecordingStatusSink>,
    pub snapshots: Arc<InMemorySnapshotSink>,
    orderer_tls_pem: String,
    sign_cas: RwLock<HashMap<String, GeneratedCa>>,
}

impl Network {
    pub fn new(peer_msp_ids: &[&str]) -> Self {
        let ordering = Arc::new(InMemoryOrderingService::new());
        let admin = Arc::new(InMemoryOrdererAdmin::new(Arc::clone(&ordering)));
        let directory = Arc::new(StaticOrganizationDirectory::new());
        let identities = Arc::new(InMemoryIdentityStore::new());

        let orderer_tls_pem = generate_ca("orderer-tlsca").cert_pem;
        let orderer_ca = generate_ca("orderer-ca");
        directory.add_certificate_authority(
            &ca_name(ORDERER_MSP),
            NAMESPACE,
            CaMaterial {
                sign_root_pem: orderer_ca.cert_pem.clone(),
                tls_root_pem: orderer_tls_pem.clone(),
            },
        );
        directory.add_orderer(
            "orderer1",
            NAMESPACE,
            AdminEndpoint {
                host: "orderer1.default".to_string(),
                port: 9443,
            },
        );

        let network = Self {
            ordering,
            admin,
            directory,
            identities,
            status: Arc::new(RecordingStatusSink::new()),
            snapshots: Arc::new(InMemorySnapshotSink::new()),
            orderer_tls_pem,
            sign_cas: RwLock::new(HashMap::from([(ORDERER_MSP.to_string(), orderer_ca)])),
        };
        network.add_admin(ORDERER_MSP);
        for msp_id in peer_msp_ids {
            network.add_peer_organization(msp_id);
        }
        network
    }

    pub fn add_peer_organization(&self, msp_id: &str) {
        let sign_ca = generate_ca(&format!("{}-ca", msp_id));
        self.directory.add_certificate_authority(
            &ca_name(msp_id),
            NAMESPACE,
            CaMaterial {
                sign_root_pem: sign_ca.cert_pem.clone(),
                tls_root_pem: generate_ca(&format!("{}-tlsca", msp_id)).cert_pem,
            },
        );
        self.sign_cas.write().insert(msp_id.to_string(), sign_ca);
        self.add_admin(msp_id);
    }

    /// Store an admin for `msp_id` issued by its signing CA
    pub fn add_admin(&self, msp_id: &str) {
        let admin = self.sign_cas.read()[msp_id].issue(&format!("{}-admin", msp_id));
        self.set_admin(msp_id, &admin);
    }

    /// Store `admin` as the identity of `msp_id`, whoever issued it
    pub fn set_admin(&self, msp_id: &str, admin: &GeneratedCa) {
        self.identities.insert(
            msp_id,
            IdentityMaterial {
                cert_pem: admin.cert_pem.clone(),
                key_pem: admin.key_pem.clone(),
            },
        );
    }

    /// Spec for `peer_msp_ids`, with `admin_msp_ids` as admin peer orgs
    pub fn spec(&self, peer_msp_ids: &[&str], admin_msp_ids: &[&str]) -> ChannelSpec {
        ChannelSpec {
            name: CHANNEL.to_string(),
            peer_organizations: peer_msp_ids
                .iter()
                .map(|msp_id| PeerOrganizationSpec {
                    msp_id: msp_id.to_string(),
                    ca_name: ca_name(msp_id),
                    ca_namespace: NAMESPACE.to_string(),
                })
                .collect(),
            orderer_organizations: vec![OrdererOrganizationSpec {
                msp_id: ORDERER_MSP.to_string(),
                ca_name: ca_name(ORDERER_MSP),
                ca_namespace: NAMESPACE.to_string(),
                orderer_endpoints: vec!["orderer0.example.com:7050".to_string()],
                orderers_to_join: vec![OrdererNodeRef {
                    name: "orderer1".to_string(),
                    namespace: NAMESPACE.to_string(),
                }],
                external_orderers_to_join: vec![ExternalOrdererNode {
                    host: "orderer0.example.com".to_string(),
                    admin_port: 7053,
                }],
                ..Default::default()
            }],
            consenters: vec![ConsenterSpec {
                host: "orderer0.example.com".to_string(),
                port: 7050,
                tls_cert: self.orderer_tls_pem.clone(),
            }],
            admin_peer_organizations: admin_msp_ids.iter().map(|m| MspRef::from(*m)).collect(),
            ..Default::default()
        }
    }

    /// Create the channel with only `peer_msp_ids` as members
    pub async fn seed_channel(&self, peer_msp_ids: &[&str]) -> ConfigBlock {
        let config = build_channel_config(&self.spec(peer_msp_ids, &[]), self.directory.as_ref())
            .await
            .unwrap();
        let genesis = ConfigBlock::genesis(CHANNEL, &config).unwrap();
        assert!(self.ordering.create_channel(genesis.clone()));
        genesis
    }

    pub fn ports(&self) -> ReconcilerPorts {
        ReconcilerPorts {
            ordering_service: self.ordering.clone(),
            orderer_admin: self.admin.clone(),
            directory: self.directory.clone(),
            identities: self.identities.clone(),
            status: self.status.clone(),
            snapshots: self.snapshots.clone(),
        }
    }

    pub fn reconciler(&self) -> ChannelReconciler {
        ChannelReconciler::new(ReconcilerConfig::default(), self.ports())
    }
}
