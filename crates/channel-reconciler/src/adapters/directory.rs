//! Static organization directory

use crate::domain::spec::OrdererNodeRef;
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::outbound::{AdminEndpoint, CaMaterial, OrganizationDirectory};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

type Key = (String, String);

/// [`OrganizationDirectory`] over a fixed table of CAs and orderer nodes
#[derive(Default)]
pub struct StaticOrganizationDirectory {
    authorities: RwLock<HashMap<Key, CaMaterial>>,
    orderers: RwLock<HashMap<Key, AdminEndpoint>>,
}

impl StaticOrganizationDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_certificate_authority(&self, name: &str, namespace: &str, material: CaMaterial) {
        self.authorities
            .write()
            .insert((name.to_string(), namespace.to_string()), material);
    }

    pub fn add_orderer(&self, name: &str, namespace: &str, endpoint: AdminEndpoint) {
        self.orderers
            .write()
            .insert((name.to_string(), namespace.to_string()), endpoint);
    }
}

#[async_trait]
impl OrganizationDirectory for StaticOrganizationDirectory {
    async fn certificate_authority(
        &self,
        name: &str,
        namespace: &str,
    ) -> ReconcileResult<CaMaterial> {
        self.authorities
            .read()
            .get(&(name.to_string(), namespace.to_string()))
            .cloned()
            .ok_or_else(|| ReconcileError::OrganizationResolution {
                msp_id: format!("{}/{}", namespace, name),
                reason: format!("certificate authority {} not found in {}", name, namespace),
            })
    }

    async fn orderer_admin_endpoint(&self, node: &OrdererNodeRef) -> ReconcileResult<AdminEndpoint> {
        self.orderers
            .read()
            .get(&(node.name.clone(), node.namespace.clone()))
            .cloned()
            .ok_or_else(|| ReconcileError::OrganizationResolution {
                msp_id: format!("{}/{}", node.namespace, node.name),
                reason: format!("ordering node {} not found in {}", node.name, node.namespace),
            })
    }
}
