//! In-memory orderer admin endpoints
//!
//! Every admin URL behaves like a node of the same ordering service: the first
//! join creates the channel (201), later joins of the same node get 405.
//! Responses can be scripted per URL to exercise failure paths.

use super::ordering_service::InMemoryOrderingService;
use crate::error::ReconcileResult;
use crate::ports::outbound::{AdminResponse, JoinRequest, OrdererAdmin};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct InMemoryOrdererAdmin {
    service: Arc<InMemoryOrderingService>,
    joined: RwLock<HashSet<(String, String)>>,
    scripted: RwLock<HashMap<String, AdminResponse>>,
    requests: RwLock<Vec<JoinRequest>>,
}

impl InMemoryOrdererAdmin {
    pub fn new(service: Arc<InMemoryOrderingService>) -> Self {
        Self {
            service,
            joined: RwLock::new(HashSet::new()),
            scripted: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Always answer `admin_url` with `status` and `body`
    pub fn script(&self, admin_url: &str, status: u16, body: &str) {
        self.scripted.write().insert(
            admin_url.to_string(),
            AdminResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    /// Admin URLs called so far, in order
    pub fn called_urls(&self) -> Vec<String> {
        self.requests
            .read()
            .iter()
            .map(|r| r.admin_url.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<JoinRequest> {
        self.requests.read().clone()
    }
}

#[async_trait]
impl OrdererAdmin for InMemoryOrdererAdmin {
    async fn join(&self, request: JoinRequest) -> ReconcileResult<AdminResponse> {
        self.requests.write().push(request.clone());

        if let Some(response) = self.scripted.read().get(&request.admin_url) {
            return Ok(response.clone());
        }

        let key = (request.admin_url.clone(), request.channel.clone());
        if !self.joined.write().insert(key) {
            return Ok(AdminResponse {
                status: 405,
                body: "cannot join: channel already exists".to_string(),
            });
        }

        self.service.create_channel(request.block.clone());
        let body = serde_json::json!({
            "name": request.channel,
            "url": format!("/participation/v1/channels/{}", request.channel),
            "consensusRelation": "consenter",
            "status": "active",
            "height": request.block.number + 1,
        });
        Ok(AdminResponse {
            status: 201,
            body: body.to_string(),
        })
    }
}
