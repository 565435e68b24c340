//! Orderer channel participation client
//!
//! `POST {admin}/participation/v1/channels` with the genesis block as the
//! `config-block` multipart field. Every call authenticates with the ordering
//! organization's client identity and trusts only that organization's TLS
//! root.

use crate::config::ReconcilerConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::outbound::{AdminResponse, AdminTlsCredentials, JoinRequest, OrdererAdmin};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, Client, Identity};
use std::time::Duration;
use tracing::debug;

pub const PARTICIPATION_PATH: &str = "/participation/v1/channels";
pub const CONFIG_BLOCK_FIELD: &str = "config-block";

/// [`OrdererAdmin`] over HTTPS with mutual TLS
pub struct HttpsOrdererAdmin {
    timeout: Duration,
}

impl HttpsOrdererAdmin {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &ReconcilerConfig) -> Self {
        Self::new(config.admin_timeout)
    }

    fn client(&self, request: &JoinRequest) -> ReconcileResult<Client> {
        let transport = |detail: String| join_error(request, None, detail);
        let credentials: &AdminTlsCredentials = &request.credentials;

        let mut identity_pem = credentials.client_cert_pem.trim_end().to_string();
        identity_pem.push('\n');
        identity_pem.push_str(&credentials.client_key_pem);
        let identity = Identity::from_pem(identity_pem.as_bytes())
            .map_err(|e| transport(format!("invalid client identity: {}", e)))?;
        let root = Certificate::from_pem(credentials.tls_root_pem.as_bytes())
            .map_err(|e| transport(format!("invalid TLS root: {}", e)))?;

        Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(root)
            .identity(identity)
            .timeout(self.timeout)
            .build()
            .map_err(|e| transport(format!("failed to build client: {}", e)))
    }
}

impl Default for HttpsOrdererAdmin {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl OrdererAdmin for HttpsOrdererAdmin {
    async fn join(&self, request: JoinRequest) -> ReconcileResult<AdminResponse> {
        let client = self.client(&request)?;
        let url = format!(
            "{}{}",
            request.admin_url.trim_end_matches('/'),
            PARTICIPATION_PATH
        );

        let block = request.block.to_bytes()?;
        let form = Form::new().part(
            CONFIG_BLOCK_FIELD,
            Part::bytes(block).file_name(format!("{}.block", request.channel)),
        );

        debug!(url = %url, channel = %request.channel, "Submitting join request");

        let response = client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| join_error(&request, None, format!("request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            join_error(&request, Some(status), format!("failed to read response: {}", e))
        })?;

        Ok(AdminResponse { status, body })
    }
}

fn join_error(request: &JoinRequest, status: Option<u16>, detail: String) -> ReconcileError {
    ReconcileError::JoinProtocol {
        url: request.admin_url.clone(),
        channel: request.channel.clone(),
        status,
        detail,
    }
}
