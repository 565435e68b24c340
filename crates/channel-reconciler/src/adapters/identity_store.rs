//! Identity store adapters

use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::outbound::{IdentityMaterial, IdentityStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk identity document: `{cert: {pem}, key: {pem}}`
#[derive(Deserialize)]
struct IdentityDocument {
    cert: PemEntry,
    key: PemEntry,
}

#[derive(Deserialize)]
struct PemEntry {
    pem: String,
}

/// Reads `<dir>/<msp_id>.yaml`
pub struct FileIdentityStore {
    dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, msp_id: &str) -> PathBuf {
        self.dir.join(format!("{}.yaml", msp_id))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn identity(&self, msp_id: &str) -> ReconcileResult<Option<IdentityMaterial>> {
        let path = self.path_for(msp_id);
        let unresolved = |reason: String| ReconcileError::OrganizationResolution {
            msp_id: msp_id.to_string(),
            reason,
        };

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(msp_id, path = %path.display(), "No identity on disk");
                return Ok(None);
            }
            Err(e) => return Err(unresolved(format!("{}: {}", path.display(), e))),
        };

        let document: IdentityDocument = serde_yaml::from_str(&contents)
            .map_err(|e| unresolved(format!("{}: {}", path.display(), e)))?;

        Ok(Some(IdentityMaterial {
            cert_pem: document.cert.pem,
            key_pem: document.key.pem,
        }))
    }
}

/// Identities held in memory
#[derive(Default)]
pub struct InMemoryIdentityStore {
    identities: RwLock<HashMap<String, IdentityMaterial>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, msp_id: &str, material: IdentityMaterial) {
        self.identities.write().insert(msp_id.to_string(), material);
    }

    pub fn remove(&self, msp_id: &str) {
        self.identities.write().remove(msp_id);
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn identity(&self, msp_id: &str) -> ReconcileResult<Option<IdentityMaterial>> {
        Ok(self.identities.read().get(msp_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::generate_ca;

    fn indent(pem: &str) -> String {
        pem.lines()
            .map(|l| format!("    {}", l))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_file_store_reads_yaml_document() {
        let dir = tempfile::tempdir().unwrap();
        let admin = generate_ca("org1-admin");
        let document = format!(
            "cert:\n  pem: |\n{}\nkey:\n  pem: |\n{}\n",
            indent(&admin.cert_pem),
            indent(&admin.key_pem)
        );
        std::fs::write(dir.path().join("Org1MSP.yaml"), document).unwrap();

        let store = FileIdentityStore::new(dir.path());
        let material = store.identity("Org1MSP").await.unwrap().unwrap();
        assert_eq!(material.cert_pem.trim(), admin.cert_pem.trim());
        assert_eq!(material.key_pem.trim(), admin.key_pem.trim());
    }

    #[tokio::test]
    async fn test_file_store_missing_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path());
        assert!(store.identity("Org9MSP").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Org1MSP.yaml"), "cert: [").unwrap();

        let store = FileIdentityStore::new(dir.path());
        assert!(matches!(
            store.identity("Org1MSP").await,
            Err(ReconcileError::OrganizationResolution { .. })
        ));
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryIdentityStore::new();
        store.insert(
            "Org1MSP",
            IdentityMaterial {
                cert_pem: "cert".to_string(),
                key_pem: "key".to_string(),
            },
        );
        assert!(store.identity("Org1MSP").await.unwrap().is_some());
        store.remove("Org1MSP");
        assert!(store.identity("Org1MSP").await.unwrap().is_none());
    }
}
