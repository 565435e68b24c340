//! Signing identities and config signatures
//!
//! Signatures are ECDSA P-256 over SHA-256, DER encoded with low-S, computed
//! over `signature_header || payload`. The header binds the signer's MSP id
//! and certificate plus a fresh nonce, so two signatures over the same payload
//! never collide.

use super::certificate::Certificate;
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::outbound::IdentityMaterial;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePrivateKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const NONCE_LEN: usize = 24;

/// Certificate plus private key of one organization admin.
///
/// Held only for the duration of a signing operation. The key is zeroized on
/// drop by `p256`.
pub struct SigningIdentity {
    msp_id: String,
    certificate: Certificate,
    key: SigningKey,
}

impl SigningIdentity {
    pub fn from_material(msp_id: &str, material: &IdentityMaterial) -> ReconcileResult<Self> {
        Self::from_pem(msp_id, &material.cert_pem, &material.key_pem)
    }

    /// Build from PEM certificate and PKCS#8 or SEC1 private key
    pub fn from_pem(msp_id: &str, cert_pem: &str, key_pem: &str) -> ReconcileResult<Self> {
        let certificate = Certificate::from_pem(cert_pem)?;
        let key = parse_signing_key(key_pem)?;

        let public = key.verifying_key().to_encoded_point(false);
        if public.as_bytes() != certificate.public_key_bytes()?.as_slice() {
            return Err(ReconcileError::CertificateParse {
                context: format!("identity {}", msp_id),
                reason: "private key does not match certificate".to_string(),
            });
        }

        Ok(Self {
            msp_id: msp_id.to_string(),
            certificate,
            key,
        })
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Sign `payload` on behalf of this identity's organization
    pub fn sign(&self, payload: &[u8]) -> ReconcileResult<ConfigSignature> {
        let mut nonce = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let header = SignatureHeader {
            creator: SerializedIdentity {
                mspid: self.msp_id.clone(),
                id_bytes: self.certificate.pem().to_string(),
            },
            nonce,
        };
        let message = signed_message(&header, payload)?;

        let signature: Signature = self.key.sign(&message);
        let signature = signature.normalize_s().unwrap_or(signature);

        Ok(ConfigSignature {
            signature_header: header,
            signature: signature.to_der().as_bytes().to_vec(),
        })
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("msp_id", &self.msp_id)
            .field("certificate", &self.certificate)
            .finish_non_exhaustive()
    }
}

fn parse_signing_key(key_pem: &str) -> ReconcileResult<SigningKey> {
    if let Ok(key) = SigningKey::from_pkcs8_pem(key_pem) {
        return Ok(key);
    }
    p256::SecretKey::from_sec1_pem(key_pem)
        .map(SigningKey::from)
        .map_err(|e| ReconcileError::CertificateParse {
            context: "private key".to_string(),
            reason: e.to_string(),
        })
}

/// Creator of a signature
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedIdentity {
    pub mspid: String,
    /// PEM certificate of the signer
    pub id_bytes: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHeader {
    pub creator: SerializedIdentity,
    #[serde(with = "super::hex_bytes")]
    pub nonce: Vec<u8>,
}

/// One organization's signature over a config update payload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSignature {
    pub signature_header: SignatureHeader,
    #[serde(with = "super::hex_bytes")]
    pub signature: Vec<u8>,
}

impl ConfigSignature {
    /// MSP id the signature claims to come from
    pub fn signer(&self) -> &str {
        &self.signature_header.creator.mspid
    }

    /// Certificate the creator presented
    pub fn certificate(&self) -> ReconcileResult<Certificate> {
        Certificate::from_pem(&self.signature_header.creator.id_bytes)
    }

    /// Check the signature against the certificate embedded in its header
    pub fn verify(&self, payload: &[u8]) -> bool {
        self.try_verify(payload).is_ok()
    }

    fn try_verify(&self, payload: &[u8]) -> ReconcileResult<()> {
        let reject = |reason: String| ReconcileError::CertificateParse {
            context: format!("signature of {}", self.signer()),
            reason,
        };

        let certificate = self.certificate()?;
        let key = VerifyingKey::from_sec1_bytes(&certificate.public_key_bytes()?)
            .map_err(|e| reject(e.to_string()))?;
        let signature = Signature::from_der(&self.signature).map_err(|e| reject(e.to_string()))?;
        let message = signed_message(&self.signature_header, payload)?;

        key.verify(&message, &signature)
            .map_err(|e| reject(e.to_string()))
    }
}

fn signed_message(header: &SignatureHeader, payload: &[u8]) -> ReconcileResult<Vec<u8>> {
    let mut message = serde_json::to_vec(header).map_err(|e| ReconcileError::InvalidSpec {
        reason: format!("failed to encode signature header: {}", e),
    })?;
    message.extend_from_slice(payload);
    Ok(message)
}
