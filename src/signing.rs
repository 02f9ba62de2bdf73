// src/signing.rs
// Detached signature production over opaque payload bytes.
//
// Algorithm pairing is fixed (PKCS#1 v1.5 padding, SHA-256 digest) for wire
// compatibility with door-node firmware, which verifies with the paired
// public key provisioned out of band. Swapped from the ed25519 primitive
// used elsewhere in the ambient codebase for exactly this reason.

use crate::error::{EdgeError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::path::Path;

pub struct SigningService {
    key: SigningKey<Sha256>,
}

impl SigningService {
    /// Load a PKCS#8 PEM private key from `path`. Failure is fatal for the
    /// process (§4.1) — callers should propagate this up to `main`.
    pub fn load(path: &Path) -> Result<Self> {
        let pem = std::fs::read_to_string(path)
            .map_err(|e| EdgeError::Signing(format!("cannot read signing key {}: {}", path.display(), e)))?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&pem)
            .map_err(|e| EdgeError::Signing(format!("invalid signing key {}: {}", path.display(), e)))?;
        Ok(Self {
            key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Sign `payload` and return the base64-encoded signature, as embedded
    /// in outbound JSON control messages.
    pub fn sign(&self, payload: &[u8]) -> String {
        let signature = self.key.sign(payload);
        STANDARD.encode(signature.to_vec())
    }
}

/// Verify a base64-encoded signature against `payload` using the paired
/// public key. Used only by this crate's own tests; door nodes hold their
/// own copy of the public key and verify independently.
pub fn verify(public_key_pem: &str, payload: &[u8], signature_b64: &str) -> bool {
    let Ok(public_key) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
        return false;
    };
    let verifying_key: VerifyingKey<Sha256> = VerifyingKey::new(public_key);
    let Ok(raw) = STANDARD.decode(signature_b64) else {
        return false;
    };
    let Ok(signature) = Signature::try_from(raw.as_slice()) else {
        return false;
    };
    verifying_key.verify(payload, &signature).is_ok()
}
