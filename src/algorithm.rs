use std::{fmt::Debug, io::Write};

use ring::{
    rand::SystemRandom,
    signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519},
};

use crate::error::{Error, Result};

/// The only signature algorithm accepted by [SignatureService](crate::SignatureService).
pub const ED25519_ALGORITHM: &str = "ed25519";

/// The asymmetric primitive used to produce and check signatures over a signature
/// base. Implementations hold the local private key; verification is done against
/// any public key handed in by the caller.
pub trait Signer {
    /// The name which will be used for the `alg` signature parameter.
    fn name(&self) -> &str;

    /// Raw bytes of the local public key. The `keyid` parameter is derived from these.
    fn public_key(&self) -> &[u8];

    /// Digitally sign a block of data.
    fn sign(&self, data: &[u8], output: &mut dyn Write) -> std::io::Result<()>;

    /// Check `signature` over `data` against a raw public key. Must not leak timing
    /// information about where a mismatch occurred.
    fn verify(&self, public_key: &[u8], signature: &[u8], data: &[u8]) -> bool;
}

/// Ed25519 signing backed by `ring`.
pub struct Ed25519 {
    key: Ed25519KeyPair,
}

impl Ed25519 {
    pub fn new(key: Ed25519KeyPair) -> Self {
        Self { key }
    }

    /// Load a key pair from a PKCS#8 v2 document.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self> {
        let key = Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|err| Error::KeyRejected(err.to_string()))?;
        Ok(Self::new(key))
    }

    /// Derive a key pair from a 32 byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        let key = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|err| Error::KeyRejected(err.to_string()))?;
        Ok(Self::new(key))
    }

    /// Generate a fresh PKCS#8 v2 document using the system random source.
    pub fn generate_pkcs8() -> Result<Vec<u8>> {
        let document = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new())
            .map_err(|err| Error::KeyRejected(err.to_string()))?;
        Ok(document.as_ref().to_vec())
    }
}

impl Signer for Ed25519 {
    fn name(&self) -> &str {
        ED25519_ALGORITHM
    }

    fn public_key(&self) -> &[u8] {
        self.key.public_key().as_ref()
    }

    fn sign(&self, data: &[u8], output: &mut dyn Write) -> std::io::Result<()> {
        output.write_all(self.key.sign(data).as_ref())
    }

    fn verify(&self, public_key: &[u8], signature: &[u8], data: &[u8]) -> bool {
        UnparsedPublicKey::new(&ED25519, public_key)
            .verify(data, signature)
            .is_ok()
    }
}

impl Debug for Ed25519 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519")
            .field("public_key", &hex::encode(self.public_key()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Ed25519, Signer};

    #[test]
    fn sign_then_verify() {
        let signer = Ed25519::from_seed(&[7; 32]).unwrap();
        let mut signature = Vec::new();
        signer.sign(b"hello", &mut signature).unwrap();

        assert_eq!(signature.len(), 64);
        assert!(signer.verify(signer.public_key(), &signature, b"hello"));
        assert!(!signer.verify(signer.public_key(), &signature, b"hellO"));
    }

    #[test]
    fn verify_with_other_key_fails() {
        let signer = Ed25519::from_seed(&[7; 32]).unwrap();
        let other = Ed25519::from_seed(&[8; 32]).unwrap();
        let mut signature = Vec::new();
        signer.sign(b"hello", &mut signature).unwrap();

        assert!(!signer.verify(other.public_key(), &signature, b"hello"));
    }

    #[test]
    fn generated_pkcs8_loads() {
        let pkcs8 = Ed25519::generate_pkcs8().unwrap();
        let signer = Ed25519::from_pkcs8(&pkcs8).unwrap();
        assert_eq!(signer.public_key().len(), 32);
    }

    #[test]
    fn bad_seed_is_rejected() {
        assert!(Ed25519::from_seed(&[1; 5]).is_err());
        assert!(Ed25519::from_pkcs8(b"not a key").is_err());
    }
}
