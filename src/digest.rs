use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::digest::{digest, SHA256, SHA512};

/// Name of the header carrying the body digest.
pub const CONTENT_DIGEST: &str = "content-digest";

/// `Content-Digest` value for a body: `sha-512=:<base64 of SHA-512(body)>:`.
pub fn content_digest(body: &[u8]) -> String {
    let hash = digest(&SHA512, body);
    format!("sha-512=:{}:", STANDARD.encode(hash.as_ref()))
}

/// Key identifier for a raw public key: lower-case hex of its SHA-256.
pub fn key_id(public_key: &[u8]) -> String {
    hex::encode(digest(&SHA256, public_key))
}
