//! RFC 9421 HTTP Message Signatures.
//!
//! A [SignatureService] signs a message by building [SignatureComponents] from it,
//! describing them with a [SignatureInput], serialising both into a [SignatureBase]
//! and signing that with Ed25519. The result is attached as the `Signature-Input`,
//! `Signature` and `Content-Digest` headers. Verification runs the same steps in
//! reverse from the received headers and answers with a plain `bool`.
#![forbid(unsafe_code)]

mod algorithm;
mod base;
pub mod components;
pub mod digest;
mod error;
pub mod input;
mod keys;
pub mod message;
mod service;

pub use algorithm::{Ed25519, Signer, ED25519_ALGORITHM};
pub use base::SignatureBase;
pub use components::SignatureComponents;
pub use error::{Error, Result};
pub use input::{ParamValue, SignatureInput};
pub use keys::{Clock, FixedClock, KeyDirectory, StaticKeyDirectory, SystemClock};
pub use message::{Headers, HttpMessage, MessageBody, OwnedHttpMessage};
pub use service::{
    SignOptions, SignatureService, DEFAULT_LABEL, MAX_CLOCK_SKEW_SECS, SIGNATURE_HEADER,
    SIGNATURE_INPUT_HEADER,
};
