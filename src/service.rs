//! Signing and verification of whole HTTP messages.
//!
//! Signing attaches three headers:
//!
//! ```text
//! Content-Digest: sha-512=:<base64>:
//! Signature-Input: sig1=("@method" "@target-uri" "content-type" "content-digest");created=1700000000;alg="ed25519";keyid="<hex>"
//! Signature: sig1=:<base64>:
//! ```
//!
//! Both signature headers are structured field dictionaries, so a message can carry
//! several signatures side by side (`sig0=..., sig1=...`).
//!
//! Verification re-derives every covered component from the message as it is now,
//! rebuilds the signature base and checks the signature against the key named by
//! `keyid`. Every failure is reported as `false`; the reason only shows up in
//! `debug` level logs.

use std::{borrow::Cow, time::Duration};

use sfv::SerializeValue;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    algorithm::{Signer, ED25519_ALGORITHM},
    components::{AUTHORITY, METHOD, PATH, QUERY, SCHEME, STATUS, TARGET_URI},
    digest::{content_digest, key_id, CONTENT_DIGEST},
    error::{Error, Result},
    input::{ParamValue, ALG, CREATED, EXPIRES, KEYID, NONCE},
    keys::{Clock, KeyDirectory, SystemClock},
    message::{Headers, HttpMessage},
    SignatureBase, SignatureComponents, SignatureInput,
};

pub const DEFAULT_LABEL: &str = "sig1";

/// Maximum allowed difference between `created` and the verifier's clock, either way.
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

pub const SIGNATURE_INPUT_HEADER: &str = "signature-input";
pub const SIGNATURE_HEADER: &str = "signature";

/// Per-call signing settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignOptions {
    label: String,
    additional_headers: Vec<String>,
    expires_in: Option<Duration>,
    nonce: Option<String>,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            additional_headers: vec!["content-type".to_string()],
            expires_in: None,
            nonce: None,
        }
    }
}

impl SignOptions {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Headers to cover when present on the message. Absent ones are skipped.
    #[must_use]
    pub fn with_additional_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_headers = names.into_iter().map(Into::into).collect();
        self
    }

    /// Add an `expires` parameter this far after `created`.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Signs outgoing messages with the local key and verifies incoming ones against the
/// keys of a [KeyDirectory].
///
/// Holds no mutable state, so one service can be shared between threads as long as
/// its collaborators can.
#[derive(Debug)]
pub struct SignatureService<S, K, C = SystemClock> {
    signer: S,
    keys: K,
    clock: C,
}

impl<S, K> SignatureService<S, K, SystemClock> {
    pub fn new(signer: S, keys: K) -> Self {
        Self::with_clock(signer, keys, SystemClock)
    }
}

impl<S, K, C> SignatureService<S, K, C> {
    pub fn with_clock(signer: S, keys: K, clock: C) -> Self {
        Self {
            signer,
            keys,
            clock,
        }
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn key_directory(&self) -> &K {
        &self.keys
    }
}

impl<S, K, C> SignatureService<S, K, C>
where
    S: Signer,
    K: KeyDirectory,
    C: Clock,
{
    /// The `keyid` this service puts on its signatures.
    pub fn key_id(&self) -> String {
        key_id(self.signer.public_key())
    }

    /// Sign `message` in place, attaching the `Content-Digest`, `Signature-Input` and
    /// `Signature` headers.
    ///
    /// The body is read in full to compute the digest and is left re-readable. Errors
    /// are returned as-is since a signing failure means the caller is misconfigured.
    #[instrument(skip_all, fields(label = %options.label))]
    pub fn sign<M: HttpMessage>(&self, message: &mut M, options: &SignOptions) -> Result<()> {
        if self.signer.name() != ED25519_ALGORITHM {
            return Err(Error::invalid_input(ALG, "only ed25519 signers are supported"));
        }

        let body = message.body_mut().snapshot()?;
        let digest = content_digest(&body);
        let components = signing_components(message, &options.additional_headers, &digest)?;

        let key_id = self.key_id();
        let created = self.clock.now();
        let mut parameters = vec![(CREATED, ParamValue::Int(created))];
        if let Some(expires_in) = options.expires_in {
            let secs = i64::try_from(expires_in.as_secs())
                .map_err(|_| Error::invalid_input(EXPIRES, "expiry is out of range"))?;
            let expires = created
                .checked_add(secs)
                .ok_or_else(|| Error::invalid_input(EXPIRES, "expiry is out of range"))?;
            parameters.push((EXPIRES, ParamValue::Int(expires)));
        }
        parameters.push((ALG, ParamValue::from(self.signer.name())));
        parameters.push((KEYID, ParamValue::from(key_id.as_str())));
        if let Some(nonce) = &options.nonce {
            parameters.push((NONCE, ParamValue::from(nonce.as_str())));
        }

        let input = SignatureInput::new(
            options.label.as_str(),
            components.component_names(),
            parameters,
        )?;
        let base = SignatureBase::new(&input, &components)?;

        let mut signature = Vec::with_capacity(64);
        self.signer.sign(base.as_bytes(), &mut signature)?;
        let signature = sfv::Item {
            bare_item: sfv::BareItem::ByteSequence(signature),
            params: sfv::Parameters::new(),
        };
        let signature_header = format!(
            "{}={}",
            input.signature_label(),
            signature.serialize_value()
        );

        let headers = message.headers_mut();
        headers.insert_header(CONTENT_DIGEST, &digest)?;
        headers.insert_header(SIGNATURE_INPUT_HEADER, &input.to_string())?;
        headers.insert_header(SIGNATURE_HEADER, &signature_header)?;

        debug!(
            %key_id,
            covered = input.covered_components().len(),
            "Signed message"
        );
        Ok(())
    }

    /// Verify the signature on `message`.
    ///
    /// Every member of `Signature-Input` is tried in header order and the message
    /// verifies if one of them does. Returns `false` for every expected failure
    /// (missing or malformed headers, unknown key, unsupported algorithm, stale or
    /// expired signature, uncovered components, bad signature) without telling
    /// them apart.
    #[instrument(skip_all)]
    pub fn verify<M: HttpMessage>(&self, message: &mut M) -> bool {
        match self.try_verify(message) {
            Ok(verified) => verified,
            Err(error) => {
                debug!(%error, "Rejected signature");
                false
            }
        }
    }

    fn try_verify<M: HttpMessage>(&self, message: &mut M) -> Result<bool> {
        let headers = message.headers();
        let (Some(input_header), Some(signature_header)) = (
            headers.combined_value(SIGNATURE_INPUT_HEADER)?,
            headers.combined_value(SIGNATURE_HEADER)?,
        ) else {
            debug!("Missing 'Signature-Input' or 'Signature' header");
            return Ok(false);
        };

        for member in SignatureInput::parse_dictionary(&input_header)? {
            let verified = match member {
                Ok(input) => self.verify_member(message, &input, &signature_header),
                Err(error) => Err(error),
            };
            match verified {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(error) => debug!(%error, "Skipping signature"),
            }
        }
        Ok(false)
    }

    fn verify_member<M: HttpMessage>(
        &self,
        message: &mut M,
        input: &SignatureInput,
        signature_header: &str,
    ) -> Result<bool> {
        let signature = extract_signature(signature_header, input.signature_label())?;

        let key_id = input
            .key_id()
            .ok_or_else(|| Error::invalid_input(KEYID, "missing keyid parameter"))?;
        let Some(public_key) = self.keys.resolve(key_id) else {
            debug!(%key_id, "Unknown key");
            return Ok(false);
        };

        if input.algorithm() != Some(ED25519_ALGORITHM) {
            return Err(Error::invalid_input(ALG, "unsupported signature algorithm"));
        }

        let now = self.clock.now();
        if let Some(created) = input.created() {
            if now.abs_diff(created) > MAX_CLOCK_SKEW_SECS {
                debug!(created, now, "Signature creation time outside the allowed skew");
                return Ok(false);
            }
        }
        if let Some(expires) = input.expires() {
            if now > expires {
                debug!(expires, now, "Signature expired");
                return Ok(false);
            }
        }

        let components = verification_components(message, input.covered_components())?;
        let base = SignatureBase::new(input, &components)?;

        let verified = self.signer.verify(&public_key, &signature, base.as_bytes());
        if !verified {
            debug!(%key_id, label = input.signature_label(), "Signature mismatch");
        }
        Ok(verified)
    }
}

/// Components covered when signing: the request line or status, the requested headers
/// that are present, and the body digest last.
fn signing_components<M: HttpMessage>(
    message: &M,
    additional_headers: &[String],
    digest: &str,
) -> Result<SignatureComponents> {
    let mut entries: Vec<(String, String)> = Vec::with_capacity(additional_headers.len() + 3);
    if let Some(method) = message.method() {
        entries.push((METHOD.to_string(), method.to_ascii_uppercase()));
    }
    if let Some(target_uri) = message.target_uri() {
        entries.push((TARGET_URI.to_string(), target_uri.into_owned()));
    }
    if let Some(status) = message.status() {
        entries.push((STATUS.to_string(), status.to_string()));
    }
    if entries.is_empty() {
        return Err(Error::invalid_input(
            "message",
            "neither a request nor a response",
        ));
    }

    for name in additional_headers {
        let name = name.to_ascii_lowercase();
        if name == CONTENT_DIGEST || entries.iter().any(|(existing, _)| *existing == name) {
            continue;
        }
        if let Some(value) = message.headers().combined_value(&name)? {
            entries.push((name, value));
        }
    }
    entries.push((CONTENT_DIGEST.to_string(), digest.to_string()));

    SignatureComponents::new(entries)
}

/// Re-derive exactly the covered components from the message as it is now.
fn verification_components<M: HttpMessage>(
    message: &mut M,
    covered: &[String],
) -> Result<SignatureComponents> {
    let mut entries = Vec::with_capacity(covered.len());
    for name in covered {
        let name = name.to_ascii_lowercase();
        let value = match name.as_str() {
            METHOD => message.method().map(str::to_string),
            TARGET_URI => message.target_uri().map(Cow::into_owned),
            STATUS => message.status().map(|status| status.to_string()),
            AUTHORITY | SCHEME | PATH | QUERY => target_component(message, &name)?,
            CONTENT_DIGEST => Some(content_digest(&message.body_mut().snapshot()?)),
            derived if derived.starts_with('@') => None,
            header => message.headers().combined_value(header)?,
        };
        let value = value.ok_or_else(|| {
            Error::invalid_input(name.as_str(), "component is not available on the message")
        })?;
        entries.push((name, value));
    }
    SignatureComponents::new(entries)
}

/// `@authority`, `@scheme`, `@path` or `@query` taken from the target URI. An
/// origin-form target takes its authority from the `Host` header and has no scheme.
fn target_component<M: HttpMessage>(message: &M, name: &str) -> Result<Option<String>> {
    let Some(target) = message.target_uri() else {
        return Ok(None);
    };

    let (scheme, authority, path, query) = match Url::parse(&target) {
        Ok(url) => {
            let authority = url.host_str().map(|host| match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            });
            (
                Some(url.scheme().to_string()),
                authority,
                url.path().to_string(),
                url.query().map(str::to_string),
            )
        }
        Err(_) => {
            let (path, query) = match target.split_once('?') {
                Some((path, query)) => (path, Some(query.to_string())),
                None => (&target[..], None),
            };
            (
                None,
                message.headers().combined_value("host")?,
                path.to_string(),
                query,
            )
        }
    };

    Ok(match name {
        SCHEME => scheme,
        AUTHORITY => authority,
        PATH => Some(path),
        QUERY => Some(format!("?{}", query.unwrap_or_default())),
        _ => None,
    })
}

/// Pull the `label=:base64:` member out of a `Signature` dictionary and decode it.
fn extract_signature(header: &str, label: &str) -> Result<Vec<u8>> {
    let dictionary = sfv::Parser::new(header.trim())
        .parse_dictionary()
        .map_err(|_| Error::InvalidSignature("not a structured field dictionary".to_string()))?;

    let entry = dictionary
        .into_iter()
        .find_map(|(key, entry)| (key.as_str() == label).then_some(entry))
        .ok_or_else(|| Error::InvalidSignature(format!("no signature labelled `{label}`")))?;

    match entry {
        sfv::ListEntry::Item(sfv::Item {
            bare_item: sfv::GenericBareItem::ByteSequence(signature),
            ..
        }) => Ok(signature),
        _ => Err(Error::InvalidSignature(format!(
            "`{label}` is not a byte sequence"
        ))),
    }
}
