use thiserror::Error;

/// Errors produced while building, parsing, or signing HTTP message signatures.
///
/// During verification none of these escape: [verify](crate::SignatureService::verify)
/// reports every one of them as a plain `false`.
#[derive(Debug, Error)]
pub enum Error {
    /// A component, parameter, or label failed structural or semantic validation.
    #[error("Invalid input for `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    /// The `Signature-Input` header does not match `label=(...)` at all.
    #[error("Malformed Signature-Input header: {0}")]
    MalformedHeader(String),

    /// The `Signature` header is not `label=:base64:` or the base64 is invalid.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Reading a streaming body failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Key material was rejected by the signing backend.
    #[error("Key rejected: {0}")]
    KeyRejected(String),
}

impl Error {
    pub(crate) fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_header(header: &str) -> Self {
        // Headers are attacker-controlled, keep only a short prefix in the message.
        let prefix: String = header.chars().take(64).collect();
        Self::MalformedHeader(prefix)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn invalid_input_names_field() {
        let err = Error::invalid_input("@status", "must be a three digit code");
        assert_eq!(
            err.to_string(),
            "Invalid input for `@status`: must be a three digit code"
        );
    }

    #[test]
    fn malformed_header_is_truncated() {
        let long = "x".repeat(500);
        match Error::malformed_header(&long) {
            Error::MalformedHeader(prefix) => assert_eq!(prefix.len(), 64),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
