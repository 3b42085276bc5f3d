use std::fmt;

use sfv::SerializeValue;

use crate::{
    components::{AUTHORITY, METHOD, SCHEME},
    error::{Error, Result},
    input::{component_item, SignatureInput},
    SignatureComponents,
};

/// The exact string that is signed, and re-derived for verification.
///
/// One `"<name>": <value>` line per covered component, in covered order, followed by
/// the `"@signature-params"` line. Lines are joined by `\n` with no trailing newline.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureBase(String);

impl SignatureBase {
    pub fn new(input: &SignatureInput, components: &SignatureComponents) -> Result<Self> {
        let mut base = String::with_capacity(256);
        for name in input.covered_components() {
            let value = components
                .get_component(name)
                .ok_or_else(|| Error::invalid_input(name.as_str(), format!("missing component `{name}`")))?;

            let name = name.to_ascii_lowercase();
            base.push_str(&component_item(&name)?.serialize_value());
            base.push_str(": ");
            canonicalize_into(&mut base, &name, value);
            base.push('\n');
        }
        base.push_str("\"@signature-params\": ");
        base.push_str(input.signature_params());
        Ok(Self(base))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SignatureBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<[u8]> for SignatureBase {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

fn canonicalize_into(buffer: &mut String, name: &str, value: &str) {
    match name {
        METHOD => buffer.push_str(&value.to_ascii_uppercase()),
        AUTHORITY | SCHEME => buffer.push_str(&value.to_ascii_lowercase()),
        derived if derived.starts_with('@') => buffer.push_str(value),
        _ => {
            // Header fields: trim, and collapse inner whitespace runs to one space.
            for (index, word) in value.split_whitespace().enumerate() {
                if index > 0 {
                    buffer.push(' ');
                }
                buffer.push_str(word);
            }
        }
    }
}
