//! The `Signature-Input` control structure.
//!
//! Wire form is a structured field dictionary (RFC 8941) whose members look like
//! `label=("comp1" "comp2" ...);key=value`. String parameter values are sf-strings
//! and integers are bare digits.

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use sfv::SerializeValue;

use crate::error::{Error, Result};

pub const CREATED: &str = "created";
pub const EXPIRES: &str = "expires";
pub const ALG: &str = "alg";
pub const KEYID: &str = "keyid";
pub const NONCE: &str = "nonce";

/// A signature parameter value.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ParamValue {
    /// Serialized as an sf-string, so it must be printable ASCII.
    Str(String),
    /// Serialized as bare digits, at most fifteen of them.
    Int(i64),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Str(_) => None,
            Self::Int(value) => Some(*value),
        }
    }

    fn to_bare_item(&self, key: &str) -> Result<sfv::BareItem> {
        match self {
            Self::Str(value) => Ok(sfv::BareItem::String(sf_string(key, value)?)),
            Self::Int(value) => sfv::Integer::try_from(*value)
                .map(|number| sfv::BareItem::Integer(number))
                .map_err(|_| Error::invalid_input(key, "integer out of range")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// A labelled signature description: which components are covered, in which
/// order, and with which parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureInput {
    label: String,
    covered_components: Vec<String>,
    parameters: IndexMap<String, ParamValue>,
    serialized_params: String,
}

impl SignatureInput {
    /// Build a validated signature input.
    ///
    /// The label must be a lower-case dictionary key made of letters, digits or
    /// `'_'`. At least one non-empty component name is required. `created` and
    /// `expires` must be non-negative integers; `nonce`, `alg` and `keyid` must be
    /// non-empty strings. Other parameters are kept as given, in the order given.
    ///
    /// Every name and string value must be printable ASCII and every integer must
    /// fit a structured field integer, so that the input always serializes.
    pub fn new<C, S, P, K>(label: impl Into<String>, covered_components: C, parameters: P) -> Result<Self>
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
        P: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        let label = label.into();
        if !is_label(&label) {
            return Err(Error::invalid_input(
                "label",
                "must start with a lower-case letter and contain only lower-case letters, digits or '_'",
            ));
        }

        let covered_components: Vec<String> =
            covered_components.into_iter().map(Into::into).collect();
        if covered_components.is_empty() {
            return Err(Error::invalid_input(
                "covered_components",
                "at least one covered component is required",
            ));
        }
        if covered_components.iter().any(String::is_empty) {
            return Err(Error::invalid_input(
                "covered_components",
                "component names must be non-empty",
            ));
        }
        let items = covered_components
            .iter()
            .map(|name| component_item(name))
            .collect::<Result<Vec<_>>>()?;

        let mut checked = IndexMap::new();
        let mut params = sfv::Parameters::new();
        for (key, value) in parameters {
            let key: String = key.into();
            validate_parameter(&key, &value)?;
            let sf_key = sfv::Key::from_string(key.clone())
                .map_err(|_| Error::invalid_input(key.as_str(), "not a valid parameter name"))?;
            params.insert(sf_key, value.to_bare_item(&key)?);
            checked.insert(key, value);
        }

        let serialized_params = vec![sfv::ListEntry::InnerList(sfv::InnerList::with_params(
            items, params,
        ))]
        .serialize_value()
        .ok_or_else(|| Error::invalid_input("covered_components", "cannot be serialized"))?;

        Ok(Self {
            label,
            covered_components,
            parameters: checked,
            serialized_params,
        })
    }

    /// Parse every member of a `Signature-Input` dictionary, in header order.
    ///
    /// Fails with [Error::MalformedHeader] if the value is not a dictionary at all.
    /// Members that are not valid signature inputs come back as errors in place, so
    /// one bad member does not hide the others.
    pub fn parse_dictionary(header: &str) -> Result<Vec<Result<Self>>> {
        let dictionary = sfv::Parser::new(header.trim())
            .parse_dictionary()
            .map_err(|_| Error::malformed_header(header))?;

        Ok(dictionary
            .into_iter()
            .map(|(label, entry)| Self::from_member(header, label.as_str(), entry))
            .collect())
    }

    fn from_member(header: &str, label: &str, entry: sfv::ListEntry) -> Result<Self> {
        let malformed = || Error::malformed_header(header);
        if !is_label(label) {
            return Err(malformed());
        }
        let sfv::ListEntry::InnerList(list) = entry else {
            return Err(malformed());
        };

        let mut covered = Vec::with_capacity(list.items.len());
        for item in list.items {
            if !item.params.is_empty() {
                return Err(Error::invalid_input(
                    "covered_components",
                    "component parameters are not supported",
                ));
            }
            // Only sf-strings name components, anything else in the list is ignored.
            if let sfv::GenericBareItem::String(name) = item.bare_item {
                covered.push(name.as_str().to_string());
            }
        }
        if covered.is_empty() {
            return Err(Error::invalid_input(
                "covered_components",
                "no quoted component names in the inner list",
            ));
        }

        let mut parameters = Vec::with_capacity(list.params.len());
        for (key, value) in list.params {
            let key = key.as_str().to_string();
            let value = param_value(&key, value).ok_or_else(malformed)?;
            parameters.push((key, value));
        }

        Self::new(label, covered, parameters)
    }

    pub fn signature_label(&self) -> &str {
        &self.label
    }

    pub fn covered_components(&self) -> &[String] {
        &self.covered_components
    }

    /// Parameters in insertion order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &ParamValue)> + '_ {
        self.parameters.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }

    pub fn parameter(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    pub fn created(&self) -> Option<i64> {
        self.parameter(CREATED).and_then(ParamValue::as_int)
    }

    pub fn expires(&self) -> Option<i64> {
        self.parameter(EXPIRES).and_then(ParamValue::as_int)
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.parameter(ALG).and_then(ParamValue::as_str)
    }

    pub fn key_id(&self) -> Option<&str> {
        self.parameter(KEYID).and_then(ParamValue::as_str)
    }

    pub fn nonce(&self) -> Option<&str> {
        self.parameter(NONCE).and_then(ParamValue::as_str)
    }

    /// The inner list and parameters without the label, which is also the value of
    /// the `@signature-params` line of the signature base.
    pub fn signature_params(&self) -> &str {
        &self.serialized_params
    }
}

impl fmt::Display for SignatureInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.label, self.serialized_params)
    }
}

impl FromStr for SignatureInput {
    type Err = Error;

    /// Parse a `Signature-Input` header value holding exactly one member.
    ///
    /// Fails with [Error::MalformedHeader] if the value is not shaped like
    /// `label=(...)`, and with [Error::InvalidInput] if the list holds no quoted
    /// component names or a parameter has the wrong type. Use
    /// [SignatureInput::parse_dictionary] for headers carrying several signatures.
    fn from_str(header: &str) -> Result<Self> {
        let mut members = Self::parse_dictionary(header)?.into_iter();
        match (members.next(), members.next()) {
            (Some(member), None) => member,
            _ => Err(Error::malformed_header(header)),
        }
    }
}

/// A covered component name as an inner list item, which is also how it is
/// written at the start of a signature base line.
pub(crate) fn component_item(name: &str) -> Result<sfv::Item> {
    Ok(sfv::Item {
        bare_item: sfv::BareItem::String(sf_string(name, name)?),
        params: sfv::Parameters::new(),
    })
}

fn sf_string(field: &str, value: &str) -> Result<sfv::String> {
    sfv::String::from_string(value.to_string())
        .map_err(|_| Error::invalid_input(field, "must be printable ASCII"))
}

/// Labels are dictionary keys restricted to word characters.
fn is_label(label: &str) -> bool {
    let mut chars = label.chars();
    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// `None` for value types a signature parameter cannot take.
fn param_value(key: &str, value: sfv::BareItem) -> Option<ParamValue> {
    let text = match value {
        sfv::GenericBareItem::Integer(number) => {
            let number = i64::from(number);
            return Some(match key {
                NONCE | ALG | KEYID => ParamValue::Str(number.to_string()),
                _ => ParamValue::Int(number),
            });
        }
        sfv::GenericBareItem::String(text) => text.as_str().to_string(),
        sfv::GenericBareItem::Token(token) => token.as_str().to_string(),
        _ => return None,
    };

    let all_digits = !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit());
    if all_digits && (key == CREATED || key == EXPIRES) {
        if let Ok(number) = text.parse::<i64>() {
            return Some(ParamValue::Int(number));
        }
    }
    Some(ParamValue::Str(text))
}

fn validate_parameter(key: &str, value: &ParamValue) -> Result<()> {
    match (key, value) {
        (CREATED | EXPIRES, ParamValue::Int(number)) if *number >= 0 => Ok(()),
        (CREATED | EXPIRES, _) => Err(Error::invalid_input(key, "must be a non-negative integer")),
        (NONCE | ALG | KEYID, ParamValue::Str(text)) if !text.is_empty() => Ok(()),
        (NONCE | ALG | KEYID, _) => Err(Error::invalid_input(key, "must be a non-empty string")),
        _ => Ok(()),
    }
}
