//! The set of component values that a signature may cover.
//!
//! Component names are case-insensitive and stored lower case. Names starting
//! with `@` are derived components (pseudo-headers computed from message
//! metadata) and their values are checked against a per-name format rule when
//! they are added. Everything else is treated as a header field.

use indexmap::IndexMap;
use url::Url;

use crate::error::{Error, Result};

pub const METHOD: &str = "@method";
pub const TARGET_URI: &str = "@target-uri";
pub const STATUS: &str = "@status";
pub const AUTHORITY: &str = "@authority";
pub const SCHEME: &str = "@scheme";
pub const PATH: &str = "@path";
pub const QUERY: &str = "@query";

/// A validated, immutable mapping from lower-cased component name to value.
///
/// Insertion order is remembered so that the covered component list built from a
/// fresh set follows the order the components were added in. The order carries no
/// meaning for the signature base itself, which follows the covered component list
/// of the [SignatureInput](crate::SignatureInput).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureComponents {
    components: IndexMap<String, String>,
}

impl SignatureComponents {
    /// Build a component set from name/value pairs.
    ///
    /// Fails with [Error::InvalidInput] if no pairs are given, a name is empty, or a
    /// derived component value does not match its format rule. A later pair with the
    /// same (case-insensitive) name replaces an earlier one.
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut components = IndexMap::new();
        for (name, value) in entries {
            let (name, value) = normalize_entry(name.as_ref(), value.into())?;
            components.insert(name, value);
        }

        if components.is_empty() {
            return Err(Error::invalid_input(
                "components",
                "at least one component is required",
            ));
        }

        Ok(Self { components })
    }

    /// Build a component set from the parts of a live message.
    ///
    /// `@method` is stored upper case, `@target-uri` as given, and `@status` (for
    /// responses) as its decimal string. Every header is added under its lower-cased
    /// name.
    pub fn from_message_parts<H, K, V>(
        method: &str,
        target_uri: &str,
        headers: H,
        status: Option<u16>,
    ) -> Result<Self>
    where
        H: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> = vec![
            (METHOD.to_string(), method.to_ascii_uppercase()),
            (TARGET_URI.to_string(), target_uri.to_string()),
        ];
        if let Some(status) = status {
            entries.push((STATUS.to_string(), status.to_string()));
        }
        for (name, value) in headers {
            let name = name.as_ref();
            if name.starts_with('@') {
                return Err(Error::invalid_input(name, "header names cannot start with '@'"));
            }
            entries.push((name.to_ascii_lowercase(), value.into()));
        }
        Self::new(entries)
    }

    pub fn has_component(&self, name: &str) -> bool {
        self.components.contains_key(name.to_ascii_lowercase().as_str())
    }

    /// Case-insensitive lookup of a component value.
    pub fn get_component(&self, name: &str) -> Option<&str> {
        self.components
            .get(name.to_ascii_lowercase().as_str())
            .map(String::as_str)
    }

    pub fn method(&self) -> Option<&str> {
        self.get_component(METHOD)
    }

    pub fn target_uri(&self) -> Option<&str> {
        self.get_component(TARGET_URI)
    }

    pub fn status(&self) -> Option<&str> {
        self.get_component(STATUS)
    }

    /// Value of a header field component. Derived names never match.
    pub fn header(&self, name: &str) -> Option<&str> {
        if name.starts_with('@') {
            return None;
        }
        self.get_component(name)
    }

    /// Component names in insertion order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.components.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.components
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Always false, a component set is never empty.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns a copy with the component added or replaced.
    pub fn with_component(&self, name: &str, value: impl Into<String>) -> Result<Self> {
        let (name, value) = normalize_entry(name, value.into())?;
        let mut components = self.components.clone();
        components.insert(name, value);
        Ok(Self { components })
    }

    /// Returns a copy with the component removed. Removing the last component fails.
    pub fn without_component(&self, name: &str) -> Result<Self> {
        let mut components = self.components.clone();
        components.shift_remove(name.to_ascii_lowercase().as_str());
        if components.is_empty() {
            return Err(Error::invalid_input(
                name,
                "cannot remove the last remaining component",
            ));
        }
        Ok(Self { components })
    }
}

fn normalize_entry(name: &str, value: String) -> Result<(String, String)> {
    if name.is_empty() {
        return Err(Error::invalid_input(
            "components",
            "component names must be non-empty",
        ));
    }
    let name = name.to_ascii_lowercase();
    if name.starts_with('@') {
        validate_derived(&name, &value)?;
    }
    Ok((name, value))
}

/// Format rules for derived components. Unknown derived names pass unchecked.
fn validate_derived(name: &str, value: &str) -> Result<()> {
    let reason = match name {
        METHOD if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphabetic()) => {
            "must be a non-empty alphabetic method name"
        }
        TARGET_URI if !(value.starts_with('/') || Url::parse(value).is_ok()) => {
            "must be an absolute URL or start with '/'"
        }
        STATUS if !is_status_code(value) => "must be a three digit status code from 100 to 599",
        AUTHORITY if value.is_empty() => "must be non-empty",
        SCHEME if !matches!(value.to_ascii_lowercase().as_str(), "http" | "https") => {
            "must be http or https"
        }
        PATH if !value.is_empty() && !value.starts_with('/') => "must be empty or start with '/'",
        _ => return Ok(()),
    };
    Err(Error::invalid_input(name, reason))
}

fn is_status_code(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 3
        && (b'1'..=b'5').contains(&bytes[0])
        && bytes[1..].iter().all(u8::is_ascii_digit)
}
