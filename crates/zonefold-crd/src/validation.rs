//! Field-level validation results and the DNS name grammar
//!
//! Admission never stops at the first problem: every check appends to a
//! `FieldErrors` list so the operator sees all offending fields at once.

use serde::Serialize;
use std::fmt;

/// Maximum length of a domain name in presentation form, without the root dot
pub const MAX_DOMAIN_LENGTH: usize = 253;

/// Maximum length of a single label
pub const MAX_LABEL_LENGTH: usize = 63;

/// Message attached to every name field that fails the grammar
pub const INVALID_DOMAIN: &str = "not a valid domain";

/// Dotted path to a field, e.g. `record.a[1]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }

    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{}]", self.0, i))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single rejected field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl FieldError {
    pub fn invalid(path: &FieldPath, value: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            field: path.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }

    pub fn required(path: &FieldPath) -> Self {
        Self {
            field: path.to_string(),
            value: String::new(),
            message: "Required value".to_string(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}: {}", self.field, self.message)
        } else {
            write!(f, "{}: Invalid value: {:?}: {}", self.field, self.value, self.message)
        }
    }
}

/// Ordered list of field errors; empty means accepted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = FieldError>) {
        self.0.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Errors reported against exactly this field path
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.0.iter().filter(move |e| e.field == field)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", err)?;
        }
        f.write_str("]")
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Check a domain name against the DNS grammar.
///
/// Accepts an optional trailing root dot and a leading `*` wildcard label.
/// Labels are 1-63 characters of letters, digits, `-` and `_`, and may not
/// start or end with `-`. The root name `.` on its own is valid.
pub fn validate_domain_name(name: &str) -> std::result::Result<(), String> {
    if name == "." {
        return Ok(());
    }

    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return Err("domain name cannot be empty".to_string());
    }
    if name.len() > MAX_DOMAIN_LENGTH {
        return Err(format!(
            "domain name exceeds maximum length of {} characters",
            MAX_DOMAIN_LENGTH
        ));
    }

    for (i, label) in name.split('.').enumerate() {
        validate_label(label, i == 0)?;
    }

    Ok(())
}

fn validate_label(label: &str, allow_wildcard: bool) -> std::result::Result<(), String> {
    if label.is_empty() {
        return Err("empty label (consecutive dots)".to_string());
    }

    if label == "*" {
        return if allow_wildcard {
            Ok(())
        } else {
            Err("wildcard (*) only allowed as first label".to_string())
        };
    }

    if label.len() > MAX_LABEL_LENGTH {
        return Err(format!(
            "label '{}' exceeds maximum length of {} characters",
            label, MAX_LABEL_LENGTH
        ));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(format!("label '{}' must not start or end with a hyphen", label));
    }

    if let Some(c) = label
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(format!("label '{}' contains invalid character '{}'", label, c));
    }

    Ok(())
}

/// Append a `not a valid domain` error for `value` at `path` if it fails the grammar
pub(crate) fn check_domain(path: &FieldPath, value: &str, errors: &mut FieldErrors) {
    if let Err(reason) = validate_domain_name(value) {
        tracing::trace!(field = %path, value, reason = %reason, "Rejected domain name");
        errors.push(FieldError::invalid(path, value, INVALID_DOMAIN));
    }
}
