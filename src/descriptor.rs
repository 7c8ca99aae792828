//! Field descriptors: per field validation and the required marker.

use std::fmt;
use std::sync::Arc;

use fnv::FnvHashMap;

/// Normalizes a raw extracted string into the field's value, or rejects it.
pub type FieldValidator = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// How a single named field is validated and whether it must be present.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub required: bool,
    pub validator: FieldValidator,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, validator: FieldValidator) -> Self {
        Self {
            name: name.into(),
            required: false,
            validator,
        }
    }

    /// Whitespace normalized text, the default for unconfigured fields.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(validators::text))
    }

    /// First numeric run in the value.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(validators::number))
    }

    /// First price like numeric run, decimal part included.
    pub fn price(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(validators::price))
    }

    /// Accepts only values that parse as an absolute URL.
    pub fn url(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(validators::url))
    }

    /// Marks the field as required for a record to count as extracted.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish()
    }
}

/// Validation configuration for all fields of one record type. Fields not
/// listed here fall back to plain text validation.
#[derive(Debug, Clone, Default)]
pub struct ItemDescriptor {
    fields: FnvHashMap<String, FieldDescriptor>,
}

impl ItemDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// The validator configured for `field`, text normalization otherwise.
    pub fn validator_for(&self, field: &str) -> FieldValidator {
        self.fields
            .get(field)
            .map(|d| d.validator.clone())
            .unwrap_or_else(|| Arc::new(validators::text))
    }

    /// Names of all fields marked required.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .values()
            .filter(|d| d.required)
            .map(|d| d.name.as_str())
    }
}

pub mod validators {
    use lazy_static::lazy_static;
    use regex::Regex;

    lazy_static! {
        static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
        static ref RE_NUMBER: Regex = Regex::new(r"\d+").unwrap();
        static ref RE_PRICE: Regex = Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap();
    }

    /// Collapse whitespace runs and trim; empty results are rejected.
    pub fn text(value: &str) -> Option<String> {
        let normalized = RE_WHITESPACE.replace_all(value.trim(), " ");
        if normalized.is_empty() {
            None
        } else {
            Some(normalized.into_owned())
        }
    }

    /// First run of digits in the value.
    pub fn number(value: &str) -> Option<String> {
        RE_NUMBER.find(value).map(|m| m.as_str().to_string())
    }

    /// First numeric run including thousands separators and decimals.
    pub fn price(value: &str) -> Option<String> {
        RE_PRICE.find(value).map(|m| m.as_str().to_string())
    }

    /// The value itself when it parses as an absolute URL.
    pub fn url(value: &str) -> Option<String> {
        let trimmed = value.trim();
        url::Url::parse(trimmed).ok().map(|_| trimmed.to_string())
    }
}
