use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::types::EntityId;

/// A trait that entities should implement for validation.
pub trait Validate {
    /// Validates the entity and returns an error if validation fails.
    fn validate(&self) -> DomainResult<()>;
}

// Common regex patterns
fn shortcode_regex() -> &'static Regex {
    static SHORTCODE_REGEX: OnceLock<Regex> = OnceLock::new();
    SHORTCODE_REGEX.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9]{1,9}$").unwrap())
}

fn reference_regex() -> &'static Regex {
    static REFERENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    REFERENCE_REGEX.get_or_init(|| Regex::new(r"^PR-\d{4}(-\d{2}(\.\d+)?)?$").unwrap())
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self
    where T: Default + PartialEq {
        if self.value.is_none() || self.value == Some(T::default()) {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    pub fn validate_with<F>(mut self, validator: F) -> Self
    where F: FnOnce(&T) -> Result<(), ValidationError> {
        if let Some(value) = &self.value {
            if let Err(err) = validator(value) {
                self.errors.push(err);
            }
        }
        self
    }

    /// Complete validation and return result
    pub fn validate(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            // Return the first error for simplicity
            Err(DomainError::Validation(self.errors[0].clone()))
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    pub fn min_length(mut self, min: usize) -> Self {
        if let Some(value) = &self.value {
            if value.len() < min {
                self.errors.push(ValidationError::min_length(&self.field_name, min));
            }
        }
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        if let Some(value) = &self.value {
            if value.len() > max {
                self.errors.push(ValidationError::max_length(&self.field_name, max));
            }
        }
        self
    }

    /// Client shortcodes: uppercase alphanumeric, 2-10 characters.
    pub fn shortcode(mut self) -> Self {
        if let Some(value) = &self.value {
            if !shortcode_regex().is_match(value) {
                self.errors.push(ValidationError::format(
                    &self.field_name,
                    "expected 2-10 uppercase alphanumeric characters",
                ));
            }
        }
        self
    }

    /// Project or milestone reference (`PR-0001`, `PR-0001-01.5`).
    pub fn reference_number(mut self) -> Self {
        if let Some(value) = &self.value {
            if !reference_regex().is_match(value) {
                self.errors.push(ValidationError::format(
                    &self.field_name,
                    "expected PR-nnnn or PR-nnnn-nn reference",
                ));
            }
        }
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        if let Some(value) = &self.value {
            if !allowed.contains(&value.as_str()) {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    &format!("must be one of: {}", allowed.join(", ")),
                ));
            }
        }
        self
    }
}

/// Decimal-specific validations (amounts, hours)
impl ValidationBuilder<Decimal> {
    pub fn positive(mut self) -> Self {
        if let Some(value) = &self.value {
            if value.is_sign_negative() || value.is_zero() {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    "must be greater than zero",
                ));
            }
        }
        self
    }

    pub fn non_negative(mut self) -> Self {
        if let Some(value) = &self.value {
            if value.is_sign_negative() {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    "must not be negative",
                ));
            }
        }
        self
    }

    pub fn max_value(mut self, max: Decimal) -> Self {
        if let Some(value) = &self.value {
            if *value > max {
                self.errors.push(ValidationError::range(
                    &self.field_name,
                    Decimal::ZERO,
                    max,
                ));
            }
        }
        self
    }
}

/// Id-specific validations
impl ValidationBuilder<EntityId> {
    pub fn valid_id(mut self) -> Self {
        if let Some(value) = &self.value {
            if *value <= 0 {
                self.errors.push(ValidationError::invalid_value(
                    &self.field_name,
                    "must be a positive id",
                ));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_shortcode_validation() {
        assert!(shortcode_regex().is_match("ACME"));
        assert!(shortcode_regex().is_match("B2B"));
        assert!(!shortcode_regex().is_match("acme"));
        assert!(!shortcode_regex().is_match("A"));
        assert!(!shortcode_regex().is_match("1ACME"));
    }

    #[test]
    fn test_reference_validation() {
        assert!(reference_regex().is_match("PR-0001"));
        assert!(reference_regex().is_match("PR-0001-01"));
        assert!(reference_regex().is_match("PR-0001-01.5"));
        assert!(!reference_regex().is_match("PR-1"));
        assert!(!reference_regex().is_match("PR-0001-1"));
    }

    #[test]
    fn test_validation_builder() {
        let result = ValidationBuilder::new("name", Some("".to_string()))
            .required()
            .validate();
        assert!(result.is_err());

        let result = ValidationBuilder::new("name", Some("Acme Corp".to_string()))
            .required()
            .min_length(2)
            .max_length(100)
            .validate();
        assert!(result.is_ok());
    }

    #[test]
    fn test_decimal_builders() {
        assert!(ValidationBuilder::new("amount", Some(dec!(10.00))).positive().validate().is_ok());
        assert!(ValidationBuilder::new("amount", Some(dec!(0))).positive().validate().is_err());
        assert!(ValidationBuilder::new("amount", Some(dec!(-1))).non_negative().validate().is_err());
        assert!(ValidationBuilder::new("amount", Some(dec!(5)))
            .max_value(dec!(4))
            .validate()
            .is_err());
    }

    #[test]
    fn test_one_of() {
        let result = ValidationBuilder::new("status", Some("active".to_string()))
            .one_of(&["active", "on_hold"])
            .validate();
        assert!(result.is_ok());

        let result = ValidationBuilder::new("status", Some("archived".to_string()))
            .one_of(&["active", "on_hold"])
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_valid_id() {
        assert!(ValidationBuilder::new("project_id", Some(3i64)).valid_id().validate().is_ok());
        assert!(ValidationBuilder::new("project_id", Some(0i64)).valid_id().validate().is_err());
    }
}
