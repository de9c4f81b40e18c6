//! Field validation rules.
//!
//! Every rule is synchronous and side-effect free, so form layers re-run
//! [`validate_model`] after each keystroke.

use super::{Field, ParameterModel};
use crate::error::{FieldError, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Upper bound shared by every numeric field.
pub const MAX_VALUE: f64 = 1e6;

static NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+\.?[0-9]*$").unwrap());

static HEX_COLOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap()
});

/// Bounds of one numeric field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberRule {
    pub field: Field,
    /// Smallest accepted value; `min` itself is valid.
    pub min: f64,
    pub max: f64,
    /// Required fields reject the empty string; optional ones treat it as "omitted".
    pub required: bool,
}

const fn margin(field: Field) -> NumberRule {
    NumberRule {
        field,
        min: 0.0,
        max: MAX_VALUE,
        required: false,
    }
}

/// Validator table for the numeric fields, in form order.
pub const NUMBER_RULES: [NumberRule; 6] = [
    margin(Field::LeftMargin),
    margin(Field::RightMargin),
    margin(Field::TopMargin),
    margin(Field::BottomMargin),
    NumberRule {
        field: Field::Spacing,
        min: 1.0,
        max: MAX_VALUE,
        required: true,
    },
    NumberRule {
        field: Field::LineWidth,
        min: 0.0,
        max: MAX_VALUE,
        required: true,
    },
];

impl NumberRule {
    pub fn for_field(field: Field) -> Option<&'static NumberRule> {
        NUMBER_RULES.iter().find(|r| r.field == field)
    }

    pub fn check(&self, value: &str) -> Result<(), ValidationError> {
        if value.is_empty() {
            return if self.required {
                Err(ValidationError::InvalidNumber)
            } else {
                Ok(())
            };
        }
        if !NUMBER_PATTERN.is_match(value) {
            return Err(ValidationError::InvalidNumber);
        }
        let x: f64 = value
            .parse()
            .map_err(|_| ValidationError::InvalidNumber)?;
        if !x.is_finite() {
            return Err(ValidationError::InvalidNumber);
        }
        if x < self.min {
            return Err(ValidationError::BelowMinimum { min: self.min });
        }
        if x > self.max {
            return Err(ValidationError::AboveMaximum { max: self.max });
        }
        Ok(())
    }
}

pub fn check_color(value: &str) -> Result<(), ValidationError> {
    if HEX_COLOR_PATTERN.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidColor)
    }
}

pub fn check_file_name(name: Option<&str>) -> Result<(), ValidationError> {
    match name {
        None => Err(ValidationError::MissingFile),
        Some(n) if n.to_ascii_lowercase().ends_with(".pdf") => Ok(()),
        Some(n) => Err(ValidationError::NotAPdf {
            name: n.to_string(),
        }),
    }
}

/// Result of validating a whole model: every failing field, in form order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
    errors: Vec<FieldError>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// The inline message source for one field.
    pub fn error_for(&self, field: Field) -> Option<&ValidationError> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| &e.error)
    }

    fn push(&mut self, field: Field, result: Result<(), ValidationError>) {
        if let Err(error) = result {
            self.errors.push(FieldError { field, error });
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

pub fn validate_model(model: &ParameterModel) -> Validation {
    let mut v = Validation::default();
    for rule in &NUMBER_RULES {
        let value = model
            .text_field(rule.field)
            .map(String::as_str)
            .unwrap_or_default();
        v.push(rule.field, rule.check(value));
    }
    v.push(Field::Color, check_color(&model.color));
    v.push(
        Field::File,
        check_file_name(model.file.as_ref().map(|f| f.name())),
    );
    v
}
