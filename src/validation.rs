//! Field-level validation rules.
//!
//! Rules never fail fast: a [`Validator`] collects every failure and
//! [`Validator::finish`] returns them together so a form can show all
//! problems at once.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 1000;
pub const MAX_CAPACITY: i64 = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.to_string(),
                message: message.into(),
            }],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{} {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]{2,10}$").expect("static regex"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
}

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9 ()\-]{6,20}$").expect("static regex"))
}

/// Accumulates field failures.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn non_empty(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, "cannot be empty");
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.fail(field, format!("must be at most {max} characters"));
        }
    }

    /// Required, trimmed, bounded name.
    pub fn name(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, "cannot be empty");
        } else {
            self.max_len(field, value.trim(), MAX_NAME_LEN);
        }
    }

    pub fn range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.fail(field, format!("must be between {min} and {max}"));
        }
    }

    /// Venue short code: 2-10 uppercase letters or digits.
    pub fn code(&mut self, field: &str, value: &str) {
        if !code_regex().is_match(value) {
            self.fail(field, "must be 2-10 uppercase letters or digits");
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !email_regex().is_match(value) {
            self.fail(field, "must be a valid email address");
        }
    }

    pub fn phone(&mut self, field: &str, value: &str) {
        if !phone_regex().is_match(value) {
            self.fail(field, "must be a valid phone number");
        }
    }

    /// Calendar date in `YYYY-MM-DD` form.
    pub fn date(&mut self, field: &str, value: &str) {
        if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
            self.fail(field, "must be a date in YYYY-MM-DD format");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(ValidationErrors {
                errors: self.errors,
            }))
        }
    }
}

/// Outcome of checking a count against its area's capacity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityCheck {
    Within,
    /// Count exceeds capacity. A warning only; the write still goes through.
    Over { by: i64 },
}

/// A count must be non-negative; exceeding capacity is reported but allowed.
pub fn check_count(count: i64, capacity: i64) -> Result<CapacityCheck, AppError> {
    if count < 0 {
        return Err(AppError::Validation(ValidationErrors::single(
            "count",
            "cannot be negative",
        )));
    }
    if capacity > 0 && count > capacity {
        return Ok(CapacityCheck::Over {
            by: count - capacity,
        });
    }
    Ok(CapacityCheck::Within)
}

/// Increment/decrement step size.
pub fn check_amount(amount: i64) -> Result<(), AppError> {
    if amount < 1 {
        return Err(AppError::Validation(ValidationErrors::single(
            "amount",
            "must be at least 1",
        )));
    }
    Ok(())
}
