//! # Validation Utilities
//!
//! Input validation helpers.

/// Validate that a string is not empty.
pub fn validate_not_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate that a number is finite and strictly positive.
pub fn validate_positive_finite(value: f64, field_name: &str) -> Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} must be a finite number", field_name));
    }
    if value <= 0.0 {
        return Err(format!("{} must be greater than 0", field_name));
    }
    Ok(())
}
