//! Validation utilities for reception, measurement and batch inputs

use rust_decimal::Decimal;

use crate::models::QualityMeasurement;
use crate::types::{hundred, max_weight};

// ============================================================================
// Quality Validations
// ============================================================================

/// Validate a percentage is in 0..=100
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > hundred() {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate every measured value of a quality measurement
pub fn validate_measurements(measurements: &QualityMeasurement) -> Result<(), &'static str> {
    for value in measurements.values() {
        validate_percentage(*value)?;
    }
    Ok(())
}

/// Validate commodity type code (e.g. `cacao`, `coffee_cherry`)
pub fn validate_commodity_type(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Commodity type is required");
    }
    if code.len() > 50 {
        return Err("Commodity type must be at most 50 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err("Commodity type must be lowercase alphanumeric or underscore");
    }
    Ok(())
}

// ============================================================================
// Weight Validations
// ============================================================================

/// Validate intake weight line items (kg)
pub fn validate_weight_lines(lines: &[Decimal]) -> Result<(), &'static str> {
    if lines.is_empty() {
        return Err("At least one weight line is required");
    }
    if lines.iter().any(|w| *w <= Decimal::ZERO) {
        return Err("Weight lines must be positive");
    }
    if lines.iter().any(|w| *w > max_weight()) {
        return Err("Weight line exceeds 1,000,000 kg");
    }
    Ok(())
}

/// Validate a lab sample wet weight
pub fn validate_sample_wet_weight(wet_weight: Decimal) -> Result<(), &'static str> {
    if wet_weight <= Decimal::ZERO {
        return Err("Sample wet weight must be positive");
    }
    if wet_weight > max_weight() {
        return Err("Sample wet weight exceeds 1,000,000 kg");
    }
    Ok(())
}

/// Validate a lab sample dried weight against its wet weight
pub fn validate_sample_dried_weight(
    wet_weight: Decimal,
    dried_weight: Decimal,
) -> Result<(), &'static str> {
    if dried_weight < Decimal::ZERO {
        return Err("Sample dried weight cannot be negative");
    }
    if dried_weight > wet_weight {
        return Err("Sample dried weight cannot exceed its wet weight");
    }
    Ok(())
}
