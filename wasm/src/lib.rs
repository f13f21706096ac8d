//! WebAssembly module for reception reconciliation
//!
//! Provides client-side previews for:
//! - Quality discount on a reception
//! - Lab sample humidity
//! - Batch dried weight allocation
//! - Offline input validation
//!
//! Previews run the same engine code as the server, so what the scale
//! operator sees is what will be stored.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{allocate_dried_weight, compute_discount, MemberContribution};

fn parse_decimal(field: &str, value: f64) -> Result<Decimal, String> {
    Decimal::try_from(value).map_err(|_| format!("{} is not a finite number", field))
}

fn discount_preview(
    total_weight: f64,
    thresholds_json: &str,
    measured_json: &str,
) -> Result<String, String> {
    let total_weight = parse_decimal("total_weight", total_weight)?;
    let rules: Vec<ThresholdRule> = serde_json::from_str(thresholds_json)
        .map_err(|e| format!("Invalid thresholds JSON: {}", e))?;
    let measured: BTreeMap<QualityMetric, Decimal> = serde_json::from_str(measured_json)
        .map_err(|e| format!("Invalid measurements JSON: {}", e))?;

    let result = compute_discount(total_weight, &rules, &measured).map_err(|e| e.to_string())?;
    serde_json::to_string(&result).map_err(|e| e.to_string())
}

fn allocation_preview(members_json: &str, total_dried_weight: f64) -> Result<String, String> {
    let total_dried_weight = parse_decimal("total_dried_weight", total_dried_weight)?;
    let members: Vec<MemberContribution> = serde_json::from_str(members_json)
        .map_err(|e| format!("Invalid members JSON: {}", e))?;

    let allocations =
        allocate_dried_weight(&members, total_dried_weight).map_err(|e| e.to_string())?;
    serde_json::to_string(&allocations).map_err(|e| e.to_string())
}

/// Preview the quality discount for a reception.
///
/// `thresholds_json` is an array of `{metric, threshold_percent, enabled}`,
/// `measured_json` an object keyed by metric. Returns the discount result
/// as JSON, including the per-metric breakdown.
#[wasm_bindgen]
pub fn preview_discount(
    total_weight: f64,
    thresholds_json: &str,
    measured_json: &str,
) -> Result<String, JsValue> {
    discount_preview(total_weight, thresholds_json, measured_json)
        .map_err(|e| JsValue::from_str(&e))
}

/// Preview how a batch's dried weight would be apportioned
#[wasm_bindgen]
pub fn preview_batch_allocation(members_json: &str, total_dried_weight: f64) -> Result<String, JsValue> {
    allocation_preview(members_json, total_dried_weight).map_err(|e| JsValue::from_str(&e))
}

/// Humidity percentage from a lab sample's wet and dried weights
#[wasm_bindgen]
pub fn calculate_lab_humidity(wet_weight: f64, dried_weight: f64) -> f64 {
    let (Ok(wet), Ok(dried)) = (Decimal::try_from(wet_weight), Decimal::try_from(dried_weight))
    else {
        return 0.0;
    };
    lab_humidity_percent(wet, dried)
        .to_string()
        .parse()
        .unwrap_or(0.0)
}

/// Validate a single measured or threshold percentage
#[wasm_bindgen]
pub fn is_valid_percentage(value: f64) -> bool {
    Decimal::try_from(value)
        .map(|d| validate_percentage(d).is_ok())
        .unwrap_or(false)
}

/// Validate a commodity type code before it is sent to the server
#[wasm_bindgen]
pub fn is_valid_commodity_type(code: &str) -> bool {
    validate_commodity_type(code).is_ok()
}
