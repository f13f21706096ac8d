//! Tests for reception weight reconciliation
//! Verifies sample loss, source priority, overflow policy and idempotence

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    reconcile_weights, select_quality_source, DeductionOverflowPolicy, EngineError,
    FieldEvaluation, LabSample, LabSampleStatus, QualityMeasurement, QualityMetric,
    QualitySource, ReconciliationInput, ThresholdRule,
};
use std::str::FromStr;
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn humidity_rule(threshold: &str) -> ThresholdRule {
    ThresholdRule {
        metric: QualityMetric::Humidity,
        threshold_percent: dec(threshold),
        enabled: true,
    }
}

fn sample(status: LabSampleStatus, wet: &str, dried: &str, completed_minutes: Option<i64>) -> LabSample {
    let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
    LabSample {
        id: Uuid::new_v4(),
        reception_id: Uuid::nil(),
        status,
        wet_weight: dec(wet),
        dried_weight: dec(dried),
        defects: QualityMeasurement::new(),
        completed_at: completed_minutes.map(|m| base + Duration::minutes(m)),
        created_at: base,
    }
}

fn field(values: &[(QualityMetric, &str)]) -> FieldEvaluation {
    FieldEvaluation {
        reception_id: Uuid::nil(),
        measurements: values.iter().map(|(m, v)| (*m, dec(v))).collect(),
        locked: false,
        evaluated_at: Utc::now(),
    }
}

fn input<'a>(
    original: &str,
    thresholds: &'a [ThresholdRule],
    source: Option<&'a QualitySource>,
    samples: &'a [LabSample],
    policy: DeductionOverflowPolicy,
) -> ReconciliationInput<'a> {
    ReconciliationInput {
        original_weight: dec(original),
        thresholds,
        source,
        samples,
        policy,
    }
}

// =============================================================================
// Sample loss
// =============================================================================

mod sample_loss {
    use super::*;

    #[test]
    fn net_sample_loss_is_deducted_without_quality_discount() {
        let samples = [sample(LabSampleStatus::Analysis, "5", "2", None)];

        let weights = reconcile_weights(&input(
            "100",
            &[],
            None,
            &samples,
            DeductionOverflowPolicy::ClampWithWarning,
        ))
        .unwrap();

        assert_eq!(weights.net_sample_loss, dec("3"));
        assert_eq!(weights.total_deduction, dec("3"));
        assert_eq!(weights.final_weight, dec("97"));
        assert_eq!(weights.sample_wet_weight, dec("5"));
        assert_eq!(weights.sample_dried_weight, dec("2"));
        assert!(weights.discount.breakdown.is_empty());
    }

    #[test]
    fn sample_loss_adds_to_quality_discount() {
        let thresholds = [humidity_rule("7")];
        let source = QualitySource::FieldEvaluation {
            measurements: [(QualityMetric::Humidity, dec("9"))].into_iter().collect(),
        };
        let samples = [sample(LabSampleStatus::Analysis, "5", "2", None)];

        let weights = reconcile_weights(&input(
            "100",
            &thresholds,
            Some(&source),
            &samples,
            DeductionOverflowPolicy::ClampWithWarning,
        ))
        .unwrap();

        assert_eq!(weights.discount.discount_weight, dec("2"));
        assert_eq!(weights.total_deduction, dec("5"));
        assert_eq!(weights.final_weight, dec("95"));
    }

    #[test]
    fn samples_sum_across_reception() {
        let samples = [
            sample(LabSampleStatus::Completed, "5", "2", Some(10)),
            sample(LabSampleStatus::Analysis, "4", "3.5", None),
        ];

        let weights = reconcile_weights(&input(
            "200",
            &[],
            None,
            &samples,
            DeductionOverflowPolicy::ClampWithWarning,
        ))
        .unwrap();

        assert_eq!(weights.net_sample_loss, dec("3.5"));
        assert_eq!(weights.final_weight, dec("196.5"));
    }
}

// =============================================================================
// Deduction overflow policy
// =============================================================================

mod overflow_policy {
    use super::*;

    fn heavy_case(policy: DeductionOverflowPolicy) -> Result<shared::ReconciledWeights, EngineError> {
        let thresholds = [humidity_rule("0")];
        let source = QualitySource::FieldEvaluation {
            measurements: [(QualityMetric::Humidity, dec("90"))].into_iter().collect(),
        };
        let samples = [sample(LabSampleStatus::Analysis, "8", "1", None)];
        reconcile_weights(&input("10", &thresholds, Some(&source), &samples, policy))
    }

    #[test]
    fn clamp_keeps_final_weight_at_zero_and_records_excess() {
        let weights = heavy_case(DeductionOverflowPolicy::ClampWithWarning).unwrap();

        // 9 kg discount + 7 kg sample loss against 10 kg
        assert_eq!(weights.total_deduction, dec("10"));
        assert_eq!(weights.final_weight, Decimal::ZERO);
        assert_eq!(weights.deduction_overflow, Some(dec("6")));
    }

    #[test]
    fn reject_refuses_the_reconciliation() {
        let err = heavy_case(DeductionOverflowPolicy::Reject).unwrap_err();
        assert!(matches!(err, EngineError::DeductionExceedsOriginal { .. }));
    }

    #[test]
    fn within_bounds_has_no_overflow() {
        let weights = reconcile_weights(&input(
            "10",
            &[],
            None,
            &[],
            DeductionOverflowPolicy::Reject,
        ))
        .unwrap();
        assert_eq!(weights.deduction_overflow, None);
        assert_eq!(weights.final_weight, dec("10"));
    }

    #[test]
    fn non_positive_original_weight_is_invalid() {
        let err = reconcile_weights(&input(
            "0",
            &[],
            None,
            &[],
            DeductionOverflowPolicy::ClampWithWarning,
        ))
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput { .. }));
    }

    #[test]
    fn sample_totals_past_decimal_range_are_an_error() {
        let mut huge = sample(LabSampleStatus::Drying, "1", "0", None);
        huge.wet_weight = Decimal::MAX;
        let samples = [huge.clone(), huge];

        let err = reconcile_weights(&input(
            "100",
            &[],
            None,
            &samples,
            DeductionOverflowPolicy::ClampWithWarning,
        ))
        .unwrap_err();

        assert!(matches!(err, EngineError::NonFiniteValue { .. }));
    }
}

// =============================================================================
// Quality source selection
// =============================================================================

mod source_selection {
    use super::*;

    #[test]
    fn completed_lab_sample_beats_field_evaluation() {
        let evaluation = field(&[(QualityMetric::Humidity, "20")]);
        let samples = [sample(LabSampleStatus::Completed, "5", "4", Some(5))];

        let source = select_quality_source(Some(&evaluation), &samples).unwrap();

        assert_eq!(source.label(), "lab_sample");
        // (5 - 4) / 5 * 100
        assert_eq!(source.measurements()[&QualityMetric::Humidity], dec("20"));
    }

    #[test]
    fn incomplete_samples_are_ignored_for_quality() {
        let evaluation = field(&[(QualityMetric::Humidity, "12")]);
        let samples = [
            sample(LabSampleStatus::Drying, "5", "0", None),
            sample(LabSampleStatus::Analysis, "5", "3", None),
        ];

        let source = select_quality_source(Some(&evaluation), &samples).unwrap();

        assert_eq!(source.label(), "field_evaluation");
        assert_eq!(source.measurements()[&QualityMetric::Humidity], dec("12"));
    }

    #[test]
    fn most_recently_completed_sample_wins() {
        let older = sample(LabSampleStatus::Completed, "10", "9", Some(5));
        let newer = sample(LabSampleStatus::Completed, "10", "8", Some(30));
        let newer_id = newer.id;

        let source = select_quality_source(None, &[newer, older]).unwrap();

        match source {
            QualitySource::LabSample { sample_id, measurements } => {
                assert_eq!(sample_id, newer_id);
                assert_eq!(measurements[&QualityMetric::Humidity], dec("20"));
            }
            other => panic!("expected lab sample, got {:?}", other),
        }
    }

    #[test]
    fn nothing_measured_means_no_source() {
        assert!(select_quality_source(None, &[]).is_none());
    }
}

// =============================================================================
// Idempotence
// =============================================================================
// Reconciling the same inputs twice yields identical weights, so re-running
// after every quality event can never drift the stored aggregate.

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn reconciliation_is_idempotent(
        original_grams in 1_000u64..10_000_000,
        threshold in 0u32..=30,
        humidity in 0u32..=60,
        sample_wet in 0u32..=5_000,
        sample_ratio in 0u32..=100,
    ) {
        let original = Decimal::new(original_grams as i64, 3);
        let thresholds = [ThresholdRule {
            metric: QualityMetric::Humidity,
            threshold_percent: Decimal::from(threshold),
            enabled: true,
        }];
        let source = QualitySource::FieldEvaluation {
            measurements: [(QualityMetric::Humidity, Decimal::from(humidity))].into_iter().collect(),
        };
        let wet = Decimal::new(sample_wet as i64, 3);
        let dried = wet * Decimal::from(sample_ratio) / Decimal::from(100);
        let samples = [LabSample {
            wet_weight: wet,
            dried_weight: dried,
            ..sample(LabSampleStatus::Analysis, "0", "0", None)
        }];

        let run = || {
            reconcile_weights(&ReconciliationInput {
                original_weight: original,
                thresholds: &thresholds,
                source: Some(&source),
                samples: &samples,
                policy: DeductionOverflowPolicy::ClampWithWarning,
            })
        };

        let first = run().unwrap();
        let second = run().unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert!(first.final_weight >= Decimal::ZERO);
        prop_assert!(first.final_weight <= original);
        prop_assert_eq!(first.final_weight + first.total_deduction, original);
    }
}
