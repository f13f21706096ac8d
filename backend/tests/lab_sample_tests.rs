//! Tests for the lab sample lifecycle and derived humidity

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    lab_humidity_percent, validate_sample_dried_weight, validate_sample_wet_weight, LabSample, LabSampleStatus,
    QualityMeasurement, QualityMetric, QualitySource,
};
use std::str::FromStr;
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

mod lifecycle {
    use super::*;

    #[test]
    fn forward_single_steps_only() {
        use LabSampleStatus::*;

        assert!(Drying.can_transition_to(Analysis));
        assert!(Analysis.can_transition_to(Completed));

        assert!(!Drying.can_transition_to(Completed));
        assert!(!Analysis.can_transition_to(Drying));
        assert!(!Completed.can_transition_to(Analysis));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn completed_is_terminal() {
        assert!(LabSampleStatus::Completed.is_terminal());
        assert!(!LabSampleStatus::Drying.is_terminal());
        assert!(!LabSampleStatus::Analysis.is_terminal());
    }

    #[test]
    fn status_codes_round_trip_through_storage() {
        for status in [
            LabSampleStatus::Drying,
            LabSampleStatus::Analysis,
            LabSampleStatus::Completed,
        ] {
            assert_eq!(LabSampleStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(LabSampleStatus::from_str("pending"), None);
    }
}

mod humidity {
    use super::*;

    #[test]
    fn five_to_two_is_sixty_percent() {
        assert_eq!(lab_humidity_percent(dec("5"), dec("2")), dec("60"));
    }

    #[test]
    fn undried_sample_has_no_humidity() {
        assert_eq!(lab_humidity_percent(dec("5"), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(lab_humidity_percent(Decimal::ZERO, dec("2")), Decimal::ZERO);
    }

    #[test]
    fn out_of_range_weights_do_not_panic() {
        assert!(validate_sample_wet_weight(Decimal::MAX).is_err());
        assert!(validate_sample_wet_weight(dec("1000000")).is_ok());
        assert_eq!(lab_humidity_percent(dec("0.001"), Decimal::MAX), Decimal::ZERO);
    }

    #[test]
    fn sample_measurement_uses_weighed_humidity() {
        let sample = LabSample {
            id: Uuid::new_v4(),
            reception_id: Uuid::new_v4(),
            status: LabSampleStatus::Completed,
            wet_weight: dec("4"),
            dried_weight: dec("3"),
            defects: QualityMeasurement::from([
                (QualityMetric::Humidity, dec("99")),
                (QualityMetric::Slate, dec("1.5")),
            ]),
            completed_at: Some(Utc::now()),
            created_at: Utc::now(),
        };

        let measured = sample.measurement();

        assert_eq!(measured[&QualityMetric::Humidity], dec("25"));
        assert_eq!(measured[&QualityMetric::Slate], dec("1.5"));
    }

    #[test]
    fn quality_source_serializes_with_kind_tag() {
        let source = QualitySource::FieldEvaluation {
            measurements: QualityMeasurement::from([(QualityMetric::Mold, dec("2"))]),
        };

        let json = serde_json::to_value(&source).unwrap();

        assert_eq!(json["kind"], "field_evaluation");
        assert!(json["measurements"]["mold"].is_string() || json["measurements"]["mold"].is_number());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any accepted drying result yields a humidity within [0, 100)
    #[test]
    fn accepted_dried_weight_gives_valid_humidity(
        wet_grams in 1u64..100_000,
        ratio in 0u32..=100,
    ) {
        let wet = Decimal::new(wet_grams as i64, 3);
        let dried = (wet * Decimal::from(ratio) / Decimal::from(100)).round_dp(3);

        prop_assert!(validate_sample_dried_weight(wet, dried).is_ok());

        let humidity = lab_humidity_percent(wet, dried);
        prop_assert!(humidity >= Decimal::ZERO);
        prop_assert!(humidity <= Decimal::from(100));
    }
}
