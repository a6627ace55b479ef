//! Patient funnel: national prevalence narrowed to a capturable population
//! through a fixed chain of rate multipliers.

use sizing_core::{DevelopmentStage, IndicationRecord, PatientFunnel};
use tracing::debug;

/// Fraction of the addressable population a single asset can capture,
/// scaling monotonically with clinical maturity.
pub fn capture_rate(stage: DevelopmentStage) -> f64 {
    match stage {
        DevelopmentStage::Preclinical => 0.02,
        DevelopmentStage::Phase1 => 0.04,
        DevelopmentStage::Phase2 => 0.08,
        DevelopmentStage::Phase3 => 0.15,
        DevelopmentStage::Approved => 0.25,
    }
}

/// Addressability reduction implied by the requested patient segment.
///
/// Reference table (documented, not scattered): absent segment 1.0;
/// first-line 0.80; biomarker-selected or later-line 0.35; any other
/// non-blank segment text 0.60.
pub fn segment_factor(segment: Option<&str>) -> f64 {
    let text = match segment {
        Some(s) if !s.trim().is_empty() => s.to_lowercase(),
        _ => return 1.0,
    };

    const NARROW: &[&str] = &[
        "2l",
        "3l",
        "second-line",
        "second line",
        "third-line",
        "third line",
        "later-line",
        "later line",
        "relapsed",
        "refractory",
        "biomarker",
        "mutation",
        "mutant",
        "positive",
        "amplified",
        "egfr",
        "alk",
        "her2",
        "kras",
        "braf",
    ];
    const FIRST_LINE: &[&str] = &[
        "1l",
        "first-line",
        "first line",
        "front-line",
        "frontline",
        "treatment-naive",
        "treatment naive",
    ];

    if NARROW.iter().any(|t| text.contains(t)) {
        0.35
    } else if FIRST_LINE.iter().any(|t| text.contains(t)) {
        0.80
    } else {
        0.60
    }
}

/// Mild narrowing for a named histological/molecular subtype: a request
/// scoped to, say, "squamous" disease addresses less of the treated
/// population than the unrestricted indication. Absent subtype is neutral.
pub fn subtype_factor(subtype: Option<&str>) -> f64 {
    match subtype {
        Some(s) if !s.trim().is_empty() => 0.85,
        _ => 1.0,
    }
}

/// Shrink a stage by a rate in (0, 1], flooring at 1 so populations never
/// reach zero.
fn shrink(base: u64, rate: f64) -> u64 {
    (((base as f64) * rate).floor() as u64).max(1)
}

/// Compute the five-stage patient funnel for a resolved indication.
///
/// Guarantee: the stages are monotonically non-increasing for any valid
/// record because every multiplier is <= 1.0 and the floor is shared.
pub fn compute_funnel(
    record: &IndicationRecord,
    stage: DevelopmentStage,
    segment: Option<&str>,
    subtype: Option<&str>,
) -> PatientFunnel {
    let prevalence = record.us_prevalence.max(1);
    let diagnosed = shrink(prevalence, record.diagnosis_rate);
    let treated = shrink(diagnosed, record.treatment_rate);
    let addressable = shrink(treated, segment_factor(segment) * subtype_factor(subtype));
    let capturable = shrink(addressable, capture_rate(stage));

    debug!(
        indication = %record.name,
        prevalence,
        diagnosed,
        treated,
        addressable,
        capturable,
        "patient funnel computed"
    );

    PatientFunnel {
        us_prevalence: prevalence,
        annual_incidence: record.us_incidence,
        diagnosed,
        treated,
        addressable,
        capturable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sizing_core::validate_funnel;

    fn record() -> sizing_core::IndicationRecord {
        sizing_refdata::builtin()
            .unwrap()
            .by_synonym("nsclc")
            .unwrap()
            .clone()
    }

    #[test]
    fn funnel_is_monotonic_for_every_builtin_record() {
        let data = sizing_refdata::builtin().unwrap();
        let stages = [
            DevelopmentStage::Preclinical,
            DevelopmentStage::Phase1,
            DevelopmentStage::Phase2,
            DevelopmentStage::Phase3,
            DevelopmentStage::Approved,
        ];
        for rec in data.indications() {
            for stage in stages {
                let f = compute_funnel(rec, stage, None, None);
                validate_funnel(&f).unwrap();
            }
        }
    }

    #[test]
    fn capture_rate_scales_with_maturity() {
        assert!(capture_rate(DevelopmentStage::Preclinical) < capture_rate(DevelopmentStage::Phase1));
        assert!(capture_rate(DevelopmentStage::Phase1) < capture_rate(DevelopmentStage::Phase2));
        assert!(capture_rate(DevelopmentStage::Phase2) < capture_rate(DevelopmentStage::Phase3));
        assert!(capture_rate(DevelopmentStage::Phase3) < capture_rate(DevelopmentStage::Approved));
    }

    #[test]
    fn later_stage_strictly_grows_capturable() {
        let rec = record();
        let early = compute_funnel(&rec, DevelopmentStage::Preclinical, None, None);
        let late = compute_funnel(&rec, DevelopmentStage::Phase3, None, None);
        assert!(late.capturable > early.capturable);
    }

    #[test]
    fn narrower_segment_strictly_decreases_addressable() {
        let rec = record();
        let broad = compute_funnel(&rec, DevelopmentStage::Phase2, None, None);
        let narrow = compute_funnel(
            &rec,
            DevelopmentStage::Phase2,
            Some("EGFR mutation positive, second-line"),
            None,
        );
        assert!(narrow.addressable < broad.addressable);
    }

    #[test]
    fn named_subtype_mildly_narrows_addressable() {
        let rec = record();
        let unrestricted = compute_funnel(&rec, DevelopmentStage::Phase2, None, None);
        let squamous = compute_funnel(&rec, DevelopmentStage::Phase2, None, Some("squamous"));
        assert!(squamous.addressable < unrestricted.addressable);
        // A subtype restriction is milder than a biomarker-selected segment.
        let biomarker = compute_funnel(&rec, DevelopmentStage::Phase2, Some("ALK positive"), None);
        assert!(biomarker.addressable < squamous.addressable);
        validate_funnel(&squamous).unwrap();
    }

    #[test]
    fn blank_subtype_is_neutral() {
        let rec = record();
        let a = compute_funnel(&rec, DevelopmentStage::Phase2, None, None);
        let b = compute_funnel(&rec, DevelopmentStage::Phase2, None, Some("  "));
        assert_eq!(a, b);
    }

    #[test]
    fn first_line_reduction_is_milder_than_biomarker() {
        let rec = record();
        let first = compute_funnel(&rec, DevelopmentStage::Phase2, Some("first-line"), None);
        let biomarker = compute_funnel(&rec, DevelopmentStage::Phase2, Some("ALK positive"), None);
        assert!(biomarker.addressable < first.addressable);
    }

    #[test]
    fn blank_segment_is_neutral() {
        let rec = record();
        let a = compute_funnel(&rec, DevelopmentStage::Phase2, None, None);
        let b = compute_funnel(&rec, DevelopmentStage::Phase2, Some("   "), None);
        assert_eq!(a, b);
    }

    #[test]
    fn tiny_population_floors_at_one() {
        let mut rec = record();
        rec.us_prevalence = 1;
        let f = compute_funnel(&rec, DevelopmentStage::Preclinical, Some("refractory"), None);
        assert_eq!(f.capturable, 1);
        validate_funnel(&f).unwrap();
    }

    proptest! {
        #[test]
        fn funnel_monotone_for_arbitrary_rates(prev in 1u64..50_000_000,
                                               dx in 0.01f64..1.0,
                                               tx in 0.01f64..1.0) {
            let mut rec = record();
            rec.us_prevalence = prev;
            rec.diagnosis_rate = dx;
            rec.treatment_rate = tx;
            let f = compute_funnel(&rec, DevelopmentStage::Phase2, Some("relapsed"), None);
            prop_assert!(validate_funnel(&f).is_ok());
        }
    }
}
