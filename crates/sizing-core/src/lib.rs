#![deny(warnings)]

//! Core domain models and invariants for market opportunity sizing.
//!
//! This crate defines the serializable types shared across the sizing
//! pipeline together with validation helpers that guarantee the basic
//! cross-field invariants: monotonic patient funnels, ordered TAM/SAM/SOM
//! triples, ordered scenario bands, and positive monetary values.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Territory identifier, e.g. "US", "EU5", "Japan", "China".
///
/// Matching against reference data is case-insensitive via [`GeographyCode::canonical`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeographyCode(pub String);

impl GeographyCode {
    /// Canonical (trimmed, upper-cased) form used for lookups and dedup.
    pub fn canonical(&self) -> String {
        self.0.trim().to_ascii_uppercase()
    }
}

/// Clinical maturity of the asset being sized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentStage {
    Preclinical,
    Phase1,
    Phase2,
    Phase3,
    Approved,
}

/// Which pricing tier drives the reported market metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingAssumption {
    Conservative,
    Base,
    Premium,
}

/// Per-territory epidemiological and pricing scaling relative to the US.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoFactors {
    /// Addressable-population scale vs. the US (> 0).
    pub epi_multiplier: f64,
    /// Realized-price scale vs. the US (> 0).
    pub price_multiplier: f64,
}

/// Canonical reference record for a disease indication.
///
/// Loaded once at process start from the versioned reference dataset and
/// never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndicationRecord {
    /// Canonical indication name, e.g. "Non-Small Cell Lung Cancer".
    pub name: String,
    /// Accepted synonyms/abbreviations, e.g. "NSCLC".
    pub synonyms: Vec<String>,
    /// Broad therapy area, e.g. "oncology".
    pub therapy_area: String,
    /// US prevalent population (patients living with the disease).
    pub us_prevalence: u64,
    /// US annual incidence (new diagnoses per year).
    pub us_incidence: u64,
    /// Fraction of prevalent patients who are diagnosed, in (0, 1].
    pub diagnosis_rate: f64,
    /// Fraction of diagnosed patients receiving drug therapy, in (0, 1].
    pub treatment_rate: f64,
    /// Per-territory multipliers keyed by canonical geography code.
    pub geography: BTreeMap<String, GeoFactors>,
    /// Linkage key into the pricing-comparable table.
    pub pricing_class: String,
    /// Linkage key into the competitive-landscape snapshot.
    pub competitive_key: String,
}

/// A marketed drug used as a pricing comparable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingComparable {
    pub drug_name: String,
    /// Narrow comparable class, matches [`IndicationRecord::pricing_class`].
    pub indication_class: String,
    /// Broad therapy area used as the fallback pool.
    pub therapy_area: String,
    /// Mechanism of action, e.g. "EGFR TKI".
    pub mechanism: String,
    /// Wholesale acquisition cost, annualized, USD.
    pub wac_annual_price: Decimal,
}

/// Read-only snapshot of the competitive landscape for one indication.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveSnapshot {
    /// Competitive density, 1 (sparse) to 10 (saturated).
    pub crowding_score: f64,
    pub approved_products: u32,
    pub phase3_programs: u32,
}

/// Immutable per-request input to the sizing engine.
///
/// Absent optional fields mean a neutral multiplier of 1.0 downstream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketSizingInput {
    /// Free-text indication name or synonym.
    pub indication: String,
    /// Requested territories; must be nonempty.
    pub geography: Vec<GeographyCode>,
    pub development_stage: DevelopmentStage,
    pub pricing_assumption: PricingAssumption,
    /// First year of the ten-year projection.
    pub launch_year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_segment: Option<String>,
    /// Histological/molecular subtype; when present it applies a mild
    /// addressability reduction on top of the segment narrowing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

/// Patient funnel from total US prevalence down to the capturable population.
///
/// Invariant: `us_prevalence >= diagnosed >= treated >= addressable >=
/// capturable`, every stage >= 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientFunnel {
    pub us_prevalence: u64,
    /// Annual incidence carried through for reporting; not a funnel stage.
    pub annual_incidence: u64,
    pub diagnosed: u64,
    pub treated: u64,
    pub addressable: u64,
    pub capturable: u64,
}

/// Display scale for a monetary metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoneyUnit {
    B,
    M,
    K,
}

impl MoneyUnit {
    /// Multiplier converting a value in this unit to billions.
    fn to_billions_factor(self) -> Decimal {
        match self {
            MoneyUnit::B => Decimal::ONE,
            MoneyUnit::M => Decimal::new(1, 3),  // 0.001
            MoneyUnit::K => Decimal::new(1, 6),  // 0.000001
        }
    }
}

/// Confidence attached to a derived monetary metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A positive monetary value with a display unit and a confidence grade.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoneyMetric {
    pub value: Decimal,
    pub unit: MoneyUnit,
    pub confidence: Confidence,
}

impl MoneyMetric {
    /// Build a metric from an absolute USD amount, auto-scaling into B/M/K.
    ///
    /// The value is rounded to two decimals and floored at 0.01 so the
    /// positivity invariant survives rounding.
    pub fn from_usd(usd: Decimal, confidence: Confidence) -> Self {
        let billion = Decimal::new(1_000_000_000, 0);
        let million = Decimal::new(1_000_000, 0);
        let thousand = Decimal::new(1000, 0);
        let (scaled, unit) = if usd >= billion {
            (usd / billion, MoneyUnit::B)
        } else if usd >= million {
            (usd / million, MoneyUnit::M)
        } else {
            (usd / thousand, MoneyUnit::K)
        };
        let floor = Decimal::new(1, 2); // 0.01
        let value = scaled.round_dp(2).max(floor);
        Self {
            value,
            unit,
            confidence,
        }
    }

    /// Value expressed in billions USD, for cross-unit comparison and sorting.
    pub fn normalized_billions(&self) -> Decimal {
        self.value * self.unit.to_billions_factor()
    }
}

/// TAM/SAM/SOM for a single territory. Invariant: `som <= sam <= tam`
/// after unit normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeographyTerritory {
    pub territory: String,
    pub tam: MoneyMetric,
    pub sam: MoneyMetric,
    pub som: MoneyMetric,
}

/// Ordered WAC price tiers: `conservative <= base <= premium` always.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WacTiers {
    pub conservative: Decimal,
    pub base: Decimal,
    pub premium: Decimal,
}

/// Pricing analysis derived from the comparable pool.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PricingAnalysis {
    pub recommended_wac: WacTiers,
    /// The tier selected by the request's pricing assumption; feeds the
    /// geography and revenue math.
    pub selected_wac: Decimal,
    /// Payer discount off list price, in (0, 1).
    pub gross_to_net_estimate: f64,
    /// Drug names of the comparables that formed the pool.
    pub comparables_used: Vec<String>,
    pub payer_dynamics: String,
    pub pricing_rationale: String,
}

/// Competitive context attached to the report; never a failure path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompetitiveContext {
    pub crowding_score: f64,
    pub approved_products: u32,
    pub phase3_programs: u32,
    pub differentiation_note: String,
}

/// One year of the bear/base/bull projection, values in USD millions.
/// Invariant: `bear <= base <= bull`, all finite and positive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevenueProjectionYear {
    pub year: i32,
    pub bear: Decimal,
    pub base: Decimal,
    pub bull: Decimal,
}

/// Peak-sales band across the ten-year projection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakSalesEstimate {
    pub low: MoneyMetric,
    pub base: MoneyMetric,
    pub high: MoneyMetric,
}

/// Summary-level aggregates for the report header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketSizingSummary {
    pub tam_us: MoneyMetric,
    pub sam_us: MoneyMetric,
    pub som_us: MoneyMetric,
    /// Sum of TAM across all requested territories.
    pub global_tam: MoneyMetric,
    pub peak_sales_estimate: PeakSalesEstimate,
    /// Compound annual growth rate over projection years 1..=5, > 0.
    pub cagr_5yr: f64,
    pub market_growth_driver: String,
}

/// The full market-sizing report. Created fresh per invocation; the engine
/// never persists or mutates it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketSizingOutput {
    pub summary: MarketSizingSummary,
    pub patient_funnel: PatientFunnel,
    /// One entry per requested territory, sorted by TAM descending.
    pub geography_breakdown: Vec<GeographyTerritory>,
    pub pricing_analysis: PricingAnalysis,
    /// Exactly ten consecutive years starting at the requested launch year.
    pub revenue_projection: Vec<RevenueProjectionYear>,
    pub competitive_context: CompetitiveContext,
    pub methodology: String,
    pub assumptions: Vec<String>,
    pub data_sources: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub indication_validated: bool,
}

/// The single domain error the engine surfaces to callers.
#[derive(Debug, Error, PartialEq)]
pub enum SizingError {
    /// The query did not resolve against the reference dataset. The message
    /// intentionally contains "indication not found" for caller matching.
    #[error("indication not found: {0}")]
    IndicationNotFound(String),
}

/// Caller-side input shape errors (checked before the engine is invoked).
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("indication must be a nonempty string")]
    EmptyIndication,
    #[error("geography must contain at least one territory")]
    EmptyGeography,
    #[error("launch year {0} is out of supported range [2020, 2060]")]
    LaunchYearOutOfRange(i32),
    #[error("funnel stages must be non-increasing and >= 1")]
    NonMonotonicFunnel,
    #[error("monetary value must be > 0")]
    NonPositiveMoney,
    #[error("tam/sam/som must be ordered for territory {0}")]
    UnorderedTerritory(String),
    #[error("scenario band must satisfy bear <= base <= bull in year {0}")]
    UnorderedScenario(i32),
}

/// Validate the request shape per the call contract. The engine itself only
/// raises [`SizingError::IndicationNotFound`]; everything here is the
/// caller's responsibility.
pub fn validate_input(input: &MarketSizingInput) -> Result<(), ValidationError> {
    if input.indication.trim().is_empty() {
        return Err(ValidationError::EmptyIndication);
    }
    if input.geography.is_empty() {
        return Err(ValidationError::EmptyGeography);
    }
    if !(2020..=2060).contains(&input.launch_year) {
        return Err(ValidationError::LaunchYearOutOfRange(input.launch_year));
    }
    Ok(())
}

/// Validate funnel monotonicity and the floor-at-1 guarantee.
pub fn validate_funnel(f: &PatientFunnel) -> Result<(), ValidationError> {
    let stages = [
        f.us_prevalence,
        f.diagnosed,
        f.treated,
        f.addressable,
        f.capturable,
    ];
    if stages.iter().any(|&s| s < 1) {
        return Err(ValidationError::NonMonotonicFunnel);
    }
    if stages.windows(2).any(|w| w[1] > w[0]) {
        return Err(ValidationError::NonMonotonicFunnel);
    }
    Ok(())
}

/// Validate a monetary metric's positivity invariant.
pub fn validate_money(m: &MoneyMetric) -> Result<(), ValidationError> {
    if m.value <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveMoney);
    }
    Ok(())
}

/// Validate TAM >= SAM >= SOM for a territory after unit normalization.
pub fn validate_territory(t: &GeographyTerritory) -> Result<(), ValidationError> {
    validate_money(&t.tam)?;
    validate_money(&t.sam)?;
    validate_money(&t.som)?;
    let (tam, sam, som) = (
        t.tam.normalized_billions(),
        t.sam.normalized_billions(),
        t.som.normalized_billions(),
    );
    if sam > tam || som > sam {
        return Err(ValidationError::UnorderedTerritory(t.territory.clone()));
    }
    Ok(())
}

/// Validate the bear <= base <= bull band for every projection year.
pub fn validate_projection(years: &[RevenueProjectionYear]) -> Result<(), ValidationError> {
    for y in years {
        if y.bear <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveMoney);
        }
        if y.base < y.bear || y.bull < y.base {
            return Err(ValidationError::UnorderedScenario(y.year));
        }
    }
    Ok(())
}

/// Lossy f64 view of a Decimal for rate math at seams; 0.0 on overflow.
pub fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

/// Decimal from an f64 known to be finite; saturates non-finite input to zero.
pub fn decimal_from_f64(v: f64) -> Decimal {
    if v.is_finite() {
        Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_input() -> MarketSizingInput {
        MarketSizingInput {
            indication: "NSCLC".to_string(),
            geography: vec![GeographyCode("US".to_string())],
            development_stage: DevelopmentStage::Phase2,
            pricing_assumption: PricingAssumption::Base,
            launch_year: 2028,
            mechanism: None,
            patient_segment: None,
            subtype: None,
        }
    }

    #[test]
    fn serde_roundtrip_input() {
        let input = sample_input();
        let s = serde_json::to_string(&input).unwrap();
        let back: MarketSizingInput = serde_json::from_str(&s).unwrap();
        assert_eq!(back.indication, "NSCLC");
        assert_eq!(back.development_stage, DevelopmentStage::Phase2);
        assert_eq!(back.launch_year, 2028);
        // Optional fields are omitted, not serialized as null.
        assert!(!s.contains("patient_segment"));
    }

    #[test]
    fn stage_enum_serializes_lowercase() {
        let s = serde_json::to_string(&DevelopmentStage::Phase3).unwrap();
        assert_eq!(s, "\"phase3\"");
        let s = serde_json::to_string(&PricingAssumption::Conservative).unwrap();
        assert_eq!(s, "\"conservative\"");
    }

    #[test]
    fn stages_order_by_maturity() {
        assert!(DevelopmentStage::Preclinical < DevelopmentStage::Phase1);
        assert!(DevelopmentStage::Phase3 < DevelopmentStage::Approved);
    }

    #[test]
    fn validate_input_rejects_bad_shapes() {
        let mut input = sample_input();
        input.geography.clear();
        assert_eq!(validate_input(&input), Err(ValidationError::EmptyGeography));

        let mut input = sample_input();
        input.indication = "  ".to_string();
        assert_eq!(validate_input(&input), Err(ValidationError::EmptyIndication));

        let mut input = sample_input();
        input.launch_year = 1999;
        assert_eq!(
            validate_input(&input),
            Err(ValidationError::LaunchYearOutOfRange(1999))
        );
    }

    #[test]
    fn money_metric_auto_scales() {
        let m = MoneyMetric::from_usd(Decimal::new(2_500_000_000, 0), Confidence::High);
        assert_eq!(m.unit, MoneyUnit::B);
        assert_eq!(m.value, Decimal::new(25, 1)); // 2.5

        let m = MoneyMetric::from_usd(Decimal::new(750_000_000, 0), Confidence::Medium);
        assert_eq!(m.unit, MoneyUnit::M);
        assert_eq!(m.value, Decimal::new(750, 0));

        let m = MoneyMetric::from_usd(Decimal::new(42_000, 0), Confidence::Low);
        assert_eq!(m.unit, MoneyUnit::K);
        assert_eq!(m.value, Decimal::new(42, 0));
    }

    #[test]
    fn money_metric_survives_rounding_to_zero() {
        let m = MoneyMetric::from_usd(Decimal::new(1, 0), Confidence::Low);
        assert!(m.value > Decimal::ZERO);
        assert!(validate_money(&m).is_ok());
    }

    #[test]
    fn funnel_validation_catches_inversion() {
        let f = PatientFunnel {
            us_prevalence: 100,
            annual_incidence: 20,
            diagnosed: 120,
            treated: 50,
            addressable: 40,
            capturable: 10,
        };
        assert_eq!(validate_funnel(&f), Err(ValidationError::NonMonotonicFunnel));
    }

    #[test]
    fn error_message_matches_caller_contract() {
        let e = SizingError::IndicationNotFound("Fake Disease".to_string());
        let msg = e.to_string().to_lowercase();
        assert!(msg.contains("indication not found"));
    }

    proptest! {
        #[test]
        fn money_normalization_preserves_order(a in 1_000u64..10_000_000_000, b in 1_000u64..10_000_000_000) {
            let ma = MoneyMetric::from_usd(Decimal::from(a), Confidence::High);
            let mb = MoneyMetric::from_usd(Decimal::from(b), Confidence::High);
            // A 2x gap can never invert after rounding to two decimals.
            if a >= b * 2 {
                prop_assert!(ma.normalized_billions() >= mb.normalized_billions());
            }
        }

        #[test]
        fn monotone_funnels_validate(prev in 1u64..100_000_000,
                                     r1 in 0.01f64..1.0, r2 in 0.01f64..1.0,
                                     r3 in 0.01f64..1.0, r4 in 0.01f64..1.0) {
            let diagnosed = (((prev as f64) * r1).floor() as u64).max(1);
            let treated = (((diagnosed as f64) * r2).floor() as u64).max(1);
            let addressable = (((treated as f64) * r3).floor() as u64).max(1);
            let capturable = (((addressable as f64) * r4).floor() as u64).max(1);
            let f = PatientFunnel {
                us_prevalence: prev,
                annual_incidence: prev / 10,
                diagnosed,
                treated,
                addressable,
                capturable,
            };
            prop_assert!(validate_funnel(&f).is_ok());
        }
    }
}
