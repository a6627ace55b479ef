//! Final report composition: summary aggregates, methodology narrative,
//! assumption list, and data-source citations.

use chrono::Utc;
use rust_decimal::Decimal;
use sizing_core::{
    decimal_to_f64, CompetitiveContext, Confidence, DevelopmentStage, GeographyTerritory,
    IndicationRecord, MarketSizingInput, MarketSizingOutput, MarketSizingSummary, MoneyMetric,
    PatientFunnel, PeakSalesEstimate, PricingAnalysis, RevenueProjectionYear,
};
use sizing_refdata::ReferenceDataset;

use crate::{funnel as funnel_mod, geography, revenue};

/// Compose the final report. Pure composition plus summary-level aggregates;
/// none of the inputs are mutated.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    record: &IndicationRecord,
    input: &MarketSizingInput,
    funnel: PatientFunnel,
    pricing: PricingAnalysis,
    competitive: CompetitiveContext,
    breakdown: Vec<GeographyTerritory>,
    projection: Vec<RevenueProjectionYear>,
    data: &ReferenceDataset,
) -> MarketSizingOutput {
    let (tam_us, sam_us, som_us) = geography::us_basis(&funnel, &pricing);
    let billion = Decimal::new(1_000_000_000, 0);
    let million = Decimal::new(1_000_000, 0);

    let global_tam_usd = geography::aggregate_tam_billions(&breakdown) * billion;

    let peak = PeakSalesEstimate {
        low: MoneyMetric::from_usd(
            max_of(&projection, |y| y.bear) * million,
            Confidence::Medium,
        ),
        base: MoneyMetric::from_usd(
            max_of(&projection, |y| y.base) * million,
            Confidence::Medium,
        ),
        high: MoneyMetric::from_usd(
            max_of(&projection, |y| y.bull) * million,
            Confidence::Medium,
        ),
    };

    let summary = MarketSizingSummary {
        tam_us: MoneyMetric::from_usd(tam_us, Confidence::High),
        sam_us: MoneyMetric::from_usd(sam_us, Confidence::High),
        som_us: MoneyMetric::from_usd(som_us, Confidence::High),
        global_tam: MoneyMetric::from_usd(global_tam_usd, Confidence::Medium),
        peak_sales_estimate: peak,
        cagr_5yr: cagr_5yr(&projection),
        market_growth_driver: growth_driver(record, &competitive),
    };

    let methodology = format!(
        "Market sizes are derived bottom-up: the US patient funnel narrows \
         {} prevalent patients through diagnosis ({:.0}%) and treatment \
         ({:.0}%) rates to an addressable and capturable population, priced \
         at the net realized price ({} WAC less a {:.0}% gross-to-net \
         discount). Territory values scale the US basis by per-geography \
         epidemiology and pricing multipliers from reference dataset v{}. \
         The ten-year projection applies a stage-adjusted probability of \
         success to a ramp-and-plateau adoption curve peaking in year 8.",
        funnel.us_prevalence,
        record.diagnosis_rate * 100.0,
        record.treatment_rate * 100.0,
        pricing.selected_wac,
        pricing.gross_to_net_estimate * 100.0,
        data.version(),
    );

    let assumptions = assumption_list(record, input, &pricing);

    let mut data_sources: Vec<String> = data.data_sources().to_vec();
    data_sources.push(format!("Internal reference dataset v{}", data.version()));

    MarketSizingOutput {
        summary,
        patient_funnel: funnel,
        geography_breakdown: breakdown,
        pricing_analysis: pricing,
        revenue_projection: projection,
        competitive_context: competitive,
        methodology,
        assumptions,
        data_sources,
        generated_at: Utc::now(),
        indication_validated: true,
    }
}

fn max_of(
    projection: &[RevenueProjectionYear],
    f: impl Fn(&RevenueProjectionYear) -> Decimal,
) -> Decimal {
    projection.iter().map(f).max().unwrap_or(Decimal::ZERO)
}

/// Compound annual growth rate over projection years 1..=5 of the base
/// curve. Strictly positive because the adoption ramp rises over that span.
fn cagr_5yr(projection: &[RevenueProjectionYear]) -> f64 {
    let (first, fifth) = match (projection.first(), projection.get(4)) {
        (Some(a), Some(b)) => (decimal_to_f64(a.base), decimal_to_f64(b.base)),
        _ => return 0.0,
    };
    if first <= 0.0 || fifth <= 0.0 {
        return 0.0;
    }
    (fifth / first).powf(0.25) - 1.0
}

fn growth_driver(record: &IndicationRecord, competitive: &CompetitiveContext) -> String {
    format!(
        "Growth in {} is driven by rising diagnosis rates and expanding \
         treated populations; with {} approved competitors, share capture \
         depends on differentiation at launch.",
        record.therapy_area, competitive.approved_products
    )
}

fn assumption_list(
    record: &IndicationRecord,
    input: &MarketSizingInput,
    pricing: &PricingAnalysis,
) -> Vec<String> {
    let mut assumptions = vec![
        format!(
            "US diagnosis rate {:.0}% and treatment rate {:.0}% per the reference record",
            record.diagnosis_rate * 100.0,
            record.treatment_rate * 100.0
        ),
        format!(
            "Capture rate {:.0}% of the addressable population at the {:?} stage",
            funnel_mod::capture_rate(input.development_stage) * 100.0,
            input.development_stage
        ),
        format!(
            "Annual WAC of {} ({:?} tier) with a {:.0}% gross-to-net discount",
            pricing.selected_wac, input.pricing_assumption, pricing.gross_to_net_estimate * 100.0
        ),
        format!(
            "Probability of success {} applied for the {:?} stage",
            revenue::probability_of_success(input.development_stage),
            input.development_stage
        ),
        "Adoption ramps to peak sales in year 8 post-launch, then erodes gently".to_string(),
        "Bear and bull scenarios at 0.60x and 1.50x of the base curve".to_string(),
    ];
    if let Some(segment) = input.patient_segment.as_deref() {
        assumptions.push(format!(
            "Addressable population narrowed to {:.0}% for segment '{}'",
            funnel_mod::segment_factor(Some(segment)) * 100.0,
            segment
        ));
    }
    if let Some(subtype) = input.subtype.as_deref() {
        assumptions.push(format!(
            "Addressable population further scaled to {:.0}% for subtype '{}'",
            funnel_mod::subtype_factor(Some(subtype)) * 100.0,
            subtype
        ));
    }
    if input.development_stage == DevelopmentStage::Approved {
        assumptions.push("No clinical attrition applied to an approved asset".to_string());
    }
    assumptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate_market_sizing;
    use sizing_core::{GeographyCode, PricingAssumption};

    fn output() -> MarketSizingOutput {
        let data = sizing_refdata::builtin().unwrap();
        let input = MarketSizingInput {
            indication: "NSCLC".to_string(),
            geography: vec![
                GeographyCode("US".to_string()),
                GeographyCode("EU5".to_string()),
            ],
            development_stage: DevelopmentStage::Phase2,
            pricing_assumption: PricingAssumption::Base,
            launch_year: 2028,
            mechanism: None,
            patient_segment: Some("EGFR positive".to_string()),
            subtype: Some("adenocarcinoma".to_string()),
        };
        calculate_market_sizing(&input, data).unwrap()
    }

    #[test]
    fn summary_ordering_holds() {
        let out = output();
        let s = &out.summary;
        assert!(s.sam_us.normalized_billions() <= s.tam_us.normalized_billions());
        assert!(s.som_us.normalized_billions() <= s.sam_us.normalized_billions());
        let p = &s.peak_sales_estimate;
        assert!(p.low.normalized_billions() <= p.base.normalized_billions());
        assert!(p.base.normalized_billions() <= p.high.normalized_billions());
    }

    #[test]
    fn cagr_is_strictly_positive() {
        let out = output();
        assert!(out.summary.cagr_5yr > 0.0);
    }

    #[test]
    fn narrative_and_citations_are_present() {
        let out = output();
        assert!(out.summary.market_growth_driver.len() >= 10);
        assert!(!out.methodology.is_empty());
        assert!(out.assumptions.len() >= 6);
        assert!(out
            .data_sources
            .iter()
            .any(|s| s.contains("reference dataset")));
        assert!(out.indication_validated);
    }

    #[test]
    fn segment_assumption_is_recorded() {
        let out = output();
        assert!(out
            .assumptions
            .iter()
            .any(|a| a.contains("EGFR positive")));
    }

    #[test]
    fn subtype_assumption_is_recorded() {
        let out = output();
        assert!(out
            .assumptions
            .iter()
            .any(|a| a.contains("adenocarcinoma")));
    }

    #[test]
    fn global_tam_covers_requested_territories() {
        let out = output();
        assert_eq!(out.geography_breakdown.len(), 2);
        assert!(
            out.summary.global_tam.normalized_billions()
                >= out.summary.tam_us.normalized_billions()
        );
    }
}
