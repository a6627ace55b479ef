//! Per-territory TAM/SAM/SOM allocation.
//!
//! The US basis prices the funnel stages at the net realized price; other
//! territories scale that basis by their epidemiological and pricing
//! multipliers from the indication record (or the dataset's conservative
//! defaults when a territory has no explicit data).

use rust_decimal::Decimal;
use sizing_core::{
    decimal_from_f64, Confidence, GeoFactors, GeographyCode, GeographyTerritory, IndicationRecord,
    MoneyMetric, PatientFunnel, PricingAnalysis,
};
use sizing_refdata::ReferenceDataset;
use std::collections::BTreeSet;
use tracing::debug;

/// Net realized annual price per treated patient: selected WAC after the
/// gross-to-net discount.
pub fn net_price(pricing: &PricingAnalysis) -> Decimal {
    pricing.selected_wac * decimal_from_f64(1.0 - pricing.gross_to_net_estimate)
}

/// US-basis (TAM, SAM, SOM) in absolute USD: treated/addressable/capturable
/// populations priced at the net realized price.
pub fn us_basis(funnel: &PatientFunnel, pricing: &PricingAnalysis) -> (Decimal, Decimal, Decimal) {
    let price = net_price(pricing);
    (
        Decimal::from(funnel.treated) * price,
        Decimal::from(funnel.addressable) * price,
        Decimal::from(funnel.capturable) * price,
    )
}

/// Allocate TAM/SAM/SOM across the requested territories.
///
/// Exactly one entry per requested geography after case-insensitive dedup,
/// sorted by TAM descending (normalized to billions), territory name as the
/// deterministic tie-break. Adding territories never decreases aggregate TAM
/// because every multiplier is strictly positive.
pub fn allocate(
    funnel: &PatientFunnel,
    pricing: &PricingAnalysis,
    requested: &[GeographyCode],
    record: &IndicationRecord,
    data: &ReferenceDataset,
) -> Vec<GeographyTerritory> {
    let (tam_us, sam_us, som_us) = us_basis(funnel, pricing);

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut out = Vec::new();
    for code in requested {
        let territory = code.canonical();
        if territory.is_empty() || !seen.insert(territory.clone()) {
            continue;
        }

        let (factors, confidence) = territory_factors(&territory, record, data);
        let scale = decimal_from_f64(factors.epi_multiplier)
            * decimal_from_f64(factors.price_multiplier);

        out.push(GeographyTerritory {
            territory,
            tam: MoneyMetric::from_usd(tam_us * scale, confidence),
            sam: MoneyMetric::from_usd(sam_us * scale, confidence),
            som: MoneyMetric::from_usd(som_us * scale, confidence),
        });
    }

    out.sort_by(|a, b| {
        b.tam
            .normalized_billions()
            .cmp(&a.tam.normalized_billions())
            .then_with(|| a.territory.cmp(&b.territory))
    });

    debug!(territories = out.len(), "geography breakdown allocated");
    out
}

/// Multipliers and confidence for one canonical territory. The US is the
/// reference basis; explicit record data rates medium, defaults rate low.
fn territory_factors(
    territory: &str,
    record: &IndicationRecord,
    data: &ReferenceDataset,
) -> (GeoFactors, Confidence) {
    if territory == "US" {
        return (
            GeoFactors {
                epi_multiplier: 1.0,
                price_multiplier: 1.0,
            },
            Confidence::High,
        );
    }
    match record.geography.get(territory) {
        Some(&factors) => (factors, Confidence::Medium),
        None => (data.default_geo_factors(), Confidence::Low),
    }
}

/// Aggregate TAM across a breakdown, in billions USD.
pub fn aggregate_tam_billions(breakdown: &[GeographyTerritory]) -> Decimal {
    breakdown
        .iter()
        .map(|t| t.tam.normalized_billions())
        .sum()
}

/// Aggregate SOM across a breakdown, in billions USD.
pub fn aggregate_som_billions(breakdown: &[GeographyTerritory]) -> Decimal {
    breakdown
        .iter()
        .map(|t| t.som.normalized_billions())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{funnel, pricing as pricing_mod};
    use sizing_core::{validate_territory, DevelopmentStage, PricingAssumption};

    fn geo(codes: &[&str]) -> Vec<GeographyCode> {
        codes.iter().map(|c| GeographyCode(c.to_string())).collect()
    }

    fn setup() -> (PatientFunnel, PricingAnalysis, &'static IndicationRecord) {
        let data = sizing_refdata::builtin().unwrap();
        let rec = data.by_synonym("nsclc").unwrap();
        let f = funnel::compute_funnel(rec, DevelopmentStage::Phase2, None, None);
        let p = pricing_mod::analyze_pricing(rec, PricingAssumption::Base, None, data);
        (f, p, rec)
    }

    #[test]
    fn one_entry_per_requested_territory() {
        let data = sizing_refdata::builtin().unwrap();
        let (f, p, rec) = setup();
        let single = allocate(&f, &p, &geo(&["US"]), rec, data);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].territory, "US");

        let three = allocate(&f, &p, &geo(&["US", "EU5", "Japan"]), rec, data);
        assert_eq!(three.len(), 3);
    }

    #[test]
    fn duplicates_are_collapsed_case_insensitively() {
        let data = sizing_refdata::builtin().unwrap();
        let (f, p, rec) = setup();
        let out = allocate(&f, &p, &geo(&["US", "us", " Us "]), rec, data);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn sorted_by_tam_descending() {
        let data = sizing_refdata::builtin().unwrap();
        let (f, p, rec) = setup();
        let out = allocate(&f, &p, &geo(&["Japan", "US", "EU5", "China"]), rec, data);
        let tams: Vec<Decimal> = out.iter().map(|t| t.tam.normalized_billions()).collect();
        for w in tams.windows(2) {
            assert!(w[0] >= w[1]);
        }
        assert_eq!(out[0].territory, "US");
    }

    #[test]
    fn every_territory_is_internally_ordered() {
        let data = sizing_refdata::builtin().unwrap();
        let (f, p, rec) = setup();
        let out = allocate(&f, &p, &geo(&["US", "EU5", "Japan", "China", "Brazil"]), rec, data);
        for t in &out {
            validate_territory(t).unwrap();
        }
    }

    #[test]
    fn unknown_territory_gets_low_confidence_default() {
        let data = sizing_refdata::builtin().unwrap();
        let (f, p, rec) = setup();
        let out = allocate(&f, &p, &geo(&["Brazil"]), rec, data);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tam.confidence, Confidence::Low);
        assert!(out[0].tam.normalized_billions() > Decimal::ZERO);
    }

    #[test]
    fn more_territories_never_shrink_aggregate_tam() {
        let data = sizing_refdata::builtin().unwrap();
        let (f, p, rec) = setup();
        let narrow = allocate(&f, &p, &geo(&["US"]), rec, data);
        let wide = allocate(&f, &p, &geo(&["US", "EU5", "Japan", "China"]), rec, data);
        assert!(aggregate_tam_billions(&wide) > aggregate_tam_billions(&narrow));
    }
}
