//! Ten-year bear/base/bull revenue projection.
//!
//! Curve shape (a documented design choice): a fixed ramp-and-plateau
//! adoption curve rising to a peak in year 8 post-launch, then eroding
//! gently. Scenario bands are fixed multiples of the base curve, and the
//! whole projection is scaled by a stage-dependent probability of success.
//! All math stays in `Decimal`, so the projection is exact and NaN-free by
//! construction.

use rust_decimal::Decimal;
use sizing_core::{
    DevelopmentStage, GeographyTerritory, PatientFunnel, PricingAnalysis, RevenueProjectionYear,
};
use tracing::debug;

use crate::geography;

/// Adoption fraction of peak sales per post-launch year, in hundredths.
const ADOPTION_CURVE_PCT: [i64; 10] = [5, 15, 30, 50, 70, 85, 95, 100, 97, 93];

/// Scenario multipliers: bear 0.60x, bull 1.50x of the base curve.
const BEAR_FACTOR: Decimal = Decimal::from_parts(6, 0, 0, false, 1);
const BULL_FACTOR: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

/// Probability-of-success multiplier by development stage; 1.0 once approved.
pub fn probability_of_success(stage: DevelopmentStage) -> Decimal {
    match stage {
        DevelopmentStage::Preclinical => Decimal::new(8, 2),
        DevelopmentStage::Phase1 => Decimal::new(12, 2),
        DevelopmentStage::Phase2 => Decimal::new(25, 2),
        DevelopmentStage::Phase3 => Decimal::new(55, 2),
        DevelopmentStage::Approved => Decimal::ONE,
    }
}

/// Project ten consecutive years of revenue starting at `launch_year`.
///
/// Values are USD millions. Peak base revenue is the aggregate obtainable
/// market (SOM across the breakdown; the US basis when the breakdown is
/// empty) scaled by the probability of success. Guarantees: exactly ten
/// entries, `bear < base < bull` every year, all values positive.
pub fn project(
    funnel: &PatientFunnel,
    breakdown: &[GeographyTerritory],
    pricing: &PricingAnalysis,
    stage: DevelopmentStage,
    launch_year: i32,
) -> Vec<RevenueProjectionYear> {
    let som_billions = if breakdown.is_empty() {
        let (_, _, som_us) = geography::us_basis(funnel, pricing);
        som_us / Decimal::new(1_000_000_000, 0)
    } else {
        geography::aggregate_som_billions(breakdown)
    };

    let peak_millions = som_billions * Decimal::new(1000, 0) * probability_of_success(stage);
    debug!(%peak_millions, ?stage, launch_year, "revenue projection scaled");

    ADOPTION_CURVE_PCT
        .iter()
        .enumerate()
        .map(|(i, &pct)| {
            let base = (peak_millions * Decimal::new(pct, 2)).round_dp(4);
            RevenueProjectionYear {
                year: launch_year + i as i32,
                bear: (base * BEAR_FACTOR).round_dp(4),
                base,
                bull: (base * BULL_FACTOR).round_dp(4),
            }
        })
        .collect()
}

/// Maximum of the base curve across the projection, USD millions.
pub fn peak_base_millions(projection: &[RevenueProjectionYear]) -> Decimal {
    projection
        .iter()
        .map(|y| y.base)
        .max()
        .unwrap_or(Decimal::ZERO)
}
