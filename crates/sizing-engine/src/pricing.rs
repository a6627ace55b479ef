//! Pricing analysis over the comparable-drug pool.
//!
//! Tier derivation is percentile-style over the selected pool: conservative
//! at P25, base at P50, premium at P75, with strictness guards so the tier
//! ordering holds even for degenerate pools.

use rust_decimal::Decimal;
use sizing_core::{IndicationRecord, PricingAnalysis, PricingAssumption, PricingComparable, WacTiers};
use sizing_refdata::ReferenceDataset;
use tracing::debug;

/// Select comparable drugs and derive the pricing analysis.
///
/// The requested assumption picks which tier (`selected_wac`) feeds the
/// downstream geography and revenue math; it never reorders the tiers.
/// This component never fails: an indication with no class or mechanism
/// matches falls back to its therapy area, then to the whole pool.
pub fn analyze_pricing(
    record: &IndicationRecord,
    assumption: PricingAssumption,
    mechanism: Option<&str>,
    data: &ReferenceDataset,
) -> PricingAnalysis {
    let (pool, pool_kind) = select_pool(record, mechanism, data);

    let mut prices: Vec<Decimal> = pool.iter().map(|c| c.wac_annual_price).collect();
    prices.sort();

    let tiers = tiers_from_sorted(&prices);
    let selected_wac = match assumption {
        PricingAssumption::Conservative => tiers.conservative,
        PricingAssumption::Base => tiers.base,
        PricingAssumption::Premium => tiers.premium,
    };

    let gross_to_net = data.gross_to_net_for(&record.therapy_area);
    let comparables_used: Vec<String> = pool.iter().map(|c| c.drug_name.clone()).collect();

    debug!(
        indication = %record.name,
        pool_kind,
        pool_size = pool.len(),
        %selected_wac,
        "pricing analysis derived"
    );

    let payer_dynamics = format!(
        "Payer mix in {} typically realizes {:.0}% of WAC after rebates and \
         channel discounts; access tightens as list price approaches the top \
         of the comparable band.",
        record.therapy_area,
        (1.0 - gross_to_net) * 100.0
    );
    let pricing_rationale = format!(
        "Tiers are percentile price points over {} comparable(s) drawn from \
         the {} pool; the {:?} tier drives the reported market metrics.",
        pool.len(),
        pool_kind,
        assumption
    );

    PricingAnalysis {
        recommended_wac: tiers,
        selected_wac,
        gross_to_net_estimate: gross_to_net,
        comparables_used,
        payer_dynamics,
        pricing_rationale,
    }
}

/// Comparable pool selection: class/mechanism overlap, then therapy area,
/// then the whole table. Returns the pool and a label for the rationale.
fn select_pool<'a>(
    record: &IndicationRecord,
    mechanism: Option<&str>,
    data: &'a ReferenceDataset,
) -> (Vec<&'a PricingComparable>, &'static str) {
    let mech = mechanism.map(|m| m.trim().to_lowercase()).filter(|m| !m.is_empty());
    let class_or_mech: Vec<&PricingComparable> = data
        .comparables()
        .iter()
        .filter(|c| {
            c.indication_class == record.pricing_class
                || mech
                    .as_deref()
                    .is_some_and(|m| c.mechanism.to_lowercase().contains(m))
        })
        .collect();
    if !class_or_mech.is_empty() {
        return (class_or_mech, "indication-class");
    }

    let area: Vec<&PricingComparable> = data
        .comparables()
        .iter()
        .filter(|c| c.therapy_area.eq_ignore_ascii_case(&record.therapy_area))
        .collect();
    if !area.is_empty() {
        return (area, "therapy-area");
    }

    (data.comparables().iter().collect(), "all-comparables")
}

/// Nearest-rank percentile over an ascending price list, with guards that
/// keep `conservative < base < premium` even when the pool collapses.
fn tiers_from_sorted(prices: &[Decimal]) -> WacTiers {
    // Empty pools cannot occur with the builtin dataset (every record links
    // to at least one comparable, and the final fallback is the whole
    // table), but the seed below keeps this total for external datasets.
    let base = percentile(prices, 2).unwrap_or(Decimal::new(100_000, 0));
    let mut conservative = percentile(prices, 1).unwrap_or(base);
    let mut premium = percentile(prices, 3).unwrap_or(base);

    if conservative >= base {
        conservative = base * Decimal::new(85, 2); // 0.85
    }
    if premium <= base {
        premium = base * Decimal::new(12, 1); // 1.20
    }
    WacTiers {
        conservative,
        base,
        premium,
    }
}

/// Quartile `q` in 1..=3 of a sorted slice, nearest-rank style.
fn percentile(sorted: &[Decimal], q: usize) -> Option<Decimal> {
    if sorted.is_empty() {
        return None;
    }
    let idx = (sorted.len() - 1) * q / 4;
    Some(sorted[idx])
}
