//! Competitive context lookup against the competitive-landscape snapshot.
//!
//! This component only reads reference data and never fails: indications
//! without competitive coverage get a documented low/zero baseline.

use sizing_core::{CompetitiveContext, CompetitiveSnapshot, IndicationRecord};
use sizing_refdata::ReferenceDataset;
use tracing::debug;

/// Baseline used when the landscape snapshot has no entry for the indication.
const BASELINE: CompetitiveSnapshot = CompetitiveSnapshot {
    crowding_score: 1.0,
    approved_products: 0,
    phase3_programs: 0,
};

/// Attach crowding and pipeline counts for the resolved indication.
pub fn link_context(record: &IndicationRecord, data: &ReferenceDataset) -> CompetitiveContext {
    let snapshot = match data.competitive_for(&record.competitive_key) {
        Some(s) => s,
        None => {
            debug!(indication = %record.name, "no competitive data; using baseline");
            BASELINE
        }
    };

    let differentiation_note = if snapshot.crowding_score < 3.0 {
        format!(
            "Sparse competitive set ({} approved, {} phase 3); differentiation \
             hinges on being first to a durable efficacy claim.",
            snapshot.approved_products, snapshot.phase3_programs
        )
    } else if snapshot.crowding_score < 7.0 {
        format!(
            "Moderately contested market ({} approved, {} phase 3); a clear \
             efficacy or convenience edge over the standard of care is required.",
            snapshot.approved_products, snapshot.phase3_programs
        )
    } else {
        format!(
            "Highly crowded market ({} approved, {} phase 3); entry requires \
             head-to-head superiority or a biomarker-defined niche.",
            snapshot.approved_products, snapshot.phase3_programs
        )
    };

    CompetitiveContext {
        crowding_score: snapshot.crowding_score,
        approved_products: snapshot.approved_products,
        phase3_programs: snapshot.phase3_programs,
        differentiation_note,
    }
}
