#![deny(warnings)]

//! Market opportunity sizing engine.
//!
//! A pure, synchronous, deterministic pipeline from a disease indication and
//! a small set of commercial assumptions to a quantified market-sizing
//! report: patient funnel, TAM/SAM/SOM by geography, pricing analysis, and a
//! ten-year bear/base/bull revenue projection.
//!
//! The pipeline runs the indication resolver first, fans out to the funnel,
//! pricing, and competitive components (mutually independent), then feeds
//! the geography allocator and revenue projector, and finally composes the
//! report. The only surfaced domain error is
//! [`SizingError::IndicationNotFound`]; every other computation is defensive
//! by construction and falls back to documented defaults.

pub mod assemble;
pub mod competitive;
pub mod funnel;
pub mod geography;
pub mod pricing;
pub mod resolver;
pub mod revenue;

use sizing_core::{MarketSizingInput, MarketSizingOutput, SizingError};
use sizing_refdata::ReferenceDataset;
use tracing::debug;

/// Run the full sizing pipeline for one request.
///
/// Pure function of `(input, data)`: no I/O, no mutation, no randomness.
/// Safe to call concurrently from any number of threads over the same
/// dataset reference.
pub fn calculate_market_sizing(
    input: &MarketSizingInput,
    data: &ReferenceDataset,
) -> Result<MarketSizingOutput, SizingError> {
    let record = resolver::resolve(&input.indication, data)?;
    debug!(indication = %record.name, "indication resolved");

    let funnel = funnel::compute_funnel(
        record,
        input.development_stage,
        input.patient_segment.as_deref(),
        input.subtype.as_deref(),
    );
    let pricing = pricing::analyze_pricing(
        record,
        input.pricing_assumption,
        input.mechanism.as_deref(),
        data,
    );
    let competitive = competitive::link_context(record, data);

    let breakdown = geography::allocate(&funnel, &pricing, &input.geography, record, data);
    let projection = revenue::project(
        &funnel,
        &breakdown,
        &pricing,
        input.development_stage,
        input.launch_year,
    );

    Ok(assemble::assemble(
        record,
        input,
        funnel,
        pricing,
        competitive,
        breakdown,
        projection,
        data,
    ))
}
