//! Free-text indication resolution against the reference dataset.
//!
//! Matching order: exact canonical name, exact synonym, then fuzzy scoring
//! with a fixed acceptance threshold. Resolution is a pure function over
//! `(query, dataset)` and is referentially transparent: the same query
//! (after case normalization) always resolves to the same record.

use sizing_core::{IndicationRecord, SizingError};
use sizing_refdata::ReferenceDataset;
use std::collections::BTreeSet;
use tracing::debug;

/// Minimum fuzzy confidence required to accept a match.
const FUZZY_THRESHOLD: f64 = 0.55;
/// Strings shorter than this never participate in prefix/substring scoring,
/// on either side of the comparison.
const MIN_PARTIAL_LEN: usize = 3;

/// Resolve a free-text indication name or synonym to its canonical record.
pub fn resolve<'a>(
    query: &str,
    data: &'a ReferenceDataset,
) -> Result<&'a IndicationRecord, SizingError> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Err(SizingError::IndicationNotFound(query.to_string()));
    }

    if let Some(rec) = data.by_canonical_name(&q) {
        return Ok(rec);
    }
    if let Some(rec) = data.by_synonym(&q) {
        debug!(query, canonical = %rec.name, "resolved via synonym");
        return Ok(rec);
    }

    // Fuzzy pass: best score wins, ties broken by canonical name so the
    // decision is total and deterministic.
    let mut best: Option<(f64, &IndicationRecord)> = None;
    for rec in data.indications() {
        let score = record_score(&q, rec);
        let better = match best {
            None => score >= FUZZY_THRESHOLD,
            Some((s, b)) => {
                score >= FUZZY_THRESHOLD
                    && (score > s || (score == s && rec.name.as_str() < b.name.as_str()))
            }
        };
        if better {
            best = Some((score, rec));
        }
    }

    match best {
        Some((score, rec)) => {
            debug!(query, canonical = %rec.name, score, "resolved via fuzzy match");
            Ok(rec)
        }
        None => Err(SizingError::IndicationNotFound(query.to_string())),
    }
}

/// Best candidate score across a record's canonical name and synonyms.
fn record_score(query: &str, rec: &IndicationRecord) -> f64 {
    let mut best = candidate_score(query, &rec.name.to_lowercase());
    for syn in &rec.synonyms {
        best = best.max(candidate_score(query, &syn.to_lowercase()));
    }
    best
}

/// Confidence in [0, 1] that `query` means `candidate`.
///
/// Tier ordering is exact > prefix > substring > token overlap, so the
/// preferred interpretation always wins on score alone. Partial matching
/// requires both strings to clear [`MIN_PARTIAL_LEN`]; otherwise short
/// synonyms like "RA" would fire inside unrelated queries.
fn candidate_score(query: &str, candidate: &str) -> f64 {
    if query == candidate {
        return 1.0;
    }
    if query.len() >= MIN_PARTIAL_LEN && candidate.len() >= MIN_PARTIAL_LEN {
        if candidate.starts_with(query) {
            return 0.90;
        }
        if candidate.contains(query) || query.contains(candidate) {
            return 0.75;
        }
    }
    0.70 * token_jaccard(query, candidate)
}

fn tokens(text: &str) -> BTreeSet<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Jaccard overlap of the alphanumeric token sets of two strings.
fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}
