#![deny(warnings)]

//! Versioned static reference dataset for the sizing engine.
//!
//! The dataset (indication records, pricing comparables, competitive
//! snapshot, geography multipliers) ships embedded as JSON, is deserialized
//! once at first access, and is read-only for the lifetime of the process.
//! A malformed dataset is a fatal boot-time condition, never a per-request
//! one.

use serde::Deserialize;
use sizing_core::{CompetitiveSnapshot, GeoFactors, IndicationRecord, PricingComparable};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

const EMBEDDED: &str = include_str!("../data/reference.json");

/// Errors raised while loading the reference dataset at startup.
#[derive(Debug, Error)]
pub enum RefDataError {
    #[error("reference dataset failed to parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("indication record '{0}' has a rate outside (0, 1]")]
    InvalidRate(String),
    #[error("alias '{0}' maps to more than one indication")]
    DuplicateAlias(String),
    #[error("comparable '{0}' has a non-positive price")]
    NonPositivePrice(String),
}

#[derive(Deserialize)]
struct RawDataset {
    version: String,
    default_geo_factors: GeoFactors,
    default_gross_to_net: f64,
    gross_to_net_by_area: BTreeMap<String, f64>,
    indications: Vec<IndicationRecord>,
    comparables: Vec<PricingComparable>,
    competitive: BTreeMap<String, CompetitiveSnapshot>,
    data_sources: Vec<String>,
}

/// The loaded, indexed reference dataset.
///
/// Lookup indices over canonical names and synonyms are precomputed here so
/// resolution stays a pure function over `(query, dataset)`.
#[derive(Debug)]
pub struct ReferenceDataset {
    version: String,
    default_geo_factors: GeoFactors,
    default_gross_to_net: f64,
    gross_to_net_by_area: BTreeMap<String, f64>,
    indications: Vec<IndicationRecord>,
    comparables: Vec<PricingComparable>,
    competitive: BTreeMap<String, CompetitiveSnapshot>,
    data_sources: Vec<String>,
    name_index: HashMap<String, usize>,
    synonym_index: HashMap<String, usize>,
}

impl ReferenceDataset {
    /// Parse and index a dataset from its JSON source.
    pub fn from_json(json: &str) -> Result<Self, RefDataError> {
        let raw: RawDataset = serde_json::from_str(json)?;

        for rec in &raw.indications {
            let ok = |r: f64| r > 0.0 && r <= 1.0;
            if !ok(rec.diagnosis_rate) || !ok(rec.treatment_rate) {
                return Err(RefDataError::InvalidRate(rec.name.clone()));
            }
        }
        for c in &raw.comparables {
            if c.wac_annual_price <= rust_decimal::Decimal::ZERO {
                return Err(RefDataError::NonPositivePrice(c.drug_name.clone()));
            }
        }

        let mut name_index = HashMap::new();
        let mut synonym_index = HashMap::new();
        for (i, rec) in raw.indications.iter().enumerate() {
            if name_index.insert(rec.name.to_lowercase(), i).is_some() {
                return Err(RefDataError::DuplicateAlias(rec.name.clone()));
            }
            for syn in &rec.synonyms {
                if synonym_index.insert(syn.to_lowercase(), i).is_some() {
                    return Err(RefDataError::DuplicateAlias(syn.clone()));
                }
            }
        }

        debug!(
            version = %raw.version,
            indications = raw.indications.len(),
            comparables = raw.comparables.len(),
            "reference dataset loaded"
        );

        Ok(Self {
            version: raw.version,
            default_geo_factors: raw.default_geo_factors,
            default_gross_to_net: raw.default_gross_to_net,
            gross_to_net_by_area: raw.gross_to_net_by_area,
            indications: raw.indications,
            comparables: raw.comparables,
            competitive: raw.competitive,
            data_sources: raw.data_sources,
            name_index,
            synonym_index,
        })
    }

    /// Dataset version stamped into report citations.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn indications(&self) -> &[IndicationRecord] {
        &self.indications
    }

    pub fn comparables(&self) -> &[PricingComparable] {
        &self.comparables
    }

    pub fn data_sources(&self) -> &[String] {
        &self.data_sources
    }

    /// Exact lookup against canonical names; `query` must be lowercased.
    pub fn by_canonical_name(&self, query: &str) -> Option<&IndicationRecord> {
        self.name_index.get(query).map(|&i| &self.indications[i])
    }

    /// Exact lookup against synonyms; `query` must be lowercased.
    pub fn by_synonym(&self, query: &str) -> Option<&IndicationRecord> {
        self.synonym_index.get(query).map(|&i| &self.indications[i])
    }

    /// Competitive snapshot for a record's linkage key, if any.
    pub fn competitive_for(&self, key: &str) -> Option<CompetitiveSnapshot> {
        self.competitive.get(key).copied()
    }

    /// Conservative factors applied to territories absent from a record's map.
    pub fn default_geo_factors(&self) -> GeoFactors {
        self.default_geo_factors
    }

    /// Gross-to-net payer discount for a therapy area, with the dataset-level
    /// default for areas not in the table. Always in (0, 1).
    pub fn gross_to_net_for(&self, therapy_area: &str) -> f64 {
        self.gross_to_net_by_area
            .get(&therapy_area.to_lowercase())
            .copied()
            .unwrap_or(self.default_gross_to_net)
    }
}

static BUILTIN: OnceLock<ReferenceDataset> = OnceLock::new();

/// The embedded dataset, parsed and indexed once per process.
///
/// A parse failure here is the fatal boot-time path: callers should treat it
/// as unrecoverable and abort startup.
pub fn builtin() -> Result<&'static ReferenceDataset, RefDataError> {
    if let Some(data) = BUILTIN.get() {
        return Ok(data);
    }
    let parsed = ReferenceDataset::from_json(EMBEDDED)?;
    Ok(BUILTIN.get_or_init(|| parsed))
}
