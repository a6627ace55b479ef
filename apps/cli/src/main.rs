#![deny(warnings)]

//! Headless CLI: runs one market-sizing request against the builtin
//! reference dataset and prints the report as JSON.

use anyhow::{bail, Context, Result};
use sizing_core::{
    validate_input, DevelopmentStage, GeographyCode, MarketSizingInput, PricingAssumption,
};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    indication: Option<String>,
    geography: String,
    stage: String,
    pricing: String,
    launch_year: i32,
    segment: Option<String>,
    mechanism: Option<String>,
    subtype: Option<String>,
    pretty: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        indication: None,
        geography: "US".to_string(),
        stage: "phase2".to_string(),
        pricing: "base".to_string(),
        launch_year: 2028,
        segment: None,
        mechanism: None,
        subtype: None,
        pretty: false,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--indication" => args.indication = it.next(),
            "--geography" => {
                if let Some(g) = it.next() {
                    args.geography = g;
                }
            }
            "--stage" => {
                if let Some(s) = it.next() {
                    args.stage = s;
                }
            }
            "--pricing" => {
                if let Some(p) = it.next() {
                    args.pricing = p;
                }
            }
            "--launch-year" => {
                if let Some(y) = it.next().and_then(|s| s.parse().ok()) {
                    args.launch_year = y;
                }
            }
            "--segment" => args.segment = it.next(),
            "--mechanism" => args.mechanism = it.next(),
            "--subtype" => args.subtype = it.next(),
            "--pretty" => args.pretty = true,
            _ => {}
        }
    }
    args
}

fn parse_stage(s: &str) -> Result<DevelopmentStage> {
    Ok(match s.to_lowercase().as_str() {
        "preclinical" => DevelopmentStage::Preclinical,
        "phase1" => DevelopmentStage::Phase1,
        "phase2" => DevelopmentStage::Phase2,
        "phase3" => DevelopmentStage::Phase3,
        "approved" => DevelopmentStage::Approved,
        other => bail!("unknown development stage '{other}'"),
    })
}

fn parse_pricing(s: &str) -> Result<PricingAssumption> {
    Ok(match s.to_lowercase().as_str() {
        "conservative" => PricingAssumption::Conservative,
        "base" => PricingAssumption::Base,
        "premium" => PricingAssumption::Premium,
        other => bail!("unknown pricing assumption '{other}'"),
    })
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    let Some(indication) = args.indication else {
        bail!("--indication is required (e.g. --indication NSCLC)");
    };

    let input = MarketSizingInput {
        indication,
        geography: args
            .geography
            .split(',')
            .map(|g| GeographyCode(g.trim().to_string()))
            .filter(|g| !g.0.is_empty())
            .collect(),
        development_stage: parse_stage(&args.stage)?,
        pricing_assumption: parse_pricing(&args.pricing)?,
        launch_year: args.launch_year,
        mechanism: args.mechanism,
        patient_segment: args.segment,
        subtype: args.subtype,
    };
    validate_input(&input).context("invalid request")?;

    // Dataset parse failure is fatal at startup, never per request.
    let data = sizing_refdata::builtin().context("reference dataset failed to load")?;
    info!(
        indication = %input.indication,
        territories = input.geography.len(),
        dataset = data.version(),
        build = env!("GIT_SHA"),
        "running market sizing"
    );

    let report = sizing_engine::calculate_market_sizing(&input, data)?;
    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");

    Ok(())
}
