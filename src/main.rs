use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use portfolio_engine::{
    load_workbook, AggregationService, EntityKind, FieldValue, IngestionOrchestrator,
    SqliteStore,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("import") if args.len() == 5 => run_import(&args[2], &args[3], &args[4]),
        Some("report") if args.len() == 4 => run_report(&args[2], &args[3]),
        _ => {
            eprintln!("Usage:");
            eprintln!("  portfolio-engine import <db-path> <workbook.csv> <company-name>");
            eprintln!("  portfolio-engine report <db-path> <company-name>");
            std::process::exit(2);
        }
    }
}

fn run_import(db_path: &str, csv_path: &str, company_name: &str) -> Result<()> {
    let store = Arc::new(
        SqliteStore::open(Path::new(db_path))
            .with_context(|| format!("Failed to open database {}", db_path))?,
    );
    let company_id = find_or_create_company(&store, company_name)?;

    let (rows, stat) = load_workbook(Path::new(csv_path))?;
    println!(
        "Loaded {} rows from {} (sha256 {})",
        stat.rows, stat.path, stat.checksum_sha256
    );

    let orchestrator = IngestionOrchestrator::new(store);
    let summary = orchestrator
        .ingest(&company_id, &rows)
        .context("Ingestion aborted by a store failure")?;

    println!("{}", summary.overview());
    for (kind, count) in &summary.created {
        println!("  created {:<20} {}", kind.as_str(), count);
    }
    for (kind, count) in &summary.reused {
        println!("  reused  {:<20} {}", kind.as_str(), count);
    }
    for failure in &summary.failures {
        println!("  row {:>4} skipped: {}", failure.row_index, failure.reason);
    }

    Ok(())
}

fn run_report(db_path: &str, company_name: &str) -> Result<()> {
    let store = Arc::new(
        SqliteStore::open(Path::new(db_path))
            .with_context(|| format!("Failed to open database {}", db_path))?,
    );
    let Some(company) = store.find(
        EntityKind::Company,
        &[("name", FieldValue::text(company_name))],
    )?
    else {
        bail!("Company '{}' not found in {}", company_name, db_path);
    };

    let aggregation = AggregationService::new(Arc::clone(&store));

    let chart = aggregation.organizational_chart(&company.id)?;
    println!("Organizational chart:");
    println!("{}", serde_json::to_string_pretty(&chart)?);

    let usage = aggregation.technology_usage(&company.id)?;
    println!("Technology usage:");
    println!("{}", serde_json::to_string_pretty(&usage)?);

    println!("Application financials:");
    for application in store.list_all(EntityKind::Application)? {
        let financials = aggregation.application_financials(&application.id)?;
        println!("{}", serde_json::to_string_pretty(&financials)?);
    }

    let series = aggregation.yearly_spend()?;
    println!("Yearly spend:");
    println!("{}", serde_json::to_string_pretty(&series)?);

    Ok(())
}

fn find_or_create_company(store: &Arc<SqliteStore>, name: &str) -> Result<String> {
    if let Some(existing) =
        store.find(EntityKind::Company, &[("name", FieldValue::text(name))])?
    {
        return Ok(existing.id);
    }
    let created = store.create(EntityKind::Company, &[("name", FieldValue::text(name))])?;
    println!("Created company '{}' ({})", name, created.id);
    Ok(created.id)
}
