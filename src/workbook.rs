// Workbook Adapter - CSV with named optional columns, into typed rows
//
// The engine only ever sees typed rows; this adapter is the collaborator
// producing them from an exported workbook. Column headers match the row's
// field names and blank cells become absent fields. The source stat travels
// with the ingestion summary so a run can be traced back to its file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::row::PortfolioRow;

#[derive(Debug, Clone, Serialize)]
pub struct SourceFileStat {
    pub path: String,
    pub rows: usize,
    pub checksum_sha256: String,
    pub loaded_at: DateTime<Utc>,
}

/// Load every row of a workbook export, with a checksum stat of the source.
pub fn load_workbook(path: &Path) -> Result<(Vec<PortfolioRow>, SourceFileStat)> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read workbook {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let checksum_sha256 = format!("{:x}", hasher.finalize());

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let mut rows = Vec::new();
    for (index, result) in reader.deserialize().enumerate() {
        let mut row: PortfolioRow = result
            .with_context(|| format!("Failed to parse workbook row {}", index + 1))?;
        row.normalize();
        rows.push(row);
    }

    let stat = SourceFileStat {
        path: path.display().to_string(),
        rows: rows.len(),
        checksum_sha256,
        loaded_at: Utc::now(),
    };
    Ok((rows, stat))
}

// ============================================================================
// TESTS
// ============================================================================
