// Ingestion Orchestrator - drives one workbook through the resolvers
//
// Rows are processed in file order; each row is independent, so one bad row
// is recorded and skipped while the batch continues. Only a persistence
// failure aborts the batch. Cancellation is cooperative between rows and
// leaves everything already committed in place.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::ApplicationResolver;
use crate::currency::CurrencySuccessor;
use crate::db::SqliteStore;
use crate::entities::EntityKind;
use crate::finance::FinanceResolver;
use crate::hierarchy::HierarchyBuilder;
use crate::resolver::{NaturalKeyResolver, Resolution, ResolveError};
use crate::row::PortfolioRow;

// ============================================================================
// CANCELLATION
// ============================================================================

/// Shared flag for best-effort mid-batch cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// INGESTION SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RowFailure {
    pub row_index: usize,
    pub reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct IngestionSummary {
    /// Records created per entity kind
    pub created: BTreeMap<EntityKind, usize>,

    /// Records found and reused per entity kind
    pub reused: BTreeMap<EntityKind, usize>,

    /// Every skipped row with its reason; never silent
    pub failures: Vec<RowFailure>,

    pub rows_processed: usize,
    pub cancelled: bool,
}

impl IngestionSummary {
    fn tally(&mut self, kind: EntityKind, resolution: &Resolution) {
        let bucket = if resolution.created {
            &mut self.created
        } else {
            &mut self.reused
        };
        *bucket.entry(kind).or_insert(0) += 1;
    }

    pub fn created_count(&self, kind: EntityKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn reused_count(&self, kind: EntityKind) -> usize {
        self.reused.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }

    pub fn overview(&self) -> String {
        format!(
            "{} rows processed, {} records created, {} reused, {} rows failed{}",
            self.rows_processed,
            self.total_created(),
            self.reused.values().sum::<usize>(),
            self.failures.len(),
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

pub struct IngestionOrchestrator {
    hierarchy: HierarchyBuilder,
    applications: ApplicationResolver,
    finance: FinanceResolver,
}

impl IngestionOrchestrator {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        let resolver = Arc::new(NaturalKeyResolver::new(store));
        IngestionOrchestrator {
            hierarchy: HierarchyBuilder::new(Arc::clone(&resolver)),
            applications: ApplicationResolver::new(Arc::clone(&resolver)),
            finance: FinanceResolver::new(resolver),
        }
    }

    /// Ingest a whole workbook for the given company.
    pub fn ingest(
        &self,
        company_id: &str,
        rows: &[PortfolioRow],
    ) -> Result<IngestionSummary, ResolveError> {
        self.ingest_with_cancel(company_id, rows, &CancelToken::new())
    }

    /// Ingest with a cancellation token checked between rows. Committed rows
    /// stay committed; there is no batch rollback.
    pub fn ingest_with_cancel(
        &self,
        company_id: &str,
        rows: &[PortfolioRow],
        cancel: &CancelToken,
    ) -> Result<IngestionSummary, ResolveError> {
        info!(company = company_id, rows = rows.len(), "starting ingestion");
        let mut summary = IngestionSummary::default();

        for (row_index, row) in rows.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                info!(row_index, "ingestion cancelled mid-batch");
                break;
            }

            match self.ingest_row(company_id, row, &mut summary) {
                Ok(()) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    let reason = err.to_string();
                    warn!(row_index, %reason, "row skipped");
                    summary.failures.push(RowFailure { row_index, reason });
                }
            }
            summary.rows_processed += 1;
        }

        info!("{}", summary.overview());
        Ok(summary)
    }

    fn ingest_row(
        &self,
        company_id: &str,
        row: &PortfolioRow,
        summary: &mut IngestionSummary,
    ) -> Result<(), ResolveError> {
        let chain = self.hierarchy.build(company_id, row)?;
        for (kind, resolution) in chain.resolutions() {
            summary.tally(kind, resolution);
        }

        // Application, scoped under the row's line of business
        let mut application_id: Option<String> = None;
        if let Some(name) = row.application.as_deref() {
            let lob_id = chain.lob_id().ok_or(ResolveError::MissingParent {
                kind: EntityKind::Application.as_str(),
                parent: EntityKind::LineOfBusiness.as_str(),
            })?;
            let app = self.applications.resolve_application(
                lob_id,
                name,
                row.application_type.as_deref(),
                row.application_status.as_deref(),
                row.implementation_date,
            )?;
            summary.tally(EntityKind::Application, &app);
            application_id = Some(app.record.id);
        }

        // Stack entries join the shared catalog even without an application;
        // the association fact needs both ends resolved.
        if let Some(stack_name) = row.technology_stack.as_deref() {
            let stack = self.applications.resolve_stack(
                stack_name,
                row.stack_version.as_deref(),
                row.stack_type.as_deref(),
            )?;
            summary.tally(EntityKind::TechnologyStack, &stack);

            if let Some(app_id) = application_id.as_deref() {
                let technology = self
                    .applications
                    .resolve_technology(app_id, &stack.record.id)?;
                summary.tally(EntityKind::Technology, &technology);
            }
        }

        if row.has_expenditure_fields() {
            let app_id =
                application_id
                    .as_deref()
                    .ok_or(ResolveError::MissingParent {
                        kind: EntityKind::Expenditure.as_str(),
                        parent: EntityKind::Application.as_str(),
                    })?;
            let expenditure = self.finance.resolve_expenditure(
                app_id,
                row.expenditure_type.as_deref(),
                row.expenditure_description.as_deref(),
                row.expenditure_start,
                row.expenditure_end,
                row.expenditure_amount,
            )?;
            summary.tally(EntityKind::Expenditure, &expenditure);
        }

        if row.has_spend_fields() {
            let successor =
                CurrencySuccessor::parse(row.spend_successor.as_deref().unwrap_or(""));
            let spend = self.finance.resolve_spend(
                row.spend_no.as_deref(),
                row.spend_type.as_deref(),
                row.spend_amount,
                successor,
                row.spend_date,
                application_id.as_deref(),
            )?;
            summary.tally(EntityKind::Spend, &spend);
        }

        if row.has_budget_fields() {
            let app_id =
                application_id
                    .as_deref()
                    .ok_or(ResolveError::MissingParent {
                        kind: EntityKind::Budget.as_str(),
                        parent: EntityKind::Application.as_str(),
                    })?;
            let successor =
                CurrencySuccessor::parse(row.budget_successor.as_deref().unwrap_or(""));
            let budget = self.finance.resolve_budget(
                app_id,
                row.budget_amount,
                successor,
                row.budget_year,
            )?;
            summary.tally(EntityKind::Budget, &budget);
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::FieldValue;
    use chrono::NaiveDate;

    fn setup() -> (Arc<SqliteStore>, IngestionOrchestrator, String) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let company = store
            .create(EntityKind::Company, &[("name", FieldValue::text("Acme"))])
            .unwrap();
        let orchestrator = IngestionOrchestrator::new(Arc::clone(&store));
        (store, orchestrator, company.id)
    }

    fn full_row() -> PortfolioRow {
        PortfolioRow {
            org_unit: Some("Operations".to_string()),
            line_of_business: Some("Retail".to_string()),
            business_function: Some("Sales".to_string()),
            function_type: Some("Primary".to_string()),
            capability: Some("Order Handling".to_string()),
            business_process: Some("Order to Cash".to_string()),
            activity: Some("Invoice Review".to_string()),
            resource_required: Some("Analyst".to_string()),
            employee_no: Some("E-100".to_string()),
            employee_name: Some("Dana Reyes".to_string()),
            application: Some("Billing".to_string()),
            application_type: Some("COTS".to_string()),
            application_status: Some("Live".to_string()),
            technology_stack: Some("PostgreSQL".to_string()),
            stack_version: Some("15".to_string()),
            stack_type: Some("Database".to_string()),
            spend_no: Some("SP-1".to_string()),
            spend_type: Some("Run".to_string()),
            spend_amount: Some(5.0),
            spend_successor: Some("M".to_string()),
            spend_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            budget_year: Some(2025),
            budget_amount: Some(300.0),
            budget_successor: Some("K".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let (store, orchestrator, company_id) = setup();
        let rows = vec![full_row()];

        let first = orchestrator.ingest(&company_id, &rows).unwrap();
        assert!(first.failures.is_empty());
        assert_eq!(first.created_count(EntityKind::Application), 1);
        assert_eq!(first.created_count(EntityKind::Spend), 1);

        let second = orchestrator.ingest(&company_id, &rows).unwrap();
        assert_eq!(second.total_created(), 0, "second pass must reuse everything");
        assert_eq!(second.reused_count(EntityKind::Application), 1);
        assert_eq!(second.reused_count(EntityKind::Activity), 1);
        assert_eq!(store.count(EntityKind::Spend).unwrap(), 1);

        println!("✅ Idempotent re-ingest: {}", second.overview());
    }

    #[test]
    fn test_partial_row_is_not_a_failure() {
        let (store, orchestrator, company_id) = setup();
        let rows = vec![PortfolioRow {
            org_unit: Some("Operations".to_string()),
            line_of_business: Some("Retail".to_string()),
            ..Default::default()
        }];

        let summary = orchestrator.ingest(&company_id, &rows).unwrap();
        assert!(summary.failures.is_empty());
        assert_eq!(summary.created_count(EntityKind::OrganizationalUnit), 1);
        assert_eq!(summary.created_count(EntityKind::LineOfBusiness), 1);
        assert_eq!(store.count(EntityKind::BusinessFunction).unwrap(), 0);
    }

    #[test]
    fn test_bad_row_does_not_sink_the_batch() {
        let (store, orchestrator, company_id) = setup();
        let mut rows = vec![full_row(); 10];
        // Row 3 names a capability but skips the business-function level
        rows[3].business_function = None;
        rows[3].org_unit = Some("Logistics".to_string());

        let summary = orchestrator.ingest(&company_id, &rows).unwrap();
        assert_eq!(summary.rows_processed, 10);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].row_index, 3);
        assert!(
            summary.failures[0].reason.contains("BusinessFunction"),
            "reason should name the missing level: {}",
            summary.failures[0].reason
        );
        // The other nine rows share one hierarchy; row 3 created nothing
        assert_eq!(store.count(EntityKind::OrganizationalUnit).unwrap(), 1);

        println!("✅ Batch survived row failure: {}", summary.overview());
    }

    #[test]
    fn test_application_without_lob_is_missing_parent() {
        let (_, orchestrator, company_id) = setup();
        let rows = vec![PortfolioRow {
            application: Some("Billing".to_string()),
            ..Default::default()
        }];

        let summary = orchestrator.ingest(&company_id, &rows).unwrap();
        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].reason.contains("LineOfBusiness"));
    }

    #[test]
    fn test_stack_without_application_joins_catalog() {
        let (store, orchestrator, company_id) = setup();
        let rows = vec![PortfolioRow {
            technology_stack: Some("Kafka".to_string()),
            stack_version: Some("3.7".to_string()),
            stack_type: Some("Messaging".to_string()),
            ..Default::default()
        }];

        let summary = orchestrator.ingest(&company_id, &rows).unwrap();
        assert!(summary.failures.is_empty());
        assert_eq!(store.count(EntityKind::TechnologyStack).unwrap(), 1);
        assert_eq!(store.count(EntityKind::Technology).unwrap(), 0);
    }

    #[test]
    fn test_cancellation_preserves_committed_rows() {
        let (store, orchestrator, company_id) = setup();
        let rows = vec![full_row()];
        orchestrator.ingest(&company_id, &rows).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let mut more = full_row();
        more.org_unit = Some("Logistics".to_string());
        let summary = orchestrator
            .ingest_with_cancel(&company_id, &[more], &token)
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.rows_processed, 0);
        // The earlier batch is untouched
        assert_eq!(store.count(EntityKind::OrganizationalUnit).unwrap(), 1);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let (_, orchestrator, company_id) = setup();
        let summary = orchestrator.ingest(&company_id, &[full_row()]).unwrap();
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"Application\""));
        assert!(json.contains("\"failures\""));
    }
}
