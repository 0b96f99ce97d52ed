// Financial Record Resolver - expenditures, spends, budgets
//
// Amounts arrive raw with a successor suffix and are normalized to base
// units exactly once, at creation; a re-resolved record keeps its stored
// amount untouched. The expenditure amount is deliberately outside the
// natural key: same tuple, different amount means update-in-place.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::currency::{normalize_amount, CurrencySuccessor};
use crate::db::FieldValue;
use crate::entities::EntityKind;
use crate::resolver::{NaturalKeyResolver, Resolution, ResolveError};

pub struct FinanceResolver {
    resolver: Arc<NaturalKeyResolver>,
}

impl FinanceResolver {
    pub fn new(resolver: Arc<NaturalKeyResolver>) -> Self {
        FinanceResolver { resolver }
    }

    /// Resolve/create an Expenditure keyed by the full
    /// (application, type, description, start, end) tuple.
    pub fn resolve_expenditure(
        &self,
        application_id: &str,
        expenditure_type: Option<&str>,
        description: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        amount: Option<f64>,
    ) -> Result<Resolution, ResolveError> {
        let key = [
            ("application_id", FieldValue::text(application_id)),
            ("expenditure_type", FieldValue::opt_text(expenditure_type)),
            ("description", FieldValue::opt_text(description)),
            ("start_date", FieldValue::opt_date(start)),
            ("end_date", FieldValue::opt_date(end)),
        ];
        let resolution = self.resolver.resolve_or_create(
            EntityKind::Expenditure,
            &key,
            &[("amount", FieldValue::Real(amount.unwrap_or(0.0)))],
        )?;

        // Same tuple with a drifted amount is the same record, updated
        if !resolution.created {
            if let Some(new_amount) = amount {
                let stored = resolution.record.real_field("amount").unwrap_or(0.0);
                if (stored - new_amount).abs() > f64::EPSILON {
                    debug!(
                        expenditure = %resolution.record.id,
                        stored, new_amount, "updating expenditure amount in place"
                    );
                    self.resolver.store().update_fields(
                        EntityKind::Expenditure,
                        &resolution.record.id,
                        &[("amount", FieldValue::Real(new_amount))],
                    )?;
                    let record = self
                        .resolver
                        .store()
                        .get(EntityKind::Expenditure, &resolution.record.id)?
                        .unwrap_or(resolution.record);
                    return Ok(Resolution {
                        record,
                        created: false,
                    });
                }
            }
        }
        Ok(resolution)
    }

    /// Resolve/create a Spend keyed by (spend id, type), normalizing the raw
    /// amount by the successor multiplier at creation.
    pub fn resolve_spend(
        &self,
        spend_no: Option<&str>,
        spend_type: Option<&str>,
        raw_amount: Option<f64>,
        successor: CurrencySuccessor,
        spend_date: Option<NaiveDate>,
        application_id: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        let amount = match raw_amount {
            Some(raw) => FieldValue::Real(normalize_amount(raw, successor)),
            None => FieldValue::Null,
        };
        self.resolver.resolve_or_create(
            EntityKind::Spend,
            &[
                ("spend_no", FieldValue::opt_text(spend_no)),
                ("spend_type", FieldValue::opt_text(spend_type)),
            ],
            &[
                ("amount", amount),
                ("spend_date", FieldValue::opt_date(spend_date)),
                ("application_id", FieldValue::opt_text(application_id)),
            ],
        )
    }

    /// Resolve/create a Budget keyed by (application, year, successor unit).
    pub fn resolve_budget(
        &self,
        application_id: &str,
        raw_amount: Option<f64>,
        successor: CurrencySuccessor,
        year: Option<i32>,
    ) -> Result<Resolution, ResolveError> {
        let amount = match raw_amount {
            Some(raw) => FieldValue::Real(normalize_amount(raw, successor)),
            None => FieldValue::Null,
        };
        let year = match year {
            Some(y) => FieldValue::Integer(y as i64),
            None => FieldValue::Null,
        };
        self.resolver.resolve_or_create(
            EntityKind::Budget,
            &[
                ("application_id", FieldValue::text(application_id)),
                ("year", year),
                ("successor", FieldValue::text(successor.token())),
            ],
            &[("amount", amount)],
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    fn setup() -> (Arc<SqliteStore>, FinanceResolver, String) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let company = store
            .create(EntityKind::Company, &[("name", FieldValue::text("Acme"))])
            .unwrap();
        let unit = store
            .create(
                EntityKind::OrganizationalUnit,
                &[
                    ("name", FieldValue::text("Operations")),
                    ("company_id", FieldValue::text(&company.id)),
                ],
            )
            .unwrap();
        let lob = store
            .create(
                EntityKind::LineOfBusiness,
                &[
                    ("name", FieldValue::text("Retail")),
                    ("org_unit_id", FieldValue::text(&unit.id)),
                ],
            )
            .unwrap();
        let app = store
            .create(
                EntityKind::Application,
                &[
                    ("name", FieldValue::text("Billing")),
                    ("lob_id", FieldValue::text(&lob.id)),
                ],
            )
            .unwrap();
        let resolver = Arc::new(NaturalKeyResolver::new(Arc::clone(&store)));
        (store, FinanceResolver::new(resolver), app.id)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expenditure_amount_is_not_part_of_the_key() {
        let (store, finance, app_id) = setup();
        let start = Some(date(2025, 1, 1));
        let end = Some(date(2025, 12, 31));

        let first = finance
            .resolve_expenditure(&app_id, Some("License"), Some("ERP seats"), start, end, Some(1200.0))
            .unwrap();
        let second = finance
            .resolve_expenditure(&app_id, Some("License"), Some("ERP seats"), start, end, Some(1500.0))
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(second.record.real_field("amount"), Some(1500.0));
        assert_eq!(store.count(EntityKind::Expenditure).unwrap(), 1);
    }

    #[test]
    fn test_expenditure_without_dates_fails() {
        let (_, finance, app_id) = setup();
        let err = finance
            .resolve_expenditure(&app_id, Some("License"), Some("ERP seats"), None, None, Some(1200.0))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingRequiredField { field: "start_date", .. }
        ));
    }

    #[test]
    fn test_spend_amount_normalized_once() {
        let (store, finance, _) = setup();

        let first = finance
            .resolve_spend(
                Some("SP-9"),
                Some("Run"),
                Some(5.0),
                CurrencySuccessor::Millions,
                Some(date(2024, 6, 1)),
                None,
            )
            .unwrap();
        assert!(first.created);
        assert_eq!(first.record.real_field("amount"), Some(5_000_000.0));

        // Re-resolving must not re-apply the multiplier
        let second = finance
            .resolve_spend(
                Some("SP-9"),
                Some("Run"),
                Some(5.0),
                CurrencySuccessor::Millions,
                Some(date(2024, 6, 1)),
                None,
            )
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.record.real_field("amount"), Some(5_000_000.0));
        assert_eq!(store.count(EntityKind::Spend).unwrap(), 1);
    }

    #[test]
    fn test_budget_keyed_by_year_and_successor() {
        let (store, finance, app_id) = setup();

        let b24 = finance
            .resolve_budget(&app_id, Some(2.0), CurrencySuccessor::Thousands, Some(2024))
            .unwrap();
        let b25 = finance
            .resolve_budget(&app_id, Some(2.0), CurrencySuccessor::Thousands, Some(2025))
            .unwrap();
        let again = finance
            .resolve_budget(&app_id, Some(2.0), CurrencySuccessor::Thousands, Some(2024))
            .unwrap();

        assert_ne!(b24.record.id, b25.record.id);
        assert_eq!(b24.record.id, again.record.id);
        assert_eq!(b24.record.real_field("amount"), Some(2_000.0));
        assert_eq!(store.count(EntityKind::Budget).unwrap(), 2);
    }
}
