// Application & Technology Resolver
//
// Applications are scoped to a LineOfBusiness; technology stacks live in a
// tenant-wide catalog shared across applications; Technology is the
// association fact between the two, created only against already-resolved
// endpoints and never resolved on its own.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::db::FieldValue;
use crate::entities::EntityKind;
use crate::resolver::{NaturalKeyResolver, Resolution, ResolveError};

pub struct ApplicationResolver {
    resolver: Arc<NaturalKeyResolver>,
}

impl ApplicationResolver {
    pub fn new(resolver: Arc<NaturalKeyResolver>) -> Self {
        ApplicationResolver { resolver }
    }

    /// Resolve/create an Application under the given LineOfBusiness.
    pub fn resolve_application(
        &self,
        lob_id: &str,
        name: &str,
        app_type: Option<&str>,
        status: Option<&str>,
        implementation_date: Option<NaiveDate>,
    ) -> Result<Resolution, ResolveError> {
        self.resolver.resolve_or_create(
            EntityKind::Application,
            &[
                ("name", FieldValue::text(name)),
                ("lob_id", FieldValue::text(lob_id)),
            ],
            &[
                ("app_type", FieldValue::opt_text(app_type)),
                ("status", FieldValue::opt_text(status)),
                (
                    "implementation_date",
                    FieldValue::opt_date(implementation_date),
                ),
            ],
        )
    }

    /// Resolve/create a stack in the shared catalog. All three fields key it;
    /// no application scope.
    pub fn resolve_stack(
        &self,
        name: &str,
        version: Option<&str>,
        stack_type: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        self.resolver.resolve_or_create(
            EntityKind::TechnologyStack,
            &[
                ("name", FieldValue::text(name)),
                ("version", FieldValue::opt_text(version)),
                ("stack_type", FieldValue::opt_text(stack_type)),
            ],
            &[],
        )
    }

    /// Resolve/create the (application, stack) association. Reuses the
    /// existing fact when the pair is already recorded.
    pub fn resolve_technology(
        &self,
        application_id: &str,
        stack_id: &str,
    ) -> Result<Resolution, ResolveError> {
        self.resolver.resolve_or_create(
            EntityKind::Technology,
            &[
                ("application_id", FieldValue::text(application_id)),
                ("stack_id", FieldValue::text(stack_id)),
            ],
            &[],
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

    fn setup() -> (Arc<SqliteStore>, ApplicationResolver, String) {
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
        let resolver = Arc::new(NaturalKeyResolver::new(Arc::clone(&store)));
        (store, ApplicationResolver::new(resolver), lob.id)
    }

    #[test]
    fn test_application_scoped_to_lob() {
        let (store, apps, lob_id) = setup();

        let first = apps
            .resolve_application(&lob_id, "Billing", Some("COTS"), Some("Live"), None)
            .unwrap();
        let second = apps
            .resolve_application(&lob_id, "Billing", Some("COTS"), Some("Live"), None)
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(store.count(EntityKind::Application).unwrap(), 1);
    }

    #[test]
    fn test_stack_is_a_shared_catalog_entry() {
        let (store, apps, _) = setup();

        let a = apps.resolve_stack("PostgreSQL", Some("15"), Some("Database")).unwrap();
        let b = apps.resolve_stack("PostgreSQL", Some("15"), Some("Database")).unwrap();
        let c = apps.resolve_stack("PostgreSQL", Some("16"), Some("Database")).unwrap();

        assert_eq!(a.record.id, b.record.id);
        assert_ne!(a.record.id, c.record.id, "version is part of the key");
        assert_eq!(store.count(EntityKind::TechnologyStack).unwrap(), 2);
    }

    #[test]
    fn test_stack_without_version_fails() {
        let (_, apps, _) = setup();
        let err = apps.resolve_stack("PostgreSQL", None, Some("Database")).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingRequiredField { field: "version", .. }
        ));
    }

    #[test]
    fn test_technology_pair_has_no_duplicate_fact() {
        let (store, apps, lob_id) = setup();
        let app = apps
            .resolve_application(&lob_id, "Billing", None, None, None)
            .unwrap();
        let stack = apps
            .resolve_stack("PostgreSQL", Some("15"), Some("Database"))
            .unwrap();

        let first = apps
            .resolve_technology(&app.record.id, &stack.record.id)
            .unwrap();
        let second = apps
            .resolve_technology(&app.record.id, &stack.record.id)
            .unwrap();

        assert!(first.created);
        assert!(!second.created, "existing pair must be a no-op");
        assert_eq!(store.count(EntityKind::Technology).unwrap(), 1);
    }
}
