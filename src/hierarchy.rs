// Hierarchy Builder - walks one row down the org hierarchy
//
// Resolution order is strict parent-to-child: OrganizationalUnit →
// LineOfBusiness → BusinessFunction → Capabilities → BusinessProcess →
// Activity. A row that stops early yields a partial chain; a row that skips
// an intermediate level while naming a deeper one is inconsistent and fails
// before anything is created. The Employee reference resolves independently
// of the chain and attributes every node the row creates.

use std::sync::Arc;

use crate::db::FieldValue;
use crate::entities::{EntityKind, FunctionType};
use crate::resolver::{NaturalKeyResolver, Resolution, ResolveError};
use crate::row::PortfolioRow;

/// The six chained levels, parent-to-child.
const LEVEL_KINDS: [EntityKind; 6] = [
    EntityKind::OrganizationalUnit,
    EntityKind::LineOfBusiness,
    EntityKind::BusinessFunction,
    EntityKind::Capabilities,
    EntityKind::BusinessProcess,
    EntityKind::Activity,
];

// ============================================================================
// HIERARCHY CHAIN
// ============================================================================

/// Everything one row resolved or created, by level. Levels the row did not
/// reach stay `None`.
#[derive(Debug, Default)]
pub struct HierarchyChain {
    pub employee: Option<Resolution>,
    pub org_unit: Option<Resolution>,
    pub line_of_business: Option<Resolution>,
    pub business_function: Option<Resolution>,
    pub capability: Option<Resolution>,
    pub business_process: Option<Resolution>,
    pub activity: Option<Resolution>,
}

impl HierarchyChain {
    pub fn lob_id(&self) -> Option<&str> {
        self.line_of_business
            .as_ref()
            .map(|r| r.record.id.as_str())
    }

    /// How many chained levels were resolved (employee excluded).
    pub fn depth(&self) -> usize {
        [
            &self.org_unit,
            &self.line_of_business,
            &self.business_function,
            &self.capability,
            &self.business_process,
            &self.activity,
        ]
        .iter()
        .filter(|level| level.is_some())
        .count()
    }

    /// Resolutions paired with their kinds, for summary tallying.
    pub fn resolutions(&self) -> Vec<(EntityKind, &Resolution)> {
        let mut out = Vec::new();
        if let Some(r) = &self.employee {
            out.push((EntityKind::Employee, r));
        }
        let levels = [
            (&self.org_unit, EntityKind::OrganizationalUnit),
            (&self.line_of_business, EntityKind::LineOfBusiness),
            (&self.business_function, EntityKind::BusinessFunction),
            (&self.capability, EntityKind::Capabilities),
            (&self.business_process, EntityKind::BusinessProcess),
            (&self.activity, EntityKind::Activity),
        ];
        for (slot, kind) in levels {
            if let Some(r) = slot {
                out.push((kind, r));
            }
        }
        out
    }
}

// ============================================================================
// HIERARCHY BUILDER
// ============================================================================

pub struct HierarchyBuilder {
    resolver: Arc<NaturalKeyResolver>,
}

impl HierarchyBuilder {
    pub fn new(resolver: Arc<NaturalKeyResolver>) -> Self {
        HierarchyBuilder { resolver }
    }

    /// Resolve/create every hierarchy level the row specifies, in order.
    pub fn build(
        &self,
        company_id: &str,
        row: &PortfolioRow,
    ) -> Result<HierarchyChain, ResolveError> {
        let mut chain = HierarchyChain::default();

        chain.employee = self.resolve_employee(row)?;
        let employee_id = FieldValue::opt_text(
            chain
                .employee
                .as_ref()
                .map(|r| r.record.id.as_str()),
        );

        let levels = row.hierarchy_levels();
        let Some(deepest) = levels.iter().rposition(|level| level.is_some()) else {
            return Ok(chain);
        };

        // An absent level above a present one makes the row inconsistent;
        // fail before creating anything rather than fabricate placeholders.
        if let Some(gap) = levels[..deepest].iter().position(|level| level.is_none()) {
            let child = levels[gap..]
                .iter()
                .position(|level| level.is_some())
                .map(|offset| gap + offset)
                .unwrap_or(deepest);
            return Err(ResolveError::MissingParent {
                kind: LEVEL_KINDS[child].as_str(),
                parent: LEVEL_KINDS[gap].as_str(),
            });
        }

        let org_unit = self.resolver.resolve_or_create(
            EntityKind::OrganizationalUnit,
            &[
                ("name", FieldValue::opt_text(levels[0])),
                ("company_id", FieldValue::text(company_id)),
            ],
            &[("employee_id", employee_id.clone())],
        )?;
        let org_unit_id = org_unit.record.id.clone();
        chain.org_unit = Some(org_unit);
        if deepest < 1 {
            return Ok(chain);
        }

        let lob = self.resolver.resolve_or_create(
            EntityKind::LineOfBusiness,
            &[
                ("name", FieldValue::opt_text(levels[1])),
                ("org_unit_id", FieldValue::text(&org_unit_id)),
            ],
            &[("employee_id", employee_id.clone())],
        )?;
        let lob_id = lob.record.id.clone();
        chain.line_of_business = Some(lob);
        if deepest < 2 {
            return Ok(chain);
        }

        // Unparseable type values collapse to NULL and fail the schema check
        let function_type = row
            .function_type
            .as_deref()
            .and_then(FunctionType::parse);
        let function = self.resolver.resolve_or_create(
            EntityKind::BusinessFunction,
            &[
                ("name", FieldValue::opt_text(levels[2])),
                ("lob_id", FieldValue::text(&lob_id)),
            ],
            &[
                (
                    "function_type",
                    FieldValue::opt_text(function_type.map(|t| t.as_str())),
                ),
                ("employee_id", employee_id.clone()),
            ],
        )?;
        let function_id = function.record.id.clone();
        chain.business_function = Some(function);
        if deepest < 3 {
            return Ok(chain);
        }

        let capability = self.resolver.resolve_or_create(
            EntityKind::Capabilities,
            &[
                ("name", FieldValue::opt_text(levels[3])),
                ("function_id", FieldValue::text(&function_id)),
            ],
            &[("employee_id", employee_id.clone())],
        )?;
        let capability_id = capability.record.id.clone();
        chain.capability = Some(capability);
        if deepest < 4 {
            return Ok(chain);
        }

        let process = self.resolver.resolve_or_create(
            EntityKind::BusinessProcess,
            &[
                ("name", FieldValue::opt_text(levels[4])),
                ("capability_id", FieldValue::text(&capability_id)),
            ],
            &[
                ("start_date", FieldValue::opt_date(row.process_start)),
                (
                    "expected_end_date",
                    FieldValue::opt_date(row.process_expected_end),
                ),
                ("end_date", FieldValue::opt_date(row.process_end)),
                ("status", FieldValue::opt_text(row.process_status.as_deref())),
                ("employee_id", employee_id.clone()),
            ],
        )?;
        let process_id = process.record.id.clone();
        chain.business_process = Some(process);
        if deepest < 5 {
            return Ok(chain);
        }

        let activity = self.resolver.resolve_or_create(
            EntityKind::Activity,
            &[
                ("name", FieldValue::opt_text(levels[5])),
                ("process_id", FieldValue::text(&process_id)),
            ],
            &[
                (
                    "resource_required",
                    FieldValue::opt_text(row.resource_required.as_deref()),
                ),
                ("employee_id", employee_id),
            ],
        )?;
        chain.activity = Some(activity);

        Ok(chain)
    }

    fn resolve_employee(&self, row: &PortfolioRow) -> Result<Option<Resolution>, ResolveError> {
        match (&row.employee_no, &row.employee_name) {
            (Some(employee_no), _) => {
                let resolution = self.resolver.resolve_or_create(
                    EntityKind::Employee,
                    &[("employee_no", FieldValue::text(employee_no))],
                    &[("name", FieldValue::opt_text(row.employee_name.as_deref()))],
                )?;
                Ok(Some(resolution))
            }
            // A name without the globally keyed id cannot be resolved
            (None, Some(_)) => Err(ResolveError::MissingRequiredField {
                kind: EntityKind::Employee.as_str(),
                field: "employee_no",
            }),
            (None, None) => Ok(None),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;

    fn setup() -> (Arc<SqliteStore>, HierarchyBuilder, String) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let company = store
            .create(EntityKind::Company, &[("name", FieldValue::text("Acme"))])
            .unwrap();
        let resolver = Arc::new(NaturalKeyResolver::new(Arc::clone(&store)));
        (store, HierarchyBuilder::new(resolver), company.id)
    }

    fn full_row() -> PortfolioRow {
        PortfolioRow {
            org_unit: Some("Operations".to_string()),
            line_of_business: Some("Retail".to_string()),
            business_function: Some("Sales".to_string()),
            function_type: Some("Primary".to_string()),
            capability: Some("Order Handling".to_string()),
            business_process: Some("Order to Cash".to_string()),
            process_status: Some("Active".to_string()),
            activity: Some("Invoice Review".to_string()),
            resource_required: Some("Analyst".to_string()),
            employee_no: Some("E-100".to_string()),
            employee_name: Some("Dana Reyes".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_chain_resolves_every_level() {
        let (store, builder, company_id) = setup();
        let chain = builder.build(&company_id, &full_row()).unwrap();

        assert_eq!(chain.depth(), 6);
        assert!(chain.employee.is_some());
        assert!(chain.resolutions().iter().all(|(_, r)| r.created));
        assert_eq!(store.count(EntityKind::Activity).unwrap(), 1);
        assert_eq!(store.count(EntityKind::Employee).unwrap(), 1);
    }

    #[test]
    fn test_rebuild_reuses_every_level() {
        let (store, builder, company_id) = setup();
        builder.build(&company_id, &full_row()).unwrap();
        let second = builder.build(&company_id, &full_row()).unwrap();

        assert!(second.resolutions().iter().all(|(_, r)| !r.created));
        for kind in LEVEL_KINDS {
            assert_eq!(store.count(kind).unwrap(), 1, "{} duplicated", kind.as_str());
        }
    }

    #[test]
    fn test_partial_row_stops_at_last_specified_level() {
        let (store, builder, company_id) = setup();
        let row = PortfolioRow {
            org_unit: Some("Operations".to_string()),
            line_of_business: Some("Retail".to_string()),
            ..Default::default()
        };

        let chain = builder.build(&company_id, &row).unwrap();
        assert_eq!(chain.depth(), 2);
        assert!(chain.business_function.is_none());
        assert_eq!(store.count(EntityKind::BusinessFunction).unwrap(), 0);
    }

    #[test]
    fn test_gap_in_chain_is_missing_parent() {
        let (store, builder, company_id) = setup();
        let row = PortfolioRow {
            org_unit: Some("Operations".to_string()),
            line_of_business: Some("Retail".to_string()),
            // business_function intentionally absent
            capability: Some("Order Handling".to_string()),
            ..Default::default()
        };

        let err = builder.build(&company_id, &row).unwrap_err();
        match err {
            ResolveError::MissingParent { kind, parent } => {
                assert_eq!(kind, "Capabilities");
                assert_eq!(parent, "BusinessFunction");
            }
            other => panic!("expected MissingParent, got {:?}", other),
        }
        // Nothing at the capability level or below was created
        assert_eq!(store.count(EntityKind::Capabilities).unwrap(), 0);
        assert_eq!(store.count(EntityKind::OrganizationalUnit).unwrap(), 0);
    }

    #[test]
    fn test_same_lob_name_under_two_units_is_distinct() {
        let (store, builder, company_id) = setup();
        let mut first = PortfolioRow {
            org_unit: Some("Operations".to_string()),
            line_of_business: Some("Retail".to_string()),
            ..Default::default()
        };
        let chain_a = builder.build(&company_id, &first).unwrap();

        first.org_unit = Some("Logistics".to_string());
        let chain_b = builder.build(&company_id, &first).unwrap();

        assert_ne!(
            chain_a.lob_id().unwrap(),
            chain_b.lob_id().unwrap(),
            "same name under different units must be distinct"
        );
        assert_eq!(store.count(EntityKind::LineOfBusiness).unwrap(), 2);

        // Third row under the first unit reuses the first record
        first.org_unit = Some("Operations".to_string());
        let chain_c = builder.build(&company_id, &first).unwrap();
        assert_eq!(chain_a.lob_id().unwrap(), chain_c.lob_id().unwrap());
        assert_eq!(store.count(EntityKind::LineOfBusiness).unwrap(), 2);
    }

    #[test]
    fn test_activity_without_resource_kind_fails() {
        let (_, builder, company_id) = setup();
        let mut row = full_row();
        row.resource_required = None;

        let err = builder.build(&company_id, &row).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingRequiredField { field: "resource_required", .. }
        ));
    }

    #[test]
    fn test_employee_name_without_id_fails() {
        let (_, builder, company_id) = setup();
        let row = PortfolioRow {
            employee_name: Some("Dana Reyes".to_string()),
            ..Default::default()
        };

        let err = builder.build(&company_id, &row).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::MissingRequiredField { field: "employee_no", .. }
        ));
    }

    #[test]
    fn test_employee_attribution_lands_on_created_levels() {
        let (store, builder, company_id) = setup();
        let chain = builder.build(&company_id, &full_row()).unwrap();
        let employee_id = chain.employee.as_ref().unwrap().record.id.clone();

        let unit = store
            .get(
                EntityKind::OrganizationalUnit,
                &chain.org_unit.unwrap().record.id,
            )
            .unwrap()
            .unwrap();
        assert_eq!(unit.str_field("employee_id"), Some(employee_id.as_str()));
    }
}
