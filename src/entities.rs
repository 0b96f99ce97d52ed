// Entity Catalog - declarative natural-key schema per entity kind
//
// Every persisted kind is described here exactly once: its table, the columns
// forming its natural key, the parent column that scopes the key, and the
// non-key columns its schema requires at creation. The resolvers are generic
// over this catalog instead of carrying one bespoke get-or-create per kind.

use serde::{Deserialize, Serialize};

// ============================================================================
// ENTITY KIND
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EntityKind {
    /// Root of a tenant's hierarchy (surrogate key only)
    Company,

    /// Org hierarchy, parent-to-child order
    OrganizationalUnit,
    LineOfBusiness,
    BusinessFunction,
    Capabilities,
    BusinessProcess,
    Activity,

    /// Referenced by hierarchy levels for audit attribution, keyed globally
    Employee,

    /// Application portfolio
    Application,
    TechnologyStack,
    Technology,

    /// Financial records
    Expenditure,
    Spend,
    Budget,
}

impl EntityKind {
    pub const ALL: [EntityKind; 14] = [
        EntityKind::Company,
        EntityKind::OrganizationalUnit,
        EntityKind::LineOfBusiness,
        EntityKind::BusinessFunction,
        EntityKind::Capabilities,
        EntityKind::BusinessProcess,
        EntityKind::Activity,
        EntityKind::Employee,
        EntityKind::Application,
        EntityKind::TechnologyStack,
        EntityKind::Technology,
        EntityKind::Expenditure,
        EntityKind::Spend,
        EntityKind::Budget,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Company => "Company",
            EntityKind::OrganizationalUnit => "OrganizationalUnit",
            EntityKind::LineOfBusiness => "LineOfBusiness",
            EntityKind::BusinessFunction => "BusinessFunction",
            EntityKind::Capabilities => "Capabilities",
            EntityKind::BusinessProcess => "BusinessProcess",
            EntityKind::Activity => "Activity",
            EntityKind::Employee => "Employee",
            EntityKind::Application => "Application",
            EntityKind::TechnologyStack => "TechnologyStack",
            EntityKind::Technology => "Technology",
            EntityKind::Expenditure => "Expenditure",
            EntityKind::Spend => "Spend",
            EntityKind::Budget => "Budget",
        }
    }

    /// Table backing this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Company => "companies",
            EntityKind::OrganizationalUnit => "organizational_units",
            EntityKind::LineOfBusiness => "lines_of_business",
            EntityKind::BusinessFunction => "business_functions",
            EntityKind::Capabilities => "capabilities",
            EntityKind::BusinessProcess => "business_processes",
            EntityKind::Activity => "activities",
            EntityKind::Employee => "employees",
            EntityKind::Application => "applications",
            EntityKind::TechnologyStack => "technology_stacks",
            EntityKind::Technology => "technologies",
            EntityKind::Expenditure => "expenditures",
            EntityKind::Spend => "spends",
            EntityKind::Budget => "budgets",
        }
    }

    /// Columns that form the natural key, parent column included when scoped.
    ///
    /// Company has no natural key: it is surrogate-keyed only and is never
    /// resolved through the natural-key path.
    pub fn key_columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Company => &[],
            EntityKind::OrganizationalUnit => &["name", "company_id"],
            EntityKind::LineOfBusiness => &["name", "org_unit_id"],
            EntityKind::BusinessFunction => &["name", "lob_id"],
            EntityKind::Capabilities => &["name", "function_id"],
            EntityKind::BusinessProcess => &["name", "capability_id"],
            EntityKind::Activity => &["name", "process_id"],
            EntityKind::Employee => &["employee_no"],
            EntityKind::Application => &["name", "lob_id"],
            EntityKind::TechnologyStack => &["name", "version", "stack_type"],
            EntityKind::Technology => &["application_id", "stack_id"],
            EntityKind::Expenditure => &[
                "application_id",
                "expenditure_type",
                "description",
                "start_date",
                "end_date",
            ],
            EntityKind::Spend => &["spend_no", "spend_type"],
            EntityKind::Budget => &["application_id", "year", "successor"],
        }
    }

    /// Column referencing the record that scopes this kind's key, if any.
    pub fn parent_column(&self) -> Option<&'static str> {
        match self {
            EntityKind::OrganizationalUnit => Some("company_id"),
            EntityKind::LineOfBusiness => Some("org_unit_id"),
            EntityKind::BusinessFunction => Some("lob_id"),
            EntityKind::Capabilities => Some("function_id"),
            EntityKind::BusinessProcess => Some("capability_id"),
            EntityKind::Activity => Some("process_id"),
            EntityKind::Application => Some("lob_id"),
            EntityKind::Technology => Some("application_id"),
            EntityKind::Expenditure => Some("application_id"),
            EntityKind::Budget => Some("application_id"),
            _ => None,
        }
    }

    /// Non-key columns this kind's schema requires at creation.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::BusinessFunction => &["function_type"],
            EntityKind::Activity => &["resource_required"],
            EntityKind::Spend => &["amount"],
            EntityKind::Budget => &["amount"],
            _ => &[],
        }
    }

    /// Next level down the org hierarchy chain, if any.
    ///
    /// Covers only the parent-chained org sequence; LineOfBusiness also
    /// parents Application, which is not part of this chain.
    pub fn child_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Company => Some(EntityKind::OrganizationalUnit),
            EntityKind::OrganizationalUnit => Some(EntityKind::LineOfBusiness),
            EntityKind::LineOfBusiness => Some(EntityKind::BusinessFunction),
            EntityKind::BusinessFunction => Some(EntityKind::Capabilities),
            EntityKind::Capabilities => Some(EntityKind::BusinessProcess),
            EntityKind::BusinessProcess => Some(EntityKind::Activity),
            _ => None,
        }
    }
}

// ============================================================================
// FUNCTION TYPE
// ============================================================================

/// Business function classification (Primary value chain vs Support).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionType {
    Primary,
    Support,
}

impl FunctionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionType::Primary => "Primary",
            FunctionType::Support => "Support",
        }
    }

    pub fn parse(value: &str) -> Option<FunctionType> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Some(FunctionType::Primary),
            "support" => Some(FunctionType::Support),
            _ => None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
