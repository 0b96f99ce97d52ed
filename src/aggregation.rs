// Aggregation Service - read-only roll-up views over the hierarchy
//
// Every view is a pure function of the persisted state and shares the
// ingestion side's normalization: stored amounts are already in base units.
// A missing id yields an empty result, never an error; reporting is
// advisory, not a hard dependency.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Datelike;
use rusqlite::Result as SqlResult;
use serde::Serialize;

use crate::db::{FieldValue, Record, SqliteStore};
use crate::entities::EntityKind;

// ============================================================================
// VIEW SHAPES
// ============================================================================

/// One node of the organizational tree, annotated with its immediate child
/// count.
#[derive(Debug, Clone, Serialize)]
pub struct OrgChartNode {
    pub id: String,
    pub label: String,
    pub parent_id: Option<String>,
    pub child_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TechnologyUsage {
    pub stack_id: String,
    pub name: String,
    pub version: String,
    pub stack_type: String,
    pub application_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpenditureByType {
    pub expenditure_type: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpendByType {
    pub spend_type: String,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationFinancials {
    pub application_id: String,
    pub expenditures: Vec<ExpenditureByType>,
    pub spends: Vec<SpendByType>,
    pub expenditure_total: f64,
    pub spend_total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearlySpend {
    pub year: i32,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LobSnapshot {
    pub line_of_business_id: String,
    pub functions: Vec<NamedNode>,
    pub capabilities: Vec<NamedNode>,
    pub processes: Vec<NamedNode>,
    pub activities: Vec<NamedNode>,
}

// ============================================================================
// AGGREGATION SERVICE
// ============================================================================

pub struct AggregationService {
    store: Arc<SqliteStore>,
}

impl AggregationService {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        AggregationService { store }
    }

    /// Nested node list for a company's tree, Company down to Capabilities,
    /// via a single breadth-first walk.
    pub fn organizational_chart(&self, company_id: &str) -> SqlResult<Vec<OrgChartNode>> {
        let Some(company) = self.store.get(EntityKind::Company, company_id)? else {
            return Ok(Vec::new());
        };

        // The chart covers the upper four levels below Company
        fn chart_child(kind: EntityKind) -> Option<EntityKind> {
            match kind {
                EntityKind::Company => Some(EntityKind::OrganizationalUnit),
                EntityKind::OrganizationalUnit => Some(EntityKind::LineOfBusiness),
                EntityKind::LineOfBusiness => Some(EntityKind::BusinessFunction),
                EntityKind::BusinessFunction => Some(EntityKind::Capabilities),
                _ => None,
            }
        }

        let mut nodes = Vec::new();
        let mut queue: VecDeque<(EntityKind, Record, Option<String>)> = VecDeque::new();
        queue.push_back((EntityKind::Company, company, None));

        while let Some((kind, record, parent_id)) = queue.pop_front() {
            let children = match chart_child(kind) {
                Some(child_kind) => self.store.list_children(child_kind, &record.id)?,
                None => Vec::new(),
            };

            nodes.push(OrgChartNode {
                id: record.id.clone(),
                label: record.str_field("name").unwrap_or_default().to_string(),
                parent_id,
                child_count: children.len(),
            });

            if let Some(child_kind) = chart_child(kind) {
                for child in children {
                    queue.push_back((child_kind, child, Some(record.id.clone())));
                }
            }
        }

        Ok(nodes)
    }

    /// Distinct applications per technology stack across one company's
    /// portfolio, most-used stacks first.
    pub fn technology_usage(&self, company_id: &str) -> SqlResult<Vec<TechnologyUsage>> {
        let mut apps_by_stack: HashMap<String, HashSet<String>> = HashMap::new();

        for app_id in self.company_application_ids(company_id)? {
            for technology in self.store.list_children(EntityKind::Technology, &app_id)? {
                if let Some(stack_id) = technology.str_field("stack_id") {
                    apps_by_stack
                        .entry(stack_id.to_string())
                        .or_default()
                        .insert(app_id.clone());
                }
            }
        }

        let mut usage = Vec::new();
        for (stack_id, apps) in apps_by_stack {
            let Some(stack) = self.store.get(EntityKind::TechnologyStack, &stack_id)? else {
                continue;
            };
            usage.push(TechnologyUsage {
                stack_id,
                name: stack.str_field("name").unwrap_or_default().to_string(),
                version: stack.str_field("version").unwrap_or_default().to_string(),
                stack_type: stack.str_field("stack_type").unwrap_or_default().to_string(),
                application_count: apps.len(),
            });
        }
        usage.sort_by(|a, b| {
            b.application_count
                .cmp(&a.application_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(usage)
    }

    /// Expenditure and spend totals for one application, grouped by type.
    pub fn application_financials(&self, application_id: &str) -> SqlResult<ApplicationFinancials> {
        let mut expenditure_groups: BTreeMap<String, f64> = BTreeMap::new();
        for record in self
            .store
            .list_children(EntityKind::Expenditure, application_id)?
        {
            let group = record
                .str_field("expenditure_type")
                .unwrap_or_default()
                .to_string();
            *expenditure_groups.entry(group).or_insert(0.0) +=
                record.real_field("amount").unwrap_or(0.0);
        }

        let mut spend_groups: BTreeMap<String, f64> = BTreeMap::new();
        for record in self.store.list_matching(
            EntityKind::Spend,
            &[("application_id", FieldValue::text(application_id))],
        )? {
            let group = record
                .str_field("spend_type")
                .unwrap_or_default()
                .to_string();
            *spend_groups.entry(group).or_insert(0.0) +=
                record.real_field("amount").unwrap_or(0.0);
        }

        let expenditures: Vec<ExpenditureByType> = expenditure_groups
            .into_iter()
            .map(|(expenditure_type, total)| ExpenditureByType {
                expenditure_type,
                total,
            })
            .collect();
        let spends: Vec<SpendByType> = spend_groups
            .into_iter()
            .map(|(spend_type, total)| SpendByType { spend_type, total })
            .collect();

        Ok(ApplicationFinancials {
            application_id: application_id.to_string(),
            expenditure_total: expenditures.iter().map(|e| e.total).sum(),
            spend_total: spends.iter().map(|s| s.total).sum(),
            expenditures,
            spends,
        })
    }

    /// Spend totals per calendar year, ascending. Years without any spend
    /// are absent rather than zero-filled; the series is deliberately sparse.
    pub fn yearly_spend(&self) -> SqlResult<Vec<YearlySpend>> {
        let mut by_year: BTreeMap<i32, f64> = BTreeMap::new();
        for record in self.store.list_all(EntityKind::Spend)? {
            let Some(date) = record.date_field("spend_date") else {
                continue;
            };
            *by_year.entry(date.year()).or_insert(0.0) +=
                record.real_field("amount").unwrap_or(0.0);
        }
        Ok(by_year
            .into_iter()
            .map(|(year, total)| YearlySpend { year, total })
            .collect())
    }

    /// Flat lists of one line of business's own functions, capabilities,
    /// processes, and activities, for search/detail views.
    pub fn lob_snapshot(&self, lob_id: &str) -> SqlResult<LobSnapshot> {
        let mut snapshot = LobSnapshot {
            line_of_business_id: lob_id.to_string(),
            functions: Vec::new(),
            capabilities: Vec::new(),
            processes: Vec::new(),
            activities: Vec::new(),
        };
        if self.store.get(EntityKind::LineOfBusiness, lob_id)?.is_none() {
            return Ok(snapshot);
        }

        for function in self
            .store
            .list_children(EntityKind::BusinessFunction, lob_id)?
        {
            for capability in self
                .store
                .list_children(EntityKind::Capabilities, &function.id)?
            {
                for process in self
                    .store
                    .list_children(EntityKind::BusinessProcess, &capability.id)?
                {
                    for activity in self
                        .store
                        .list_children(EntityKind::Activity, &process.id)?
                    {
                        snapshot.activities.push(named(&activity));
                    }
                    snapshot.processes.push(named(&process));
                }
                snapshot.capabilities.push(named(&capability));
            }
            snapshot.functions.push(named(&function));
        }

        Ok(snapshot)
    }

    fn company_application_ids(&self, company_id: &str) -> SqlResult<Vec<String>> {
        let mut app_ids = Vec::new();
        for unit in self
            .store
            .list_children(EntityKind::OrganizationalUnit, company_id)?
        {
            for lob in self
                .store
                .list_children(EntityKind::LineOfBusiness, &unit.id)?
            {
                for app in self.store.list_children(EntityKind::Application, &lob.id)? {
                    app_ids.push(app.id);
                }
            }
        }
        Ok(app_ids)
    }
}

fn named(record: &Record) -> NamedNode {
    NamedNode {
        id: record.id.clone(),
        name: record.str_field("name").unwrap_or_default().to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
