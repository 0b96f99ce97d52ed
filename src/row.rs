// Portfolio Row - one typed line from an uploaded workbook
//
// Every field is optional; a row may carry only upper hierarchy levels, only
// financials, or any mix. Cell parsing belongs to the workbook adapter; by
// the time a row reaches the resolvers its values are typed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioRow {
    // Org hierarchy levels, parent-to-child
    pub org_unit: Option<String>,
    pub line_of_business: Option<String>,
    pub business_function: Option<String>,
    pub function_type: Option<String>,
    pub capability: Option<String>,
    pub business_process: Option<String>,
    pub process_start: Option<NaiveDate>,
    pub process_expected_end: Option<NaiveDate>,
    pub process_end: Option<NaiveDate>,
    pub process_status: Option<String>,
    pub activity: Option<String>,
    pub resource_required: Option<String>,

    // Employee attribution (keyed globally, not parented to the hierarchy)
    pub employee_no: Option<String>,
    pub employee_name: Option<String>,

    // Application portfolio
    pub application: Option<String>,
    pub application_type: Option<String>,
    pub application_status: Option<String>,
    pub implementation_date: Option<NaiveDate>,
    pub technology_stack: Option<String>,
    pub stack_version: Option<String>,
    pub stack_type: Option<String>,

    // Financials
    pub expenditure_type: Option<String>,
    pub expenditure_description: Option<String>,
    pub expenditure_start: Option<NaiveDate>,
    pub expenditure_end: Option<NaiveDate>,
    pub expenditure_amount: Option<f64>,
    pub spend_no: Option<String>,
    pub spend_type: Option<String>,
    pub spend_amount: Option<f64>,
    pub spend_successor: Option<String>,
    pub spend_date: Option<NaiveDate>,
    pub budget_year: Option<i32>,
    pub budget_amount: Option<f64>,
    pub budget_successor: Option<String>,
}

impl PortfolioRow {
    /// Trim every text field, collapsing whitespace-only cells to `None` so
    /// the resolvers see a blank cell and an absent cell identically.
    pub fn normalize(&mut self) {
        for field in [
            &mut self.org_unit,
            &mut self.line_of_business,
            &mut self.business_function,
            &mut self.function_type,
            &mut self.capability,
            &mut self.business_process,
            &mut self.process_status,
            &mut self.activity,
            &mut self.resource_required,
            &mut self.employee_no,
            &mut self.employee_name,
            &mut self.application,
            &mut self.application_type,
            &mut self.application_status,
            &mut self.technology_stack,
            &mut self.stack_version,
            &mut self.stack_type,
            &mut self.expenditure_type,
            &mut self.expenditure_description,
            &mut self.spend_no,
            &mut self.spend_type,
            &mut self.spend_successor,
            &mut self.budget_successor,
        ] {
            if let Some(value) = field.take() {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    *field = Some(trimmed.to_string());
                }
            }
        }
    }

    /// The hierarchy level names in parent-to-child order.
    pub fn hierarchy_levels(&self) -> [Option<&str>; 6] {
        [
            self.org_unit.as_deref(),
            self.line_of_business.as_deref(),
            self.business_function.as_deref(),
            self.capability.as_deref(),
            self.business_process.as_deref(),
            self.activity.as_deref(),
        ]
    }

    pub fn has_expenditure_fields(&self) -> bool {
        self.expenditure_type.is_some()
            || self.expenditure_description.is_some()
            || self.expenditure_start.is_some()
            || self.expenditure_end.is_some()
            || self.expenditure_amount.is_some()
    }

    pub fn has_spend_fields(&self) -> bool {
        self.spend_no.is_some() || self.spend_type.is_some() || self.spend_amount.is_some()
    }

    pub fn has_budget_fields(&self) -> bool {
        self.budget_year.is_some() || self.budget_amount.is_some()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_blanks_out_whitespace_cells() {
        let mut row = PortfolioRow {
            org_unit: Some("  Operations  ".to_string()),
            line_of_business: Some("   ".to_string()),
            ..Default::default()
        };
        row.normalize();
        assert_eq!(row.org_unit.as_deref(), Some("Operations"));
        assert!(row.line_of_business.is_none());
    }

    #[test]
    fn test_hierarchy_levels_order() {
        let row = PortfolioRow {
            org_unit: Some("Ops".to_string()),
            activity: Some("Review".to_string()),
            ..Default::default()
        };
        let levels = row.hierarchy_levels();
        assert_eq!(levels[0], Some("Ops"));
        assert_eq!(levels[1], None);
        assert_eq!(levels[5], Some("Review"));
    }
}
