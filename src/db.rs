// SQLite Store - the persistence collaborator behind every resolver
//
// One table per entity kind, each with a UNIQUE index over its natural-key
// columns. The store exposes generic find/create/update/list operations over
// (column, value) pairs; which columns form a key is the entity catalog's
// business, not this module's.

use chrono::{NaiveDate, Utc};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Result as SqlResult, Row, ToSql};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::entities::EntityKind;

// ============================================================================
// FIELD VALUE
// ============================================================================

/// A dynamically typed column value, the currency of the generic store API.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

impl FieldValue {
    pub fn text(value: &str) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    /// Missing optional strings become NULL columns.
    pub fn opt_text(value: Option<&str>) -> FieldValue {
        match value {
            Some(v) => FieldValue::Text(v.to_string()),
            None => FieldValue::Null,
        }
    }

    /// Dates are stored as ISO-8601 text.
    pub fn date(value: NaiveDate) -> FieldValue {
        FieldValue::Text(value.to_string())
    }

    pub fn opt_date(value: Option<NaiveDate>) -> FieldValue {
        match value {
            Some(v) => FieldValue::date(v),
            None => FieldValue::Null,
        }
    }

    /// True when the value cannot serve as a natural-key component.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Null => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> SqlResult<ToSqlOutput<'_>> {
        match self {
            FieldValue::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
            FieldValue::Integer(i) => Ok(ToSqlOutput::from(*i)),
            FieldValue::Real(f) => Ok(ToSqlOutput::from(*f)),
            FieldValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
        }
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// A persisted row: surrogate id plus its column values.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    fields: HashMap<String, FieldValue>,
}

impl Record {
    fn from_row(columns: &[String], row: &Row<'_>) -> SqlResult<Record> {
        let mut id = String::new();
        let mut fields = HashMap::new();

        for (idx, column) in columns.iter().enumerate() {
            let value = match row.get_ref(idx)? {
                ValueRef::Null => FieldValue::Null,
                ValueRef::Integer(i) => FieldValue::Integer(i),
                ValueRef::Real(f) => FieldValue::Real(f),
                ValueRef::Text(bytes) => {
                    FieldValue::Text(String::from_utf8_lossy(bytes).into_owned())
                }
                ValueRef::Blob(_) => FieldValue::Null,
            };

            if column == "id" {
                if let FieldValue::Text(ref s) = value {
                    id = s.clone();
                }
            }
            fields.insert(column.clone(), value);
        }

        Ok(Record { id, fields })
    }

    pub fn str_field(&self, column: &str) -> Option<&str> {
        match self.fields.get(column) {
            Some(FieldValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn real_field(&self, column: &str) -> Option<f64> {
        match self.fields.get(column) {
            Some(FieldValue::Real(f)) => Some(*f),
            Some(FieldValue::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn int_field(&self, column: &str) -> Option<i64> {
        match self.fields.get(column) {
            Some(FieldValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn date_field(&self, column: &str) -> Option<NaiveDate> {
        self.str_field(column)
            .and_then(|s| s.parse::<NaiveDate>().ok())
    }
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a file-backed store with WAL mode for crash recovery.
    pub fn open(path: &Path) -> SqlResult<SqliteStore> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests and throwaway runs.
    pub fn open_in_memory() -> SqlResult<SqliteStore> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a new record, assigning its surrogate id.
    pub fn create(&self, kind: EntityKind, fields: &[(&str, FieldValue)]) -> SqlResult<Record> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        let mut columns: Vec<&str> = vec!["id", "created_at"];
        let mut values: Vec<FieldValue> =
            vec![FieldValue::text(&id), FieldValue::Text(created_at)];
        for (column, value) in fields {
            columns.push(*column);
            values.push(value.clone());
        }

        let placeholders: Vec<String> =
            (1..=columns.len()).map(|n| format!("?{}", n)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            kind.table(),
            columns.join(", "),
            placeholders.join(", ")
        );

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(&sql, params_from_iter(values.iter()))?;
        }

        let mut field_map = HashMap::new();
        for (column, value) in columns.iter().zip(values.iter()) {
            field_map.insert(column.to_string(), value.clone());
        }
        Ok(Record {
            id,
            fields: field_map,
        })
    }

    /// Find a single record matching every given (column, value) pair.
    pub fn find(&self, kind: EntityKind, key: &[(&str, FieldValue)]) -> SqlResult<Option<Record>> {
        let clauses: Vec<String> = key
            .iter()
            .enumerate()
            .map(|(idx, (column, _))| format!("{} = ?{}", column, idx + 1))
            .collect();
        let sql = format!(
            "SELECT * FROM {} WHERE {} LIMIT 1",
            kind.table(),
            clauses.join(" AND ")
        );
        let values: Vec<&FieldValue> = key.iter().map(|(_, v)| v).collect();

        self.query(&sql, &values).map(|mut records| records.pop())
    }

    /// Fetch a record by surrogate id.
    pub fn get(&self, kind: EntityKind, id: &str) -> SqlResult<Option<Record>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?1 LIMIT 1", kind.table());
        let value = FieldValue::text(id);
        self.query(&sql, &[&value]).map(|mut records| records.pop())
    }

    /// Overwrite the given columns on an existing record.
    pub fn update_fields(
        &self,
        kind: EntityKind,
        id: &str,
        fields: &[(&str, FieldValue)],
    ) -> SqlResult<()> {
        let assignments: Vec<String> = fields
            .iter()
            .enumerate()
            .map(|(idx, (column, _))| format!("{} = ?{}", column, idx + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            kind.table(),
            assignments.join(", "),
            fields.len() + 1
        );

        let mut values: Vec<FieldValue> = fields.iter().map(|(_, v)| v.clone()).collect();
        values.push(FieldValue::text(id));

        let conn = self.conn.lock().unwrap();
        conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    /// All records of `kind` whose parent column references `parent_id`.
    ///
    /// Returns an empty list for kinds without a parent column.
    pub fn list_children(&self, kind: EntityKind, parent_id: &str) -> SqlResult<Vec<Record>> {
        let Some(parent_column) = kind.parent_column() else {
            return Ok(Vec::new());
        };
        self.list_matching(kind, &[(parent_column, FieldValue::text(parent_id))])
    }

    /// All records of `kind` matching every given (column, value) pair.
    pub fn list_matching(
        &self,
        kind: EntityKind,
        filter: &[(&str, FieldValue)],
    ) -> SqlResult<Vec<Record>> {
        let clauses: Vec<String> = filter
            .iter()
            .enumerate()
            .map(|(idx, (column, _))| format!("{} = ?{}", column, idx + 1))
            .collect();
        let sql = format!(
            "SELECT * FROM {} WHERE {} ORDER BY created_at, id",
            kind.table(),
            clauses.join(" AND ")
        );
        let values: Vec<&FieldValue> = filter.iter().map(|(_, v)| v).collect();
        self.query(&sql, &values)
    }

    pub fn list_all(&self, kind: EntityKind) -> SqlResult<Vec<Record>> {
        let sql = format!("SELECT * FROM {} ORDER BY created_at, id", kind.table());
        self.query(&sql, &[])
    }

    pub fn count(&self, kind: EntityKind) -> SqlResult<i64> {
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
        conn.query_row(&sql, [], |row| row.get(0))
    }

    fn query(&self, sql: &str, values: &[&FieldValue]) -> SqlResult<Vec<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(Record::from_row(&columns, row)?);
        }
        Ok(records)
    }
}

/// True when an error is a UNIQUE-constraint violation, the signature of two
/// creators racing on the same natural key.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn setup_database(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS companies (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT
        );

        CREATE TABLE IF NOT EXISTS organizational_units (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            company_id TEXT NOT NULL REFERENCES companies(id),
            employee_id TEXT,
            created_at TEXT,
            UNIQUE(name, company_id)
        );

        CREATE TABLE IF NOT EXISTS lines_of_business (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            org_unit_id TEXT NOT NULL REFERENCES organizational_units(id),
            employee_id TEXT,
            created_at TEXT,
            UNIQUE(name, org_unit_id)
        );

        CREATE TABLE IF NOT EXISTS business_functions (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            function_type TEXT NOT NULL,
            lob_id TEXT NOT NULL REFERENCES lines_of_business(id),
            employee_id TEXT,
            created_at TEXT,
            UNIQUE(name, lob_id)
        );

        CREATE TABLE IF NOT EXISTS capabilities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            function_id TEXT NOT NULL REFERENCES business_functions(id),
            employee_id TEXT,
            created_at TEXT,
            UNIQUE(name, function_id)
        );

        CREATE TABLE IF NOT EXISTS business_processes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_date TEXT,
            expected_end_date TEXT,
            end_date TEXT,
            status TEXT,
            capability_id TEXT NOT NULL REFERENCES capabilities(id),
            employee_id TEXT,
            created_at TEXT,
            UNIQUE(name, capability_id)
        );

        CREATE TABLE IF NOT EXISTS activities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            resource_required TEXT NOT NULL,
            process_id TEXT NOT NULL REFERENCES business_processes(id),
            employee_id TEXT,
            created_at TEXT,
            UNIQUE(name, process_id)
        );

        CREATE TABLE IF NOT EXISTS employees (
            id TEXT PRIMARY KEY,
            employee_no TEXT NOT NULL,
            name TEXT,
            created_at TEXT,
            UNIQUE(employee_no)
        );

        CREATE TABLE IF NOT EXISTS applications (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            app_type TEXT,
            status TEXT,
            implementation_date TEXT,
            lob_id TEXT NOT NULL REFERENCES lines_of_business(id),
            created_at TEXT,
            UNIQUE(name, lob_id)
        );

        CREATE TABLE IF NOT EXISTS technology_stacks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            stack_type TEXT NOT NULL,
            created_at TEXT,
            UNIQUE(name, version, stack_type)
        );

        CREATE TABLE IF NOT EXISTS technologies (
            id TEXT PRIMARY KEY,
            application_id TEXT NOT NULL REFERENCES applications(id),
            stack_id TEXT NOT NULL REFERENCES technology_stacks(id),
            created_at TEXT,
            UNIQUE(application_id, stack_id)
        );

        CREATE TABLE IF NOT EXISTS expenditures (
            id TEXT PRIMARY KEY,
            application_id TEXT NOT NULL REFERENCES applications(id),
            expenditure_type TEXT NOT NULL,
            description TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            created_at TEXT,
            UNIQUE(application_id, expenditure_type, description, start_date, end_date)
        );

        CREATE TABLE IF NOT EXISTS spends (
            id TEXT PRIMARY KEY,
            spend_no TEXT NOT NULL,
            spend_type TEXT NOT NULL,
            amount REAL NOT NULL,
            spend_date TEXT,
            application_id TEXT REFERENCES applications(id),
            created_at TEXT,
            UNIQUE(spend_no, spend_type)
        );

        CREATE TABLE IF NOT EXISTS budgets (
            id TEXT PRIMARY KEY,
            application_id TEXT NOT NULL REFERENCES applications(id),
            year INTEGER NOT NULL,
            successor TEXT NOT NULL,
            amount REAL NOT NULL,
            created_at TEXT,
            UNIQUE(application_id, year, successor)
        );

        CREATE INDEX IF NOT EXISTS idx_org_units_company ON organizational_units(company_id);
        CREATE INDEX IF NOT EXISTS idx_lobs_org_unit ON lines_of_business(org_unit_id);
        CREATE INDEX IF NOT EXISTS idx_functions_lob ON business_functions(lob_id);
        CREATE INDEX IF NOT EXISTS idx_capabilities_function ON capabilities(function_id);
        CREATE INDEX IF NOT EXISTS idx_processes_capability ON business_processes(capability_id);
        CREATE INDEX IF NOT EXISTS idx_activities_process ON activities(process_id);
        CREATE INDEX IF NOT EXISTS idx_applications_lob ON applications(lob_id);
        CREATE INDEX IF NOT EXISTS idx_technologies_application ON technologies(application_id);
        CREATE INDEX IF NOT EXISTS idx_expenditures_application ON expenditures(application_id);
        CREATE INDEX IF NOT EXISTS idx_spends_application ON spends(application_id);
        CREATE INDEX IF NOT EXISTS idx_budgets_application ON budgets(application_id);",
    )?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
