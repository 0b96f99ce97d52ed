// Natural-Key Resolver - get-or-create, exactly once per key
//
// The single correctness property the rest of the engine leans on: for a
// fixed (kind, parent, key fields) tuple, repeated resolution returns the
// same record, whether the calls are sequential or racing. A lost create
// race is absorbed here by re-reading the winner's record; callers never
// see it.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::db::{is_unique_violation, FieldValue, Record, SqliteStore};
use crate::entities::EntityKind;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ResolveError {
    /// A child-level entity was requested while its scoping parent is absent.
    #[error("{kind}: parent reference '{parent}' is missing")]
    MissingParent {
        kind: &'static str,
        parent: &'static str,
    },

    /// A field the entity kind's schema requires is absent or blank.
    #[error("{kind}: required field '{field}' is missing")]
    MissingRequiredField {
        kind: &'static str,
        field: &'static str,
    },

    /// Persistence collaborator failure; the only batch-fatal variant.
    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),
}

impl ResolveError {
    /// Row-level errors are recorded and skipped; store failures abort the
    /// batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolveError::Store(_))
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Outcome of a get-or-create: the record plus whether this call created it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub record: Record,
    pub created: bool,
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct NaturalKeyResolver {
    store: Arc<SqliteStore>,
}

impl NaturalKeyResolver {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        NaturalKeyResolver { store }
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Look up an existing record by natural key without creating one.
    pub fn resolve(
        &self,
        kind: EntityKind,
        key: &[(&str, FieldValue)],
    ) -> Result<Option<Record>, ResolveError> {
        self.validate_key(kind, key)?;
        Ok(self.store.find(kind, key)?)
    }

    /// Look up by natural key, creating the record when absent.
    ///
    /// `extra` carries the non-key columns persisted only at creation;
    /// an existing record keeps its original values.
    pub fn resolve_or_create(
        &self,
        kind: EntityKind,
        key: &[(&str, FieldValue)],
        extra: &[(&str, FieldValue)],
    ) -> Result<Resolution, ResolveError> {
        self.validate_key(kind, key)?;
        self.validate_required(kind, extra)?;

        if let Some(record) = self.store.find(kind, key)? {
            return Ok(Resolution {
                record,
                created: false,
            });
        }

        let mut fields: Vec<(&str, FieldValue)> = Vec::with_capacity(key.len() + extra.len());
        fields.extend_from_slice(key);
        fields.extend_from_slice(extra);

        match self.store.create(kind, &fields) {
            Ok(record) => Ok(Resolution {
                record,
                created: true,
            }),
            Err(err) if is_unique_violation(&err) => {
                // Lost a create race: another caller persisted this key
                // between our find and create. Use the winner's record.
                debug!(kind = kind.as_str(), "create race lost, re-resolving");
                match self.store.find(kind, key)? {
                    Some(record) => Ok(Resolution {
                        record,
                        created: false,
                    }),
                    None => Err(ResolveError::Store(err)),
                }
            }
            Err(err) => Err(ResolveError::Store(err)),
        }
    }

    /// Every declared key column must be supplied and non-empty; a missing
    /// parent column is `MissingParent`, anything else `MissingRequiredField`.
    fn validate_key(
        &self,
        kind: EntityKind,
        key: &[(&str, FieldValue)],
    ) -> Result<(), ResolveError> {
        for &column in kind.key_columns() {
            let supplied = key
                .iter()
                .find(|(name, _)| *name == column)
                .map(|(_, value)| value);
            let missing = match supplied {
                Some(value) => value.is_empty(),
                None => true,
            };
            if missing {
                if kind.parent_column() == Some(column) {
                    return Err(ResolveError::MissingParent {
                        kind: kind.as_str(),
                        parent: column,
                    });
                }
                return Err(ResolveError::MissingRequiredField {
                    kind: kind.as_str(),
                    field: column,
                });
            }
        }
        Ok(())
    }

    fn validate_required(
        &self,
        kind: EntityKind,
        extra: &[(&str, FieldValue)],
    ) -> Result<(), ResolveError> {
        for &column in kind.required_columns() {
            let supplied = extra
                .iter()
                .find(|(name, _)| *name == column)
                .map(|(_, value)| value);
            let missing = match supplied {
                Some(value) => value.is_empty(),
                None => true,
            };
            if missing {
                return Err(ResolveError::MissingRequiredField {
                    kind: kind.as_str(),
                    field: column,
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
