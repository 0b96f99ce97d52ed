// Portfolio Engine - Core Library
// Hierarchy reconciliation and portfolio aggregation over an uploaded
// workbook: natural-key resolution, idempotent ingestion, roll-up reporting.

pub mod aggregation;
pub mod application;
pub mod currency;
pub mod db;
pub mod entities;
pub mod finance;
pub mod hierarchy;
pub mod ingestion;
pub mod resolver;
pub mod row;
pub mod workbook;

// Re-export commonly used types
pub use aggregation::{
    AggregationService, ApplicationFinancials, LobSnapshot, OrgChartNode, TechnologyUsage,
    YearlySpend,
};
pub use application::ApplicationResolver;
pub use currency::{normalize_amount, CurrencySuccessor};
pub use db::{FieldValue, Record, SqliteStore};
pub use entities::{EntityKind, FunctionType};
pub use finance::FinanceResolver;
pub use hierarchy::{HierarchyBuilder, HierarchyChain};
pub use ingestion::{CancelToken, IngestionOrchestrator, IngestionSummary, RowFailure};
pub use resolver::{NaturalKeyResolver, Resolution, ResolveError};
pub use row::PortfolioRow;
pub use workbook::{load_workbook, SourceFileStat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
