use std::fmt;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the aggregation layer.
///
/// Dangling foreign keys are intentionally *not* represented here: a
/// reference that resolves to nothing (or to a foreign tenant) degrades to
/// the `"N/A"` display value in the join resolver instead of failing the
/// batch. Everything below is either recoverable by retry or a caller
/// mistake that must be surfaced.
#[derive(Debug)]
pub enum Error {
    /// A tenant-scoped query was built without a tenant id.
    MissingTenant,
    /// A page was requested whose predecessor cursor was never recorded.
    /// Recovery: restart pagination at page 1.
    PaginationSequence { parent: String, page: u32 },
    /// An export was requested for an empty row selection.
    EmptySelection,
    /// The record store failed a read, write, or subscription request.
    /// Safe to retry; previously derived view state stays valid.
    Store(sqlx::Error),
    /// Schema migration failed while opening a workspace.
    Migration(sqlx::migrate::MigrateError),
    /// A stored document could not be encoded or decoded.
    Serialization(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingTenant => write!(f, "tenant id is required but was empty"),
            Error::PaginationSequence { parent, page } => write!(
                f,
                "page {page} of '{parent}' requested before page {} was fetched; restart from page 1",
                page.saturating_sub(1)
            ),
            Error::EmptySelection => write!(f, "export requires at least one selected row"),
            Error::Store(e) => write!(f, "store request failed: {e}"),
            Error::Migration(e) => write!(f, "workspace migration failed: {e}"),
            Error::Serialization(e) => write!(f, "document serialization failed: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(e) => Some(e),
            Error::Migration(e) => Some(e),
            Error::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(e)
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Error::Migration(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e)
    }
}
