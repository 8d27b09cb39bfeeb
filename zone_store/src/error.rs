//! Error type for the data-access layer.

/// Errors raised while talking to the market-data database.
///
/// "Not found" outcomes (unknown ticker, unknown timeframe label, no rows) are
/// *not* errors; they surface as `None` or an empty `Vec`.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Could not open a connection.
    #[error("database connection failed: {0}")]
    Connect(#[from] diesel::ConnectionError),

    /// A query failed. `target` names the table/view so logs are diagnosable on their own.
    #[error("query against {target} failed: {source}")]
    Query {
        /// Table, view, or catalog the query ran against.
        target: String,
        /// Underlying diesel error.
        #[source]
        source: diesel::result::Error,
    },
}

impl StoreError {
    /// Helper for `map_err` at query sites.
    pub fn query(target: impl Into<String>) -> impl FnOnce(diesel::result::Error) -> Self {
        let target = target.into();
        move |source| StoreError::Query { target, source }
    }
}

/// Result alias used throughout the store.
pub type StoreResult<T> = Result<T, StoreError>;
