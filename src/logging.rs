//! Statement logging shared by the driver adapters

use repository::{BoxError, Statement};

use crate::errors::DatabaseError;
use crate::trace_log;

/// Info when the configuration asks for it, debug otherwise
pub(crate) fn log_statement(debug: bool, statement: &Statement) {
    if debug {
        tracing::info!(sql = %statement.sql, "executing statement");
    } else {
        tracing::debug!(sql = %statement.sql, "executing statement");
    }
    trace_log!("[SQL] Parameters: {:?}", statement.parameters);
}

pub(crate) fn log_failure<T>(
    statement: &Statement,
    result: Result<T, DatabaseError>,
) -> Result<T, BoxError> {
    result.map_err(|e| {
        tracing::warn!(sql = %statement.sql, error = %e, "statement failed");
        BoxError::from(e)
    })
}
