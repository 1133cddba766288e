use std::collections::BTreeMap;

use be_remote_db::ResettableTable;
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::AdminError;
use crate::store::AdminStore;

pub const RESET_CONFIRMATION: &str = "RÉINITIALISER TOUT";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableError {
    pub table: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResetOutcome {
    pub success: bool,
    pub deleted: BTreeMap<&'static str, i64>,
    pub errors: Vec<TableError>,
}

/// Wipes transactional data, children before parents. A table that fails
/// is reported and the remaining tables are still processed.
pub async fn reset_all(
    store: &dyn AdminStore,
    admin_id: Uuid,
    confirmation: &str,
) -> Result<ResetOutcome, AdminError> {
    if confirmation != RESET_CONFIRMATION {
        return Err(AdminError::InvalidConfirmation);
    }

    warn!(%admin_id, "Platform data reset requested");

    let mut outcome = ResetOutcome::default();
    for table in ResettableTable::RESET_ORDER {
        let name = table.table_name();
        let counted = match store.count_rows(table).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(table = name, error = %e, "Failed to count rows before reset");
                None
            }
        };

        match store.delete_rows(table).await {
            Ok(deleted) => {
                let deleted = i64::try_from(deleted).unwrap_or(i64::MAX);
                outcome.deleted.insert(name, counted.unwrap_or(deleted));
            }
            Err(e) => {
                error!(table = name, error = %e, "Failed to reset table");
                outcome.errors.push(TableError {
                    table: name,
                    error: e.to_string(),
                });
            }
        }
    }

    outcome.success = outcome.errors.is_empty();
    warn!(
        %admin_id,
        deleted = ?outcome.deleted,
        failed = outcome.errors.len(),
        "Platform data reset finished"
    );
    Ok(outcome)
}
