//! Bulk write with per-document fallback.

use std::collections::HashSet;

use sparza_core::data_type::DataType;
use sparza_core::store::{FieldUpdate, RecordStore};
use sparza_core::types::RecordId;

/// Which updates reached the database.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WriteReport {
    pub written: Vec<RecordId>,
    /// Updates that failed even when retried individually, with the reason.
    pub failed: Vec<(RecordId, String)>,
}

/// Write `updates` with one bulk call.
///
/// When the bulk fails as a whole, or matches fewer documents than it
/// accepted, every update is retried with `update_one`; when it succeeds
/// with per-statement errors, only the rejected updates are retried.
pub async fn write_updates(
    store: &dyn RecordStore,
    data_type: DataType,
    updates: &[FieldUpdate],
) -> WriteReport {
    let mut report = WriteReport::default();
    if updates.is_empty() {
        return report;
    }

    let retry: Vec<&FieldUpdate> = match store.bulk_update(data_type, updates).await {
        Ok(outcome) => {
            let rejected: HashSet<&RecordId> = outcome.failed.iter().collect();
            let (retry, accepted): (Vec<&FieldUpdate>, Vec<&FieldUpdate>) =
                updates.iter().partition(|u| rejected.contains(&u.id));

            if outcome.written < accepted.len() as u64 {
                // Some statements matched no document and the reply does not
                // say which; check each one individually.
                tracing::warn!(
                    data_type = %data_type,
                    accepted = accepted.len(),
                    matched = outcome.written,
                    "Bulk write matched fewer documents than expected",
                );
                updates.iter().collect()
            } else {
                report
                    .written
                    .extend(accepted.into_iter().map(|u| u.id.clone()));
                retry
            }
        }
        Err(e) => {
            tracing::warn!(
                data_type = %data_type,
                updates = updates.len(),
                error = %e,
                "Bulk write failed, falling back to per-document writes",
            );
            updates.iter().collect()
        }
    };

    for update in retry {
        match store.update_one(data_type, update).await {
            Ok(true) => report.written.push(update.id.clone()),
            Ok(false) => report
                .failed
                .push((update.id.clone(), "document not found".to_string())),
            Err(e) => report.failed.push((update.id.clone(), e.to_string())),
        }
    }

    report
}
