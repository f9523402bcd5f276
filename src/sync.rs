use rusqlite::Connection;
use serde_json::json;

use crate::db;
use crate::local::{self, QueueEntry, TIPO_ASSIGNMENT, TIPO_GENERAL};

/// Result of one flush attempt. Connectivity and upstream failures are data,
/// not errors: the caller decides how to surface them and the outbox is left
/// intact on anything but `Synced`.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// No connection; nothing was attempted and nothing changed.
    Offline { pending: usize },
    /// Every pending entry was uploaded and removed from the outbox.
    Synced { uploaded: usize },
    /// An upload failed part-way. The outbox is unchanged and the next
    /// trigger retries wholesale; already-applied upserts are harmless to
    /// replay because the ledgers are idempotent on their natural keys.
    Failed { message: String, pending: usize },
}

impl FlushOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FlushOutcome::Offline { pending } => json!({
                "status": "offline",
                "pending": pending,
            }),
            FlushOutcome::Synced { uploaded } => json!({
                "status": "synced",
                "uploaded": uploaded,
            }),
            FlushOutcome::Failed { message, pending } => json!({
                "status": "failed",
                "message": message,
                "pending": pending,
            }),
        }
    }
}

/// Splits pending entries into the two ledger partitions, preserving insertion
/// order within each.
fn partition(entries: &[QueueEntry]) -> (Vec<&QueueEntry>, Vec<&QueueEntry>) {
    let mut assignment = Vec::new();
    let mut general = Vec::new();
    for e in entries {
        match e.tipo.as_str() {
            TIPO_ASSIGNMENT => assignment.push(e),
            TIPO_GENERAL => general.push(e),
            // Unknown discriminators stay queued rather than being dropped.
            _ => {}
        }
    }
    (assignment, general)
}

/// Best-effort upload of the whole outbox. All-or-nothing per invocation:
/// entries are deleted only after both partitions upserted cleanly.
///
/// Errors returned here are local-store failures only; ledger and
/// connectivity problems come back as `FlushOutcome`.
pub fn flush(local: &Connection, ledger: &Connection, online: bool) -> anyhow::Result<FlushOutcome> {
    let entries = local::pending_entries(local)?;
    if !online {
        return Ok(FlushOutcome::Offline {
            pending: entries.len(),
        });
    }
    if entries.is_empty() {
        return Ok(FlushOutcome::Synced { uploaded: 0 });
    }

    let (assignment, general) = partition(&entries);

    for e in &assignment {
        if let Err(err) = db::upsert_asistencia(ledger, &e.record) {
            return Ok(FlushOutcome::Failed {
                message: err.to_string(),
                pending: entries.len(),
            });
        }
    }
    for e in &general {
        if let Err(err) = db::upsert_asistencia_preceptor(ledger, &e.record) {
            return Ok(FlushOutcome::Failed {
                message: err.to_string(),
                pending: entries.len(),
            });
        }
    }

    let uploaded: Vec<i64> = assignment
        .iter()
        .chain(general.iter())
        .map(|e| e.id)
        .collect();
    local::delete_entries(local, &uploaded)?;
    Ok(FlushOutcome::Synced {
        uploaded: uploaded.len(),
    })
}
