use crate::ipc::error::{err, ok};
use crate::ipc::handlers::attendance::parse_record;
use crate::ipc::types::{AppState, Request};
use crate::local::{self, TIPO_ASSIGNMENT};
use crate::sync;
use serde_json::json;

/// Appends attendance entries to the outbox. Purely local; always succeeds
/// without a connection. While online this is the save-then-flush pattern:
/// the queue drains in the same call and the outcome rides along.
fn handle_enqueue(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(local_db), Some(ledger)) = (state.local.as_ref(), state.ledger.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(tipo) = req.params.get("tipo").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.tipo", None);
    };
    if !local::tipo_is_valid(tipo) {
        return err(
            &req.id,
            "bad_params",
            format!("tipo must be assignment or general, got {}", tipo),
            None,
        );
    }
    let Some(records_json) = req.params.get("records").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.records", None);
    };
    if records_json.is_empty() {
        return err(&req.id, "bad_params", "records must not be empty", None);
    }

    let objetivo_key = if tipo == TIPO_ASSIGNMENT {
        "asignacionId"
    } else {
        "divisionId"
    };
    let mut records = Vec::with_capacity(records_json.len());
    for rec in records_json {
        match parse_record(rec, objetivo_key) {
            Ok(r) => records.push(r),
            Err(e) => return e.response(&req.id),
        }
    }

    for record in &records {
        if let Err(e) = local::enqueue(local_db, tipo, record) {
            return err(&req.id, "db_update_failed", e.to_string(), None);
        }
    }

    let mut result = json!({ "queued": records.len() });
    if state.online {
        match sync::flush(local_db, ledger, true) {
            Ok(outcome) => result["flush"] = outcome.to_json(),
            Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
        }
    }
    match local::pending_count(local_db) {
        Ok(n) => result["pending"] = json!(n),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    ok(&req.id, result)
}

fn handle_pending(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(local_db) = state.local.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match local::pending_count(local_db) {
        Ok(n) => ok(&req.id, json!({ "pending": n })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_flush(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(local_db), Some(ledger)) = (state.local.as_ref(), state.ledger.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match sync::flush(local_db, ledger, state.online) {
        Ok(outcome) => ok(&req.id, outcome.to_json()),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "queue.enqueue" => Some(handle_enqueue(state, req)),
        "queue.pending" => Some(handle_pending(state, req)),
        "queue.flush" => Some(handle_flush(state, req)),
        _ => None,
    }
}
