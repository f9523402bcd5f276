use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, Role};
use crate::local;
use crate::sync;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "online": state.online,
            "role": state.role.as_str(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let ledger = match db::open_ledger(&path) {
        Ok(conn) => conn,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };
    let local_db = match local::open_local(&path) {
        Ok(conn) => conn,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };

    state.workspace = Some(path.clone());
    state.ledger = Some(ledger);
    state.local = Some(local_db);
    ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
}

fn handle_session_configure(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(role_str) = req.params.get("role").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.role", None);
    };
    let Some(role) = Role::parse(role_str) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown role: {}", role_str),
            None,
        );
    };
    state.role = role;
    ok(&req.id, json!({ "role": role.as_str() }))
}

/// Records connectivity reported by the platform network watcher. Crossing
/// from offline to online is a flush trigger: queued attendance is uploaded
/// without waiting for the next user action.
fn handle_network_set_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(online) = req.params.get("online").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing params.online", None);
    };
    let was_online = state.online;
    state.online = online;

    let mut result = json!({ "online": online });
    if online && !was_online {
        if let (Some(local_db), Some(ledger)) = (state.local.as_ref(), state.ledger.as_ref()) {
            match sync::flush(local_db, ledger, true) {
                Ok(outcome) => result["flush"] = outcome.to_json(),
                Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
            }
        }
    }
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "session.configure" => Some(handle_session_configure(state, req)),
        "network.setStatus" => Some(handle_network_set_status(state, req)),
        _ => None,
    }
}
