use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, Role};
use serde_json::json;

fn handle_audit_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.role != Role::Admin {
        return err(&req.id, "forbidden", "audit log requires admin role", None);
    }
    let Some(conn) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_i64())
        .filter(|n| *n > 0)
        .unwrap_or(100);

    let mut stmt = match conn.prepare(
        "SELECT id, actor_role, accion, detalle, created_at
         FROM auditoria
         ORDER BY id DESC
         LIMIT ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([limit], |r| {
            let detalle: Option<String> = r.get(3)?;
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "actorRole": r.get::<_, String>(1)?,
                "accion": r.get::<_, String>(2)?,
                "detalle": detalle
                    .and_then(|d| serde_json::from_str::<serde_json::Value>(&d).ok()),
                "createdAt": r.get::<_, String>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(list) => ok(&req.id, json!({ "entries": list })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "audit.list" => Some(handle_audit_list(state, req)),
        _ => None,
    }
}
