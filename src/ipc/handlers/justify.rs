use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::attendance::{get_required_str, parse_fecha, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;

const DEFAULT_OBSERVACION: &str = "Justificación masiva";

struct MassJustify {
    student_ids: Vec<String>,
    start: String,
    end: String,
    observaciones: String,
}

fn parse_params(params: &serde_json::Value) -> Result<MassJustify, HandlerErr> {
    let Some(ids_json) = params.get("studentIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad("missing studentIds"));
    };
    let student_ids: Vec<String> = ids_json
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    if student_ids.is_empty() {
        return Err(HandlerErr::bad("studentIds must not be empty"));
    }

    let start = parse_fecha(&get_required_str(params, "startDate")?)?;
    let end = parse_fecha(&get_required_str(params, "endDate")?)?;
    if start > end {
        return Err(HandlerErr::bad("startDate must not be after endDate"));
    }

    let observaciones = params
        .get("observaciones")
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_OBSERVACION)
        .to_string();

    Ok(MassJustify {
        student_ids,
        start: start.format("%Y-%m-%d").to_string(),
        end: end.format("%Y-%m-%d").to_string(),
        observaciones,
    })
}

/// Filtered bulk update on one ledger: absence-like rows inside the range
/// become `justificado`. Rows that do not exist are not created.
fn justify_ledger(conn: &Connection, table: &str, p: &MassJustify) -> Result<usize, HandlerErr> {
    let placeholders = vec!["?"; p.student_ids.len()].join(", ");
    let sql = format!(
        "UPDATE {} SET estado = 'justificado', observaciones = ?
         WHERE estudiante_id IN ({})
           AND fecha >= ? AND fecha <= ?
           AND estado IN ('ausente', 'tarde')",
        table, placeholders
    );
    let mut args: Vec<Value> = Vec::with_capacity(p.student_ids.len() + 3);
    args.push(Value::Text(p.observaciones.clone()));
    for id in &p.student_ids {
        args.push(Value::Text(id.clone()));
    }
    args.push(Value::Text(p.start.clone()));
    args.push(Value::Text(p.end.clone()));

    conn.execute(&sql, params_from_iter(args)).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": table })),
    })
}

fn handle_mass_justify(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.role.can_administer() {
        return err(
            &req.id,
            "forbidden",
            "mass justification requires preceptor or admin role",
            None,
        );
    }
    let Some(conn) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let p = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };

    // Preceptor ledger first, then the subject ledger across all assignments.
    // A failure on the first short-circuits the second; a failure on the
    // second leaves the first applied. Re-running is safe: justified rows no
    // longer match the filter.
    let preceptor = match justify_ledger(conn, "asistencias_preceptor", &p) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };
    let materias = match justify_ledger(conn, "asistencias", &p) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };

    let detalle = json!({
        "studentIds": p.student_ids,
        "startDate": p.start,
        "endDate": p.end,
        "preceptorActualizadas": preceptor,
        "materiasActualizadas": materias,
    });
    if let Err(e) = db::audit_append(conn, state.role.as_str(), "attendance.massJustify", &detalle)
    {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "preceptorActualizadas": preceptor,
            "materiasActualizadas": materias,
            "observaciones": p.observaciones,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.massJustify" => Some(handle_mass_justify(state, req)),
        _ => None,
    }
}
