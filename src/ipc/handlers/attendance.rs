use crate::db::{self, AttendanceRow};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

pub(crate) struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub(crate) fn get_required_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad(format!("missing {}", key)))
}

/// Calendar day, ISO `YYYY-MM-DD`. Anything else is a validation error, not a
/// best-effort parse.
pub(crate) fn parse_fecha(raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad(format!("fecha must be YYYY-MM-DD, got {}", raw)))
}

/// Estado defaults to `presente` when omitted; unknown values are rejected at
/// the boundary rather than stored.
pub(crate) fn parse_estado(params: &serde_json::Value) -> Result<String, HandlerErr> {
    let estado = params
        .get("estado")
        .and_then(|v| v.as_str())
        .unwrap_or("presente");
    if !db::estado_is_valid(estado) {
        return Err(HandlerErr::bad(format!("unknown estado: {}", estado)));
    }
    Ok(estado.to_string())
}

/// Parses one attendance record from request params, with `objetivo_key`
/// naming the scope field (asignacionId or divisionId).
pub(crate) fn parse_record(
    params: &serde_json::Value,
    objetivo_key: &str,
) -> Result<AttendanceRow, HandlerErr> {
    let estudiante_id = get_required_str(params, "estudianteId")?;
    let objetivo_id = get_required_str(params, objetivo_key)?;
    let fecha_raw = get_required_str(params, "fecha")?;
    let fecha = parse_fecha(&fecha_raw)?;
    let estado = parse_estado(params)?;
    let observaciones = params
        .get("observaciones")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    Ok(AttendanceRow {
        estudiante_id,
        objetivo_id,
        fecha: fecha.format("%Y-%m-%d").to_string(),
        estado,
        observaciones,
    })
}

fn upsert_subject(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let record = parse_record(params, "asignacionId")?;
    db::upsert_asistencia(conn, &record).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "asistencias" })),
    })?;
    Ok(record.to_json("asignacionId"))
}

fn upsert_general(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(records_json) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad("missing records"));
    };
    if records_json.is_empty() {
        return Err(HandlerErr::bad("records must not be empty"));
    }
    let mut records = Vec::with_capacity(records_json.len());
    for rec in records_json {
        records.push(parse_record(rec, "divisionId")?);
    }

    // The whole roll call lands or none of it does.
    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;
    for record in &records {
        db::upsert_asistencia_preceptor(&tx, record).map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "asistencias_preceptor" })),
        })?;
    }
    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    let rows: Vec<serde_json::Value> = records.iter().map(|r| r.to_json("divisionId")).collect();
    Ok(json!({ "records": rows }))
}

fn list_for_assignment(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let asignacion_id = get_required_str(params, "asignacionId")?;
    let fecha = match params.get("fecha").and_then(|v| v.as_str()) {
        Some(raw) => Some(parse_fecha(raw)?.format("%Y-%m-%d").to_string()),
        None => None,
    };

    let map_err = |e: rusqlite::Error| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    };
    let rows = match &fecha {
        Some(f) => {
            let mut stmt = conn
                .prepare(
                    "SELECT estudiante_id, asignacion_id, fecha, estado, observaciones
                     FROM asistencias
                     WHERE asignacion_id = ? AND fecha = ?
                     ORDER BY estudiante_id",
                )
                .map_err(map_err)?;
            stmt.query_map((&asignacion_id, f), AttendanceRow::from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(map_err)?
        }
        None => {
            let mut stmt = conn
                .prepare(
                    "SELECT estudiante_id, asignacion_id, fecha, estado, observaciones
                     FROM asistencias
                     WHERE asignacion_id = ?
                     ORDER BY fecha, estudiante_id",
                )
                .map_err(map_err)?;
            stmt.query_map([&asignacion_id], AttendanceRow::from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
                .map_err(map_err)?
        }
    };

    let out: Vec<serde_json::Value> = rows.iter().map(|r| r.to_json("asignacionId")).collect();
    Ok(json!({ "records": out }))
}

fn list_for_division(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let division_id = get_required_str(params, "divisionId")?;
    let fecha_raw = get_required_str(params, "fecha")?;
    let fecha = parse_fecha(&fecha_raw)?.format("%Y-%m-%d").to_string();

    let mut stmt = conn
        .prepare(
            "SELECT estudiante_id, division_id, fecha, estado, observaciones
             FROM asistencias_preceptor
             WHERE division_id = ? AND fecha = ?
             ORDER BY estudiante_id",
        )
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?;
    let rows = stmt
        .query_map((&division_id, &fecha), AttendanceRow::from_row)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        })?;

    let out: Vec<serde_json::Value> = rows.iter().map(|r| r.to_json("divisionId")).collect();
    Ok(json!({ "records": out }))
}

fn with_ledger(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.upsert" => Some(with_ledger(state, req, upsert_subject)),
        "attendance.upsertGeneral" => Some(with_ledger(state, req, upsert_general)),
        "attendance.listForAssignment" => Some(with_ledger(state, req, list_for_assignment)),
        "attendance.listForDivision" => Some(with_ledger(state, req, list_for_division)),
        _ => None,
    }
}
