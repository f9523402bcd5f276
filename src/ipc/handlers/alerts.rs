use crate::ipc::error::{err, ok};
use crate::ipc::handlers::attendance::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::risk::{self, AttendanceCounts};
use rusqlite::Connection;
use serde_json::json;

/// Students ranked by absolute absence count in the preceptor ledger.
fn alerts(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let division_id = get_required_str(params, "divisionId")?;
    let map_err = |e: rusqlite::Error| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    };

    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.apellido, e.nombre, COUNT(*) AS ausencias
             FROM asistencias_preceptor ap
             JOIN estudiantes e ON e.id = ap.estudiante_id
             WHERE ap.division_id = ? AND ap.estado = 'ausente'
             GROUP BY e.id, e.apellido, e.nombre
             ORDER BY ausencias DESC, e.apellido, e.nombre",
        )
        .map_err(map_err)?;
    let rows = stmt
        .query_map([&division_id], |r| {
            let apellido: String = r.get(1)?;
            let nombre: String = r.get(2)?;
            Ok(json!({
                "estudianteId": r.get::<_, String>(0)?,
                "nombre": format!("{}, {}", apellido, nombre),
                "ausencias": r.get::<_, i64>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(map_err)?;

    Ok(json!({ "alertas": rows }))
}

/// Per-student tallies for one scope of either ledger, in roster order.
fn tally(
    conn: &Connection,
    sql: &str,
    scope_id: &str,
) -> Result<Vec<(String, String, AttendanceCounts)>, HandlerErr> {
    let map_err = |e: rusqlite::Error| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    };
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let raw = stmt
        .query_map([scope_id], |r| {
            let apellido: String = r.get(1)?;
            let nombre: String = r.get(2)?;
            Ok((
                r.get::<_, String>(0)?,
                format!("{}, {}", apellido, nombre),
                r.get::<_, String>(3)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(map_err)?;

    let mut out: Vec<(String, String, AttendanceCounts)> = Vec::new();
    for (estudiante_id, nombre, estado) in raw {
        match out.iter_mut().find(|(id, _, _)| *id == estudiante_id) {
            Some((_, _, counts)) => counts.add(&estado),
            None => {
                let mut counts = AttendanceCounts::default();
                counts.add(&estado);
                out.push((estudiante_id, nombre, counts));
            }
        }
    }
    Ok(out)
}

fn risk_json(tallies: Vec<(String, String, AttendanceCounts)>, min_sample: i64) -> serde_json::Value {
    let mut en_riesgo = Vec::new();
    for (estudiante_id, nombre, counts) in tallies {
        if !risk::is_at_risk(&counts, min_sample) {
            continue;
        }
        en_riesgo.push(json!({
            "estudianteId": estudiante_id,
            "nombre": nombre,
            "porcentaje": risk::attendance_percent(&counts),
            "registros": counts.total(),
            "conteos": counts,
        }));
    }
    json!({
        "umbral": risk::RISK_THRESHOLD_PCT,
        "minimoRegistros": min_sample,
        "enRiesgo": en_riesgo,
    })
}

fn risk_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let division_id = get_required_str(params, "divisionId")?;
    let tallies = tally(
        conn,
        "SELECT ap.estudiante_id, e.apellido, e.nombre, ap.estado
         FROM asistencias_preceptor ap
         JOIN estudiantes e ON e.id = ap.estudiante_id
         WHERE ap.division_id = ?
         ORDER BY e.apellido, e.nombre, ap.fecha",
        &division_id,
    )?;
    Ok(risk_json(tallies, risk::MIN_SAMPLE_DIVISION))
}

fn risk_for_assignment(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let asignacion_id = get_required_str(params, "asignacionId")?;
    let tallies = tally(
        conn,
        "SELECT a.estudiante_id, e.apellido, e.nombre, a.estado
         FROM asistencias a
         JOIN estudiantes e ON e.id = a.estudiante_id
         WHERE a.asignacion_id = ?
         ORDER BY e.apellido, e.nombre, a.fecha",
        &asignacion_id,
    )?;
    Ok(risk_json(tallies, risk::MIN_SAMPLE_SUBJECT))
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
        "attendance.alerts" => Some(with_ledger(state, req, alerts)),
        "attendance.riskSummary" => Some(with_ledger(state, req, risk_summary)),
        "attendance.riskForAssignment" => Some(with_ledger(state, req, risk_for_assignment)),
        _ => None,
    }
}
