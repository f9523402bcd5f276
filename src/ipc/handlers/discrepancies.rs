use crate::ipc::error::{err, ok};
use crate::ipc::handlers::attendance::{get_required_str, parse_fecha, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

struct PreceptorEntry {
    estudiante_id: String,
    nombre: String,
    estado: String,
}

struct SubjectEntry {
    materia: String,
    estado: String,
}

/// Cross-references the preceptor roll call with every subject record for one
/// division and date. A student is flagged when any subject status disagrees
/// with the preceptor status, or when the preceptor marked something other
/// than `presente` and no subject record exists to corroborate it.
fn discrepancies(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let division_id = get_required_str(params, "divisionId")?;
    let fecha = parse_fecha(&get_required_str(params, "fecha")?)?
        .format("%Y-%m-%d")
        .to_string();
    let map_err = |e: rusqlite::Error| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    };

    let mut stmt = conn
        .prepare(
            "SELECT ap.estudiante_id, e.apellido, e.nombre, ap.estado
             FROM asistencias_preceptor ap
             JOIN estudiantes e ON e.id = ap.estudiante_id
             WHERE ap.division_id = ? AND ap.fecha = ?
             ORDER BY e.apellido, e.nombre",
        )
        .map_err(map_err)?;
    let roll_call: Vec<PreceptorEntry> = stmt
        .query_map((&division_id, &fecha), |r| {
            let apellido: String = r.get(1)?;
            let nombre: String = r.get(2)?;
            Ok(PreceptorEntry {
                estudiante_id: r.get(0)?,
                nombre: format!("{}, {}", apellido, nombre),
                estado: r.get(3)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(map_err)?;

    // Every subject record for this division and date, grouped by student.
    let mut stmt = conn
        .prepare(
            "SELECT a.estudiante_id, asg.materia, a.estado
             FROM asistencias a
             JOIN asignaciones asg ON asg.id = a.asignacion_id
             WHERE asg.division_id = ? AND a.fecha = ?
             ORDER BY asg.materia",
        )
        .map_err(map_err)?;
    let subject_rows: Vec<(String, SubjectEntry)> = stmt
        .query_map((&division_id, &fecha), |r| {
            Ok((
                r.get::<_, String>(0)?,
                SubjectEntry {
                    materia: r.get(1)?,
                    estado: r.get(2)?,
                },
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(map_err)?;

    let mut by_student: HashMap<String, Vec<SubjectEntry>> = HashMap::new();
    for (estudiante_id, entry) in subject_rows {
        by_student.entry(estudiante_id).or_default().push(entry);
    }

    let mut out = Vec::new();
    for entry in &roll_call {
        let materias = by_student.get(&entry.estudiante_id);
        let flagged = match materias {
            Some(list) => list.iter().any(|m| m.estado != entry.estado),
            // No subject record at all: suspicious unless the preceptor saw
            // the student present.
            None => entry.estado != "presente",
        };
        if !flagged {
            continue;
        }
        let materias_json: Vec<serde_json::Value> = materias
            .map(|list| {
                list.iter()
                    .map(|m| json!({ "materia": m.materia, "estado": m.estado }))
                    .collect()
            })
            .unwrap_or_default();
        out.push(json!({
            "estudianteId": entry.estudiante_id,
            "nombre": entry.nombre,
            "preceptor": entry.estado,
            "materias": materias_json,
        }));
    }

    Ok(json!({ "fecha": fecha, "discrepancias": out }))
}

fn handle_discrepancies(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.role.can_administer() {
        return err(
            &req.id,
            "forbidden",
            "discrepancy reconciliation requires preceptor or admin role",
            None,
        );
    }
    let Some(conn) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match discrepancies(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.discrepancies" => Some(handle_discrepancies(state, req)),
        _ => None,
    }
}
