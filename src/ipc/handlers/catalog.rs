use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::local;
use serde_json::json;
use uuid::Uuid;

fn handle_divisions_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(nombre) = req.params.get("nombre").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.nombre", None);
    };
    let nombre = nombre.trim();
    if nombre.is_empty() {
        return err(&req.id, "bad_params", "nombre must not be empty", None);
    }
    let id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO divisiones(id, nombre) VALUES(?, ?)",
        (&id, nombre),
    ) {
        Ok(_) => ok(&req.id, json!({ "divisionId": id, "nombre": nombre })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_divisions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.ledger.as_ref() else {
        return ok(&req.id, json!({ "divisiones": [] }));
    };
    // Counts let the dashboard show roster sizes without extra round trips.
    let mut stmt = match conn.prepare(
        "SELECT
           d.id,
           d.nombre,
           (SELECT COUNT(*) FROM estudiantes e WHERE e.division_id = d.id) AS estudiantes,
           (SELECT COUNT(*) FROM asignaciones a WHERE a.division_id = d.id) AS asignaciones
         FROM divisiones d
         ORDER BY d.nombre",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "nombre": row.get::<_, String>(1)?,
                "estudiantes": row.get::<_, i64>(2)?,
                "asignaciones": row.get::<_, i64>(3)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(list) => ok(&req.id, json!({ "divisiones": list })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_assignments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(division_id) = req.params.get("divisionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.divisionId", None);
    };
    let Some(materia) = req.params.get("materia").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.materia", None);
    };
    let docente = req.params.get("docente").and_then(|v| v.as_str());
    let id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO asignaciones(id, division_id, materia, docente) VALUES(?, ?, ?, ?)",
        (&id, division_id, materia, docente),
    ) {
        Ok(_) => ok(&req.id, json!({ "asignacionId": id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_assignments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.ledger.as_ref() else {
        return ok(&req.id, json!({ "asignaciones": [] }));
    };
    let Some(division_id) = req.params.get("divisionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.divisionId", None);
    };
    let mut stmt = match conn.prepare(
        "SELECT id, materia, docente FROM asignaciones WHERE division_id = ? ORDER BY materia",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([division_id], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "materia": row.get::<_, String>(1)?,
                "docente": row.get::<_, Option<String>>(2)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(list) => ok(&req.id, json!({ "asignaciones": list })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(division_id) = req.params.get("divisionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.divisionId", None);
    };
    let Some(apellido) = req.params.get("apellido").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.apellido", None);
    };
    let Some(nombre) = req.params.get("nombre").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.nombre", None);
    };
    let id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO estudiantes(id, division_id, apellido, nombre, activo) VALUES(?, ?, ?, ?, 1)",
        (&id, division_id, apellido, nombre),
    ) {
        Ok(_) => ok(&req.id, json!({ "estudianteId": id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.ledger.as_ref() else {
        return ok(&req.id, json!({ "estudiantes": [] }));
    };
    let Some(division_id) = req.params.get("divisionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.divisionId", None);
    };
    let mut stmt = match conn.prepare(
        "SELECT id, apellido, nombre, activo FROM estudiantes
         WHERE division_id = ?
         ORDER BY apellido, nombre",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([division_id], |row| {
            let apellido: String = row.get(1)?;
            let nombre: String = row.get(2)?;
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "apellido": apellido.clone(),
                "nombre": nombre.clone(),
                "displayName": format!("{}, {}", apellido, nombre),
                "activo": row.get::<_, i64>(3)? != 0,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(list) => ok(&req.id, json!({ "estudiantes": list })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Fully replaces the on-device reference caches from the ledger. Clear then
/// bulk insert; the caches are mirrors, never merged.
fn handle_cache_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (Some(ledger), Some(local_db)) = (state.ledger.as_ref(), state.local.as_ref()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if !state.online {
        return ok(&req.id, json!({ "status": "offline" }));
    }

    let divisiones = collect_rows(ledger, "SELECT id, nombre FROM divisiones", 2);
    let asignaciones = collect_rows(
        ledger,
        "SELECT id, division_id, materia, docente FROM asignaciones",
        4,
    );
    let estudiantes = collect_rows(
        ledger,
        "SELECT id, division_id, apellido, nombre FROM estudiantes",
        4,
    );
    let (divisiones, asignaciones, estudiantes) = match (divisiones, asignaciones, estudiantes) {
        (Ok(d), Ok(a), Ok(e)) => (d, a, e),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            return err(&req.id, "db_query_failed", e.to_string(), None)
        }
    };

    let refresh = local::replace_cache(local_db, "divisiones_cache", |tx| {
        let mut stmt = tx.prepare("INSERT INTO divisiones_cache(id, nombre) VALUES(?, ?)")?;
        for row in &divisiones {
            stmt.execute((&row[0], &row[1]))?;
        }
        Ok(())
    })
    .and_then(|_| {
        local::replace_cache(local_db, "asignaciones_cache", |tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO asignaciones_cache(id, division_id, materia, docente) VALUES(?, ?, ?, ?)",
            )?;
            for row in &asignaciones {
                stmt.execute((&row[0], &row[1], &row[2], &row[3]))?;
            }
            Ok(())
        })
    })
    .and_then(|_| {
        local::replace_cache(local_db, "estudiantes_cache", |tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO estudiantes_cache(id, division_id, apellido, nombre) VALUES(?, ?, ?, ?)",
            )?;
            for row in &estudiantes {
                stmt.execute((&row[0], &row[1], &row[2], &row[3]))?;
            }
            Ok(())
        })
    });
    if let Err(e) = refresh {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "status": "refreshed",
            "divisiones": divisiones.len(),
            "asignaciones": asignaciones.len(),
            "estudiantes": estudiantes.len(),
        }),
    )
}

/// Reads every row of a reference query into owned strings. Nullable columns
/// come back as empty strings; the caches only feed display fields.
fn collect_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    cols: usize,
) -> rusqlite::Result<Vec<Vec<String>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        let mut out = Vec::with_capacity(cols);
        for i in 0..cols {
            out.push(row.get::<_, Option<String>>(i)?.unwrap_or_default());
        }
        Ok(out)
    })?;
    rows.collect()
}

fn handle_cache_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(local_db) = state.local.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match local::cache_counts(local_db) {
        Ok((divisiones, asignaciones, estudiantes)) => ok(
            &req.id,
            json!({
                "divisiones": divisiones,
                "asignaciones": asignaciones,
                "estudiantes": estudiantes,
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "divisions.create" => Some(handle_divisions_create(state, req)),
        "divisions.list" => Some(handle_divisions_list(state, req)),
        "assignments.create" => Some(handle_assignments_create(state, req)),
        "assignments.list" => Some(handle_assignments_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "cache.refresh" => Some(handle_cache_refresh(state, req)),
        "cache.status" => Some(handle_cache_status(state, req)),
        _ => None,
    }
}
