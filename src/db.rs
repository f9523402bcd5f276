use rusqlite::{Connection, Row};
use serde_json::json;
use std::path::Path;

/// Attendance statuses accepted by both ledgers.
pub const ESTADOS: [&str; 4] = ["presente", "ausente", "tarde", "justificado"];

pub fn estado_is_valid(estado: &str) -> bool {
    ESTADOS.contains(&estado)
}

/// Opens (and migrates) the authoritative ledger database inside the workspace.
/// This stands in for the hosted record store: reference data, both attendance
/// ledgers, and the audit log.
pub fn open_ledger(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("ledger.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS divisiones(
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS asignaciones(
            id TEXT PRIMARY KEY,
            division_id TEXT NOT NULL,
            materia TEXT NOT NULL,
            docente TEXT,
            FOREIGN KEY(division_id) REFERENCES divisiones(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_asignaciones_division ON asignaciones(division_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS estudiantes(
            id TEXT PRIMARY KEY,
            division_id TEXT NOT NULL,
            apellido TEXT NOT NULL,
            nombre TEXT NOT NULL,
            activo INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(division_id) REFERENCES divisiones(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_estudiantes_division ON estudiantes(division_id)",
        [],
    )?;

    // Subject-scoped ledger. Natural key (estudiante, asignacion, fecha):
    // re-submission overwrites, never duplicates.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS asistencias(
            estudiante_id TEXT NOT NULL,
            asignacion_id TEXT NOT NULL,
            fecha TEXT NOT NULL,
            estado TEXT NOT NULL,
            observaciones TEXT,
            PRIMARY KEY(estudiante_id, asignacion_id, fecha),
            FOREIGN KEY(estudiante_id) REFERENCES estudiantes(id),
            FOREIGN KEY(asignacion_id) REFERENCES asignaciones(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_asistencias_asignacion_fecha
         ON asistencias(asignacion_id, fecha)",
        [],
    )?;

    // Division-scoped ledger kept by the preceptor, independent of any subject.
    // The two ledgers are allowed to disagree; reconciliation reports on it.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS asistencias_preceptor(
            estudiante_id TEXT NOT NULL,
            division_id TEXT NOT NULL,
            fecha TEXT NOT NULL,
            estado TEXT NOT NULL,
            observaciones TEXT,
            PRIMARY KEY(estudiante_id, division_id, fecha),
            FOREIGN KEY(estudiante_id) REFERENCES estudiantes(id),
            FOREIGN KEY(division_id) REFERENCES divisiones(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_asistencias_preceptor_division_fecha
         ON asistencias_preceptor(division_id, fecha)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auditoria(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            actor_role TEXT NOT NULL,
            accion TEXT NOT NULL,
            detalle TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

/// One attendance row, from either ledger. `objetivo_id` is the asignacion for
/// the subject ledger and the division for the preceptor ledger.
#[derive(Debug, Clone)]
pub struct AttendanceRow {
    pub estudiante_id: String,
    pub objetivo_id: String,
    pub fecha: String,
    pub estado: String,
    pub observaciones: Option<String>,
}

impl AttendanceRow {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AttendanceRow {
            estudiante_id: row.get(0)?,
            objetivo_id: row.get(1)?,
            fecha: row.get(2)?,
            estado: row.get(3)?,
            observaciones: row.get(4)?,
        })
    }

    pub fn to_json(&self, objetivo_key: &str) -> serde_json::Value {
        json!({
            "estudianteId": self.estudiante_id,
            objetivo_key: self.objetivo_id,
            "fecha": self.fecha,
            "estado": self.estado,
            "observaciones": self.observaciones,
        })
    }
}

/// Upserts one subject-ledger row on its natural key. Calling twice with the
/// same key keeps exactly one row reflecting the latest call.
pub fn upsert_asistencia(conn: &Connection, rec: &AttendanceRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO asistencias(estudiante_id, asignacion_id, fecha, estado, observaciones)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(estudiante_id, asignacion_id, fecha) DO UPDATE SET
           estado = excluded.estado,
           observaciones = excluded.observaciones",
        (
            &rec.estudiante_id,
            &rec.objetivo_id,
            &rec.fecha,
            &rec.estado,
            &rec.observaciones,
        ),
    )?;
    Ok(())
}

/// Upserts one preceptor-ledger row on its natural key.
pub fn upsert_asistencia_preceptor(conn: &Connection, rec: &AttendanceRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO asistencias_preceptor(estudiante_id, division_id, fecha, estado, observaciones)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(estudiante_id, division_id, fecha) DO UPDATE SET
           estado = excluded.estado,
           observaciones = excluded.observaciones",
        (
            &rec.estudiante_id,
            &rec.objetivo_id,
            &rec.fecha,
            &rec.estado,
            &rec.observaciones,
        ),
    )?;
    Ok(())
}

pub fn audit_append(
    conn: &Connection,
    actor_role: &str,
    accion: &str,
    detalle: &serde_json::Value,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO auditoria(actor_role, accion, detalle, created_at)
         VALUES(?, ?, ?, ?)",
        (
            actor_role,
            accion,
            detalle.to_string(),
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}
