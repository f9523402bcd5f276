use rusqlite::Connection;
use std::path::Path;

use crate::db::AttendanceRow;

/// Outbox entry discriminators: which ledger a queued write targets.
pub const TIPO_ASSIGNMENT: &str = "assignment";
pub const TIPO_GENERAL: &str = "general";

pub fn tipo_is_valid(tipo: &str) -> bool {
    tipo == TIPO_ASSIGNMENT || tipo == TIPO_GENERAL
}

/// Opens (and migrates) the on-device store inside the workspace: reference
/// caches plus the sync outbox. The caches exist only to render UI offline;
/// they are fully replaced on every refresh, never patched.
pub fn open_local(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("local.sqlite3");
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS divisiones_cache(
            id TEXT PRIMARY KEY,
            nombre TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS asignaciones_cache(
            id TEXT PRIMARY KEY,
            division_id TEXT NOT NULL,
            materia TEXT NOT NULL,
            docente TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS estudiantes_cache(
            id TEXT PRIMARY KEY,
            division_id TEXT NOT NULL,
            apellido TEXT NOT NULL,
            nombre TEXT NOT NULL
        )",
        [],
    )?;

    // The outbox is append-only from the caller's side. `synced` is a
    // written-once intent flag; deletion after a confirmed upload is the only
    // success signal, so entries are never flipped in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_queue(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tipo TEXT NOT NULL,
            estudiante_id TEXT NOT NULL,
            objetivo_id TEXT NOT NULL,
            fecha TEXT NOT NULL,
            estado TEXT NOT NULL,
            observaciones TEXT,
            synced INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_tipo ON sync_queue(tipo)",
        [],
    )?;

    Ok(conn)
}

/// A queued local mutation awaiting upload.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub tipo: String,
    pub record: AttendanceRow,
}

/// Appends one outbox entry. Purely local; never validates against the server.
/// Repeated saves for the same natural key coexist in the queue and converge on
/// replay because the ledger upsert is idempotent.
pub fn enqueue(conn: &Connection, tipo: &str, record: &AttendanceRow) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO sync_queue(tipo, estudiante_id, objetivo_id, fecha, estado, observaciones, synced, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 0, ?)",
        (
            tipo,
            &record.estudiante_id,
            &record.objetivo_id,
            &record.fecha,
            &record.estado,
            &record.observaciones,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

/// Number of entries not yet confirmed uploaded. UI indication only.
pub fn pending_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |r| r.get(0))
}

/// All pending entries in insertion order. Insertion order per partition is
/// what makes last-write-wins replay correct.
pub fn pending_entries(conn: &Connection) -> rusqlite::Result<Vec<QueueEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, tipo, estudiante_id, objetivo_id, fecha, estado, observaciones
         FROM sync_queue
         ORDER BY id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(QueueEntry {
            id: r.get(0)?,
            tipo: r.get(1)?,
            record: AttendanceRow {
                estudiante_id: r.get(2)?,
                objetivo_id: r.get(3)?,
                fecha: r.get(4)?,
                estado: r.get(5)?,
                observaciones: r.get(6)?,
            },
        })
    })?;
    rows.collect()
}

/// Deletes a set of confirmed-uploaded entries in one transaction, so a crash
/// mid-delete never leaves a half-acknowledged flush.
pub fn delete_entries(conn: &Connection, ids: &[i64]) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare("DELETE FROM sync_queue WHERE id = ?")?;
        for id in ids {
            stmt.execute([id])?;
        }
    }
    tx.commit()
}

/// Clear-then-bulk-insert replacement for one cache table.
pub fn replace_cache<F>(conn: &Connection, table: &str, insert_all: F) -> rusqlite::Result<()>
where
    F: FnOnce(&rusqlite::Transaction) -> rusqlite::Result<()>,
{
    let tx = conn.unchecked_transaction()?;
    tx.execute(&format!("DELETE FROM {}", table), [])?;
    insert_all(&tx)?;
    tx.commit()
}

pub fn cache_counts(conn: &Connection) -> rusqlite::Result<(i64, i64, i64)> {
    let divisiones: i64 =
        conn.query_row("SELECT COUNT(*) FROM divisiones_cache", [], |r| r.get(0))?;
    let asignaciones: i64 =
        conn.query_row("SELECT COUNT(*) FROM asignaciones_cache", [], |r| r.get(0))?;
    let estudiantes: i64 =
        conn.query_row("SELECT COUNT(*) FROM estudiantes_cache", [], |r| r.get(0))?;
    Ok((divisiones, asignaciones, estudiantes))
}
