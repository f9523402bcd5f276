
use serde_json::json;
use test_support::{request_err, request_ok, seed_division, spawn_sidecar, temp_dir};

fn discrepancies_for(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
    id: &str,
    division_id: &str,
    fecha: &str,
) -> Vec<serde_json::Value> {
    let result = request_ok(
        stdin,
        reader,
        id,
        "attendance.discrepancies",
        json!({ "divisionId": division_id, "fecha": fecha }),
    );
    result
        .get("discrepancias")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

#[test]
fn division_ausente_with_subject_presente_is_flagged_with_both_statuses() {
    let workspace = temp_dir("preceptord-discrepancy-conflict");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Math",
        &[("Paz", "Ana")],
    );
    let s1 = &seeded.student_ids[0];

    // Division 5 A, 2024-03-15: the preceptor roll call says ausente while
    // the Math teacher recorded presente.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertGeneral",
        json!({ "records": [
            { "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-15", "estado": "ausente" },
        ]}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.upsert",
        json!({
            "estudianteId": s1,
            "asignacionId": seeded.asignacion_id,
            "fecha": "2024-03-15",
            "estado": "presente",
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.configure",
        json!({ "role": "preceptor" }),
    );

    let flagged = discrepancies_for(
        &mut stdin,
        &mut reader,
        "4",
        &seeded.division_id,
        "2024-03-15",
    );
    assert_eq!(flagged.len(), 1);
    let entry = &flagged[0];
    assert_eq!(
        entry.get("estudianteId").and_then(|v| v.as_str()),
        Some(s1.as_str())
    );
    assert_eq!(
        entry.get("preceptor").and_then(|v| v.as_str()),
        Some("ausente")
    );
    let materias = entry
        .get("materias")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(materias.len(), 1);
    assert_eq!(
        materias[0].get("materia").and_then(|v| v.as_str()),
        Some("Math")
    );
    assert_eq!(
        materias[0].get("estado").and_then(|v| v.as_str()),
        Some("presente")
    );
}

#[test]
fn matching_statuses_produce_no_output() {
    let workspace = temp_dir("preceptord-discrepancy-clean");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Math",
        &[("Paz", "Ana")],
    );
    let s1 = &seeded.student_ids[0];

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertGeneral",
        json!({ "records": [
            { "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-15", "estado": "presente" },
        ]}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.upsert",
        json!({
            "estudianteId": s1,
            "asignacionId": seeded.asignacion_id,
            "fecha": "2024-03-15",
            "estado": "presente",
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "session.configure",
        json!({ "role": "preceptor" }),
    );

    let flagged = discrepancies_for(
        &mut stdin,
        &mut reader,
        "4",
        &seeded.division_id,
        "2024-03-15",
    );
    assert!(flagged.is_empty(), "agreement is the unreported default");
}

#[test]
fn missing_subject_records_flag_only_non_presente_division_statuses() {
    let workspace = temp_dir("preceptord-discrepancy-missing");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Math",
        &[("Paz", "Ana"), ("Ruiz", "Bruno")],
    );
    let (s1, s2) = (&seeded.student_ids[0], &seeded.student_ids[1]);

    // No subject records at all: s1 ausente is suspicious, s2 presente is not.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertGeneral",
        json!({ "records": [
            { "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-15", "estado": "ausente" },
            { "estudianteId": s2, "divisionId": seeded.division_id, "fecha": "2024-03-15", "estado": "presente" },
        ]}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.configure",
        json!({ "role": "admin" }),
    );

    let flagged = discrepancies_for(
        &mut stdin,
        &mut reader,
        "3",
        &seeded.division_id,
        "2024-03-15",
    );
    assert_eq!(flagged.len(), 1);
    assert_eq!(
        flagged[0].get("estudianteId").and_then(|v| v.as_str()),
        Some(s1.as_str())
    );
    let materias = flagged[0]
        .get("materias")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert!(materias.is_empty(), "no corroborating subject records");
}

#[test]
fn discrepancy_tooling_requires_an_administrative_role() {
    let workspace = temp_dir("preceptord-discrepancy-role");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Math",
        &[("Paz", "Ana")],
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.discrepancies",
        json!({ "divisionId": seeded.division_id, "fecha": "2024-03-15" }),
    );
    assert_eq!(code, "forbidden");
}
