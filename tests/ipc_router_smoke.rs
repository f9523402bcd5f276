
use serde_json::json;
use test_support::{request, request_ok, seed_division, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("preceptord-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("online").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(health.get("role").and_then(|v| v.as_str()), Some("docente"));

    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Historia",
        &[("Paz", "Ana")],
    );
    let s1 = &seeded.student_ids[0];

    let _ = request_ok(&mut stdin, &mut reader, "2", "divisions.list", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assignments.list",
        json!({ "divisionId": seeded.division_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.list",
        json!({ "divisionId": seeded.division_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.upsert",
        json!({
            "estudianteId": s1,
            "asignacionId": seeded.asignacion_id,
            "fecha": "2024-03-15",
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "queue.enqueue",
        json!({ "tipo": "general", "records": [
            { "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-15" },
        ]}),
    );
    let _ = request_ok(&mut stdin, &mut reader, "7", "queue.pending", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "8", "queue.flush", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "network.setStatus",
        json!({ "online": true }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "10", "cache.refresh", json!({}));
    let _ = request_ok(&mut stdin, &mut reader, "11", "cache.status", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "session.configure",
        json!({ "role": "admin" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "attendance.massJustify",
        json!({ "studentIds": [s1], "startDate": "2024-03-15", "endDate": "2024-03-15" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "attendance.discrepancies",
        json!({ "divisionId": seeded.division_id, "fecha": "2024-03-15" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "attendance.alerts",
        json!({ "divisionId": seeded.division_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "attendance.riskSummary",
        json!({ "divisionId": seeded.division_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "attendance.riskForAssignment",
        json!({ "asignacionId": seeded.asignacion_id }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "18", "audit.list", json!({}));

    let unknown = request(&mut stdin, &mut reader, "19", "no.such.method", json!({}));
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}
