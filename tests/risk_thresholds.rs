
use serde_json::json;
use test_support::{request_ok, seed_division, spawn_sidecar, temp_dir};

#[test]
fn alerts_rank_students_by_absolute_absence_count() {
    let workspace = temp_dir("preceptord-alerts-ranking");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Math",
        &[("Paz", "Ana"), ("Ruiz", "Bruno"), ("Soto", "Clara")],
    );
    let (s1, s2, s3) = (
        &seeded.student_ids[0],
        &seeded.student_ids[1],
        &seeded.student_ids[2],
    );

    // s2 misses three days, s1 one, s3 none.
    let mut records = Vec::new();
    for fecha in ["2024-03-11", "2024-03-12", "2024-03-13"] {
        records.push(json!({ "estudianteId": s2, "divisionId": seeded.division_id, "fecha": fecha, "estado": "ausente" }));
        records.push(json!({ "estudianteId": s3, "divisionId": seeded.division_id, "fecha": fecha, "estado": "presente" }));
    }
    records.push(json!({ "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-11", "estado": "ausente" }));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertGeneral",
        json!({ "records": records }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.alerts",
        json!({ "divisionId": seeded.division_id }),
    );
    let alertas = result
        .get("alertas")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(alertas.len(), 2, "students with zero absences are omitted");
    assert_eq!(
        alertas[0].get("estudianteId").and_then(|v| v.as_str()),
        Some(s2.as_str())
    );
    assert_eq!(alertas[0].get("ausencias").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(
        alertas[1].get("estudianteId").and_then(|v| v.as_str()),
        Some(s1.as_str())
    );
}

#[test]
fn division_risk_list_applies_threshold_and_minimum_sample() {
    let workspace = temp_dir("preceptord-risk-division");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Math",
        &[("Paz", "Ana"), ("Ruiz", "Bruno")],
    );
    let (s1, s2) = (&seeded.student_ids[0], &seeded.student_ids[1]);

    // s1: 2 of 3 present (66%) over three recorded days -> at risk.
    // s2: 1 of 2 present (50%) but only two recorded days -> sparse, excluded.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.upsertGeneral",
        json!({ "records": [
            { "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-11", "estado": "presente" },
            { "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-12", "estado": "presente" },
            { "estudianteId": s1, "divisionId": seeded.division_id, "fecha": "2024-03-13", "estado": "ausente" },
            { "estudianteId": s2, "divisionId": seeded.division_id, "fecha": "2024-03-11", "estado": "presente" },
            { "estudianteId": s2, "divisionId": seeded.division_id, "fecha": "2024-03-12", "estado": "ausente" },
        ]}),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.riskSummary",
        json!({ "divisionId": seeded.division_id }),
    );
    assert_eq!(result.get("umbral").and_then(|v| v.as_f64()), Some(75.0));
    let en_riesgo = result
        .get("enRiesgo")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(en_riesgo.len(), 1);
    assert_eq!(
        en_riesgo[0].get("estudianteId").and_then(|v| v.as_str()),
        Some(s1.as_str())
    );
    let pct = en_riesgo[0]
        .get("porcentaje")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    assert!((pct - 200.0 / 3.0).abs() < 0.01, "got {}", pct);
}

#[test]
fn subject_risk_list_uses_the_lower_minimum_sample() {
    let workspace = temp_dir("preceptord-risk-subject");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let seeded = seed_division(
        &mut stdin,
        &mut reader,
        &workspace,
        "Math",
        &[("Paz", "Ana")],
    );
    let s1 = &seeded.student_ids[0];

    // Two recorded days at 50%: under the division minimum but enough for the
    // per-subject list.
    for (i, (fecha, estado)) in [("2024-03-11", "presente"), ("2024-03-12", "ausente")]
        .iter()
        .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("up-{}", i),
            "attendance.upsert",
            json!({
                "estudianteId": s1,
                "asignacionId": seeded.asignacion_id,
                "fecha": fecha,
                "estado": estado,
            }),
        );
    }

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.riskForAssignment",
        json!({ "asignacionId": seeded.asignacion_id }),
    );
    assert_eq!(result.get("minimoRegistros").and_then(|v| v.as_i64()), Some(2));
    let en_riesgo = result
        .get("enRiesgo")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(en_riesgo.len(), 1);
    assert_eq!(
        en_riesgo[0].get("estudianteId").and_then(|v| v.as_str()),
        Some(s1.as_str())
    );
}
