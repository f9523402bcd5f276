use serde::Serialize;

/// Attendance percentage below which a student is flagged at risk.
pub const RISK_THRESHOLD_PCT: f64 = 75.0;
/// Minimum recorded days before the division-wide percentage is trusted.
pub const MIN_SAMPLE_DIVISION: i64 = 3;
/// Minimum recorded days for the per-subject variant.
pub const MIN_SAMPLE_SUBJECT: i64 = 2;

/// Per-student tallies over one ledger scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttendanceCounts {
    pub presente: i64,
    pub ausente: i64,
    pub tarde: i64,
    pub justificado: i64,
}

impl AttendanceCounts {
    pub fn add(&mut self, estado: &str) {
        match estado {
            "presente" => self.presente += 1,
            "ausente" => self.ausente += 1,
            "tarde" => self.tarde += 1,
            "justificado" => self.justificado += 1,
            _ => {}
        }
    }

    pub fn total(&self) -> i64 {
        self.presente + self.ausente + self.tarde + self.justificado
    }
}

/// Attendance percentage: present-or-late over all recorded days. Justified
/// absences still count against the percentage; they are excused, not erased.
pub fn attendance_percent(counts: &AttendanceCounts) -> f64 {
    let total = counts.total();
    if total == 0 {
        return 0.0;
    }
    100.0 * (counts.presente + counts.tarde) as f64 / total as f64
}

/// A student is at risk when the percentage falls below the threshold and
/// enough days are recorded to rule out sparse-data false positives.
pub fn is_at_risk(counts: &AttendanceCounts, min_sample: i64) -> bool {
    counts.total() >= min_sample && attendance_percent(counts) < RISK_THRESHOLD_PCT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(presente: i64, ausente: i64, tarde: i64, justificado: i64) -> AttendanceCounts {
        AttendanceCounts {
            presente,
            ausente,
            tarde,
            justificado,
        }
    }

    #[test]
    fn percent_counts_late_as_attended() {
        let c = counts(2, 1, 1, 0);
        assert!((attendance_percent(&c) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn percent_of_empty_history_is_zero() {
        assert_eq!(attendance_percent(&AttendanceCounts::default()), 0.0);
    }

    #[test]
    fn two_of_three_present_is_at_risk_division_wide() {
        // 66.7% with three recorded days: below the 75% threshold.
        let c = counts(2, 1, 0, 0);
        assert!(is_at_risk(&c, MIN_SAMPLE_DIVISION));
    }

    #[test]
    fn sparse_history_is_never_flagged() {
        // 50% but only two recorded days: under the division minimum sample.
        let c = counts(1, 1, 0, 0);
        assert!(!is_at_risk(&c, MIN_SAMPLE_DIVISION));
        // The same history clears the per-subject minimum and is flagged.
        assert!(is_at_risk(&c, MIN_SAMPLE_SUBJECT));
    }

    #[test]
    fn exactly_threshold_is_not_at_risk() {
        // 3 of 4 = 75%: not strictly below the threshold.
        let c = counts(3, 1, 0, 0);
        assert!(!is_at_risk(&c, MIN_SAMPLE_DIVISION));
    }

    #[test]
    fn justified_days_still_lower_the_percentage() {
        let c = counts(2, 0, 0, 2);
        assert!((attendance_percent(&c) - 50.0).abs() < 1e-9);
        assert!(is_at_risk(&c, MIN_SAMPLE_DIVISION));
    }
}
