use serde::Serialize;

/// 4.0-scale points for a letter grade. Unknown letters yield `None`.
pub fn grade_points(letter: &str) -> Option<f64> {
    let points = match letter {
        "A" => 4.0,
        "A-" => 3.7,
        "B+" => 3.3,
        "B" => 3.0,
        "B-" => 2.7,
        "C+" => 2.3,
        "C" => 2.0,
        "C-" => 1.7,
        "D+" => 1.3,
        "D" => 1.0,
        "F" => 0.0,
        _ => return None,
    };
    Some(points)
}

/// Letters accepted by `grade_points`, in descending point order.
pub const LETTERS: [&str; 11] = [
    "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D+", "D", "F",
];

/// Half-up 2-decimal rounding used wherever a percentage or GPA is presented.
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedGpa {
    pub gpa: f64,
    pub total_weight: f64,
}

/// `sum(points * weight) / sum(weight)` over (points, weight) pairs.
/// A zero weight sum yields a GPA of 0.0.
pub fn weighted_gpa<I>(entries: I) -> WeightedGpa
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut point_sum = 0.0;
    let mut weight_sum = 0.0;
    for (points, weight) in entries {
        point_sum += points * weight;
        weight_sum += weight;
    }

    let gpa = if weight_sum > 0.0 {
        point_sum / weight_sum
    } else {
        0.0
    };
    WeightedGpa {
        gpa,
        total_weight: weight_sum,
    }
}

/// `present / total * 100`, 0.0 when nothing has been marked.
pub fn attendance_percent(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_off_2_decimals(100.0 * (present as f64) / (total as f64))
}

#[derive(Debug, Clone)]
pub struct CourseGrades {
    pub course_id: String,
    pub code: String,
    pub name: String,
    /// (points, weight) per grade record.
    pub entries: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGpa {
    pub course_id: String,
    pub code: String,
    pub name: String,
    pub gpa: f64,
    pub total_weight: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpaReport {
    pub course_gpas: Vec<CourseGpa>,
    pub overall_gpa: f64,
    pub total_weight: f64,
}

/// Per-course GPA rows plus the overall figure normalized across every
/// weight in every course. Courses without grade records are skipped.
/// Presented values are rounded; the running sums are not.
pub fn gpa_report(courses: Vec<CourseGrades>) -> GpaReport {
    let mut course_gpas = Vec::new();
    let mut point_sum = 0.0;
    let mut weight_sum = 0.0;

    for course in courses {
        if course.entries.is_empty() {
            continue;
        }
        let summary = weighted_gpa(course.entries.iter().copied());
        point_sum += summary.gpa * summary.total_weight;
        weight_sum += summary.total_weight;
        course_gpas.push(CourseGpa {
            course_id: course.course_id,
            code: course.code,
            name: course.name,
            gpa: round_off_2_decimals(summary.gpa),
            total_weight: summary.total_weight,
        });
    }

    let overall = if weight_sum > 0.0 {
        point_sum / weight_sum
    } else {
        0.0
    };
    GpaReport {
        course_gpas,
        overall_gpa: round_off_2_decimals(overall),
        total_weight: weight_sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_points_cover_the_scale() {
        assert_eq!(grade_points("A"), Some(4.0));
        assert_eq!(grade_points("B+"), Some(3.3));
        assert_eq!(grade_points("F"), Some(0.0));
        assert_eq!(grade_points("E"), None);
        assert_eq!(grade_points("a"), None);
        for letter in LETTERS {
            assert!(grade_points(letter).is_some());
        }
    }

    #[test]
    fn weighted_gpa_normalizes_by_weight_sum() {
        // (A, 1.0) and (B+, 3.0): (4.0*1 + 3.3*3) / 4 = 3.475
        let summary = weighted_gpa([(4.0, 1.0), (3.3, 3.0)]);
        assert!((summary.gpa - 3.475).abs() < 1e-9);
        assert!((summary.total_weight - 4.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_gpa_guards_zero_weight() {
        let summary = weighted_gpa([]);
        assert_eq!(summary.gpa, 0.0);
        assert_eq!(summary.total_weight, 0.0);
    }

    #[test]
    fn attendance_percent_rounds_to_two_decimals() {
        assert_eq!(attendance_percent(3, 4), 75.0);
        assert_eq!(attendance_percent(1, 3), 33.33);
        assert_eq!(attendance_percent(2, 3), 66.67);
        assert_eq!(attendance_percent(0, 0), 0.0);
        assert_eq!(attendance_percent(5, 5), 100.0);
    }

    #[test]
    fn round_off_is_half_up() {
        assert_eq!(round_off_2_decimals(0.0), 0.0);
        assert_eq!(round_off_2_decimals(12.342), 12.34);
        assert_eq!(round_off_2_decimals(12.346), 12.35);
        assert_eq!(round_off_2_decimals(89.999), 90.0);
    }

    #[test]
    fn gpa_report_normalizes_across_courses() {
        let report = gpa_report(vec![
            CourseGrades {
                course_id: "c1".into(),
                code: "CS101".into(),
                name: "Programming".into(),
                entries: vec![(4.0, 2.0)],
            },
            CourseGrades {
                course_id: "c2".into(),
                code: "MA201".into(),
                name: "Calculus".into(),
                entries: vec![(2.0, 2.0)],
            },
            CourseGrades {
                course_id: "c3".into(),
                code: "PH101".into(),
                name: "Physics".into(),
                entries: vec![],
            },
        ]);

        assert_eq!(report.course_gpas.len(), 2);
        assert_eq!(report.course_gpas[0].gpa, 4.0);
        assert_eq!(report.course_gpas[1].gpa, 2.0);
        assert_eq!(report.overall_gpa, 3.0);
        assert_eq!(report.total_weight, 4.0);
    }
}
