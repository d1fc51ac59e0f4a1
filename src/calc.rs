use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::db::JoinedMark;

/// Grades in report order, best first.
pub const GRADE_ORDER: [&str; 6] = ["A+", "A", "B", "C", "D", "F"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p75: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub roll_no: String,
    pub name: String,
    pub average: f64,
    pub total: f64,
    pub grade: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject: String,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBucket {
    pub grade: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMatrix {
    pub roll_nos: Vec<String>,
    pub subjects: Vec<String>,
    /// Row-major over `roll_nos` x `subjects`. `None` where the student
    /// has no mark in that subject; duplicates collapse to their mean.
    pub cells: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSeries {
    pub subject: String,
    pub marks: Vec<f64>,
}

/// Letter grade for a student average. Thresholds are inclusive at the
/// lower bound, so 90.0 is already an A+ and 49.999 is still an F.
pub fn letter_grade(average: f64) -> &'static str {
    if average >= 90.0 {
        "A+"
    } else if average >= 80.0 {
        "A"
    } else if average >= 70.0 {
        "B"
    } else if average >= 60.0 {
        "C"
    } else if average >= 50.0 {
        "D"
    } else {
        "F"
    }
}

pub fn overall_stats(values: &[f64]) -> Option<OverallStats> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let count = sorted.len();
    let mean = mean(&sorted);
    Some(OverallStats {
        count,
        mean,
        median: median_of_sorted(&sorted),
        std_dev: population_std_dev(&sorted, mean),
        min: sorted[0],
        max: sorted[count - 1],
        p25: percentile_of_sorted(&sorted, 25.0),
        p75: percentile_of_sorted(&sorted, 75.0),
    })
}

/// Per-student rollup, ordered by roll number.
pub fn student_summaries(rows: &[JoinedMark]) -> Vec<StudentSummary> {
    let mut by_student: BTreeMap<&str, (&str, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        let entry = by_student
            .entry(row.roll_no.as_str())
            .or_insert_with(|| (row.name.as_str(), Vec::new()));
        entry.1.push(row.marks);
    }
    by_student
        .into_iter()
        .map(|(roll_no, (name, marks))| {
            let average = mean(&marks);
            StudentSummary {
                roll_no: roll_no.to_string(),
                name: name.to_string(),
                average,
                total: marks.iter().sum(),
                grade: letter_grade(average),
            }
        })
        .collect()
}

/// Per-subject rollup, ordered by subject name.
pub fn subject_summaries(rows: &[JoinedMark]) -> Vec<SubjectSummary> {
    let mut by_subject: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        by_subject
            .entry(row.subject.as_str())
            .or_default()
            .push(row.marks);
    }
    by_subject
        .into_iter()
        .map(|(subject, marks)| {
            let mean = mean(&marks);
            let (min, max) = min_max(&marks);
            SubjectSummary {
                subject: subject.to_string(),
                mean,
                std_dev: population_std_dev(&marks, mean),
                min,
                max,
            }
        })
        .collect()
}

/// Counts students per letter grade of their average. Buckets with no
/// students are omitted; the rest keep `GRADE_ORDER`.
pub fn grade_distribution(rows: &[JoinedMark]) -> Vec<GradeBucket> {
    let summaries = student_summaries(rows);
    let mut buckets = Vec::new();
    for grade in GRADE_ORDER {
        let count = summaries.iter().filter(|s| s.grade == grade).count();
        if count > 0 {
            buckets.push(GradeBucket { grade, count });
        }
    }
    buckets
}

pub fn performance_matrix(rows: &[JoinedMark]) -> PerformanceMatrix {
    let mut roll_nos: BTreeSet<&str> = BTreeSet::new();
    let mut subjects: BTreeSet<&str> = BTreeSet::new();
    let mut cell_marks: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
    for row in rows {
        roll_nos.insert(row.roll_no.as_str());
        subjects.insert(row.subject.as_str());
        cell_marks
            .entry((row.roll_no.as_str(), row.subject.as_str()))
            .or_default()
            .push(row.marks);
    }
    let cells = roll_nos
        .iter()
        .map(|roll_no| {
            subjects
                .iter()
                .map(|subject| cell_marks.get(&(*roll_no, *subject)).map(|m| mean(m)))
                .collect()
        })
        .collect();
    PerformanceMatrix {
        roll_nos: roll_nos.into_iter().map(str::to_string).collect(),
        subjects: subjects.into_iter().map(str::to_string).collect(),
        cells,
    }
}

/// Raw mark lists per subject, ordered by subject name. Feeds
/// distribution-style charts that need every sample, not a rollup.
pub fn subject_mark_series(rows: &[JoinedMark]) -> Vec<SubjectSeries> {
    let mut by_subject: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        by_subject
            .entry(row.subject.as_str())
            .or_default()
            .push(row.marks);
    }
    by_subject
        .into_iter()
        .map(|(subject, marks)| SubjectSeries {
            subject: subject.to_string(),
            marks,
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Population standard deviation (divide by n, not n-1).
fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Percentile of an ascending-sorted sample by linear interpolation
/// between closest ranks, `r = p/100 * (n-1)`.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * ((sorted.len() - 1) as f64);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values {
        if v < min {
            min = v;
        }
        if v > max {
            max = v;
        }
    }
    (min, max)
}
