use std::fmt::Write;
use std::path::Path;

use thiserror::Error;

use crate::models::{CohortTable, DistributionSeries, FiveNumber, ScoreReport, SummaryRow};

pub const NAME_COLUMN: &str = "이름";
pub const EMAIL_COLUMN: &str = "이메일";
pub const OVERALL_COLUMN: &str = "총점";

#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
    #[error("no respondent named {name} <{email}> in the cohort sheet")]
    NotFound { name: String, email: String },
    #[error("{count} rows match {name} <{email}>; fix the sheet or drop --strict-match to take the first row")]
    Ambiguous {
        name: String,
        email: String,
        count: usize,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ReportError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("expected column \"{0}\" is missing from the cohort sheet")]
    MissingColumn(String),
}

/// What to do when more than one row carries the same (name, email) pair.
/// The sheet enforces no uniqueness, so neither choice is guessed silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    #[default]
    FirstMatch,
    Reject,
}

#[derive(Debug, Clone)]
pub struct ReportSpec {
    pub question_indices: Vec<u32>,
}

impl ReportSpec {
    pub fn new(question_indices: Vec<u32>) -> Self {
        Self { question_indices }
    }

    /// Reads the question set off the header row: every "{i} 점수" column
    /// contributes its index.
    pub fn discover(table: &CohortTable) -> Self {
        let mut indices: Vec<u32> = table
            .columns()
            .iter()
            .filter_map(|column| column.trim().strip_suffix(" 점수"))
            .filter_map(|prefix| prefix.trim().parse().ok())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        Self::new(indices)
    }

    pub fn score_columns(&self) -> Vec<String> {
        let mut columns = vec![OVERALL_COLUMN.to_string()];
        columns.extend(self.question_indices.iter().map(score_column));
        columns
    }
}

fn score_column(index: &u32) -> String {
    format!("{index} 점수")
}

fn rationale_column(index: u32) -> String {
    format!("{index} 근거")
}

pub fn build_report(
    table: &CohortTable,
    name: &str,
    email: &str,
    spec: &ReportSpec,
    policy: MatchPolicy,
) -> Result<ScoreReport, ReportError> {
    let name = name.trim();
    let email = email.trim();

    let name_col = require_column(table, NAME_COLUMN)?;
    let email_col = require_column(table, EMAIL_COLUMN)?;

    let matches: Vec<usize> = (0..table.row_count())
        .filter(|&row| {
            table.cell(row, name_col).trim() == name && table.cell(row, email_col).trim() == email
        })
        .collect();

    if matches.is_empty() {
        return Err(LookupError::NotFound {
            name: name.to_string(),
            email: email.to_string(),
        }
        .into());
    }
    if matches.len() > 1 && policy == MatchPolicy::Reject {
        return Err(LookupError::Ambiguous {
            name: name.to_string(),
            email: email.to_string(),
            count: matches.len(),
        }
        .into());
    }
    let row = matches[0];

    let mut distributions = Vec::new();
    for column in spec.score_columns() {
        let col = require_column(table, &column)?;
        let values: Vec<f64> = (0..table.row_count())
            .filter_map(|r| parse_score(table.cell(r, col)))
            .collect();
        distributions.push(DistributionSeries {
            respondent: parse_score(table.cell(row, col)),
            summary: five_number_summary(&values),
            values,
            column,
        });
    }

    let mut summary_rows = Vec::new();
    for &question in &spec.question_indices {
        let score_col = require_column(table, &score_column(&question))?;
        let answer_col = require_column(table, &question.to_string())?;
        let rationale_col = require_column(table, &rationale_column(question))?;
        summary_rows.push(SummaryRow {
            question,
            label: format!("문항 {question}"),
            score: parse_score(table.cell(row, score_col)),
            answer: table.cell(row, answer_col).trim().to_string(),
            rationale: table.cell(row, rationale_col).trim().to_string(),
        });
    }

    Ok(ScoreReport {
        respondent_name: table.cell(row, name_col).trim().to_string(),
        respondent_email: table.cell(row, email_col).trim().to_string(),
        distributions,
        summary_rows,
    })
}

fn require_column(table: &CohortTable, name: &str) -> Result<usize, ReportError> {
    table
        .column_index(name)
        .ok_or_else(|| ReportError::MissingColumn(name.to_string()))
}

/// Cells that do not parse as numbers count as missing, never as faults.
fn parse_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}

pub fn five_number_summary(values: &[f64]) -> Option<FiveNumber> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let median_value = median(&sorted);
    let lower = &sorted[..n / 2];
    let upper = &sorted[n / 2 + n % 2..];
    Some(FiveNumber {
        min: sorted[0],
        q1: if lower.is_empty() {
            median_value
        } else {
            median(lower)
        },
        median: median_value,
        q3: if upper.is_empty() {
            median_value
        } else {
            median(upper)
        },
        max: sorted[n - 1],
    })
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

pub fn render_markdown(report: &ScoreReport) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "# {} ({}) 성찰 점수 리포트",
        report.respondent_name, report.respondent_email
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## 점수 분포");

    for series in &report.distributions {
        match series.summary {
            Some(summary) => {
                let point = match series.respondent {
                    Some(value) => format!("{value:.1}"),
                    None => "응답 없음".to_string(),
                };
                let _ = writeln!(
                    output,
                    "- {}: 본인 {point} | 최소 {:.1} · Q1 {:.1} · 중앙값 {:.1} · Q3 {:.1} · 최대 {:.1} (응답 {}명)",
                    series.column,
                    summary.min,
                    summary.q1,
                    summary.median,
                    summary.q3,
                    summary.max,
                    series.values.len()
                );
            }
            None => {
                let _ = writeln!(output, "- {}: 수치 응답이 없습니다.", series.column);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## 문항별 요약");

    for row in &report.summary_rows {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {}", row.label);
        match row.score {
            Some(score) => {
                let _ = writeln!(output, "- 점수: {score:.1}");
            }
            None => {
                let _ = writeln!(output, "- 점수: 응답 없음");
            }
        }
        let _ = writeln!(output, "- 응답: {}", row.answer);
        let _ = writeln!(output, "- 근거: {}", row.rationale);
    }

    output
}

pub fn write_summary_csv(report: &ScoreReport, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in &report.summary_rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
