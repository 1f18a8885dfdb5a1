use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct StudentSummary {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub submitted_at: NaiveDateTime,
    pub domain_1: Option<String>,
    pub domain_2: Option<String>,
    pub domain_3: Option<String>,
    pub domain_4: Option<String>,
    pub domain_5: Option<String>,
    pub domain_6: Option<String>,
}

impl StudentRecord {
    pub fn domain_slots(&self) -> [Option<&str>; 6] {
        [
            self.domain_1.as_deref(),
            self.domain_2.as_deref(),
            self.domain_3.as_deref(),
            self.domain_4.as_deref(),
            self.domain_5.as_deref(),
            self.domain_6.as_deref(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn emoji(self) -> &'static str {
        match self {
            MessageRole::User => "🧑‍🎓",
            _ => "🤖",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MessageRole::System => "System",
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub role: MessageRole,
    pub emoji: &'static str,
    pub timestamp: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct DomainSection {
    pub index: usize,
    pub outcome: Result<Vec<RenderedMessage>, String>,
}

#[derive(Debug, Clone)]
pub struct RenderedTranscript {
    pub html: String,
    pub markdown: String,
    pub has_content: bool,
}

/// Rectangular cohort sheet keyed by its header row. Rows are padded to the
/// header width so cell access never goes out of bounds.
#[derive(Debug, Clone, Default)]
pub struct CohortTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl CohortTable {
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<String>>) -> Self {
        for row in &mut rows {
            row.resize(columns.len(), String::new());
        }
        let index = columns
            .iter()
            .enumerate()
            .map(|(position, column)| (column.trim().to_string(), position))
            .collect();
        Self {
            columns,
            index,
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name.trim()).copied()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiveNumber {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct DistributionSeries {
    pub column: String,
    pub values: Vec<f64>,
    pub summary: Option<FiveNumber>,
    pub respondent: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub question: u32,
    pub label: String,
    pub score: Option<f64>,
    pub answer: String,
    pub rationale: String,
}

#[derive(Debug, Clone)]
pub struct ScoreReport {
    pub respondent_name: String,
    pub respondent_email: String,
    pub distributions: Vec<DistributionSeries>,
    pub summary_rows: Vec<SummaryRow>,
}
