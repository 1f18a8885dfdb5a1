use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod config;
mod db;
mod mailer;
mod models;
mod score;
mod sheets;
mod transcript;

use config::AppConfig;
use models::StudentRecord;
use score::{MatchPolicy, ReportSpec};

#[derive(Parser)]
#[command(name = "paced-learning-reports")]
#[command(about = "Admin console for tutoring records and reflection score reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored learning records, most recent first
    List,
    /// Render a student's stored conversations to the terminal
    Show {
        #[arg(long)]
        id: i64,
    },
    /// Email a student's full conversation record to their stored address
    Email {
        #[arg(long)]
        id: i64,
    },
    /// Write a student's conversation record as a Markdown file
    Export {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Build a reflection score report for one respondent
    ScoreReport {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Sheet tab holding the cohort responses
        #[arg(long, default_value = "시트1")]
        tab: String,
        /// Question indices to summarize (default: discovered from the header)
        #[arg(long, value_delimiter = ',')]
        questions: Option<Vec<u32>>,
        /// Fail instead of taking the first row when (name, email) is duplicated
        #[arg(long)]
        strict_match: bool,
        /// Write the Markdown report here instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the per-question summary rows as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command {
        Commands::List => {
            let pool = db::connect(&config.database()?).await?;
            let students = db::list_students(&pool).await?;
            if students.is_empty() {
                println!("No stored learning records yet.");
                return Ok(());
            }
            for student in &students {
                println!(
                    "{:>5}  {} <{}>  {}",
                    student.id,
                    student.name,
                    student.email,
                    student.submitted_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Show { id } => {
            let record = load_student(&config, id).await?;
            let sections = transcript::collect_sections(&record);
            if sections.is_empty() {
                println!("No stored conversations for this student yet.");
                return Ok(());
            }
            println!("{} ({}) 학생의 전체 대화 내용", record.name, record.email);
            println!("제출 시각: {}", record.submitted_at.format("%Y-%m-%d %H:%M"));
            for section in &sections {
                println!();
                println!("--- 📚 Domain {} ---", section.index);
                match &section.outcome {
                    Ok(messages) => {
                        for message in messages {
                            match &message.timestamp {
                                Some(stamp) => {
                                    println!("{} {} ({stamp})", message.emoji, message.role.label())
                                }
                                None => println!("{} {}", message.emoji, message.role.label()),
                            }
                            println!("{}", message.content);
                            println!();
                        }
                    }
                    Err(reason) => println!("오류: {reason}"),
                }
            }
        }
        Commands::Email { id } => {
            let record = load_student(&config, id).await?;
            let rendered = transcript::format(&record);
            if !rendered.has_content {
                println!("No stored conversations for this student yet; nothing to send.");
                return Ok(());
            }
            let mailer = mailer::Mailer::new(&config.mail()?)?;
            mailer.send(&record.email, &record.name, rendered.html).await?;
            println!("Sent the full conversation record to {}.", record.email);
        }
        Commands::Export { id, out } => {
            let record = load_student(&config, id).await?;
            let rendered = transcript::format(&record);
            if !rendered.has_content {
                println!("No stored conversations for this student yet; nothing to export.");
                return Ok(());
            }
            let path = out.join(transcript::download_file_name(&record.name));
            std::fs::write(&path, rendered.markdown.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Conversation record written to {}.", path.display());
        }
        Commands::ScoreReport {
            name,
            email,
            tab,
            questions,
            strict_match,
            out,
            csv,
        } => {
            let client = sheets::SheetsClient::new(config.sheets()?);
            let table = client.fetch_cohort(&tab).await?;
            let spec = match questions {
                Some(indices) => ReportSpec::new(indices),
                None => ReportSpec::discover(&table),
            };
            let policy = if strict_match {
                MatchPolicy::Reject
            } else {
                MatchPolicy::FirstMatch
            };
            let report = score::build_report(&table, &name, &email, &spec, policy)?;
            let markdown = score::render_markdown(&report);

            match out {
                Some(path) => {
                    std::fs::write(&path, &markdown)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Score report written to {}.", path.display());
                }
                None => print!("{markdown}"),
            }
            if let Some(path) = csv {
                score::write_summary_csv(&report, &path)?;
                println!("Summary rows written to {}.", path.display());
            }
        }
    }

    Ok(())
}

async fn load_student(config: &AppConfig, id: i64) -> anyhow::Result<StudentRecord> {
    let pool = db::connect(&config.database()?).await?;
    let record = db::fetch_student(&pool, id).await?;
    record.with_context(|| format!("no learning record with id {id}"))
}
