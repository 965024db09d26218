//! Scrapetrack CLI - record and inspect scrape jobs, pages and logs

mod config;
mod logging;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rust_decimal::Decimal;
use scrapetrack_core::application::{
    CreateJobRequest, InsertLogRequest, InsertPageRequest, ScrapeLedger, UpdateJobRequest,
};
use scrapetrack_core::domain::{JobStatus, LogLevel, Principal};
use scrapetrack_core::port::id_provider::UuidProvider;
use scrapetrack_core::port::time_provider::SystemTimeProvider;
use scrapetrack_infra_sqlite::{
    create_pool, current_schema_version, latest_schema_version, run_migrations,
    SqliteJobRepository, SqliteLogRepository, SqlitePageRepository, SqlitePolicyRepository,
    SqlitePool,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::Table;
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::output::{colored_status, log_line, or_dash, render_tree, JobRow, PageRow, StatusRow};

#[derive(Parser)]
#[command(name = "scrapetrack")]
#[command(about = "Scrape job ledger: jobs, scraped pages and job logs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Extra TOML config file layered over ./scrapetrack.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides config)
    #[arg(long, global = true, env = "SCRAPETRACK_DB_PATH")]
    db: Option<String>,

    /// Act as this authenticated user
    #[arg(long, global = true)]
    user: Option<String>,

    /// Act as the service role (bypasses row-level security)
    #[arg(long, global = true, env = "SCRAPETRACK_SERVICE_KEY", hide_env_values = true)]
    service_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    Migrate,

    /// Show database location, schema version and job counts
    Status,

    /// Research jobs
    #[command(subcommand)]
    Job(JobCommand),

    /// Scraped pages
    #[command(subcommand)]
    Page(PageCommand),

    /// Job logs
    #[command(subcommand)]
    Log(LogCommand),
}

#[derive(Subcommand)]
enum JobCommand {
    /// Start a new job (status in_progress)
    Create {
        /// Research query
        #[arg(short, long)]
        query: Option<String>,

        #[arg(long)]
        agent: Option<String>,

        #[arg(long)]
        role: Option<String>,

        #[arg(long)]
        report_type: Option<String>,

        /// Parent job for sub-queries
        #[arg(short, long)]
        parent: Option<String>,

        /// Additional info as a JSON object
        #[arg(long)]
        info: Option<String>,
    },

    /// Record a job's outcome
    Finish {
        job_id: String,

        /// New status (completed, failed, cancelled, ...)
        #[arg(short, long, default_value = JobStatus::COMPLETED)]
        status: String,

        /// Total research cost (replaces the accumulated value)
        #[arg(long)]
        cost: Option<Decimal>,

        /// Visited URL (repeatable; replaces the recorded list)
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Report text
        #[arg(long, conflicts_with = "report_file")]
        report: Option<String>,

        /// Read the report from a file
        #[arg(long)]
        report_file: Option<PathBuf>,

        /// Error message (omitted clears any previous one)
        #[arg(long)]
        error: Option<String>,
    },

    /// Show one job
    Show { job_id: String },

    /// Show a job and all of its sub-jobs
    Tree { job_id: String },

    /// List recent jobs
    List {
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },

    /// Add to a job's research cost
    Cost { job_id: String, delta: Decimal },

    /// Record visited URLs
    Visit {
        job_id: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Delete a job (service role only)
    Delete { job_id: String },
}

#[derive(Subcommand)]
enum PageCommand {
    /// Store a scraped page
    Add {
        job_id: String,
        url: String,

        #[arg(short, long)]
        title: Option<String>,

        /// Page content
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,

        /// Read page content from a file
        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },

    /// List pages of a job, or every capture of a URL
    List {
        #[arg(required_unless_present = "url")]
        job_id: Option<String>,

        #[arg(long, conflicts_with = "job_id")]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
enum LogCommand {
    /// Append a log line to a job
    Add {
        job_id: String,
        message: String,

        #[arg(short, long, default_value = "info")]
        level: LogLevel,

        /// Details as a JSON object
        #[arg(long)]
        details: Option<String>,
    },

    /// Show a job's log
    List {
        job_id: String,

        /// Only this level
        #[arg(short, long)]
        level: Option<LogLevel>,

        /// Number of lines to tail
        #[arg(short = 'n', long)]
        lines: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = LedgerConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        cfg.db_path = shellexpand::tilde(db).into_owned();
    }

    logging::init(&cfg.log_format)?;
    debug!(db_path = %cfg.db_path, "Configuration loaded");

    let principal = cfg.resolve_principal(cli.user.as_deref(), cli.service_key.as_deref())?;
    let pool = open_database(&cfg).await?;

    match cli.command {
        Commands::Migrate => {
            println!("{}", "✓ Schema up to date".green().bold());
            println!(
                "  {} {}",
                "Version:".bold(),
                current_schema_version(&pool).await?
            );
            println!("  {} {}", "Database:".bold(), cfg.db_path);
        }
        Commands::Status => {
            let ledger = build_ledger(pool.clone()).await?;
            let summary = ledger.summary(&principal).await?;

            println!("{}", "Scrapetrack Status".cyan().bold());
            println!();
            println!("  {} {}", "Database:".bold(), cfg.db_path);
            println!(
                "  {} {}/{}",
                "Schema:".bold(),
                current_schema_version(&pool).await?,
                latest_schema_version()
            );
            println!("  {} {}", "Acting as:".bold(), principal);
            println!("  {} {}", "Total Jobs:".bold(), summary.total_jobs);
            println!();

            let rows: Vec<StatusRow> = summary
                .by_status
                .into_iter()
                .map(|(status, jobs)| StatusRow { status, jobs })
                .collect();
            if !rows.is_empty() {
                println!("{}", Table::new(rows));
            }
        }
        Commands::Job(cmd) => {
            let ledger = build_ledger(pool).await?;
            run_job_command(&ledger, &principal, cmd).await?;
        }
        Commands::Page(cmd) => {
            let ledger = build_ledger(pool).await?;
            run_page_command(&ledger, &principal, cmd).await?;
        }
        Commands::Log(cmd) => {
            let ledger = build_ledger(pool).await?;
            run_log_command(&ledger, &principal, cmd).await?;
        }
    }

    Ok(())
}

/// Open the database, creating its directory and schema when missing
async fn open_database(cfg: &LedgerConfig) -> Result<SqlitePool> {
    if !cfg.is_in_memory() {
        if let Some(dir) = Path::new(&cfg.db_path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }
    }

    info!(db_path = %cfg.db_path, "Opening ledger database");
    let pool = create_pool(&cfg.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;
    Ok(pool)
}

async fn build_ledger(pool: SqlitePool) -> Result<ScrapeLedger> {
    let policies = SqlitePolicyRepository::new(pool.clone());
    let ledger = ScrapeLedger::load(
        Arc::new(SqliteJobRepository::new(pool.clone())),
        Arc::new(SqlitePageRepository::new(pool.clone())),
        Arc::new(SqliteLogRepository::new(pool)),
        &policies,
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
    )
    .await
    .context("Failed to load access policies")?;
    Ok(ledger)
}

async fn run_job_command(
    ledger: &ScrapeLedger,
    principal: &Principal,
    cmd: JobCommand,
) -> Result<()> {
    match cmd {
        JobCommand::Create {
            query,
            agent,
            role,
            report_type,
            parent,
            info,
        } => {
            let req = CreateJobRequest {
                query,
                agent,
                role,
                report_type,
                parent_job_id: parent,
                additional_info: parse_json_arg("--info", info.as_deref())?,
            };
            let job_id = ledger.create_job(principal, req).await?;
            println!("{}", "✓ Job created".green().bold());
            println!("{}", job_id);
        }

        JobCommand::Finish {
            job_id,
            status,
            cost,
            urls,
            report,
            report_file,
            error,
        } => {
            let report = match report_file {
                Some(path) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => report,
            };

            let mut req = UpdateJobRequest::new(job_id, status);
            req.research_costs = cost;
            req.visited_urls = if urls.is_empty() { None } else { Some(urls) };
            req.report = report;
            req.error_message = error;

            let job = ledger.update_job(principal, req).await?;
            println!(
                "{} {} is now {}",
                "✓".green().bold(),
                job.id,
                colored_status(job.status.as_str())
            );
        }

        JobCommand::Show { job_id } => {
            let Some(job) = ledger.get_job(principal, &job_id).await? else {
                bail!("Job {} not found", job_id);
            };

            println!("{}", Table::new([JobRow::from(&job)]));
            println!();
            println!("  {} {}", "Agent:".bold(), or_dash(job.agent.as_deref()));
            println!("  {} {}", "Role:".bold(), or_dash(job.role.as_deref()));
            println!(
                "  {} {}",
                "Report type:".bold(),
                or_dash(job.report_type.as_deref())
            );
            if let Some(error) = &job.error_message {
                println!("  {} {}", "Error:".bold(), error.red());
            }
            if !job.additional_info.is_empty() {
                println!(
                    "  {} {}",
                    "Info:".bold(),
                    serde_json::to_string(&job.additional_info)?
                );
            }
            for url in &job.visited_urls {
                println!("  {} {}", "•".bold(), url);
            }
            if let Some(report) = &job.report {
                println!();
                println!("{}", report);
            }
        }

        JobCommand::Tree { job_id } => {
            let tree = ledger.get_job_tree(principal, &job_id).await?;
            print!("{}", render_tree(&tree));
            println!();
            println!(
                "  {} jobs, {} total cost",
                tree.size(),
                tree.total_cost()
            );
        }

        JobCommand::List { status, limit } => {
            let status = status.map(JobStatus::new).transpose()?;
            let jobs = ledger.list_jobs(principal, status.as_ref(), limit).await?;
            if jobs.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                println!("{}", Table::new(jobs.iter().map(JobRow::from)));
            }
        }

        JobCommand::Cost { job_id, delta } => {
            let total = ledger.add_cost(principal, &job_id, delta).await?;
            println!("{} {} research cost: {}", "✓".green().bold(), job_id, total);
        }

        JobCommand::Visit { job_id, urls } => {
            let visited = ledger.record_visited_urls(principal, &job_id, &urls).await?;
            println!(
                "{} {} has {} visited URLs",
                "✓".green().bold(),
                job_id,
                visited.len()
            );
        }

        JobCommand::Delete { job_id } => {
            ledger.delete_job(principal, &job_id).await?;
            println!("{}", format!("✓ Job {} deleted", job_id).green().bold());
        }
    }

    Ok(())
}

async fn run_page_command(
    ledger: &ScrapeLedger,
    principal: &Principal,
    cmd: PageCommand,
) -> Result<()> {
    match cmd {
        PageCommand::Add {
            job_id,
            url,
            title,
            content,
            content_file,
            metadata,
        } => {
            let content = match content_file {
                Some(path) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => content,
            };

            let req = InsertPageRequest {
                job_id,
                url,
                title,
                content,
                metadata: parse_json_arg("--metadata", metadata.as_deref())?,
            };
            let page = ledger.insert_page(principal, req).await?;
            println!("{}", "✓ Page stored".green().bold());
            println!("{}", page.id);
        }

        PageCommand::List { job_id, url } => {
            let pages = match (job_id, url) {
                (_, Some(url)) => ledger.find_pages_by_url(principal, &url).await?,
                (Some(job_id), None) => ledger.get_pages(principal, &job_id).await?,
                (None, None) => bail!("Either a job id or --url is required"),
            };
            if pages.is_empty() {
                println!("{}", "No pages".yellow());
            } else {
                println!("{}", Table::new(pages.iter().map(PageRow::from)));
            }
        }
    }

    Ok(())
}

async fn run_log_command(
    ledger: &ScrapeLedger,
    principal: &Principal,
    cmd: LogCommand,
) -> Result<()> {
    match cmd {
        LogCommand::Add {
            job_id,
            message,
            level,
            details,
        } => {
            let req = InsertLogRequest {
                job_id,
                level,
                message,
                details: parse_json_arg("--details", details.as_deref())?,
            };
            let entry = ledger.insert_log(principal, req).await?;
            println!("{}", log_line(&entry));
        }

        LogCommand::List {
            job_id,
            level,
            lines,
        } => {
            let entries = ledger.get_logs(principal, &job_id, level, lines).await?;
            if entries.is_empty() {
                println!("{}", "No logs available".yellow());
            } else {
                println!("{}", format!("Logs for job {}:", job_id).cyan().bold());
                for entry in &entries {
                    println!("{}", log_line(entry));
                }
            }
        }
    }

    Ok(())
}

fn parse_json_arg(flag: &str, raw: Option<&str>) -> Result<Option<serde_json::Value>> {
    raw.map(|s| serde_json::from_str(s).with_context(|| format!("Invalid JSON in {}", flag)))
        .transpose()
}
