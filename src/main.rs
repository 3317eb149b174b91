// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_arguments)]

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use locflow::analytics::DateRange;
use locflow::app_config::{AssignmentPolicy, Config, LogLevel};
use locflow::collaborators::{
    InMemoryContentSource, InMemoryTranslatorDirectory, LocalizationPublisher, PublishMetadata,
};
use locflow::database::{DatabaseConnection, Repository};
use locflow::memory::NewMemoryEntry;
use locflow::providers::build_provider;
use locflow::scheduler::AssignmentCriteria;
use locflow::workflow::{Actor, ActorRole, Priority, RequestFilter, RequestStatus};
use locflow::{Collaborators, RequestOptions, ReviewDecision, WorkflowService};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create translation requests for a content item
    Request {
        /// Content item to translate
        content_id: String,

        /// Target language code, repeatable (e.g., 'es', 'fr')
        #[arg(short, long = "target", required = true)]
        targets: Vec<String>,

        /// low, normal, high or urgent
        #[arg(short, long, default_value = "normal")]
        priority: Priority,

        /// RFC 3339 deadline
        #[arg(short, long)]
        deadline: Option<DateTime<Utc>>,

        /// Free-form context for translators
        #[arg(long)]
        context: Option<String>,
    },

    /// Draft a translation from TM, glossary and machine translation
    Resolve { request_id: String },

    /// Assign a translator
    Assign { request_id: String, translator_id: String },

    /// Assign pending requests automatically
    AutoAssign {
        #[arg(short, long)]
        policy: Option<AssignmentPolicy>,

        /// Maximum number of requests to consider
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Submit a translation
    Submit {
        request_id: String,

        /// Translated text
        #[arg(short, long)]
        text: String,
    },

    /// Review, approve or reject a submitted translation
    Review {
        request_id: String,

        #[arg(short, long, default_value = "approve")]
        decision: ReviewDecision,

        /// Score 0-100 applied to every quality dimension
        #[arg(short, long)]
        score: Option<f64>,

        #[arg(short, long)]
        feedback: Option<String>,
    },

    /// Search requests
    Search {
        #[arg(long = "status")]
        statuses: Vec<RequestStatus>,

        #[arg(long)]
        source_language: Option<String>,

        #[arg(long)]
        target_language: Option<String>,

        #[arg(long)]
        translator: Option<String>,

        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: usize,
    },

    /// Print workflow analytics for the last N days
    Analytics {
        #[arg(short, long, default_value_t = 30)]
        days: i64,
    },

    /// Show row counts of the workflow store and TM hit statistics
    Stats,

    /// Translation memory maintenance
    #[command(subcommand)]
    Tm(TmCommands),

    /// Glossary maintenance
    #[command(subcommand)]
    Glossary(GlossaryCommands),

    /// Generate shell completions for locflow
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum TmCommands {
    /// Import a JSON array of TM entries
    Import { path: PathBuf },

    /// Show exact and fuzzy matches for a text
    Lookup {
        text: String,

        #[arg(short, long)]
        source_language: String,

        #[arg(short, long)]
        target_language: String,

        #[arg(long)]
        domain: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum GlossaryCommands {
    /// Import a JSON array of glossary terms
    Import { path: PathBuf },
}

/// locflow - localization workflow engine
///
/// Drives content through translation requests, assignment, review and
/// publication while reusing translation memory and terminology.
#[derive(Parser, Debug)]
#[command(name = "locflow")]
#[command(version)]
#[command(about = "Localization workflow engine")]
#[command(long_about = "locflow manages translation requests from creation to publication.

EXAMPLES:
    locflow request home-page -t es -t fr       # One request per target language
    locflow resolve <REQUEST_ID>                # Draft from TM, glossary and MT
    locflow auto-assign --policy performance    # Assign pending requests
    locflow submit <REQUEST_ID> -t 'Hola'       # Submit a translation
    locflow review <REQUEST_ID> -s 90           # Approve with a score of 90
    locflow analytics --days 7                  # Weekly report
    locflow completions bash > locflow.bash     # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file
    doesn't exist, a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// JSON content catalog
    #[arg(long, default_value = "content.json", global = true)]
    catalog: PathBuf,

    /// JSON translator roster; workloads are written back after changes
    #[arg(long, default_value = "translators.json", global = true)]
    roster: PathBuf,

    /// Directory receiving published translations
    #[arg(long, default_value = "published", global = true)]
    published_dir: PathBuf,

    /// Identifier recorded as the actor of manual operations
    #[arg(long, default_value = "cli", global = true)]
    actor: String,
}

// Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Writes each published translation to `<dir>/<content_id>.<lang>.txt`
struct DirectoryPublisher {
    dir: PathBuf,
}

#[async_trait]
impl LocalizationPublisher for DirectoryPublisher {
    async fn publish(
        &self,
        content_id: &str,
        language: &str,
        translated_text: &str,
        metadata: &PublishMetadata,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.dir.join(format!("{}.{}.txt", content_id, language));
        tokio::fs::write(&path, translated_text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Published {} (request {}) to {}", language, metadata.request_id, path.display());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "locflow", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    }
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    run(cli, config).await
}

async fn run(cli: CommandLineOptions, config: Config) -> Result<()> {
    let db = match &config.database.path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    let repo = Repository::new(db);

    let content = if cli.catalog.exists() {
        InMemoryContentSource::from_json_file(&cli.catalog)?
    } else {
        InMemoryContentSource::new()
    };
    let directory = Arc::new(load_roster(&cli.roster)?);
    let collaborators = Collaborators {
        content: Arc::new(content),
        directory: directory.clone(),
        publisher: Arc::new(DirectoryPublisher {
            dir: cli.published_dir.clone(),
        }),
    };

    let provider = build_provider(&config.provider);
    let service = WorkflowService::open(&config, repo, provider, collaborators).await?;
    let manager = Actor::new(&cli.actor, &cli.actor, ActorRole::Manager);

    match cli.command {
        Commands::Request {
            content_id,
            targets,
            priority,
            deadline,
            context,
        } => {
            let options = RequestOptions {
                priority,
                deadline,
                context,
                ..RequestOptions::default()
            };
            let requests = service
                .request_translation(&content_id, &targets, options, &manager)
                .await?;
            for request in requests {
                println!(
                    "{}\t{} -> {}\t{:.2}h",
                    request.id, request.source_language, request.target_language, request.workflow.estimated_hours
                );
            }
        }
        Commands::Resolve { request_id } => match service.resolve(&request_id).await? {
            Some(proposal) => {
                println!("{} ({}, confidence {:.1})", proposal.text, proposal.method, proposal.confidence);
                for issue in &proposal.issues {
                    warn!("{}", issue);
                }
            }
            None => warn!("Request {} was withdrawn; draft discarded", request_id),
        },
        Commands::Assign {
            request_id,
            translator_id,
        } => {
            service.assign(&request_id, &translator_id, &manager).await?;
            directory.save_json_file(&cli.roster)?;
            println!("{} assigned to {}", request_id, translator_id);
        }
        Commands::AutoAssign { policy, limit } => {
            let criteria = AssignmentCriteria {
                policy,
                limit,
                ..AssignmentCriteria::default()
            };
            let report = service.auto_assign(&criteria).await?;
            directory.save_json_file(&cli.roster)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Submit { request_id, text } => {
            let translator = Actor::new(&cli.actor, &cli.actor, ActorRole::Translator);
            let request = service.submit(&request_id, &text, &translator).await?;
            directory.save_json_file(&cli.roster)?;
            println!("{} {}", request.id, request.status());
        }
        Commands::Review {
            request_id,
            decision,
            score,
            feedback,
        } => {
            let reviewer = Actor::new(&cli.actor, &cli.actor, ActorRole::Reviewer);
            let request = service
                .review(&request_id, decision, score, feedback, &reviewer)
                .await?;
            match request.quality.final_score {
                Some(score) => println!("{} {} (score {:.1})", request.id, request.status(), score),
                None => println!("{} {}", request.id, request.status()),
            }
        }
        Commands::Search {
            statuses,
            source_language,
            target_language,
            translator,
            page,
        } => {
            let filter = RequestFilter {
                statuses,
                source_language,
                target_language,
                translator_id: translator,
                page,
                ..RequestFilter::default()
            };
            let results = service.search_requests(&filter).await?;
            for request in &results.items {
                println!(
                    "{}\t{}\t{} -> {}\t{}\t{}",
                    request.id,
                    request.status(),
                    request.source_language,
                    request.target_language,
                    request.workflow.priority,
                    request.content_id
                );
            }
            println!("page {}/{} ({} total)", results.page + 1, results.total_pages().max(1), results.total);
        }
        Commands::Analytics { days } => {
            if days <= 0 {
                return Err(anyhow!("--days must be positive"));
            }
            let report = service.get_analytics(DateRange::last_days(days, Utc::now())).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Stats => {
            println!("{}", service.repository().connection().stats()?);
            let memory = service.memory_stats();
            for pair in &memory.pairs {
                println!(
                    "{} -> {}\t{} entries ({} verified)",
                    pair.source_language, pair.target_language, pair.entries, pair.verified
                );
            }
            println!("TM evictions: {}", memory.evictions);
        }
        Commands::Tm(TmCommands::Import { path }) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read TM file: {}", path.display()))?;
            let entries: Vec<NewMemoryEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse TM file: {}", path.display()))?;
            let total = entries.len();
            for entry in entries {
                service.resolver().memory().insert(entry).await?;
            }
            println!("Imported {} entries ({} in memory)", total, service.memory_stats().total_entries);
        }
        Commands::Tm(TmCommands::Lookup {
            text,
            source_language,
            target_language,
            domain,
        }) => {
            let memory = service.resolver().memory();
            let settings = memory.config();
            if let Some(hit) = memory.exact_match(&text, &source_language, &target_language, domain.as_deref()) {
                println!("exact\t{}\t{:.1}", hit.target_text, hit.confidence);
            }
            for m in memory.fuzzy_matches(
                &text,
                &source_language,
                &target_language,
                domain.as_deref(),
                settings.fuzzy_min_similarity,
                settings.fuzzy_limit,
            ) {
                println!("{:.2}\t{}\t{}", m.similarity, m.entry.source_text, m.entry.target_text);
            }
        }
        Commands::Glossary(GlossaryCommands::Import { path }) => {
            let count = service.resolver().glossary().import_json_file(&path).await?;
            println!("Imported {} glossary terms", count);
        }
        Commands::Completions { .. } => {}
    }

    service.close();
    Ok(())
}

fn load_roster(path: &Path) -> Result<InMemoryTranslatorDirectory> {
    if path.exists() {
        InMemoryTranslatorDirectory::from_json_file(path)
    } else {
        warn!("Translator roster {} not found; no translators available", path.display());
        Ok(InMemoryTranslatorDirectory::new())
    }
}
