//! Binary entry point for `helios`.
//!
//! This module provides the command-line interface for helios with options
//! for configuration file paths and logging verbosity. By default it serves
//! the web UI; subcommands run single interactions from the terminal.

use clap::{Parser, Subcommand};
use helios::{
    check::check_config,
    interaction::{process_query, tickets},
    prelude::*,
    runtime::Runtime,
};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Helios – project status from Jira and meeting notes.
///
/// Configuration can come from `.env`, environment variables, or
/// `.hidden/config.toml`.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, helios will look for a config file at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the web UI (the default).
    Serve {
        /// Override the bind address, e.g. `0.0.0.0:8501`.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Report which settings are configured, without contacting any service.
    Check,
    /// Ask a question about a project.
    Ask {
        /// The question, e.g. "What is the status of Project ABC?".
        query: String,
        /// Project key, if it is not mentioned in the question.
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Summarize an issue and its recent comments.
    Issue {
        /// Issue key, e.g. `ABC-123`.
        key: String,
        /// Post the summary back to the issue as a comment.
        #[arg(long)]
        comment: bool,
    },
    /// Extract action items from a meeting document and suggest tickets.
    Actions {
        /// Google Docs document id.
        document_id: String,
        /// Create the suggested tickets in this project.
        #[arg(long, value_name = "PROJECT")]
        create: Option<String>,
    },
}

/// Main entry point for the helios binary.
///
/// Sets up logging based on verbosity, loads configuration, and runs the command.
#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Load `.env` before anything reads the environment.

    let dotenv = dotenvy::dotenv().ok();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::CLOSE);

    // Prepare the otlp layer, only when a collector is configured.

    let otel = if std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("helios");
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let config = Config::load(args.config.as_deref())?;

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let config = match bind {
                Some(bind_address) => {
                    let mut inner = (*config.inner).clone();
                    inner.bind_address = bind_address;
                    Config::from(inner)
                }
                None => config,
            };

            helios::start(config).await
        }
        Command::Check => {
            let report = check_config(&config);
            print!("{report}");

            if report.is_ok() { Ok(()) } else { Result::Err(anyhow!("configuration has {} issue(s)", report.issues.len())) }
        }
        Command::Ask { query, project } => {
            let runtime = Runtime::new(config).await?;
            print_warnings(&runtime);

            let outcome = process_query(&runtime, &query, project.as_deref()).await;
            println!("{}", outcome.response());

            Ok(())
        }
        Command::Issue { key, comment } => {
            let runtime = Runtime::new(config).await?;
            print_warnings(&runtime);

            let summary = tickets::summarize_issue(&runtime, &key, comment).await?;
            println!("{} ({})\n\n{}", summary.key, summary.url, summary.summary);

            if summary.comment_posted {
                println!("\nPosted as a comment on {}.", summary.key);
            }

            Ok(())
        }
        Command::Actions { document_id, create } => {
            let runtime = Runtime::new(config).await?;
            print_warnings(&runtime);

            let plan = tickets::plan_tickets(&runtime, &document_id, create.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);

            for failed in &plan.failed {
                eprintln!("warning: `{}` was not created: {}", failed.summary, failed.error);
            }

            Ok(())
        }
    }
}

fn print_warnings(runtime: &Runtime) {
    for warning in &runtime.warnings {
        eprintln!("warning: {warning}");
    }
}
