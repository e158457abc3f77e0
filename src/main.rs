//! news-credibility command-line entrypoint.
//! Loads the article, probes the completion and search services, runs the
//! analysis and prints the report.
//!
//! Exit code is 0 whenever an analysis ran (degraded or not, even when no
//! dimension could be scored) and 1 only when no article text was obtained.

use anyhow::Context;
use clap::Parser;
use news_credibility::analyzer::{AnalysisError, CredibilityAnalyzer};
use news_credibility::bootstrap::{ServiceRuntime, Toggles};
use news_credibility::config::{AnalysisConfig, ServiceConfig};
use news_credibility::input::{self, InputSource};
use news_credibility::persist::{self, DEFAULT_SAVE_DIR};
use news_credibility::render::{render_json, render_text, Lang};
use news_credibility::sources::{SourceTrust, DEFAULT_SOURCE_TRUST_PATH};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const QUIET_DEPS: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn";

#[derive(Debug, Parser)]
#[command(
    name = "news-credibility",
    version,
    about = "Score the credibility of a news article"
)]
struct Cli {
    /// Fetch the article from a URL.
    #[arg(long, conflicts_with_all = ["file", "text"])]
    url: Option<String>,
    /// Read the article from a file.
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,
    /// Analyze this text. Without --url/--file/--text, stdin is read.
    #[arg(long)]
    text: Option<String>,
    /// Do not use the completion service.
    #[arg(long)]
    no_ai: bool,
    /// Do not use any network service.
    #[arg(long)]
    offline: bool,
    /// Report language: en or zh.
    #[arg(long, default_value = "en")]
    lang: Lang,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
    /// Save the article and report.
    #[arg(long)]
    save: bool,
    #[arg(long, default_value = DEFAULT_SAVE_DIR)]
    save_dir: PathBuf,
    /// Analysis config (TOML). Defaults to $CREDIBILITY_CONFIG_PATH or config/credibility.toml.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    debug: bool,
    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn input_source(&self) -> InputSource {
        if let Some(u) = &self.url {
            InputSource::Url(u.clone())
        } else if let Some(p) = &self.file {
            InputSource::File(p.clone())
        } else if let Some(t) = &self.text {
            InputSource::Text(t.clone())
        } else {
            InputSource::Stdin
        }
    }

    fn analysis_config(&self) -> AnalysisConfig {
        let loaded = match &self.config {
            Some(p) => AnalysisConfig::load_from_file(p),
            None => AnalysisConfig::load_default(),
        };
        loaded.unwrap_or_else(|e| {
            tracing::warn!(target: "config", error = %format!("{e:#}"), "analysis config not loaded; using defaults");
            AnalysisConfig::default()
        })
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_tracing(debug: bool, json: bool) {
    let default = if debug {
        format!("debug,{QUIET_DEPS}")
    } else {
        format!("info,{QUIET_DEPS}")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present; real environment variables win.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.log_json);
    news_credibility::metrics::ensure_described();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let article = input::load(&cli.input_source())
        .await
        .context("cannot obtain article text")?;

    let toggles = Toggles {
        no_completion: cli.no_ai,
        offline: cli.offline,
    };
    let runtime = ServiceRuntime::new(ServiceConfig::from_env(), toggles);
    runtime.probe_services().await;

    let analyzer = CredibilityAnalyzer::new(
        runtime.completion.clone(),
        runtime.search.clone(),
        cli.analysis_config(),
    )
    .with_source_trust(SourceTrust::load_from_file(DEFAULT_SOURCE_TRUST_PATH));

    let report = match analyzer.analyze(&article.text, article.url.as_deref()).await {
        Ok(r) => r,
        Err(AnalysisError::NoScorableDimensions { warnings }) => {
            println!("No credibility dimension could be scored for this text.");
            for w in warnings {
                println!("  - {w}");
            }
            return Ok(());
        }
    };

    if cli.json {
        match render_json(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => tracing::error!(error = %e, "cannot render report as JSON"),
        }
    } else {
        print!("{}", render_text(&report, cli.lang));
    }

    if cli.save {
        match persist::save(&cli.save_dir, &article.text, &report) {
            Ok(files) => eprintln!(
                "saved: {} and {}",
                files.text.display(),
                files.report.display()
            ),
            Err(e) => tracing::error!(error = %e, "saving analysis failed"),
        }
    }
    Ok(())
}
