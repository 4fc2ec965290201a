//! techdetective 命令行入口
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use techdetective::compiler::SignatureRules;
use techdetective::{
    ConfigManager, HeaderConverter, ScanConfig, ScanFailure, ScanReport, SignatureLoader,
    TechDetector,
};

#[derive(Parser)]
#[command(name = "techdetective")]
#[command(about = "Fingerprint the technology stack behind a web page", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL and detect its technologies
    Scan {
        url: String,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Maximum number of redirects to follow
        #[arg(long)]
        max_redirects: Option<usize>,

        /// Extra signature catalog appended to the built-in one
        #[arg(long)]
        signatures: Option<PathBuf>,

        /// Ignore HTTP_PROXY / HTTPS_PROXY
        #[arg(long)]
        no_proxy: bool,

        #[arg(long)]
        pretty: bool,
    },
    /// Detect technologies in a local HTML file
    File {
        html: PathBuf,

        /// Response header as "name: value" (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[arg(long)]
        signatures: Option<PathBuf>,

        #[arg(long)]
        pretty: bool,
    },
    /// Print the signature catalog
    List {
        #[arg(long)]
        signatures: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(
    timeout: Option<u64>,
    max_redirects: Option<usize>,
    signatures: Option<PathBuf>,
) -> ScanConfig {
    let mut builder = ConfigManager::custom();
    if let Some(timeout) = timeout {
        builder = builder.http_timeout(timeout);
    }
    if let Some(max_redirects) = max_redirects {
        builder = builder.max_redirects(max_redirects);
    }
    if let Some(path) = signatures {
        builder = builder.signature_path(path);
    }
    builder.build()
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header `{}` is not in \"name: value\" form", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header `{}` has an empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scan {
            url,
            timeout,
            max_redirects,
            signatures,
            no_proxy,
            pretty,
        } => {
            let mut config = build_config(timeout, max_redirects, signatures);
            config.system_proxy = !no_proxy;
            let detector = TechDetector::new(config).await?;
            match detector.scan(&url).await {
                Ok(report) => {
                    println!("{}", report.to_json(pretty)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    println!("{}", ScanFailure::new(&url, &e).to_json(pretty)?);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::File {
            html,
            headers,
            signatures,
            pretty,
        } => {
            let config = build_config(None, None, signatures);
            let headers = HeaderConverter::from_pairs(
                headers
                    .iter()
                    .map(|raw| parse_header(raw))
                    .collect::<Result<Vec<_>>>()?,
            );
            let bytes = tokio::fs::read(&html)
                .await
                .with_context(|| format!("cannot read {}", html.display()))?;
            let body = String::from_utf8_lossy(&bytes);
            debug!("read {} bytes from {}", bytes.len(), html.display());

            let detector = TechDetector::new(config).await?;
            let technologies = detector.detect(&body, &headers);
            let report = ScanReport::new(html.display().to_string(), technologies);
            println!("{}", report.to_json(pretty)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { signatures } => {
            let config = build_config(None, None, signatures);
            let catalog = SignatureLoader::load(&config).await?;
            for category in catalog.categories() {
                println!("{}", category.name);
                for signature in &category.signatures {
                    match signature.rules() {
                        SignatureRules::Patterns(patterns) => {
                            println!("  {} ({} patterns)", signature.name(), patterns.len())
                        }
                        SignatureRules::Versions(versions) => {
                            let labels: Vec<_> = versions.iter().map(|v| v.label()).collect();
                            println!("  {} [{}]", signature.name(), labels.join(", "))
                        }
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
