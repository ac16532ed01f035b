use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use clausewise::{
    analysis::AnalysisService, config::Config, extraction::RawDocument, logging,
};

#[derive(Parser)]
#[command(
    name = "analyze-file",
    about = "Analyze one PDF or DOCX contract and print the JSON report"
)]
struct Cli {
    /// Contract to analyze.
    path: PathBuf,
    /// Media type of the file; inferred from the extension when omitted.
    #[arg(long)]
    media_type: Option<String>,
    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_cli_tracing();

    let config = Config::from_env().context("failed to load configuration from environment")?;
    let service =
        AnalysisService::from_config(&config).context("failed to initialize analysis service")?;

    let bytes = fs::read(&cli.path).with_context(|| format!("failed to read {}", cli.path.display()))?;
    let name = cli
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| cli.path.display().to_string());
    let document = RawDocument::new(bytes, cli.media_type.unwrap_or_default(), name);

    let outcome = service
        .analyze_document(document)
        .await
        .with_context(|| format!("failed to analyze {}", cli.path.display()))?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string(&outcome)?
    };
    println!("{rendered}");
    Ok(())
}
