//! textmill CLI — the main entry point.
//!
//! Processes one input document through a KoboldCpp-style server for a
//! chosen task and writes the concatenated results to an output file.
//! Configuration layers, lowest to highest priority: `textmill.toml`,
//! environment variables, command-line flags.

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use textmill_client::KoboldClient;
use textmill_config::AppConfig;
use textmill_core::{Document, RunMetadata, TaskId};
use textmill_pipeline::{DocumentPipeline, ProgressSink};
use textmill_template::FileTemplate;

#[derive(Parser)]
#[command(
    name = "textmill",
    about = "textmill — long-document processing through a size-limited LLM API",
    version,
    author
)]
struct Cli {
    /// Input file to process
    input: PathBuf,

    /// Processing task to perform
    #[arg(long)]
    task: TaskId,

    /// Output file path
    #[arg(long)]
    output: PathBuf,

    /// Generation server base URL
    #[arg(long)]
    api_url: Option<String>,

    /// API password if the server requires one
    #[arg(long)]
    api_password: Option<String>,

    /// Templates directory path
    #[arg(long)]
    templates: Option<String>,

    /// Template name to use (file stem under the templates directory)
    #[arg(long)]
    template: Option<String>,

    /// Target language for the translate task
    #[arg(long)]
    language: Option<String>,

    /// Config file path (default: textmill.toml in the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write run metadata as JSON to this path
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Echoes fragments to stderr as they arrive, KoboldCpp-console style.
struct StderrSink;

impl ProgressSink for StderrSink {
    fn fragment(&self, text: &str) {
        eprint!("{text}");
        let _ = std::io::stderr().flush();
    }
}

/// Render results as the output document: one completed chunk per
/// blank-line-separated block, in chunk order.
fn format_output(results: &[String]) -> String {
    let mut out = String::new();
    for chunk in results {
        out.push_str(chunk);
        out.push_str("\n\n");
    }
    out
}

fn write_outputs(
    cli: &Cli,
    results: &[String],
    metadata: &RunMetadata,
) -> Result<(), textmill_core::Error> {
    std::fs::write(&cli.output, format_output(results))?;

    if let Some(metadata_path) = &cli.metadata {
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        std::fs::write(metadata_path, json)?;
    }

    Ok(())
}

async fn run(cli: &Cli) -> Result<(), textmill_core::Error> {
    // --- Configuration layering: file < env < flags ---
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(password) = &cli.api_password {
        config.api_password = Some(password.clone());
    }
    if let Some(templates) = &cli.templates {
        config.templates_directory = templates.clone();
    }
    if let Some(template) = &cli.template {
        config.template = Some(template.clone());
    }
    if let Some(language) = &cli.language {
        config.translation_language = language.clone();
    }
    config.validate()?;
    tracing::debug!(?config, "Resolved configuration");

    let document = Document::from_file(&cli.input)?;

    let client = Arc::new(KoboldClient::new(
        config.api_url.as_str(),
        config.api_password.clone(),
    ));
    let template = Arc::new(FileTemplate::from_config(
        config.templates_directory.as_ref(),
        config.template.as_deref(),
    )?);

    let pipeline = DocumentPipeline::new(client, template)
        .with_language(config.translation_language.as_str())
        .with_sampling(config.sampling.clone())
        .with_text_completion(config.text_completion)
        .with_progress(Arc::new(StderrSink));

    let (results, metadata) = pipeline.process(cli.task, &document).await?;
    eprintln!();

    write_outputs(cli, &results, &metadata)?;

    println!(
        "Processing complete. Output written to {}",
        cli.output.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_one_block_per_chunk() {
        let results = vec!["First result.".to_string(), "Second result.".to_string()];
        assert_eq!(format_output(&results), "First result.\n\nSecond result.\n\n");
    }

    #[test]
    fn output_format_empty_run() {
        assert_eq!(format_output(&[]), "");
    }

    #[test]
    fn task_flag_parses_known_tasks() {
        let cli = Cli::try_parse_from([
            "textmill",
            "input.txt",
            "--task",
            "summary",
            "--output",
            "out.txt",
        ])
        .unwrap();
        assert_eq!(cli.task, TaskId::Summary);
        assert_eq!(cli.input, PathBuf::from("input.txt"));
    }

    #[test]
    fn task_flag_rejects_unknown_tasks() {
        let result = Cli::try_parse_from([
            "textmill",
            "input.txt",
            "--task",
            "paraphrase",
            "--output",
            "out.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn flag_overrides_win_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("textmill.toml");
        std::fs::write(&config_path, "api_url = \"http://file:5001\"\n").unwrap();

        let mut config = AppConfig::load_from(&config_path).unwrap();
        assert_eq!(config.api_url, "http://file:5001");

        // The same layering run() applies
        config.api_url = "http://flag:5001".into();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_url, "http://flag:5001");
    }
}
