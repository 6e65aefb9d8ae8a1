//! # docqa CLI
//!
//! Extract text from PDFs, pull structured SLA information out of them, and
//! ask questions about their content.
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa extract <pdf\|dir>...` | Print (or save) the extracted text |
//! | `docqa sla <pdf\|dir>...` | Write `<name>_sla_info.json` per document |
//! | `docqa ask <pdf> "<question>"` | Answer one question |
//! | `docqa chat <pdf\|dir>...` | Interactive questions over loaded documents |
//!
//! Credentials come from the environment: `GOOGLE_API_KEY`,
//! `OPENAI_API_KEY`, `AZURE_DOC_INTELLI_ENDPOINT` and `AZURE_KEY`, as
//! required by the configured providers.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use docqa::config::{self, Config};
use docqa::extract::{create_extractor, load_document, TextExtractor};
use docqa::inputs::collect_pdfs;
use docqa::logging::init_logging;
use docqa::pipeline::Assistant;
use docqa::session::Session;
use docqa_core::models::Document;
use docqa_core::sla::artifact_file_name;

/// docqa: question answering and SLA extraction over PDF documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Question answering and SLA extraction over PDF documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docqa.toml` when that file exists; built-in
    /// defaults apply otherwise.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text from PDF files.
    ///
    /// Prints each document's text to stdout, or writes `<name>.txt` files
    /// into `--out` when given.
    Extract {
        /// PDF files or directories to scan for `*.pdf`.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory for `.txt` output files.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Extract structured SLA information.
    ///
    /// Writes `<name>_sla_info.json` for each document into `--out` and
    /// prints the JSON to stdout.
    Sla {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Ask a single question about one PDF.
    Ask {
        path: PathBuf,
        question: String,
    },

    /// Interactive chat over one or more PDFs.
    ///
    /// Commands: `:docs`, `:use <name>`, `:history`, `:sla`, `:quit`.
    /// Any other input is a question about the current document.
    Chat {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&cfg.logging);

    let extractor = create_extractor(&cfg)?;

    match cli.command {
        Commands::Extract { paths, out } => run_extract(extractor.as_ref(), &paths, out.as_deref()).await,
        Commands::Sla { paths, out } => run_sla(&cfg, extractor.as_ref(), &paths, &out).await,
        Commands::Ask { path, question } => {
            let assistant = Assistant::from_config(&cfg)?;
            let document = load_document(extractor.as_ref(), &path).await?;
            let answer = assistant.answer_chat_question(&document, &question).await?;
            println!("{}", answer.trim_end());
            Ok(())
        }
        Commands::Chat { paths } => run_chat(&cfg, extractor.as_ref(), &paths).await,
    }
}

/// Load every input, reporting failures per document.
async fn load_all(extractor: &dyn TextExtractor, paths: &[PathBuf]) -> (Vec<Document>, usize) {
    let mut documents = Vec::new();
    let mut failures = 0;
    for path in collect_pdfs(paths) {
        match load_document(extractor, &path).await {
            Ok(document) => documents.push(document),
            Err(e) => {
                error!("{}", e);
                eprintln!("Error: {}", e);
                failures += 1;
            }
        }
    }
    (documents, failures)
}

fn finish(failures: usize, total: usize) -> anyhow::Result<()> {
    if failures > 0 {
        bail!("{} of {} documents failed", failures, total);
    }
    Ok(())
}

async fn run_extract(
    extractor: &dyn TextExtractor,
    paths: &[PathBuf],
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let (documents, mut failures) = load_all(extractor, paths).await;
    let total = documents.len() + failures;

    if let Some(dir) = out {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    }

    for document in &documents {
        match out {
            Some(dir) => {
                let target = dir.join(format!("{}.txt", document.name));
                if let Err(e) = std::fs::write(&target, &document.text) {
                    eprintln!("Error: cannot write {}: {}", target.display(), e);
                    failures += 1;
                    continue;
                }
                println!("{} -> {}", document.name, target.display());
            }
            None => {
                println!("==> {} <==", document.name);
                println!("{}", document.text);
            }
        }
    }

    finish(failures, total)
}

async fn run_sla(
    cfg: &Config,
    extractor: &dyn TextExtractor,
    paths: &[PathBuf],
    out: &Path,
) -> anyhow::Result<()> {
    let assistant = Assistant::from_config(cfg)?;
    let (documents, mut failures) = load_all(extractor, paths).await;
    let total = documents.len() + failures;

    std::fs::create_dir_all(out)
        .with_context(|| format!("cannot create output directory {}", out.display()))?;

    for document in &documents {
        let result = async {
            let record = assistant.extract_sla_info(document).await?;
            let json = record.to_json_pretty()?;
            let target = out.join(artifact_file_name(&document.name));
            std::fs::write(&target, &json)?;
            Ok::<_, docqa_core::DocQaError>((json, target))
        }
        .await;

        match result {
            Ok((json, target)) => {
                println!("{}", json);
                eprintln!("Wrote {}", target.display());
            }
            Err(e) => {
                error!("SLA extraction failed for {}: {}", document.name, e);
                eprintln!("Error: {}: {}", document.name, e);
                failures += 1;
            }
        }
    }

    finish(failures, total)
}

async fn run_chat(cfg: &Config, extractor: &dyn TextExtractor, paths: &[PathBuf]) -> anyhow::Result<()> {
    let assistant = Assistant::from_config(cfg)?;
    let (documents, _) = load_all(extractor, paths).await;

    let mut session = Session::new();
    for document in documents {
        session.load(document);
    }
    let mut current = match session.names().first() {
        Some(name) => name.to_string(),
        None => bail!("no documents could be loaded"),
    };

    println!(
        "Loaded {} document(s). Asking about {}. Type :quit to exit.",
        session.len(),
        current
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", current);
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(c, rest)| (c, rest.trim())) {
            (":quit", _) | (":q", _) => break,
            (":docs", _) => {
                for name in session.names() {
                    let marker = if name == current { "*" } else { " " };
                    println!("{} {}", marker, name);
                }
            }
            (":use", name) => {
                if session.get(name).is_some() {
                    current = name.to_string();
                } else {
                    println!("No document named '{}'. Try :docs.", name);
                }
            }
            (":history", _) => {
                for turn in session.history(&current)? {
                    println!("[{}] Q: {}", turn.asked_at.format("%H:%M:%S"), turn.question);
                    println!("A: {}\n", turn.answer.trim_end());
                }
            }
            (":sla", _) => {
                if let Some(document) = session.get(&current) {
                    match assistant.extract_sla_info(document).await {
                        Ok(record) => println!("{}", record.to_json_pretty()?),
                        Err(e) => eprintln!("Error: {}", e),
                    }
                }
            }
            _ => match session.ask(&assistant, &current, input).await {
                Ok(answer) => println!("{}\n", answer.trim_end()),
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    Ok(())
}
