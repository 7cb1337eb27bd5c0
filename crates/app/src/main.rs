mod config;
mod logging;
mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use config::{GeneratorConfig, IndexConfig};
use logging::Logging;
use pdf_rag_core::corpus::{
    extract_pdfs, CorpusFetcher, FetchConfig, Source, SuppaftpConnector, DEFAULT_WORKERS, FTP_HOST,
    LOG_FILE_NAME,
};
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
#[command(about = "Chat with a knowledge base built from PDF documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the upload and chat endpoints.
    Serve {
        #[arg(long, env = "BIND", default_value = "127.0.0.1:8050")]
        bind: SocketAddr,

        #[command(flatten)]
        index: IndexConfig,

        #[command(flatten)]
        generator: GeneratorConfig,
    },
    /// Ingest every PDF under a folder, recursively.
    Ingest {
        #[arg(long, default_value = "knowledge_base")]
        folder: PathBuf,

        #[command(flatten)]
        index: IndexConfig,
    },
    /// Ask one question against the knowledge base.
    Ask {
        #[arg(long)]
        message: String,

        #[command(flatten)]
        index: IndexConfig,

        #[command(flatten)]
        generator: GeneratorConfig,
    },
    /// Mirror PDFs from the NCBI FTP server. Prompts for a source when none is given.
    Fetch {
        /// PMC or NLM.
        #[arg(long)]
        source: Option<String>,

        #[arg(long, default_value = "knowledge_base")]
        base_dir: PathBuf,

        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
    },
    /// Extract the PDFs inside `.tar.gz` archives into one flat directory.
    Unpack {
        #[arg(long, default_value = "knowledge_base/NLM")]
        source_dir: PathBuf,

        #[arg(long, default_value = "knowledge_base/NLM_PDFs")]
        target_dir: PathBuf,
    },
}

fn load_dotenv() {
    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            eprintln!("Warning: failed to load .env file: {error}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    let mut logging = Logging::init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    match cli.command {
        Command::Serve {
            bind,
            index,
            generator,
        } => {
            let clients = index.clients()?;
            let state = server::AppState {
                ingestion: Arc::new(clients.ingestion()?),
                chat: Arc::new(clients.chat(generator.build()?, &index.namespace)),
                namespace: Arc::from(index.namespace.as_str()),
            };
            server::serve(state, bind).await?;
        }
        Command::Ingest { folder, index } => {
            let pipeline = index.clients()?.ingestion()?;
            let report = pipeline
                .ingest_folder(&folder, &index.namespace)
                .await
                .with_context(|| format!("ingesting {}", folder.display()))?;

            for outcome in &report.files {
                if outcome.is_success() {
                    println!("Processed {}: {} chunks", outcome.filename, outcome.chunks);
                } else {
                    println!("{}", outcome.status_line());
                }
            }
            println!("Total chunks uploaded: {}", report.total_chunks);
        }
        Command::Ask {
            message,
            index,
            generator,
        } => {
            let coordinator = index
                .clients()?
                .chat(generator.build()?, &index.namespace);
            println!("{}", coordinator.reply(&message).await);
        }
        Command::Fetch {
            source,
            base_dir,
            workers,
        } => match source {
            Some(name) => {
                let source = name.parse::<Source>()?;
                fetch(&mut logging, &base_dir, source, workers).await?;
            }
            None => {
                let stdin = io::stdin();
                let mut input = stdin.lock();
                let mut output = io::stdout();
                while let Some(source) = select_source(&mut input, &mut output)? {
                    println!("\nStarting scraper for {source}...");
                    fetch(&mut logging, &base_dir, source, workers).await?;
                    if !confirm(
                        &mut input,
                        &mut output,
                        "\nWould you like to scrape another source? (y/n): ",
                    )? {
                        break;
                    }
                }
                println!("\nScraping completed. Goodbye!");
            }
        },
        Command::Unpack {
            source_dir,
            target_dir,
        } => {
            let summary = tokio::task::spawn_blocking(move || extract_pdfs(&source_dir, &target_dir))
                .await??;
            for path in &summary.extracted {
                println!("Extracted {}", path.display());
            }
            for archive in &summary.failed_archives {
                println!("Error extracting from {}", archive.display());
            }
        }
    }

    Ok(())
}

async fn fetch(
    logging: &mut Logging,
    base_dir: &std::path::Path,
    source: Source,
    workers: usize,
) -> anyhow::Result<()> {
    let config = FetchConfig {
        workers,
        ..FetchConfig::new(base_dir, source)
    };
    logging.log_to_file(&config.source_dir(), LOG_FILE_NAME)?;

    let fetcher = CorpusFetcher::new(Arc::new(SuppaftpConnector::new(FTP_HOST)), config)?;
    let summary = fetcher.run().await?;
    if !summary.failed_subdirectories.is_empty() {
        warn!(
            failed = ?summary.failed_subdirectories,
            "some subdirectories could not be fetched"
        );
    }
    Ok(())
}

/// Numbered source menu. `None` when the user picks 0 or input ends.
fn select_source(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Option<Source>> {
    loop {
        writeln!(output, "\nAvailable sources:")?;
        for (position, source) in Source::ALL.iter().enumerate() {
            writeln!(output, "{}. {source}", position + 1)?;
        }
        write!(output, "\nSelect source number (0 to exit): ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        match line.trim().parse::<usize>() {
            Ok(0) => return Ok(None),
            Ok(choice) if choice <= Source::ALL.len() => return Ok(Some(Source::ALL[choice - 1])),
            Ok(_) => writeln!(output, "Invalid selection. Please try again.")?,
            Err(_) => writeln!(output, "Please enter a valid number.")?,
        }
    }
}

fn confirm(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> io::Result<bool> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().eq_ignore_ascii_case("y"))
}
