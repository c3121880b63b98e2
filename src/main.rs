use clap::{Args, Parser, Subcommand};
use lingo_press::Result;
use lingo_press::commands::{
    Target, generate, generate_streaming, ingest_file, list_collections, retrieve,
};
use lingo_press::config::{run_interactive_config, show_config};
use lingo_press::embeddings::ChunkSource;
use lingo_press::generation::ContentFormat;
use lingo_press::ingest::InputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lingo-press")]
#[command(about = "Curriculum-grounded content drafting for language exam newsletters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Target language, e.g. "Spanish" or "Mandarin Chinese"
    #[arg(long)]
    language: String,
    /// Exam family, e.g. "DELE" or "HSK"
    #[arg(long)]
    exam: String,
    /// Proficiency level as stored at ingest time, e.g. "B1" or "HSK3"
    #[arg(long)]
    level: String,
}

impl From<TargetArgs> for Target {
    fn from(args: TargetArgs) -> Self {
        Target {
            language: args.language,
            exam: args.exam,
            level: args.level,
        }
    }
}

/// Labels for chunks cut from a raw scraped file
#[derive(Args, Debug)]
struct SourceArgs {
    #[arg(long, requires_all = ["exam", "level", "source_url"])]
    language: Option<String>,
    #[arg(long, requires_all = ["language", "level", "source_url"])]
    exam: Option<String>,
    #[arg(long, requires_all = ["language", "exam", "source_url"])]
    level: Option<String>,
    /// Page the file was scraped from; chunk ids derive from it
    #[arg(long, requires_all = ["language", "exam", "level"])]
    source_url: Option<String>,
}

impl SourceArgs {
    fn into_source(self) -> Option<ChunkSource> {
        match (self.language, self.exam, self.level, self.source_url) {
            (Some(language), Some(exam), Some(level), Some(source_url)) => {
                Some(ChunkSource::new(language, exam, level, source_url))
            }
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embedding, retrieval and generation settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Embed and store chunk records, or chunk a raw scraped file first
    Ingest {
        /// JSONL chunk records, or raw text when --format says so
        file: PathBuf,
        /// jsonl, grammar-page, vocab-list or reading
        #[arg(long, default_value = "jsonl")]
        format: InputFormat,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// List stored collections and their sizes
    Collections {
        /// Compact the database afterwards
        #[arg(long)]
        optimize: bool,
    },
    /// Show the grammar and vocabulary chunks retrieved for a theme
    Retrieve {
        #[command(flatten)]
        target: TargetArgs,
        /// Theme to retrieve context for
        theme: String,
    },
    /// Draft a newsletter piece grounded on retrieved chunks
    Generate {
        #[command(flatten)]
        target: TargetArgs,
        /// blurb, story, dialogue or matching
        #[arg(long, default_value = "blurb")]
        format: ContentFormat,
        /// Also generate a post title
        #[arg(long)]
        title: bool,
        /// Print the draft as it is written
        #[arg(long, conflicts_with = "title")]
        stream: bool,
        /// Theme of the piece
        theme: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest {
            file,
            format,
            source,
        } => {
            ingest_file(&file, format, source.into_source().as_ref()).await?;
        }
        Commands::Collections { optimize } => {
            list_collections(optimize).await?;
        }
        Commands::Retrieve { target, theme } => {
            retrieve(&target.into(), &theme).await?;
        }
        Commands::Generate {
            target,
            format,
            title,
            stream,
            theme,
        } => {
            if stream {
                generate_streaming(&target.into(), &theme, format).await?;
            } else {
                generate(&target.into(), &theme, format, title).await?;
            }
        }
    }

    Ok(())
}
