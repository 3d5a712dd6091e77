use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod repl;

#[derive(Parser)]
#[command(name = "arxiv-rag", version)]
struct Cli {
    /// Chroma server base URL
    #[arg(long, default_value = "http://localhost:8000")]
    chroma_url: String,

    /// OpenAI-compatible API base URL
    #[arg(long, default_value = "https://api.openai.com")]
    openai_url: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    /// Embedding model
    #[arg(long, default_value = "text-embedding-3-large")]
    embedding_model: String,

    /// Chat model used to answer questions
    #[arg(long, default_value = "gpt-4o")]
    completion_model: String,

    /// Paper catalog file
    #[arg(long, default_value = "paper_metadata.json")]
    paper_catalog: String,

    /// Question/answer history file
    #[arg(long, default_value = "qa_history.json")]
    qa_history: String,

    /// Maximum simultaneous PDF downloads
    #[arg(long, default_value = "100")]
    fetch_limit: usize,
}

fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "arxiv-rag boot"
    );

    let session = repl::Session::new(&cli)?;
    repl::run(session)
}
