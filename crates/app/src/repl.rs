//! Two-phase interactive loop: an optional search/ingest phase, then the
//! question/answer phase against the active (or a selected) collection.

use anyhow::{Context, Result};
use arxiv_rag_core::{
    Answer, AnswerEngine, ArxivClient, ChromaStore, IngestError, IngestionOutcome,
    IngestionPipeline, JsonLog, LopdfExtractor, OpenAiChat, OpenAiEmbeddings, PdfFetcher,
    QueryError, SortMode,
};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::runtime::Runtime;

use crate::Cli;

type Pipeline =
    IngestionPipeline<ArxivClient, PdfFetcher, LopdfExtractor, OpenAiEmbeddings, ChromaStore>;
type Engine = AnswerEngine<OpenAiEmbeddings, ChromaStore, OpenAiChat>;

pub struct Session {
    runtime: Runtime,
    pipeline: Pipeline,
    engine: Engine,
    collection: Option<String>,
}

impl Session {
    pub fn new(cli: &Cli) -> Result<Self> {
        let runtime = Runtime::new().context("failed to create async runtime")?;

        let pipeline = IngestionPipeline::new(
            ArxivClient::new()?,
            PdfFetcher::with_limit(cli.fetch_limit)?,
            LopdfExtractor,
            OpenAiEmbeddings::with_base_url(
                &cli.openai_url,
                &cli.openai_api_key,
                &cli.embedding_model,
            )?,
            ChromaStore::new(&cli.chroma_url)?,
            JsonLog::new(&cli.paper_catalog),
        );

        let engine = AnswerEngine::new(
            OpenAiEmbeddings::with_base_url(
                &cli.openai_url,
                &cli.openai_api_key,
                &cli.embedding_model,
            )?,
            ChromaStore::new(&cli.chroma_url)?,
            OpenAiChat::with_base_url(
                &cli.openai_url,
                &cli.openai_api_key,
                &cli.completion_model,
            )?,
            JsonLog::new(&cli.qa_history),
        );

        Ok(Self {
            runtime,
            pipeline,
            engine,
            collection: None,
        })
    }

    fn ingest(
        &self,
        query: &str,
        mode: SortMode,
        count: usize,
    ) -> Result<IngestionOutcome, IngestError> {
        self.runtime.block_on(self.pipeline.run(query, mode, count))
    }

    fn answer(&self, collection: &str, question: &str, k: usize) -> Result<Answer, QueryError> {
        self.runtime
            .block_on(self.engine.answer(collection, question, k))
    }

    fn collections(&self) -> Result<Vec<String>, QueryError> {
        self.runtime.block_on(self.engine.collections())
    }

    fn catalog_path(&self) -> &std::path::Path {
        self.pipeline.catalog_path()
    }
}

pub fn run(mut session: Session) -> Result<()> {
    let mut editor = DefaultEditor::new()?;

    println!("{}", "Welcome to the arXiv research assistant!".cyan().bold());
    println!();

    if search_phase(&mut editor, &mut session)? {
        question_phase(&mut editor, &mut session)?;
    }

    println!("Goodbye!");
    Ok(())
}

/// Returns false when the user closed the input stream and the whole
/// session should end.
fn search_phase(editor: &mut DefaultEditor, session: &mut Session) -> Result<bool> {
    loop {
        let prompt = format!(
            "{} ",
            "Enter your search query for arxiv papers (or 'skip' to skip):".green()
        );
        let Some(query) = read_line(editor, &prompt)? else {
            return Ok(false);
        };
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("skip") {
            return Ok(true);
        }

        println!("{}", "Choose a search mode:".blue());
        println!("{}", "1. Relevance".green());
        println!("{}", "2. Most recently updated".green());
        let Some(choice) = read_line(editor, "Enter the number of your choice: ")? else {
            return Ok(false);
        };
        let mode = match choice.as_str() {
            "1" => SortMode::Relevance,
            "2" => SortMode::Latest,
            _ => {
                println!("{}", "Invalid choice. Defaulting to relevance.".yellow());
                SortMode::Relevance
            }
        };

        let count_prompt = format!("{} ", "Enter the number of papers to search:".blue());
        let Some(count) = read_count(editor, &count_prompt)? else {
            return Ok(false);
        };

        match session.ingest(&query, mode, count) {
            Ok(outcome) => {
                let Some(collection) = outcome.collection.clone() else {
                    println!("No results found for your query.");
                    continue;
                };
                print_outcome(&collection, &outcome);
                println!("Metadata saved to: {}", session.catalog_path().display());
                session.collection = Some(collection);
                return Ok(true);
            }
            Err(error) => {
                eprintln!("{} {}", "Search failed:".red(), error);
            }
        }
    }
}

fn print_outcome(collection: &str, outcome: &IngestionOutcome) {
    for paper in &outcome.ingested {
        println!("Title: {}", paper.record.title);
        println!("Authors: {}", paper.record.authors.join(", "));
        println!("Summary: {}...", excerpt(&paper.record.summary, 100));
        println!("URL: {}", paper.record.url);
        println!("Added {} chunks to collection: {}", paper.pages, collection);
        println!("{}", "-".repeat(20));
    }

    for skipped in &outcome.skipped {
        println!(
            "{} {} ({}): {}",
            "Skipped".yellow(),
            skipped.title,
            skipped.url,
            skipped.reason
        );
    }

    println!(
        "Ingested {} of {} papers into '{}'.",
        outcome.ingested.len(),
        outcome.ingested.len() + outcome.skipped.len(),
        collection
    );
}

fn question_phase(editor: &mut DefaultEditor, session: &mut Session) -> Result<()> {
    loop {
        let prompt = format!(
            "{} ",
            "Enter your question (or 'quit' to exit):".yellow()
        );
        let Some(question) = read_line(editor, &prompt)? else {
            return Ok(());
        };
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("quit") {
            return Ok(());
        }

        let Some(k) = read_count(editor, "Enter the number of chunks to retrieve: ")? else {
            return Ok(());
        };

        if session.collection.is_none() {
            match choose_collection(editor, session)? {
                Selection::Chosen(name) => session.collection = Some(name),
                Selection::Unavailable => continue,
                Selection::End => return Ok(()),
            }
        }
        let Some(collection) = session.collection.clone() else {
            continue;
        };

        match session.answer(&collection, &question, k) {
            Ok(answer) => print_answer(&answer),
            Err(error) => eprintln!("{} {}", "Error:".red(), error),
        }
    }
}

enum Selection {
    Chosen(String),
    Unavailable,
    End,
}

fn choose_collection(editor: &mut DefaultEditor, session: &Session) -> Result<Selection> {
    let collections = match session.collections() {
        Ok(collections) => collections,
        Err(error) => {
            eprintln!("{} {}", "Could not list collections:".red(), error);
            return Ok(Selection::Unavailable);
        }
    };

    if collections.is_empty() {
        println!(
            "{}",
            "No collections exist yet. Run a search first.".yellow()
        );
        return Ok(Selection::Unavailable);
    }

    println!();
    println!("Available collections:");
    for (index, name) in collections.iter().enumerate() {
        println!("{}. {}", index + 1, name);
    }

    loop {
        let Some(line) = read_line(editor, "Choose a collection number: ")? else {
            return Ok(Selection::End);
        };
        match line.parse::<usize>() {
            Ok(number) if (1..=collections.len()).contains(&number) => {
                return Ok(Selection::Chosen(collections[number - 1].clone()));
            }
            _ => println!(
                "Please enter a number between 1 and {}.",
                collections.len()
            ),
        }
    }
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", "Relevant chunks:".cyan());
    for (index, chunk) in answer.sources.iter().enumerate() {
        println!();
        println!("Chunk {} from {}, Page {}:", index + 1, chunk.title, chunk.page);
        println!("{}...", excerpt(&chunk.text, 500));
    }

    println!();
    println!("{}", "Answer:".cyan().bold());
    println!("{}", answer.text);
    println!();
}

/// Read one line; `None` means the input stream is closed.
fn read_line(editor: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    match editor.readline(prompt) {
        Ok(line) => {
            let line = line.trim().to_string();
            if !line.is_empty() {
                let _ = editor.add_history_entry(&line);
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
        Err(ReadlineError::Eof) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Reprompt until the user enters a positive number.
fn read_count(editor: &mut DefaultEditor, prompt: &str) -> Result<Option<usize>> {
    loop {
        let Some(line) = read_line(editor, prompt)? else {
            return Ok(None);
        };
        match line.parse::<usize>() {
            Ok(count) if count > 0 => return Ok(Some(count)),
            _ => println!("{}", "Please enter a positive number.".yellow()),
        }
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
