//! Command-line interface.
//!
//! `request` and `parse` are offline: they show what the normalization
//! engine sends and how it reads a saved body. `generate` makes a live call.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use llmbridge::{
    Client, Config, Conversation, Options, Provider, SchemaSource, StreamChunk, Tool,
};

/// Normalize requests and responses across LLM provider APIs
#[derive(Parser)]
#[command(name = "llmbridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: ~/.llmbridge/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "llmbridge=info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the wire request for a prompt without sending it
    Request {
        #[command(flatten)]
        args: PromptArgs,

        /// Constrain the answer to the JSON schema in FILE
        #[arg(long, value_name = "FILE")]
        schema: Option<PathBuf>,

        /// Build a streaming request
        #[arg(long, conflicts_with = "schema")]
        stream: bool,
    },

    /// Normalize a saved response body
    Parse {
        /// File holding the raw response body
        file: PathBuf,
    },

    /// Send a prompt and print the answer
    Generate {
        #[command(flatten)]
        args: PromptArgs,

        /// Print text as it arrives
        #[arg(long)]
        stream: bool,

        /// Print token usage and response metadata
        #[arg(long)]
        details: bool,
    },

    /// Write a default config file
    Init,
}

#[derive(Args)]
pub struct PromptArgs {
    /// The prompt text
    pub prompt: String,

    /// Instruction prepended to the conversation
    #[arg(long)]
    pub system: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Offer the provider's web search tool
    #[arg(long)]
    pub web_search: bool,
}

impl PromptArgs {
    fn options(&self) -> Options {
        let mut options = Options::new();
        options.system_prompt = self.system.clone();
        options.temperature = self.temperature;
        options.max_tokens = self.max_tokens;
        options
    }

    fn tools(&self) -> Vec<Tool> {
        if self.web_search {
            vec![Tool::web_search()]
        } else {
            Vec::new()
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => init(cli.config.as_deref()),
        Commands::Request {
            args,
            schema,
            stream,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let provider = config.offline_provider()?;
            print_request(provider.as_ref(), &args, schema.as_deref(), stream)
        }
        Commands::Parse { file } => {
            let config = load_config(cli.config.as_deref())?;
            let provider = config.offline_provider()?;
            print_parsed(provider.as_ref(), &file)
        }
        Commands::Generate {
            args,
            stream,
            details,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let client = Client::with_http(config.provider()?);
            generate(&client, &args, stream, details).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_with_env(path),
        None => Config::load(),
    }
}

fn init(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => {
            Config::save_default_to(path)?;
            path.to_path_buf()
        }
        None => Config::save_default()?,
    };
    println!("[Config] Created default config: {}", path.display());
    println!("[Config] Edit it to set your provider, model and api_key.");
    Ok(())
}

fn print_request(
    provider: &dyn Provider,
    args: &PromptArgs,
    schema: Option<&Path>,
    stream: bool,
) -> Result<()> {
    let conversation = Conversation::Prompt(&args.prompt);
    let options = args.options();
    let tools = args.tools();

    let body = match schema {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
            provider.build_with_schema(conversation, &options, &tools, &SchemaSource::from(text))?
        }
        None if stream => provider.build_stream(conversation, &options, &tools)?,
        None => provider.build(conversation, &options, &tools)?,
    };

    let prepared = provider.prepare(body);
    let value: serde_json::Value =
        serde_json::from_slice(&prepared.body).context("Request body is not JSON")?;
    println!("POST {}", prepared.url);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn print_parsed(provider: &dyn Provider, file: &Path) -> Result<()> {
    let body = std::fs::read(file)
        .with_context(|| format!("Failed to read response file: {}", file.display()))?;
    let (text, details) = provider.parse(&body)?;
    println!("{}", text);
    println!();
    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}

async fn generate(client: &Client, args: &PromptArgs, stream: bool, details: bool) -> Result<()> {
    let conversation = Conversation::Prompt(&args.prompt);
    let options = args.options();
    let tools = args.tools();

    if stream {
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            let mut stdout = std::io::stdout();
            while let Some(chunk) = chunk_rx.recv().await {
                if let StreamChunk::TextDelta(text) = chunk {
                    let _ = write!(stdout, "{}", text);
                    let _ = stdout.flush();
                }
            }
        });
        let result = client.stream(conversation, &options, &tools, chunk_tx).await;
        printer.await.context("Stream printer failed")?;
        println!();
        result?;
        return Ok(());
    }

    let (text, response_details) = client
        .generate_with_usage(conversation, &options, &tools)
        .await?;
    println!("{}", text);
    if details {
        println!();
        println!("{}", serde_json::to_string_pretty(&response_details)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_request_flags() {
        let cli = Cli::try_parse_from([
            "llmbridge",
            "request",
            "hello",
            "--system",
            "be brief",
            "--max-tokens",
            "64",
            "--stream",
        ])
        .unwrap();
        match cli.command {
            Commands::Request { args, stream, schema } => {
                assert!(stream);
                assert!(schema.is_none());
                let options = args.options();
                assert_eq!(options.system_prompt(), Some("be brief"));
                assert_eq!(options.max_tokens, Some(64));
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn schema_and_stream_conflict() {
        let result = Cli::try_parse_from([
            "llmbridge", "request", "hi", "--schema", "s.json", "--stream",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn web_search_flag_adds_tool() {
        let cli = Cli::try_parse_from(["llmbridge", "generate", "news", "--web-search"]).unwrap();
        match cli.command {
            Commands::Generate { args, .. } => assert!(args.tools()[0].is_web_search()),
            _ => panic!("expected generate"),
        }
    }
}
