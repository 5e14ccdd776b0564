//! `careerchat`: stream, replay and classify chat replies from the command line.

mod output;
mod replay;

use std::io::{Read as _, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use careerchat_ingest::observability::init_observability;
use careerchat_ingest::prelude::*;
use clap::{Parser, Subcommand};

use crate::output::write_event;
use crate::replay::FileReplayTransport;

#[derive(Parser, Debug)]
#[command(
    name = "careerchat",
    version,
    about = "Stream, replay and classify career-assistant chat replies."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one query to the chat endpoint and print the reply as it streams.
    Ask {
        query: String,

        /// Backend origin (default: $CAREERCHAT_BASE_URL).
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Confidentiality level forwarded with the query.
        #[arg(long, value_name = "LEVEL")]
        confidentiality: Option<String>,

        /// Print events as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Replay a captured reply body through the full pipeline.
    Replay {
        file: PathBuf,

        /// Bytes delivered per simulated read.
        #[arg(long, value_name = "N", default_value_t = 64)]
        chunk_size: usize,

        #[arg(long)]
        json: bool,
    },
    /// Classify final reply text (file or stdin) and print the unit as JSON.
    Classify { file: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_observability();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Ask {
            query,
            base_url,
            confidentiality,
            json,
        } => {
            let config = match base_url {
                Some(url) => ChatClientConfig::new(url),
                None => ChatClientConfig::from_env()?,
            };
            let session = StreamSession::from_config(&config)?;
            let mut request = ChatRequest::new(query);
            if let Some(level) = confidentiality {
                request = request.confidentiality(level);
            }
            stream_exchange(&session, request, json).await
        }
        Command::Replay {
            file,
            chunk_size,
            json,
        } => {
            let transport = FileReplayTransport::from_path(&file, chunk_size)?;
            let session = StreamSession::new(Arc::new(transport));
            let query = format!("replay of {}", file.display());
            stream_exchange(&session, ChatRequest::new(query), json).await
        }
        Command::Classify { file } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("failed to read stdin")?;
                    text
                }
            };
            let unit = careerchat_ingest::classify(&text);
            println!("{}", serde_json::to_string_pretty(&unit)?);
            Ok(())
        }
    }
}

/// Prints every event of one exchange and fails when the transport failed.
async fn stream_exchange(
    session: &StreamSession,
    request: ChatRequest,
    json: bool,
) -> anyhow::Result<()> {
    let mut stream = session.start(request).await?;
    let mut stdout = std::io::stdout().lock();
    while let Some(event) = stream.next_event().await {
        write_event(&mut stdout, &event, json)?;
        stdout.flush()?;
    }
    let outcome = stream.finish().await?;
    if outcome.end == ExchangeEnd::TransportFailed {
        anyhow::bail!("exchange {} failed at the transport", outcome.exchange_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_options() {
        let cli = Cli::try_parse_from([
            "careerchat",
            "ask",
            "find data jobs",
            "--base-url",
            "http://localhost:8000",
            "--confidentiality",
            "internal",
            "--json",
        ])
        .expect("parse");
        let Command::Ask {
            query,
            base_url,
            confidentiality,
            json,
        } = cli.command
        else {
            panic!("expected ask");
        };
        assert_eq!(query, "find data jobs");
        assert_eq!(base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(confidentiality.as_deref(), Some("internal"));
        assert!(json);
    }

    #[test]
    fn replay_chunk_size_defaults() {
        let cli = Cli::try_parse_from(["careerchat", "replay", "body.sse"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Replay { chunk_size: 64, json: false, .. }
        ));
    }

    #[test]
    fn classify_file_is_optional() {
        let cli = Cli::try_parse_from(["careerchat", "classify"]).expect("parse");
        assert!(matches!(cli.command, Command::Classify { file: None }));
    }

    #[test]
    fn ask_requires_a_query() {
        assert!(Cli::try_parse_from(["careerchat", "ask"]).is_err());
    }

    #[tokio::test]
    async fn replay_command_runs_end_to_end() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(
            file.path(),
            "data: {\"payload_type\":\"message\",\"content\":\"hello\"}\n\n",
        )
        .expect("write");
        let cli = Cli::try_parse_from([
            "careerchat",
            "replay",
            file.path().to_str().expect("utf8 path"),
            "--chunk-size",
            "7",
            "--json",
        ])
        .expect("parse");
        run(cli).await.expect("replay succeeds");
    }

    #[tokio::test]
    async fn replay_of_empty_body_is_a_failure() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let cli = Cli::try_parse_from([
            "careerchat",
            "replay",
            file.path().to_str().expect("utf8 path"),
        ])
        .expect("parse");
        assert!(run(cli).await.is_err());
    }
}
