use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portfolio_rag::Result;
use portfolio_rag::commands::{ask, chat, ingest, show_status};
use portfolio_rag::config::{Config, resolve_base_dir, run_interactive_config, show_config};
use portfolio_rag::prompt::Persona;

#[derive(Parser)]
#[command(name = "portfolio-rag")]
#[command(about = "Answer interview questions from your own project write-ups")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector database
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk, embed and store the markdown documents
    Ingest {
        /// Directory of markdown files, overriding the configured one
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Drop the collection before ingesting
        #[arg(long)]
        rebuild: bool,
    },
    /// Ask a single question
    Ask {
        /// Question to answer; a built-in interview question is used when omitted
        question: Option<String>,
        /// Persona framing the answer
        #[arg(long, value_enum)]
        persona: Option<Persona>,
        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// Chat interactively in the terminal
    Chat {
        /// Persona framing the answers
        #[arg(long, value_enum)]
        persona: Option<Persona>,
    },
    /// Show the state of the vector collection
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir).map_err(anyhow::Error::from)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load(&base_dir)?);
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { data_dir, rebuild } => {
            let config = Config::load(&base_dir)?;
            ingest(&config, data_dir.as_deref(), rebuild).await?;
        }
        Commands::Ask {
            question,
            persona,
            no_stream,
        } => {
            let config = Config::load(&base_dir)?;
            ask(&config, question, persona, !no_stream).await?;
        }
        Commands::Chat { persona } => {
            let config = Config::load(&base_dir)?;
            chat(&config, persona).await?;
        }
        Commands::Status => {
            let config = Config::load(&base_dir)?;
            show_status(&config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn status_command() {
        let cli = Cli::try_parse_from(["portfolio-rag", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
            assert_eq!(parsed.base_dir, None);
        }
    }

    #[test]
    fn ask_without_question_uses_defaults() {
        let cli = Cli::try_parse_from(["portfolio-rag", "ask"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                question,
                persona,
                no_stream,
            } = parsed.command
            {
                assert_eq!(question, None);
                assert_eq!(persona, None);
                assert!(!no_stream);
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn ask_with_question_and_persona() {
        let cli = Cli::try_parse_from([
            "portfolio-rag",
            "ask",
            "How did you reduce latency?",
            "--persona",
            "interview-coach",
            "--no-stream",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask {
                question,
                persona,
                no_stream,
            } = parsed.command
            {
                assert_eq!(question.as_deref(), Some("How did you reduce latency?"));
                assert_eq!(persona, Some(Persona::InterviewCoach));
                assert!(no_stream);
            } else {
                panic!("expected ask command");
            }
        }
    }

    #[test]
    fn unknown_persona_is_rejected() {
        let cli = Cli::try_parse_from(["portfolio-rag", "chat", "--persona", "pirate"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidValue);
        }
    }

    #[test]
    fn ingest_flags() {
        let cli = Cli::try_parse_from([
            "portfolio-rag",
            "ingest",
            "--data-dir",
            "notes",
            "--rebuild",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest { data_dir, rebuild } = parsed.command {
                assert_eq!(data_dir, Some(PathBuf::from("notes")));
                assert!(rebuild);
            } else {
                panic!("expected ingest command");
            }
        }
    }

    #[test]
    fn base_dir_is_global() {
        let cli = Cli::try_parse_from(["portfolio-rag", "status", "--base-dir", "/tmp/portfolio"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.base_dir, Some(PathBuf::from("/tmp/portfolio")));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["portfolio-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["portfolio-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["portfolio-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
