mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use anyhow::Result;

use crate::commands::ApiClient;

#[derive(Parser)]
#[command(name = "interview-cli")]
#[command(about = "Interview CLI - Drive interview sessions and code runs against the API", long_about = None)]
struct Cli {
    /// Base URL of the interview API
    #[arg(long, env = "INTERVIEW_API_URL", default_value = "http://127.0.0.1:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interview session, or resume the live one for this client key
    Start {
        /// Client key identifying this caller (generated when omitted)
        #[arg(short, long)]
        client_key: Option<String>,
    },

    /// Submit a source file and wait for its result
    Run {
        /// Session id returned by `start`
        #[arg(short, long)]
        session: String,

        /// Source file to execute
        #[arg(short, long)]
        file: PathBuf,

        /// Judge language id (e.g. 71 for python, 63 for javascript)
        #[arg(short, long)]
        language_id: u32,

        /// Standard input passed to the program
        #[arg(long, default_value = "")]
        stdin: String,
    },

    /// Fetch the result of a run
    Result {
        run_id: String,
    },

    /// Show the statistics of a session
    Stats {
        session_id: String,
    },

    /// End a session; further runs are refused
    End {
        session_id: String,
    },

    /// Delete a session and its run history
    Delete {
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Start { client_key } => {
            commands::start_session(&client, client_key).await?;
        }
        Commands::Run {
            session,
            file,
            language_id,
            stdin,
        } => {
            commands::run_file(&client, &session, &file, language_id, &stdin).await?;
        }
        Commands::Result { run_id } => {
            commands::show_result(&client, &run_id).await?;
        }
        Commands::Stats { session_id } => {
            commands::show_stats(&client, &session_id).await?;
        }
        Commands::End { session_id } => {
            commands::end_session(&client, &session_id).await?;
        }
        Commands::Delete { session_id } => {
            commands::delete_session(&client, &session_id).await?;
        }
    }

    Ok(())
}
