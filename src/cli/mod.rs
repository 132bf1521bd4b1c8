//! Command-line interface for inquest.
//!
//! Provides the one-shot batch analysis command plus the stepwise session
//! commands (start, step, show, sessions, delete) and a config dump.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::adapters::mock::{MockDecisionEngine, MockIocExtractor, MockReputationProvider};
use crate::adapters::{
    Collaborators, CsvAssetInventory, JsonFileAlertSource, MistralClient, SimulatedSoar,
    VirusTotalClient,
};
use crate::config::{self, ResolvedConfig};
use crate::core::{FileSessionStore, Orchestrator, StageName};

/// inquest - security-alert investigation orchestrator
#[derive(Parser, Debug)]
#[command(name = "inquest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full batch investigation over one alert
    Analyze {
        /// Alert fixture file (defaults to the configured alerts path)
        #[arg(long)]
        alerts: Option<PathBuf>,

        /// Index of the alert to analyze (random pick if not given)
        #[arg(short, long)]
        index: Option<usize>,

        /// Use offline collaborators instead of the LLM/reputation APIs
        #[arg(long)]
        offline: bool,
    },

    /// Start a stepwise investigation session
    Start {
        /// Alert fixture file (defaults to the configured alerts path)
        #[arg(long)]
        alerts: Option<PathBuf>,

        /// Index of the alert to investigate (random pick if not given)
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Run one pipeline stage against a session
    Step {
        /// Session ID (UUID)
        session_id: String,

        /// Stage name: validate, extract_iocs, check_reputation,
        /// enrich_asset, decide, or execute
        stage: String,

        /// Use offline collaborators instead of the LLM/reputation APIs
        #[arg(long)]
        offline: bool,
    },

    /// Show a session's current investigation record
    Show {
        /// Session ID (UUID)
        session_id: String,
    },

    /// List stored sessions
    Sessions,

    /// Delete a session
    Delete {
        /// Session ID (UUID)
        session_id: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = config::get()?;

        match self.command {
            Commands::Analyze { alerts, index, offline } => {
                let alert = pick_alert(&config, alerts, index).await?;
                let orchestrator = build_orchestrator(&config, offline);

                let record = orchestrator.run_all(alert).await?;

                println!("{}", serde_json::to_string_pretty(&record)?);
                Ok(())
            }

            Commands::Start { alerts, index } => {
                let alert = pick_alert(&config, alerts, index).await?;
                let orchestrator = build_orchestrator(&config, false);

                let id = orchestrator.start_session(alert).await?;
                let record = orchestrator.session(id).await?;

                println!("Session: {id}");
                println!("{}", serde_json::to_string_pretty(record.alert().as_value())?);
                Ok(())
            }

            Commands::Step { session_id, stage, offline } => {
                let id = parse_session_id(&session_id)?;
                let stage: StageName = stage.parse().with_context(|| {
                    "valid stages: validate, extract_iocs, check_reputation, \
                     enrich_asset, decide, execute"
                })?;
                let orchestrator = build_orchestrator(&config, offline);

                let output = orchestrator.run_step(id, stage).await?;

                println!("{}", serde_json::to_string_pretty(&output)?);
                Ok(())
            }

            Commands::Show { session_id } => {
                let id = parse_session_id(&session_id)?;
                let orchestrator = build_orchestrator(&config, true);

                let record = orchestrator.session(id).await?;

                println!("{}", serde_json::to_string_pretty(&record)?);
                Ok(())
            }

            Commands::Sessions => {
                let orchestrator = build_orchestrator(&config, true);

                let mut sessions = orchestrator.list_sessions().await?;
                sessions.sort();

                if sessions.is_empty() {
                    println!("No stored sessions.");
                }
                for id in sessions {
                    println!("{id}");
                }
                Ok(())
            }

            Commands::Delete { session_id } => {
                let id = parse_session_id(&session_id)?;
                let orchestrator = build_orchestrator(&config, true);

                orchestrator.delete_session(id).await?;
                println!("Deleted session {id}");
                Ok(())
            }

            Commands::Config => {
                println!("{config:#?}");
                Ok(())
            }
        }
    }
}

fn parse_session_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("'{raw}' is not a valid session id"))
}

async fn pick_alert(
    config: &ResolvedConfig,
    alerts: Option<PathBuf>,
    index: Option<usize>,
) -> Result<crate::domain::Alert> {
    let path = alerts.unwrap_or_else(|| config.alerts.clone());
    let source = JsonFileAlertSource::new(path.clone());
    source
        .pick(index)
        .await
        .with_context(|| format!("Failed to pick an alert from {}", path.display()))
}

/// Wire the production (or offline) collaborators and the file session store.
fn build_orchestrator(config: &ResolvedConfig, offline: bool) -> Orchestrator {
    let assets = Arc::new(CsvAssetInventory::new(config.assets.clone()));
    let executor = Arc::new(SimulatedSoar);

    let collaborators = if offline {
        Collaborators {
            extractor: Arc::new(MockIocExtractor::default()),
            reputation: Arc::new(MockReputationProvider::default()),
            assets,
            decision: Arc::new(MockDecisionEngine::default()),
            executor,
        }
    } else {
        let llm = Arc::new(
            MistralClient::new(std::env::var("MISTRAL_API_KEY").ok())
                .with_model(config.model.clone()),
        );
        Collaborators {
            extractor: llm.clone(),
            reputation: Arc::new(VirusTotalClient::new(std::env::var("VT_API_KEY").ok())),
            assets,
            decision: llm,
            executor,
        }
    };

    let sessions = Arc::new(FileSessionStore::new(config.sessions_dir()));
    Orchestrator::new(collaborators, sessions)
}
