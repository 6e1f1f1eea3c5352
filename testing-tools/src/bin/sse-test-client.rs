use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use events::PgEventLog;
use sea_orm::{ConnectOptions, Database};
use std::sync::Arc;

use testing_tools::api_client::ApiClient;
use testing_tools::auth::TokenMinter;
use testing_tools::output::print_test_summary;
use testing_tools::scenarios::{self, PROBE_MARKING};
use testing_tools::sse_client::Connection;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Stream hub integration testing tool")]
struct Cli {
    /// Base URL of the server (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Secret the server verifies stream tokens with
    #[arg(long, env)]
    jwt_signing_key: String,

    /// Postgres URL of the server's event log; enables the marking filter scenario
    #[arg(long, env)]
    database_url: Option<String>,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, PartialEq)]
enum ScenarioChoice {
    /// Test that streams open with connected and heartbeat frames
    ConnectionTest,
    /// Test that a forged token is refused
    Unauthorized,
    /// Test that a second stream for an identity closes the first
    SingleSession,
    /// Test history replay into an open stream
    History,
    /// Test per-identity filtering of a live event (requires --database-url)
    MarkingFilter,
    /// Run every scenario; the marking filter only with --database-url
    All,
}

async fn connect_publisher(database_url: &str) -> Result<PgEventLog> {
    let mut opt = ConnectOptions::new(database_url.to_string());
    opt.set_schema_search_path(service::DB_SCHEMA);
    let db = Database::connect(opt)
        .await
        .context("Failed to connect to the event log database")?;

    Ok(PgEventLog::new(Arc::new(db), database_url))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    println!("{}", "=== SETUP PHASE ===".bright_white().bold());

    println!("{} Minting stream tokens...", "→".blue());
    let minter = TokenMinter::new(&cli.jwt_signing_key);
    let cleared = minter.mint(
        "Cleared analyst",
        "cleared",
        &[PROBE_MARKING, "TLP:GREEN"],
        false,
    )?;
    let restricted = minter.mint("Restricted analyst", "restricted", &["TLP:GREEN"], false)?;
    for identity in [&cleared, &restricted] {
        println!(
            "{} {} (ID: {}) may see {:?}",
            "✓".green(),
            identity.label,
            identity.id,
            identity.allowed_markings
        );
    }

    let publisher = match &cli.database_url {
        Some(url) => {
            println!("\n{} Connecting to the event log database...", "→".blue());
            Some(connect_publisher(url).await?)
        }
        None => {
            if cli.scenario == ScenarioChoice::MarkingFilter {
                anyhow::bail!("The marking filter scenario requires --database-url");
            }
            None
        }
    };

    let api_client = ApiClient::new(reqwest::Client::new(), cli.base_url.clone());

    // Establish SSE connections
    println!("\n{} Establishing SSE connections...", "→".blue());
    let mut sse1 = Connection::establish(&cli.base_url, &cleared.token, cleared.label.clone()).await?;
    let mut sse2 =
        Connection::establish(&cli.base_url, &restricted.token, restricted.label.clone()).await?;

    println!("{} {} SSE connection established", "✓".green(), cleared.label);
    println!("{} {} SSE connection established", "✓".green(), restricted.label);

    // Run test scenarios
    println!("\n{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();

    match cli.scenario {
        ScenarioChoice::ConnectionTest => {
            results.push(
                scenarios::test_connection(&cleared, &restricted, &mut sse1, &mut sse2).await?,
            );
        }
        ScenarioChoice::Unauthorized => {
            results.push(scenarios::test_unauthorized(&api_client).await?);
        }
        ScenarioChoice::SingleSession => {
            results.push(scenarios::test_single_session(&api_client, &cleared, &mut sse1).await?);
        }
        ScenarioChoice::History => {
            results.push(scenarios::test_history(&api_client, &minter, &cleared, &mut sse1).await?);
        }
        ScenarioChoice::MarkingFilter => {
            if let Some(publisher) = &publisher {
                results.push(
                    scenarios::test_marking_filter(
                        publisher,
                        &cleared,
                        &restricted,
                        &mut sse1,
                        &mut sse2,
                    )
                    .await?,
                );
            }
        }
        ScenarioChoice::All => {
            results.push(
                scenarios::test_connection(&cleared, &restricted, &mut sse1, &mut sse2).await?,
            );
            results.push(scenarios::test_unauthorized(&api_client).await?);
            results.push(scenarios::test_single_session(&api_client, &cleared, &mut sse1).await?);
            results.push(scenarios::test_history(&api_client, &minter, &cleared, &mut sse1).await?);
            match &publisher {
                Some(publisher) => results.push(
                    scenarios::test_marking_filter(
                        publisher,
                        &cleared,
                        &restricted,
                        &mut sse1,
                        &mut sse2,
                    )
                    .await?,
                ),
                None => println!(
                    "\n{} Skipping marking filter (no --database-url)",
                    "→".blue()
                ),
            }
        }
    }

    // Print summary
    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
