use chart_research_pipeline::{build_chat_model, run_agent, Result, Settings};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_QUERY: &str = "Give analysis of AI growth in last 5 years";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment variables
    dotenv::dotenv().ok();

    // Logs go to stderr; stdout carries only the answer
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let query = query_from_args(std::env::args().skip(1));

    match render(answer(&query).await) {
        Ok(answer) => {
            println!("{}", answer);
            ExitCode::SUCCESS
        }
        Err(report) => {
            eprintln!("{}", report);
            ExitCode::FAILURE
        }
    }
}

async fn answer(query: &str) -> Result<String> {
    let settings = Settings::from_env()?;
    let model = build_chat_model(&settings)?;

    info!(query = %query, "Running research pipeline");

    run_agent(model, query).await
}

/// Positional arguments joined into one query, or the demo query
fn query_from_args(args: impl Iterator<Item = String>) -> String {
    let args: Vec<String> = args.collect();
    if args.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        args.join(" ")
    }
}

/// The stdout answer, or the single stderr line for a failure
fn render(outcome: Result<String>) -> std::result::Result<String, String> {
    outcome.map_err(|e| format!("Pipeline failed: {}", e))
}
