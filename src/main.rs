use std::process::ExitCode;
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use incant::cli::Cli;
use incant::controller::TurnController;
use incant::printer::Printer;
use incant::prompts::{system_instructions_from_env, working_directory};
use incant::providers::{provider_for_id, provider_id_from_env};
use incant::repl::LineDriver;
use incant::session::Session;
use incant::tui::TuiDriver;
use model_provider_ollama::OLLAMA_PROVIDER_ID;
use ollama_api::{OllamaApiClient, OllamaApiConfig, OllamaApiError};
use script_engine::ScriptExecutor;

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let provider_id = provider_id_from_env();

    // Startup validation happens before any session exists. Both failure
    // modes are fatal: the registry being unreachable, and the configured
    // model being absent (which reports the available alternatives).
    if provider_id == OLLAMA_PROVIDER_ID {
        if let Err(message) = validate_startup(&cli.api_url, &cli.model) {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    }

    let provider = match provider_for_id(&provider_id, &cli.api_url, &cli.model) {
        Ok(provider) => provider,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let executor = Arc::new(Mutex::new(ScriptExecutor::new()));
    let instructions = system_instructions_from_env();
    let profile = provider.profile();

    let banner = [
        format!(
            "incant v{} - minimalist coding agent",
            env!("CARGO_PKG_VERSION")
        ),
        format!("Model: {} @ {}", profile.model_id, cli.api_url),
        format!("Working directory: {}", working_directory()),
    ];

    if cli.tui {
        let mut session = Session::new();
        for line in banner {
            session.push_system(line);
        }
        session.push_system("Type a message, \"exit\" to quit, Ctrl+L to clear.");

        let (events_tx, events_rx) = mpsc::channel();
        let controller = TurnController::new(provider, Arc::clone(&executor), events_tx);
        let mut driver =
            TuiDriver::new(session, controller, events_rx, executor, instructions);

        match driver.run() {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("terminal error: {error}");
                ExitCode::FAILURE
            }
        }
    } else {
        let printer = Printer::new(!cli.no_timestamp);
        for line in &banner {
            printer.system(line, 0);
        }

        let one_shot = cli.prompt.clone();
        if one_shot.is_none() {
            printer.system("Type \"exit\" or \"quit\" to exit.", 0);
            println!();
        }

        let mut driver = LineDriver::new(
            Session::new(),
            provider,
            executor,
            printer,
            instructions,
        );

        match one_shot {
            Some(prompt) => {
                driver.run_once(&prompt);
                ExitCode::SUCCESS
            }
            None => match driver.run() {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    eprintln!("input error: {error}");
                    ExitCode::FAILURE
                }
            },
        }
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "incant=debug,script_engine=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Queries the model registry once and verifies the configured model exists.
fn validate_startup(api_url: &str, model: &str) -> Result<(), String> {
    let config = OllamaApiConfig::new(api_url).with_timeout(REGISTRY_TIMEOUT);
    let client = OllamaApiClient::new(config)
        .map_err(|error| format!("Failed to initialize HTTP client: {error}"))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| format!("Failed to initialize async runtime: {error}"))?;

    match runtime.block_on(client.validate_model(model)) {
        Ok(()) => Ok(()),
        Err(OllamaApiError::Request(error)) => Err(format!(
            "Could not connect to Ollama at {api_url}: {error}"
        )),
        Err(error) => Err(error.to_string()),
    }
}
