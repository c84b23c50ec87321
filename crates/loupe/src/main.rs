//! The `loupe` command: a traced chat with a model in the terminal.

#[macro_use]
extern crate tracing;

use std::future::pending;
use std::process::ExitCode;
use std::sync::Arc;

use loupe::config::AppConfig;
use loupe::console::{ConsoleInput, ConsoleOutput};
use loupe::spinner::Spinner;
use loupe::tools::{CurrentTimeTool, RandomDateTool, ReadFileTool};
use loupe_core::ChatBuilder;
use loupe_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use loupe_trace::{Broadcaster, LiveServer, RunningServer};
use owo_colors::OwoColorize;
use tokio::signal;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", format!("Configuration error: {err}").red());
            return ExitCode::FAILURE;
        }
    };

    let mut provider_config =
        OpenAIConfigBuilder::with_api_key(&config.api_key);
    if let Some(base_url) = &config.base_url {
        provider_config = provider_config.with_base_url(base_url);
    }
    if let Some(model) = &config.model {
        provider_config = provider_config.with_model(model);
    }
    let model_provider = OpenAIProvider::new(provider_config.build());

    let mut chat = ChatBuilder::with_model_provider(model_provider)
        .with_system_prompt(&config.system_prompt)
        .with_tool(CurrentTimeTool)
        .with_tool(RandomDateTool)
        .with_tool(ReadFileTool::new())
        .with_output(Arc::new(ConsoleOutput))
        .with_loading_indicator(Arc::new(Spinner::new()))
        .with_tracing(config.tracing.clone());

    let mut server = None;
    if config.live_enabled() {
        let broadcaster = Broadcaster::new();
        server = start_live_server(&config, broadcaster.clone()).await;
        chat = chat.with_broadcaster(broadcaster);
    }
    let mut chat = chat.build();
    debug!("chatting with {}", chat.model_id());

    let mut input = ConsoleInput::new();
    let interrupt = async {
        if signal::ctrl_c().await.is_err() {
            pending::<()>().await;
        }
    };
    let result = chat.run_until(&mut input, interrupt).await;

    if let Some(server) = server {
        server.stop().await;
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", format!("Unexpected error: {err}").red());
            ExitCode::FAILURE
        }
    }
}

async fn start_live_server(
    config: &AppConfig,
    broadcaster: Broadcaster,
) -> Option<RunningServer> {
    let server = LiveServer::new(broadcaster)
        .with_port(config.live_port)
        .with_db_path(&config.tracing.sqlite_path);
    match server.bind().await {
        Ok(server) => {
            println!("{}", format!("Trace viewer: {}", server.url()).cyan());
            Some(server)
        }
        Err(err) => {
            let message = format!("Trace viewer unavailable: {err}");
            eprintln!("{}", message.yellow());
            None
        }
    }
}
