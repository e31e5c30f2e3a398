//! Handlers behind the CLI subcommands.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{Backend, ChatArgs, ServeArgs, ToolsArgs};
use crate::agent::{Orchestrator, OrchestratorOptions};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::mcp::{MCPClient, ServerTarget, ToolServer};
use crate::provider::GeminiProvider;
use crate::session::SessionContext;
use crate::slides::google::DEFAULT_SLIDES_BASE_URL;
use crate::slides::{slides_registry, GoogleSlides, MemorySlides, SlidesBackend, SlidesTool};

const SERVER_INSTRUCTIONS: &str = "Call set-access-token before creating presentations. \
     create-presentation returns the presentation ID that add-custom-slide expects.";

/// `deckbridge serve`: run the presentation tool server on stdio.
pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let config = BridgeConfig::from_env();
    let backend: Arc<dyn SlidesBackend> = match args.backend {
        Backend::Memory => Arc::new(MemorySlides::new()),
        Backend::Google => {
            let base_url = args
                .slides_base_url
                .or(config.slides_base_url)
                .unwrap_or_else(|| DEFAULT_SLIDES_BASE_URL.to_string());
            Arc::new(GoogleSlides::with_base_url(base_url))
        }
    };

    info!(backend = args.backend.as_arg(), "starting tool server");
    ToolServer::new(slides_registry(backend), SessionContext::new())
        .with_info("deckbridge-slides", env!("CARGO_PKG_VERSION"))
        .with_instructions(SERVER_INSTRUCTIONS)
        .serve_stdio()
        .await
}

/// `deckbridge chat`: interactive loop over the configured servers.
pub async fn handle_chat(args: ChatArgs) -> Result<()> {
    let mut config = BridgeConfig::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(system) = args.system {
        config.system_prompt = Some(system);
    }

    let mut provider = GeminiProvider::new(config.model.clone(), config.require_api_key()?);
    if let Some(url) = &config.model_base_url {
        provider = provider.with_base_url(url.clone());
    }

    let mut orchestrator = Orchestrator::new(Arc::new(provider), OrchestratorOptions::from(&config));
    let targets = server_targets(&args.servers, &config, args.backend)?;
    for target in &targets {
        if let Err(e) = orchestrator.connect(target).await {
            orchestrator.cleanup().await;
            return Err(e);
        }
    }

    if let Some(token) = args.token {
        push_access_token(&orchestrator, &token).await;
    }

    let outcome = chat_loop(&mut orchestrator).await;
    orchestrator.cleanup().await;
    outcome
}

/// `deckbridge tools`: print every tool each server offers.
pub async fn handle_tools(args: ToolsArgs) -> Result<()> {
    let config = BridgeConfig::load(args.config.as_deref())?;
    let targets = server_targets(&args.servers, &config, Backend::Memory)?;

    for target in &targets {
        let mut client = MCPClient::spawn(target, config.request_timeout())?;
        let listed = async {
            client.initialize().await?;
            client.list_tools().await
        }
        .await;
        let closed = client.close().await;
        let tools = listed?;
        closed?;

        println!("{}", target.label());
        for tool in tools {
            let summary = tool.description.lines().next().unwrap_or_default();
            println!("  {:<22} {summary}", tool.name);
        }
    }
    Ok(())
}

async fn chat_loop(orchestrator: &mut Orchestrator) -> Result<()> {
    println!("Deckbridge started. Type your queries or 'quit' to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nQuery: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            break;
        }

        match orchestrator.process_query(query).await {
            Some(reply) => println!("\n{reply}"),
            None => println!("\nNo response. Try rephrasing the question."),
        }
    }
    Ok(())
}

async fn push_access_token(orchestrator: &Orchestrator, token: &str) {
    let tool = SlidesTool::SetAccessToken.to_string();
    let args = serde_json::json!({ "accessToken": token });
    match orchestrator.manual_tool_call(&tool, args).await {
        Ok(result) if result.is_success() => info!("access token stored on tool server"),
        Ok(result) => warn!(message = %result.text(), "tool server rejected the access token"),
        Err(e) => warn!(error = %e, "could not push the access token"),
    }
}

/// Servers named on the command line, else those in the config, else this
/// binary's own `serve` subcommand.
fn server_targets(args: &[String], config: &BridgeConfig, backend: Backend) -> Result<Vec<ServerTarget>> {
    if !args.is_empty() {
        return args.iter().map(|arg| target_from_arg(arg)).collect();
    }
    if !config.servers.is_empty() {
        return Ok(config.servers.clone());
    }
    let exe = std::env::current_exe()
        .map_err(|e| BridgeError::Configuration(format!("cannot locate own executable: {e}")))?;
    Ok(vec![ServerTarget::new(
        exe.display().to_string(),
        vec!["serve".into(), "--backend".into(), backend.as_arg().into()],
    )])
}

fn target_from_arg(arg: &str) -> Result<ServerTarget> {
    match Path::new(arg).extension().and_then(|e| e.to_str()) {
        Some("js" | "py") => ServerTarget::from_script(arg),
        _ => Ok(ServerTarget::new(arg, Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_executables_become_targets() {
        assert_eq!(target_from_arg("index.js").unwrap().command, "node");
        let exe = target_from_arg("/usr/local/bin/slides-server").unwrap();
        assert_eq!(exe.command, "/usr/local/bin/slides-server");
        assert!(exe.args.is_empty());
    }

    #[test]
    fn configured_servers_are_used_when_none_given() {
        let config = BridgeConfig {
            servers: vec![ServerTarget::new("node", vec!["a.js".into()])],
            ..Default::default()
        };
        let targets = server_targets(&[], &config, Backend::Memory).unwrap();
        assert_eq!(targets, config.servers);
    }

    #[test]
    fn falls_back_to_the_builtin_server() {
        let targets = server_targets(&[], &BridgeConfig::default(), Backend::Memory).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].args, vec!["serve", "--backend", "memory"]);
    }
}
