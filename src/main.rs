use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use expert_builder::config::AssistantConfig;
use expert_builder::expert::{ExpertProfile, FieldValue};
use expert_builder::graph::{ExpertGraph, TurnEvent};
use expert_builder::llm::create_provider;
use expert_builder::memory::LlmProfileExtractor;
use expert_builder::session::ExpertAssistant;
use expert_builder::store::{ExpertStore, InMemoryExpertStore, LibSqlExpertStore};

/// Run configuration as a front end would send it: identity plus the
/// profile it currently shows.
fn run_config(thread_id: &str, tenant_id: &str, expert_id: &str, profile: &ExpertProfile) -> serde_json::Value {
    json!({
        "configurable": {
            "thread_id": thread_id,
            "tenant_id": tenant_id,
            "expert_id": expert_id,
            "expert_profile": {
                "name": profile.name.value(),
                "description": profile.description.value(),
                "instructions": profile.instructions.value(),
            }
        }
    })
}

/// Starting profile: only the name, when `EXPERT_NAME` is set.
fn initial_profile() -> ExpertProfile {
    ExpertProfile {
        name: FieldValue::from_input(std::env::var("EXPERT_NAME").ok().as_deref()),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AssistantConfig::from_env().context("Invalid configuration")?;
    let llm = create_provider(&config.llm_config()?).context("Failed to create LLM provider")?;

    let store: Arc<dyn ExpertStore> = match &config.db_path {
        Some(path) => Arc::new(
            LibSqlExpertStore::new_local(path)
                .await
                .with_context(|| format!("Failed to open database at {}", path.display()))?,
        ),
        None => Arc::new(InMemoryExpertStore::new()),
    };

    let extractor = Arc::new(LlmProfileExtractor::new(Arc::clone(&llm)));
    let graph = ExpertGraph::new(llm, extractor)
        .with_store(store)
        .with_config(config.graph.clone());
    let assistant = ExpertAssistant::new(graph);

    let thread_id = std::env::var("EXPERT_THREAD_ID").unwrap_or_else(|_| "1".to_string());
    let tenant_id = std::env::var("EXPERT_TENANT_ID").unwrap_or_else(|_| "default-tenant".to_string());
    let expert_id = std::env::var("EXPERT_ID").unwrap_or_else(|_| "default-expert".to_string());
    let mut profile = initial_profile();

    eprintln!("Expert Builder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Thread: {thread_id}  Tenant: {tenant_id}  Expert: {expert_id}");
    eprintln!("   Type a message and press Enter. /profile to show, /reset to start over, /quit to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {
                eprint!("> ");
                continue;
            }
            "/quit" | "/exit" => break,
            "/reset" => {
                assistant.threads().remove(&thread_id).await;
                profile = initial_profile();
                println!("\nConversation cleared.\n");
                eprint!("> ");
                continue;
            }
            "/profile" => {
                println!("\n{}\n", profile.render());
                eprint!("> ");
                continue;
            }
            _ => {}
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            let mut events = UnboundedReceiverStream::new(rx);
            let mut streamed = false;
            while let Some(event) = events.next().await {
                match event {
                    TurnEvent::Token(token) => {
                        print!("{token}");
                        let _ = std::io::stdout().flush();
                        streamed = true;
                    }
                    TurnEvent::NodeStarted(node) => tracing::debug!(%node, "node started"),
                    TurnEvent::ProfileUpdated(_) | TurnEvent::Finished { .. } => {}
                }
            }
            streamed
        });

        let run = run_config(&thread_id, &tenant_id, &expert_id, &profile);
        let result = assistant.send_streaming(Some(&run), line, tx).await;
        let streamed = printer.await.unwrap_or(false);

        match result {
            Ok(reply) => {
                if !streamed {
                    print!("{}", reply.reply);
                }
                println!("\n");
                profile = reply.profile;
            }
            Err(e) => {
                tracing::error!(error = %e, "Turn failed");
                println!("\n{}\n", e.user_message());
            }
        }
        eprint!("> ");
    }

    Ok(())
}
