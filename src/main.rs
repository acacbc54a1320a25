use std::sync::Arc;

use secrecy::SecretString;

use attention_bot::audit::{AuditLogger, AuditRecord, WebhookSink};
use attention_bot::cache::SharedCache;
use attention_bot::commands::{CommandRegistry, HelpCommand};
use attention_bot::config::BotConfig;
use attention_bot::gate::GuildGate;
use attention_bot::platform::gateway::{self, GatewayEvent};
use attention_bot::platform::rest::DiscordRestClient;
use attention_bot::platform::ChatClient;
use attention_bot::router::{MessageRouter, RouterDeps};
use attention_bot::scheduler::{RemindScheduler, spawn_tick_loop};
use attention_bot::store::{FirebaseStore, JobStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let token = std::env::var("DISCORD_TOKEN").unwrap_or_else(|_| {
        eprintln!("Error: DISCORD_TOKEN not set");
        eprintln!("  export DISCORD_TOKEN=...");
        std::process::exit(1);
    });
    let gateway_token = SecretString::from(token.clone());
    let rest_token = SecretString::from(token);

    let webhook_url = std::env::var("LOGGER_WEBHOOK_URL").unwrap_or_else(|_| {
        eprintln!("Error: LOGGER_WEBHOOK_URL not set");
        eprintln!("  export LOGGER_WEBHOOK_URL=https://discord.com/api/webhooks/...");
        std::process::exit(1);
    });

    let store_url = std::env::var("STORE_BASE_URL").unwrap_or_else(|_| {
        eprintln!("Error: STORE_BASE_URL not set");
        eprintln!("  export STORE_BASE_URL=https://<project>.firebaseio.com");
        std::process::exit(1);
    });
    let store_auth = std::env::var("STORE_AUTH_TOKEN").ok().map(SecretString::from);

    let mut config = BotConfig::default();
    if let Ok(prefix) = std::env::var("COMMAND_PREFIX") {
        config.default_prefix = prefix;
    }

    eprintln!("🔔 Attention Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Prefix: {}", config.default_prefix);
    eprintln!("   Store: {}", store_url);

    let store: Arc<dyn JobStore> = Arc::new(FirebaseStore::new(store_url, store_auth));

    let cache = Arc::new(SharedCache::new());
    if let Err(e) = cache.hydrate(&*store).await {
        eprintln!("   Warning: cache hydration failed: {}", e);
    }

    // Connect the gateway and wait for our identity before wiring the rest.
    let (mut events, _gateway_handle) = gateway::spawn(gateway_token);
    let (user_id, tag) = loop {
        match events.recv().await {
            Some(GatewayEvent::Ready { user_id, tag }) => break (user_id, tag),
            Some(_) => continue,
            None => anyhow::bail!("gateway closed before READY"),
        }
    };
    tracing::info!(user_id = %user_id, tag = %tag, "Gateway ready");

    let client: Arc<dyn ChatClient> = Arc::new(DiscordRestClient::new(rest_token, user_id));
    let audit = Arc::new(AuditLogger::new(
        Arc::new(WebhookSink::new(webhook_url)),
        Arc::clone(&client),
    ));

    // Startup announcement, matching every other record's shape.
    audit
        .ship(AuditRecord {
            content: format!("`{}` {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"), tag),
            ..AuditRecord::default()
        })
        .await;

    let mut registry = CommandRegistry::new();
    registry.register(Arc::new(HelpCommand::new(
        Arc::clone(&cache),
        config.default_prefix.clone(),
    )));
    eprintln!("   Commands: {} registered", registry.len());

    let gate = Arc::new(GuildGate::new(config.cooldown));

    let scheduler = Arc::new(RemindScheduler::new(
        Arc::clone(&client),
        Arc::clone(&store),
        Arc::clone(&audit),
        config.max_retry_times,
    ));
    // One guard serializes every periodic job against the others.
    let tick_guard = Arc::new(tokio::sync::Mutex::new(()));
    let _tick_handle = spawn_tick_loop(scheduler, config.tick_interval, tick_guard);

    let router = Arc::new(MessageRouter::new(RouterDeps {
        client,
        store,
        cache,
        gate,
        registry,
        audit,
        config,
    })?);

    while let Some(event) = events.recv().await {
        match event {
            GatewayEvent::Message(message) => {
                // One task per message so one guild's command never blocks
                // another guild's dispatch.
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    router.handle_message(message).await;
                });
            }
            GatewayEvent::Ready { tag, .. } => {
                tracing::info!(tag = %tag, "Gateway session resumed");
            }
        }
    }

    Ok(())
}
