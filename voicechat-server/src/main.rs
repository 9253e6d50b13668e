use anyhow::{Context, bail};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use voicechat_engine::orchestrator::RunOrchestrator;
use voicechat_engine::polling::PollPolicy;
use voicechat_providers::assistants::AssistantsApiConfig;
use voicechat_runtime::ConfigStore;
use voicechat_runtime::OpenAiAssistantBackend;
use voicechat_runtime::defaults::{
    ENV_API_KEY, ENV_ASSISTANT_ID, api_key, apply_env_overrides, config_path, process_env,
};
use voicechat_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let store = ConfigStore::at_path(config_path(process_env));
    let mut cfg = store.load_or_default()?;
    apply_env_overrides(&mut cfg, process_env);

    let Some(key) = api_key(process_env) else {
        bail!("{ENV_API_KEY} is not set");
    };
    if cfg.assistant.assistant_id.trim().is_empty() {
        bail!("no assistant id configured (set {ENV_ASSISTANT_ID} or assistant.assistant_id)");
    }

    let backend = OpenAiAssistantBackend::new(
        AssistantsApiConfig {
            base_url: cfg.assistant.base_url.clone(),
            api_key: key,
        },
        cfg.assistant.assistant_id.clone(),
    );
    let policy = PollPolicy::from_config(&cfg.polling);
    let orchestrator = RunOrchestrator::new(Arc::new(backend), policy);

    let listener = TcpListener::bind(&cfg.server.bind_addr)
        .await
        .with_context(|| format!("bind {}", cfg.server.bind_addr))?;
    log::info!(
        "voicechat server listening on http://{} (assistant {}, max wait {:?})",
        listener.local_addr()?,
        cfg.assistant.assistant_id,
        policy.max_wait
    );

    voicechat_server::serve(listener, AppState::new(orchestrator)).await
}
