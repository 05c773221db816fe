use anyhow::Context;
use remote_task::Transport;
use scheduler_core::{
    config::WarnLevel,
    trigger::Trigger,
    workflow::WorkflowEngine,
};
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = Arc::new(super::load_config(root, config)?);

    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }

    let store = super::open_store(root, &config)?;
    let engine = Arc::new(WorkflowEngine::new(config.clone(), Arc::new(Transport::new())));
    let trigger = Trigger::new(engine)
        .context("failed to start trigger")?
        .with_store(store);

    let rt = tokio::runtime::Runtime::new()?;
    let summary = rt.block_on(async {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };
        trigger.run_until(shutdown).await
    })?;

    eprintln!(
        "Stopped: {} run(s) fired, {} tick(s) skipped.",
        summary.fired, summary.skipped
    );
    Ok(())
}
