use neovim_agent::config::{validate_nvim_path, ValidationResult};
use neovim_agent::{logging, Agent, AgentConfig, NeovimEngine, BUILD_VERSION};
use std::process::ExitCode;
use tokio::signal::unix::{signal, SignalKind};

fn main() -> ExitCode {
    let config = match AgentConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("neovim-agent: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_filter);
    tracing::info!(version = BUILD_VERSION, "starting neovim-agent");

    match validate_nvim_path(&config.nvim_path) {
        ValidationResult::Valid { version } => tracing::info!(%version, "neovim validated"),
        ValidationResult::NotFound => {
            tracing::warn!(path = %config.nvim_path, "neovim not found, start will fail")
        }
        ValidationResult::NotExecutable => {
            tracing::warn!(path = %config.nvim_path, "neovim is not executable")
        }
        ValidationResult::InvalidVersion { error } => {
            tracing::warn!(path = %config.nvim_path, %error, "neovim validation failed")
        }
    }

    config.apply_engine_env();

    let engine = NeovimEngine::new(config.nvim_path.clone(), config.clean);
    let mut agent = match Agent::start(&config, Box::new(engine)) {
        Ok(agent) => agent,
        Err(e) => {
            tracing::error!(error = %e, "failed to start agent");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = wait_for_termination() {
        tracing::error!(error = %e, "failed to wait for termination signal");
    }

    agent.shutdown();
    ExitCode::SUCCESS
}

/// Block until SIGINT or SIGTERM
fn wait_for_termination() -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
        tracing::info!("termination signal received");
        Ok(())
    })
}
