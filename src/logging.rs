use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive
pub const ENV_LOG: &str = "NEOVIM_AGENT_LOG";

/// Install the stderr subscriber; later calls are no-ops
///
/// `NEOVIM_AGENT_LOG` wins over `default_filter`.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("debug");
        init("not a valid [filter");
        tracing::info!("logging initialised twice without panicking");
    }
}
