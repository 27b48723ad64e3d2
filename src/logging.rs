use env_logger::{Builder, Env};

pub const LOG_ENV: &str = "SCOUT_LOG";

/// Install env_logger with the filter from `SCOUT_LOG`, `info` when unset. A second call is a no-op.
pub fn init_from_env() {
    let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, "info"))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_from_env();
        init_from_env();
        log::info!("logger installed");
    }
}
