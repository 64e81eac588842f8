// Glimpse - Library Entry Point

pub mod constants;
pub mod error;
pub mod config;
pub mod tools;
pub mod db;
pub mod metadata;
pub mod preview;
pub mod scan;
pub mod server;

#[cfg(test)]
mod test_support;

/// Install env_logger. `RUST_LOG` wins over the configured level.
pub fn init_logging(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
