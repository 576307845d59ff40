//! Deployment and interaction tooling for the `RaffleV32` and
//! `YieldAggregatorV32` contracts.

pub mod accounts;
pub mod artifacts;
pub mod config;
pub mod deploy;
pub mod front_end;
pub mod network;
pub mod raffle;
pub mod session;
pub mod subscription;
pub mod verify;
pub mod yield_aggregator;

use std::path::Path;
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

/// Loads `path`, or the nearest `.env`, into the process environment.
/// Variables already set win. A missing file is not an error.
pub fn load_env_file(path: Option<&Path>) {
    let loaded = match path {
        Some(path) => dotenv::from_path(path).map(|_| path.to_path_buf()),
        None => dotenv::dotenv(),
    };
    match loaded {
        Err(err) if !err.not_found() => eprintln!("ignoring env file: {err}"),
        _ => {}
    }
}

/// Filter directives from `var`, defaulting to `info`.
pub fn log_filter(var: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs a stderr subscriber filtered by `RUST_LOG`. Load the env file
/// first so a `RUST_LOG` set there applies.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(log_filter("RUST_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn log_filter__reads_directives_loaded_from_env_file() {
        // given
        let dir = tempfile::tempdir().unwrap();
        let env_file = dir.path().join(".env");
        std::fs::write(&env_file, "RAFFLE_DEPLOY_TEST_LOG=deploy_cli=trace\n").unwrap();

        // when
        load_env_file(Some(&env_file));

        // then
        assert_eq!(log_filter("RAFFLE_DEPLOY_TEST_LOG").to_string(), "deploy_cli=trace");
    }

    #[test]
    fn log_filter__defaults_to_info_when_unset() {
        assert_eq!(log_filter("RAFFLE_DEPLOY_TEST_UNSET_LOG").to_string(), "info");
    }

    #[test]
    fn load_env_file__ignores_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        load_env_file(Some(&dir.path().join("absent.env")));
    }
}
