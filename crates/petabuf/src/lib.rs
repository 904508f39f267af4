use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use spool::EngineConfig;

/// The line printed to the diagnostic stream on any usage error.
pub const USAGE: &str = "usage: ... | petabuf | ...";

/// No flags or positional arguments are recognized. This struct carries no
/// fields on purpose, and disables clap's automatic `--help`/`--version`
/// so that *any* argument — including those two — is rejected.
#[derive(Parser, Debug)]
#[command(
    name = "petabuf",
    disable_help_flag = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
pub struct Args {}

/// Parses `argv`, printing the usage line to stderr and returning an error
/// on anything unrecognized. `main` maps that error to exit code 1, not
/// clap's default exit code 2.
pub fn parse_args<I, T>(argv: I) -> Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Args::try_parse_from(argv).map_err(|_| {
        eprintln!("{USAGE}");
        anyhow::anyhow!("usage error")
    })
}

/// Builds engine configuration from the environment, falling back to
/// compiled-in defaults for the spool directory, page size, and table
/// size.
pub fn config_from_env() -> Result<EngineConfig> {
    let mut config = EngineConfig::default();

    if let Ok(dir) = std::env::var("PETABUF_SPOOL_DIR") {
        config.spool_dir = PathBuf::from(dir);
    }
    if let Ok(raw) = std::env::var("PETABUF_PAGE_SIZE") {
        let page_size: u32 = raw
            .parse()
            .with_context(|| format!("PETABUF_PAGE_SIZE={raw:?} is not a valid page size"))?;
        anyhow::ensure!(page_size > 0, "PETABUF_PAGE_SIZE={raw:?} must be nonzero");
        config.page_size = page_size;
    }
    if let Ok(raw) = std::env::var("PETABUF_TABLE_SIZE") {
        let table_size: u64 = raw
            .parse()
            .with_context(|| format!("PETABUF_TABLE_SIZE={raw:?} is not a valid table size"))?;
        anyhow::ensure!(table_size > 0, "PETABUF_TABLE_SIZE={raw:?} must be nonzero");
        config.table_size = table_size;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_parses_cleanly() {
        assert!(parse_args(["petabuf"]).is_ok());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse_args(["petabuf", "--bogus"]).is_err());
    }

    #[test]
    fn positional_argument_is_rejected() {
        assert!(parse_args(["petabuf", "somefile"]).is_err());
    }

    #[test]
    fn help_flag_is_rejected_like_any_other_unknown_flag() {
        assert!(parse_args(["petabuf", "--help"]).is_err());
    }

    #[test]
    fn env_defaults_match_compiled_in_constants() {
        // SAFETY: test-only, no other test in this process mutates these.
        unsafe {
            std::env::remove_var("PETABUF_SPOOL_DIR");
            std::env::remove_var("PETABUF_PAGE_SIZE");
            std::env::remove_var("PETABUF_TABLE_SIZE");
        }
        let config = config_from_env().unwrap();
        assert_eq!(config.page_size, 1 << 24);
        assert_eq!(config.table_size, 1 << 26);
    }

    #[test]
    fn invalid_page_size_env_var_is_an_error() {
        unsafe {
            std::env::set_var("PETABUF_PAGE_SIZE", "not-a-number");
        }
        let result = config_from_env();
        unsafe {
            std::env::remove_var("PETABUF_PAGE_SIZE");
        }
        assert!(result.is_err());
    }

    #[test]
    fn zero_page_size_env_var_is_rejected_not_a_panic() {
        unsafe {
            std::env::set_var("PETABUF_PAGE_SIZE", "0");
        }
        let result = config_from_env();
        unsafe {
            std::env::remove_var("PETABUF_PAGE_SIZE");
        }
        assert!(result.is_err());
    }

    #[test]
    fn zero_table_size_env_var_is_rejected() {
        unsafe {
            std::env::set_var("PETABUF_TABLE_SIZE", "0");
        }
        let result = config_from_env();
        unsafe {
            std::env::remove_var("PETABUF_TABLE_SIZE");
        }
        assert!(result.is_err());
    }
}
