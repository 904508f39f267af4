use std::process::ExitCode;

use anyhow::Result;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    if petabuf::parse_args(std::env::args_os()).is_err() {
        return ExitCode::from(1);
    }

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let config = petabuf::config_from_env()?;
    let mut engine = spool::Engine::bootstrap(config)?;
    engine.run()?;
    Ok(())
}
