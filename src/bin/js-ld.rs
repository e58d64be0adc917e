use anyhow::Result;
use clap::Parser;
use js_ld::cli::JsLdCommand;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    if let Err(e) = JsLdCommand::parse().execute() {
        log::error!("{:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
