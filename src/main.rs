use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = housekeep::cli::Cli::parse();

    match cli.command.clone().unwrap_or_default() {
        housekeep::cli::CliCommand::Mcp => {
            let config = housekeep::mcp::ServerConfig {
                data_dir: cli.data_dir.clone(),
                log_filter: cli.log_filter.clone(),
            };
            housekeep::mcp::run_server_blocking(config)?;
        }
        command => {
            housekeep::init_tracing(cli.log_filter.clone())?;
            let invocation = housekeep::config::invocation(&cli)?;
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            housekeep::commands::execute(&invocation, command, &mut handle)?;
        }
    }

    Ok(())
}
