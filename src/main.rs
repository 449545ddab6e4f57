use clap::Parser;
use chunked_upload::cli::{execute_command, Cli};
use chunked_upload::Coordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let coordinator = Coordinator::from_config(&cli.config()).await?;

    if let Some(command) = cli.command {
        execute_command(&coordinator, command).await?;
    }

    Ok(())
}
