use anyhow::{Context, Result};
use bond_portal::app::App;
use bond_portal::commands::Shell;
use bond_portal::config::Config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables are set directly)
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they do not interleave with shell replies
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bond_portal=info".parse()?),
        )
        .init();

    info!("Starting bond portal");

    let config = Config::from_env()?;
    let app = App::bootstrap(&config).await?;
    let mut shell = Shell::new(app);

    if let Some(greeting) = shell.handle_line("/help").await {
        println!("{}\n\n{}", shell.app().engine().t("common.welcome"), greeting);
    }
    if let Some(status) = shell.handle_line("/status").await {
        println!("{}", status);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        if let Some(reply) = shell.handle_line(&line).await {
            println!("{}", reply);
        }
    }

    info!("Input closed, exiting");
    Ok(())
}
