use clap::Parser;
use guestbox::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guestbox=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            guestbox::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Migrate) => {
            guestbox::cli::migrate::run(&cli.config).await?;
        }
        Some(Commands::Archive {
            event,
            album,
            output,
            record,
        }) => {
            guestbox::cli::archive::run(&cli.config, event, album, &output, record).await?;
        }
        Some(Commands::Doctor) => {
            guestbox::cli::doctor::run(&cli.config).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
