mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "eastward=debug,eastward_archive=debug"
    } else {
        "eastward=info,eastward_archive=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Configure {
            game_dir,
            fallback_root,
            output_dir,
            show,
        } => {
            commands::configure::handle(game_dir, fallback_root, output_dir, show)?;
        }

        Commands::Extract(args) => {
            let config = Config::load()?;
            commands::extract::handle(&config, args)?;
        }

        Commands::Unpack { inputs, output } => {
            commands::archive::unpack(&inputs, &output)?;
        }

        Commands::Pack {
            input,
            name,
            output,
        } => {
            commands::archive::pack(&input, name.as_deref(), &output)?;
        }

        Commands::List { input } => {
            commands::archive::list(&input)?;
        }

        Commands::Texture { command } => match command {
            TextureCommand::Decode { input, output } => {
                commands::texture::decode(&input, output.as_deref())?;
            }

            TextureCommand::Encode {
                input,
                output,
                bottom_up,
            } => {
                commands::texture::encode(&input, output.as_deref(), bottom_up)?;
            }
        },

        Commands::Tree { metadata, indent } => {
            let config = Config::load()?;
            let source = config.metadata_source(metadata)?;
            commands::metadata::tree(&source, indent)?;
        }

        Commands::Types { metadata } => {
            let config = Config::load()?;
            let source = config.metadata_source(metadata)?;
            commands::metadata::types(&source)?;
        }
    }

    Ok(())
}
