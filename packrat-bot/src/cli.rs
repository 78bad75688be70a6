//! Packrat command-line interface.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Error;

use clap::{Parser, Subcommand};

use packrat_core::store::CollectionStore;
use packrat_model::UserId;

/// The command line arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Subcommands.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Maintenance commands. These run against the collection store and exit
/// without connecting to Discord.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints a user's collection as JSON.
    Show(UserArgs),
    /// Deletes a user's collection.
    Purge(UserArgs),
}

#[derive(clap::Args, Debug)]
pub struct UserArgs {
    /// The Discord id of the user.
    pub user_id: u64,
}

impl UserArgs {
    fn user_id(&self) -> Result<UserId, Error> {
        UserId::new(self.user_id).ok_or_else(|| Error::msg("user id cannot be zero"))
    }
}

/// Runs a command.
pub async fn run_command<S>(command: &Command, store: &S, mut out: impl Write) -> Result<(), Error>
where
    S: CollectionStore,
{
    match command {
        Command::Show(args) => {
            let collection = store.load(args.user_id()?).await;
            serde_json::to_writer_pretty(&mut out, &collection)?;
            writeln!(out)?;
        }
        Command::Purge(args) => {
            let user_id = args.user_id()?;
            store.delete(user_id).await?;
            tracing::info!(%user_id, "purged collection");
            writeln!(out, "purged collection of {}", user_id)?;
        }
    }

    Ok(())
}
