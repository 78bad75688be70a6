//! Command suite.

use std::sync::Arc;

use anyhow::Error;

use derive_more::{Deref, Display, Error};

use packrat_core::{Engine, session::SessionKey, store::FileStore};
use packrat_model::UserId;

use twilight_http::Client;

use twilight_model::{
    application::{
        command::{Command, CommandType},
        interaction::{
            Interaction, InteractionContextType,
            application_command::{CommandData, CommandOptionValue},
        },
    },
    channel::message::{Component, Embed, MessageFlags},
    guild::Permissions,
    http::interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    id::{
        Id,
        marker::{ApplicationMarker, UserMarker},
    },
    oauth::ApplicationIntegrationType,
};

use twilight_util::builder::{
    InteractionResponseDataBuilder,
    command::{CommandBuilder, IntegerBuilder, StringBuilder, UserBuilder},
};

use crate::{config::Config, http::Client as ApiClient, user::to_user_id};

/// Command context.
///
/// Drills some useful things to the command endpoint.
#[derive(Clone, Deref)]
pub struct InteractionContext {
    /// The interaction this request is responding to.
    #[deref]
    pub interaction: Interaction,
    /// HTTP Client used to respond to interactions.
    pub client: Arc<Client>,
    /// HTTP Client used to fetch card data.
    pub api: ApiClient,
    pub engine: Arc<Engine<FileStore>>,
    pub config: Arc<Config>,
    pub application_id: Id<ApplicationMarker>,
}

impl InteractionContext {
    /// The user who triggered the interaction.
    pub fn user_id(&self) -> Result<UserId, Error> {
        self.author_id()
            .map(to_user_id)
            .ok_or_else(|| Error::msg("missing user in interaction"))
    }

    /// The key a session opened by this interaction is stored under.
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.id.get())
    }

    /// Checks if the caller can manage the guild.
    pub fn is_admin(&self) -> bool {
        self.member
            .as_ref()
            .and_then(|member| member.permissions)
            .is_some_and(|permissions| {
                permissions.contains(Permissions::MANAGE_GUILD)
                    || permissions.contains(Permissions::ADMINISTRATOR)
            })
    }

    /// Sends a response to the interaction.
    pub async fn respond(
        &self,
        kind: InteractionResponseType,
        data: Option<InteractionResponseData>,
    ) -> Result<(), Error> {
        self.client
            .interaction(self.application_id)
            .create_response(self.id, &self.token, &InteractionResponse { kind, data })
            .await?;
        Ok(())
    }

    /// Replies with a new message.
    pub async fn reply(&self, data: InteractionResponseData) -> Result<(), Error> {
        self.respond(InteractionResponseType::ChannelMessageWithSource, Some(data))
            .await
    }

    /// Replies with a message only the caller can see.
    pub async fn reply_private(&self, content: impl Into<String>) -> Result<(), Error> {
        self.reply(
            InteractionResponseDataBuilder::new()
                .content(content)
                .flags(MessageFlags::EPHEMERAL)
                .build(),
        )
        .await
    }

    /// Replaces the message a component is attached to.
    pub async fn update(&self, data: InteractionResponseData) -> Result<(), Error> {
        self.respond(InteractionResponseType::UpdateMessage, Some(data))
            .await
    }

    /// Acknowledges a component press without changing anything.
    pub async fn acknowledge(&self) -> Result<(), Error> {
        self.respond(InteractionResponseType::DeferredUpdateMessage, None)
            .await
    }

    /// Shows a loading state, to be replaced with [`edit_deferred`].
    ///
    /// [`edit_deferred`]: InteractionContext::edit_deferred
    pub async fn defer(&self) -> Result<(), Error> {
        self.respond(
            InteractionResponseType::DeferredChannelMessageWithSource,
            None,
        )
        .await
    }

    /// Replaces a deferred response.
    pub async fn edit_deferred(
        &self,
        content: Option<&str>,
        embeds: &[Embed],
        components: &[Component],
    ) -> Result<(), Error> {
        self.client
            .interaction(self.application_id)
            .update_response(&self.token)
            .content(content)
            .embeds(Some(embeds))
            .components(Some(components))
            .await?;
        Ok(())
    }
}

/// A command arrived without an option Discord should have enforced.
#[derive(Debug, Display, Error)]
#[display("invalid command payload")]
pub struct InvalidCommandPayload;

/// Finds a string option.
pub fn string_option<'a>(data: &'a CommandData, name: &str) -> Option<&'a str> {
    data.options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            CommandOptionValue::String(ref value) => Some(value.as_str()),
            _ => None,
        })
}

/// Finds an integer option.
pub fn integer_option(data: &CommandData, name: &str) -> Option<i64> {
    data.options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            CommandOptionValue::Integer(value) => Some(value),
            _ => None,
        })
}

/// Finds a user option.
pub fn user_option(data: &CommandData, name: &str) -> Option<Id<UserMarker>> {
    data.options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| match option.value {
            CommandOptionValue::User(id) => Some(id),
            _ => None,
        })
}

fn guild_command(name: &str, description: &str) -> CommandBuilder {
    CommandBuilder::new(name, description, CommandType::ChatInput)
        .integration_types([ApplicationIntegrationType::GuildInstall])
        .contexts([InteractionContextType::Guild])
}

fn admin_command(name: &str, description: &str) -> CommandBuilder {
    guild_command(name, description).default_member_permissions(Permissions::MANAGE_GUILD)
}

/// Returns a list of commands the bot offers.
pub fn commands() -> [Command; 13] {
    [
        guild_command("pull", "Pulls a pack of 9 cards from a set")
            .option(
                StringBuilder::new("set-id", "The ID of the set to pull from")
                    .autocomplete(true)
                    .required(true),
            )
            .build(),
        guild_command("inventory", "Displays your card collection").build(),
        guild_command("profile", "Displays a collector's profile")
            .option(UserBuilder::new("user", "The collector to look up, yourself by default"))
            .build(),
        guild_command("trade", "Offers one of your cards to another member")
            .option(UserBuilder::new("user", "The member to trade with").required(true))
            .option(
                IntegerBuilder::new("card", "The position of the card in your /inventory")
                    .min_value(1)
                    .required(true),
            )
            .build(),
        guild_command("confirmtrade", "Accepts the trade offered to you").build(),
        guild_command("canceltrade", "Cancels your open trade").build(),
        guild_command("sets", "Lists the sets cards can be pulled from").build(),
        guild_command("help", "Lists all available commands").build(),
        admin_command("lock", "Prevents a set from being pulled")
            .option(
                StringBuilder::new("set-id", "The ID of the set")
                    .autocomplete(true)
                    .required(true),
            )
            .build(),
        admin_command("unlock", "Allows a locked set to be pulled again")
            .option(
                StringBuilder::new("set-id", "The ID of the set")
                    .autocomplete(true)
                    .required(true),
            )
            .build(),
        admin_command("turnon", "Turns the bot on").build(),
        admin_command("turnoff", "Turns the bot off, refusing every command").build(),
        admin_command("stats", "Displays bot statistics").build(),
    ]
}
