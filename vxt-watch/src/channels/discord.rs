use crate::AppState;
use crate::channels::{channel_link, ChatMessage, ChatPlatform, ControlButton};
use crate::retweet::handler::{is_relay_candidate, ChannelReporter};
use crate::retweet::{extract_tweet_id, process_relay_message, wait_for_embed, ErrorReporter};
use crate::thread_status::{
    format_thread_name, parse_control_id, plan_transition, status_from_name, ThreadStatus,
    CONTROL_ID_PREFIX,
};
use async_trait::async_trait;
use dashmap::DashSet;
use once_cell::sync::OnceCell;
use serenity::all::{
    ButtonStyle, ChannelId, ChannelType, Client, CommandInteraction, CommandOptionType,
    ComponentInteraction, Context, CreateActionRow, CreateButton, CreateCommand,
    CreateCommandOption, CreateInteractionResponse, CreateInteractionResponseMessage,
    CreateMessage, CreateThread, EditThread, EventHandler, GatewayIntents, GetMessages,
    GuildChannel, Http, Interaction, Message, MessageId, Reaction, ReactionType, Ready, UserId,
};
use std::sync::Arc;

/// Reaction that asks the bot to open a triage thread for a VXT message
const THREAD_TRIGGER_REACTION: &str = "👀";

pub const CREATE_THREAD_COMMAND: &str = "create-thread";
pub const ADD_STATUS_BUTTONS_COMMAND: &str = "add-status-buttons";

/// serenity-backed implementation of the chat platform port
pub struct DiscordPlatform {
    http: Arc<Http>,
    bot_id: UserId,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, bot_id: UserId) -> Self {
        Self { http, bot_id }
    }
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot_id
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<ChatMessage, String> {
        channel_id
            .message(&self.http, message_id)
            .await
            .map(|m| ChatMessage::from(&m))
            .map_err(|e| format!("Failed to fetch message {}: {}", message_id, e))
    }

    async fn recent_messages(
        &self,
        channel_id: ChannelId,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, String> {
        channel_id
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map(|messages| messages.iter().map(ChatMessage::from).collect())
            .map_err(|e| format!("Failed to fetch messages of {}: {}", channel_id, e))
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        buttons: &[ControlButton],
    ) -> Result<MessageId, String> {
        let mut builder = CreateMessage::new().content(content);
        if !buttons.is_empty() {
            let row = buttons
                .iter()
                .map(|b| {
                    CreateButton::new(b.custom_id.clone())
                        .label(b.label.clone())
                        .style(ButtonStyle::Primary)
                })
                .collect();
            builder = builder.components(vec![CreateActionRow::Buttons(row)]);
        }

        channel_id
            .send_message(&self.http, builder)
            .await
            .map(|m| m.id)
            .map_err(|e| format!("Failed to send message to {}: {}", channel_id, e))
    }

    async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<(), String> {
        channel_id
            .delete_message(&self.http, message_id)
            .await
            .map_err(|e| format!("Failed to delete message {}: {}", message_id, e))
    }

    async fn react(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        reaction: &str,
    ) -> Result<(), String> {
        let reaction_type = ReactionType::try_from(reaction.to_string())
            .map_err(|e| format!("Invalid reaction '{}': {}", reaction, e))?;
        channel_id
            .create_reaction(&self.http, message_id, reaction_type)
            .await
            .map_err(|e| format!("Failed to react to message {}: {}", message_id, e))
    }
}

fn is_thread(channel: &GuildChannel) -> bool {
    is_thread_kind(channel.kind)
}

fn is_thread_kind(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

fn ephemeral(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// Slash commands registered in the configured guild
fn command_definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new(CREATE_THREAD_COMMAND)
            .description("Create a new bug report thread")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "name",
                    "The name for the thread (without emoji)",
                )
                .required(true),
            ),
        CreateCommand::new(ADD_STATUS_BUTTONS_COMMAND)
            .description("Add status control buttons to an existing thread"),
    ]
}

/// Channels already seen not to be threads. A channel never changes kind,
/// so messages in them need no channel fetch.
#[derive(Default)]
struct NonThreadChannels(DashSet<ChannelId>);

impl NonThreadChannels {
    fn contains(&self, channel_id: ChannelId) -> bool {
        self.0.contains(&channel_id)
    }

    /// Pass threads through; remember anything else
    fn threads_only(&self, channel: GuildChannel) -> Option<GuildChannel> {
        if is_thread(&channel) {
            return Some(channel);
        }
        self.0.insert(channel.id);
        None
    }
}

struct DiscordHandler {
    state: Arc<AppState>,
    bot_id: OnceCell<UserId>,
    non_threads: NonThreadChannels,
}

impl DiscordHandler {
    /// Platform handle for this event; the bot ID is known after `ready`
    async fn platform(&self, ctx: &Context) -> Result<DiscordPlatform, String> {
        let bot_id = match self.bot_id.get() {
            Some(id) => *id,
            None => {
                let user = ctx
                    .http
                    .get_current_user()
                    .await
                    .map_err(|e| format!("Failed to get current user: {}", e))?;
                *self.bot_id.get_or_init(|| user.id)
            }
        };
        Ok(DiscordPlatform::new(ctx.http.clone(), bot_id))
    }

    async fn guild_channel(&self, ctx: &Context, channel_id: ChannelId) -> Option<GuildChannel> {
        match channel_id.to_channel(ctx).await {
            Ok(channel) => channel.guild(),
            Err(e) => {
                log::debug!("Discord: Failed to fetch channel {}: {}", channel_id, e);
                None
            }
        }
    }

    async fn thread(&self, ctx: &Context, channel_id: ChannelId) -> Option<GuildChannel> {
        self.guild_channel(ctx, channel_id)
            .await
            .filter(is_thread)
    }

    fn reporter<'a>(&self, platform: &'a DiscordPlatform) -> ChannelReporter<'a> {
        ChannelReporter::new(platform, self.state.settings.error_channel)
    }

    /// Open a triage thread on a VXT message, named after the tweet's author
    async fn open_thread_for_message(
        &self,
        ctx: &Context,
        platform: &DiscordPlatform,
        message: &ChatMessage,
        requested_by: UserId,
    ) -> Result<(), String> {
        let Some(with_embed) = wait_for_embed(platform, message, &self.state.embed_policy).await?
        else {
            log::info!("Discord: No embed found for thread creation");
            return Ok(());
        };

        let Some(author_name) = with_embed
            .first_embed()
            .and_then(|embed| embed.author_name.as_deref())
        else {
            log::info!("Discord: No author name found in embed");
            return Ok(());
        };

        let is_text_channel = self
            .guild_channel(ctx, message.channel_id)
            .await
            .is_some_and(|c| c.kind == ChannelType::Text);
        if !is_text_channel {
            log::info!("Discord: Cannot create thread in non-text channel");
            return Ok(());
        }

        let initial = ThreadStatus::INITIAL;
        let thread = message
            .channel_id
            .create_thread_from_message(
                &ctx.http,
                message.id,
                CreateThread::new(format_thread_name(author_name, initial)),
            )
            .await
            .map_err(|e| format!("Failed to create thread: {}", e))?;

        if let Some(tweet_id) = extract_tweet_id(&message.content) {
            thread
                .id
                .say(&ctx.http, format!("https://fxtwitter.com/i/status/{}", tweet_id))
                .await
                .map_err(|e| format!("Failed to send tweet link: {}", e))?;
        }
        thread
            .id
            .say(&ctx.http, format!("<@{}>", requested_by))
            .await
            .map_err(|e| format!("Failed to invite user: {}", e))?;

        self.state
            .controls
            .ensure_at_bottom(platform, thread.id, initial)
            .await?;

        log::info!("Discord: Created thread {} ({})", thread.id, thread.name);
        Ok(())
    }

    async fn handle_status_button(&self, ctx: &Context, component: &ComponentInteraction) {
        let custom_id = component.data.custom_id.as_str();
        if !custom_id.starts_with(CONTROL_ID_PREFIX) {
            return;
        }

        let respond = move |content: String| async move {
            if let Err(e) = component.create_response(&ctx.http, ephemeral(content)).await {
                log::error!("Discord: Failed to reply to button press: {}", e);
            }
        };

        let Some(target) = parse_control_id(custom_id) else {
            respond(format!("Unknown status button '{}'.", custom_id)).await;
            return;
        };

        let Some(thread) = self.thread(ctx, component.channel_id).await else {
            respond("This command can only be used in threads.".to_string()).await;
            return;
        };

        // Validate before touching the thread name
        let new_name = match plan_transition(&thread.name, target) {
            Ok(name) => name,
            Err(e) => {
                respond(e.to_string()).await;
                return;
            }
        };

        let platform = match self.platform(ctx).await {
            Ok(p) => p,
            Err(e) => {
                log::error!("Discord: {}", e);
                respond("An error occurred while updating the status.".to_string()).await;
                return;
            }
        };

        if let Err(e) = thread
            .id
            .edit_thread(&ctx.http, EditThread::new().name(new_name))
            .await
        {
            log::error!("Discord: Failed to rename thread {}: {}", thread.id, e);
            let link = channel_link(Some(thread.guild_id), thread.id);
            self.reporter(&platform)
                .report(&format!("Error updating thread status: {}", e), Some(&link))
                .await;
            respond("An error occurred while updating the status.".to_string()).await;
            return;
        }

        if let Err(e) = component
            .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
            .await
        {
            log::warn!("Discord: Failed to acknowledge button press: {}", e);
        }

        log::info!(
            "Thread status: Thread {} status updated to {}",
            thread.id,
            target.label()
        );

        if let Err(e) = self
            .state
            .controls
            .ensure_at_bottom(&platform, thread.id, target)
            .await
        {
            log::error!("Discord: {}", e);
            let link = channel_link(Some(thread.guild_id), thread.id);
            self.reporter(&platform).report(&e, Some(&link)).await;
        }
    }

    async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        let result = match command.data.name.as_str() {
            CREATE_THREAD_COMMAND => self.create_thread_command(ctx, command).await,
            ADD_STATUS_BUTTONS_COMMAND => self.add_status_buttons_command(ctx, command).await,
            _ => return,
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Discord: /{} failed: {}", command.data.name, e);
                if let Ok(platform) = self.platform(ctx).await {
                    let link = channel_link(command.guild_id, command.channel_id);
                    self.reporter(&platform)
                        .report(
                            &format!("Error running /{}: {}", command.data.name, e),
                            Some(&link),
                        )
                        .await;
                }
                match command.data.name.as_str() {
                    CREATE_THREAD_COMMAND => "An error occurred while creating the thread.",
                    _ => "An error occurred while adding status buttons.",
                }
                .to_string()
            }
        };

        if let Err(e) = command.create_response(&ctx.http, ephemeral(reply)).await {
            log::error!("Discord: Failed to reply to /{}: {}", command.data.name, e);
        }
    }

    /// `/create-thread name:<text>`; returns the ephemeral reply
    async fn create_thread_command(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
    ) -> Result<String, String> {
        let Some(name) = command
            .data
            .options
            .iter()
            .find(|o| o.name == "name")
            .and_then(|o| o.value.as_str())
        else {
            return Ok("Please provide a thread name.".to_string());
        };

        if self.state.settings.channel(command.channel_id).is_none() {
            return Ok("This command can only be used in monitored channels.".to_string());
        }

        let is_text_channel = self
            .guild_channel(ctx, command.channel_id)
            .await
            .is_some_and(|c| c.kind == ChannelType::Text);
        if !is_text_channel {
            return Ok("This command can only be used in text channels.".to_string());
        }

        let platform = self.platform(ctx).await?;
        let initial = ThreadStatus::INITIAL;
        let reason = format!("Created by {} via command", command.user.name);
        let thread = command
            .channel_id
            .create_thread(
                &ctx.http,
                CreateThread::new(format_thread_name(name, initial))
                    .kind(ChannelType::PublicThread)
                    .audit_log_reason(&reason),
            )
            .await
            .map_err(|e| format!("Failed to create thread: {}", e))?;

        thread
            .id
            .say(&ctx.http, format!("<@{}>", command.user.id))
            .await
            .map_err(|e| format!("Failed to invite user: {}", e))?;

        self.state
            .controls
            .ensure_at_bottom(&platform, thread.id, initial)
            .await?;

        log::info!(
            "Discord: {} created thread {} via command",
            command.user.name,
            thread.id
        );
        Ok(format!("Thread created: <#{}>", thread.id))
    }

    /// `/add-status-buttons`; returns the ephemeral reply
    async fn add_status_buttons_command(
        &self,
        ctx: &Context,
        command: &CommandInteraction,
    ) -> Result<String, String> {
        let Some(thread) = self.thread(ctx, command.channel_id).await else {
            return Ok("This command can only be used in threads.".to_string());
        };

        let Some(status) = status_from_name(&thread.name) else {
            return Ok(
                "Could not determine thread status. Please ensure the thread name has a status emoji prefix."
                    .to_string(),
            );
        };

        let platform = self.platform(ctx).await?;
        self.state
            .controls
            .ensure_at_bottom(&platform, thread.id, status)
            .await?;

        Ok("Status buttons added successfully!".to_string())
    }
}

#[serenity::async_trait]
impl EventHandler for DiscordHandler {
    async fn message(&self, ctx: Context, msg: Message) {
        let platform = match self.platform(&ctx).await {
            Ok(p) => p,
            Err(e) => {
                log::error!("Discord: {}", e);
                return;
            }
        };

        // Our own control messages would otherwise chase themselves
        if msg.author.id == platform.bot_user_id() {
            return;
        }

        let message = ChatMessage::from(&msg);
        let settings = &self.state.settings;

        if settings.channel(msg.channel_id).is_some() {
            if is_relay_candidate(settings, &message) {
                process_relay_message(
                    &platform,
                    settings,
                    &message,
                    &self.reporter(&platform),
                    &self.state.embed_policy,
                )
                .await;
            }
            return;
        }

        // Any activity in a status-tracked thread moves the controls back to the bottom
        if msg.guild_id.is_none() || self.non_threads.contains(msg.channel_id) {
            return;
        }
        let Some(thread) = self
            .guild_channel(&ctx, msg.channel_id)
            .await
            .and_then(|channel| self.non_threads.threads_only(channel))
        else {
            return;
        };
        let Some(status) = status_from_name(&thread.name) else {
            return;
        };

        if let Err(e) = self
            .state
            .controls
            .ensure_at_bottom(&platform, thread.id, status)
            .await
        {
            log::error!("Discord: {}", e);
            self.reporter(&platform).report(&e, Some(&message.link())).await;
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        if !matches!(&reaction.emoji, ReactionType::Unicode(name) if name == THREAD_TRIGGER_REACTION)
        {
            return;
        }

        let user = match reaction.user(&ctx).await {
            Ok(user) => user,
            Err(e) => {
                log::error!("Discord: Error fetching reaction user: {}", e);
                return;
            }
        };
        if user.bot {
            return;
        }

        let msg = match reaction.message(&ctx).await {
            Ok(msg) => msg,
            Err(e) => {
                log::error!("Discord: Error fetching message: {}", e);
                return;
            }
        };

        let settings = &self.state.settings;
        if settings.channel(msg.channel_id).is_none() || msg.author.id != settings.vxt_bot {
            return;
        }

        let platform = match self.platform(&ctx).await {
            Ok(p) => p,
            Err(e) => {
                log::error!("Discord: {}", e);
                return;
            }
        };

        let message = ChatMessage::from(&msg);
        if let Err(e) = self
            .open_thread_for_message(&ctx, &platform, &message, user.id)
            .await
        {
            log::error!("Discord: Error creating thread: {}", e);
            self.reporter(&platform)
                .report(&format!("Error creating thread: {}", e), Some(&message.link()))
                .await;
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Component(component) => {
                self.handle_status_button(&ctx, &component).await
            }
            Interaction::Command(command) => self.handle_command(&ctx, &command).await,
            _ => {}
        }
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        log::info!("Discord: Bot connected as {}", ready.user.name);
        let _ = self.bot_id.set(ready.user.id);

        log::info!("Discord: Registering slash commands...");
        match self
            .state
            .settings
            .guild
            .set_commands(&ctx.http, command_definitions())
            .await
        {
            Ok(commands) => log::info!("Discord: Registered {} slash commands", commands.len()),
            Err(e) => log::error!("Discord: Error registering slash commands: {}", e),
        }
    }
}

/// Connect to Discord and handle events until Ctrl-C or a fatal client error
pub async fn start_discord_listener(bot_token: &str, state: Arc<AppState>) -> Result<(), String> {
    log::info!("Starting Discord listener");

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = DiscordHandler {
        state,
        bot_id: OnceCell::new(),
        non_threads: NonThreadChannels::default(),
    };

    let mut client = Client::builder(bot_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| format!("Failed to create Discord client: {}", e))?;

    log::info!("Discord: Client created successfully");

    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("Discord listener received shutdown signal");
            shard_manager.shutdown_all().await;
        }
        result = client.start() => {
            if let Err(e) = result {
                let error = format!("Discord client error: {}", e);
                log::error!("{}", error);
                return Err(error);
            }
            log::info!("Discord listener stopped");
        }
    }

    Ok(())
}
