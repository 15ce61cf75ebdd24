use crate::router::Router;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{error, warn};

/// Bot commands
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Check membership, then show the file list or deliver a deep-linked file
    #[command(description = "Show the file list.")]
    Start(String),
    /// Show usage help
    #[command(description = "Show help.")]
    Help,
}

/// Safely extracts the sender id from a message
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn get_first_name(msg: &Message) -> String {
    msg.from
        .as_ref()
        .map(|u| u.first_name.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "there".to_string())
}

/// Dispatcher tree: commands and button presses, everything else is ignored
#[must_use]
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

/// Command endpoint
///
/// # Errors
///
/// Never fails; router errors are logged.
pub async fn handle_command(
    msg: Message,
    cmd: Command,
    router: Arc<Router>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id.0;
    let user_id = get_user_id_safe(&msg);
    let res = match cmd {
        Command::Start(param) => {
            router
                .on_start(chat_id, user_id, &get_first_name(&msg), &param)
                .await
        }
        Command::Help => router.on_help(chat_id).await,
    };
    if let Err(e) = res {
        error!(user_id, "Command error: {e}");
    }
    respond(())
}

/// Button endpoint. Every query is answered so the client stops its spinner.
///
/// # Errors
///
/// Never fails; router and answer errors are logged.
pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    router: Arc<Router>,
) -> Result<(), teloxide::RequestError> {
    let user_id = q.from.id.0.cast_signed();
    let chat_id = q
        .message
        .as_ref()
        .map_or(user_id, |m| m.chat().id.0);
    let data = q.data.as_deref().unwrap_or_default();

    let reply = match router
        .on_callback(chat_id, user_id, &q.from.first_name, data)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            error!(user_id, data, "Callback error: {e}");
            Default::default()
        }
    };

    let mut answer = bot.answer_callback_query(q.id.clone());
    if let Some(text) = reply.text {
        answer = answer.text(text).show_alert(reply.alert);
    }
    if let Err(e) = answer.await {
        warn!(user_id, "Failed to answer callback query: {e}");
    }
    respond(())
}
