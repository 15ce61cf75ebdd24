//! Telegram implementation of [`ChatTransport`].

use crate::catalog::MediaKind;
use crate::channels::ChannelTarget;
use crate::gate::{MemberStatus, NotMemberReason};
use crate::transport::{
    ButtonAction, ChatTransport, FilePayload, Keyboard, OutboundFile, TransportError,
};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, ChatMemberStatus, FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    Message, MessageId, ParseMode, Recipient, UserId,
};
use teloxide::RequestError;
use tracing::{debug, warn};
use url::Url;

const ERROR_NOT_MODIFIED: &str = "message is not modified";

/// Error fragments Telegram uses for unusable file references
const STALE_REFERENCE_MARKERS: &[&str] = &[
    "wrong file identifier",
    "wrong remote file",
    "file_id",
    "file reference",
];

/// Telegram Bot API transport
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Wrap a bot handle
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        kind: MediaKind,
        input: InputFile,
        caption: &str,
    ) -> Result<Message, RequestError> {
        match kind {
            MediaKind::Document => {
                self.bot
                    .send_document(chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
            MediaKind::Video => {
                self.bot
                    .send_video(chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
            MediaKind::Audio => {
                self.bot
                    .send_audio(chat_id, input)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .await
            }
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn member_status(
        &self,
        channel: &ChannelTarget,
        user_id: i64,
    ) -> Result<MemberStatus, TransportError> {
        let user = u64::try_from(user_id)
            .map(UserId)
            .map_err(|_| TransportError::Api(format!("invalid user id {user_id}")))?;
        let recipient = match channel {
            ChannelTarget::Username(name) => Recipient::ChannelUsername(name.clone()),
            ChannelTarget::Id(id) => Recipient::Id(ChatId(*id)),
        };

        let member = self
            .bot
            .get_chat_member(recipient, user)
            .await
            .map_err(|e| classify(&e))?;

        Ok(match member.status() {
            ChatMemberStatus::Owner | ChatMemberStatus::Administrator | ChatMemberStatus::Member => {
                MemberStatus::Member
            }
            ChatMemberStatus::Restricted => MemberStatus::NotMember(NotMemberReason::Restricted),
            ChatMemberStatus::Left => MemberStatus::NotMember(NotMemberReason::Left),
            ChatMemberStatus::Banned => MemberStatus::NotMember(NotMemberReason::Kicked),
        })
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i32, TransportError> {
        let mut req = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            req = req.reply_markup(to_markup(keyboard));
        }
        let message = req.await.map_err(|e| classify(&e))?;
        Ok(message.id.0)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
    ) -> Result<(), TransportError> {
        let result = self
            .bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::Html)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains(ERROR_NOT_MODIFIED) => {
                debug!(chat_id, message_id, "Message update skipped: not modified");
                Ok(())
            }
            Err(e) => Err(classify(&e)),
        }
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: &str,
    ) -> Result<i32, TransportError> {
        let chat = ChatId(chat_id);
        let message = match file.payload {
            FilePayload::Reference(reference) => {
                let input = InputFile::file_id(FileId(reference));
                self.send_media(chat, file.kind, input, caption)
                    .await
                    .map_err(|e| classify(&e))?
            }
            FilePayload::Path { path, file_name } => {
                let make_input = || InputFile::file(path.clone()).file_name(file_name.clone());
                match self.send_media(chat, file.kind, make_input(), caption).await {
                    Ok(message) => message,
                    Err(e) if file.kind != MediaKind::Document => {
                        warn!(
                            file_name = %file_name,
                            error = %e,
                            "Failed to send as native media; falling back to document"
                        );
                        self.send_media(chat, MediaKind::Document, make_input(), caption)
                            .await
                            .map_err(|e| classify(&e))?
                    }
                    Err(e) => return Err(classify(&e)),
                }
            }
        };
        Ok(message.id.0)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map(|_| ())
            .map_err(|e| classify(&e))
    }
}

fn to_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.into_iter().map(|row| {
        row.into_iter()
            .map(|button| match button.action {
                ButtonAction::Url(link) => match Url::parse(&link) {
                    Ok(url) => InlineKeyboardButton::url(button.label, url),
                    Err(e) => {
                        warn!(link = %link, error = %e, "Invalid button URL, rendering inert button");
                        InlineKeyboardButton::callback(
                            button.label,
                            crate::bot::callbacks::CALLBACK_NOOP,
                        )
                    }
                },
                ButtonAction::Callback(data) => InlineKeyboardButton::callback(button.label, data),
            })
            .collect::<Vec<_>>()
    }))
}

fn classify(err: &RequestError) -> TransportError {
    match err {
        RequestError::Network(e) => TransportError::Network(e.to_string()),
        other => classify_message(other.to_string()),
    }
}

fn classify_message(message: String) -> TransportError {
    let lower = message.to_lowercase();
    if STALE_REFERENCE_MARKERS.iter().any(|m| lower.contains(m)) {
        TransportError::InvalidFileReference(message)
    } else {
        TransportError::Api(message)
    }
}
