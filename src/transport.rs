//! Transport-agnostic chat operations.
//!
//! The delivery pipeline and router only talk to the messaging platform
//! through [`ChatTransport`]; the Telegram implementation lives in
//! [`crate::bot::telegram`].

use crate::catalog::MediaKind;
use crate::channels::ChannelTarget;
use crate::gate::MemberStatus;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a chat transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The platform rejected the request
    #[error("API error: {0}")]
    Api(String),
    /// The request never reached the platform
    #[error("Network error: {0}")]
    Network(String),
    /// A stored provider file reference is stale or invalid
    #[error("Invalid file reference: {0}")]
    InvalidFileReference(String),
    /// Local I/O failure while preparing an upload
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Action attached to an inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Opens a link
    Url(String),
    /// Sends callback data back to the bot
    Callback(String),
}

/// Inline keyboard button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Button caption
    pub label: String,
    /// What pressing it does
    pub action: ButtonAction,
}

impl Button {
    /// Link button
    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }

    /// Callback button
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }
}

/// Inline keyboard, row by row
pub type Keyboard = Vec<Vec<Button>>;

/// Where the bytes of an outbound file come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePayload {
    /// A local file to upload
    Path {
        /// Location on disk
        path: PathBuf,
        /// File name presented to the user
        file_name: String,
    },
    /// Provider-side file reference, resent without uploading bytes
    Reference(String),
}

/// File to transmit to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFile {
    /// How the platform should present it
    pub kind: MediaKind,
    /// Source of the content
    pub payload: FilePayload,
}

/// Operations the bot needs from the messaging platform.
///
/// Chat and message ids are plain integers so the core logic stays
/// independent of the platform SDK.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Query a user's membership in a channel
    async fn member_status(
        &self,
        channel: &ChannelTarget,
        user_id: i64,
    ) -> Result<MemberStatus, TransportError>;

    /// Send an HTML text message, returning its id
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i32, TransportError>;

    /// Replace the text of a previously sent message
    async fn edit_text(&self, chat_id: i64, message_id: i32, text: &str)
        -> Result<(), TransportError>;

    /// Send a file with an HTML caption, returning the message id
    async fn send_file(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: &str,
    ) -> Result<i32, TransportError>;

    /// Delete a message
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError>;
}
