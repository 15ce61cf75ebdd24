//! Command and button routing
//!
//! Platform-independent handling of `/start`, `/help` and inline button
//! presses. The teloxide endpoints in [`crate::bot::handlers`] only extract
//! ids and text and call into [`Router`].

use crate::bot::callbacks::{parse_start_param, CallbackAction, StartParam};
use crate::bot::views;
use crate::delivery::{DeliveryPipeline, ResumeOutcome};
use crate::gate::GateResult;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Answer for a button press
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackReply {
    /// Notification text, `None` to just stop the spinner
    pub text: Option<String>,
    /// Show as a modal alert instead of a toast
    pub alert: bool,
}

impl CallbackReply {
    fn silent() -> Self {
        Self::default()
    }

    fn toast(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            alert: false,
        }
    }

    fn alert(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            alert: true,
        }
    }
}

/// Routes user actions to the delivery pipeline
#[derive(Clone)]
pub struct Router {
    pipeline: Arc<DeliveryPipeline>,
}

impl Router {
    /// Create a router over `pipeline`
    #[must_use]
    pub const fn new(pipeline: Arc<DeliveryPipeline>) -> Self {
        Self { pipeline }
    }

    /// Underlying pipeline
    #[must_use]
    pub fn pipeline(&self) -> &DeliveryPipeline {
        &self.pipeline
    }

    /// Handle `/start` with an optional deep-link parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the welcome or menu message cannot be sent.
    pub async fn on_start(
        &self,
        chat_id: i64,
        user_id: i64,
        first_name: &str,
        param: &str,
    ) -> Result<()> {
        match parse_start_param(param) {
            StartParam::Empty => self.show_entry(chat_id, user_id, first_name).await,
            StartParam::Single(key) => {
                info!(user_id, key = %key, "Single file requested");
                self.pipeline.deliver(chat_id, user_id, &key).await;
                Ok(())
            }
            StartParam::Batch(keys) => {
                info!(user_id, files = keys.len(), "Batch requested");
                let outcome = self.pipeline.deliver_batch(chat_id, user_id, &keys).await;
                debug!(user_id, ?outcome, "Batch request finished");
                Ok(())
            }
        }
    }

    /// Handle `/help`
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    pub async fn on_help(&self, chat_id: i64) -> Result<()> {
        self.pipeline
            .transport()
            .send_text(chat_id, views::help_command(), None)
            .await?;
        Ok(())
    }

    /// Handle a button press. Unknown payloads are acknowledged silently.
    ///
    /// # Errors
    ///
    /// Returns an error if a menu or help message cannot be sent.
    pub async fn on_callback(
        &self,
        chat_id: i64,
        user_id: i64,
        first_name: &str,
        data: &str,
    ) -> Result<CallbackReply> {
        let Some(action) = CallbackAction::parse(data) else {
            debug!(user_id, data, "Ignoring unknown callback payload");
            return Ok(CallbackReply::silent());
        };

        match action {
            CallbackAction::CheckMembership => {
                if self.default_gate_passes(user_id).await {
                    self.send_menu(chat_id, first_name).await?;
                    Ok(CallbackReply::toast(views::membership_confirmed()))
                } else {
                    Ok(CallbackReply::alert(views::still_not_joined()))
                }
            }
            CallbackAction::ResumePending(id) => {
                match self.pipeline.resume_batch(chat_id, user_id, &id).await {
                    ResumeOutcome::Missing => Ok(CallbackReply::alert(views::request_expired())),
                    ResumeOutcome::StillBlocked => {
                        Ok(CallbackReply::alert(views::still_not_joined()))
                    }
                    ResumeOutcome::Delivered { .. } => {
                        Ok(CallbackReply::toast(views::membership_confirmed()))
                    }
                }
            }
            CallbackAction::Refresh => {
                if self.default_gate_passes(user_id).await {
                    self.send_menu(chat_id, first_name).await?;
                    Ok(CallbackReply::toast(views::list_refreshed()))
                } else {
                    Ok(CallbackReply::alert(views::still_not_joined()))
                }
            }
            CallbackAction::Help => {
                let text = views::help(self.pipeline.options().delete_after);
                self.pipeline
                    .transport()
                    .send_text(chat_id, &text, Some(views::back_keyboard()))
                    .await?;
                Ok(CallbackReply::silent())
            }
            CallbackAction::BackToMenu => {
                self.send_menu(chat_id, first_name).await?;
                Ok(CallbackReply::silent())
            }
            CallbackAction::Download(idx) => {
                let Some(key) = self
                    .pipeline
                    .catalog()
                    .get_by_index(idx)
                    .map(|entry| entry.key.clone())
                else {
                    return Ok(CallbackReply::alert(views::file_not_found()));
                };
                self.pipeline.deliver(chat_id, user_id, &key).await;
                Ok(CallbackReply::silent())
            }
            CallbackAction::Noop => Ok(CallbackReply::toast(views::nothing_to_do())),
        }
    }

    async fn show_entry(&self, chat_id: i64, user_id: i64, first_name: &str) -> Result<()> {
        let channels = self.pipeline.registry().default_channels();
        match self.pipeline.gate().check_detailed(user_id, channels).await {
            GateResult::Passed => self.send_menu(chat_id, first_name).await,
            GateResult::Blocked { .. } => {
                let text = views::welcome_blocked(first_name, channels);
                let keyboard = views::join_keyboard(channels, &CallbackAction::CheckMembership);
                self.pipeline
                    .transport()
                    .send_text(chat_id, &text, Some(keyboard))
                    .await?;
                Ok(())
            }
        }
    }

    async fn default_gate_passes(&self, user_id: i64) -> bool {
        let channels = self.pipeline.registry().default_channels();
        self.pipeline.gate().is_member(user_id, channels).await
    }

    async fn send_menu(&self, chat_id: i64, first_name: &str) -> Result<()> {
        let catalog = self.pipeline.catalog();
        let text = views::main_menu(
            first_name,
            self.pipeline.options().delete_after,
            catalog.is_empty(),
        );
        self.pipeline
            .transport()
            .send_text(chat_id, &text, Some(views::catalog_keyboard(catalog)))
            .await?;
        Ok(())
    }
}
