//! Delivery pipeline
//!
//! Turns a catalog key into a file in the user's chat: gate, fetch or
//! reference, transmit with caption, then schedule the deletion. Failures end
//! with a message to the user and, when configured, an alert to the operator.

use crate::bot::callbacks::CallbackAction;
use crate::bot::views;
use crate::catalog::{Catalog, FileEntry, FileSource};
use crate::channels::{Channel, ChannelRegistry};
use crate::config::{Settings, PENDING_BATCH_MAX_SIZE};
use crate::fetch::{FetchError, Fetcher};
use crate::gate::{GateResult, MembershipGate};
use crate::pending::PendingBatches;
use crate::scheduler::DeletionScheduler;
use crate::transport::{ChatTransport, FilePayload, OutboundFile, TransportError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that abort the delivery of a single file
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Direct link could not be downloaded
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// The platform refused the file
    #[error("Transmit failed: {0}")]
    Transmit(#[from] TransportError),
}

impl DeliveryError {
    /// Whether the catalog holds a provider reference that no longer works
    #[must_use]
    pub const fn is_stale_reference(&self) -> bool {
        matches!(self, Self::Transmit(TransportError::InvalidFileReference(_)))
    }
}

/// Knobs for the delivery pipeline
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    /// Time a delivered file stays in the chat
    pub delete_after: Duration,
    /// Operator chat that receives failure alerts
    pub admin_chat_id: Option<i64>,
    /// Contact shown to users when a delivery fails
    pub support_contact: Option<String>,
}

impl DeliveryOptions {
    /// Extract the delivery options from the settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            delete_after: settings.delete_after(),
            admin_chat_id: settings.admin_id,
            support_contact: settings.support_contact.clone(),
        }
    }
}

/// Outcome of a batch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Gate passed and every known file was attempted
    Delivered {
        /// Files that reached the chat
        sent: usize,
        /// Files attempted
        total: usize,
    },
    /// Gate failed; the request is parked under `pending_id`
    Blocked {
        /// Id carried by the re-check button
        pending_id: String,
    },
    /// None of the keys exist in the catalog
    Empty,
}

/// Outcome of a re-check for a parked request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// No such request for this user (expired, delivered or foreign)
    Missing,
    /// The user still has not joined; the request stays parked
    StillBlocked,
    /// Gate passed and the request was consumed
    Delivered {
        /// Files that reached the chat
        sent: usize,
        /// Files attempted
        total: usize,
    },
}

/// Everything needed to deliver catalog files
pub struct DeliveryPipeline {
    transport: Arc<dyn ChatTransport>,
    catalog: Arc<Catalog>,
    registry: Arc<ChannelRegistry>,
    gate: MembershipGate,
    fetcher: Fetcher,
    scheduler: DeletionScheduler,
    pending: PendingBatches,
    options: DeliveryOptions,
}

impl DeliveryPipeline {
    /// Wire up a pipeline. The gate and the deletion scheduler share `transport`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        catalog: Arc<Catalog>,
        registry: Arc<ChannelRegistry>,
        fetcher: Fetcher,
        pending: PendingBatches,
        options: DeliveryOptions,
    ) -> Self {
        Self {
            gate: MembershipGate::new(Arc::clone(&transport)),
            scheduler: DeletionScheduler::new(Arc::clone(&transport)),
            transport,
            catalog,
            registry,
            fetcher,
            pending,
            options,
        }
    }

    /// Build a pipeline from the application settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the download client cannot be built.
    pub fn from_settings(
        transport: Arc<dyn ChatTransport>,
        catalog: Arc<Catalog>,
        registry: Arc<ChannelRegistry>,
        settings: &Settings,
    ) -> Result<Self, FetchError> {
        Ok(Self::new(
            transport,
            catalog,
            registry,
            Fetcher::new(settings.download_timeout())?,
            PendingBatches::new(settings.pending_batch_ttl(), PENDING_BATCH_MAX_SIZE),
            DeliveryOptions::from_settings(settings),
        ))
    }

    /// Chat transport
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.transport
    }

    /// File catalog
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Required channel sets
    #[must_use]
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Membership gate
    #[must_use]
    pub const fn gate(&self) -> &MembershipGate {
        &self.gate
    }

    /// Deletion scheduler, shut down by the caller on exit
    #[must_use]
    pub const fn scheduler(&self) -> &DeletionScheduler {
        &self.scheduler
    }

    /// Pending request table
    #[must_use]
    pub const fn pending(&self) -> &PendingBatches {
        &self.pending
    }

    /// Delivery options
    #[must_use]
    pub const fn options(&self) -> &DeliveryOptions {
        &self.options
    }

    /// Deliver one file by key.
    ///
    /// Returns `true` only if the file reached the chat. A blocked request is
    /// parked so the re-check button can finish it.
    pub async fn deliver(&self, chat_id: i64, user_id: i64, key: &str) -> bool {
        let Some(entry) = self.catalog.get(key) else {
            info!(user_id, key, "Requested file is not in the catalog");
            self.send_plain(chat_id, views::file_not_found()).await;
            return false;
        };

        let channels = self.registry.channels_for(&entry.category);
        if let GateResult::Blocked { channel, .. } = self.gate.check_detailed(user_id, channels).await {
            let pending_id = self
                .pending
                .insert(user_id, vec![entry.key.clone()], entry.category.clone())
                .await;
            self.send_join_prompt(chat_id, &channel, channels, &CallbackAction::ResumePending(pending_id))
                .await;
            return false;
        }

        self.deliver_entry(chat_id, user_id, entry).await
    }

    /// Deliver several files behind a single gate check.
    ///
    /// Unknown keys are dropped. The first remaining file decides which
    /// channels are required.
    pub async fn deliver_batch(&self, chat_id: i64, user_id: i64, keys: &[String]) -> BatchOutcome {
        let entries = self.known_entries(keys);
        let Some(first) = entries.first() else {
            self.send_plain(chat_id, views::file_not_found()).await;
            return BatchOutcome::Empty;
        };

        let channels = self.registry.channels_for(&first.category);
        if let GateResult::Blocked { channel, .. } = self.gate.check_detailed(user_id, channels).await {
            let keys = entries.iter().map(|e| e.key.clone()).collect();
            let pending_id = self.pending.insert(user_id, keys, first.category.clone()).await;
            self.send_join_prompt(
                chat_id,
                &channel,
                channels,
                &CallbackAction::ResumePending(pending_id.clone()),
            )
            .await;
            return BatchOutcome::Blocked { pending_id };
        }

        let (sent, total) = self.deliver_entries(chat_id, user_id, &entries).await;
        BatchOutcome::Delivered { sent, total }
    }

    /// Re-check a parked request and deliver it once the gate passes.
    ///
    /// The entry is removed before delivery starts, so a second press finds
    /// nothing and sends nothing.
    pub async fn resume_batch(&self, chat_id: i64, user_id: i64, pending_id: &str) -> ResumeOutcome {
        let Some(request) = self.pending.peek(pending_id, user_id).await else {
            debug!(user_id, pending_id, "No pending request to resume");
            return ResumeOutcome::Missing;
        };

        let channels = self.registry.channels_for(&request.category);
        if !self.gate.is_member(user_id, channels).await {
            return ResumeOutcome::StillBlocked;
        }

        let Some(request) = self.pending.take(pending_id, user_id).await else {
            return ResumeOutcome::Missing;
        };

        let entries = self.known_entries(&request.keys);
        let (sent, total) = self.deliver_entries(chat_id, user_id, &entries).await;
        ResumeOutcome::Delivered { sent, total }
    }

    /// Send the join prompt for `blocked` listing every channel of the set
    pub async fn send_join_prompt(
        &self,
        chat_id: i64,
        blocked: &Channel,
        channels: &[Channel],
        recheck: &CallbackAction,
    ) {
        let keyboard = views::join_keyboard(channels, recheck);
        if let Err(e) = self
            .transport
            .send_text(chat_id, &views::join_required(blocked), Some(keyboard))
            .await
        {
            warn!(chat_id, error = %e, "Failed to send join prompt");
        }
    }

    fn known_entries(&self, keys: &[String]) -> Vec<&FileEntry> {
        keys.iter()
            .filter_map(|key| {
                let entry = self.catalog.get(key);
                if entry.is_none() {
                    debug!(key = %key, "Dropping unknown key from batch");
                }
                entry
            })
            .collect()
    }

    async fn deliver_entries(&self, chat_id: i64, user_id: i64, entries: &[&FileEntry]) -> (usize, usize) {
        let mut sent = 0;
        for entry in entries {
            if self.deliver_entry(chat_id, user_id, entry).await {
                sent += 1;
            }
        }

        let total = entries.len();
        info!(user_id, sent, total, "Batch delivered");
        if total > 1 && sent > 0 {
            let summary = views::batch_summary(sent, total, self.options.delete_after);
            self.send_plain(chat_id, &summary).await;
        }
        (sent, total)
    }

    async fn deliver_entry(&self, chat_id: i64, user_id: i64, entry: &FileEntry) -> bool {
        let progress = match self
            .transport
            .send_text(chat_id, &views::preparing(entry), None)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to send progress message");
                None
            }
        };

        match self.transmit(chat_id, entry, progress).await {
            Ok(message_id) => {
                info!(user_id, key = %entry.key, message_id, "File delivered");
                self.scheduler
                    .schedule(chat_id, message_id, self.options.delete_after);
                self.update_progress(chat_id, progress, &views::delivered(entry, self.options.delete_after))
                    .await;
                true
            }
            Err(e) => {
                self.report_failure(chat_id, user_id, entry, progress, &e).await;
                false
            }
        }
    }

    async fn transmit(
        &self,
        chat_id: i64,
        entry: &FileEntry,
        progress: Option<i32>,
    ) -> Result<i32, DeliveryError> {
        let caption = views::caption(entry, self.options.delete_after);
        match &entry.source {
            FileSource::DirectLink(link) => {
                self.update_progress(chat_id, progress, &views::downloading(entry)).await;
                let downloaded = self.fetcher.fetch(link).await?;
                self.update_progress(chat_id, progress, views::uploading()).await;
                let file = OutboundFile {
                    kind: entry.kind,
                    payload: FilePayload::Path {
                        path: downloaded.path().to_path_buf(),
                        file_name: downloaded.file_name().to_string(),
                    },
                };
                // `downloaded` lives until the upload finishes and removes the file on drop
                let message_id = self.transport.send_file(chat_id, file, &caption).await?;
                drop(downloaded);
                Ok(message_id)
            }
            FileSource::ProviderRef(reference) => {
                self.update_progress(chat_id, progress, views::uploading()).await;
                let file = OutboundFile {
                    kind: entry.kind,
                    payload: FilePayload::Reference(reference.clone()),
                };
                Ok(self.transport.send_file(chat_id, file, &caption).await?)
            }
        }
    }

    async fn report_failure(
        &self,
        chat_id: i64,
        user_id: i64,
        entry: &FileEntry,
        progress: Option<i32>,
        err: &DeliveryError,
    ) {
        let stale = err.is_stale_reference();
        if stale {
            error!(key = %entry.key, error = %err, "Catalog entry has a stale file reference");
        } else {
            error!(user_id, key = %entry.key, error = %err, "File delivery failed");
        }

        let text = views::delivery_failed(self.options.support_contact.as_deref());
        match progress {
            Some(message_id) => {
                if let Err(e) = self.transport.edit_text(chat_id, message_id, &text).await {
                    warn!(chat_id, error = %e, "Failed to show delivery failure, sending instead");
                    self.send_plain(chat_id, &text).await;
                }
            }
            None => self.send_plain(chat_id, &text).await,
        }

        if let Some(admin) = self.options.admin_chat_id {
            let alert = views::operator_alert(entry, user_id, &err.to_string(), stale);
            if let Err(e) = self.transport.send_text(admin, &alert, None).await {
                warn!(admin, error = %e, "Failed to notify operator");
            }
        }
    }

    async fn update_progress(&self, chat_id: i64, progress: Option<i32>, text: &str) {
        let Some(message_id) = progress else {
            return;
        };
        if let Err(e) = self.transport.edit_text(chat_id, message_id, text).await {
            debug!(chat_id, message_id, error = %e, "Progress update skipped");
        }
    }

    async fn send_plain(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.send_text(chat_id, text, None).await {
            warn!(chat_id, error = %e, "Failed to send message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{MemberStatus, NotMemberReason};
    use crate::transport::{ButtonAction, MockChatTransport};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CATALOG: &str = r#"{
        "f1": {"name": "Doc", "size": "1MB", "description": "x", "type": "document", "file_id": "ref-f1"},
        "f2": {"name": "Song", "size": "3MB", "description": "y", "type": "audio", "file_id": "ref-f2"}
    }"#;

    fn pipeline(mock: MockChatTransport, channels: &str, admin: Option<i64>) -> DeliveryPipeline {
        DeliveryPipeline::new(
            Arc::new(mock),
            Arc::new(Catalog::from_sources(&[CATALOG])),
            Arc::new(ChannelRegistry::new(channels, &HashMap::new())),
            Fetcher::new(Duration::from_secs(1)).expect("http client"),
            PendingBatches::new(Duration::from_secs(60), 100),
            DeliveryOptions {
                delete_after: Duration::from_secs(30),
                admin_chat_id: admin,
                support_contact: None,
            },
        )
    }

    #[tokio::test]
    async fn test_unknown_key_sends_not_found() {
        let mut mock = MockChatTransport::new();
        mock.expect_send_text()
            .withf(|_, text, _| text == views::file_not_found())
            .times(1)
            .returning(|_, _, _| Ok(1));
        mock.expect_send_file().never();
        mock.expect_member_status().never();

        let pipeline = pipeline(mock, "", None);
        assert!(!pipeline.deliver(5, 5, "nope").await);
    }

    #[tokio::test]
    async fn test_reference_delivery_schedules_deletion() {
        let mut mock = MockChatTransport::new();
        mock.expect_send_text().returning(|_, _, _| Ok(10));
        mock.expect_edit_text().returning(|_, _, _| Ok(()));
        mock.expect_send_file()
            .withf(|chat, file, caption| {
                *chat == 5
                    && file.payload == FilePayload::Reference("ref-f1".to_string())
                    && caption.contains("Doc")
                    && caption.contains("30 seconds")
            })
            .times(1)
            .returning(|_, _, _| Ok(11));

        let pipeline = pipeline(mock, "", None);
        assert!(pipeline.deliver(5, 5, "f1").await);
        assert_eq!(pipeline.scheduler().pending(), 1);
    }

    #[tokio::test]
    async fn test_blocked_request_is_parked() {
        let mut mock = MockChatTransport::new();
        mock.expect_member_status()
            .returning(|_, _| Ok(MemberStatus::NotMember(NotMemberReason::Left)));
        mock.expect_send_text()
            .withf(|_, _, keyboard| {
                keyboard.as_ref().is_some_and(|rows| {
                    rows.len() == 2
                        && rows[0][0].action == ButtonAction::Url("https://t.me/chan1".to_string())
                        && matches!(&rows[1][0].action, ButtonAction::Callback(data) if data.starts_with("check:"))
                })
            })
            .times(1)
            .returning(|_, _, _| Ok(1));
        mock.expect_send_file().never();

        let pipeline = pipeline(mock, "@chan1", None);
        assert!(!pipeline.deliver(5, 5, "f1").await);
        pipeline.pending().sync().await;
        assert_eq!(pipeline.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_reference_alerts_operator() {
        let mut mock = MockChatTransport::new();
        mock.expect_send_text()
            .withf(|chat, _, _| *chat == 5)
            .returning(|_, _, _| Ok(10));
        mock.expect_edit_text().returning(|_, _, _| Ok(()));
        mock.expect_send_file()
            .returning(|_, _, _| Err(TransportError::InvalidFileReference("wrong file identifier".into())));
        mock.expect_send_text()
            .withf(|chat, text, _| *chat == 999 && text.contains("Stale file reference"))
            .times(1)
            .returning(|_, _, _| Ok(1));

        let pipeline = pipeline(mock, "", Some(999));
        assert!(!pipeline.deliver(5, 5, "f1").await);
        assert_eq!(pipeline.scheduler().pending(), 0);
    }

    #[tokio::test]
    async fn test_batch_drops_unknown_keys_and_summarises() {
        let summaries = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&summaries);
        let mut mock = MockChatTransport::new();
        mock.expect_send_text().returning(move |_, text, _| {
            if text.starts_with("✅ Sent") {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(10)
        });
        mock.expect_edit_text().returning(|_, _, _| Ok(()));
        mock.expect_send_file().times(2).returning(|_, _, _| Ok(20));

        let pipeline = pipeline(mock, "", None);
        let keys = vec!["f1".to_string(), "ghost".to_string(), "f2".to_string()];
        assert_eq!(
            pipeline.deliver_batch(5, 5, &keys).await,
            BatchOutcome::Delivered { sent: 2, total: 2 }
        );
        assert_eq!(summaries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resume_missing_request() {
        let mut mock = MockChatTransport::new();
        mock.expect_member_status().never();
        mock.expect_send_text().never();

        let pipeline = pipeline(mock, "@chan1", None);
        assert_eq!(pipeline.resume_batch(5, 5, "deadbeef0000").await, ResumeOutcome::Missing);
    }
}
