#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use filegate_bot::catalog::Catalog;
use filegate_bot::channels::{ChannelRegistry, ChannelTarget};
use filegate_bot::delivery::{DeliveryOptions, DeliveryPipeline};
use filegate_bot::fetch::Fetcher;
use filegate_bot::gate::{MemberStatus, NotMemberReason};
use filegate_bot::pending::PendingBatches;
use filegate_bot::transport::{
    ChatTransport, FilePayload, Keyboard, OutboundFile, TransportError,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_CHAT: i64 = 9_000;

/// Something the bot did through the transport
#[derive(Debug, Clone)]
pub enum Event {
    Text {
        chat_id: i64,
        message_id: i32,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat_id: i64,
        message_id: i32,
        text: String,
    },
    File {
        chat_id: i64,
        message_id: i32,
        file: OutboundFile,
        caption: String,
        /// Whether a local payload still existed at upload time
        path_existed: bool,
        /// Bytes of the local payload at upload time
        content: Option<Vec<u8>>,
    },
    Delete {
        chat_id: i64,
        message_id: i32,
    },
}

/// Recording transport with configurable membership and upload failures
#[derive(Default)]
pub struct FakeTransport {
    events: Mutex<Vec<Event>>,
    joined: Mutex<HashSet<String>>,
    fail_files: AtomicBool,
    next_id: AtomicI32,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every user counts as a member of `channel` from now on
    pub fn join(&self, channel: &str) {
        self.joined
            .lock()
            .expect("lock")
            .insert(channel.to_string());
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_files.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("lock").clone()
    }

    pub fn files(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::File { .. }))
            .collect()
    }

    pub fn deletions(&self) -> Vec<(i64, i32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Delete {
                    chat_id,
                    message_id,
                } => Some((chat_id, message_id)),
                _ => None,
            })
            .collect()
    }

    /// Texts sent or edited into `chat_id`, in order
    pub fn texts_in(&self, chat: i64) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Text { chat_id, text, .. } | Event::Edit { chat_id, text, .. }
                    if chat_id == chat =>
                {
                    Some(text)
                }
                _ => None,
            })
            .collect()
    }

    /// Keyboards of sent messages, in order
    pub fn keyboards(&self) -> Vec<Keyboard> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Text {
                    keyboard: Some(k), ..
                } => Some(k),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.events.lock().expect("lock").push(event);
    }

    fn id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn member_status(
        &self,
        channel: &ChannelTarget,
        _user_id: i64,
    ) -> Result<MemberStatus, TransportError> {
        if self
            .joined
            .lock()
            .expect("lock")
            .contains(&channel.to_string())
        {
            Ok(MemberStatus::Member)
        } else {
            Ok(MemberStatus::NotMember(NotMemberReason::Left))
        }
    }

    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<i32, TransportError> {
        let message_id = self.id();
        self.record(Event::Text {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(message_id)
    }

    async fn edit_text(
        &self,
        chat_id: i64,
        message_id: i32,
        text: &str,
    ) -> Result<(), TransportError> {
        self.record(Event::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: i64,
        file: OutboundFile,
        caption: &str,
    ) -> Result<i32, TransportError> {
        let (path_existed, content) = match &file.payload {
            FilePayload::Path { path, .. } => (path.exists(), std::fs::read(path).ok()),
            FilePayload::Reference(_) => (false, None),
        };
        let message_id = self.id();
        self.record(Event::File {
            chat_id,
            message_id,
            file,
            caption: caption.to_string(),
            path_existed,
            content,
        });
        if self.fail_files.load(Ordering::SeqCst) {
            return Err(TransportError::Api("Bad Request: upload rejected".into()));
        }
        Ok(message_id)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), TransportError> {
        self.record(Event::Delete {
            chat_id,
            message_id,
        });
        Ok(())
    }
}

pub const DRIVE_FILE_ID: &str = "abc123";
pub const DRIVE_CONFIRM_TOKEN: &str = "tok";
pub const DRIVE_PAYLOAD: &[u8] = b"drive archive bytes";

#[derive(Default)]
struct ServerState {
    hits: AtomicUsize,
    /// `confirm` parameter of every Drive download request, in order
    drive_requests: Mutex<Vec<Option<String>>>,
}

/// Local stand-in for direct-link hosts and the Drive download endpoint
pub struct FileServer {
    pub base: String,
    state: Arc<ServerState>,
}

impl FileServer {
    pub async fn start() -> Self {
        async fn document(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
            state.hits.fetch_add(1, Ordering::SeqCst);
            (
                [
                    (header::CONTENT_TYPE, "application/pdf"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"doc.pdf\""),
                ],
                vec![b'%'; 2048],
            )
        }

        async fn missing(State(state): State<Arc<ServerState>>) -> StatusCode {
            state.hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::NOT_FOUND
        }

        async fn slow(State(state): State<Arc<ServerState>>) -> &'static str {
            state.hits.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3)).await;
            "too late"
        }

        // First answer is the virus-scan warning page with its cookie; the
        // file itself is only served once the token comes back.
        async fn drive(
            State(state): State<Arc<ServerState>>,
            Query(params): Query<HashMap<String, String>>,
        ) -> axum::response::Response {
            state.hits.fetch_add(1, Ordering::SeqCst);
            let confirm = params.get("confirm").cloned();
            state
                .drive_requests
                .lock()
                .expect("lock")
                .push(confirm.clone());

            let known_id = params.get("id").map(String::as_str) == Some(DRIVE_FILE_ID);
            if known_id && confirm.as_deref() == Some(DRIVE_CONFIRM_TOKEN) {
                return (
                    [(
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"archive.zip\"",
                    )],
                    DRIVE_PAYLOAD,
                )
                    .into_response();
            }
            (
                [
                    (header::CONTENT_TYPE, "text/html".to_string()),
                    (
                        header::SET_COOKIE,
                        format!("download_warning_{DRIVE_FILE_ID}={DRIVE_CONFIRM_TOKEN}; Path=/"),
                    ),
                ],
                "<html>Google Drive can't scan this file for viruses.</html>",
            )
                .into_response()
        }

        let state = Arc::new(ServerState::default());
        let app = axum::Router::new()
            .route("/files/doc.pdf", get(document))
            .route("/files/missing.pdf", get(missing))
            .route("/files/slow.pdf", get(slow))
            .route("/uc", get(drive))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind file server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("file server");
        });

        Self {
            base: format!("http://{addr}"),
            state,
        }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn drive_requests(&self) -> Vec<Option<String>> {
        self.state.drive_requests.lock().expect("lock").clone()
    }
}

/// Catalog with one direct-link document, one Drive link, one broken link and
/// two references
pub fn catalog_json(server: &FileServer) -> String {
    format!(
        r#"{{
            "f1": {{"name": "Doc", "size": "1MB", "description": "x", "type": "document", "direct_link": "{base}/files/doc.pdf"}},
            "f2": {{"name": "Clip", "size": "20MB", "description": "y", "type": "video", "file_id": "ref-clip"}},
            "f3": {{"name": "Song", "size": "3MB", "description": "z", "type": "audio", "file_id": "ref-song"}},
            "broken": {{"name": "Gone", "size": "5MB", "description": "w", "direct_link": "{base}/files/missing.pdf"}},
            "drive": {{"name": "Archive", "size": "9MB", "description": "v", "direct_link": "https://drive.google.com/file/d/{DRIVE_FILE_ID}/view?usp=sharing"}}
        }}"#,
        base = server.base
    )
}

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub pipeline: Arc<DeliveryPipeline>,
    pub temp_dir: tempfile::TempDir,
    pub server: FileServer,
}

impl Harness {
    pub async fn new(required_channels: &str, delete_after: Duration) -> Self {
        let server = FileServer::start().await;
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let transport = FakeTransport::new();
        let catalog = Catalog::from_sources(&[catalog_json(&server).as_str()]);
        let pipeline = DeliveryPipeline::new(
            Arc::clone(&transport) as Arc<dyn ChatTransport>,
            Arc::new(catalog),
            Arc::new(ChannelRegistry::new(required_channels, &HashMap::new())),
            Fetcher::new(Duration::from_secs(5))
                .expect("http client")
                .with_temp_dir(temp_dir.path())
                .with_drive_base(server.base.clone()),
            PendingBatches::new(Duration::from_secs(60), 100),
            DeliveryOptions {
                delete_after,
                admin_chat_id: Some(ADMIN_CHAT),
                support_contact: Some("@helpdesk".to_string()),
            },
        );

        Self {
            transport,
            pipeline: Arc::new(pipeline),
            temp_dir,
            server,
        }
    }

    pub fn temp_files(&self) -> usize {
        count_files(self.temp_dir.path())
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, |entries| entries.count())
}
