use dotenvy::dotenv;
use filegate_bot::bot::handlers::schema;
use filegate_bot::bot::telegram::TelegramTransport;
use filegate_bot::catalog::Catalog;
use filegate_bot::channels::ChannelRegistry;
use filegate_bot::config::Settings;
use filegate_bot::delivery::DeliveryPipeline;
use filegate_bot::health;
use filegate_bot::router::Router;
use filegate_bot::transport::ChatTransport;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "filegate_bot=info,teloxide=warn,hyper=warn,reqwest=warn,axum=warn";

/// Regex patterns for redacting bot tokens
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token1.replace_all(input, "$1[BOT_TOKEN]$3");
        let output = self.token2.replace_all(&output, "[BOT_TOKEN]");
        self.token3
            .replace_all(&output, "$1[BOT_TOKEN]")
            .into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(self.patterns.redact(&s).as_bytes())?;
        // Report the original length; the redacted line may be shorter or longer
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: Arc::clone(&self.patterns),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting file gate bot...");

    let settings = init_settings();

    let sources = settings.catalog_sources();
    let catalog = Arc::new(Catalog::from_sources(&sources));
    let registry = Arc::new(ChannelRegistry::new(
        settings.required_channels.as_deref().unwrap_or_default(),
        &settings.category_channel_lists(),
    ));
    info!(
        files = catalog.len(),
        channels = registry.default_channels().len(),
        "Catalog and channel registry ready"
    );

    let bot = Bot::new(settings.bot_token.clone());
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramTransport::new(bot.clone()));
    let pipeline = Arc::new(
        DeliveryPipeline::from_settings(transport, catalog, registry, &settings).map_err(|e| {
            error!("Failed to build the download client: {e}");
            e
        })?,
    );
    let router = Arc::new(Router::new(Arc::clone(&pipeline)));

    health::spawn(settings.port);

    info!("Bot is running...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![router])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    pipeline.scheduler().shutdown().await;
    info!("Bot stopped");
    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let default_filter = if std::env::var("DEBUG_MODE").is_ok_and(|v| v == "true" || v == "1") {
        "filegate_bot=debug,teloxide=info"
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}
