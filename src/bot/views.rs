//! UI components
//!
//! Contains keyboards, text messages, and captions. All texts are Telegram
//! HTML; user-controlled values are escaped here.

use crate::bot::callbacks::CallbackAction;
use crate::catalog::{Catalog, FileEntry};
use crate::channels::Channel;
use crate::transport::{Button, Keyboard};
use crate::utils::{format_delay, truncate_str};
use html_escape::encode_text;
use std::time::Duration;

/// Longest file name shown on a list button
const BUTTON_LABEL_MAX_CHARS: usize = 48;

// ─────────────────────────────────────────────────────────────────────────────
// Keyboards
// ─────────────────────────────────────────────────────────────────────────────

/// One join button per channel followed by the re-check button.
///
/// Channels without a link get a no-op button so the user still sees them.
#[must_use]
pub fn join_keyboard(channels: &[Channel], recheck: &CallbackAction) -> Keyboard {
    let mut rows: Keyboard = channels
        .iter()
        .map(|channel| {
            let label = format!("📢 Join {}", channel.label);
            let button = match &channel.join_url {
                Some(url) => Button::url(label, url.clone()),
                None => Button::callback(label, CallbackAction::Noop.encode()),
            };
            vec![button]
        })
        .collect();
    rows.push(vec![Button::callback("✅ I've joined", recheck.encode())]);
    rows
}

/// File list: one button per catalog entry plus refresh and help
#[must_use]
pub fn catalog_keyboard(catalog: &Catalog) -> Keyboard {
    let mut rows: Keyboard = catalog
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let label = format!("{} {}", entry.kind.icon(), truncate_str(&entry.name, BUTTON_LABEL_MAX_CHARS));
            vec![Button::callback(label, CallbackAction::Download(idx).encode())]
        })
        .collect();
    rows.push(vec![
        Button::callback("🔄 Refresh", CallbackAction::Refresh.encode()),
        Button::callback("ℹ️ Help", CallbackAction::Help.encode()),
    ]);
    rows
}

/// Single "back to list" button
#[must_use]
pub fn back_keyboard() -> Keyboard {
    vec![vec![Button::callback(
        "🔙 Back to list",
        CallbackAction::BackToMenu.encode(),
    )]]
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Greeting for users who still have to join channels
#[must_use]
pub fn welcome_blocked(first_name: &str, channels: &[Channel]) -> String {
    let list: Vec<String> = channels
        .iter()
        .map(|c| format!("• {}", encode_text(&c.label)))
        .collect();
    format!(
        "👋 Hi {}!\n\n🤖 Welcome to the file bot!\n\n\
         📢 To access the files, please join these channels:\n{}\n\n\
         🎯 Then press <b>I've joined</b>.",
        encode_text(first_name),
        list.join("\n")
    )
}

/// Prompt shown when a file request is blocked by the gate
#[must_use]
pub fn join_required(channel: &Channel) -> String {
    format!(
        "❌ To get this file you need to join <b>{}</b> first.\n\n\
         Join the channels below, then press <b>I've joined</b>.",
        encode_text(&channel.label)
    )
}

/// Header of the file list
#[must_use]
pub fn main_menu(first_name: &str, delete_after: Duration, empty: bool) -> String {
    let body = if empty {
        "📭 No files are available right now."
    } else {
        "👉 Tap a file to receive it."
    };
    format!(
        "🎉 Hi {}!\n\n📁 <b>Available files</b>\n\n{body}\n\n\
         ⚠️ Files are deleted {} after they are sent, save them right away.",
        encode_text(first_name),
        format_delay(delete_after)
    )
}

/// Help screen reached from the file list
#[must_use]
pub fn help(delete_after: Duration) -> String {
    format!(
        "📖 <b>How to use this bot</b>\n\n\
         1. Join the required channels\n\
         2. Pick a file from the list\n\
         3. Save the file you receive\n\n\
         ⚠️ <b>Good to know</b>\n\
         • Files are deleted {} after they are sent\n\
         • Send /start if the membership check fails\n\
         • Press 🔄 to refresh the list",
        format_delay(delete_after)
    )
}

/// Reply to `/help`
#[must_use]
pub const fn help_command() -> &'static str {
    "📖 <b>Commands</b>\n\n\
     • /start - check membership and show the file list\n\
     • /help - show this message\n\n\
     🎯 Send /start to begin."
}

/// Requested key is not in the catalog
#[must_use]
pub const fn file_not_found() -> &'static str {
    "❌ File not found!"
}

/// Progress: request accepted
#[must_use]
pub fn preparing(entry: &FileEntry) -> String {
    format!(
        "⏳ Preparing your file...\n\n📝 {}\n📦 Size: {}",
        encode_text(&entry.name),
        encode_text(&entry.size)
    )
}

/// Progress: direct link is being downloaded
#[must_use]
pub fn downloading(entry: &FileEntry) -> String {
    format!(
        "📥 Downloading...\n\n📝 {}\n📦 Size: {}\n📋 {}",
        encode_text(&entry.name),
        encode_text(&entry.size),
        encode_text(&entry.description)
    )
}

/// Progress: file is being uploaded
#[must_use]
pub const fn uploading() -> &'static str {
    "📤 Uploading..."
}

/// Progress: file sent
#[must_use]
pub fn delivered(entry: &FileEntry, delete_after: Duration) -> String {
    format!(
        "✅ <b>{}</b> was sent!\n\n⏰ Remember: it will be deleted in {}.",
        encode_text(&entry.name),
        format_delay(delete_after)
    )
}

/// Caption attached to a delivered file
///
/// # Examples
///
/// ```
/// use filegate_bot::bot::views::caption;
/// use filegate_bot::catalog::{FileEntry, FileSource, MediaKind};
/// use std::time::Duration;
///
/// let entry = FileEntry {
///     key: "f1".into(),
///     name: "Doc".into(),
///     size: "1MB".into(),
///     description: "x".into(),
///     kind: MediaKind::Document,
///     source: FileSource::ProviderRef("ref".into()),
///     category: "default".into(),
/// };
/// let text = caption(&entry, Duration::from_secs(30));
/// assert!(text.contains("Doc") && text.contains("1MB") && text.contains("30 seconds"));
/// ```
#[must_use]
pub fn caption(entry: &FileEntry, delete_after: Duration) -> String {
    format!(
        "{} <b>{}</b>\n\n📝 {}\n📦 Size: {}\n\n\
         ⏰ This file will be deleted in {}!\n💾 Save it somewhere else.",
        entry.kind.icon(),
        encode_text(&entry.name),
        encode_text(&entry.description),
        encode_text(&entry.size),
        format_delay(delete_after)
    )
}

/// Delivery failed; the user should try again
#[must_use]
pub fn delivery_failed(support_contact: Option<&str>) -> String {
    let mut text = String::from(
        "❌ <b>Could not send the file.</b>\n\n\
         ⚠️ The link may be broken or the server unavailable.\n\n\
         🔧 Please try again in a moment.",
    );
    if let Some(contact) = support_contact {
        text.push_str(&format!("\n📞 Support: {}", encode_text(contact)));
    }
    text
}

/// Operator notification for a failed delivery
#[must_use]
pub fn operator_alert(entry: &FileEntry, user_id: i64, error: &str, stale_reference: bool) -> String {
    let headline = if stale_reference {
        "🚨 <b>Stale file reference</b>"
    } else {
        "🚨 <b>Delivery failed</b>"
    };
    format!(
        "{headline}\n\nKey: <code>{}</code>\nFile: {}\nUser: <code>{user_id}</code>\nError: {}",
        encode_text(&entry.key),
        encode_text(&entry.name),
        encode_text(&truncate_str(error, 500))
    )
}

/// Summary after a batch went out
#[must_use]
pub fn batch_summary(sent: usize, total: usize, delete_after: Duration) -> String {
    format!(
        "✅ Sent {sent} of {total} files.\n\n⏰ They will be deleted in {}, save them right away.",
        format_delay(delete_after)
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Callback answers
// ─────────────────────────────────────────────────────────────────────────────

/// Re-check failed
#[must_use]
pub const fn still_not_joined() -> &'static str {
    "❌ You haven't joined yet! Please join first."
}

/// Re-check passed
#[must_use]
pub const fn membership_confirmed() -> &'static str {
    "✅ Membership confirmed!"
}

/// List refreshed
#[must_use]
pub const fn list_refreshed() -> &'static str {
    "🔄 List refreshed!"
}

/// Parked request is gone
#[must_use]
pub const fn request_expired() -> &'static str {
    "⌛ This request has expired or was already delivered. Open the link again."
}

/// Button without an action
#[must_use]
pub const fn nothing_to_do() -> &'static str {
    "ℹ️ Join this channel using the link from the channel admin."
}
