//! Required channel registry
//!
//! Parses the comma-separated channel lists from configuration into
//! [`Channel`] values and resolves which channels a catalog category requires.

use crate::config::DEFAULT_CATEGORY;
use std::collections::HashMap;
use std::fmt;

/// Handle usable for a membership query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelTarget {
    /// Public channel username, including the leading `@`
    Username(String),
    /// Numeric chat id (negative for broadcast channels)
    Id(i64),
}

impl fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Username(name) => f.write_str(name),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// A channel the user has to join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Query handle, `None` when the channel cannot be checked (invite links, garbage)
    pub target: Option<ChannelTarget>,
    /// Text shown to users
    pub label: String,
    /// Link that opens the channel, if one is known
    pub join_url: Option<String>,
}

impl Channel {
    /// Parses a single configuration token. Never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use filegate_bot::channels::{Channel, ChannelTarget};
    ///
    /// let channel = Channel::parse("@news");
    /// assert_eq!(channel.target, Some(ChannelTarget::Username("@news".into())));
    /// assert_eq!(channel.join_url.as_deref(), Some("https://t.me/news"));
    /// ```
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim();

        if let Some(name) = token.strip_prefix('@') {
            return Self::from_username(name);
        }

        if let Ok(id) = token.parse::<i64>() {
            return Self {
                target: Some(ChannelTarget::Id(id)),
                label: token.to_string(),
                join_url: None,
            };
        }

        if let Some(path) = strip_tme_prefix(token) {
            let path = path.trim_end_matches('/');
            let first = path.split(['/', '?']).next().unwrap_or_default();
            let is_invite = first.starts_with('+') || first == "joinchat" || first.is_empty();
            if is_invite || !is_username(first) {
                return Self {
                    target: None,
                    label: token.to_string(),
                    join_url: Some(normalize_tme_url(token)),
                };
            }
            return Self {
                target: Some(ChannelTarget::Username(format!("@{first}"))),
                label: format!("@{first}"),
                join_url: Some(format!("https://t.me/{first}")),
            };
        }

        Self {
            target: None,
            label: token.to_string(),
            join_url: None,
        }
    }

    fn from_username(name: &str) -> Self {
        if is_username(name) {
            Self {
                target: Some(ChannelTarget::Username(format!("@{name}"))),
                label: format!("@{name}"),
                join_url: Some(format!("https://t.me/{name}")),
            }
        } else {
            Self {
                target: None,
                label: format!("@{name}"),
                join_url: None,
            }
        }
    }

    /// Whether a membership query can be issued for this channel
    #[must_use]
    pub const fn is_verifiable(&self) -> bool {
        self.target.is_some()
    }
}

fn strip_tme_prefix(token: &str) -> Option<&str> {
    ["https://t.me/", "http://t.me/", "https://telegram.me/", "t.me/"]
        .iter()
        .find_map(|prefix| token.strip_prefix(prefix))
}

fn normalize_tme_url(token: &str) -> String {
    if token.starts_with("http://") || token.starts_with("https://") {
        token.to_string()
    } else {
        format!("https://{token}")
    }
}

fn is_username(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses a comma-separated channel list. Empty tokens are skipped.
///
/// # Examples
///
/// ```
/// use filegate_bot::channels::parse_channels;
///
/// let channels = parse_channels("@one, -1001234, https://t.me/+invite");
/// assert_eq!(channels.len(), 3);
/// assert!(!channels[2].is_verifiable());
/// ```
#[must_use]
pub fn parse_channels(raw: &str) -> Vec<Channel> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Channel::parse)
        .collect()
}

/// Channel sets per catalog category, built once at startup
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    default: Vec<Channel>,
    categories: HashMap<String, Vec<Channel>>,
}

impl ChannelRegistry {
    /// Builds the registry from the default list and per-category lists
    #[must_use]
    pub fn new(default_raw: &str, categories: &HashMap<String, String>) -> Self {
        Self {
            default: parse_channels(default_raw),
            categories: categories
                .iter()
                .map(|(category, raw)| (category.clone(), parse_channels(raw)))
                .collect(),
        }
    }

    /// Channels required to open the bot and for uncategorised files
    #[must_use]
    pub fn default_channels(&self) -> &[Channel] {
        &self.default
    }

    /// Channels required for `category`, falling back to the default list
    #[must_use]
    pub fn channels_for(&self, category: &str) -> &[Channel] {
        if category == DEFAULT_CATEGORY {
            return &self.default;
        }
        self.categories
            .get(category)
            .map_or(self.default.as_slice(), Vec::as_slice)
    }
}
