//! Callback payload and `/start` parameter codecs.
//!
//! Telegram limits callback data to 64 bytes, so file buttons carry the
//! catalog index instead of the key.

/// Callback data for re-checking membership
pub const CALLBACK_CHECK: &str = "check";
/// Callback data for refreshing the file list
pub const CALLBACK_REFRESH: &str = "refresh";
/// Callback data for the help screen
pub const CALLBACK_HELP: &str = "help";
/// Callback data for returning to the file list
pub const CALLBACK_MENU: &str = "menu";
/// Callback data for buttons that do nothing
pub const CALLBACK_NOOP: &str = "noop";

const CHECK_PENDING_PREFIX: &str = "check:";
const DOWNLOAD_PREFIX: &str = "dl:";
const BATCH_PREFIX: &str = "batch_";

/// Action encoded in a button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Re-run the gate on the default channels and show the menu on pass
    CheckMembership,
    /// Re-run the gate for a parked request and deliver it on pass
    ResumePending(String),
    /// Show the file list again
    Refresh,
    /// Show the help screen
    Help,
    /// Return to the file list
    BackToMenu,
    /// Deliver the catalog entry at this index
    Download(usize),
    /// Acknowledge a button without an action
    Noop,
}

impl CallbackAction {
    /// Serialize into callback data
    ///
    /// # Examples
    ///
    /// ```
    /// use filegate_bot::bot::callbacks::CallbackAction;
    ///
    /// let data = CallbackAction::Download(3).encode();
    /// assert_eq!(CallbackAction::parse(&data), Some(CallbackAction::Download(3)));
    /// ```
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::CheckMembership => CALLBACK_CHECK.to_string(),
            Self::ResumePending(id) => format!("{CHECK_PENDING_PREFIX}{id}"),
            Self::Refresh => CALLBACK_REFRESH.to_string(),
            Self::Help => CALLBACK_HELP.to_string(),
            Self::BackToMenu => CALLBACK_MENU.to_string(),
            Self::Download(idx) => format!("{DOWNLOAD_PREFIX}{idx}"),
            Self::Noop => CALLBACK_NOOP.to_string(),
        }
    }

    /// Parse callback data; unknown payloads yield `None`
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            CALLBACK_CHECK => return Some(Self::CheckMembership),
            CALLBACK_REFRESH => return Some(Self::Refresh),
            CALLBACK_HELP => return Some(Self::Help),
            CALLBACK_MENU => return Some(Self::BackToMenu),
            CALLBACK_NOOP => return Some(Self::Noop),
            _ => {}
        }

        if let Some(id) = data.strip_prefix(CHECK_PENDING_PREFIX) {
            return (!id.is_empty()).then(|| Self::ResumePending(id.to_string()));
        }
        data.strip_prefix(DOWNLOAD_PREFIX)
            .and_then(|idx| idx.parse().ok())
            .map(Self::Download)
    }
}

/// Parsed argument of `/start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartParam {
    /// Plain `/start`
    Empty,
    /// `/start <key>`
    Single(String),
    /// `/start batch_<key>_<key>...`
    Batch(Vec<String>),
}

/// Parse the deep-link parameter of `/start`.
///
/// Batch keys are separated by `_`, so keys used in batch links must not
/// contain underscores.
///
/// # Examples
///
/// ```
/// use filegate_bot::bot::callbacks::{parse_start_param, StartParam};
///
/// assert_eq!(parse_start_param(""), StartParam::Empty);
/// assert_eq!(parse_start_param("f1"), StartParam::Single("f1".into()));
/// assert_eq!(
///     parse_start_param("batch_f1_f2"),
///     StartParam::Batch(vec!["f1".into(), "f2".into()])
/// );
/// ```
#[must_use]
pub fn parse_start_param(raw: &str) -> StartParam {
    let raw = raw.trim();
    if raw.is_empty() {
        return StartParam::Empty;
    }

    match raw.strip_prefix(BATCH_PREFIX) {
        Some(rest) => {
            let keys: Vec<String> = rest
                .split('_')
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
            if keys.is_empty() {
                StartParam::Empty
            } else {
                StartParam::Batch(keys)
            }
        }
        None => StartParam::Single(raw.to_string()),
    }
}
