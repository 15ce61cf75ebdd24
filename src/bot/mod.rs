/// Callback payload and `/start` parameter codecs
pub mod callbacks;
/// Command and callback endpoints for the dispatcher
pub mod handlers;
/// Telegram implementation of the chat transport
pub mod telegram;
/// Texts and keyboards
pub mod views;
