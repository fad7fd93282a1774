#![deny(unsafe_code)]

/// Terminal chat shell: command line, credential wiring and the REPL.
///
/// Presentation only. Conversation and request state live in [`chat`].
pub mod app;
/// Conversation store and the request lifecycle around it.
pub mod chat;
/// Settings persistence.
pub mod settings;
