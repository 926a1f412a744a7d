//! chat-relay — messaging-platform to chat-completion relay.
//!
//! Inbound messages arrive synchronously at the webhook adapter
//! ([`server`]), are routed by [`router`], and conversational text is
//! answered asynchronously: the [`dispatch`] worker pool loads the session
//! history ([`session`]), calls the completion service ([`llm`]) through
//! the bounded [`retry`] wrapper, and delivers the reply via [`push`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod logger;
pub mod push;
pub mod retry;
pub mod router;
pub mod server;
pub mod session;
