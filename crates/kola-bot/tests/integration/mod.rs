//! Integration tests for kola-bot.
//!
//! These tests drive the components over real sockets:
//! - websocket lifecycle against an in-process server
//! - the application from mirror readiness to campaign shutdown

pub mod common;
