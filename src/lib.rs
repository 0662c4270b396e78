//! Chat Relay: answers a single correspondent through an LLM and forwards
//! the replies to a messaging bridge.

pub mod bridge;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod relay;
