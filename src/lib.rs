//! CaretForge - a bring-your-own-model interactive coding agent.

pub mod agent;
pub mod cli;
pub mod config;
pub mod disclaimer;
pub mod error;
pub mod indexer;
pub mod message;
pub mod permission;
pub mod provider;
pub mod redact;
pub mod safety;
pub mod system_prompt;
pub mod tool;
