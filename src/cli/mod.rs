//! CLI module for chromashade
//!
//! Only available when the "cli" feature is enabled.

mod config;
#[path = "main.rs"]
mod main_impl;

pub use main_impl::{main, Cli, CliOutputFormat, ColorArgs, Command, CommonArgs, ShadowArgs};
