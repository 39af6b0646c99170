//! Pagewatch command line application.
//!
//! Wires the CDP adapter and the artifact store into the demo engine and exposes the `run`,
//! `explore` and `list` commands.

pub mod bridge;
pub mod cli;
pub mod config;

pub use config::Config;
