pub mod app;
pub mod commands;
pub mod context;
pub mod env;
pub mod explore;
pub mod list;
pub mod output;
pub mod plan_file;
pub mod run;
pub mod runtime;

pub use commands::Commands;
pub use context::CliContext;
pub use env::CliArgs;
