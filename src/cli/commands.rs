use clap::Subcommand;

use super::explore::ExploreArgs;
use super::list::ListArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run a fixed action plan and record it
    Run(RunArgs),

    /// Explore the interactive elements of a page
    Explore(ExploreArgs),

    /// List persisted runs
    List(ListArgs),
}
