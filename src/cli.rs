//! CLI domain: parse, route, output, and presentation only.
//! No cache logic; the route table dispatches to the command factory.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use presentation::{format_entry, format_load_outcome, format_store_result};
pub use route::RunContext;
