//! Functionality related to the `maple demux` subcommand.

pub mod command;
pub mod compute;
pub mod results;
