//! Functionality related to the `maple mutations` subcommand.

pub mod command;
pub mod compute;
pub mod results;
