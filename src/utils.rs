//! Utilities that are used across the `maple` subcommands.

pub mod args;
pub mod cigar;
pub mod display;
pub mod formats;
pub mod histogram;
