//! Aligned reads and their reconstruction against the reference.

pub mod reconstruct;
pub mod record;
