//! Calling nucleotide and amino acid mutations from reconstructed alignments.

pub mod caller;
pub mod code;
