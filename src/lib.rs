//! `maple` splits aligned sequencing reads into per-sample files by the
//! barcodes they carry, and calls their nucleotide and amino acid mutations
//! relative to a reference. This package is composed of both a library
//! crate, as well as a binary crate.
//!
//! The library is laid out leaves first:
//!
//! * [`reference`] and [`config`] describe a run.
//! * [`barcode`] locates and identifies barcodes within a read.
//! * [`alignment`] rebuilds a read's alignment against the reference.
//! * [`mutation`] calls the mutations of a rebuilt alignment.
//! * [`demux`] and [`mutations`] drive the above over a BAM file.
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]

pub mod alignment;
pub mod barcode;
pub mod config;
pub mod demux;
pub mod errors;
pub mod mutation;
pub mod mutations;
pub mod reference;
pub mod utils;
