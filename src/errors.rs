//! Errors raised while setting up a run.
//!
//! Everything in here is fatal: configuration problems are detected once,
//! before any record is read, and abort the run with a descriptive message.
//! Per-read problems live next to the code that detects them (see
//! [`crate::barcode::context::ContextError`] and
//! [`crate::alignment::reconstruct::ReconstructionError`]).

use thiserror::Error;

/// An error in the run configuration or in the files it points to.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A barcode type has no `context` entry.
    #[error(
        "barcode type `{barcode_type}` is not assigned a sequence context. Add a context to \
         the barcode type or remove the barcode type from `barcode_info`."
    )]
    MissingContext {
        /// The offending barcode type.
        barcode_type: String,
    },

    /// A barcode type has no `fasta` entry.
    #[error(
        "barcode type `{barcode_type}` is not assigned a fasta file. Add a fasta file to the \
         barcode type or remove the barcode type from `barcode_info`."
    )]
    MissingFasta {
        /// The offending barcode type.
        barcode_type: String,
    },

    /// A context does not contain exactly one contiguous run of wildcards.
    #[error(
        "barcode context `{context}` for barcode type `{barcode_type}` must contain exactly \
         one contiguous run of `N`s"
    )]
    InvalidContext {
        /// The offending barcode type.
        barcode_type: String,
        /// The context as configured.
        context: String,
    },

    /// A context could not be found in the reference sequence.
    #[error(
        "barcode context `{context}` for barcode type `{barcode_type}` not found in reference \
         sequence `{reference}`. Modify the context or the reference sequence to ensure an exact \
         match is present."
    )]
    ContextNotInReference {
        /// The offending barcode type.
        barcode_type: String,
        /// The context as configured.
        context: String,
        /// The reference identifier.
        reference: String,
    },

    /// A context occurs more than once in the reference sequence.
    #[error(
        "barcode context `{context}` for barcode type `{barcode_type}` appears in reference \
         sequence `{reference}` more than once"
    )]
    ContextAmbiguousInReference {
        /// The offending barcode type.
        barcode_type: String,
        /// The context as configured.
        context: String,
        /// The reference identifier.
        reference: String,
    },

    /// The same barcode sequence is listed twice for one barcode type.
    #[error(
        "barcode `{barcode}` is present more than once for barcode type `{barcode_type}`. \
         Duplicate barcodes are not allowed."
    )]
    DuplicateBarcode {
        /// The offending barcode type.
        barcode_type: String,
        /// The duplicated sequence.
        barcode: String,
    },

    /// A barcode does not have the length of its context's wildcard run.
    #[error(
        "barcode `{barcode}` for barcode type `{barcode_type}` is not the expected length of \
         {expected} based on context `{context}`"
    )]
    BarcodeLengthMismatch {
        /// The offending barcode type.
        barcode_type: String,
        /// The offending sequence.
        barcode: String,
        /// Length of the wildcard run.
        expected: usize,
        /// The context as configured.
        context: String,
    },

    /// Two barcodes of one type are within the configured hamming distance.
    #[error(
        "barcode `{first}` is within hamming distance {distance} of barcode `{second}` for \
         barcode type `{barcode_type}` (maximum allowed distance is {maximum})"
    )]
    HammingDistanceViolation {
        /// The offending barcode type.
        barcode_type: String,
        /// The first barcode of the pair.
        first: String,
        /// The second barcode of the pair.
        second: String,
        /// Their realized distance.
        distance: usize,
        /// The configured maximum distance.
        maximum: usize,
    },

    /// Two barcode groups select different sets of barcode types.
    #[error(
        "all barcode groups do not use the same set of barcode types. Group `{group}` differs \
         from group `{first_group}`."
    )]
    InconsistentGroups {
        /// The group that differs.
        group: String,
        /// The first configured group.
        first_group: String,
    },

    /// A barcode group references a barcode type that is not configured.
    #[error("barcode group `{group}` references unknown barcode type `{barcode_type}`")]
    UnknownGroupBarcodeType {
        /// The offending group.
        group: String,
        /// The unknown barcode type.
        barcode_type: String,
    },

    /// The reference FASTA does not contain a record that the run requires.
    #[error("reference fasta `{path}` is missing the {description} record")]
    MissingReferenceRecord {
        /// The reference FASTA path.
        path: String,
        /// Which record is missing.
        description: &'static str,
    },

    /// The trimmed region is not a substring of the full reference.
    #[error("trimmed reference sequence is not found within reference `{reference}`")]
    TrimmedNotInReference {
        /// The reference identifier.
        reference: String,
    },

    /// The protein region is not a substring of the trimmed reference.
    #[error("protein coding sequence is not found within the trimmed reference of `{reference}`")]
    ProteinNotInTrimmed {
        /// The reference identifier.
        reference: String,
    },

    /// The protein region does not contain a whole number of codons.
    #[error("protein coding sequence length {length} is not a multiple of 3")]
    ProteinNotInFrame {
        /// Length of the protein region in nucleotides.
        length: usize,
    },

    /// A mutation of interest cannot be parsed.
    #[error("{kind} mutation of interest `{mutation}` is malformed")]
    InvalidMutationOfInterest {
        /// `NT` or `AA`.
        kind: &'static str,
        /// The mutation string as configured.
        mutation: String,
    },
}
