//! Alignment records as seen by the core engines.
//!
//! The file-format layer ([`crate::utils::formats::bam`]) strips everything a
//! record carries that the engines do not need: soft clips are removed from
//! the query, clipping/padding operations are dropped and the remaining
//! operations collapse into [`Kind::Match`], [`Kind::Insertion`] and
//! [`Kind::Deletion`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The kind of a CIGAR operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Consumes both the reference and the query (`M`, `=` and `X`).
    Match,

    /// Consumes only the query (`I`).
    Insertion,

    /// Consumes only the reference (`D` and `N`).
    Deletion,
}

impl Kind {
    /// Reports whether an operation of this kind consumes reference bases.
    pub fn consumes_reference(&self) -> bool {
        matches!(self, Kind::Match | Kind::Deletion)
    }

    /// Reports whether an operation of this kind consumes query bases.
    pub fn consumes_query(&self) -> bool {
        matches!(self, Kind::Match | Kind::Insertion)
    }
}

/// A single CIGAR operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Op {
    kind: Kind,
    len: usize,
}

impl Op {
    /// Creates a new [`Op`].
    pub fn new(kind: Kind, len: usize) -> Self {
        Self { kind, len }
    }

    /// The kind of the operation.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The length of the operation.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Reports whether the operation has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// An error parsing a CIGAR string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// An operation was not preceded by a length.
    #[error("missing length for CIGAR operation `{0}`")]
    MissingLength(char),

    /// The operation character is not supported.
    #[error("unsupported CIGAR operation `{0}`")]
    InvalidKind(char),

    /// The string ended with a dangling length.
    #[error("CIGAR string ends without an operation")]
    TrailingLength,
}

/// An ordered list of CIGAR operations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cigar(Vec<Op>);

impl Cigar {
    /// Iterates over the operations.
    pub fn iter(&self) -> impl Iterator<Item = &Op> {
        self.0.iter()
    }

    /// Adds an operation, merging it with the last one when they share a kind.
    pub fn push(&mut self, op: Op) {
        if op.is_empty() {
            return;
        }

        match self.0.last_mut() {
            Some(last) if last.kind == op.kind => last.len += op.len,
            _ => self.0.push(op),
        }
    }

    /// The number of reference bases covered by the operations.
    pub fn alignment_span(&self) -> usize {
        self.iter()
            .filter(|op| op.kind().consumes_reference())
            .map(|op| op.len())
            .sum()
    }

    /// The number of query bases consumed by the operations.
    pub fn query_len(&self) -> usize {
        self.iter()
            .filter(|op| op.kind().consumes_query())
            .map(|op| op.len())
            .sum()
    }
}

impl From<Vec<Op>> for Cigar {
    fn from(ops: Vec<Op>) -> Self {
        let mut cigar = Cigar::default();
        for op in ops {
            cigar.push(op);
        }
        cigar
    }
}

impl FromStr for Cigar {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cigar = Cigar::default();
        let mut len: Option<usize> = None;

        for c in s.chars() {
            if let Some(digit) = c.to_digit(10) {
                len = Some(len.unwrap_or(0) * 10 + digit as usize);
                continue;
            }

            let kind = match c {
                'M' | '=' | 'X' => Kind::Match,
                'I' => Kind::Insertion,
                'D' | 'N' => Kind::Deletion,
                _ => return Err(ParseError::InvalidKind(c)),
            };

            let n = len.take().ok_or(ParseError::MissingLength(c))?;
            cigar.push(Op::new(kind, n));
        }

        match len {
            Some(_) => Err(ParseError::TrailingLength),
            None => Ok(cigar),
        }
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for op in self.iter() {
            let c = match op.kind() {
                Kind::Match => 'M',
                Kind::Insertion => 'I',
                Kind::Deletion => 'D',
            };
            write!(f, "{}{}", op.len(), c)?;
        }

        Ok(())
    }
}

/// One aligned read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// The read name.
    pub name: String,

    /// The name of the reference the read is aligned to.
    pub reference_name: String,

    /// The leftmost aligned reference position (0-based).
    pub start: usize,

    /// The alignment operations.
    pub cigar: Cigar,

    /// The aligned query bases (soft clips removed).
    pub sequence: String,

    /// Per-base quality scores aligned with `sequence`, if the read has them.
    pub quality_scores: Option<Vec<u8>>,
}

impl AlignmentRecord {
    /// Creates an [`AlignmentRecord`] without quality scores.
    pub fn new<N, R, S>(name: N, reference_name: R, start: usize, cigar: Cigar, sequence: S) -> Self
    where
        N: Into<String>,
        R: Into<String>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            reference_name: reference_name.into(),
            start,
            cigar,
            sequence: sequence.as_ref().to_ascii_uppercase(),
            quality_scores: None,
        }
    }

    /// Attaches per-base quality scores.
    pub fn with_quality_scores(mut self, quality_scores: Vec<u8>) -> Self {
        self.quality_scores = Some(quality_scores);
        self
    }

    /// The rightmost aligned reference position (0-based, exclusive).
    pub fn end(&self) -> usize {
        self.start + self.cigar.alignment_span()
    }
}
