//! Locating a barcode by the sequence that flanks it.
//!
//! A context is a short stretch of reference sequence with the barcode
//! positions written as a run of `N`s, e.g. `ATCGNNNNCCGA`. Because the
//! reference carries the same `N`s at the barcode site, an exact substring
//! search of the context in (a rendering of) the reference pins down the
//! barcode span.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use thiserror::Error;

use crate::alignment::reconstruct::GAP;

/// The symbol marking variable positions within a context.
pub const WILDCARD: char = 'N';

/// Why a barcode span could not be located.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum ContextError {
    /// The context does not occur in the sequence.
    #[error("barcode context not present in sequence")]
    ContextNotFound,

    /// The context occurs more than once in the sequence.
    #[error("barcode context appears in sequence more than once")]
    ContextAmbiguous,

    /// A base flanking the barcode span is a gap.
    #[error("barcode region is flanked by a gap")]
    LowConfidenceRegion,
}

/// A context pattern could not be parsed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("context must contain exactly one contiguous run of `N`s")]
pub struct InvalidContext;

/// A flanking context with a single run of wildcards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Context {
    pattern: String,
    wildcards: Range<usize>,
}

impl Context {
    /// The context as an uppercased string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The number of wildcard positions, i.e. the barcode length.
    pub fn barcode_len(&self) -> usize {
        self.wildcards.len()
    }

    fn occurrences<'a>(&'a self, sequence: &'a str) -> impl Iterator<Item = usize> + 'a {
        sequence.match_indices(&self.pattern).map(|(i, _)| i)
    }

    /// Counts the (non-overlapping) occurrences of the context in `sequence`.
    pub fn count(&self, sequence: &str) -> usize {
        self.occurrences(sequence).count()
    }

    /// Locates the wildcard span within `sequence`.
    pub fn locate(&self, sequence: &str) -> Result<Range<usize>, ContextError> {
        let mut occurrences = self.occurrences(sequence);
        let location = occurrences.next().ok_or(ContextError::ContextNotFound)?;

        if occurrences.next().is_some() {
            return Err(ContextError::ContextAmbiguous);
        }

        Ok(location + self.wildcards.start..location + self.wildcards.end)
    }

    /// Locates the wildcard span within a gapped `sequence`, additionally
    /// refusing spans where either flanking base is a gap.
    pub fn locate_strict(&self, sequence: &str) -> Result<Range<usize>, ContextError> {
        let span = self.locate(sequence)?;
        let bytes = sequence.as_bytes();

        let before = span.start.checked_sub(1).and_then(|i| bytes.get(i));
        let after = bytes.get(span.end);

        if before == Some(&(GAP as u8)) || after == Some(&(GAP as u8)) {
            return Err(ContextError::LowConfidenceRegion);
        }

        Ok(span)
    }
}

impl FromStr for Context {
    type Err = InvalidContext;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pattern = s.to_ascii_uppercase();
        let start = pattern.find(WILDCARD).ok_or(InvalidContext)?;
        let end = pattern.rfind(WILDCARD).ok_or(InvalidContext)? + 1;

        if pattern[start..end].chars().any(|c| c != WILDCARD) {
            return Err(InvalidContext);
        }

        Ok(Self {
            pattern,
            wildcards: start..end,
        })
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_contexts() -> Result<(), InvalidContext> {
        let context = "atcgNNNNccga".parse::<Context>()?;
        assert_eq!(context.pattern(), "ATCGNNNNCCGA");
        assert_eq!(context.barcode_len(), 4);

        assert_eq!("ATCGCCGA".parse::<Context>(), Err(InvalidContext));
        assert_eq!("ANNCNNA".parse::<Context>(), Err(InvalidContext));
        Ok(())
    }

    #[test]
    fn it_locates_the_wildcard_span() -> Result<(), InvalidContext> {
        let context = "ATCGNNNNCCGA".parse::<Context>()?;
        let sequence = "GGGATCGNNNNCCGATTT";

        assert_eq!(context.locate(sequence), Ok(7..11));
        assert_eq!(context.locate(sequence), context.locate(sequence));
        Ok(())
    }

    #[test]
    fn it_fails_when_the_context_is_absent_or_ambiguous() -> Result<(), InvalidContext> {
        let context = "ATCGNNNNCCGA".parse::<Context>()?;

        assert_eq!(
            context.locate("GGGATCGNNNCCGATTT"),
            Err(ContextError::ContextNotFound)
        );

        let repeated = "ATCGNNNNCCGAATCGNNNNCCGA";
        assert_eq!(context.count(repeated), 2);
        assert_eq!(context.locate(repeated), Err(ContextError::ContextAmbiguous));
        Ok(())
    }

    #[test]
    fn it_flags_spans_flanked_by_gaps() -> Result<(), InvalidContext> {
        let context = "NNNNCCGA".parse::<Context>()?;

        assert_eq!(context.locate_strict("AT-NNNNCCGA"), Err(ContextError::LowConfidenceRegion));
        assert_eq!(context.locate_strict("ATANNNNCCGA"), Ok(3..7));
        assert_eq!(context.locate_strict("NNNNCCGA"), Ok(0..4));

        let context = "ATCGNNNN".parse::<Context>()?;
        assert_eq!(context.locate_strict("ATCGNNNN-A"), Err(ContextError::LowConfidenceRegion));
        Ok(())
    }
}
