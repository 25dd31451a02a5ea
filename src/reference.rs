//! The reference sequence that reads are aligned against.
//!
//! A [`Reference`] carries the full sequence plus two nested intervals: the
//! trimmed region, which bounds everything reported by mutation analysis, and
//! (optionally) the in-frame protein coding region used for amino acid
//! analysis. All intervals are stored in absolute, 0-based, half-open
//! coordinates on the full sequence.

use std::ops::Range;
use std::path::Path;

use anyhow::Context;

use crate::errors::ConfigError;
use crate::utils::formats;

/// A reference sequence with its trimmed and protein coding regions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    id: String,
    sequence: String,
    trimmed: Range<usize>,
    protein: Option<Range<usize>>,
}

impl Reference {
    /// Creates a [`Reference`] whose trimmed region is the whole sequence and
    /// that has no protein coding region.
    pub fn new<I, S>(id: I, sequence: S) -> Self
    where
        I: Into<String>,
        S: AsRef<str>,
    {
        let sequence = sequence.as_ref().to_ascii_uppercase();
        let trimmed = 0..sequence.len();

        Self {
            id: id.into(),
            sequence,
            trimmed,
            protein: None,
        }
    }

    /// Narrows the trimmed region to the first occurrence of `trimmed` within
    /// the full sequence.
    pub fn with_trimmed(mut self, trimmed: &str) -> Result<Self, ConfigError> {
        let trimmed = trimmed.to_ascii_uppercase();
        let start = self
            .sequence
            .find(&trimmed)
            .ok_or_else(|| ConfigError::TrimmedNotInReference {
                reference: self.id.clone(),
            })?;

        self.trimmed = start..start + trimmed.len();
        self.protein = None;
        Ok(self)
    }

    /// Sets the protein coding region to the first occurrence of `protein`
    /// within the trimmed region.
    pub fn with_protein(mut self, protein: &str) -> Result<Self, ConfigError> {
        let protein = protein.to_ascii_uppercase();

        if protein.len() % 3 != 0 {
            return Err(ConfigError::ProteinNotInFrame {
                length: protein.len(),
            });
        }

        let offset = self.trimmed_sequence().find(&protein).ok_or_else(|| {
            ConfigError::ProteinNotInTrimmed {
                reference: self.id.clone(),
            }
        })?;

        let start = self.trimmed.start + offset;
        self.protein = Some(start..start + protein.len());
        Ok(self)
    }

    /// Loads a reference from a FASTA file. The first record is the full
    /// reference, the second (if present) the trimmed region and the third the
    /// protein coding region. The third record is required when
    /// `require_protein` is set and ignored otherwise.
    pub fn from_fasta<P>(src: P, require_protein: bool) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = src.as_ref();
        let records = formats::fasta::read_records(path)
            .with_context(|| format!("reading reference fasta: {}", path.display()))?;
        let mut records = records.into_iter();

        let missing = |description| ConfigError::MissingReferenceRecord {
            path: path.display().to_string(),
            description,
        };

        let (id, sequence) = records.next().ok_or_else(|| missing("full reference"))?;
        let mut reference = Reference::new(id, sequence);

        match records.next() {
            Some((_, trimmed)) => reference = reference.with_trimmed(&trimmed)?,
            None if require_protein => return Err(missing("trimmed reference").into()),
            None => {}
        }

        if require_protein {
            let (_, protein) = records.next().ok_or_else(|| missing("protein coding"))?;
            reference = reference.with_protein(&protein)?;
        }

        Ok(reference)
    }

    /// The reference identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The full, uppercased reference sequence.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// The trimmed region in absolute coordinates.
    pub fn trimmed(&self) -> Range<usize> {
        self.trimmed.clone()
    }

    /// The sequence of the trimmed region.
    pub fn trimmed_sequence(&self) -> &str {
        &self.sequence[self.trimmed.clone()]
    }

    /// The protein coding region in absolute coordinates, if any.
    pub fn protein(&self) -> Option<Range<usize>> {
        self.protein.clone()
    }

    /// The protein coding region relative to the start of the trimmed region.
    pub fn protein_in_trimmed(&self) -> Option<Range<usize>> {
        self.protein
            .as_ref()
            .map(|p| p.start - self.trimmed.start..p.end - self.trimmed.start)
    }

    /// The sequence of the protein coding region, if any.
    pub fn protein_sequence(&self) -> Option<&str> {
        self.protein.as_ref().map(|p| &self.sequence[p.clone()])
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn it_locates_nested_regions() -> anyhow::Result<()> {
        let reference = Reference::new("ref", "ggATGAAATAGcc")
            .with_trimmed("ATGAAATAGCC")?
            .with_protein("ATGAAATAG")?;

        assert_eq!(reference.sequence(), "GGATGAAATAGCC");
        assert_eq!(reference.trimmed(), 2..13);
        assert_eq!(reference.protein(), Some(2..11));
        assert_eq!(reference.protein_in_trimmed(), Some(0..9));
        assert_eq!(reference.protein_sequence(), Some("ATGAAATAG"));
        Ok(())
    }

    #[test]
    fn it_rejects_out_of_frame_proteins() {
        let result = Reference::new("ref", "ATGAAATAG").with_protein("ATGAA");
        assert_eq!(result, Err(ConfigError::ProteinNotInFrame { length: 5 }));
    }

    #[test]
    fn it_rejects_a_trimmed_region_outside_the_reference() {
        let result = Reference::new("ref", "ATGAAATAG").with_trimmed("CCCC");
        assert!(matches!(
            result,
            Err(ConfigError::TrimmedNotInReference { .. })
        ));
    }

    #[test]
    fn it_loads_references_from_fasta() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".fasta").tempfile()?;
        writeln!(file, ">ref\nCCATGAAATAGCC\n>trimmed\nATGAAATAGC\n>protein\nATGAAATAG")?;

        let reference = Reference::from_fasta(file.path(), true)?;
        assert_eq!(reference.id(), "ref");
        assert_eq!(reference.trimmed_sequence(), "ATGAAATAGC");
        assert_eq!(reference.protein_in_trimmed(), Some(0..9));

        let reference = Reference::from_fasta(file.path(), false)?;
        assert_eq!(reference.protein(), None);
        Ok(())
    }

    #[test]
    fn it_requires_the_protein_record_for_amino_acid_analysis() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".fasta").tempfile()?;
        writeln!(file, ">ref\nCCATGAAATAGCC")?;

        assert!(Reference::from_fasta(file.path(), false).is_ok());
        assert!(Reference::from_fasta(file.path(), true).is_err());
        Ok(())
    }
}
