//! Utilities related to bioinformatics file formats.

use std::fmt;
use std::path::Path;

pub mod bam;
pub mod fasta;

/// The file formats `maple` reads.
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BioinformaticsFileFormat {
    /// Binary Alignment Map.
    BAM,

    /// Uncompressed FASTA.
    FASTA,

    /// Gzipped FASTA.
    FASTA_GZ,
}

impl BioinformaticsFileFormat {
    /// Detects the format of a file from its extension.
    pub fn try_detect<P>(path: P) -> Option<Self>
    where
        P: AsRef<Path>,
    {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();

        if name.ends_with(".bam") {
            Some(Self::BAM)
        } else if [".fa", ".fasta", ".fna"].iter().any(|e| name.ends_with(e)) {
            Some(Self::FASTA)
        } else if [".fa.gz", ".fasta.gz", ".fna.gz"]
            .iter()
            .any(|e| name.ends_with(e))
        {
            Some(Self::FASTA_GZ)
        } else {
            None
        }
    }
}

impl fmt::Display for BioinformaticsFileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BAM => write!(f, "BAM"),
            Self::FASTA => write!(f, "FASTA"),
            Self::FASTA_GZ => write!(f, "gzipped FASTA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_detects_formats_from_extensions() {
        use BioinformaticsFileFormat::*;

        assert_eq!(BioinformaticsFileFormat::try_detect("reads.bam"), Some(BAM));
        assert_eq!(BioinformaticsFileFormat::try_detect("dir/ref.FASTA"), Some(FASTA));
        assert_eq!(BioinformaticsFileFormat::try_detect("bc.fa"), Some(FASTA));
        assert_eq!(BioinformaticsFileFormat::try_detect("ref.fa.gz"), Some(FASTA_GZ));
        assert_eq!(BioinformaticsFileFormat::try_detect("reads.sam"), None);
        assert_eq!(BioinformaticsFileFormat::try_detect("reads"), None);
    }
}
