//! Rebuilds a gapped, trimmed alignment from a record's CIGAR operations.
//!
//! Two views of a read are produced here:
//!
//! * [`Reconstructor::reconstruct`] walks the operations in reference
//!   coordinates. Matches copy reference and query bases side by side,
//!   deletions emit `-` into the query, and insertions are set aside in a list
//!   (they have no reference-aligned characters). The result is cut down to
//!   the reference's trimmed region. This is what mutation calling consumes.
//! * [`Reconstructor::project`] walks the same operations in query
//!   coordinates: the reference is rendered with `-` wherever the read has an
//!   insertion and deleted reference bases are skipped. A span located in the
//!   projected reference therefore indexes straight into the query bases,
//!   which is what barcode classification needs.

use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::alignment::record::AlignmentRecord;
use crate::alignment::record::Kind;
use crate::reference::Reference;

/// Symbol used for gaps in either aligned string.
pub const GAP: char = '-';

/// Match mask symbol for positions where reference and query agree.
pub const MATCH: char = '|';

/// Match mask symbol for positions where reference and query disagree.
pub const MISMATCH: char = '.';

/// Match mask symbol for deleted positions.
pub const DELETED: char = ' ';

/// Whether reads with frameshifting indels in the protein coding region are
/// kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameshiftPolicy {
    /// Keep every read.
    #[default]
    Include,

    /// Reject reads with an insertion or deletion inside the protein coding
    /// region whose length is not a multiple of 3.
    Exclude,
}

/// An insertion relative to the trimmed reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Insertion {
    /// Reference position (relative to the trimmed region) the bases were
    /// inserted before.
    pub position: usize,

    /// The inserted bases.
    pub sequence: String,
}

/// A deletion relative to the trimmed reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Deletion {
    /// First deleted reference position (relative to the trimmed region).
    pub position: usize,

    /// Number of deleted bases within the trimmed region.
    pub len: usize,
}

/// The side of the trimmed region a read fails to cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoverageGap {
    /// The read starts after the trimmed region starts.
    Start,

    /// The read ends before the trimmed region ends.
    End,
}

impl fmt::Display for CoverageGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageGap::Start => write!(f, "alignment starts past trimmed reference start"),
            CoverageGap::End => write!(f, "alignment ends before trimmed reference end"),
        }
    }
}

/// The kind of indel that caused a frameshift rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndelKind {
    /// An insertion.
    Insertion,

    /// A deletion.
    Deletion,
}

impl fmt::Display for IndelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndelKind::Insertion => write!(f, "insertion"),
            IndelKind::Deletion => write!(f, "deletion"),
        }
    }
}

/// Why a read could not be reconstructed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReconstructionError {
    /// The read is aligned to a different reference.
    #[error("alignment uses wrong reference sequence")]
    WrongReference {
        /// The configured reference.
        expected: String,
        /// The reference the read is aligned to.
        found: String,
    },

    /// The read does not span the whole trimmed region.
    #[error("{0}")]
    IncompleteCoverage(CoverageGap),

    /// The read carries a frameshifting indel inside the protein coding region.
    #[error("frameshift {kind}")]
    FrameshiftRejected {
        /// Insertion or deletion.
        kind: IndelKind,
        /// Offset within the aligned query at which the indel occurs.
        query_offset: usize,
    },

    /// The operations consume more bases than the reference or query holds.
    #[error("malformed record: {0}")]
    Malformed(&'static str),
}

impl ReconstructionError {
    /// The query offset associated with the failure, if there is one.
    pub fn query_offset(&self) -> Option<usize> {
        match self {
            ReconstructionError::FrameshiftRejected { query_offset, .. } => Some(*query_offset),
            _ => None,
        }
    }
}

const REFERENCE_OVERRUN: &str =
    "record specifies that we should be able to consume a reference base, but no such base was found";
const QUERY_OVERRUN: &str =
    "record specifies that we should be able to consume a query base, but no such base was found";
const QUALITY_OVERRUN: &str = "record has fewer quality scores than query bases";
const QUERY_NOT_CONSUMED: &str = "query sequence was not fully consumed";

/// A read aligned to the trimmed reference region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconstructedAlignment {
    /// The trimmed reference.
    pub reference: String,

    /// One of [`MATCH`], [`MISMATCH`] or [`DELETED`] per reference position.
    pub mask: String,

    /// The query bases aligned to `reference`, with [`GAP`] for deletions.
    pub query: String,

    /// Quality scores aligned to `query`; deleted positions score zero.
    pub quality_scores: Option<Vec<u8>>,

    /// Insertions within the trimmed region, in alignment order.
    pub insertions: Vec<Insertion>,

    /// Deletions overlapping the trimmed region, in alignment order.
    pub deletions: Vec<Deletion>,
}

impl ReconstructedAlignment {
    /// Positions flagged as mismatches in the match mask.
    pub fn mismatches(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask
            .bytes()
            .enumerate()
            .filter(|(_, c)| *c == MISMATCH as u8)
            .map(|(i, _)| i)
    }

    /// Mean of the aligned quality scores, if the read has any.
    pub fn average_quality(&self) -> Option<f64> {
        self.quality_scores.as_ref().and_then(|scores| {
            if scores.is_empty() {
                return None;
            }

            let sum: u64 = scores.iter().map(|s| u64::from(*s)).sum();
            Some(sum as f64 / scores.len() as f64)
        })
    }
}

impl fmt::Display for ReconstructedAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.reference)?;
        writeln!(f, "{}", self.mask)?;
        writeln!(f, "{}", self.query)
    }
}

/// A read's reference rendered in query coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectedAlignment {
    /// The reference, with [`GAP`] at inserted positions and deleted bases
    /// skipped.
    pub reference: String,

    /// The aligned query bases.
    pub query: String,
}

/// Rebuilds alignments against a single reference.
#[derive(Clone, Debug)]
pub struct Reconstructor<'r> {
    reference: &'r Reference,
    frameshifts: FrameshiftPolicy,
}

impl<'r> Reconstructor<'r> {
    /// Creates a [`Reconstructor`] that keeps frameshifted reads.
    pub fn new(reference: &'r Reference) -> Self {
        Self {
            reference,
            frameshifts: FrameshiftPolicy::Include,
        }
    }

    /// Sets the frameshift policy.
    pub fn with_frameshift_policy(mut self, frameshifts: FrameshiftPolicy) -> Self {
        self.frameshifts = frameshifts;
        self
    }

    /// The reference alignments are rebuilt against.
    pub fn reference(&self) -> &Reference {
        self.reference
    }

    fn check_reference(&self, record: &AlignmentRecord) -> Result<(), ReconstructionError> {
        if record.reference_name != self.reference.id() {
            return Err(ReconstructionError::WrongReference {
                expected: self.reference.id().to_string(),
                found: record.reference_name.clone(),
            });
        }

        Ok(())
    }

    fn check_frame(
        &self,
        kind: IndelKind,
        reference_ptr: usize,
        len: usize,
        query_ptr: usize,
    ) -> Result<(), ReconstructionError> {
        if self.frameshifts == FrameshiftPolicy::Include || len % 3 == 0 {
            return Ok(());
        }

        match self.reference.protein() {
            Some(protein) if protein.contains(&reference_ptr) => {
                Err(ReconstructionError::FrameshiftRejected {
                    kind,
                    query_offset: query_ptr,
                })
            }
            _ => Ok(()),
        }
    }

    /// Rebuilds `record` against the trimmed reference region.
    pub fn reconstruct(
        &self,
        record: &AlignmentRecord,
    ) -> Result<ReconstructedAlignment, ReconstructionError> {
        self.check_reference(record)?;

        let trimmed = self.reference.trimmed();
        if record.start > trimmed.start {
            return Err(ReconstructionError::IncompleteCoverage(CoverageGap::Start));
        }
        if record.end() < trimmed.end {
            return Err(ReconstructionError::IncompleteCoverage(CoverageGap::End));
        }

        let reference_seq = self.reference.sequence();
        let query_seq = record.sequence.as_str();
        let scores = record.quality_scores.as_deref();

        let span = record.cigar.alignment_span();
        let mut reference = String::with_capacity(span);
        let mut mask = String::with_capacity(span);
        let mut query = String::with_capacity(span);
        let mut quality_scores = scores.map(|_| Vec::with_capacity(span));
        let mut insertions = Vec::new();
        let mut deletions = Vec::new();

        let mut reference_ptr = record.start;
        let mut query_ptr = 0;

        for op in record.cigar.iter() {
            let len = op.len();

            match op.kind() {
                Kind::Match => {
                    let r = slice(reference_seq, reference_ptr, len, REFERENCE_OVERRUN)?;
                    let q = slice(query_seq, query_ptr, len, QUERY_OVERRUN)?;

                    for (a, b) in r.bytes().zip(q.bytes()) {
                        mask.push(if a == b { MATCH } else { MISMATCH });
                    }
                    reference.push_str(r);
                    query.push_str(q);

                    if let (Some(aligned), Some(scores)) = (quality_scores.as_mut(), scores) {
                        let s = scores
                            .get(query_ptr..query_ptr + len)
                            .ok_or(ReconstructionError::Malformed(QUALITY_OVERRUN))?;
                        aligned.extend_from_slice(s);
                    }

                    reference_ptr += len;
                    query_ptr += len;
                }
                Kind::Insertion => {
                    self.check_frame(IndelKind::Insertion, reference_ptr, len, query_ptr)?;
                    let q = slice(query_seq, query_ptr, len, QUERY_OVERRUN)?;

                    if trimmed.contains(&reference_ptr) {
                        insertions.push(Insertion {
                            position: reference_ptr - trimmed.start,
                            sequence: q.to_string(),
                        });
                    }

                    query_ptr += len;
                }
                Kind::Deletion => {
                    self.check_frame(IndelKind::Deletion, reference_ptr, len, query_ptr)?;
                    let r = slice(reference_seq, reference_ptr, len, REFERENCE_OVERRUN)?;

                    reference.push_str(r);
                    query.extend(std::iter::repeat(GAP).take(len));
                    mask.extend(std::iter::repeat(DELETED).take(len));
                    if let Some(aligned) = quality_scores.as_mut() {
                        aligned.extend(std::iter::repeat(0).take(len));
                    }

                    let overlap = reference_ptr.max(trimmed.start)
                        ..(reference_ptr + len).min(trimmed.end);
                    if overlap.start < overlap.end {
                        deletions.push(Deletion {
                            position: overlap.start - trimmed.start,
                            len: overlap.end - overlap.start,
                        });
                    }

                    reference_ptr += len;
                }
            }
        }

        let window = trimmed.start - record.start..trimmed.end - record.start;
        let cut = |s: &str| -> Result<String, ReconstructionError> {
            s.get(window.clone())
                .map(String::from)
                .ok_or(ReconstructionError::Malformed(REFERENCE_OVERRUN))
        };

        Ok(ReconstructedAlignment {
            reference: cut(&reference)?,
            mask: cut(&mask)?,
            query: cut(&query)?,
            quality_scores: quality_scores.map(|s| s[window.clone()].to_vec()),
            insertions,
            deletions,
        })
    }

    /// Renders the reference of `record` in query coordinates.
    pub fn project(
        &self,
        record: &AlignmentRecord,
    ) -> Result<ProjectedAlignment, ReconstructionError> {
        self.check_reference(record)?;

        let reference_seq = self.reference.sequence();
        let mut reference = String::with_capacity(record.sequence.len());
        let mut reference_ptr = record.start;

        for op in record.cigar.iter() {
            let len = op.len();

            match op.kind() {
                Kind::Match => {
                    reference.push_str(slice(reference_seq, reference_ptr, len, REFERENCE_OVERRUN)?);
                    reference_ptr += len;
                }
                Kind::Insertion => reference.extend(std::iter::repeat(GAP).take(len)),
                Kind::Deletion => reference_ptr += len,
            }
        }

        if reference.len() != record.sequence.len() {
            return Err(ReconstructionError::Malformed(QUERY_NOT_CONSUMED));
        }

        Ok(ProjectedAlignment {
            reference,
            query: record.sequence.clone(),
        })
    }
}

fn slice<'a>(
    s: &'a str,
    start: usize,
    len: usize,
    reason: &'static str,
) -> Result<&'a str, ReconstructionError> {
    let range: Range<usize> = start..start + len;
    s.get(range).ok_or(ReconstructionError::Malformed(reason))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    use super::*;
    use crate::alignment::record::Cigar;
    use crate::alignment::record::Op;

    fn reference() -> Reference {
        // trimmed: GGATGAAACCCTAG, protein: ATGAAACCCTAG
        Reference::new("ref", "TTGGATGAAACCCTAGTT")
            .with_trimmed("GGATGAAACCCTAG")
            .unwrap()
            .with_protein("ATGAAACCCTAG")
            .unwrap()
    }

    fn record(start: usize, cigar: &str, sequence: &str) -> AlignmentRecord {
        AlignmentRecord::new("read", "ref", start, cigar.parse().unwrap(), sequence)
    }

    #[test]
    fn it_trims_and_masks_mismatches() -> anyhow::Result<()> {
        let reference = reference();
        let read = record(0, "18M", "TTGGATGATACCCTAGTT");
        let aln = Reconstructor::new(&reference).reconstruct(&read)?;

        assert_eq!(aln.reference, "GGATGAAACCCTAG");
        assert_eq!(aln.query, "GGATGATACCCTAG");
        assert_eq!(aln.mask, "||||||.|||||||");
        assert_eq!(aln.mismatches().collect::<Vec<_>>(), vec![6]);
        assert!(aln.insertions.is_empty());
        assert!(aln.deletions.is_empty());
        Ok(())
    }

    #[test]
    fn it_records_indels_relative_to_the_trimmed_start() -> anyhow::Result<()> {
        let reference = reference();
        // 6 matches (TTGGAT), insert CCC before ref pos 6, 3 matches (GAA), delete ACC, rest.
        let read = record(0, "6M3I3M3D6M", "TTGGATCCCGAACTAGTT");
        let aln = Reconstructor::new(&reference)
            .with_frameshift_policy(FrameshiftPolicy::Exclude)
            .reconstruct(&read)?;

        assert_eq!(aln.reference, "GGATGAAACCCTAG");
        assert_eq!(aln.query, "GGATGAA---CTAG");
        assert_eq!(aln.mask, "|||||||   ||||");
        assert_eq!(
            aln.insertions,
            vec![Insertion {
                position: 4,
                sequence: String::from("CCC")
            }]
        );
        assert_eq!(
            aln.deletions,
            vec![Deletion {
                position: 7,
                len: 3
            }]
        );
        Ok(())
    }

    #[test]
    fn it_aligns_quality_scores_with_zero_placeholders() -> anyhow::Result<()> {
        let reference = reference();
        let read = record(2, "7M2D7M", "GGATGAACCTAGTT")
            .with_quality_scores(vec![30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43]);
        let aln = Reconstructor::new(&reference).reconstruct(&read)?;

        assert_eq!(aln.query, "GGATGAA--CCTAG");
        assert_eq!(
            aln.quality_scores,
            Some(vec![30, 31, 32, 33, 34, 35, 36, 0, 0, 37, 38, 39, 40, 41])
        );
        Ok(())
    }

    #[test]
    fn it_rejects_frameshifts_inside_the_protein() {
        let reference = reference();
        let read = record(0, "8M2I10M", "TTGGATGATTAACCCTAGTT");
        let reconstructor =
            Reconstructor::new(&reference).with_frameshift_policy(FrameshiftPolicy::Exclude);

        let err = reconstructor.reconstruct(&read).unwrap_err();
        assert_eq!(
            err,
            ReconstructionError::FrameshiftRejected {
                kind: IndelKind::Insertion,
                query_offset: 8,
            }
        );
        assert_eq!(err.to_string(), "frameshift insertion");
        assert_eq!(err.query_offset(), Some(8));

        // The same read is fine when frameshifts are kept.
        assert!(Reconstructor::new(&reference).reconstruct(&read).is_ok());
    }

    #[test]
    fn it_ignores_frameshifts_outside_the_protein() -> anyhow::Result<()> {
        let reference = reference();
        let read = record(0, "3M1D14M", "TTGATGAAACCCTAGTT");
        let aln = Reconstructor::new(&reference)
            .with_frameshift_policy(FrameshiftPolicy::Exclude)
            .reconstruct(&read)?;

        assert_eq!(aln.deletions, vec![Deletion { position: 1, len: 1 }]);
        Ok(())
    }

    #[test]
    fn it_clips_deletions_to_the_trimmed_region() -> anyhow::Result<()> {
        let reference = reference();
        let read = record(0, "1M3D14M", "TATGAAACCCTAGTT");
        let aln = Reconstructor::new(&reference).reconstruct(&read)?;

        assert_eq!(aln.deletions, vec![Deletion { position: 0, len: 2 }]);
        assert_eq!(aln.query, "--ATGAAACCCTAG");
        Ok(())
    }

    #[test]
    fn it_reports_wrong_references_and_incomplete_coverage() {
        let reference = reference();
        let reconstructor = Reconstructor::new(&reference);

        let mut read = record(0, "18M", "TTGGATGAAACCCTAGTT");
        read.reference_name = String::from("other");
        assert!(matches!(
            reconstructor.reconstruct(&read),
            Err(ReconstructionError::WrongReference { .. })
        ));

        let read = record(3, "15M", "GATGAAACCCTAGTT");
        assert_eq!(
            reconstructor.reconstruct(&read),
            Err(ReconstructionError::IncompleteCoverage(CoverageGap::Start))
        );

        let read = record(0, "10M", "TTGGATGAAA");
        assert_eq!(
            reconstructor.reconstruct(&read),
            Err(ReconstructionError::IncompleteCoverage(CoverageGap::End))
        );
    }

    #[test]
    fn it_catches_a_malformed_record_with_too_few_query_bases() {
        let reference = reference();
        let read = record(0, "18M", "TTGGATGAAACCC");
        let err = Reconstructor::new(&reference).reconstruct(&read).unwrap_err();
        assert_eq!(err, ReconstructionError::Malformed(QUERY_OVERRUN));
    }

    #[test]
    fn it_projects_the_reference_into_query_coordinates() -> anyhow::Result<()> {
        let reference = reference();
        let read = record(0, "6M3I3M3D6M", "TTGGATCCCGAACTAGTT");
        let projected = Reconstructor::new(&reference).project(&read)?;

        assert_eq!(projected.reference, "TTGGAT---GAACTAGTT");
        assert_eq!(projected.reference.len(), projected.query.len());
        Ok(())
    }

    #[test]
    fn it_recovers_synthetic_indels() -> anyhow::Result<()> {
        let mut rng = StdRng::seed_from_u64(2023);
        let bases = ['A', 'C', 'G', 'T'];

        for _ in 0..200 {
            let reference_len = rng.gen_range(30..120);
            let reference_seq: String = (0..reference_len)
                .map(|_| bases[rng.gen_range(0..4)])
                .collect();
            let reference = Reference::new("ref", &reference_seq);

            let mut ops = Vec::new();
            let mut query = String::new();
            let mut expected_insertions = Vec::new();
            let mut expected_deletions = Vec::new();
            let mut ptr = 0;

            while ptr < reference_len {
                let len = rng.gen_range(1..=(reference_len - ptr).min(10));
                ops.push(Op::new(Kind::Match, len));
                query.push_str(&reference_seq[ptr..ptr + len]);
                ptr += len;

                let remaining = reference_len - ptr;
                if remaining < 2 {
                    continue;
                }

                if rng.gen_bool(0.5) {
                    let inserted: String = (0..rng.gen_range(1..5))
                        .map(|_| bases[rng.gen_range(0..4)])
                        .collect();
                    ops.push(Op::new(Kind::Insertion, inserted.len()));
                    query.push_str(&inserted);
                    expected_insertions.push(Insertion {
                        position: ptr,
                        sequence: inserted,
                    });
                } else {
                    let len = rng.gen_range(1..remaining);
                    ops.push(Op::new(Kind::Deletion, len));
                    expected_deletions.push(Deletion { position: ptr, len });
                    ptr += len;
                }
            }

            let read = AlignmentRecord::new("read", "ref", 0, Cigar::from(ops), &query);
            let aln = Reconstructor::new(&reference).reconstruct(&read)?;

            assert_eq!(aln.reference, reference_seq);
            assert_eq!(aln.insertions, expected_insertions);
            assert_eq!(aln.deletions, expected_deletions);
            assert_eq!(aln.mismatches().count(), 0);
        }

        Ok(())
    }
}
