//! Utilities related to opening, reading and writing Binary Alignment Map
//! (BAM) files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use indexmap::IndexMap;
use noodles::bam;
use noodles::bgzf;
use noodles::sam;
use noodles::sam::header::record::value::map::Map;
use noodles::sam::header::record::value::map::ReferenceSequence;
use noodles::sam::record::cigar::op::Kind as SamKind;
use noodles::sam::record::data::field::Tag;
use noodles::sam::record::data::field::Value;
use noodles::sam::record::ReferenceSequenceName;
use noodles::sam::AlignmentWriter;
use tracing::debug;

use super::BioinformaticsFileFormat;
use crate::alignment::record::AlignmentRecord;
use crate::alignment::record::Cigar;
use crate::alignment::record::Op;
use crate::utils::cigar::convert;
use crate::utils::cigar::consumes_sequence;
use crate::utils::cigar::Conversion;

/// The data field demultiplexed records carry their no-split barcodes in.
pub const BARCODE_TAG: &str = "BC";

//==================================//
// Binary Alignment Map (BAM) files //
//==================================//

/// Attempts to open a BAM file from a given source. Note that this function is
/// private because it should never be called by an external module (use
/// [`open_and_parse`] instead).
fn open<P>(src: P) -> anyhow::Result<bam::Reader<bgzf::Reader<BufReader<File>>>>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();

    match BioinformaticsFileFormat::try_detect(path) {
        Some(BioinformaticsFileFormat::BAM) => {
            let reader = File::open(path)
                .map(BufReader::new)
                .with_context(|| format!("opening src BAM file: {}", path.display()))?;
            Ok(bam::Reader::new(reader))
        }
        Some(format) => bail!("incompatible formats: required BAM, found {}", format),
        None => bail!(
            "not able to determine the file type of {}; expected a .bam file",
            path.display()
        ),
    }
}

/// Utility struct which contains both the raw header (before being parsed, as a
/// string), and the parsed header.
pub struct RawAndParsedHeaders {
    /// The raw, unprocessed header [`String`] from the file.
    pub raw: String,

    /// The parsed header from the file.
    pub parsed: sam::Header,
}

/// Contains the BAM file reader, the parsed header from the BAM file and the
/// reference sequences read from the BAM file.
pub struct ParsedBAMFile {
    /// A reader for the BAM file.
    pub reader: bam::Reader<bgzf::Reader<BufReader<File>>>,

    /// The raw and processed headers from the file, packaged together for convenience.
    pub header: RawAndParsedHeaders,

    /// The reference sequences read from the BAM file.
    pub reference_sequences: IndexMap<ReferenceSequenceName, Map<ReferenceSequence>>,
}

/// Opens a BAM file and parses its header.
pub fn open_and_parse<P>(src: P) -> anyhow::Result<ParsedBAMFile>
where
    P: AsRef<Path>,
{
    // (1) Construct the reader.
    debug!("reading BAM file from disk");
    let mut reader = open(&src)?;

    // (2) Parse the header and reference sequences.
    debug!("parsing the header and reference sequences");
    let raw_header = reader.read_header().with_context(|| "reading header")?;
    let parsed_header = raw_header
        .parse::<sam::Header>()
        .with_context(|| "parsing header")?;
    let reference_sequences = reader
        .read_reference_sequences()
        .with_context(|| "reading reference sequences")?;

    // (3) Return the result.
    Ok(ParsedBAMFile {
        reader,
        header: RawAndParsedHeaders {
            raw: raw_header,
            parsed: parsed_header,
        },
        reference_sequences,
    })
}

//====================//
// Record conversions //
//====================//

/// The name of a record, or `*` if it has none.
pub fn read_name(record: &sam::alignment::Record) -> String {
    record
        .read_name()
        .map(|name| name.to_string())
        .unwrap_or_else(|| String::from("*"))
}

/// Parses the tag demultiplexed records carry their no-split barcodes in.
pub fn barcode_tag() -> anyhow::Result<Tag> {
    BARCODE_TAG
        .parse::<Tag>()
        .with_context(|| format!("parsing data field tag: {}", BARCODE_TAG))
}

/// The no-split barcodes a demultiplexed record was tagged with, if any.
pub fn tagged_barcodes(record: &sam::alignment::Record, tag: Tag) -> Option<String> {
    record
        .data()
        .get(tag)
        .and_then(|value| value.as_str())
        .map(String::from)
}

/// Converts a record into the [`AlignmentRecord`] the core engines consume.
/// Unmapped records yield `None`.
pub fn to_alignment_record(
    header: &sam::Header,
    record: &sam::alignment::Record,
) -> anyhow::Result<Option<AlignmentRecord>> {
    // (1) Unmapped reads carry nothing to reconstruct.
    if record.flags().is_unmapped() {
        return Ok(None);
    }

    let name = read_name(record);

    // (2) Map the reference sequence id to its name.
    let reference_name = match record.reference_sequence_id() {
        Some(id) => match header.reference_sequences().get_index(id) {
            Some((rs_name, _)) => rs_name.to_string(),
            None => bail!(
                "could not map reference sequence id to header for read: {}",
                name
            ),
        },
        None => bail!("could not parse reference sequence id for read: {}", name),
    };

    // (3) Records hold 1-based starts.
    let start = match record.alignment_start() {
        Some(position) => usize::from(position) - 1,
        None => bail!("could not parse alignment start for read: {}", name),
    };

    // (4) Strip the soft clips and collapse the operations.
    let ops = record.cigar().iter().map(|op| (op.kind(), op.len()));
    let sequence = record.sequence().to_string();
    let scores = record
        .quality_scores()
        .as_ref()
        .iter()
        .map(|score| u8::from(*score))
        .collect::<Vec<_>>();

    let (cigar, sequence, quality_scores) = strip_clips(ops, &sequence, &scores)
        .with_context(|| format!("converting read: {}", name))?;

    let mut converted = AlignmentRecord::new(name, reference_name, start, cigar, sequence);
    converted.quality_scores = quality_scores;
    Ok(Some(converted))
}

/// Removes soft clipped bases from a sequence and its quality scores, and
/// maps the remaining operations onto the core kinds. An empty quality list
/// means the record has none.
pub fn strip_clips<I>(
    ops: I,
    sequence: &str,
    scores: &[u8],
) -> anyhow::Result<(Cigar, String, Option<Vec<u8>>)>
where
    I: IntoIterator<Item = (SamKind, usize)>,
{
    let has_scores = !scores.is_empty();
    if has_scores && scores.len() != sequence.len() {
        bail!(
            "record has {} bases but {} quality scores",
            sequence.len(),
            scores.len()
        );
    }

    let mut cigar = Cigar::default();
    let mut kept = String::with_capacity(sequence.len());
    let mut kept_scores = Vec::with_capacity(scores.len());
    let mut ptr = 0;

    for (kind, len) in ops {
        let consumed = match consumes_sequence(kind) {
            true => ptr..ptr + len,
            false => ptr..ptr,
        };

        let bases = match sequence.get(consumed.clone()) {
            Some(bases) => bases,
            None => bail!(
                "record specifies that we should be able to consume a query base, \
                but no such base was found"
            ),
        };
        ptr = consumed.end;

        match convert(kind) {
            Conversion::Keep(k) => {
                cigar.push(Op::new(k, len));
                kept.push_str(bases);
                if has_scores {
                    kept_scores.extend_from_slice(&scores[consumed]);
                }
            }
            Conversion::Clip | Conversion::Drop => {}
        }
    }

    if ptr != sequence.len() {
        bail!("query sequence was not fully consumed by the CIGAR operations");
    }

    let quality_scores = match has_scores {
        true => Some(kept_scores),
        false => None,
    };

    Ok((cigar, kept, quality_scores))
}

//=====================//
// Partitioned writing //
//=====================//

/// Writes records into one BAM file per partition label. Files are created
/// on first use and share the header of the input.
pub struct PartitionWriters {
    directory: PathBuf,
    prefix: String,
    header: sam::Header,
    barcode_tag: Tag,
    writers: IndexMap<String, (PathBuf, bam::Writer<bgzf::Writer<File>>)>,
}

impl PartitionWriters {
    /// Creates a set of writers placing `<prefix>_<label>.bam` files within
    /// `directory`.
    pub fn try_new<P>(directory: P, prefix: &str, header: &sam::Header) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let barcode_tag = barcode_tag()?;

        Ok(Self {
            directory: directory.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
            header: header.clone(),
            barcode_tag,
            writers: IndexMap::new(),
        })
    }

    /// The path records for `label` are written to.
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.directory
            .join(format!("{}_{}.bam", self.prefix, label))
    }

    /// Appends `record` to the partition `label`, tagging it with `barcodes`
    /// when given.
    pub fn write(
        &mut self,
        label: &str,
        mut record: sam::alignment::Record,
        barcodes: Option<String>,
    ) -> anyhow::Result<()> {
        if !self.writers.contains_key(label) {
            let path = self.path_for(label);
            debug!("opening partition {} at {}", label, path.display());

            let file = File::create(&path)
                .with_context(|| format!("creating partition file: {}", path.display()))?;
            let mut writer = bam::Writer::new(file);
            writer
                .write_header(&self.header)
                .with_context(|| "writing BAM header")?;
            writer
                .write_reference_sequences(self.header.reference_sequences())
                .with_context(|| "writing BAM reference sequences")?;

            self.writers.insert(label.to_string(), (path, writer));
        }

        if let Some(barcodes) = barcodes {
            record
                .data_mut()
                .insert(self.barcode_tag, Value::String(barcodes));
        }

        match self.writers.get_mut(label) {
            Some((_, writer)) => writer
                .write_alignment_record(&self.header, &record)
                .with_context(|| format!("writing record to partition {}", label)),
            None => bail!("no writer was opened for partition {}", label),
        }
    }

    /// Finishes every file and returns the path written for each label, in
    /// the order partitions were first seen.
    pub fn finish(self) -> anyhow::Result<IndexMap<String, PathBuf>> {
        let mut paths = IndexMap::with_capacity(self.writers.len());

        for (label, (path, mut writer)) in self.writers {
            writer
                .finish(&self.header)
                .with_context(|| format!("finishing partition file: {}", path.display()))?;
            paths.insert(label, path);
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::record::Kind;

    #[test]
    fn it_strips_soft_clips() -> anyhow::Result<()> {
        let ops = vec![
            (SamKind::HardClip, 5),
            (SamKind::SoftClip, 2),
            (SamKind::Match, 3),
            (SamKind::Insertion, 1),
            (SamKind::SequenceMismatch, 1),
            (SamKind::Skip, 4),
            (SamKind::SequenceMatch, 2),
            (SamKind::SoftClip, 1),
        ];
        let (cigar, sequence, scores) =
            strip_clips(ops, "TTACGGTCAN", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])?;

        assert_eq!(cigar.to_string(), "3M1I1M4D2M");
        assert_eq!(sequence, "ACGGTCA");
        assert_eq!(scores, Some(vec![3, 4, 5, 6, 7, 8, 9]));

        let first = cigar.iter().next().map(|op| op.kind());
        assert_eq!(first, Some(Kind::Match));
        Ok(())
    }

    #[test]
    fn it_treats_missing_quality_scores_as_none() -> anyhow::Result<()> {
        let (_, sequence, scores) = strip_clips(vec![(SamKind::Match, 4)], "ACGT", &[])?;
        assert_eq!(sequence, "ACGT");
        assert_eq!(scores, None);
        Ok(())
    }

    #[test]
    fn it_rejects_operations_longer_than_the_sequence() {
        assert!(strip_clips(vec![(SamKind::Match, 5)], "ACGT", &[]).is_err());
        assert!(strip_clips(vec![(SamKind::Match, 3)], "ACGT", &[]).is_err());
        assert!(strip_clips(vec![(SamKind::Match, 4)], "ACGT", &[1, 2]).is_err());
    }

    #[test]
    fn it_names_partition_files_after_the_label() -> anyhow::Result<()> {
        let header = sam::Header::default();
        let writers = PartitionWriters::try_new("/out", "run1", &header)?;
        assert_eq!(writers.path_for("sample1"), PathBuf::from("/out/run1_sample1.bam"));
        Ok(())
    }
}
