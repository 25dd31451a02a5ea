//! Module holding the results structs for the `maple demux` subcommand.

use std::io;
use std::path::PathBuf;

use serde::Serialize;

use crate::barcode::resolver::BarcodeCall;
use crate::barcode::resolver::FailureReason;
use crate::demux::compute::QuarantineReason;

/// One row of the demultiplexing statistics table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemuxStatsRow {
    /// The partition label.
    pub output_file_barcodes: String,

    /// The number of reads in the partition.
    pub demuxed_count: usize,

    /// The call for each barcode type.
    pub calls: Vec<BarcodeCall>,

    /// The number of reads with exactly these calls.
    pub barcodes_count: usize,

    /// Per barcode type, the number of near matches.
    pub near_matches: Vec<usize>,

    /// Per barcode type, the failure counts in [`FailureReason::ALL`] order.
    pub failures: Vec<[usize; 4]>,
}

/// The column names of the statistics table.
pub fn stats_header(barcode_types: &[String]) -> Vec<String> {
    let mut header = vec![
        String::from("tag"),
        String::from("output_file_barcodes"),
        String::from("demuxed_count"),
    ];
    header.extend(barcode_types.iter().cloned());
    header.push(String::from("barcodes_count"));

    for barcode_type in barcode_types {
        header.push(format!("{}:not_exact_match", barcode_type));
        for reason in FailureReason::ALL {
            header.push(format!("{}_failed:{}", barcode_type, reason.column_name()));
        }
    }

    header
}

impl DemuxStatsRow {
    /// Renders the row as table fields.
    pub fn to_fields(&self, tag: &str) -> Vec<String> {
        let mut fields = vec![
            tag.to_string(),
            self.output_file_barcodes.clone(),
            self.demuxed_count.to_string(),
        ];
        fields.extend(self.calls.iter().map(|c| c.to_string()));
        fields.push(self.barcodes_count.to_string());

        for (near_matches, failures) in self.near_matches.iter().zip(&self.failures) {
            fields.push(near_matches.to_string());
            fields.extend(failures.iter().map(|f| f.to_string()));
        }

        fields
    }
}

/// Writes the statistics table as CSV.
pub fn write_stats<W>(
    writer: W,
    tag: &str,
    barcode_types: &[String],
    rows: &[DemuxStatsRow],
) -> anyhow::Result<()>
where
    W: io::Write,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(stats_header(barcode_types))?;

    for row in rows {
        csv.write_record(row.to_fields(tag))?;
    }

    csv.flush()?;
    Ok(())
}

/// One output partition.
#[derive(Debug, Serialize)]
pub struct PartitionResult {
    /// The partition label.
    pub label: String,

    /// The number of reads written.
    pub count: usize,

    /// Where the reads ended up.
    pub path: PathBuf,

    /// Why the partition was quarantined, if it was.
    pub quarantined: Option<QuarantineReason>,
}

/// Struct holding the final results for a `maple demux` subcommand call.
#[derive(Debug, Serialize)]
pub struct DemuxResult {
    /// The run tag.
    pub tag: String,

    /// The number of records read.
    pub records: usize,

    /// Records skipped for being unmapped.
    pub unmapped: usize,

    /// Records skipped for being aligned to another reference.
    pub wrong_reference: usize,

    /// Records skipped because their alignment could not be rebuilt.
    pub malformed: usize,

    /// The number of reads written to partitions.
    pub demultiplexed: usize,

    /// Every partition written.
    pub partitions: Vec<PartitionResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_writes_statistics_columns_in_order() -> anyhow::Result<()> {
        let row = DemuxStatsRow {
            output_file_barcodes: String::from("sample1"),
            demuxed_count: 5,
            calls: vec![BarcodeCall::Named(String::from("bc1")), BarcodeCall::Fail],
            barcodes_count: 3,
            near_matches: vec![1, 0],
            failures: vec![[0, 0, 0, 0], [0, 0, 3, 0]],
        };

        let mut buffer = Vec::new();
        write_stats(
            &mut buffer,
            "run1",
            &[String::from("rvs"), String::from("umi")],
            &[row],
        )?;
        let text = String::from_utf8(buffer)?;
        let lines = text.lines().collect::<Vec<_>>();

        assert_eq!(
            lines[0],
            "tag,output_file_barcodes,demuxed_count,rvs,umi,barcodes_count,\
             rvs:not_exact_match,\
             rvs_failed:context_not_present_in_reference_sequence,\
             rvs_failed:context_appears_more_than_once,\
             rvs_failed:barcode_not_in_fasta,\
             rvs_failed:low_confidence_barcode_identification,\
             umi:not_exact_match,\
             umi_failed:context_not_present_in_reference_sequence,\
             umi_failed:context_appears_more_than_once,\
             umi_failed:barcode_not_in_fasta,\
             umi_failed:low_confidence_barcode_identification"
        );
        assert_eq!(lines[1], "run1,sample1,5,bc1,fail,3,1,0,0,0,0,0,0,0,3,0");
        Ok(())
    }
}
