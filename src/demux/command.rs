//! Functionality relating to the `maple demux` subcommand itself.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use indexmap::IndexMap;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::alignment::reconstruct::ReconstructionError;
use crate::alignment::reconstruct::Reconstructor;
use crate::barcode::resolver::BarcodeResolver;
use crate::config::RunConfig;
use crate::demux::compute::Demultiplexer;
use crate::demux::compute::QuarantineReason;
use crate::demux::results;
use crate::demux::results::DemuxResult;
use crate::demux::results::PartitionResult;
use crate::reference::Reference;
use crate::utils::args::NumberOfRecords;
use crate::utils::display::CountFormat;
use crate::utils::display::PercentageFormat;
use crate::utils::display::RecordCounter;
use crate::utils::formats::bam::open_and_parse;
use crate::utils::formats::bam::to_alignment_record;
use crate::utils::formats::bam::ParsedBAMFile;
use crate::utils::formats::bam::PartitionWriters;

/// Name of the directory quarantined partitions are moved to.
pub const QUARANTINE_DIR: &str = "no_subsequent_analysis";

/// Clap arguments for the `maple demux` subcommand.
#[derive(Args)]
pub struct DemuxArgs {
    /// Source BAM.
    #[arg(value_name = "BAM")]
    src: PathBuf,

    /// Run configuration (JSON).
    #[arg(short, long, value_name = "JSON")]
    config: PathBuf,

    /// Directory the partitions and statistics are written to.
    #[arg(short, long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Only examine the first n records in the file.
    #[arg(short, long, value_name = "USIZE")]
    num_records: Option<usize>,
}

/// Main function for the `maple demux` subcommand.
pub fn demux(args: DemuxArgs) -> anyhow::Result<()> {
    info!("Starting demux subcommand.");

    // (1) Load the configuration, the reference and the barcodes.
    let config = RunConfig::from_path(&args.config)?;
    let reference = Reference::from_fasta(&config.reference, false)?;
    let resolver = BarcodeResolver::from_config(&config, &reference)?;

    for barcode_type in resolver.types() {
        info!(
            "  [*] Barcode type `{}`: {} barcodes.",
            barcode_type.name(),
            barcode_type.len()
        );
    }

    // (2) Open the source BAM and prepare the output directory.
    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "creating output directory: {}",
            args.output_dir.display()
        )
    })?;

    let ParsedBAMFile {
        mut reader, header, ..
    } = open_and_parse(&args.src)?;
    let mut writers = PartitionWriters::try_new(&args.output_dir, &config.tag, &header.parsed)?;
    let mut demultiplexer = Demultiplexer::new(Reconstructor::new(&reference), &resolver);

    // (3) Route every record to its partition.
    let num_records = NumberOfRecords::from(args.num_records);
    let mut counter = RecordCounter::default();
    let (mut unmapped, mut wrong_reference, mut malformed) = (0, 0, 0);

    for result in reader.records(&header.parsed) {
        let record = result?;
        counter.inc();

        match to_alignment_record(&header.parsed, &record) {
            Ok(Some(alignment)) => match demultiplexer.route(&alignment) {
                Ok(routing) => writers.write(&routing.partition.label, record, routing.tag)?,
                Err(ReconstructionError::WrongReference { found, .. }) => {
                    trace!("read {} is aligned to {}, skipping.", alignment.name, found);
                    wrong_reference += 1;
                }
                Err(e) => {
                    warn!("skipping read {}: {}", alignment.name, e);
                    malformed += 1;
                }
            },
            Ok(None) => unmapped += 1,
            Err(e) => {
                warn!("skipping record: {:#}", e);
                malformed += 1;
            }
        }

        if counter.time_to_break(&num_records) {
            break;
        }
    }

    let paths = writers.finish()?;
    let counts = demultiplexer.into_counter();
    info!(
        "Processed {} records; {} demultiplexed ({}).",
        CountFormat(counter.get()),
        CountFormat(counts.total()),
        PercentageFormat(counts.total(), counter.get())
    );
    if unmapped + wrong_reference + malformed > 0 {
        info!(
            "Skipped {} unmapped, {} aligned to another reference and {} malformed records.",
            unmapped, wrong_reference, malformed
        );
    }

    // (4) Write the statistics table.
    let stats_path = args
        .output_dir
        .join(format!("{}_demux-stats.csv", config.tag));
    let file = fs::File::create(&stats_path)
        .with_context(|| format!("creating statistics file: {}", stats_path.display()))?;
    results::write_stats(file, &config.tag, counts.barcode_types(), &counts.stats())?;

    // (5) Move partitions that should not be analyzed any further out of the way.
    let quarantined = counts.quarantine(&config.demux);
    let moved = quarantine(&args.output_dir, &paths, &quarantined)?;

    // (6) Print the output to stdout as JSON.
    let totals = counts.partition_totals();
    let partitions = paths
        .keys()
        .map(|label| PartitionResult {
            label: label.clone(),
            count: totals.get(label).copied().unwrap_or(0),
            path: moved[label].clone(),
            quarantined: quarantined.get(label).copied(),
        })
        .collect();

    let result = DemuxResult {
        tag: config.tag.clone(),
        records: counter.get(),
        unmapped,
        wrong_reference,
        malformed,
        demultiplexed: counts.total(),
        partitions,
    };

    let output = serde_json::to_string_pretty(&result)?;
    println!("{}", output);

    anyhow::Ok(())
}

/// Moves the files of quarantined partitions into [`QUARANTINE_DIR`] and
/// returns the final path of every partition.
fn quarantine(
    output_dir: &Path,
    paths: &IndexMap<String, PathBuf>,
    quarantined: &IndexMap<String, QuarantineReason>,
) -> anyhow::Result<IndexMap<String, PathBuf>> {
    let mut moved = paths.clone();
    if quarantined.is_empty() {
        return Ok(moved);
    }

    let dir = output_dir.join(QUARANTINE_DIR);
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating quarantine directory: {}", dir.display()))?;

    for (label, reason) in quarantined {
        let from = match paths.get(label) {
            Some(path) => path,
            None => continue,
        };

        let to = match from.file_name() {
            Some(name) => dir.join(name),
            None => continue,
        };

        info!("Quarantining partition {} ({}).", label, reason);
        fs::rename(from, &to).with_context(|| {
            format!("moving {} to {}", from.display(), to.display())
        })?;
        moved.insert(label.clone(), to);
    }

    Ok(moved)
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    #[test]
    fn it_moves_quarantined_partitions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut paths = IndexMap::new();
        for label in ["sample1", "fail"] {
            let path = dir.path().join(format!("run1_{}.bam", label));
            File::create(&path)?;
            paths.insert(label.to_string(), path);
        }

        let mut quarantined = IndexMap::new();
        quarantined.insert(String::from("fail"), QuarantineReason::BarcodeFailed);

        let moved = quarantine(dir.path(), &paths, &quarantined)?;
        let expected = dir.path().join(QUARANTINE_DIR).join("run1_fail.bam");

        assert_eq!(moved["fail"], expected);
        assert_eq!(moved["sample1"], paths["sample1"]);
        assert!(expected.exists());
        assert!(!paths["fail"].exists());
        assert!(paths["sample1"].exists());
        Ok(())
    }
}
