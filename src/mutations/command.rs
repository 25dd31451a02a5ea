//! Functionality relating to the `maple mutations` subcommand itself.

use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use clap::Args;
use noodles::sam::record::data::field::Tag;
use tracing::debug;
use tracing::info;

use crate::config::RunConfig;
use crate::mutation::code::translate;
use crate::mutations::compute::MutationAggregate;
use crate::mutations::compute::MutationAggregator;
use crate::mutations::compute::MutationAnalyzer;
use crate::mutations::compute::MutationsOfInterest;
use crate::mutations::compute::Representative;
use crate::mutations::compute::RepresentativeFinder;
use crate::mutations::results;
use crate::mutations::results::GenotypeColumns;
use crate::mutations::results::MutationsResult;
use crate::reference::Reference;
use crate::utils::args::NumberOfRecords;
use crate::utils::display::CountFormat;
use crate::utils::display::PercentageFormat;
use crate::utils::display::RecordCounter;
use crate::utils::formats::bam::barcode_tag;
use crate::utils::formats::bam::open_and_parse;
use crate::utils::formats::bam::read_name;
use crate::utils::formats::bam::tagged_barcodes;
use crate::utils::formats::bam::to_alignment_record;
use crate::utils::formats::bam::ParsedBAMFile;

/// Clap arguments for the `maple mutations` subcommand.
#[derive(Args)]
pub struct MutationsArgs {
    /// Source BAM.
    #[arg(value_name = "BAM")]
    src: PathBuf,

    /// Run configuration (JSON).
    #[arg(short, long, value_name = "JSON")]
    config: PathBuf,

    /// Directory the tables are written to.
    #[arg(short, long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Prefix of every output file. Defaults to the BAM file stem.
    #[arg(short, long, value_name = "STRING")]
    prefix: Option<String>,

    /// Only examine the first n records in the file.
    #[arg(short, long, value_name = "USIZE")]
    num_records: Option<usize>,
}

/// Main function for the `maple mutations` subcommand.
pub fn mutations(args: MutationsArgs) -> anyhow::Result<()> {
    info!("Starting mutations subcommand.");

    // (1) Load the configuration and the reference.
    let config = RunConfig::from_path(&args.config)?;
    let settings = &config.mutation_analysis;
    let reference = Reference::from_fasta(&config.reference, settings.do_aa_analysis)?;

    let prefix = match args.prefix.clone() {
        Some(prefix) => prefix,
        None => match args.src.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => bail!("could not derive an output prefix from {}", args.src.display()),
        },
    };

    let barcodes = config.has_no_split_barcodes();
    let tag = match barcodes {
        true => Some(barcode_tag()?),
        false => None,
    };

    let analyzer = MutationAnalyzer::new(&reference, settings);
    let mut aggregator = MutationAggregator::new(&analyzer, settings, barcodes);
    let num_records = NumberOfRecords::from(args.num_records);

    // (2) Call the mutations of every read.
    let ParsedBAMFile {
        mut reader, header, ..
    } = open_and_parse(&args.src)?;

    let mut counter = RecordCounter::default();
    let mut unmapped = 0;

    for result in reader.records(&header.parsed) {
        let record = result?;
        counter.inc();

        match to_alignment_record(&header.parsed, &record) {
            Ok(Some(alignment)) => {
                let tagged = tag.and_then(|tag| tagged_barcodes(&record, tag));
                aggregator.add(&alignment.name, tagged, analyzer.analyze(&alignment))?;
            }
            Ok(None) => unmapped += 1,
            Err(e) => aggregator.fail(&read_name(&record), format!("{:#}", e), None),
        }

        if counter.time_to_break(&num_records) {
            break;
        }
    }

    let aggregate = aggregator.finish();
    info!(
        "Processed {} records; {} analyzed ({}), {} failed, {} wild type.",
        CountFormat(counter.get()),
        CountFormat(aggregate.analyzed),
        PercentageFormat(aggregate.analyzed, counter.get()),
        CountFormat(aggregate.failures.len()),
        CountFormat(aggregate.wildtype)
    );
    if unmapped > 0 {
        info!("Skipped {} unmapped records.", CountFormat(unmapped));
    }

    // (3) Write the tables.
    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!(
            "creating output directory: {}",
            args.output_dir.display()
        )
    })?;

    let mut outputs = Vec::new();
    let mut create = |suffix: &str| -> anyhow::Result<File> {
        let path = args.output_dir.join(format!("{}_{}", prefix, suffix));
        let file = File::create(&path)
            .with_context(|| format!("creating output file: {}", path.display()))?;
        outputs.push(path);
        Ok(file)
    };

    let columns = GenotypeColumns {
        amino_acids: settings.do_aa_analysis,
        barcodes,
        interest: MutationsOfInterest::from_config(settings),
    };
    results::write_genotypes(create("genotypes.csv")?, &columns, &aggregate.genotypes)?;
    results::write_failures(create("failures.csv")?, &aggregate.failures)?;

    let normalizer = aggregate.normalizer(settings.mutations_frequencies_raw);
    results::write_matrix(
        create("NT-mutation-frequencies.csv")?,
        "NT_mutation_count",
        &results::nucleotide_labels(reference.trimmed_sequence()),
        &aggregate.nt_matrix,
        normalizer,
    )?;
    results::write_histogram(
        create("NT-mutation-distribution.csv")?,
        "seqs_with_n_NTsubstitutions",
        &aggregate.nt_histogram,
    )?;

    if let (Some(matrix), Some(histogram)) = (&aggregate.aa_matrix, &aggregate.aa_histogram) {
        let protein = reference
            .protein_sequence()
            .and_then(translate)
            .unwrap_or_default();
        results::write_matrix(
            create("AA-mutation-frequencies.csv")?,
            "AA_mutation_count",
            &results::amino_acid_labels(&protein),
            matrix,
            normalizer,
        )?;
        results::write_histogram(
            create("AA-mutation-distribution.csv")?,
            "seqs_with_n_AAsubstitutions",
            histogram,
        )?;
    }

    // (4) Find and write the representative alignments.
    let representatives = find_representatives(
        &args.src,
        &analyzer,
        &aggregate,
        settings.highest_abundance_genotypes,
        tag,
        &num_records,
    )?;
    let written = representatives.iter().filter(|(_, a)| a.is_some()).count();
    results::write_alignments(BufWriter::new(create("alignments.txt")?), &representatives)?;

    // (5) Print the output to stdout as JSON.
    let result = MutationsResult {
        records: counter.get(),
        unmapped,
        analyzed: aggregate.analyzed,
        failed: aggregate.failures.len(),
        wildtype: aggregate.wildtype,
        genotypes: aggregate
            .genotypes
            .iter()
            .filter(|row| row.representative.is_some())
            .count(),
        representatives: written,
        outputs,
    };

    let output = serde_json::to_string_pretty(&result)?;
    println!("{}", output);

    anyhow::Ok(())
}

/// Rereads `src` to rebuild the representative reads of the `n` most abundant
/// genotypes.
fn find_representatives<'a>(
    src: &Path,
    analyzer: &'a MutationAnalyzer<'_>,
    aggregate: &'a MutationAggregate,
    n: usize,
    tag: Option<Tag>,
    num_records: &NumberOfRecords,
) -> anyhow::Result<Vec<Representative<'a>>> {
    let mut finder = RepresentativeFinder::new(analyzer, aggregate.top_genotypes(n));
    if finder.is_complete() {
        return Ok(finder.finish());
    }

    debug!("rereading {} for representative reads", src.display());
    let ParsedBAMFile {
        mut reader, header, ..
    } = open_and_parse(src)?;
    let mut counter = RecordCounter::default();

    for result in reader.records(&header.parsed) {
        let record = result?;
        counter.inc();

        if let Ok(Some(alignment)) = to_alignment_record(&header.parsed, &record) {
            let tagged = tag.and_then(|tag| tagged_barcodes(&record, tag));
            finder.offer(&alignment, tagged.as_deref());
        }

        if finder.is_complete() || counter.time_to_break(num_records) {
            break;
        }
    }

    Ok(finder.finish())
}
