//! Module holding the tables and results structs for the `maple mutations`
//! subcommand.

use std::io;
use std::path::PathBuf;

use serde::Serialize;

use crate::mutation::caller::MutationMatrix;
use crate::mutations::compute::matches;
use crate::mutations::compute::Failure;
use crate::mutations::compute::GenotypeRow;
use crate::mutations::compute::MutationsOfInterest;
use crate::mutations::compute::Representative;
use crate::utils::histogram::Histogram;

/// Which optional columns the genotype table carries.
#[derive(Clone, Debug, Default)]
pub struct GenotypeColumns {
    /// Amino acid substitution columns.
    pub amino_acids: bool,

    /// The `barcode(s)` column.
    pub barcodes: bool,

    /// Mutations of interest, each getting a one-hot column.
    pub interest: MutationsOfInterest,
}

impl GenotypeColumns {
    /// The column names.
    pub fn header(&self) -> Vec<String> {
        let mut header = [
            "genotype",
            "count",
            "NT_substitutions",
            "NT_substitutions_count",
            "NT_insertions",
            "NT_deletions",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();

        if self.amino_acids {
            header.push(String::from("AA_substitutions_nonsynonymous"));
            header.push(String::from("AA_substitutions_synonymous"));
            header.push(String::from("AA_substitutions_nonsynonymous_count"));
        }

        if self.barcodes {
            header.push(String::from("barcode(s)"));
        }

        if !self.interest.nt.is_empty() {
            header.push(String::from("NT_muts_of_interest"));
            header.extend(self.interest.nt.iter().cloned());
        }

        if !self.interest.aa.is_empty() {
            header.push(String::from("AA_muts_of_interest"));
            header.extend(self.interest.aa.iter().cloned());
        }

        header
    }

    /// Renders one row.
    pub fn fields(&self, row: &GenotypeRow) -> Vec<String> {
        let genotype = &row.key.genotype;
        let mut fields = vec![
            row.id.to_string(),
            row.count.to_string(),
            genotype.nt_substitutions.join(", "),
            genotype.nt_substitutions.len().to_string(),
            genotype.insertions.join(", "),
            genotype.deletions.join(", "),
        ];

        if self.amino_acids {
            fields.push(genotype.aa_nonsynonymous.join(", "));
            fields.push(genotype.aa_synonymous.join(", "));
            fields.push(genotype.aa_nonsynonymous.len().to_string());
        }

        if self.barcodes {
            fields.push(row.key.barcodes.clone().unwrap_or_default());
        }

        if !self.interest.nt.is_empty() {
            let flags = self.interest.nt_flags(genotype);
            fields.push(matches(&self.interest.nt, &flags).join(", "));
            fields.extend(flags.iter().map(|f| one_hot(*f)));
        }

        if !self.interest.aa.is_empty() {
            let flags = self.interest.aa_flags(genotype);
            fields.push(matches(&self.interest.aa, &flags).join(", "));
            fields.extend(flags.iter().map(|f| one_hot(*f)));
        }

        fields
    }
}

fn one_hot(flag: bool) -> String {
    String::from(if flag { "1" } else { "0" })
}

/// Writes the genotype table as CSV.
pub fn write_genotypes<W>(
    writer: W,
    columns: &GenotypeColumns,
    rows: &[GenotypeRow],
) -> anyhow::Result<()>
where
    W: io::Write,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(columns.header())?;

    for row in rows {
        csv.write_record(columns.fields(row))?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes the failures table as CSV.
pub fn write_failures<W>(writer: W, failures: &[Failure]) -> anyhow::Result<()>
where
    W: io::Write,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["seq_ID", "failure_reason", "failure_index"])?;

    for failure in failures {
        let index = match failure.index {
            Some(i) => i.to_string(),
            None => String::from("N/A"),
        };
        csv.write_record([failure.seq_id.as_str(), failure.reason.as_str(), index.as_str()])?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes a mutation matrix with one row per symbol and one column per
/// position. `labels` names the positions; when `normalizer` is given every
/// count is divided by it.
pub fn write_matrix<W>(
    writer: W,
    corner: &str,
    labels: &[String],
    matrix: &MutationMatrix,
    normalizer: Option<usize>,
) -> anyhow::Result<()>
where
    W: io::Write,
{
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![corner.to_string()];
    header.extend(labels.iter().cloned());
    csv.write_record(&header)?;

    for (symbol, residue) in matrix.alphabet().iter().enumerate() {
        let mut record = vec![(*residue as char).to_string()];
        for position in 0..matrix.positions() {
            let count = matrix.get(position, symbol);
            record.push(match normalizer {
                Some(n) => (count as f64 / n as f64).to_string(),
                None => count.to_string(),
            });
        }
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(())
}

/// Column labels for a nucleotide matrix: wild-type base and 0-based position.
pub fn nucleotide_labels(trimmed: &str) -> Vec<String> {
    trimmed
        .chars()
        .enumerate()
        .map(|(i, base)| format!("{}{}", base, i))
        .collect()
}

/// Column labels for an amino acid matrix: wild-type residue and 1-based
/// codon.
pub fn amino_acid_labels(protein: &str) -> Vec<String> {
    protein
        .chars()
        .enumerate()
        .map(|(i, residue)| format!("{}{}", residue, i + 1))
        .collect()
}

/// Writes a substitution count histogram as CSV.
pub fn write_histogram<W>(writer: W, column: &str, histogram: &Histogram) -> anyhow::Result<()>
where
    W: io::Write,
{
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["n", column])?;

    for (n, count) in histogram.values().iter().enumerate() {
        csv.write_record([n.to_string(), count.to_string()])?;
    }

    csv.flush()?;
    Ok(())
}

/// Writes the representative alignment report.
pub fn write_alignments<W>(
    mut writer: W,
    representatives: &[Representative<'_>],
) -> io::Result<()>
where
    W: io::Write,
{
    for (row, alignment) in representatives {
        let (name, alignment) = match (&row.representative, alignment) {
            (Some(name), Some(alignment)) => (name, alignment),
            _ => continue,
        };

        writeln!(
            writer,
            "Genotype {} representative sequence. Sequence ID: {}",
            row.id, name
        )?;
        writeln!(writer, "{}", alignment)?;
    }

    writer.flush()
}

/// Struct holding the final results for a `maple mutations` subcommand call.
#[derive(Debug, Serialize)]
pub struct MutationsResult {
    /// The records read.
    pub records: usize,

    /// Records skipped for being unmapped.
    pub unmapped: usize,

    /// Reads whose mutations were called.
    pub analyzed: usize,

    /// Reads written to the failures table.
    pub failed: usize,

    /// Reads counted into the wild-type row.
    pub wildtype: usize,

    /// The number of distinct genotypes.
    pub genotypes: usize,

    /// The number of representative alignments written.
    pub representatives: usize,

    /// Every file written.
    pub outputs: Vec<PathBuf>,
}
