//! Utilities related to opening and reading FASTA files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::bail;
use anyhow::Context;
use noodles::fasta;
use tracing::debug;

use super::BioinformaticsFileFormat;

/// Attempts to open a FASTA file from a given source.
pub fn open<P>(src: P) -> anyhow::Result<fasta::Reader<BufReader<File>>>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();

    match BioinformaticsFileFormat::try_detect(path) {
        Some(BioinformaticsFileFormat::FASTA_GZ) => bail!(
            "gzipped FASTA files are not supported. Please unzip {} and try again.",
            path.display()
        ),
        Some(BioinformaticsFileFormat::FASTA) => {
            let file = File::open(path)
                .with_context(|| format!("opening FASTA file: {}", path.display()))?;
            Ok(fasta::Reader::new(BufReader::new(file)))
        }
        Some(format) => bail!("incompatible formats: required FASTA, found {}", format),
        None => bail!(
            "not able to determine the file type of {}; expected a .fa or .fasta file",
            path.display()
        ),
    }
}

/// Reads every record of a FASTA file as `(name, sequence)` pairs, in file
/// order. Sequences are uppercased.
pub fn read_records<P>(src: P) -> anyhow::Result<Vec<(String, String)>>
where
    P: AsRef<Path>,
{
    let path = src.as_ref();
    let mut reader = open(path)?;
    let mut records = Vec::new();

    for result in reader.records() {
        let record =
            result.with_context(|| format!("reading FASTA record from {}", path.display()))?;
        let sequence = String::from_utf8_lossy(record.sequence().as_ref()).to_ascii_uppercase();
        records.push((record.name().to_string(), sequence));
    }

    debug!("read {} records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn it_reads_records_in_order() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".fasta").tempfile()?;
        writeln!(file, ">bc2\naaTT\n>bc1\nCC\nGG")?;

        let records = read_records(file.path())?;
        assert_eq!(
            records,
            vec![
                (String::from("bc2"), String::from("AATT")),
                (String::from("bc1"), String::from("CCGG")),
            ]
        );
        Ok(())
    }

    #[test]
    fn it_refuses_other_formats() -> anyhow::Result<()> {
        let file = tempfile::Builder::new().suffix(".fa.gz").tempfile()?;
        assert!(read_records(file.path()).is_err());

        let file = tempfile::Builder::new().suffix(".bam").tempfile()?;
        assert!(read_records(file.path()).is_err());
        Ok(())
    }
}
