//! The typed run configuration.
//!
//! A run is described by a single JSON document. Barcode types and groups are
//! kept in an [`IndexMap`] because their configured order is significant: it
//! decides the order of barcode names in output labels and statistics columns.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::errors::ConfigError;

/// Default number of barcodes above which the pairwise hamming distance check
/// is skipped.
pub const DEFAULT_HAMMING_CHECK_LIMIT: usize = 1000;

/// One barcode type.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BarcodeInfo {
    /// Flanking context with the barcode positions written as `N`s.
    pub context: Option<String>,

    /// FASTA file listing the barcodes of this type.
    pub fasta: Option<PathBuf>,

    /// Whether the listed barcodes are stored reverse-complemented.
    #[serde(default)]
    pub reverse_complement: bool,

    /// Maximum hamming distance for near matches.
    #[serde(default)]
    pub hamming_distance: usize,

    /// Whether this barcode type only tags reads instead of partitioning them.
    #[serde(default)]
    pub no_split: bool,
}

/// Settings for the demultiplexing driver.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DemuxConfig {
    /// Partitions holding fewer than this fraction of all reads are quarantined.
    pub threshold: f64,

    /// Quarantine partitions in which any splitting barcode failed.
    pub screen_failures: bool,

    /// Quarantine partitions not named by a barcode group.
    pub screen_no_group: bool,

    /// Barcode count above which the pairwise hamming distance check is
    /// skipped.
    pub hamming_check_limit: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            screen_failures: false,
            screen_no_group: false,
            hamming_check_limit: DEFAULT_HAMMING_CHECK_LIMIT,
        }
    }
}

/// How reads without any mutation are reported in the genotype table.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WildtypeRows {
    /// `retain` if a no-split barcode type is configured, else `collapse`.
    #[default]
    Auto,

    /// Count them into a single synthesized wild-type row.
    Collapse,

    /// Keep every such read as its own row, and emit no wild-type row.
    Retain,
}

/// Settings for the mutation aggregation driver.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MutationAnalysisConfig {
    /// Substitutions at positions scoring below this are ignored.
    pub quality_score_minimum: u8,

    /// Whether amino acid substitutions are called.
    pub do_aa_analysis: bool,

    /// Whether reads with frameshifting indels in the protein are analyzed.
    pub analyze_seqs_with_frameshift_indels: bool,

    /// Number of most abundant genotypes to write representative alignments for.
    pub highest_abundance_genotypes: usize,

    /// Write raw counts instead of per-read frequencies.
    pub mutations_frequencies_raw: bool,

    /// Nucleotide substitutions to flag, e.g. `A12T`.
    pub nt_muts_of_interest: Vec<String>,

    /// Nonsynonymous amino acid substitutions to flag, e.g. `M1K`.
    pub aa_muts_of_interest: Vec<String>,

    /// How reads without mutations are reported.
    pub wildtype_rows: WildtypeRows,
}

/// The complete configuration for one run.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Name of the run; prefixes demultiplexed output files.
    pub tag: String,

    /// Reference FASTA (full, trimmed and protein coding records).
    pub reference: PathBuf,

    /// Barcode types, in order.
    #[serde(default)]
    pub barcode_info: IndexMap<String, BarcodeInfo>,

    /// Barcode groups: group name to (barcode type to barcode name).
    #[serde(default)]
    pub barcode_groups: IndexMap<String, IndexMap<String, String>>,

    /// Demultiplexing settings.
    #[serde(default)]
    pub demux: DemuxConfig,

    /// Mutation analysis settings.
    #[serde(default)]
    pub mutation_analysis: MutationAnalysisConfig,
}

impl RunConfig {
    /// Reads a configuration file. Relative paths within it are resolved
    /// against the directory containing the file.
    pub fn from_path<P>(src: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = src.as_ref();
        debug!("reading configuration from {}", path.display());

        let file = File::open(path)
            .with_context(|| format!("opening configuration file: {}", path.display()))?;
        let mut config: RunConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing configuration file: {}", path.display()))?;

        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }

        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&p);
            }
        };

        resolve(&mut self.reference);
        for info in self.barcode_info.values_mut() {
            if let Some(fasta) = info.fasta.as_mut() {
                resolve(fasta);
            }
        }
    }

    /// Checks the parts of the configuration that do not depend on any file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nt = Regex::new("^[ATGC][0-9]+[ATGC]$").expect("nucleotide pattern to compile");
        let aa = Regex::new(r"^[ACDEFGHIKLMNPQRSTVWY*][0-9]+[ACDEFGHIKLMNPQRSTVWY*]$")
            .expect("amino acid pattern to compile");

        let analysis = &self.mutation_analysis;
        for mutation in &analysis.nt_muts_of_interest {
            if !nt.is_match(mutation) {
                return Err(ConfigError::InvalidMutationOfInterest {
                    kind: "NT",
                    mutation: mutation.clone(),
                });
            }
        }

        for mutation in &analysis.aa_muts_of_interest {
            if !aa.is_match(mutation) {
                return Err(ConfigError::InvalidMutationOfInterest {
                    kind: "AA",
                    mutation: mutation.clone(),
                });
            }
        }

        Ok(())
    }

    /// Whether any barcode type tags reads instead of partitioning them.
    pub fn has_no_split_barcodes(&self) -> bool {
        self.barcode_info.values().any(|info| info.no_split)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CONFIG: &str = r#"{
        "tag": "run1",
        "reference": "ref.fasta",
        "barcode_info": {
            "rvs": {"context": "ATCGNNNNCCGA", "fasta": "rvs.fasta", "hamming_distance": 1},
            "fwd": {"context": "GGGANNNNAGGG", "fasta": "/abs/fwd.fasta",
                    "reverse_complement": true},
            "umi": {"context": "TTNNNNTT", "fasta": "umi.fasta", "no_split": true}
        },
        "barcode_groups": {"sample1": {"rvs": "bc1", "fwd": "bc2"}},
        "demux": {"threshold": 0.05},
        "mutation_analysis": {
            "do_aa_analysis": true,
            "nt_muts_of_interest": ["A12T"],
            "aa_muts_of_interest": ["M1*"],
            "wildtype_rows": "retain"
        }
    }"#;

    #[test]
    fn it_reads_a_configuration_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        File::create(&path)?.write_all(CONFIG.as_bytes())?;

        let config = RunConfig::from_path(&path)?;

        assert_eq!(config.tag, "run1");
        assert_eq!(config.reference, dir.path().join("ref.fasta"));
        assert_eq!(
            config.barcode_info.keys().collect::<Vec<_>>(),
            vec!["rvs", "fwd", "umi"]
        );
        assert_eq!(
            config.barcode_info["rvs"].fasta,
            Some(dir.path().join("rvs.fasta"))
        );
        assert_eq!(
            config.barcode_info["fwd"].fasta,
            Some(PathBuf::from("/abs/fwd.fasta"))
        );
        assert_eq!(config.barcode_info["fwd"].hamming_distance, 0);
        assert!(config.has_no_split_barcodes());
        assert_eq!(config.demux.threshold, 0.05);
        assert_eq!(config.demux.hamming_check_limit, DEFAULT_HAMMING_CHECK_LIMIT);
        assert!(config.mutation_analysis.do_aa_analysis);
        assert_eq!(config.mutation_analysis.quality_score_minimum, 0);
        assert_eq!(config.mutation_analysis.wildtype_rows, WildtypeRows::Retain);
        Ok(())
    }

    #[test]
    fn it_rejects_malformed_mutations_of_interest() -> anyhow::Result<()> {
        let mut config: RunConfig = serde_json::from_str(CONFIG)?;
        assert_eq!(config.validate(), Ok(()));

        config.mutation_analysis.nt_muts_of_interest = vec![String::from("A12")];
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidMutationOfInterest {
                kind: "NT",
                mutation: String::from("A12"),
            })
        );
        Ok(())
    }
}
