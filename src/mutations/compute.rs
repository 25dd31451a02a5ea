//! Module holding the logic for aggregating mutations over all reads.

use std::fmt;

use indexmap::IndexMap;

use crate::alignment::reconstruct::FrameshiftPolicy;
use crate::alignment::reconstruct::ReconstructedAlignment;
use crate::alignment::reconstruct::ReconstructionError;
use crate::alignment::reconstruct::Reconstructor;
use crate::alignment::record::AlignmentRecord;
use crate::config::MutationAnalysisConfig;
use crate::config::WildtypeRows;
use crate::mutation::caller::Genotype;
use crate::mutation::caller::MutationCall;
use crate::mutation::caller::MutationCaller;
use crate::mutation::caller::MutationMatrix;
use crate::reference::Reference;
use crate::utils::histogram::BinOutOfBoundsError;
use crate::utils::histogram::Histogram;

/// Quality reported for reads without quality scores.
pub const MISSING_QUALITY: f64 = -1.0;

//===========//
// Analyzing //
//===========//

/// A read that was reconstructed and had its mutations called.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// The reconstructed alignment.
    pub alignment: ReconstructedAlignment,

    /// The mutations called from it.
    pub call: MutationCall,
}

impl Analysis {
    /// The read's average quality, or [`MISSING_QUALITY`].
    pub fn quality(&self) -> f64 {
        self.alignment.average_quality().unwrap_or(MISSING_QUALITY)
    }
}

/// Reconstructs reads and calls their mutations, as configured for a run.
#[derive(Clone, Debug)]
pub struct MutationAnalyzer<'r> {
    reconstructor: Reconstructor<'r>,
    caller: MutationCaller<'r>,
}

impl<'r> MutationAnalyzer<'r> {
    /// Creates an analyzer. Frameshifted reads are rejected when amino acids
    /// are analyzed, unless configured otherwise.
    pub fn new(reference: &'r Reference, config: &MutationAnalysisConfig) -> Self {
        let exclude = config.do_aa_analysis && !config.analyze_seqs_with_frameshift_indels;
        let frameshifts = match exclude {
            true => FrameshiftPolicy::Exclude,
            false => FrameshiftPolicy::Include,
        };

        Self {
            reconstructor: Reconstructor::new(reference).with_frameshift_policy(frameshifts),
            caller: MutationCaller::new(reference)
                .with_quality_minimum(config.quality_score_minimum)
                .with_amino_acids(config.do_aa_analysis),
        }
    }

    /// The number of nucleotide positions analyzed.
    pub fn positions(&self) -> usize {
        self.reconstructor.reference().trimmed().len()
    }

    /// The number of codons analyzed, zero without amino acid analysis.
    pub fn codons(&self) -> usize {
        self.caller.codons()
    }

    /// Reconstructs one read and calls its mutations.
    pub fn analyze(&self, record: &AlignmentRecord) -> Result<Analysis, ReconstructionError> {
        let alignment = self.reconstructor.reconstruct(record)?;
        let call = self.caller.call(&alignment);
        Ok(Analysis { alignment, call })
    }
}

//=======================//
// Mutations of interest //
//=======================//

/// Configured substitutions to flag in the genotype table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationsOfInterest {
    /// Nucleotide substitutions, e.g. `A12T`.
    pub nt: Vec<String>,

    /// Nonsynonymous amino acid substitutions, e.g. `M1K`.
    pub aa: Vec<String>,
}

impl MutationsOfInterest {
    /// Takes the lists from the configuration. Amino acid substitutions are
    /// only flagged when amino acids are analyzed.
    pub fn from_config(config: &MutationAnalysisConfig) -> Self {
        Self {
            nt: config.nt_muts_of_interest.clone(),
            aa: match config.do_aa_analysis {
                true => config.aa_muts_of_interest.clone(),
                false => Vec::new(),
            },
        }
    }

    /// One flag per nucleotide substitution of interest.
    pub fn nt_flags(&self, genotype: &Genotype) -> Vec<bool> {
        flags(&self.nt, &genotype.nt_substitutions)
    }

    /// One flag per amino acid substitution of interest.
    pub fn aa_flags(&self, genotype: &Genotype) -> Vec<bool> {
        flags(&self.aa, &genotype.aa_nonsynonymous)
    }
}

fn flags(wanted: &[String], found: &[String]) -> Vec<bool> {
    wanted.iter().map(|w| found.contains(w)).collect()
}

/// The flagged entries of `wanted`, in configured order.
pub fn matches<'a>(wanted: &'a [String], flags: &[bool]) -> Vec<&'a str> {
    wanted
        .iter()
        .zip(flags)
        .filter(|(_, flag)| **flag)
        .map(|(w, _)| w.as_str())
        .collect()
}

//=============//
// Aggregating //
//=============//

/// A read that could not be analyzed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    /// The read name.
    pub seq_id: String,

    /// Why it could not be analyzed.
    pub reason: String,

    /// The query offset associated with the failure, if there is one.
    pub index: Option<usize>,
}

/// The key genotype rows are grouped by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenotypeKey {
    /// The mutations.
    pub genotype: Genotype,

    /// The no-split barcodes the read was tagged with.
    pub barcodes: Option<String>,
}

#[derive(Clone, Debug)]
struct GenotypeTally {
    count: usize,
    max_quality: f64,
    representative: String,
}

/// Identifies a row of the genotype table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenotypeId {
    /// The synthesized row counting reads without mutations.
    Wildtype,

    /// The n-th most abundant genotype, from 1.
    Rank(usize),
}

impl fmt::Display for GenotypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenotypeId::Wildtype => write!(f, "wildtype"),
            GenotypeId::Rank(n) => write!(f, "{}", n),
        }
    }
}

/// One row of the genotype table.
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeRow {
    /// The row id.
    pub id: GenotypeId,

    /// The number of reads with this genotype.
    pub count: usize,

    /// The genotype and barcodes.
    pub key: GenotypeKey,

    /// The highest average quality among the reads.
    pub max_quality: f64,

    /// The first read reaching `max_quality`, if the row holds any reads.
    pub representative: Option<String>,
}

/// Accumulates mutation calls over a run.
#[derive(Clone, Debug)]
pub struct MutationAggregator {
    retain_wildtype: bool,
    nt_matrix: MutationMatrix,
    aa_matrix: Option<MutationMatrix>,
    nt_histogram: Histogram,
    aa_histogram: Option<Histogram>,
    wildtype: usize,
    failures: Vec<Failure>,
    genotypes: IndexMap<GenotypeKey, GenotypeTally>,
}

impl MutationAggregator {
    /// Creates an empty aggregator sized for `analyzer`.
    pub fn new(
        analyzer: &MutationAnalyzer<'_>,
        config: &MutationAnalysisConfig,
        barcodes: bool,
    ) -> Self {
        let retain_wildtype = match config.wildtype_rows {
            WildtypeRows::Auto => barcodes,
            WildtypeRows::Collapse => false,
            WildtypeRows::Retain => true,
        };

        let (aa_matrix, aa_histogram) = match config.do_aa_analysis {
            true => (
                Some(MutationMatrix::amino_acids(analyzer.codons())),
                Some(Histogram::zero_based_with_capacity(analyzer.codons())),
            ),
            false => (None, None),
        };

        Self {
            retain_wildtype,
            nt_matrix: MutationMatrix::nucleotides(analyzer.positions()),
            aa_matrix,
            nt_histogram: Histogram::zero_based_with_capacity(analyzer.positions()),
            aa_histogram,
            wildtype: 0,
            failures: Vec::new(),
            genotypes: IndexMap::new(),
        }
    }

    /// Records a read that could not be analyzed.
    pub fn fail(&mut self, seq_id: &str, reason: String, index: Option<usize>) {
        self.failures.push(Failure {
            seq_id: seq_id.to_string(),
            reason,
            index,
        });
    }

    /// Adds the outcome of analyzing one read.
    pub fn add(
        &mut self,
        seq_id: &str,
        barcodes: Option<String>,
        result: Result<Analysis, ReconstructionError>,
    ) -> Result<(), BinOutOfBoundsError> {
        let analysis = match result {
            Ok(analysis) => analysis,
            Err(e) => {
                self.fail(seq_id, e.to_string(), e.query_offset());
                return Ok(());
            }
        };

        let quality = analysis.quality();
        let Analysis { call, .. } = analysis;

        // (1) Matrices and histograms.
        self.nt_matrix.record(&call.nucleotides);
        self.nt_histogram
            .increment(call.genotype.nt_substitutions.len())?;

        if let Some(matrix) = self.aa_matrix.as_mut() {
            matrix.record(&call.amino_acids);
        }
        if let Some(histogram) = self.aa_histogram.as_mut() {
            histogram.increment(call.genotype.aa_nonsynonymous.len())?;
        }

        // (2) Reads without mutations only bump the wild-type count.
        if call.genotype.is_wild_type() && !self.retain_wildtype {
            self.wildtype += 1;
            return Ok(());
        }

        // (3) Everything else is grouped by genotype.
        let key = GenotypeKey {
            genotype: call.genotype,
            barcodes,
        };

        match self.genotypes.get_mut(&key) {
            Some(tally) => {
                tally.count += 1;
                if quality > tally.max_quality {
                    tally.max_quality = quality;
                    tally.representative = seq_id.to_string();
                }
            }
            None => {
                self.genotypes.insert(
                    key,
                    GenotypeTally {
                        count: 1,
                        max_quality: quality,
                        representative: seq_id.to_string(),
                    },
                );
            }
        }

        Ok(())
    }

    /// Finalizes the run.
    pub fn finish(self) -> MutationAggregate {
        let mut tallies = self.genotypes.into_iter().collect::<Vec<_>>();
        tallies.sort_by(|(_, a), (_, b)| b.count.cmp(&a.count));

        let mut genotypes = Vec::with_capacity(tallies.len() + 1);
        if !self.retain_wildtype {
            genotypes.push(GenotypeRow {
                id: GenotypeId::Wildtype,
                count: self.wildtype,
                key: GenotypeKey {
                    genotype: Genotype::default(),
                    barcodes: None,
                },
                max_quality: MISSING_QUALITY,
                representative: None,
            });
        }

        for (i, (key, tally)) in tallies.into_iter().enumerate() {
            genotypes.push(GenotypeRow {
                id: GenotypeId::Rank(i + 1),
                count: tally.count,
                key,
                max_quality: tally.max_quality,
                representative: Some(tally.representative),
            });
        }

        MutationAggregate {
            analyzed: self.nt_histogram.sum(),
            wildtype: self.wildtype,
            failures: self.failures,
            genotypes,
            nt_matrix: self.nt_matrix,
            aa_matrix: self.aa_matrix,
            nt_histogram: self.nt_histogram,
            aa_histogram: self.aa_histogram,
        }
    }
}

/// Everything aggregated over a run.
#[derive(Clone, Debug)]
pub struct MutationAggregate {
    /// The number of reads analyzed.
    pub analyzed: usize,

    /// The number of reads without mutations counted into the wild-type row.
    pub wildtype: usize,

    /// Reads that could not be analyzed.
    pub failures: Vec<Failure>,

    /// The genotype table, wild-type row first (when present), then by
    /// descending count.
    pub genotypes: Vec<GenotypeRow>,

    /// Nucleotide substitution counts.
    pub nt_matrix: MutationMatrix,

    /// Nonsynonymous amino acid substitution counts.
    pub aa_matrix: Option<MutationMatrix>,

    /// Reads per number of nucleotide substitutions.
    pub nt_histogram: Histogram,

    /// Reads per number of nonsynonymous amino acid substitutions.
    pub aa_histogram: Option<Histogram>,
}

impl MutationAggregate {
    /// The `n` most abundant genotypes that have a representative read.
    pub fn top_genotypes(&self, n: usize) -> impl Iterator<Item = &GenotypeRow> {
        self.genotypes
            .iter()
            .filter(|row| row.representative.is_some())
            .take(n)
    }

    /// What mutation matrices are divided by: `None` for raw counts, else the
    /// number of analyzed reads.
    pub fn normalizer(&self, raw: bool) -> Option<usize> {
        match raw || self.analyzed == 0 {
            true => None,
            false => Some(self.analyzed),
        }
    }
}

//=================//
// Representatives //
//=================//

/// A top genotype and its reconstructed representative read, if it was found.
pub type Representative<'a> = (&'a GenotypeRow, Option<ReconstructedAlignment>);

/// Finds the reads chosen to represent the top genotypes in a second pass.
pub struct RepresentativeFinder<'a, 'r> {
    analyzer: &'a MutationAnalyzer<'r>,
    wanted: Vec<&'a GenotypeRow>,
    found: Vec<Option<ReconstructedAlignment>>,
}

impl<'a, 'r> RepresentativeFinder<'a, 'r> {
    /// Creates a finder for `rows`.
    pub fn new<I>(analyzer: &'a MutationAnalyzer<'r>, rows: I) -> Self
    where
        I: IntoIterator<Item = &'a GenotypeRow>,
    {
        let wanted = rows.into_iter().collect::<Vec<_>>();
        let found = vec![None; wanted.len()];
        Self {
            analyzer,
            wanted,
            found,
        }
    }

    /// Whether every representative has been found.
    pub fn is_complete(&self) -> bool {
        self.found.iter().all(Option::is_some)
    }

    /// Checks whether `record` is one of the representatives. A read only
    /// counts when it is reconstructed to the same genotype and quality it was
    /// chosen for.
    pub fn offer(&mut self, record: &AlignmentRecord, barcodes: Option<&str>) {
        let candidates = self
            .wanted
            .iter()
            .enumerate()
            .filter(|(i, row)| {
                self.found[*i].is_none()
                    && row.representative.as_deref() == Some(record.name.as_str())
            })
            .map(|(i, _)| i)
            .collect::<Vec<_>>();

        if candidates.is_empty() {
            return;
        }

        let analysis = match self.analyzer.analyze(record) {
            Ok(analysis) => analysis,
            Err(_) => return,
        };

        for i in candidates {
            let row = self.wanted[i];
            if row.key.genotype == analysis.call.genotype
                && row.key.barcodes.as_deref() == barcodes
                && row.max_quality == analysis.quality()
            {
                self.found[i] = Some(analysis.alignment.clone());
            }
        }
    }

    /// The representatives, in genotype order. Reads that were not found are
    /// `None`.
    pub fn finish(self) -> Vec<Representative<'a>> {
        self.wanted.into_iter().zip(self.found).collect()
    }
}
