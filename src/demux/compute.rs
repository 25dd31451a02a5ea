//! Module holding the logic for demultiplexing reads by their barcodes.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::alignment::reconstruct::ReconstructionError;
use crate::alignment::reconstruct::Reconstructor;
use crate::alignment::record::AlignmentRecord;
use crate::barcode::resolver::BarcodeCall;
use crate::barcode::resolver::BarcodeOutcome;
use crate::barcode::resolver::BarcodeResolver;
use crate::barcode::resolver::FailureReason;
use crate::barcode::resolver::Partition;
use crate::config::DemuxConfig;
use crate::demux::results::DemuxStatsRow;

/// Counts accumulated for one combination of partition and barcode calls.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BarcodeCounts {
    /// The number of reads.
    pub count: usize,

    /// Per barcode type, the number of reads resolved through a near match.
    pub near_matches: Vec<usize>,

    /// Per barcode type, the number of failures of each [`FailureReason`].
    pub failures: Vec<[usize; 4]>,
}

impl BarcodeCounts {
    /// The number of failures of `reason` for the barcode type at index `i`.
    pub fn failed(&self, i: usize, reason: FailureReason) -> usize {
        self.failures[i][reason.index()]
    }

    fn new(barcode_types: usize) -> Self {
        Self {
            count: 0,
            near_matches: vec![0; barcode_types],
            failures: vec![[0; 4]; barcode_types],
        }
    }

    fn add(&mut self, outcomes: &[BarcodeOutcome]) {
        self.count += 1;

        for (i, outcome) in outcomes.iter().enumerate() {
            if outcome.is_near_match() {
                self.near_matches[i] += 1;
            }

            if let Some(reason) = outcome.failure() {
                self.failures[i][reason.index()] += 1;
            }
        }
    }
}

/// Identifies one counter row: the partition plus every barcode type's call.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DemuxKey {
    /// The partition the reads went to.
    pub partition: Partition,

    /// The call for each barcode type, in configured order.
    pub calls: Vec<BarcodeCall>,
}

/// Why a partition was moved out of the way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    /// The partition holds too small a share of all reads.
    BelowThreshold,

    /// A splitting barcode failed for the partition.
    BarcodeFailed,

    /// The partition was not named by a barcode group.
    NoGroup,
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuarantineReason::BelowThreshold => write!(f, "below read count threshold"),
            QuarantineReason::BarcodeFailed => write!(f, "barcode identification failed"),
            QuarantineReason::NoGroup => write!(f, "not assigned to a barcode group"),
        }
    }
}

/// Accumulates barcode counts over a run.
#[derive(Clone, Debug)]
pub struct DemuxCounter {
    barcode_types: Vec<String>,
    splits: Vec<bool>,
    rows: IndexMap<DemuxKey, BarcodeCounts>,
}

impl DemuxCounter {
    /// Creates an empty counter for the barcode types of `resolver`.
    pub fn new(resolver: &BarcodeResolver) -> Self {
        Self {
            barcode_types: resolver.types().iter().map(|t| t.name().to_string()).collect(),
            splits: resolver.types().iter().map(|t| t.splits()).collect(),
            rows: IndexMap::new(),
        }
    }

    /// The barcode type names, in configured order.
    pub fn barcode_types(&self) -> &[String] {
        &self.barcode_types
    }

    /// Counts one read.
    pub fn add(&mut self, partition: &Partition, outcomes: &[BarcodeOutcome]) {
        let key = DemuxKey {
            partition: partition.clone(),
            calls: outcomes.iter().map(|o| o.call()).collect(),
        };

        let width = self.barcode_types.len();
        self.rows
            .entry(key)
            .or_insert_with(|| BarcodeCounts::new(width))
            .add(outcomes);
    }

    /// The counter rows, in the order first seen.
    pub fn rows(&self) -> impl Iterator<Item = (&DemuxKey, &BarcodeCounts)> {
        self.rows.iter()
    }

    /// The number of reads counted.
    pub fn total(&self) -> usize {
        self.rows.values().map(|c| c.count).sum()
    }

    /// The number of reads per partition label.
    pub fn partition_totals(&self) -> IndexMap<String, usize> {
        let mut totals = IndexMap::new();
        for (key, counts) in &self.rows {
            *totals.entry(key.partition.label.clone()).or_insert(0) += counts.count;
        }
        totals
    }

    /// One statistics row per counter row, sorted by partition read count and
    /// then by row read count, both descending.
    pub fn stats(&self) -> Vec<DemuxStatsRow> {
        let totals = self.partition_totals();

        let mut rows = self
            .rows
            .iter()
            .map(|(key, counts)| DemuxStatsRow {
                output_file_barcodes: key.partition.label.clone(),
                demuxed_count: totals[&key.partition.label],
                calls: key.calls.clone(),
                barcodes_count: counts.count,
                near_matches: counts.near_matches.clone(),
                failures: counts.failures.clone(),
            })
            .collect::<Vec<_>>();

        rows.sort_by(|a, b| {
            b.demuxed_count
                .cmp(&a.demuxed_count)
                .then(b.barcodes_count.cmp(&a.barcodes_count))
        });
        rows
    }

    /// The partitions that should not be analyzed further, each listed once
    /// with the first reason found for it.
    pub fn quarantine(&self, config: &DemuxConfig) -> IndexMap<String, QuarantineReason> {
        let totals = self.partition_totals();
        let minimum = config.threshold * self.total() as f64;
        let mut quarantined = IndexMap::new();

        for (key, _) in &self.rows {
            let label = &key.partition.label;
            if quarantined.contains_key(label) {
                continue;
            }

            let failed = key
                .calls
                .iter()
                .zip(&self.splits)
                .any(|(call, splits)| *splits && *call == BarcodeCall::Fail);

            let reason = if (totals[label] as f64) < minimum {
                Some(QuarantineReason::BelowThreshold)
            } else if config.screen_failures && failed {
                Some(QuarantineReason::BarcodeFailed)
            } else if config.screen_no_group && !key.partition.grouped {
                Some(QuarantineReason::NoGroup)
            } else {
                None
            };

            if let Some(reason) = reason {
                quarantined.insert(label.clone(), reason);
            }
        }

        quarantined
    }
}

/// Where a read goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Routing {
    /// The partition.
    pub partition: Partition,

    /// The value of the no-split barcode tag, if any no-split barcode type is
    /// configured.
    pub tag: Option<String>,
}

/// Routes reads to partitions and keeps count of what it saw.
pub struct Demultiplexer<'r> {
    reconstructor: Reconstructor<'r>,
    resolver: &'r BarcodeResolver,
    counter: DemuxCounter,
}

impl<'r> Demultiplexer<'r> {
    /// Creates a [`Demultiplexer`].
    pub fn new(reconstructor: Reconstructor<'r>, resolver: &'r BarcodeResolver) -> Self {
        Self {
            reconstructor,
            resolver,
            counter: DemuxCounter::new(resolver),
        }
    }

    /// Classifies one read, counts it and returns where it goes.
    pub fn route(&mut self, record: &AlignmentRecord) -> Result<Routing, ReconstructionError> {
        let projected = self.reconstructor.project(record)?;
        let outcomes = self.resolver.classify(&projected);
        let partition = self.resolver.group(&outcomes);
        let tag = self.resolver.no_split_tag(&outcomes);

        self.counter.add(&partition, &outcomes);
        Ok(Routing { partition, tag })
    }

    /// The counts accumulated so far.
    pub fn counter(&self) -> &DemuxCounter {
        &self.counter
    }

    /// Consumes the demultiplexer, returning its counts.
    pub fn into_counter(self) -> DemuxCounter {
        self.counter
    }
}
