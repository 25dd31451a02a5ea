//! Resolving the barcodes carried by a read.
//!
//! A [`BarcodeResolver`] is built once per run from the configured barcode
//! types and groups. Every read is then
//!
//! 1. [classified](BarcodeResolver::classify): each barcode type, in
//!    configured order, yields a [`BarcodeOutcome`] (a barcode name, or a
//!    failure with its reason), and
//! 2. [grouped](BarcodeResolver::group): the outcomes are turned into the
//!    label of the output partition the read belongs to.

use std::collections::HashMap;
use std::fmt;

use anyhow::Context as _;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;
use tracing::warn;

use crate::alignment::reconstruct::ProjectedAlignment;
use crate::barcode::context::Context;
use crate::barcode::context::ContextError;
use crate::barcode::hamming::hamming_distance;
use crate::barcode::hamming::HammingIndex;
use crate::barcode::reverse_complement;
use crate::config::RunConfig;
use crate::errors::ConfigError;
use crate::reference::Reference;
use crate::utils::formats;

/// Label of the partition reads fall into when no splitting barcode type is
/// configured.
pub const ALL_LABEL: &str = "all";

/// Why a barcode type could not be resolved for a read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureReason {
    /// The context is absent from the read.
    ContextNotFound,

    /// The context occurs more than once in the read.
    ContextAmbiguous,

    /// The extracted barcode is neither listed nor near a listed barcode.
    NotInFasta,

    /// The barcode span is flanked by an insertion.
    LowConfidence,
}

impl FailureReason {
    /// Every failure reason, in statistics column order.
    pub const ALL: [FailureReason; 4] = [
        FailureReason::ContextNotFound,
        FailureReason::ContextAmbiguous,
        FailureReason::NotInFasta,
        FailureReason::LowConfidence,
    ];

    /// The name used for this failure in statistics column headers.
    pub fn column_name(&self) -> &'static str {
        match self {
            FailureReason::ContextNotFound => "context_not_present_in_reference_sequence",
            FailureReason::ContextAmbiguous => "context_appears_more_than_once",
            FailureReason::NotInFasta => "barcode_not_in_fasta",
            FailureReason::LowConfidence => "low_confidence_barcode_identification",
        }
    }

    /// The position of this failure within [`FailureReason::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl From<ContextError> for FailureReason {
    fn from(error: ContextError) -> Self {
        match error {
            ContextError::ContextNotFound => FailureReason::ContextNotFound,
            ContextError::ContextAmbiguous => FailureReason::ContextAmbiguous,
            ContextError::LowConfidenceRegion => FailureReason::LowConfidence,
        }
    }
}

/// The name a barcode type resolved to for one read, or `fail`.
///
/// Calls are compared as values, so composite keys built from them never
/// collide the way joined strings could.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BarcodeCall {
    /// A configured barcode name.
    Named(String),

    /// The barcode could not be resolved.
    Fail,
}

impl fmt::Display for BarcodeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarcodeCall::Named(name) => f.write_str(name),
            BarcodeCall::Fail => f.write_str("fail"),
        }
    }
}

/// The result of resolving one barcode type for one read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BarcodeOutcome {
    /// The barcode resolved to a configured name.
    Resolved {
        /// The barcode name.
        name: String,
        /// Hamming distance between the read's bases and the listed barcode.
        distance: usize,
    },

    /// The barcode could not be resolved.
    Failed(FailureReason),
}

impl BarcodeOutcome {
    /// The name-or-fail call for this outcome.
    pub fn call(&self) -> BarcodeCall {
        match self {
            BarcodeOutcome::Resolved { name, .. } => BarcodeCall::Named(name.clone()),
            BarcodeOutcome::Failed(_) => BarcodeCall::Fail,
        }
    }

    /// Whether the barcode resolved through a near match.
    pub fn is_near_match(&self) -> bool {
        matches!(self, BarcodeOutcome::Resolved { distance, .. } if *distance > 0)
    }

    /// The failure reason, if the barcode failed.
    pub fn failure(&self) -> Option<FailureReason> {
        match self {
            BarcodeOutcome::Failed(reason) => Some(*reason),
            BarcodeOutcome::Resolved { .. } => None,
        }
    }
}

/// The output partition a read is routed to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Partition {
    /// The partition label, used in output file names.
    pub label: String,

    /// Whether the label was resolved through a named barcode group.
    pub grouped: bool,
}

/// A barcode type as configured, before validation.
#[derive(Clone, Debug, Default)]
pub struct BarcodeTypeSpec {
    /// The barcode type name.
    pub name: String,

    /// The context, with the barcode written as `N`s.
    pub context: String,

    /// `(name, sequence)` pairs as listed.
    pub barcodes: Vec<(String, String)>,

    /// Whether listed sequences must be reverse-complemented.
    pub reverse_complement: bool,

    /// Maximum hamming distance for near matches.
    pub hamming_distance: usize,

    /// Whether this type tags reads instead of partitioning them.
    pub no_split: bool,
}

/// How a barcode type takes part in partitioning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Selected by the barcode groups.
    Grouped,

    /// Appended to the partition label as is.
    Ungrouped,

    /// Only tags reads.
    NoSplit,
}

/// A validated barcode type.
#[derive(Clone, Debug)]
pub struct BarcodeType {
    name: String,
    context: Context,
    barcodes: HashMap<String, String>,
    index: Option<HammingIndex>,
    role: Role,
}

impl BarcodeType {
    /// The barcode type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The barcode context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The number of listed barcodes.
    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    /// Whether no barcodes are listed.
    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    /// How the type takes part in partitioning.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the type decides the output partition.
    pub fn splits(&self) -> bool {
        self.role != Role::NoSplit
    }

    fn resolve(&self, projected: &ProjectedAlignment) -> BarcodeOutcome {
        let span = match self.context.locate_strict(&projected.reference) {
            Ok(span) => span,
            Err(e) => return BarcodeOutcome::Failed(e.into()),
        };

        let barcode = match projected.query.get(span) {
            Some(barcode) => barcode,
            None => return BarcodeOutcome::Failed(FailureReason::ContextNotFound),
        };

        if let Some(name) = self.barcodes.get(barcode) {
            return BarcodeOutcome::Resolved {
                name: name.clone(),
                distance: 0,
            };
        }

        match self.index.as_ref().and_then(|index| index.get(barcode)) {
            Some(hit) => BarcodeOutcome::Resolved {
                name: self.barcodes[&hit.barcode].clone(),
                distance: hit.distance,
            },
            None => BarcodeOutcome::Failed(FailureReason::NotInFasta),
        }
    }
}

/// A condition noticed while setting up the resolver that did not stop the
/// run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetupWarning {
    /// The pairwise hamming distance check was not performed.
    PairwiseCheckSkipped {
        /// The barcode type.
        barcode_type: String,
        /// How many barcodes the type lists.
        barcodes: usize,
        /// The configured limit.
        limit: usize,
    },

    /// A barcode group selects a barcode name that is not listed.
    UnknownGroupBarcode {
        /// The barcode group.
        group: String,
        /// The barcode type.
        barcode_type: String,
        /// The unknown barcode name.
        barcode: String,
    },
}

impl fmt::Display for SetupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupWarning::PairwiseCheckSkipped {
                barcode_type,
                barcodes,
                limit,
            } => write!(
                f,
                "more than {} barcodes ({}) listed for barcode type `{}`, not checking pairwise \
                 hamming distances",
                limit, barcodes, barcode_type
            ),
            SetupWarning::UnknownGroupBarcode {
                group,
                barcode_type,
                barcode,
            } => write!(
                f,
                "barcode group `{}` selects barcode `{}`, which is not listed for barcode type `{}`",
                group, barcode, barcode_type
            ),
        }
    }
}

/// Classifies reads by their barcodes and routes them to partitions.
#[derive(Clone, Debug)]
pub struct BarcodeResolver {
    types: Vec<BarcodeType>,
    groups: HashMap<Vec<String>, String>,
    warnings: Vec<SetupWarning>,
}

impl BarcodeResolver {
    /// Validates the barcode types and groups against `reference`.
    ///
    /// Pairwise hamming distances are only checked for types listing at most
    /// `hamming_check_limit` barcodes; larger types get a [`SetupWarning`].
    pub fn try_new(
        reference: &Reference,
        specs: Vec<BarcodeTypeSpec>,
        groups: &IndexMap<String, IndexMap<String, String>>,
        hamming_check_limit: usize,
    ) -> Result<Self, ConfigError> {
        let mut warnings = Vec::new();

        // (1) All groups must select the same barcode types, and only known ones.
        let grouped_types = match groups.first() {
            Some((first_group, first)) => {
                for (group, selection) in groups {
                    if let Some(barcode_type) = selection
                        .keys()
                        .find(|t| !specs.iter().any(|s| &s.name == *t))
                    {
                        return Err(ConfigError::UnknownGroupBarcodeType {
                            group: group.clone(),
                            barcode_type: barcode_type.clone(),
                        });
                    }

                    let same = selection.len() == first.len()
                        && selection.keys().all(|t| first.contains_key(t));
                    if !same {
                        return Err(ConfigError::InconsistentGroups {
                            group: group.clone(),
                            first_group: first_group.clone(),
                        });
                    }
                }

                first.keys().cloned().collect::<Vec<_>>()
            }
            None => Vec::new(),
        };

        // (2) Validate every barcode type.
        let mut types = Vec::with_capacity(specs.len());
        for spec in specs {
            let role = if grouped_types.contains(&spec.name) {
                Role::Grouped
            } else if spec.no_split {
                Role::NoSplit
            } else {
                Role::Ungrouped
            };

            types.push(validate(reference, spec, role, hamming_check_limit, &mut warnings)?);
        }

        // (3) Key every group by its barcode names, in configured type order.
        let mut keyed = HashMap::new();
        for (group, selection) in groups {
            let mut key = Vec::new();

            for barcode_type in types.iter().filter(|t| t.role == Role::Grouped) {
                let barcode = &selection[barcode_type.name()];

                if !barcode_type.barcodes.values().any(|name| name == barcode) {
                    let warning = SetupWarning::UnknownGroupBarcode {
                        group: group.clone(),
                        barcode_type: barcode_type.name.clone(),
                        barcode: barcode.clone(),
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                }

                key.push(barcode.clone());
            }

            keyed.insert(key, group.clone());
        }

        Ok(Self {
            types,
            groups: keyed,
            warnings,
        })
    }

    /// Builds a resolver from the run configuration, reading every barcode
    /// FASTA it names.
    pub fn from_config(config: &RunConfig, reference: &Reference) -> anyhow::Result<Self> {
        let mut specs = Vec::with_capacity(config.barcode_info.len());

        for (name, info) in &config.barcode_info {
            let context = info
                .context
                .clone()
                .ok_or_else(|| ConfigError::MissingContext {
                    barcode_type: name.clone(),
                })?;
            let fasta = info
                .fasta
                .as_ref()
                .ok_or_else(|| ConfigError::MissingFasta {
                    barcode_type: name.clone(),
                })?;

            debug!("reading barcodes for `{}` from {}", name, fasta.display());
            let barcodes = formats::fasta::read_records(fasta).with_context(|| {
                format!("reading barcode fasta for barcode type `{}`", name)
            })?;

            specs.push(BarcodeTypeSpec {
                name: name.clone(),
                context,
                barcodes,
                reverse_complement: info.reverse_complement,
                hamming_distance: info.hamming_distance,
                no_split: info.no_split,
            });
        }

        Ok(Self::try_new(
            reference,
            specs,
            &config.barcode_groups,
            config.demux.hamming_check_limit,
        )?)
    }

    /// The barcode types, in configured order.
    pub fn types(&self) -> &[BarcodeType] {
        &self.types
    }

    /// Warnings raised while validating the configuration.
    pub fn warnings(&self) -> &[SetupWarning] {
        &self.warnings
    }

    /// Whether any barcode type only tags reads.
    pub fn has_no_split_types(&self) -> bool {
        self.types.iter().any(|t| t.role == Role::NoSplit)
    }

    /// Resolves every barcode type for one read, in configured order.
    pub fn classify(&self, projected: &ProjectedAlignment) -> Vec<BarcodeOutcome> {
        self.types.iter().map(|t| t.resolve(projected)).collect()
    }

    /// Maps the outcomes of [`classify`](Self::classify) to a partition.
    pub fn group(&self, outcomes: &[BarcodeOutcome]) -> Partition {
        let mut group_key = Vec::new();
        let mut ungrouped = Vec::new();
        let mut grouped_failed = false;

        for (barcode_type, outcome) in self.types.iter().zip(outcomes) {
            match (barcode_type.role, outcome.call()) {
                (Role::NoSplit, _) => {}
                (Role::Grouped, BarcodeCall::Named(name)) => group_key.push(name),
                (Role::Grouped, BarcodeCall::Fail) => grouped_failed = true,
                (Role::Ungrouped, call) => ungrouped.push(call.to_string()),
            }
        }

        let fallback = || Partition {
            label: self
                .types
                .iter()
                .zip(outcomes)
                .filter(|(t, _)| t.splits())
                .map(|(_, o)| o.call())
                .join("-"),
            grouped: false,
        };

        let partition = if grouped_failed {
            fallback()
        } else {
            match self.groups.get(&group_key) {
                Some(name) => Partition {
                    label: std::iter::once(name.clone()).chain(ungrouped).join("-"),
                    grouped: true,
                },
                None => fallback(),
            }
        };

        if partition.label.is_empty() {
            return Partition {
                label: String::from(ALL_LABEL),
                grouped: true,
            };
        }

        partition
    }

    /// The side-channel tag built from the no-split barcode types, if any are
    /// configured.
    pub fn no_split_tag(&self, outcomes: &[BarcodeOutcome]) -> Option<String> {
        if !self.has_no_split_types() {
            return None;
        }

        Some(
            self.types
                .iter()
                .zip(outcomes)
                .filter(|(t, _)| t.role == Role::NoSplit)
                .map(|(_, o)| o.call())
                .join("_"),
        )
    }
}

fn validate(
    reference: &Reference,
    spec: BarcodeTypeSpec,
    role: Role,
    hamming_check_limit: usize,
    warnings: &mut Vec<SetupWarning>,
) -> Result<BarcodeType, ConfigError> {
    let context = spec
        .context
        .parse::<Context>()
        .map_err(|_| ConfigError::InvalidContext {
            barcode_type: spec.name.clone(),
            context: spec.context.clone(),
        })?;

    match context.count(reference.sequence()) {
        0 => {
            return Err(ConfigError::ContextNotInReference {
                barcode_type: spec.name,
                context: context.to_string(),
                reference: reference.id().to_string(),
            })
        }
        1 => {}
        _ => {
            return Err(ConfigError::ContextAmbiguousInReference {
                barcode_type: spec.name,
                context: context.to_string(),
                reference: reference.id().to_string(),
            })
        }
    }

    let mut barcodes = HashMap::with_capacity(spec.barcodes.len());
    let mut sequences = Vec::with_capacity(spec.barcodes.len());

    for (name, sequence) in spec.barcodes {
        let mut sequence = sequence.to_ascii_uppercase();
        if spec.reverse_complement {
            sequence = reverse_complement(&sequence);
        }

        if sequence.len() != context.barcode_len() {
            return Err(ConfigError::BarcodeLengthMismatch {
                barcode_type: spec.name,
                barcode: sequence,
                expected: context.barcode_len(),
                context: context.to_string(),
            });
        }

        if barcodes.insert(sequence.clone(), name).is_some() {
            return Err(ConfigError::DuplicateBarcode {
                barcode_type: spec.name,
                barcode: sequence,
            });
        }

        sequences.push(sequence);
    }

    if sequences.len() > hamming_check_limit {
        let warning = SetupWarning::PairwiseCheckSkipped {
            barcode_type: spec.name.clone(),
            barcodes: sequences.len(),
            limit: hamming_check_limit,
        };
        warn!("{}", warning);
        warnings.push(warning);
    } else {
        for (i, first) in sequences.iter().enumerate() {
            for second in &sequences[i + 1..] {
                let distance = hamming_distance(first, second);
                if distance <= spec.hamming_distance {
                    return Err(ConfigError::HammingDistanceViolation {
                        barcode_type: spec.name,
                        first: first.clone(),
                        second: second.clone(),
                        distance,
                        maximum: spec.hamming_distance,
                    });
                }
            }
        }
    }

    let index = match spec.hamming_distance {
        0 => None,
        d => {
            debug!(
                "building hamming distance {} lookup for barcode type `{}`",
                d, spec.name
            );
            Some(HammingIndex::build(&sequences, d))
        }
    };

    Ok(BarcodeType {
        name: spec.name,
        context,
        barcodes,
        index,
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // The barcode sites are written as Ns in the reference.
    const REFERENCE: &str = "GGATCGNNNNCCGATTTGGGANNAGGGTTACNNNGTCCC";

    fn reference() -> Reference {
        Reference::new("ref", REFERENCE)
    }

    fn spec(name: &str, context: &str, barcodes: &[(&str, &str)]) -> BarcodeTypeSpec {
        BarcodeTypeSpec {
            name: name.to_string(),
            context: context.to_string(),
            barcodes: barcodes
                .iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn read(rvs: &str, fwd: &str, umi: &str) -> ProjectedAlignment {
        let query = format!(
            "GGATCG{}CCGATTTGGGA{}AGGGTTAC{}GTCCC",
            rvs, fwd, umi
        );
        ProjectedAlignment {
            reference: REFERENCE.to_string(),
            query,
        }
    }

    fn groups(entries: &[(&str, &[(&str, &str)])]) -> IndexMap<String, IndexMap<String, String>> {
        entries
            .iter()
            .map(|(group, selection)| {
                (
                    group.to_string(),
                    selection
                        .iter()
                        .map(|(t, b)| (t.to_string(), b.to_string()))
                        .collect(),
                )
            })
            .collect()
    }

    fn resolver() -> BarcodeResolver {
        let mut rvs = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AAAA"), ("bc2", "CCCC")]);
        rvs.hamming_distance = 1;
        let fwd = spec("fwd", "GGGANNAGGG", &[("f1", "AC"), ("f2", "GT")]);
        let mut umi = spec("umi", "TTACNNNGTC", &[("u1", "AAA"), ("u2", "TTT")]);
        umi.no_split = true;

        BarcodeResolver::try_new(
            &reference(),
            vec![rvs, fwd, umi],
            &groups(&[("sample1", &[("rvs", "bc1"), ("fwd", "f1")])]),
            1000,
        )
        .unwrap()
    }

    #[test]
    fn it_resolves_near_matches() {
        // ATCGNNNNCCGA with barcode AAAA at distance 1 in a read carrying AAAT.
        let reference = Reference::new("ref", "GGATCGNNNNCCGATT");
        let mut rvs = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AAAA")]);
        rvs.hamming_distance = 1;
        let resolver =
            BarcodeResolver::try_new(&reference, vec![rvs], &IndexMap::new(), 1000).unwrap();

        let outcomes = resolver.classify(&ProjectedAlignment {
            reference: String::from("GGATCGNNNNCCGATT"),
            query: String::from("GGATCGAAATCCGATT"),
        });

        assert_eq!(
            outcomes,
            vec![BarcodeOutcome::Resolved {
                name: String::from("bc1"),
                distance: 1
            }]
        );
        assert!(outcomes[0].is_near_match());
    }

    #[test]
    fn it_routes_grouped_reads_to_the_group() {
        let resolver = resolver();
        let outcomes = resolver.classify(&read("AAAA", "AC", "TTT"));

        assert_eq!(
            resolver.group(&outcomes),
            Partition {
                label: String::from("sample1"),
                grouped: true
            }
        );
        assert_eq!(resolver.no_split_tag(&outcomes), Some(String::from("u2")));
    }

    #[test]
    fn it_falls_back_to_the_barcode_names() {
        let resolver = resolver();

        // A combination no group names.
        let outcomes = resolver.classify(&read("CCCC", "AC", "AAA"));
        assert_eq!(
            resolver.group(&outcomes),
            Partition {
                label: String::from("bc2-f1"),
                grouped: false
            }
        );

        // A failed grouped barcode; the unrecognized umi only shows in the tag.
        let outcomes = resolver.classify(&read("GGGG", "GT", "GGG"));
        assert_eq!(outcomes[0], BarcodeOutcome::Failed(FailureReason::NotInFasta));
        assert_eq!(
            resolver.group(&outcomes),
            Partition {
                label: String::from("fail-f2"),
                grouped: false
            }
        );
        assert_eq!(resolver.no_split_tag(&outcomes), Some(String::from("fail")));
    }

    #[test]
    fn it_labels_deterministically() {
        let resolver = resolver();
        let outcomes = resolver.classify(&read("AAAT", "AC", "AAA"));
        assert_eq!(resolver.group(&outcomes), resolver.group(&outcomes));

        let empty = BarcodeResolver::try_new(&reference(), Vec::new(), &IndexMap::new(), 1000)
            .unwrap();
        assert_eq!(
            empty.group(&[]),
            Partition {
                label: String::from("all"),
                grouped: true
            }
        );
        assert_eq!(empty.no_split_tag(&[]), None);
    }

    #[test]
    fn it_appends_ungrouped_barcodes_to_the_group_name() {
        let rvs = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AAAA")]);
        let fwd = spec("fwd", "GGGANNAGGG", &[("f1", "AC")]);
        let resolver = BarcodeResolver::try_new(
            &reference(),
            vec![rvs, fwd],
            &groups(&[("sample1", &[("rvs", "bc1")])]),
            1000,
        )
        .unwrap();

        let outcomes = resolver.classify(&read("AAAA", "AC", "AAA"));
        assert_eq!(resolver.group(&outcomes).label, "sample1-f1");

        let outcomes = resolver.classify(&read("AAAA", "TT", "AAA"));
        assert_eq!(
            resolver.group(&outcomes),
            Partition {
                label: String::from("sample1-fail"),
                grouped: true
            }
        );
    }

    #[test]
    fn it_flags_barcodes_next_to_insertions() {
        let reference = Reference::new("ref", "GGATCGNNNNCCGATT");
        let rvs = spec("rvs", "NNNNCCGA", &[("bc1", "AAAA")]);
        let resolver =
            BarcodeResolver::try_new(&reference, vec![rvs], &IndexMap::new(), 1000).unwrap();

        // The base before the barcode is an insertion.
        let outcomes = resolver.classify(&ProjectedAlignment {
            reference: String::from("GGATCG-NNNNCCGATT"),
            query: String::from("GGATCGTAAAACCGATT"),
        });
        assert_eq!(outcomes, vec![BarcodeOutcome::Failed(FailureReason::LowConfidence)]);

        // An insertion inside the context breaks it up.
        let outcomes = resolver.classify(&ProjectedAlignment {
            reference: String::from("GGATCGNNNN-CCGATT"),
            query: String::from("GGATCGAAAAGCCGATT"),
        });
        assert_eq!(outcomes, vec![BarcodeOutcome::Failed(FailureReason::ContextNotFound)]);
    }

    #[test]
    fn it_rejects_invalid_barcode_types() {
        let reference = reference();
        let none = IndexMap::new();

        let missing = spec("rvs", "ATCGNNNNCCGG", &[("bc1", "AAAA")]);
        assert!(matches!(
            BarcodeResolver::try_new(&reference, vec![missing], &none, 1000),
            Err(ConfigError::ContextNotInReference { .. })
        ));

        let short = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AAA")]);
        assert!(matches!(
            BarcodeResolver::try_new(&reference, vec![short], &none, 1000),
            Err(ConfigError::BarcodeLengthMismatch { expected: 4, .. })
        ));

        let duplicated = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AAAA"), ("bc2", "aaaa")]);
        assert!(matches!(
            BarcodeResolver::try_new(&reference, vec![duplicated], &none, 1000),
            Err(ConfigError::DuplicateBarcode { .. })
        ));

        let mut close = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AAAA"), ("bc2", "AATT")]);
        close.hamming_distance = 2;
        assert!(matches!(
            BarcodeResolver::try_new(&reference, vec![close.clone()], &none, 1000),
            Err(ConfigError::HammingDistanceViolation { distance: 2, .. })
        ));

        let resolver = BarcodeResolver::try_new(&reference, vec![close], &none, 1).unwrap();
        assert_eq!(
            resolver.warnings(),
            &[SetupWarning::PairwiseCheckSkipped {
                barcode_type: String::from("rvs"),
                barcodes: 2,
                limit: 1
            }]
        );
    }

    #[test]
    fn it_reverse_complements_listed_barcodes() {
        let mut rvs = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AACG")]);
        rvs.reverse_complement = true;
        let resolver =
            BarcodeResolver::try_new(&reference(), vec![rvs], &IndexMap::new(), 1000).unwrap();

        let outcomes = resolver.classify(&read("CGTT", "AC", "AAA"));
        assert_eq!(outcomes[0].call(), BarcodeCall::Named(String::from("bc1")));
    }

    #[test]
    fn it_rejects_inconsistent_groups() {
        let rvs = spec("rvs", "ATCGNNNNCCGA", &[("bc1", "AAAA")]);
        let fwd = spec("fwd", "GGGANNAGGG", &[("f1", "AC")]);

        let result = BarcodeResolver::try_new(
            &reference(),
            vec![rvs.clone(), fwd.clone()],
            &groups(&[
                ("g1", &[("rvs", "bc1"), ("fwd", "f1")]),
                ("g2", &[("rvs", "bc1")]),
            ]),
            1000,
        );
        assert!(matches!(result, Err(ConfigError::InconsistentGroups { .. })));

        let result = BarcodeResolver::try_new(
            &reference(),
            vec![rvs, fwd],
            &groups(&[("g1", &[("alt", "x")])]),
            1000,
        );
        assert!(matches!(
            result,
            Err(ConfigError::UnknownGroupBarcodeType { .. })
        ));
    }
}
