//! Near-match lookup for barcodes within a bounded hamming distance.
//!
//! The index is built by expanding every reference barcode into its ball of
//! radius `d`: one round of single-symbol substitutions per unit of distance,
//! only ever substituting positions that still hold the original symbol (so a
//! round never walks back toward the barcode). Lookups are then a single map
//! read.
//!
//! Balls of different barcodes may overlap when barcodes sit closer than
//! `2d` to each other. Such sequences resolve to the barcode at the smaller
//! distance and, on a tie, to the lexicographically smallest barcode, so the
//! result never depends on the order barcodes were listed in.

use std::collections::HashMap;
use std::collections::HashSet;

/// Symbols substituted when expanding a barcode.
pub const ALPHABET: [u8; 4] = *b"ATGC";

/// Counts the positions at which two equal-length sequences differ. Sequences
/// of different lengths are infinitely far apart.
pub fn hamming_distance(a: &str, b: &str) -> usize {
    if a.len() != b.len() {
        return usize::MAX;
    }

    a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count()
}

/// The reference barcode a sequence resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NearMatch {
    /// The reference barcode.
    pub barcode: String,

    /// Hamming distance between the looked-up sequence and `barcode`.
    pub distance: usize,
}

impl NearMatch {
    fn beats(&self, other: &NearMatch) -> bool {
        (self.distance, &self.barcode) < (other.distance, &other.barcode)
    }
}

/// Maps every sequence within a maximum hamming distance of a set of
/// reference barcodes to its nearest barcode.
#[derive(Clone, Debug, Default)]
pub struct HammingIndex {
    max_distance: usize,
    lookup: HashMap<String, NearMatch>,
}

impl HammingIndex {
    /// Builds the index for `barcodes` at `max_distance`.
    pub fn build<I, S>(barcodes: I, max_distance: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self {
            max_distance,
            lookup: HashMap::new(),
        };

        for barcode in barcodes {
            index.expand(barcode.as_ref());
        }

        index
    }

    fn insert(&mut self, sequence: String, candidate: NearMatch) {
        match self.lookup.get(&sequence) {
            Some(existing) if !candidate.beats(existing) => {}
            _ => {
                self.lookup.insert(sequence, candidate);
            }
        }
    }

    fn expand(&mut self, barcode: &str) {
        let original = barcode.as_bytes();
        let mut seen = HashSet::new();
        let mut frontier = vec![original.to_vec()];
        seen.insert(original.to_vec());

        self.insert(
            barcode.to_string(),
            NearMatch {
                barcode: barcode.to_string(),
                distance: 0,
            },
        );

        for round in 1..=self.max_distance {
            let mut next = Vec::new();

            for sequence in &frontier {
                for (i, symbol) in sequence.iter().enumerate() {
                    if *symbol != original[i] {
                        continue;
                    }

                    for substitute in ALPHABET {
                        if substitute == *symbol {
                            continue;
                        }

                        let mut variant = sequence.clone();
                        variant[i] = substitute;

                        if seen.insert(variant.clone()) {
                            next.push(variant);
                        }
                    }
                }
            }

            for variant in &next {
                self.insert(
                    String::from_utf8_lossy(variant).into_owned(),
                    NearMatch {
                        barcode: barcode.to_string(),
                        distance: round,
                    },
                );
            }

            frontier = next;
        }
    }

    /// Looks up the nearest reference barcode for `sequence`.
    pub fn get(&self, sequence: &str) -> Option<&NearMatch> {
        self.lookup.get(sequence)
    }

    /// The maximum distance the index was built for.
    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    /// The number of sequences in the index.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    /// Iterates over every indexed sequence and its match.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &NearMatch)> {
        self.lookup.iter()
    }
}
