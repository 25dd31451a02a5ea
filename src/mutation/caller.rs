//! Calls substitutions from a reconstructed alignment.
//!
//! Nucleotide substitutions are read straight off the match mask. When amino
//! acid analysis is on, every substitution inside the protein coding region
//! also triggers a look at its codon: each codon is translated at most once
//! per read, and codons touched by an insertion or deletion or containing a
//! low quality base are left alone.

use std::collections::HashSet;
use std::fmt;
use std::ops::Range;

use crate::alignment::reconstruct::ReconstructedAlignment;
use crate::mutation::code::amino_acid_index;
use crate::mutation::code::nucleotide_index;
use crate::mutation::code::translate_codon;
use crate::mutation::code::AMINO_ACIDS;
use crate::mutation::code::NUCLEOTIDES;
use crate::reference::Reference;

/// A position-by-symbol count table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutationMatrix {
    alphabet: &'static [u8],
    positions: usize,
    counts: Vec<usize>,
}

impl MutationMatrix {
    /// Creates an empty matrix over `positions` positions.
    pub fn new(alphabet: &'static [u8], positions: usize) -> Self {
        Self {
            alphabet,
            positions,
            counts: vec![0; alphabet.len() * positions],
        }
    }

    /// A matrix over the nucleotide alphabet.
    pub fn nucleotides(positions: usize) -> Self {
        Self::new(NUCLEOTIDES, positions)
    }

    /// A matrix over the amino acid alphabet.
    pub fn amino_acids(positions: usize) -> Self {
        Self::new(AMINO_ACIDS, positions)
    }

    /// The symbols, in row order.
    pub fn alphabet(&self) -> &'static [u8] {
        self.alphabet
    }

    /// The number of positions.
    pub fn positions(&self) -> usize {
        self.positions
    }

    /// The count for the symbol at index `symbol` at `position`.
    pub fn get(&self, position: usize, symbol: usize) -> usize {
        self.counts[position * self.alphabet.len() + symbol]
    }

    /// Adds one to each `(position, symbol)` cell. Cells outside the matrix
    /// are ignored.
    pub fn record(&mut self, indicators: &[(usize, usize)]) {
        let width = self.alphabet.len();

        for &(position, symbol) in indicators {
            if position < self.positions && symbol < width {
                self.counts[position * width + symbol] += 1;
            }
        }
    }

    /// The sum of all cells.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// The descriptive part of one read's mutations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Genotype {
    /// Nucleotide substitutions, e.g. `A5T` (0-based position).
    pub nt_substitutions: Vec<String>,

    /// Insertions, e.g. `4insCCC`.
    pub insertions: Vec<String>,

    /// Deletions, e.g. `7del3`.
    pub deletions: Vec<String>,

    /// Nonsynonymous amino acid substitutions, e.g. `K2I` (1-based codon).
    pub aa_nonsynonymous: Vec<String>,

    /// Synonymous amino acid substitutions, e.g. `P3`.
    pub aa_synonymous: Vec<String>,
}

impl Genotype {
    /// Whether the read carries no mutation at all.
    pub fn is_wild_type(&self) -> bool {
        self.nt_substitutions.is_empty()
            && self.insertions.is_empty()
            && self.deletions.is_empty()
            && self.aa_nonsynonymous.is_empty()
            && self.aa_synonymous.is_empty()
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wild_type() {
            return f.write_str("wildtype");
        }

        let all = self
            .nt_substitutions
            .iter()
            .chain(&self.insertions)
            .chain(&self.deletions)
            .chain(&self.aa_nonsynonymous)
            .map(String::as_str)
            .collect::<Vec<_>>();
        f.write_str(&all.join(", "))
    }
}

/// Everything called for one read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationCall {
    /// `(position, nucleotide index)` per counted substitution.
    pub nucleotides: Vec<(usize, usize)>,

    /// `(codon, amino acid index)` per nonsynonymous substitution.
    pub amino_acids: Vec<(usize, usize)>,

    /// The read's genotype.
    pub genotype: Genotype,
}

/// Calls mutations against one reference.
#[derive(Clone, Debug)]
pub struct MutationCaller<'r> {
    reference: &'r Reference,
    quality_minimum: u8,
    amino_acids: bool,
}

impl<'r> MutationCaller<'r> {
    /// Creates a caller that only calls nucleotide substitutions and does not
    /// filter on quality.
    pub fn new(reference: &'r Reference) -> Self {
        Self {
            reference,
            quality_minimum: 0,
            amino_acids: false,
        }
    }

    /// Ignores substitutions at positions scoring below `minimum`.
    pub fn with_quality_minimum(mut self, minimum: u8) -> Self {
        self.quality_minimum = minimum;
        self
    }

    /// Calls amino acid substitutions within the reference's protein coding
    /// region.
    pub fn with_amino_acids(mut self, enabled: bool) -> Self {
        self.amino_acids = enabled;
        self
    }

    /// The protein coding region relative to the trimmed region, when amino
    /// acids are called.
    fn protein(&self) -> Option<Range<usize>> {
        match self.amino_acids {
            true => self.reference.protein_in_trimmed(),
            false => None,
        }
    }

    /// The number of codons amino acid matrices need, or zero.
    pub fn codons(&self) -> usize {
        self.protein().map(|p| p.len() / 3).unwrap_or(0)
    }

    /// Calls the mutations of one read.
    pub fn call(&self, alignment: &ReconstructedAlignment) -> MutationCall {
        let reference = alignment.reference.as_bytes();
        let query = alignment.query.as_bytes();
        let scores = alignment.quality_scores.as_deref();
        let below = |i: usize| match scores {
            Some(scores) => scores.get(i).map_or(true, |s| *s < self.quality_minimum),
            None => false,
        };

        let protein = self.protein();
        let skipped = match &protein {
            Some(protein) => indel_codons(protein, alignment),
            None => HashSet::new(),
        };

        let mut call = MutationCall::default();
        let mut checked = HashSet::new();

        for i in alignment.mismatches() {
            if below(i) {
                continue;
            }

            let (wild_type, mutant) = (reference[i], query[i]);
            let symbol = match nucleotide_index(mutant) {
                Some(symbol) => symbol,
                None => continue,
            };

            call.nucleotides.push((i, symbol));
            call.genotype.nt_substitutions.push(format!(
                "{}{}{}",
                wild_type as char, i, mutant as char
            ));

            let protein = match &protein {
                Some(protein) if protein.contains(&i) => protein,
                _ => continue,
            };

            let codon = (i - protein.start) / 3;
            if !checked.insert(codon) || skipped.contains(&codon) {
                continue;
            }

            let bases = protein.start + codon * 3..protein.start + codon * 3 + 3;
            if bases.clone().any(below) {
                continue;
            }

            let (wild_type, mutant) = match (
                translate_codon(&reference[bases.clone()]),
                translate_codon(&query[bases]),
            ) {
                (Some(w), Some(m)) => (w, m),
                _ => continue,
            };

            if wild_type == mutant {
                call.genotype
                    .aa_synonymous
                    .push(format!("{}{}", wild_type as char, codon + 1));
            } else if let Some(symbol) = amino_acid_index(mutant) {
                call.amino_acids.push((codon, symbol));
                call.genotype.aa_nonsynonymous.push(format!(
                    "{}{}{}",
                    wild_type as char,
                    codon + 1,
                    mutant as char
                ));
            }
        }

        call.genotype.insertions = alignment
            .insertions
            .iter()
            .map(|ins| format!("{}ins{}", ins.position, ins.sequence))
            .collect();
        call.genotype.deletions = alignment
            .deletions
            .iter()
            .map(|del| format!("{}del{}", del.position, del.len))
            .collect();

        call
    }
}

/// Codons (0-based, relative to the protein start) touched by an insertion
/// within a codon or by a deletion overlapping it.
fn indel_codons(protein: &Range<usize>, alignment: &ReconstructedAlignment) -> HashSet<usize> {
    let mut codons = HashSet::new();

    for insertion in &alignment.insertions {
        if protein.contains(&insertion.position) {
            let offset = insertion.position - protein.start;
            if offset % 3 != 0 {
                codons.insert(offset / 3);
            }
        }
    }

    for deletion in &alignment.deletions {
        let start = deletion.position.max(protein.start);
        let end = (deletion.position + deletion.len).min(protein.end);
        if start < end {
            codons.extend((start - protein.start) / 3..=(end - 1 - protein.start) / 3);
        }
    }

    codons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::reconstruct::Deletion;
    use crate::alignment::reconstruct::Insertion;
    use crate::alignment::reconstruct::DELETED;
    use crate::alignment::reconstruct::GAP;
    use crate::alignment::reconstruct::MATCH;
    use crate::alignment::reconstruct::MISMATCH;

    // Codons: ATG AAA CCC TAG (M K P *), starting at trimmed position 2.
    const TRIMMED: &str = "GGATGAAACCCTAG";

    fn reference() -> Reference {
        Reference::new("ref", "TTGGATGAAACCCTAGTT")
            .with_trimmed(TRIMMED)
            .unwrap()
            .with_protein("ATGAAACCCTAG")
            .unwrap()
    }

    fn alignment(query: &str) -> ReconstructedAlignment {
        let mask = TRIMMED
            .chars()
            .zip(query.chars())
            .map(|(r, q)| match (r, q) {
                (_, GAP) => DELETED,
                (r, q) if r == q => MATCH,
                _ => MISMATCH,
            })
            .collect();

        ReconstructedAlignment {
            reference: TRIMMED.to_string(),
            mask,
            query: query.to_string(),
            quality_scores: None,
            insertions: Vec::new(),
            deletions: Vec::new(),
        }
    }

    #[test]
    fn it_calls_nonsynonymous_substitutions() {
        let reference = reference();
        let caller = MutationCaller::new(&reference).with_amino_acids(true);
        let call = caller.call(&alignment("GGATGATACCCTAG"));

        assert_eq!(call.nucleotides, vec![(6, 1)]);
        assert_eq!(call.genotype.nt_substitutions, vec!["A6T"]);
        assert_eq!(call.amino_acids, vec![(1, 7)]);
        assert_eq!(call.genotype.aa_nonsynonymous, vec!["K2I"]);
        assert!(call.genotype.aa_synonymous.is_empty());
        assert_eq!(call.genotype.to_string(), "A6T, K2I");
    }

    #[test]
    fn it_calls_synonymous_substitutions_without_counting_them() {
        let reference = reference();
        let caller = MutationCaller::new(&reference).with_amino_acids(true);
        let call = caller.call(&alignment("GGATGAAACCATAG"));

        assert_eq!(call.genotype.nt_substitutions, vec!["C10A"]);
        assert_eq!(call.genotype.aa_synonymous, vec!["P3"]);
        assert!(call.amino_acids.is_empty());
    }

    #[test]
    fn it_translates_each_codon_once() {
        let reference = reference();
        let caller = MutationCaller::new(&reference).with_amino_acids(true);

        // AAA -> TTT
        let call = caller.call(&alignment("GGATGTTTCCCTAG"));
        assert_eq!(call.genotype.nt_substitutions, vec!["A5T", "A6T", "A7T"]);
        assert_eq!(call.genotype.aa_nonsynonymous, vec!["K2F"]);
        assert_eq!(call.amino_acids.len(), 1);
    }

    #[test]
    fn it_leaves_amino_acids_alone_without_analysis() {
        let reference = reference();
        let call = MutationCaller::new(&reference).call(&alignment("GGATGATACCCTAG"));

        assert_eq!(call.genotype.nt_substitutions, vec!["A6T"]);
        assert!(call.amino_acids.is_empty());
        assert!(call.genotype.aa_nonsynonymous.is_empty());
    }

    #[test]
    fn it_skips_codons_touched_by_indels() {
        let reference = reference();
        let caller = MutationCaller::new(&reference).with_amino_acids(true);

        // Inserted within codon 2.
        let mut aln = alignment("GGATGATACCCTAG");
        aln.insertions.push(Insertion {
            position: 6,
            sequence: String::from("GGG"),
        });
        let call = caller.call(&aln);
        assert_eq!(call.genotype.nt_substitutions, vec!["A6T"]);
        assert!(call.genotype.aa_nonsynonymous.is_empty());
        assert_eq!(call.genotype.insertions, vec!["6insGGG"]);

        // Inserted between codons 1 and 2.
        let mut aln = alignment("GGATGATACCCTAG");
        aln.insertions.push(Insertion {
            position: 5,
            sequence: String::from("GGG"),
        });
        assert_eq!(caller.call(&aln).genotype.aa_nonsynonymous, vec!["K2I"]);

        // Deletion reaching into codon 2.
        let mut aln = alignment("GGATG-TACCCTAG");
        aln.deletions.push(Deletion {
            position: 5,
            len: 1,
        });
        let call = caller.call(&aln);
        assert_eq!(call.genotype.nt_substitutions, vec!["A6T"]);
        assert!(call.genotype.aa_nonsynonymous.is_empty());
        assert_eq!(call.genotype.deletions, vec!["5del1"]);

        // Deletion confined to codon 3.
        let mut aln = alignment("GGATGATA--CTAG");
        aln.deletions.push(Deletion {
            position: 8,
            len: 2,
        });
        assert_eq!(caller.call(&aln).genotype.aa_nonsynonymous, vec!["K2I"]);
    }

    #[test]
    fn it_filters_on_quality() {
        let reference = reference();
        let mut aln = alignment("GGATGATACCCTAG");
        let mut scores = vec![30; TRIMMED.len()];
        scores[5] = 10;
        aln.quality_scores = Some(scores);

        // The substitution itself passes, but its codon has a low quality base.
        let call = MutationCaller::new(&reference)
            .with_amino_acids(true)
            .with_quality_minimum(20)
            .call(&aln);
        assert_eq!(call.genotype.nt_substitutions, vec!["A6T"]);
        assert!(call.genotype.aa_nonsynonymous.is_empty());

        let call = MutationCaller::new(&reference)
            .with_amino_acids(true)
            .with_quality_minimum(31)
            .call(&aln);
        assert!(call.genotype.nt_substitutions.is_empty());
    }

    #[test]
    fn it_counts_more_substitutions_at_lower_quality_minimums() {
        let reference = reference();
        let mut aln = alignment("TGTTGATACCCTAG");
        aln.quality_scores = Some(vec![5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70]);

        let mut previous: Option<Vec<String>> = None;
        for minimum in (0..=40).rev() {
            let call = MutationCaller::new(&reference)
                .with_quality_minimum(minimum)
                .call(&aln);
            let substitutions = call.genotype.nt_substitutions;

            if let Some(previous) = previous {
                assert!(substitutions.len() >= previous.len());
                assert!(previous.iter().all(|s| substitutions.contains(s)));
            }

            previous = Some(substitutions);
        }

        assert_eq!(
            previous.unwrap(),
            vec!["G0T", "A2T", "A6T"]
        );
    }

    #[test]
    fn it_reports_wild_type_reads() {
        let reference = reference();
        let call = MutationCaller::new(&reference)
            .with_amino_acids(true)
            .call(&alignment(TRIMMED));

        assert!(call.genotype.is_wild_type());
        assert_eq!(call.genotype.to_string(), "wildtype");
    }

    #[test]
    fn it_accumulates_matrices() {
        let mut matrix = MutationMatrix::nucleotides(4);
        matrix.record(&[(1, 0), (1, 0), (3, 3), (9, 0)]);

        assert_eq!(matrix.get(1, 0), 2);
        assert_eq!(matrix.get(3, 3), 1);
        assert_eq!(matrix.total(), 3);
        assert_eq!(MutationMatrix::amino_acids(2).alphabet().len(), 21);
    }
}
