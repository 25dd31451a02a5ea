//! Symbols and the standard genetic code.

/// Nucleotide symbols, in mutation matrix row order.
pub const NUCLEOTIDES: &[u8] = b"ATGC";

/// Amino acid symbols (including stop), in mutation matrix row order.
pub const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY*";

/// The standard genetic code (NCBI translation table 1), one residue per
/// codon with codons enumerated in `TCAG` order: `TTT`, `TTC`, `TTA`, ...
const STANDARD_CODE: &[u8; 64] =
    b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

fn tcag_index(base: u8) -> Option<usize> {
    match base.to_ascii_uppercase() {
        b'T' => Some(0),
        b'C' => Some(1),
        b'A' => Some(2),
        b'G' => Some(3),
        _ => None,
    }
}

/// The row of a nucleotide in [`NUCLEOTIDES`].
pub fn nucleotide_index(base: u8) -> Option<usize> {
    NUCLEOTIDES.iter().position(|b| *b == base)
}

/// The row of an amino acid in [`AMINO_ACIDS`].
pub fn amino_acid_index(residue: u8) -> Option<usize> {
    AMINO_ACIDS.iter().position(|r| *r == residue)
}

/// Translates a single codon. Returns `None` unless `codon` is exactly three
/// unambiguous bases.
pub fn translate_codon(codon: &[u8]) -> Option<u8> {
    match codon {
        [a, b, c] => {
            let i = tcag_index(*a)? * 16 + tcag_index(*b)? * 4 + tcag_index(*c)?;
            Some(STANDARD_CODE[i])
        }
        _ => None,
    }
}

/// Translates an in-frame coding sequence. Returns `None` if the length is not
/// a multiple of three or any codon cannot be translated.
pub fn translate(sequence: &str) -> Option<String> {
    let bytes = sequence.as_bytes();
    if bytes.len() % 3 != 0 {
        return None;
    }

    bytes
        .chunks(3)
        .map(|codon| translate_codon(codon).map(char::from))
        .collect()
}
