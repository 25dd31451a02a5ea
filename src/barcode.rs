//! Barcode identification: locating barcodes by context, resolving them to
//! configured names and grouping the outcomes into output partitions.

pub mod context;
pub mod hamming;
pub mod resolver;

/// Reverse-complements a nucleotide sequence. Symbols other than `A`, `C`,
/// `G` and `T` are kept as they are.
pub fn reverse_complement(sequence: &str) -> String {
    sequence
        .bytes()
        .rev()
        .map(|b| match b.to_ascii_uppercase() {
            b'A' => 'T',
            b'T' => 'A',
            b'C' => 'G',
            b'G' => 'C',
            other => other as char,
        })
        .collect()
}
