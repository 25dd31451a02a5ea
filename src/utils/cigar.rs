//! Utilities related to CIGAR string processing.

use noodles::sam::record::cigar::op::Kind as SamKind;

use crate::alignment::record::Kind;

/// What a SAM CIGAR operation becomes once a record is handed to the core
/// engines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    /// The operation maps onto an operation the engines understand.
    Keep(Kind),

    /// The operation's query bases are removed from the sequence.
    Clip,

    /// The operation consumes nothing the engines see.
    Drop,
}

/// Maps a SAM CIGAR operation kind onto the kinds the engines work with.
pub fn convert(kind: SamKind) -> Conversion {
    match kind {
        SamKind::Match | SamKind::SequenceMatch | SamKind::SequenceMismatch => {
            Conversion::Keep(Kind::Match)
        }
        SamKind::Insertion => Conversion::Keep(Kind::Insertion),
        SamKind::Deletion | SamKind::Skip => Conversion::Keep(Kind::Deletion),
        SamKind::SoftClip => Conversion::Clip,
        SamKind::HardClip | SamKind::Pad => Conversion::Drop,
    }
}

/// Reports whether a CIGAR operation consumes a sequence base.
pub fn consumes_sequence(kind: SamKind) -> bool {
    matches!(
        kind,
        SamKind::Match
            | SamKind::Insertion
            | SamKind::SoftClip
            | SamKind::SequenceMatch
            | SamKind::SequenceMismatch
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_converts_every_operation() {
        assert_eq!(convert(SamKind::SequenceMismatch), Conversion::Keep(Kind::Match));
        assert_eq!(convert(SamKind::Skip), Conversion::Keep(Kind::Deletion));
        assert_eq!(convert(SamKind::Insertion), Conversion::Keep(Kind::Insertion));
        assert_eq!(convert(SamKind::SoftClip), Conversion::Clip);
        assert_eq!(convert(SamKind::HardClip), Conversion::Drop);
        assert_eq!(convert(SamKind::Pad), Conversion::Drop);
    }

    #[test]
    fn it_knows_which_operations_consume_sequence() {
        assert!(consumes_sequence(SamKind::SoftClip));
        assert!(consumes_sequence(SamKind::Insertion));
        assert!(!consumes_sequence(SamKind::Deletion));
        assert!(!consumes_sequence(SamKind::HardClip));
    }
}
