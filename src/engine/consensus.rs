//! Consensus merge of two reviewers' wizard codes
//!
//! "Agree as deep as possible, fall back to the shallowest common ancestor
//! otherwise." Disagreement at the top level means neither answer is
//! trusted and the record falls back to a coarse default derived from its
//! own venue category. Below the top level, everything under the first
//! disagreement is discarded rather than guessed.

use crate::wizard::{WizardCode, SEGMENTS};

/// Merge two reviewers' codes into one resolved code.
///
/// * Segment 1 differs: returns `category_default`, ignoring both codes.
/// * Segments agree through *k*, diverge at *k+1*: returns the first *k*
///   segments followed by zero-filled segments.
/// * Full agreement: returns the shared code.
pub fn merge(category_default: &WizardCode, first: &WizardCode, second: &WizardCode) -> WizardCode {
    if first.segment(0) != second.segment(0) {
        return category_default.clone();
    }
    for depth in 1..SEGMENTS {
        if first.segment(depth) != second.segment(depth) {
            return first.truncated_to(depth);
        }
    }
    second.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> WizardCode {
        WizardCode::parse(s).unwrap()
    }

    fn default() -> WizardCode {
        code("01000_00000_00000_00000_00000")
    }

    #[test]
    fn test_full_agreement_returns_shared_code() {
        let shared = code("01000_00100_01000_00100_00800");
        assert_eq!(merge(&default(), &shared, &shared), shared);
    }

    #[test]
    fn test_divergence_truncates_and_zero_fills() {
        assert_eq!(
            merge(
                &default(),
                &code("11111_22222_33333_44444_55555"),
                &code("11111_22222_33333_66666_55555"),
            ),
            code("11111_22222_33333_00000_00000")
        );
    }

    #[test]
    fn test_divergence_at_each_depth() {
        let first = code("11111_22222_33333_44444_55555");
        let cases = [
            ("11111_99999_33333_44444_55555", "11111_00000_00000_00000_00000"),
            ("11111_22222_99999_44444_55555", "11111_22222_00000_00000_00000"),
            ("11111_22222_33333_99999_55555", "11111_22222_33333_00000_00000"),
            ("11111_22222_33333_44444_99999", "11111_22222_33333_44444_00000"),
        ];
        for (second, expected) in cases {
            assert_eq!(merge(&default(), &first, &code(second)), code(expected));
        }
    }

    #[test]
    fn test_top_level_disagreement_uses_category_default() {
        // Segments 2-5 agree perfectly, but the top level does not: the
        // venue-category default wins regardless.
        let result = merge(
            &default(),
            &code("11111_22222_33333_44444_55555"),
            &code("99999_22222_33333_44444_55555"),
        );
        assert_eq!(result, default());
    }

    #[test]
    fn test_agreement_below_first_divergence_is_discarded() {
        // Segments 4-5 agree again after diverging at 3; that deeper
        // agreement is deliberately not recovered.
        assert_eq!(
            merge(
                &default(),
                &code("11111_22222_33333_44444_55555"),
                &code("11111_22222_88888_44444_55555"),
            ),
            code("11111_22222_00000_00000_00000")
        );
    }
}
