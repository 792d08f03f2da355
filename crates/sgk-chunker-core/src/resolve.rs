//! Marker resolution.
//!
//! Collapses the detector's overlapping candidates into one
//! [`ResolvedMarker`] per logical unit, sorted by position.
//!
//! Chapters and lessons are grouped by `(kind, number, variant)`. Within a
//! group the winner is the maximum under [`preference`]:
//!
//! 1. any non-TOC candidate beats a table-of-contents entry,
//! 2. then the longer title,
//! 3. then the higher [`Dialect::fidelity_rank`],
//! 4. then the earlier position.
//!
//! The last rule makes the order total, so the chosen marker does not depend
//! on the order candidates arrive in.
//!
//! Section numbering restarts in every lesson, so section candidates are
//! grouped by position instead.

use std::cmp::{Ordering, Reverse};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{MarkerCandidate, MarkerKey, MarkerKind, ResolvedMarker};
use crate::patterns::PATTERNS;

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerResolver;

impl MarkerResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, candidates: Vec<MarkerCandidate>) -> Vec<ResolvedMarker> {
        let total = candidates.len();
        let mut keyed: BTreeMap<MarkerKey, MarkerCandidate> = BTreeMap::new();
        let mut by_position: BTreeMap<usize, MarkerCandidate> = BTreeMap::new();

        for candidate in candidates {
            match candidate.kind {
                MarkerKind::Section => keep_preferred(&mut by_position, candidate.position, candidate),
                _ => keep_preferred(&mut keyed, candidate.key(), candidate),
            }
        }

        let mut resolved: Vec<ResolvedMarker> = keyed
            .into_values()
            .chain(by_position.into_values())
            .map(into_resolved)
            .collect();
        resolved.sort_by_key(|m| (m.position, m.kind));
        debug!(candidates = total, resolved = resolved.len(), "markers resolved");
        resolved
    }
}

fn keep_preferred<K: Ord>(
    slots: &mut BTreeMap<K, MarkerCandidate>,
    key: K,
    candidate: MarkerCandidate,
) {
    match slots.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(candidate);
        }
        Entry::Occupied(mut slot) => {
            if preference(slot.get(), &candidate) == Ordering::Less {
                slot.insert(candidate);
            }
        }
    }
}

/// Total order over candidates sharing a key. `Greater` means preferred.
pub fn preference(a: &MarkerCandidate, b: &MarkerCandidate) -> Ordering {
    let rank = |c: &MarkerCandidate| {
        (
            !c.dialect.is_table_of_contents(),
            c.title.chars().count(),
            c.dialect.fidelity_rank(),
            Reverse(c.position),
            // Identical position and fidelity can only differ in dialect or
            // text; fall back to those so the order stays total.
            Reverse(c.dialect),
            Reverse(c.matched_text.clone()),
        )
    };
    rank(a).cmp(&rank(b))
}

fn into_resolved(c: MarkerCandidate) -> ResolvedMarker {
    let label = PATTERNS
        .iter()
        .find(|p| p.dialect == c.dialect)
        .map(|p| p.label)
        .unwrap_or("");
    ResolvedMarker {
        kind: c.kind,
        position: c.position,
        number: c.number,
        variant: c.variant,
        title: c.title,
        dialect: c.dialect,
        label,
    }
}

/// Lesson markers only, in position order.
pub fn lessons(markers: &[ResolvedMarker]) -> Vec<ResolvedMarker> {
    markers
        .iter()
        .filter(|m| m.kind == MarkerKind::Lesson)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Dialect;
    use proptest::prelude::*;

    fn cand(number: u32, position: usize, title: &str, dialect: Dialect) -> MarkerCandidate {
        MarkerCandidate {
            kind: MarkerKind::Lesson,
            position,
            number,
            variant: None,
            title: title.to_string(),
            matched_text: format!("Bài {number}. {title}"),
            dialect,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(MarkerResolver::new().resolve(Vec::new()).is_empty());
    }

    #[test]
    fn test_non_toc_beats_longer_toc() {
        let resolved = MarkerResolver::new().resolve(vec![
            cand(1, 10, "Một tiêu đề rất dài trong mục lục", Dialect::TableOfContents),
            cand(1, 500, "Ngắn", Dialect::UppercaseDot),
        ]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].position, 500);
        assert_eq!(resolved[0].dialect, Dialect::UppercaseDot);
    }

    #[test]
    fn test_longer_title_wins() {
        let resolved = MarkerResolver::new().resolve(vec![
            cand(2, 100, "Mạng", Dialect::BulletPoint),
            cand(2, 100, "Mạng máy tính", Dialect::UppercaseDot),
        ]);
        assert_eq!(resolved[0].title, "Mạng máy tính");
    }

    #[test]
    fn test_mixed_case_breaks_title_tie() {
        let resolved = MarkerResolver::new().resolve(vec![
            cand(3, 40, "Thuật toán", Dialect::UppercaseDot),
            cand(3, 40, "Thuật toán", Dialect::MixedCaseDot),
            cand(3, 40, "Thuật toán", Dialect::PlainTextDot),
        ]);
        assert_eq!(resolved[0].dialect, Dialect::MixedCaseDot);
    }

    #[test]
    fn test_variants_are_separate_units() {
        let mut a = cand(12, 0, "Phần A", Dialect::UppercaseDot);
        a.variant = Some('A');
        let mut b = cand(12, 300, "Phần B", Dialect::UppercaseDot);
        b.variant = Some('B');
        let resolved = MarkerResolver::new().resolve(vec![b, a]);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].variant, Some('A'));
    }

    #[test]
    fn test_sections_deduplicated_by_position() {
        let section = |number, position| MarkerCandidate {
            kind: MarkerKind::Section,
            position,
            number,
            variant: None,
            title: "Khái niệm".into(),
            matched_text: "1. Khái niệm".into(),
            dialect: Dialect::NumberedSection,
        };
        let resolved = MarkerResolver::new().resolve(vec![
            section(1, 20),
            section(1, 20),
            section(1, 400),
        ]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_output_sorted_by_position() {
        let resolved = MarkerResolver::new().resolve(vec![
            cand(2, 900, "Hai", Dialect::UppercaseDot),
            cand(1, 100, "Một", Dialect::UppercaseDot),
        ]);
        let positions: Vec<usize> = resolved.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![100, 900]);
    }

    fn arb_dialect() -> impl Strategy<Value = Dialect> {
        prop::sample::select(vec![
            Dialect::UppercaseDot,
            Dialect::UppercaseColon,
            Dialect::MixedCaseDot,
            Dialect::BulletPoint,
            Dialect::StandaloneUppercase,
            Dialect::TableOfContents,
            Dialect::NoPunctuation,
        ])
    }

    proptest! {
        #[test]
        fn prop_resolution_is_order_independent(
            raw in prop::collection::vec((1u32..4, 0usize..2000, "[A-Za-z ]{0,12}", arb_dialect()), 1..24),
            seed in any::<u64>(),
        ) {
            let candidates: Vec<MarkerCandidate> = raw
                .iter()
                .map(|(n, p, t, d)| cand(*n, *p, t, *d))
                .collect();
            let mut shuffled = candidates.clone();
            // Deterministic rotation + reversal driven by the seed.
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            if seed % 2 == 0 {
                shuffled.reverse();
            }
            let resolver = MarkerResolver::new();
            prop_assert_eq!(resolver.resolve(candidates), resolver.resolve(shuffled));
        }
    }
}
