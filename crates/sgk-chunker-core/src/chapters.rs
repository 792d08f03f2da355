//! Lesson → chapter assignment.
//!
//! Chapters are printed before their lessons, so each lesson takes the
//! nearest chapter strictly before it. When none precedes (the opening
//! chapter heading was lost to corruption) the first chapter after the
//! lesson is used instead. Lessons with neither get an empty assignment.

use tracing::{debug, warn};

use crate::detect::strip_page_number;
use crate::models::{ChapterAssignment, ChapterMap, MarkerKind, ResolvedMarker};

#[derive(Debug, Clone, Copy, Default)]
pub struct ChapterMapper;

impl ChapterMapper {
    pub fn new() -> Self {
        Self
    }

    /// Build the map from a position-sorted list of resolved markers.
    /// Section markers in the list are ignored.
    ///
    /// The map is keyed by lesson number; when variants share a number
    /// (`12A`, `12B`) the first one in document order decides.
    pub fn map(&self, markers: &[ResolvedMarker]) -> ChapterMap {
        let items: Vec<&ResolvedMarker> = markers
            .iter()
            .filter(|m| m.kind != MarkerKind::Section)
            .collect();

        let mut map = ChapterMap::new();
        let mut unassigned = 0usize;

        for (i, lesson) in items.iter().enumerate() {
            if lesson.kind != MarkerKind::Lesson || map.contains_key(&lesson.number) {
                continue;
            }

            let preceding = items[..i]
                .iter()
                .rev()
                .find(|m| m.kind == MarkerKind::Chapter && m.position < lesson.position);
            let chapter = preceding.or_else(|| {
                items[i + 1..]
                    .iter()
                    .find(|m| m.kind == MarkerKind::Chapter && m.position > lesson.position)
            });

            let assignment = match chapter {
                Some(ch) => {
                    debug!(
                        lesson = lesson.number,
                        chapter = ch.number,
                        forward = preceding.is_none(),
                        "lesson assigned to chapter"
                    );
                    assignment_for(ch)
                }
                None => {
                    unassigned += 1;
                    debug!(lesson = lesson.number, "no chapter found for lesson");
                    ChapterAssignment::default()
                }
            };
            map.insert(lesson.number, assignment);
        }

        if unassigned > 0 {
            warn!(lessons = unassigned, "lessons without a chapter");
        }
        map
    }
}

fn assignment_for(chapter: &ResolvedMarker) -> ChapterAssignment {
    let title = strip_page_number(&chapter.title).to_string();
    let full = if title.is_empty() {
        format!("{} {}", chapter.label, chapter.number)
    } else {
        format!("{} {}. {}", chapter.label, chapter.number, title)
    };
    ChapterAssignment {
        chapter_number: Some(chapter.number),
        chapter_title: Some(title).filter(|t| !t.is_empty()),
        chapter_full_label: Some(full),
    }
}
