//! Scalar metadata for vector indexes.
//!
//! Most vector stores only accept flat `key → scalar` metadata. This module
//! turns a [`Chunk`] into that shape: lists become delimited strings and the
//! density block becomes `density_*` keys. Fields that downstream filters
//! query by (`chapter*`, `lesson_*`, `section`) are always present, as
//! `null` when unknown.

use serde_json::{Map, Value};

use crate::models::{Chunk, ContentType};

/// Separator used when joining list fields.
pub const LIST_SEPARATOR: &str = "; ";

pub fn index_metadata(chunk: &Chunk) -> Map<String, Value> {
    let meta = &chunk.metadata;
    let lesson = &meta.lesson;
    let mut map = Map::new();

    let mut put = |key: &str, value: Value| {
        map.insert(key.to_string(), value);
    };

    put("chunk_id", chunk.chunk_id.clone().into());
    put("source_file", chunk.source_file.clone().into());
    put("lesson_index", chunk.lesson_index.into());
    put("token_count", chunk.token_count.into());
    put("char_count", chunk.char_count.into());
    put("content_hash", chunk.content_hash.clone().into());

    put("subject", lesson.subject.clone().into());
    put("subject_key", lesson.subject_key.clone().into());
    put("grade", lesson.grade.into());
    put("education_level", lesson.education_level.clone().into());
    put("chapter", lesson.chapter.clone().into());
    put("chapter_number", lesson.chapter_number.into());
    put("chapter_title", lesson.chapter_title.clone().into());
    put("lesson_number", lesson.lesson_number.into());
    put(
        "lesson_variant",
        lesson.lesson_variant.map(|c| c.to_string()).into(),
    );
    put("lesson_title", lesson.lesson_title.clone().into());
    put("topics", lesson.topics.join(LIST_SEPARATOR).into());
    put("objective_count", lesson.objective_count.into());
    put("has_questions", lesson.has_questions.into());
    put("has_activities", lesson.has_activities.into());
    put("has_exercises", lesson.has_exercises.into());
    put("has_code", lesson.has_code.into());
    put("has_formula", lesson.has_formula.into());
    put("has_diagram", lesson.has_diagram.into());
    put("has_table", lesson.has_table.into());
    put("code_blocks_count", lesson.code_blocks_count.into());
    put("question_count", lesson.question_count.into());
    put("activity_count", lesson.activity_count.into());
    put("section_count", lesson.section_count.into());
    put("content_length", lesson.content_length.into());
    put("estimated_reading_time", lesson.estimated_reading_time.into());
    put("segmentation", lesson.segmentation.to_string().into());

    put("section_type", meta.section_type.as_str().into());
    put("section", meta.section.clone().into());
    put("is_complete_section", meta.is_complete_section.into());
    put("is_oversized", meta.is_oversized.into());
    if let Some(index) = meta.sub_section_index {
        put("sub_section_index", index.into());
    }
    if let Some(total) = meta.total_sub_sections {
        put("total_sub_sections", total.into());
    }
    put("chunk_position_index", meta.chunk_position_index.into());
    put("total_chunks", meta.total_chunks.into());
    put("relative_position", meta.relative_position.into());
    if let Some(prev) = &meta.prev_preview {
        put("prev_preview", prev.clone().into());
    }
    if let Some(next) = &meta.next_preview {
        put("next_preview", next.clone().into());
    }
    put("content_types", join_types(&meta.content_types).into());
    put("key_terms", meta.key_terms.join(LIST_SEPARATOR).into());

    let density = &meta.content_density;
    put("density_char_per_token", density.char_per_token.into());
    put("density_has_formulas", density.has_formulas.into());
    put("density_has_lists", density.has_lists.into());
    put("density_has_code", density.has_code.into());

    map
}

fn join_types(types: &[ContentType]) -> String {
    types
        .iter()
        .map(ContentType::as_str)
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, LessonMetadata};

    fn chunk() -> Chunk {
        Chunk {
            chunk_id: "sgk_0000".into(),
            content: "Nội dung".into(),
            token_count: 4,
            char_count: 8,
            source_file: "sgk.txt".into(),
            lesson_index: 0,
            content_hash: "abc".into(),
            metadata: ChunkMetadata {
                lesson: LessonMetadata {
                    subject: "Tin học".into(),
                    topics: vec!["Mục tiêu một".into(), "Mục tiêu hai".into()],
                    lesson_number: Some(2),
                    ..LessonMetadata::default()
                },
                content_types: vec![ContentType::Activity, ContentType::Code],
                key_terms: vec!["CPU".into()],
                ..ChunkMetadata::default()
            },
        }
    }

    #[test]
    fn test_all_values_scalar() {
        let map = index_metadata(&chunk());
        for (key, value) in &map {
            assert!(
                !value.is_array() && !value.is_object(),
                "{key} is not scalar: {value}"
            );
        }
    }

    #[test]
    fn test_lists_joined() {
        let map = index_metadata(&chunk());
        assert_eq!(map["topics"], "Mục tiêu một; Mục tiêu hai");
        assert_eq!(map["content_types"], "activity; code");
        assert_eq!(map["key_terms"], "CPU");
    }

    #[test]
    fn test_query_fields_always_present() {
        let map = index_metadata(&chunk());
        for key in ["chapter", "chapter_number", "chapter_title", "lesson_title", "section"] {
            assert_eq!(map.get(key), Some(&Value::Null), "{key}");
        }
        assert_eq!(map["lesson_number"], 2);
        assert!(!map.contains_key("prev_preview"));
        assert!(!map.contains_key("sub_section_index"));
    }

    #[test]
    fn test_density_flattened() {
        let map = index_metadata(&chunk());
        assert_eq!(map["density_has_code"], false);
        assert!(map.contains_key("density_char_per_token"));
        assert!(!map.contains_key("content_density"));
    }
}
