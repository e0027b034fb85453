use crate::models::ChunkDraft;
use serde_json::{Map, Value};

/// Collapse runs of whitespace (including NBSP) to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn field<'a>(row: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    row.get(key)
        .or_else(|| row.get(&key.to_lowercase()))
        .or_else(|| row.get(&key.to_uppercase()))
}

fn text_field(row: &Map<String, Value>, key: &str) -> String {
    match field(row, key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

fn index_field(row: &Map<String, Value>, key: &str) -> Option<u64> {
    match field(row, key)? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Turn one loose spreadsheet row into a draft chunk.
///
/// Field lookup tries the exact key, then lower-cased, then upper-cased.
/// Missing fields become empty strings; a missing, non-numeric, fractional
/// or negative `chunk_index` stays unset. A non-object row yields `None` and
/// is skipped by callers rather than aborting the batch.
pub fn normalize_row(raw: &Value) -> Option<ChunkDraft> {
    let row = raw.as_object()?;
    Some(ChunkDraft {
        chunk_index: index_field(row, "chunk_index"),
        date: text_field(row, "date"),
        label: text_field(row, "label"),
        source_name: text_field(row, "source_name"),
        source_link: text_field(row, "source_link"),
        influence_text: text_field(row, "influence_text"),
        content: text_field(row, "content"),
    })
}

/// Assign indices to every draft lacking one, in original row order.
///
/// The counter starts at 0 and is advanced past any explicit index already
/// present in the batch, so explicit and auto-assigned indices never collide
/// within one ingestion run. Indices persisted by a prior ingestion of the
/// same document are not consulted.
pub fn assign_chunk_indices(drafts: &mut [ChunkDraft]) {
    let mut next = 0u64;
    for draft in drafts.iter_mut() {
        match draft.chunk_index {
            Some(explicit) => next = next.max(explicit.saturating_add(1)),
            None => {
                draft.chunk_index = Some(next);
                next = next.saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(index: Option<u64>) -> ChunkDraft {
        ChunkDraft {
            chunk_index: index,
            date: String::new(),
            label: String::new(),
            source_name: String::new(),
            source_link: String::new(),
            influence_text: String::new(),
            content: String::new(),
        }
    }

    #[test]
    fn whitespace_is_collapsed() {
        assert_eq!(collapse_whitespace("A  \t lot\nof \u{a0} spacing "), "A lot of spacing");
    }

    #[test]
    fn field_lookup_is_case_insensitive() {
        let row = json!({"CONTENT": "upper", "label": "lower"});
        let normalized = normalize_row(&row).unwrap();
        assert_eq!(normalized.content, "upper");
        assert_eq!(normalized.label, "lower");
        assert_eq!(normalized.source_name, "");
    }

    #[test]
    fn chunk_index_is_unset_when_absent_or_not_a_whole_number() {
        assert_eq!(normalize_row(&json!({})).unwrap().chunk_index, None);
        assert_eq!(normalize_row(&json!({"chunk_index": "three"})).unwrap().chunk_index, None);
        assert_eq!(normalize_row(&json!({"chunk_index": 2.5})).unwrap().chunk_index, None);
        assert_eq!(normalize_row(&json!({"chunk_index": -1})).unwrap().chunk_index, None);
        assert_eq!(normalize_row(&json!({"chunk_index": "0"})).unwrap().chunk_index, Some(0));
        assert_eq!(normalize_row(&json!({"chunk_index": 7})).unwrap().chunk_index, Some(7));
    }

    #[test]
    fn non_object_rows_are_skipped() {
        assert!(normalize_row(&json!("just a string")).is_none());
        assert!(normalize_row(&json!(null)).is_none());
    }

    #[test]
    fn unset_slots_fill_the_gaps_around_explicit_indices() {
        let mut drafts = vec![
            draft(Some(0)),
            draft(None),
            draft(Some(2)),
            draft(None),
            draft(None),
            draft(Some(5)),
            draft(None),
            draft(None),
        ];
        assign_chunk_indices(&mut drafts);

        let assigned: Vec<u64> = drafts.iter().filter_map(|d| d.chunk_index).collect();
        assert_eq!(assigned, vec![0, 1, 2, 3, 4, 5, 6, 7]);

        let mut unique = assigned.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), assigned.len());
    }

    #[test]
    fn explicit_indices_push_the_counter_forward() {
        let mut drafts = vec![draft(Some(10)), draft(None), draft(None)];
        assign_chunk_indices(&mut drafts);
        let assigned: Vec<u64> = drafts.iter().filter_map(|d| d.chunk_index).collect();
        assert_eq!(assigned, vec![10, 11, 12]);
    }

    #[test]
    fn assignment_is_idempotent_for_an_already_assigned_batch() {
        let mut first = vec![draft(Some(0)), draft(None), draft(Some(4)), draft(None)];
        assign_chunk_indices(&mut first);
        let after_first: Vec<Option<u64>> = first.iter().map(|d| d.chunk_index).collect();

        let mut second = first.clone();
        assign_chunk_indices(&mut second);
        let after_second: Vec<Option<u64>> = second.iter().map(|d| d.chunk_index).collect();

        assert_eq!(after_first, after_second);
    }
}
