//! Streaming wrapper (spec §4.9): either pass native chunks through
//! unbuffered, filling in `chunk_index`/`execution_time_ms` and marking the
//! final chunk, or slice a fully-materialized result into chunks when the
//! underlying object has no native streaming.

use graphnode_graph_store::{QueryOutcome, QueryRow};

#[derive(Debug, Clone)]
pub struct RepoStreamChunk {
    /// Only the first chunk of a sliced (non-native) stream carries columns;
    /// a native stream that already reports them on every chunk is passed
    /// through unchanged.
    pub columns: Option<Vec<String>>,
    pub rows: Vec<QueryRow>,
    pub chunk_index: u64,
    pub is_last_chunk: bool,
    pub execution_time_ms: u64,
}

/// Non-streaming fallback: the query already ran and returned everything,
/// so this just slices the rows into `chunk_size`-sized pieces.
pub fn slice_into_chunks(
    outcome: QueryOutcome,
    chunk_size: usize,
    execution_time_ms: u64,
    sink: &mut dyn FnMut(RepoStreamChunk),
) {
    let chunk_size = chunk_size.max(1);
    let columns = outcome.columns;
    let mut rows = outcome.rows.into_iter().peekable();
    let mut chunk_index = 0u64;

    if rows.peek().is_none() {
        sink(RepoStreamChunk {
            columns: Some(columns),
            rows: Vec::new(),
            chunk_index: 0,
            is_last_chunk: true,
            execution_time_ms,
        });
        return;
    }

    while rows.peek().is_some() {
        let batch: Vec<QueryRow> = (&mut rows).take(chunk_size).collect();
        let is_last = rows.peek().is_none();
        sink(RepoStreamChunk {
            columns: if chunk_index == 0 { Some(columns.clone()) } else { None },
            rows: batch,
            chunk_index,
            is_last_chunk: is_last,
            execution_time_ms,
        });
        chunk_index += 1;
    }
}

/// Normalizes a chunk already produced by a native streaming source: fills
/// in `chunk_index`/`execution_time_ms` when the caller didn't already
/// track them, and lets the caller flag the last chunk explicitly.
pub fn passthrough_chunk(
    columns: Option<Vec<String>>,
    rows: Vec<QueryRow>,
    chunk_index: u64,
    is_last_chunk: bool,
    execution_time_ms: u64,
) -> RepoStreamChunk {
    RepoStreamChunk {
        columns,
        rows,
        chunk_index,
        is_last_chunk,
        execution_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphnode_graph_store::ScalarValue;

    fn outcome_of(n: usize) -> QueryOutcome {
        QueryOutcome {
            columns: vec!["id".into()],
            rows: (0..n)
                .map(|i| QueryRow(vec![ScalarValue::Int(i as i64)]))
                .collect(),
            summary: None,
        }
    }

    #[test]
    fn slices_rows_into_requested_chunk_size_with_columns_only_on_first() {
        let mut chunks = Vec::new();
        slice_into_chunks(outcome_of(5), 2, 10, &mut |c| chunks.push(c));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].columns, Some(vec!["id".to_string()]));
        assert!(chunks[1].columns.is_none());
        assert!(chunks[2].columns.is_none());
        assert_eq!(chunks[0].rows.len(), 2);
        assert_eq!(chunks[2].rows.len(), 1);
        assert!(!chunks[0].is_last_chunk);
        assert!(chunks[2].is_last_chunk);
    }

    #[test]
    fn empty_result_still_emits_one_final_chunk_with_columns() {
        let mut chunks = Vec::new();
        slice_into_chunks(outcome_of(0), 2, 5, &mut |c| chunks.push(c));

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last_chunk);
        assert_eq!(chunks[0].columns, Some(vec!["id".to_string()]));
    }
}
