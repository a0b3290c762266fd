use super::*;
use std::io::Cursor;

fn index_with(vectors: &[Vec<f32>]) -> VectorIndex {
    let mut index = VectorIndex::new(vectors[0].len()).unwrap();
    index.add_batch(vectors).unwrap();
    index
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(VectorIndex::new(0).is_err());
}

#[test]
fn add_batch_rejects_dimension_mismatch_without_mutating() {
    let mut index = VectorIndex::new(3).unwrap();
    index.add_batch(&[vec![1.0, 0.0, 0.0]]).unwrap();

    let result = index.add_batch(&[vec![0.0, 1.0, 0.0], vec![1.0, 0.0]]);
    assert!(result.is_err());
    assert_eq!(index.len(), 1);
}

#[test]
fn search_returns_descending_scores() {
    let index = index_with(&[
        vec![0.0, 1.0, 0.0],
        vec![1.0, 0.0, 0.0],
        vec![0.5, 0.5, 0.0],
    ]);

    let results = index.search(&[1.0, 0.0, 0.0], 3).unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].0, 1);
    assert_eq!(results[1].0, 2);
    assert_eq!(results[2].0, 0);
    assert!(results[0].1 >= results[1].1 && results[1].1 >= results[2].1);
}

#[test]
fn search_scores_are_cosine_similarity() {
    // Rows are stored normalized, so magnitudes must not matter.
    let index = index_with(&[vec![10.0, 0.0], vec![0.0, 0.1]]);

    let results = index.search(&[2.0, 0.0], 2).unwrap();
    assert!((results[0].1 - 1.0).abs() < 1e-6);
    assert!(results[1].1.abs() < 1e-6);
}

#[test]
fn ties_keep_insertion_order() {
    let index = index_with(&[
        vec![1.0, 0.0],
        vec![2.0, 0.0],
        vec![3.0, 0.0],
    ]);

    let results = index.search(&[1.0, 0.0], 3).unwrap();
    let positions: Vec<usize> = results.iter().map(|r| r.0).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn search_truncates_to_index_size() {
    let index = index_with(&[vec![1.0, 0.0]]);
    let results = index.search(&[1.0, 0.0], 10).unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn search_empty_index_returns_nothing() {
    let index = VectorIndex::new(4).unwrap();
    assert!(index.search(&[0.0, 0.0, 1.0, 0.0], 5).unwrap().is_empty());
}

#[test]
fn search_rejects_query_dimension_mismatch() {
    let index = index_with(&[vec![1.0, 0.0, 0.0]]);
    assert!(index.search(&[1.0, 0.0], 1).is_err());
}

#[test]
fn zero_vector_scores_zero() {
    let index = index_with(&[vec![0.0, 0.0], vec![1.0, 0.0]]);
    let results = index.search(&[1.0, 0.0], 2).unwrap();
    assert_eq!(results[0].0, 1);
    assert!(results[1].1.abs() < 1e-6);
}

#[test]
fn binary_round_trip_preserves_search_results() {
    let index = index_with(&[
        vec![1.0, 2.0, 3.0],
        vec![-1.0, 0.5, 0.0],
        vec![0.0, 0.0, 1.0],
    ]);

    let mut buffer = Vec::new();
    index.write_to(&mut buffer).unwrap();
    let loaded = VectorIndex::read_from(&mut Cursor::new(&buffer)).unwrap();

    assert_eq!(loaded, index);
    let query = [0.3, -0.2, 0.9];
    assert_eq!(
        index.search(&query, 3).unwrap(),
        loaded.search(&query, 3).unwrap()
    );
}

#[test]
fn empty_index_round_trips() {
    let index = VectorIndex::new(5).unwrap();
    let mut buffer = Vec::new();
    index.write_to(&mut buffer).unwrap();

    let loaded = VectorIndex::read_from(&mut Cursor::new(&buffer)).unwrap();
    assert_eq!(loaded.dimension(), 5);
    assert!(loaded.is_empty());
}

#[test]
fn wrong_magic_is_persistence_error() {
    let mut buffer = Vec::new();
    index_with(&[vec![1.0, 0.0]]).write_to(&mut buffer).unwrap();
    buffer[0] = b'X';

    let result = VectorIndex::read_from(&mut Cursor::new(&buffer));
    assert!(matches!(result, Err(RagError::Persistence(_))));
}

#[test]
fn oversized_header_counts_are_persistence_error() {
    // A header claiming u32::MAX rows of u32::MAX dimension must fail
    // cleanly, not drive a giant allocation.
    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"RGIX");
    buffer.extend_from_slice(&1u32.to_le_bytes());
    buffer.extend_from_slice(&u32::MAX.to_le_bytes());
    buffer.extend_from_slice(&u32::MAX.to_le_bytes());

    let result = VectorIndex::read_from(&mut Cursor::new(&buffer));
    assert!(matches!(result, Err(RagError::Persistence(_))));
}

#[test]
fn header_count_exceeding_payload_is_persistence_error() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"RGIX");
    buffer.extend_from_slice(&1u32.to_le_bytes());
    buffer.extend_from_slice(&2u32.to_le_bytes());
    buffer.extend_from_slice(&1000u32.to_le_bytes());
    buffer.extend_from_slice(&1.0f32.to_le_bytes());

    let result = VectorIndex::read_from(&mut Cursor::new(&buffer));
    assert!(matches!(result, Err(RagError::Persistence(_))));
}

#[test]
fn truncated_file_is_persistence_error() {
    let mut buffer = Vec::new();
    index_with(&[vec![1.0, 0.0, 0.0]]).write_to(&mut buffer).unwrap();
    buffer.truncate(buffer.len() - 3);

    let result = VectorIndex::read_from(&mut Cursor::new(&buffer));
    assert!(matches!(result, Err(RagError::Persistence(_))));
}

#[test]
fn trailing_data_is_persistence_error() {
    let mut buffer = Vec::new();
    index_with(&[vec![1.0, 0.0]]).write_to(&mut buffer).unwrap();
    buffer.push(0xff);

    let result = VectorIndex::read_from(&mut Cursor::new(&buffer));
    assert!(matches!(result, Err(RagError::Persistence(_))));
}
