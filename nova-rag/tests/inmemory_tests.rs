//! Property tests for in-memory vector store search and cosine similarity.

use std::collections::HashMap;

use nova_rag::document::Document;
use nova_rag::inmemory::{InMemoryVectorStore, cosine_similarity};
use nova_rag::metadata::{MetadataFilter, MetadataValue};
use nova_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a document tagged `even: bool` with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = (Document, Vec<f32>)> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", prop::bool::ANY, arb_normalized_embedding(dim)).prop_map(
        |(id, text, even, embedding)| {
            let doc = Document::new(id, text).with_metadata("even", even);
            (doc, embedding)
        },
    )
}

/// Deduplicate entries by id so overwrites don't skew counts.
fn dedup(entries: Vec<(Document, Vec<f32>)>) -> (Vec<Document>, Vec<Vec<f32>>) {
    let mut seen: HashMap<String, (Document, Vec<f32>)> = HashMap::new();
    for (doc, vector) in entries {
        seen.entry(doc.id.clone()).or_insert((doc, vector));
    }
    seen.into_values().unzip()
}

/// *For any* set of stored documents, search returns at most `top_k`
/// results, ordered by descending cosine similarity.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let (docs, vectors) = dedup(entries);
            let unique_count = docs.len();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.insert(&docs, &vectors).await.unwrap();
                store.search(&query, top_k, None).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn filtered_results_all_match(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            want in prop::bool::ANY,
        ) {
            let (docs, vectors) = dedup(entries);
            let want_value = MetadataValue::from(want);
            let expected = docs.iter().filter(|d| d.metadata["even"] == want_value).count();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.insert(&docs, &vectors).await.unwrap();
                let filter = MetadataFilter::new().require("even", want);
                store.search(&query, docs.len(), Some(&filter)).await.unwrap()
            });

            prop_assert_eq!(results.len(), expected);
            for r in &results {
                prop_assert_eq!(&r.document.metadata["even"], &want_value);
            }
        }
    }
}

/// *For any* pair of vectors, cosine similarity lies in `[-1, 1]`, is
/// symmetric, and a vector is maximally similar to itself.
mod prop_cosine_bounds {
    use super::*;

    proptest! {
        #[test]
        fn similarity_is_bounded_and_symmetric(
            a in proptest::collection::vec(-100.0f32..100.0, 8),
            b in proptest::collection::vec(-100.0f32..100.0, 8),
        ) {
            let ab = cosine_similarity(&a, &b);
            let ba = cosine_similarity(&b, &a);
            prop_assert!((-1.0..=1.0).contains(&ab));
            prop_assert!((ab - ba).abs() < 1e-6);
        }

        #[test]
        fn self_similarity_is_one(a in arb_normalized_embedding(8)) {
            prop_assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-4);
        }
    }
}

/// Concurrent writers and readers on one store: every search result pairs a
/// document with its own vector, and the final contents are exactly the ids
/// that were inserted and not deleted.
mod concurrent_access {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    const DIM: usize = 4;
    const WRITERS: usize = 4;
    const PER_WRITER: usize = 40;

    fn id(writer: usize, n: usize) -> String {
        format!("w{writer}-{n}")
    }

    fn vector_for(writer: usize, n: usize) -> Vec<f32> {
        vec![1.0, writer as f32 + 1.0, n as f32, (n % 3) as f32]
    }

    fn expected_vectors() -> HashMap<String, Vec<f32>> {
        (0..WRITERS)
            .flat_map(|w| (0..PER_WRITER).map(move |n| (id(w, n), vector_for(w, n))))
            .collect()
    }

    async fn write(store: Arc<InMemoryVectorStore>, writer: usize) {
        for batch in (0..PER_WRITER).collect::<Vec<_>>().chunks(5) {
            let docs: Vec<Document> =
                batch.iter().map(|&n| Document::new(id(writer, n), format!("text {n}"))).collect();
            let vectors: Vec<Vec<f32>> = batch.iter().map(|&n| vector_for(writer, n)).collect();
            store.insert(&docs, &vectors).await.unwrap();
            tokio::task::yield_now().await;
        }
        let odd: Vec<String> =
            (0..PER_WRITER).filter(|n| n % 2 == 1).map(|n| id(writer, n)).collect();
        let odd: Vec<&str> = odd.iter().map(String::as_str).collect();
        store.delete(&odd).await.unwrap();
    }

    async fn read(store: Arc<InMemoryVectorStore>, expected: Arc<HashMap<String, Vec<f32>>>) {
        let query = [1.0, 2.0, 3.0, 1.0];
        for _ in 0..50 {
            let results = store.search(&query, 10, None).await.unwrap();
            for result in &results {
                assert!(result.score.is_finite());
                let vector = &expected[&result.document.id];
                let want = cosine_similarity(&query, vector);
                assert!(
                    (result.score - want).abs() < 1e-5,
                    "{} scored {} but its vector gives {want}",
                    result.document.id,
                    result.score
                );
            }
            for pair in results.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
            assert!(store.size().await <= expected.len());
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_see_consistent_snapshots_while_writers_run() {
        let store = Arc::new(InMemoryVectorStore::new());
        let expected = Arc::new(expected_vectors());

        // First round includes a clear racing the writers.
        let mut tasks = Vec::new();
        for writer in 0..WRITERS {
            tasks.push(tokio::spawn(write(store.clone(), writer)));
            tasks.push(tokio::spawn(read(store.clone(), expected.clone())));
        }
        let clearer = store.clone();
        tasks.push(tokio::spawn(async move {
            tokio::task::yield_now().await;
            clearer.clear().await.unwrap();
        }));
        for task in tasks {
            task.await.unwrap();
        }

        // Second round without clear has a deterministic outcome.
        store.clear().await.unwrap();
        let mut tasks = Vec::new();
        for writer in 0..WRITERS {
            tasks.push(tokio::spawn(write(store.clone(), writer)));
            tasks.push(tokio::spawn(read(store.clone(), expected.clone())));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let survivors: HashSet<String> = (0..WRITERS)
            .flat_map(|w| (0..PER_WRITER).filter(|n| n % 2 == 0).map(move |n| id(w, n)))
            .collect();
        assert_eq!(store.size().await, survivors.len());
        for id in &survivors {
            assert!(store.get(id).await.is_some(), "{id} missing");
        }
        let all = store.search(&[1.0, 2.0, 3.0, 1.0], usize::MAX, None).await.unwrap();
        let found: HashSet<String> = all.into_iter().map(|r| r.document.id).collect();
        assert_eq!(found, survivors);
    }
}
