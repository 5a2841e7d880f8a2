//! Lazy chunked generation.

mod common;

use std::time::Duration;

use common::{assert_vectors_close, harness, harness_with, init_tracing, HashBackend};
use embed::{CancelFlag, EmbedConfig, EmbedError, GenerationOptions, StreamState};
use futures::stream::FusedStream;
use futures::StreamExt;

fn with_chunk_size(chunk_size: usize) -> EmbedConfig {
    EmbedConfig {
        chunk_size,
        ..EmbedConfig::default()
    }
}

#[tokio::test]
async fn two_strings_fit_one_chunk() {
    init_tracing();
    let h = harness(&EmbedConfig::default());
    let stream = h
        .engine
        .generate_stream(
            ["hello world", "goodbye"],
            &GenerationOptions::default(),
            CancelFlag::new(),
        )
        .unwrap();
    assert_eq!(stream.total_chunks(), 1);

    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 2);
    let texts: Vec<String> = items
        .into_iter()
        .map(|item| item.unwrap().text().to_string())
        .collect();
    assert_eq!(texts, vec!["hello world", "goodbye"]);
    assert_eq!(h.backend.batch_sizes(), vec![2]);
}

#[tokio::test]
async fn three_hundred_identical_strings_split_128_128_44() {
    let h = harness(&EmbedConfig::default());
    let inputs = vec!["the same sentence".to_string(); 300];

    let stream = h
        .engine
        .generate_stream(inputs, &GenerationOptions::default(), CancelFlag::new())
        .unwrap();
    assert_eq!(stream.total_chunks(), 3);

    let vectors: Vec<_> = stream.map(|item| item.unwrap()).collect().await;
    assert_eq!(vectors.len(), 300);
    assert_eq!(h.backend.batch_sizes(), vec![128, 128, 44]);

    let first = vectors[0].as_slice();
    assert!(vectors.iter().all(|v| v.as_slice() == first));
}

#[tokio::test]
async fn chunk_count_is_ceiling_of_len_over_chunk_size() {
    for (n, k) in [(1_usize, 1_usize), (7, 3), (9, 3), (10, 4), (5, 128)] {
        let h = harness(&with_chunk_size(k));
        let inputs: Vec<String> = (0..n).map(|i| format!("doc {i}")).collect();
        let stream = h
            .engine
            .generate_stream(inputs, &GenerationOptions::default(), CancelFlag::new())
            .unwrap();
        assert_eq!(stream.total_chunks(), n.div_ceil(k), "n={n} k={k}");

        let count = stream.count().await;
        assert_eq!(count, n);
        assert_eq!(h.backend.calls(), n.div_ceil(k));
    }
}

#[tokio::test]
async fn stream_matches_eager_generation() {
    let h = harness(&with_chunk_size(4));
    let inputs: Vec<String> = (0..11)
        .map(|i| format!("sentence number {i} with {} words", i % 3))
        .collect();

    let eager = h
        .engine
        .generate(inputs.clone(), &GenerationOptions::default(), &CancelFlag::new())
        .await
        .unwrap();
    let streamed: Vec<_> = h
        .engine
        .generate_stream(inputs, &GenerationOptions::default(), CancelFlag::new())
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(eager.len(), streamed.len());
    for (a, b) in eager.iter().zip(&streamed) {
        assert_eq!(a.text(), b.text());
        assert_vectors_close(a.as_slice(), b.as_slice());
    }
}

#[tokio::test]
async fn nothing_runs_before_first_poll() {
    let h = harness(&with_chunk_size(2));
    let stream = h
        .engine
        .generate_stream(["a", "b", "c"], &GenerationOptions::default(), CancelFlag::new())
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(stream.state(), StreamState::Idle);
    assert_eq!(h.backend.calls(), 0);
    drop(stream);
}

#[tokio::test]
async fn look_ahead_is_at_most_one_chunk() {
    let h = harness(&with_chunk_size(2));
    let mut stream = h
        .engine
        .generate_stream(
            ["a", "b", "c", "d", "e", "f", "g", "h"],
            &GenerationOptions::default(),
            CancelFlag::new(),
        )
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.text(), "a");
    assert_eq!(stream.state(), StreamState::Yielding);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.backend.calls() <= 2, "calls = {}", h.backend.calls());

    let rest: Vec<_> = stream.map(|item| item.unwrap()).collect().await;
    assert_eq!(rest.len(), 7);
    assert_eq!(h.backend.calls(), 4);
}

#[tokio::test]
async fn empty_input_ends_immediately() {
    let h = harness(&EmbedConfig::default());
    let mut stream = h
        .engine
        .generate_stream(Vec::<String>::new(), &GenerationOptions::default(), CancelFlag::new())
        .unwrap();

    assert_eq!(stream.total_chunks(), 0);
    assert!(stream.next().await.is_none());
    assert_eq!(stream.state(), StreamState::Done);
    assert!(stream.is_terminated());
    assert_eq!(h.backend.calls(), 0);
}

#[tokio::test]
async fn finished_stream_stays_finished() {
    let h = harness(&EmbedConfig::default());
    let mut stream = h
        .engine
        .generate_stream(["only"], &GenerationOptions::default(), CancelFlag::new())
        .unwrap();

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.is_none());
    assert!(stream.next().await.is_none());
    assert_eq!(stream.state(), StreamState::Done);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn wrong_dimension_fails_before_streaming() {
    let h = harness(&EmbedConfig::default());
    let err = h
        .engine
        .generate_stream(["a"], &GenerationOptions::with_dimensions(512), CancelFlag::new())
        .unwrap_err();
    assert!(matches!(err, EmbedError::Configuration(_)));
    assert_eq!(h.backend.calls(), 0);
}

#[tokio::test]
async fn cancelling_mid_stream_stops_yields() {
    let h = harness(&with_chunk_size(2));
    let cancel = CancelFlag::new();
    let mut stream = h
        .engine
        .generate_stream(
            ["a", "b", "c", "d", "e", "f"],
            &GenerationOptions::default(),
            cancel.clone(),
        )
        .unwrap();

    assert!(stream.next().await.unwrap().is_ok());
    cancel.cancel();

    assert!(matches!(
        stream.next().await,
        Some(Err(EmbedError::Cancelled))
    ));
    assert!(stream.next().await.is_none());
    assert_eq!(stream.state(), StreamState::Cancelled);
    assert!(h.backend.calls() <= 2);
}

#[tokio::test]
async fn cancelling_while_a_chunk_runs_reports_once() {
    let backend = HashBackend {
        delay: Some(Duration::from_millis(50)),
        ..HashBackend::default()
    };
    let h = harness_with(&with_chunk_size(2), backend);
    let cancel = CancelFlag::new();
    let mut stream = h
        .engine
        .generate_stream(["a", "b", "c", "d"], &GenerationOptions::default(), cancel.clone())
        .unwrap();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        })
    };

    let items: Vec<_> = (&mut stream).collect().await;
    canceller.await.unwrap();

    let errors: Vec<_> = items.iter().filter(|item| item.is_err()).collect();
    assert_eq!(errors.len(), 1);
    assert!(matches!(items.last(), Some(Err(EmbedError::Cancelled))));
    assert_eq!(stream.state(), StreamState::Cancelled);
}

#[tokio::test]
async fn huge_chunk_size_holds_only_the_input() {
    let h = harness(&with_chunk_size(usize::MAX / 2));
    let stream = h
        .engine
        .generate_stream(["hello", "world"], &GenerationOptions::default(), CancelFlag::new())
        .unwrap();
    assert_eq!(stream.total_chunks(), 1);

    let texts: Vec<String> = stream
        .map(|item| item.unwrap().text().to_string())
        .collect()
        .await;
    assert_eq!(texts, vec!["hello", "world"]);
    assert_eq!(h.backend.batch_sizes(), vec![2]);
}

#[tokio::test]
async fn cancelling_after_the_last_item_ends_done() {
    let h = harness(&EmbedConfig::default());
    let cancel = CancelFlag::new();
    let mut stream = h
        .engine
        .generate_stream(["a", "b"], &GenerationOptions::default(), cancel.clone())
        .unwrap();

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_ok());
    cancel.cancel();

    assert!(stream.next().await.is_none());
    assert_eq!(stream.state(), StreamState::Done);
    assert!(stream.is_terminated());
}
