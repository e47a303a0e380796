//! Integration tests for the stream buffer.

use bytes::Bytes;
use integrations_native_http::stream;
use integrations_native_http::{ErrorKind, NativeHttpError, PushError};
use pretty_assertions::assert_eq;
use tokio_test::{assert_pending, assert_ready, task};

#[tokio::test]
async fn test_chunk_boundaries_do_not_matter() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    for chunk_size in [1usize, 7, 64, 4096, 10_000] {
        for read_size in [1usize, 3, 100, 8192] {
            let (writer, mut reader) = stream::channel();
            for chunk in payload.chunks(chunk_size) {
                writer.push(Bytes::copy_from_slice(chunk)).unwrap();
            }
            writer.complete();

            let mut out = Vec::new();
            while let Some(chunk) = reader.read(read_size).await.unwrap() {
                assert!(chunk.len() <= read_size);
                out.extend_from_slice(&chunk);
            }
            assert_eq!(out, payload, "chunk {} read {}", chunk_size, read_size);
            assert_eq!(reader.consumed(), reader.total_len());
        }
    }
}

#[test]
fn test_pending_read_is_woken_by_push() {
    let (writer, mut reader) = stream::channel();
    let mut read = task::spawn(reader.read(4));

    assert_pending!(read.poll());
    writer.push("data").unwrap();
    assert!(read.is_woken());

    let chunk = assert_ready!(read.poll()).unwrap();
    assert_eq!(chunk, Some(Bytes::from_static(b"data")));
}

#[test]
fn test_pending_read_is_woken_by_complete_and_fail() {
    let (writer, mut reader) = stream::channel();
    {
        let mut read = task::spawn(reader.read(4));
        assert_pending!(read.poll());
        writer.complete();
        assert!(read.is_woken());
        assert_eq!(assert_ready!(read.poll()).unwrap(), None);
    }

    let (writer, mut reader) = stream::channel();
    let mut read = task::spawn(reader.read(4));
    assert_pending!(read.poll());
    writer.fail(NativeHttpError::new(ErrorKind::ReceiveFailure, "bad frame"));
    assert!(read.is_woken());
    let err = assert_ready!(read.poll()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReceiveFailure);
}

#[tokio::test]
async fn test_end_of_stream_is_idempotent() {
    let (writer, mut reader) = stream::channel();
    writer.push("x").unwrap();
    writer.complete();
    assert!(!writer.complete());

    assert_eq!(reader.read(8).await.unwrap(), Some(Bytes::from_static(b"x")));
    for _ in 0..5 {
        assert_eq!(reader.read(8).await.unwrap(), None);
    }
}

#[tokio::test]
async fn test_first_terminal_state_wins() {
    let (writer, mut reader) = stream::channel();
    assert!(writer.fail(NativeHttpError::cancelled()));
    assert!(!writer.complete());
    assert_eq!(writer.push("late"), Err(PushError::Failed));

    assert!(reader.read(8).await.unwrap_err().is_cancelled());
    assert_eq!(reader.total_len(), 0);
}

#[tokio::test]
async fn test_progress_reports_expected_total() {
    let (writer, mut reader) = stream::channel();
    reader.set_expected_len(Some(6));
    writer.push("abcdef").unwrap();

    reader.read(4).await.unwrap();
    let progress = reader.progress();
    assert_eq!(progress.bytes_read, 4);
    assert_eq!(progress.total_read, 4);
    assert_eq!(progress.total_expected, Some(6));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interleaved_producer_and_consumer() {
    let (writer, mut reader) = stream::channel();

    let producer = tokio::spawn(async move {
        for i in 0..200u32 {
            writer.push(i.to_be_bytes().to_vec()).unwrap();
            if i % 16 == 0 {
                tokio::task::yield_now().await;
            }
        }
        writer.complete();
    });

    let body = reader.read_to_end().await.unwrap();
    producer.await.unwrap();

    let expected: Vec<u8> = (0..200u32).flat_map(|i| i.to_be_bytes()).collect();
    assert_eq!(body.as_ref(), expected.as_slice());
}
