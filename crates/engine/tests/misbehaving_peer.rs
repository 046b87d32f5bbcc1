//! A coordinator facing peers that break the protocol

mod common;

use common::{config_for, eventually, log_file};
use dgrep_core::Query;
use dgrep_engine::protocol::{self, Message};
use dgrep_engine::Engine;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// Accept one connection, consume the hello and the first query, then let
/// `respond` misbehave on the stream.
async fn fake_peer<F, Fut>(respond: F) -> (String, tokio::task::JoinHandle<()>)
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let hello = protocol::decode(&protocol::read_frame(&mut stream).await.unwrap()).unwrap();
        assert!(matches!(hello, Message::Hello(_)));
        let query = protocol::decode(&protocol::read_frame(&mut stream).await.unwrap()).unwrap();
        assert!(matches!(query, Message::Query(_)));
        respond(stream).await;
    });
    (addr, task)
}

async fn local_engine(contents: &str) -> (Engine, tempfile::NamedTempFile) {
    let log = log_file(contents);
    let engine = Engine::with_process_matcher(config_for(log.path().to_path_buf())).unwrap();
    engine.start_server().await.unwrap();
    (engine, log)
}

#[tokio::test]
async fn test_garbage_response_is_omitted() {
    let (addr, peer) = fake_peer(|mut stream| async move {
        protocol::write_frame(&mut stream, &[0xff, 0x00, 0x01]).await.unwrap();
        // Keep the connection open until the coordinator is done
        let _ = protocol::read_frame(&mut stream).await;
    })
    .await;

    let (engine, _log) = local_engine("ERROR\n").await;
    engine.connect_to_peers(&[addr]).await.unwrap();

    let report = engine.execute(&Query::parse("grep -c ERROR").unwrap()).await;
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].node, engine.node_id());
    assert_eq!(report.total_lines, 1);
    // Malformed data is not a disconnect
    assert_eq!(engine.active_peer_count(), 1);

    engine.shutdown().await;
    peer.await.unwrap();
}

#[tokio::test]
async fn test_truncated_response_disconnects_peer() {
    let (addr, peer) = fake_peer(|mut stream| async move {
        stream.write_all(&100u32.to_le_bytes()).await.unwrap();
        stream.write_all(b"partial").await.unwrap();
        stream.shutdown().await.unwrap();
    })
    .await;

    let (engine, _log) = local_engine("ERROR\nERROR\n").await;
    engine.connect_to_peers(&[addr]).await.unwrap();
    assert_eq!(engine.active_peer_count(), 1);

    let report = engine.execute(&Query::parse("grep -c ERROR").unwrap()).await;
    assert_eq!(report.total_lines, 2);
    assert_eq!(report.results.len(), 1);
    eventually(|| engine.active_peer_count() == 0).await;

    // The departed peer is no longer asked
    let report = engine.execute(&Query::parse("grep ERROR").unwrap()).await;
    assert_eq!(report.results.len(), 1);

    engine.shutdown().await;
    peer.await.unwrap();
}

#[tokio::test]
async fn test_peer_closing_before_reply_disconnects() {
    let (addr, peer) = fake_peer(|stream| async move { drop(stream) }).await;

    let (engine, _log) = local_engine("A\n").await;
    engine.connect_to_peers(&[addr]).await.unwrap();

    let report = engine.execute(&Query::parse("grep -c ERROR").unwrap()).await;
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.total_lines, 0);
    assert_eq!(engine.active_peer_count(), 0);

    engine.shutdown().await;
    peer.await.unwrap();
}
