//! Query server and client over real TCP sockets

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cleo::config::ServerConfig;
use cleo::index::{ChampionRecord, IndexHandle, MatchupIndex, PostingList};
use cleo::transport::frame::{read_message, write_message, MessageDecoder};
use cleo::transport::{QueryClient, QueryRequest, QueryResponse, QueryServer, Role, Session};
use cleo::Champion;
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn list(ids: &[u32]) -> PostingList {
    PostingList::from_sorted(ids.to_vec()).unwrap()
}

fn thresh() -> Champion {
    Champion::from_name("thresh")
}

fn annie() -> Champion {
    Champion::from_name("annie")
}

fn index() -> MatchupIndex {
    let mut champions = BTreeMap::new();
    champions.insert(thresh(), ChampionRecord::new(list(&[1, 3, 5]), list(&[2, 4])));
    champions.insert(annie(), ChampionRecord::new(list(&[2]), list(&[3, 4, 5])));
    MatchupIndex::new(champions, list(&[1, 2, 3, 4, 5]), 0).unwrap()
}

struct Running {
    addr: std::net::SocketAddr,
    handle: Arc<IndexHandle>,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn start(concurrent_sessions: bool) -> Running {
    start_with(ServerConfig {
        concurrent_sessions,
        ..ServerConfig::default()
    })
    .await
}

async fn start_with(config: ServerConfig) -> Running {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..config
    };
    let handle = Arc::new(IndexHandle::new(index()));
    let server = QueryServer::bind(config, Arc::clone(&handle)).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async {
        let _ = stopped.await;
    }));

    Running {
        addr,
        handle,
        stop: Some(stop),
    }
}

#[tokio::test]
async fn test_answers_matchup_query() {
    let server = start(false).await;
    let client = QueryClient::connect(server.addr).await.unwrap().with_process(77);

    let response = client.query(&[thresh()], &[annie()], false).await.unwrap();

    assert!(response.successful);
    assert_eq!(response.query_process, 77);
    assert_eq!((response.matching, response.eligible, response.total), (2, 4, 5));
    assert!(response.explorations.is_empty());
}

#[tokio::test]
async fn test_invalid_queries_are_answered_unsuccessfully() {
    let server = start(false).await;
    let client = QueryClient::connect(server.addr).await.unwrap();

    let empty = client.query(&[], &[], false).await.unwrap();
    assert!(!empty.successful);
    assert_eq!((empty.matching, empty.eligible, empty.total), (0, 0, 0));

    let mut unknown = client.request(&[thresh()], &[], false);
    unknown.losers = vec![9999];
    assert!(!client.send(unknown).await.unwrap().successful);

    let conflicting = client.query(&[thresh()], &[thresh()], false).await.unwrap();
    assert!(!conflicting.successful);

    // The session is still usable afterwards
    assert!(client.query(&[thresh()], &[], false).await.unwrap().successful);
}

#[tokio::test]
async fn test_query_ids_increase_per_request() {
    let server = start(false).await;
    let client = QueryClient::connect(server.addr).await.unwrap();

    let a = client.query(&[thresh()], &[], false).await.unwrap();
    let b = client.query(&[annie()], &[], false).await.unwrap();
    assert!(b.query_id > a.query_id);
}

#[tokio::test]
async fn test_exploration_lists_other_champions() {
    let server = start(false).await;
    let client = QueryClient::connect(server.addr).await.unwrap();

    let response = client.query(&[thresh()], &[annie()], true).await.unwrap();

    assert!(response.successful);
    assert_eq!(response.explorations.len(), Champion::all().count() - 2);
    assert!(response
        .explorations
        .iter()
        .all(|e| e.champion != thresh() && e.champion != annie()));
}

#[tokio::test]
async fn test_concurrent_queries_on_one_session() {
    let server = start(false).await;
    let client = Arc::new(QueryClient::connect(server.addr).await.unwrap());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let explore = i % 2 == 0;
                client.query(&[thresh()], &[annie()], explore).await.unwrap()
            })
        })
        .collect();

    for task in tasks {
        let response = task.await.unwrap();
        assert_eq!((response.matching, response.eligible), (2, 4));
    }
}

#[tokio::test]
async fn test_abandoned_stream_does_not_affect_others() {
    let server = start(false).await;
    let socket = TcpStream::connect(server.addr).await.unwrap();
    let session = Session::new(socket, Role::Client);

    // Ask an exploratory question and walk away before the answer
    let mut abandoned = session.open_stream().unwrap();
    let request = QueryRequest {
        query_process: 1,
        query_id: 1,
        winners: vec![thresh().id()],
        losers: vec![],
        explore: true,
    };
    write_message(&mut abandoned, &request).unwrap();
    drop(abandoned);

    let mut stream = session.open_stream().unwrap();
    let request = QueryRequest {
        query_id: 2,
        losers: vec![annie().id()],
        explore: false,
        ..request
    };
    write_message(&mut stream, &request).unwrap();

    let response: QueryResponse = read_message(&mut stream, &mut MessageDecoder::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.query_id, 2);
    assert_eq!(response.matching, 2);
}

#[tokio::test]
async fn test_malformed_request_closes_stream_without_response() {
    let server = start(false).await;
    let socket = TcpStream::connect(server.addr).await.unwrap();
    let session = Session::new(socket, Role::Client);

    let mut stream = session.open_stream().unwrap();
    stream.write_all(&[0x05, 0xff, 0xff, 0x00]).unwrap();

    let response: Option<QueryResponse> = read_message(&mut stream, &mut MessageDecoder::default())
        .await
        .unwrap();
    assert!(response.is_none());

    // Other streams keep working
    let client = QueryClient::from_session(session);
    assert!(client.query(&[thresh()], &[], false).await.unwrap().successful);
}

#[tokio::test]
async fn test_sequential_server_returns_to_accepting() {
    let server = start(false).await;

    let first = QueryClient::connect(server.addr).await.unwrap();
    assert!(first.query(&[thresh()], &[], false).await.unwrap().successful);
    first.close();
    first.session().closed().await;
    drop(first);

    let second = QueryClient::connect(server.addr).await.unwrap();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        second.query(&[annie()], &[], false),
    )
    .await
    .expect("second session should be served")
    .unwrap();
    assert!(response.successful);
}

#[tokio::test]
async fn test_vanished_caller_does_not_block_sequential_server() {
    let server = start_with(ServerConfig {
        keepalive_interval_ms: 50,
        connection_timeout_ms: 50,
        ..ServerConfig::default()
    })
    .await;

    // Connects, then never sends or reads anything
    let silent = TcpStream::connect(server.addr).await.unwrap();

    let client = QueryClient::connect(server.addr).await.unwrap();
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        client.query(&[thresh()], &[annie()], false),
    )
    .await
    .expect("server should drop the silent session and accept the next one")
    .unwrap();

    assert_eq!(response.matching, 2);
    drop(silent);
}

#[tokio::test]
async fn test_concurrent_sessions_are_served_together() {
    let server = start(true).await;

    let first = QueryClient::connect(server.addr).await.unwrap();
    let second = QueryClient::connect(server.addr).await.unwrap();

    assert!(second.query(&[annie()], &[], false).await.unwrap().successful);
    assert!(first.query(&[thresh()], &[], false).await.unwrap().successful);
}

#[tokio::test]
async fn test_swapped_index_serves_new_counts() {
    let server = start(false).await;
    let client = QueryClient::connect(server.addr).await.unwrap();

    let before = client.query(&[thresh()], &[], false).await.unwrap();
    assert_eq!(before.total, 5);

    let mut champions = BTreeMap::new();
    champions.insert(thresh(), ChampionRecord::new(list(&[0]), list(&[])));
    server
        .handle
        .swap(MatchupIndex::new(champions, list(&[0, 1]), 1).unwrap())
        .await;

    let after = client.query(&[thresh()], &[], false).await.unwrap();
    assert_eq!((after.matching, after.eligible, after.total), (1, 1, 2));
}
