//! End-to-end tests: `HubClient` against a live `DaemonServer`.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::path::PathBuf;
use std::time::Duration;

use chatbox_cli::{ClientError, HubClient};
use chatbox_core::{ErrorKind, HubConfig, ServiceConfig};
use chatbox_protocol::ProtocolVersion;
use chatboxd::hub::Hub;
use chatboxd::server::DaemonServer;
use chatboxd::service::ChatService;
use tempfile::TempDir;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_millis(500);
const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(10);
const SHORT_WAIT: Duration = Duration::from_millis(100);

struct Daemon {
    socket_path: PathBuf,
    cancel_token: CancellationToken,
    hub: Hub,
    _temp_dir: TempDir,
}

impl Daemon {
    async fn start() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let socket_path = temp_dir.path().join("chatbox.sock");

        let hub = Hub::spawn(&HubConfig::default());
        let service = ChatService::new(hub.clone(), ServiceConfig::default());
        let cancel_token = CancellationToken::new();
        let server = DaemonServer::new(socket_path.clone(), service, cancel_token.clone());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let start = tokio::time::Instant::now();
        while start.elapsed() < SOCKET_WAIT_TIMEOUT && !socket_path.exists() {
            sleep(SOCKET_POLL_INTERVAL).await;
        }
        assert!(socket_path.exists(), "daemon socket did not appear");

        Self {
            socket_path,
            cancel_token,
            hub,
            _temp_dir: temp_dir,
        }
    }

    async fn client(&self) -> HubClient {
        HubClient::connect(&self.socket_path).await.expect("connect")
    }

    async fn stop(self) {
        self.cancel_token.cancel();
        self.hub.shutdown().await;
    }
}

fn assert_hub_error(err: ClientError, kind: ErrorKind, code: &str) {
    match err {
        ClientError::Hub {
            kind: k, code: c, ..
        } => {
            assert_eq!(k, kind);
            assert_eq!(c, code);
        }
        other => panic!("Expected hub error {code}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_round_trip() {
    let daemon = Daemon::start().await;
    let mut alice = daemon.client().await;
    let mut bob = daemon.client().await;

    alice.join("alice").await.unwrap();
    bob.join("bob").await.unwrap();

    assert_eq!(alice.send("alice", "hi").await.unwrap(), 1);
    assert_eq!(bob.poll("bob", Some(SHORT_WAIT)).await.unwrap(), "alice: hi");

    let err = alice.poll("alice", Some(SHORT_WAIT)).await.unwrap_err();
    assert!(err.is_no_messages());

    bob.leave("bob").await.unwrap();
    assert_hub_error(
        alice.send("alice", "anyone?").await.unwrap_err(),
        ErrorKind::NoReceivers,
        "ERR_NO_RECEIVERS",
    );

    alice.close().await.unwrap();
    daemon.stop().await;
}

#[tokio::test]
async fn test_errors_decode_to_kinds() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;

    assert_hub_error(
        client.join("").await.unwrap_err(),
        ErrorKind::InvalidInput,
        "ERR_MISSING_USER_ID",
    );
    assert_hub_error(
        client.leave("ghost").await.unwrap_err(),
        ErrorKind::NotFound,
        "ERR_USER_NOT_FOUND",
    );
    assert_hub_error(
        client.poll("ghost", Some(SHORT_WAIT)).await.unwrap_err(),
        ErrorKind::NotFound,
        "ERR_USER_NOT_FOUND",
    );

    // The connection stays usable after errors
    assert_eq!(client.ping(3).await.unwrap(), 3);

    daemon.stop().await;
}

#[tokio::test]
async fn test_listen_while_another_connection_sends() {
    let daemon = Daemon::start().await;
    let mut sender = daemon.client().await;
    let mut listener = daemon.client().await;

    sender.join("s").await.unwrap();
    listener.join("l").await.unwrap();

    let poll = tokio::spawn(async move {
        let got = listener.poll("l", Some(Duration::from_secs(2))).await;
        (listener, got)
    });
    sleep(Duration::from_millis(50)).await;
    sender.send("s", "news").await.unwrap();

    let (_listener, got) = poll.await.unwrap();
    assert_eq!(got.unwrap(), "s: news");

    daemon.stop().await;
}

#[tokio::test]
async fn test_status_and_client_list() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await;

    client.join("b").await.unwrap();
    client.join("a").await.unwrap();

    let clients = client.list_clients().await.unwrap();
    let ids: Vec<&str> = clients.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert!(clients.iter().all(|c| c.pending == 0));

    let status = client.status().await.unwrap();
    assert_eq!(status.clients, 2);
    assert_eq!(status.protocol_version, ProtocolVersion::CURRENT);

    daemon.stop().await;
}

#[tokio::test]
async fn test_connection_label_is_echoed() {
    let daemon = Daemon::start().await;

    let client = HubClient::connect_as(&daemon.socket_path, Some("cli-test".to_string()))
        .await
        .unwrap();
    assert_eq!(client.connection_id(), "cli-test");

    daemon.stop().await;
}

#[tokio::test]
async fn test_timed_out_request_poisons_connection() {
    let daemon = Daemon::start().await;
    let mut client = daemon.client().await.with_reply_timeout(Duration::ZERO);

    // The request is written but its reply is never read
    let err = client.join("slowpoke").await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout), "got {err:?}");

    // The late `joined` reply must not be taken as the answer to this ping
    let err = client.ping(1).await.unwrap_err();
    assert!(matches!(err, ClientError::Disconnected), "got {err:?}");

    // The daemon did process the join
    let mut other = daemon.client().await;
    let ids: Vec<String> = other
        .list_clients()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["slowpoke".to_string()]);

    daemon.stop().await;
}
