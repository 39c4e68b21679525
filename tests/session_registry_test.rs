mod common;

use bulk_sender::error::SessionError;
use bulk_sender::session::{InitOutcome, SessionRegistry, SessionState};
use bulk_sender::transport::TransportEvent;
use common::{ready_info, settle, MockConnector, IDENTITY};
use std::sync::Arc;

fn registry(connector: &Arc<MockConnector>) -> SessionRegistry {
    SessionRegistry::new(connector.clone())
}

#[tokio::test]
async fn test_pairing_then_ready() {
    let connector = Arc::new(MockConnector::manual());
    let sessions = registry(&connector);

    assert_eq!(sessions.get_or_init("alice").await, InitOutcome::Initializing);
    settle().await;
    assert_eq!(connector.connection_count(), 1);

    let events = connector.events(0);
    events.send(TransportEvent::PairingCode("2@abc".into())).await.unwrap();
    settle().await;

    let status = sessions.status("alice").await;
    assert_eq!(status.state, SessionState::AwaitingPairing);
    assert!(!status.healthy);
    assert!(status.health.open);
    assert!(!status.health.paired);
    assert_eq!(sessions.pairing_code("alice").await.as_deref(), Some("2@abc"));

    connector.transport(0).pair(IDENTITY);
    events.send(TransportEvent::Ready(ready_info())).await.unwrap();
    settle().await;

    let status = sessions.status("alice").await;
    assert_eq!(status.state, SessionState::Ready);
    assert!(status.healthy);
    assert_eq!(status.pairing_code, None);
    assert_eq!(status.info.unwrap().identity, IDENTITY);
    assert!(sessions.ready_handle("alice").await.is_ok());
}

#[tokio::test]
async fn test_init_is_noop_when_ready_or_pairing() {
    let connector = Arc::new(MockConnector::manual());
    let sessions = registry(&connector);

    sessions.get_or_init("alice").await;
    settle().await;
    assert_eq!(sessions.get_or_init("alice").await, InitOutcome::Initializing);
    settle().await;
    assert_eq!(connector.connection_count(), 1);

    connector.transport(0).pair(IDENTITY);
    connector
        .events(0)
        .send(TransportEvent::Ready(ready_info()))
        .await
        .unwrap();
    settle().await;

    assert_eq!(sessions.get_or_init("alice").await, InitOutcome::Ready);
    settle().await;
    assert_eq!(connector.connection_count(), 1);
}

#[tokio::test]
async fn test_degraded_session_is_superseded() {
    let connector = Arc::new(MockConnector::auto_ready());
    let sessions = registry(&connector);

    sessions.get_or_init("alice").await;
    settle().await;
    assert_eq!(sessions.status("alice").await.state, SessionState::Ready);

    let old = connector.transport(0);
    old.set_open(false);
    assert_eq!(sessions.status("alice").await.state, SessionState::Degraded);
    assert!(matches!(
        sessions.ready_handle("alice").await,
        Err(SessionError::NotReady { .. })
    ));

    assert_eq!(sessions.get_or_init("alice").await, InitOutcome::Initializing);
    settle().await;
    assert_eq!(connector.connection_count(), 2);
    assert!(old.is_closed());
    assert_eq!(sessions.status("alice").await.state, SessionState::Ready);

    // 旧句柄的事件被忽略
    let _ = connector
        .events(0)
        .send(TransportEvent::Disconnected("stale".into()))
        .await;
    settle().await;
    assert_eq!(sessions.status("alice").await.state, SessionState::Ready);
    assert!(!connector.transport(1).is_closed());
}

#[tokio::test]
async fn test_disconnect_closes_and_disposes() {
    let connector = Arc::new(MockConnector::auto_ready());
    let sessions = registry(&connector);

    sessions.get_or_init("alice").await;
    settle().await;
    connector
        .events(0)
        .send(TransportEvent::Disconnected("phone offline".into()))
        .await
        .unwrap();
    settle().await;

    let status = sessions.status("alice").await;
    assert_eq!(status.state, SessionState::Closed);
    assert_eq!(status.last_error.as_deref(), Some("phone offline"));
    assert!(connector.transport(0).is_closed());
    assert!(sessions.get("alice").await.is_none());
    assert_eq!(sessions.live_count().await, 0);
}

#[tokio::test]
async fn test_invalidate_removes_entry() {
    let connector = Arc::new(MockConnector::auto_ready());
    let sessions = registry(&connector);

    sessions.get_or_init("alice").await;
    settle().await;
    assert_eq!(sessions.live_count().await, 1);

    assert!(sessions.invalidate("alice").await);
    settle().await;
    assert!(connector.transport(0).is_closed());
    assert_eq!(sessions.status("alice").await.state, SessionState::Uninitialized);
    assert!(!sessions.invalidate("alice").await);
    assert_eq!(
        sessions.ready_handle("alice").await.err(),
        Some(SessionError::NotFound("alice".into()))
    );
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let connector = Arc::new(MockConnector::failing());
    let sessions = registry(&connector);

    sessions.get_or_init("alice").await;
    settle().await;

    let status = sessions.status("alice").await;
    assert_eq!(status.state, SessionState::Closed);
    assert!(status.last_error.is_some());
}

#[tokio::test]
async fn test_users_are_isolated() {
    let connector = Arc::new(MockConnector::auto_ready());
    let sessions = registry(&connector);

    sessions.get_or_init("alice").await;
    sessions.get_or_init("bob").await;
    settle().await;
    assert_eq!(sessions.live_count().await, 2);

    sessions.invalidate("alice").await;
    assert_eq!(sessions.status("bob").await.state, SessionState::Ready);
}
