use std::sync::{Arc, Mutex};
use std::time::Duration;

use codepair_common::{Language, Role};
use codepair_config::SyncConfig;

use super::*;
use crate::protocol::{JoinedUser, Message};
use crate::transport::mock::{MockTransport, Outcome};
use crate::transport::Transport;

fn settle() -> tokio::time::Sleep {
    tokio::time::sleep(Duration::from_millis(1))
}

fn with_mock(user: &str, mock: &MockTransport) -> Collaboration {
    let mock = mock.clone();
    let factory = move || -> Arc<dyn Transport> { Arc::new(mock.clone()) };
    Collaboration::new(user, Arc::new(factory), &SyncConfig::default())
}

fn collect(collab: &Collaboration, kind: MessageType) -> Arc<Mutex<Vec<Envelope>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    collab.subscribe(kind, move |env| sink.lock().unwrap().push(env.clone()));
    seen
}

fn code_from(user: &str, code: &str) -> Envelope {
    Envelope::new(Message::CodeChange(CodeChange {
        code: code.into(),
        user_id: user.into(),
    }))
    .with_sender(user)
}

fn codes(envelopes: &[Envelope]) -> Vec<String> {
    envelopes
        .iter()
        .filter_map(|e| match &e.message {
            Message::CodeChange(c) => Some(c.code.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn code_reaches_peer_after_debounce() {
    let hub = LocalHub::new();
    let alice = Collaboration::local("A", hub.clone(), &SyncConfig::default());
    let bob = Collaboration::local("B", hub.clone(), &SyncConfig::default());
    assert!(alice.init("abcd1234"));
    assert!(bob.init("abcd1234"));
    settle().await;
    assert!(alice.is_connected() && bob.is_connected());

    let at_alice = collect(&alice, MessageType::CodeChange);
    let at_bob = collect(&bob, MessageType::CodeChange);

    assert!(alice.broadcast_code("x"));
    tokio::time::sleep(Duration::from_millis(299)).await;
    assert!(at_bob.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    let received = at_bob.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    match &received[0].message {
        Message::CodeChange(change) => {
            assert_eq!(change.code, "x");
            assert_eq!(change.user_id, "A");
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert!(at_alice.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_sends_last_text_only() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    collab.init("abcd1234");
    settle().await;

    collab.broadcast_code("A");
    tokio::time::sleep(Duration::from_millis(50)).await;
    collab.broadcast_code("B");
    tokio::time::sleep(Duration::from_millis(50)).await;
    collab.broadcast_code("C");
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(codes(&mock.sent()), vec!["C".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn own_document_edits_are_not_echoed() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    collab.init("abcd1234");
    settle().await;

    let code = collect(&collab, MessageType::CodeChange);
    let language = collect(&collab, MessageType::LanguageChange);
    let joins = collect(&collab, MessageType::UserJoin);

    mock.deliver(code_from("A", "mine"));
    mock.deliver(code_from("B", "theirs"));
    // No senderId: the payload's userId identifies the sender.
    mock.deliver(Envelope::new(Message::LanguageChange(LanguageChange {
        language: Language::Python,
        user_id: "A".into(),
    })));
    mock.deliver(
        Envelope::new(Message::UserJoin(UserJoin {
            user: JoinedUser {
                id: "A".into(),
                name: "Ann".into(),
                role: Role::Interviewer,
                color: "red".into(),
            },
        }))
        .with_sender("A"),
    );
    settle().await;

    assert_eq!(codes(&code.lock().unwrap()), vec!["theirs".to_string()]);
    assert!(language.lock().unwrap().is_empty());
    assert_eq!(joins.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn presence_is_delivered_from_self() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    collab.init("abcd1234");
    settle().await;

    let leaves = collect(&collab, MessageType::UserLeave);
    mock.deliver(
        Envelope::new(Message::UserLeave(UserLeave {
            user_id: "A".into(),
        }))
        .with_sender("A"),
    );
    settle().await;

    assert_eq!(leaves.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn outbound_envelopes_are_stamped() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    collab.init("abcd1234");
    settle().await;

    let mut position = serde_json::Map::new();
    position.insert("line".into(), 4.into());
    assert!(collab.broadcast_language(Language::Html));
    assert!(collab.broadcast_leave());
    assert!(collab.broadcast_cursor_position(position));

    let sent = mock.sent();
    assert_eq!(sent.len(), 3);
    for env in &sent {
        assert_eq!(env.sender_id.as_deref(), Some("A"));
        assert!(env.timestamp.is_some());
        assert_eq!(env.message.user_id(), "A");
    }
    assert_eq!(sent[0].message_type(), MessageType::LanguageChange);
    assert_eq!(sent[2].message_type(), MessageType::CursorPosition);
}

#[tokio::test(start_paused = true)]
async fn broadcast_join_announces_participant() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    collab.init("abcd1234");
    settle().await;

    let participant = codepair_common::Participant {
        id: "A".into(),
        name: "Ann".into(),
        role: Role::Interviewer,
        color: "red".into(),
        joined_at: 1,
        is_online: true,
    };
    assert!(collab.broadcast_join(&participant));

    match &mock.sent()[0].message {
        Message::UserJoin(join) => assert_eq!(join.user.name, "Ann"),
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn broadcasts_fail_without_connection() {
    let mock = MockTransport::scripted([Outcome::Hang]);
    let collab = with_mock("A", &mock);

    assert!(!collab.broadcast_leave());
    assert!(!collab.broadcast_code("x"));
    assert_eq!(collab.connection_state(), ConnectionState::Disconnected);

    collab.init("abcd1234");
    settle().await;
    assert_eq!(collab.connection_state(), ConnectionState::Connecting);
    assert!(!collab.broadcast_language(Language::Python));
    assert!(mock.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cleanup_then_init_isolates_sessions() {
    let hub = LocalHub::new();
    let alice = Collaboration::local("A", hub.clone(), &SyncConfig::default());
    let bob = Collaboration::local("B", hub.clone(), &SyncConfig::default());
    alice.init("aaaa0000");
    bob.init("aaaa0000");
    settle().await;

    let at_bob = collect(&bob, MessageType::CodeChange);

    // Pending debounced edit from the old session must never go out.
    alice.broadcast_code("stale");
    tokio::time::sleep(Duration::from_millis(100)).await;
    alice.cleanup();
    assert!(!alice.is_active());
    alice.init("bbbb1111");
    settle().await;
    let at_alice = collect(&alice, MessageType::CodeChange);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(at_bob.lock().unwrap().is_empty());

    // Traffic on the old session does not reach the new one.
    bob.broadcast_code("old session");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(at_alice.lock().unwrap().is_empty());
    assert_eq!(alice.session_id().as_deref(), Some("bbbb1111"));
    assert_eq!(hub.listener_count("aaaa0000"), 1);
}

#[tokio::test(start_paused = true)]
async fn cleanup_drops_subscriptions() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    collab.init("abcd1234");
    settle().await;

    let seen = collect(&collab, MessageType::CodeChange);
    collab.cleanup();
    assert_eq!(collab.connection_state(), ConnectionState::Disconnected);
    assert_eq!(mock.closes(), 1);

    collab.init("abcd1234");
    settle().await;
    mock.deliver(code_from("B", "after"));
    settle().await;
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn init_while_active_cleans_up_first() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    collab.on_connection_state_change(move |s| sink.lock().unwrap().push(*s));

    collab.init("aaaa0000");
    settle().await;
    collab.init("bbbb1111");
    settle().await;

    use ConnectionState::*;
    assert_eq!(
        *states.lock().unwrap(),
        vec![Connecting, Connected, Closing, Disconnected, Connecting, Connected]
    );
    assert_eq!(mock.connect_times().len(), 2);
    assert_eq!(collab.session_id().as_deref(), Some("bbbb1111"));
}

#[tokio::test(start_paused = true)]
async fn unsupported_transport_refuses_init() {
    let config = codepair_config::CodepairConfig {
        server: codepair_config::ServerConfig {
            api_base_url: "http://localhost:8000".into(),
            ws_base_url: "http://localhost:8000".into(),
        },
        ..Default::default()
    };
    let collab = Collaboration::websocket("A", &config);

    assert!(!collab.is_supported());
    assert!(!collab.init("abcd1234"));
    assert!(!collab.is_active());
    assert_eq!(collab.local_user_id(), "A");
}

#[tokio::test(start_paused = true)]
async fn faulty_subscriber_does_not_block_others() {
    let mock = MockTransport::default();
    let collab = with_mock("A", &mock);
    collab.init("abcd1234");
    settle().await;

    collab.subscribe(MessageType::CodeChange, |_| panic!("ui bug"));
    let seen = collect(&collab, MessageType::CodeChange);
    mock.deliver(code_from("B", "y"));
    settle().await;

    assert_eq!(codes(&seen.lock().unwrap()), vec!["y".to_string()]);
    assert!(collab.is_connected());
}
