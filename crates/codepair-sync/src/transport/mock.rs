//! Scripted transport for connection and coordinator tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use super::{EventSink, Transport, TransportEvent};
use crate::protocol::Envelope;

/// What the next `connect` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Open,
    Refuse,
    /// Never report anything.
    Hang,
}

#[derive(Default)]
struct State {
    script: VecDeque<Outcome>,
    connects: Vec<Instant>,
    sent: Vec<Envelope>,
    sink: Option<EventSink>,
    open: bool,
    closes: usize,
}

/// Once the script runs out every further `connect` opens.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub(crate) fn scripted(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().script = outcomes.into_iter().collect();
        mock
    }

    pub(crate) fn connect_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().connects.clone()
    }

    pub(crate) fn sent(&self) -> Vec<Envelope> {
        self.state.lock().unwrap().sent.clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Simulate the remote end dropping the channel.
    pub(crate) fn drop_connection(&self, reason: &str) {
        let mut state = self.state.lock().unwrap();
        state.open = false;
        if let Some(sink) = state.sink.as_ref() {
            let _ = sink.send(TransportEvent::Closed {
                reason: reason.to_string(),
            });
        }
    }

    /// Inject an inbound envelope as if a peer had sent it.
    pub(crate) fn deliver(&self, envelope: Envelope) {
        let state = self.state.lock().unwrap();
        if let Some(sink) = state.sink.as_ref() {
            let _ = sink.send(TransportEvent::Message(envelope));
        }
    }
}

impl Transport for MockTransport {
    fn connect(&self, _session_id: &str, events: EventSink) {
        let mut state = self.state.lock().unwrap();
        state.connects.push(Instant::now());
        let outcome = state.script.pop_front().unwrap_or(Outcome::Open);
        match outcome {
            Outcome::Open => {
                state.open = true;
                let _ = events.send(TransportEvent::Opened);
            }
            Outcome::Refuse => {
                state.open = false;
                let _ = events.send(TransportEvent::Error("refused".into()));
                let _ = events.send(TransportEvent::Closed {
                    reason: "refused".into(),
                });
            }
            Outcome::Hang => state.open = false,
        }
        state.sink = Some(events);
    }

    fn send(&self, envelope: &Envelope) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return false;
        }
        state.sent.push(envelope.clone());
        true
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.open = false;
        state.sink = None;
        state.closes += 1;
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
