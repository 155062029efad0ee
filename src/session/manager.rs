//! Session lifecycle manager
//!
//! Owns the [`StreamRegistry`] behind one async mutex. Each handler takes
//! the lock once, mutates, enqueues every notification it owes and only
//! then releases, so no two handlers interleave and observers see viewer
//! counts in the order the mutations happened.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::hub::{ConnectionId, Outbound};
use crate::protocol::{ChatRequest, ClientEvent, ServerEvent, StartStream, StartStreamAck};
use crate::registry::{RegistryError, StreamKey, StreamRegistry, StreamSummary};
use crate::relay::{self, Negotiation};
use crate::stats::Counters;

use super::config::SessionConfig;
use super::state::SessionRole;

/// Join/leave/start/stop/disconnect handling
pub struct SessionManager<O: Outbound> {
    registry: Mutex<StreamRegistry>,
    outbound: Arc<O>,
    config: SessionConfig,
    counters: Counters,
}

impl<O: Outbound> SessionManager<O> {
    /// Create a manager with a fresh, empty registry
    pub fn new(config: SessionConfig, outbound: Arc<O>) -> Self {
        Self {
            registry: Mutex::new(StreamRegistry::with_config(config.registry.clone())),
            outbound,
            config,
            counters: Counters::new(),
        }
    }

    /// Get the session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn outbound(&self) -> &Arc<O> {
        &self.outbound
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Dispatch one inbound event from `conn`
    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::GetStreams => {
                self.get_streams(conn).await;
            }
            ClientEvent::StartStream(request) => {
                self.start_stream(conn, request).await;
            }
            ClientEvent::StopStream => {
                self.stop_stream(conn).await;
            }
            ClientEvent::JoinStream(request) => {
                // Failures were already reported to the requester if configured
                if let Err(e) = self.join_stream(conn, request.stream_key).await {
                    tracing::debug!(connection_id = %conn, error = %e, "Join refused");
                }
            }
            ClientEvent::LeaveStream => {
                self.leave_stream(conn).await;
            }
            ClientEvent::Offer(request) => {
                self.relay(conn, Negotiation::Offer(request));
            }
            ClientEvent::Answer(request) => {
                self.relay(conn, Negotiation::Answer(request));
            }
            ClientEvent::IceCandidate(request) => {
                self.relay(conn, Negotiation::IceCandidate(request));
            }
            ClientEvent::ChatMessage(request) => {
                self.chat_message(conn, request).await;
            }
        }
    }

    /// Send the active stream list to `conn` only
    pub async fn get_streams(&self, conn: ConnectionId) -> Vec<StreamSummary> {
        let streams = self.registry.lock().await.list_active();
        self.outbound
            .send(conn, &ServerEvent::InitialStreams(streams.clone()));
        streams
    }

    /// Announce a stream owned by `conn`
    ///
    /// The requester always gets an acknowledgement; everyone else hears
    /// about the stream only when it was registered.
    pub async fn start_stream(&self, conn: ConnectionId, request: StartStream) -> StartStreamAck {
        let key = StreamKey::for_streamer(request.username.as_deref(), conn);
        let mut registry = self.registry.lock().await;

        if let Some(watching) = registry.viewing(conn) {
            let ack = StartStreamAck::rejected(format!("Connection is viewing {}", watching));
            self.outbound
                .send(conn, &ServerEvent::StartStreamResult(ack.clone()));
            return ack;
        }

        match registry.register(key, conn, request.metadata) {
            Ok(entry) => {
                let ack = StartStreamAck::accepted(entry.key.clone());
                let added = ServerEvent::StreamAdded {
                    stream_key: entry.key.clone(),
                    metadata: entry.metadata.clone(),
                };

                self.outbound
                    .send(conn, &ServerEvent::StartStreamResult(ack.clone()));
                self.outbound.broadcast(&added);
                ack
            }
            Err(e) => {
                tracing::info!(connection_id = %conn, error = %e, "Start stream rejected");

                let ack = StartStreamAck::rejected(e.to_string());
                self.outbound
                    .send(conn, &ServerEvent::StartStreamResult(ack.clone()));
                ack
            }
        }
    }

    /// Subscribe `conn` to a stream, returning the stream's viewer count
    ///
    /// A missing stream is dropped silently unless `report_join_failures`
    /// is set. Rejoining the current stream changes nothing; joining
    /// another stream moves the viewer, notifying the old stream first.
    pub async fn join_stream(
        &self,
        conn: ConnectionId,
        key: StreamKey,
    ) -> Result<usize, RegistryError> {
        let mut registry = self.registry.lock().await;

        let previous = match registry.role_of(conn) {
            SessionRole::Streaming(own) => {
                let err = RegistryError::AlreadyStreaming(own);
                self.join_failed(conn, &key, &err);
                return Err(err);
            }
            SessionRole::Viewing(current) if current == key => {
                return Ok(registry.get(&key).map_or(0, |entry| entry.viewer_count()));
            }
            SessionRole::Viewing(current) => Some(current),
            SessionRole::Idle => None,
        };

        let count = match registry.add_viewer(&key, conn) {
            Ok(count) => count,
            Err(err) => {
                self.join_failed(conn, &key, &err);
                return Err(err);
            }
        };

        if let Some(old) = previous {
            if let Some(entry) = registry.get(&old) {
                self.outbound
                    .send(entry.streamer, &ServerEvent::ViewerLeft { viewer_id: conn });
                self.outbound.broadcast(&ServerEvent::ViewerCountUpdate {
                    stream_key: old.clone(),
                    count: entry.viewer_count(),
                });
            }
        }

        if let Some(entry) = registry.get(&key) {
            self.outbound
                .send(entry.streamer, &ServerEvent::ViewerJoined { viewer_id: conn });
        }
        self.outbound.broadcast(&ServerEvent::ViewerCountUpdate {
            stream_key: key.clone(),
            count,
        });

        tracing::debug!(connection_id = %conn, stream = %key, viewers = count, "Viewer joined");

        Ok(count)
    }

    /// Unsubscribe `conn` from whatever it is watching
    ///
    /// Returns `false` when it was not watching anything.
    pub async fn leave_stream(&self, conn: ConnectionId) -> bool {
        let mut registry = self.registry.lock().await;
        self.leave_locked(&mut registry, conn)
    }

    /// End the stream owned by `conn`
    ///
    /// Returns `false` when it was not streaming.
    pub async fn stop_stream(&self, conn: ConnectionId) -> bool {
        let mut registry = self.registry.lock().await;
        self.end_stream_locked(&mut registry, conn)
    }

    /// Tear down all state held by a closed connection
    ///
    /// Streamer and viewer cleanup are checked independently. Running this
    /// again for the same connection finds nothing and emits nothing.
    pub async fn disconnect(&self, conn: ConnectionId) {
        let mut registry = self.registry.lock().await;

        let ended = self.end_stream_locked(&mut registry, conn);
        let left = self.leave_locked(&mut registry, conn);

        tracing::debug!(
            connection_id = %conn,
            ended_stream = ended,
            left_stream = left,
            "Session cleaned up"
        );
    }

    /// Fan a chat message out to the stream's streamer and viewers
    ///
    /// Returns how many participants were reached.
    pub async fn chat_message(&self, conn: ConnectionId, request: ChatRequest) -> usize {
        let registry = self.registry.lock().await;

        let Some(entry) = registry.get(&request.stream_key) else {
            tracing::debug!(
                connection_id = %conn,
                stream = %request.stream_key,
                "Chat for unknown stream dropped"
            );
            return 0;
        };

        let participants = entry.participants();
        let event = ServerEvent::ChatMessage {
            stream_key: request.stream_key,
            user: request.user,
            text: request.text,
        };
        self.counters.record_chat();
        self.outbound.multicast(&participants, &event)
    }

    /// Current role of a connection
    pub async fn role_of(&self, conn: ConnectionId) -> SessionRole {
        self.registry.lock().await.role_of(conn)
    }

    /// Snapshot of active streams
    pub async fn list_active(&self) -> Vec<StreamSummary> {
        self.registry.lock().await.list_active()
    }

    /// Number of active streams and viewers, read under one lock
    pub async fn occupancy(&self) -> (usize, usize) {
        let registry = self.registry.lock().await;
        (registry.len(), registry.viewer_total())
    }

    fn relay(&self, conn: ConnectionId, message: Negotiation) -> bool {
        let delivered = relay::forward(&*self.outbound, conn, message);
        self.counters.record_relay(delivered);
        delivered
    }

    fn leave_locked(&self, registry: &mut StreamRegistry, conn: ConnectionId) -> bool {
        let Some(key) = registry.viewing(conn).cloned() else {
            return false;
        };

        let count = match registry.remove_viewer(&key, conn) {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(connection_id = %conn, error = %e, "Stale viewer membership");
                return false;
            }
        };

        if let Some(entry) = registry.get(&key) {
            self.outbound
                .send(entry.streamer, &ServerEvent::ViewerLeft { viewer_id: conn });
        }
        self.outbound.broadcast(&ServerEvent::ViewerCountUpdate {
            stream_key: key.clone(),
            count,
        });

        tracing::debug!(connection_id = %conn, stream = %key, viewers = count, "Viewer left");

        true
    }

    fn end_stream_locked(&self, registry: &mut StreamRegistry, conn: ConnectionId) -> bool {
        let Some(key) = registry.find_by_streamer(conn).map(|entry| entry.key.clone()) else {
            return false;
        };

        let entry = match registry.unregister(&key) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(connection_id = %conn, error = %e, "Stale streamer index");
                return false;
            }
        };

        self.outbound.multicast(
            &entry.viewers(),
            &ServerEvent::StreamEnded {
                stream_key: key.clone(),
            },
        );
        self.outbound
            .broadcast(&ServerEvent::StreamRemoved { stream_key: key });

        true
    }

    fn join_failed(&self, conn: ConnectionId, key: &StreamKey, err: &RegistryError) {
        tracing::debug!(connection_id = %conn, stream = %key, error = %err, "Join not honored");

        if self.config.report_join_failures {
            self.outbound.send(
                conn,
                &ServerEvent::JoinFailed {
                    stream_key: key.clone(),
                    error: err.to_string(),
                },
            );
        }
    }

    #[cfg(test)]
    async fn check_invariants(&self) {
        self.registry.lock().await.check_invariants();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::value::RawValue;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::hub::testing::{RecordingOutbound, Target};
    use crate::protocol::{JoinStream, Metadata};
    use crate::registry::RegistryConfig;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn setup(config: SessionConfig, ids: &[u64]) -> (SessionManager<RecordingOutbound>, Arc<RecordingOutbound>) {
        let outbound = Arc::new(RecordingOutbound::default());
        outbound.connect(ids);
        (SessionManager::new(config, Arc::clone(&outbound)), outbound)
    }

    fn start(username: &str, title: &str) -> StartStream {
        let mut metadata = Metadata::new();
        metadata.insert("title", title);
        StartStream {
            metadata,
            username: Some(username.to_string()),
        }
    }

    fn raw(json: &str) -> Box<RawValue> {
        RawValue::from_string(json.to_string()).unwrap()
    }

    fn count_updates(events: &[(Target, ServerEvent)]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|(_, event)| match event {
                ServerEvent::ViewerCountUpdate { count, .. } => Some(*count),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_stream_acks_and_broadcasts() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1]);

        let ack = manager.start_stream(conn(1), start("A_123", "demo")).await;
        assert!(ack.success);
        assert_eq!(ack.stream_key, Some(StreamKey::new("A_123")));

        let sent = outbound.take();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[0],
            (Target::One(to), ServerEvent::StartStreamResult(ack)) if *to == conn(1) && ack.success
        ));
        match &sent[1] {
            (Target::All, ServerEvent::StreamAdded { stream_key, metadata }) => {
                assert_eq!(stream_key.as_str(), "A_123");
                assert_eq!(metadata.get("title").unwrap(), "demo");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        assert_eq!(
            manager.role_of(conn(1)).await,
            SessionRole::Streaming(StreamKey::new("A_123"))
        );
    }

    #[tokio::test]
    async fn test_generated_key_without_username() {
        let (manager, _outbound) = setup(SessionConfig::default(), &[7]);

        let ack = manager.start_stream(conn(7), StartStream::default()).await;

        assert_eq!(ack.stream_key, Some(StreamKey::generated(conn(7))));
    }

    #[tokio::test]
    async fn test_username_cannot_take_generated_key() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);

        let squatter = manager.start_stream(conn(1), start("stream-2", "t")).await;
        assert!(!squatter.success);
        assert!(squatter.error.unwrap().contains("reserved"));
        assert!(manager.list_active().await.is_empty());

        let ack = manager.start_stream(conn(2), StartStream::default()).await;
        assert!(ack.success);
        assert_eq!(ack.stream_key, Some(StreamKey::generated(conn(2))));

        let added = outbound
            .take()
            .into_iter()
            .filter(|(_, event)| matches!(event, ServerEvent::StreamAdded { .. }))
            .count();
        assert_eq!(added, 1);
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_duplicate_start_fails_without_broadcast() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);
        manager.start_stream(conn(1), start("A_123", "demo")).await;
        outbound.take();

        let ack = manager.start_stream(conn(2), start("A_123", "copy")).await;
        assert!(!ack.success);
        assert!(ack.error.unwrap().contains("A_123"));

        let sent = outbound.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0].0, Target::One(to) if to == conn(2)));

        let streams = manager.list_active().await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].metadata.get("title").unwrap(), "demo");
        assert_eq!(manager.role_of(conn(2)).await, SessionRole::Idle);
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_get_streams_only_to_requester() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2, 3]);
        manager.start_stream(conn(1), start("A_123", "demo")).await;
        manager.join_stream(conn(2), StreamKey::new("A_123")).await.unwrap();
        outbound.take();

        let streams = manager.get_streams(conn(3)).await;
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].viewer_count, 1);

        let sent = outbound.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            (Target::One(to), ServerEvent::InitialStreams(list)) if *to == conn(3) && list.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_join_notifies_streamer_and_broadcasts_count() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);
        manager.start_stream(conn(1), start("A_123", "demo")).await;
        outbound.take();

        let count = assert_ok!(manager.join_stream(conn(2), StreamKey::new("A_123")).await);
        assert_eq!(count, 1);

        let sent = outbound.take();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[0],
            (Target::One(to), ServerEvent::ViewerJoined { viewer_id }) if *to == conn(1) && *viewer_id == conn(2)
        ));
        assert!(matches!(
            &sent[1],
            (Target::All, ServerEvent::ViewerCountUpdate { stream_key, count: 1 }) if stream_key.as_str() == "A_123"
        ));
    }

    #[tokio::test]
    async fn test_join_missing_stream_is_silent() {
        let (manager, outbound) = setup(SessionConfig::default(), &[2]);

        assert_err!(manager.join_stream(conn(2), StreamKey::new("ghost")).await);

        assert!(outbound.take().is_empty());
        assert_eq!(manager.role_of(conn(2)).await, SessionRole::Idle);
    }

    #[tokio::test]
    async fn test_join_missing_stream_reported_when_enabled() {
        let config = SessionConfig::default().report_join_failures(true);
        let (manager, outbound) = setup(config, &[2]);

        let result = manager.join_stream(conn(2), StreamKey::new("ghost")).await;
        assert_eq!(result, Err(RegistryError::NotFound(StreamKey::new("ghost"))));

        let sent = outbound.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            (Target::One(to), ServerEvent::JoinFailed { stream_key, .. }) if *to == conn(2) && stream_key.as_str() == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_handle_refused_join_leaves_connection_idle() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);
        manager.start_stream(conn(1), start("own", "t")).await;
        outbound.take();

        let ghost = JoinStream {
            stream_key: StreamKey::new("ghost"),
        };
        manager.handle(conn(2), ClientEvent::JoinStream(ghost)).await;
        let own = JoinStream {
            stream_key: StreamKey::new("own"),
        };
        manager.handle(conn(1), ClientEvent::JoinStream(own)).await;

        assert!(outbound.take().is_empty());
        assert_eq!(manager.role_of(conn(2)).await, SessionRole::Idle);
        assert_eq!(manager.occupancy().await, (1, 0));
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_duplicate_join_is_noop() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);
        manager.start_stream(conn(1), start("live", "t")).await;
        manager.join_stream(conn(2), StreamKey::new("live")).await.unwrap();
        outbound.take();

        let count = manager.join_stream(conn(2), StreamKey::new("live")).await.unwrap();

        assert_eq!(count, 1);
        assert!(outbound.take().is_empty());
    }

    #[tokio::test]
    async fn test_streamer_cannot_view() {
        let config = SessionConfig::default().report_join_failures(true);
        let (manager, outbound) = setup(config, &[1, 2]);
        manager.start_stream(conn(1), start("a", "t")).await;
        manager.start_stream(conn(2), start("b", "t")).await;
        outbound.take();

        let result = manager.join_stream(conn(1), StreamKey::new("b")).await;
        assert_eq!(result, Err(RegistryError::AlreadyStreaming(StreamKey::new("a"))));
        assert!(matches!(&outbound.take()[..], [(_, ServerEvent::JoinFailed { .. })]));
        assert_eq!(manager.role_of(conn(1)).await, SessionRole::Streaming(StreamKey::new("a")));
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_viewer_cannot_stream() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);
        manager.start_stream(conn(1), start("a", "t")).await;
        manager.join_stream(conn(2), StreamKey::new("a")).await.unwrap();
        outbound.take();

        let ack = manager.start_stream(conn(2), start("b", "t")).await;

        assert!(!ack.success);
        assert_eq!(outbound.take().len(), 1);
        assert_eq!(manager.list_active().await.len(), 1);
    }

    #[tokio::test]
    async fn test_switching_streams_moves_viewer() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2, 3]);
        manager.start_stream(conn(1), start("a", "t")).await;
        manager.start_stream(conn(2), start("b", "t")).await;
        manager.join_stream(conn(3), StreamKey::new("a")).await.unwrap();
        outbound.take();

        manager.join_stream(conn(3), StreamKey::new("b")).await.unwrap();

        let sent = outbound.take();
        assert!(matches!(
            &sent[0],
            (Target::One(to), ServerEvent::ViewerLeft { .. }) if *to == conn(1)
        ));
        assert!(matches!(
            &sent[1],
            (Target::All, ServerEvent::ViewerCountUpdate { stream_key, count: 0 }) if stream_key.as_str() == "a"
        ));
        assert!(matches!(
            &sent[2],
            (Target::One(to), ServerEvent::ViewerJoined { .. }) if *to == conn(2)
        ));
        assert!(matches!(
            &sent[3],
            (Target::All, ServerEvent::ViewerCountUpdate { stream_key, count: 1 }) if stream_key.as_str() == "b"
        ));
        assert_eq!(manager.role_of(conn(3)).await, SessionRole::Viewing(StreamKey::new("b")));
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_viewer_limit_reported() {
        let config = SessionConfig::default()
            .report_join_failures(true)
            .registry(RegistryConfig::default().max_viewers_per_stream(1));
        let (manager, outbound) = setup(config, &[1, 2, 3]);
        manager.start_stream(conn(1), start("a", "t")).await;
        manager.join_stream(conn(2), StreamKey::new("a")).await.unwrap();
        outbound.take();

        let result = manager.join_stream(conn(3), StreamKey::new("a")).await;

        assert!(matches!(result, Err(RegistryError::ViewerLimitReached(_))));
        assert!(matches!(&outbound.take()[..], [(Target::One(_), ServerEvent::JoinFailed { .. })]));
    }

    #[tokio::test]
    async fn test_count_is_joins_minus_leaves() {
        let ids: Vec<u64> = (1..=11).collect();
        let (manager, outbound) = setup(SessionConfig::default(), &ids);
        manager.start_stream(conn(1), start("live", "t")).await;

        for id in 2..=11 {
            manager.join_stream(conn(id), StreamKey::new("live")).await.unwrap();
        }
        for id in 2..=5 {
            assert!(manager.leave_stream(conn(id)).await);
        }

        let counts = count_updates(&outbound.take());
        assert_eq!(counts.len(), 14);
        assert_eq!(*counts.last().unwrap(), 10 - 4);
        assert_eq!(manager.list_active().await[0].viewer_count, 6);
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_leave_without_membership_is_noop() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1]);

        assert!(!manager.leave_stream(conn(1)).await);
        assert!(outbound.take().is_empty());
    }

    #[tokio::test]
    async fn test_stop_stream_notifies_viewers() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2, 3]);
        manager.start_stream(conn(1), start("live", "t")).await;
        manager.join_stream(conn(2), StreamKey::new("live")).await.unwrap();
        manager.join_stream(conn(3), StreamKey::new("live")).await.unwrap();
        outbound.take();

        assert!(manager.stop_stream(conn(1)).await);
        assert!(!manager.stop_stream(conn(1)).await);

        let sent = outbound.take();
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[0], (Target::One(to), ServerEvent::StreamEnded { .. }) if to == conn(2)));
        assert!(matches!(sent[1], (Target::One(to), ServerEvent::StreamEnded { .. }) if to == conn(3)));
        assert!(matches!(&sent[2], (Target::All, ServerEvent::StreamRemoved { stream_key }) if stream_key.as_str() == "live"));

        assert_eq!(manager.role_of(conn(2)).await, SessionRole::Idle);
        assert_eq!(manager.occupancy().await, (0, 0));
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_disconnect_twice_is_noop() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);
        manager.start_stream(conn(1), start("live", "t")).await;
        manager.join_stream(conn(2), StreamKey::new("live")).await.unwrap();
        outbound.take();

        manager.disconnect(conn(2)).await;
        assert_eq!(outbound.take().len(), 2);

        manager.disconnect(conn(2)).await;
        assert!(outbound.take().is_empty());

        manager.disconnect(conn(1)).await;
        assert_eq!(outbound.take().len(), 1);

        manager.disconnect(conn(1)).await;
        assert!(outbound.take().is_empty());
        manager.check_invariants().await;
    }

    #[tokio::test]
    async fn test_chat_fans_out_to_participants() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2, 3, 4]);
        manager.start_stream(conn(1), start("live", "t")).await;
        manager.join_stream(conn(2), StreamKey::new("live")).await.unwrap();
        manager.join_stream(conn(3), StreamKey::new("live")).await.unwrap();
        outbound.take();

        let reached = manager
            .chat_message(
                conn(2),
                ChatRequest {
                    stream_key: StreamKey::new("live"),
                    user: raw(r#""bob""#),
                    text: raw(r#""hi all""#),
                },
            )
            .await;
        assert_eq!(reached, 3);

        let targets: Vec<Target> = outbound.take().into_iter().map(|(to, _)| to).collect();
        assert_eq!(
            targets,
            vec![Target::One(conn(1)), Target::One(conn(2)), Target::One(conn(3))]
        );
        assert_eq!(manager.counters().chat_messages(), 1);

        let dropped = manager
            .chat_message(
                conn(4),
                ChatRequest {
                    stream_key: StreamKey::new("ghost"),
                    user: raw("null"),
                    text: raw("null"),
                },
            )
            .await;
        assert_eq!(dropped, 0);
        assert!(outbound.take().is_empty());
    }

    #[tokio::test]
    async fn test_handle_relays_negotiation() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2]);

        let offer = ClientEvent::decode(
            r#"{"event":"offer","data":{"offer":{"sdp":"v=0"},"targetViewerId":2}}"#,
        )
        .unwrap();
        manager.handle(conn(1), offer).await;

        let lost = ClientEvent::decode(
            r#"{"event":"ice-candidate","data":{"candidate":{},"targetId":9}}"#,
        )
        .unwrap();
        manager.handle(conn(1), lost).await;

        let sent = outbound.take();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0],
            (Target::One(to), ServerEvent::Offer { from_streamer_id, .. }) if *to == conn(2) && *from_streamer_id == conn(1)
        ));
        assert_eq!(manager.counters().relayed(), 1);
        assert_eq!(manager.counters().relay_dropped(), 1);
    }

    #[tokio::test]
    async fn test_example_session() {
        let (manager, outbound) = setup(SessionConfig::default(), &[1, 2, 3]);
        let (a, b, c) = (conn(1), conn(2), conn(3));
        let key = StreamKey::new("A_123");

        let ack = manager.start_stream(a, start("A_123", "demo")).await;
        assert_eq!(ack.stream_key.as_ref(), Some(&key));

        manager.join_stream(b, key.clone()).await.unwrap();
        manager.join_stream(c, key.clone()).await.unwrap();
        manager.disconnect(b).await;

        let sent = outbound.take();
        assert_eq!(count_updates(&sent), vec![1, 2, 1]);
        assert!(sent.iter().any(|(to, event)| *to == Target::One(a)
            && matches!(event, ServerEvent::ViewerLeft { viewer_id } if *viewer_id == b)));

        outbound.disconnect(2);
        manager.disconnect(a).await;

        let sent = outbound.take();
        assert!(matches!(&sent[0], (Target::One(to), ServerEvent::StreamEnded { stream_key }) if *to == c && *stream_key == key));
        assert!(matches!(&sent[1], (Target::All, ServerEvent::StreamRemoved { stream_key }) if *stream_key == key));
        assert!(manager.list_active().await.is_empty());
        assert_eq!(manager.role_of(c).await, SessionRole::Idle);
        manager.check_invariants().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_keep_registry_consistent() {
        assert_eq!(
            tokio::runtime::Handle::current().runtime_flavor(),
            tokio::runtime::RuntimeFlavor::MultiThread
        );

        let ids: Vec<u64> = (1..=65).collect();
        let (manager, outbound) = setup(SessionConfig::default(), &ids);
        let manager = Arc::new(manager);
        manager.start_stream(conn(1), start("live", "t")).await;

        let mut handles = Vec::new();
        for id in 2..=65 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.join_stream(conn(id), StreamKey::new("live")).await.unwrap();
                if id % 2 == 0 {
                    manager.disconnect(conn(id)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.list_active().await[0].viewer_count, 32);

        // Every update is one join or one leave applied to the previous count
        let counts = count_updates(&outbound.take());
        assert_eq!(counts.len(), 64 + 32);
        assert_eq!(counts[0], 1);
        for pair in counts.windows(2) {
            assert_eq!(pair[0].abs_diff(pair[1]), 1, "counts out of order: {:?}", counts);
        }
        assert_eq!(*counts.last().unwrap(), 32);
        manager.check_invariants().await;
    }
}
