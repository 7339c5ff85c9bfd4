//! Session-scoped push channel client.
//!
//! [`ChannelClient`] owns at most one live connection at a time. For the
//! lifetime of an authenticated [`Session`] it keeps that connection
//! joined to the user's room: connect, handshake, `join_user_room`, then
//! process frames until the transport drops, reconnect with backoff and
//! join again. Inbound events go to the shared [`EventRouter`].
//!
//! Connection state is published on a [`tokio::sync::watch`] channel.
//! Call [`ChannelClient::state`] to observe it.

use std::sync::Arc;
use std::time::Duration;

use resumatch_core::session::Session;
use resumatch_core::types::DbId;
use resumatch_events::EventRouter;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::processor::{open_session, process_frames, send_packet, SessionEnd};
use crate::protocol::{Handshake, Packet};
use crate::reconnect::{next_delay, reconnect_loop, ReconnectConfig};
use crate::transport::{ChannelError, Connector, Transport};

/// Control message joining the per-user room.
pub const JOIN_ROOM_EVENT: &str = "join_user_room";
/// Control message leaving the per-user room.
pub const LEAVE_ROOM_EVENT: &str = "leave_user_room";

/// Upper bound on how long teardown waits for the connection task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Observable state of the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected { user_id: DbId },
    /// Transport dropped; events pushed meanwhile are lost.
    Reconnecting { user_id: DbId },
}

/// Owns the push connection for the current session.
///
/// Created once and shared via `Arc`. Consumers only register listeners
/// on the [`EventRouter`]; opening and closing the connection is reserved
/// to this type.
pub struct ChannelClient {
    connector: Arc<dyn Connector>,
    router: Arc<EventRouter>,
    reconnect: ReconnectConfig,
    active: Mutex<Option<ActiveConnection>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

/// What [`ChannelClient::follow_session`] does next.
enum Follow {
    /// Wait for the next session change.
    Wait,
    /// The session already changed; act on it immediately.
    Changed,
    /// The session sender is gone.
    Closed,
}

/// Bookkeeping for the live connection task.
struct ActiveConnection {
    user_id: DbId,
    task_handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl ChannelClient {
    pub fn new(
        connector: Arc<dyn Connector>,
        router: Arc<EventRouter>,
        reconnect: ReconnectConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            router,
            reconnect,
            active: Mutex::new(None),
            state_tx: Arc::new(state_tx),
        }
    }

    /// The router inbound events are dispatched to.
    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Open the connection for `session` and join its room.
    ///
    /// A no-op when already connected (or reconnecting) for the same user.
    /// A connection for a different user is torn down first. On error the
    /// half-open transport is closed before returning.
    pub async fn connect(&self, session: &Session) -> Result<(), ChannelError> {
        let user_id = session.user_id();
        let mut active = self.active.lock().await;

        if let Some(conn) = active.as_ref() {
            if conn.user_id == user_id && !conn.task_handle.is_finished() {
                tracing::debug!(user_id, "Push channel already connected");
                return Ok(());
            }
        }
        if let Some(previous) = active.take() {
            self.teardown(previous).await;
        }

        let (transport, handshake) = establish(self.connector.as_ref(), user_id).await?;
        tracing::info!(
            user_id,
            endpoint = self.connector.endpoint(),
            sid = %handshake.sid,
            "Push channel connected",
        );
        self.state_tx.send_replace(ConnectionState::Connected { user_id });

        let cancel = CancellationToken::new();
        let task = ConnectionTask {
            connector: Arc::clone(&self.connector),
            router: Arc::clone(&self.router),
            reconnect: self.reconnect.clone(),
            state_tx: Arc::clone(&self.state_tx),
            cancel: cancel.clone(),
            user_id,
        };
        let task_handle = tokio::spawn(task.run(transport, handshake));

        *active = Some(ActiveConnection {
            user_id,
            task_handle,
            cancel,
        });
        Ok(())
    }

    /// Leave the room (if connected), close the transport and drop every
    /// listener registration. A no-op when nothing is connected.
    pub async fn disconnect(&self) {
        let previous = self.active.lock().await.take();
        if let Some(previous) = previous {
            self.teardown(previous).await;
        }
    }

    /// Whether a connection task is currently alive.
    pub async fn is_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| !conn.task_handle.is_finished())
    }

    /// Keep the connection in step with a session stream: connect while a
    /// session is present, disconnect when it becomes absent.
    ///
    /// Initial connect failures are retried with backoff until they
    /// succeed or the session changes. The returned task ends (after
    /// disconnecting) once the session sender is dropped.
    pub fn follow_session(
        self: Arc<Self>,
        mut sessions: watch::Receiver<Option<Session>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let current = sessions.borrow_and_update().clone();
                let next = match current {
                    Some(session) => self.connect_until_changed(&session, &mut sessions).await,
                    None => {
                        self.disconnect().await;
                        Follow::Wait
                    }
                };

                let closed = match next {
                    Follow::Changed => false,
                    Follow::Closed => true,
                    Follow::Wait => sessions.changed().await.is_err(),
                };
                if closed {
                    self.disconnect().await;
                    return;
                }
            }
        })
    }

    async fn connect_until_changed(
        &self,
        session: &Session,
        sessions: &mut watch::Receiver<Option<Session>>,
    ) -> Follow {
        let mut delay = self.reconnect.initial_delay;
        loop {
            let Err(e) = self.connect(session).await else {
                return Follow::Wait;
            };
            tracing::warn!(
                user_id = session.user_id(),
                error = %e,
                "Push channel connect failed",
            );
            tokio::select! {
                changed = sessions.changed() => {
                    return if changed.is_err() { Follow::Closed } else { Follow::Changed };
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = next_delay(delay, &self.reconnect);
        }
    }

    async fn teardown(&self, conn: ActiveConnection) {
        tracing::info!(user_id = conn.user_id, "Tearing down push channel");
        conn.cancel.cancel();
        let abort = conn.task_handle.abort_handle();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, conn.task_handle)
            .await
            .is_err()
        {
            tracing::warn!(user_id = conn.user_id, "Connection task did not stop in time, aborting");
            abort.abort();
        }
        self.router.remove_all();
        self.state_tx.send_replace(ConnectionState::Disconnected);
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        if let Some(conn) = self.active.get_mut().take() {
            conn.cancel.cancel();
        }
    }
}

/// Open a transport, complete the handshake and join the user's room.
///
/// The transport is closed again on every failure path.
async fn establish(
    connector: &dyn Connector,
    user_id: DbId,
) -> Result<(Box<dyn Transport>, Handshake), ChannelError> {
    let mut transport = connector.connect().await?;
    match join(transport.as_mut(), user_id).await {
        Ok(handshake) => Ok((transport, handshake)),
        Err(e) => {
            transport.close().await;
            Err(e)
        }
    }
}

async fn join(transport: &mut dyn Transport, user_id: DbId) -> Result<Handshake, ChannelError> {
    let handshake = open_session(transport).await?;
    send_packet(
        transport,
        &Packet::event(JOIN_ROOM_EVENT, json!({ "user_id": user_id })),
    )
    .await?;
    tracing::debug!(user_id, "Joined user room");
    Ok(handshake)
}

/// Everything the background connection task needs.
struct ConnectionTask {
    connector: Arc<dyn Connector>,
    router: Arc<EventRouter>,
    reconnect: ReconnectConfig,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    user_id: DbId,
}

impl ConnectionTask {
    /// Core connection loop: process frames -> reconnect -> rejoin.
    ///
    /// Runs until cancelled or the server disconnects the namespace.
    async fn run(self, mut transport: Box<dyn Transport>, mut handshake: Handshake) {
        let user_id = self.user_id;
        loop {
            let end = process_frames(
                transport.as_mut(),
                &self.router,
                handshake.liveness_window(),
                &self.cancel,
            )
            .await;

            match end {
                SessionEnd::Cancelled => {
                    self.leave(transport.as_mut()).await;
                    return;
                }
                SessionEnd::Kicked => {
                    transport.close().await;
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
                SessionEnd::Dropped(reason) => {
                    tracing::warn!(user_id, reason = %reason, "Push channel lost, reconnecting");
                    transport.close().await;
                    self.state_tx
                        .send_replace(ConnectionState::Reconnecting { user_id });
                }
            }

            let connector = self.connector.as_ref();
            match reconnect_loop(&self.reconnect, &self.cancel, || {
                establish(connector, user_id)
            })
            .await
            {
                Some((next_transport, next_handshake)) => {
                    transport = next_transport;
                    handshake = next_handshake;
                    self.state_tx.send_replace(ConnectionState::Connected { user_id });
                }
                None => return,
            }
        }
    }

    /// Leave the room and close the transport. Send failures are ignored:
    /// the connection is going away either way.
    async fn leave(&self, transport: &mut dyn Transport) {
        let leave = Packet::event(LEAVE_ROOM_EVENT, json!({ "user_id": self.user_id }));
        if let Err(e) = send_packet(transport, &leave).await {
            tracing::debug!(error = %e, "Failed to send leave_user_room");
        }
        if let Err(e) = send_packet(transport, &Packet::Disconnect).await {
            tracing::debug!(error = %e, "Failed to send namespace disconnect");
        }
        transport.close().await;
        tracing::info!(user_id = self.user_id, "Left user room");
    }
}
