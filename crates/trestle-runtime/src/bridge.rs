//! Transport bridge orchestrator
//!
//! The [`TransportBridge`] is the consumer-facing surface of the system. It
//! owns the queues, the buffer pool, and the worker context, and splits its
//! API along the tick structure of the embedding loop:
//!
//! - **request operations** (`server_start`, `client_send`, ...) enqueue
//!   commands for the worker and return immediately. Completion and failure
//!   are observed later as events.
//! - **pump operations** (`server_early_update`, `client_early_update`)
//!   drain the role event queues once per tick and invoke the caller's
//!   callbacks synchronously, on the consumer thread.
//! - **lifecycle operations** (`init`, `shutdown`) manage the worker
//!   thread. Only `shutdown` ever blocks, and only up to the configured
//!   bound.
//!
//! Role state kept here is the consumer's view: the server role turns
//! active the moment `server_start` is accepted, while the client role
//! counts as connected only once the pump has delivered the connected
//! event. Misuse against this view (sending while stopped or disconnected)
//! is logged and dropped without reaching the queues or the adapter.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use trestle_core::channel::{
    create_client_event_queue, create_command_queue, create_server_event_queue, drain_queue,
    ClientEvent, ClientEventReceiver, Command, CommandReceiver, CommandSender, ServerEvent,
    ServerEventReceiver,
};
use trestle_core::{
    BridgeConfig, BridgeError, BridgeNotifier, BridgeResult, BufferPool, ChannelId,
    ClientCallbacks, ConnectionId, PoolStats, ServerCallbacks, ThreadedAdapter,
};

use crate::worker::{WorkerContext, WorkerState};

// ----------------------------------------------------------------------------
// Role State
// ----------------------------------------------------------------------------

/// Consumer-side view of the server role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerRole {
    Inactive = 0,
    Active = 1,
}

impl ServerRole {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServerRole::Inactive,
            _ => ServerRole::Active,
        }
    }
}

/// Consumer-side view of the client role.
///
/// `Connected` is entered only when the pump delivers the connected event,
/// never optimistically at `client_connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientRole {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ClientRole {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClientRole::Disconnected,
            1 => ClientRole::Connecting,
            _ => ClientRole::Connected,
        }
    }
}

// ----------------------------------------------------------------------------
// Shared Request Surface
// ----------------------------------------------------------------------------

/// State shared between the bridge and its handles: the command queue
/// entrance, the pool, and the consumer-side role views.
struct Shared {
    pool: BufferPool,
    commands: CommandSender,
    server_role: AtomicU8,
    client_role: AtomicU8,
}

impl Shared {
    fn server_role(&self) -> ServerRole {
        ServerRole::from_u8(self.server_role.load(Ordering::Acquire))
    }

    fn set_server_role(&self, role: ServerRole) {
        self.server_role.store(role as u8, Ordering::Release);
    }

    fn client_role(&self) -> ClientRole {
        ClientRole::from_u8(self.client_role.load(Ordering::Acquire))
    }

    fn set_client_role(&self, role: ClientRole) {
        self.client_role.store(role as u8, Ordering::Release);
    }

    fn push(&self, command: Command) {
        // Fails only after the worker receiver and the bridge are both
        // gone; the command (and any buffer it carries) just drops.
        if self.commands.send(command).is_err() {
            trace!("command dropped, bridge is shut down");
        }
    }

    fn server_send(&self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        if self.server_role() != ServerRole::Active {
            warn!("server_send ignored, server role is inactive");
            return;
        }
        let payload = self.pool.copy_from(payload);
        self.push(Command::SendServer {
            conn,
            payload,
            channel,
        });
    }

    fn server_disconnect(&self, conn: ConnectionId) {
        self.push(Command::DisconnectServer { conn });
    }

    fn client_send(&self, payload: &[u8], channel: ChannelId) {
        let role = self.client_role();
        if role != ClientRole::Connected {
            warn!("client_send ignored, client role is {:?}", role);
            return;
        }
        let payload = self.pool.copy_from(payload);
        self.push(Command::SendClient { payload, channel });
    }

    fn client_disconnect(&self) {
        self.set_client_role(ClientRole::Disconnected);
        self.push(Command::DisconnectClient);
    }
}

// ----------------------------------------------------------------------------
// Transport Bridge
// ----------------------------------------------------------------------------

/// Orchestrator connecting a single-threaded consumer to a threaded adapter
pub struct TransportBridge {
    config: BridgeConfig,
    shared: Arc<Shared>,
    command_drain: CommandReceiver,
    server_events: ServerEventReceiver,
    client_events: ClientEventReceiver,
    adapter: Option<Box<dyn ThreadedAdapter>>,
    worker: Option<WorkerContext>,
    shut_down: bool,
}

impl TransportBridge {
    /// Create a bridge around an adapter. Builds the queues and the pool,
    /// attaches the notifier, and leaves the worker unspawned until
    /// [`init`](Self::init).
    pub fn new(mut adapter: Box<dyn ThreadedAdapter>, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;

        let pool = BufferPool::new(config.default_buffer_capacity);
        pool.warm_up(config.pool_warmup);

        let (commands, command_drain) = create_command_queue();
        let (server_tx, server_events) = create_server_event_queue();
        let (client_tx, client_events) = create_client_event_queue();

        adapter.attach(BridgeNotifier::new(server_tx, client_tx, pool.clone()));

        Ok(Self {
            config,
            shared: Arc::new(Shared {
                pool,
                commands,
                server_role: AtomicU8::new(ServerRole::Inactive as u8),
                client_role: AtomicU8::new(ClientRole::Disconnected as u8),
            }),
            command_drain,
            server_events,
            client_events,
            adapter: Some(adapter),
            worker: None,
            shut_down: false,
        })
    }

    /// Spawn the worker thread. Must be called exactly once, before the
    /// first tick.
    pub fn init(&mut self) -> BridgeResult<()> {
        if self.worker.is_some() {
            return Err(BridgeError::AlreadyInitialized);
        }
        let adapter = self.adapter.take().ok_or(BridgeError::AlreadyInitialized)?;
        let worker = WorkerContext::spawn(
            adapter,
            self.command_drain.clone(),
            self.config.tick_interval,
            &self.config.worker_thread_name,
        )?;
        self.worker = Some(worker);
        info!("transport bridge initialized");
        Ok(())
    }

    /// Stop the worker and discard everything still queued.
    ///
    /// Enqueues the shutdown command, waits up to the configured timeout
    /// for the worker's acknowledgment, joins the thread, then drains all
    /// three queues. This is the only bridge operation that blocks the
    /// consumer. Idempotent after success; after a timeout the worker is
    /// left for a retry to reap.
    pub fn shutdown(&mut self) -> BridgeResult<()> {
        if self.shut_down {
            return Ok(());
        }
        debug!("transport bridge shutting down");

        let result = match self.worker.as_mut() {
            Some(worker) => {
                self.shared.push(Command::Shutdown);
                worker.stop_blocking(self.config.shutdown_timeout)
            }
            None => Ok(()),
        };

        match &result {
            Ok(()) => {
                self.finish_shutdown();
                info!("transport bridge shut down");
            }
            Err(BridgeError::ShutdownTimeout { .. }) => {}
            Err(_) => {
                // Worker is dead; nothing will consume the queues again.
                self.finish_shutdown();
            }
        }
        result
    }

    fn finish_shutdown(&mut self) {
        self.shut_down = true;
        self.shared.set_server_role(ServerRole::Inactive);
        self.shared.set_client_role(ClientRole::Disconnected);
        let discarded = drain_queue(&self.command_drain)
            + drain_queue(&self.server_events)
            + drain_queue(&self.client_events);
        if discarded > 0 {
            debug!("discarded {} queued items at shutdown", discarded);
        }
    }

    // ------------------------------------------------------------------
    // Request operations (non-blocking, consumer thread)
    // ------------------------------------------------------------------

    /// Ask the worker to start the server role.
    ///
    /// Events still queued from a previous server session are discarded
    /// here, so a restarted role begins with a clean queue.
    pub fn server_start(&self) {
        if self.shared.server_role() == ServerRole::Active {
            warn!("server_start ignored, server role is already active");
            return;
        }
        let stale = drain_queue(&self.server_events);
        if stale > 0 {
            debug!("discarded {} server events from a previous session", stale);
        }
        self.shared.set_server_role(ServerRole::Active);
        self.shared.push(Command::StartServer);
    }

    /// Ask the worker to stop the server role
    pub fn server_stop(&self) {
        self.shared.set_server_role(ServerRole::Inactive);
        self.shared.push(Command::StopServer);
    }

    /// Queue a payload for one server-side connection. The payload view is
    /// copied into a pooled buffer before this returns. Ignored with a
    /// diagnostic while the server role is inactive.
    pub fn server_send(&self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        self.shared.server_send(conn, payload, channel);
    }

    /// Ask the worker to close one server-side connection
    pub fn server_disconnect(&self, conn: ConnectionId) {
        self.shared.server_disconnect(conn);
    }

    /// Ask the worker to connect the client role to `address`. Ignored
    /// with a diagnostic unless the client role is disconnected.
    ///
    /// Events still queued from a previous client session are discarded
    /// here, like in [`server_start`](Self::server_start).
    pub fn client_connect(&self, address: &str) {
        let role = self.shared.client_role();
        if role != ClientRole::Disconnected {
            warn!("client_connect ignored, client role is {:?}", role);
            return;
        }
        let stale = drain_queue(&self.client_events);
        if stale > 0 {
            debug!("discarded {} client events from a previous session", stale);
        }
        self.shared.set_client_role(ClientRole::Connecting);
        self.shared.push(Command::ConnectClient {
            address: address.to_string(),
        });
    }

    /// Queue a payload for the client role's connection. Ignored with a
    /// diagnostic unless the pump has confirmed the connection.
    pub fn client_send(&self, payload: &[u8], channel: ChannelId) {
        self.shared.client_send(payload, channel);
    }

    /// Ask the worker to close the client role's connection
    pub fn client_disconnect(&self) {
        self.shared.client_disconnect();
    }

    // ------------------------------------------------------------------
    // Pump operations (once per tick, consumer thread)
    // ------------------------------------------------------------------

    /// Deliver every queued server event into `callbacks`, in order.
    ///
    /// Payload slices passed to the callbacks are views into pooled
    /// storage; each buffer returns to the pool as soon as its callback
    /// returns.
    pub fn server_early_update(&mut self, callbacks: &mut dyn ServerCallbacks) {
        while let Ok(event) = self.server_events.try_recv() {
            match event {
                ServerEvent::Connected { conn, address } => callbacks.on_connected(conn, &address),
                ServerEvent::Sent {
                    conn,
                    payload,
                    channel,
                } => callbacks.on_data_sent(conn, payload.as_slice(), channel),
                ServerEvent::Received {
                    conn,
                    payload,
                    channel,
                } => callbacks.on_data_received(conn, payload.as_slice(), channel),
                ServerEvent::Error {
                    conn,
                    kind,
                    message,
                } => callbacks.on_error(conn, kind, &message),
                ServerEvent::Disconnected { conn } => callbacks.on_disconnected(conn),
            }
        }
    }

    /// Deliver every queued client event into `callbacks`, in order, and
    /// track the client role state the events imply.
    pub fn client_early_update(&mut self, callbacks: &mut dyn ClientCallbacks) {
        while let Ok(event) = self.client_events.try_recv() {
            match event {
                ClientEvent::Connected => {
                    self.shared.set_client_role(ClientRole::Connected);
                    callbacks.on_connected();
                }
                ClientEvent::Sent { payload, channel } => {
                    callbacks.on_data_sent(payload.as_slice(), channel)
                }
                ClientEvent::Received { payload, channel } => {
                    callbacks.on_data_received(payload.as_slice(), channel)
                }
                ClientEvent::Error { kind, message } => {
                    // A connect that failed never reached Connected; the
                    // role returns to Disconnected so a retry can enqueue.
                    if self.shared.client_role() == ClientRole::Connecting {
                        self.shared.set_client_role(ClientRole::Disconnected);
                    }
                    callbacks.on_error(kind, &message)
                }
                ClientEvent::Disconnected => {
                    self.shared.set_client_role(ClientRole::Disconnected);
                    callbacks.on_disconnected();
                }
            }
        }
    }

    /// End-of-tick hook for the server role. The adapter's late-update work
    /// runs on the worker thread, so there is nothing to do here; the
    /// method exists to keep the embedding loop's tick shape uniform.
    pub fn server_late_update(&mut self) {}

    /// End-of-tick hook for the client role, same shape as
    /// [`server_late_update`](Self::server_late_update).
    pub fn client_late_update(&mut self) {}

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Cheap clonable handle exposing the send and disconnect requests,
    /// for code reacting to events mid-pump while the bridge itself is
    /// mutably borrowed.
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Consumer-side view of the server role
    pub fn server_role(&self) -> ServerRole {
        self.shared.server_role()
    }

    /// Consumer-side view of the client role
    pub fn client_role(&self) -> ClientRole {
        self.shared.client_role()
    }

    /// Worker lifecycle state, if the worker was ever spawned
    pub fn worker_state(&self) -> Option<WorkerState> {
        self.worker.as_ref().map(|w| w.state())
    }

    /// Buffer pool accounting snapshot
    pub fn pool_stats(&self) -> PoolStats {
        self.shared.pool.stats()
    }

    /// Commands queued but not yet dispatched to the adapter
    pub fn pending_commands(&self) -> usize {
        self.command_drain.len()
    }

    /// Server events queued but not yet pumped
    pub fn pending_server_events(&self) -> usize {
        self.server_events.len()
    }

    /// Client events queued but not yet pumped
    pub fn pending_client_events(&self) -> usize {
        self.client_events.len()
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl Drop for TransportBridge {
    fn drop(&mut self) {
        if !self.shut_down {
            if let Err(e) = self.shutdown() {
                warn!("bridge dropped without clean shutdown: {}", e);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Bridge Handle
// ----------------------------------------------------------------------------

/// Clonable request façade over a bridge.
///
/// Exposes the operations that are safe to issue from anywhere on the
/// consumer thread, including from inside pump callbacks: sends and
/// disconnects. Lifecycle, role starts, and pumping stay on the bridge.
#[derive(Clone)]
pub struct BridgeHandle {
    shared: Arc<Shared>,
}

impl BridgeHandle {
    /// Queue a payload for one server-side connection. Same misuse rules
    /// as the bridge method.
    pub fn server_send(&self, conn: ConnectionId, payload: &[u8], channel: ChannelId) {
        self.shared.server_send(conn, payload, channel);
    }

    /// Ask the worker to close one server-side connection
    pub fn server_disconnect(&self, conn: ConnectionId) {
        self.shared.server_disconnect(conn);
    }

    /// Queue a payload for the client role's connection. Same misuse rules
    /// as the bridge method.
    pub fn client_send(&self, payload: &[u8], channel: ChannelId) {
        self.shared.client_send(payload, channel);
    }

    /// Ask the worker to close the client role's connection
    pub fn client_disconnect(&self) {
        self.shared.client_disconnect();
    }

    /// Consumer-side view of the server role
    pub fn server_role(&self) -> ServerRole {
        self.shared.server_role()
    }

    /// Consumer-side view of the client role
    pub fn client_role(&self) -> ClientRole {
        self.shared.client_role()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
