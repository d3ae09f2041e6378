//! Connection management.
//!
//! A [`Connection`] owns two TCP channels to one device: the command channel
//! carries request/response pairs, the event channel carries unsolicited
//! change events (and the acknowledgement of the event registration itself).
//! Each channel allows one command in flight at a time.

use crate::correlator::{Correlator, PendingReceiver, Resolution};
use crate::dispatcher::{EventDispatcher, Listener, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::error::ClientError;
use crate::observer::{Observer, TracingObserver};
use heos_protocol::{
    decode_message, Command, CommandFramer, EventFramer, EventKind, HeosEvent, Message, Query,
    Request, DEFAULT_MAX_MESSAGE_SIZE, HEOS_PORT,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Network address of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            port: HEOS_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl From<IpAddr> for Endpoint {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

/// Accepts `ip` (default port) or `ip:port`.
impl FromStr for Endpoint {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<SocketAddr>() {
            Ok(addr) => Ok(addr.into()),
            Err(_) => s.parse::<IpAddr>().map(Endpoint::new),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// One of the two sockets of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Command,
    Event,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Command => write!(f, "command"),
            Channel::Event => write!(f, "event"),
        }
    }
}

/// Lifecycle state of a connection.
///
/// `Pending -> Connecting -> {Connected | Timeout | Error}`,
/// `Connected -> {Closed | Error}`, and `close()` always ends in `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Pending,
    Connecting,
    Connected,
    Timeout,
    Error,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Timeout => "timeout",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Device address.
    pub endpoint: Endpoint,
    /// Timeout for opening each channel.
    pub connect_timeout: Duration,
    /// How long a command may stay pending once the device has reported it
    /// is still processing it. `None` waits forever.
    pub processing_timeout: Option<Duration>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Largest command channel message accepted before it is discarded.
    pub max_message_size: usize,
    /// Capacity of the typed event broadcast channel.
    pub event_channel_capacity: usize,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<Endpoint>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(10),
            processing_timeout: Some(Duration::from_secs(60)),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_processing_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.processing_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

type Writer = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

/// Socket handle, pending command and read task of one channel.
struct ChannelState {
    channel: Channel,
    writer: Mutex<Option<Writer>>,
    correlator: Correlator,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelState {
    fn new(channel: Channel) -> Self {
        Self {
            channel,
            writer: Mutex::new(None),
            correlator: Correlator::new(),
            reader: Mutex::new(None),
        }
    }

    fn writer(&self) -> Option<Writer> {
        self.writer.lock().clone()
    }

    fn is_open(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Drops the socket, stops the read task and fails the pending command.
    fn teardown(&self) {
        if self.writer.lock().take().is_some() {
            tracing::debug!("Closing {} channel", self.channel);
        }
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.correlator.fail(|| ClientError::ConnectionClosed);
    }
}

/// Frees the pending slot if the caller stops waiting.
struct SlotGuard<'a> {
    correlator: &'a Correlator,
    seq: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.correlator.cancel(self.seq);
    }
}

struct Inner {
    config: ConnectionConfig,
    status: Mutex<ConnectionStatus>,
    command: ChannelState,
    event: ChannelState,
    dispatcher: EventDispatcher,
    observer: Arc<dyn Observer>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl Inner {
    fn channel(&self, channel: Channel) -> &ChannelState {
        match channel {
            Channel::Command => &self.command,
            Channel::Event => &self.event,
        }
    }

    fn set_status(&self, to: ConnectionStatus) {
        let from = std::mem::replace(&mut *self.status.lock(), to);
        if from != to {
            self.observer.status_changed(from, to);
        }
    }

    /// Moves `from -> to` only if the status is still `from`.
    fn transition(&self, from: ConnectionStatus, to: ConnectionStatus) -> bool {
        {
            let mut status = self.status.lock();
            if *status != from {
                return false;
            }
            *status = to;
        }
        self.observer.status_changed(from, to);
        true
    }

    fn teardown(&self) {
        self.command.teardown();
        self.event.teardown();
    }

    /// Called when a read loop ends on EOF or a read error.
    fn channel_lost(&self, channel: Channel) {
        if self.transition(ConnectionStatus::Connected, ConnectionStatus::Error) {
            tracing::debug!("{} channel lost, closing connection", channel);
            self.teardown();
        }
    }

    fn decode(&self, channel: Channel, frame: &[u8]) -> Option<Message> {
        match decode_message(frame) {
            Ok(message) => Some(message),
            Err(e) => {
                self.observer.message_dropped(channel, &e);
                None
            }
        }
    }

    fn correlate(&self, channel: Channel, message: &Message) {
        match self.channel(channel).correlator.resolve(message) {
            Resolution::Resolved(command) => {
                tracing::debug!("Resolved {} on {} channel", command, channel)
            }
            Resolution::Processing(command) => {
                self.observer.command_processing(channel, command)
            }
            Resolution::Unmatched => self.observer.unmatched_response(channel, message),
        }
    }

    fn handle_event(&self, message: &Message) {
        match message.command().parse::<EventKind>() {
            Ok(kind) => {
                self.dispatcher.dispatch(kind, message);
            }
            Err(_) => self.observer.unknown_event(message),
        }
    }

    /// Events are dispatched wherever they arrive; anything else answers the
    /// command pending on that channel.
    fn route(&self, channel: Channel, message: Message) {
        if message.is_event() {
            self.handle_event(&message);
        } else {
            self.correlate(channel, &message);
        }
    }
}

// The read loops hold the connection weakly: once the last `Connection` is
// dropped, `Inner` tears both channels down and the loops stop.

async fn command_read_loop(
    weak: Weak<Inner>,
    mut reader: OwnedReadHalf,
    mut framer: CommandFramer,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("command channel closed by device");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("command channel read failed: {}", e);
                break;
            }
        };
        tracing::trace!("command channel: received {} bytes", n);
        let Some(inner) = weak.upgrade() else {
            return;
        };

        match framer.push(&buf[..n]) {
            Ok(frames) => {
                for frame in frames {
                    if let Some(message) = inner.decode(Channel::Command, &frame) {
                        inner.route(Channel::Command, message);
                    }
                }
            }
            Err(e) => inner.observer.message_dropped(Channel::Command, &e),
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.channel_lost(Channel::Command);
    }
}

async fn event_read_loop(weak: Weak<Inner>, mut reader: OwnedReadHalf, buffer_size: usize) {
    let framer = EventFramer::new();
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("event channel closed by device");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::debug!("event channel read failed: {}", e);
                break;
            }
        };
        tracing::trace!("event channel: received {} bytes", n);
        let Some(inner) = weak.upgrade() else {
            return;
        };

        for frame in framer.split(&buf[..n]) {
            if let Some(message) = inner.decode(Channel::Event, &frame) {
                inner.route(Channel::Event, message);
            }
        }
    }

    if let Some(inner) = weak.upgrade() {
        inner.channel_lost(Channel::Event);
    }
}

/// A connection to one device.
///
/// Cloning is cheap and every clone refers to the same sockets. Dropping the
/// last clone closes both channels.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: ConnectionConfig, observer: Arc<dyn Observer>) -> Self {
        let dispatcher = EventDispatcher::new(config.event_channel_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                status: Mutex::new(ConnectionStatus::Pending),
                command: ChannelState::new(Channel::Command),
                event: ChannelState::new(Channel::Event),
                dispatcher,
                observer,
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn endpoint(&self) -> Endpoint {
        self.inner.config.endpoint
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Returns the command in flight on `channel`, if any.
    pub fn pending(&self, channel: Channel) -> Option<Command> {
        self.inner.channel(channel).correlator.pending()
    }

    /// Opens the command channel, then the event channel.
    ///
    /// A connection can be connected once; create a new one to reconnect.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let inner = &self.inner;
        if !inner.transition(ConnectionStatus::Pending, ConnectionStatus::Connecting) {
            return Err(ClientError::InvalidState(self.status()));
        }

        let addr = inner.config.endpoint.socket_addr();
        tracing::debug!("Connecting to {}...", addr);

        let (command_read, command_write) = match self.open_channel(Channel::Command).await {
            Ok(stream) => stream.into_split(),
            Err(e) => return Err(self.fail_connect(e)),
        };
        *inner.command.writer.lock() = Some(Arc::new(tokio::sync::Mutex::new(command_write)));

        let (event_read, event_write) = match self.open_channel(Channel::Event).await {
            Ok(stream) => stream.into_split(),
            Err(e) => return Err(self.fail_connect(e)),
        };
        *inner.event.writer.lock() = Some(Arc::new(tokio::sync::Mutex::new(event_write)));

        // close() may have run while connecting.
        if !inner.transition(ConnectionStatus::Connecting, ConnectionStatus::Connected) {
            inner.teardown();
            return Err(ClientError::ConnectionClosed);
        }

        let buffer_size = inner.config.read_buffer_size;
        let framer = CommandFramer::with_max_message_size(inner.config.max_message_size);
        *inner.command.reader.lock() = Some(tokio::spawn(command_read_loop(
            Arc::downgrade(inner),
            command_read,
            framer,
            buffer_size,
        )));
        *inner.event.reader.lock() = Some(tokio::spawn(event_read_loop(
            Arc::downgrade(inner),
            event_read,
            buffer_size,
        )));

        tracing::debug!("Connected to {}", addr);
        Ok(())
    }

    async fn open_channel(&self, channel: Channel) -> Result<TcpStream, ClientError> {
        let addr = self.inner.config.endpoint.socket_addr();
        let connect = TcpStream::connect(addr);
        let stream = tokio::time::timeout(self.inner.config.connect_timeout, connect)
            .await
            .map_err(|_| {
                tracing::debug!("{} channel connection timeout", channel);
                ClientError::Timeout
            })?
            .map_err(|e| {
                tracing::debug!("{} channel connection failed: {}", channel, e);
                ClientError::Io(e)
            })?;

        stream.set_nodelay(true).ok();
        tracing::debug!("{} channel open", channel);
        Ok(stream)
    }

    fn fail_connect(&self, error: ClientError) -> ClientError {
        let status = match error {
            ClientError::Timeout => ConnectionStatus::Timeout,
            _ => ConnectionStatus::Error,
        };
        if !self.inner.transition(ConnectionStatus::Connecting, status) {
            // Closed meanwhile.
            self.inner.teardown();
            return ClientError::ConnectionClosed;
        }
        self.inner.teardown();
        error
    }

    /// Sends `command` on the command channel and waits for its response.
    pub async fn send(&self, command: Command, query: Query) -> Result<Value, ClientError> {
        self.send_on(Channel::Command, command, query).await
    }

    /// Sends `command` on `channel` and waits for its response.
    ///
    /// Fails immediately, without writing, with [`ClientError::NotReady`] when
    /// the channel is not open and with [`ClientError::CommandPending`] when
    /// another command is in flight on it.
    pub async fn send_on(
        &self,
        channel: Channel,
        command: Command,
        query: Query,
    ) -> Result<Value, ClientError> {
        let state = self.inner.channel(channel);
        let writer = state.writer().ok_or(ClientError::NotReady(channel))?;
        let pending = state
            .correlator
            .begin(command)
            .ok_or(ClientError::CommandPending(channel))?;
        let _guard = SlotGuard {
            correlator: &state.correlator,
            seq: pending.seq,
        };

        let request = Request::with_query(command, query);
        tracing::debug!("Sending {} on {} channel", request.line(), channel);

        let encoded = request.encode();
        {
            let mut writer = writer.lock().await;
            writer.write_all(&encoded).await.map_err(|e| {
                tracing::debug!("Write to {} channel failed: {}", channel, e);
                ClientError::Io(e)
            })?;
        }

        self.wait_response(pending).await
    }

    async fn wait_response(&self, pending: PendingReceiver) -> Result<Value, ClientError> {
        let PendingReceiver {
            mut rx,
            processing_rx,
            ..
        } = pending;

        let processing = async { processing_rx.await.is_ok() };
        let early = tokio::select! {
            biased;
            result = &mut rx => Some(result),
            true = processing => None,
        };

        let result = match (early, self.inner.config.processing_timeout) {
            (Some(result), _) => result,
            (None, None) => rx.await,
            (None, Some(limit)) => match tokio::time::timeout(limit, rx).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!("Command still processing after {:?}, giving up", limit);
                    return Err(ClientError::Timeout);
                }
            },
        };

        // The sender is dropped without a value only when the slot was torn down.
        result.unwrap_or(Err(ClientError::ConnectionClosed))
    }

    /// Registers `listener` for `kind`. Returns false if it was already registered.
    pub fn subscribe(&self, kind: EventKind, listener: Listener) -> bool {
        self.inner.dispatcher.subscribe(kind, listener)
    }

    pub fn unsubscribe(&self, kind: EventKind, listener: &Listener) -> bool {
        self.inner.dispatcher.unsubscribe(kind, listener)
    }

    /// Subscribes to typed events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<HeosEvent> {
        self.inner.dispatcher.subscribe_events()
    }

    /// Closes both channels. Safe to call more than once and in any state.
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!("Closing connection...");
        self.inner.set_status(ConnectionStatus::Closed);

        for channel in [Channel::Command, Channel::Event] {
            let writer = self.inner.channel(channel).writer.lock().take();
            if let Some(writer) = writer {
                let _ = writer.lock().await.shutdown().await;
            }
        }
        self.inner.teardown();

        tracing::debug!("Connection closed");
        Ok(())
    }

    /// Returns whether `channel` currently has an open socket.
    pub fn is_open(&self, channel: Channel) -> bool {
        self.inner.channel(channel).is_open()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.inner.config.endpoint)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::listener;
    use crate::testing::{
        connected, connected_with, response, wait_until, FakeDevice, Observed, RecordingObserver,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_config_defaults() {
        let config = ConnectionConfig::new("192.168.1.10".parse::<IpAddr>().unwrap());
        assert_eq!(config.endpoint.port, HEOS_PORT);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.processing_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.event_channel_capacity, DEFAULT_EVENT_CHANNEL_CAPACITY);
    }

    #[test]
    fn test_config_clamps_read_buffer() {
        let endpoint: Endpoint = "127.0.0.1".parse().unwrap();
        let config = ConnectionConfig::new(endpoint).with_read_buffer_size(10);
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);
        let config = ConnectionConfig::new(endpoint).with_read_buffer_size(usize::MAX);
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_endpoint_parse() {
        let endpoint: Endpoint = "10.0.0.5".parse().unwrap();
        assert_eq!(endpoint.to_string(), "10.0.0.5:1255");
        let endpoint: Endpoint = "10.0.0.5:4000".parse().unwrap();
        assert_eq!(endpoint.port, 4000);
        assert!("not-an-ip".parse::<Endpoint>().is_err());
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let endpoint: Endpoint = "127.0.0.1".parse().unwrap();
        let connection = Connection::new(ConnectionConfig::new(endpoint));
        assert_eq!(connection.status(), ConnectionStatus::Pending);
        assert!(matches!(
            connection.send(Command::HeartBeat, Query::new()).await,
            Err(ClientError::NotReady(Channel::Command))
        ));
        assert!(matches!(
            connection.send_on(Channel::Event, Command::HeartBeat, Query::new()).await,
            Err(ClientError::NotReady(Channel::Event))
        ));
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let (connection, _device, observer) = connected().await;
        assert!(connection.is_connected());
        assert!(connection.is_open(Channel::Command));
        assert!(connection.is_open(Channel::Event));

        connection.close().await.unwrap();
        assert_eq!(
            observer.statuses(),
            vec![
                ConnectionStatus::Connecting,
                ConnectionStatus::Connected,
                ConnectionStatus::Closed
            ]
        );
        assert!(!connection.is_open(Channel::Command));
    }

    #[tokio::test]
    async fn test_send_resolves_with_message() {
        let (connection, mut device, _) = connected().await;

        let (result, request) = tokio::join!(
            connection.send(Command::HeartBeat, Query::new()),
            device.command.ack(Command::HeartBeat)
        );
        assert_eq!(result.unwrap(), Value::Null);
        assert_eq!(request.line(), "heos://system/heart_beat");
        assert_eq!(connection.pending(Channel::Command), None);

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_command_rejected_without_write() {
        let (connection, mut device, _) = connected().await;

        let first = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send(Command::GetPlayers, Query::new()).await }
        });
        let request = device.command.read_request().await;
        assert_eq!(request.command, Command::GetPlayers);
        assert_eq!(connection.pending(Channel::Command), Some(Command::GetPlayers));

        let mut second = task::spawn(connection.send(Command::HeartBeat, Query::new()));
        let result = assert_ready!(second.poll());
        assert!(matches!(result, Err(ClientError::CommandPending(Channel::Command))));
        device.command.expect_silence(Duration::from_millis(100)).await;

        device
            .command
            .respond_with_payload(Command::GetPlayers, "", json!([]))
            .await;
        assert_eq!(first.await.unwrap().unwrap(), json!([]));

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_send_frees_slot() {
        let (connection, mut device, observer) = connected().await;

        {
            let mut send = task::spawn(connection.send(Command::GetPlayers, Query::new()));
            assert_pending!(send.poll());
            assert_eq!(connection.pending(Channel::Command), Some(Command::GetPlayers));
        }
        assert_eq!(connection.pending(Channel::Command), None);

        // The late response has nobody waiting for it.
        device.command.ack(Command::GetPlayers).await;
        wait_until(|| {
            observer.contains(&Observed::Unmatched(
                Channel::Command,
                "player/get_players".to_string(),
            ))
        })
        .await;

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_response_split_across_reads() {
        let (connection, mut device, _) = connected().await;

        let send = connection.send(Command::GetPlayers, Query::new());
        let (result, _) = tokio::join!(send, async {
            device.command.read_request().await;
            let mut data = serde_json::to_vec(&json!({
                "heos": {"command": "player/get_players", "result": "success", "message": ""},
                "payload": [{"name": "Kitchen", "pid": 1}]
            }))
            .unwrap();
            data.extend_from_slice(b"\r\n");
            let (head, tail) = data.split_at(20);
            device.command.write_raw(head).await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            device.command.write_raw(tail).await;
        });

        assert_eq!(result.unwrap()[0]["name"], "Kitchen");
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_device_error_response() {
        let (connection, mut device, _) = connected().await;

        let send = connection.send(Command::GetPlayerInfo, Query::new().with("pid", 9));
        let (result, _) = tokio::join!(send, async {
            device.command.read_request().await;
            device
                .command
                .fail(Command::GetPlayerInfo, "eid=2&text=ID Not Valid&pid=9")
                .await;
        });

        let err = result.unwrap_err();
        assert_eq!(err.device_error().map(|e| e.id), Some(2));
        assert!(connection.is_connected());
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversize_message_dropped() {
        let (connection, mut device, observer) =
            connected_with(|config| config.with_max_message_size(1024)).await;

        let send = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send(Command::GetPlayers, Query::new()).await }
        });
        device.command.read_request().await;

        let mut garbage = vec![b'x'; 2000];
        garbage.extend_from_slice(b"\r\n");
        device.command.write_raw(&garbage).await;
        wait_until(|| observer.contains(&Observed::Dropped(Channel::Command))).await;
        assert_eq!(connection.pending(Channel::Command), Some(Command::GetPlayers));
        assert!(connection.is_connected());

        device.command.respond(Command::GetPlayers, "").await;
        assert!(send.await.unwrap().is_ok());

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_processing_then_timeout() {
        let (connection, mut device, observer) = connected_with(|config| {
            config.with_processing_timeout(Some(Duration::from_millis(100)))
        })
        .await;

        let send = connection.send(Command::Browse, Query::new().with("sid", 1));
        let (result, _) = tokio::join!(send, async {
            device.command.read_request().await;
            device
                .command
                .respond(Command::Browse, "command under process&sid=1")
                .await;
        });

        assert!(matches!(result, Err(ClientError::Timeout)));
        assert!(observer.contains(&Observed::Processing(Channel::Command, Command::Browse)));
        assert_eq!(connection.pending(Channel::Command), None);

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_events_fan_out() {
        let (connection, mut device, _) = connected().await;

        let calls = Arc::new(Mutex::new(Vec::new()));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let first = listener({
            let calls = calls.clone();
            move |args: &[Value]| calls.lock().push(args.to_vec())
        });
        let second = listener({
            let second_calls = second_calls.clone();
            move |_: &[Value]| {
                second_calls.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(connection.subscribe(EventKind::PlayerVolumeChanged, first.clone()));
        assert!(!connection.subscribe(EventKind::PlayerVolumeChanged, first.clone()));
        assert!(connection.subscribe(EventKind::PlayerVolumeChanged, second));
        let mut events = connection.subscribe_events();

        let volume = |message: &str| {
            json!({"heos": {"command": "event/player_volume_changed", "message": message}})
        };
        let chunk = format!(
            "{}\r\n{}\r\n",
            volume("pid=1&level=20&mute=off"),
            volume("pid=1&level=25&mute=on"),
        );
        device.event.write_raw(chunk.as_bytes()).await;

        wait_until(|| second_calls.load(Ordering::SeqCst) == 2).await;
        assert_eq!(
            *calls.lock(),
            vec![
                vec![json!(1), json!(20), json!(false)],
                vec![json!(1), json!(25), json!(true)],
            ]
        );

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            HeosEvent::PlayerVolumeChanged {
                pid: 1,
                level: 20,
                mute: false
            }
        );

        assert!(connection.unsubscribe(EventKind::PlayerVolumeChanged, &first));
        assert!(!connection.unsubscribe(EventKind::PlayerVolumeChanged, &first));

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_on_command_channel_dispatched() {
        let (connection, mut device, _) = connected().await;

        let count = Arc::new(AtomicUsize::new(0));
        connection.subscribe(
            EventKind::PlayersChanged,
            listener({
                let count = count.clone();
                move |args: &[Value]| {
                    assert!(args.is_empty());
                    count.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        device
            .command
            .write_json(&json!({"heos": {"command": "event/players_changed"}}))
            .await;
        wait_until(|| count.load(Ordering::SeqCst) == 1).await;
        assert_eq!(connection.pending(Channel::Command), None);

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unmatched_and_unknown_reach_observer() {
        let (connection, mut device, observer) = connected().await;

        device
            .command
            .write_json(&response(Command::GetPlayers, "success", ""))
            .await;
        device
            .event
            .write_json(&json!({"heos": {"command": "event/unheard_of", "message": ""}}))
            .await;
        device.event.write_raw(b"not json\r\n").await;

        wait_until(|| {
            observer.contains(&Observed::Unmatched(
                Channel::Command,
                "player/get_players".to_string(),
            )) && observer.contains(&Observed::UnknownEvent("event/unheard_of".to_string()))
                && observer.contains(&Observed::Dropped(Channel::Event))
        })
        .await;
        assert!(connection.is_connected());

        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_device_eof_fails_pending() {
        let (connection, mut device, observer) = connected().await;

        let send = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send(Command::GetPlayers, Query::new()).await }
        });
        device.command.read_request().await;
        device.command.shutdown().await;

        assert!(matches!(send.await.unwrap(), Err(ClientError::ConnectionClosed)));
        wait_until(|| connection.status() == ConnectionStatus::Error).await;
        assert!(observer.contains(&Observed::Status(
            ConnectionStatus::Connected,
            ConnectionStatus::Error
        )));
        assert!(!connection.is_open(Channel::Command));
        assert!(!connection.is_open(Channel::Event));
        assert!(matches!(
            connection.send(Command::HeartBeat, Query::new()).await,
            Err(ClientError::NotReady(Channel::Command))
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (connection, _device, _) = connected().await;

        connection.close().await.unwrap();
        connection.close().await.unwrap();
        assert_eq!(connection.status(), ConnectionStatus::Closed);
        assert!(matches!(
            connection.connect().await,
            Err(ClientError::InvalidState(ConnectionStatus::Closed))
        ));
    }

    #[tokio::test]
    async fn test_close_fails_pending() {
        let (connection, mut device, _) = connected().await;

        let send = tokio::spawn({
            let connection = connection.clone();
            async move { connection.send(Command::GetPlayers, Query::new()).await }
        });
        device.command.read_request().await;
        connection.close().await.unwrap();

        assert!(matches!(send.await.unwrap(), Err(ClientError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let endpoint = FakeDevice::bind().await.endpoint();
        let observer = Arc::new(RecordingObserver::default());
        let config = ConnectionConfig::new(endpoint);
        let connection = Connection::with_observer(config, observer.clone());

        assert!(matches!(connection.connect().await, Err(ClientError::Io(_))));
        assert_eq!(connection.status(), ConnectionStatus::Error);
        assert_eq!(
            observer.statuses(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Error]
        );
    }

    #[tokio::test]
    async fn test_multi_line_response_resolves() {
        let (connection, mut device, _) = connected().await;

        let send = connection.send(Command::GetPlayers, Query::new());
        let (result, _) = tokio::join!(send, async {
            device.command.read_request().await;
            let pretty = serde_json::to_string_pretty(&json!({
                "heos": {"command": "player/get_players", "result": "success", "message": ""},
                "payload": [{"name": "Kitchen", "pid": 1}]
            }))
            .unwrap()
            .replace('\n', "\r\n");
            device.command.write_raw(format!("{}\r\n", pretty).as_bytes()).await;
        });

        assert_eq!(result.unwrap()[0]["name"], "Kitchen");
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_channel_failure_closes_both() {
        let device = FakeDevice::bind().await;
        let observer = Arc::new(RecordingObserver::default());
        let connection = Connection::with_observer(device.config(), observer.clone());

        // The device takes the command channel and stops listening. The event
        // channel is then either refused or reset right after the handshake.
        let (result, _command) =
            tokio::join!(connection.connect(), device.accept_one_and_stop());
        assert!(matches!(result, Ok(()) | Err(ClientError::Io(_))));

        wait_until(|| connection.status() == ConnectionStatus::Error).await;
        assert_eq!(observer.statuses().first(), Some(&ConnectionStatus::Connecting));
        assert_eq!(observer.statuses().last(), Some(&ConnectionStatus::Error));
        assert!(!connection.is_open(Channel::Command));
        assert!(!connection.is_open(Channel::Event));
        assert!(matches!(
            connection.send(Command::HeartBeat, Query::new()).await,
            Err(ClientError::NotReady(Channel::Command))
        ));
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let addr = listener.local_addr().unwrap();

        // Nothing is accepted; once a connect hangs the queue is full.
        let mut queued = Vec::new();
        let mut full = false;
        for _ in 0..16 {
            let connect = TcpStream::connect(addr);
            match tokio::time::timeout(Duration::from_millis(100), connect).await {
                Ok(stream) => queued.push(stream.unwrap()),
                Err(_) => {
                    full = true;
                    break;
                }
            }
        }
        if !full {
            // This network stack completes every handshake.
            return;
        }

        let observer = Arc::new(RecordingObserver::default());
        let config = ConnectionConfig::new(Endpoint::from(addr))
            .with_connect_timeout(Duration::from_millis(100));
        let connection = Connection::with_observer(config, observer.clone());

        assert!(matches!(connection.connect().await, Err(ClientError::Timeout)));
        assert_eq!(connection.status(), ConnectionStatus::Timeout);
        assert_eq!(
            observer.statuses(),
            vec![ConnectionStatus::Connecting, ConnectionStatus::Timeout]
        );
        assert!(!connection.is_open(Channel::Command));
        assert!(!connection.is_open(Channel::Event));
        drop(listener);
    }

    #[tokio::test]
    async fn test_dropping_last_handle_closes_channels() {
        let (connection, mut device, _) = connected().await;
        let clone = connection.clone();

        drop(connection);
        device.command.expect_silence(Duration::from_millis(50)).await;

        drop(clone);
        device.command.expect_closed().await;
        device.event.expect_closed().await;
    }
}
