//! In-process fake device for tests.

use crate::connection::{Channel, Connection, ConnectionConfig, ConnectionStatus, Endpoint};
use crate::observer::Observer;
use heos_protocol::{Command, Message, ProtocolError, Request};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// Listens on loopback and plays the device side of both channels.
pub(crate) struct FakeDevice {
    listener: TcpListener,
}

impl FakeDevice {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self { listener }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.listener.local_addr().unwrap().into()
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.endpoint()).with_connect_timeout(Duration::from_secs(2))
    }

    /// Connects `connection` and returns the device ends of both channels.
    pub async fn accept(&self, connection: &Connection) -> DeviceSide {
        let (connected, accepted) = tokio::join!(connection.connect(), async {
            let (command, _) = self.listener.accept().await.unwrap();
            let (event, _) = self.listener.accept().await.unwrap();
            (command, event)
        });
        connected.unwrap();
        assert_eq!(connection.status(), ConnectionStatus::Connected);

        let (command, event) = accepted;
        DeviceSide {
            command: DeviceChannel::new(command.into_split()),
            event: DeviceChannel::new(event.into_split()),
        }
    }

    /// Accepts one channel, then stops listening.
    pub async fn accept_one_and_stop(self) -> TcpStream {
        let (stream, _) = self.listener.accept().await.unwrap();
        stream
    }
}

/// Starts a fake device and a connection to it.
pub(crate) async fn connected() -> (Connection, DeviceSide, Arc<RecordingObserver>) {
    connected_with(|config| config).await
}

pub(crate) async fn connected_with(
    configure: impl FnOnce(ConnectionConfig) -> ConnectionConfig,
) -> (Connection, DeviceSide, Arc<RecordingObserver>) {
    let device = FakeDevice::bind().await;
    let observer = Arc::new(RecordingObserver::default());
    let connection = Connection::with_observer(configure(device.config()), observer.clone());
    let side = device.accept(&connection).await;
    (connection, side, observer)
}

pub(crate) struct DeviceSide {
    pub command: DeviceChannel,
    pub event: DeviceChannel,
}

pub(crate) struct DeviceChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl DeviceChannel {
    fn new((reader, writer): (OwnedReadHalf, OwnedWriteHalf)) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Reads one request line.
    pub async fn read_request(&mut self) -> Request {
        let mut line = String::new();
        let n = tokio::time::timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("no request within 5s")
            .unwrap();
        assert!(n > 0, "channel closed");
        Request::parse(&line).unwrap()
    }

    /// Asserts that no request arrives within `within`.
    pub async fn expect_silence(&mut self, within: Duration) {
        let mut line = String::new();
        let result = tokio::time::timeout(within, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "unexpected request: {:?}", line);
    }

    /// Asserts that the client closes the channel.
    pub async fn expect_closed(&mut self) {
        let mut line = String::new();
        let read = tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut line))
            .await
            .expect("channel still open after 2s");
        assert!(matches!(read, Ok(0) | Err(_)), "unexpected data: {:?}", line);
    }

    pub async fn write_raw(&mut self, data: &[u8]) {
        self.writer.write_all(data).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn write_json(&mut self, value: &Value) {
        let mut data = serde_json::to_vec(value).unwrap();
        data.extend_from_slice(b"\r\n");
        self.write_raw(&data).await;
    }

    pub async fn respond(&mut self, command: Command, message: &str) {
        self.write_json(&response(command, "success", message)).await;
    }

    pub async fn respond_with_payload(&mut self, command: Command, message: &str, payload: Value) {
        let mut value = response(command, "success", message);
        value["payload"] = payload;
        self.write_json(&value).await;
    }

    pub async fn fail(&mut self, command: Command, message: &str) {
        self.write_json(&response(command, "fail", message)).await;
    }

    /// Reads the next request, asserts its command and echoes its query as a success.
    pub async fn ack(&mut self, expected: Command) -> Request {
        let request = self.read_request().await;
        assert_eq!(request.command, expected);
        self.respond(expected, &request.query.to_string()).await;
        request
    }

    pub async fn shutdown(mut self) {
        let _ = self.writer.shutdown().await;
    }
}

pub(crate) fn response(command: Command, result: &str, message: &str) -> Value {
    json!({"heos": {"command": command.as_str(), "result": result, "message": message}})
}

/// Polls `condition` until it holds or two seconds pass.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Observed {
    Status(ConnectionStatus, ConnectionStatus),
    Dropped(Channel),
    Unmatched(Channel, String),
    Processing(Channel, Command),
    UnknownEvent(String),
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub seen: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn contains(&self, observed: &Observed) -> bool {
        self.seen.lock().contains(observed)
    }

    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        self.seen
            .lock()
            .iter()
            .filter_map(|o| match o {
                Observed::Status(_, to) => Some(*to),
                _ => None,
            })
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn status_changed(&self, from: ConnectionStatus, to: ConnectionStatus) {
        self.seen.lock().push(Observed::Status(from, to));
    }

    fn message_dropped(&self, channel: Channel, _error: &ProtocolError) {
        self.seen.lock().push(Observed::Dropped(channel));
    }

    fn unmatched_response(&self, channel: Channel, message: &Message) {
        self.seen
            .lock()
            .push(Observed::Unmatched(channel, message.command().to_string()));
    }

    fn command_processing(&self, channel: Channel, command: Command) {
        self.seen.lock().push(Observed::Processing(channel, command));
    }

    fn unknown_event(&self, message: &Message) {
        self.seen
            .lock()
            .push(Observed::UnknownEvent(message.command().to_string()));
    }
}
