//! Websocket Port
//!
//! Implements a `RawPort` over a blocking tungstenite websocket. The service
//! listens on localhost with a self-signed certificate, so certificate and
//! hostname validation are disabled for `wss`. Reads use a socket timeout so
//! the owning thread regains control every poll interval to send requests.

use super::{RawPort, RecvError, SendError, TransportError, DEFAULT_SERVICE_PORT};
use native_tls::TlsConnector;
use std::io;
use std::net::TcpStream;
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Connector, Message, WebSocket};
use url::Url;

pub struct Port {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl Port {
    pub fn connect(url: &Url, poll_interval: Duration) -> Result<Port, TransportError> {
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidUrl(url.to_string()))?;
        let port = url.port().unwrap_or(DEFAULT_SERVICE_PORT);
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;

        let connector = if url.scheme() == "wss" {
            Connector::NativeTls(
                TlsConnector::builder()
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true)
                    .build()?,
            )
        } else {
            Connector::Plain
        };

        let (socket, _response) =
            tungstenite::client_tls_with_config(url.as_str(), stream, None, Some(connector))
                .map_err(|e| TransportError::Handshake(e.to_string()))?;

        // Only after the handshake: the handshake itself must not time out
        // half way through.
        match socket.get_ref() {
            MaybeTlsStream::Plain(s) => s.set_read_timeout(Some(poll_interval))?,
            MaybeTlsStream::NativeTls(s) => s.get_ref().set_read_timeout(Some(poll_interval))?,
            _ => {}
        }
        tracing::debug!(%url, "websocket open");
        Ok(Port { socket })
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

impl RawPort for Port {
    fn recv(&mut self) -> Result<String, RecvError> {
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(text),
            Ok(Message::Binary(data)) => {
                String::from_utf8(data).map_err(|e| RecvError::Socket(e.to_string()))
            }
            // Pings are answered by tungstenite on the next read or write.
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                Err(RecvError::NotReady)
            }
            Ok(Message::Close(_)) => Err(RecvError::Disconnected),
            Err(tungstenite::Error::Io(e)) if is_timeout(&e) => Err(RecvError::NotReady),
            Err(tungstenite::Error::Io(e)) => Err(RecvError::IO(e)),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Err(RecvError::Disconnected)
            }
            Err(e) => Err(RecvError::Socket(e.to_string())),
        }
    }

    fn send(&mut self, text: &str) -> Result<(), SendError> {
        match self.socket.send(Message::Text(text.to_string())) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::Io(e)) => Err(SendError::IO(e)),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Err(SendError::Disconnected)
            }
            Err(e) => Err(SendError::Socket(e.to_string())),
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.socket.close(None) {
            tracing::debug!("websocket close: {}", e);
        }
        // Push the close frame out; errors here only mean the peer is gone.
        let _ = self.socket.flush();
    }
}
