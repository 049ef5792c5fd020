//! OCPP-J WebSocket transport
//!
//! The station connects to `ws://<host><path>/<station id>` and negotiates
//! the OCPP subprotocol. Every OCPP-J message travels in one text frame.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::common::config::{CsmsConfig, Timing};
use crate::common::{Error, Result};

use super::Transport;

/// Compose the station endpoint URL
///
/// `host` may carry its own scheme (`wss://csms.example.org` connects over
/// TLS with the webpki roots); plain `host:port` values get `ws://`.
pub fn station_url(csms: &CsmsConfig, station_id: &str) -> Result<Url> {
    let base = if csms.host.contains("://") {
        csms.host.clone()
    } else {
        format!("ws://{}", csms.host)
    };

    let mut url = Url::parse(&base).map_err(|e| Error::InvalidUrl(format!("{}: {}", base, e)))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{} cannot carry a path", base)))?;
        segments.clear();
        for segment in csms.path.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
        segments.push(station_id);
    }

    Ok(url)
}

/// WebSocket connection to a CSMS
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    url: Url,
    reply_timeout: Option<Duration>,
    close_grace: Duration,
    closed: bool,
}

impl WebSocketTransport {
    /// Open the connection and negotiate the OCPP subprotocol
    pub async fn connect(csms: &CsmsConfig, station_id: &str, timing: &Timing) -> Result<Self> {
        let url = station_url(csms, station_id)?;
        tracing::info!("Connecting to {}", url);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::connection_failed(url.as_str(), e))?;
        let protocol = HeaderValue::from_str(&csms.subprotocol)
            .map_err(|_| Error::Config(format!("Invalid subprotocol '{}'", csms.subprotocol)))?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", protocol);

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| Error::connection_failed(url.as_str(), e))?;

        match response.headers().get("Sec-WebSocket-Protocol") {
            Some(accepted) => tracing::debug!("CSMS accepted subprotocol {:?}", accepted),
            None => tracing::warn!("CSMS did not confirm subprotocol {}", csms.subprotocol),
        }

        Ok(Self {
            stream,
            url,
            reply_timeout: timing.reply_timeout(),
            close_grace: timing.close_grace(),
            closed: false,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Read frames until one carries data
    async fn next_frame(&mut self) -> Result<Vec<u8>> {
        loop {
            let message = match self.stream.next().await {
                Some(message) => message?,
                None => {
                    self.closed = true;
                    return Err(Error::ConnectionClosed);
                }
            };

            match message {
                Message::Text(text) => return Ok(text.into_bytes()),
                Message::Binary(data) => return Ok(data),
                Message::Close(frame) => {
                    tracing::info!("CSMS closed the connection: {:?}", frame);
                    self.closed = true;
                    return Err(Error::ConnectionClosed);
                }
                // Pings are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }

        let message = match std::str::from_utf8(payload) {
            Ok(text) => Message::Text(text.to_string()),
            Err(_) => Message::Binary(payload.to_vec()),
        };
        tracing::debug!(">>> {}", String::from_utf8_lossy(payload));

        self.stream.send(message).await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }

        let frame = match self.reply_timeout {
            Some(limit) => tokio::time::timeout(limit, self.next_frame())
                .await
                .map_err(|_| Error::Timeout(limit.as_secs()))??,
            None => self.next_frame().await?,
        };

        tracing::debug!("<<< {}", String::from_utf8_lossy(&frame));
        Ok(frame)
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.stream
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }))
            .await?;

        // Wait for the CSMS to answer the close frame, but not forever
        let stream = &mut self.stream;
        let acknowledged = tokio::time::timeout(self.close_grace, async {
            while let Some(Ok(message)) = stream.next().await {
                if message.is_close() {
                    break;
                }
            }
        })
        .await;

        if acknowledged.is_err() {
            tracing::warn!(
                "CSMS did not acknowledge close within {:?}",
                self.close_grace
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csms(host: &str, path: &str) -> CsmsConfig {
        CsmsConfig {
            host: host.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_station_url_default() {
        let url = station_url(&CsmsConfig::default(), "CS001").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3000/ocpp/CS001");
    }

    #[test]
    fn test_station_url_normalizes_slashes() {
        let url = station_url(&csms("127.0.0.1:9000", "steve/websocket/"), "CS-7").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9000/steve/websocket/CS-7");
    }

    #[test]
    fn test_station_url_keeps_explicit_scheme() {
        let url = station_url(&csms("wss://csms.example.org", "/ocpp"), "CS001").unwrap();
        assert_eq!(url.as_str(), "wss://csms.example.org/ocpp/CS001");
    }

    #[test]
    fn test_station_url_escapes_station_id() {
        let url = station_url(&CsmsConfig::default(), "CS 001").unwrap();
        assert_eq!(url.path(), "/ocpp/CS%20001");
    }

    #[test]
    fn test_station_url_rejects_garbage_host() {
        assert!(matches!(
            station_url(&csms("http://[::1", "/ocpp"), "CS001"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
