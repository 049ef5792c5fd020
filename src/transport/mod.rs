//! Message transport between the station and the CSMS
//!
//! The scenario runner only needs to push one opaque frame and pull the
//! next one. Framing, URL composition and the close handshake live behind
//! the [`Transport`] trait.

pub mod websocket;

use async_trait::async_trait;

use crate::common::Result;

pub use websocket::WebSocketTransport;

/// A bidirectional, ordered message channel
#[async_trait]
pub trait Transport: Send {
    /// Send one complete frame
    async fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Wait for the next complete frame
    async fn receive(&mut self) -> Result<Vec<u8>>;

    /// Close the channel, waiting a bounded time for the peer to acknowledge
    async fn close(&mut self) -> Result<()>;
}
