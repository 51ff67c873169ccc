use crate::errors::VideoChatError;
use crate::signaling::client::SignalingTransport;
use crate::signaling::protocol::{ClientMessage, ServerEvent, MAX_FRAME_LEN};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// Signaling over TCP, one JSON frame per line
pub struct TcpSignalingClient {
    peer_addr: String,
    writer: Mutex<OwnedWriteHalf>,
    frames: Mutex<FramedRead<OwnedReadHalf, LinesCodec>>,
    closed: AtomicBool,
}

impl TcpSignalingClient {
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, VideoChatError> {
        log::info!("Connecting to signaling server {}", addr);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                VideoChatError::SignalingError(format!("Timed out connecting to {}", addr))
            })?
            .map_err(|e| {
                VideoChatError::SignalingError(format!("Failed to connect to {}: {}", addr, e))
            })?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            peer_addr: addr.to_string(),
            writer: Mutex::new(write_half),
            frames: Mutex::new(FramedRead::new(
                read_half,
                LinesCodec::new_with_max_length(MAX_FRAME_LEN),
            )),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl SignalingTransport for TcpSignalingClient {
    async fn emit(&self, message: ClientMessage) -> Result<(), VideoChatError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(VideoChatError::SignalingError(
                "Signaling connection is closed".to_string(),
            ));
        }
        let mut frame = message.encode();
        frame.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<ServerEvent> {
        let mut frames = self.frames.lock().await;
        loop {
            match frames.next().await? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => match ServerEvent::decode(&line) {
                    Ok(event) => return Some(event),
                    Err(e) => log::warn!("Dropping frame from {}: {}", self.peer_addr, e),
                },
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    log::error!(
                        "{} sent a frame over {} bytes, giving up on the connection",
                        self.peer_addr,
                        MAX_FRAME_LEN
                    );
                    return None;
                }
                Err(LinesCodecError::Io(e)) => {
                    if !self.closed.load(Ordering::SeqCst) {
                        log::error!("Signaling read from {} failed: {}", self.peer_addr, e);
                    }
                    return None;
                }
            }
        }
    }

    async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Disconnecting from signaling server {}", self.peer_addr);
        if let Err(e) = self.writer.lock().await.shutdown().await {
            log::debug!("Shutdown of {} failed: {}", self.peer_addr, e);
        }
    }
}
