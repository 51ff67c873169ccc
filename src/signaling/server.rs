use crate::errors::VideoChatError;
use crate::signaling::hub::{SignalingHub, SocketId};
use crate::signaling::protocol::MAX_FRAME_LEN;
use futures::StreamExt;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

/// TCP front end for a `SignalingHub`
pub struct SignalingServer {
    hub: SignalingHub,
    listener: TcpListener,
}

impl SignalingServer {
    pub async fn bind(addr: &str, hub: SignalingHub) -> Result<Self, VideoChatError> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            VideoChatError::SignalingError(format!("Failed to bind {}: {}", addr, e))
        })?;
        Ok(Self { hub, listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, VideoChatError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &SignalingHub {
        &self.hub
    }

    /// Accept connections until the task is dropped or accepting fails
    pub async fn run(self) -> Result<(), VideoChatError> {
        log::info!(
            "Signaling server listening on {} (room capacity {})",
            self.listener.local_addr()?,
            self.hub.capacity()
        );
        loop {
            let (stream, remote) = self.listener.accept().await?;
            let hub = self.hub.clone();
            tokio::spawn(async move {
                serve_connection(hub, stream, remote).await;
            });
        }
    }
}

async fn serve_connection(hub: SignalingHub, stream: TcpStream, remote: SocketAddr) {
    let (socket, mut outbound) = hub.register().await;
    log::info!("Socket {} connected from {}", socket, remote);

    let (read_half, mut write_half) = stream.into_split();
    let writer = tokio::spawn(async move {
        while let Some(mut frame) = outbound.recv().await {
            frame.push('\n');
            if let Err(e) = write_half.write_all(frame.as_bytes()).await {
                log::debug!("Write to socket {} failed: {}", socket, e);
                break;
            }
        }
    });

    read_frames(&hub, socket, read_half).await;

    hub.disconnect(socket).await;
    // the hub dropped the sender, so the writer drains and exits
    if let Err(e) = writer.await {
        log::debug!("Writer for socket {} ended abnormally: {}", socket, e);
    }
    log::info!("Socket {} from {} closed", socket, remote);
}

async fn read_frames(hub: &SignalingHub, socket: SocketId, read_half: tokio::net::tcp::OwnedReadHalf) {
    let mut frames = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_FRAME_LEN));
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                if let Err(e) = hub.handle_frame(socket, &line).await {
                    log::warn!("Socket {} sent a bad frame: {}", socket, e);
                }
            }
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                log::warn!(
                    "Socket {} sent a frame over {} bytes, dropping it",
                    socket,
                    MAX_FRAME_LEN
                );
                break;
            }
            Err(LinesCodecError::Io(e)) => {
                log::debug!("Read from socket {} failed: {}", socket, e);
                break;
            }
        }
    }
}
