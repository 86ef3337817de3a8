use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::{self, Frame};

/// A client connection: any bidirectional byte stream, framed with [`FrameCodec`].
pub struct Connection<S> {
    pub id: Uuid,
    // Data is read from the stream into the framed read buffer. When a frame is parsed, the
    // corresponding bytes are removed from the buffer.
    frames: Framed<S, FrameCodec>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Connection<S> {
        Self::with_codec(stream, FrameCodec::default())
    }

    pub fn with_codec(stream: S, codec: FrameCodec) -> Connection<S> {
        Connection {
            id: Uuid::new_v4(),
            frames: Framed::new(stream, codec),
        }
    }

    /// Waits for the next frame. `Ok(None)` means the peer closed the stream cleanly, between
    /// frames.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, frame::Error> {
        self.frames.next().await.transpose()
    }

    /// Encodes `frame` and flushes it to the stream.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), frame::Error> {
        self.frames.send(frame).await
    }
}
