use anyhow::Context;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::protocol::envelope::Frames;

pub type FrameReader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;
pub type FrameWriter = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

/// Wraps a stream into independently usable read and write halves.
pub fn split(stream: TcpStream) -> (FrameReader, FrameWriter) {
    let (read, write) = stream.into_split();
    (
        FramedRead::new(read, LengthDelimitedCodec::new()),
        FramedWrite::new(write, LengthDelimitedCodec::new()),
    )
}

pub async fn write_frames(writer: &mut FrameWriter, frames: &Frames) -> anyhow::Result<()> {
    let encoded = bincode::serialize(frames).context("encoding frames")?;
    writer
        .send(Bytes::from(encoded))
        .await
        .context("sending frames")?;
    Ok(())
}

/// Reads the next multipart message, `None` on a cleanly closed connection.
pub async fn read_frames(reader: &mut FrameReader) -> Option<anyhow::Result<Frames>> {
    let message = reader.next().await?;
    Some(
        message
            .map_err(anyhow::Error::from)
            .and_then(|bytes| bincode::deserialize(&bytes).map_err(anyhow::Error::from)),
    )
}
