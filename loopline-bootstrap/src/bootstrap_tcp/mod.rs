use super::*;
use bytes::BytesMut;
use log::{error, trace, warn};
use loopline::{Channel, ChannelCommand, TransportContext};
use loopline_codec::StringCodec;
use loopline_executor::EventLoop;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{ReadHalf, WriteHalf},
        TcpStream,
    },
    sync::mpsc,
};

pub(crate) mod bootstrap_tcp_client;
pub(crate) mod bootstrap_tcp_server;

/// Creates the channel and pipeline of `stream` and spawns its driver task.
///
/// Must be called from `event_loop`'s own thread, which the stream is registered with.
pub(crate) fn serve(
    stream: TcpStream,
    event_loop: &EventLoop,
    bootstrap: &Bootstrap,
) -> Result<Channel, Error> {
    stream.set_nodelay(true)?;
    let transport = TransportContext {
        local_addr: stream.local_addr()?,
        peer_addr: stream.peer_addr()?,
    };

    let (channel, commands) = Channel::new(transport, event_loop.clone());
    let pipeline = Pipeline::new();
    bootstrap.initialize(&pipeline);
    trace!(
        "channel {} -> {} pinned to {} with {:?}",
        transport.local_addr,
        transport.peer_addr,
        event_loop.name(),
        pipeline.names()
    );

    let driver = Driver {
        event_loop: event_loop.clone(),
        channel: channel.clone(),
        pipeline,
        framing: bootstrap.framing,
        read_buffer_size: bootstrap.read_buffer_size,
    };
    event_loop.spawn_local(async move {
        if let Err(err) = driver.process_pipeline(stream, commands).await {
            if err.kind() == ErrorKind::InvalidData {
                warn!("dropping connection {}: {}", transport.peer_addr, err);
            } else {
                error!("process_pipeline got error: {}", err);
            }
        }
    });

    Ok(channel)
}

struct Driver {
    event_loop: EventLoop,
    channel: Channel,
    pipeline: Pipeline,
    framing: Framing,
    read_buffer_size: usize,
}

impl Driver {
    async fn process_pipeline(
        &self,
        mut stream: TcpStream,
        mut commands: mpsc::UnboundedReceiver<ChannelCommand>,
    ) -> Result<(), Error> {
        self.pipeline.transport_active(&self.channel).await;

        // reads and writes are polled by this one task: an inline handler that blocks
        // stalls both, an offloaded one only suspends its own event.
        // prioritize queued writes over stream reads
        let (mut reader, mut writer) = stream.split();
        let result = tokio::select! {
            biased;
            res = self.write_loop(&mut writer, &mut commands) => res,
            res = self.read_loop(&mut reader) => res,
            _ = self.event_loop.closed() => {
                trace!("pipeline stream exit loop");
                Ok(())
            }
        };

        // later writes through the channel handle fail with NotConnected
        commands.close();
        self.pipeline.transport_inactive(&self.channel).await;

        trace!(
            "tcp connection on {} is gracefully down",
            self.channel.peer_addr()
        );
        result
    }

    async fn read_loop(&self, reader: &mut ReadHalf<'_>) -> Result<(), Error> {
        let mut decoder = self.framing.decoder();
        let mut buf = BytesMut::with_capacity(self.read_buffer_size);

        loop {
            buf.reserve(self.read_buffer_size);
            let n = reader.read_buf(&mut buf).await?;
            if n == 0 {
                trace!("peer {} closed the stream", self.channel.peer_addr());
                return Ok(());
            }
            trace!("stream read {} bytes", n);

            while let Some(frame) = decoder.decode(&mut buf)? {
                let msg = StringCodec::decode(frame)?;
                self.pipeline.handle_read(&self.channel, msg).await;
            }
        }
    }

    async fn write_loop(
        &self,
        writer: &mut WriteHalf<'_>,
        commands: &mut mpsc::UnboundedReceiver<ChannelCommand>,
    ) -> Result<(), Error> {
        let mut encoder = self.framing.encoder();
        let mut buf = BytesMut::new();

        while let Some(command) = commands.recv().await {
            match command {
                ChannelCommand::Write(msg) => {
                    let Some(msg) = self.pipeline.handle_write(&self.channel, msg).await else {
                        continue;
                    };
                    if let Err(err) = encoder.encode(StringCodec::encode(&msg), &mut buf) {
                        warn!("dropping write to {}: {}", self.channel.peer_addr(), err);
                        continue;
                    }
                    let n = buf.len();
                    writer.write_all_buf(&mut buf).await?;
                    trace!("stream write {} bytes", n);
                }
                ChannelCommand::AddBack(entry) => {
                    trace!("{} appended to {:?}", entry.name(), self.pipeline.names());
                    self.pipeline.add_entry(entry);
                }
                ChannelCommand::Close => {
                    trace!("closing channel to {}", self.channel.peer_addr());
                    writer.shutdown().await?;
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
