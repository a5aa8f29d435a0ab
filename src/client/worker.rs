use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{PgWireError, Result};
use crate::protocol::framing::MessageDecoder;

use super::session::{ConnectionState, PendingQuery, Session};

pub(crate) enum Command {
    Query(PendingQuery),
    Close,
}

/// Owns everything mutable about one connection: the session state, the
/// decode buffer and the command receiver. Runs on its own task, so message
/// handling for a connection is never concurrent.
pub(crate) struct WorkerState {
    session: Session,
    decoder: MessageDecoder,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl WorkerState {
    pub(crate) fn new(session: Session, commands: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            session,
            decoder: MessageDecoder::new(),
            commands,
        }
    }

    pub(crate) fn begin_connect(&mut self) {
        self.session.begin_connect();
    }

    /// Fail everything still waiting on this connection.
    pub(crate) fn abort(&mut self, err: PgWireError) {
        self.session.fail(err);
    }

    pub(crate) async fn run_on_stream<S: AsyncRead + AsyncWrite + Unpin>(
        &mut self,
        stream: &mut S,
    ) -> Result<()> {
        self.session.start();
        let res = self.pump(stream).await;
        if let Err(e) = &res {
            self.session.fail(e.clone());
        }
        res
    }

    async fn pump<S: AsyncRead + AsyncWrite + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        loop {
            self.flush(stream).await?;
            if self.session.state() == ConnectionState::Closed {
                return Ok(());
            }

            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Query(query)) => self.session.submit(query),
                    Some(Command::Close) | None => {
                        self.session.close();
                        self.flush(stream).await?;
                        let _ = stream.shutdown().await;
                        return Ok(());
                    }
                },
                read = stream.read_buf(self.decoder.buffer_mut()) => {
                    if read? == 0 {
                        return Err(PgWireError::Closed);
                    }
                    while let Some(msg) = self.decoder.next_message()? {
                        self.session.handle_message(msg)?;
                    }
                }
            }
        }
    }

    async fn flush<S: AsyncWrite + Unpin>(&mut self, stream: &mut S) -> Result<()> {
        let outgoing = self.session.take_outgoing();
        if outgoing.is_empty() {
            return Ok(());
        }
        for frame in &outgoing {
            stream.write_all(frame).await?;
        }
        stream.flush().await?;
        Ok(())
    }
}
