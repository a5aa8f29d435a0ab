use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::error::{PgWireError, Result};
use crate::protocol::framing::encode_query;
use crate::result::ResultSet;
use crate::types::{BuiltinTypes, TypeLookup};

use super::session::{PendingQuery, ServerInfo, Session};
use super::worker::{Command, WorkerState};

pub struct Connection {
    commands: mpsc::UnboundedSender<Command>,
    info_rx: watch::Receiver<ServerInfo>,
    join: JoinHandle<()>,
}

impl Connection {
    /// Dial `cfg.host:cfg.port`, authenticate, and wait for the first ReadyForQuery.
    pub async fn connect(cfg: ConnectionConfig) -> Result<Self> {
        Self::connect_with_types(cfg, Arc::new(BuiltinTypes)).await
    }

    /// Like [`Connection::connect`], resolving column type names through `lookup`.
    pub async fn connect_with_types(
        cfg: ConnectionConfig,
        lookup: Arc<dyn TypeLookup>,
    ) -> Result<Self> {
        let (mut worker, handles) = worker_parts(cfg.clone(), lookup);

        let join = tokio::spawn(async move {
            let res = run_worker(&mut worker, &cfg).await;
            if let Err(e) = res {
                tracing::error!("connection worker terminated with error: {e}");
            }
        });

        handles.wait_ready(join).await
    }

    /// Run the protocol over an already established stream (TCP, Unix socket, in-memory pipe).
    pub async fn connect_on<S>(
        stream: S,
        cfg: ConnectionConfig,
        lookup: Arc<dyn TypeLookup>,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut worker, handles) = worker_parts(cfg, lookup);

        let join = tokio::spawn(async move {
            let mut stream = stream;
            worker.begin_connect();
            if let Err(e) = worker.run_on_stream(&mut stream).await {
                tracing::error!("connection worker terminated with error: {e}");
            }
        });

        handles.wait_ready(join).await
    }

    /// Run one Simple Query and wait for its result.
    ///
    /// Queries are sent one at a time in submission order; a query issued while
    /// another is in flight waits in the pipeline until the server is ready.
    pub async fn query(&self, sql: &str) -> Result<ResultSet> {
        self.send_query(sql)?.await
    }

    /// Enqueue a query now and return a future for its result.
    ///
    /// The position in the pipeline is fixed at the time of this call, not when
    /// the returned future is first polled.
    pub fn send_query(&self, sql: &str) -> Result<QueryResponse> {
        if sql.as_bytes().contains(&0) {
            return Err(PgWireError::Protocol(
                "query text must not contain NUL bytes".into(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        let pending = PendingQuery {
            encoded: encode_query(sql),
            responder: tx,
        };
        self.commands
            .send(Command::Query(pending))
            .map_err(|_| PgWireError::Closed)?;
        Ok(QueryResponse { rx })
    }

    /// Snapshot of the startup parameters and backend key reported by the server.
    pub fn server_info(&self) -> ServerInfo {
        self.info_rx.borrow().clone()
    }

    /// `true` once the worker has stopped (closed, server hung up, or fatal error).
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Send Terminate and close the socket.
    ///
    /// Queries that have not completed yet resolve with [`PgWireError::Closed`].
    pub async fn close(self) -> Result<()> {
        let _ = self.commands.send(Command::Close);
        self.join
            .await
            .map_err(|e| PgWireError::Task(format!("join error: {e}")))?;
        Ok(())
    }
}

/// Result of a query submitted with [`Connection::send_query`].
#[must_use = "futures do nothing unless polled"]
pub struct QueryResponse {
    rx: oneshot::Receiver<Result<ResultSet>>,
}

impl Future for QueryResponse {
    type Output = Result<ResultSet>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // a dropped sender means the worker went away without answering
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or_else(|_| Err(PgWireError::Closed)))
    }
}

struct Handles {
    commands: mpsc::UnboundedSender<Command>,
    info_rx: watch::Receiver<ServerInfo>,
    ready_rx: oneshot::Receiver<Result<()>>,
}

impl Handles {
    async fn wait_ready(self, join: JoinHandle<()>) -> Result<Connection> {
        match self.ready_rx.await {
            Ok(Ok(())) => Ok(Connection {
                commands: self.commands,
                info_rx: self.info_rx,
                join,
            }),
            Ok(Err(e)) => {
                let _ = join.await;
                Err(e)
            }
            Err(_) => Err(PgWireError::Task(
                "connection worker exited before the connection was ready".into(),
            )),
        }
    }
}

fn worker_parts(cfg: ConnectionConfig, lookup: Arc<dyn TypeLookup>) -> (WorkerState, Handles) {
    let (commands, commands_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = oneshot::channel();
    let (info_tx, info_rx) = watch::channel(ServerInfo::default());

    let session = Session::new(cfg, lookup, ready_tx, info_tx);
    let worker = WorkerState::new(session, commands_rx);
    (
        worker,
        Handles {
            commands,
            info_rx,
            ready_rx,
        },
    )
}

async fn run_worker(worker: &mut WorkerState, cfg: &ConnectionConfig) -> Result<()> {
    worker.begin_connect();
    let mut tcp = match dial(cfg).await {
        Ok(tcp) => tcp,
        Err(e) => {
            worker.abort(e.clone());
            return Err(e);
        }
    };
    worker.run_on_stream(&mut tcp).await
}

async fn dial(cfg: &ConnectionConfig) -> Result<TcpStream> {
    let tcp = TcpStream::connect((cfg.host.as_str(), cfg.port)).await?;
    tcp.set_nodelay(true)?;
    Ok(tcp)
}
