use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::auth::{AuthHandshake, AuthStep};
use crate::config::ConnectionConfig;
use crate::error::{PgWireError, Result};
use crate::protocol::framing::{
    BackendMessage, PROTOCOL_VERSION, encode_copy_fail, encode_startup, encode_terminate,
};
use crate::protocol::messages::{
    ErrorFields, TransactionStatus, parse_backend_key_data, parse_parameter_status,
    parse_ready_for_query,
};
use crate::result::{ResultAssembler, ResultSet};
use crate::types::TypeLookup;

pub(crate) type Responder = oneshot::Sender<Result<ResultSet>>;

/// A submitted query: its encoded 'Q' frame and where its result goes.
pub(crate) struct PendingQuery {
    pub(crate) encoded: Bytes,
    pub(crate) responder: Responder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Disconnected,
    Connecting,
    AuthPending,
    Idle,
    Busy,
    Closed,
}

/// What the server told us about itself during startup.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// ParameterStatus pairs (server_version, TimeZone, ...).
    pub parameters: BTreeMap<String, String>,
    pub process_id: Option<i32>,
    pub secret_key: Option<i32>,
    /// Status from the latest ReadyForQuery.
    pub transaction_status: Option<TransactionStatus>,
}

/// Protocol state of one connection, free of any I/O.
///
/// The worker feeds decoded backend messages in with [`Session::handle_message`]
/// and writes whatever [`Session::take_outgoing`] returns. Any `Err` from
/// `handle_message` is fatal; the caller must then [`Session::fail`] the session.
pub(crate) struct Session {
    cfg: ConnectionConfig,
    state: ConnectionState,
    authenticated: bool,
    ready_tx: Option<oneshot::Sender<Result<()>>>,
    info_tx: watch::Sender<ServerInfo>,
    queue: VecDeque<PendingQuery>,
    active: Option<Responder>,
    /// Outcome of the active query, delivered on ReadyForQuery.
    outcome: Option<Result<ResultSet>>,
    assembler: ResultAssembler,
    outbox: Vec<Bytes>,
}

impl Session {
    pub(crate) fn new(
        cfg: ConnectionConfig,
        lookup: Arc<dyn TypeLookup>,
        ready_tx: oneshot::Sender<Result<()>>,
        info_tx: watch::Sender<ServerInfo>,
    ) -> Self {
        Self {
            cfg,
            state: ConnectionState::Disconnected,
            authenticated: false,
            ready_tx: Some(ready_tx),
            info_tx,
            queue: VecDeque::new(),
            active: None,
            outcome: None,
            assembler: ResultAssembler::new(lookup),
            outbox: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn begin_connect(&mut self) {
        self.transition(ConnectionState::Connecting);
    }

    /// Socket is up: queue the startup packet.
    pub(crate) fn start(&mut self) {
        let startup = encode_startup(PROTOCOL_VERSION, &self.cfg.startup_params());
        self.outbox.push(startup);
        self.transition(ConnectionState::AuthPending);
    }

    pub(crate) fn take_outgoing(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn submit(&mut self, query: PendingQuery) {
        match self.state {
            ConnectionState::Closed => {
                let _ = query.responder.send(Err(PgWireError::Closed));
            }
            ConnectionState::Idle if self.queue.is_empty() => self.dispatch(query),
            _ => {
                self.queue.push_back(query);
                debug!(queued = self.queue.len(), "query deferred");
            }
        }
    }

    pub(crate) fn handle_message(&mut self, msg: BackendMessage) -> Result<()> {
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Closed
        ) {
            warn!(
                tag = %(msg.tag as char),
                state = ?self.state,
                "ignoring backend message on inactive connection"
            );
            return Ok(());
        }

        match msg.tag {
            b'R' => self.on_authentication(&msg.payload),
            b'S' => {
                let (name, value) = parse_parameter_status(&msg.payload)?;
                debug!(%name, %value, "parameter status");
                self.info_tx.send_modify(|info| {
                    info.parameters.insert(name, value);
                });
                Ok(())
            }
            b'K' => {
                let (pid, key) = parse_backend_key_data(&msg.payload)?;
                self.info_tx.send_modify(|info| {
                    info.process_id = Some(pid);
                    info.secret_key = Some(key);
                });
                Ok(())
            }
            b'N' => {
                let notice = ErrorFields::parse(&msg.payload);
                warn!("server notice: {notice}");
                Ok(())
            }
            b'E' => self.on_error_response(&msg.payload),
            b'Z' => self.on_ready_for_query(&msg.payload),
            b'T' => {
                self.expect_busy("row description")?;
                self.assembler.row_description(&msg.payload)
            }
            b'D' => {
                self.expect_busy("data row")?;
                self.assembler.data_row(&msg.payload)
            }
            b'C' => {
                self.expect_busy("command complete")?;
                let rs = self.assembler.command_complete(&msg.payload)?;
                self.record(Ok(rs));
                Ok(())
            }
            b'I' => {
                self.expect_busy("empty query response")?;
                let rs = self.assembler.empty_query();
                self.record(Ok(rs));
                Ok(())
            }
            b'G' => {
                self.expect_busy("copy in response")?;
                warn!("COPY FROM STDIN is not supported, sending CopyFail");
                self.outbox
                    .push(encode_copy_fail("COPY FROM STDIN is not supported by this client"));
                Ok(())
            }
            other => {
                debug!(tag = %(other as char), len = msg.payload.len(), "skipping unhandled message");
                Ok(())
            }
        }
    }

    /// Ends the session: every waiter (connect, active query, queued queries) receives `err`.
    pub(crate) fn fail(&mut self, err: PgWireError) {
        if self.state != ConnectionState::Closed {
            debug!(state = ?self.state, error = %err, "closing session");
        }
        self.transition(ConnectionState::Closed);
        self.assembler.reset();
        self.outcome = None;

        if let Some(tx) = self.ready_tx.take() {
            let _ = tx.send(Err(err.clone()));
        }
        if let Some(tx) = self.active.take() {
            let _ = tx.send(Err(err.clone()));
        }
        for pending in self.queue.drain(..) {
            let _ = pending.responder.send(Err(err.clone()));
        }
    }

    /// Client-initiated close: fail pending work with `Closed` and queue Terminate.
    pub(crate) fn close(&mut self) {
        let connected = matches!(
            self.state,
            ConnectionState::AuthPending | ConnectionState::Idle | ConnectionState::Busy
        );
        self.fail(PgWireError::Closed);
        if connected {
            self.outbox.push(encode_terminate());
        }
    }

    fn on_authentication(&mut self, payload: &[u8]) -> Result<()> {
        if self.state != ConnectionState::AuthPending {
            return Err(PgWireError::Protocol(format!(
                "authentication request in state {:?}",
                self.state
            )));
        }

        match AuthHandshake::new(&self.cfg.user, &self.cfg.password).respond(payload)? {
            AuthStep::Complete => {
                debug!("authentication ok");
                self.authenticated = true;
            }
            AuthStep::Respond(frame) => {
                debug!("answering password challenge");
                self.outbox.push(frame);
            }
        }
        Ok(())
    }

    fn on_error_response(&mut self, payload: &[u8]) -> Result<()> {
        let fields = ErrorFields::parse(payload);
        if !fields.is_error() {
            warn!("server message: {fields}");
            return Ok(());
        }

        match self.state {
            ConnectionState::AuthPending => Err(PgWireError::Auth(fields.to_string())),
            ConnectionState::Busy => {
                self.assembler.reset();
                self.record(Err(PgWireError::Server(fields)));
                Ok(())
            }
            _ => {
                // e.g. FATAL on admin shutdown while idle; the socket closes next
                warn!("server error: {fields}");
                Ok(())
            }
        }
    }

    fn on_ready_for_query(&mut self, payload: &[u8]) -> Result<()> {
        let status = parse_ready_for_query(payload)?;
        self.info_tx.send_modify(|info| info.transaction_status = Some(status));

        match self.state {
            ConnectionState::AuthPending => {
                if !self.authenticated {
                    return Err(PgWireError::Protocol(
                        "ready for query before authentication completed".into(),
                    ));
                }
                info!(
                    host = %self.cfg.host,
                    database = %self.cfg.database,
                    "connection ready"
                );
                if let Some(tx) = self.ready_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            ConnectionState::Busy => {
                let Some(outcome) = self.outcome.take() else {
                    return Err(PgWireError::Protocol(
                        "ready for query before the query produced a result".into(),
                    ));
                };
                if let Some(tx) = self.active.take() {
                    let _ = tx.send(outcome);
                }
            }
            state => {
                return Err(PgWireError::Protocol(format!(
                    "unexpected ready for query in state {state:?}"
                )));
            }
        }

        match self.queue.pop_front() {
            Some(next) => self.dispatch(next),
            None => self.transition(ConnectionState::Idle),
        }
        Ok(())
    }

    fn dispatch(&mut self, query: PendingQuery) {
        self.transition(ConnectionState::Busy);
        self.active = Some(query.responder);
        self.outbox.push(query.encoded);
    }

    /// Keep the first result of the cycle, unless a server error follows it:
    /// the server rolls back the whole query string in that case.
    fn record(&mut self, result: Result<ResultSet>) {
        let keep = matches!((&self.outcome, &result), (None, _) | (Some(Ok(_)), Err(_)));
        if keep {
            self.outcome = Some(result);
        } else {
            debug!("discarding later result in the same cycle");
        }
    }

    fn expect_busy(&self, what: &str) -> Result<()> {
        if self.state != ConnectionState::Busy {
            return Err(PgWireError::Protocol(format!(
                "{what} received in state {:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            debug!(from = ?self.state, ?to, "state transition");
            self.state = to;
        }
    }
}
