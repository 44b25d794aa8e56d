//! Coordinator dispatch loop
//!
//! The coordinator:
//! - Accepts a fixed number of workers and greets each with its id
//! - Waits on the listener and every worker socket in a single multiplexed wait
//! - Sweeps completed jobs into the ledger once per tick
//! - Serves at most one request per worker per pass
//! - Sends QUIT to everyone when the session clock runs out
//! - Tallies the ledger and reports the winner
//!
//! All table mutation happens on the task that drives [`Coordinator::run`],
//! so the table is never shared and never locked.

use crate::config::Config;
use crate::distributed::protocol::*;
use crate::distributed::session::{Dispatched, SessionState};
use crate::job::{JobFactory, JobTable, WorkerId, MAX_ATTRIBUTE};
use crate::output::json::{write_json_report, JsonSessionOutput};
use crate::output::text::report_lines;
use crate::output::SessionReport;
use crate::util::{SessionClock, SessionLog};
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

/// Bytes pulled from a socket per non-blocking read
const READ_CHUNK: usize = 64;

/// Shortest time shutdown waits for workers to close their end
const DRAIN_FLOOR: Duration = Duration::from_secs(1);

/// One accepted worker
struct WorkerConnection {
    id: WorkerId,
    stream: TcpStream,
    /// Bytes received but not yet decoded
    inbox: Vec<u8>,
}

/// What a connection produced on one pass
enum Incoming {
    Idle,
    Request(Request),
    Closed,
    Invalid(ProtocolError),
}

impl WorkerConnection {
    fn new(id: WorkerId, stream: TcpStream) -> Self {
        Self {
            id,
            stream,
            inbox: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Whether a complete request (or a decode error) is already buffered
    fn has_buffered_frame(&self) -> bool {
        !matches!(decode_request(&self.inbox), Ok(None))
    }

    /// Take at most one request without blocking
    fn next_request(&mut self) -> Incoming {
        if let Some(incoming) = self.take_frame() {
            return incoming;
        }

        let mut buf = [0u8; READ_CHUNK];
        match self.stream.try_read(&mut buf) {
            Ok(0) => Incoming::Closed,
            Ok(n) => {
                self.inbox.extend_from_slice(&buf[..n]);
                self.take_frame().unwrap_or(Incoming::Idle)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Incoming::Idle,
            Err(_) => Incoming::Closed,
        }
    }

    fn take_frame(&mut self) -> Option<Incoming> {
        match decode_request(&self.inbox) {
            Ok(Some((request, used))) => {
                self.inbox.drain(..used);
                Some(Incoming::Request(request))
            }
            Ok(None) => None,
            Err(e) => Some(Incoming::Invalid(e)),
        }
    }
}

/// Result of one multiplexed wait
enum Wakeup {
    Accept(io::Result<(TcpStream, SocketAddr)>),
    Readable,
}

/// Session coordinator
///
/// Owns the listener, the worker connections and the authoritative table.
pub struct Coordinator {
    /// Session configuration
    config: Arc<Config>,

    log: Arc<SessionLog>,

    state: SessionState,

    listener: TcpListener,

    /// Active workers; compacted by swap-remove when one drops
    connections: Vec<WorkerConnection>,
}

impl Coordinator {
    /// Bind the listener on the configured address and prepare the table
    pub async fn bind(config: Arc<Config>, log: Arc<SessionLog>) -> Result<Self> {
        let address = config.session.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind coordinator on {}", address))?;

        Ok(Self::with_listener(config, log, listener))
    }

    /// Create a coordinator around an already bound listener
    pub fn with_listener(config: Arc<Config>, log: Arc<SessionLog>, listener: TcpListener) -> Self {
        let factory = JobFactory::from_seed_option(config.session.seed);
        let state = SessionState::new(factory, config.session.reclaim_on_disconnect);

        Self {
            config,
            log,
            state,
            listener,
            connections: Vec::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().context("Failed to read listener address")
    }

    /// Fill every slot with a fresh job
    pub fn initialize_table(&mut self) {
        self.state.initialize_table();
    }

    /// Start from an explicit table instead of a generated one
    pub fn install_table(&mut self, table: JobTable) {
        self.state.install_table(table);
    }

    /// Block until `count` workers have connected
    ///
    /// Ids are assigned in connection order starting at 0. A worker that
    /// cannot be greeted is dropped and does not use up an id.
    pub async fn accept_workers(&mut self, count: usize) -> Result<()> {
        self.log.line(format!(
            "Waiting for {} workers on {}",
            count,
            self.local_addr()?
        ));

        while self.connections.len() < count {
            let (mut stream, addr) = self
                .listener
                .accept()
                .await
                .context("Failed to accept worker connection")?;

            if let Err(e) = stream.set_nodelay(true) {
                self.log.debug(format!("set_nodelay failed for {}: {}", addr, e));
            }

            let id = self.connections.len() as WorkerId;
            if let Err(e) = write_frame(&mut stream, &encode_greeting(id)).await {
                self.log.warn(format!("Could not greet worker from {}: {:#}", addr, e));
                continue;
            }

            self.log.line(format!(
                "{} (worker {}) connected from {}",
                self.name(id),
                id,
                addr
            ));
            self.connections.push(WorkerConnection::new(id, stream));
        }

        Ok(())
    }

    /// Run the session until the clock expires, then report
    pub async fn run(mut self) -> Result<SessionReport> {
        let clock = SessionClock::start(self.config.session.duration());
        let tick = self.config.session.tick();

        self.log.line(format!(
            "Session started with {} workers for {}",
            self.connections.len(),
            crate::util::time::format_duration(clock.limit())
        ));
        self.log_table();

        while !clock.expired() {
            let limit = tick.min(clock.remaining());
            if let Some(Wakeup::Accept(result)) = self.wait_for_activity(limit).await {
                self.turn_away(result).await;
            }

            self.sweep_table();
            self.dispatch_pass().await;
        }

        self.shutdown(clock.elapsed()).await
    }

    /// Wait until the listener or any worker socket is ready, or `limit` passes
    async fn wait_for_activity(&self, limit: Duration) -> Option<Wakeup> {
        // Bytes already buffered will not raise readiness again
        if self.connections.iter().any(|c| c.has_buffered_frame()) {
            return Some(Wakeup::Readable);
        }

        let listener = &self.listener;
        let connections = &self.connections;
        let ready = std::future::poll_fn(|cx| {
            if let Poll::Ready(result) = listener.poll_accept(cx) {
                return Poll::Ready(Wakeup::Accept(result));
            }
            for conn in connections {
                if conn.stream.poll_read_ready(cx).is_ready() {
                    return Poll::Ready(Wakeup::Readable);
                }
            }
            Poll::Pending
        });

        tokio::time::timeout(limit, ready).await.ok()
    }

    /// Refuse a connection that arrives once the session is full
    async fn turn_away(&self, result: io::Result<(TcpStream, SocketAddr)>) {
        match result {
            Ok((mut stream, addr)) => {
                self.log.warn(format!("Session is full, turning away {}", addr));
                if let Err(e) = write_frame(&mut stream, &encode_reply(&Reply::Quit)).await {
                    self.log.debug(format!("QUIT to {} failed: {:#}", addr, e));
                }
                let _ = stream.shutdown().await;
            }
            Err(e) => self.log.warn(format!("Failed to accept connection: {}", e)),
        }
    }

    fn sweep_table(&mut self) {
        for job in self.state.sweep() {
            let credited = job.worker().map(|id| self.name(id)).unwrap_or_default();
            self.log.line(format!(
                "Job {} finished by {} (value {}), replaced",
                job.id(),
                credited,
                job.value()
            ));
            if let Some(fresh) = self.state.table().get(job.slot()) {
                self.log.debug(format!("Slot {} now holds {}", job.slot(), fresh));
            }
        }
    }

    /// Serve one request from every worker with pending input
    ///
    /// A dropped worker is swap-removed, so the index is not advanced and the
    /// connection moved into its place is served in the same pass.
    async fn dispatch_pass(&mut self) {
        let mut index = 0;
        while index < self.connections.len() {
            let keep = match self.connections[index].next_request() {
                Incoming::Idle => true,
                Incoming::Request(request) => self.dispatch(index, request).await,
                Incoming::Closed => {
                    let id = self.connections[index].id;
                    self.log.line(format!("{} (worker {}) disconnected", self.name(id), id));
                    false
                }
                Incoming::Invalid(e) => {
                    let id = self.connections[index].id;
                    self.log.warn(format!(
                        "Dropping {} (worker {}): {}",
                        self.name(id),
                        id,
                        e
                    ));
                    false
                }
            };

            if keep {
                index += 1;
            } else {
                self.drop_connection(index);
            }
        }
    }

    /// Apply one request and send the reply; false if the worker is gone
    async fn dispatch(&mut self, index: usize, request: Request) -> bool {
        let worker = self.connections[index].id;
        let outcome = self.state.handle(worker, request);
        self.log_dispatch(worker, &outcome);

        if let Some(reply) = outcome.reply() {
            let frame = encode_reply(&reply);
            if let Err(e) = write_frame(&mut self.connections[index].stream, &frame).await {
                self.log.warn(format!(
                    "Lost {} (worker {}) while replying: {:#}",
                    self.name(worker),
                    worker,
                    e
                ));
                return false;
            }
        }
        true
    }

    fn drop_connection(&mut self, index: usize) {
        let conn = self.connections.swap_remove(index);
        let released = self.state.worker_lost(conn.id);
        if !released.is_empty() {
            self.log.line(format!(
                "Returned slots {:?} held by {} to the pool",
                released,
                self.name(conn.id)
            ));
        }
    }

    fn log_dispatch(&self, worker: WorkerId, outcome: &Dispatched) {
        let name = self.name(worker);
        match outcome {
            Dispatched::Snapshot(_) => {
                self.log.debug(format!("{} asked for the job table", name));
            }
            Dispatched::Claimed { slot, job } => {
                self.log.line(format!("{} claimed job {} (value {})", name, slot, job.value()));
            }
            Dispatched::Refused { slot, status } => {
                self.log.line(format!("{} refused job {}: already {}", name, slot, status));
            }
            Dispatched::Completed { slot, job } => {
                self.log.line(format!("{} completed job {} (value {})", name, slot, job.value()));
            }
            Dispatched::Ignored { slot, reason } => {
                self.log.warn(format!("Ignoring report from {} on job {}: {}", name, slot, reason));
            }
        }
    }

    fn log_table(&self) {
        if !self.log.debug_enabled() {
            return;
        }
        for job in self.state.table().iter() {
            self.log.debug(job.to_string());
        }
    }

    /// Send QUIT to everyone, close the connections and report
    async fn shutdown(mut self, elapsed: Duration) -> Result<SessionReport> {
        self.log.line("Time is up, sending QUIT to all workers");

        let quit = encode_reply(&Reply::Quit);
        for conn in self.connections.iter_mut() {
            if let Err(e) = write_frame(&mut conn.stream, &quit).await {
                self.log.debug(format!("QUIT to worker {} failed: {:#}", conn.id, e));
            }
            let _ = conn.stream.shutdown().await;
        }

        // Closing with unread bytes resets the connection, so read each
        // worker's remaining requests until it closes its end
        let deadline = Instant::now() + self.drain_window();
        for conn in self.connections.iter_mut() {
            let discarded = drain_until_closed(&mut conn.stream, deadline).await;
            if discarded > 0 {
                self.log.debug(format!(
                    "Discarded {} bytes from worker {} after QUIT",
                    discarded, conn.id
                ));
            }
        }
        self.connections.clear();

        let session = &self.config.session;
        let report = self.state.finish(|id| session.worker_name(id), session.bonus);

        self.log.line("");
        for line in report_lines(&report) {
            self.log.line(line);
        }

        if let Some(ref path) = self.config.output.json_report {
            let output = JsonSessionOutput::new(report.clone(), elapsed, session.workers);
            write_json_report(path, &output, true)?;
            self.log.line(format!("JSON report written to: {}", path.display()));
        }

        Ok(report)
    }

    /// Long enough for a worker to finish its slowest job and read QUIT
    fn drain_window(&self) -> Duration {
        let slowest_job = self.config.worker.work_unit() * u32::from(MAX_ATTRIBUTE);
        (self.config.session.tick() + slowest_job * 2).max(DRAIN_FLOOR)
    }

    fn name(&self, worker: WorkerId) -> String {
        self.config.session.worker_name(worker)
    }
}

/// Read and discard until the peer closes, errors or `deadline` passes
///
/// Returns the number of bytes discarded.
async fn drain_until_closed(stream: &mut TcpStream, deadline: Instant) -> usize {
    let mut buf = [0u8; READ_CHUNK];
    let mut discarded = 0;
    loop {
        match tokio::time::timeout_at(deadline, stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return discarded,
            Ok(Ok(n)) => discarded += n,
        }
    }
}
