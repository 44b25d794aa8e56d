//! Worker client
//!
//! A worker loops over three steps until the coordinator says QUIT or the
//! connection goes away:
//!
//! 1. Ask for a fresh snapshot of the table (NEED_JOB)
//! 2. Walk the mood's candidate slots, sending WANT_JOB until one is ACKed
//! 3. Sleep for `slow × work_unit`, then send JOB_DONE
//!
//! If no candidate is ACKed the worker goes straight back to step 1. Nothing
//! is cached between iterations.
//!
//! The steps are public so tests can drive a worker one move at a time.

use crate::config::Config;
use crate::distributed::mood::Mood;
use crate::distributed::protocol::*;
use crate::job::{Job, JobTable, WorkerId};
use crate::util::SessionLog;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Why a worker stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The coordinator sent QUIT
    Quit,
    /// The connection closed or failed
    ConnectionLost,
    /// The coordinator sent something the protocol does not allow
    ProtocolError(String),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Quit => write!(f, "told to quit"),
            ExitReason::ConnectionLost => write!(f, "connection lost"),
            ExitReason::ProtocolError(e) => write!(f, "protocol error: {}", e),
        }
    }
}

/// Outcome of one worker step
#[derive(Debug, PartialEq, Eq)]
pub enum Step<T> {
    Continue(T),
    Exit(ExitReason),
}

/// What a worker did during the session
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub id: WorkerId,
    pub name: String,
    pub mood: Mood,
    pub completed: Vec<Job>,
    pub total_value: u32,
    pub exit: ExitReason,
}

/// A connected, identified worker
pub struct Worker<S = TcpStream> {
    id: WorkerId,
    name: String,
    mood: Mood,
    stream: S,
    work_unit: Duration,
    completed: Vec<Job>,
    log: Arc<SessionLog>,
}

impl Worker<TcpStream> {
    /// Connect to the coordinator at `address` and wait for an id
    ///
    /// Returns `None` if the coordinator turned the connection away or
    /// closed it before greeting.
    pub async fn connect(address: &str, config: &Config, log: Arc<SessionLog>) -> Result<Option<Self>> {
        let stream = TcpStream::connect(address)
            .await
            .with_context(|| format!("Failed to connect to coordinator at {}", address))?;

        stream.set_nodelay(true)
            .context("Failed to set TCP_NODELAY")?;

        Self::handshake(stream, config, log).await
    }
}

impl<S> Worker<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Read the greeting on an established stream and pick a mood
    pub async fn handshake(mut stream: S, config: &Config, log: Arc<SessionLog>) -> Result<Option<Self>> {
        let id = match read_greeting(&mut stream).await {
            ReadOutcome::Ok(Some(id)) => id,
            ReadOutcome::Ok(None) => {
                log.line("Coordinator is full, not joining");
                return Ok(None);
            }
            ReadOutcome::PeerClosed => {
                log.warn("Coordinator closed the connection before assigning an id");
                return Ok(None);
            }
            ReadOutcome::Invalid(e) => {
                return Err(anyhow::Error::new(e).context("Invalid greeting from coordinator"));
            }
        };

        let mood = config
            .worker
            .mood
            .unwrap_or_else(|| draw_mood(config.session.seed, id));
        let name = config.session.worker_name(id);

        log.line(format!("{} joined as worker {} in a {} mood", name, id, mood));

        Ok(Some(Self {
            id,
            name,
            mood,
            stream,
            work_unit: config.worker.work_unit(),
            completed: Vec::new(),
            log,
        }))
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn completed(&self) -> &[Job] {
        &self.completed
    }

    /// Send NEED_JOB and read the snapshot
    pub async fn fetch_table(&mut self) -> Step<JobTable> {
        if let Err(e) = write_frame(&mut self.stream, &encode_request(&Request::NeedJob)).await {
            self.log.debug(format!("{}: NEED_JOB failed: {:#}", self.name, e));
            return Step::Exit(ExitReason::ConnectionLost);
        }

        match read_snapshot(&mut self.stream).await {
            ReadOutcome::Ok(SnapshotReply::Table(table)) => Step::Continue(table),
            ReadOutcome::Ok(SnapshotReply::Quit) => Step::Exit(ExitReason::Quit),
            ReadOutcome::PeerClosed => Step::Exit(ExitReason::ConnectionLost),
            ReadOutcome::Invalid(e) => Step::Exit(ExitReason::ProtocolError(e.to_string())),
        }
    }

    /// Try the mood's candidates in order until one is granted
    ///
    /// A refused slot is not retried; the scan moves on to the next
    /// candidate. Returns `Continue(None)` when every candidate was refused
    /// or there were none.
    pub async fn claim_next(&mut self, table: &JobTable) -> Step<Option<Job>> {
        for slot in self.mood.candidates(table) {
            let Some(mut job) = table.get(slot).copied() else {
                continue;
            };

            let request = encode_request(&Request::WantJob(slot));
            if let Err(e) = write_frame(&mut self.stream, &request).await {
                self.log.debug(format!("{}: WANT_JOB failed: {:#}", self.name, e));
                return Step::Exit(ExitReason::ConnectionLost);
            }

            match read_code(&mut self.stream).await {
                ReadOutcome::Ok(MessageCode::Ack) => {
                    // Candidates are NotStarted in the snapshot
                    let _ = job.claim(self.id);
                    self.log.line(format!(
                        "{} got job {} (value {})",
                        self.name,
                        slot,
                        job.value()
                    ));
                    return Step::Continue(Some(job));
                }
                ReadOutcome::Ok(MessageCode::Nack) => {
                    self.log.debug(format!("{}: job {} was taken", self.name, slot));
                }
                ReadOutcome::Ok(MessageCode::Quit) => return Step::Exit(ExitReason::Quit),
                ReadOutcome::Ok(other) => {
                    return Step::Exit(ExitReason::ProtocolError(format!(
                        "unexpected {} in reply to WANT_JOB",
                        other
                    )));
                }
                ReadOutcome::PeerClosed => return Step::Exit(ExitReason::ConnectionLost),
                ReadOutcome::Invalid(e) => return Step::Exit(ExitReason::ProtocolError(e.to_string())),
            }
        }

        Step::Continue(None)
    }

    /// Do a claimed job and report it done
    pub async fn work_on(&mut self, mut job: Job) -> Step<Job> {
        let work_time = self.work_unit * u32::from(job.slow());
        self.log.debug(format!(
            "{}: working on job {} for {:?}",
            self.name,
            job.id(),
            work_time
        ));
        tokio::time::sleep(work_time).await;

        // Claimed by us in claim_next, so still Working with our id
        let _ = job.complete(self.id);
        self.completed.push(job);

        let request = encode_request(&Request::JobDone(job.slot()));
        if let Err(e) = write_frame(&mut self.stream, &request).await {
            self.log.debug(format!("{}: JOB_DONE failed: {:#}", self.name, e));
            return Step::Exit(ExitReason::ConnectionLost);
        }

        self.log.line(format!("{} finished job {}", self.name, job.id()));
        Step::Continue(job)
    }

    /// Run until QUIT or connection loss
    pub async fn run(mut self) -> WorkerSummary {
        let exit = loop {
            let table = match self.fetch_table().await {
                Step::Continue(table) => table,
                Step::Exit(reason) => break reason,
            };

            let job = match self.claim_next(&table).await {
                Step::Continue(Some(job)) => job,
                Step::Continue(None) => continue,
                Step::Exit(reason) => break reason,
            };

            if let Step::Exit(reason) = self.work_on(job).await {
                break reason;
            }
        };

        match &exit {
            ExitReason::ProtocolError(_) => self.log.warn(format!("{} stopped: {}", self.name, exit)),
            _ => self.log.line(format!(
                "{} stopped ({}) after {} jobs",
                self.name,
                exit,
                self.completed.len()
            )),
        }

        self.into_summary(exit)
    }

    fn into_summary(self, exit: ExitReason) -> WorkerSummary {
        let total_value = self.completed.iter().map(|job| u32::from(job.value())).sum();
        WorkerSummary {
            id: self.id,
            name: self.name,
            mood: self.mood,
            completed: self.completed,
            total_value,
            exit,
        }
    }
}

/// Draw a mood, reproducibly when a session seed is set
fn draw_mood(seed: Option<u64>, id: WorkerId) -> Mood {
    let mut rng = match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(u64::from(id))),
        None => Xoshiro256PlusPlus::from_entropy(),
    };
    Mood::random(&mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobFactory, JobStatus};
    use tokio::io::DuplexStream;

    fn test_config(mood: Option<Mood>) -> Config {
        let mut config = Config::default();
        config.worker.mood = mood;
        config.worker.work_unit_ms = 1;
        config
    }

    async fn greeted(mood: Option<Mood>, id: WorkerId) -> (Worker<DuplexStream>, DuplexStream) {
        let (mut coordinator, worker_end) = tokio::io::duplex(1024);
        write_frame(&mut coordinator, &encode_greeting(id)).await.unwrap();

        let log = Arc::new(SessionLog::console_only(false));
        let worker = Worker::handshake(worker_end, &test_config(mood), log)
            .await
            .unwrap()
            .unwrap();
        (worker, coordinator)
    }

    async fn read_request(stream: &mut DuplexStream) -> Request {
        let code = match read_word(stream).await {
            ReadOutcome::Ok(word) => word,
            other => panic!("Expected request, got {:?}", other),
        };
        let mut buf = encode_word(code).to_vec();
        if code != MessageCode::NeedJob.word() {
            match read_word(stream).await {
                ReadOutcome::Ok(slot) => buf.extend_from_slice(&encode_word(slot)),
                other => panic!("Expected slot, got {:?}", other),
            }
        }
        decode_request(&buf).unwrap().unwrap().0
    }

    #[tokio::test]
    async fn test_handshake_assigns_id_and_name() {
        let (worker, _coordinator) = greeted(Some(Mood::AvoidDirty), 2).await;
        assert_eq!(worker.id(), 2);
        assert_eq!(worker.name(), "Lee");
        assert_eq!(worker.mood(), Mood::AvoidDirty);
    }

    #[tokio::test]
    async fn test_handshake_turned_away() {
        let (mut coordinator, worker_end) = tokio::io::duplex(64);
        write_frame(&mut coordinator, &encode_reply(&Reply::Quit)).await.unwrap();

        let log = Arc::new(SessionLog::console_only(false));
        let worker = Worker::handshake(worker_end, &test_config(None), log).await.unwrap();
        assert!(worker.is_none());
    }

    #[test]
    fn test_seeded_mood_is_reproducible() {
        assert_eq!(draw_mood(Some(9), 1), draw_mood(Some(9), 1));
    }

    #[tokio::test]
    async fn test_fetch_table() {
        let (mut worker, mut coordinator) = greeted(Some(Mood::Cooperative), 0).await;
        let table = JobTable::generate(&mut JobFactory::with_seed(3));

        let expected = table.clone();
        let server = tokio::spawn(async move {
            assert_eq!(read_request(&mut coordinator).await, Request::NeedJob);
            write_frame(&mut coordinator, &encode_snapshot(&expected)).await.unwrap();
            assert_eq!(read_request(&mut coordinator).await, Request::NeedJob);
            write_frame(&mut coordinator, &encode_reply(&Reply::Quit)).await.unwrap();
        });

        match worker.fetch_table().await {
            Step::Continue(received) => assert_eq!(snapshot_words(&received), snapshot_words(&table)),
            other => panic!("Expected table, got {:?}", other),
        }
        assert_eq!(worker.fetch_table().await, Step::Exit(ExitReason::Quit));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_moves_past_refusals() {
        let (mut worker, mut coordinator) = greeted(Some(Mood::Cooperative), 1).await;
        let table = JobTable::generate(&mut JobFactory::with_seed(4));

        let server = tokio::spawn(async move {
            // Slot 9 is refused, slot 8 is granted
            assert_eq!(read_request(&mut coordinator).await, Request::WantJob(9));
            write_frame(&mut coordinator, &encode_reply(&Reply::Nack)).await.unwrap();
            assert_eq!(read_request(&mut coordinator).await, Request::WantJob(8));
            write_frame(&mut coordinator, &encode_reply(&Reply::Ack)).await.unwrap();
            assert_eq!(read_request(&mut coordinator).await, Request::JobDone(8));
        });

        let job = match worker.claim_next(&table).await {
            Step::Continue(Some(job)) => job,
            other => panic!("Expected a claim, got {:?}", other),
        };
        assert_eq!(job.slot(), 8);
        assert_eq!(job.status(), JobStatus::Working);

        let done = match worker.work_on(job).await {
            Step::Continue(done) => done,
            other => panic!("Expected completion, got {:?}", other),
        };
        assert_eq!(done.status(), JobStatus::Complete);
        assert_eq!(done.worker(), Some(worker.id()));
        assert_eq!(worker.completed().len(), 1);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_with_no_candidates() {
        let (mut worker, _coordinator) = greeted(Some(Mood::AvoidSlow), 0).await;
        let jobs = std::array::from_fn(|slot| Job::new(slot as u16, 4, 1, 1).unwrap());
        let table = JobTable::from_jobs(jobs).unwrap();

        assert_eq!(worker.claim_next(&table).await, Step::Continue(None));
    }

    #[tokio::test]
    async fn test_quit_during_claim() {
        let (mut worker, mut coordinator) = greeted(Some(Mood::Cooperative), 0).await;
        let table = JobTable::generate(&mut JobFactory::with_seed(5));

        write_frame(&mut coordinator, &encode_reply(&Reply::Quit)).await.unwrap();
        assert_eq!(worker.claim_next(&table).await, Step::Exit(ExitReason::Quit));
    }

    #[tokio::test]
    async fn test_run_exits_on_connection_loss() {
        let (worker, coordinator) = greeted(Some(Mood::Cooperative), 3).await;
        drop(coordinator);

        let summary = worker.run().await;
        assert_eq!(summary.id, 3);
        assert_eq!(summary.name, "Pat");
        assert_eq!(summary.exit, ExitReason::ConnectionLost);
        assert!(summary.completed.is_empty());
        assert_eq!(summary.total_value, 0);
    }
}
