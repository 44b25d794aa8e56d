//! Wire protocol
//!
//! This module defines the fixed-width binary protocol spoken between the
//! coordinator and its workers. There is no length prefix and no framing
//! beyond the shape implied by each message code.
//!
//! # Words
//!
//! Every field is a 2-byte integer in host byte order. Both ends are assumed
//! to share the same endianness; nothing on the wire negotiates it.
//!
//! # Message Codes
//!
//! | Code | Name     | Payload                    | Direction            |
//! |------|----------|----------------------------|----------------------|
//! | 0    | ACK      | none (worker id on connect)| Coordinator → Worker |
//! | 1    | NACK     | none                       | Coordinator → Worker |
//! | 2    | QUIT     | none                       | Coordinator → Worker |
//! | 3    | WANT_JOB | slot index                 | Worker → Coordinator |
//! | 4    | NEED_JOB | none                       | Worker → Coordinator |
//! | 5    | JOB_DONE | slot index                 | Worker → Coordinator |
//!
//! # Message Flow
//!
//! ```text
//! Coordinator                     Worker
//!     |                              |
//!     |-------- ACK, id ------------>|
//!     |                              |
//!     |<------- NEED_JOB ------------|
//!     |------- snapshot (60w) ------>|
//!     |                              |
//!     |<------- WANT_JOB(i) ---------|
//!     |-------- ACK | NACK --------->|
//!     |                              |
//!     |<------- JOB_DONE(i) ---------|
//!     |                              |
//!     |-------- QUIT --------------->|
//! ```
//!
//! # Snapshot Layout
//!
//! The reply to NEED_JOB is 60 words: ten jobs of six fields each, in slot
//! order, with fields `(id, slow, dirty, heavy, value, status)`. Slot 0 always
//! leads with id 0, which never collides with the QUIT code, so a worker can
//! read one word and tell a snapshot from a termination notice.

use crate::job::{Job, JobError, JobStatus, JobTable, WorkerId, TABLE_SIZE};
use anyhow::{Context, Result};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of one wire word in bytes
pub const WORD_SIZE: usize = 2;

/// Fields per job in a snapshot
pub const FIELDS_PER_JOB: usize = 6;

/// Words in a full table snapshot
pub const SNAPSHOT_WORDS: usize = TABLE_SIZE * FIELDS_PER_JOB;

/// Bytes in a full table snapshot
pub const SNAPSHOT_BYTES: usize = SNAPSHOT_WORDS * WORD_SIZE;

/// Two-byte message codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCode {
    Ack = 0,
    Nack = 1,
    Quit = 2,
    WantJob = 3,
    NeedJob = 4,
    JobDone = 5,
}

impl MessageCode {
    pub fn word(self) -> u16 {
        self as u16
    }

    pub fn from_word(word: u16) -> Option<Self> {
        match word {
            0 => Some(Self::Ack),
            1 => Some(Self::Nack),
            2 => Some(Self::Quit),
            3 => Some(Self::WantJob),
            4 => Some(Self::NeedJob),
            5 => Some(Self::JobDone),
            _ => None,
        }
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageCode::Ack => "ACKNOWLEDGE",
            MessageCode::Nack => "NON ACKNOWLEDGE",
            MessageCode::Quit => "TIME TO QUIT",
            MessageCode::WantJob => "WANT JOB",
            MessageCode::NeedJob => "NEED A JOB",
            MessageCode::JobDone => "JOB DONE",
        };
        f.write_str(name)
    }
}

/// Messages sent by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Ask for a fresh snapshot of the table
    NeedJob,
    /// Try to claim a slot
    WantJob(usize),
    /// Report that a slot's job is finished
    JobDone(usize),
}

/// Messages sent by the coordinator in answer to a request, or at shutdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack,
    Nack,
    Quit,
    Snapshot(JobTable),
}

/// Protocol-level failures
///
/// Only raised where the fixed wire contract makes a violation detectable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown message code {0}")]
    UnknownCode(u16),

    #[error("unexpected message {0}")]
    UnexpectedMessage(MessageCode),

    #[error("slot index {0} is outside the table")]
    SlotOutOfRange(u16),

    #[error("snapshot position {position} carries job id {id}")]
    SlotMismatch { position: usize, id: u16 },

    #[error("unknown job status code {0}")]
    UnknownStatus(u16),

    #[error("invalid job in snapshot slot {slot}: {source}")]
    InvalidJob {
        slot: usize,
        #[source]
        source: JobError,
    },
}

/// Result of a blocking read
///
/// A peer that closed the connection or failed a read is not an error for
/// either side; callers branch on it like any other outcome.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome<T> {
    Ok(T),
    PeerClosed,
    Invalid(ProtocolError),
}

/// Reply to NEED_JOB as seen by a worker
#[derive(Debug, PartialEq, Eq)]
pub enum SnapshotReply {
    Table(JobTable),
    Quit,
}

/// Encode one word
pub fn encode_word(word: u16) -> [u8; WORD_SIZE] {
    word.to_ne_bytes()
}

/// Decode one word
pub fn decode_word(bytes: [u8; WORD_SIZE]) -> u16 {
    u16::from_ne_bytes(bytes)
}

/// Encode the connect greeting: ACK followed by the assigned worker id
pub fn encode_greeting(worker: WorkerId) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 * WORD_SIZE);
    buf.extend_from_slice(&encode_word(MessageCode::Ack.word()));
    buf.extend_from_slice(&encode_word(worker));
    buf
}

/// Encode a worker request
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 * WORD_SIZE);
    match *request {
        Request::NeedJob => {
            buf.extend_from_slice(&encode_word(MessageCode::NeedJob.word()));
        }
        Request::WantJob(slot) => {
            buf.extend_from_slice(&encode_word(MessageCode::WantJob.word()));
            buf.extend_from_slice(&encode_word(slot as u16));
        }
        Request::JobDone(slot) => {
            buf.extend_from_slice(&encode_word(MessageCode::JobDone.word()));
            buf.extend_from_slice(&encode_word(slot as u16));
        }
    }
    buf
}

/// Decode one worker request from the front of `buf`
///
/// Returns `Ok(None)` when `buf` does not yet hold a complete request, or the
/// request together with the number of bytes it used.
pub fn decode_request(buf: &[u8]) -> Result<Option<(Request, usize)>, ProtocolError> {
    let Some(code) = peek_word(buf, 0) else {
        return Ok(None);
    };

    match MessageCode::from_word(code) {
        Some(MessageCode::NeedJob) => Ok(Some((Request::NeedJob, WORD_SIZE))),
        Some(kind @ (MessageCode::WantJob | MessageCode::JobDone)) => {
            let Some(raw_slot) = peek_word(buf, 1) else {
                return Ok(None);
            };
            if raw_slot as usize >= TABLE_SIZE {
                return Err(ProtocolError::SlotOutOfRange(raw_slot));
            }
            let slot = raw_slot as usize;
            let request = if kind == MessageCode::WantJob {
                Request::WantJob(slot)
            } else {
                Request::JobDone(slot)
            };
            Ok(Some((request, 2 * WORD_SIZE)))
        }
        Some(other) => Err(ProtocolError::UnexpectedMessage(other)),
        None => Err(ProtocolError::UnknownCode(code)),
    }
}

/// Encode a coordinator reply
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    match reply {
        Reply::Ack => encode_word(MessageCode::Ack.word()).to_vec(),
        Reply::Nack => encode_word(MessageCode::Nack.word()).to_vec(),
        Reply::Quit => encode_word(MessageCode::Quit.word()).to_vec(),
        Reply::Snapshot(table) => encode_snapshot(table),
    }
}

/// Flatten a table into its 60 snapshot words
pub fn snapshot_words(table: &JobTable) -> [u16; SNAPSHOT_WORDS] {
    let mut words = [0u16; SNAPSHOT_WORDS];
    for (slot, job) in table.iter().enumerate() {
        let base = slot * FIELDS_PER_JOB;
        words[base] = job.id();
        words[base + 1] = u16::from(job.slow());
        words[base + 2] = u16::from(job.dirty());
        words[base + 3] = u16::from(job.heavy());
        words[base + 4] = job.value();
        words[base + 5] = job.status().code();
    }
    words
}

/// Encode a table snapshot (120 bytes, no prefix)
pub fn encode_snapshot(table: &JobTable) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SNAPSHOT_BYTES);
    for word in snapshot_words(table) {
        buf.extend_from_slice(&encode_word(word));
    }
    buf
}

/// Rebuild a table from its 60 snapshot words
pub fn decode_snapshot(words: &[u16; SNAPSHOT_WORDS]) -> Result<JobTable, ProtocolError> {
    let mut jobs = Vec::with_capacity(TABLE_SIZE);

    for (position, fields) in words.chunks_exact(FIELDS_PER_JOB).enumerate() {
        let id = fields[0];
        if id as usize != position {
            return Err(ProtocolError::SlotMismatch { position, id });
        }
        let status = JobStatus::from_code(fields[5])
            .ok_or(ProtocolError::UnknownStatus(fields[5]))?;
        let job = Job::from_parts(id, fields[1], fields[2], fields[3], fields[4], status)
            .map_err(|source| ProtocolError::InvalidJob { slot: position, source })?;
        jobs.push(job);
    }

    let jobs: [Job; TABLE_SIZE] = jobs
        .try_into()
        .map_err(|_| ProtocolError::SlotMismatch { position: TABLE_SIZE, id: 0 })?;
    JobTable::from_jobs(jobs).map_err(|source| ProtocolError::InvalidJob { slot: 0, source })
}

fn peek_word(buf: &[u8], index: usize) -> Option<u16> {
    let start = index * WORD_SIZE;
    let bytes = buf.get(start..start + WORD_SIZE)?;
    Some(decode_word([bytes[0], bytes[1]]))
}

/// Read one word, mapping EOF and read errors to `PeerClosed`
pub async fn read_word<R>(reader: &mut R) -> ReadOutcome<u16>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; WORD_SIZE];
    match reader.read_exact(&mut buf).await {
        Ok(_) => ReadOutcome::Ok(decode_word(buf)),
        Err(_) => ReadOutcome::PeerClosed,
    }
}

/// Read a bare message code
pub async fn read_code<R>(reader: &mut R) -> ReadOutcome<MessageCode>
where
    R: AsyncRead + Unpin,
{
    match read_word(reader).await {
        ReadOutcome::Ok(word) => match MessageCode::from_word(word) {
            Some(code) => ReadOutcome::Ok(code),
            None => ReadOutcome::Invalid(ProtocolError::UnknownCode(word)),
        },
        ReadOutcome::PeerClosed => ReadOutcome::PeerClosed,
        ReadOutcome::Invalid(err) => ReadOutcome::Invalid(err),
    }
}

/// Read the connect greeting
///
/// Returns the assigned worker id, or `None` if the coordinator turned the
/// connection away with QUIT.
pub async fn read_greeting<R>(reader: &mut R) -> ReadOutcome<Option<WorkerId>>
where
    R: AsyncRead + Unpin,
{
    match read_code(reader).await {
        ReadOutcome::Ok(MessageCode::Ack) => match read_word(reader).await {
            ReadOutcome::Ok(id) => ReadOutcome::Ok(Some(id)),
            ReadOutcome::PeerClosed => ReadOutcome::PeerClosed,
            ReadOutcome::Invalid(err) => ReadOutcome::Invalid(err),
        },
        ReadOutcome::Ok(MessageCode::Quit) => ReadOutcome::Ok(None),
        ReadOutcome::Ok(other) => ReadOutcome::Invalid(ProtocolError::UnexpectedMessage(other)),
        ReadOutcome::PeerClosed => ReadOutcome::PeerClosed,
        ReadOutcome::Invalid(err) => ReadOutcome::Invalid(err),
    }
}

/// Read the reply to NEED_JOB
pub async fn read_snapshot<R>(reader: &mut R) -> ReadOutcome<SnapshotReply>
where
    R: AsyncRead + Unpin,
{
    let first = match read_word(reader).await {
        ReadOutcome::Ok(word) => word,
        ReadOutcome::PeerClosed => return ReadOutcome::PeerClosed,
        ReadOutcome::Invalid(err) => return ReadOutcome::Invalid(err),
    };
    if first == MessageCode::Quit.word() {
        return ReadOutcome::Ok(SnapshotReply::Quit);
    }

    let mut rest = [0u8; SNAPSHOT_BYTES - WORD_SIZE];
    if reader.read_exact(&mut rest).await.is_err() {
        return ReadOutcome::PeerClosed;
    }

    let mut words = [0u16; SNAPSHOT_WORDS];
    words[0] = first;
    for (i, pair) in rest.chunks_exact(WORD_SIZE).enumerate() {
        words[i + 1] = decode_word([pair[0], pair[1]]);
    }

    match decode_snapshot(&words) {
        Ok(table) => ReadOutcome::Ok(SnapshotReply::Table(table)),
        Err(err) => ReadOutcome::Invalid(err),
    }
}

/// Write an encoded frame and flush it
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await
        .context("Failed to write message")?;

    // Flush to ensure message is sent immediately
    writer.flush().await
        .context("Failed to flush stream")?;

    Ok(())
}
