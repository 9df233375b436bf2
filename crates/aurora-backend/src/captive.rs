//! Captive validator backend.
//!
//! Drives a validator subprocess through [`CoreRunner`] and frames its
//! metadata pipe into a deterministic `get_ledger` stream. Two modes:
//! - A bounded range starts the validator in catchup mode: it replays the
//!   requested segment in memory, streams it, and exits.
//! - An unbounded range starts the validator aligned to the previous
//!   checkpoint and follows the live network; the backend silently
//!   fast-forwards to the requested ledger.
//!
//! A reader thread decodes one frame at a time into a bounded channel of
//! capacity [`READ_AHEAD_BUFFER_SIZE`]. The small capacity is deliberate: a
//! full buffer blocks the pipe and backpressures the validator. In online
//! mode the caller must keep consuming roughly once per ledger close or the
//! validator falls behind the network.

use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use aurora_archive::HistoryArchive;
use aurora_types::{
    codec, is_checkpoint, prev_checkpoint, round_down_to_first_replay, CodecError, LedgerCloseMeta,
    LedgerRange, LEDGERS_PER_CHECKPOINT,
};
use tracing::{debug, warn};

use crate::error::{BackendError, BackendResult};
use crate::runner::{CaptiveCoreRunner, CoreExit, CoreRunner, ExitFlag};
use crate::traits::LedgerBackend;

/// Capacity of the read-ahead channel between the reader thread and the
/// consumer.
pub const READ_AHEAD_BUFFER_SIZE: usize = 2;

type MetaResult = Result<LedgerCloseMeta, BackendError>;
type RunnerFactory = Box<dyn Fn(Option<PathBuf>) -> BackendResult<Box<dyn CoreRunner>> + Send>;

/// Static configuration for [`CaptiveCoreBackend`].
#[derive(Clone, Debug)]
pub struct CaptiveConfig {
    pub executable_path: PathBuf,
    /// Operator-supplied validator config. Required for online mode; offline
    /// catchup generates its own.
    pub config_path: Option<PathBuf>,
    pub network_passphrase: String,
    pub history_urls: Vec<String>,
}

struct StreamSession {
    runner: Box<dyn CoreRunner>,
    meta_rx: Option<Receiver<MetaResult>>,
    /// Number of items currently sitting in the read-ahead channel.
    buffered: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    /// Child-exit outcome as observed by the reader thread when a pipe read
    /// failed. Distinguishes "exited" from a plain framing error.
    observed_exit: Arc<ExitFlag>,
    reader: Option<JoinHandle<()>>,
}

/// Ledger backend over a captive validator subprocess.
pub struct CaptiveCoreBackend {
    archive: Arc<dyn HistoryArchive>,
    config_path: Option<PathBuf>,
    runner_factory: RunnerFactory,

    session: Option<StreamSession>,
    cached_meta: Option<LedgerCloseMeta>,

    /// Blocking mode: `get_ledger` waits for the requested ledger instead of
    /// returning `None`. On for bounded ranges and during fast-forward.
    blocking: bool,
    /// Next sequence expected off the stream; 0 means no session.
    next_ledger: u32,
    /// End of the current segment for bounded mode, `None` when online.
    last_ledger: Option<u32>,

    /// Poll interval while waiting for the first buffered ledger during
    /// `prepare_range`. Lowered in tests.
    wait_interval: Duration,
}

impl CaptiveCoreBackend {
    pub fn new(config: CaptiveConfig, archive: Arc<dyn HistoryArchive>) -> Self {
        let CaptiveConfig {
            executable_path,
            config_path,
            network_passphrase,
            history_urls,
        } = config;
        let factory: RunnerFactory = Box::new(move |conf| {
            let runner = CaptiveCoreRunner::new(
                executable_path.clone(),
                conf,
                network_passphrase.clone(),
                history_urls.clone(),
            )?;
            Ok(Box::new(runner) as Box<dyn CoreRunner>)
        });
        Self::with_runner_factory(archive, config_path, factory)
    }

    fn with_runner_factory(
        archive: Arc<dyn HistoryArchive>,
        config_path: Option<PathBuf>,
        runner_factory: RunnerFactory,
    ) -> Self {
        Self {
            archive,
            config_path,
            runner_factory,
            session: None,
            cached_meta: None,
            blocking: false,
            next_ledger: 0,
            last_ledger: None,
            wait_interval: Duration::from_secs(1),
        }
    }

    fn is_closed(&self) -> bool {
        self.next_ledger == 0
    }

    fn latest_checkpoint(&self) -> BackendResult<u32> {
        Ok(self.archive.root_state()?.current_ledger)
    }

    fn open_offline_replay(&mut self, from: u32, to: u32) -> BackendResult<()> {
        self.close()?;

        let latest = self.latest_checkpoint()?;
        if from > latest {
            return Err(BackendError::AheadOfArchive { from, latest });
        }
        let to = to.min(latest);

        let mut runner = (self.runner_factory)(None)?;
        runner.catchup(from, to)?;

        self.next_ledger = round_down_to_first_replay(from);
        self.last_ledger = Some(to);
        self.blocking = true;
        self.start_session(runner, Some(to))?;
        debug!(from, to, next = self.next_ledger, "prepared bounded replay");
        Ok(())
    }

    fn open_online_replay(&mut self, from: u32) -> BackendResult<()> {
        // An existing unbounded session behind the request can be reused;
        // get_ledger fast-forwards to it.
        if self.last_ledger.is_none() && self.next_ledger != 0 && self.next_ledger <= from {
            return Ok(());
        }

        self.close()?;

        let latest = self.latest_checkpoint()?;
        // More than two checkpoints ahead of the archive means an operator
        // mistake, not archive lag.
        let max_ledger = latest + 2 * LEDGERS_PER_CHECKPOINT;
        if from > max_ledger {
            return Err(BackendError::TooFarAhead { latest });
        }

        let config_path = self
            .config_path
            .clone()
            .ok_or(BackendError::MissingConfig)?;

        let (run_from, ledger_hash, next_ledger) = self.run_from_params(from)?;

        let mut runner = (self.runner_factory)(Some(config_path))?;
        runner.run_from(run_from, &ledger_hash)?;

        self.next_ledger = next_ledger;
        self.last_ledger = None;
        self.blocking = false;
        self.start_session(runner, None)?;
        debug!(from, run_from, next_ledger, "prepared online session");

        if self.next_ledger < from {
            // Consume the gap between the checkpoint restart point and the
            // requested ledger before handing the stream to the caller.
            self.blocking = true;
            let result = self.get_ledger(from);
            self.blocking = false;
            result?;
        }
        Ok(())
    }

    /// Startup alignment for online mode: which ledger to restart the
    /// validator at, the hash to pin it to, and the first sequence it will
    /// stream.
    fn run_from_params(&self, from: u32) -> BackendResult<(u32, String, u32)> {
        if from == 1 {
            // The validator refuses "catch up to 1"; genesis comes from the
            // archive's synthetic reader instead.
            return Err(BackendError::StartFromGenesis);
        }

        let (start, next_ledger) = if from <= 63 {
            // Before the first checkpoint the validator always streams from
            // ledger 2. Starting at 3 sidesteps its refusal to start from 1
            // while the stream still begins at 2.
            (3, 2)
        } else {
            let checkpoint = if is_checkpoint(from) {
                from
            } else {
                prev_checkpoint(from)
            };
            (checkpoint, (checkpoint - 63).max(2))
        };

        let run_from = start - 1;
        let header = self.archive.ledger_header(start)?;
        let ledger_hash = hex::encode(header.previous_ledger_hash);
        Ok((run_from, ledger_hash, next_ledger))
    }

    fn start_session(
        &mut self,
        mut runner: Box<dyn CoreRunner>,
        until_sequence: Option<u32>,
    ) -> BackendResult<()> {
        let pipe = runner
            .take_meta_pipe()
            .ok_or(BackendError::MissingMetaPipe)?;
        let exit = runner.exit_flag();

        let (tx, rx) = mpsc::sync_channel(READ_AHEAD_BUFFER_SIZE);
        let buffered = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));
        let observed_exit = Arc::new(ExitFlag::new());

        let reader = std::thread::spawn({
            let shutdown = Arc::clone(&shutdown);
            let buffered = Arc::clone(&buffered);
            let observed_exit = Arc::clone(&observed_exit);
            move || {
                run_reader(
                    pipe,
                    tx,
                    until_sequence.unwrap_or(0),
                    shutdown,
                    exit,
                    observed_exit,
                    buffered,
                )
            }
        });

        self.session = Some(StreamSession {
            runner,
            meta_rx: Some(rx),
            buffered,
            shutdown,
            observed_exit,
            reader: Some(reader),
        });
        Ok(())
    }

    /// Pull the next item off the read-ahead buffer. `Ok(None)` means the
    /// buffer is empty and the backend is non-blocking.
    fn next_meta_result(&mut self) -> BackendResult<Option<MetaResult>> {
        let session = self.session.as_ref().ok_or(BackendError::Closed)?;
        let rx = session.meta_rx.as_ref().ok_or(BackendError::Closed)?;
        if self.blocking {
            match rx.recv() {
                Ok(item) => {
                    session.buffered.fetch_sub(1, Ordering::SeqCst);
                    Ok(Some(item))
                }
                Err(_) => Err(BackendError::Closed),
            }
        } else {
            match rx.try_recv() {
                Ok(item) => {
                    session.buffered.fetch_sub(1, Ordering::SeqCst);
                    Ok(Some(item))
                }
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(BackendError::Closed),
            }
        }
    }
}

impl LedgerBackend for CaptiveCoreBackend {
    fn prepare_range(&mut self, range: LedgerRange) -> BackendResult<()> {
        if self.is_prepared(range)? {
            return Ok(());
        }

        if range.bounded {
            self.open_offline_replay(range.from, range.to)?;
        } else {
            self.open_online_replay(range.from)?;
        }

        // Block until the first ledger is buffered or the child exits.
        loop {
            let Some(session) = &self.session else {
                return Ok(());
            };
            if session.buffered.load(Ordering::SeqCst) > 0 {
                if let Some(outcome) = session.observed_exit.get() {
                    return Err(child_exit_error(outcome));
                }
                return Ok(());
            }
            std::thread::sleep(self.wait_interval);
        }
    }

    fn is_prepared(&mut self, range: LedgerRange) -> BackendResult<bool> {
        if self.next_ledger == 0 {
            return Ok(false);
        }
        match self.last_ledger {
            // Online session: serves any range starting at or after the
            // stream position.
            None => Ok(self.next_ledger <= range.from),
            // Bounded session only serves bounded requests within the
            // segment.
            Some(last) => {
                Ok(range.bounded && self.next_ledger <= range.from && self.next_ledger <= last)
            }
        }
    }

    fn get_ledger(&mut self, sequence: u32) -> BackendResult<Option<LedgerCloseMeta>> {
        // Repeated requests for the last returned ledger are served from the
        // cache, e.g. to create change and transaction readers over the same
        // sequence.
        if let Some(cached) = &self.cached_meta {
            if cached.sequence() == sequence {
                return Ok(Some(cached.clone()));
            }
        }

        if self.is_closed() {
            return Err(BackendError::Closed);
        }

        if sequence < self.next_ledger {
            return Err(BackendError::BehindStream {
                requested: sequence,
                expected: self.next_ledger,
            });
        }

        loop {
            let item = match self.next_meta_result()? {
                Some(item) => item,
                None => return Ok(None),
            };

            let meta = match item {
                Ok(meta) => meta,
                Err(err) => {
                    let _ = self.close();
                    return Err(err);
                }
            };

            let actual = meta.sequence();
            if actual != self.next_ledger {
                let expected = self.next_ledger;
                let _ = self.close();
                return Err(BackendError::UnexpectedLedger { expected, actual });
            }
            self.next_ledger += 1;

            if actual == sequence {
                self.cached_meta = Some(meta.clone());
                // Delivered the end of a bounded segment: tear the session
                // down before handing the ledger out.
                if self.last_ledger == Some(actual) {
                    self.close()?;
                }
                return Ok(Some(meta));
            }
        }
    }

    fn latest_sequence(&mut self) -> BackendResult<u32> {
        if self.is_closed() {
            return Err(BackendError::Closed);
        }
        match self.last_ledger {
            Some(last) => Ok(last),
            None => {
                let buffered = self
                    .session
                    .as_ref()
                    .map(|s| s.buffered.load(Ordering::SeqCst))
                    .unwrap_or(0);
                Ok(self.next_ledger - 1 + buffered as u32)
            }
        }
    }

    fn close(&mut self) -> BackendResult<()> {
        self.next_ledger = 0;
        self.last_ledger = None;

        if let Some(mut session) = self.session.take() {
            session.shutdown.store(true, Ordering::SeqCst);
            // Dropping the receiver unblocks a reader stuck on a full buffer.
            drop(session.meta_rx.take());
            match session.runner.close() {
                Ok(()) => {
                    if let Some(reader) = session.reader.take() {
                        let _ = reader.join();
                    }
                }
                Err(e) => {
                    // The reader may still be blocked on a live pipe; joining
                    // it could hang, so leave it to exit on its own.
                    warn!(error = %e, "error closing captive core session");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl Drop for CaptiveCoreBackend {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn child_exit_error(outcome: CoreExit) -> BackendError {
    match outcome {
        CoreExit::Clean => BackendError::ChildExitedCleanly,
        CoreExit::Failed(cause) => BackendError::ChildExitedWithError(cause),
    }
}

/// Reader-thread loop: decode frames off the pipe into the read-ahead
/// channel until shutdown, EOF, a read error, or (bounded mode) the last
/// in-range ledger was delivered.
fn run_reader(
    mut pipe: Box<dyn Read + Send>,
    tx: SyncSender<MetaResult>,
    until_sequence: u32,
    shutdown: Arc<AtomicBool>,
    exit: Arc<ExitFlag>,
    observed_exit: Arc<ExitFlag>,
    buffered: Arc<AtomicUsize>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }

        match codec::read_framed(&mut pipe) {
            Ok((meta, _)) => {
                let sequence = meta.sequence();
                buffered.fetch_add(1, Ordering::SeqCst);
                if tx.send(Ok(meta)).is_err() {
                    buffered.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
                if until_sequence != 0 && sequence >= until_sequence {
                    return;
                }
            }
            Err(read_err) => {
                if shutdown.load(Ordering::SeqCst) {
                    return;
                }
                // A read error right after the child exited is reported as
                // the exit, not as a framing problem.
                let err = match exit.get() {
                    Some(outcome) => {
                        observed_exit.set(outcome.clone());
                        child_exit_error(outcome)
                    }
                    None => match read_err {
                        CodecError::Eof => BackendError::UnexpectedEof,
                        other => BackendError::Framing(other.to_string()),
                    },
                };
                // The consumer sees the error once the buffered ledgers ahead
                // of it are drained.
                buffered.fetch_add(1, Ordering::SeqCst);
                if tx.send(Err(err)).is_err() {
                    buffered.fetch_sub(1, Ordering::SeqCst);
                }
                return;
            }
        }
    }
}
