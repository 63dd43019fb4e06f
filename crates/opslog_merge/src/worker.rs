//! Request/response worker running the pipeline off the caller's thread.
//!
//! One request in, exactly one reply out. A second request while the first
//! is in flight is refused with [`PipelineError::RunInFlight`]; runs are not
//! cancelable and have no timeout.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use crate::pipeline::{SpecPipelineInput, SpecPipelineOutput, build_canonical_dataset};
use crate::sanitize::ColumnSanitizer;
use crate::spec::{AdminNote, PipelineError, RecurrenceWindow, SheetRows, SpecPipelineOptions};

/// Workbook decoding collaborator.
pub trait WorkbookParser: Send + Sync {
    /// Decode workbook bytes into sheets in enumeration order.
    ///
    /// Malformed content must fail with [`PipelineError::Parse`].
    fn parse_workbook(&self, workbook_bytes: &[u8]) -> Result<Vec<SheetRows>, PipelineError>;
}

/// Complete input of one worker run.
#[derive(Debug, Clone)]
pub struct SpecPipelineRequest {
    /// Raw workbook content.
    pub workbook_bytes: Vec<u8>,
    /// Admin notes in storage order.
    pub notes: Vec<AdminNote>,
    /// Window for weekly notes.
    pub window: RecurrenceWindow,
}

type TypePipelineReply = Result<SpecPipelineOutput, PipelineError>;

struct SpecWorkerJob {
    request: SpecPipelineRequest,
    reply: mpsc::SyncSender<TypePipelineReply>,
}

/// Handle to the single reply of one submitted request.
pub struct PipelineTicket {
    receiver: mpsc::Receiver<TypePipelineReply>,
}

impl PipelineTicket {
    /// Block until the run finishes.
    pub fn wait(self) -> TypePipelineReply {
        self.receiver
            .recv()
            .unwrap_or(Err(PipelineError::WorkerStopped))
    }
}

/// Dedicated pipeline thread with a strict one-in-flight policy.
pub struct PipelineWorker {
    sender: Option<mpsc::Sender<SpecWorkerJob>>,
    handle: Option<thread::JoinHandle<()>>,
    if_in_flight: Arc<AtomicBool>,
}

impl PipelineWorker {
    /// Start the worker thread.
    pub fn spawn(
        parser: Arc<dyn WorkbookParser>,
        sanitizer: Arc<dyn ColumnSanitizer>,
        options: SpecPipelineOptions,
    ) -> Self {
        let (sender, receiver) = mpsc::channel::<SpecWorkerJob>();
        let if_in_flight = Arc::new(AtomicBool::new(false));
        let if_in_flight_thread = Arc::clone(&if_in_flight);

        let handle = thread::spawn(move || {
            for job in receiver {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    run_request(parser.as_ref(), sanitizer.as_ref(), &options, job.request)
                }))
                .unwrap_or_else(|payload| Err(PipelineError::Panicked(describe_panic(payload))));

                if let Err(err) = &result {
                    tracing::warn!(target: "opslog_merge", stage = ?err.stage(), "pipeline run failed: {err}");
                }
                // Free the slot before replying so the caller may resubmit right away.
                if_in_flight_thread.store(false, Ordering::Release);
                let _ = job.reply.send(result);
            }
        });

        Self {
            sender: Some(sender),
            handle: Some(handle),
            if_in_flight,
        }
    }

    /// Submit one request; fails fast while another run is in flight.
    pub fn submit(&self, request: SpecPipelineRequest) -> Result<PipelineTicket, PipelineError> {
        if self
            .if_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineError::RunInFlight);
        }

        let Some(sender) = self.sender.as_ref() else {
            self.if_in_flight.store(false, Ordering::Release);
            return Err(PipelineError::WorkerStopped);
        };

        let (reply, receiver) = mpsc::sync_channel(1);
        if sender.send(SpecWorkerJob { request, reply }).is_err() {
            self.if_in_flight.store(false, Ordering::Release);
            return Err(PipelineError::WorkerStopped);
        }
        Ok(PipelineTicket { receiver })
    }

    /// Submit and block for the reply.
    pub fn run(&self, request: SpecPipelineRequest) -> TypePipelineReply {
        self.submit(request)?.wait()
    }

    /// Whether a run is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.if_in_flight.load(Ordering::Acquire)
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_request(
    parser: &dyn WorkbookParser,
    sanitizer: &dyn ColumnSanitizer,
    options: &SpecPipelineOptions,
    request: SpecPipelineRequest,
) -> TypePipelineReply {
    let SpecPipelineRequest {
        workbook_bytes,
        notes,
        window,
    } = request;
    let sheets = parser.parse_workbook(&workbook_bytes)?;
    build_canonical_dataset(
        SpecPipelineInput {
            sheets,
            notes,
            window,
        },
        sanitizer,
        options,
    )
}

fn describe_panic(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    "unknown panic payload".to_string()
}
