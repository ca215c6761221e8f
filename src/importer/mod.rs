//! Import run orchestration
//!
//! One run walks through these stages strictly in order:
//! 1. Workspace - create `<temp_dir>/autoImport_<run_id>`
//! 2. Fetch - conditional GET of the archive into the workspace
//! 3. Extract - unpack SK.csv and RU.csv (skipped when not modified)
//! 4. Transform - stream the events of SK.csv, then RU.csv
//! 5. Cleanup - remove the workspace, whatever happened before

use crate::config::{DeliveryMode, ImporterConfig};
use crate::error::{Error, Result};
use crate::extraction::{check_members, extract_archive};
use crate::fetch::Fetcher;
use crate::transform::RowTransformer;
use crate::types::{FetchOutcome, ImportEvent, ImportRequest, ImportResult, RunId, RunState, SourceFile};
use crate::workspace::Workspace;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, spawn_blocking};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;


/// Runs imports; cheap to clone, clones share the HTTP client
#[derive(Clone, Debug)]
pub struct Importer {
    config: Arc<ImporterConfig>,
    fetcher: Fetcher,
}

/// A run spawned onto the runtime
#[derive(Debug)]
pub struct ImportHandle {
    /// Events in emission order; ends when the run finishes
    pub events: ReceiverStream<ImportEvent>,
    /// Terminal result of the run
    pub result: JoinHandle<Result<ImportResult>>,
    /// Cancels the run; the workspace is still cleaned up
    pub cancel: CancellationToken,
}

/// Counters collected while transforming
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct TransformStats {
    events_emitted: u64,
    rows_processed: u64,
}

/// Mutable state of one run, threaded through the stages
struct RunContext<'a> {
    run_id: &'a RunId,
    state: RunState,
    stats: TransformStats,
}

impl<'a> RunContext<'a> {
    fn new(run_id: &'a RunId) -> Self {
        Self {
            run_id,
            state: RunState::Idle,
            stats: TransformStats::default(),
        }
    }

    fn advance(&mut self, next: RunState) {
        debug!(run_id = %self.run_id, from = ?self.state, to = ?next, "run state changed");
        self.state = next;
    }

    fn fail(&mut self, error: &Error) {
        warn!(
            run_id = %self.run_id,
            stage = ?self.state,
            error_code = error.error_code(),
            error = %error,
            "import run failed"
        );
        self.state = RunState::Failed;
    }
}

impl Importer {
    /// Validate the configuration and build the HTTP client
    pub fn new(config: ImporterConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
        })
    }

    /// Configuration this importer was built with
    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// Run one import, sending events to `sink`
    ///
    /// See [`Importer::run_with_cancel`].
    pub async fn run(
        &self,
        request: ImportRequest,
        run_id: &RunId,
        sink: mpsc::Sender<ImportEvent>,
    ) -> Result<ImportResult> {
        self.run_with_cancel(request, run_id, sink, CancellationToken::new())
            .await
    }

    /// Run one import that can be aborted through `cancel`
    ///
    /// The workspace is removed before this returns, on success and on
    /// failure. When a stage fails and the cleanup fails too, the stage error
    /// is returned and the cleanup error only logged.
    ///
    /// With [`DeliveryMode::Streaming`] a failed run may already have sent
    /// events; they must be discarded by the consumer.
    pub async fn run_with_cancel(
        &self,
        request: ImportRequest,
        run_id: &RunId,
        sink: mpsc::Sender<ImportEvent>,
        cancel: CancellationToken,
    ) -> Result<ImportResult> {
        let mut ctx = RunContext::new(run_id);

        let prepared = request
            .validate()
            .and_then(|url| Ok((url, request.delimiter_byte()?)));
        let (url, delimiter) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                ctx.fail(&e);
                return Err(e);
            }
        };

        info!(%run_id, %url, delivery = ?self.config.delivery, "starting import run");

        let workspace = match Workspace::create(&self.config.temp_dir, run_id).await {
            Ok(workspace) => workspace,
            Err(e) => {
                ctx.fail(&e);
                return Err(e);
            }
        };
        ctx.advance(RunState::WorkspaceCreated);

        let staged = self
            .run_stages(&mut ctx, &workspace, &url, &request, delimiter, &sink, &cancel)
            .await;
        let cleanup = workspace.destroy().await;

        match (staged, cleanup) {
            (Ok(fetch), Ok(())) => {
                ctx.advance(RunState::CleanedUp);
                let result = ImportResult {
                    modified: fetch.modified,
                    status_code: fetch.status_code,
                    status_message: fetch.status_message,
                    last_modified: fetch.last_modified,
                    etag: fetch.etag,
                    events_emitted: ctx.stats.events_emitted,
                    rows_processed: ctx.stats.rows_processed,
                };
                info!(
                    %run_id,
                    modified = result.modified,
                    events_emitted = result.events_emitted,
                    rows_processed = result.rows_processed,
                    "import run finished"
                );
                Ok(result)
            }
            (Ok(_), Err(cleanup_error)) => {
                ctx.fail(&cleanup_error);
                Err(cleanup_error)
            }
            (Err(e), Ok(())) => {
                ctx.fail(&e);
                Err(e)
            }
            (Err(e), Err(cleanup_error)) => {
                warn!(%run_id, error = %cleanup_error, "workspace cleanup failed after run error");
                ctx.fail(&e);
                Err(e)
            }
        }
    }

    /// Spawn a run onto the runtime and hand back its event stream
    ///
    /// The event channel holds at most `event_buffer` events; a consumer that
    /// stops reading pauses the run.
    pub fn spawn(&self, request: ImportRequest, run_id: RunId) -> ImportHandle {
        let (tx, rx) = mpsc::channel(self.config.event_buffer);
        let cancel = CancellationToken::new();

        let importer = self.clone();
        let token = cancel.clone();
        let result =
            tokio::spawn(async move { importer.run_with_cancel(request, &run_id, tx, token).await });

        ImportHandle {
            events: ReceiverStream::new(rx),
            result,
            cancel,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_stages(
        &self,
        ctx: &mut RunContext<'_>,
        workspace: &Workspace,
        url: &Url,
        request: &ImportRequest,
        delimiter: u8,
        sink: &mpsc::Sender<ImportEvent>,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome> {
        let archive_path = workspace.archive_path();

        let fetch = self
            .fetcher
            .fetch(url, request, &archive_path, cancel)
            .await?;
        ctx.advance(RunState::Fetched);

        if !fetch.modified {
            info!(run_id = %ctx.run_id, status = fetch.status_code, "archive not modified, nothing to import");
            ctx.advance(RunState::Extracted);
            ctx.advance(RunState::Parsed);
            return Ok(fetch);
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let extracted = extract_archive(&archive_path, workspace.path()).await?;
        check_members(
            &archive_path,
            workspace.path(),
            &extracted,
            self.config.strict_members,
        )?;
        ctx.advance(RunState::Extracted);

        let files = SourceFile::ALL
            .into_iter()
            .map(|file| (file, workspace.member_path(file)))
            .collect();
        ctx.stats = self
            .transform_files(files, delimiter, sink.clone(), cancel.clone())
            .await?;
        ctx.advance(RunState::Parsed);

        Ok(fetch)
    }

    /// Transform the source files on the blocking pool
    async fn transform_files(
        &self,
        files: Vec<(SourceFile, PathBuf)>,
        delimiter: u8,
        sink: mpsc::Sender<ImportEvent>,
        cancel: CancellationToken,
    ) -> Result<TransformStats> {
        let delivery = self.config.delivery;
        let runtime = Handle::current();

        spawn_blocking(move || {
            let sender = EventSender {
                runtime,
                sink,
                cancel,
            };
            transform_blocking(&files, delimiter, delivery, &sender)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("transform task panicked: {e}"))))?
    }
}

/// Blocking side of the event channel
struct EventSender {
    runtime: Handle,
    sink: mpsc::Sender<ImportEvent>,
    cancel: CancellationToken,
}

impl EventSender {
    /// Send one event, waiting for channel capacity unless the run is cancelled
    fn send(&self, event: ImportEvent) -> Result<()> {
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(Error::Cancelled),
                sent = self.sink.send(event) => sent.map_err(|_| Error::ConsumerGone),
            }
        })
    }
}

fn transform_blocking(
    files: &[(SourceFile, PathBuf)],
    delimiter: u8,
    delivery: DeliveryMode,
    sender: &EventSender,
) -> Result<TransformStats> {
    let mut stats = TransformStats::default();
    let mut held = Vec::new();

    for (file, path) in files {
        let mut rows = RowTransformer::open(path, *file, delimiter)?;

        for event in rows.by_ref() {
            if sender.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let event = event?;
            match delivery {
                DeliveryMode::Streaming => {
                    sender.send(event)?;
                    stats.events_emitted += 1;
                }
                DeliveryMode::Buffered => held.push(event),
            }
        }

        stats.rows_processed += rows.rows_processed();
        debug!(%file, rows = rows.rows_processed(), "source file transformed");
    }

    if !held.is_empty() {
        debug!(events = held.len(), "releasing buffered events");
    }
    for event in held {
        sender.send(event)?;
        stats.events_emitted += 1;
    }

    Ok(stats)
}
