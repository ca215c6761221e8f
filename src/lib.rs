//! # ledger-import
//!
//! Conditional import of municipal ledger exports.
//!
//! A run downloads a ZIP archive only if it changed since the previous run
//! (`If-Modified-Since` / `If-None-Match`), unpacks `SK.csv` and `RU.csv`
//! into a private workspace, and turns every row into ordered
//! [`ImportEvent`]s: an optional organization, exactly one balance line and,
//! for invoice categories, a payment. The workspace is removed when the run
//! ends, whatever the outcome.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or storage; events go to a channel you own
//! - **Streaming** - Rows are read on demand, a slow consumer slows the reader
//! - **Sensible defaults** - [`ImporterConfig::default`] works out of the box
//!
//! ## Quick Start
//!
//! ```no_run
//! use ledger_import::{ImportRequest, Importer, ImporterConfig, RunId};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let importer = Importer::new(ImporterConfig::default())?;
//!     let request = ImportRequest::new("https://example.com/export/ledger.zip");
//!
//!     let mut handle = importer.spawn(request, RunId::new("nightly")?);
//!     while let Some(event) = handle.events.next().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     let result = handle.result.await??;
//!     // Persist result.last_modified / result.etag for the next run
//!     println!("modified: {}", result.modified);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Conditional HTTP fetch
pub mod fetch;
/// Run orchestration
pub mod importer;
/// Ledger row transformation
pub mod transform;
/// Core types and events
pub mod types;
/// Per-run temporary workspace
pub mod workspace;

// Re-export commonly used types
pub use config::{DeliveryMode, ImporterConfig};
pub use error::{Error, IsRetryable, Result};
pub use importer::{ImportHandle, Importer};
pub use transform::RowTransformer;
pub use types::{
    BalanceEvent, FetchOutcome, ImportEvent, ImportRequest, ImportResult, OrganizationEvent,
    PaymentEvent, RunId, RunState, SourceFile,
};

/// Wait for a spawned run, cancelling it on a termination signal.
///
/// The run still removes its workspace after cancellation; this function
/// returns once it has, with [`Error::Cancelled`] in that case.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use ledger_import::{ImportRequest, Importer, ImporterConfig, RunId, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let importer = Importer::new(ImporterConfig::default())?;
///     let handle = importer.spawn(
///         ImportRequest::new("https://example.com/ledger.zip"),
///         RunId::new("manual")?,
///     );
///     let ledger_import::ImportHandle { events, result, cancel } = handle;
///     tokio::spawn(async move {
///         use tokio_stream::StreamExt;
///         let mut events = events;
///         while let Some(event) = events.next().await {
///             println!("{event:?}");
///         }
///     });
///
///     run_with_shutdown(result, cancel).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    mut result: tokio::task::JoinHandle<Result<ImportResult>>,
    cancel: tokio_util::sync::CancellationToken,
) -> Result<ImportResult> {
    tokio::select! {
        joined = &mut result => return flatten_join(joined),
        _ = wait_for_signal() => {
            tracing::info!("cancelling import run");
            cancel.cancel();
        }
    }
    flatten_join(result.await)
}

fn flatten_join(
    joined: std::result::Result<Result<ImportResult>, tokio::task::JoinError>,
) -> Result<ImportResult> {
    joined.map_err(|e| Error::Io(std::io::Error::other(format!("import task failed: {e}"))))?
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        // Restricted environments (containers, tests) may refuse registration
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "could not register signal handlers, falling back to ctrl_c");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
