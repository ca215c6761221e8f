//! One-shot import example
//!
//! Runs a single import against a URL and prints every event as JSON:
//! - Building an importer from the default configuration
//! - Spawning a run and draining its event stream
//! - Cancelling cleanly on Ctrl+C
//!
//! ```bash
//! RUST_LOG=ledger_import=debug cargo run --example import_once -- https://example.com/ledger.zip
//! ```
//!
//! Pass the printed Last-Modified and ETag as the second and third argument
//! to try a conditional run.

use ledger_import::{ImportHandle, ImportRequest, Importer, ImporterConfig, RunId, run_with_shutdown};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ledger_import=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: import_once <url> [last-modified] [etag]");
        std::process::exit(2);
    };

    let mut request = ImportRequest::new(url);
    if let Some(last_modified) = args.next() {
        request.last_modified = Some(chrono::DateTime::parse_from_rfc2822(&last_modified)?.into());
    }
    request.etag = args.next();

    let importer = Importer::new(ImporterConfig::default())?;
    let run_id = RunId::new(format!("demo-{}", std::process::id()))?;

    let ImportHandle {
        mut events,
        result,
        cancel,
    } = importer.spawn(request, run_id);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("failed to encode event: {e}"),
            }
        }
    });

    let outcome = run_with_shutdown(result, cancel).await;
    printer.await?;

    let result = outcome?;
    eprintln!(
        "modified={} status={} {} events={} rows={}",
        result.modified,
        result.status_code,
        result.status_message,
        result.events_emitted,
        result.rows_processed
    );
    if let Some(last_modified) = &result.last_modified {
        eprintln!("last-modified: {last_modified}");
    }
    if let Some(etag) = &result.etag {
        eprintln!("etag: {etag}");
    }
    Ok(())
}
