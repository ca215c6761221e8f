//! Custom test assertions for integration tests

use ledger_import::{BalanceEvent, ImportEvent, ImportResult, Result};
use std::path::Path;
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Assert no run left a workspace (or anything else) behind under `temp_root`
pub fn assert_no_workspace(temp_root: &Path) {
    if !temp_root.exists() {
        return;
    }
    let leftovers: Vec<_> = WalkDir::new(temp_root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().to_path_buf())
        .collect();
    assert!(
        leftovers.is_empty(),
        "workspace not cleaned up, found: {leftovers:?}"
    );
}

/// Drive `run` to completion while draining its event channel
///
/// Returns the terminal result and every event received, in order.
pub async fn run_and_collect<F>(
    run: impl FnOnce(mpsc::Sender<ImportEvent>) -> F,
) -> (Result<ImportResult>, Vec<ImportEvent>)
where
    F: std::future::Future<Output = Result<ImportResult>>,
{
    let (tx, mut rx) = mpsc::channel(8);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });

    let result = run(tx).await;
    let events = collector.await.unwrap();
    (result, events)
}

/// Balance events only
pub fn balances(events: &[ImportEvent]) -> Vec<&BalanceEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            ImportEvent::Balance(b) => Some(b),
            _ => None,
        })
        .collect()
}

/// One-letter tag per event, for order assertions ("OBBP...")
pub fn event_kinds(events: &[ImportEvent]) -> String {
    events
        .iter()
        .map(|e| match e {
            ImportEvent::Organization(_) => 'O',
            ImportEvent::Balance(_) => 'B',
            ImportEvent::Payment(_) => 'P',
        })
        .collect()
}
