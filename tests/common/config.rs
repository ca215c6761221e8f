//! Importer and mock server setup shared by the integration tests

use ledger_import::{DeliveryMode, ImportRequest, Importer, ImporterConfig};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Route the mock server serves the archive on
pub const ARCHIVE_ROUTE: &str = "/export/ledger.zip";

/// Importer whose workspaces live under `temp_root`
pub fn test_importer(temp_root: &Path, delivery: DeliveryMode) -> Importer {
    Importer::new(ImporterConfig {
        temp_dir: temp_root.to_path_buf(),
        fetch_timeout: Duration::from_secs(10),
        connect_timeout: Duration::from_secs(5),
        delivery,
        ..Default::default()
    })
    .unwrap()
}

/// Request for [`ARCHIVE_ROUTE`] on `server`, without validators
pub fn archive_request(server: &MockServer) -> ImportRequest {
    ImportRequest::new(format!("{}{}", server.uri(), ARCHIVE_ROUTE))
}

/// Serve `body` with status 200 and cache validators
pub async fn serve_archive(server: &MockServer, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(ARCHIVE_ROUTE))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Fri, 01 Mar 2024 06:00:00 GMT")
                .insert_header("ETag", "\"ledger-2024-03\"")
                .insert_header("Content-Type", "application/zip")
                .set_body_bytes(body),
        )
        .mount(server)
        .await;
}

/// Answer every archive request with `status` and an empty body
pub async fn serve_status(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(ARCHIVE_ROUTE))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
