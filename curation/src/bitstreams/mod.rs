//! The `post-bitstreams` tool.
//!
//! For every `id,filename,bundle` row the target bundle of the item is
//! inspected first:
//!
//! ```text
//! bundle empty                         -> upload
//! bundle occupied, no overwrite        -> skip
//! bundle occupied, overwrite formats   -> delete matching formats, upload
//! item not readable                    -> skip
//! ```
//!
//! Rerunning a finished CSV uploads nothing, since every bundle is occupied.

use std::path::Path;

use tracing::debug;
use uuid::Uuid;

use crate::config::PostConfig;
use crate::error::{RestError, RestResult, ToolResult};
use crate::input::{read_csv_file, CsvRecord};
use crate::interrupt::run_until_interrupted;
use crate::report::Reporter;
use crate::rest::types::BitstreamFormat;
use crate::rest::{BitstreamUpload, ItemLookup, RestClient, Session};

/// Columns every input CSV must have
pub const REQUIRED_COLUMNS: [&str; 3] = ["id", "filename", "bundle"];

/// Marks an inline description in the filename column
const DESCRIPTION_MARKER: &str = "__description:";

/// A filename cell, split into the file and its optional description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameSpec {
    pub filename: String,
    pub description: Option<String>,
}

impl FilenameSpec {
    /// `"file1.pdf__description:Report"` gives `file1.pdf` and `Report`.
    pub fn parse(cell: &str) -> Self {
        match cell.split_once(DESCRIPTION_MARKER) {
            Some((filename, description)) => Self {
                filename: filename.to_string(),
                description: (!description.is_empty()).then(|| description.to_string()),
            },
            None => Self {
                filename: cell.to_string(),
                description: None,
            },
        }
    }
}

/// State of the target bundle after inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    /// Nothing in the bundle, or everything overwritable was removed.
    NeedsUpload,
    /// Leave the bundle as it is.
    Occupied,
}

/// Outcome of one CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Uploaded,
    SkippedExisting,
    SkippedDryRun,
    Failed(String),
}

/// Counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSummary {
    pub uploaded: usize,
    pub skipped_existing: usize,
    pub skipped_dry_run: usize,
    pub failed: usize,
}

impl PostSummary {
    fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Uploaded => self.uploaded += 1,
            RowOutcome::SkippedExisting => self.skipped_existing += 1,
            RowOutcome::SkippedDryRun => self.skipped_dry_run += 1,
            RowOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Find a session to use for the run.
///
/// A supplied token is kept if the server still accepts it. Otherwise log
/// in, which needs both email and password.
pub async fn resolve_session(
    client: &RestClient,
    config: &PostConfig,
    reporter: &Reporter,
) -> RestResult<Session> {
    if let Some(token) = config.jsessionid.as_deref().filter(|t| !t.is_empty()) {
        let session = Session::new(token);
        if client.check_session(&session).await? {
            return Ok(session);
        }
        reporter.warning(format!("Session expired: {}", token));
    }

    let (Some(email), Some(password)) = (config.user.as_deref(), config.password.as_deref()) else {
        return Err(RestError::MissingCredentials);
    };

    reporter.info("Logging in...");
    client.login(email, password).await
}

/// Inspect the bundle of an item, deleting overwritable bitstreams first.
pub async fn inspect_bundle(
    client: &RestClient,
    item_id: &Uuid,
    bundle: &str,
    config: &PostConfig,
    reporter: &Reporter,
) -> RestResult<BundleState> {
    let item = match client.get_item(item_id).await? {
        ItemLookup::Found(item) => item,
        ItemLookup::Unavailable(status) => {
            debug!("Item {} not readable (HTTP {}), skipping", item_id, status);
            return Ok(BundleState::Occupied);
        }
    };

    let existing: Vec<_> = item.bitstreams_in_bundle(bundle).collect();
    if existing.is_empty() {
        return Ok(BundleState::NeedsUpload);
    }

    if !config.overwrites() {
        debug!("Skipping item with existing bitstream(s) in {} bundle", bundle);
        return Ok(BundleState::Occupied);
    }

    for bitstream in existing
        .into_iter()
        .filter(|b| BitstreamFormat::matches_any(&config.overwrite_formats, &b.format))
    {
        if config.mode.dry_run {
            reporter.info(format!(
                "> (DRY RUN) Deleting bitstream: {} ({})",
                bitstream.name, bitstream.uuid
            ));
        } else if client.delete_bitstream(&bitstream.uuid).await? {
            reporter.info(format!("> Deleted bitstream: {} ({})", bitstream.name, bitstream.uuid));
        } else {
            reporter.warning(format!(
                "> Could not delete bitstream: {} ({})",
                bitstream.name, bitstream.uuid
            ));
        }
    }

    Ok(BundleState::NeedsUpload)
}

/// Upload the file named in a row to the item.
async fn upload(
    client: &RestClient,
    item_id: &Uuid,
    bundle: &str,
    spec: &FilenameSpec,
    files_dir: &Path,
    reporter: &Reporter,
) -> RestResult<RowOutcome> {
    let local_path = files_dir.join(&spec.filename);
    let body = match tokio::fs::read(&local_path).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Reading {}: {}", local_path.display(), e);
            reporter.error(format!("> Could not open {}", spec.filename));
            return Ok(RowOutcome::Failed(format!("could not open {}", spec.filename)));
        }
    };

    let request = BitstreamUpload {
        name: spec.filename.clone(),
        bundle_name: bundle.to_string(),
        description: spec.description.clone(),
    };

    match client.upload_bitstream(item_id, &request, body).await? {
        200 => {
            reporter.success(format!("> Uploaded file: {} ({})", spec.filename, bundle));
            Ok(RowOutcome::Uploaded)
        }
        status => {
            reporter.error(format!("> Error uploading file: {}", spec.filename));
            Ok(RowOutcome::Failed(format!("upload rejected (HTTP {})", status)))
        }
    }
}

/// Reconcile one CSV row with the repository.
pub async fn process_row(
    client: &RestClient,
    record: &CsvRecord,
    config: &PostConfig,
    reporter: &Reporter,
) -> RestResult<RowOutcome> {
    let raw_id = record.get("id").trim();
    let bundle = record.get("bundle").trim();

    reporter.info(format!("{}: checking for existing bitstreams in {} bundle", raw_id, bundle));

    let item_id = match Uuid::parse_str(raw_id) {
        Ok(id) => id,
        Err(_) => {
            reporter.error(format!("> Invalid item id: {}", raw_id));
            return Ok(RowOutcome::Failed(format!("invalid item id {:?}", raw_id)));
        }
    };

    if inspect_bundle(client, &item_id, bundle, config, reporter).await? == BundleState::Occupied {
        return Ok(RowOutcome::SkippedExisting);
    }

    let spec = FilenameSpec::parse(record.get("filename"));

    if config.mode.dry_run {
        reporter.info(format!("> (DRY RUN) Uploading file: {}", spec.filename));
        return Ok(RowOutcome::SkippedDryRun);
    }

    upload(client, &item_id, bundle, &spec, &config.files_dir, reporter).await
}

/// Process every row in order. A REST connection failure stops the run.
pub async fn post_rows(
    client: &RestClient,
    records: &[CsvRecord],
    config: &PostConfig,
    reporter: &Reporter,
) -> ToolResult<PostSummary> {
    let mut summary = PostSummary::default();
    for record in records {
        let outcome = process_row(client, record, config, reporter).await?;
        if let RowOutcome::Failed(reason) = &outcome {
            debug!("Row failed: {}", reason);
        }
        summary.record(&outcome);
    }
    Ok(summary)
}

/// Run `post-bitstreams` end to end.
pub async fn run(config: &PostConfig, reporter: &Reporter) -> ToolResult<PostSummary> {
    let table = read_csv_file(&config.csv_file)?;
    table.require_columns(&REQUIRED_COLUMNS)?;
    debug!("Opened {}", config.csv_file.display());

    let mut client = RestClient::new(&config.rest_url);
    let session = resolve_session(&client, config, reporter).await?;
    client.set_session(session);

    let summary =
        run_until_interrupted(post_rows(&client, &table.records, config, reporter)).await?;

    reporter.info(format!(
        "Uploaded {}, skipped {} existing, {} dry run, failed {}",
        summary.uploaded, summary.skipped_existing, summary.skipped_dry_run, summary.failed
    ));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use crate::input::parse_csv;
    use std::path::PathBuf;
    use wiremock::matchers::{body_bytes, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ITEM_X: &str = "21c0db9d-6c35-4111-9ca1-2c1345f44e40";
    const ITEM_Y: &str = "804351af-64eb-4e4a-968f-4d3be61358a8";
    const PDF_ID: &str = "fca0fd2a-630e-4a34-b260-f645c8f2b027";

    fn config(rest_url: String, files_dir: PathBuf) -> PostConfig {
        PostConfig {
            csv_file: files_dir.join("bitstreams.csv"),
            rest_url,
            user: None,
            password: None,
            jsessionid: None,
            overwrite_formats: Vec::new(),
            files_dir,
            mode: RunMode::default(),
        }
    }

    fn records(csv: &str) -> Vec<CsvRecord> {
        parse_csv(csv, ',').unwrap().records
    }

    async fn mock_item(server: &MockServer, id: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/rest/items/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(server)
            .await;
    }

    fn occupied_item() -> String {
        format!(
            r#"{{"bitstreams":[
                {{"uuid":"{}","name":"old.pdf","bundleName":"ORIGINAL","format":"Adobe PDF"}}
            ]}}"#,
            PDF_ID
        )
    }

    #[test]
    fn test_filename_description() {
        let spec = FilenameSpec::parse("file1.pdf__description:Report");
        assert_eq!(spec.filename, "file1.pdf");
        assert_eq!(spec.description.as_deref(), Some("Report"));

        let spec = FilenameSpec::parse("file2.pdf");
        assert_eq!(spec.filename, "file2.pdf");
        assert_eq!(spec.description, None);

        assert_eq!(FilenameSpec::parse("file3.pdf__description:").description, None);
    }

    #[tokio::test]
    async fn test_uploads_into_empty_bundle() {
        let server = MockServer::start().await;
        mock_item(&server, ITEM_X, r#"{"bitstreams":[]}"#).await;
        Mock::given(method("POST"))
            .and(path(format!("/rest/items/{}/bitstreams", ITEM_X)))
            .and(query_param("name", "file.pdf"))
            .and(query_param("bundleName", "ORIGINAL"))
            .and(body_bytes(b"%PDF-1.4".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.pdf"), b"%PDF-1.4").unwrap();
        let config = config(format!("{}/rest", server.uri()), dir.path().to_path_buf());
        let client = RestClient::new(&config.rest_url);

        let rows = records(&format!("id,filename,bundle\n{},file.pdf,ORIGINAL\n", ITEM_X));
        let summary = post_rows(&client, &rows, &config, &Reporter::new(true)).await.unwrap();
        assert_eq!(summary.uploaded, 1);
    }

    #[tokio::test]
    async fn test_occupied_bundle_is_skipped() {
        let server = MockServer::start().await;
        mock_item(&server, ITEM_Y, &occupied_item()).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file.pdf"), b"data").unwrap();
        let config = config(format!("{}/rest", server.uri()), dir.path().to_path_buf());
        let client = RestClient::new(&config.rest_url);

        let rows = records(&format!("id,filename,bundle\n{},file.pdf,ORIGINAL\n", ITEM_Y));
        let summary = post_rows(&client, &rows, &config, &Reporter::new(true)).await.unwrap();
        assert_eq!(summary.skipped_existing, 1);
        assert_eq!(summary.uploaded, 0);
    }

    #[tokio::test]
    async fn test_overwrite_deletes_matching_formats() {
        let server = MockServer::start().await;
        mock_item(&server, ITEM_Y, &occupied_item()).await;
        Mock::given(method("DELETE"))
            .and(path(format!("/rest/bitstreams/{}", PDF_ID)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(query_param("description", "Report"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("new.pdf"), b"data").unwrap();
        let mut config = config(format!("{}/rest", server.uri()), dir.path().to_path_buf());
        config.overwrite_formats = vec![BitstreamFormat::AdobePdf];
        let client = RestClient::new(&config.rest_url);

        let rows = records(&format!(
            "id,filename,bundle\n{},new.pdf__description:Report,ORIGINAL\n",
            ITEM_Y
        ));
        let summary = post_rows(&client, &rows, &config, &Reporter::new(true)).await.unwrap();
        assert_eq!(summary.uploaded, 1);
    }

    #[tokio::test]
    async fn test_dry_run_mutates_nothing() {
        let server = MockServer::start().await;
        mock_item(&server, ITEM_Y, &occupied_item()).await;
        mock_item(&server, ITEM_X, r#"{"bitstreams":[]}"#).await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = config(format!("{}/rest", server.uri()), dir.path().to_path_buf());
        config.overwrite_formats = vec![BitstreamFormat::AdobePdf];
        config.mode.dry_run = true;
        let client = RestClient::new(&config.rest_url);

        let rows = records(&format!(
            "id,filename,bundle\n{y},a.pdf,ORIGINAL\n{x},b.pdf,ORIGINAL\n",
            y = ITEM_Y,
            x = ITEM_X
        ));
        let summary = post_rows(&client, &rows, &config, &Reporter::new(true)).await.unwrap();
        assert_eq!(summary.skipped_dry_run, 2);
    }

    #[tokio::test]
    async fn test_row_failures_do_not_stop_the_run() {
        let server = MockServer::start().await;
        mock_item(&server, ITEM_X, r#"{"bitstreams":[]}"#).await;
        Mock::given(method("GET"))
            .and(path(format!("/rest/items/{}", ITEM_Y)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(format!("{}/rest", server.uri()), dir.path().to_path_buf());
        let client = RestClient::new(&config.rest_url);

        let rows = records(&format!(
            "id,filename,bundle\n\
             not-a-uuid,a.pdf,ORIGINAL\n\
             {x},missing.pdf,ORIGINAL\n\
             {y},c.pdf,ORIGINAL\n",
            x = ITEM_X,
            y = ITEM_Y
        ));
        let summary = post_rows(&client, &rows, &config, &Reporter::new(true)).await.unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped_existing, 1);
    }

    #[tokio::test]
    async fn test_expired_token_falls_back_to_login() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"authenticated":false}"#))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "JSESSIONID=FRESH; Path=/rest"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = config(format!("{}/rest", server.uri()), dir.path().to_path_buf());
        config.jsessionid = Some("STALE".into());
        config.user = Some("admin@example.com".into());
        config.password = Some("secret".into());
        let client = RestClient::new(&config.rest_url);

        let session = resolve_session(&client, &config, &Reporter::new(true)).await.unwrap();
        assert_eq!(session.token(), "FRESH");
    }

    #[tokio::test]
    async fn test_no_credentials_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config("http://127.0.0.1:9/rest".into(), dir.path().to_path_buf());
        let client = RestClient::new(&config.rest_url);

        let err = resolve_session(&client, &config, &Reporter::new(true)).await.unwrap_err();
        assert!(matches!(err, RestError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_missing_column_checked_before_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config("http://127.0.0.1:9/rest".into(), dir.path().to_path_buf());
        config.csv_file = dir.path().join("input.csv");
        std::fs::write(&config.csv_file, "id,bundle\nx,ORIGINAL\n").unwrap();

        let err = run(&config, &Reporter::new(true)).await.unwrap_err();
        assert!(err.to_string().contains("\"filename\""));
    }
}
