//! End-to-end runs against a mock vendor

use chrono::Duration;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::fixtures::{process_date, read_lines, test_config, write_map_file, CONTRACTS_BODY};
use crate::common::logging::log_test_step;
use govcontracts_downloader::models::FileKind;
use govcontracts_downloader::records::{read_records, GovernmentContract, GovernmentContractUniverse};
use govcontracts_downloader::storage::CsvStore;
use govcontracts_downloader::utils::today_utc;
use govcontracts_downloader::{GovernmentContractDownloader, RunStatus};

struct Workspace {
    output: tempfile::TempDir,
    processed: tempfile::TempDir,
    data: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            output: tempfile::tempdir().unwrap(),
            processed: tempfile::tempdir().unwrap(),
            data: tempfile::tempdir().unwrap(),
        }
    }

    fn with_map_files() -> Self {
        let workspace = Self::new();
        write_map_file(workspace.data.path(), "hwm", &["20200401,hwm,N", "20501231,hwm,N"]);
        write_map_file(workspace.data.path(), "aapl", &["19801212,aapl,Q", "20501231,aapl,Q"]);
        workspace
    }

    fn downloader(&self, server: &MockServer) -> GovernmentContractDownloader<govcontracts_downloader::api::QuiverClient> {
        let config = test_config(&server.uri(), self.output.path(), self.processed.path(), self.data.path());
        GovernmentContractDownloader::from_config(&config).unwrap()
    }

    fn store(&self) -> CsvStore {
        CsvStore::new(self.output.path(), self.processed.path())
    }
}

async fn vendor_returning(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("date", "20230615"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[test_log::test(tokio::test)]
async fn test_road_paving_award_end_to_end() {
    log_test_step("HWM award lands in the ticker and universe files");
    let workspace = Workspace::with_map_files();
    let server = vendor_returning(CONTRACTS_BODY).await;

    let summary = workspace.downloader(&server).run(process_date()).await;

    assert!(summary.is_success(), "{}", summary);
    assert_eq!(summary.records_received, 2);
    assert_eq!(summary.records_skipped, 0);
    assert_eq!(summary.tickers_written, 2);

    let store = workspace.store();
    assert_eq!(
        read_lines(&store.output_path(FileKind::PerTicker, "HWM")),
        vec!["20230615,Road; paving project,DOT,1500000".to_string()]
    );
    assert_eq!(
        read_lines(&store.output_path(FileKind::PerTicker, "AAPL")),
        vec!["20230615,Cloud services,DOD,250000.75".to_string()]
    );

    let universe = read_lines(&store.output_path(FileKind::Universe, "20230615"));
    assert_eq!(universe.len(), 2);
    assert!(universe[0].starts_with("AAPL "));
    assert!(universe[0].ends_with(",AAPL,Cloud services,DOD,250000.75"));
    assert_eq!(universe[1], "HWM XDBCYGNOLBAD,HWM,Road; paving project,DOT,1500000");

    log_test_step("Written files read back as typed records");
    let contracts: Vec<GovernmentContract> =
        read_records(&store.output_path(FileKind::PerTicker, "aapl")).unwrap();
    assert_eq!(contracts[0].amount.to_string(), "250000.75");

    let universe: Vec<GovernmentContractUniverse> =
        read_records(&store.output_path(FileKind::Universe, "20230615")).unwrap();
    let million_plus: Vec<&str> = universe
        .iter()
        .filter(|contract| contract.amount >= rust_decimal::Decimal::from(1_000_000))
        .map(|contract| contract.security_id.as_str())
        .collect();
    assert_eq!(million_plus, vec!["HWM XDBCYGNOLBAD"]);
}

#[test_log::test(tokio::test)]
async fn test_run_merges_previously_processed_history() {
    let workspace = Workspace::with_map_files();
    let store = workspace.store();

    let history = store.processed_path(FileKind::PerTicker, "hwm");
    std::fs::create_dir_all(history.parent().unwrap()).unwrap();
    std::fs::write(&history, "20230620,Later award,DOT,10\n20230101,Earlier award,DOT,5\n").unwrap();

    let server = vendor_returning(CONTRACTS_BODY).await;
    let summary = workspace.downloader(&server).run(process_date()).await;

    assert!(summary.is_success(), "{}", summary);
    assert_eq!(
        read_lines(&store.output_path(FileKind::PerTicker, "hwm")),
        vec![
            "20230101,Earlier award,DOT,5".to_string(),
            "20230615,Road; paving project,DOT,1500000".to_string(),
            "20230620,Later award,DOT,10".to_string(),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_repeated_runs_produce_identical_files() {
    let workspace = Workspace::with_map_files();
    let server = vendor_returning(CONTRACTS_BODY).await;
    let downloader = workspace.downloader(&server);
    let store = workspace.store();

    assert!(downloader.run(process_date()).await.is_success());
    let first_ticker = read_lines(&store.output_path(FileKind::PerTicker, "hwm"));
    let first_universe = read_lines(&store.output_path(FileKind::Universe, "20230615"));

    assert!(downloader.run(process_date()).await.is_success());

    assert_eq!(read_lines(&store.output_path(FileKind::PerTicker, "hwm")), first_ticker);
    assert_eq!(read_lines(&store.output_path(FileKind::Universe, "20230615")), first_universe);
}

#[test_log::test(tokio::test)]
async fn test_not_found_is_a_zero_record_success() {
    let workspace = Workspace::with_map_files();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let summary = workspace.downloader(&server).run(process_date()).await;

    assert!(summary.is_success(), "{}", summary);
    assert_eq!(summary.records_received, 0);
    assert!(!workspace.store().output_path(FileKind::Universe, "20230615").exists());
}

#[test_log::test(tokio::test)]
async fn test_invalid_dates_make_no_request() {
    let workspace = Workspace::with_map_files();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CONTRACTS_BODY))
        .expect(0)
        .mount(&server)
        .await;
    let downloader = workspace.downloader(&server);

    assert_eq!(downloader.run(today_utc()).await.status, RunStatus::InvalidDate);
    assert_eq!(
        downloader.run(today_utc() + Duration::days(1)).await.status,
        RunStatus::InvalidDate
    );
}

#[test_log::test(tokio::test)]
async fn test_yesterday_is_processed() {
    let workspace = Workspace::with_map_files();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let summary = workspace
        .downloader(&server)
        .run(today_utc() - Duration::days(1))
        .await;

    assert_eq!(summary.status, RunStatus::Completed);
}

#[test_log::test(tokio::test)]
async fn test_missing_map_files_fail_the_run() {
    let workspace = Workspace::new();
    let server = vendor_returning(CONTRACTS_BODY).await;

    let summary = workspace.downloader(&server).run(process_date()).await;

    assert_eq!(summary.status, RunStatus::UniversePrerequisiteMissing);
    assert!(!summary.is_success());
    assert!(!workspace.store().output_path(FileKind::PerTicker, "hwm").exists());
}

#[test_log::test(tokio::test)]
async fn test_unreadable_map_file_archive_fails_the_run() {
    let workspace = Workspace::new();
    let map_files = workspace.data.path().join("equity").join("usa").join("map_files");
    std::fs::create_dir_all(&map_files).unwrap();
    std::fs::write(map_files.join("map_files_20230601.zip"), b"truncated").unwrap();
    let server = vendor_returning(CONTRACTS_BODY).await;

    let summary = workspace.downloader(&server).run(process_date()).await;

    assert_eq!(summary.status, RunStatus::UniversePrerequisiteMissing);
    assert!(!summary.is_success());
    assert!(!workspace.store().output_path(FileKind::Universe, "20230615").exists());
}

#[test_log::test(tokio::test)]
async fn test_vendor_outage_fails_the_run() {
    let workspace = Workspace::with_map_files();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let summary = workspace.downloader(&server).run(process_date()).await;

    match summary.status {
        RunStatus::Failed(message) => assert!(message.contains("retry 3/3"), "{}", message),
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test_log::test(tokio::test)]
async fn test_malformed_records_are_skipped_and_counted() {
    let workspace = Workspace::with_map_files();
    let body = r#"[
        {"Ticker":"hwm","Description":"Bridge","Agency":"DOT","Amount":42},
        {"Description":"Ticker missing","Agency":"DOT","Amount":1},
        {"Ticker":"aapl","Agency":"DOD"},
        {"Ticker":"ba","Description":"No agency","Amount":7}
    ]"#;
    let server = vendor_returning(body).await;

    let summary = workspace.downloader(&server).run(process_date()).await;

    assert!(summary.is_success(), "{}", summary);
    assert_eq!(summary.records_received, 4);
    assert_eq!(summary.records_skipped, 3);
    assert_eq!(summary.tickers_written, 1);
    assert_eq!(
        read_lines(&workspace.store().output_path(FileKind::PerTicker, "hwm")),
        vec!["20230615,Bridge,DOT,42".to_string()]
    );
}
