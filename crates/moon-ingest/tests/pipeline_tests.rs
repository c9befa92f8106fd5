//! End-to-end ingestion runs over an in-memory bucket and store.

use std::path::Path as FsPath;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use moon_core::{Fingerprint, ObjectKey, SqlIdentifier};
use moon_ingest::{
    BatchReport, FailurePolicy, FileOutcome, IngestConfig, IngestError, IngestRequest,
    IngestionService, IngestionStore, MemoryIngestionStore, ObjectSource, ObjectStoreClient,
    ObjectStoreError, SalesBatch, StaticBuckets, StoreError,
};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};

const BUCKET: &str = "moon-sales";

// -- Fakes --------------------------------------------------------------------

/// Counts downloads passing through to the real client.
struct CountingSource {
    inner: ObjectStoreClient,
    downloads: AtomicUsize,
}

#[async_trait]
impl ObjectSource for CountingSource {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectKey>, ObjectStoreError> {
        self.inner.list(bucket, prefix).await
    }

    async fn download(
        &self,
        bucket: &str,
        key: &ObjectKey,
        destination: &FsPath,
    ) -> Result<bool, ObjectStoreError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.inner.download(bucket, key, destination).await
    }

    async fn read(&self, bucket: &str, key: &ObjectKey) -> Result<Bytes, ObjectStoreError> {
        self.inner.read(bucket, key).await
    }

    async fn archive(
        &self,
        bucket: &str,
        key: &ObjectKey,
        archive_prefix: &str,
    ) -> Result<ObjectKey, ObjectStoreError> {
        self.inner.archive(bucket, key, archive_prefix).await
    }
}

/// Rejects any batch that has a `poison` column; otherwise delegates.
struct PoisonedStore {
    inner: MemoryIngestionStore,
    appends: AtomicUsize,
}

#[async_trait]
impl IngestionStore for PoisonedStore {
    async fn hash_exists(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        self.inner.hash_exists(fingerprint).await
    }

    async fn record_hash(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.inner.record_hash(fingerprint).await
    }

    async fn append_rows(
        &self,
        table: &SqlIdentifier,
        batch: &SalesBatch,
    ) -> Result<u64, StoreError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        if batch.columns().iter().any(|c| c.as_str() == "poison") {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "column \"poison\" does not exist".into(),
            )));
        }
        self.inner.append_rows(table, batch).await
    }
}

// -- Harness ------------------------------------------------------------------

struct Harness {
    bucket: Arc<InMemory>,
    source: Arc<CountingSource>,
    store: Arc<PoisonedStore>,
    memory: MemoryIngestionStore,
    _staging: tempfile::TempDir,
    staging_path: std::path::PathBuf,
}

impl Harness {
    fn new() -> Self {
        let bucket = Arc::new(InMemory::new());
        let buckets =
            StaticBuckets::new().with_bucket(BUCKET, bucket.clone() as Arc<dyn ObjectStore>);
        let source = Arc::new(CountingSource {
            inner: ObjectStoreClient::new(Arc::new(buckets)),
            downloads: AtomicUsize::new(0),
        });
        let memory = MemoryIngestionStore::new();
        let store = Arc::new(PoisonedStore {
            inner: memory.clone(),
            appends: AtomicUsize::new(0),
        });
        let staging = tempfile::tempdir().unwrap();
        let staging_path = staging.path().to_path_buf();
        Self {
            bucket,
            source,
            store,
            memory,
            _staging: staging,
            staging_path,
        }
    }

    async fn put(&self, key: &str, body: &str) {
        self.bucket
            .put(&Path::parse(key).unwrap(), PutPayload::from(Bytes::from(body.to_string())))
            .await
            .unwrap();
    }

    fn service(&self, policy: FailurePolicy) -> IngestionService {
        IngestionService::new(
            self.source.clone(),
            self.store.clone(),
            IngestConfig::new(&self.staging_path).with_failure_policy(policy),
        )
    }

    fn downloads(&self) -> usize {
        self.source.downloads.load(Ordering::SeqCst)
    }

    fn appends(&self) -> usize {
        self.store.appends.load(Ordering::SeqCst)
    }

    fn sales_rows(&self) -> usize {
        self.memory.rows("sales_transaction").len()
    }
}

fn request(prefix: &str) -> IngestRequest {
    IngestRequest::new(BUCKET, prefix).unwrap()
}

const SALES_A: &str = "agent_id,product_id,sale_amount,core_reference_id\n\
                       A1,P1,100.00,REF-1\n\
                       A2,P1,250.50,REF-2\n";
const SALES_B: &str = "agent_id,product_id,sale_amount,core_reference_id\n\
                       A1,P2,75.00,REF-3\n";
const POISON: &str = "poison\nx\n";

fn ingested_keys(report: &BatchReport) -> Vec<&str> {
    report
        .files
        .iter()
        .filter_map(|f| match f {
            FileOutcome::Ingested { key, .. } => Some(key.as_str()),
            _ => None,
        })
        .collect()
}

// -- Happy Path ---------------------------------------------------------------

#[tokio::test]
async fn ingests_every_new_file() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    h.put("incoming/b.csv", SALES_B).await;

    let report = h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await.unwrap();

    assert_eq!(report.listed, 2);
    assert_eq!(report.ingested, 2);
    assert_eq!(report.rows_loaded, 3);
    assert_eq!(h.sales_rows(), 3);
    assert_eq!(h.memory.recorded().len(), 2);
    assert!(h.staging_path.join("a.csv").exists());
}

#[tokio::test]
async fn second_run_skips_everything() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    h.put("incoming/b.csv", SALES_B).await;
    let service = h.service(FailurePolicy::AbortBatch);

    service.run(&request("incoming")).await.unwrap();
    let downloads = h.downloads();
    let appends = h.appends();

    let report = service.run(&request("incoming/")).await.unwrap();

    assert_eq!(report.skipped, 2);
    assert_eq!(report.ingested, 0);
    assert_eq!(h.downloads(), downloads);
    assert_eq!(h.appends(), appends);
    assert_eq!(h.sales_rows(), 3);
}

#[tokio::test]
async fn only_unrecorded_file_is_processed() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    h.put("incoming/b.csv", SALES_B).await;
    h.memory.seed_hash(Fingerprint::of_name("a.csv"));

    let report = h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await.unwrap();

    assert_eq!(h.downloads(), 1);
    assert_eq!(h.appends(), 1);
    assert_eq!(ingested_keys(&report), vec!["incoming/b.csv"]);
    assert_eq!(report.skipped, 1);
    assert_eq!(h.sales_rows(), 1);
    assert!(!h.staging_path.join("a.csv").exists());
}

#[tokio::test]
async fn same_base_name_in_another_prefix_is_skipped() {
    let h = Harness::new();
    h.put("january/sales.csv", SALES_A).await;
    h.put("february/sales.csv", SALES_B).await;
    let service = h.service(FailurePolicy::AbortBatch);

    service.run(&request("january")).await.unwrap();
    let report = service.run(&request("february")).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(h.sales_rows(), 2);
}

#[tokio::test]
async fn empty_fields_load_as_null() {
    let h = Harness::new();
    h.put("incoming/a.csv", "agent_id,sale_amount\nA1,\n").await;

    h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await.unwrap();

    let rows = h.memory.rows("sales_transaction");
    assert_eq!(rows[0]["sale_amount"], None);
}

#[tokio::test]
async fn key_with_reserved_characters_is_ingested() {
    let h = Harness::new();
    h.put("incoming/sales#1.csv", SALES_A).await;

    let report = h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await.unwrap();

    assert_eq!(ingested_keys(&report), vec!["incoming/sales#1.csv"]);
    assert_eq!(h.sales_rows(), 2);
    assert!(h.memory.recorded().contains(&Fingerprint::of_name("sales#1.csv")));
}

// -- Empty and Failed Listings ------------------------------------------------

#[tokio::test]
async fn empty_listing_is_no_files() {
    let h = Harness::new();
    h.put("elsewhere/a.csv", SALES_A).await;

    let err = h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await.unwrap_err();

    assert!(matches!(err, IngestError::NoFiles { .. }));
    assert_eq!(h.downloads(), 0);
    assert_eq!(h.appends(), 0);
}

#[tokio::test]
async fn listing_failure_propagates_before_any_file_work() {
    let h = Harness::new();
    let req = IngestRequest::new("no-such-bucket", "incoming").unwrap();

    let err = h.service(FailurePolicy::ContinueOnError).run(&req).await.unwrap_err();

    assert!(matches!(
        err,
        IngestError::ObjectStore(ObjectStoreError::UnknownBucket { .. })
    ));
    assert_eq!(h.downloads(), 0);
    assert!(h.memory.recorded().is_empty());
}

// -- Failure Policy -----------------------------------------------------------

#[tokio::test]
async fn abort_batch_stops_at_first_failure() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    h.put("incoming/b.csv", POISON).await;
    h.put("incoming/c.csv", SALES_B).await;

    let err = h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await.unwrap_err();

    match &err {
        IngestError::File { key, .. } => assert_eq!(key, "incoming/b.csv"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), IngestError::Store(StoreError::Database(_))));
    assert_eq!(h.memory.recorded(), vec![Fingerprint::of_name("a.csv")]);
    assert_eq!(h.downloads(), 2);
    assert_eq!(h.sales_rows(), 2);
}

#[tokio::test]
async fn continue_on_error_reports_failure_and_proceeds() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    h.put("incoming/b.csv", POISON).await;
    h.put("incoming/c.csv", SALES_B).await;

    let report = h
        .service(FailurePolicy::ContinueOnError)
        .run(&request("incoming"))
        .await
        .unwrap();

    assert_eq!(report.ingested, 2);
    assert_eq!(report.failed, 1);
    assert!(matches!(
        &report.files[1],
        FileOutcome::Failed { key, .. } if key == "incoming/b.csv"
    ));
    assert!(!h.memory.recorded().contains(&Fingerprint::of_name("b.csv")));

    // The failed file is retried on the next run.
    let again = h
        .service(FailurePolicy::ContinueOnError)
        .run(&request("incoming"))
        .await
        .unwrap();
    assert_eq!((again.skipped, again.failed), (2, 1));
}

#[tokio::test]
async fn malformed_csv_is_never_recorded() {
    let h = Harness::new();
    h.put("incoming/a.csv", "a,b\n1,2,3\n").await;

    let err = h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await.unwrap_err();

    assert!(matches!(err.root(), IngestError::Csv(_)));
    assert_eq!(h.appends(), 0);
    assert!(h.memory.recorded().is_empty());
}

// -- Archiving ----------------------------------------------------------------

#[tokio::test]
async fn archive_moves_recorded_files_out_of_the_prefix() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    h.put("incoming/b.csv", SALES_B).await;
    let req = request("incoming").with_archive_path(Some("archive/".into()));

    let report = h.service(FailurePolicy::AbortBatch).run(&req).await.unwrap();

    assert!(report.files.iter().all(|f| matches!(
        f,
        FileOutcome::Ingested { archived_to: Some(to), .. } if to.starts_with("archive/")
    )));
    let remaining = h.service(FailurePolicy::AbortBatch).run(&request("incoming")).await;
    assert!(matches!(remaining, Err(IngestError::NoFiles { .. })));
    assert!(h.bucket.head(&Path::from("archive/a.csv")).await.is_ok());
}

#[tokio::test]
async fn skipped_files_are_not_archived() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    h.memory.seed_hash(Fingerprint::of_name("a.csv"));
    let req = request("incoming").with_archive_path(Some("archive".into()));

    h.service(FailurePolicy::AbortBatch).run(&req).await.unwrap();

    assert!(h.bucket.head(&Path::from("incoming/a.csv")).await.is_ok());
    assert!(h.bucket.head(&Path::from("archive/a.csv")).await.is_err());
}

#[tokio::test]
async fn archiving_into_the_source_prefix_keeps_the_file() {
    let h = Harness::new();
    h.put("incoming/a.csv", SALES_A).await;
    let req = request("incoming").with_archive_path(Some("incoming/".into()));

    let report = h.service(FailurePolicy::AbortBatch).run(&req).await.unwrap();

    assert_eq!(report.ingested, 1);
    assert!(h.bucket.head(&Path::from("incoming/a.csv")).await.is_ok());
}
