//! Aggregation job ordering and failure behaviour against in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use moon_aggregate::{
    AggregateError, AggregationJob, BestTeam, BranchPerformance, SummarySource, TopProduct,
    WarehouseRow, WarehouseSink, DEFAULT_SALES_THRESHOLD,
};
use parking_lot::Mutex;

#[derive(Default)]
struct Calls {
    log: Mutex<Vec<String>>,
}

impl Calls {
    fn push(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

struct FakeSource {
    calls: Arc<Calls>,
}

#[async_trait]
impl SummarySource for FakeSource {
    async fn best_teams(&self) -> Result<Vec<BestTeam>, AggregateError> {
        self.calls.push("query best_teams");
        Ok(vec![
            BestTeam {
                branch_id: "b1".into(),
                branch_name: "Colombo".into(),
                total_sales: "52000.00".into(),
                num_agents: 4,
            },
            BestTeam {
                branch_id: "b2".into(),
                branch_name: "Kandy".into(),
                total_sales: "18000.00".into(),
                num_agents: 2,
            },
        ])
    }

    async fn top_products(&self, threshold: i64) -> Result<Vec<TopProduct>, AggregateError> {
        self.calls.push(format!("query top_products >= {threshold}"));
        Ok(vec![TopProduct {
            product_name: "Life Cover".into(),
            total_sales: "40000.00".into(),
        }])
    }

    async fn branch_performance(&self) -> Result<Vec<BranchPerformance>, AggregateError> {
        self.calls.push("query branch_performance");
        Ok(vec![])
    }
}

struct FakeSink {
    calls: Arc<Calls>,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl WarehouseSink for FakeSink {
    async fn load<R: WarehouseRow>(&self, rows: &[R]) -> Result<u64, AggregateError> {
        if self.fail_on == Some(R::TABLE) {
            return Err(AggregateError::Load {
                table: R::TABLE,
                source: sqlx::Error::Protocol("connection reset".into()),
            });
        }
        self.calls.push(format!("load {} x{}", R::TABLE, rows.len()));
        Ok(rows.len() as u64)
    }
}

fn job(fail_on: Option<&'static str>) -> (AggregationJob<FakeSource, FakeSink>, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let job = AggregationJob::new(
        FakeSource {
            calls: calls.clone(),
        },
        FakeSink {
            calls: calls.clone(),
            fail_on,
        },
    );
    (job, calls)
}

#[tokio::test]
async fn runs_summaries_in_order() {
    let (job, calls) = job(None);

    let report = job.run().await.unwrap();

    assert_eq!(
        calls.entries(),
        vec![
            "query best_teams".to_string(),
            "load best_teams x2".to_string(),
            format!("query top_products >= {DEFAULT_SALES_THRESHOLD}"),
            "load top_products x1".to_string(),
            "query branch_performance".to_string(),
            "load branch_performance x0".to_string(),
        ]
    );
    assert_eq!(report.best_teams, 2);
    assert_eq!(report.top_products, 1);
    assert_eq!(report.branch_performance, 0);
}

#[tokio::test]
async fn threshold_is_passed_to_source() {
    let (job, calls) = job(None);
    let job = job.with_sales_threshold(2_500);

    job.run().await.unwrap();

    assert!(calls.entries().contains(&"query top_products >= 2500".to_string()));
}

#[tokio::test]
async fn first_failure_aborts_remaining_summaries() {
    let (job, calls) = job(Some("top_products"));

    let err = job.run().await.unwrap_err();

    assert!(matches!(err, AggregateError::Load { table: "top_products", .. }));
    let entries = calls.entries();
    assert!(entries.contains(&"load best_teams x2".to_string()));
    assert!(!entries.iter().any(|e| e.contains("branch_performance")));
}
