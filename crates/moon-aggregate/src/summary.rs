//! # Sales Summaries
//!
//! The three summaries computed from `sales_transaction` and written to the
//! warehouse. Monetary totals travel as decimal strings (`SUM(...)::TEXT`)
//! and are cast back to `NUMERIC` on insert, so no precision is lost in
//! between.

use serde::Serialize;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, Postgres};

/// Products selling at least this much (in currency units) are "top".
pub const DEFAULT_SALES_THRESHOLD: i64 = 10_000;

/// A summary row that knows which warehouse table it belongs to.
pub trait WarehouseRow: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    /// Destination table.
    const TABLE: &'static str;

    /// Parameterised single-row insert.
    const INSERT: &'static str;

    /// Bind this row's values to [`Self::INSERT`].
    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments>;
}

/// Branch totals, highest sales first.
pub const BEST_TEAMS_SQL: &str = "\
    SELECT a.branch_id::TEXT AS branch_id, \
           b.branch_name, \
           SUM(s.sale_amount)::TEXT AS total_sales, \
           COUNT(DISTINCT s.agent_id) AS num_agents \
    FROM sales_transaction s \
    JOIN agent a ON s.agent_id = a.agent_id \
    JOIN branch b ON a.branch_id = b.branch_id \
    GROUP BY a.branch_id, b.branch_name \
    ORDER BY SUM(s.sale_amount) DESC";

/// Products whose total sales reach `$1`, highest first.
pub const TOP_PRODUCTS_SQL: &str = "\
    SELECT p.name AS product_name, \
           SUM(s.sale_amount)::TEXT AS total_sales \
    FROM sales_transaction s \
    JOIN product p ON s.product_id = p.product_id \
    GROUP BY p.name \
    HAVING SUM(s.sale_amount) >= $1::NUMERIC \
    ORDER BY SUM(s.sale_amount) DESC";

/// Per-branch agent counts and sales, highest sales first.
pub const BRANCH_PERFORMANCE_SQL: &str = "\
    SELECT b.branch_name, \
           COUNT(DISTINCT a.agent_id) AS num_agents, \
           SUM(s.sale_amount)::TEXT AS total_branch_sales \
    FROM sales_transaction s \
    JOIN agent a ON s.agent_id = a.agent_id \
    JOIN branch b ON a.branch_id = b.branch_id \
    GROUP BY b.branch_name \
    ORDER BY SUM(s.sale_amount) DESC";

/// One row of `best_teams`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct BestTeam {
    pub branch_id: String,
    pub branch_name: String,
    pub total_sales: String,
    pub num_agents: i64,
}

impl WarehouseRow for BestTeam {
    const TABLE: &'static str = "best_teams";
    const INSERT: &'static str = "INSERT INTO best_teams (branch_id, branch_name, total_sales, num_agents) \
         VALUES ($1, $2, $3::NUMERIC, $4)";

    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(&self.branch_id)
            .bind(&self.branch_name)
            .bind(&self.total_sales)
            .bind(self.num_agents)
    }
}

/// One row of `top_products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TopProduct {
    pub product_name: String,
    pub total_sales: String,
}

impl WarehouseRow for TopProduct {
    const TABLE: &'static str = "top_products";
    const INSERT: &'static str =
        "INSERT INTO top_products (product_name, total_sales) VALUES ($1, $2::NUMERIC)";

    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query.bind(&self.product_name).bind(&self.total_sales)
    }
}

/// One row of `branch_performance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct BranchPerformance {
    pub branch_name: String,
    pub num_agents: i64,
    pub total_branch_sales: String,
}

impl WarehouseRow for BranchPerformance {
    const TABLE: &'static str = "branch_performance";
    const INSERT: &'static str = "INSERT INTO branch_performance (branch_name, num_agents, total_branch_sales) \
         VALUES ($1, $2, $3::NUMERIC)";

    fn bind<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(&self.branch_name)
            .bind(self.num_agents)
            .bind(&self.total_branch_sales)
    }
}

/// Warehouse DDL, applied by `moon aggregate --create-tables`.
pub const WAREHOUSE_DDL: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS best_teams (\
        branch_id VARCHAR(36), \
        branch_name VARCHAR(255), \
        total_sales DECIMAL(18, 2), \
        num_agents BIGINT)",
    "CREATE TABLE IF NOT EXISTS top_products (\
        product_name VARCHAR(255), \
        total_sales DECIMAL(18, 2))",
    "CREATE TABLE IF NOT EXISTS branch_performance (\
        branch_name VARCHAR(255), \
        num_agents BIGINT, \
        total_branch_sales DECIMAL(18, 2))",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholders(sql: &str) -> usize {
        (1..=9).filter(|n| sql.contains(&format!("${n}"))).count()
    }

    #[test]
    fn insert_placeholders_match_columns() {
        assert_eq!(placeholders(BestTeam::INSERT), 4);
        assert_eq!(placeholders(TopProduct::INSERT), 2);
        assert_eq!(placeholders(BranchPerformance::INSERT), 3);
    }

    #[test]
    fn every_warehouse_table_has_ddl() {
        for table in [BestTeam::TABLE, TopProduct::TABLE, BranchPerformance::TABLE] {
            assert!(
                WAREHOUSE_DDL.iter().any(|ddl| ddl.contains(&format!("EXISTS {table} ("))),
                "missing DDL for {table}"
            );
        }
    }

    #[test]
    fn top_products_filters_on_threshold() {
        assert!(TOP_PRODUCTS_SQL.contains("HAVING SUM(s.sale_amount) >= $1"));
    }

    #[test]
    fn summaries_order_by_sales_descending() {
        for sql in [BEST_TEAMS_SQL, TOP_PRODUCTS_SQL, BRANCH_PERFORMANCE_SQL] {
            assert!(sql.ends_with("ORDER BY SUM(s.sale_amount) DESC"));
        }
    }
}
