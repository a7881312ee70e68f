use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::{Alert, AlertSeverity, AlertStatus, DbError};

#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds an existing active alert for the same
    /// `(rule_id, calculation_date, facility_id?, source_id?)` tuple, the
    /// dedup key the evaluator checks before inserting.
    #[instrument(skip(self))]
    pub async fn find_active_duplicate(
        &self,
        rule_id: i64,
        calculation_date: NaiveDate,
        facility_id: Option<i64>,
        source_id: Option<&str>,
    ) -> Result<Option<Alert>, DbError> {
        let row = sqlx::query_as!(
            Alert,
            r#"
            SELECT id, rule_id, facility_id, source_id, calculation_date, metric_value,
                   severity as "severity: _", title, message, status as "status: _",
                   triggered_at, last_checked_at, acknowledged_at, resolved_at, resolved_by
            FROM alerts
            WHERE rule_id = $1
              AND status = 'active'
              AND calculation_date = $2
              AND (facility_id IS NOT DISTINCT FROM $3)
              AND (source_id IS NOT DISTINCT FROM $4)
            "#,
            rule_id,
            calculation_date,
            facility_id,
            source_id,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn touch(&self, id: i64, metric_value: f64) -> Result<(), DbError> {
        sqlx::query!(
            "UPDATE alerts SET metric_value = $2, last_checked_at = now() WHERE id = $1",
            id,
            metric_value
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        rule_id: i64,
        facility_id: Option<i64>,
        source_id: Option<&str>,
        calculation_date: NaiveDate,
        metric_value: f64,
        severity: AlertSeverity,
        title: &str,
        message: &str,
    ) -> Result<Alert, DbError> {
        let row = sqlx::query_as!(
            Alert,
            r#"
            INSERT INTO alerts
                (rule_id, facility_id, source_id, calculation_date, metric_value,
                 severity, title, message, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active')
            RETURNING id, rule_id, facility_id, source_id, calculation_date, metric_value,
                      severity as "severity: _", title, message, status as "status: _",
                      triggered_at, last_checked_at, acknowledged_at, resolved_at, resolved_by
            "#,
            rule_id,
            facility_id,
            source_id,
            calculation_date,
            metric_value,
            severity as _,
            title,
            message,
        )
        .fetch_one(&self.pool)
        .await?;
        debug!(alert_id = row.id, "inserted new alert");
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, id: i64, resolved_by: &str) -> Result<(), DbError> {
        sqlx::query!(
            r#"
            UPDATE alerts
            SET status = 'resolved', resolved_at = now(), resolved_by = $2
            WHERE id = $1
            "#,
            id,
            resolved_by
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn acknowledge(&self, id: i64) -> Result<(), DbError> {
        sqlx::query!(
            r#"
            UPDATE alerts SET status = 'acknowledged', acknowledged_at = now() WHERE id = $1
            "#,
            id
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every active alert whose rule is `auto_resolve=true`, for the
    /// sweep worker to re-evaluate.
    #[instrument(skip(self))]
    pub async fn list_active_auto_resolvable(&self) -> Result<Vec<Alert>, DbError> {
        let rows = sqlx::query_as!(
            Alert,
            r#"
            SELECT a.id, a.rule_id, a.facility_id, a.source_id, a.calculation_date,
                   a.metric_value, a.severity as "severity: _", a.title, a.message,
                   a.status as "status: _", a.triggered_at, a.last_checked_at,
                   a.acknowledged_at, a.resolved_at, a.resolved_by
            FROM alerts a
            JOIN alert_rules r ON r.id = a.rule_id
            WHERE a.status = 'active' AND r.auto_resolve = true
            "#
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Severity-then-recency ordering, grounded on the reference
    /// `get_active_alerts` query.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Alert>, DbError> {
        let rows = sqlx::query_as!(
            Alert,
            r#"
            SELECT id, rule_id, facility_id, source_id, calculation_date, metric_value,
                   severity as "severity: _", title, message, status as "status: _",
                   triggered_at, last_checked_at, acknowledged_at, resolved_at, resolved_by
            FROM alerts
            WHERE status = 'active'
            ORDER BY
                CASE severity
                    WHEN 'critical' THEN 0
                    WHEN 'warning' THEN 1
                    WHEN 'info' THEN 2
                END,
                triggered_at DESC
            "#
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
