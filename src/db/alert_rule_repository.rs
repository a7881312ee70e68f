use sqlx::PgPool;
use tracing::instrument;

use crate::db::{AlertRule, DbError};

#[derive(Clone)]
pub struct AlertRuleRepository {
    pool: PgPool,
}

impl AlertRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<AlertRule>, DbError> {
        let row = sqlx::query_as!(
            AlertRule,
            r#"
            SELECT id, rule_code, rule_name, category, metric_name, operator,
                   threshold, threshold_unit, severity as "severity: _", title,
                   message_template, show_popup, send_email, auto_resolve, active, priority
            FROM alert_rules
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self, category: Option<&str>) -> Result<Vec<AlertRule>, DbError> {
        let rows = match category {
            Some(cat) => {
                sqlx::query_as!(
                    AlertRule,
                    r#"
                    SELECT id, rule_code, rule_name, category, metric_name, operator,
                           threshold, threshold_unit, severity as "severity: _", title,
                           message_template, show_popup, send_email, auto_resolve, active, priority
                    FROM alert_rules
                    WHERE active = true AND category = $1
                    ORDER BY priority DESC
                    "#,
                    cat
                )
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as!(
                    AlertRule,
                    r#"
                    SELECT id, rule_code, rule_name, category, metric_name, operator,
                           threshold, threshold_unit, severity as "severity: _", title,
                           message_template, show_popup, send_email, auto_resolve, active, priority
                    FROM alert_rules
                    WHERE active = true
                    ORDER BY priority DESC
                    "#
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }
}
