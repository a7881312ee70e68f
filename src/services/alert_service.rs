use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use crate::db::{Alert, AlertRule, AlertRuleRepository, AlertRepository};
use crate::domain::{BalanceResult, FacilityBalance};
use crate::error::WaterBalanceError;

const RULES_CACHE_TTL: Duration = Duration::from_secs(300);

struct RulesCache {
    loaded_at: Instant,
    rules: Vec<AlertRule>,
}

/// Declarative rule evaluator: loads active rules (5-minute cache),
/// evaluates them against a computed `BalanceResult`, deduplicates
/// against already-active alerts, and auto-resolves ones whose
/// condition no longer holds.
pub struct AlertService {
    rule_repo: AlertRuleRepository,
    alert_repo: AlertRepository,
    cache: RwLock<Option<RulesCache>>,
}

impl AlertService {
    pub fn new(rule_repo: AlertRuleRepository, alert_repo: AlertRepository) -> Self {
        Self {
            rule_repo,
            alert_repo,
            cache: RwLock::new(None),
        }
    }

    async fn load_rules(&self) -> Result<Vec<AlertRule>, WaterBalanceError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.loaded_at.elapsed() < RULES_CACHE_TTL {
                return Ok(cached.rules.clone());
            }
        }
        let rules = self.rule_repo.list_active(None).await?;
        *self.cache.write().await = Some(RulesCache {
            loaded_at: Instant::now(),
            rules: rules.clone(),
        });
        Ok(rules)
    }

    /// Forces the next `load_rules` call to hit the database.
    pub async fn invalidate_rules_cache(&self) {
        *self.cache.write().await = None;
    }

    #[instrument(skip(self, result))]
    pub async fn evaluate(
        &self,
        result: &BalanceResult,
        calculation_date: NaiveDate,
    ) -> Result<Vec<Alert>, WaterBalanceError> {
        let rules = self.load_rules().await?;
        let mut triggered = Vec::new();

        for rule in &rules {
            match rule.category.as_str() {
                "level" | "storage" => {
                    for facility in &result.facilities {
                        if let Some(metric) = resolve_facility_metric(&rule.metric_name, facility) {
                            if rule.evaluate(metric) {
                                if let Some(alert) = self
                                    .trigger_alert(rule, None, Some(&facility.facility_code), calculation_date, metric)
                                    .await?
                                {
                                    triggered.push(alert);
                                }
                            }
                        }
                    }
                }
                "compliance" => {
                    if let Some(metric) = resolve_system_metric(&rule.metric_name, result) {
                        if rule.evaluate(metric) {
                            if let Some(alert) = self
                                .trigger_alert(rule, None, None, calculation_date, metric)
                                .await?
                            {
                                triggered.push(alert);
                            }
                        }
                    }
                }
                other => {
                    warn!(category = other, rule_code = %rule.rule_code, "skipping rule with unrecognized category");
                }
            }
        }

        Ok(triggered)
    }

    async fn trigger_alert(
        &self,
        rule: &AlertRule,
        facility_id: Option<i64>,
        source_id: Option<&str>,
        calculation_date: NaiveDate,
        metric_value: f64,
    ) -> Result<Option<Alert>, WaterBalanceError> {
        if let Some(existing) = self
            .alert_repo
            .find_active_duplicate(rule.id, calculation_date, facility_id, source_id)
            .await?
        {
            self.alert_repo.touch(existing.id, metric_value).await?;
            return Ok(None);
        }

        let message = rule.format_message(metric_value, source_id);
        let inserted = self
            .alert_repo
            .insert(
                rule.id,
                facility_id,
                source_id,
                calculation_date,
                metric_value,
                rule.severity,
                &rule.title,
                &message,
            )
            .await?;
        Ok(Some(inserted))
    }

    /// Re-evaluates every active, auto-resolvable alert against the
    /// current `BalanceResult`; resolves it once its condition no
    /// longer holds.
    #[instrument(skip(self, result))]
    pub async fn auto_resolve(&self, result: &BalanceResult) -> Result<u32, WaterBalanceError> {
        let candidates = self.alert_repo.list_active_auto_resolvable().await?;
        let mut resolved = 0;
        for alert in candidates {
            let Some(rule) = self.rule_repo.get_by_id(alert.rule_id).await? else {
                continue;
            };
            let metric = match rule.category.as_str() {
                "compliance" => resolve_system_metric(&rule.metric_name, result),
                _ => alert
                    .source_id
                    .as_deref()
                    .and_then(|code| result.facilities.iter().find(|f| f.facility_code == code))
                    .and_then(|facility| resolve_facility_metric(&rule.metric_name, facility)),
            };
            let Some(metric) = metric else { continue };
            if !rule.evaluate(metric) {
                self.alert_repo.resolve(alert.id, "auto").await?;
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    pub async fn get_active_alerts(&self) -> Result<Vec<Alert>, WaterBalanceError> {
        Ok(self.alert_repo.list_active().await?)
    }

    pub async fn acknowledge(&self, alert_id: i64) -> Result<(), WaterBalanceError> {
        Ok(self.alert_repo.acknowledge(alert_id).await?)
    }

    pub async fn resolve(&self, alert_id: i64, resolved_by: &str) -> Result<(), WaterBalanceError> {
        Ok(self.alert_repo.resolve(alert_id, resolved_by).await?)
    }
}

fn resolve_facility_metric(metric_name: &str, facility: &FacilityBalance) -> Option<f64> {
    match metric_name {
        "level_pct" => Some(facility.level_pct()),
        "overflow_m3" => Some(facility.overflow_m3),
        "deficit_m3" => Some(facility.deficit_m3),
        "closing_m3" => Some(facility.closing_m3),
        _ => None,
    }
}

fn resolve_system_metric(metric_name: &str, result: &BalanceResult) -> Option<f64> {
    match metric_name {
        "error_pct" => Some(result.error_pct()),
        "abstraction_pct_of_license" => result.kpis.as_ref().and_then(|k| k.abstraction_pct_of_license),
        "recycled_pct" => result.kpis.as_ref().map(|k| k.recycled_pct),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FacilityBalance;

    fn facility(closing: f64) -> FacilityBalance {
        FacilityBalance {
            facility_code: "TSF1".into(),
            opening_m3: 0.0,
            closing_m3: closing,
            capacity_m3: 100.0,
            overflow_m3: 0.0,
            deficit_m3: 0.0,
            abstraction_to_plant_m3: 0.0,
            warnings: vec![],
        }
    }

    #[test]
    fn resolve_facility_metric_reads_level_pct() {
        let f = facility(80.0);
        assert_eq!(resolve_facility_metric("level_pct", &f), Some(80.0));
        assert_eq!(resolve_facility_metric("unknown_metric", &f), None);
    }
}
