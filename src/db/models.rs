use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Measured,
    Calculated,
    Estimated,
    Imported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferMethod {
    Pump,
    Gravity,
    Spillway,
    Other,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct MonthlyParameters {
    pub id: i64,
    pub facility_id: i64,
    pub year: i32,
    pub month: i32,
    pub total_inflows_m3: f64,
    pub total_outflows_m3: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct StorageHistory {
    pub id: i64,
    pub facility_code: String,
    pub year: i32,
    pub month: i32,
    pub opening_volume_m3: f64,
    pub closing_volume_m3: f64,
    pub delta_volume_m3: f64,
    pub data_source: DataSource,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct FacilityTransfer {
    pub id: i64,
    pub source_facility_code: String,
    pub dest_facility_code: String,
    pub year: i32,
    pub month: i32,
    pub volume_m3: f64,
    pub transfer_method: TransferMethod,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EnvironmentalMonthly {
    pub id: i64,
    pub year: i32,
    pub month: i32,
    pub rainfall_mm: f64,
    pub evaporation_mm: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct EnvironmentalAudit {
    pub id: i64,
    pub environmental_id: i64,
    pub changed_at: DateTime<Utc>,
    pub field_name: String,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct SystemConstant {
    pub id: i64,
    pub constant_key: String,
    pub constant_value: f64,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub editable: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct ConstantsAudit {
    pub id: i64,
    pub changed_at: DateTime<Utc>,
    pub constant_key: String,
    pub old_value: Option<f64>,
    pub new_value: f64,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertOperator {
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Equal,
}

impl AlertOperator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" => Some(Self::LessThan),
            ">" => Some(Self::GreaterThan),
            "<=" => Some(Self::LessThanOrEqual),
            ">=" => Some(Self::GreaterThanOrEqual),
            "=" => Some(Self::Equal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct AlertRule {
    pub id: i64,
    pub rule_code: String,
    pub rule_name: String,
    pub category: String,
    pub metric_name: String,
    pub operator: String,
    pub threshold: f64,
    pub threshold_unit: Option<String>,
    pub severity: AlertSeverity,
    pub title: String,
    pub message_template: String,
    pub show_popup: bool,
    pub send_email: bool,
    pub auto_resolve: bool,
    pub active: bool,
    pub priority: i32,
}

impl AlertRule {
    /// `=` comparisons use a `0.01` epsilon; an unrecognized operator is
    /// treated as not-met rather than panicking.
    pub fn evaluate(&self, metric_value: f64) -> bool {
        if metric_value.is_nan() {
            return false;
        }
        match AlertOperator::from_symbol(&self.operator) {
            Some(AlertOperator::LessThan) => metric_value < self.threshold,
            Some(AlertOperator::GreaterThan) => metric_value > self.threshold,
            Some(AlertOperator::LessThanOrEqual) => metric_value <= self.threshold,
            Some(AlertOperator::GreaterThanOrEqual) => metric_value >= self.threshold,
            Some(AlertOperator::Equal) => (metric_value - self.threshold).abs() < 0.01,
            None => false,
        }
    }

    pub fn format_message(&self, metric_value: f64, facility_code: Option<&str>) -> String {
        let unit = self.threshold_unit.as_deref().unwrap_or("");
        let subject = facility_code.unwrap_or("system");
        self.message_template
            .replace("{metric_value}", &format!("{metric_value:.2}"))
            .replace("{threshold}", &format!("{:.2}", self.threshold))
            .replace("{unit}", unit)
            .replace("{facility}", subject)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub id: i64,
    pub rule_id: i64,
    pub facility_id: Option<i64>,
    pub source_id: Option<String>,
    pub calculation_date: chrono::NaiveDate,
    pub metric_value: f64,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub status: AlertStatus,
    pub triggered_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(operator: &str, threshold: f64) -> AlertRule {
        AlertRule {
            id: 1,
            rule_code: "R1".into(),
            rule_name: "test".into(),
            category: "storage".into(),
            metric_name: "level_pct".into(),
            operator: operator.into(),
            threshold,
            threshold_unit: Some("%".into()),
            severity: AlertSeverity::Warning,
            title: "Test rule".into(),
            message_template: "{facility} at {metric_value}{unit}, threshold {threshold}{unit}".into(),
            show_popup: true,
            send_email: false,
            auto_resolve: true,
            active: true,
            priority: 1,
        }
    }

    #[test]
    fn evaluate_dispatches_by_operator() {
        assert!(rule(">", 90.0).evaluate(95.0));
        assert!(!rule(">", 90.0).evaluate(85.0));
        assert!(rule("<", 20.0).evaluate(10.0));
        assert!(rule(">=", 90.0).evaluate(90.0));
        assert!(rule("<=", 20.0).evaluate(20.0));
        assert!(rule("=", 50.0).evaluate(50.005));
        assert!(!rule("=", 50.0).evaluate(50.5));
    }

    #[test]
    fn evaluate_rejects_nan_and_unknown_operator() {
        assert!(!rule(">", 90.0).evaluate(f64::NAN));
        assert!(!rule("~=", 90.0).evaluate(95.0));
    }

    #[test]
    fn format_message_substitutes_placeholders() {
        let msg = rule(">", 90.0).format_message(95.5, Some("TSF1"));
        assert_eq!(msg, "TSF1 at 95.50%, threshold 90.00%");
    }
}
