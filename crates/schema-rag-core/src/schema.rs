//! Typed shapes for the schema and analytics documents the prompts carry.
//!
//! The agent prompt documents a JSON schema layout with upper-case keys;
//! [`Schema`] decodes it so callers can inspect a proposed schema. Report
//! mode takes per-month resource usage in the [`Analytics`] shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "TABLES", default)]
    pub tables: BTreeMap<String, TableInfo>,
}

impl Schema {
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    #[serde(rename = "COLUMNS", default)]
    pub columns: BTreeMap<String, ColumnInfo>,
    #[serde(rename = "PRIMARY_KEYS", default)]
    pub primary_keys: Vec<String>,
    #[serde(rename = "FOREIGN_KEYS", default)]
    pub foreign_keys: Vec<ForeignKeyInfo>,
    #[serde(rename = "CHECKS", default)]
    pub checks: Vec<Value>,
    #[serde(rename = "INDEXES", default)]
    pub indexes: Vec<Vec<String>>,
    #[serde(rename = "COMMENT", default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    #[serde(rename = "TYPE")]
    pub data_type: String,
    #[serde(rename = "NULLABLE", default)]
    pub nullable: Option<bool>,
    #[serde(rename = "UNIQUE", default)]
    pub unique: Option<bool>,
    #[serde(rename = "DEFAULT", default)]
    pub default: Option<Value>,
    #[serde(rename = "CHECKS", default)]
    pub checks: Vec<Value>,
    #[serde(rename = "IS_PRIMARY", default)]
    pub is_primary: bool,
    #[serde(rename = "IS_INDEX", default)]
    pub is_index: bool,
    #[serde(rename = "COMMENT", default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    #[serde(rename = "COLUMNS", default)]
    pub columns: Vec<String>,
    #[serde(rename = "FOREIGN_TABLE")]
    pub foreign_table: String,
    #[serde(rename = "REFERRED_COLUMNS", default)]
    pub referred_columns: Vec<String>,
    #[serde(rename = "ON_DELETE", default)]
    pub on_delete: Option<String>,
    #[serde(rename = "ON_UPDATE", default)]
    pub on_update: Option<String>,
}

/// Resource usage keyed by month (`YYYY-MM`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    #[serde(rename = "MonthlyAnalytics", alias = "monthly_analytics", default)]
    pub monthly: BTreeMap<String, MonthlyAnalytic>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAnalytic {
    #[serde(rename = "DiskUsage", alias = "disk_usage", default)]
    pub disk_usage: f64,
    #[serde(rename = "CPUUsage", alias = "cpu_usage", default)]
    pub cpu_usage: f64,
    #[serde(rename = "MemoryUsage", alias = "memory_usage", default)]
    pub memory_usage: f64,
    #[serde(rename = "NetworkUsage", alias = "network_usage", default)]
    pub network_usage: f64,
    #[serde(rename = "Costs", alias = "costs", default)]
    pub costs: f64,
}

impl Analytics {
    /// Sum of costs over every month.
    pub fn total_costs(&self) -> f64 {
        self.monthly.values().map(|m| m.costs).sum()
    }
}
