use crate::models::field::StructuredField;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkLogEntry {
    pub at: i64,
    pub minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Usage counters carried by both templates and issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used_at: Option<i64>,
    #[serde(default)]
    pub work_log: Vec<WorkLogEntry>,
}

impl Metrics {
    pub fn record_use(&mut self, at: i64, minutes: Option<u32>, note: Option<String>) {
        self.usage_count += 1;
        self.last_used_at = Some(at);
        if let Some(minutes) = minutes {
            self.work_log.push(WorkLogEntry { at, minutes, note });
        }
    }

    pub fn total_minutes(&self) -> u64 {
        self.work_log.iter().map(|entry| u64::from(entry.minutes)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "issue")]
    pub issue_name: String,
    #[serde(rename = "name")]
    pub template_name: String,
    #[serde(rename = "kba")]
    pub article_id: String,
    pub fields: Vec<StructuredField>,
    #[serde(default)]
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "name")]
    pub issue_name: String,
    #[serde(rename = "templateNames")]
    pub related_template_names: Vec<String>,
    #[serde(default)]
    pub metrics: Metrics,
}

impl Issue {
    pub fn new(issue_name: impl Into<String>) -> Self {
        Self {
            issue_name: issue_name.into(),
            related_template_names: Vec::new(),
            metrics: Metrics::default(),
        }
    }

    pub fn references(&self, template_name: &str) -> bool {
        self.related_template_names.iter().any(|name| name == template_name)
    }
}

/// Input for the validated template creation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub issue_name: String,
    pub template_name: String,
    pub article_id: String,
    pub fields: Vec<StructuredField>,
}

/// Both collections, as produced by an import or consumed by an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub issues: Vec<Issue>,
    pub templates: Vec<Template>,
}

/// An issue that still lists a template which no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingReference {
    pub issue_name: String,
    pub template_name: String,
}
