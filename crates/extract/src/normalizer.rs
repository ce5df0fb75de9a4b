use serde_json::Value;

use crate::schema::{AnalysisResult, DisplayField, DisplayView, TaskGroup, TaskRecord};

/// Shown when none of a field's aliases carries a usable value.
pub const FALLBACK_PLACEHOLDER: &str = "(chưa có thông tin)";

/// A display label and the record keys that may carry its value, in lookup order.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub label: &'static str,
    pub aliases: &'static [&'static str],
}

pub const TASK_FIELD: FieldSpec = FieldSpec {
    label: "Công việc",
    aliases: &["Nội dung", "Công việc", "Content", "Task"],
};

pub const ASSIGNEE_FIELD: FieldSpec = FieldSpec {
    label: "Người xử lý",
    aliases: &["Người thực hiện", "Người xử lý", "Assignee"],
};

pub const DEADLINE_FIELD: FieldSpec = FieldSpec {
    label: "Hạn xử lý",
    aliases: &["Thời hạn", "Hạn xử lý", "Deadline"],
};

pub const COLLABORATORS_FIELD: FieldSpec = FieldSpec {
    label: "Phối hợp",
    aliases: &["Người phối hợp", "Phối hợp", "Stakeholders"],
};

pub const PRIORITY_FIELD: FieldSpec = FieldSpec {
    label: "Ưu tiên",
    aliases: &["Độ ưu tiên", "Ưu tiên", "Priority"],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityTier {
    Urgent,
    High,
    Low,
    Normal,
}

impl PriorityTier {
    pub fn label(self) -> &'static str {
        match self {
            PriorityTier::Urgent => "khẩn cấp",
            PriorityTier::High => "gấp",
            PriorityTier::Low => "thấp",
            PriorityTier::Normal => "bình thường",
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            PriorityTier::Urgent => &["gấp", "khẩn", "cấp bách", "cần ngay", "cao độ"],
            // "gấp" already lands in Urgent, so only the English keyword can reach here.
            PriorityTier::High => &["high"],
            PriorityTier::Low => &["thấp", "low"],
            PriorityTier::Normal => &["bình thường", "normal", "medium"],
        }
    }
}

/// Tiers in match order; the first tier with a keyword hit wins.
const TIER_ORDER: [PriorityTier; 4] = [
    PriorityTier::Urgent,
    PriorityTier::High,
    PriorityTier::Low,
    PriorityTier::Normal,
];

/// Coerce a record value to display text. `None` means the value is unusable.
fn coerce(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items.iter().filter_map(coerce).collect::<Vec<_>>().join(", "),
        Value::Bool(_) | Value::Number(_) | Value::Object(_) => value.to_string(),
    };

    if text.is_empty() { None } else { Some(text) }
}

/// Return the first alias whose value is present and non-blank, else `fallback`.
pub fn resolve_field(record: &TaskRecord, alias_keys: &[&str], fallback: &str) -> String {
    lookup(record, alias_keys).unwrap_or_else(|| fallback.to_string())
}

fn lookup(record: &TaskRecord, alias_keys: &[&str]) -> Option<String> {
    alias_keys
        .iter()
        .filter_map(|key| record.get(key))
        .find_map(coerce)
}

/// Keyword tier for `text`, which is expected to be lowercase already.
pub fn classify_priority(text: &str) -> PriorityTier {
    TIER_ORDER
        .into_iter()
        .find(|tier| tier.keywords().iter().any(|kw| text.contains(kw)))
        .unwrap_or(PriorityTier::Normal)
}

/// Like `lookup` over the priority aliases, but strings come back untrimmed.
fn explicit_priority(record: &TaskRecord) -> Option<String> {
    PRIORITY_FIELD
        .aliases
        .iter()
        .filter_map(|key| record.get(key))
        .find_map(|value| match value {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => coerce(other),
        })
}

/// Priority label for a record: the explicit field verbatim when present,
/// otherwise a keyword guess over the source text and the record itself.
pub fn infer_priority(record: &TaskRecord, raw_source_text: &str) -> String {
    if let Some(explicit) = explicit_priority(record) {
        return explicit;
    }

    let serialized = serde_json::to_string(record).unwrap_or_default();
    let haystack = format!("{} {}", raw_source_text, serialized).to_lowercase();

    classify_priority(&haystack).label().to_string()
}

pub struct TaskNormalizer {
    placeholder: String,
}

impl TaskNormalizer {
    pub fn new() -> Self {
        Self::with_placeholder(FALLBACK_PLACEHOLDER)
    }

    pub fn with_placeholder(placeholder: &str) -> Self {
        let placeholder = placeholder.trim();
        Self {
            // Blank placeholders would break the non-empty display invariant.
            placeholder: if placeholder.is_empty() {
                FALLBACK_PLACEHOLDER.to_string()
            } else {
                placeholder.to_string()
            },
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// The five display lines for one record, in display order.
    pub fn normalize(&self, record: &TaskRecord, raw_source_text: &str) -> Vec<DisplayField> {
        let described = [TASK_FIELD, ASSIGNEE_FIELD, DEADLINE_FIELD, COLLABORATORS_FIELD];
        let mut fields: Vec<DisplayField> = described
            .iter()
            .map(|spec| DisplayField {
                label: spec.label.to_string(),
                value: resolve_field(record, spec.aliases, &self.placeholder),
            })
            .collect();

        fields.push(DisplayField {
            label: PRIORITY_FIELD.label.to_string(),
            value: infer_priority(record, raw_source_text),
        });

        fields
    }

    pub fn build_display_view(
        &self,
        result: Option<&AnalysisResult>,
        raw_source_text: &str,
    ) -> DisplayView {
        match result {
            Some(AnalysisResult::Multi(records)) => DisplayView::Multi(
                records
                    .iter()
                    .enumerate()
                    .map(|(i, record)| TaskGroup {
                        title: format!("Nhiệm vụ #{}", i + 1),
                        fields: self.normalize(record, raw_source_text),
                    })
                    .collect(),
            ),
            Some(AnalysisResult::Single(record)) => {
                DisplayView::Single(self.normalize(record, raw_source_text))
            }
            None => DisplayView::None,
        }
    }
}

impl Default for TaskNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// [`TaskNormalizer::build_display_view`] with the default placeholder.
pub fn build_display_view(result: Option<&AnalysisResult>, raw_source_text: &str) -> DisplayView {
    TaskNormalizer::new().build_display_view(result, raw_source_text)
}
