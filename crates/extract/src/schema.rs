use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of `POST /analyze`. Field names are fixed by the remote service.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "Input")]
    pub input: String,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
}

/// One extracted task as returned by the service.
///
/// Keys are whatever the model chose to emit, so the record is kept as an
/// untyped JSON object and read through alias tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRecord(pub Map<String, Value>);

impl TaskRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for TaskRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Single(TaskRecord),
    Multi(Vec<TaskRecord>),
}

impl AnalysisResult {
    /// Classify the `data` member of a response.
    ///
    /// An object carrying a `tasks` array is a multi-task result; any other
    /// object is a single record. Non-object values have no structured shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        if let Some(Value::Array(tasks)) = object.get("tasks") {
            let records = tasks
                .iter()
                .map(|task| match task {
                    Value::Object(map) => TaskRecord(map.clone()),
                    _ => TaskRecord::default(),
                })
                .collect();
            return Some(AnalysisResult::Multi(records));
        }

        Some(AnalysisResult::Single(TaskRecord(object.clone())))
    }
}

/// Envelope returned by the service on success.
///
/// Members are read one by one so a malformed `success` or `rawContent` does
/// not hide an otherwise usable `data` object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiResponse {
    pub success: Option<bool>,
    pub data: Option<Value>,
    #[serde(rename = "rawContent")]
    pub raw_content: Option<String>,
    /// The decoded body as received, for the raw fallback display.
    #[serde(skip)]
    pub payload: Value,
}

impl ApiResponse {
    pub fn from_payload(payload: Value) -> Self {
        let success = payload.get("success").and_then(Value::as_bool);
        let data = payload.get("data").filter(|v| !v.is_null()).cloned();
        let raw_content = payload
            .get("rawContent")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            success,
            data,
            raw_content,
            payload,
        }
    }

    pub fn analysis(&self) -> Option<AnalysisResult> {
        self.data.as_ref().and_then(AnalysisResult::from_value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayField {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskGroup {
    pub title: String,
    pub fields: Vec<DisplayField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum DisplayView {
    None,
    Single(Vec<DisplayField>),
    Multi(Vec<TaskGroup>),
}
