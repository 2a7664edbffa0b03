use crate::utils::error::{EtlError, ErrorCategory, ErrorSeverity, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A schema-less document as held by the store.
pub type Document = Map<String, Value>;

/// Store-assigned identifier key on every stored document.
pub const ID_FIELD: &str = "_id";

/// Raw upstream record; every field is optional and `null` counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub data: Map<String, Value>,
}

impl RawRecord {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key).filter(|v| !v.is_null())
    }

    /// 依序走訪巢狀物件，例如 `["links", "patch", "small"]`
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.get(first)?;
        for key in rest {
            current = current.as_object()?.get(*key)?;
        }
        (!current.is_null()).then_some(current)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn u64_field(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(as_whole_number)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn path_str(&self, path: &[&str]) -> Option<&str> {
        self.get_path(path).and_then(Value::as_str)
    }

    /// Identifiers arrive as strings or numbers depending on the source.
    pub fn id_field(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.data).unwrap_or_else(|_| "<unprintable>".to_string())
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

fn as_whole_number(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// Fixed-shape, fully defaulted record written to a clean collection.
pub trait CleanRecord:
    Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Field names downstream consumers rely on.
    const FIELDS: &'static [&'static str];

    fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(EtlError::TransformError {
                message: "clean record did not serialize to an object".to_string(),
                record: other.to_string(),
            }),
        }
    }

    fn from_document(doc: &Document) -> Result<Self> {
        let mut fields = doc.clone();
        fields.remove(ID_FIELD);
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// A named collection inside a database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionRef {
    pub database: String,
    pub name: String,
}

impl CollectionRef {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }

    /// Staging collection used by the shadow-swap strategy.
    pub fn shadow(&self) -> Self {
        Self {
            database: self.database.clone(),
            name: format!("{}__staging", self.name),
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Connect,
    Extract,
    Transform,
    Load,
    Snapshot,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Snapshot => "snapshot",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshStatus {
    Success,
    SkippedEmpty,
    /// Clean target replaced, but the raw snapshot could not be written.
    Partial,
    Failed,
}

/// First error of a run, with the stage it happened in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
}

impl StageFailure {
    pub fn new(stage: Stage, error: &EtlError) -> Self {
        Self {
            stage,
            message: error.to_string(),
            category: error.category(),
            severity: error.severity(),
        }
    }
}

/// Outcome of one refresh run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub pipeline: String,
    pub target: CollectionRef,
    pub extracted: usize,
    pub transformed: usize,
    pub loaded: usize,
    pub status: RefreshStatus,
    pub error: Option<StageFailure>,
    pub elapsed_ms: u128,
}

impl RefreshResult {
    pub fn started(pipeline: impl Into<String>, target: CollectionRef) -> Self {
        Self {
            pipeline: pipeline.into(),
            target,
            extracted: 0,
            transformed: 0,
            loaded: 0,
            status: RefreshStatus::Success,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn fail(&mut self, stage: Stage, error: &EtlError) {
        if let Some(loaded) = error.loaded_count() {
            self.loaded = loaded;
        }
        self.status = RefreshStatus::Failed;
        self.error.get_or_insert_with(|| StageFailure::new(stage, error));
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            RefreshStatus::Success | RefreshStatus::SkippedEmpty
        )
    }
}
