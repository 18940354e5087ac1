//! Action contracts — named retrieval operations with typed parameters.
//!
//! Actions are what the plan proposes and the gather stage executes against
//! external data sources (applicant-tracking API, documentation search).
//! The registry holds the known signatures; the plan validator checks every
//! proposed call against them before anything runs, so downstream stages can
//! trust the payloads instead of re-checking shapes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ActionError;

/// A single planned invocation of a named action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionCall {
    /// Name of the action to execute.
    pub name: String,

    /// Parameters as a JSON object.
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl ActionCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: serde_json::Map::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Fetch a string parameter, if present and a string.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }
}

/// The expected JSON type of an action parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Object => "object",
            ParameterKind::Array => "array",
        }
    }

    /// Whether a JSON value matches this kind.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ParameterKind::String => value.is_string(),
            ParameterKind::Number => value.is_number(),
            ParameterKind::Boolean => value.is_boolean(),
            ParameterKind::Object => value.is_object(),
            ParameterKind::Array => value.is_array(),
        }
    }
}

/// A required parameter in an action signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
}

impl ParameterSpec {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::String,
        }
    }
}

/// How an action's successful payload is filed in the conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Structured tool data, keyed by action name (entries append).
    Retrieval,
    /// Documentation search, keyed by query + hop index.
    DocSearch,
}

/// The declared signature of a known action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSignature {
    /// Unique action name (e.g. "get_applications").
    pub name: String,

    /// What this action retrieves (shown to the planner).
    pub description: String,

    /// Required parameters. Extra parameters are permitted and passed through.
    pub required: Vec<ParameterSpec>,

    /// Where successful payloads are filed.
    pub kind: ActionKind,
}

/// A registry of known action signatures.
///
/// The plan validator uses this to confirm a proposed plan is well-formed
/// before execution; the gather stage uses it to route payloads into the
/// right evidence map.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    signatures: HashMap<String, ActionSignature>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            signatures: HashMap::new(),
        }
    }

    /// Register a signature. Replaces any existing signature with the same name.
    pub fn register(&mut self, signature: ActionSignature) {
        self.signatures.insert(signature.name.clone(), signature);
    }

    /// Look up a signature by action name.
    pub fn get(&self, name: &str) -> Option<&ActionSignature> {
        self.signatures.get(name)
    }

    /// Whether a successful payload for this action is documentation data.
    pub fn is_doc_search(&self, name: &str) -> bool {
        self.get(name)
            .map(|s| s.kind == ActionKind::DocSearch)
            .unwrap_or(false)
    }

    /// All registered action names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.signatures.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

/// Executes a single action against its external data source.
///
/// One call per action; each call is independently timeout-bounded by the
/// gather stage. Implementations live outside the core (MCP bridge, HTTP
/// clients); tests use scripted fakes.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, call: &ActionCall) -> std::result::Result<serde_json::Value, ActionError>;
}
