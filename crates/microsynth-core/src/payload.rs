//! Domain payloads attached to nodes and connections.
//!
//! A node payload describes a service: its code snippet, implementation
//! language and the HTTP endpoints it exposes. A connection payload
//! describes an inter-service call and may bind one of the target's
//! endpoints with concrete parameter values.
//!
//! Payloads are carried through the engine untouched. Fields this module
//! does not know about are kept in an `extra` map so that a snapshot
//! survives an import/export cycle without losing data.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Languages offered for generated services.
pub const LANGUAGES: [&str; 3] = ["javascript", "java", "python"];

/// HTTP methods an endpoint may declare.
pub const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Payload of a node: one service of the architecture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePayload {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub initiator: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodePayload {
    /// Payload the editor gives a freshly created node.
    ///
    /// A `controller` service under `/api` written in the first
    /// supported language, exposing a single sample endpoint.
    pub fn preset() -> Self {
        Self {
            code: String::new(),
            language: LANGUAGES[0].to_string(),
            kind: Some("controller".to_string()),
            base_path: Some("/api".to_string()),
            description: Some(String::new()),
            endpoints: vec![Endpoint::preset()],
            initiator: false,
            extra: Map::new(),
        }
    }

    /// Looks up a declared endpoint by path and method.
    pub fn endpoint(&self, path: &str, method: &str) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.path == path && e.method.eq_ignore_ascii_case(method))
    }
}

/// Payload of a connection: one call between two services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPayload {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_call: Option<ApiCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConnectionPayload {
    /// Payload the editor gives a freshly drawn connection: an empty JSON
    /// body and no bound call.
    pub fn preset() -> Self {
        Self {
            code: "{}".to_string(),
            language: "json".to_string(),
            ..Self::default()
        }
    }
}

/// An HTTP endpoint exposed by a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub responses: Vec<ApiResponse>,
    #[serde(default)]
    pub code: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Endpoint {
    fn preset() -> Self {
        Self {
            path: "/getObject".to_string(),
            summary: "getObject description".to_string(),
            method: HTTP_METHODS[0].to_string(),
            parameters: vec![Parameter {
                name: "id".to_string(),
                required: true,
                ..Parameter::default()
            }],
            responses: vec![ApiResponse {
                description: "success".to_string(),
                content: serde_json::json!({ "message": "success" }),
                ..ApiResponse::default()
            }],
            ..Self::default()
        }
    }
}

/// A declared endpoint parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Value type of an endpoint parameter.
///
/// Written in upper case on the wire. A type name outside the known set is
/// kept verbatim as [`ParameterType::Other`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParameterType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    Json,
    Other(String),
}

impl ParameterType {
    pub fn as_str(&self) -> &str {
        match self {
            ParameterType::String => "STRING",
            ParameterType::Integer => "INTEGER",
            ParameterType::Float => "FLOAT",
            ParameterType::Boolean => "BOOLEAN",
            ParameterType::Object => "OBJECT",
            ParameterType::Array => "ARRAY",
            ParameterType::Json => "JSON",
            ParameterType::Other(name) => name,
        }
    }
}

impl From<String> for ParameterType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "STRING" => ParameterType::String,
            "INTEGER" => ParameterType::Integer,
            "FLOAT" => ParameterType::Float,
            "BOOLEAN" => ParameterType::Boolean,
            "OBJECT" => ParameterType::Object,
            "ARRAY" => ParameterType::Array,
            "JSON" => ParameterType::Json,
            _ => ParameterType::Other(name),
        }
    }
}

impl From<ParameterType> for String {
    fn from(kind: ParameterType) -> Self {
        match kind {
            ParameterType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A documented response of an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default = "default_media_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ApiResponse {
    fn default() -> Self {
        Self {
            status: default_status(),
            description: String::new(),
            kind: default_media_type(),
            content: Value::Null,
            extra: Map::new(),
        }
    }
}

fn default_status() -> u16 {
    200
}

fn default_media_type() -> String {
    "application/json".to_string()
}

/// A call bound to one of the target service's endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCall {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub parameter_values: Vec<ParameterValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ApiCall {
    fn default() -> Self {
        Self {
            path: String::new(),
            method: default_method(),
            parameter_values: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn default_method() -> String {
    HTTP_METHODS[0].to_string()
}

impl ApiCall {
    /// Whether this call targets `endpoint` (same path, method compared case-insensitively).
    ///
    /// # Examples
    ///
    /// ```
    /// use microsynth_core::payload::{ApiCall, Endpoint};
    ///
    /// let endpoint = Endpoint {
    ///     path: "/orders".to_string(),
    ///     method: "POST".to_string(),
    ///     ..Endpoint::default()
    /// };
    /// let call = ApiCall {
    ///     path: "/orders".to_string(),
    ///     method: "post".to_string(),
    ///     ..ApiCall::default()
    /// };
    /// assert!(call.matches(&endpoint));
    /// ```
    pub fn matches(&self, endpoint: &Endpoint) -> bool {
        self.path == endpoint.path && self.method.eq_ignore_ascii_case(&endpoint.method)
    }
}

/// A concrete value bound to a parameter of an [`ApiCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParameterValue {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            extra: Map::new(),
        }
    }
}
