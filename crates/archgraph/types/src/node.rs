use crate::error::SchemaError;
use crate::ids::{LogicalId, NodeId};
use crate::temporal::Versioned;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Default author recorded when a caller does not supply `created_by`.
pub const DEFAULT_AUTHOR: &str = "system";

/// Keys a caller can never set through an attribute bag.
const PROTECTED_KEYS: &[&str] = &[
    "id",
    "logical_id",
    "version",
    "valid_from",
    "valid_to",
    "updated_at",
    "type",
    "kind",
    "layer",
];

const BASE_KEYS: &[&str] = &["name", "description", "status", "tags", "created_by"];

/// The closed set of node types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Capability,
    Service,
    Process,
    ProcessStep,
    DataEntity,
    Application,
    ApplicationComponent,
    Api,
    SpecDocument,
}

impl NodeType {
    pub const ALL: [NodeType; 9] = [
        NodeType::Capability,
        NodeType::Service,
        NodeType::Process,
        NodeType::ProcessStep,
        NodeType::DataEntity,
        NodeType::Application,
        NodeType::ApplicationComponent,
        NodeType::Api,
        NodeType::SpecDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capability => "capability",
            Self::Service => "service",
            Self::Process => "process",
            Self::ProcessStep => "process_step",
            Self::DataEntity => "data_entity",
            Self::Application => "application",
            Self::ApplicationComponent => "application_component",
            Self::Api => "api",
            Self::SpecDocument => "spec_document",
        }
    }

    /// The layer is a pure function of the type.
    pub fn layer(&self) -> Layer {
        match self {
            Self::Capability | Self::Service | Self::Process | Self::ProcessStep => Layer::Business,
            Self::DataEntity => Layer::Data,
            Self::Application | Self::ApplicationComponent | Self::Api => Layer::Application,
            Self::SpecDocument => Layer::Spec,
        }
    }

    pub fn is_spec(&self) -> bool {
        matches!(self, Self::SpecDocument)
    }

    /// Names of the type-specific attributes accepted in an attribute bag.
    fn attribute_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Capability => &["level", "owner", "maturity", "acceptance_criteria"],
            Self::Service => &["owner", "sla", "acceptance_criteria"],
            Self::Process => &["owner", "trigger", "frequency"],
            Self::ProcessStep => &["sequence", "actor", "automated"],
            Self::DataEntity => &["classification", "owner", "retention_days"],
            Self::Application => &["vendor", "technology", "hosting", "acceptance_criteria"],
            Self::ApplicationComponent => &["technology", "repository"],
            Self::Api => &["protocol", "endpoint", "api_version", "visibility"],
            Self::SpecDocument => &["spec_kind", "format", "content", "uri"],
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = SchemaError;

    /// Case-insensitive; accepts `process_step`, `process-step` and `ProcessStep`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().replace('_', "") == normalized)
            .ok_or_else(|| SchemaError::UnknownNodeType(s.to_string()))
    }
}

/// Grouping tag derived from [`NodeType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Business,
    Data,
    Application,
    Spec,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Data => "data",
            Self::Application => "application",
            Self::Spec => "spec",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "business" => Ok(Self::Business),
            "data" => Ok(Self::Data),
            "application" => Ok(Self::Application),
            "spec" => Ok(Self::Spec),
            other => Err(SchemaError::malformed("layer", format!("unknown layer {other}"))),
        }
    }
}

/// Lifecycle status. Any value may be set from any other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Draft,
    Active,
    Deprecated,
    Archived,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.trim().to_ascii_lowercase()))
            .map_err(|_| SchemaError::malformed("status", format!("unknown status {s}")))
    }
}

// ── Type-specific attributes ────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityAttributes {
    /// Depth in the capability map, 0 for top-level capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Maturity score, 1 (initial) to 5 (optimised).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessStepAttributes {
    /// 1-based position of the step inside its process.
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default)]
    pub automated: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClassification {
    Public,
    #[default]
    Internal,
    Confidential,
    Restricted,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataEntityAttributes {
    #[serde(default)]
    pub classification: DataClassification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationComponentAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiProtocol {
    Rest,
    Graphql,
    Grpc,
    Soap,
    Async,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Partner,
    #[default]
    Internal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiAttributes {
    pub protocol: ApiProtocol,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub visibility: AccessLevel,
}

/// Kind of specification document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecKind {
    Openapi,
    Asyncapi,
    GraphqlSchema,
    DataModel,
    Erd,
    Requirements,
    Adr,
    TestPlan,
    Other,
}

impl SpecKind {
    /// Kinds that describe an API contract.
    pub fn is_api_contract(&self) -> bool {
        matches!(self, Self::Openapi | Self::Asyncapi | Self::GraphqlSchema)
    }

    /// Kinds that describe a data model.
    pub fn is_data_model(&self) -> bool {
        matches!(self, Self::DataModel | Self::Erd)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecDocumentAttributes {
    pub spec_kind: SpecKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Type-specific attributes, one variant per [`NodeType`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "attributes", rename_all = "snake_case")]
pub enum NodeKind {
    Capability(CapabilityAttributes),
    Service(ServiceAttributes),
    Process(ProcessAttributes),
    ProcessStep(ProcessStepAttributes),
    DataEntity(DataEntityAttributes),
    Application(ApplicationAttributes),
    ApplicationComponent(ApplicationComponentAttributes),
    Api(ApiAttributes),
    SpecDocument(SpecDocumentAttributes),
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Capability(_) => NodeType::Capability,
            Self::Service(_) => NodeType::Service,
            Self::Process(_) => NodeType::Process,
            Self::ProcessStep(_) => NodeType::ProcessStep,
            Self::DataEntity(_) => NodeType::DataEntity,
            Self::Application(_) => NodeType::Application,
            Self::ApplicationComponent(_) => NodeType::ApplicationComponent,
            Self::Api(_) => NodeType::Api,
            Self::SpecDocument(_) => NodeType::SpecDocument,
        }
    }

    /// Parse and validate the type-specific part of an attribute bag.
    pub fn from_attributes(
        node_type: NodeType,
        attrs: Map<String, Value>,
    ) -> Result<Self, SchemaError> {
        let kind = match node_type {
            NodeType::Capability => Self::Capability(parse_variant(node_type, attrs)?),
            NodeType::Service => Self::Service(parse_variant(node_type, attrs)?),
            NodeType::Process => Self::Process(parse_variant(node_type, attrs)?),
            NodeType::ProcessStep => Self::ProcessStep(parse_variant(node_type, attrs)?),
            NodeType::DataEntity => Self::DataEntity(parse_variant(node_type, attrs)?),
            NodeType::Application => Self::Application(parse_variant(node_type, attrs)?),
            NodeType::ApplicationComponent => {
                Self::ApplicationComponent(parse_variant(node_type, attrs)?)
            }
            NodeType::Api => Self::Api(parse_variant(node_type, attrs)?),
            NodeType::SpecDocument => Self::SpecDocument(parse_variant(node_type, attrs)?),
        };
        kind.check()?;
        Ok(kind)
    }

    /// Range checks serde cannot express.
    fn check(&self) -> Result<(), SchemaError> {
        match self {
            Self::Capability(a) => {
                if let Some(m) = a.maturity {
                    if !(1..=5).contains(&m) {
                        return Err(SchemaError::malformed("maturity", "must be between 1 and 5"));
                    }
                }
            }
            Self::ProcessStep(a) => {
                if a.sequence == 0 {
                    return Err(SchemaError::malformed("sequence", "must be at least 1"));
                }
            }
            Self::Api(a) => {
                if a.endpoint.as_deref().is_some_and(|e| e.trim().is_empty()) {
                    return Err(SchemaError::malformed("endpoint", "must not be blank"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn to_attributes(&self) -> Map<String, Value> {
        let value = match self {
            Self::Capability(a) => serde_json::to_value(a),
            Self::Service(a) => serde_json::to_value(a),
            Self::Process(a) => serde_json::to_value(a),
            Self::ProcessStep(a) => serde_json::to_value(a),
            Self::DataEntity(a) => serde_json::to_value(a),
            Self::Application(a) => serde_json::to_value(a),
            Self::ApplicationComponent(a) => serde_json::to_value(a),
            Self::Api(a) => serde_json::to_value(a),
            Self::SpecDocument(a) => serde_json::to_value(a),
        };
        match value {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Acceptance criteria text, for the types that carry it.
    pub fn acceptance_criteria(&self) -> Option<&str> {
        match self {
            Self::Capability(a) => a.acceptance_criteria.as_deref(),
            Self::Service(a) => a.acceptance_criteria.as_deref(),
            Self::Application(a) => a.acceptance_criteria.as_deref(),
            _ => None,
        }
    }

    pub fn spec_kind(&self) -> Option<SpecKind> {
        match self {
            Self::SpecDocument(a) => Some(a.spec_kind),
            _ => None,
        }
    }
}

fn parse_variant<T: DeserializeOwned>(
    node_type: NodeType,
    attrs: Map<String, Value>,
) -> Result<T, SchemaError> {
    let known = node_type.attribute_keys();
    if let Some(unknown) = attrs.keys().find(|k| !known.contains(&k.as_str())) {
        return Err(SchemaError::UnknownAttribute {
            node_type: node_type.to_string(),
            field: unknown.clone(),
        });
    }
    serde_json::from_value(Value::Object(attrs)).map_err(|e| {
        let reason = e.to_string();
        match reason.strip_prefix("missing field `") {
            Some(rest) => {
                SchemaError::MissingField(rest.split('`').next().unwrap_or(rest).to_string())
            }
            None => SchemaError::malformed(node_type.as_str(), reason),
        }
    })
}

// ── Shared attributes ───────────────────────────────────────────────────

/// Everything about a node that callers may set: the shared base attributes
/// plus the type-specific [`NodeKind`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_by: String,
    pub kind: NodeKind,
}

impl NodeAttributes {
    /// Validate a flat attribute bag (base and type-specific keys side by side)
    /// against the schema of `node_type`.
    pub fn from_json(node_type: NodeType, value: &Value) -> Result<Self, SchemaError> {
        let mut map = match value {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => return Err(SchemaError::NotAnObject),
        };
        for key in PROTECTED_KEYS {
            map.remove(*key);
        }

        let name = match map.remove("name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::String(_)) => {
                return Err(SchemaError::malformed("name", "must not be empty"))
            }
            Some(Value::Null) | None => return Err(SchemaError::MissingField("name".into())),
            Some(_) => return Err(SchemaError::malformed("name", "expected a string")),
        };
        let description = optional_string(&mut map, "description")?.unwrap_or_default();
        let status = match map.remove("status") {
            Some(Value::String(s)) => s.parse()?,
            Some(Value::Null) | None => NodeStatus::default(),
            Some(_) => return Err(SchemaError::malformed("status", "expected a string")),
        };
        let tags = match map.remove("tags") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                    _ => Err(SchemaError::malformed("tags", "expected non-empty strings")),
                })
                .collect::<Result<BTreeSet<_>, _>>()?,
            Some(Value::Null) | None => BTreeSet::new(),
            Some(_) => return Err(SchemaError::malformed("tags", "expected an array")),
        };
        let created_by =
            optional_string(&mut map, "created_by")?.unwrap_or_else(|| DEFAULT_AUTHOR.to_string());

        // Null on an optional attribute means "unset".
        map.retain(|_, v| !v.is_null());
        let kind = NodeKind::from_attributes(node_type, map)?;

        Ok(Self {
            name,
            description,
            status,
            tags,
            created_by,
            kind,
        })
    }

    /// Flat attribute bag, the inverse of [`NodeAttributes::from_json`].
    pub fn to_json(&self) -> Value {
        let mut map = self.kind.to_attributes();
        map.insert("name".into(), Value::String(self.name.clone()));
        map.insert("description".into(), Value::String(self.description.clone()));
        map.insert("status".into(), Value::String(self.status.as_str().into()));
        map.insert(
            "tags".into(),
            Value::Array(self.tags.iter().cloned().map(Value::String).collect()),
        );
        map.insert("created_by".into(), Value::String(self.created_by.clone()));
        Value::Object(map)
    }

    /// Apply a partial attribute bag on top of these attributes and re-validate.
    ///
    /// Top-level merge: keys in `patch` replace existing keys, `null` unsets a
    /// key, and identity, version and temporal keys are ignored.
    pub fn merged(&self, patch: &Value) -> Result<Self, SchemaError> {
        let patch = match patch {
            Value::Object(map) => map,
            Value::Null => return Ok(self.clone()),
            _ => return Err(SchemaError::NotAnObject),
        };
        let mut merged = match self.to_json() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in patch {
            if PROTECTED_KEYS.contains(&key.as_str()) {
                continue;
            }
            if value.is_null() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
        Self::from_json(self.node_type(), &Value::Object(merged))
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Whether `key` is a recognised attribute for `node_type`.
    pub fn is_known_key(node_type: NodeType, key: &str) -> bool {
        BASE_KEYS.contains(&key) || node_type.attribute_keys().contains(&key)
    }
}

fn optional_string(map: &mut Map<String, Value>, key: &str) -> Result<Option<String>, SchemaError> {
    match map.remove(key) {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(SchemaError::malformed(key, "expected a string")),
    }
}

// ── Node ────────────────────────────────────────────────────────────────

/// One version of a node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub logical_id: LogicalId,
    pub version: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub attributes: NodeAttributes,
}

impl Node {
    /// First version of a new logical entity.
    pub fn first_version(attributes: NodeAttributes, now: DateTime<Utc>) -> Self {
        Self {
            id: NodeId::new(),
            logical_id: LogicalId::new(),
            version: 1,
            valid_from: now,
            valid_to: None,
            updated_at: now,
            attributes,
        }
    }

    /// Successor version carrying `attributes`. The caller closes `self`.
    pub fn successor(&self, attributes: NodeAttributes, now: DateTime<Utc>) -> Self {
        Self {
            id: NodeId::new(),
            logical_id: self.logical_id,
            version: self.version + 1,
            valid_from: now,
            valid_to: None,
            updated_at: now,
            attributes,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.attributes.node_type()
    }

    pub fn layer(&self) -> Layer {
        self.node_type().layer()
    }

    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    pub fn description(&self) -> &str {
        &self.attributes.description
    }

    pub fn status(&self) -> NodeStatus {
        self.attributes.status
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.attributes.tags
    }

    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            id: self.id,
            name: self.attributes.name.clone(),
            node_type: self.node_type(),
            layer: self.layer(),
        }
    }
}

impl Versioned for Node {
    fn valid_from(&self) -> DateTime<Utc> {
        self.valid_from
    }

    fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }
}

/// Display attributes of a relationship endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub name: String,
    pub node_type: NodeType,
    pub layer: Layer,
}
