//! Port configuration: a discriminated union over port type (spec §3, §4.1).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
    Passthrough,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PortMetadata {
    #[serde(default)]
    pub is_system_port: bool,
    pub port_category: Option<String>,
}

/// Fields common to every port config, regardless of type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortIdentity {
    pub id: String,
    pub key: String,
    pub node_id: String,
    pub parent_id: Option<String>,
    pub direction: PortDirection,
    pub order: Option<i64>,
    pub required: Option<bool>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<PortMetadata>,
}

impl PortIdentity {
    pub fn new(id: impl Into<String>, node_id: impl Into<String>, direction: PortDirection) -> Self {
        let id = id.into();
        PortIdentity {
            key: id.clone(),
            id,
            node_id: node_id.into(),
            parent_id: None,
            direction,
            order: None,
            required: None,
            title: None,
            description: None,
            metadata: None,
        }
    }
}

/// Body shared by the type-specific variants that carry no recursive
/// structure of their own (`string`, `number`, `boolean`, `enum`, `stream`,
/// `secret`). Constraints particular to a type (`minLength`, `options`,
/// `secretType`, ...) travel in `extra` rather than being hand-modeled one
/// field at a time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortConfigBody {
    #[serde(flatten)]
    pub identity: PortIdentity,
    pub original_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `object.schema.properties`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub properties: BTreeMap<String, PortConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectPortConfigBody {
    #[serde(flatten)]
    pub identity: PortIdentity,
    pub original_type: Option<String>,
    pub schema: ObjectSchema,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayPortConfigBody {
    #[serde(flatten)]
    pub identity: PortIdentity,
    pub original_type: Option<String>,
    pub item_config: Box<PortConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnyPortConfigBody {
    #[serde(flatten)]
    pub identity: PortIdentity,
    pub underlying_type: Option<Box<PortConfig>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The discriminated union of port configs (spec §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PortConfig {
    String(PortConfigBody),
    Number(PortConfigBody),
    Boolean(PortConfigBody),
    Enum(PortConfigBody),
    Array(ArrayPortConfigBody),
    Object(ObjectPortConfigBody),
    Stream(PortConfigBody),
    Any(AnyPortConfigBody),
    Secret(PortConfigBody),
}

impl PortConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            PortConfig::String(_) => "string",
            PortConfig::Number(_) => "number",
            PortConfig::Boolean(_) => "boolean",
            PortConfig::Enum(_) => "enum",
            PortConfig::Array(_) => "array",
            PortConfig::Object(_) => "object",
            PortConfig::Stream(_) => "stream",
            PortConfig::Any(_) => "any",
            PortConfig::Secret(_) => "secret",
        }
    }

    pub fn identity(&self) -> &PortIdentity {
        match self {
            PortConfig::String(b) | PortConfig::Number(b) | PortConfig::Boolean(b)
            | PortConfig::Enum(b) | PortConfig::Stream(b) | PortConfig::Secret(b) => &b.identity,
            PortConfig::Array(b) => &b.identity,
            PortConfig::Object(b) => &b.identity,
            PortConfig::Any(b) => &b.identity,
        }
    }

    pub fn identity_mut(&mut self) -> &mut PortIdentity {
        match self {
            PortConfig::String(b) | PortConfig::Number(b) | PortConfig::Boolean(b)
            | PortConfig::Enum(b) | PortConfig::Stream(b) | PortConfig::Secret(b) => &mut b.identity,
            PortConfig::Array(b) => &mut b.identity,
            PortConfig::Object(b) => &mut b.identity,
            PortConfig::Any(b) => &mut b.identity,
        }
    }

    pub fn id(&self) -> &str {
        &self.identity().id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.identity().parent_id.as_deref()
    }

    pub fn node_id(&self) -> &str {
        &self.identity().node_id
    }

    pub fn set_original_type(&mut self, value: Option<String>) {
        match self {
            PortConfig::String(b) | PortConfig::Number(b) | PortConfig::Boolean(b)
            | PortConfig::Enum(b) | PortConfig::Stream(b) | PortConfig::Secret(b) => {
                b.original_type = value
            }
            PortConfig::Array(b) => b.original_type = value,
            PortConfig::Object(b) => b.original_type = value,
            PortConfig::Any(_) => {}
        }
    }
}

/// Unwrap `any`-typed ports at ingest (spec §3, §4.1): if `type = any` and
/// `underlyingType` is present and not itself `any`, the stored config takes
/// the underlying type's shape, with identity fields preserved from the
/// original and `originalType = "any"` recorded for introspection. Otherwise
/// the input is returned unchanged (including when `underlyingType` is
/// itself `any`, which would otherwise recurse forever).
pub fn unwrap_any_config(cfg: PortConfig) -> PortConfig {
    let PortConfig::Any(body) = &cfg else {
        return cfg;
    };
    let Some(underlying) = &body.underlying_type else {
        return cfg;
    };
    if matches!(underlying.as_ref(), PortConfig::Any(_)) {
        return cfg;
    }

    let mut result = (**underlying).clone();
    let original_identity = body.identity.clone();
    {
        let identity = result.identity_mut();
        identity.id = original_identity.id;
        identity.key = original_identity.key;
        identity.node_id = original_identity.node_id;
        identity.direction = original_identity.direction;
        identity.parent_id = original_identity.parent_id;
        identity.order = original_identity.order;
        if original_identity.title.is_some() {
            identity.title = original_identity.title;
        }
        if original_identity.description.is_some() {
            identity.description = original_identity.description;
        }
        if original_identity.required.is_some() {
            identity.required = original_identity.required;
        }
    }
    result.set_original_type(Some("any".to_string()));
    result
}

/// Fill required identity defaults (nodeId, parentId) and unwrap `any`
/// (spec §4.1). Used by the subtree expander when synthesizing child
/// configs from `schema.properties` / `itemConfig`.
pub fn extract_config_core(mut cfg: PortConfig, node_id: &str, parent_id: Option<&str>) -> PortConfig {
    {
        let identity = cfg.identity_mut();
        if identity.node_id.is_empty() {
            identity.node_id = node_id.to_string();
        }
        if let Some(parent_id) = parent_id {
            identity.parent_id = Some(parent_id.to_string());
        }
        if identity.id.is_empty() {
            identity.id = identity.key.clone();
        }
    }
    unwrap_any_config(cfg)
}

// ---- Type guards (spec §4.1) ----

pub fn is_system_port(cfg: &PortConfig) -> bool {
    cfg.identity()
        .metadata
        .as_ref()
        .map(|m| m.is_system_port)
        .unwrap_or(false)
}

pub fn is_system_error_port(cfg: &PortConfig) -> bool {
    is_system_port(cfg)
        && cfg
            .identity()
            .metadata
            .as_ref()
            .and_then(|m| m.port_category.as_deref())
            == Some("error")
}

pub fn has_underlying_type(cfg: &PortConfig) -> bool {
    matches!(cfg, PortConfig::Any(b) if b.underlying_type.is_some())
}

pub fn is_mutable_array_port(cfg: &PortConfig) -> bool {
    matches!(cfg, PortConfig::Array(_))
}

pub fn is_mutable_object_port(cfg: &PortConfig) -> bool {
    matches!(cfg, PortConfig::Object(_))
}

pub fn has_enum_options(cfg: &PortConfig) -> bool {
    matches!(cfg, PortConfig::Enum(b) if b.extra.get("options").map(|v| v.is_array()).unwrap_or(false))
}
