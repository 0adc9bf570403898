// ABOUTME: Language-neutral schema of the Deployment resource and property-map marshaling.
// ABOUTME: Host-language bindings exchange inputs and outputs as JSON property maps.

use super::error::ValidationError;
use super::spec::DeploymentArgs;
use super::state::DeploymentState;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Type token under which the resource is registered with host languages.
pub const RESOURCE_TOKEN: &str = "productionapp:index:Deployment";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    pub token: &'static str,
    pub description: &'static str,
    pub input_properties: BTreeMap<&'static str, PropertySchema>,
    pub required_inputs: Vec<&'static str>,
    pub properties: BTreeMap<&'static str, PropertySchema>,
    pub required: Vec<&'static str>,
}

pub fn schema() -> ResourceSchema {
    let mut inputs = BTreeMap::new();
    inputs.insert(
        "image",
        PropertySchema {
            property_type: PropertyType::String,
            description: "The container image to deploy.",
        },
    );
    inputs.insert(
        "port",
        PropertySchema {
            property_type: PropertyType::Integer,
            description: "The port the container listens on.",
        },
    );

    let mut outputs = BTreeMap::new();
    outputs.insert(
        "url",
        PropertySchema {
            property_type: PropertyType::String,
            description: "The URL at which the deployment is reachable.",
        },
    );

    ResourceSchema {
        token: RESOURCE_TOKEN,
        description: "A containerized application exposed at a public URL.",
        input_properties: inputs,
        required_inputs: vec!["image", "port"],
        properties: outputs,
        required: vec!["url"],
    }
}

impl DeploymentArgs {
    /// Decode inputs from a property map. Values are type-checked but not validated.
    ///
    /// Integral floats are accepted for `port` since some host languages only have
    /// a double-precision number type.
    pub fn from_properties(props: &Map<String, Value>) -> Result<Self, ValidationError> {
        if let Some(unknown) = props.keys().find(|k| !matches!(k.as_str(), "image" | "port")) {
            return Err(ValidationError::UnknownProperty(unknown.clone()));
        }

        let image = match props.get("image") {
            None | Some(Value::Null) => return Err(ValidationError::MissingProperty("image")),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ValidationError::WrongType {
                    property: "image",
                    expected: "a string",
                });
            }
        };

        let port = match props.get("port") {
            None | Some(Value::Null) => return Err(ValidationError::MissingProperty("port")),
            Some(Value::Number(n)) => integral(n).ok_or(ValidationError::WrongType {
                property: "port",
                expected: "an integer",
            })?,
            Some(_) => {
                return Err(ValidationError::WrongType {
                    property: "port",
                    expected: "an integer",
                });
            }
        };

        Ok(Self { image, port })
    }

    pub fn to_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("image".to_string(), Value::from(self.image.clone()));
        props.insert("port".to_string(), Value::from(self.port));
        props
    }
}

fn integral(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    // u64 beyond i64::MAX is out of range for any port anyway
    if n.as_u64().is_some() {
        return Some(i64::MAX);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl DeploymentState {
    /// Outputs as a property map.
    pub fn to_properties(&self) -> Map<String, Value> {
        let mut props = Map::new();
        props.insert("url".to_string(), Value::from(self.url.clone()));
        props
    }
}
