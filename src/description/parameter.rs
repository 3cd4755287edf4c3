//! Description of a single configuration parameter.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data type a configuration parameter can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// UTF-8 text
    Text,
    /// Signed integer in the `i32` range
    Integer,
    /// IEEE 754 floating point in the `f32` range
    Decimal,
    Boolean,
}

impl ParameterType {
    /// Wire name, as used in description files
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::Text => "text",
            ParameterType::Integer => "integer",
            ParameterType::Decimal => "decimal",
            ParameterType::Boolean => "boolean",
        }
    }
}

/// Specific context of a parameter, used for input validation and user interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterContext {
    /// IPv4, IPv6 or host name
    NetworkAddress,
    /// Hidden input
    Password,
    Email,
}

impl ParameterContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterContext::NetworkAddress => "network_address",
            ParameterContext::Password => "password",
            ParameterContext::Email => "email",
        }
    }
}

/// Description of a concrete configuration parameter.
///
/// Instances are only produced by [`ConfigDescriptionParameter::new`] (or by
/// deserialization, which goes through the same checks), so a value in hand
/// always has a non-empty name and a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParameterDef")]
pub struct ConfigDescriptionParameter {
    name: String,
    #[serde(rename = "type")]
    parameter_type: ParameterType,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<ParameterContext>,
    required: bool,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ConfigDescriptionParameter {
    /// Create a parameter description with the given name and data type.
    ///
    /// Fails with [`ApiError::InvalidArgument`] if the name is empty.
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Result<Self, ApiError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ApiError::InvalidArgument(
                "The name must neither be null nor empty!".to_string(),
            ));
        }

        Ok(Self {
            name,
            parameter_type,
            context: None,
            required: false,
            default_value: None,
            label: None,
            description: None,
        })
    }

    pub fn with_context(mut self, context: ParameterContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name of the parameter (never empty)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.parameter_type
    }

    pub fn context(&self) -> Option<ParameterContext> {
        self.context
    }

    /// Whether the parameter has to be set
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Untyped default value, if any
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Wire shape of a parameter before validation.
#[derive(Deserialize)]
struct ParameterDef {
    name: Option<String>,
    #[serde(rename = "type")]
    parameter_type: Option<ParameterType>,
    #[serde(default)]
    context: Option<ParameterContext>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<ParameterDef> for ConfigDescriptionParameter {
    type Error = ApiError;

    fn try_from(def: ParameterDef) -> Result<Self, Self::Error> {
        let parameter_type = def.parameter_type.ok_or_else(|| {
            ApiError::InvalidArgument("The type must not be null!".to_string())
        })?;
        let mut parameter =
            ConfigDescriptionParameter::new(def.name.unwrap_or_default(), parameter_type)?
                .required(def.required);
        parameter.context = def.context;
        parameter.default_value = def.default;
        parameter.label = def.label;
        parameter.description = def.description;
        Ok(parameter)
    }
}
