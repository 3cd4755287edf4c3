//! Configuration Descriptions
//!
//! A [`ConfigDescription`] describes the configuration of a configurable entity
//! (a thing, a service, ...). It does not hold configuration data itself; it is
//! metadata used for validation and user interfaces. Descriptions are published
//! by providers and aggregated by the directory under their URI, which follows
//! the syntax `scheme://<token>:<token>:...`.

pub mod parameter;

pub use parameter::{ConfigDescriptionParameter, ParameterContext, ParameterType};

use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// Immutable, URI-keyed bundle of parameter descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DescriptionDef")]
pub struct ConfigDescription {
    uri: String,
    parameters: Vec<ConfigDescriptionParameter>,
}

impl ConfigDescription {
    /// Create a description with the given URI and parameters.
    ///
    /// The URI syntax is not checked beyond non-emptiness.
    pub fn new(
        uri: impl Into<String>,
        parameters: Vec<ConfigDescriptionParameter>,
    ) -> Result<Self, ApiError> {
        let uri = uri.into();
        if uri.is_empty() {
            return Err(ApiError::InvalidArgument(
                "The URI must neither be null nor empty!".to_string(),
            ));
        }
        Ok(Self { uri, parameters })
    }

    /// Create a description without parameters.
    pub fn with_uri(uri: impl Into<String>) -> Result<Self, ApiError> {
        Self::new(uri, Vec::new())
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Parameter descriptions in declaration order (possibly empty)
    pub fn parameters(&self) -> &[ConfigDescriptionParameter] {
        &self.parameters
    }

    /// Find a parameter description by name
    pub fn parameter(&self, name: &str) -> Option<&ConfigDescriptionParameter> {
        self.parameters.iter().find(|p| p.name() == name)
    }
}

#[derive(Deserialize)]
struct DescriptionDef {
    uri: Option<String>,
    #[serde(default)]
    parameters: Vec<ConfigDescriptionParameter>,
}

impl TryFrom<DescriptionDef> for ConfigDescription {
    type Error = ApiError;

    fn try_from(def: DescriptionDef) -> Result<Self, Self::Error> {
        ConfigDescription::new(def.uri.unwrap_or_default(), def.parameters)
    }
}
