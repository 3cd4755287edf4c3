//! Thing type building blocks: channel types and channel definitions.

use crate::error::ApiError;
use serde::Serialize;

/// Type of a channel, optionally linked to a configuration description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelType {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_description_uri: Option<String>,
}

impl ChannelType {
    pub fn new(id: impl Into<String>) -> Result<Self, ApiError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ApiError::InvalidArgument(
                "The channel type ID must neither be null nor empty!".to_string(),
            ));
        }
        Ok(Self {
            id,
            config_description_uri: None,
        })
    }

    /// Link the channel type to the URI of its configuration description.
    pub fn with_config_description_uri(mut self, uri: impl Into<String>) -> Self {
        self.config_description_uri = Some(uri.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config_description_uri(&self) -> Option<&str> {
        self.config_description_uri.as_deref()
    }
}

/// Defines a channel of a thing type: one functionality of the thing.
///
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelDefinition {
    id: String,
    #[serde(rename = "type")]
    channel_type: ChannelType,
}

impl ChannelDefinition {
    /// Fails with [`ApiError::InvalidArgument`] if the ID is empty.
    pub fn new(id: impl Into<String>, channel_type: ChannelType) -> Result<Self, ApiError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ApiError::InvalidArgument(
                "The ID must neither be null nor empty!".to_string(),
            ));
        }
        Ok(Self { id, channel_type })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn channel_type(&self) -> &ChannelType {
        &self.channel_type
    }
}
