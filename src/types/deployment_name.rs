// ABOUTME: DNS-compatible deployment name validation.
// ABOUTME: Names become namespaces and container names, so they follow RFC 1123 labels.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeploymentNameError {
    #[error("deployment name cannot be empty")]
    Empty,

    #[error("deployment name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("deployment name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("deployment name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("deployment name must be lowercase")]
    NotLowercase,

    #[error("invalid character in deployment name: '{0}'")]
    InvalidChar(char),
}

/// Stable identity key of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeploymentName(String);

impl DeploymentName {
    pub fn new(value: &str) -> Result<Self, DeploymentNameError> {
        if value.is_empty() {
            return Err(DeploymentNameError::Empty);
        }

        if value.len() > 63 {
            return Err(DeploymentNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(DeploymentNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(DeploymentNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(DeploymentNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(DeploymentNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeploymentName {
    type Err = DeploymentNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DeploymentName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeploymentName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
