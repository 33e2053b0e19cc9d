use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// A single mutation request against the host's discount-code list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiscountCodeChange {
    AddDiscountCode { code: String },
    RemoveDiscountCode { code: String },
}

impl DiscountCodeChange {
    pub fn add(code: impl Into<String>) -> Self {
        Self::AddDiscountCode { code: code.into() }
    }

    pub fn remove(code: impl Into<String>) -> Self {
        Self::RemoveDiscountCode { code: code.into() }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::AddDiscountCode { code } | Self::RemoveDiscountCode { code } => code,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::AddDiscountCode { .. } => "add",
            Self::RemoveDiscountCode { .. } => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountCodeChangeResult {
    Success,
    Error(HostError),
}

impl DiscountCodeChangeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One key/value pair of a structured catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogField {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl CatalogField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub fields: Vec<CatalogField>,
}

impl CatalogRecord {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| CatalogField::new(key, value))
                .collect(),
        }
    }

    /// First value stored under `key`, if any.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.key == key)
            .and_then(|field| field.value.as_deref())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaobjectsQuery {
    pub query: &'static str,
    pub variables: MetaobjectsVariables,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaobjectsVariables {
    #[serde(rename = "type")]
    pub metaobject_type: String,
    pub first: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaobjectsResponse {
    #[serde(default)]
    pub data: Option<MetaobjectsData>,
    #[serde(default)]
    pub errors: Option<Vec<QueryError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaobjectsData {
    #[serde(default)]
    pub metaobjects: Option<MetaobjectConnection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaobjectConnection {
    #[serde(default)]
    pub nodes: Option<Vec<CatalogRecord>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryError {
    pub message: String,
}

impl MetaobjectsResponse {
    /// Records of a well-formed response; `None` when any level of the shape is absent.
    pub fn into_records(self) -> Option<Vec<CatalogRecord>> {
        self.data?.metaobjects?.nodes
    }
}
