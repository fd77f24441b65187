use serde::{Deserialize, Serialize};
use url::Url;

use crate::Map;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Failed,
}

/// The event CloudFormation delivers to a custom resource function.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: Url,
    pub stack_id: String,
    pub request_id: String,
    #[serde(default)]
    pub resource_type: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
    #[serde(default)]
    pub resource_properties: Map,
    #[serde(default)]
    pub old_resource_properties: Map,
}

/// What a handler reports back for one lifecycle request.
///
/// Leaving the physical resource id unset lets the signaler pick one: the
/// log stream name on `Create`, the id CloudFormation sent on `Update` and
/// `Delete`.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status: Status,
    pub physical_resource_id: Option<String>,
    pub reason: Option<String>,
    pub data: Map,
    pub no_echo: bool,
}

impl Response {
    pub fn success() -> Self {
        Self::with_status(Status::Success)
    }

    pub fn failed() -> Self {
        Self::with_status(Status::Failed)
    }

    fn with_status(status: Status) -> Self {
        Response {
            status,
            physical_resource_id: None,
            reason: None,
            data: Map::new(),
            no_echo: false,
        }
    }

    pub fn physical_resource_id<S: Into<String>>(mut self, id: S) -> Self {
        self.physical_resource_id = Some(id.into());
        self
    }

    pub fn reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn data(mut self, data: Map) -> Self {
        self.data = data;
        self
    }

    /// Uses any serializable value as `Data`; it has to serialize to an object.
    pub fn value<T: Serialize>(self, value: T) -> Result<Self, serde_json::Error> {
        Ok(self.data(Map::serialize_from(value)?))
    }

    /// Masks `Data` when the resource is described through CloudFormation.
    pub fn no_echo(mut self, no_echo: bool) -> Self {
        self.no_echo = no_echo;
        self
    }
}

/// The body PUT to the presigned `ResponseURL`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CloudFormationResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub no_echo: bool,
    #[serde(default)]
    pub data: Map,
}
