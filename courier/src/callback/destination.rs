//! Destination descriptors.
//!
//! Callers describe where a callback should go with a small JSON object whose
//! `Type` field selects the transport. Parsing happens before any other work
//! so a malformed or unknown destination never triggers a network call.

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// A parsed destination descriptor.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "Type")]
pub enum Destination {
    #[serde(rename = "AWS/SNS")]
    Topic {
        #[serde(rename = "Topic")]
        topic_arn: String,
    },

    #[serde(rename = "AWS/SQS")]
    Queue {
        #[serde(rename = "Queue")]
        queue_url: String,
    },

    #[serde(rename = "AWS/S3")]
    ObjectStore {
        #[serde(rename = "BucketName")]
        bucket_name: String,
        #[serde(rename = "ObjectPrefix", default)]
        object_prefix: String,
    },

    #[serde(rename = "AWS/EventBridge")]
    EventBus {
        #[serde(rename = "EventBusName")]
        event_bus_name: Option<String>,
    },

    #[serde(rename = "HTTP")]
    Http(HttpDestination),
}

/// HTTP destination parameters.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HttpDestination {
    #[serde(rename = "URL")]
    pub url: String,

    #[serde(rename = "Method", default = "default_method")]
    pub method: String,

    /// Requested body encoding. `None` selects the query-parameter form for
    /// GET requests.
    #[serde(rename = "Content-Type")]
    pub content_type: Option<String>,

    /// Query parameter name used when the payload travels in the URL.
    #[serde(rename = "Name")]
    pub name: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

impl Destination {
    /// Parse a raw destination descriptor.
    ///
    /// An unrecognized `Type` is reported explicitly rather than ignored, so
    /// callers learn about typos instead of silently losing callbacks.
    pub fn from_value(value: &Value) -> Result<Self> {
        let destination_type = value
            .get("Type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::UnsupportedDestinationType("<missing>".to_string()))?;

        if !matches!(
            destination_type,
            "AWS/SNS" | "AWS/SQS" | "AWS/S3" | "AWS/EventBridge" | "HTTP"
        ) {
            return Err(Error::UnsupportedDestinationType(
                destination_type.to_string(),
            ));
        }

        serde_json::from_value(value.clone()).map_err(Error::from)
    }
}
