use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A notification addressed to a single device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushMessage {
    /// Registration token of the target device.
    pub token: String,
    pub title: String,
    pub body: String,
    /// Arbitrary key/value payload delivered to the app.
    pub data: HashMap<String, String>,
}

impl PushMessage {
    pub fn new(token: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            title: title.into(),
            body: body.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Request body of the FCM v1 `messages:send` call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendRequest<'a> {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub validate_only: bool,
    pub message: Envelope<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Envelope<'a> {
    pub token: &'a str,
    pub notification: Notification<'a>,
    pub data: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a> {
    pub title: &'a str,
    pub body: &'a str,
}

impl<'a> SendRequest<'a> {
    pub fn new(message: &'a PushMessage, validate_only: bool) -> Self {
        Self {
            validate_only,
            message: Envelope {
                token: &message.token,
                notification: Notification {
                    title: &message.title,
                    body: &message.body,
                },
                data: &message.data,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendResponse {
    pub name: Option<String>,
}

/// Acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Identifier assigned by the gateway, e.g. `projects/p/messages/123`.
    pub message_id: Option<String>,
}
