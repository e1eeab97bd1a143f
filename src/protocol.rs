//! Native messaging framing and the message vocabulary shared with the extension.
//!
//! Every frame is a 4-byte length in native byte order followed by that many
//! bytes of UTF-8 JSON.

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{self, Read, Write};

use crate::error::{Error, ErrorKind, Result};
use crate::transport::ApiRequest;

/// Chrome refuses host messages larger than this.
pub const MAX_OUTBOUND_LEN: usize = 1024 * 1024;
pub const MAX_INBOUND_LEN: usize = 64 * 1024 * 1024;

pub fn read_message<R: Read>(mut reader: R) -> io::Result<Value> {
    let len = reader.read_u32::<NativeEndian>()? as usize;
    if len > MAX_INBOUND_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message of {len} bytes exceeds limit"),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    serde_json::from_slice(&body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

pub fn write_message<W: Write>(mut writer: W, msg: &Value) -> io::Result<()> {
    let body = serde_json::to_vec(msg)?;
    if body.len() > MAX_OUTBOUND_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes exceeds limit", body.len()),
        ));
    }

    writer.write_u32::<NativeEndian>(body.len() as u32)?;
    writer.write_all(&body)?;
    writer.flush()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "openSidePanel")]
    OpenSidePanel {
        #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<i64>,
    },
    #[serde(rename = "apiRequest")]
    ApiRequest { config: ApiRequest },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "getAuthToken")]
    GetAuthToken,
    #[serde(rename = "CLICK_LINE")]
    ClickLine {
        #[serde(rename = "lineNumber")]
        line_number: u32,
    },
    #[serde(rename = "OPEN_VARIABLE")]
    OpenVariable {
        #[serde(rename = "variableName")]
        variable_name: String,
    },
    #[serde(rename = "refreshFolderList")]
    RefreshFolderList,
    #[serde(rename = "botSaved")]
    BotSaved,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::OpenSidePanel { .. } => "openSidePanel",
            Action::ApiRequest { .. } => "apiRequest",
            Action::Ping => "ping",
            Action::GetAuthToken => "getAuthToken",
            Action::ClickLine { .. } => "CLICK_LINE",
            Action::OpenVariable { .. } => "OPEN_VARIABLE",
            Action::RefreshFolderList => "refreshFolderList",
            Action::BotSaved => "botSaved",
        }
    }

    /// Fire-and-forget notifications get no response.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Action::BotSaved)
    }
}

/// Response envelope used in both directions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pong: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn pong() -> Self {
        Self {
            success: true,
            pong: Some(true),
            ..Default::default()
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_type: Some(err.kind()),
            ..Default::default()
        }
    }

    pub fn failure_message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// A frame received from the extension.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Answer to a request the host sent earlier.
    Reply { reply_to: u64, response: Response },
    /// A request (or notification) originated by the extension.
    Request {
        request_id: Option<u64>,
        action: Action,
    },
}

impl Incoming {
    pub fn parse(msg: Value) -> Result<Self> {
        if let Some(reply_to) = msg.get("replyTo").and_then(Value::as_u64) {
            let response = serde_json::from_value(msg)?;
            return Ok(Incoming::Reply { reply_to, response });
        }

        let request_id = msg.get("requestId").and_then(Value::as_u64);
        let action = serde_json::from_value(msg)?;
        Ok(Incoming::Request { request_id, action })
    }
}

/// Attaches a correlation field (`requestId` or `replyTo`) to an outgoing frame.
pub fn tag_message<T: Serialize>(body: &T, field: &str, id: u64) -> Result<Value> {
    let mut value = serde_json::to_value(body)?;
    if let Value::Object(map) = &mut value {
        map.insert(field.to_string(), Value::from(id));
    }
    Ok(value)
}
