//! # Varlink Messages
//!
//! The JSON documents exchanged with a service, independent of how they travel.
//!
//! ## Requests
//!
//! [`MethodCall`] is built from a method name, the raw parameter argument given on the
//! command line and a set of [`CallFlags`]. Parameters are validated here, before any
//! connection exists, so a typo in the JSON never reaches the wire.
//!
//! ## Replies
//!
//! [`Reply::decode`] looks at the reserved `error` field first. Its presence selects the
//! error path (name plus optional parameters), its absence the success path. Each path
//! then decodes into fixed types; nothing else is probed.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{BitOr, BitOrAssign};

/// Method returning the vendor, product, version, url and interfaces of a service.
pub const GET_INFO: &str = "org.varlink.service.GetInfo";

/// Method returning the textual description of one interface.
pub const GET_INTERFACE_DESCRIPTION: &str = "org.varlink.service.GetInterfaceDescription";

/// The generic mapping used for both call parameters and reply parameters.
pub type Parameters = Map<String, Value>;

/// Flags modifying how a method call is performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CallFlags(u8);

impl CallFlags {
    /// Fire and forget: the service must not reply and the client does not wait.
    pub const ONEWAY: CallFlags = CallFlags(1);

    pub const fn empty() -> Self {
        CallFlags(0)
    }

    pub const fn contains(self, other: CallFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_oneway(self) -> bool {
        self.contains(Self::ONEWAY)
    }
}

impl BitOr for CallFlags {
    type Output = CallFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        CallFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for CallFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Errors raised while turning the raw parameter argument into call parameters.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Cannot parse parameters: {0}")]
    InvalidParameters(#[from] serde_json::Error),
    #[error("Cannot parse parameters: expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Parses the raw parameter argument of a `call`.
///
/// * `""` means no parameters at all: the `parameters` key is omitted from the request.
/// * `null` is treated the same way.
/// * Any other value must be a JSON object. `{}` is kept as an explicit empty object.
pub fn parse_parameters(raw: &str) -> Result<Option<Parameters>, EncodeError> {
    if raw.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(raw)? {
        Value::Object(parameters) => Ok(Some(parameters)),
        Value::Null => Ok(None),
        other => Err(EncodeError::NotAnObject(json_type(&other))),
    }
}

/// A single method invocation, ready to be written to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    method: String,
    parameters: Option<Parameters>,
    flags: CallFlags,
}

#[derive(Serialize)]
struct RequestFrame<'a> {
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a Parameters>,
    #[serde(skip_serializing_if = "is_false")]
    oneway: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl MethodCall {
    pub fn new(method: impl Into<String>, parameters: Option<Parameters>, flags: CallFlags) -> Self {
        Self {
            method: method.into(),
            parameters,
            flags,
        }
    }

    /// Builds a call from the raw parameter argument given on the command line.
    pub fn from_raw(
        method: impl Into<String>,
        raw_parameters: &str,
        flags: CallFlags,
    ) -> Result<Self, EncodeError> {
        let parameters = parse_parameters(raw_parameters)?;
        Ok(Self::new(method, parameters, flags))
    }

    /// `org.varlink.service.GetInfo`
    pub fn get_info() -> Self {
        Self::new(GET_INFO, None, CallFlags::empty())
    }

    /// `org.varlink.service.GetInterfaceDescription` scoped to `interface`.
    pub fn get_interface_description(interface: &str) -> Self {
        let mut parameters = Parameters::new();
        parameters.insert("interface".to_string(), Value::from(interface));
        Self::new(GET_INTERFACE_DESCRIPTION, Some(parameters), CallFlags::empty())
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn parameters(&self) -> Option<&Parameters> {
        self.parameters.as_ref()
    }

    pub fn flags(&self) -> CallFlags {
        self.flags
    }

    /// Serializes the request document (without the frame terminator).
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&RequestFrame {
            method: &self.method,
            parameters: self.parameters.as_ref(),
            oneway: self.flags.is_oneway(),
        })
    }
}

/// A named error reported by the service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{name}")]
pub struct RemoteError {
    /// Fully qualified error name, e.g. `org.varlink.service.MethodNotFound`.
    pub name: String,
    /// The error's parameters, `None` when absent or not an object.
    pub parameters: Option<Parameters>,
}

/// The outcome of a method call as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Success(Parameters),
    Error(RemoteError),
}

/// Errors raised while decoding a reply document.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("reply is not a valid Varlink message: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("reply parameters must be a JSON object, found {0}")]
    ParametersNotObject(&'static str),
    #[error("reply parameters do not match the expected shape: {0}")]
    UnexpectedShape(#[source] serde_json::Error),
}

#[derive(Deserialize)]
struct ReplyFrame {
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    continues: bool,
}

impl Reply {
    /// Decodes one reply document (without the frame terminator).
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let frame: ReplyFrame = serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;

        if frame.continues {
            tracing::trace!("service flagged a continued reply, only the first one is read");
        }

        if let Some(name) = frame.error {
            // A missing or malformed payload is not worth failing over: the name alone
            // is enough to report the error.
            let parameters = match frame.parameters {
                Some(Value::Object(parameters)) => Some(parameters),
                _ => None,
            };
            return Ok(Reply::Error(RemoteError { name, parameters }));
        }

        match frame.parameters {
            None | Some(Value::Null) => Ok(Reply::Success(Parameters::new())),
            Some(Value::Object(parameters)) => Ok(Reply::Success(parameters)),
            Some(other) => Err(DecodeError::ParametersNotObject(json_type(&other))),
        }
    }

    /// Converts the reply into a `Result`, turning the error variant into `Err`.
    pub fn into_result(self) -> Result<Parameters, RemoteError> {
        match self {
            Reply::Success(parameters) => Ok(parameters),
            Reply::Error(error) => Err(error),
        }
    }
}

/// Reply of `org.varlink.service.GetInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub vendor: String,
    pub product: String,
    pub version: String,
    pub url: String,
    pub interfaces: Vec<String>,
}

#[derive(Deserialize)]
pub(crate) struct InterfaceDescription {
    pub(crate) description: String,
}

/// Decodes reply parameters into one of the fixed reply types.
pub(crate) fn decode_parameters<T>(parameters: Parameters) -> Result<T, DecodeError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(Value::Object(parameters)).map_err(DecodeError::UnexpectedShape)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
