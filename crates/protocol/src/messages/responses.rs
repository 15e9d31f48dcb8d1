//! Response message subtypes.
//!
//! Every response answers exactly one request and echoes its identifier; the
//! payload a subtype adds is only meaningful when the result is
//! [`ResponseResult::Success`].

use serde::{Deserialize, Serialize};

use crate::identifiers::{RequestId, SessionToken};
use crate::messages::records::{
    AuditRecord, ExternalLink, ParameterDescriptor, PermissionDiagnostics, ProjectStatus,
    ServerSnapshot, UserDetails,
};
use crate::types::Timestamp;

/// Outcome reported by the server for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseResult {
    /// The operation succeeded; the payload is valid.
    Success,
    /// The operation failed; the error list describes why.
    Failure,
    /// The operation succeeded with warnings.
    Warning,
    /// The server did not report an outcome.
    Unknown,
}

impl Default for ResponseResult {
    fn default() -> Self {
        Self::Unknown
    }
}

/// One error message accompanying a non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Machine-readable failure class, when the server provides one.
    #[serde(rename = "@type", skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<String>,
    /// Human-readable description.
    #[serde(rename = "$text", default)]
    pub message: String,
}

impl ErrorMessage {
    /// Creates an error message with no failure class.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Macro for response subtypes.
// Generates: struct with the shared attributes plus the listed fields, the
// wire TAG constant, a new() taking the answered request's identifier and the
// extra fields, and the shared accessors used by the Response enum.
// ---------------------------------------------------------------------------
macro_rules! response_message {
    (
        $(#[$attr:meta])*
        $name:ident, $tag:literal {
            $($(#[$fattr:meta])* $field:ident : $ftype:ty),* $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(rename = $tag)]
        pub struct $name {
            /// Identifier of the request this response answers.
            #[serde(rename = "@identifier")]
            pub request_identifier: RequestId,
            /// Outcome reported by the server.
            #[serde(rename = "@result", default)]
            pub result: ResponseResult,
            /// When the response was generated.
            #[serde(rename = "@timestamp")]
            pub timestamp: Timestamp,
            // Subtype fields sit between the shared attributes and the error
            // list so that attribute extras stay ahead of element content.
            $( $(#[$fattr])* pub $field: $ftype, )*
            /// Error details accompanying a non-success result.
            #[serde(rename = "error", default, skip_serializing_if = "Vec::is_empty")]
            pub errors: Vec<ErrorMessage>,
        }

        impl $name {
            /// Root element tag identifying this message on the wire.
            pub const TAG: &'static str = $tag;

            /// Creates a new response answering the given request identifier.
            pub fn new(
                request_identifier: RequestId,
                result: ResponseResult
                $(, $field: $ftype)*
            ) -> Self {
                Self {
                    request_identifier,
                    result,
                    timestamp: Timestamp::now(),
                    $( $field, )*
                    errors: Vec::new(),
                }
            }
        }
    };
}

response_message! {
    /// A response with no payload beyond the outcome.
    ServerResponse, "response" {}
}

response_message! {
    /// A response carrying one scalar string.
    DataResponse, "dataResponse" {
        /// The payload (a log, a version string, a document, a key, ...).
        #[serde(default)]
        data: String,
    }
}

response_message! {
    /// A response carrying a list of strings.
    DataListResponse, "dataListResponse" {
        /// The payload items, in server order.
        #[serde(rename = "data", default, skip_serializing_if = "Vec::is_empty")]
        data: Vec<String>,
    }
}

response_message! {
    /// A response carrying the status of every configured project.
    StatusResponse, "statusResponse" {
        /// One record per project.
        #[serde(rename = "projectStatus", default, skip_serializing_if = "Vec::is_empty")]
        projects: Vec<ProjectStatus>,
    }
}

response_message! {
    /// A response carrying a whole-server snapshot.
    SnapshotResponse, "snapshotResponse" {
        /// Projects and queues at the time of the query.
        #[serde(default)]
        snapshot: ServerSnapshot,
    }
}

response_message! {
    /// The answer to a login attempt.
    LoginResponse, "loginResponse" {
        /// The opened session's token; absent when the login failed.
        #[serde(rename = "@session", skip_serializing_if = "Option::is_none", default)]
        session_token: Option<SessionToken>,
    }
}

response_message! {
    /// A response carrying a project's external links.
    ExternalLinksResponse, "externalLinksResponse" {
        /// The configured links.
        #[serde(rename = "link", default, skip_serializing_if = "Vec::is_empty")]
        links: Vec<ExternalLink>,
    }
}

response_message! {
    /// A response listing the users known to the server.
    UserListResponse, "userListResponse" {
        /// One entry per account.
        #[serde(rename = "user", default, skip_serializing_if = "Vec::is_empty")]
        users: Vec<UserDetails>,
    }
}

response_message! {
    /// A response carrying permission diagnostics.
    SecurityDiagnosticsResponse, "securityDiagnosticsResponse" {
        /// One entry per checked permission.
        #[serde(rename = "diagnostics", default, skip_serializing_if = "Vec::is_empty")]
        diagnostics: Vec<PermissionDiagnostics>,
    }
}

response_message! {
    /// A response carrying a page of audit records.
    AuditResponse, "auditResponse" {
        /// The requested records, newest first.
        #[serde(rename = "record", default, skip_serializing_if = "Vec::is_empty")]
        records: Vec<AuditRecord>,
    }
}

response_message! {
    /// A response describing the parameters a project's build accepts.
    ParameterListResponse, "parameterListResponse" {
        /// One descriptor per parameter.
        #[serde(rename = "parameter", default, skip_serializing_if = "Vec::is_empty")]
        parameters: Vec<ParameterDescriptor>,
    }
}

response_message! {
    /// An envelope carrying an encrypted response.
    EncryptedResponse, "encryptedResponse" {
        /// Base64 ciphertext of the serialised inner response.
        #[serde(default)]
        data: String,
    }
}
