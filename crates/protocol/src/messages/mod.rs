//! The typed message model.
//!
//! Requests and responses are closed sets of subtypes; the [`Request`] and
//! [`Response`] enums carry one variant per wire subtype so transports can
//! handle any message while the compiler keeps the set in view.

pub mod records;
pub mod requests;
pub mod responses;

pub use records::{
    AuditRecord, ExternalLink, IntegrationStatus, NameValuePair, ParameterDescriptor,
    PermissionDiagnostics, ProjectActivity, ProjectState, ProjectStatus, QueueSnapshot,
    QueuedRequest, ServerSnapshot, UserDetails,
};
pub use requests::{
    AuditRequest, BuildCondition, BuildListRequest, BuildRequest, ChangePasswordRequest,
    ConfigurationRequest, EncryptedRequest, IntegrationRequest, KeyExchangeRequest, LoginRequest,
    MessageKind, MessageRequest, ProjectRequest, SecurityDiagnosticsRequest, ServerRequest,
};
pub use responses::{
    AuditResponse, DataListResponse, DataResponse, EncryptedResponse, ErrorMessage,
    ExternalLinksResponse, LoginResponse, ParameterListResponse, ResponseResult,
    SecurityDiagnosticsResponse, ServerResponse, SnapshotResponse, StatusResponse,
    UserListResponse,
};

use crate::errors::ProtocolError;
use crate::identifiers::{RequestId, ServerName, SessionToken};

// ---------------------------------------------------------------------------
// Macro for the two message enums.
// Generates: the enum, From impls per subtype, the shared accessors, the
// root_tag() mapping, and XML serialisation dispatch.
// ---------------------------------------------------------------------------
macro_rules! message_enum {
    (
        $(#[$attr:meta])*
        $name:ident { $($variant:ident($ty:ty)),* $(,)? }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $name {
            $(
                #[doc = concat!("A [`", stringify!($ty), "`].")]
                $variant($ty),
            )*
        }

        $(
            impl From<$ty> for $name {
                fn from(message: $ty) -> Self {
                    Self::$variant(message)
                }
            }
        )*

        impl $name {
            /// Returns the root element tag this message serialises under.
            pub fn root_tag(&self) -> &'static str {
                match self {
                    $( Self::$variant(_) => <$ty>::TAG, )*
                }
            }

            /// Serialises the message to its XML wire form.
            pub fn to_xml(&self) -> Result<String, ProtocolError> {
                match self {
                    $( Self::$variant(message) => quick_xml::se::to_string(message), )*
                }
                .map_err(|source| ProtocolError::Serialize(source.to_string()))
            }
        }
    };
}

message_enum! {
    /// A request message, one variant per wire subtype.
    Request {
        Server(ServerRequest),
        Project(ProjectRequest),
        Build(BuildRequest),
        BuildList(BuildListRequest),
        Integration(IntegrationRequest),
        Message(MessageRequest),
        Configuration(ConfigurationRequest),
        Login(LoginRequest),
        ChangePassword(ChangePasswordRequest),
        SecurityDiagnostics(SecurityDiagnosticsRequest),
        Audit(AuditRequest),
        KeyExchange(KeyExchangeRequest),
        Encrypted(EncryptedRequest),
    }
}

message_enum! {
    /// A response message, one variant per wire subtype.
    Response {
        Plain(ServerResponse),
        Data(DataResponse),
        DataList(DataListResponse),
        Status(StatusResponse),
        Snapshot(SnapshotResponse),
        Login(LoginResponse),
        ExternalLinks(ExternalLinksResponse),
        Users(UserListResponse),
        SecurityDiagnostics(SecurityDiagnosticsResponse),
        Audit(AuditResponse),
        Parameters(ParameterListResponse),
        Encrypted(EncryptedResponse),
    }
}

macro_rules! for_each_request {
    ($request:expr, $binding:ident => $body:expr) => {
        match $request {
            Request::Server($binding) => $body,
            Request::Project($binding) => $body,
            Request::Build($binding) => $body,
            Request::BuildList($binding) => $body,
            Request::Integration($binding) => $body,
            Request::Message($binding) => $body,
            Request::Configuration($binding) => $body,
            Request::Login($binding) => $body,
            Request::ChangePassword($binding) => $body,
            Request::SecurityDiagnostics($binding) => $body,
            Request::Audit($binding) => $body,
            Request::KeyExchange($binding) => $body,
            Request::Encrypted($binding) => $body,
        }
    };
}

impl Request {
    /// The unique identifier the answering response must echo.
    pub fn identifier(&self) -> RequestId {
        for_each_request!(self, request => request.identifier)
    }

    /// The logical server the request addresses.
    pub fn server_name(&self) -> &ServerName {
        for_each_request!(self, request => &request.server_name)
    }

    /// The session token attached to the request, if any.
    pub fn session_token(&self) -> Option<&SessionToken> {
        for_each_request!(self, request => request.session_token.as_ref())
    }

    /// Attaches a session token, replacing any existing one.
    pub fn set_session_token(&mut self, token: Option<SessionToken>) {
        for_each_request!(self, request => request.session_token = token)
    }
}

macro_rules! for_each_response {
    ($response:expr, $binding:ident => $body:expr) => {
        match $response {
            Response::Plain($binding) => $body,
            Response::Data($binding) => $body,
            Response::DataList($binding) => $body,
            Response::Status($binding) => $body,
            Response::Snapshot($binding) => $body,
            Response::Login($binding) => $body,
            Response::ExternalLinks($binding) => $body,
            Response::Users($binding) => $body,
            Response::SecurityDiagnostics($binding) => $body,
            Response::Audit($binding) => $body,
            Response::Parameters($binding) => $body,
            Response::Encrypted($binding) => $body,
        }
    };
}

impl Response {
    /// The identifier of the request this response answers.
    pub fn request_identifier(&self) -> RequestId {
        for_each_response!(self, response => response.request_identifier)
    }

    /// The outcome reported by the server.
    pub fn result(&self) -> ResponseResult {
        for_each_response!(self, response => response.result)
    }

    /// The error messages accompanying a non-success result.
    pub fn errors(&self) -> &[ErrorMessage] {
        for_each_response!(self, response => &response.errors)
    }

    /// Joins all error messages into one newline-separated string.
    pub fn concatenated_errors(&self) -> String {
        self.errors()
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::ProjectName;

    #[test]
    fn request_accessors_reach_the_shared_attributes() {
        let mut request = Request::from(ProjectRequest::new(
            ServerName::new("local"),
            ProjectName::new("Project #1"),
        ));
        assert_eq!(request.server_name().as_str(), "local");
        assert!(request.session_token().is_none());

        request.set_session_token(Some(SessionToken::new("abc123")));
        assert_eq!(request.session_token().unwrap().as_str(), "abc123");
    }

    #[test]
    fn root_tags_match_the_subtype_constants() {
        let request = Request::from(ServerRequest::new(ServerName::new("local")));
        assert_eq!(request.root_tag(), ServerRequest::TAG);

        let response = Response::from(DataResponse::new(
            RequestId::new_random(),
            ResponseResult::Success,
            "payload".into(),
        ));
        assert_eq!(response.root_tag(), DataResponse::TAG);
    }

    #[test]
    fn concatenated_errors_joins_messages_in_order() {
        let mut inner = ServerResponse::new(RequestId::new_random(), ResponseResult::Failure);
        inner.errors.push(ErrorMessage::new("first"));
        inner.errors.push(ErrorMessage::new("second"));
        let response = Response::from(inner);
        assert_eq!(response.concatenated_errors(), "first\nsecond");
    }
}
