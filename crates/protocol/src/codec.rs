//! The XML wire codec.
//!
//! Replies are plain XML documents whose root element tag names the concrete
//! message subtype. [`parse_response`] recovers the subtype through a lookup
//! table populated at startup: one entry per registered root tag, mapping to
//! the deserialiser for that subtype. Nothing here inspects types at runtime.

use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::errors::ProtocolError;
use crate::messages::{
    AuditRequest, AuditResponse, BuildListRequest, BuildRequest, ChangePasswordRequest,
    ConfigurationRequest, DataListResponse, DataResponse, EncryptedRequest, EncryptedResponse,
    ExternalLinksResponse, IntegrationRequest, KeyExchangeRequest, LoginRequest, LoginResponse,
    MessageRequest, ParameterListResponse, ProjectRequest, Request, Response,
    SecurityDiagnosticsRequest, SecurityDiagnosticsResponse, ServerRequest, ServerResponse,
    SnapshotResponse, StatusResponse, UserListResponse,
};

type RequestParser = fn(&str) -> Result<Request, ProtocolError>;
type ResponseParser = fn(&str) -> Result<Response, ProtocolError>;

fn decode<T>(tag: &'static str, xml: &str) -> Result<T, ProtocolError>
where
    T: serde::de::DeserializeOwned,
{
    quick_xml::de::from_str(xml).map_err(|source| ProtocolError::Deserialize {
        tag: tag.to_string(),
        reason: source.to_string(),
    })
}

/// Root tag to deserialiser table, one entry per request subtype.
static REQUEST_PARSERS: LazyLock<HashMap<&'static str, RequestParser>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, RequestParser> = HashMap::new();
    table.insert(ServerRequest::TAG, |xml| {
        decode::<ServerRequest>(ServerRequest::TAG, xml).map(Request::Server)
    });
    table.insert(ProjectRequest::TAG, |xml| {
        decode::<ProjectRequest>(ProjectRequest::TAG, xml).map(Request::Project)
    });
    table.insert(BuildRequest::TAG, |xml| {
        decode::<BuildRequest>(BuildRequest::TAG, xml).map(Request::Build)
    });
    table.insert(BuildListRequest::TAG, |xml| {
        decode::<BuildListRequest>(BuildListRequest::TAG, xml).map(Request::BuildList)
    });
    table.insert(IntegrationRequest::TAG, |xml| {
        decode::<IntegrationRequest>(IntegrationRequest::TAG, xml).map(Request::Integration)
    });
    table.insert(MessageRequest::TAG, |xml| {
        decode::<MessageRequest>(MessageRequest::TAG, xml).map(Request::Message)
    });
    table.insert(ConfigurationRequest::TAG, |xml| {
        decode::<ConfigurationRequest>(ConfigurationRequest::TAG, xml).map(Request::Configuration)
    });
    table.insert(LoginRequest::TAG, |xml| {
        decode::<LoginRequest>(LoginRequest::TAG, xml).map(Request::Login)
    });
    table.insert(ChangePasswordRequest::TAG, |xml| {
        decode::<ChangePasswordRequest>(ChangePasswordRequest::TAG, xml)
            .map(Request::ChangePassword)
    });
    table.insert(SecurityDiagnosticsRequest::TAG, |xml| {
        decode::<SecurityDiagnosticsRequest>(SecurityDiagnosticsRequest::TAG, xml)
            .map(Request::SecurityDiagnostics)
    });
    table.insert(AuditRequest::TAG, |xml| {
        decode::<AuditRequest>(AuditRequest::TAG, xml).map(Request::Audit)
    });
    table.insert(KeyExchangeRequest::TAG, |xml| {
        decode::<KeyExchangeRequest>(KeyExchangeRequest::TAG, xml).map(Request::KeyExchange)
    });
    table.insert(EncryptedRequest::TAG, |xml| {
        decode::<EncryptedRequest>(EncryptedRequest::TAG, xml).map(Request::Encrypted)
    });
    table
});

/// Root tag to deserialiser table, one entry per response subtype.
static RESPONSE_PARSERS: LazyLock<HashMap<&'static str, ResponseParser>> = LazyLock::new(|| {
    let mut table: HashMap<&'static str, ResponseParser> = HashMap::new();
    table.insert(ServerResponse::TAG, |xml| {
        decode::<ServerResponse>(ServerResponse::TAG, xml).map(Response::Plain)
    });
    table.insert(DataResponse::TAG, |xml| {
        decode::<DataResponse>(DataResponse::TAG, xml).map(Response::Data)
    });
    table.insert(DataListResponse::TAG, |xml| {
        decode::<DataListResponse>(DataListResponse::TAG, xml).map(Response::DataList)
    });
    table.insert(StatusResponse::TAG, |xml| {
        decode::<StatusResponse>(StatusResponse::TAG, xml).map(Response::Status)
    });
    table.insert(SnapshotResponse::TAG, |xml| {
        decode::<SnapshotResponse>(SnapshotResponse::TAG, xml).map(Response::Snapshot)
    });
    table.insert(LoginResponse::TAG, |xml| {
        decode::<LoginResponse>(LoginResponse::TAG, xml).map(Response::Login)
    });
    table.insert(ExternalLinksResponse::TAG, |xml| {
        decode::<ExternalLinksResponse>(ExternalLinksResponse::TAG, xml)
            .map(Response::ExternalLinks)
    });
    table.insert(UserListResponse::TAG, |xml| {
        decode::<UserListResponse>(UserListResponse::TAG, xml).map(Response::Users)
    });
    table.insert(SecurityDiagnosticsResponse::TAG, |xml| {
        decode::<SecurityDiagnosticsResponse>(SecurityDiagnosticsResponse::TAG, xml)
            .map(Response::SecurityDiagnostics)
    });
    table.insert(AuditResponse::TAG, |xml| {
        decode::<AuditResponse>(AuditResponse::TAG, xml).map(Response::Audit)
    });
    table.insert(ParameterListResponse::TAG, |xml| {
        decode::<ParameterListResponse>(ParameterListResponse::TAG, xml).map(Response::Parameters)
    });
    table.insert(EncryptedResponse::TAG, |xml| {
        decode::<EncryptedResponse>(EncryptedResponse::TAG, xml).map(Response::Encrypted)
    });
    table
});

/// Extracts the root element tag of an XML document.
pub fn root_tag(xml: &str) -> Result<String, ProtocolError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                let name = start.name();
                let tag = std::str::from_utf8(name.as_ref())
                    .map_err(|source| ProtocolError::Malformed(source.to_string()))?;
                return Ok(tag.to_string());
            }
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::Text(_)) => continue,
            Ok(Event::Eof) => {
                return Err(ProtocolError::Malformed(
                    "document contains no root element".to_string(),
                ))
            }
            Ok(_) => continue,
            Err(source) => return Err(ProtocolError::Malformed(source.to_string())),
        }
    }
}

/// Parses a request document into the request subtype its root tag names.
///
/// The client itself only serialises requests; this is the receiving half of
/// the contract, used by anything that has to unwrap a serialised request
/// (most notably the encrypted-envelope path).
pub fn parse_request(xml: &str) -> Result<Request, ProtocolError> {
    let tag = root_tag(xml)?;
    let parser = REQUEST_PARSERS
        .get(tag.as_str())
        .ok_or(ProtocolError::UnknownMessage { tag })?;
    parser(xml)
}

/// Parses a reply document into the response subtype its root tag names.
pub fn parse_response(xml: &str) -> Result<Response, ProtocolError> {
    let tag = root_tag(xml)?;
    let parser = RESPONSE_PARSERS
        .get(tag.as_str())
        .ok_or(ProtocolError::UnknownMessage { tag })?;
    parser(xml)
}
