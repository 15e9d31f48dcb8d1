//! HTTP transport behaviour against a local mock server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use protocol::connection::{Connection, ConnectionObserver};
use protocol::messages::{DataResponse, ProjectRequest, ServerRequest, ServerResponse};
use protocol::{
    actions, ConnectionError, OperationKey, ProjectName, Request, Response, ResponseResult,
    ServerName,
};
use transport::{HttpConnection, Url};

fn connection_to(server: &MockServer) -> HttpConnection {
    HttpConnection::new(Url::parse(&server.uri()).unwrap())
}

fn success_reply(request: &Request, data: &str) -> String {
    Response::from(DataResponse::new(
        request.identifier(),
        ResponseResult::Success,
        data.to_string(),
    ))
    .to_xml()
    .unwrap()
}

#[tokio::test]
async fn posts_the_action_and_message_to_the_per_server_url() {
    let server = MockServer::start().await;
    let request = Request::from(ProjectRequest::new(
        ServerName::new("local"),
        ProjectName::new("Project #1"),
    ));
    let reply = Response::from(ServerResponse::new(
        request.identifier(),
        ResponseResult::Success,
    ))
    .to_xml()
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/server/local/RawXmlMessage.aspx"))
        .and(body_string_contains("action=ForceBuild"))
        // The message field carries the serialised request: its root tag and
        // the project name, form-encoded.
        .and(body_string_contains("message=%3CprojectRequest"))
        .and(body_string_contains("Project+%231"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply))
        .expect(1)
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let response = connection
        .send_message(actions::FORCE_BUILD, request)
        .await
        .unwrap();
    assert_eq!(response.result(), ResponseResult::Success);
}

#[tokio::test]
async fn the_server_name_comes_from_the_request_not_the_connection() {
    let server = MockServer::start().await;
    let request = Request::from(ServerRequest::new(ServerName::new("other-queue")));
    let reply = success_reply(&request, "1.2.3");

    Mock::given(method("POST"))
        .and(path("/server/other-queue/RawXmlMessage.aspx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply))
        .expect(1)
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    connection
        .send_message(actions::GET_SERVER_VERSION, request)
        .await
        .unwrap();
}

#[tokio::test]
async fn the_reply_is_decoded_into_the_subtype_its_root_tag_names() {
    let server = MockServer::start().await;
    let request = Request::from(ServerRequest::new(ServerName::new("local")));
    let identifier = request.identifier();
    let reply = success_reply(&request, "1.2.3");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply))
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let response = connection
        .send_message(actions::GET_SERVER_VERSION, request)
        .await
        .unwrap();

    match response {
        Response::Data(data) => {
            assert_eq!(data.request_identifier, identifier);
            assert_eq!(data.data, "1.2.3");
        }
        other => panic!("expected a data response, got {other:?}"),
    }
}

#[tokio::test]
async fn an_unknown_reply_tag_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<surprise/>"))
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let error = connection
        .send_message(
            actions::GET_SERVER_VERSION,
            Request::from(ServerRequest::new(ServerName::new("local"))),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, ConnectionError::Protocol(_)));
}

#[tokio::test]
async fn a_failure_status_propagates_the_underlying_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let error = connection
        .send_message(
            actions::GET_SERVER_VERSION,
            Request::from(ServerRequest::new(ServerName::new("local"))),
        )
        .await
        .unwrap_err();

    match error {
        ConnectionError::Transport(message) => assert!(message.contains("500")),
        other => panic!("expected a transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn an_unreachable_address_gets_the_fixed_user_facing_message() {
    // The reserved .invalid top-level domain never resolves.
    let connection = HttpConnection::new(Url::parse("http://unknown-host.invalid/").unwrap());

    let error = connection
        .send_message(
            actions::GET_SERVER_VERSION,
            Request::from(ServerRequest::new(ServerName::new("local"))),
        )
        .await
        .unwrap_err();

    assert_eq!(error, ConnectionError::UnknownAddress);
    assert_eq!(error.to_string(), "Oops, unknown address");
}

#[tokio::test]
async fn a_detached_unreachable_send_completes_with_the_fixed_message() {
    let connection = HttpConnection::new(Url::parse("http://unknown-host.invalid/").unwrap());
    let mut completions = connection.completions();

    connection.send_message_detached(
        actions::GET_SERVER_VERSION,
        Request::from(ServerRequest::new(ServerName::new("local"))),
        None,
    );

    let completion = completions.recv().await.unwrap();
    assert!(!completion.cancelled);
    assert!(completion.response.is_none());
    assert_eq!(
        completion.error.unwrap().to_string(),
        "Oops, unknown address"
    );
}

#[tokio::test]
async fn a_cancel_before_completion_wins_over_the_result() {
    let server = MockServer::start().await;
    let request = Request::from(ServerRequest::new(ServerName::new("local")));
    let reply = success_reply(&request, "too late");

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(reply)
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let mut completions = connection.completions();
    let key = Some(OperationKey::new("slow"));

    connection.send_message_detached(actions::GET_SERVER_VERSION, request, key.clone());
    assert!(connection.is_busy());
    connection.cancel(key.clone());

    let completion = completions.recv().await.unwrap();
    assert!(completion.cancelled);
    assert!(completion.response.is_none());
    assert!(completion.error.is_none());
    assert_eq!(completion.key, key);
    assert!(!connection.is_busy());
}

#[tokio::test]
async fn a_duplicate_detached_key_is_rejected_with_an_error_completion() {
    let server = MockServer::start().await;
    let reply = success_reply(
        &Request::from(ServerRequest::new(ServerName::new("local"))),
        "ignored",
    );

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(reply)
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let mut completions = connection.completions();
    let key = Some(OperationKey::new("once"));

    connection.send_message_detached(
        actions::GET_SERVER_VERSION,
        Request::from(ServerRequest::new(ServerName::new("local"))),
        key.clone(),
    );
    connection.send_message_detached(
        actions::GET_SERVER_VERSION,
        Request::from(ServerRequest::new(ServerName::new("local"))),
        key.clone(),
    );

    let completion = completions.recv().await.unwrap();
    assert!(matches!(
        completion.error,
        Some(ConnectionError::DuplicateOperation(_))
    ));
    // The original operation is untouched and still counts as busy.
    assert!(connection.is_busy());
}

#[tokio::test]
async fn dropping_the_connection_cancels_in_flight_sends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let mut completions = connection.completions();
    connection.send_message_detached(
        actions::GET_SERVER_VERSION,
        Request::from(ServerRequest::new(ServerName::new("local"))),
        None,
    );
    drop(connection);

    let completion = completions.recv().await.unwrap();
    assert!(completion.cancelled);
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl ConnectionObserver for RecordingObserver {
    fn request_sending(&self, action: &str, _request: &Request) {
        self.events.lock().unwrap().push(format!("sending {action}"));
    }

    fn response_received(&self, action: &str, _response: &Response) {
        self.events.lock().unwrap().push(format!("received {action}"));
    }
}

#[tokio::test]
async fn observers_are_notified_around_each_exchange() {
    let server = MockServer::start().await;
    let request = Request::from(ServerRequest::new(ServerName::new("local")));
    let reply = success_reply(&request, "1.2.3");

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply))
        .mount(&server)
        .await;

    let connection = connection_to(&server);
    let observer = Arc::new(RecordingObserver::default());
    connection.subscribe(observer.clone());

    connection
        .send_message(actions::GET_SERVER_VERSION, request)
        .await
        .unwrap();

    let events = observer.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "sending GetServerVersion".to_string(),
            "received GetServerVersion".to_string(),
        ]
    );
}

#[tokio::test]
async fn introspection_reports_the_transport_and_address() {
    let server = MockServer::start().await;
    let connection = connection_to(&server);

    assert_eq!(connection.transport_type(), "HTTP");
    assert_eq!(connection.address(), server.uri().trim_end_matches('/'));
    assert_eq!(connection.server_name().as_str(), "127.0.0.1");
    assert!(!connection.is_busy());
}
