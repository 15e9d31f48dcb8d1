//! The high-level server client.
//!
//! [`ServerClient`] is a thin facade over a [`Connection`]: one method per
//! remote operation. Every method builds the request subtype its action
//! expects, stamps in the held session token, sends it under the fixed
//! action name, verifies the server reported success, and unwraps the
//! operation-specific payload. Server-side failure detail is collapsed into
//! [`CommunicationsError`]; callers that need to react to a security failure
//! can still match the wrapped connection error.

use tracing::{debug, warn};

use protocol::connection::Connection;
use protocol::messages::{
    AuditRecord, AuditRequest, BuildCondition, BuildListRequest, BuildRequest,
    ChangePasswordRequest, ConfigurationRequest, ExternalLink, IntegrationRequest, LoginRequest,
    MessageKind, MessageRequest, NameValuePair, ParameterDescriptor, PermissionDiagnostics,
    ProjectRequest, ProjectStatus, SecurityDiagnosticsRequest, ServerRequest, ServerSnapshot,
    UserDetails,
};
use protocol::{
    actions, BuildName, CommunicationsError, ProjectName, Request, Response, ResponseResult,
    ServerName, SessionToken,
};

/// A client for one build server, holding the session state for the caller.
///
/// The target server defaults to the connection's own server name; use
/// [`ServerClient::set_target_server`] (or the factory's for-server
/// constructors) to address another logical server behind the same endpoint.
pub struct ServerClient {
    connection: Box<dyn Connection>,
    target_server: Option<ServerName>,
    session_token: Option<SessionToken>,
}

impl std::fmt::Debug for ServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerClient")
            .field("transport_type", &self.connection.transport_type())
            .field("address", &self.connection.address())
            .field("target_server", &self.target_server)
            .field("session_token", &self.session_token)
            .finish()
    }
}

impl ServerClient {
    /// Creates a client over an existing connection.
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection,
            target_server: None,
            session_token: None,
        }
    }

    /// Creates a client addressed at a specific logical server.
    pub fn for_server(connection: Box<dyn Connection>, target_server: ServerName) -> Self {
        Self {
            connection,
            target_server: Some(target_server),
            session_token: None,
        }
    }

    /// The logical server requests are addressed to.
    pub fn target_server(&self) -> ServerName {
        self.target_server
            .clone()
            .unwrap_or_else(|| self.connection.server_name().clone())
    }

    /// Changes the logical server requests are addressed to.
    pub fn set_target_server(&mut self, target_server: Option<ServerName>) {
        self.target_server = target_server;
    }

    /// The session token held from a successful login, if any.
    pub fn session_token(&self) -> Option<&SessionToken> {
        self.session_token.as_ref()
    }

    /// Whether a login session is currently held.
    pub fn is_logged_in(&self) -> bool {
        self.session_token.is_some()
    }

    /// Whether the underlying connection has work in flight.
    pub fn is_busy(&self) -> bool {
        self.connection.is_busy()
    }

    /// The address of the underlying connection.
    pub fn address(&self) -> &str {
        self.connection.address()
    }

    /// The underlying connection, for detached sends and completions.
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    // -----------------------------------------------------------------------
    // Project control
    // -----------------------------------------------------------------------

    /// Retrieves the status of every project on the server.
    pub async fn get_project_status(&self) -> Result<Vec<ProjectStatus>, CommunicationsError> {
        let response = self
            .send(actions::GET_PROJECT_STATUS, self.server_request())
            .await?;
        match response {
            Response::Status(status) => Ok(status.projects),
            _ => Err(unexpected(actions::GET_PROJECT_STATUS)),
        }
    }

    /// Forces an integration of a project.
    pub async fn force_build(&self, project: ProjectName) -> Result<(), CommunicationsError> {
        self.send(actions::FORCE_BUILD, self.project_request(project))
            .await
            .map(|_| ())
    }

    /// Forces an integration of a project, supplying build parameter values.
    pub async fn force_build_with_parameters(
        &self,
        project: ProjectName,
        parameters: Vec<NameValuePair>,
    ) -> Result<(), CommunicationsError> {
        self.request_integration(project, BuildCondition::ForceBuild, parameters)
            .await
    }

    /// Sends an arbitrary integration request for a project.
    pub async fn request_integration(
        &self,
        project: ProjectName,
        condition: BuildCondition,
        parameters: Vec<NameValuePair>,
    ) -> Result<(), CommunicationsError> {
        let request = self.stamp(IntegrationRequest::new(
            self.target_server(),
            project,
            condition,
            parameters,
        ));
        self.send(actions::FORCE_BUILD, request).await.map(|_| ())
    }

    /// Aborts the running build of a project.
    pub async fn abort_build(&self, project: ProjectName) -> Result<(), CommunicationsError> {
        self.send(actions::ABORT_BUILD, self.project_request(project))
            .await
            .map(|_| ())
    }

    /// Starts a stopped project.
    pub async fn start_project(&self, project: ProjectName) -> Result<(), CommunicationsError> {
        self.send(actions::START, self.project_request(project))
            .await
            .map(|_| ())
    }

    /// Stops a project once its current activity finishes.
    pub async fn stop_project(&self, project: ProjectName) -> Result<(), CommunicationsError> {
        self.send(actions::STOP, self.project_request(project))
            .await
            .map(|_| ())
    }

    /// Attaches a free-form message to a project.
    pub async fn send_text_message(
        &self,
        project: ProjectName,
        kind: MessageKind,
        message: impl Into<String>,
    ) -> Result<(), CommunicationsError> {
        let request = self.stamp(MessageRequest::new(
            self.target_server(),
            project,
            kind,
            message.into(),
        ));
        self.send(actions::SEND_MESSAGE, request).await.map(|_| ())
    }

    /// Waits for a project to finish its current integration.
    pub async fn wait_for_exit(&self, project: ProjectName) -> Result<(), CommunicationsError> {
        self.send(actions::WAIT_FOR_EXIT, self.project_request(project))
            .await
            .map(|_| ())
    }

    /// Cancels a queued integration request that has not started yet.
    pub async fn cancel_pending_request(
        &self,
        project: ProjectName,
    ) -> Result<(), CommunicationsError> {
        self.send(actions::CANCEL_PENDING_REQUEST, self.project_request(project))
            .await
            .map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Retrieves a point-in-time snapshot of every project and queue.
    pub async fn get_snapshot(&self) -> Result<ServerSnapshot, CommunicationsError> {
        let response = self
            .send(actions::GET_SERVER_SNAPSHOT, self.server_request())
            .await?;
        match response {
            Response::Snapshot(snapshot) => Ok(snapshot.snapshot),
            _ => Err(unexpected(actions::GET_SERVER_SNAPSHOT)),
        }
    }

    /// Retrieves the name of the most recent build of a project.
    pub async fn get_latest_build_name(
        &self,
        project: ProjectName,
    ) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_LATEST_BUILD_NAME, self.project_request(project))
            .await?;
        expect_data(actions::GET_LATEST_BUILD_NAME, response)
    }

    /// Retrieves the names of all builds of a project.
    pub async fn get_build_names(
        &self,
        project: ProjectName,
    ) -> Result<Vec<String>, CommunicationsError> {
        let response = self
            .send(actions::GET_BUILD_NAMES, self.project_request(project))
            .await?;
        expect_data_list(actions::GET_BUILD_NAMES, response)
    }

    /// Retrieves the names of the most recent builds of a project.
    pub async fn get_most_recent_build_names(
        &self,
        project: ProjectName,
        count: u32,
    ) -> Result<Vec<String>, CommunicationsError> {
        let request = self.stamp(BuildListRequest::new(self.target_server(), project, count));
        let response = self.send(actions::GET_MOST_RECENT_BUILD_NAMES, request).await?;
        expect_data_list(actions::GET_MOST_RECENT_BUILD_NAMES, response)
    }

    /// Retrieves the log of one build of a project.
    pub async fn get_log(
        &self,
        project: ProjectName,
        build: BuildName,
    ) -> Result<String, CommunicationsError> {
        let request = self.stamp(BuildRequest::new(self.target_server(), project, build, false));
        let response = self.send(actions::GET_LOG, request).await?;
        expect_data(actions::GET_LOG, response)
    }

    /// Retrieves the server-wide log.
    pub async fn get_server_log(&self) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_SERVER_LOG, self.server_request())
            .await?;
        expect_data(actions::GET_SERVER_LOG, response)
    }

    /// Retrieves the server log entries for one project.
    pub async fn get_server_log_for_project(
        &self,
        project: ProjectName,
    ) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_SERVER_LOG, self.project_request(project))
            .await?;
        expect_data(actions::GET_SERVER_LOG, response)
    }

    /// Retrieves the server's version string.
    pub async fn get_server_version(&self) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_SERVER_VERSION, self.server_request())
            .await?;
        expect_data(actions::GET_SERVER_VERSION, response)
    }

    // -----------------------------------------------------------------------
    // Project configuration
    // -----------------------------------------------------------------------

    /// Adds a project definition to the server.
    pub async fn add_project(
        &self,
        project: ProjectName,
        definition: String,
    ) -> Result<(), CommunicationsError> {
        let request = self.configuration_request(project, Some(definition), false, false, false);
        self.send(actions::ADD_PROJECT, request).await.map(|_| ())
    }

    /// Deletes a project, optionally purging its on-disk state.
    pub async fn delete_project(
        &self,
        project: ProjectName,
        purge_working_directory: bool,
        purge_artifact_directory: bool,
        purge_source_control: bool,
    ) -> Result<(), CommunicationsError> {
        let request = self.configuration_request(
            project,
            None,
            purge_working_directory,
            purge_artifact_directory,
            purge_source_control,
        );
        self.send(actions::DELETE_PROJECT, request).await.map(|_| ())
    }

    /// Retrieves a project's definition.
    pub async fn get_project(&self, project: ProjectName) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_PROJECT, self.project_request(project))
            .await?;
        expect_data(actions::GET_PROJECT, response)
    }

    /// Replaces a project's definition.
    pub async fn update_project(
        &self,
        project: ProjectName,
        definition: String,
    ) -> Result<(), CommunicationsError> {
        let request = self.configuration_request(project, Some(definition), false, false, false);
        self.send(actions::UPDATE_PROJECT, request).await.map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Project documents
    // -----------------------------------------------------------------------

    /// Retrieves the external links configured for a project.
    pub async fn get_external_links(
        &self,
        project: ProjectName,
    ) -> Result<Vec<ExternalLink>, CommunicationsError> {
        let response = self
            .send(actions::GET_EXTERNAL_LINKS, self.project_request(project))
            .await?;
        match response {
            Response::ExternalLinks(links) => Ok(links.links),
            _ => Err(unexpected(actions::GET_EXTERNAL_LINKS)),
        }
    }

    /// Retrieves the artifact directory of a project.
    pub async fn get_artifact_directory(
        &self,
        project: ProjectName,
    ) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_ARTIFACT_DIRECTORY, self.project_request(project))
            .await?;
        expect_data(actions::GET_ARTIFACT_DIRECTORY, response)
    }

    /// Retrieves the statistics document of a project.
    pub async fn get_statistics_document(
        &self,
        project: ProjectName,
    ) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_STATISTICS_DOCUMENT, self.project_request(project))
            .await?;
        expect_data(actions::GET_STATISTICS_DOCUMENT, response)
    }

    /// Retrieves the modification-history document of a project.
    pub async fn get_modification_history_document(
        &self,
        project: ProjectName,
    ) -> Result<String, CommunicationsError> {
        let response = self
            .send(
                actions::GET_MODIFICATION_HISTORY_DOCUMENT,
                self.project_request(project),
            )
            .await?;
        expect_data(actions::GET_MODIFICATION_HISTORY_DOCUMENT, response)
    }

    /// Retrieves the RSS feed of a project.
    pub async fn get_rss_feed(&self, project: ProjectName) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_RSS_FEED, self.project_request(project))
            .await?;
        expect_data(actions::GET_RSS_FEED, response)
    }

    // -----------------------------------------------------------------------
    // Security
    // -----------------------------------------------------------------------

    /// Attempts to open an authenticated session.
    ///
    /// Returns `true` and stores the server-issued token when the server
    /// reports success; otherwise returns `false` and the held token is left
    /// untouched. Transport failures still surface as errors.
    pub async fn login(
        &mut self,
        credentials: Vec<NameValuePair>,
    ) -> Result<bool, CommunicationsError> {
        let request = self.stamp(LoginRequest::new(self.target_server(), credentials));
        let response = self
            .connection
            .send_message(actions::LOGIN, request)
            .await?;
        if response.result() != ResponseResult::Success {
            debug!(errors = %response.concatenated_errors(), "login refused");
            return Ok(false);
        }
        match response {
            Response::Login(login) => match login.session_token {
                Some(token) if !token.is_empty() => {
                    self.session_token = Some(token);
                    Ok(true)
                }
                _ => Ok(false),
            },
            _ => Err(unexpected(actions::LOGIN)),
        }
    }

    /// Closes the current session.
    ///
    /// The held token is cleared no matter what the server answers; a
    /// non-success reply is logged and swallowed.
    pub async fn logout(&mut self) -> Result<(), CommunicationsError> {
        if self.session_token.is_none() {
            return Ok(());
        }
        let request = self.stamp(ServerRequest::new(self.target_server()));
        self.session_token = None;
        let response = self.connection.send_message(actions::LOGOUT, request).await?;
        if response.result() != ResponseResult::Success {
            debug!(errors = %response.concatenated_errors(), "server reported a failed logout");
        }
        Ok(())
    }

    /// Retrieves the server's security configuration document.
    pub async fn get_security_configuration(&self) -> Result<String, CommunicationsError> {
        let response = self
            .send(actions::GET_SECURITY_CONFIGURATION, self.server_request())
            .await?;
        expect_data(actions::GET_SECURITY_CONFIGURATION, response)
    }

    /// Lists the users known to the server.
    pub async fn list_users(&self) -> Result<Vec<UserDetails>, CommunicationsError> {
        let response = self.send(actions::LIST_USERS, self.server_request()).await?;
        match response {
            Response::Users(users) => Ok(users.users),
            _ => Err(unexpected(actions::LIST_USERS)),
        }
    }

    /// Diagnoses the permissions a user holds on a set of projects.
    pub async fn diagnose_security_permissions(
        &self,
        user_name: impl Into<String>,
        projects: Vec<String>,
    ) -> Result<Vec<PermissionDiagnostics>, CommunicationsError> {
        let request = self.stamp(SecurityDiagnosticsRequest::new(
            self.target_server(),
            user_name.into(),
            projects,
        ));
        let response = self
            .send(actions::DIAGNOSE_SECURITY_PERMISSIONS, request)
            .await?;
        match response {
            Response::SecurityDiagnostics(diagnostics) => Ok(diagnostics.diagnostics),
            _ => Err(unexpected(actions::DIAGNOSE_SECURITY_PERMISSIONS)),
        }
    }

    /// Reads a page of security audit records.
    pub async fn read_audit_records(
        &self,
        start_record: u32,
        record_count: u32,
    ) -> Result<Vec<AuditRecord>, CommunicationsError> {
        let request = self.stamp(AuditRequest::new(
            self.target_server(),
            start_record,
            record_count,
        ));
        let response = self.send(actions::READ_AUDIT_RECORDS, request).await?;
        match response {
            Response::Audit(audit) => Ok(audit.records),
            _ => Err(unexpected(actions::READ_AUDIT_RECORDS)),
        }
    }

    /// Lists the parameters a project's build accepts.
    pub async fn list_build_parameters(
        &self,
        project: ProjectName,
    ) -> Result<Vec<ParameterDescriptor>, CommunicationsError> {
        let response = self
            .send(actions::LIST_BUILD_PARAMETERS, self.project_request(project))
            .await?;
        match response {
            Response::Parameters(parameters) => Ok(parameters.parameters),
            _ => Err(unexpected(actions::LIST_BUILD_PARAMETERS)),
        }
    }

    /// Changes the current user's password.
    pub async fn change_password(
        &self,
        old_password: impl Into<String>,
        new_password: impl Into<String>,
    ) -> Result<(), CommunicationsError> {
        let request = self.stamp(ChangePasswordRequest::new(
            self.target_server(),
            None,
            Some(old_password.into()),
            new_password.into(),
        ));
        self.send(actions::CHANGE_PASSWORD, request).await.map(|_| ())
    }

    /// Resets another user's password.
    pub async fn reset_password(
        &self,
        user_name: impl Into<String>,
        new_password: impl Into<String>,
    ) -> Result<(), CommunicationsError> {
        let request = self.stamp(ChangePasswordRequest::new(
            self.target_server(),
            Some(user_name.into()),
            None,
            new_password.into(),
        ));
        self.send(actions::RESET_PASSWORD, request).await.map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Logs out if a session is active and releases the client.
    ///
    /// Dropping the client without calling this skips the server-side logout
    /// and only discards local state.
    pub async fn close(mut self) {
        if self.session_token.is_some() {
            if let Err(error) = self.logout().await {
                warn!(%error, "logout during close failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    fn server_request(&self) -> Request {
        self.stamp(ServerRequest::new(self.target_server()))
    }

    fn project_request(&self, project: ProjectName) -> Request {
        self.stamp(ProjectRequest::new(self.target_server(), project))
    }

    fn configuration_request(
        &self,
        project: ProjectName,
        definition: Option<String>,
        purge_working_directory: bool,
        purge_artifact_directory: bool,
        purge_source_control: bool,
    ) -> Request {
        self.stamp(ConfigurationRequest::new(
            self.target_server(),
            project,
            purge_working_directory,
            purge_artifact_directory,
            purge_source_control,
            definition,
        ))
    }

    /// Stamps the held session token into a freshly built request.
    fn stamp(&self, request: impl Into<Request>) -> Request {
        let mut request = request.into();
        if let Some(token) = &self.session_token {
            request.set_session_token(Some(token.clone()));
        }
        request
    }

    /// Sends a request and verifies the server reported success.
    async fn send(&self, action: &str, request: Request) -> Result<Response, CommunicationsError> {
        let response = self.connection.send_message(action, request).await?;
        if response.result() != ResponseResult::Success {
            return Err(CommunicationsError::ServerFailure(
                response.concatenated_errors(),
            ));
        }
        Ok(response)
    }
}

fn unexpected(action: &str) -> CommunicationsError {
    CommunicationsError::UnexpectedResponse {
        action: action.to_string(),
    }
}

fn expect_data(action: &str, response: Response) -> Result<String, CommunicationsError> {
    match response {
        Response::Data(data) => Ok(data.data),
        _ => Err(unexpected(action)),
    }
}

fn expect_data_list(action: &str, response: Response) -> Result<Vec<String>, CommunicationsError> {
    match response {
        Response::DataList(list) => Ok(list.data),
        _ => Err(unexpected(action)),
    }
}
