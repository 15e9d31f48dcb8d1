//! The action catalog.
//!
//! Every remote operation is identified on the wire by a short action name.
//! The name selects both the server-side handler and the request/response
//! subtypes the exchange uses, so the constants here are the single place
//! where the contract's spellings live.

/// Queries the status of every configured project.
pub const GET_PROJECT_STATUS: &str = "GetProjectStatus";
/// Forces an integration of a project.
pub const FORCE_BUILD: &str = "ForceBuild";
/// Aborts the running build of a project.
pub const ABORT_BUILD: &str = "AbortBuild";
/// Starts a stopped project.
pub const START: &str = "Start";
/// Stops a running project once its current activity finishes.
pub const STOP: &str = "Stop";
/// Sends a free-form message to a project.
pub const SEND_MESSAGE: &str = "SendMessage";
/// Waits for a project to finish its current integration.
pub const WAIT_FOR_EXIT: &str = "WaitForExit";
/// Cancels a pending (queued, not yet started) integration request.
pub const CANCEL_PENDING_REQUEST: &str = "CancelPendingRequest";
/// Retrieves a point-in-time snapshot of the whole server.
pub const GET_SERVER_SNAPSHOT: &str = "GetCruiseServerSnapshot";
/// Retrieves the name of the most recent build of a project.
pub const GET_LATEST_BUILD_NAME: &str = "GetLatestBuildName";
/// Retrieves the names of all builds of a project.
pub const GET_BUILD_NAMES: &str = "GetBuildNames";
/// Retrieves the names of the most recent builds of a project.
pub const GET_MOST_RECENT_BUILD_NAMES: &str = "GetMostRecentBuildNames";
/// Retrieves the log of one build.
pub const GET_LOG: &str = "GetLog";
/// Retrieves the server log, optionally scoped to one project.
pub const GET_SERVER_LOG: &str = "GetServerLog";
/// Retrieves the server's version string.
pub const GET_SERVER_VERSION: &str = "GetServerVersion";
/// Adds a project definition to the server configuration.
pub const ADD_PROJECT: &str = "AddProject";
/// Deletes a project, optionally purging its working state.
pub const DELETE_PROJECT: &str = "DeleteProject";
/// Retrieves a project's definition.
pub const GET_PROJECT: &str = "GetProject";
/// Replaces a project's definition.
pub const UPDATE_PROJECT: &str = "UpdateProject";
/// Retrieves the external links configured for a project.
pub const GET_EXTERNAL_LINKS: &str = "GetExternalLinks";
/// Retrieves the artifact directory of a project.
pub const GET_ARTIFACT_DIRECTORY: &str = "GetArtifactDirectory";
/// Retrieves the statistics document of a project.
pub const GET_STATISTICS_DOCUMENT: &str = "GetStatisticsDocument";
/// Retrieves the modification-history document of a project.
pub const GET_MODIFICATION_HISTORY_DOCUMENT: &str = "GetModificationHistoryDocument";
/// Retrieves the RSS feed of a project.
pub const GET_RSS_FEED: &str = "GetRSSFeed";
/// Authenticates and opens a session.
pub const LOGIN: &str = "Login";
/// Closes the current session.
pub const LOGOUT: &str = "Logout";
/// Retrieves the server's security configuration document.
pub const GET_SECURITY_CONFIGURATION: &str = "GetSecurityConfiguration";
/// Lists the users known to the server.
pub const LIST_USERS: &str = "ListUsers";
/// Diagnoses the permissions a user holds on a set of projects.
pub const DIAGNOSE_SECURITY_PERMISSIONS: &str = "DiagnoseSecurityPermissions";
/// Reads a page of security audit records.
pub const READ_AUDIT_RECORDS: &str = "ReadAuditRecords";
/// Lists the parameters a project's build accepts.
pub const LIST_BUILD_PARAMETERS: &str = "ListBuildParameters";
/// Changes the current user's password.
pub const CHANGE_PASSWORD: &str = "ChangePassword";
/// Resets another user's password.
pub const RESET_PASSWORD: &str = "ResetPassword";

// ---------------------------------------------------------------------------
// Secure-channel actions. Only the encrypting transport decorator sends
// these; they never appear in the high-level client API.
// ---------------------------------------------------------------------------

/// Retrieves the server's public asymmetric key.
pub const RETRIEVE_PUBLIC_KEY: &str = "RetrievePublicKey";
/// Installs the client-generated session key on the server.
pub const INITIALISE_SECURE_CONNECTION: &str = "InitialiseSecureConnection";
/// Carries an encrypted envelope holding the real action and request.
pub const PROCESS_SECURE_REQUEST: &str = "ProcessSecureRequest";
