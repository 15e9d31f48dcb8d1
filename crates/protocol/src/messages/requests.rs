//! Request message subtypes.
//!
//! Every request carries the same correlation attributes (identifier, server
//! name, optional session token, source, timestamp); subtypes add the fields
//! their operations need. The `request_message!` macro generates the shared
//! attributes so the wire spelling stays identical across subtypes.

use serde::{Deserialize, Serialize};

use crate::identifiers::{BuildName, ProjectName, RequestId, ServerName, SessionToken};
use crate::messages::records::NameValuePair;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Macro for request subtypes.
// Generates: struct with the shared attributes plus the listed fields, the
// wire TAG constant, and a new() taking the server name and the extra fields.
// ---------------------------------------------------------------------------
macro_rules! request_message {
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
            /// Unique client-generated identifier for this request.
            #[serde(rename = "@identifier")]
            pub identifier: RequestId,
            /// The logical server (queue) the request addresses.
            #[serde(rename = "@server")]
            pub server_name: ServerName,
            /// Session token, attached once the caller has authenticated.
            #[serde(rename = "@session", skip_serializing_if = "Option::is_none", default)]
            pub session_token: Option<SessionToken>,
            /// Machine the request originated from.
            #[serde(rename = "@source", skip_serializing_if = "Option::is_none", default)]
            pub source: Option<String>,
            /// When the request was created.
            #[serde(rename = "@timestamp")]
            pub timestamp: Timestamp,
            $( $(#[$fattr])* pub $field: $ftype, )*
        }

        impl $name {
            /// Root element tag identifying this message on the wire.
            pub const TAG: &'static str = $tag;

            /// Creates a new request with a fresh identifier and timestamp.
            pub fn new(server_name: ServerName $(, $field: $ftype)*) -> Self {
                Self {
                    identifier: RequestId::new_random(),
                    server_name,
                    session_token: None,
                    source: None,
                    timestamp: Timestamp::now(),
                    $( $field, )*
                }
            }
        }
    };
}

request_message! {
    /// A request with no payload beyond the shared attributes.
    ///
    /// Used by every server-scoped query (status, snapshot, version, ...).
    ServerRequest, "serverRequest" {}
}

request_message! {
    /// A request scoped to one project.
    ProjectRequest, "projectRequest" {
        /// Project the operation applies to.
        #[serde(rename = "@project")]
        project_name: ProjectName,
    }
}

request_message! {
    /// A request scoped to one build of one project.
    BuildRequest, "buildRequest" {
        /// Project the build belongs to.
        #[serde(rename = "@project")]
        project_name: ProjectName,
        /// The build to operate on.
        #[serde(rename = "@build")]
        build_name: BuildName,
        /// Whether the reply payload should be compressed.
        #[serde(rename = "@compress", default)]
        compress: bool,
    }
}

request_message! {
    /// A request for a bounded number of build names.
    BuildListRequest, "buildListRequest" {
        /// Project the builds belong to.
        #[serde(rename = "@project")]
        project_name: ProjectName,
        /// Maximum number of names to return, newest first.
        #[serde(rename = "@count")]
        count: u32,
    }
}

/// When an integration should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildCondition {
    /// Integrate only when source control has modifications.
    IfModificationExists,
    /// Integrate unconditionally.
    ForceBuild,
}

request_message! {
    /// A request to run an integration, optionally with build parameters.
    IntegrationRequest, "integrationRequest" {
        /// Project to integrate.
        #[serde(rename = "@project")]
        project_name: ProjectName,
        /// Condition under which the integration runs.
        #[serde(rename = "@condition")]
        condition: BuildCondition,
        /// Values for the parameters the project's build accepts.
        #[serde(rename = "parameter", default, skip_serializing_if = "Vec::is_empty")]
        parameters: Vec<NameValuePair>,
    }
}

/// The audience a free-form project message is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// No particular audience.
    NotDefined,
    /// The people whose changes broke the build.
    Breakers,
    /// The person fixing the build.
    Fixer,
    /// The tasks that failed.
    FailingTasks,
    /// General build status information.
    BuildStatus,
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::NotDefined
    }
}

request_message! {
    /// A request to attach a free-form message to a project.
    MessageRequest, "messageRequest" {
        /// Project the message is for.
        #[serde(rename = "@project")]
        project_name: ProjectName,
        /// Audience of the message.
        #[serde(rename = "@kind", default)]
        kind: MessageKind,
        /// The message text.
        message: String,
    }
}

request_message! {
    /// A request that changes the server's project configuration.
    ///
    /// Covers add, update, and delete; delete uses the purge flags and leaves
    /// the definition empty.
    ConfigurationRequest, "configurationRequest" {
        /// Project the change applies to.
        #[serde(rename = "@project")]
        project_name: ProjectName,
        /// Whether to delete the project's working directory.
        #[serde(rename = "@purgeWorkingDirectory", default)]
        purge_working_directory: bool,
        /// Whether to delete the project's artifact directory.
        #[serde(rename = "@purgeArtifactDirectory", default)]
        purge_artifact_directory: bool,
        /// Whether to delete the project's source-control working state.
        #[serde(rename = "@purgeSourceControl", default)]
        purge_source_control: bool,
        /// Serialised project definition, for add and update.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        definition: Option<String>,
    }
}

request_message! {
    /// A request to open an authenticated session.
    LoginRequest, "loginRequest" {
        /// Credentials to authenticate with (user name, password, ...).
        #[serde(rename = "credential", default, skip_serializing_if = "Vec::is_empty")]
        credentials: Vec<NameValuePair>,
    }
}

request_message! {
    /// A request to change or reset a password.
    ChangePasswordRequest, "changePasswordRequest" {
        /// User the change applies to; absent for the current user.
        #[serde(rename = "@userName", skip_serializing_if = "Option::is_none", default)]
        user_name: Option<String>,
        /// Current password; absent when an administrator resets it.
        #[serde(rename = "@oldPassword", skip_serializing_if = "Option::is_none", default)]
        old_password: Option<String>,
        /// Password to install.
        #[serde(rename = "@newPassword")]
        new_password: String,
    }
}

request_message! {
    /// A request to diagnose the permissions a user holds.
    SecurityDiagnosticsRequest, "securityDiagnosticsRequest" {
        /// User to diagnose.
        #[serde(rename = "@userName")]
        user_name: String,
        /// Projects to check; empty checks server-level permissions only.
        #[serde(rename = "project", default, skip_serializing_if = "Vec::is_empty")]
        projects: Vec<String>,
    }
}

request_message! {
    /// A request for a page of security audit records.
    AuditRequest, "auditRequest" {
        /// Zero-based index of the first record to return.
        #[serde(rename = "@startRecord")]
        start_record: u32,
        /// Number of records to return.
        #[serde(rename = "@recordCount")]
        record_count: u32,
    }
}

request_message! {
    /// The key-exchange payload establishing an encrypted channel.
    ///
    /// Both fields are base64 ciphertext produced with the server's public
    /// key: a fresh symmetric session key and its initialisation vector.
    KeyExchangeRequest, "keyExchangeRequest" {
        /// The session key, encrypted with the server's public key.
        #[serde(rename = "encryptedKey")]
        encrypted_key: String,
        /// The initialisation vector, encrypted with the server's public key.
        #[serde(rename = "encryptedIv")]
        encrypted_iv: String,
    }
}

request_message! {
    /// An envelope carrying an encrypted request.
    ///
    /// The `action` attribute names the operation hidden inside the
    /// ciphertext; the envelope itself always travels under the
    /// `ProcessSecureRequest` action.
    EncryptedRequest, "encryptedRequest" {
        /// The action the encrypted payload is for.
        #[serde(rename = "@action")]
        action: String,
        /// Base64 ciphertext of the serialised inner request.
        data: String,
    }
}
