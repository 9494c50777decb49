use thiserror::Error;

/// Errors raised while talking to the Transact portal.
///
/// None of these are fatal to the process: the scheduler logs them and
/// retries on its next tick.
#[derive(Debug, Error)]
pub enum TransactError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse report CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid Transact base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("Transact session has not been initialized")]
    NotReady,

    #[error("malformed page title '{title}'; expecting one of prefixes ['{expected}']")]
    MalformedTitle { title: String, expected: String },

    #[error("no cookie header found when attempting to get a session cookie")]
    MissingCookie,

    #[error("no authorization header found when attempting to log in")]
    MissingAuthorization,

    #[error("malformed authorization header '{value}'; expecting 'Bearer X'")]
    MalformedAuthorization { value: String },

    #[error("authorization token returned was expired; are account credentials correct?")]
    TokenExpired,

    #[error("no matching favorite report found for name '{name}'")]
    ReportNotFound { name: String },

    #[error("favorite report '{name}' is invalid: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    #[error("report submission for report '{name}' failed with HTTP {status}")]
    SubmissionFailed { name: String, status: u16 },

    #[error("report request finalization for report '{name}' failed with HTTP {status}")]
    FinalizeFailed { name: String, status: u16 },

    #[error("report polling for report '{name}' failed with HTTP {status}")]
    PollFailed { name: String, status: u16 },

    #[error("report creation for '{name}' failed")]
    ReportCreationFailed { name: String },

    #[error("report polling for report with name '{name}' timed out after {timeout}")]
    PollTimedOut { name: String, timeout: String },

    #[error("provider is already connected")]
    AlreadyConnected,
}

/// Errors returned by snapshot cache reads.
///
/// These are the only errors from the sync subsystem that reach end users,
/// so each one names the entity that was missing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cannot {action}: cache has not been initialized")]
    NotInitialized { action: &'static str },

    #[error("location with identifier '{location}' not found in the Transact cache")]
    LocationNotFound { location: String },

    #[error("product with identifier '{id}' at location '{location}' not found in the Transact cache")]
    ProductNotFound { location: String, id: String },
}
