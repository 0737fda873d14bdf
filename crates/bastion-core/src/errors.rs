/// Core error type for the bot and web service.
///
/// Adapter crates (Discord, Strava, HTTP) map their specific errors into this
/// type so handlers can tell user-facing failures apart from unexpected ones.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("command `{0}` is already registered")]
    DuplicateCommand(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not connected: {0}")]
    NotConnected(String),

    #[error("missing user: {0}")]
    MissingUser(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("chat connection closed")]
    Disconnected,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Domain-known failures that are expected during normal operation
    /// (unlinked accounts, bad credentials) as opposed to bugs or outages.
    pub fn is_expected(&self) -> bool {
        matches!(self, Error::Unauthorized(_) | Error::NotConnected(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
