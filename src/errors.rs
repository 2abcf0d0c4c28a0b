//! An error from the quota controller

/// An error from the quota controller
#[derive(Debug)]
pub enum Error {
    /// A generic error with a message
    Generic(String),
    /// An IO Error
    IO(std::io::Error),
    /// An error from loading a config
    Config(config::ConfigError),
    /// An error from converting a value with serde
    Serde(serde_json::Error),
    /// An error from the k8s client
    K8s(kube::Error),
    /// An error from joining a tokio task
    JoinError(tokio::task::JoinError),
}

impl Error {
    /// Create a new generic error
    ///
    /// # Arguments
    ///
    /// * `msg` - The error message to set
    pub fn new<T: Into<String>>(msg: T) -> Self {
        Error::Generic(msg.into())
    }

    /// Get the error message for this error if one exists
    pub fn msg(&self) -> Option<String> {
        // get the msg from any error types that support it
        match self {
            Error::Generic(msg) => Some(msg.clone()),
            Error::IO(err) => Some(err.to_string()),
            Error::Config(err) => Some(err.to_string()),
            Error::Serde(err) => Some(err.to_string()),
            Error::K8s(err) => Some(err.to_string()),
            Error::JoinError(err) => Some(err.to_string()),
        }
    }

    /// get the kind of error as a str
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Generic(_) => "Generic",
            Error::IO(_) => "IO",
            Error::Config(_) => "Config",
            Error::Serde(_) => "Serde",
            Error::K8s(_) => "K8s",
            Error::JoinError(_) => "JoinError",
        }
    }
}

impl std::fmt::Display for Error {
    /// display this error in a easy readable format
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.msg() {
            Some(msg) => write!(f, "Error: {}", msg),
            None => write!(f, "Kind: {}", self.kind()),
        }
    }
}

// mark that this is an error struct
impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serde(error)
    }
}

impl From<kube::Error> for Error {
    fn from(error: kube::Error) -> Self {
        Error::K8s(error)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Error::JoinError(error)
    }
}
