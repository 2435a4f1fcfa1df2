/// All errors possible to occur during reconciliation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any error originating from the `kube-rs` crate
    #[error("Kubernetes reported error: {source}")]
    KubeError {
        #[from]
        source: kube::Error,
    },

    /// The requested object does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// An update lost an optimistic concurrency race.
    #[error("Conflicting write to {0}")]
    Conflict(String),

    /// A create found the object already present.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// The resource asks for a provider this controller does not implement.
    #[error("profile '{0}' is not supported by kind controller")]
    UnsupportedProfile(String),

    /// The shared docker network cannot be carved into /24 subnets.
    #[error("unsupported network {0}: prefix length must be 8 or 16")]
    UnsupportedNetwork(String),

    /// The docker network has no IPv4 subnet configured.
    #[error("ipv4 network not found")]
    Ipv4NetworkNotFound,

    /// Every offset in the allocation range is taken.
    #[error("no subnets available")]
    NoSubnetsAvailable,

    /// A CIDR string failed to parse.
    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),

    /// An external command exited unsuccessfully.
    #[error("command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Error in user input or resource definition, typically missing fields.
    #[error("Invalid resource: {0}")]
    UserInputError(String),

    #[error("Failed to load kubeconfig: {source}")]
    KubeconfigError {
        #[from]
        source: kube::config::KubeconfigError,
    },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("JSON error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("YAML error: {source}")]
    YamlError {
        #[from]
        source: serde_yaml::Error,
    },
}

impl Error {
    /// Permanent errors are configuration problems that retrying
    /// cannot fix. The controller does not requeue them.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedProfile(_) | Error::UnsupportedNetwork(_) | Error::UserInputError(_)
        )
    }

    /// Maps a raw API error onto the distinguishable kinds the
    /// reconcilers branch on. `what` names the object for messages.
    pub fn from_api(err: kube::Error, what: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Error::NotFound(what.to_owned()),
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Error::AlreadyExists(what.to_owned())
            }
            kube::Error::Api(ae) if ae.code == 409 => Error::Conflict(what.to_owned()),
            err => err.into(),
        }
    }
}
