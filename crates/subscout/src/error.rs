use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    // -- Usage and configuration
    CliUsage(String),
    Config(String),

    // -- Sources
    InvalidHttpResponse(String),
    Unauthorized(String),
    RateLimited(String),

    // -- Generators
    InvalidLevel(String),
    NoSeed(String),

    // -- External collaborators
    ToolNotFound(String),
    ToolFailed(String),
    Predictor(String),
    Cancelled,

    // -- Externals
    #[from]
    File(std::io::Error),

    #[from]
    Reqwest(reqwest::Error),

    #[from]
    Json(serde_json::Error),

    #[from]
    Yaml(serde_yaml::Error),

    #[from]
    SystemTime(std::time::SystemTimeError),

    #[from]
    Join(tokio::task::JoinError),

    #[from]
    ThreadPool(rayon::ThreadPoolBuildError),

    #[from]
    TimeFormat(time::error::Format),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Error::CliUsage(msg) => write!(fmt, "usage: {msg}"),
            Error::Config(msg) => write!(fmt, "config: {msg}"),
            Error::InvalidHttpResponse(msg) => write!(fmt, "invalid http response: {msg}"),
            Error::Unauthorized(source) => write!(fmt, "invalid api key for {source}"),
            Error::RateLimited(source) => write!(fmt, "rate limit exceeded on {source}"),
            Error::InvalidLevel(level) => write!(fmt, "invalid level format: {level}"),
            Error::NoSeed(msg) => write!(fmt, "no seed: {msg}"),
            Error::ToolNotFound(tool) => write!(fmt, "{tool} executable not found"),
            Error::ToolFailed(msg) => write!(fmt, "external tool failed: {msg}"),
            Error::Predictor(msg) => write!(fmt, "predictor: {msg}"),
            Error::Cancelled => write!(fmt, "scan deadline reached"),
            _ => write!(fmt, "{self:?}"),
        }
    }
}

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate
