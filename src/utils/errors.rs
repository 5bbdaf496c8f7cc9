#![forbid(unsafe_code)]

use thiserror::Error;

/// Errors enumerates the errors returned by the archive server.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("poetry_archive input parameters:\n{}", .0)]
    InputParms(String),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    /// The poem collection as a whole could not be enumerated.
    #[error("Unable to enumerate the poem store: {}", .0)]
    StoreEnumeration(String),

    /// A single poem resource could not be decoded.  Never leaves the store.
    #[error("Malformed poem record {}: {}", .0, .1)]
    MalformedRecord(u32, String),

    #[error("Poem {} not found", .0)]
    PoemNotFound(u32),

    #[error("Unable to render page: {}", .0)]
    RenderError(String),

    #[error("Invalid poem import input: {}", .0)]
    ImportInput(String),
}

impl From<tera::Error> for Errors {
    fn from(e: tera::Error) -> Self {
        // Tera nests the useful detail in the error source chain.
        let mut msg = e.to_string();
        let mut source = std::error::Error::source(&e);
        while let Some(s) = source {
            msg.push_str(": ");
            msg.push_str(&s.to_string());
            source = s.source();
        }
        Errors::RenderError(msg)
    }
}
