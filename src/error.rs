use std::path::PathBuf;
use thiserror::Error;

use crate::options::WsdlCacheMode;

/// Broad classification of [`Error`], for callers deciding whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    UnsupportedCacheMode,
    WsdlRetrieval,
    Transport,
    ArgumentParse,
    PropertyAccess,
    Engine,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Could not find / create WSDL cache directory at path \"{}\"", .path.display())]
    CacheDirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WSDL cache directory \"{}\" is not writable", .path.display())]
    CacheDirectoryNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown authentication type \"{0}\" requested")]
    UnknownAuthType(String),

    #[error("Unknown WSDL cache mode \"{0}\"")]
    UnknownCacheMode(String),

    #[error("Invalid request header \"{0}\", expected \"Name: value\"")]
    InvalidHeader(String),

    #[error("SOAP option \"{0}\" is required when no WSDL is given")]
    MissingSoapOption(&'static str),

    #[error("{0} is not supported by SoapClientPlus")]
    UnsupportedCacheMode(WsdlCacheMode),

    #[error("Error thrown while trying to retrieve WSDL file {url} (HTTP {status}): \"{detail}\"")]
    WsdlRetrieval {
        url: String,
        status: u16,
        detail: String,
    },

    #[error("Error during call (HTTP {status}): \"{detail}\", \"{body}\"")]
    Transport {
        status: u16,
        detail: String,
        body: String,
    },

    #[error("Error found while parsing ActionBody: \"{0}\"")]
    ArgumentParse(#[source] crate::xml::ParseError),

    #[error("Object does not have public property with name \"{0}\"")]
    UnknownProperty(String),

    #[error("Unable to load WSDL")]
    Wsdl(#[from] soapplus_wsdl::error::Error),

    #[error("Function \"{0}\" is not a valid method for this service")]
    UnknownOperation(String),

    #[error("SOAP fault {code}: {message}")]
    Fault { code: String, message: String },

    #[error("Malformed SOAP response: {0}")]
    MalformedResponse(String),

    #[error("Could not serialize request: {0}")]
    Serialization(String),

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CacheDirectoryCreate { .. }
            | Error::CacheDirectoryNotWritable { .. }
            | Error::UnknownAuthType(_)
            | Error::UnknownCacheMode(_)
            | Error::InvalidHeader(_)
            | Error::MissingSoapOption(_) => ErrorKind::Configuration,
            Error::UnsupportedCacheMode(_) => ErrorKind::UnsupportedCacheMode,
            Error::WsdlRetrieval { .. } => ErrorKind::WsdlRetrieval,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::ArgumentParse(_) => ErrorKind::ArgumentParse,
            Error::UnknownProperty(_) => ErrorKind::PropertyAccess,
            Error::Wsdl(_)
            | Error::UnknownOperation(_)
            | Error::Fault { .. }
            | Error::MalformedResponse(_)
            | Error::Serialization(_) => ErrorKind::Engine,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
