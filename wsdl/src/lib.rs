//! Just enough WSDL 1.1 to put a document/literal call on the wire: the target namespace,
//! SOAP bindings with their actions, and the service endpoints.

use std::path::Path;
use url::Url;

mod parser;

pub mod error;
pub mod types;

pub use parser::parse_str;

/// Parses a WSDL document from a local path or `file://` URL.
pub fn parse<S: AsRef<str>>(locator: S) -> Result<types::Definition, error::Error> {
    let url = {
        match Url::parse(locator.as_ref()) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::from_file_path(
                Path::new(locator.as_ref())
                    .canonicalize()
                    .map_err(|err| error::Error::PathConversionError(Some(err)))?,
            )
            .map_err(|()| error::Error::PathConversionError(None))?,
            Err(err) => return Err(err.into()),
        }
    };

    match url.scheme() {
        "file" => parser::parse(url),
        other => Err(error::Error::UnsupportedScheme(other.into())),
    }
}
