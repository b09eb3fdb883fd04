//! A SOAP client that sends its traffic through a configurable HTTP transport and keeps
//! remote WSDL documents in an on-disk cache.
//!
//! ```no_run
//! use soapplus::{Client, ClientOptions};
//!
//! # fn main() -> Result<(), soapplus::Error> {
//! let mut client = Client::new(
//!     Some("http://www.example.com/calculator.asmx?wsdl"),
//!     ClientOptions::new(),
//! )?;
//!
//! let result = client.call("Add", "<Add><intA>1</intA><intB>2</intB></Add>")?;
//! println!("{:?}", result["AddResponse"]);
//! # Ok(())
//! # }
//! ```

pub mod arguments;
pub mod cache;
pub mod client;
pub mod debug;
pub mod engine;
pub mod error;
pub mod options;
pub mod transport;
pub mod xml;

pub use arguments::{map_arguments, Argument, ArgumentTree, CallArguments};
pub use client::{Client, Property};
pub use debug::DebugQuery;
pub use engine::{LiteralEngine, SoapEngine, WireTransport};
pub use error::{Error, ErrorKind};
pub use options::{AuthScheme, ClientOptions, Credentials, SoapOptions, WsdlCacheMode};
pub use soapplus_wsdl::types::SoapVersion;
pub use transport::{Exchange, RequestHeaders, TransportOptions};
