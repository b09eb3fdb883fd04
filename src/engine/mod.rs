//! The boundary between the client and whatever turns calls into SOAP envelopes.
//!
//! An engine serializes a call and hands the bytes to a [`WireTransport`], which owns the
//! network. [`LiteralEngine`] is the engine used unless another one is supplied.

use soapplus_wsdl::types::SoapVersion;

use crate::{arguments::ArgumentTree, error::Error, options::SoapOptions};

pub mod envelope;
mod literal;

pub use literal::LiteralEngine;

/// Delivers serialized requests.
pub trait WireTransport {
    /// Sends `request` to `location` and returns the raw response body. One-way requests may
    /// return an empty body.
    fn do_request(
        &mut self,
        request: &[u8],
        location: &str,
        action: &str,
        version: SoapVersion,
        one_way: bool,
    ) -> Result<Vec<u8>, Error>;
}

pub trait SoapEngine: Sized {
    type Output;

    /// Loads the engine from a local WSDL file, or from `options` alone when there is none.
    fn load(wsdl: Option<&str>, options: &SoapOptions) -> Result<Self, Error>;

    fn call(
        &self,
        operation: &str,
        arguments: &ArgumentTree,
        transport: &mut dyn WireTransport,
    ) -> Result<Self::Output, Error>;
}
