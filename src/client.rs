use log::debug;
use soapplus_wsdl::types::SoapVersion;
use std::path::{Path, PathBuf};

use crate::{
    arguments::{map_arguments, CallArguments},
    cache::{self, LocalWsdl, WsdlCache},
    debug::{DebugLog, DebugQuery},
    engine::{LiteralEngine, SoapEngine, WireTransport},
    error::Error,
    options::{ClientOptions, SoapOptions},
    transport::{self, Exchange, HttpRequest, Method, RequestHeaders, TransportOptions},
};

/// A SOAP client whose HTTP traffic goes through [`transport::execute`], with remote WSDL
/// documents cached on disk.
///
/// Request headers and transport options may be changed between calls and reset to the
/// values the client was constructed with.
pub struct Client<E = LiteralEngine> {
    options: ClientOptions,
    soap_options: SoapOptions,
    wsdl_cache_path: PathBuf,
    wsdl_tmp_file_name: Option<String>,
    wsdl: Option<LocalWsdl>,
    wire: Wire,
    engine: E,
}

/// A read-only value looked up by name through [`Client::property`].
#[derive(Debug, Clone, Copy)]
pub enum Property<'a> {
    Options(&'a ClientOptions),
    SoapOptions(&'a SoapOptions),
    DebugQueries(&'a [DebugQuery]),
    DebugResults(&'a [Exchange]),
    WsdlCachePath(&'a Path),
    WsdlTmpFileName(Option<&'a str>),
}

struct Wire {
    transport_options: TransportOptions,
    default_transport_options: TransportOptions,
    request_headers: RequestHeaders,
    default_request_headers: RequestHeaders,
    debug: bool,
    debug_log: DebugLog,
}

impl Wire {
    fn headers_for(&self, action: &str, version: SoapVersion) -> RequestHeaders {
        let mut headers = self.request_headers.clone();
        if version == SoapVersion::Soap12 {
            headers.set(
                "Content-type",
                format!(
                    "application/soap+xml;charset=\"utf-8\";action=\"{}\"",
                    action
                ),
            );
        }
        headers.set("SOAPAction", format!("\"{}\"", action));
        headers
    }
}

impl WireTransport for Wire {
    fn do_request(
        &mut self,
        request: &[u8],
        location: &str,
        action: &str,
        version: SoapVersion,
        one_way: bool,
    ) -> Result<Vec<u8>, Error> {
        let headers = self.headers_for(action, version);
        let exchange = transport::execute(
            &HttpRequest {
                method: Method::Post,
                url: location,
                headers: &headers,
                body: Some(request),
            },
            &self.transport_options,
        );

        if self.debug {
            self.debug_log.record(request, &exchange);
        }

        let problem = match &exchange.error {
            Some(error) => Some(error.clone()),
            None if one_way && exchange.is_success() => None,
            None if exchange.status != 200 => {
                Some(format!("unexpected HTTP status {}", exchange.status))
            }
            None if exchange.body.is_empty() => Some("empty response body".to_owned()),
            None => None,
        };

        match problem {
            Some(detail) => Err(Error::Transport {
                status: exchange.status,
                detail,
                body: exchange.body,
            }),
            None => Ok(exchange.body.into_bytes()),
        }
    }
}

impl Client<LiteralEngine> {
    /// Creates a client for the WSDL at `wsdl`, which may be an `http(s)` URL or a local
    /// path. Without a WSDL the `location` and `uri` options must be set.
    pub fn new(wsdl: Option<&str>, options: ClientOptions) -> Result<Self, Error> {
        Self::with_engine(wsdl, options)
    }
}

impl<E: SoapEngine> Client<E> {
    pub fn with_engine(wsdl: Option<&str>, options: ClientOptions) -> Result<Self, Error> {
        let transport_options = TransportOptions::from_client_options(&options)?;
        let cache_enabled = cache::caching_enabled(options.wsdl_cache_enabled, options.cache_wsdl)?;
        let wsdl_cache_path = cache::resolve_cache_path(options.wsdl_cache_path.as_deref())?;
        let soap_options = options.computed_soap_options();

        let local = match wsdl {
            Some(locator) if cache::is_remote(locator) => Some(
                WsdlCache::new(&wsdl_cache_path, cache_enabled)
                    .load(locator, &transport_options)?,
            ),
            _ => None,
        };

        let engine_wsdl = match &local {
            Some(local) => Some(local.path().to_string_lossy().into_owned()),
            None => wsdl.map(str::to_owned),
        };
        let engine = E::load(engine_wsdl.as_deref(), &soap_options)?;

        let request_headers = RequestHeaders::baseline();

        Ok(Self {
            wire: Wire {
                default_transport_options: transport_options.clone(),
                transport_options,
                default_request_headers: request_headers.clone(),
                request_headers,
                debug: options.debug,
                debug_log: DebugLog::new(),
            },
            wsdl_tmp_file_name: local.as_ref().and_then(LocalWsdl::file_name),
            wsdl: local,
            options,
            soap_options,
            wsdl_cache_path,
            engine,
        })
    }

    /// Invokes `operation` with a prepared argument tree, or with an XML fragment which is
    /// mapped to one first.
    pub fn call<A: Into<CallArguments>>(
        &mut self,
        operation: &str,
        arguments: A,
    ) -> Result<E::Output, Error> {
        let arguments = match arguments.into() {
            CallArguments::Tree(tree) => tree,
            CallArguments::Xml(xml) => map_arguments(&xml, operation)?,
        };

        self.engine.call(operation, &arguments, &mut self.wire)
    }
}

impl<E> Client<E> {
    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The options the engine was loaded with.
    pub fn soap_options(&self) -> &SoapOptions {
        &self.soap_options
    }

    /// The WSDL cache directory, ending with a path separator.
    pub fn wsdl_cache_path(&self) -> &Path {
        &self.wsdl_cache_path
    }

    /// File name of the local copy of a remote WSDL.
    pub fn wsdl_tmp_file_name(&self) -> Option<&str> {
        self.wsdl_tmp_file_name.as_deref()
    }

    /// Full path of the local copy of a remote WSDL.
    pub fn wsdl_path(&self) -> Option<&Path> {
        self.wsdl.as_ref().map(LocalWsdl::path)
    }

    pub fn property(&self, name: &str) -> Result<Property<'_>, Error> {
        match name {
            "options" => Ok(Property::Options(&self.options)),
            "soap_options" => Ok(Property::SoapOptions(&self.soap_options)),
            "debug_queries" => Ok(Property::DebugQueries(self.debug_queries())),
            "debug_results" => Ok(Property::DebugResults(self.debug_results())),
            "wsdl_cache_path" => Ok(Property::WsdlCachePath(&self.wsdl_cache_path)),
            "wsdl_tmp_file_name" => Ok(Property::WsdlTmpFileName(self.wsdl_tmp_file_name())),
            _ => Err(Error::UnknownProperty(name.to_owned())),
        }
    }

    pub fn debug_enabled(&self) -> bool {
        self.wire.debug
    }

    pub fn enable_debug(&mut self) {
        self.wire.debug = true;
        self.options.debug = true;
    }

    pub fn disable_debug(&mut self) {
        self.wire.debug = false;
        self.options.debug = false;
    }

    pub fn debug_queries(&self) -> &[DebugQuery] {
        self.wire.debug_log.queries()
    }

    pub fn debug_results(&self) -> &[Exchange] {
        self.wire.debug_log.results()
    }

    pub fn reset_debug_value(&mut self) {
        self.wire.debug_log.reset();
    }

    pub fn request_headers(&self) -> &RequestHeaders {
        &self.wire.request_headers
    }

    /// Replaces every request header.
    pub fn set_request_headers(&mut self, headers: RequestHeaders) -> &mut Self {
        self.wire.request_headers = headers;
        self
    }

    /// Replaces every request header with ones parsed from `Name: value` lines.
    pub fn set_request_header_lines<I, S>(&mut self, lines: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.wire.request_headers = RequestHeaders::from_lines(lines)?;
        Ok(self)
    }

    pub fn set_request_header<K: Into<String>, V: Into<String>>(
        &mut self,
        name: K,
        value: V,
    ) -> &mut Self {
        self.wire.request_headers.set(name, value);
        self
    }

    pub fn add_request_header_string(&mut self, header: &str) -> Result<&mut Self, Error> {
        self.wire.request_headers.add_line(header)?;
        Ok(self)
    }

    pub fn reset_request_headers(&mut self) -> &mut Self {
        self.wire.request_headers = self.wire.default_request_headers.clone();
        self
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.wire.transport_options
    }

    pub fn transport_options_mut(&mut self) -> &mut TransportOptions {
        &mut self.wire.transport_options
    }

    pub fn set_transport_options(&mut self, options: TransportOptions) -> &mut Self {
        self.wire.transport_options = options;
        self
    }

    pub fn reset_transport_options(&mut self) -> &mut Self {
        self.wire.transport_options = self.wire.default_transport_options.clone();
        self
    }

    /// Restores request headers and transport options to their construction values.
    pub fn reset(&mut self) -> &mut Self {
        self.reset_transport_options().reset_request_headers()
    }
}

impl<E> WireTransport for Client<E> {
    fn do_request(
        &mut self,
        request: &[u8],
        location: &str,
        action: &str,
        version: SoapVersion,
        one_way: bool,
    ) -> Result<Vec<u8>, Error> {
        self.wire
            .do_request(request, location, action, version, one_way)
    }
}

impl<E> Drop for Client<E> {
    fn drop(&mut self) {
        let Some(wsdl) = self.wsdl.take().filter(LocalWsdl::is_temporary) else {
            return;
        };

        let path = wsdl.path().to_path_buf();
        match wsdl.close() {
            Ok(()) => debug!("Removed temporary WSDL {}", path.display()),
            Err(err) => debug!("Could not remove temporary WSDL {}: {}", path.display(), err),
        }
    }
}
