//! A single configurable HTTP exchange, used both to download WSDL documents and to deliver
//! SOAP envelopes.
//!
//! [`execute`] never fails: connection problems and HTTP errors are reported through
//! [`Exchange::error`] so callers can record the exchange before deciding what to do with it.

use indexmap::IndexMap;
use log::{debug, trace, warn};
use reqwest::{
    blocking::{Client as Reqwest, Request, Response},
    header::{HeaderMap, AUTHORIZATION, USER_AGENT, WWW_AUTHENTICATE},
    StatusCode,
};
use std::time::Duration;

use crate::{
    error::Error,
    options::{AuthScheme, ClientOptions, Credentials},
};

pub mod auth;

/// Request headers in the order they will be sent. Names are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders(IndexMap<String, String>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Treat HTTP statuses of 400 and above as failures.
    pub fail_on_error: bool,
    pub verify_peer: bool,
    pub verify_host: bool,
    pub credentials: Option<Credentials>,
    pub auth_scheme: Option<AuthScheme>,
    /// Keep a copy of the headers actually sent in [`Exchange::request_headers`].
    pub capture_request_headers: bool,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    pub method: Method,
    pub url: &'a str,
    pub headers: &'a RequestHeaders,
    pub body: Option<&'a [u8]>,
}

/// The outcome of one HTTP exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exchange {
    /// `0` when no response was received.
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub request_headers: Vec<(String, String)>,
    pub error: Option<String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// The headers every SOAP call starts out with.
    pub fn baseline() -> Self {
        [
            ("Content-type", "text/xml;charset=\"utf-8\""),
            ("Accept", "text/xml"),
            ("Cache-Control", "no-cache"),
            ("Pragma", "no-cache"),
        ]
        .into_iter()
        .collect()
    }

    /// Builds headers from `Name: value` lines.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut headers = Self::new();
        for line in lines {
            headers.add_line(line.as_ref())?;
        }
        Ok(headers)
    }

    /// Adds or replaces a header from a `Name: value` line.
    pub fn add_line(&mut self, line: &str) -> Result<(), Error> {
        match line.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() => {
                self.set(name.trim(), value.trim());
                Ok(())
            }
            _ => Err(Error::InvalidHeader(line.to_owned())),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.keys().position(|key| key.eq_ignore_ascii_case(name))
    }

    /// Sets a header, keeping the position of an existing header with the same name.
    pub fn set<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        let name = name.into();
        match self.position(&name) {
            Some(index) => {
                if let Some((_, existing)) = self.0.get_index_mut(index) {
                    *existing = value.into();
                }
            }
            None => {
                self.0.insert(name, value.into());
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|index| self.0.get_index(index))
            .map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name)
            .and_then(|index| self.0.shift_remove_index(index))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The headers as `Name: value` lines.
    pub fn to_lines(&self) -> Vec<String> {
        self.iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

impl From<IndexMap<String, String>> for RequestHeaders {
    fn from(map: IndexMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            fail_on_error: true,
            verify_peer: false,
            verify_host: false,
            credentials: None,
            auth_scheme: None,
            capture_request_headers: true,
            timeout: None,
            connect_timeout: None,
            user_agent: None,
        }
    }
}

impl TransportOptions {
    /// The transport configuration implied by a client's construction options.
    pub fn from_client_options(options: &ClientOptions) -> Result<Self, Error> {
        let auth_scheme = options.auth_scheme()?;
        let soap_options = options.computed_soap_options();

        Ok(Self {
            credentials: options.credentials(),
            auth_scheme,
            user_agent: soap_options.get("user_agent").cloned(),
            ..Default::default()
        })
    }
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

impl Exchange {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

fn describe(err: &dyn std::error::Error) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

fn snapshot(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn build_client(options: &TransportOptions) -> reqwest::Result<Reqwest> {
    Reqwest::builder()
        .danger_accept_invalid_certs(!options.verify_peer)
        .danger_accept_invalid_hostnames(!options.verify_host)
        .timeout(options.timeout)
        .connect_timeout(options.connect_timeout)
        .build()
}

fn build_request(
    client: &Reqwest,
    request: &HttpRequest<'_>,
    options: &TransportOptions,
    authorization: Option<&str>,
) -> reqwest::Result<Request> {
    let mut builder = client.request(request.method.into(), request.url);

    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }

    if let Some(user_agent) = &options.user_agent {
        if request.headers.get(USER_AGENT.as_str()).is_none() {
            builder = builder.header(USER_AGENT, user_agent.as_str());
        }
    }

    if let Some(body) = request.body {
        builder = builder.body(body.to_vec());
    }

    match (authorization, &options.credentials, options.auth_scheme) {
        (Some(authorization), _, _) => builder = builder.header(AUTHORIZATION, authorization),
        (None, Some(credentials), Some(AuthScheme::Basic)) => {
            builder = builder.basic_auth(&credentials.login, Some(&credentials.password))
        }
        _ => (),
    }

    builder.build()
}

fn answer_challenge(
    response: &Response,
    request: &HttpRequest<'_>,
    options: &TransportOptions,
) -> Option<String> {
    let (Some(credentials), Some(scheme)) = (&options.credentials, options.auth_scheme) else {
        return None;
    };
    if scheme == AuthScheme::Basic {
        return None;
    }

    let challenges: Vec<_> = response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(auth::parse_challenges)
        .collect();

    let uri = &response.url()[url::Position::BeforePath..];
    let authorization = auth::authorization(
        &challenges,
        scheme,
        credentials,
        request.method.as_str(),
        uri,
    );

    if authorization.is_none() {
        warn!(
            "No usable authentication challenge for {:?} from {}",
            scheme, request.url
        );
    }

    authorization
}

fn perform(
    request: &HttpRequest<'_>,
    options: &TransportOptions,
    exchange: &mut Exchange,
) -> reqwest::Result<()> {
    let client = build_client(options)?;

    let outgoing = build_request(&client, request, options, None)?;
    if options.capture_request_headers {
        exchange.request_headers = snapshot(outgoing.headers());
    }

    let mut response = client.execute(outgoing)?;

    if response.status() == StatusCode::UNAUTHORIZED {
        if let Some(authorization) = answer_challenge(&response, request, options) {
            debug!("Retrying {} {} with credentials", request.method.as_str(), request.url);

            let retry = build_request(&client, request, options, Some(&authorization))?;
            if options.capture_request_headers {
                exchange.request_headers = snapshot(retry.headers());
            }
            response = client.execute(retry)?;
        }
    }

    exchange.status = response.status().as_u16();
    exchange.headers = snapshot(response.headers());
    exchange.body = response.text()?;

    Ok(())
}

/// Performs one HTTP exchange.
pub fn execute(request: &HttpRequest<'_>, options: &TransportOptions) -> Exchange {
    trace!(
        "{} {} ({} byte body)",
        request.method.as_str(),
        request.url,
        request.body.map_or(0, <[u8]>::len)
    );

    let mut exchange = Exchange::default();

    if let Err(err) = perform(request, options, &mut exchange) {
        exchange.error = Some(describe(&err));
    } else if options.fail_on_error && exchange.status >= 400 {
        exchange.error = Some(format!(
            "The requested URL returned error: {}",
            exchange.status
        ));
    }

    trace!(
        "{} {} -> {} {:?}: {}",
        request.method.as_str(),
        request.url,
        exchange.status,
        exchange.error,
        exchange.body
    );

    exchange
}
