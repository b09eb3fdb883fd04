use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::{fmt, path::PathBuf, str::FromStr};

use crate::error::Error;

pub const DEFAULT_USER_AGENT: &str = "SoapClientPlus";

/// Options handed through to the SOAP engine, in the order they were given.
pub type SoapOptions = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Ntlm,
    Digest,
    Any,
    AnySafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsdlCacheMode {
    None,
    Disk,
    Memory,
    Both,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

/// Construction options for [`crate::Client`].
///
/// Every key other than the ones named here is collected into `soap_options` and forwarded
/// to the engine unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub wsdl_cache_path: Option<PathBuf>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub auth_type: Option<String>,
    pub debug: bool,
    pub cache_wsdl: Option<WsdlCacheMode>,
    /// Process default for WSDL caching, used when `cache_wsdl` is unset.
    pub wsdl_cache_enabled: bool,
    #[serde(flatten, deserialize_with = "deserialize_soap_options")]
    pub soap_options: SoapOptions,
}

impl FromStr for AuthScheme {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "ntlm" => Ok(AuthScheme::Ntlm),
            "digest" => Ok(AuthScheme::Digest),
            "any" => Ok(AuthScheme::Any),
            "anysafe" => Ok(AuthScheme::AnySafe),
            _ => Err(Error::UnknownAuthType(value.to_owned())),
        }
    }
}

impl FromStr for WsdlCacheMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "0" | "none" | "wsdl_cache_none" => Ok(WsdlCacheMode::None),
            "1" | "disk" | "wsdl_cache_disk" => Ok(WsdlCacheMode::Disk),
            "2" | "memory" | "wsdl_cache_memory" => Ok(WsdlCacheMode::Memory),
            "3" | "both" | "wsdl_cache_both" => Ok(WsdlCacheMode::Both),
            _ => Err(Error::UnknownCacheMode(value.to_owned())),
        }
    }
}

impl fmt::Display for WsdlCacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WsdlCacheMode::None => "WSDL_CACHE_NONE",
            WsdlCacheMode::Disk => "WSDL_CACHE_DISK",
            WsdlCacheMode::Memory => "WSDL_CACHE_MEMORY",
            WsdlCacheMode::Both => "WSDL_CACHE_BOTH",
        })
    }
}

impl<'de> Deserialize<'de> for WsdlCacheMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Number(number) => number.to_string(),
            Raw::Text(text) => text,
        };

        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Pass-through options may be given as numbers or booleans; the engine sees them as text,
/// with booleans as `1` and `0`.
fn deserialize_soap_options<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<SoapOptions, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Text(String),
    }

    Ok(IndexMap::<String, Scalar>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Scalar::Bool(flag) => if flag { "1" } else { "0" }.to_owned(),
                Scalar::Unsigned(number) => number.to_string(),
                Scalar::Signed(number) => number.to_string(),
                Scalar::Float(number) => number.to_string(),
                Scalar::Text(text) => text,
            };
            (key, value)
        })
        .collect())
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            wsdl_cache_path: None,
            login: None,
            password: None,
            auth_type: None,
            debug: false,
            cache_wsdl: None,
            wsdl_cache_enabled: true,
            soap_options: SoapOptions::new(),
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_soap_option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.soap_options.insert(key.into(), value.into());
        self
    }

    /// Login and password, only when both are present.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.login, &self.password) {
            (Some(login), Some(password)) => Some(Credentials {
                login: login.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    /// The authentication scheme to use. `auth_type` is validated even without credentials,
    /// but a scheme is only returned when credentials are present, defaulting to `any`.
    pub fn auth_scheme(&self) -> Result<Option<AuthScheme>, Error> {
        let requested = self
            .auth_type
            .as_deref()
            .map(str::parse::<AuthScheme>)
            .transpose()?;

        Ok(self
            .credentials()
            .map(|_| requested.unwrap_or(AuthScheme::Any)))
    }

    /// The options seen by the engine, with the fixed entries this client relies on.
    pub fn computed_soap_options(&self) -> SoapOptions {
        let mut options = self.soap_options.clone();
        options.insert("exceptions".into(), "1".into());
        options.insert("trace".into(), "1".into());
        options.insert("cache_wsdl".into(), "0".into());
        options
            .entry("user_agent".into())
            .or_insert_with(|| DEFAULT_USER_AGENT.into());
        options
    }
}
