use log::debug;
use soapplus_wsdl::types::{Definition, SoapVersion};

use super::{envelope, SoapEngine, WireTransport};
use crate::{
    arguments::ArgumentTree,
    error::Error,
    options::SoapOptions,
};

/// A document/literal engine driven by a WSDL definition, or by the `location` and `uri`
/// options when there is no WSDL.
#[derive(Debug, Clone)]
pub struct LiteralEngine {
    definition: Option<Definition>,
    location: Option<String>,
    namespace: Option<String>,
    version: SoapVersion,
}

struct Target {
    location: String,
    action: String,
    version: SoapVersion,
    one_way: bool,
}

fn requested_version(options: &SoapOptions) -> SoapVersion {
    match options.get("soap_version").map(String::as_str) {
        Some("2" | "1.2" | "soap12") => SoapVersion::Soap12,
        _ => SoapVersion::Soap11,
    }
}

impl LiteralEngine {
    pub fn definition(&self) -> Option<&Definition> {
        self.definition.as_ref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn target(&self, operation: &str) -> Result<Target, Error> {
        let Some(definition) = &self.definition else {
            let (Some(location), Some(namespace)) = (&self.location, &self.namespace) else {
                return Err(Error::MissingSoapOption("location"));
            };

            return Ok(Target {
                location: location.clone(),
                action: format!("{}#{}", namespace, operation),
                version: self.version,
                one_way: false,
            });
        };

        let resolved = definition
            .resolve_operation(operation)
            .ok_or_else(|| Error::UnknownOperation(operation.to_owned()))?;

        let location = self
            .location
            .clone()
            .or(resolved.location)
            .ok_or(Error::MissingSoapOption("location"))?;

        Ok(Target {
            location,
            action: resolved.action,
            version: resolved.version,
            one_way: resolved.one_way,
        })
    }
}

impl SoapEngine for LiteralEngine {
    type Output = ArgumentTree;

    fn load(wsdl: Option<&str>, options: &SoapOptions) -> Result<Self, Error> {
        let location = options.get("location").cloned();
        let uri = options.get("uri").cloned();

        let Some(wsdl) = wsdl else {
            if location.is_none() {
                return Err(Error::MissingSoapOption("location"));
            }
            if uri.is_none() {
                return Err(Error::MissingSoapOption("uri"));
            }

            return Ok(Self {
                definition: None,
                location,
                namespace: uri,
                version: requested_version(options),
            });
        };

        let definition = soapplus_wsdl::parse(wsdl)?;
        debug!(
            "Loaded WSDL {} ({} bindings, {} services)",
            wsdl,
            definition.bindings.len(),
            definition.services.len()
        );

        let namespace = uri.or_else(|| definition.target_namespace.clone());

        Ok(Self {
            definition: Some(definition),
            location,
            namespace,
            version: requested_version(options),
        })
    }

    fn call(
        &self,
        operation: &str,
        arguments: &ArgumentTree,
        transport: &mut dyn WireTransport,
    ) -> Result<Self::Output, Error> {
        let target = self.target(operation)?;
        let request = envelope::request(arguments, self.namespace(), target.version)?;

        let response = transport.do_request(
            &request,
            &target.location,
            &target.action,
            target.version,
            target.one_way,
        )?;

        if target.one_way && response.iter().all(u8::is_ascii_whitespace) {
            return Ok(ArgumentTree::new());
        }

        envelope::response(&response)
    }
}
