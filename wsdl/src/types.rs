use std::fmt;

pub const WSDL_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const SOAP11_BINDING_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const SOAP12_BINDING_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

#[derive(Debug, Clone)]
pub struct PortOperation {
    pub name: String,
    pub has_output: bool,
}

#[derive(Debug, Clone)]
pub struct PortType {
    pub name: String,
    pub operations: Vec<PortOperation>,
}

#[derive(Debug, Clone)]
pub struct BindingOperation {
    pub name: String,
    pub action: String,
    pub style: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub ty: String,
    pub version: Option<SoapVersion>,
    pub style: Option<String>,
    pub operations: Vec<BindingOperation>,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    pub binding: String,
    pub location: Option<String>,
    pub version: Option<SoapVersion>,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub ports: Vec<Port>,
}

#[derive(Default, Debug, Clone)]
pub struct Definition {
    pub target_namespace: Option<String>,
    pub port_types: Vec<PortType>,
    pub bindings: Vec<Binding>,
    pub services: Vec<Service>,
}

/// Everything needed to put one operation on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOperation {
    pub name: String,
    pub action: String,
    pub location: Option<String>,
    pub version: SoapVersion,
    pub one_way: bool,
}

impl SoapVersion {
    pub fn from_namespace(namespace: &[u8]) -> Option<Self> {
        if namespace == SOAP11_BINDING_NAMESPACE.as_bytes() {
            Some(SoapVersion::Soap11)
        } else if namespace == SOAP12_BINDING_NAMESPACE.as_bytes() {
            Some(SoapVersion::Soap12)
        } else {
            None
        }
    }

    pub fn envelope_namespace(self) -> &'static str {
        match self {
            SoapVersion::Soap11 => "http://schemas.xmlsoap.org/soap/envelope/",
            SoapVersion::Soap12 => "http://www.w3.org/2003/05/soap-envelope",
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::Soap11 => f.write_str("SOAP 1.1"),
            SoapVersion::Soap12 => f.write_str("SOAP 1.2"),
        }
    }
}

/// Strips a `prefix:` from a qualified reference such as `tns:CalculatorSoap`.
pub fn local_name(prefixed_name: &str) -> &str {
    match prefixed_name.split_once(':') {
        Some((_, local)) => local,
        None => prefixed_name,
    }
}

impl Definition {
    /// The port a client should talk to: the first SOAP 1.1 port, else the first SOAP port.
    pub fn preferred_port(&self) -> Option<&Port> {
        let ports = || {
            self.services
                .iter()
                .flat_map(|service| service.ports.iter())
                .filter(|port| port.version.is_some())
        };

        ports()
            .find(|port| port.version == Some(SoapVersion::Soap11))
            .or_else(|| ports().next())
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        let name = local_name(name);
        self.bindings.iter().find(|binding| binding.name == name)
    }

    pub fn port_type(&self, name: &str) -> Option<&PortType> {
        let name = local_name(name);
        self.port_types.iter().find(|port_type| port_type.name == name)
    }

    /// Resolves `operation` against the preferred port, falling back to any SOAP binding
    /// that declares it.
    pub fn resolve_operation(&self, operation: &str) -> Option<ResolvedOperation> {
        let port = self.preferred_port();

        let binding = port
            .and_then(|port| self.binding(&port.binding))
            .filter(|binding| binding.operations.iter().any(|op| op.name == operation))
            .or_else(|| {
                self.bindings.iter().find(|binding| {
                    binding.version.is_some()
                        && binding.operations.iter().any(|op| op.name == operation)
                })
            })?;

        let binding_operation = binding
            .operations
            .iter()
            .find(|op| op.name == operation)?;

        let one_way = self
            .port_type(&binding.ty)
            .and_then(|port_type| {
                port_type
                    .operations
                    .iter()
                    .find(|op| op.name == operation)
            })
            .map(|op| !op.has_output)
            .unwrap_or(false);

        let location = port
            .filter(|port| local_name(&port.binding) == binding.name)
            .and_then(|port| port.location.clone())
            .or_else(|| {
                self.services
                    .iter()
                    .flat_map(|service| service.ports.iter())
                    .find(|port| local_name(&port.binding) == binding.name)
                    .and_then(|port| port.location.clone())
            });

        Some(ResolvedOperation {
            name: binding_operation.name.clone(),
            action: binding_operation.action.clone(),
            location,
            version: binding.version.unwrap_or(SoapVersion::Soap11),
            one_way,
        })
    }
}
