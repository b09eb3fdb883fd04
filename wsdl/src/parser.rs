use quick_xml::{
    events::{BytesStart, Event},
    name::ResolveResult,
    NsReader,
};
use std::io::BufRead;
use url::Url;

use super::{
    error,
    types::{
        Binding, BindingOperation, Definition, Port, PortOperation, PortType, Service,
        SoapVersion,
    },
};

fn get_attributes<const N: usize>(
    start: &BytesStart<'_>,
    names: [&'static str; N],
) -> Result<[Option<String>; N], error::Error> {
    const INIT: Option<String> = None;
    let mut result = [INIT; N];

    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = attribute.key.as_ref();

        for (index, name) in names.iter().enumerate() {
            if key == name.as_bytes() {
                result[index] = Some(attribute.unescape_value()?.into_owned());
                break;
            }
        }
    }

    Ok(result)
}

fn required(
    value: Option<String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<String, error::Error> {
    value.ok_or(error::Error::MissingAttribute { element, attribute })
}

#[derive(Default)]
struct Parser {
    definition: Definition,
}

#[derive(Debug)]
enum ParseState {
    Definitions,

    PortType {
        name: String,
        operations: Vec<PortOperation>,
    },
    PortTypeOperation {
        name: String,
        has_output: bool,
    },

    Binding {
        name: String,
        ty: String,
        version: Option<SoapVersion>,
        style: Option<String>,
        operations: Vec<BindingOperation>,
    },
    BindingOperation {
        name: String,
        action: Option<String>,
        style: Option<String>,
    },

    Service {
        name: String,
        ports: Vec<Port>,
    },
    Port {
        name: String,
        binding: String,
        location: Option<String>,
        version: Option<SoapVersion>,
    },

    Other,
}

impl Parser {
    fn parse_xml<B: BufRead>(&mut self, mut reader: NsReader<B>) -> Result<(), error::Error> {
        let mut stack = Vec::new();
        let mut buffer = Vec::new();

        loop {
            let (namespace, event) = reader.read_resolved_event_into(&mut buffer)?;
            let version = match namespace {
                ResolveResult::Bound(namespace) => SoapVersion::from_namespace(namespace.as_ref()),
                _ => None,
            };

            match event {
                Event::Start(start) => self.handle_start(&mut stack, &start, version)?,
                Event::End(..) => self.handle_end(&mut stack),

                Event::Empty(start) => {
                    self.handle_start(&mut stack, &start, version)?;
                    self.handle_end(&mut stack);
                }

                Event::Eof => break,
                _ => (),
            }

            buffer.clear();
        }

        Ok(())
    }

    fn handle_start(
        &mut self,
        stack: &mut Vec<ParseState>,
        start: &BytesStart<'_>,
        version: Option<SoapVersion>,
    ) -> Result<(), error::Error> {
        let local_name = start.local_name();
        let local_name = local_name.as_ref();

        let mut state = stack.pop();
        let mut new_state = ParseState::Other;

        match state {
            None => {
                if local_name == b"definitions" {
                    let [namespace] = get_attributes(start, ["targetNamespace"])?;
                    self.definition.target_namespace = namespace;
                    new_state = ParseState::Definitions;
                }
            }

            Some(ParseState::Definitions) => match local_name {
                b"portType" => {
                    let [name] = get_attributes(start, ["name"])?;
                    new_state = ParseState::PortType {
                        name: required(name, "portType", "name")?,
                        operations: Vec::new(),
                    };
                }

                b"binding" => {
                    let [name, ty] = get_attributes(start, ["name", "type"])?;
                    new_state = ParseState::Binding {
                        name: required(name, "binding", "name")?,
                        ty: required(ty, "binding", "type")?,
                        version: None,
                        style: None,
                        operations: Vec::new(),
                    };
                }

                b"service" => {
                    let [name] = get_attributes(start, ["name"])?;
                    new_state = ParseState::Service {
                        name: required(name, "service", "name")?,
                        ports: Vec::new(),
                    };
                }

                _ => (),
            },

            Some(ParseState::PortType { .. }) => {
                if local_name == b"operation" {
                    let [name] = get_attributes(start, ["name"])?;
                    new_state = ParseState::PortTypeOperation {
                        name: required(name, "operation", "name")?,
                        has_output: false,
                    };
                }
            }

            Some(ParseState::PortTypeOperation {
                ref mut has_output,
                ..
            }) => {
                if local_name == b"output" {
                    *has_output = true;
                }
            }

            Some(ParseState::Binding {
                version: ref mut binding_version,
                ref mut style,
                ..
            }) => match (local_name, version) {
                (b"binding", Some(version)) => {
                    let [binding_style] = get_attributes(start, ["style"])?;
                    *binding_version = Some(version);
                    *style = binding_style;
                }

                (b"operation", None) => {
                    let [name] = get_attributes(start, ["name"])?;
                    new_state = ParseState::BindingOperation {
                        name: required(name, "operation", "name")?,
                        action: None,
                        style: None,
                    };
                }

                _ => (),
            },

            Some(ParseState::BindingOperation {
                ref mut action,
                ref mut style,
                ..
            }) => {
                if local_name == b"operation" && version.is_some() {
                    let [soap_action, operation_style] =
                        get_attributes(start, ["soapAction", "style"])?;
                    *action = soap_action;
                    *style = operation_style;
                }
            }

            Some(ParseState::Service { .. }) => {
                if local_name == b"port" {
                    let [name, binding] = get_attributes(start, ["name", "binding"])?;
                    new_state = ParseState::Port {
                        name: required(name, "port", "name")?,
                        binding: required(binding, "port", "binding")?,
                        location: None,
                        version: None,
                    };
                }
            }

            Some(ParseState::Port {
                ref mut location,
                version: ref mut port_version,
                ..
            }) => {
                if let (b"address", Some(version)) = (local_name, version) {
                    let [address] = get_attributes(start, ["location"])?;
                    *location = address;
                    *port_version = Some(version);
                }
            }

            Some(ParseState::Other) => (),
        }

        stack.extend(state);
        stack.push(new_state);
        Ok(())
    }

    fn handle_end(&mut self, stack: &mut Vec<ParseState>) {
        let state = stack.pop();
        let mut next_state = stack.pop();

        match state {
            Some(ParseState::PortType { name, operations }) => self
                .definition
                .port_types
                .push(PortType { name, operations }),

            Some(ParseState::PortTypeOperation { name, has_output }) => {
                if let Some(ParseState::PortType {
                    ref mut operations, ..
                }) = next_state
                {
                    operations.push(PortOperation { name, has_output });
                }
            }

            Some(ParseState::Binding {
                name,
                ty,
                version,
                style,
                operations,
            }) => self.definition.bindings.push(Binding {
                name,
                ty,
                version,
                style,
                operations,
            }),

            Some(ParseState::BindingOperation {
                name,
                action,
                style,
            }) => {
                if let Some(ParseState::Binding {
                    ref mut operations, ..
                }) = next_state
                {
                    operations.push(BindingOperation {
                        name,
                        action: action.unwrap_or_default(),
                        style,
                    });
                }
            }

            Some(ParseState::Service { name, ports }) => {
                self.definition.services.push(Service { name, ports })
            }

            Some(ParseState::Port {
                name,
                binding,
                location,
                version,
            }) => {
                if let Some(ParseState::Service { ref mut ports, .. }) = next_state {
                    ports.push(Port {
                        name,
                        binding,
                        location,
                        version,
                    });
                }
            }

            _ => (),
        }

        stack.extend(next_state);
    }
}

pub fn parse(url: Url) -> Result<Definition, error::Error> {
    let path = url
        .to_file_path()
        .map_err(|()| error::Error::PathConversionError(None))?;
    let reader = NsReader::from_file(path).map_err(error::Error::FileOpenError)?;

    let mut parser = Parser::default();
    parser.parse_xml(reader)?;
    Ok(parser.definition)
}

pub fn parse_str(xml: &str) -> Result<Definition, error::Error> {
    let mut parser = Parser::default();
    parser.parse_xml(NsReader::from_str(xml))?;
    Ok(parser.definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALCULATOR: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<wsdl:definitions xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:soap12="http://schemas.xmlsoap.org/wsdl/soap12/"
    xmlns:tns="http://tempuri.org/"
    xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"
    targetNamespace="http://tempuri.org/">
  <wsdl:types/>
  <wsdl:portType name="CalculatorSoap">
    <wsdl:operation name="Add">
      <wsdl:input message="tns:AddSoapIn"/>
      <wsdl:output message="tns:AddSoapOut"/>
    </wsdl:operation>
    <wsdl:operation name="Ping">
      <wsdl:input message="tns:PingSoapIn"/>
    </wsdl:operation>
  </wsdl:portType>
  <wsdl:binding name="CalculatorSoap12" type="tns:CalculatorSoap">
    <soap12:binding transport="http://schemas.xmlsoap.org/soap/http"/>
    <wsdl:operation name="Add">
      <soap12:operation soapAction="http://tempuri.org/Add" style="document"/>
    </wsdl:operation>
  </wsdl:binding>
  <wsdl:binding name="CalculatorSoap" type="tns:CalculatorSoap">
    <soap:binding transport="http://schemas.xmlsoap.org/soap/http" style="document"/>
    <wsdl:operation name="Add">
      <soap:operation soapAction="http://tempuri.org/Add" style="document"/>
      <wsdl:input><soap:body use="literal"/></wsdl:input>
      <wsdl:output><soap:body use="literal"/></wsdl:output>
    </wsdl:operation>
    <wsdl:operation name="Ping">
      <soap:operation soapAction="http://tempuri.org/Ping"/>
    </wsdl:operation>
  </wsdl:binding>
  <wsdl:service name="Calculator">
    <wsdl:port name="CalculatorSoap12" binding="tns:CalculatorSoap12">
      <soap12:address location="http://www.example.com/calculator.asmx"/>
    </wsdl:port>
    <wsdl:port name="CalculatorSoap" binding="tns:CalculatorSoap">
      <soap:address location="http://www.example.com/calculator.asmx"/>
    </wsdl:port>
  </wsdl:service>
</wsdl:definitions>"#;

    #[test]
    fn parses_bindings_and_ports() {
        let definition = parse_str(CALCULATOR).unwrap();

        assert_eq!(
            definition.target_namespace.as_deref(),
            Some("http://tempuri.org/")
        );
        assert_eq!(definition.port_types.len(), 1);
        assert_eq!(definition.bindings.len(), 2);
        assert_eq!(definition.bindings[0].version, Some(SoapVersion::Soap12));
        assert_eq!(definition.bindings[1].version, Some(SoapVersion::Soap11));
        assert_eq!(definition.bindings[1].style.as_deref(), Some("document"));
        assert_eq!(definition.services[0].ports.len(), 2);
    }

    #[test]
    fn resolves_operation_on_soap11_port() {
        let definition = parse_str(CALCULATOR).unwrap();
        let add = definition.resolve_operation("Add").unwrap();

        assert_eq!(add.action, "http://tempuri.org/Add");
        assert_eq!(add.version, SoapVersion::Soap11);
        assert_eq!(
            add.location.as_deref(),
            Some("http://www.example.com/calculator.asmx")
        );
        assert!(!add.one_way);
    }

    #[test]
    fn detects_one_way_operations() {
        let definition = parse_str(CALCULATOR).unwrap();
        assert!(definition.resolve_operation("Ping").unwrap().one_way);
        assert!(definition.resolve_operation("Divide").is_none());
    }

    #[test]
    fn reports_missing_attributes() {
        let result = parse_str(
            r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"><service/></definitions>"#,
        );

        assert!(matches!(
            result,
            Err(error::Error::MissingAttribute {
                element: "service",
                attribute: "name"
            })
        ));
    }
}
