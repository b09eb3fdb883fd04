use quick_xml::events::BytesStart;
use soapplus_wsdl::types::SoapVersion;
use std::mem;

use crate::{
    arguments::{Argument, ArgumentTree},
    error::Error,
    xml::{self, DocumentWriter},
};

const ENVELOPE: &str = "soapenv:Envelope";
const BODY: &str = "soapenv:Body";

/// Serializes a document/literal request. Every top-level argument becomes one body part,
/// qualified with `namespace` when there is one.
pub fn request(
    arguments: &ArgumentTree,
    namespace: Option<&str>,
    version: SoapVersion,
) -> Result<Vec<u8>, Error> {
    let mut writer = DocumentWriter::new();
    writer.declaration()?;

    let mut envelope = BytesStart::new(ENVELOPE);
    envelope.push_attribute(("xmlns:soapenv", version.envelope_namespace()));
    writer.start(envelope)?;
    writer.start(BytesStart::new(BODY))?;

    writer.arguments(arguments, namespace)?;

    writer.end(BODY)?;
    writer.end(ENVELOPE)?;

    Ok(writer.into_inner())
}

fn text_of(fault: &Argument, path: &[&str]) -> String {
    path.iter()
        .try_fold(fault, |current, name| current.get(name))
        .and_then(Argument::as_value)
        .unwrap_or_default()
        .to_owned()
}

fn fault(fault: &Argument) -> Error {
    let (code, message) = if fault.get("faultcode").is_some() {
        (
            text_of(fault, &["faultcode"]),
            text_of(fault, &["faultstring"]),
        )
    } else {
        (
            text_of(fault, &["Code", "Value"]),
            text_of(fault, &["Reason", "Text"]),
        )
    };

    Error::Fault { code, message }
}

/// Decodes the body parts of a response envelope, raising SOAP faults as errors.
pub fn response(body: &[u8]) -> Result<ArgumentTree, Error> {
    let text =
        std::str::from_utf8(body).map_err(|err| Error::MalformedResponse(err.to_string()))?;
    let (name, mut envelope) = xml::read_document(text.trim())
        .map_err(|err| Error::MalformedResponse(err.to_string()))?;

    if name != "Envelope" {
        return Err(Error::MalformedResponse(format!(
            "expected Envelope, found {}",
            name
        )));
    }

    match envelope.get_mut("Body") {
        Some(Argument::Tree(parts)) => {
            if let Some(found) = parts.get("Fault") {
                return Err(fault(found));
            }
            Ok(mem::take(parts))
        }
        Some(_) => Ok(ArgumentTree::new()),
        None => Err(Error::MalformedResponse("missing Body".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{arguments::map_arguments, error::ErrorKind};

    fn add_arguments() -> ArgumentTree {
        let mut add = ArgumentTree::new();
        add.insert("intA".into(), "1".into());
        add.insert("intB".into(), "2".into());

        let mut arguments = ArgumentTree::new();
        arguments.insert("Add".into(), add.into());
        arguments
    }

    fn request_of(arguments: &ArgumentTree) -> Vec<u8> {
        request(arguments, None, SoapVersion::Soap11).unwrap()
    }

    #[test]
    fn serializes_literal_requests() {
        let request = request(&add_arguments(), Some("http://tempuri.org/"), SoapVersion::Soap11)
            .unwrap();

        assert_eq!(
            String::from_utf8(request).unwrap(),
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">"#,
                r#"<soapenv:Body><Add xmlns="http://tempuri.org/"><intA>1</intA><intB>2</intB></Add>"#,
                r#"</soapenv:Body></soapenv:Envelope>"#
            )
        );
    }

    #[test]
    fn inserts_any_content_verbatim() {
        let mut inner = ArgumentTree::new();
        inner.insert("any".into(), Argument::Xml(r#"<Foo a="1">x &amp; y</Foo>"#.into()));
        let mut arguments = ArgumentTree::new();
        arguments.insert("Op".into(), inner.into());

        let request =
            String::from_utf8(request(&arguments, None, SoapVersion::Soap12).unwrap()).unwrap();

        assert!(request.contains("http://www.w3.org/2003/05/soap-envelope"));
        assert!(request.contains(r#"<Op><Foo a="1">x &amp; y</Foo></Op>"#));
    }

    #[test]
    fn sends_mapped_any_markup_unchanged() {
        let markup = "<p>Hello <b>x</b> world<!-- keep --></p>";
        let mut inner = ArgumentTree::new();
        inner.insert("any".into(), Argument::Xml(markup.into()));
        let mut arguments = ArgumentTree::new();
        arguments.insert("Op".into(), inner.into());

        let request =
            String::from_utf8(request(&arguments, None, SoapVersion::Soap11).unwrap()).unwrap();
        assert!(request.contains(&format!("<Op>{}</Op>", markup)));

        let mapped = map_arguments("<Op><any><p>Hello <b>x</b> world</p></any></Op>", "Op")
            .unwrap();
        let request = String::from_utf8(request_of(&mapped)).unwrap();
        assert!(request
            .contains("<soapenv:Body><Op><p>Hello <b>x</b> world</p></Op></soapenv:Body>"));
    }

    #[test]
    fn decodes_deeply_nested_responses() {
        const DEPTH: usize = 10_000;
        let envelope = format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><R>{}x{}</R></s:Body></s:Envelope>"#,
            "<a>".repeat(DEPTH),
            "</a>".repeat(DEPTH)
        );

        let decoded = response(envelope.as_bytes()).unwrap();

        let mut depth = 0;
        let mut current = &decoded["R"];
        while let Some(next) = current.get("a") {
            current = next;
            depth += 1;
        }
        assert_eq!(depth, DEPTH);

        let request = String::from_utf8(request_of(&decoded)).unwrap();
        assert!(request.ends_with(&format!(
            "<R>{}x{}</R></soapenv:Body></soapenv:Envelope>",
            "<a>".repeat(DEPTH),
            "</a>".repeat(DEPTH)
        )));
    }

    #[test]
    fn decodes_response_bodies() {
        let decoded = response(
            br#"<?xml version="1.0" encoding="utf-8"?>
            <soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
              <soap:Body>
                <AddResponse xmlns="http://tempuri.org/"><AddResult>3</AddResult></AddResponse>
              </soap:Body>
            </soap:Envelope>"#,
        )
        .unwrap();

        assert_eq!(
            decoded["AddResponse"].get("AddResult"),
            Some(&Argument::Value("3".into()))
        );
    }

    #[test]
    fn raises_soap11_and_soap12_faults() {
        let soap11 = response(
            br#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault>
                <faultcode>s:Client</faultcode><faultstring>Bad input</faultstring>
            </s:Fault></s:Body></s:Envelope>"#,
        )
        .unwrap_err();
        assert!(matches!(
            &soap11,
            Error::Fault { code, message } if code == "s:Client" && message == "Bad input"
        ));
        assert_eq!(soap11.kind(), ErrorKind::Engine);

        let soap12 = response(
            br#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body><env:Fault>
                <env:Code><env:Value>env:Sender</env:Value></env:Code>
                <env:Reason><env:Text xml:lang="en">Nope</env:Text></env:Reason>
            </env:Fault></env:Body></env:Envelope>"#,
        )
        .unwrap_err();
        assert!(matches!(
            soap12,
            Error::Fault { code, message } if code == "env:Sender" && message == "Nope"
        ));
    }

    #[test]
    fn rejects_non_envelopes() {
        assert!(matches!(
            response(b"<html>oops</html>"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(response(b"not xml"), Err(Error::MalformedResponse(_))));
    }
}
