//! Streaming conversion between XML documents and [`Argument`] trees.
//!
//! Both directions keep their own explicit stack of open elements, so document depth is
//! bounded by memory rather than by the call stack. There is no limit on size or depth.

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use std::mem;
use thiserror::Error;

use crate::{
    arguments::{Argument, ArgumentTree, ANY_ELEMENT},
    error::Error,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid UTF-8 in element name: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("document is empty")]
    Empty,

    #[error("extra content at the end of the document")]
    ExtraContent,

    #[error("premature end of data in tag {0}")]
    Unclosed(String),

    #[error("could not locate the markup of an element inside {0}")]
    Span(String),
}

enum Frame {
    Element {
        name: String,
        tree: ArgumentTree,
        text: String,
        has_children: bool,
    },
    /// An `any` element. Its first child is kept as the exact input it was read from.
    Any {
        text: String,
        depth: usize,
        first_start: Option<usize>,
        captured: Option<String>,
    },
}

impl Frame {
    fn push_text(&mut self, text: &str) {
        match self {
            Frame::Element { text: buffer, .. } => buffer.push_str(text),
            Frame::Any {
                text: buffer,
                depth: 0,
                ..
            } => buffer.push_str(text),
            Frame::Any { .. } => (),
        }
    }

    fn wants_text(&self) -> bool {
        !matches!(self, Frame::Any { depth, .. } if *depth > 0)
    }
}

struct DocumentReader<'a> {
    input: &'a str,
    stack: Vec<Frame>,
    root: Option<(String, Argument)>,
}

impl<'a> DocumentReader<'a> {
    fn open(&mut self, start: &BytesStart<'_>, tag_end: usize) -> Result<(), ParseError> {
        let local_name = start.local_name();
        let name = std::str::from_utf8(local_name.as_ref())?;

        match self.stack.last_mut() {
            Some(Frame::Any {
                depth, first_start, ..
            }) => {
                if *depth == 0 && first_start.is_none() {
                    let tag_start = self
                        .input
                        .get(..tag_end)
                        .and_then(|before| before.rfind('<'))
                        .ok_or_else(|| ParseError::Span(ANY_ELEMENT.into()))?;
                    *first_start = Some(tag_start);
                }
                *depth += 1;
                return Ok(());
            }

            Some(Frame::Element {
                tree, has_children, ..
            }) => {
                *has_children = true;

                if name == ANY_ELEMENT {
                    self.stack.push(Frame::Any {
                        text: String::new(),
                        depth: 0,
                        first_start: None,
                        captured: None,
                    });
                    return Ok(());
                }

                // Repeated siblings keep filling the tree the first one started.
                let inherited = match tree.get_mut(name) {
                    Some(Argument::Tree(existing)) => mem::take(existing),
                    _ => ArgumentTree::new(),
                };

                self.stack.push(Frame::Element {
                    name: name.to_owned(),
                    tree: inherited,
                    text: String::new(),
                    has_children: false,
                });
            }

            None if self.root.is_some() => return Err(ParseError::ExtraContent),

            None => self.stack.push(Frame::Element {
                name: name.to_owned(),
                tree: ArgumentTree::new(),
                text: String::new(),
                has_children: false,
            }),
        }

        Ok(())
    }

    fn close(&mut self, tag_end: usize) -> Result<(), ParseError> {
        if let Some(Frame::Any {
            depth,
            first_start,
            captured,
            ..
        }) = self.stack.last_mut()
        {
            if *depth > 0 {
                *depth -= 1;
                if *depth == 0 && captured.is_none() {
                    if let Some(start) = *first_start {
                        let raw = self
                            .input
                            .get(start..tag_end)
                            .ok_or_else(|| ParseError::Span(ANY_ELEMENT.into()))?;
                        *captured = Some(raw.to_owned());
                    }
                }
                return Ok(());
            }
        }

        let (name, argument) = match self.stack.pop() {
            Some(Frame::Element {
                name,
                tree,
                text,
                has_children,
            }) => {
                let argument = if has_children {
                    Argument::Tree(tree)
                } else {
                    Argument::Value(text.trim().to_owned())
                };
                (name, argument)
            }

            Some(Frame::Any { text, captured, .. }) => {
                let argument = match captured {
                    Some(raw) => Argument::Xml(raw),
                    None => Argument::Value(text.trim().to_owned()),
                };
                (ANY_ELEMENT.to_owned(), argument)
            }

            None => return Ok(()),
        };

        match self.stack.last_mut() {
            Some(Frame::Element { tree, .. }) => {
                tree.insert(name, argument);
            }
            Some(Frame::Any { .. }) => (),
            None => self.root = Some((name, argument)),
        }

        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), ParseError> {
        match self.stack.last_mut() {
            Some(frame) => frame.push_text(text),
            None if text.trim().is_empty() => (),
            None => return Err(ParseError::ExtraContent),
        }
        Ok(())
    }

    fn wants_text(&self) -> bool {
        self.stack.last().map_or(true, Frame::wants_text)
    }
}

/// Reads a document into its root element name and mapped content.
///
/// An element without children becomes its trimmed text, an `any` element with children
/// becomes the unmodified markup of its first child, and any other element becomes a tree
/// keyed by the local names of its children. Same-named siblings fill one tree and the last
/// value wins.
pub fn read_document(input: &str) -> Result<(String, Argument), ParseError> {
    let mut reader = Reader::from_str(input);
    let mut document = DocumentReader {
        input,
        stack: Vec::new(),
        root: None,
    };

    loop {
        let event = reader.read_event()?;
        let position = reader.buffer_position() as usize;

        match event {
            Event::Start(start) => document.open(&start, position)?,

            Event::Empty(start) => {
                document.open(&start, position)?;
                document.close(position)?;
            }

            Event::End(..) => document.close(position)?,

            Event::Text(text) => {
                if document.wants_text() {
                    document.text(&text.unescape()?)?;
                }
            }

            Event::CData(data) => {
                if document.wants_text() {
                    document.text(std::str::from_utf8(&data.into_inner())?)?;
                }
            }

            Event::Eof => break,
            _ => (),
        }
    }

    if let Some(frame) = document.stack.first() {
        let name = match frame {
            Frame::Element { name, .. } => name.clone(),
            Frame::Any { .. } => ANY_ELEMENT.to_owned(),
        };
        return Err(ParseError::Unclosed(name));
    }

    document.root.ok_or(ParseError::Empty)
}

/// Writes events to an in-memory document.
pub struct DocumentWriter {
    writer: Writer<Vec<u8>>,
}

fn serialization(err: impl std::fmt::Display) -> Error {
    Error::Serialization(err.to_string())
}

fn entry(name: &str, namespace: Option<&str>) -> BytesStart<'static> {
    let mut start = BytesStart::new(name.to_owned());
    if let Some(namespace) = namespace {
        start.push_attribute(("xmlns", namespace));
    }
    start
}

impl DocumentWriter {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    pub fn declaration(&mut self) -> Result<(), Error> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub fn event(&mut self, event: Event<'_>) -> Result<(), Error> {
        self.writer.write_event(event).map_err(serialization)
    }

    pub fn start(&mut self, start: BytesStart<'_>) -> Result<(), Error> {
        self.event(Event::Start(start))
    }

    pub fn end(&mut self, name: &str) -> Result<(), Error> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    /// Writes already serialized markup unchanged.
    pub fn raw(&mut self, markup: &str) -> Result<(), Error> {
        self.event(Event::Text(BytesText::from_escaped(markup)))
    }

    /// Writes every entry of `tree` as an element. Top-level elements are qualified with
    /// `namespace`; `any` entries holding markup are written in place of the `any` element.
    pub fn arguments(
        &mut self,
        tree: &ArgumentTree,
        namespace: Option<&str>,
    ) -> Result<(), Error> {
        let mut open: Vec<(Option<&str>, indexmap::map::Iter<'_, String, Argument>)> =
            vec![(None, tree.iter())];

        loop {
            let next = match open.last_mut() {
                Some((_, entries)) => entries.next(),
                None => break,
            };
            let qualifier = if open.len() == 1 { namespace } else { None };

            match next {
                Some((name, Argument::Xml(markup))) if name == ANY_ELEMENT => self.raw(markup)?,

                Some((name, Argument::Xml(markup))) => {
                    let start = entry(name, qualifier);
                    self.start(start)?;
                    self.raw(markup)?;
                    self.end(name)?;
                }

                Some((name, Argument::Value(value))) if value.is_empty() => {
                    let start = entry(name, qualifier);
                    self.event(Event::Empty(start))?;
                }

                Some((name, Argument::Value(value))) => {
                    let start = entry(name, qualifier);
                    self.start(start)?;
                    self.event(Event::Text(BytesText::new(value)))?;
                    self.end(name)?;
                }

                Some((name, Argument::Tree(children))) => {
                    let start = entry(name, qualifier);
                    self.start(start)?;
                    open.push((Some(name.as_str()), children.iter()));
                }

                None => {
                    if let Some((Some(name), _)) = open.pop() {
                        self.end(name)?;
                    }
                }
            }
        }

        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &str) -> Argument {
        read_document(input).unwrap().1
    }

    #[test]
    fn maps_leaves_and_drops_whitespace_between_elements() {
        let (name, root) = read_document("<a>\n  <b> x &amp; y </b>\n  <c/>\n</a>").unwrap();

        assert_eq!(name, "a");
        assert_eq!(root.get("b"), Some(&Argument::Value("x & y".into())));
        assert_eq!(root.get("c"), Some(&Argument::Value(String::new())));
    }

    #[test]
    fn keys_elements_by_local_name() {
        let (name, root) = read_document(
            r#"<s:Envelope xmlns:s="urn:s"><s:Body a="1"><m:Item xmlns:m="urn:m">1</m:Item></s:Body></s:Envelope>"#,
        )
        .unwrap();

        assert_eq!(name, "Envelope");
        assert_eq!(
            root.get("Body").and_then(|body| body.get("Item")),
            Some(&Argument::Value("1".into()))
        );
    }

    #[test]
    fn keeps_any_markup_exactly_as_written() {
        let root = read(
            "<Op><any>\n  <p>Hello <b>x</b> world<!-- keep --><?pi data?></p>\n  <q/></any></Op>",
        );
        assert_eq!(
            root.get("any"),
            Some(&Argument::Xml(
                "<p>Hello <b>x</b> world<!-- keep --><?pi data?></p>".into()
            ))
        );

        let root = read("<Op><any><Foo a=\"1 > 0\">  a  &lt; b  </Foo></any></Op>");
        assert_eq!(
            root.get("any").and_then(Argument::as_xml),
            Some("<Foo a=\"1 > 0\">  a  &lt; b  </Foo>")
        );

        let root = read("<Op><any><![CDATA[<not markup>]]></any></Op>");
        assert_eq!(root.get("any"), Some(&Argument::Value("<not markup>".into())));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(read_document("<a><b></a>"), Err(ParseError::Xml(_))));
        assert!(read_document("<a>").is_err());
        assert!(read_document("<a><any><b></any></a>").is_err());
        assert!(matches!(read_document("<a/><b/>"), Err(ParseError::ExtraContent)));
        assert!(matches!(read_document("<a/>text"), Err(ParseError::ExtraContent)));
        assert!(matches!(read_document("   "), Err(ParseError::Empty)));
    }

    #[test]
    fn writes_trees_with_markup_passed_through() {
        let mut inner = ArgumentTree::new();
        inner.insert("Name".into(), "Ada & Grace".into());
        inner.insert("Empty".into(), "".into());
        inner.insert(
            "any".into(),
            Argument::Xml("<p>Hello <b>x</b> world<!-- keep --></p>".into()),
        );
        inner.insert("Wrapped".into(), Argument::Xml("<x/>".into()));
        let mut tree = ArgumentTree::new();
        tree.insert("Op".into(), inner.into());

        let mut writer = DocumentWriter::new();
        writer.arguments(&tree, Some("urn:ops")).unwrap();

        assert_eq!(
            String::from_utf8(writer.into_inner()).unwrap(),
            concat!(
                r#"<Op xmlns="urn:ops"><Name>Ada &amp; Grace</Name><Empty/>"#,
                r#"<p>Hello <b>x</b> world<!-- keep --></p><Wrapped><x/></Wrapped></Op>"#
            )
        );
    }

    #[test]
    fn handles_deeply_nested_documents() {
        const DEPTH: usize = 10_000;
        let document = format!("{}x{}", "<a>".repeat(DEPTH), "</a>".repeat(DEPTH));

        let (_, root) = read_document(&document).unwrap();

        let mut depth = 1;
        let mut current = &root;
        while let Some(next) = current.get("a") {
            current = next;
            depth += 1;
        }
        assert_eq!(depth, DEPTH);
        assert_eq!(current.as_value(), Some("x"));

        let mut tree = ArgumentTree::new();
        tree.insert("a".into(), root);
        let mut writer = DocumentWriter::new();
        writer.arguments(&tree, None).unwrap();
        assert_eq!(String::from_utf8(writer.into_inner()).unwrap(), document);
    }
}
