//! Call arguments, and the conversion of ad-hoc XML fragments into them.
//!
//! Mapping rules for each element of the fragment:
//!
//! * an element without children becomes its trimmed text,
//! * an element named `any` with children becomes the markup of its first child, exactly as
//!   it was written,
//! * any other element becomes a nested tree of its children.
//!
//! Attributes are ignored and elements are keyed by their local name. Siblings sharing a name
//! are merged into one entry: nested trees are merged recursively and a later value replaces
//! an earlier one, so repeated elements cannot be expressed as lists.

use indexmap::IndexMap;
use std::mem;

use crate::{error::Error, xml};

pub const ANY_ELEMENT: &str = "any";

pub type ArgumentTree = IndexMap<String, Argument>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Value(String),
    Tree(ArgumentTree),
    /// Serialized XML, written into a request verbatim.
    Xml(String),
}

/// What a call can be given: a prepared tree or an XML fragment to map first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArguments {
    Tree(ArgumentTree),
    Xml(String),
}

impl Argument {
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Argument::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&ArgumentTree> {
        match self {
            Argument::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_xml(&self) -> Option<&str> {
        match self {
            Argument::Xml(xml) => Some(xml),
            _ => None,
        }
    }

    /// Looks up a nested entry.
    pub fn get(&self, key: &str) -> Option<&Argument> {
        self.as_tree().and_then(|tree| tree.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Argument> {
        match self {
            Argument::Tree(tree) => tree.get_mut(key),
            _ => None,
        }
    }

    pub fn into_tree(mut self) -> Option<ArgumentTree> {
        match &mut self {
            Argument::Tree(tree) => Some(mem::take(tree)),
            _ => None,
        }
    }
}

// Nested trees are torn down one level at a time so deep documents cannot exhaust the stack.
impl Drop for Argument {
    fn drop(&mut self) {
        let mut pending = match self {
            Argument::Tree(tree) if !tree.is_empty() => vec![mem::take(tree)],
            _ => return,
        };

        while let Some(mut tree) = pending.pop() {
            for (_, mut child) in tree.drain(..) {
                if let Argument::Tree(nested) = &mut child {
                    if !nested.is_empty() {
                        pending.push(mem::take(nested));
                    }
                }
            }
        }
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::Value(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::Value(value.to_owned())
    }
}

impl From<ArgumentTree> for Argument {
    fn from(tree: ArgumentTree) -> Self {
        Argument::Tree(tree)
    }
}

impl From<ArgumentTree> for CallArguments {
    fn from(tree: ArgumentTree) -> Self {
        CallArguments::Tree(tree)
    }
}

impl From<String> for CallArguments {
    fn from(xml: String) -> Self {
        CallArguments::Xml(xml)
    }
}

impl From<&str> for CallArguments {
    fn from(xml: &str) -> Self {
        CallArguments::Xml(xml.to_owned())
    }
}

/// Maps an XML fragment to the arguments of `operation`. The fragment's root element only
/// groups the arguments; its children end up under `operation` whatever the root is named.
pub fn map_arguments(xml: &str, operation: &str) -> Result<ArgumentTree, Error> {
    let (_, root) = xml::read_document(xml.trim()).map_err(Error::ArgumentParse)?;

    let mut arguments = ArgumentTree::new();
    arguments.insert(
        operation.to_owned(),
        Argument::Tree(root.into_tree().unwrap_or_default()),
    );
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tree<const N: usize>(entries: [(&str, Argument); N]) -> Argument {
        Argument::Tree(
            entries
                .into_iter()
                .map(|(key, value)| (key.to_owned(), value))
                .collect(),
        )
    }

    #[test]
    fn maps_leaves_to_trimmed_text() {
        let arguments = map_arguments("<Op><A> 1 </A><B>2</B></Op>", "Op").unwrap();

        assert_eq!(
            arguments["Op"],
            tree([("A", "1".into()), ("B", "2".into())])
        );
    }

    #[test]
    fn keeps_the_first_child_of_any_as_xml() {
        let arguments = map_arguments(
            "<Op><any><Foo a=\"1\"><Bar>x</Bar></Foo><Ignored/></any><any>plain</any></Op>",
            "Op",
        )
        .unwrap();

        assert_eq!(
            arguments["Op"],
            tree([("any", "plain".into())]),
            "a later leaf replaces the earlier raw xml"
        );

        let arguments = map_arguments("<Op><any><Foo/></any></Op>", "Op").unwrap();
        assert_eq!(
            arguments["Op"].get("any"),
            Some(&Argument::Xml("<Foo/>".into()))
        );
    }

    #[test]
    fn keeps_mixed_content_of_any_untouched() {
        let arguments =
            map_arguments("<Op><any><p>Hello <b>x</b> world</p></any></Op>", "Op").unwrap();
        assert_eq!(
            arguments["Op"].get("any").and_then(Argument::as_xml),
            Some("<p>Hello <b>x</b> world</p>")
        );

        let arguments = map_arguments("<Op><any><Foo>  a  b  </Foo></any></Op>", "Op").unwrap();
        assert_eq!(
            arguments["Op"].get("any").and_then(Argument::as_xml),
            Some("<Foo>  a  b  </Foo>")
        );
    }

    #[test]
    fn maps_deeply_nested_fragments() {
        const DEPTH: usize = 10_000;
        let xml = format!(
            "<Op>{}x{}</Op>",
            "<a>".repeat(DEPTH),
            "</a>".repeat(DEPTH)
        );

        let arguments = map_arguments(&xml, "Op").unwrap();

        let mut depth = 0;
        let mut current = &arguments["Op"];
        while let Some(next) = current.get("a") {
            current = next;
            depth += 1;
        }
        assert_eq!(depth, DEPTH);
        assert!(current.as_value() == Some("x"));
    }

    #[test]
    fn merges_repeated_siblings() {
        let arguments = map_arguments(
            "<Op><Item><A>1</A><B>1</B></Item><Item><A>2</A></Item><V>x</V><V>y</V></Op>",
            "Op",
        )
        .unwrap();

        assert_eq!(
            arguments["Op"],
            tree([
                ("Item", tree([("A", "2".into()), ("B", "1".into())])),
                ("V", "y".into()),
            ])
        );
    }

    #[test]
    fn ignores_attributes_and_prefixes() {
        let arguments = map_arguments(
            r#"<m:Request xmlns:m="urn:m"><m:Name lang="en">Ada</m:Name></m:Request>"#,
            "Greet",
        )
        .unwrap();

        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments["Greet"], tree([("Name", "Ada".into())]));
    }

    #[test]
    fn maps_identically_every_time() {
        let xml = "<Op><A><B>1</B></A><any><X/></any></Op>";
        assert_eq!(
            map_arguments(xml, "Op").unwrap(),
            map_arguments(xml, "Op").unwrap()
        );
    }

    #[test]
    fn reports_malformed_fragments() {
        let err = map_arguments("<Op><A></Op>", "Op").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ArgumentParse);
        assert!(err.to_string().starts_with("Error found while parsing ActionBody"));
    }
}
