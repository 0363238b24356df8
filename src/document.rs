//! A small read-only element tree over `quick-xml`'s pull reader.
//!
//! Elements live in an arena in the order their start tags appear, so
//! iterating the arena is iterating the document in order.

use miette::Diagnostic;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error("Malformed XML at byte {position}")]
    #[diagnostic(code(meteogram::document::xml))]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("Unclosed element `{0}` at end of document")]
    #[diagnostic(code(meteogram::document::unclosed))]
    Unclosed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(usize);

#[derive(Debug, Clone)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    elements: Vec<Element>,
}

impl Document {
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut document = Document::default();
        let mut open: Vec<NodeId> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|source| DocumentError::Xml {
                    position: reader.buffer_position() as u64,
                    source,
                })?;

            match event {
                Event::Start(start) => {
                    let id = document
                        .push(&start, open.last().copied())
                        .map_err(|source| DocumentError::Xml {
                            position: reader.buffer_position() as u64,
                            source,
                        })?;
                    open.push(id);
                }
                Event::Empty(start) => {
                    document
                        .push(&start, open.last().copied())
                        .map_err(|source| DocumentError::Xml {
                            position: reader.buffer_position() as u64,
                            source,
                        })?;
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(text) => {
                    if let Some(&NodeId(current)) = open.last() {
                        let text = text.unescape().map_err(|source| DocumentError::Xml {
                            position: reader.buffer_position() as u64,
                            source,
                        })?;
                        document.elements[current].text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(&NodeId(current)) = open.last() {
                        let data = data.into_inner();
                        document.elements[current]
                            .text
                            .push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => (),
            }
            buf.clear();
        }

        if let Some(&NodeId(unclosed)) = open.last() {
            return Err(DocumentError::Unclosed(
                document.elements[unclosed].name.clone(),
            ));
        }

        tracing::debug!(
            message = "parsed xml document",
            elements = document.elements.len()
        );
        Ok(document)
    }

    fn push(
        &mut self,
        start: &BytesStart,
        parent: Option<NodeId>,
    ) -> Result<NodeId, quick_xml::Error> {
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        let id = NodeId(self.elements.len());
        self.elements.push(Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            text: String::new(),
            parent,
            children: Vec::new(),
        });
        if let Some(NodeId(parent)) = parent {
            self.elements[parent].children.push(id);
        }
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Every element with the given tag name, in document order.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = Node<'a>> + 'a {
        self.elements
            .iter()
            .enumerate()
            .filter(move |(_, element)| element.name == name)
            .map(move |(index, _)| self.node(NodeId(index)))
    }

    pub fn first_named<'a>(&'a self, name: &'a str) -> Option<Node<'a>> {
        self.elements_named(name).next()
    }

    fn node(&self, id: NodeId) -> Node<'_> {
        Node { document: self, id }
    }
}

/// A borrowed handle to one element of a [`Document`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    document: &'a Document,
    id: NodeId,
}

impl<'a> Node<'a> {
    fn element(&self) -> &'a Element {
        &self.document.elements[self.id.0]
    }

    pub fn name(&self) -> &'a str {
        &self.element().name
    }

    pub fn attribute(&self, key: &str) -> Option<&'a str> {
        self.element()
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Text directly inside this element, with surrounding whitespace trimmed.
    pub fn text(&self) -> &'a str {
        &self.element().text
    }

    pub fn parent(&self) -> Option<Node<'a>> {
        self.element().parent.map(|id| self.document.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'a>> + 'a {
        let document = self.document;
        self.element()
            .children
            .iter()
            .map(move |&id| document.node(id))
    }

    pub fn child_named(&self, name: &str) -> Option<Node<'a>> {
        self.children().find(|child| child.name() == name)
    }

    /// Follows a path of child names, taking the first match at each step.
    pub fn path(&self, names: &[&str]) -> Option<Node<'a>> {
        names
            .iter()
            .try_fold(*self, |node, name| node.child_named(name))
    }
}

impl std::fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name())
            .field("attributes", &self.element().attributes)
            .finish()
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.document, other.document) && self.id == other.id
    }
}
