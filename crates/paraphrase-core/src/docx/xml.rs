//! Minimal owned XML tree over quick-xml events
//!
//! Keeps every event it does not understand verbatim so that a part can be
//! parsed, edited and written back without disturbing unrelated markup.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::DocumentError;

#[derive(Debug, Clone)]
pub(crate) enum XmlNode {
    Element(XmlElement),
    /// Text, comments, declarations and anything else kept as-is
    Other(Event<'static>),
}

#[derive(Debug, Clone)]
pub(crate) struct XmlElement {
    pub start: BytesStart<'static>,
    pub children: Vec<XmlNode>,
    /// Written as `<x/>` while it has no children
    pub self_closing: bool,
}

impl XmlElement {
    pub fn new(name: &str) -> Self {
        Self {
            start: BytesStart::new(name.to_string()),
            children: Vec::new(),
            self_closing: true,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.start.push_attribute((key, value));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children
            .push(XmlNode::Other(Event::Text(BytesText::new(text).into_owned())));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.start.name().as_ref() == name.as_bytes()
    }

    /// Match on prefix and local name; `None` is the unprefixed form
    pub fn has_name(&self, prefix: Option<&str>, local: &str) -> bool {
        let name = self.start.name();
        let same_prefix = match (name.prefix(), prefix) {
            (None, None) => true,
            (Some(actual), Some(expected)) => actual.as_ref() == expected.as_bytes(),
            _ => false,
        };
        same_prefix && name.local_name().as_ref() == local.as_bytes()
    }

    /// Prefix this element binds to `uri`: `Some(None)` for a default
    /// namespace declaration, `None` when `uri` is not declared here
    pub fn prefix_bound_to(&self, uri: &str) -> Option<Option<String>> {
        self.start.attributes().flatten().find_map(|a| {
            let value = a.unescape_value().ok()?;
            if value != uri {
                return None;
            }
            let key = a.key.as_ref();
            if key == b"xmlns" {
                Some(None)
            } else {
                key.strip_prefix(b"xmlns:")
                    .map(|p| Some(String::from_utf8_lossy(p).into_owned()))
            }
        })
    }

    /// Child elements with their index in `children`
    pub fn elements(&self) -> impl Iterator<Item = (usize, &XmlElement)> {
        self.children.iter().enumerate().filter_map(|(i, node)| match node {
            XmlNode::Element(el) => Some((i, el)),
            XmlNode::Other(_) => None,
        })
    }

    /// Child elements named `name` with their index in `children`
    pub fn elements_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (usize, &'a XmlElement)> + 'a {
        self.elements().filter(move |(_, el)| el.is(name))
    }

    /// Unescaped character data directly inside this element
    pub fn text(&self) -> Result<String, DocumentError> {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Other(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| DocumentError::Xml(e.to_string()))?;
                    out.push_str(&text);
                }
                XmlNode::Other(Event::CData(c)) => out.push_str(&String::from_utf8_lossy(c)),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Attribute value by qualified name
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.start
            .attributes()
            .flatten()
            .find(|a| a.key.as_ref() == name.as_bytes())
            .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
    }
}

/// A parsed XML part: top-level nodes (declaration, root element, ...)
#[derive(Debug, Clone)]
pub(crate) struct XmlTree {
    pub nodes: Vec<XmlNode>,
}

impl XmlTree {
    pub fn parse(bytes: &[u8]) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut nodes: Vec<XmlNode> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => stack.push(XmlElement {
                    start: start.into_owned(),
                    children: Vec::new(),
                    self_closing: false,
                }),
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| DocumentError::Xml("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut nodes, XmlNode::Element(element));
                }
                Event::Empty(start) => {
                    let element = XmlElement {
                        start: start.into_owned(),
                        children: Vec::new(),
                        self_closing: true,
                    };
                    attach(&mut stack, &mut nodes, XmlNode::Element(element));
                }
                Event::Eof => break,
                other => attach(&mut stack, &mut nodes, XmlNode::Other(other.into_owned())),
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DocumentError::Xml("unclosed element at end of input".into()));
        }
        Ok(Self { nodes })
    }

    pub fn write(&self) -> Result<Vec<u8>, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }

    /// Index and reference of the document element
    pub fn root(&self) -> Option<(usize, &XmlElement)> {
        self.nodes.iter().enumerate().find_map(|(i, node)| match node {
            XmlNode::Element(el) => Some((i, el)),
            XmlNode::Other(_) => None,
        })
    }

    /// Element addressed by a path of child indices starting at `nodes`
    pub fn element_at(&self, path: &[usize]) -> Option<&XmlElement> {
        let (first, rest) = path.split_first()?;
        let mut current = match self.nodes.get(*first)? {
            XmlNode::Element(el) => el,
            XmlNode::Other(_) => return None,
        };
        for &index in rest {
            current = match current.children.get(index)? {
                XmlNode::Element(el) => el,
                XmlNode::Other(_) => return None,
            };
        }
        Some(current)
    }

    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut XmlElement> {
        let (first, rest) = path.split_first()?;
        let mut current = match self.nodes.get_mut(*first)? {
            XmlNode::Element(el) => el,
            XmlNode::Other(_) => return None,
        };
        for &index in rest {
            current = match current.children.get_mut(index)? {
                XmlNode::Element(el) => el,
                XmlNode::Other(_) => return None,
            };
        }
        Some(current)
    }
}

fn attach(stack: &mut [XmlElement], nodes: &mut Vec<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => nodes.push(node),
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), DocumentError> {
    match node {
        XmlNode::Element(el) if el.children.is_empty() && el.self_closing => {
            writer.write_event(Event::Empty(el.start.borrow()))?;
        }
        XmlNode::Element(el) => {
            writer.write_event(Event::Start(el.start.borrow()))?;
            for child in &el.children {
                write_node(writer, child)?;
            }
            writer.write_event(Event::End(el.start.to_end()))?;
        }
        XmlNode::Other(event) => {
            writer.write_event(event.borrow())?;
        }
    }
    Ok(())
}
