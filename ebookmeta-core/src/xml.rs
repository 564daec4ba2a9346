//! Owned XML element tree
//!
//! OPF packages, XMP packets and ComicInfo documents are all small enough to
//! hold in memory. They are parsed with quick-xml into this tree, edited, and
//! written back without re-indenting untouched regions.

use crate::error::ParseError;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::sync::OnceLock;

/// A node inside an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

/// An element with its attributes in document order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct XmlElement {
    /// Qualified name as written (`dc:title`, `opf:metadata`, `Page`)
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute lookup ignoring the prefix (`opf:scheme` and `scheme` both match `scheme`)
    pub fn attribute_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|(k, _)| !k.starts_with("xmlns"))
            .find(|(k, _)| local_part(k).eq_ignore_ascii_case(local))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Text and CDATA of direct children, concatenated
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace every child with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    pub fn has_child_elements(&self) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, XmlNode::Element(_)))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn find_child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.name == name)
    }

    pub fn find_child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.child_elements_mut().find(|e| e.name == name)
    }

    pub fn find_child_local(&self, local: &str) -> Option<&XmlElement> {
        self.child_elements().find(|e| e.local_name() == local)
    }

    /// Depth-first search by local name, including `self`
    pub fn find_descendant_local(&self, local: &str) -> Option<&XmlElement> {
        if self.local_name() == local {
            return Some(self);
        }
        self.child_elements()
            .find_map(|child| child.find_descendant_local(local))
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Remove every child element, keeping nothing but the element itself
    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Collect `xmlns:prefix` declarations from this subtree (first binding wins)
    pub fn collect_namespaces(&self, into: &mut BTreeMap<String, String>) {
        for (key, value) in &self.attributes {
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                into.entry(prefix.to_string())
                    .or_insert_with(|| value.clone());
            }
        }
        for child in self.child_elements() {
            child.collect_namespaces(into);
        }
    }

    /// Serialize this element alone (no declaration)
    pub fn to_xml_string(&self) -> Result<String, quick_xml::Error> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_element(&mut writer, self)?;
        Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
    }
}

/// The XML declaration, kept so it can be written back
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub version: String,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            standalone: None,
        }
    }
}

/// A parsed document: declaration, top-level misc nodes and the root element
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub declaration: Option<Declaration>,
    pub prolog: Vec<XmlNode>,
    pub root: XmlElement,
    pub epilog: Vec<XmlNode>,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: Some(Declaration::default()),
            prolog: Vec::new(),
            root,
            epilog: Vec::new(),
        }
    }

    /// Parse raw document bytes, honouring a byte order mark or the
    /// `encoding` named in the declaration. Unknown labels fall back to UTF-8.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let (encoding, bom_len) = detect_encoding(bytes);
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors {
            tracing::debug!("Malformed {} sequences replaced while decoding XML", encoding.name());
        }
        Self::parse(&text)
    }

    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        let xml = xml.trim_start_matches('\u{feff}');
        let mut reader = Reader::from_str(xml);

        let mut tree = TreeBuilder::default();
        let mut declaration = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                ParseError::InvalidXml(format!("at byte {}: {}", reader.buffer_position(), e))
            })?;

            match event {
                Event::Decl(decl) => declaration = Some(declaration_from(&decl)),
                Event::Start(start) => tree.open(element_from_start(&start)?),
                Event::Empty(start) => tree.attach(XmlNode::Element(element_from_start(&start)?)),
                Event::End(_) => tree.close()?,
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                    tree.attach(XmlNode::Text(value));
                }
                Event::CData(cdata) => {
                    let value = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    tree.attach(XmlNode::CData(value));
                }
                Event::Comment(comment) => {
                    tree.attach(XmlNode::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
                Event::PI(pi) => {
                    tree.attach(XmlNode::ProcessingInstruction(
                        String::from_utf8_lossy(&pi).into_owned(),
                    ));
                }
                Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        tree.finish(declaration)
    }

    /// Serialize the document as UTF-8
    pub fn to_bytes(&self) -> Result<Vec<u8>, quick_xml::Error> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        if let Some(decl) = &self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                Some("UTF-8"),
                decl.standalone.as_deref(),
            )))?;
            writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
            writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        }
        write_element(&mut writer, &self.root)?;
        for node in &self.epilog {
            writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
            write_node(&mut writer, node)?;
        }

        Ok(writer.into_inner().into_inner())
    }
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
    prolog: Vec<XmlNode>,
    epilog: Vec<XmlNode>,
}

impl TreeBuilder {
    fn open(&mut self, element: XmlElement) {
        self.stack.push(element);
    }

    fn close(&mut self) -> Result<(), ParseError> {
        let element = self
            .stack
            .pop()
            .ok_or_else(|| ParseError::InvalidXml("unbalanced end tag".to_string()))?;
        self.attach(XmlNode::Element(element));
        Ok(())
    }

    fn attach(&mut self, node: XmlNode) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
            return;
        }
        // Whitespace between top-level nodes is regenerated on write
        if let XmlNode::Text(t) = &node {
            if t.trim().is_empty() {
                return;
            }
        }
        match (node, self.root.is_some()) {
            (XmlNode::Element(element), false) => self.root = Some(element),
            (node, false) => self.prolog.push(node),
            (node, true) => self.epilog.push(node),
        }
    }

    fn finish(self, declaration: Option<Declaration>) -> Result<XmlDocument, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::InvalidXml(format!(
                "unclosed element <{}>",
                self.stack[self.stack.len() - 1].name
            )));
        }
        let root = self
            .root
            .ok_or_else(|| ParseError::InvalidXml("document has no root element".to_string()))?;
        Ok(XmlDocument {
            declaration,
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

/// Encoding of an XML byte stream and the length of its byte order mark
fn detect_encoding(bytes: &[u8]) -> (&'static Encoding, usize) {
    if let Some(found) = Encoding::for_bom(bytes) {
        return found;
    }
    match bytes {
        [0x3C, 0x00, 0x3F, 0x00, ..] => return (UTF_16LE, 0),
        [0x00, 0x3C, 0x00, 0x3F, ..] => return (UTF_16BE, 0),
        _ => {}
    }

    static DECLARED: OnceLock<Regex> = OnceLock::new();
    let re = DECLARED.get_or_init(|| {
        Regex::new(r#"^\s*<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
            .expect("static regex")
    });
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let declared = re
        .captures(&head)
        .and_then(|caps| Encoding::for_label(caps[1].as_bytes()));
    match declared {
        // A declaration readable as ASCII cannot really be UTF-16
        Some(encoding) if encoding == UTF_16LE || encoding == UTF_16BE => (UTF_8, 0),
        Some(encoding) => (encoding, 0),
        None => (UTF_8, 0),
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn declaration_from(decl: &BytesDecl<'_>) -> Declaration {
    let version = decl
        .version()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_else(|_| "1.0".to_string());
    let standalone = decl
        .standalone()
        .and_then(|s| s.ok())
        .map(|s| String::from_utf8_lossy(&s).into_owned());
    Declaration {
        version,
        standalone,
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, ParseError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes().with_checks(false) {
        let attr = attr.map_err(|e| ParseError::InvalidXml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &XmlNode) -> Result<(), quick_xml::Error> {
    match node {
        XmlNode::Element(element) => write_element(writer, element)?,
        XmlNode::Text(text) => {
            let escaped = quick_xml::escape::partial_escape(text.as_str());
            writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
        }
        XmlNode::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
        XmlNode::Comment(text) => {
            writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?
        }
        XmlNode::ProcessingInstruction(content) => {
            writer.write_event(Event::PI(BytesPI::new(content.as_str())))?
        }
    }
    Ok(())
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

/// Resolve `&#NNN;` and `&#xHH;` references, leaving named entities alone
pub fn decode_numeric_references(text: &str) -> String {
    static NUMERIC_REF: OnceLock<Regex> = OnceLock::new();
    let re = NUMERIC_REF.get_or_init(|| {
        Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").expect("static regex")
    });

    re.replace_all(text, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        match code.and_then(char::from_u32) {
            // Markup characters stay escaped so the document remains well-formed
            Some('<' | '&' | '"') => caps[0].to_string(),
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}
