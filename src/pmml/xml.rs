//! Minimal XML element tree and its writer.
//!
//! Documents are assembled in memory and written in one pass, so a failed
//! serialization step never leaves a partially written document behind.

use super::{SerializerError, SerializerResult};
use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
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

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Replace an existing attribute in place or append a new one
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    /// Concatenated text content of the direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |element| element.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(element) if element.name == name => Some(element),
            _ => None,
        })
    }

    /// Depth-first list of all descendants with the given name
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a XmlElement>) {
        for element in self.elements() {
            if element.name == name {
                found.push(element);
            }
            element.collect_named(name, found);
        }
    }

    /// Direct child carrying `attribute == value`
    pub fn find_child_by_attribute(
        &self,
        name: &str,
        attribute: &str,
        value: &str,
    ) -> Option<&XmlElement> {
        self.elements()
            .find(|element| element.name == name && element.attribute(attribute) == Some(value))
    }

    /// Add an `Extension` child.
    ///
    /// Extensions are grouped: when the element already has an `Extension`
    /// child, the new one is inserted before the first of them.
    pub fn add_extension(&mut self, name: &str, value: &str, extender: Option<&str>) {
        let mut extension = XmlElement::new("Extension")
            .with_attribute("name", name)
            .with_attribute("value", value);
        if let Some(extender) = extender {
            extension.set_attribute("extender", extender);
        }

        let first_extension = self.children.iter().position(
            |node| matches!(node, XmlNode::Element(element) if element.name == "Extension"),
        );
        match first_extension {
            Some(index) => self.children.insert(index, XmlNode::Element(extension)),
            None => self.children.push(XmlNode::Element(extension)),
        }
    }

    /// Update the value of the named `Extension` child, adding it when absent
    pub fn set_extension(&mut self, name: &str, value: &str) {
        let existing = self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(element)
                if element.name == "Extension" && element.attribute("name") == Some(name) =>
            {
                Some(element)
            }
            _ => None,
        });
        match existing {
            Some(extension) => extension.set_attribute("value", value),
            None => self.add_extension(name, value, None),
        }
    }

    pub fn extension_value(&self, name: &str) -> Option<&str> {
        self.find_child_by_attribute("Extension", "name", name)
            .and_then(|extension| extension.attribute("value"))
    }
}

/// Complete document: declaration, processing instructions and root element
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub processing_instructions: Vec<String>,
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self {
            processing_instructions: Vec::new(),
            root,
        }
    }

    /// Render as an indented UTF-8 string
    pub fn to_xml_string(&self) -> SerializerResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;
        for instruction in &self.processing_instructions {
            writer
                .write_event(Event::PI(BytesPI::new(instruction.as_str())))
                .map_err(xml_error)?;
        }
        write_element(&mut writer, &self.root)?;

        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &XmlElement) -> SerializerResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(xml_error);
    }

    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for child in &element.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(xml_error)
}

fn xml_error(error: impl std::fmt::Display) -> SerializerError {
    SerializerError::Xml(error.to_string())
}
