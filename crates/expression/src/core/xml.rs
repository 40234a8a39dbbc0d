//! Minimal XML document model with an XPath subset
//!
//! Documents are parsed with `quick-xml` into an owned tree. The XPath
//! evaluator understands location paths made of `/` and `//` steps with
//! element names, `*`, `text()`, `@attribute`, `.` and the predicates
//! `[n]`, `[last()]`, `[@a]`, `[@a='v']` and `[child='v']`. The result is
//! the string value of the first selected node.

use quick_xml::Reader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::Event;

/// Element node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// Child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Parsed document
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlDocument {
    root: Option<XmlElement>,
}

impl XmlElement {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated text of all descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }
}

impl XmlDocument {
    /// Parse a document
    ///
    /// # Errors
    ///
    /// Returns the parser message for malformed input.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut reader = Reader::from_str(source);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| "unexpected closing tag".to_string())?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(text) => {
                    let text = text.decode().map_err(|e| e.to_string())?;
                    push_text(&mut stack, &text);
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(data.as_ref()).into_owned();
                    push_text(&mut stack, &text);
                }
                Event::GeneralRef(reference) => {
                    let raw = reference.decode().map_err(|e| e.to_string())?;
                    push_text(&mut stack, &resolve_entity(&raw));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err("unexpected end of document".to_string());
        }
        if root.is_none() {
            return Err("document has no root element".to_string());
        }

        Ok(Self { root })
    }

    /// Name of the document element
    pub fn root_name(&self) -> Option<&str> {
        self.root.as_ref().map(|root| root.name.as_str())
    }

    /// Evaluate an XPath expression to the string value of its first match
    ///
    /// # Errors
    ///
    /// Returns a message for expressions outside the supported subset.
    pub fn xpath(&self, expression: &str) -> Result<String, String> {
        let steps = parse_path(expression)?;
        let mut selection = vec![Selected::Document];

        for step in &steps {
            let mut next = Vec::new();
            for node in &selection {
                let mut candidates = Vec::new();
                if step.descendants {
                    node.descendants_or_self(self, &mut candidates);
                } else {
                    candidates.push(*node);
                }
                let mut matched = Vec::new();
                for candidate in candidates {
                    step.select(self, candidate, &mut matched);
                }
                next.extend(step.filter(matched));
            }
            selection = next;
        }

        Ok(selection
            .first()
            .map(|node| node.string_value(self))
            .unwrap_or_default())
    }
}

fn element_from(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| e.to_string())?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [XmlElement], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else if !text.trim().is_empty() {
        parent.children.push(XmlNode::Text(text.to_string()));
    }
}

fn resolve_entity(raw: &str) -> String {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return resolved.to_string();
    }
    if let Some(rest) = raw.strip_prefix('#') {
        let code = match rest.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => rest.parse::<u32>().ok(),
        };
        if let Some(ch) = code.and_then(char::from_u32) {
            return ch.to_string();
        }
    }
    format!("&{raw};")
}

// ============================================================================
// XPath subset
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Selected<'a> {
    Document,
    Element(&'a XmlElement),
    Text(&'a str),
    Attribute(&'a str),
}

impl<'a> Selected<'a> {
    fn descendants_or_self(self, doc: &'a XmlDocument, out: &mut Vec<Selected<'a>>) {
        out.push(self);
        match self {
            Self::Document => {
                if let Some(root) = &doc.root {
                    Self::Element(root).descendants_or_self(doc, out);
                }
            }
            Self::Element(element) => {
                for child in element.elements() {
                    Self::Element(child).descendants_or_self(doc, out);
                }
            }
            Self::Text(_) | Self::Attribute(_) => {}
        }
    }

    fn child_elements(self, doc: &'a XmlDocument) -> Vec<&'a XmlElement> {
        match self {
            Self::Document => doc.root.iter().collect(),
            Self::Element(element) => element.elements().collect(),
            Self::Text(_) | Self::Attribute(_) => Vec::new(),
        }
    }

    fn string_value(self, doc: &XmlDocument) -> String {
        match self {
            Self::Document => doc
                .root
                .as_ref()
                .map(XmlElement::text_content)
                .unwrap_or_default(),
            Self::Element(element) => element.text_content(),
            Self::Text(text) | Self::Attribute(text) => text.to_string(),
        }
    }
}

#[derive(Debug, PartialEq)]
enum NodeTest {
    Name(String),
    Any,
    Text,
    Attribute(String),
    SelfNode,
}

#[derive(Debug, PartialEq)]
enum Predicate {
    Position(usize),
    Last,
    HasAttribute(String),
    AttributeEquals(String, String),
    ChildEquals(String, String),
}

#[derive(Debug)]
struct Step {
    descendants: bool,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

impl Step {
    fn select<'a>(&self, doc: &'a XmlDocument, node: Selected<'a>, out: &mut Vec<Selected<'a>>) {
        match &self.test {
            NodeTest::SelfNode => out.push(node),
            NodeTest::Any => out.extend(node.child_elements(doc).into_iter().map(Selected::Element)),
            NodeTest::Name(name) => out.extend(
                node.child_elements(doc)
                    .into_iter()
                    .filter(|element| &element.name == name)
                    .map(Selected::Element),
            ),
            NodeTest::Text => {
                if let Selected::Element(element) = node {
                    out.extend(element.children.iter().filter_map(|child| match child {
                        XmlNode::Text(text) => Some(Selected::Text(text.as_str())),
                        XmlNode::Element(_) => None,
                    }));
                }
            }
            NodeTest::Attribute(name) => {
                if let Selected::Element(element) = node {
                    if let Some(value) = element.attribute(name) {
                        out.push(Selected::Attribute(value));
                    }
                }
            }
        }
    }

    fn filter<'a>(&self, mut nodes: Vec<Selected<'a>>) -> Vec<Selected<'a>> {
        for predicate in &self.predicates {
            nodes = match predicate {
                Predicate::Position(position) => nodes
                    .get(position.wrapping_sub(1))
                    .copied()
                    .into_iter()
                    .collect(),
                Predicate::Last => nodes.last().copied().into_iter().collect(),
                _ => nodes
                    .into_iter()
                    .filter(|node| matches_predicate(*node, predicate))
                    .collect(),
            };
        }
        nodes
    }
}

fn matches_predicate(node: Selected<'_>, predicate: &Predicate) -> bool {
    let Selected::Element(element) = node else {
        return false;
    };
    match predicate {
        Predicate::HasAttribute(name) => element.attribute(name).is_some(),
        Predicate::AttributeEquals(name, value) => element.attribute(name) == Some(value.as_str()),
        Predicate::ChildEquals(name, value) => element
            .elements()
            .any(|child| &child.name == name && &child.text_content() == value),
        Predicate::Position(_) | Predicate::Last => true,
    }
}

fn parse_path(expression: &str) -> Result<Vec<Step>, String> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err("empty XPath expression".to_string());
    }

    let mut steps = Vec::new();
    let mut rest = expression;
    let mut descendants = false;

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix("//") {
            descendants = true;
            rest = stripped;
            continue;
        }
        if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
            continue;
        }

        let end = step_end(rest);
        let (raw, remainder) = rest.split_at(end);
        steps.push(parse_step(raw, descendants)?);
        descendants = false;
        rest = remainder;
    }

    if descendants {
        return Err(format!("incomplete XPath expression: {expression}"));
    }
    Ok(steps)
}

fn step_end(input: &str) -> usize {
    let mut depth = 0usize;
    let mut quote = None;
    for (index, ch) in input.char_indices() {
        match (ch, quote) {
            ('\'' | '"', None) => quote = Some(ch),
            (c, Some(q)) if c == q => quote = None,
            ('[', None) => depth += 1,
            (']', None) => depth = depth.saturating_sub(1),
            ('/', None) if depth == 0 => return index,
            _ => {}
        }
    }
    input.len()
}

fn parse_step(raw: &str, descendants: bool) -> Result<Step, String> {
    let (head, predicates) = match raw.find('[') {
        Some(index) => raw.split_at(index),
        None => (raw, ""),
    };

    let test = match head.trim() {
        "." => NodeTest::SelfNode,
        "*" => NodeTest::Any,
        "text()" => NodeTest::Text,
        name if name.starts_with('@') => NodeTest::Attribute(name[1..].to_string()),
        name if !name.is_empty() && name.chars().all(is_name_char) => {
            NodeTest::Name(name.to_string())
        }
        other => return Err(format!("unsupported XPath step: {other}")),
    };

    let mut parsed = Vec::new();
    let mut rest = predicates;
    while let Some(open) = rest.strip_prefix('[') {
        let close = open
            .find(']')
            .ok_or_else(|| format!("unterminated predicate in {raw}"))?;
        parsed.push(parse_predicate(open[..close].trim())?);
        rest = &open[close + 1..];
    }
    if !rest.trim().is_empty() {
        return Err(format!("unsupported XPath step: {raw}"));
    }

    Ok(Step {
        descendants,
        test,
        predicates: parsed,
    })
}

fn parse_predicate(raw: &str) -> Result<Predicate, String> {
    if raw == "last()" {
        return Ok(Predicate::Last);
    }
    if let Ok(position) = raw.parse::<usize>() {
        return Ok(Predicate::Position(position));
    }
    if let Some((left, right)) = raw.split_once('=') {
        let value = unquote(right.trim())
            .ok_or_else(|| format!("unsupported XPath predicate: {raw}"))?
            .to_string();
        let left = left.trim();
        return Ok(match left.strip_prefix('@') {
            Some(attribute) => Predicate::AttributeEquals(attribute.to_string(), value),
            None => Predicate::ChildEquals(left.to_string(), value),
        });
    }
    if let Some(attribute) = raw.strip_prefix('@') {
        return Ok(Predicate::HasAttribute(attribute.to_string()));
    }
    Err(format!("unsupported XPath predicate: {raw}"))
}

fn unquote(raw: &str) -> Option<&str> {
    raw.strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"<?xml version="1.0"?>
        <test>
            <testValue>hello &amp; bye</testValue>
            <item id="a"><name>first</name></item>
            <item id="b"><name>second</name></item>
        </test>"#;

    fn doc() -> XmlDocument {
        XmlDocument::parse(SOURCE).unwrap()
    }

    #[test]
    fn test_parse_root() {
        assert_eq!(doc().root_name(), Some("test"));
    }

    #[test]
    fn test_absolute_path() {
        assert_eq!(doc().xpath("/test/testValue").unwrap(), "hello & bye");
    }

    #[test]
    fn test_descendant_and_position() {
        assert_eq!(doc().xpath("//item[2]/name").unwrap(), "second");
        assert_eq!(doc().xpath("//item[last()]/@id").unwrap(), "b");
    }

    #[test]
    fn test_predicates() {
        assert_eq!(doc().xpath("/test/item[@id='b']/name/text()").unwrap(), "second");
        assert_eq!(doc().xpath("/test/item[name=\"first\"]/@id").unwrap(), "a");
    }

    #[test]
    fn test_no_match_is_empty() {
        assert_eq!(doc().xpath("/test/missing").unwrap(), "");
    }

    #[test]
    fn test_malformed_input() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(doc().xpath("/test/item[").is_err());
    }
}
