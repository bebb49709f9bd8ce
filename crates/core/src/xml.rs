//! Minimal XML element tree used to write tool input files.

use std::fmt::{self, Write};

/// An XML element with attributes, optional text and child elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.attributes.push((name.into(), value.to_string()));
        self
    }

    /// Attribute rendered as `1` / `0`.
    pub fn flag(self, name: impl Into<String>, value: bool) -> Self {
        self.attr(name, if value { "1" } else { "0" })
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_elements(&self) -> &[Element] {
        &self.children
    }

    pub fn text_content(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Render as a complete document with an XML declaration.
    pub fn to_document(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        self.write_indented(&mut out, 0);
        out
    }

    fn write_indented(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}<{}", self.name);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {name}=\"{}\"", escape(value));
        }

        match (&self.text, self.children.is_empty()) {
            (None, true) => out.push_str(" />\n"),
            (Some(text), true) => {
                let _ = writeln!(out, ">{}</{}>", escape(text), self.name);
            }
            (text, false) => {
                out.push('>');
                if let Some(text) = text {
                    out.push_str(&escape(text));
                }
                out.push('\n');
                for child in &self.children {
                    child.write_indented(out, depth + 1);
                }
                let _ = writeln!(out, "{indent}</{}>", self.name);
            }
        }
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_elements() {
        let doc = Element::new("Tunnels")
            .child(Element::new("Input").attr("ReadAllModels", 0).text("/w/1tqn.cif"))
            .child(Element::new("Origins").flag("Auto", true))
            .to_document();

        assert_eq!(
            doc,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <Tunnels>\n\
             \x20 <Input ReadAllModels=\"0\">/w/1tqn.cif</Input>\n\
             \x20 <Origins Auto=\"1\" />\n\
             </Tunnels>\n"
        );
    }

    #[test]
    fn escapes_text_and_attributes() {
        let doc = Element::new("Query")
            .attr("Value", "a\"b")
            .text("Residues('A') & <x>")
            .to_document();
        assert!(doc.contains("Value=\"a&quot;b\""));
        assert!(doc.contains("Residues(&apos;A&apos;) &amp; &lt;x&gt;"));
    }

    #[test]
    fn floats_render_without_trailing_zeroes() {
        let el = Element::new("Cavity").attr("ProbeRadius", 5.0).attr("InteriorThreshold", 1.1);
        assert_eq!(el.attribute("ProbeRadius"), Some("5"));
        assert_eq!(el.attribute("InteriorThreshold"), Some("1.1"));
    }
}
