//! Generic XML element tree and streaming writer.

/// One XML element with attributes in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: Option<String>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Writes `root` as a UTF-8 document with two-space indentation.
pub fn write_document<S: FnMut(&str)>(root: &XmlElement, sink: &mut S) {
    sink("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(root, 0, sink);
}

fn write_element<S: FnMut(&str)>(element: &XmlElement, depth: usize, sink: &mut S) {
    let indent = "  ".repeat(depth);
    let mut open = format!("{indent}<{}", element.name);
    for (name, value) in &element.attributes {
        open.push_str(&format!(" {name}=\"{}\"", escape(value)));
    }

    match (&element.text, element.children.is_empty()) {
        (None, true) => {
            open.push_str("/>\n");
            sink(&open);
        }
        (Some(text), true) => {
            open.push_str(&format!(">{}</{}>\n", escape(text), element.name));
            sink(&open);
        }
        (text, false) => {
            open.push_str(">\n");
            sink(&open);
            if let Some(text) = text {
                sink(&format!("{indent}  {}\n", escape(text)));
            }
            for child in &element.children {
                write_element(child, depth + 1, sink);
            }
            sink(&format!("{indent}</{}>\n", element.name));
        }
    }
}

/// Escapes the five XML special characters.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
