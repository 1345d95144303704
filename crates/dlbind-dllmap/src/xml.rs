//! Minimal XML element reader.
//!
//! Reads the subset of XML that application config files use: nested
//! elements with quoted attributes, self-closing tags, comments, processing
//! instructions, a DOCTYPE, CDATA sections, and the predefined and numeric
//! character entities. Text content is skipped.

use crate::error::{DllMapError, Result};

/// One parsed element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
}

impl Element {
    /// Value of an attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct children with the given element name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

/// Parse a document and return its root element.
pub fn parse_document(input: &str) -> Result<Element> {
    let mut reader = Reader { input, pos: 0 };
    reader.skip_prolog()?;
    if reader.at_end() {
        return Err(reader.error("document has no root element"));
    }
    let root = reader.element()?;
    reader.skip_prolog()?;
    if !reader.at_end() {
        return Err(reader.error("content after the root element"));
    }
    Ok(root)
}

struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, detail: impl Into<String>) -> DllMapError {
        let line = self.input[..self.pos].matches('\n').count() + 1;
        DllMapError::Xml {
            line,
            detail: detail.into(),
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, s: &str) -> Result<()> {
        if self.eat(s) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{s}'")))
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn skip_until(&mut self, terminator: &str) -> Result<()> {
        match self.rest().find(terminator) {
            Some(offset) => {
                self.pos += offset + terminator.len();
                Ok(())
            }
            None => Err(self.error(format!("unterminated construct, expected '{terminator}'"))),
        }
    }

    /// Skip whitespace, comments, processing instructions and DOCTYPE.
    fn skip_prolog(&mut self) -> Result<()> {
        loop {
            self.skip_ws();
            if self.starts_with("<?") {
                self.skip_until("?>")?;
            } else if self.starts_with("<!--") {
                self.skip_until("-->")?;
            } else if self.starts_with("<!DOCTYPE") {
                self.skip_until(">")?;
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<String> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += end;
        Ok(rest[..end].to_string())
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted attribute value")),
        };
        self.pos += 1;
        let end = self
            .rest()
            .find(quote)
            .ok_or_else(|| self.error("unterminated attribute value"))?;
        let raw = &self.rest()[..end];
        let value = decode_entities(raw).map_err(|detail| self.error(detail))?;
        self.pos += end + 1;
        Ok(value)
    }

    fn element(&mut self) -> Result<Element> {
        self.expect("<")?;
        let name = self.name()?;
        let mut attributes = Vec::new();

        loop {
            self.skip_ws();
            if self.eat("/>") {
                return Ok(Element {
                    name,
                    attributes,
                    children: Vec::new(),
                });
            }
            if self.eat(">") {
                break;
            }
            let key = self.name()?;
            self.skip_ws();
            self.expect("=")?;
            self.skip_ws();
            let value = self.quoted()?;
            if attributes.iter().any(|(k, _)| *k == key) {
                return Err(self.error(format!("duplicate attribute '{key}'")));
            }
            attributes.push((key, value));
        }

        let mut children = Vec::new();
        loop {
            match self.rest().find('<') {
                Some(offset) => self.pos += offset,
                None => return Err(self.error(format!("element '{name}' is never closed"))),
            }

            if self.eat("</") {
                let close = self.name()?;
                self.skip_ws();
                self.expect(">")?;
                if close != name {
                    return Err(self.error(format!(
                        "closing tag '{close}' does not match '{name}'"
                    )));
                }
                return Ok(Element {
                    name,
                    attributes,
                    children,
                });
            }

            if self.starts_with("<!--") {
                self.skip_until("-->")?;
            } else if self.starts_with("<![CDATA[") {
                self.skip_until("]]>")?;
            } else if self.starts_with("<?") {
                self.skip_until("?>")?;
            } else {
                children.push(self.element()?);
            }
        }
    }
}

fn decode_entities(raw: &str) -> std::result::Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &after[..semi];
        let decoded = match entity {
            "amp" => '&',
            "lt" => '<',
            "gt" => '>',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity '&{entity};'"))?
            }
        };
        out.push(decoded);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_elements() {
        let doc = r#"<?xml version="1.0" encoding="utf-8"?>
<!-- app config -->
<configuration>
  <dllmap dll="a" target='b'>
    <dllentry name="x" target="y"/>
  </dllmap>
  <other>text is ignored</other>
</configuration>
"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.name, "configuration");
        assert_eq!(root.children.len(), 2);
        let map = root.children_named("dllmap").next().unwrap();
        assert_eq!(map.attr("dll"), Some("a"));
        assert_eq!(map.attr("target"), Some("b"));
        assert_eq!(map.children[0].attr("name"), Some("x"));
    }

    #[test]
    fn entities_are_decoded() {
        let root = parse_document(r#"<a v="x &amp; y &lt;&#65;&#x42;&gt;"/>"#).unwrap();
        assert_eq!(root.attr("v"), Some("x & y <AB>"));
    }

    #[test]
    fn mismatched_close_reports_line() {
        let err = parse_document("<a>\n<b>\n</a>").unwrap_err();
        match err {
            DllMapError::Xml { line, detail } => {
                assert_eq!(line, 3);
                assert!(detail.contains("does not match"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unclosed_element_is_an_error() {
        assert!(parse_document("<configuration><dllmap dll='a'>").is_err());
    }

    #[test]
    fn trailing_content_is_an_error() {
        assert!(parse_document("<a/><b/>").is_err());
    }

    #[test]
    fn cdata_and_comments_inside_elements() {
        let root = parse_document("<a><![CDATA[<b/>]]><!-- <c/> --><d/></a>").unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "d");
    }
}
