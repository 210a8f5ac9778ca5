//! A [`ContentHandler`] writing the result tree as markup through `quick_xml`.
use log::debug;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use std::io::Write;
use trellis_traits::{Attribute, ContentHandler, HandlerError, OutputMethod};

/// HTML elements written without an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub struct XmlSerializer<W: Write> {
    writer: Writer<W>,
    method: OutputMethod,
    in_cdata: bool,
}

impl<W: Write> XmlSerializer<W> {
    pub fn new(inner: W) -> Self {
        Self::with_method(inner, OutputMethod::Xml)
    }

    pub fn with_method(inner: W, method: OutputMethod) -> Self {
        Self {
            writer: Writer::new(inner),
            method,
            in_cdata: false,
        }
    }

    pub fn method(&self) -> OutputMethod {
        self.method
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn is_void(&self, uri: &str, local_name: &str) -> bool {
        self.method == OutputMethod::Html
            && uri.is_empty()
            && VOID_ELEMENTS.contains(&local_name.to_ascii_lowercase().as_str())
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), HandlerError> {
        Ok(self.writer.write_event(event)?)
    }
}

impl<W: Write> ContentHandler for XmlSerializer<W> {
    fn start_document(&mut self) -> Result<(), HandlerError> {
        if self.method != OutputMethod::Xml {
            return Ok(());
        }
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn end_document(&mut self) -> Result<(), HandlerError> {
        Ok(self.writer.get_mut().flush()?)
    }

    // Declarations arrive as `xmlns` attributes on the element itself.
    fn start_prefix_mapping(&mut self, _prefix: &str, _uri: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    fn end_prefix_mapping(&mut self, _prefix: &str) -> Result<(), HandlerError> {
        Ok(())
    }

    fn start_element(
        &mut self,
        _uri: &str,
        _local_name: &str,
        qname: &str,
        attributes: &[Attribute],
    ) -> Result<(), HandlerError> {
        if self.method == OutputMethod::Text {
            return Ok(());
        }
        let mut start = BytesStart::new(qname);
        for attribute in attributes {
            start.push_attribute((attribute.qname.as_str(), attribute.value.as_str()));
        }
        self.write(Event::Start(start))
    }

    fn end_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) -> Result<(), HandlerError> {
        if self.method == OutputMethod::Text || self.is_void(uri, local_name) {
            return Ok(());
        }
        self.write(Event::End(BytesEnd::new(qname)))
    }

    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        match self.method {
            OutputMethod::Text => Ok(self.writer.get_mut().write_all(text.as_bytes())?),
            _ if self.in_cdata => self.write(Event::CData(BytesCData::new(text))),
            _ => self.write(Event::Text(BytesText::new(text))),
        }
    }

    fn comment(&mut self, text: &str) -> Result<(), HandlerError> {
        if self.method == OutputMethod::Text {
            return Ok(());
        }
        self.write(Event::Comment(BytesText::from_escaped(text)))
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError> {
        if self.method == OutputMethod::Text {
            return Ok(());
        }
        let content = if data.is_empty() {
            target.to_string()
        } else {
            format!("{} {}", target, data)
        };
        self.write(Event::PI(BytesPI::new(content)))
    }

    fn start_cdata(&mut self) -> Result<(), HandlerError> {
        self.in_cdata = true;
        Ok(())
    }

    fn end_cdata(&mut self) -> Result<(), HandlerError> {
        self.in_cdata = false;
        Ok(())
    }

    fn switch_output_method(&mut self, method: OutputMethod) -> Result<(), HandlerError> {
        debug!("Serializer output method switched to {:?}", method);
        self.method = method;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(method: OutputMethod, build: impl FnOnce(&mut XmlSerializer<Vec<u8>>)) -> String {
        let mut serializer = XmlSerializer::with_method(Vec::new(), method);
        build(&mut serializer);
        String::from_utf8(serializer.into_inner()).unwrap()
    }

    #[test]
    fn test_xml_output_escapes_text_and_attributes() {
        let out = render(OutputMethod::Xml, |s| {
            s.start_document().unwrap();
            s.start_element("", "a", "a", &[Attribute::local("href", "x&y")])
                .unwrap();
            s.characters("1 < 2").unwrap();
            s.end_element("", "a", "a").unwrap();
            s.end_document().unwrap();
        });
        assert_eq!(
            out,
            r#"<?xml version="1.0" encoding="UTF-8"?><a href="x&amp;y">1 &lt; 2</a>"#
        );
    }

    #[test]
    fn test_html_switch_drops_declaration_and_void_end_tags() {
        let out = render(OutputMethod::Xml, |s| {
            s.switch_output_method(OutputMethod::Html).unwrap();
            s.start_document().unwrap();
            s.start_element("", "html", "html", &[]).unwrap();
            s.start_element("", "br", "br", &[]).unwrap();
            s.end_element("", "br", "br").unwrap();
            s.end_element("", "html", "html").unwrap();
        });
        assert_eq!(out, "<html><br></html>");
    }

    #[test]
    fn test_text_output_writes_character_data_only() {
        let out = render(OutputMethod::Text, |s| {
            s.start_document().unwrap();
            s.start_element("", "p", "p", &[]).unwrap();
            s.comment("hidden").unwrap();
            s.characters("a & b").unwrap();
            s.end_element("", "p", "p").unwrap();
        });
        assert_eq!(out, "a & b");
    }
}
