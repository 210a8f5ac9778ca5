use crate::content::{Attribute, ContentHandler, HandlerError, OutputMethod};

/// One result-tree event in owned form, replayable into any [`ContentHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum ResultEvent {
    StartDocument,
    EndDocument,
    StartPrefixMapping {
        prefix: String,
        uri: String,
    },
    EndPrefixMapping {
        prefix: String,
    },
    StartElement {
        uri: String,
        local_name: String,
        qname: String,
        attributes: Vec<Attribute>,
    },
    EndElement {
        uri: String,
        local_name: String,
        qname: String,
    },
    Characters(String),
    IgnorableWhitespace(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
    StartCdata,
    EndCdata,
    StartEntity(String),
    EndEntity(String),
    StartDtd {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    EndDtd,
    SwitchOutputMethod(OutputMethod),
}

impl ResultEvent {
    pub fn replay(&self, handler: &mut dyn ContentHandler) -> Result<(), HandlerError> {
        match self {
            ResultEvent::StartDocument => handler.start_document(),
            ResultEvent::EndDocument => handler.end_document(),
            ResultEvent::StartPrefixMapping { prefix, uri } => {
                handler.start_prefix_mapping(prefix, uri)
            }
            ResultEvent::EndPrefixMapping { prefix } => handler.end_prefix_mapping(prefix),
            ResultEvent::StartElement {
                uri,
                local_name,
                qname,
                attributes,
            } => handler.start_element(uri, local_name, qname, attributes),
            ResultEvent::EndElement {
                uri,
                local_name,
                qname,
            } => handler.end_element(uri, local_name, qname),
            ResultEvent::Characters(text) => handler.characters(text),
            ResultEvent::IgnorableWhitespace(text) => handler.ignorable_whitespace(text),
            ResultEvent::Comment(text) => handler.comment(text),
            ResultEvent::ProcessingInstruction { target, data } => {
                handler.processing_instruction(target, data)
            }
            ResultEvent::StartCdata => handler.start_cdata(),
            ResultEvent::EndCdata => handler.end_cdata(),
            ResultEvent::StartEntity(name) => handler.start_entity(name),
            ResultEvent::EndEntity(name) => handler.end_entity(name),
            ResultEvent::StartDtd {
                name,
                public_id,
                system_id,
            } => handler.start_dtd(name, public_id.as_deref(), system_id.as_deref()),
            ResultEvent::EndDtd => handler.end_dtd(),
            ResultEvent::SwitchOutputMethod(method) => handler.switch_output_method(*method),
        }
    }

    /// Short name used in logs and test failure output.
    pub fn label(&self) -> String {
        match self {
            ResultEvent::StartElement { qname, .. } => format!("<{}>", qname),
            ResultEvent::EndElement { qname, .. } => format!("</{}>", qname),
            ResultEvent::Characters(text) => format!("text({:?})", text),
            other => format!("{:?}", other),
        }
    }
}

/// A [`ContentHandler`] that keeps every event it receives.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<ResultEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ResultEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<ResultEvent> {
        self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count(&self, predicate: impl Fn(&ResultEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }

    /// Concatenated character data, ignorable whitespace included.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                ResultEvent::Characters(t) | ResultEvent::IgnorableWhitespace(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replays everything recorded into another handler.
    pub fn replay_into(&self, handler: &mut dyn ContentHandler) -> Result<(), HandlerError> {
        self.events.iter().try_for_each(|event| event.replay(handler))
    }
}

impl ContentHandler for EventRecorder {
    fn start_document(&mut self) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::StartDocument);
        Ok(())
    }

    fn end_document(&mut self) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::EndDocument);
        Ok(())
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::StartPrefixMapping {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::EndPrefixMapping {
            prefix: prefix.to_string(),
        });
        Ok(())
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &[Attribute],
    ) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::StartElement {
            uri: uri.to_string(),
            local_name: local_name.to_string(),
            qname: qname.to_string(),
            attributes: attributes.to_vec(),
        });
        Ok(())
    }

    fn end_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::EndElement {
            uri: uri.to_string(),
            local_name: local_name.to_string(),
            qname: qname.to_string(),
        });
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::Characters(text.to_string()));
        Ok(())
    }

    fn ignorable_whitespace(&mut self, text: &str) -> Result<(), HandlerError> {
        self.events
            .push(ResultEvent::IgnorableWhitespace(text.to_string()));
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::Comment(text.to_string()));
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }

    fn start_cdata(&mut self) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::StartCdata);
        Ok(())
    }

    fn end_cdata(&mut self) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::EndCdata);
        Ok(())
    }

    fn start_entity(&mut self, name: &str) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::StartEntity(name.to_string()));
        Ok(())
    }

    fn end_entity(&mut self, name: &str) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::EndEntity(name.to_string()));
        Ok(())
    }

    fn start_dtd(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::StartDtd {
            name: name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        });
        Ok(())
    }

    fn end_dtd(&mut self) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::EndDtd);
        Ok(())
    }

    fn switch_output_method(&mut self, method: OutputMethod) -> Result<(), HandlerError> {
        self.events.push(ResultEvent::SwitchOutputMethod(method));
        Ok(())
    }
}
