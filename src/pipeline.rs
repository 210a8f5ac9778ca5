//! Runs a transformation on a worker thread and streams its result events back.
//!
//! The worker parses the source, transforms it and posts every result event on a
//! bounded channel. The calling thread replays the events into its own handler
//! as they arrive, so only `channel_capacity` events are ever buffered. The
//! channel closing marks completion; a fatal error is posted as the last message.
use crate::TrellisError;
use async_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::thread;
use trellis_dtm::XmlDocument;
use trellis_traits::{Attribute, ContentHandler, HandlerError, OutputMethod, ResultEvent};
use trellis_xslt::{SimplePathEvaluator, Stylesheet, TransformConfig, TransformerBuilder};

/// Stack reserved for the transform worker. Template application recurses
/// natively, so this bounds how deep a stylesheet can nest.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

enum Message {
    Event(ResultEvent),
    Failed(TrellisError),
}

/// Forwards events to the consumer thread.
struct ChannelHandler {
    tx: Sender<Message>,
}

impl ChannelHandler {
    fn post(&mut self, event: ResultEvent) -> Result<(), HandlerError> {
        self.tx
            .send_blocking(Message::Event(event))
            .map_err(|_| HandlerError::Closed)
    }
}

impl ContentHandler for ChannelHandler {
    fn start_document(&mut self) -> Result<(), HandlerError> {
        self.post(ResultEvent::StartDocument)
    }

    fn end_document(&mut self) -> Result<(), HandlerError> {
        self.post(ResultEvent::EndDocument)
    }

    fn start_prefix_mapping(&mut self, prefix: &str, uri: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::StartPrefixMapping {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
        })
    }

    fn end_prefix_mapping(&mut self, prefix: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::EndPrefixMapping {
            prefix: prefix.to_string(),
        })
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &[Attribute],
    ) -> Result<(), HandlerError> {
        self.post(ResultEvent::StartElement {
            uri: uri.to_string(),
            local_name: local_name.to_string(),
            qname: qname.to_string(),
            attributes: attributes.to_vec(),
        })
    }

    fn end_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
    ) -> Result<(), HandlerError> {
        self.post(ResultEvent::EndElement {
            uri: uri.to_string(),
            local_name: local_name.to_string(),
            qname: qname.to_string(),
        })
    }

    fn characters(&mut self, text: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::Characters(text.to_string()))
    }

    fn ignorable_whitespace(&mut self, text: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::IgnorableWhitespace(text.to_string()))
    }

    fn comment(&mut self, text: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::Comment(text.to_string()))
    }

    fn processing_instruction(&mut self, target: &str, data: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        })
    }

    fn start_cdata(&mut self) -> Result<(), HandlerError> {
        self.post(ResultEvent::StartCdata)
    }

    fn end_cdata(&mut self) -> Result<(), HandlerError> {
        self.post(ResultEvent::EndCdata)
    }

    fn start_entity(&mut self, name: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::StartEntity(name.to_string()))
    }

    fn end_entity(&mut self, name: &str) -> Result<(), HandlerError> {
        self.post(ResultEvent::EndEntity(name.to_string()))
    }

    fn start_dtd(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.post(ResultEvent::StartDtd {
            name: name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        })
    }

    fn end_dtd(&mut self) -> Result<(), HandlerError> {
        self.post(ResultEvent::EndDtd)
    }

    fn switch_output_method(&mut self, method: OutputMethod) -> Result<(), HandlerError> {
        self.post(ResultEvent::SwitchOutputMethod(method))
    }
}

/// Parses `xml` and transforms it with `stylesheet` on one scoped worker thread,
/// replaying the result into `handler`. Returns the number of events delivered.
pub fn transform_on_worker(
    xml: &str,
    stylesheet: &Stylesheet,
    evaluator: &SimplePathEvaluator,
    config: &TransformConfig,
    handler: &mut dyn ContentHandler,
) -> Result<u64, TrellisError> {
    config.validate()?;
    let (tx, rx) = async_channel::bounded::<Message>(config.channel_capacity);
    info!(
        "Starting worker transformation with channel capacity {}",
        config.channel_capacity
    );

    thread::scope(|scope| -> Result<u64, TrellisError> {
        let worker = thread::Builder::new()
            .name("trellis-transform".to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn_scoped(scope, move || run_worker(xml, stylesheet, evaluator, config, tx))?;
        let consumed = consume(&rx, handler);
        // Unblocks a worker still posting after the consumer gave up.
        drop(rx);
        let joined = worker.join();
        match (consumed, joined) {
            (_, Err(_)) => Err(TrellisError::Pipeline("transform worker panicked".to_string())),
            (consumed, Ok(())) => consumed,
        }
    })
}

fn run_worker(
    xml: &str,
    stylesheet: &Stylesheet,
    evaluator: &SimplePathEvaluator,
    config: &TransformConfig,
    tx: Sender<Message>,
) {
    debug!("[WORKER] Started.");
    let outcome = transform_into(xml, stylesheet, evaluator, config, tx.clone());
    if let Err(e) = outcome {
        if tx.send_blocking(Message::Failed(e)).is_err() {
            warn!("[WORKER] Consumer closed before the failure could be reported.");
        }
    }
    debug!("[WORKER] Shutting down.");
}

fn transform_into(
    xml: &str,
    stylesheet: &Stylesheet,
    evaluator: &SimplePathEvaluator,
    config: &TransformConfig,
    tx: Sender<Message>,
) -> Result<(), TrellisError> {
    let doc = XmlDocument::parse(xml)?;
    let mut transformer = TransformerBuilder::new(stylesheet, evaluator)
        .content_handler(ChannelHandler { tx })
        .config(config.clone())
        .build()?;
    transformer.transform(doc.root_node())?;
    Ok(())
}

fn consume(rx: &Receiver<Message>, handler: &mut dyn ContentHandler) -> Result<u64, TrellisError> {
    let mut delivered = 0;
    while let Ok(message) = rx.recv_blocking() {
        match message {
            Message::Event(event) => {
                event.replay(handler)?;
                delivered += 1;
            }
            Message::Failed(e) => return Err(e),
        }
    }
    debug!("[CONSUMER] Channel closed after {} events.", delivered);
    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_traits::EventRecorder;
    use trellis_xslt::{Instruction, Template};

    fn copy_names() -> Stylesheet {
        Stylesheet::builder()
            .template(Template::matching(
                "item",
                vec![Instruction::element("name", vec![Instruction::value_of("@id")])],
            ))
            .build()
    }

    #[test]
    fn test_events_cross_a_small_channel() {
        let stylesheet = copy_names();
        let evaluator = SimplePathEvaluator::new();
        let config = TransformConfig {
            channel_capacity: 1,
            ..TransformConfig::default()
        };
        let mut recorder = EventRecorder::new();
        let xml = r#"<list><item id="a"/><item id="b"/><item id="c"/></list>"#;
        let delivered =
            transform_on_worker(xml, &stylesheet, &evaluator, &config, &mut recorder).unwrap();
        assert_eq!(delivered, recorder.len() as u64);
        assert_eq!(recorder.text(), "abc");
        assert_eq!(recorder.events().first(), Some(&ResultEvent::StartDocument));
        assert_eq!(recorder.events().last(), Some(&ResultEvent::EndDocument));
    }

    #[test]
    fn test_parse_failure_is_reported() {
        let stylesheet = copy_names();
        let evaluator = SimplePathEvaluator::new();
        let mut recorder = EventRecorder::new();
        let result = transform_on_worker(
            "<list>",
            &stylesheet,
            &evaluator,
            &TransformConfig::default(),
            &mut recorder,
        );
        assert!(matches!(result, Err(TrellisError::Xml(_))));
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_dtd_events_are_forwarded() {
        let (tx, rx) = async_channel::bounded::<Message>(4);
        let mut forwarder = ChannelHandler { tx };
        forwarder.start_dtd("html", None, Some("about:legacy-compat")).unwrap();
        forwarder.end_dtd().unwrap();
        drop(forwarder);

        let mut recorder = EventRecorder::new();
        assert_eq!(consume(&rx, &mut recorder).unwrap(), 2);
        assert_eq!(
            recorder.events(),
            &[
                ResultEvent::StartDtd {
                    name: "html".to_string(),
                    public_id: None,
                    system_id: Some("about:legacy-compat".to_string()),
                },
                ResultEvent::EndDtd,
            ]
        );
    }

    #[test]
    fn test_unbounded_recursion_stops_on_worker() {
        let stylesheet = Stylesheet::builder()
            .template(Template::matching(
                "loop",
                vec![Instruction::apply_templates_select(".")],
            ))
            .build();
        let evaluator = SimplePathEvaluator::new();
        let mut recorder = EventRecorder::new();
        let result = transform_on_worker(
            "<loop/>",
            &stylesheet,
            &evaluator,
            &TransformConfig::default(),
            &mut recorder,
        );
        assert!(matches!(
            result,
            Err(TrellisError::Xslt(trellis_xslt::XsltError::TemplateStackOverflow(_)))
        ));
    }
}
