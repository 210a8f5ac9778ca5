#![allow(dead_code)]

use trellis::{
    DiagnosticLog, EventRecorder, ResultEvent, SimplePathEvaluator, Stylesheet, TransformConfig,
    TransformerBuilder, XmlDocument, XsltError,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The outcome of one transformation: its result, the events it produced and
/// the diagnostics it reported.
pub struct Run {
    pub result: Result<(), XsltError>,
    pub events: EventRecorder,
    pub log: DiagnosticLog,
}

impl Run {
    pub fn text(&self) -> String {
        self.events.text()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.events().iter().map(ResultEvent::label).collect()
    }
}

pub fn run(xml: &str, stylesheet: &Stylesheet) -> Run {
    run_with(xml, stylesheet, TransformConfig::default())
}

pub fn run_with(xml: &str, stylesheet: &Stylesheet, config: TransformConfig) -> Run {
    init_logger();
    let doc = XmlDocument::parse(xml).expect("test XML should parse");
    let evaluator = SimplePathEvaluator::new();
    let mut events = EventRecorder::new();
    let mut log = DiagnosticLog::new();
    let result = {
        let mut transformer = TransformerBuilder::new(stylesheet, &evaluator)
            .content_handler(&mut events)
            .error_listener(&mut log)
            .config(config)
            .build()
            .expect("transformer should build");
        transformer.transform(doc.root_node())
    };
    Run {
        result,
        events,
        log,
    }
}

/// Runs a transformation that must succeed and returns its character data.
pub fn text_of(xml: &str, stylesheet: &Stylesheet) -> String {
    let run = run(xml, stylesheet);
    if let Err(e) = &run.result {
        panic!("transformation failed: {}", e);
    }
    run.text()
}
