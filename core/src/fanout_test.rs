use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::document::{Document, Pos, Range, Surface};
use crate::error::{HandlerError, HandlerResult};
use crate::fanout::{FanOut, StageProbe};
use crate::handler::{
    EditorKind, HandlerContext, HandlerRegistry, LanguageHandler, MatchTarget, Method, SyntaxTree,
};
use crate::host::HostServices;
use crate::marker::{Marker, Severity};
use crate::region::{Part, RegionSplitter, WholeDocumentSplitter};

#[derive(Clone, Copy)]
enum Behaviour {
    Quick,
    SlowOk,
    Fail,
    Panic,
}

struct Recorder {
    name: &'static str,
    behaviour: Behaviour,
    log: Arc<Mutex<Vec<String>>>,
    language: &'static str,
}

#[async_trait]
impl LanguageHandler for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn supports(&self, method: Method) -> bool {
        method == Method::Analyze
    }

    fn handles_language(&self, language: &str) -> bool {
        language == self.language
    }

    fn handles_editor(&self) -> EditorKind {
        EditorKind::Any
    }

    async fn analyze(&self, _ctx: &HandlerContext, _part: &Part, _tree: Option<&SyntaxTree>) -> HandlerResult<Vec<Marker>> {
        self.log.lock().unwrap().push(format!("{}-start", self.name));
        match self.behaviour {
            Behaviour::Quick => {}
            Behaviour::SlowOk => tokio::time::sleep(Duration::from_millis(50)).await,
            Behaviour::Fail => return Err(HandlerError::failed("boom")),
            Behaviour::Panic => panic!("handler exploded"),
        }
        self.log.lock().unwrap().push(format!("{}-end", self.name));
        let pos = Range::point(Pos::new(0, 0));
        Ok(vec![Marker::new(pos, Severity::Info, self.name)])
    }
}

fn setup(specs: &[(&'static str, Behaviour, &'static str)]) -> (HandlerRegistry, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    for (name, behaviour, language) in specs {
        registry
            .register(
                name,
                Arc::new(Recorder {
                    name: *name,
                    behaviour: *behaviour,
                    log: log.clone(),
                    language: *language,
                }),
            )
            .unwrap();
    }
    (registry, log)
}

async fn analyze_all(registry: &HandlerRegistry, probe: &StageProbe) -> Vec<String> {
    let (tx, _rx) = mpsc::unbounded_channel();
    let doc = Document::new("a.js", "javascript", "let a;");
    let ctx = HandlerContext::for_document(&doc, Arc::new(HashSet::new()), false, HostServices::new(tx));
    let part = WholeDocumentSplitter.get_parts(&doc, "javascript").remove(0);
    let target = MatchTarget::new("javascript", part.len_chars(), Surface::Editor, 1 << 20);
    let (ctx, part) = (&ctx, &part);
    FanOut::matching(&registry.snapshot(), Method::Analyze, &target)
        .with_probe(probe)
        .run_concat(|h| async move { h.handler.analyze(ctx, part, None).await })
        .await
        .into_iter()
        .map(|m| m.message)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_handlers_run_strictly_in_order() {
    let (registry, log) = setup(&[
        ("slow", Behaviour::SlowOk, "javascript"),
        ("fast", Behaviour::Quick, "javascript"),
    ]);
    let probe = StageProbe::new();
    let out = analyze_all(&registry, &probe).await;
    assert_eq!(out, vec!["slow", "fast"]);
    assert_eq!(*log.lock().unwrap(), vec!["slow-start", "slow-end", "fast-start", "fast-end"]);
    assert_eq!(probe.current(), "analyze:fast");
}

#[tokio::test]
async fn test_faults_do_not_abort_iteration() {
    let (registry, log) = setup(&[
        ("failing", Behaviour::Fail, "javascript"),
        ("panicking", Behaviour::Panic, "javascript"),
        ("css", Behaviour::Quick, "css"),
        ("last", Behaviour::Quick, "javascript"),
    ]);
    let out = analyze_all(&registry, &StageProbe::new()).await;
    assert_eq!(out, vec!["last"]);
    let log = log.lock().unwrap();
    assert!(log.contains(&"panicking-start".to_string()));
    assert!(!log.iter().any(|entry| entry.starts_with("css")));
}

#[tokio::test]
async fn test_run_last_keeps_last_some() {
    let (registry, _log) = setup(&[("a", Behaviour::Quick, "javascript"), ("b", Behaviour::Quick, "javascript")]);
    let target = MatchTarget::new("javascript", 1, Surface::Editor, 1 << 20);
    let picked = FanOut::matching(&registry.snapshot(), Method::Analyze, &target)
        .run_last(|h| async move {
            Ok(match h.name() {
                "a" => Some(1),
                _ => None,
            })
        })
        .await;
    assert_eq!(picked, Some(1));
}
