mod common;

use std::sync::Arc;

use common::{CallLog, Harness, ScriptSplitter, ScriptedHandler, at, settle};
use plexus_core::handler::{Definition, OutlineItem};
use plexus_core::{Inbound, Marker, Method, Outbound, Pos, Quickfix, Range, Severity, WorkerConfig};

const PAGE: &str = "<div>\n<script>function go() {}\nfunction stop() {}</script>\n</div>";

fn script_harness(handlers: Vec<ScriptedHandler>) -> Harness {
    let splitter = Arc::new(ScriptSplitter { start: Pos::new(1, 8) });
    Harness::with_splitter(WorkerConfig::default(), handlers, splitter)
}

fn item(name: &str, pos: Range) -> OutlineItem {
    OutlineItem {
        name: name.to_string(),
        kind: Some("function".into()),
        pos,
        items: Vec::new(),
    }
}

fn fix(label: &str, pos: Range) -> Quickfix {
    Quickfix {
        label: label.to_string(),
        pos,
        replacement: String::new(),
        preview: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_outline_items_are_reoffset() {
    let log = CallLog::default();
    let js = ScriptedHandler::new("js", "javascript", &log).with_outline(vec![
        item("go", at(0, 9, 11)),
        item("stop", at(1, 9, 13)),
    ]);
    let mut harness = script_harness(vec![js]);
    harness.open("page.html", "html", PAGE);
    settle(1).await;
    harness.drain();

    harness.send(Inbound::Outline);
    settle(1).await;

    let outline = harness
        .drain()
        .into_iter()
        .find_map(|event| match event {
            Outbound::Outline(outline) => Some(outline),
            _ => None,
        })
        .unwrap();
    let positions: Vec<Range> = outline.items.iter().map(|i| i.pos).collect();
    assert_eq!(positions, vec![at(1, 17, 19), at(2, 9, 13)]);
}

#[tokio::test(start_paused = true)]
async fn test_code_format_splices_formatted_part() {
    let log = CallLog::default();
    let js = ScriptedHandler::new("js", "javascript", &log).formatting_to("go();");
    let mut harness = script_harness(vec![js]);
    harness.open("page.html", "html", PAGE);
    settle(1).await;
    harness.drain();

    harness.send(Inbound::CodeFormat);
    settle(1).await;

    let formatted: Vec<String> = harness
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            Outbound::CodeFormat(text) => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(formatted, vec!["<div>\n<script>go();".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_code_format_without_changes_is_silent() {
    let log = CallLog::default();
    let js = ScriptedHandler::new("js", "javascript", &log).formatting_to("let a;");
    let mut harness = Harness::start(WorkerConfig::default(), vec![js]);
    harness.open("a.js", "javascript", "let a;");
    settle(1).await;
    harness.drain();

    harness.send(Inbound::CodeFormat);
    settle(1).await;

    assert!(
        !harness
            .drain()
            .iter()
            .any(|event| matches!(event, Outbound::CodeFormat(_)))
    );
    assert_eq!(log.count(Method::CodeFormat), 1);
}

#[tokio::test(start_paused = true)]
async fn test_definitions_in_other_files_keep_their_positions() {
    let log = CallLog::default();
    let js = ScriptedHandler::new("js", "javascript", &log).with_definitions(vec![
        Definition {
            path: None,
            pos: at(1, 9, 13),
        },
        Definition {
            path: Some("lib.js".into()),
            pos: at(3, 0, 4),
        },
    ]);
    let mut harness = script_harness(vec![js]);
    harness.open("page.html", "html", PAGE);
    settle(1).await;
    harness.drain();

    harness.send(Inbound::JumpToDefinition { pos: Pos::new(1, 19) });
    settle(1).await;

    let (results, identifier) = harness
        .drain()
        .into_iter()
        .find_map(|event| match event {
            Outbound::Definition { results, identifier } => Some((results, identifier)),
            _ => None,
        })
        .unwrap();
    assert_eq!(identifier, "go");
    assert_eq!(results[0].pos, at(2, 9, 13));
    assert_eq!(results[1].pos, at(3, 0, 4));
    assert_eq!(results[1].path.as_deref(), Some("lib.js"));
}

#[tokio::test(start_paused = true)]
async fn test_quickfixes_merge_marker_resolutions_and_handler_fixes() {
    let log = CallLog::default();
    let marker = Marker::new(at(0, 4, 5), Severity::Warning, "unused a").with_resolution(fix("remove a", at(0, 0, 10)));
    let js = ScriptedHandler::new("js", "javascript", &log)
        .with_markers(vec![marker])
        .with_quickfixes(vec![fix("rename a", at(0, 4, 5))]);
    let mut harness = Harness::start(WorkerConfig::default(), vec![js]);
    harness.open("a.js", "javascript", "let a = 1;");
    settle(1).await;
    harness.drain();

    harness.send(Inbound::Quickfixes { pos: Pos::new(0, 4) });
    settle(1).await;

    let fixes = harness
        .drain()
        .into_iter()
        .find_map(|event| match event {
            Outbound::QuickfixesResult(fixes) => Some(fixes),
            _ => None,
        })
        .unwrap();
    let labels: Vec<&str> = fixes.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["remove a", "rename a"]);
}

#[tokio::test(start_paused = true)]
async fn test_commit_rename_reports_first_error() {
    let log = CallLog::default();
    let ok = ScriptedHandler::new("ok", "javascript", &log).renaming(None);
    let first = ScriptedHandler::new("first", "javascript", &log).renaming(Some("name taken"));
    let second = ScriptedHandler::new("second", "javascript", &log).renaming(Some("read only"));
    let mut harness = Harness::start(WorkerConfig::default(), vec![ok, first, second]);
    harness.open("a.js", "javascript", "let a = 1;");
    settle(1).await;
    harness.drain();

    harness.send(Inbound::CommitRename {
        old_id: "a".into(),
        new_name: "b".into(),
        is_generated: false,
    });
    settle(1).await;

    let events = harness.drain();
    assert!(events.contains(&Outbound::CommitRenameResult {
        err: Some("name taken".into())
    }));
    assert_eq!(log.count(Method::CommitRename), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_handler_registration_is_reported() {
    let mut harness = Harness::start(WorkerConfig::default(), Vec::new());

    harness.send(Inbound::Register {
        handler_id: "nope".into(),
        source: None,
    });

    assert_eq!(
        harness.drain(),
        vec![Outbound::Registered {
            path: "nope".into(),
            err: Some("handler not found: nope".into()),
        }]
    );
    assert!(harness.worker.handler_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unregistered_handler_is_no_longer_called() {
    let log = CallLog::default();
    let js = ScriptedHandler::new("js", "javascript", &log);
    let harness = Harness::start(WorkerConfig::default(), vec![js]);
    harness.open("a.js", "javascript", "let a;");
    settle(1).await;
    assert_eq!(log.count(Method::Analyze), 1);

    harness.send(Inbound::Unregister {
        handler_id: "js".into(),
    });
    settle(1).await;
    harness.send(Inbound::Analyze);
    settle(1).await;

    assert_eq!(log.count(Method::Analyze), 1);
    assert!(harness.worker.handler_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_definition_identifier_follows_language_identifier_chars() {
    let log = CallLog::default();
    let css = ScriptedHandler::new("css", "css", &log)
        .with_identifier_chars(r"[A-Za-z0-9_\-]")
        .with_definitions(vec![Definition {
            path: None,
            pos: at(0, 7, 18),
        }]);
    let mut harness = Harness::start(WorkerConfig::default(), vec![css]);
    harness.open("a.css", "css", "color: back-ground;");
    settle(1).await;
    harness.drain();

    harness.send(Inbound::JumpToDefinition { pos: Pos::new(0, 10) });
    settle(1).await;

    let identifier = harness
        .drain()
        .into_iter()
        .find_map(|event| match event {
            Outbound::Definition { identifier, .. } => Some(identifier),
            _ => None,
        })
        .unwrap();
    assert_eq!(identifier, "back-ground");
}
