//! Integration tests for turns, ingestion and replay
//!
//! Live turns run against a scripted event source or a local HTTP backend.
//! Replay tests use the recorded session in `tests/fixtures/replay/`.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deepquant_core::config::{ApiConfig, ChatSettings, ReplayConfig};
use deepquant_core::stream::{BoxFuture, ChatRequest, EventStream};
use deepquant_core::{
    ChatEvent, Config, Conversation, Error, EventKind, EventSource, FinishReason, InterruptOption,
    Pacing, ReplayLog, ReplaySession, Role, Store, ToolCall, ToolCallResult, TurnState,
};
use futures::StreamExt;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/replay")
        .join(name)
}

/// How a scripted stream ends
enum End {
    Close,
    Hang,
    Fail(&'static str),
}

struct Script {
    events: Vec<ChatEvent>,
    end: End,
}

impl Script {
    fn closing(events: Vec<ChatEvent>) -> Self {
        Self {
            events,
            end: End::Close,
        }
    }
}

/// Plays one script per opened stream and records every request.
struct ScriptedSource {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedSource {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl EventSource for ScriptedSource {
    fn open<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, deepquant_core::Result<EventStream>> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::closing(Vec::new()));
        Box::pin(async move {
            let events = futures::stream::iter(script.events.into_iter().map(Ok::<ChatEvent, Error>));
            let stream: EventStream = match script.end {
                End::Close => Box::pin(events),
                End::Hang => Box::pin(events.chain(futures::stream::pending())),
                End::Fail(reason) => Box::pin(events.chain(futures::stream::once(async move {
                    Err(Error::StreamTransport(reason.to_string()))
                }))),
            };
            Ok(stream)
        })
    }
}

fn conversation(source: Arc<ScriptedSource>) -> Conversation {
    Conversation::new(Store::new("thread-1"), source, ChatSettings::default())
}

/// Wait until the store satisfies `ready`.
async fn wait_for(store: &Store, ready: impl Fn(&Store) -> bool) {
    let mut changes = store.subscribe();
    while !ready(store) {
        tokio::time::timeout(Duration::from_secs(5), changes.changed())
            .await
            .expect("store did not change in time")
            .unwrap();
    }
}

fn fast_replay_config() -> ReplayConfig {
    ReplayConfig {
        chunk_delay_ms: 1,
        tool_result_delay_ms: 2,
        finish_delay_ms: 2,
        default_delay_ms: 1,
        fast_forward_scale: 0.0,
    }
}

// ============================================
// Turn scenarios
// ============================================

#[tokio::test]
async fn test_send_hello() {
    let source = ScriptedSource::new(vec![Script::closing(vec![
        ChatEvent::chunk("m1", "He").with_agent("coordinator"),
        ChatEvent::chunk("m1", "llo"),
        ChatEvent::finish("m1", "stop"),
    ])]);
    let conv = conversation(source.clone());

    let summary = conv.send("AAA", None, None).await.unwrap();
    assert_eq!(summary.outcome, TurnState::Finished);

    let msg = conv.store().message("m1").unwrap();
    assert_eq!(msg.content, "Hello");
    assert_eq!(msg.content, msg.content_chunks.concat());
    assert!(!msg.is_streaming);
    assert_eq!(msg.finish_reason, Some(FinishReason::Stop));

    let messages = conv.store().messages();
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "AAA");
    assert!(!conv.responding());

    let requests = source.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].thread_id, "thread-1");
    assert_eq!(requests[0].text(), Some("AAA"));
}

#[tokio::test]
async fn test_send_while_responding_is_rejected() {
    let source = ScriptedSource::new(vec![Script {
        events: vec![ChatEvent::chunk("m1", "Working")],
        end: End::Hang,
    }]);
    let conv = conversation(source.clone());

    let running = conv.clone();
    let first = tokio::spawn(async move { running.send("first", None, None).await });
    wait_for(conv.store(), |s| s.message("m1").is_some()).await;
    assert!(conv.responding());
    assert!(conv.store().responding());

    let before = conv.store().snapshot();
    let err = conv.send("second", None, None).await.unwrap_err();
    assert!(matches!(err, Error::TurnInProgress));
    assert_eq!(conv.store().snapshot(), before);
    assert_eq!(source.requests().len(), 1);

    conv.cancel().unwrap();
    assert!(matches!(first.await.unwrap(), Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_tool_result_before_chunk() {
    let source = ScriptedSource::new(vec![Script::closing(vec![
        ChatEvent::new(
            "run-res",
            EventKind::ToolCall(ToolCall {
                id: "c1".to_string(),
                name: "web_search".to_string(),
                args: serde_json::json!({"query": "AAPL"}),
            }),
        ),
        ChatEvent::new(
            "tool-1",
            EventKind::ToolResult(ToolCallResult {
                call_id: "c1".to_string(),
                content: "results".to_string(),
            }),
        ),
        ChatEvent::new(
            "tool-2",
            EventKind::ToolResult(ToolCallResult {
                call_id: "c-unknown".to_string(),
                content: "lost".to_string(),
            }),
        ),
        ChatEvent::chunk("run-res", "Summary"),
        ChatEvent::finish("run-res", "stop"),
    ])]);
    let conv = conversation(source);

    conv.send("", None, None).await.unwrap();

    let created = conv.store().message("tool-1").unwrap();
    assert!(created.content.is_empty());
    let owner = conv.store().message("run-res").unwrap();
    assert_eq!(owner.tool_result("c1").unwrap().content, "results");
    assert_eq!(owner.tool_call_results.len(), 1);
    assert_eq!(owner.content, "Summary");
    assert!(conv.store().message("tool-2").is_none());
    assert_eq!(
        conv.store().message_ids(),
        vec!["run-res".to_string(), "tool-1".to_string()]
    );

    // Nothing is left streaming after the turn
    assert!(conv.store().read(|s| s.log.streaming_ids().is_empty()));
}

#[tokio::test]
async fn test_cancel_then_send_again() {
    let source = ScriptedSource::new(vec![
        Script {
            events: vec![
                ChatEvent::chunk("m1", "Part"),
                ChatEvent::chunk("m2", "Other"),
            ],
            end: End::Hang,
        },
        Script::closing(vec![ChatEvent::chunk("m3", "Again"), ChatEvent::finish("m3", "stop")]),
    ]);
    let conv = conversation(source);

    let running = conv.clone();
    let handle = tokio::spawn(async move { running.send("first", None, None).await });
    wait_for(conv.store(), |s| s.message("m2").is_some()).await;
    assert_eq!(conv.turns().state(), TurnState::Streaming);

    conv.cancel().unwrap();
    assert!(matches!(handle.await.unwrap(), Err(Error::Cancelled)));
    assert!(!conv.responding());
    assert_eq!(conv.turns().last_outcome(), Some(TurnState::Cancelled));
    for id in ["m1", "m2"] {
        let msg = conv.store().message(id).unwrap();
        assert!(!msg.is_streaming);
        assert_eq!(msg.finish_reason, Some(FinishReason::Cancelled));
    }
    assert!(conv.store().notices().is_empty());

    let summary = conv.send("second", None, None).await.unwrap();
    assert_eq!(summary.outcome, TurnState::Finished);
    assert_eq!(conv.store().message("m3").unwrap().content, "Again");
}

#[tokio::test]
async fn test_transport_error_finishes_with_error() {
    let source = ScriptedSource::new(vec![Script {
        events: vec![ChatEvent::chunk("m1", "Half")],
        end: End::Fail("connection reset"),
    }]);
    let conv = conversation(source);

    let err = conv.send("q", None, None).await.unwrap_err();
    assert!(matches!(err, Error::StreamTransport(_)));
    assert_eq!(
        conv.store().message("m1").unwrap().finish_reason,
        Some(FinishReason::Error)
    );
    assert_eq!(conv.store().notices().len(), 1);
    assert_eq!(conv.turns().state(), TurnState::Idle);
}

// ============================================
// Feedback and interrupts
// ============================================

#[tokio::test]
async fn test_feedback_kept_on_failure_cleared_on_success() {
    let source = ScriptedSource::new(vec![
        Script {
            events: Vec::new(),
            end: End::Fail("unavailable"),
        },
        Script::closing(vec![ChatEvent::chunk("m1", "ok")]),
    ]);
    let conv = conversation(source.clone());
    conv.select_feedback(InterruptOption {
        text: "Edit plan".to_string(),
        value: "edit_plan".to_string(),
    });

    assert!(conv.send("Add a step on margins", None, None).await.is_err());
    assert!(conv.pending_feedback().is_some());

    conv.send("Add a step on margins", None, None).await.unwrap();
    assert!(conv.pending_feedback().is_none());

    let requests = source.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.interrupt_feedback.as_deref(), Some("edit_plan"));
    }
}

#[tokio::test]
async fn test_interrupt_and_response() {
    let options = vec![
        InterruptOption {
            text: "Edit plan".to_string(),
            value: "edit_plan".to_string(),
        },
        InterruptOption {
            text: "Start research".to_string(),
            value: "accepted".to_string(),
        },
    ];
    let source = ScriptedSource::new(vec![
        Script::closing(vec![
            ChatEvent::chunk("plan-1", "1. Revenue\n2. Margins").with_agent("planner"),
            ChatEvent::new(
                "plan-1",
                EventKind::Interrupt {
                    options: options.clone(),
                },
            ),
        ]),
        Script::closing(vec![ChatEvent::chunk("r-1", "Searching").with_agent("researcher")]),
    ]);
    let conv = conversation(source.clone());

    conv.send("Research TSMC", None, None).await.unwrap();
    let plan = conv.store().message("plan-1").unwrap();
    assert_eq!(plan.finish_reason, Some(FinishReason::Interrupt));
    assert_eq!(plan.options, options);

    conv.respond_to_interrupt(options[1].clone(), None).await.unwrap();
    let requests = source.requests();
    assert_eq!(requests[1].interrupt_feedback.as_deref(), Some("accepted"));
    assert_eq!(requests[1].text(), Some("Start research"));
    assert!(conv.pending_feedback().is_none());

    let user = conv
        .store()
        .messages()
        .into_iter()
        .filter(|m| m.role == Role::User)
        .last()
        .unwrap();
    assert_eq!(user.interrupt_feedback.as_deref(), Some("accepted"));
}

// ============================================
// Replay
// ============================================

#[test]
fn test_load_fixture() {
    let log = ReplayLog::load(&fixture_path("research-session.sse"), &ReplayConfig::default())
        .expect("fixture should load");
    assert_eq!(log.len(), 16);
    assert!(log
        .entries()
        .iter()
        .any(|e| matches!(&e.event.kind, EventKind::Unknown { event_type } if event_type == "heartbeat")));
}

#[tokio::test]
async fn test_replay_research_session() {
    let config = fast_replay_config();
    let log = ReplayLog::load(&fixture_path("research-session.sse"), &config).unwrap();
    let session = Arc::new(ReplaySession::new(log, &config).with_pacing(Pacing::FastForward));
    let conv = Conversation::replay(session.clone(), ChatSettings::default());

    let summary = conv.send("", None, None).await.unwrap();
    assert_eq!(summary.events, 16);
    assert_eq!(session.delivered(), 16);

    let store = conv.store();
    assert_eq!(
        store.message_ids(),
        vec!["run-coord", "run-plan", "run-res", "tool-1", "run-code", "run-rep"]
    );
    assert_eq!(store.message("run-coord").unwrap().content, "Let me research NVDA.");
    assert_eq!(store.message("run-rep").unwrap().thread_id, "thread-nvda");

    assert!(store.has_report("run-res"));
    assert_eq!(store.report_message_id("run-res").as_deref(), Some("run-rep"));
    assert_eq!(
        conv.report_text("run-res").as_deref(),
        Some("# NVDA Outlook\n\nData center demand drives growth.")
    );
    assert!(!store.report_streaming("run-res"));
    assert_eq!(store.open_research_id().as_deref(), Some("run-res"));

    let research = store.read(|s| s.research.clone());
    assert_eq!(research.activities("run-res"), &["run-res", "tool-1", "run-code", "run-rep"]);
    assert_eq!(research.ongoing_research_id(), None);

    let res = store.message("run-res").unwrap();
    assert_eq!(res.tool_result("call-1").unwrap().content, "[{\"title\": \"NVDA Q1 results\"}]");

    conv.close_research();
    assert_eq!(store.open_research_id(), None);

    // A session plays once
    let err = conv.send("", None, None).await.unwrap_err();
    assert!(err.to_string().contains("already started"));
}

#[tokio::test]
async fn test_replay_pacing_does_not_change_result() {
    let config = fast_replay_config();
    let log = Arc::new(ReplayLog::load(&fixture_path("research-session.sse"), &config).unwrap());

    let normal = Conversation::new(
        Store::new("replay"),
        Arc::new(ReplaySession::new(log.clone(), &config)),
        ChatSettings::default(),
    );
    let fast = Conversation::new(
        Store::new("replay"),
        Arc::new(ReplaySession::new(log, &config).with_pacing(Pacing::FastForward)),
        ChatSettings::default(),
    );

    normal.send("", None, None).await.unwrap();
    fast.send("", None, None).await.unwrap();

    assert_eq!(normal.store().snapshot(), fast.store().snapshot());
}

#[tokio::test]
async fn test_toggle_fast_forward_mid_replay() {
    let config = ReplayConfig {
        chunk_delay_ms: 30,
        ..fast_replay_config()
    };
    let events = (0..10)
        .map(|i| ChatEvent::chunk("m1", format!("{} ", i)))
        .chain(std::iter::once(ChatEvent::finish("m1", "stop")))
        .collect();
    let log = ReplayLog::from_events(events, &config);
    let session = Arc::new(ReplaySession::new(log, &config));
    let mut stream = session.start().unwrap();

    let mut seen = Vec::new();
    while let Some(event) = stream.next().await {
        let event = event.unwrap();
        if let EventKind::Chunk { delta } = &event.kind {
            seen.push(delta.clone());
        }
        if seen.len() == 3 && session.pacing() == Pacing::Normal {
            session.toggle_fast_forward();
        }
    }

    let expected: Vec<_> = (0..10).map(|i| format!("{} ", i)).collect();
    assert_eq!(seen, expected);
    assert_eq!(session.delivered(), 11);
    assert_eq!(session.pacing(), Pacing::FastForward);
}

// ============================================
// Local HTTP backend
// ============================================

/// Canned response for one connection
enum Reply {
    Json(String),
    Audio(Vec<u8>),
    /// Chunked event stream: one frame per `gap`, then wait on `hold` (if
    /// any) before closing
    Sse {
        frames: Vec<String>,
        gap: Duration,
        hold: Option<oneshot::Receiver<()>>,
    },
    /// Send nothing until signalled
    After(oneshot::Receiver<()>, Box<Reply>),
}

/// Serves one reply per accepted connection, in order, and records each
/// request line.
struct Backend {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Backend {
    async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();
        tokio::spawn(async move {
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request_line = read_request(&mut socket).await;
                seen.lock().unwrap().push(request_line);
                write_reply(&mut socket, reply).await;
            }
        });
        Self {
            base_url: format!("http://{}/api", addr),
            requests,
        }
    }

    fn config(&self, timeout_secs: u64) -> Config {
        Config {
            api: ApiConfig {
                base_url: self.base_url.clone(),
                user_id: Some("3".to_string()),
                timeout_secs,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Read one request (head and body); returns its request line.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let body_len = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            return head.lines().next().unwrap_or_default().to_string();
        }
    }
}

async fn write_reply(socket: &mut TcpStream, reply: Reply) {
    let mut reply = reply;
    let reply = loop {
        match reply {
            Reply::After(ready, inner) => {
                let _ = ready.await;
                reply = *inner;
            }
            other => break other,
        }
    };

    match reply {
        Reply::Json(body) => write_body(socket, "application/json", body.as_bytes()).await,
        Reply::Audio(bytes) => write_body(socket, "audio/mp3", &bytes).await,
        Reply::Sse { frames, gap, hold } => {
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\
                        Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            for frame in frames {
                tokio::time::sleep(gap).await;
                let chunk = format!("{:x}\r\n{}\r\n", frame.len(), frame);
                let _ = socket.write_all(chunk.as_bytes()).await;
            }
            if let Some(hold) = hold {
                let _ = hold.await;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
        }
        Reply::After(..) => unreachable!("unwrapped above"),
    }
    let _ = socket.shutdown().await;
}

async fn write_body(socket: &mut TcpStream, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        content_type,
        body.len()
    );
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(body).await;
}

fn frame(event: &str, data: serde_json::Value) -> String {
    format!("event: {}\ndata: {}\n\n", event, data)
}

fn agent_chunk(id: &str, agent: &str, content: &str, finish: bool) -> String {
    let mut data = json!({
        "id": id,
        "thread_id": "thread-live",
        "agent": agent,
        "role": "assistant",
        "content": content,
    });
    if finish {
        data["finish_reason"] = json!("stop");
    }
    frame("message_chunk", data)
}

async fn wait_for_state(conv: &Conversation, state: TurnState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while conv.turns().state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("turn state not reached in time");
}

#[tokio::test]
async fn test_slow_stream_outlives_request_timeout() {
    deepquant_core::logging::init_test();
    let frames = (0..4)
        .map(|i| agent_chunk("m1", "coordinator", &i.to_string(), false))
        .collect();
    let backend = Backend::start(vec![Reply::Sse {
        frames,
        gap: Duration::from_millis(400),
        hold: None,
    }])
    .await;
    let conv = Conversation::connect(&backend.config(1)).unwrap();

    let summary = conv.send("Analyze TSLA", None, None).await.unwrap();

    assert_eq!(summary.outcome, TurnState::Finished);
    assert_eq!(summary.events, 4);
    let msg = conv.store().message("m1").unwrap();
    assert_eq!(msg.content, "0123");
    assert_eq!(msg.finish_reason, Some(FinishReason::Stop));
    assert!(conv.store().notices().is_empty());
    assert!(backend.requests()[0].starts_with("POST /api/chat/stream"));
}

#[tokio::test]
async fn test_load_thread_replaces_log_and_blocks_sends() {
    deepquant_core::logging::init_test();
    let (release, ready) = oneshot::channel();
    let history = json!({
        "id": 7,
        "thread_id": "thread-old",
        "title": "AAPL outlook",
        "content": "Report body",
        "messages": [
            {"id": 1, "role": "user", "content": "Analyze AAPL"},
            {"id": 2, "role": "assistant", "content": "Done"}
        ]
    });
    let backend = Backend::start(vec![
        Reply::Sse {
            frames: vec![
                agent_chunk("run-res", "researcher", "Found data", true),
                agent_chunk("run-rep", "reporter", "# AAPL", true),
            ],
            gap: Duration::ZERO,
            hold: None,
        },
        Reply::After(ready, Box::new(Reply::Json(history.to_string()))),
    ])
    .await;
    let conv = Conversation::connect(&backend.config(5)).unwrap();

    conv.send("Research AAPL", None, None).await.unwrap();
    assert!(conv.store().has_report("run-res"));
    assert_eq!(conv.report_text("run-res").as_deref(), Some("# AAPL"));

    let loading = conv.clone();
    let load = tokio::spawn(async move { loading.load_thread("thread-old").await });
    wait_for_state(&conv, TurnState::Loading).await;

    let err = conv.send("too early", None, None).await.unwrap_err();
    assert!(matches!(err, Error::TurnInProgress));

    release.send(()).unwrap();
    assert_eq!(load.await.unwrap().unwrap(), 2);
    assert_eq!(conv.turns().state(), TurnState::Idle);
    assert_eq!(backend.requests().len(), 2);

    let store = conv.store();
    assert_eq!(store.thread_id(), "thread-old");
    assert_eq!(store.message_ids(), vec!["1".to_string(), "2".to_string()]);
    assert_eq!(store.messages()[0].role, Role::User);
    assert!(!store.has_report("run-res"));
    assert!(conv.report_text("run-res").is_none());
    assert!(backend.requests()[1].starts_with("GET /api/reports/thread/thread-old?user_id=3"));
}

#[tokio::test]
async fn test_podcast_waits_for_finished_report() {
    deepquant_core::logging::init_test();
    let (finish, hold) = oneshot::channel();
    let backend = Backend::start(vec![
        Reply::Sse {
            frames: vec![agent_chunk("run-rep", "reporter", "# NVDA", false)],
            gap: Duration::ZERO,
            hold: Some(hold),
        },
        Reply::Audio(b"ID3-audio".to_vec()),
    ])
    .await;
    let conv = Conversation::connect(&backend.config(5)).unwrap();

    let running = conv.clone();
    let turn = tokio::spawn(async move { running.send("Research NVDA", None, None).await });
    wait_for(conv.store(), |s| s.has_report("run-rep")).await;
    assert!(conv.store().report_streaming("run-rep"));

    let err = conv.generate_podcast("run-rep").await.unwrap_err();
    assert!(matches!(&err, Error::Api(msg) if msg.contains("still streaming")));
    assert!(matches!(
        conv.generate_podcast("no-such-research").await,
        Err(Error::Api(_))
    ));
    assert_eq!(backend.requests().len(), 1);

    finish.send(()).unwrap();
    turn.await.unwrap().unwrap();
    assert!(!conv.store().report_streaming("run-rep"));

    let audio = conv.generate_podcast("run-rep").await.unwrap();
    assert_eq!(audio, b"ID3-audio".to_vec());
    assert!(backend.requests()[1].starts_with("POST /api/podcast/generate"));
}
