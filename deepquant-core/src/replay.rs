//! Replay of recorded conversations
//!
//! A replay file is the SSE text the backend sent, optionally with a
//! `delay_ms` field in each frame's data recording how long the client waited
//! before that frame. Frames without one use the per-kind defaults from
//! [`ReplayConfig`].
//!
//! A [`ReplaySession`] is an [`EventSource`] that emits the log once, in
//! order. Fast-forward scales every remaining delay by
//! `fast_forward_scale` (zero by default); toggling it mid-delay takes effect
//! immediately and never re-emits or skips an event.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ReplayConfig;
use crate::error::{Error, Result};
use crate::stream::{
    parse_sse_text, BoxFuture, ChatEvent, ChatRequest, EventKind, EventSource, EventStream,
};

/// How fast a replay runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Recorded delays
    #[default]
    Normal,
    /// Delays scaled toward zero
    FastForward,
}

/// One recorded event and the delay before it
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEvent {
    pub delay: Duration,
    pub event: ChatEvent,
}

/// A fixed, ordered event log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayLog {
    events: Vec<ReplayEvent>,
}

impl ReplayLog {
    /// Parse SSE text. Malformed frames are skipped with a warning.
    pub fn parse(text: &str, config: &ReplayConfig) -> Self {
        let mut events = Vec::new();
        for (index, frame) in parse_sse_text(text).into_iter().enumerate() {
            let decoded = match ChatEvent::decode(&frame.event, &frame.data) {
                Ok(decoded) => decoded,
                Err(e) => {
                    tracing::warn!(frame = index, event_type = %frame.event, error = %e, "Skipping malformed replay frame");
                    continue;
                }
            };
            // The frame's delay comes before its first event; the rest follow at once.
            for (i, event) in decoded.into_iter().enumerate() {
                let delay = if i == 0 {
                    event
                        .delay_ms
                        .map(Duration::from_millis)
                        .unwrap_or_else(|| default_delay(config, &event.kind))
                } else {
                    Duration::ZERO
                };
                events.push(ReplayEvent { delay, event });
            }
        }
        tracing::debug!(events = events.len(), "Parsed replay log");
        Self { events }
    }

    /// Read and parse a replay file.
    pub fn load(path: &Path, config: &ReplayConfig) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let log = Self::parse(&text, config);
        tracing::info!(path = %path.display(), events = log.len(), "Loaded replay log");
        Ok(log)
    }

    /// Build a log from events, using their recorded delays or the defaults.
    pub fn from_events(events: Vec<ChatEvent>, config: &ReplayConfig) -> Self {
        let events = events
            .into_iter()
            .map(|event| ReplayEvent {
                delay: event
                    .delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| default_delay(config, &event.kind)),
                event,
            })
            .collect();
        Self { events }
    }

    /// Write the log back out as a replay file body.
    pub fn to_sse(&self) -> Result<String> {
        let mut out = String::new();
        for entry in &self.events {
            let delay_ms = u64::try_from(entry.delay.as_millis()).unwrap_or(u64::MAX);
            out.push_str(&entry.event.clone().with_delay_ms(delay_ms).encode()?);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn entries(&self) -> &[ReplayEvent] {
        &self.events
    }

    /// Sum of all delays at normal pacing
    pub fn total_delay(&self) -> Duration {
        self.events.iter().map(|e| e.delay).sum()
    }
}

fn default_delay(config: &ReplayConfig, kind: &EventKind) -> Duration {
    let ms = match kind {
        EventKind::Chunk { .. } => config.chunk_delay_ms,
        EventKind::ToolResult(_) => config.tool_result_delay_ms,
        EventKind::Finish { .. } | EventKind::Interrupt { .. } => config.finish_delay_ms,
        _ => config.default_delay_ms,
    };
    Duration::from_millis(ms)
}

/// One pass over a [`ReplayLog`]
///
/// Not restartable: a second [`ReplaySession::start`] fails with
/// [`Error::ReplayAlreadyStarted`]. Create a new session to replay again.
#[derive(Debug)]
pub struct ReplaySession {
    log: Arc<ReplayLog>,
    pacing: watch::Sender<Pacing>,
    fast_forward_scale: f64,
    started: AtomicBool,
    cursor: Arc<AtomicUsize>,
}

impl ReplaySession {
    pub fn new(log: impl Into<Arc<ReplayLog>>, config: &ReplayConfig) -> Self {
        let (pacing, _) = watch::channel(Pacing::Normal);
        Self {
            log: log.into(),
            pacing,
            fast_forward_scale: if config.fast_forward_scale.is_nan() {
                0.0
            } else {
                config.fast_forward_scale.clamp(0.0, 1.0)
            },
            started: AtomicBool::new(false),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_pacing(self, pacing: Pacing) -> Self {
        self.pacing.send_replace(pacing);
        self
    }

    pub fn log(&self) -> &Arc<ReplayLog> {
        &self.log
    }

    pub fn pacing(&self) -> Pacing {
        *self.pacing.borrow()
    }

    /// Switch between normal and fast-forward pacing. Returns the new pacing.
    pub fn toggle_fast_forward(&self) -> Pacing {
        let next = match self.pacing() {
            Pacing::Normal => Pacing::FastForward,
            Pacing::FastForward => Pacing::Normal,
        };
        self.pacing.send_replace(next);
        tracing::debug!(pacing = ?next, delivered = self.delivered(), "Replay pacing changed");
        next
    }

    /// Number of events emitted so far
    pub fn delivered(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Begin emitting events.
    pub fn start(&self) -> Result<EventStream> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::ReplayAlreadyStarted);
        }
        tracing::info!(events = self.log.len(), pacing = ?self.pacing(), "Replay started");

        let state = Cursor {
            log: Arc::clone(&self.log),
            next: 0,
            cursor: Arc::clone(&self.cursor),
            pacing: self.pacing.subscribe(),
            scale: self.fast_forward_scale,
        };
        let stream = futures::stream::unfold(state, |mut state| async move {
            let entry = state.log.entries().get(state.next)?.clone();
            pace(entry.delay, &mut state.pacing, state.scale).await;
            state.next += 1;
            state.cursor.store(state.next, Ordering::SeqCst);
            Some((Ok::<_, Error>(entry.event), state))
        });
        Ok(Box::pin(stream))
    }
}

impl EventSource for ReplaySession {
    fn open<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<EventStream>> {
        Box::pin(async move {
            tracing::debug!(thread_id = %request.thread_id, "Opening replay as event source");
            self.start()
        })
    }
}

struct Cursor {
    log: Arc<ReplayLog>,
    next: usize,
    cursor: Arc<AtomicUsize>,
    pacing: watch::Receiver<Pacing>,
    scale: f64,
}

/// Wait out `delay` under the current pacing, re-evaluating whenever the
/// pacing changes.
async fn pace(delay: Duration, pacing: &mut watch::Receiver<Pacing>, scale: f64) {
    let begun = Instant::now();
    loop {
        let target = match *pacing.borrow_and_update() {
            Pacing::Normal => delay,
            Pacing::FastForward => delay.mul_f64(scale),
        };
        let elapsed = begun.elapsed();
        if elapsed >= target {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(target - elapsed) => return,
            changed = pacing.changed() => {
                if changed.is_err() {
                    // Session dropped; pacing is frozen.
                    tokio::time::sleep(target.saturating_sub(begun.elapsed())).await;
                    return;
                }
            }
        }
    }
}
