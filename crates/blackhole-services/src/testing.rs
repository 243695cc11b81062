//! Scripted fetcher for engine and worker tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::fetch::{Body, FetchError, Fetcher};

/// What one `open` call does.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// A body of these frame sizes, then end of stream.
    Body(Vec<usize>),
    /// Non-success status.
    Status(u16),
    /// Frames, then a read error.
    Broken(Vec<usize>),
    /// Frames, then the server goes silent.
    Stalled(Vec<usize>),
    /// Neither the probe nor the request ever complete.
    Hang,
}

struct Script {
    steps: Vec<Step>,
    repeat: bool,
    cursor: AtomicUsize,
    opens: AtomicUsize,
}

/// Plays a fixed list of steps, one per `open`. Once a non-repeating script
/// runs out, every further request hangs.
#[derive(Clone)]
pub(crate) struct ScriptedFetcher {
    script: Arc<Script>,
}

impl ScriptedFetcher {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self::build(steps, false)
    }

    /// Cycles through `steps` forever.
    pub(crate) fn repeating(steps: Vec<Step>) -> Self {
        Self::build(steps, true)
    }

    fn build(steps: Vec<Step>, repeat: bool) -> Self {
        Self {
            script: Arc::new(Script {
                steps,
                repeat,
                cursor: AtomicUsize::new(0),
                opens: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of `open` calls so far.
    pub(crate) fn opens(&self) -> usize {
        self.script.opens.load(Ordering::SeqCst)
    }

    fn step_at(&self, index: usize) -> Step {
        let steps = &self.script.steps;
        if steps.is_empty() {
            return Step::Hang;
        }
        if self.script.repeat {
            return steps[index % steps.len()].clone();
        }
        steps.get(index).cloned().unwrap_or(Step::Hang)
    }
}

impl Fetcher for ScriptedFetcher {
    type Body = ScriptedBody;

    fn probe_length(
        &self,
        _url: &str,
    ) -> impl Future<Output = Result<Option<u64>, FetchError>> + Send {
        let step = self.step_at(self.script.cursor.load(Ordering::SeqCst));
        async move {
            match step {
                Step::Hang => std::future::pending::<Result<Option<u64>, FetchError>>().await,
                _ => Ok(None),
            }
        }
    }

    fn open(&self, _url: &str) -> impl Future<Output = Result<ScriptedBody, FetchError>> + Send {
        self.script.opens.fetch_add(1, Ordering::SeqCst);
        let step = self.step_at(self.script.cursor.fetch_add(1, Ordering::SeqCst));
        async move {
            match step {
                Step::Hang => std::future::pending::<Result<ScriptedBody, FetchError>>().await,
                Step::Status(code) => Err(FetchError::Status(code)),
                Step::Body(frames) => Ok(ScriptedBody::new(frames, End::Eof)),
                Step::Broken(frames) => Ok(ScriptedBody::new(frames, End::Error)),
                Step::Stalled(frames) => Ok(ScriptedBody::new(frames, End::Silent)),
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum End {
    Eof,
    Error,
    Silent,
}

pub(crate) struct ScriptedBody {
    frames: VecDeque<usize>,
    end: End,
    length: u64,
}

impl ScriptedBody {
    fn new(frames: Vec<usize>, end: End) -> Self {
        let length = frames.iter().map(|n| *n as u64).sum();
        Self {
            frames: frames.into(),
            end,
            length,
        }
    }
}

impl Body for ScriptedBody {
    fn content_length(&self) -> Option<u64> {
        Some(self.length)
    }

    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, FetchError>> + Send {
        let frame = self.frames.pop_front();
        let end = self.end;
        async move {
            if let Some(n) = frame {
                return Ok(Some(Bytes::from(vec![0u8; n])));
            }
            match end {
                End::Eof => Ok(None),
                End::Error => Err(FetchError::Timeout),
                End::Silent => {
                    std::future::pending::<Result<Option<Bytes>, FetchError>>().await
                }
            }
        }
    }
}
