//! Execution log hub
//!
//! Append-only, per-execution log lines that callers can follow live. A
//! subscriber first replays the backlog, then receives new lines until the
//! writer closes the log.

use futures::Stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use taskforge_domain::ExecutionId;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct LogState {
    len: usize,
    closed: bool,
}

#[derive(Debug)]
struct ExecutionLog {
    lines: Mutex<Vec<String>>,
    state: watch::Sender<LogState>,
}

impl ExecutionLog {
    fn new() -> Self {
        let (state, _) = watch::channel(LogState::default());
        Self {
            lines: Mutex::new(Vec::new()),
            state,
        }
    }

    fn line_at(&self, index: usize) -> Option<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }
}

/// Closed logs kept by [`ExecutionLogHub::new`].
pub const DEFAULT_RETAINED_LOGS: usize = 1024;

#[derive(Debug, Default)]
struct HubState {
    logs: HashMap<ExecutionId, Arc<ExecutionLog>>,
    /// Opening order, oldest first.
    order: VecDeque<ExecutionId>,
}

/// Registry of execution logs.
///
/// Open logs are always kept. Once more than `retained` logs are closed,
/// the oldest closed ones are dropped when the next log is opened; live
/// subscribers keep their handle.
#[derive(Debug)]
pub struct ExecutionLogHub {
    state: Mutex<HubState>,
    retained: usize,
}

impl Default for ExecutionLogHub {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_LOGS)
    }
}

impl ExecutionLogHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retained: usize) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            retained,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create (or reopen) the log of an execution and return its writer.
    pub fn open(&self, execution_id: ExecutionId) -> ExecutionLogWriter {
        let mut state = self.state();
        let log = if let Some(log) = state.logs.get(&execution_id).cloned() {
            log
        } else {
            let log = Arc::new(ExecutionLog::new());
            state.logs.insert(execution_id, Arc::clone(&log));
            state.order.push_back(execution_id);
            Self::evict_closed(&mut state, self.retained);
            log
        };
        ExecutionLogWriter { execution_id, log }
    }

    fn evict_closed(state: &mut HubState, retained: usize) {
        let closed: Vec<ExecutionId> = state
            .order
            .iter()
            .filter(|id| {
                state
                    .logs
                    .get(*id)
                    .is_some_and(|log| log.state.borrow().closed)
            })
            .copied()
            .collect();
        let excess = closed.len().saturating_sub(retained);
        for id in closed.into_iter().take(excess) {
            debug!(execution_id = %id, "Dropping closed execution log");
            state.logs.remove(&id);
            state.order.retain(|kept| *kept != id);
        }
    }

    /// Follow an execution's log from the first line.
    pub fn subscribe(&self, execution_id: ExecutionId) -> Option<LogSubscription> {
        let log = self.state().logs.get(&execution_id).cloned()?;
        let state = log.state.subscribe();
        Some(LogSubscription {
            log,
            state,
            cursor: 0,
        })
    }

    /// Snapshot of every line written so far.
    pub fn lines(&self, execution_id: ExecutionId) -> Option<Vec<String>> {
        let log = self.state().logs.get(&execution_id).cloned()?;
        let lines = log
            .lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Some(lines)
    }

    /// Logs currently held, open or closed.
    pub fn len(&self) -> usize {
        self.state().logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a log; live subscribers keep their handle and still see it close.
    pub fn remove(&self, execution_id: ExecutionId) {
        let mut state = self.state();
        state.logs.remove(&execution_id);
        state.order.retain(|id| *id != execution_id);
    }
}

/// Append handle for one execution's log.
#[derive(Debug, Clone)]
pub struct ExecutionLogWriter {
    execution_id: ExecutionId,
    log: Arc<ExecutionLog>,
}

impl ExecutionLogWriter {
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Append a line. Ignored once the log is closed.
    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        let len = {
            let mut lines = self.log.lines.lock().unwrap_or_else(PoisonError::into_inner);
            if self.log.state.borrow().closed {
                return;
            }
            debug!(execution_id = %self.execution_id, "{}", line);
            lines.push(line);
            lines.len()
        };
        self.log.state.send_modify(|state| state.len = len);
    }

    pub fn close(&self) {
        self.log.state.send_modify(|state| state.closed = true);
    }

    pub fn is_closed(&self) -> bool {
        self.log.state.borrow().closed
    }
}

/// A live cursor over an execution log.
#[derive(Debug)]
pub struct LogSubscription {
    log: Arc<ExecutionLog>,
    state: watch::Receiver<LogState>,
    cursor: usize,
}

impl LogSubscription {
    /// Next line, waiting for it if necessary; `None` once the log is closed
    /// and fully read.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.log.line_at(self.cursor) {
                self.cursor += 1;
                return Some(line);
            }
            if self.state.borrow_and_update().closed {
                // a line may have landed between the read and the close
                let line = self.log.line_at(self.cursor)?;
                self.cursor += 1;
                return Some(line);
            }
            if self.state.changed().await.is_err() {
                return None;
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = String> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next_line().await.map(|line| (line, sub))
        })
    }
}
