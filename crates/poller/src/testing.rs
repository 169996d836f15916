//! Test doubles for code built on the poller.
//!
//! [`ScriptedFetcher`] answers from per-id reply queues and records every
//! call with its (Tokio) timestamp, so tests on a paused runtime can assert
//! exact fetch times.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use execwatch_client::fetcher::require_identifier;
use execwatch_client::{FetchError, RequestContext, StatusFetcher};
use execwatch_status::ExecutionRecord;
use parking_lot::Mutex;
use tokio::time::Instant;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A single execution record.
    Record(ExecutionRecord),
    /// A document's execution list.
    List(Vec<ExecutionRecord>),
    /// A transport failure.
    Network(String),
    /// A non-2xx response.
    Http(u16),
    /// Wait, then answer with the inner reply.
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    /// Delay this reply by `delay`.
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }
}

/// A recorded fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Execution or document id.
    pub id: String,
    /// Tenant of the request context.
    pub tenant_id: String,
    /// When the call started.
    pub at: Instant,
}

/// A [`StatusFetcher`] that replays scripted replies.
///
/// Each id has its own queue. Replies are consumed in order; once the queue
/// is empty the last consumed reply repeats until more are pushed. An id
/// with no script answers HTTP 404.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Call>>,
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Reply>,
    last: Option<Reply>,
}

impl ScriptedFetcher {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `id`.
    pub fn push(&self, id: &str, reply: Reply) -> &Self {
        self.scripts
            .lock()
            .entry(id.to_owned())
            .or_default()
            .queue
            .push_back(reply);
        self
    }

    /// Queue one record per status for execution `id`.
    pub fn script_statuses(&self, id: &str, statuses: &[&str]) -> &Self {
        for status in statuses {
            self.push(id, Reply::Record(ExecutionRecord::new(id, *status)));
        }
        self
    }

    /// Queue one list reply for document `id` from `(execution_id, status)`
    /// pairs.
    pub fn script_list(&self, id: &str, members: &[(&str, &str)]) -> &Self {
        let records = members
            .iter()
            .map(|(execution_id, status)| ExecutionRecord::new(*execution_id, *status))
            .collect();
        self.push(id, Reply::List(records))
    }

    /// Queue `count` network failures for `id`.
    pub fn fail(&self, id: &str, count: usize) -> &Self {
        for _ in 0..count {
            self.push(id, Reply::Network("connection reset".into()));
        }
        self
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of calls for `id`.
    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.id == id).count()
    }

    /// Start times of the calls for `id`.
    pub fn call_times(&self, id: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.id == id)
            .map(|call| call.at)
            .collect()
    }

    fn next_reply(&self, ctx: &RequestContext, id: &str) -> Reply {
        self.calls.lock().push(Call {
            id: id.to_owned(),
            tenant_id: ctx.tenant_id().to_owned(),
            at: Instant::now(),
        });
        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(id) else {
            return Reply::Http(404);
        };
        if let Some(reply) = script.queue.pop_front() {
            script.last = Some(reply.clone());
            return reply;
        }
        script.last.clone().unwrap_or(Reply::Http(404))
    }

    async fn resolve(&self, ctx: &RequestContext, id: &str) -> Result<Reply, FetchError> {
        let mut reply = self.next_reply(ctx, id);
        while let Reply::Delayed(delay, inner) = reply {
            tokio::time::sleep(delay).await;
            reply = *inner;
        }
        match reply {
            Reply::Network(message) => Err(FetchError::network(message)),
            Reply::Http(status) => Err(FetchError::http(status, None)),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch_status(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<ExecutionRecord, FetchError> {
        require_identifier(execution_id, "execution_id")?;
        match self.resolve(ctx, execution_id).await? {
            Reply::Record(record) => Ok(record),
            _ => Err(FetchError::decode("scripted a list for an execution")),
        }
    }

    async fn fetch_executions(
        &self,
        ctx: &RequestContext,
        document_id: &str,
    ) -> Result<Vec<ExecutionRecord>, FetchError> {
        require_identifier(document_id, "document_id")?;
        match self.resolve(ctx, document_id).await? {
            Reply::List(records) => Ok(records),
            _ => Err(FetchError::decode("scripted a record for a document")),
        }
    }
}
