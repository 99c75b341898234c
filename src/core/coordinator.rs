//! Execution coordinator.
//!
//! A single worker thread owns the [`FetchEngine`] and runs jobs strictly one
//! at a time, in submission order. Browse and SQL requests each have a slot:
//! submitting to a slot supersedes whatever it held before. A superseded job
//! that has not started is skipped; one that is running is interrupted, and
//! if it finishes anyway its result is reported as [`Delivery::Superseded`].
//!
//! Submission is synchronous (the job is queued and its ticket taken before
//! the call returns), so request order is exactly call order. Waiting for
//! the result is the async part.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, warn};
use rusqlite::InterruptHandle;
use tokio::sync::{mpsc, oneshot};

use crate::Result;
use crate::core::catalog::{Catalog, RowCount};
use crate::core::fetch::{FetchEngine, RowWindow};
use crate::core::query_builder::{FilterSpec, RowRef, WindowRequest};
use crate::engine::{FullValue, QueryResult};
use crate::error::QueryError;

/// Independent request slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Browse,
    Sql,
}

impl Tab {
    fn index(self) -> usize {
        match self {
            Tab::Browse => 0,
            Tab::Sql => 1,
        }
    }
}

/// Outcome of a slotted request.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Completed(T),
    /// A newer request took the slot; the result must not be rendered.
    Superseded,
}

impl<T> Delivery<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Delivery::Completed(value) => Some(value),
            Delivery::Superseded => None,
        }
    }
}

type Job = Box<dyn FnOnce(&mut FetchEngine) + Send>;

struct Envelope {
    slot: Option<(Tab, u64)>,
    /// Signalled when the worker starts the job.
    started: Option<oneshot::Sender<()>>,
    job: Job,
}

struct Shared {
    tickets: [AtomicU64; 2],
    running: Mutex<Option<(Tab, u64)>>,
    interrupt: InterruptHandle,
    closed: AtomicBool,
}

impl Shared {
    fn current(&self, tab: Tab) -> u64 {
        self.tickets[tab.index()].load(Ordering::SeqCst)
    }

    /// Take a new ticket for `tab`, interrupting the statement currently
    /// running for it, if any.
    fn supersede(&self, tab: Tab) -> u64 {
        let ticket = self.tickets[tab.index()].fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(running) = self.running.lock() {
            if matches!(*running, Some((running_tab, t)) if running_tab == tab && t < ticket) {
                debug!("Interrupting running {:?} request", tab);
                self.interrupt.interrupt();
            }
        }
        ticket
    }

    fn set_running(&self, slot: Option<(Tab, u64)>) {
        if let Ok(mut running) = self.running.lock() {
            *running = slot;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A queued slotted request.
pub struct Pending<T> {
    tab: Tab,
    ticket: u64,
    timeout: Option<Duration>,
    started: Option<oneshot::Receiver<()>>,
    receiver: oneshot::Receiver<Result<T>>,
    shared: Arc<Shared>,
}

impl<T> Pending<T> {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Wait for the result. Anything answering a ticket that is no longer
    /// current comes back as [`Delivery::Superseded`].
    ///
    /// The timeout counts from the moment the worker starts the job, not
    /// from submission, so time spent queued behind other work is free.
    pub async fn wait(self) -> Result<Delivery<T>> {
        let Pending {
            tab,
            ticket,
            timeout,
            started,
            receiver,
            shared,
        } = self;

        if let Some(started) = started {
            // an error means the job was skipped or dropped; the receiver says which
            let _ = started.await;
        }

        let outcome = match timeout {
            None => receiver.await,
            Some(limit) => match tokio::time::timeout(limit, receiver).await {
                Ok(outcome) => outcome,
                Err(_) if shared.current(tab) == ticket => {
                    let timeout_ms = limit.as_millis() as u64;
                    warn!("{:?} request exceeded {}ms, cancelling", tab, timeout_ms);
                    shared.supersede(tab);
                    return Err(QueryError::Timeout { timeout_ms }.into());
                }
                Err(_) => return Ok(Delivery::Superseded),
            },
        };

        if shared.current(tab) != ticket {
            debug!("Dropping superseded {:?} result (ticket {})", tab, ticket);
            return Ok(Delivery::Superseded);
        }
        match outcome {
            Ok(result) => result.map(Delivery::Completed),
            // the worker dropped the job without running it
            Err(_) if shared.is_closed() => Err(QueryError::ConnectionClosed.into()),
            Err(_) => Ok(Delivery::Superseded),
        }
    }
}

/// A queued request outside any slot. It always runs.
pub struct Queued<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Queued<T> {
    pub async fn wait(self) -> Result<T> {
        self.receiver
            .await
            .map_err(|_| QueryError::ConnectionClosed)?
    }
}

pub struct Coordinator {
    sender: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shared: Arc<Shared>,
    sql_timeout: Duration,
}

impl Coordinator {
    /// Move `engine` onto a dedicated execution thread.
    pub fn start(engine: FetchEngine, sql_timeout: Duration) -> Result<Self> {
        let shared = Arc::new(Shared {
            tickets: [AtomicU64::new(0), AtomicU64::new(0)],
            running: Mutex::new(None),
            interrupt: engine.interrupt_handle()?,
            closed: AtomicBool::new(false),
        });

        let (sender, receiver) = mpsc::unbounded_channel();
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("sqv-exec".to_string())
            .spawn(move || run_worker(engine, receiver, worker_shared))
            .map_err(|e| QueryError::Execution {
                message: format!("failed to start execution thread: {}", e),
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            shared,
            sql_timeout,
        })
    }

    pub fn sql_timeout(&self) -> Duration {
        self.sql_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Current ticket of a slot.
    pub fn ticket(&self, tab: Tab) -> u64 {
        self.shared.current(tab)
    }

    /// Supersede whatever the slot holds without submitting anything new.
    pub fn cancel(&self, tab: Tab) {
        self.shared.supersede(tab);
    }

    fn enqueue<T, F>(
        &self,
        slot: Option<(Tab, u64)>,
        started: Option<oneshot::Sender<()>>,
        f: F,
    ) -> Result<oneshot::Receiver<Result<T>>>
    where
        T: Send + 'static,
        F: FnOnce(&mut FetchEngine) -> Result<T> + Send + 'static,
    {
        let (reply, receiver) = oneshot::channel();
        let job: Job = Box::new(move |engine: &mut FetchEngine| {
            let _ = reply.send(f(engine));
        });

        let sender = self
            .sender
            .lock()
            .map_err(|_| QueryError::ConnectionClosed)?;
        match sender.as_ref() {
            Some(sender) => sender
                .send(Envelope { slot, started, job })
                .map_err(|_| QueryError::ConnectionClosed)?,
            None => return Err(QueryError::ConnectionClosed.into()),
        }
        Ok(receiver)
    }

    fn submit_with<T, F>(&self, tab: Tab, timeout: Option<Duration>, f: F) -> Result<Pending<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut FetchEngine) -> Result<T> + Send + 'static,
    {
        if self.is_closed() {
            return Err(QueryError::ConnectionClosed.into());
        }
        let (start_signal, started) = match timeout {
            Some(_) => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
            None => (None, None),
        };
        let ticket = self.shared.supersede(tab);
        let receiver = self.enqueue(Some((tab, ticket)), start_signal, f)?;
        Ok(Pending {
            tab,
            ticket,
            timeout,
            started,
            receiver,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Queue `f` in a slot, superseding the slot's previous request.
    pub fn submit<T, F>(&self, tab: Tab, f: F) -> Result<Pending<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut FetchEngine) -> Result<T> + Send + 'static,
    {
        self.submit_with(tab, None, f)
    }

    /// Queue `f` outside any slot.
    pub fn run<T, F>(&self, f: F) -> Result<Queued<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut FetchEngine) -> Result<T> + Send + 'static,
    {
        Ok(Queued {
            receiver: self.enqueue(None, None, f)?,
        })
    }

    /// Fetch a browse window in the browse slot.
    pub fn fetch(&self, request: WindowRequest, generation: u64) -> Result<Pending<RowWindow>> {
        self.submit(Tab::Browse, move |engine| engine.fetch(&request, generation))
    }

    /// Run ad-hoc SQL in the SQL slot. Waiting longer than the configured
    /// timeout cancels the statement and reports `QueryError::Timeout`.
    pub fn execute_sql(&self, sql: String) -> Result<Pending<QueryResult>> {
        self.submit_with(Tab::Sql, Some(self.sql_timeout), move |engine| {
            engine.execute_sql(&sql)
        })
    }

    pub fn fetch_full(&self, row: RowRef, column: String) -> Result<Queued<FullValue>> {
        self.run(move |engine| engine.fetch_full(&row, &column))
    }

    pub fn row_count(&self, table: String, filter: FilterSpec) -> Result<Queued<RowCount>> {
        self.run(move |engine| engine.row_count(&table, &filter))
    }

    pub fn catalog(&self) -> Result<Queued<Catalog>> {
        self.run(|engine| Ok(engine.catalog().clone()))
    }

    pub fn refresh(&self) -> Result<Queued<Catalog>> {
        self.run(|engine| engine.refresh().cloned())
    }

    pub fn executions(&self) -> Result<Queued<u64>> {
        self.run(|engine| Ok(engine.executions()))
    }

    /// Queue invalidation of a table's cached windows. Runs after anything
    /// already queued and before anything submitted later.
    pub fn invalidate_table(&self, table: &str) -> Result<()> {
        let table = table.to_string();
        self.run(move |engine| Ok(engine.invalidate_table(&table)))?;
        Ok(())
    }

    /// Stop accepting work, let queued jobs finish, and close the connection.
    pub async fn close(&self) -> Result<()> {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            tokio::task::spawn_blocking(move || worker.join())
                .await
                .map_err(|e| QueryError::Execution {
                    message: format!("execution thread failed: {}", e),
                })?
                .map_err(|_| QueryError::Execution {
                    message: "execution thread panicked".to_string(),
                })?;
        }
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        // the worker exits once its queue is drained
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

fn run_worker(
    mut engine: FetchEngine,
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    shared: Arc<Shared>,
) {
    while let Some(Envelope { slot, started, job }) = receiver.blocking_recv() {
        if let Some((tab, ticket)) = slot {
            if shared.current(tab) != ticket {
                debug!("Skipping superseded {:?} request (ticket {})", tab, ticket);
                continue;
            }
            shared.set_running(slot);
            // a cancel may have landed between the check and publishing
            if shared.current(tab) != ticket {
                shared.set_running(None);
                continue;
            }
        }
        if let Some(started) = started {
            let _ = started.send(());
        }
        job(&mut engine);
        shared.set_running(None);
    }
    shared.closed.store(true, Ordering::SeqCst);
    engine.close();
    debug!("Execution thread stopped");
}
