//! Live update channel
//!
//! A background thread holds the event stream open, decodes message batches
//! and hands them to a sink. Dropped connections are retried according to a
//! [`ReconnectPolicy`] until the subscription is closed or the policy gives up.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::backoff::ReconnectPolicy;
use super::sse::{SseParser, decode_batch};
use crate::models::Message;

/// Lifecycle and data events reported by the channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The stream was (re)opened; `reconnect` is false for the first connection
    Connected { reconnect: bool },
    /// A decoded batch of messages
    Batch(Vec<Message>),
    /// The stream failed to open or dropped
    Disconnected { error: String },
    /// Waiting `delay` before attempt number `attempt`
    Reconnecting { attempt: u32, delay: Duration },
    /// The channel stopped after `attempts` consecutive failures
    GaveUp { attempts: u32 },
}

type Interrupt = Box<dyn Fn() + Send + Sync>;

/// An open event stream
///
/// The optional interrupt tears the underlying connection down from another
/// thread, so a read blocked on a quiet stream returns.
pub struct EventStream {
    reader: Box<dyn BufRead + Send>,
    interrupt: Option<Interrupt>,
}

impl EventStream {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            interrupt: None,
        }
    }

    pub fn with_interrupt(mut self, interrupt: impl Fn() + Send + Sync + 'static) -> Self {
        self.interrupt = Some(Box::new(interrupt));
        self
    }
}

/// Interrupt of the connection currently being read, if any
#[derive(Clone, Default)]
struct ActiveStream {
    interrupt: Arc<Mutex<Option<Interrupt>>>,
}

impl ActiveStream {
    fn set(&self, interrupt: Option<Interrupt>) {
        *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner) = interrupt;
    }

    fn clear(&self) {
        self.set(None);
    }

    fn interrupt(&self) {
        let interrupt = self
            .interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(interrupt) = interrupt {
            interrupt();
        }
    }
}

/// Cancellation flag that also wakes sleepers
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`, returning early if cancelled.
    /// Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Handle for an open live subscription
///
/// Closing happens exactly once, on [`Subscription::close`] or on drop.
pub struct Subscription {
    token: CancelToken,
    active: ActiveStream,
    closed: AtomicBool,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Stop receiving updates. Later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Closing live update subscription");
        self.token.cancel();
        self.active.interrupt();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether the background thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait up to `timeout` for the background thread to exit
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Start a live subscription
///
/// `connect` opens the event stream; it is called again for every reconnect.
/// `sink` receives every [`ChannelEvent`] on the background thread.
pub fn subscribe<C, S>(connect: C, policy: ReconnectPolicy, sink: S) -> Result<Subscription>
where
    C: Fn() -> Result<EventStream> + Send + 'static,
    S: Fn(ChannelEvent) + Send + 'static,
{
    let token = CancelToken::new();
    let active = ActiveStream::default();
    let worker_token = token.clone();
    let worker_active = active.clone();

    let handle = std::thread::Builder::new()
        .name("live-updates".to_string())
        .spawn(move || run(connect, policy, sink, worker_token, worker_active))
        .context("Failed to spawn live update thread")?;

    Ok(Subscription {
        token,
        active,
        closed: AtomicBool::new(false),
        handle: Some(handle),
    })
}

fn run<C, S>(
    connect: C,
    mut policy: ReconnectPolicy,
    sink: S,
    token: CancelToken,
    active: ActiveStream,
) where
    C: Fn() -> Result<EventStream>,
    S: Fn(ChannelEvent),
{
    let mut failures: u32 = 0;
    let mut connected_before = false;

    while !token.is_cancelled() {
        let error = match connect() {
            Ok(EventStream { reader, interrupt }) => {
                // Publish the interrupt before checking the token so a
                // concurrent close either sees it or is seen here
                active.set(interrupt);
                if token.is_cancelled() {
                    active.clear();
                    break;
                }
                info!("Live update stream connected");
                failures = 0;
                sink(ChannelEvent::Connected {
                    reconnect: connected_before,
                });
                connected_before = true;

                let result = pump(reader, &token, &sink, &mut policy);
                active.clear();
                if token.is_cancelled() {
                    break;
                }
                match result {
                    Ok(()) => "stream closed by server".to_string(),
                    Err(e) => format!("{:#}", e),
                }
            }
            Err(e) => format!("{:#}", e),
        };

        warn!("Live update stream unavailable: {}", error);
        sink(ChannelEvent::Disconnected { error });

        failures += 1;
        if !policy.should_retry(failures) {
            warn!("Giving up on live updates after {} attempts", failures);
            sink(ChannelEvent::GaveUp { attempts: failures });
            return;
        }

        let delay = policy.jittered_delay_for(failures);
        debug!("Reconnecting in {:?} (attempt {})", delay, failures + 1);
        sink(ChannelEvent::Reconnecting {
            attempt: failures + 1,
            delay,
        });
        if token.wait_timeout(delay) {
            break;
        }
    }

    debug!("Live update thread exiting");
}

/// Read events until the stream ends, fails, or the token is cancelled
fn pump<S>(
    mut reader: Box<dyn BufRead + Send>,
    token: &CancelToken,
    sink: &S,
    policy: &mut ReconnectPolicy,
) -> Result<()>
where
    S: Fn(ChannelEvent),
{
    let mut parser = SseParser::new();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .context("Failed to read from message stream")?;
        if token.is_cancelled() || read == 0 {
            return Ok(());
        }

        let Some(event) = parser.feed_line(line.trim_end_matches('\n')) else {
            if let Some(retry) = parser.take_retry() {
                debug!("Server requested reconnect delay of {:?}", retry);
                policy.initial_delay = retry;
            }
            continue;
        };

        match decode_batch(&event.data) {
            Ok(batch) if batch.is_empty() => debug!("Received empty batch"),
            Ok(batch) => {
                debug!("Received batch of {} messages", batch.len());
                sink(ChannelEvent::Batch(batch));
            }
            Err(e) => warn!("Skipping malformed event: {:#}", e),
        }
    }
}
