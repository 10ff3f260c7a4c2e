use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::train::metrics::Metrics;
use crate::writer::{MetricsWriter, WriterEvent};

const KEEPALIVE: Duration = Duration::from_millis(500);

/// Event log shared between the training thread and HTTP clients.
#[derive(Default)]
struct Feed {
    events: Mutex<Vec<WriterEvent>>,
    changed: Condvar,
    closed: AtomicBool,
}

impl Feed {
    fn lock(&self) -> MutexGuard<'_, Vec<WriterEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: WriterEvent) {
        self.lock().push(event);
        self.changed.notify_all();
    }
}

/// Serves live metrics over HTTP while a sweep runs.
///
/// - `GET /events` streams every event as Server-Sent Events, replaying
///   history first and sending a keep-alive comment when idle.
/// - `GET /runs` returns all runs seen so far as JSON.
pub struct DashboardWriter {
    feed: Arc<Feed>,
    server: Arc<Server>,
    addr: Option<SocketAddr>,
    accept: Option<JoinHandle<()>>,
    open: bool,
}

impl DashboardWriter {
    pub fn bind(addr: &str) -> Result<DashboardWriter> {
        let server = Server::http(addr).map_err(|e| Error::writer(format!("bind {addr}: {e}")))?;
        let server = Arc::new(server);
        let bound = server.server_addr().to_ip();
        let feed = Arc::new(Feed::default());

        let accept = {
            let server = Arc::clone(&server);
            let feed = Arc::clone(&feed);
            thread::spawn(move || {
                // Each request gets its own thread so a long-lived event
                // stream does not block `/runs`.
                for request in server.incoming_requests() {
                    let feed = Arc::clone(&feed);
                    thread::spawn(move || dispatch(request, &feed));
                }
            })
        };

        if let Some(a) = bound {
            info!(addr = %a, "dashboard listening");
        }
        Ok(DashboardWriter { feed, server, addr: bound, accept: Some(accept), open: false })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

impl MetricsWriter for DashboardWriter {
    fn start(&mut self, config: &RunConfig) -> Result<()> {
        self.open = true;
        self.feed.push(WriterEvent::Start { config: config.clone() });
        Ok(())
    }

    fn write(&mut self, metrics: &Metrics, step: usize) -> Result<()> {
        self.feed.push(WriterEvent::Metrics { step, metrics: metrics.clone() });
        Ok(())
    }

    fn fin(&mut self) -> Result<()> {
        if std::mem::take(&mut self.open) {
            self.feed.push(WriterEvent::Fin);
        }
        Ok(())
    }
}

impl Drop for DashboardWriter {
    fn drop(&mut self) {
        self.feed.closed.store(true, Ordering::SeqCst);
        self.feed.changed.notify_all();
        self.server.unblock();
        if let Some(accept) = self.accept.take() {
            let _ = accept.join();
        }
    }
}

fn dispatch(request: Request, feed: &Feed) {
    let method = request.method().clone();
    let path = request.url().split('?').next().unwrap_or("").to_owned();
    debug!(%method, %path, "dashboard request");
    let result = match (method, path.as_str()) {
        (Method::Get, "/events") => {
            stream_events(request, feed);
            Ok(())
        }
        (Method::Get, "/runs") => {
            let body = serde_json::to_string(&group_runs(&feed.lock())).unwrap_or_else(|_| "[]".into());
            request.respond(json_response(body))
        }
        _ => request.respond(Response::from_string("404 Not Found").with_status_code(StatusCode(404))),
    };
    if let Err(e) = result {
        warn!(error = %e, "dashboard response failed");
    }
}

fn json_response(body: String) -> Response<Cursor<Vec<u8>>> {
    let response = Response::from_data(body.into_bytes());
    match Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(h) => response.with_header(h),
        Err(()) => response,
    }
}

/// Writes SSE frames until the client disconnects or the writer is dropped.
fn stream_events(request: Request, feed: &Feed) {
    let mut out = request.into_writer();
    let header = "HTTP/1.1 200 OK\r\n\
                  Content-Type: text/event-stream\r\n\
                  Cache-Control: no-cache\r\n\
                  Connection: keep-alive\r\n\
                  X-Accel-Buffering: no\r\n\
                  \r\n";
    if send(&mut out, header).is_err() {
        return;
    }

    let mut sent = 0;
    loop {
        let pending: Vec<WriterEvent> = {
            let events = feed.lock();
            let events = if events.len() == sent && !feed.closed.load(Ordering::SeqCst) {
                feed.changed
                    .wait_timeout(events, KEEPALIVE)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0)
            } else {
                events
            };
            events[sent..].to_vec()
        };

        if pending.is_empty() {
            if feed.closed.load(Ordering::SeqCst) {
                return;
            }
            if send(&mut out, ": ping\n\n").is_err() {
                return;
            }
            continue;
        }
        for event in &pending {
            let Ok(json) = serde_json::to_string(event) else { continue };
            if send(&mut out, &format!("event: {}\ndata: {}\n\n", event.name(), json)).is_err() {
                return;
            }
        }
        sent += pending.len();
    }
}

fn send<W: Write + ?Sized>(w: &mut W, frame: &str) -> std::io::Result<()> {
    w.write_all(frame.as_bytes())?;
    w.flush()
}

#[derive(Debug, Serialize)]
struct RunView<'a> {
    config: &'a RunConfig,
    metrics: Vec<StepView<'a>>,
    finished: bool,
}

#[derive(Debug, Serialize)]
struct StepView<'a> {
    step: usize,
    metrics: &'a Metrics,
}

fn group_runs(events: &[WriterEvent]) -> Vec<RunView<'_>> {
    let mut runs: Vec<RunView<'_>> = Vec::new();
    for event in events {
        match event {
            WriterEvent::Start { config } => {
                runs.push(RunView { config, metrics: Vec::new(), finished: false })
            }
            WriterEvent::Metrics { step, metrics } => {
                if let Some(run) = runs.last_mut() {
                    run.metrics.push(StepView { step: *step, metrics });
                }
            }
            WriterEvent::Fin => {
                if let Some(run) = runs.last_mut() {
                    run.finished = true;
                }
            }
        }
    }
    runs
}
