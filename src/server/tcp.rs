//! # Servidor TCP
//! src/server/tcp.rs
//!
//! Arma el sistema completo (cola, dispatcher, pool, coordinador) y atiende
//! HTTP/1.0 con un thread por conexión.
//!
//! ## Ciclo de vida
//!
//! 1. `new`: bind del listener y arranque de los workers
//! 2. `run`: el acceptor atiende conexiones mientras la fase no sea `Stopped`
//! 3. Al dispararse el apagado, `run` drena y retorna el resultado
//!
//! Durante el drenado las conexiones siguen aceptándose; las sumisiones nuevas
//! reciben `503` y `/metrics` sigue disponible.

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::http::{request, Method, Request, Response, StatusCode};
use crate::jobs::{BuiltinEffect, JobEffect, JobQueue};
use crate::logging::LogLevel;
use crate::metrics::{CompletionSink, FanoutSink, LogSink, MetricsCollector};
use crate::router::{self, Router};
use crate::server::handlers::{self, AppState, SubmitLimits};
use crate::shutdown::{ShutdownCoordinator, ShutdownOutcome, ShutdownPhase};
use crate::workers::WorkerPool;
use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Tamaño máximo aceptado por request (cabecera + body)
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Intervalo de sondeo del acceptor no bloqueante
const ACCEPT_POLL: Duration = Duration::from_millis(25);

pub struct Server {
    config: Config,
    listener: TcpListener,
    router: Arc<Router>,
    state: AppState,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        let effect = Arc::new(BuiltinEffect::new(config.fetch_timeout()));
        Self::with_effect(config, effect)
    }

    /// Igual que `new` pero con un efecto de jobs inyectado
    pub fn with_effect(config: Config, effect: Arc<dyn JobEffect>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.address())?;

        let queue = JobQueue::new(config.capacity);
        let metrics = Arc::new(MetricsCollector::new());
        let dispatcher = Arc::new(
            Dispatcher::new(queue.clone(), config.dispatcher_config()).with_metrics(Arc::clone(&metrics)),
        );

        let metrics_sink: Arc<dyn CompletionSink> = metrics.clone();
        let sink = FanoutSink::new().with(Arc::new(LogSink)).with(metrics_sink);
        let pool = WorkerPool::start(config.workers, queue, effect, Arc::new(sink))?;

        let coordinator = Arc::new(ShutdownCoordinator::new(dispatcher, pool, config.drain_timeout()));

        let state = AppState {
            coordinator,
            metrics,
            log_level: Arc::new(LogLevel::detached(&config.log_level)),
            limits: SubmitLimits {
                max_sleep_ms: config.max_sleep_ms,
                retry_after_secs: config.retry_after_secs,
            },
        };
        let router = Arc::new(build_router(&state));

        Ok(Self {
            config,
            listener,
            router,
            state,
        })
    }

    /// Conecta `/loglevel` con el subscriber global
    pub fn with_log_level(mut self, log_level: Arc<LogLevel>) -> Self {
        self.state.log_level = log_level;
        self.router = Arc::new(build_router(&self.state));
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.state.coordinator)
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.state.metrics)
    }

    /// Atiende conexiones hasta que se dispare el apagado y el drenado termine
    pub fn run(&self) -> Result<ShutdownOutcome> {
        let listener = self.listener.try_clone()?;
        listener.set_nonblocking(true)?;

        tracing::info!(address = %self.local_addr()?, "listening");

        let acceptor = {
            let router = Arc::clone(&self.router);
            let metrics = Arc::clone(&self.state.metrics);
            let coordinator = Arc::clone(&self.state.coordinator);
            let read_timeout = self.config.read_timeout();

            thread::Builder::new()
                .name("acceptor".to_string())
                .spawn(move || accept_loop(listener, router, metrics, coordinator, read_timeout))?
        };

        let coordinator = &self.state.coordinator;
        coordinator.wait_for_trigger();
        let outcome = coordinator.drain();

        if acceptor.join().is_err() {
            tracing::error!("acceptor thread panicked");
        }

        Ok(outcome?)
    }
}

fn build_router(state: &AppState) -> Router {
    let mut router = Router::new();

    let s = state.clone();
    router.register(Method::POST, "/jobs", move |req| handlers::submit_json(&s, req));
    let s = state.clone();
    router.register(Method::GET, "/jobs/submit", move |req| handlers::submit_query(&s, req));
    let s = state.clone();
    router.register(Method::GET, "/metrics", move |req| handlers::metrics(&s, req));
    let s = state.clone();
    router.register(Method::GET, "/health", move |req| handlers::health(&s, req));
    let s = state.clone();
    router.register(Method::GET, "/loglevel", move |req| handlers::get_log_level(&s, req));
    let s = state.clone();
    router.register(Method::POST, "/loglevel", move |req| handlers::set_log_level(&s, req));

    router
}

fn accept_loop(
    listener: TcpListener,
    router: Arc<Router>,
    metrics: Arc<MetricsCollector>,
    coordinator: Arc<ShutdownCoordinator>,
    read_timeout: Duration,
) {
    while coordinator.phase() != ShutdownPhase::Stopped {
        match listener.accept() {
            Ok((stream, peer)) => {
                let router = Arc::clone(&router);
                let metrics = Arc::clone(&metrics);

                let spawned = thread::Builder::new()
                    .name("connection".to_string())
                    .spawn(move || {
                        if let Err(e) = handle_connection(stream, &router, &metrics, read_timeout) {
                            tracing::warn!(peer = %peer, error = %e, "connection error");
                        }
                    });

                if let Err(e) = spawned {
                    tracing::error!(peer = %peer, error = %e, "failed to spawn connection thread");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }

    tracing::debug!("acceptor stopped");
}

/// Lee una request completa: cabecera más `Content-Length` bytes de body
fn read_request(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 8192];

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if let Some(end) = request::head_end(&buffer) {
            if body_too_large(&buffer) {
                break;
            }
            let expected = end.saturating_add(Request::content_length(&buffer[..end]));
            if buffer.len() >= expected.min(MAX_REQUEST_BYTES) {
                break;
            }
        }
        if buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    Ok(buffer)
}

/// `Content-Length` declarado mayor a lo que cabe en `MAX_REQUEST_BYTES`
fn body_too_large(buffer: &[u8]) -> bool {
    request::head_end(buffer).is_some_and(|end| {
        Request::content_length(&buffer[..end]) > MAX_REQUEST_BYTES.saturating_sub(end)
    })
}

fn handle_connection(
    mut stream: TcpStream,
    router: &Router,
    metrics: &MetricsCollector,
    read_timeout: Duration,
) -> std::io::Result<()> {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();

    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(read_timeout))?;

    let raw = match read_request(&mut stream) {
        Ok(raw) => raw,
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
            tracing::debug!(request_id = %request_id, "read timed out");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if raw.is_empty() {
        return Ok(());
    }

    let (mut response, method, path) = match Request::parse(&raw) {
        Ok(request) if body_too_large(&raw) => {
            let mut response = Response::error(
                StatusCode::PayloadTooLarge,
                &format!("request body exceeds {} bytes", MAX_REQUEST_BYTES),
            );
            router::add_common_headers(&mut response);
            (response, request.method().as_str(), request.path().to_string())
        }
        Ok(request) => (
            router.route(&request),
            request.method().as_str(),
            request.path().to_string(),
        ),
        Err(e) => {
            let mut response = Response::error(StatusCode::BadRequest, &format!("invalid request: {}", e));
            router::add_common_headers(&mut response);
            (response, "-", String::from("-"))
        }
    };

    response.add_header("X-Request-Id", &request_id);
    stream.write_all(&response.to_bytes())?;
    stream.flush()?;

    let latency = start.elapsed();
    metrics.record_request(response.status().as_u16(), latency);

    tracing::info!(
        request_id = %request_id,
        method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        "request handled"
    );

    Ok(())
}
