//! Process lifecycle: ordered startup, signal handling and reverse teardown.
//!
//! Startup walks `Uninitialized -> ... -> Serving` one stage at a time. A
//! failure aborts before the HTTP listener is bound, releases whatever was
//! already built and exits 1. Every built component registers a teardown
//! step; teardown runs the steps newest-first and keeps going past failures.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use highway_core::enforcement::{allow_method_skipper, allow_path_prefix_skipper};
use highway_core::memory::{
    MemoryDomainStore, MemoryMenuActionStore, MemoryMenuStore, MemoryPolicyStore,
};
use highway_core::policy::bootstrap::DefaultPolicy;
use highway_core::policy::engine::RbacEngine;
use highway_core::ports::{DomainStore, MenuActionStore, MenuStore, PolicyStore};
use highway_core::service::{DomainService, MenuService};
use highway_core::{EnforcementGate, HighwayError, PolicyRuntime};
use highway_postgres::PgStores;

use crate::cli::WebArgs;
use crate::config::{AppConfig, StoreBackend};
use crate::logging;
use crate::middleware::jwt::JwtConfig;
use crate::monitor::MonitorAgent;
use crate::router::{build_router, Services};

/// Grace period for steps other than the HTTP listener.
const COMPONENT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    ConfigLoaded,
    LoggingReady,
    MonitorReady,
    AuthReady,
    RoutesReady,
    Serving,
    Draining,
    Stopped,
}

impl LifecycleState {
    pub fn next(self) -> Option<Self> {
        use LifecycleState::*;
        Some(match self {
            Uninitialized => ConfigLoaded,
            ConfigLoaded => LoggingReady,
            LoggingReady => MonitorReady,
            MonitorReady => AuthReady,
            AuthReady => RoutesReady,
            RoutesReady => Serving,
            Serving => Draining,
            Draining => Stopped,
            Stopped => return None,
        })
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Default)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Move to `to`, which must be the immediate successor of the current state.
    pub fn advance(&mut self, to: LifecycleState) -> Result<(), HighwayError> {
        if self.state.next() != Some(to) {
            return Err(HighwayError::Internal(anyhow::anyhow!(
                "illegal lifecycle transition {} -> {}",
                self.state,
                to
            )));
        }
        debug!(from = %self.state, to = %to, "Lifecycle transition");
        self.state = to;
        Ok(())
    }
}

/// A failure while entering `stage`; the process exits before serving.
#[derive(Debug, Error)]
#[error("startup aborted at {stage}: {source:#}")]
pub struct StartupError {
    pub stage: LifecycleState,
    #[source]
    pub source: anyhow::Error,
}

// ── Signals ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

impl ProcessSignal {
    /// Interrupt, terminate and quit are treated alike; hangup is ignored.
    pub fn starts_draining(self) -> bool {
        !matches!(self, Self::Hangup)
    }
}

/// Forward OS signals into a channel the serve loop selects on.
#[cfg(unix)]
pub fn listen_for_signals() -> std::io::Result<mpsc::Receiver<ProcessSignal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        loop {
            let sig = tokio::select! {
                _ = sigterm.recv() => ProcessSignal::Terminate,
                _ = sigint.recv() => ProcessSignal::Interrupt,
                _ = sigquit.recv() => ProcessSignal::Quit,
                _ = sighup.recv() => ProcessSignal::Hangup,
            };
            if tx.send(sig).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

#[cfg(not(unix))]
pub fn listen_for_signals() -> std::io::Result<mpsc::Receiver<ProcessSignal>> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(ProcessSignal::Interrupt).await.is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

// ── HTTP server ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished inside the grace period.
    Graceful,
    /// The grace period ran out and open connections were dropped.
    Forced,
}

pub struct HttpServer {
    addr: SocketAddr,
    stop: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl HttpServer {
    pub fn start(listener: TcpListener, router: Router) -> std::io::Result<Self> {
        let addr = listener.local_addr()?;
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(serve_connections(listener, router, stopped));
        info!(%addr, "HTTP server listening");
        Ok(Self {
            addr,
            stop: Some(stop),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Resolves when the serve loop ends without being asked to.
    pub async fn finished(&mut self) -> Result<()> {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let joined = task.await;
        self.task = None;
        joined.context("serve task panicked")?.context("serve loop failed")
    }

    /// Stop accepting, give in-flight requests `grace`, then drop every
    /// connection still open.
    pub async fn shutdown(mut self, grace: Duration) -> ShutdownOutcome {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(true);
        }
        let Some(mut task) = self.task.take() else {
            return ShutdownOutcome::Graceful;
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(Ok(()))) => ShutdownOutcome::Graceful,
            Ok(Ok(Err(e))) => {
                warn!(error = %e, "Serve loop ended with an error while draining");
                ShutdownOutcome::Graceful
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Serve task failed while draining");
                ShutdownOutcome::Forced
            }
            Err(_) => {
                warn!(grace_secs = grace.as_secs_f64(), "Grace period expired, dropping connections");
                // Cancelling the loop drops its JoinSet, which aborts the
                // connection tasks.
                task.abort();
                let _ = task.await;
                ShutdownOutcome::Forced
            }
        }
    }
}

/// Accept loop. Each connection runs as a task in a `JoinSet` owned by this
/// future. Once `stop` flips, accepting ends and every connection is asked to
/// finish its current request and close.
async fn serve_connections(
    listener: TcpListener,
    router: Router,
    mut stop: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let mut connections = JoinSet::new();
    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
            Some(_) = connections.join_next() => continue,
            _ = stop.changed() => break,
        };
        let service = TowerToHyperService::new(router.clone());
        let mut conn_stop = stop.clone();
        connections.spawn(async move {
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
            tokio::pin!(conn);
            let mut draining = false;
            loop {
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            debug!(%peer, error = %e, "Connection closed with error");
                        }
                        break;
                    }
                    _ = conn_stop.changed(), if !draining => {
                        conn.as_mut().graceful_shutdown();
                        draining = true;
                    }
                }
            }
        });
    }
    drop(listener);
    debug!(open = connections.len(), "Listener closed, draining connections");
    while connections.join_next().await.is_some() {}
    Ok(())
}

/// Await `fut`, giving up after `limit`.
async fn bounded<F>(what: &str, limit: Duration, fut: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| anyhow::anyhow!("{what} did not finish within {}s", limit.as_secs_f64()))
}

// ── Teardown stack ────────────────────────────────────────────

type StepFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Step = Box<dyn FnOnce() -> StepFuture + Send>;

/// Release steps, run newest-first. A failing step is logged and skipped.
#[derive(Default)]
pub struct Teardown {
    steps: Vec<(&'static str, Step)>,
}

impl Teardown {
    pub fn push<F, Fut>(&mut self, name: &'static str, step: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.steps
            .push((name, Box::new(move || Box::pin(step()) as StepFuture)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub async fn run(mut self) {
        while let Some((name, step)) = self.steps.pop() {
            match step().await {
                Ok(()) => debug!(step = name, "Teardown step done"),
                Err(e) => warn!(step = name, error = %format!("{e:#}"), "Teardown step failed"),
            }
        }
    }
}

// ── Orchestration ─────────────────────────────────────────────

/// Why the serve loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    Signal(ProcessSignal),
    ListenerStopped,
}

impl ServeExit {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Signal(s) if s.starts_draining() => 0,
            _ => 1,
        }
    }
}

/// Load the file, then env overrides, then CLI overrides.
pub fn load_config(args: &WebArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load(&args.conf)?;
    config.apply_env()?;
    if let Some(policy) = &args.policy {
        config.enforcement.default_policy_file = Some(policy.clone());
    }
    if let Some(menu) = &args.menu {
        config.menu.enable = true;
        config.menu.data = Some(menu.clone());
    }
    config.validate()?;
    Ok(config)
}

struct Backend {
    domains: Arc<dyn DomainStore>,
    menus: Arc<dyn MenuStore>,
    menu_actions: Arc<dyn MenuActionStore>,
    policy: Arc<dyn PolicyStore>,
    pool: Option<sqlx::PgPool>,
}

async fn open_backend(config: &AppConfig) -> Result<Backend> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory stores; nothing is persisted");
            Ok(Backend {
                domains: Arc::new(MemoryDomainStore::new()),
                menus: Arc::new(MemoryMenuStore::new()),
                menu_actions: Arc::new(MemoryMenuActionStore::new()),
                policy: Arc::new(MemoryPolicyStore::new()),
                pool: None,
            })
        }
        StoreBackend::Postgres => {
            let pool = highway_postgres::connect(&config.database.pool_config()).await?;
            highway_postgres::ensure_schema(&pool).await?;
            let stores = PgStores::new(pool.clone());
            Ok(Backend {
                domains: Arc::new(stores.domains),
                menus: Arc::new(stores.menus),
                menu_actions: Arc::new(stores.menu_actions),
                policy: Arc::new(stores.policy),
                pool: Some(pool),
            })
        }
    }
}

async fn build_auth(
    config: &AppConfig,
    backend: &Backend,
) -> Result<(PolicyRuntime, EnforcementGate)> {
    let runtime = PolicyRuntime::new(Arc::new(RbacEngine::new()), Arc::clone(&backend.policy));

    match (&config.enforcement.default_policy_file, config.enforcement.seed_on_boot) {
        (Some(path), true) => {
            let policy = DefaultPolicy::load(path)?;
            let report = runtime.seed(&policy).await?;
            info!(
                objects = report.objects,
                roles = report.roles,
                rules = report.rules,
                "Default policy applied"
            );
        }
        _ => {
            runtime.reload().await?;
        }
    }
    for a in &config.enforcement.bootstrap_assignments {
        let added = runtime
            .assign_role(&a.subject, &a.role)
            .await
            .with_context(|| format!("bootstrap assignment {} -> {}", a.subject, a.role))?;
        info!(subject = %a.subject, role = %a.role, added, "Bootstrap role assignment applied");
    }

    let gate = EnforcementGate::new(runtime.engine())
        .enabled(config.enforcement.enable)
        .with_skipper(allow_path_prefix_skipper(
            config.enforcement.skip_path_prefixes.iter().cloned(),
        ))
        .with_skipper(allow_method_skipper(["OPTIONS"]));
    if !gate.is_enabled() {
        warn!("Policy enforcement is DISABLED");
    }
    Ok((runtime, gate))
}

async fn build_routes(
    config: &AppConfig,
    backend: &Backend,
    runtime: PolicyRuntime,
    gate: EnforcementGate,
) -> Result<Router> {
    let services = Services {
        domains: DomainService::new(Arc::clone(&backend.domains)),
        menus: MenuService::new(Arc::clone(&backend.menus), Arc::clone(&backend.menu_actions)),
        policy: runtime,
    };

    if config.menu.enable {
        if let Some(path) = &config.menu.data {
            services.menus.init_data(path).await?;
        }
    }

    let jwt = if config.auth.enable {
        JwtConfig::from_secret(config.auth.jwt_secret.as_bytes())
    } else {
        warn!("JWT authentication is disabled; subjects come from the X-Subject-Id header");
        JwtConfig::disabled()
    };
    let read_timeout = (config.http.read_timeout_secs > 0)
        .then(|| Duration::from_secs(config.http.read_timeout_secs));
    Ok(build_router(services, gate, jwt, read_timeout))
}

fn abort(stage: LifecycleState) -> impl FnOnce(anyhow::Error) -> StartupError {
    move |source| StartupError { stage, source }
}

/// Run every startup stage up to a bound listener. Teardown steps for each
/// built component are pushed onto `teardown` as they come up.
async fn start(
    config: &AppConfig,
    lifecycle: &mut Lifecycle,
    teardown: &mut Teardown,
) -> Result<HttpServer, StartupError> {
    use LifecycleState::*;

    if config.monitor.enable {
        let agent = MonitorAgent::start(&config.monitor.addr)
            .await
            .map_err(abort(MonitorReady))?;
        teardown.push("monitor", move || agent.stop(COMPONENT_STOP_TIMEOUT));
    }
    lifecycle.advance(MonitorReady).map_err(|e| abort(MonitorReady)(e.into()))?;

    let backend = open_backend(config).await.map_err(abort(AuthReady))?;
    if let Some(pool) = backend.pool.clone() {
        teardown.push("database pool", move || async move {
            bounded("database pool close", COMPONENT_STOP_TIMEOUT, pool.close()).await?;
            info!("Database pool closed");
            Ok(())
        });
    }
    let (runtime, gate) = build_auth(config, &backend).await.map_err(abort(AuthReady))?;
    lifecycle.advance(AuthReady).map_err(|e| abort(AuthReady)(e.into()))?;

    let router = build_routes(config, &backend, runtime, gate)
        .await
        .map_err(abort(RoutesReady))?;
    lifecycle.advance(RoutesReady).map_err(|e| abort(RoutesReady)(e.into()))?;

    let addr = config.http.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))
        .map_err(abort(Serving))?;
    let server = HttpServer::start(listener, router)
        .context("failed to start HTTP server")
        .map_err(abort(Serving))?;
    lifecycle.advance(Serving).map_err(|e| abort(Serving)(e.into()))?;
    Ok(server)
}

/// Run the web server until a signal drains it. Returns the exit code.
pub async fn run(args: WebArgs, signals: mpsc::Receiver<ProcessSignal>) -> i32 {
    run_with(args, signals, None).await
}

/// As `run`, reporting the bound address on `ready` once serving.
pub async fn run_with(
    args: WebArgs,
    mut signals: mpsc::Receiver<ProcessSignal>,
    ready: Option<oneshot::Sender<SocketAddr>>,
) -> i32 {
    let mut lifecycle = Lifecycle::new();
    let mut teardown = Teardown::default();

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("startup aborted at {}: {e:#}", LifecycleState::ConfigLoaded);
            return 1;
        }
    };
    if lifecycle.advance(LifecycleState::ConfigLoaded).is_err() {
        return 1;
    }

    let guard = match logging::init(&config.log) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("startup aborted at {}: {e:#}", LifecycleState::LoggingReady);
            return 1;
        }
    };
    teardown.push("logging", move || async move {
        if let Err(e) = guard.flush() {
            eprintln!("failed to flush logs: {e}");
        }
        Ok(())
    });
    if lifecycle.advance(LifecycleState::LoggingReady).is_err() {
        teardown.run().await;
        return 1;
    }
    match config.to_masked_json() {
        Ok(json) => info!(config = %json, conf = %args.conf.display(), "Configuration loaded"),
        Err(e) => warn!(error = %e, "Could not render configuration"),
    }

    let mut server = match start(&config, &mut lifecycle, &mut teardown).await {
        Ok(s) => s,
        Err(e) => {
            error!(stage = %e.stage, error = %format!("{:#}", e.source), "Startup aborted");
            eprintln!("{e}");
            teardown.run().await;
            return 1;
        }
    };
    if let Some(ready) = ready {
        let _ = ready.send(server.local_addr());
    }

    let exit = loop {
        tokio::select! {
            Some(sig) = signals.recv() => {
                if sig.starts_draining() {
                    info!(signal = ?sig, "Shutdown signal received");
                    break ServeExit::Signal(sig);
                }
                info!(signal = ?sig, "Signal ignored");
            }
            res = server.finished() => {
                match res {
                    Ok(()) => error!("HTTP server stopped unexpectedly"),
                    Err(e) => error!(error = %format!("{e:#}"), "HTTP server failed"),
                }
                break ServeExit::ListenerStopped;
            }
        }
    };

    if let Err(e) = lifecycle.advance(LifecycleState::Draining) {
        warn!(error = %e, "Lifecycle out of step");
    }
    let grace = config.http.shutdown_timeout();
    teardown.push("http listener", move || async move {
        let outcome = server.shutdown(grace).await;
        info!(?outcome, "HTTP server stopped");
        Ok(())
    });
    info!(steps = teardown.len(), "Tearing down");
    teardown.run().await;
    let _ = lifecycle.advance(LifecycleState::Stopped);

    exit.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[tokio::test]
    async fn bounded_gives_up_on_a_stuck_step() {
        let err = bounded(
            "database pool close",
            Duration::from_millis(20),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("database pool close did not finish"));

        bounded("quick", Duration::from_secs(1), async {}).await.unwrap();
    }

    #[test]
    fn states_only_move_forward_one_step() {
        let mut lc = Lifecycle::new();
        assert!(lc.advance(LifecycleState::LoggingReady).is_err());
        lc.advance(LifecycleState::ConfigLoaded).unwrap();
        assert!(lc.advance(LifecycleState::ConfigLoaded).is_err());
        assert!(lc.advance(LifecycleState::Uninitialized).is_err());

        let mut s = LifecycleState::LoggingReady;
        while let Some(next) = s.next() {
            lc.advance(next).unwrap();
            s = next;
        }
        assert_eq!(lc.state(), LifecycleState::Stopped);
        assert!(LifecycleState::Stopped.next().is_none());
    }

    #[test]
    fn signal_classification() {
        assert!(ProcessSignal::Terminate.starts_draining());
        assert!(ProcessSignal::Interrupt.starts_draining());
        assert!(ProcessSignal::Quit.starts_draining());
        assert!(!ProcessSignal::Hangup.starts_draining());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(ServeExit::Signal(ProcessSignal::Terminate).exit_code(), 0);
        assert_eq!(ServeExit::Signal(ProcessSignal::Quit).exit_code(), 0);
        assert_eq!(ServeExit::Signal(ProcessSignal::Hangup).exit_code(), 1);
        assert_eq!(ServeExit::ListenerStopped.exit_code(), 1);
    }

    #[tokio::test]
    async fn teardown_runs_newest_first_and_survives_failures() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut td = Teardown::default();
        for name in ["logging", "monitor", "runtime", "listener"] {
            let order = Arc::clone(&order);
            td.push(name, move || async move {
                order.lock().unwrap().push(name);
                if name == "runtime" {
                    anyhow::bail!("pool close failed");
                }
                Ok(())
            });
        }
        td.run().await;
        assert_eq!(
            *order.lock().unwrap(),
            vec!["listener", "runtime", "monitor", "logging"]
        );
    }

    #[test]
    fn startup_error_names_stage() {
        let e = StartupError {
            stage: LifecycleState::AuthReady,
            source: anyhow::anyhow!("policy file missing"),
        };
        assert_eq!(
            e.to_string(),
            "startup aborted at AuthReady: policy file missing"
        );
    }

    #[tokio::test]
    async fn missing_config_exits_nonzero() {
        let (_tx, rx) = mpsc::channel(1);
        let args = WebArgs {
            conf: PathBuf::from("/nonexistent/highway.toml"),
            policy: None,
            menu: None,
        };
        assert_eq!(run(args, rx).await, 1);
    }
}
