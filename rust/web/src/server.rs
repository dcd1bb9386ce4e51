use crate::events::{EventBus, RoomTransport};
use crate::handlers;
use crate::middleware::with_request_logging;
use crate::rooms::{RoomDirectory, RoomRegistry};
use crate::session::SessionManager;
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::Reply;
use warp::{Filter, Rejection};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Loopback on an ephemeral port.
    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Shared application state: one event bus, one room directory, one
/// session manager.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServerConfig,
    event_bus: Arc<EventBus>,
    registry: Arc<RoomRegistry>,
    sessions: Arc<SessionManager>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let registry = Arc::new(RoomRegistry::new());
        let sessions = Arc::new(SessionManager::new(
            Arc::clone(&registry) as Arc<dyn RoomDirectory>,
            Arc::clone(&event_bus) as Arc<dyn RoomTransport>,
        ));

        Self::new_with_dependencies(config, event_bus, registry, sessions)
    }

    pub fn new_with_dependencies(
        config: ServerConfig,
        event_bus: Arc<EventBus>,
        registry: Arc<RoomRegistry>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            config,
            event_bus,
            registry,
            sessions,
        }
    }

    pub fn new_for_tests() -> Self {
        Self::new(ServerConfig::for_tests())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn registry(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sessions)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            context: AppContext::new(config),
        }
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let config = context.config().clone();
        let bind_addr = Self::bind_addr(&config)?;

        let preflight = if bind_addr.port() != 0 {
            Some(std::net::TcpListener::bind(bind_addr).map_err(ServerError::BindError)?)
        } else {
            None
        };
        drop(preflight);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = with_request_logging(Self::routes(&context));
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "web server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let health = Self::health_route();
        let room_routes = Self::room_routes(context);
        let game_routes = Self::game_routes(context);
        let sse_routes = Self::sse_routes(context);

        health
            .or(room_routes)
            .unify()
            .or(game_routes)
            .unify()
            .or(sse_routes)
            .unify()
            .boxed()
    }

    fn health_route() -> BoxedFilter<(warp::reply::Response,)> {
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(|| handlers::health::health().into_response())
            .boxed()
    }

    fn room_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let registry = context.registry();
        let sessions = context.sessions();
        let event_bus = context.event_bus();

        let list = warp::path!("api" / "rooms")
            .and(warp::get())
            .and(Self::with_registry(registry.clone()))
            .and_then(|registry: Arc<RoomRegistry>| async move {
                let response = handlers::list_rooms(registry).await;
                Ok::<_, Rejection>(response)
            });

        let create = warp::path!("api" / "rooms")
            .and(warp::post())
            .and(Self::with_registry(registry))
            .and(Self::with_event_bus(event_bus))
            .and(Self::with_identity())
            .and(warp::body::json())
            .and_then(
                |registry: Arc<RoomRegistry>,
                 event_bus: Arc<EventBus>,
                 identity: String,
                 request: handlers::CreateRoomRequest| async move {
                    let response =
                        handlers::create_room(registry, event_bus, identity, request).await;
                    Ok::<_, Rejection>(response)
                },
            );

        let join = warp::path!("api" / "rooms" / String / "join")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::with_identity())
            .and(warp::body::json())
            .and_then(
                |room_id: String,
                 sessions: Arc<SessionManager>,
                 identity: String,
                 request: handlers::JoinRoomRequest| async move {
                    let response = handlers::join_room(sessions, room_id, identity, request).await;
                    Ok::<_, Rejection>(response)
                },
            );

        let leave = warp::path!("api" / "rooms" / String / "leave")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::with_identity())
            .and_then(
                |room_id: String, sessions: Arc<SessionManager>, identity: String| async move {
                    let response = handlers::leave_room(sessions, room_id, identity).await;
                    Ok::<_, Rejection>(response)
                },
            );

        let dissolve = warp::path!("api" / "rooms" / String)
            .and(warp::delete())
            .and(Self::with_session_manager(sessions))
            .and(Self::with_identity())
            .and_then(
                |room_id: String, sessions: Arc<SessionManager>, identity: String| async move {
                    let response = handlers::dissolve_room(sessions, room_id, identity).await;
                    Ok::<_, Rejection>(response)
                },
            );

        list.or(create)
            .unify()
            .or(join)
            .unify()
            .or(leave)
            .unify()
            .or(dissolve)
            .unify()
            .boxed()
    }

    fn game_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let sessions = context.sessions();

        let moves = warp::path!("api" / "rooms" / String / "moves")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::with_identity())
            .and(warp::body::json())
            .and_then(
                |room_id: String,
                 sessions: Arc<SessionManager>,
                 identity: String,
                 request: handlers::MoveRequest| async move {
                    let response = handlers::submit_move(sessions, room_id, identity, request).await;
                    Ok::<_, Rejection>(response)
                },
            );

        let rematch = warp::path!("api" / "rooms" / String / "rematch")
            .and(warp::post())
            .and(Self::with_session_manager(sessions.clone()))
            .and(Self::with_identity())
            .and_then(
                |room_id: String, sessions: Arc<SessionManager>, identity: String| async move {
                    let response = handlers::request_rematch(sessions, room_id, identity).await;
                    Ok::<_, Rejection>(response)
                },
            );

        let rematch_response = warp::path!("api" / "rooms" / String / "rematch" / "response")
            .and(warp::post())
            .and(Self::with_session_manager(sessions))
            .and(Self::with_identity())
            .and(warp::body::json())
            .and_then(
                |room_id: String,
                 sessions: Arc<SessionManager>,
                 identity: String,
                 request: handlers::RematchAnswer| async move {
                    let response =
                        handlers::respond_rematch(sessions, room_id, identity, request).await;
                    Ok::<_, Rejection>(response)
                },
            );

        moves
            .or(rematch_response)
            .unify()
            .or(rematch)
            .unify()
            .boxed()
    }

    fn sse_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let registry = context.registry();
        let event_bus = context.event_bus();

        let room_events = warp::path!("api" / "rooms" / String / "events")
            .and(warp::get())
            .and(Self::with_registry(registry))
            .and(Self::with_event_bus(event_bus.clone()))
            .and_then(
                |room_id: String, registry: Arc<RoomRegistry>, event_bus: Arc<EventBus>| async move {
                    let response =
                        handlers::sse::stream_room_events(room_id, registry, event_bus).await;
                    Ok::<_, Rejection>(response)
                },
            );

        let lobby_events = warp::path!("api" / "lobby" / "events")
            .and(warp::get())
            .and(Self::with_event_bus(event_bus))
            .and_then(|event_bus: Arc<EventBus>| async move {
                let response = handlers::sse::stream_lobby_events(event_bus).await;
                Ok::<_, Rejection>(response)
            });

        room_events.or(lobby_events).unify().boxed()
    }

    /// Acting identity from the `x-player` header; absent means anonymous.
    fn with_identity() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
        warp::header::optional::<String>("x-player")
            .map(|header: Option<String>| header.unwrap_or_else(|| "anonymous".to_string()))
    }

    fn with_session_manager(
        sessions: Arc<SessionManager>,
    ) -> impl Filter<Extract = (Arc<SessionManager>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&sessions))
    }

    fn with_registry(
        registry: Arc<RoomRegistry>,
    ) -> impl Filter<Extract = (Arc<RoomRegistry>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&registry))
    }

    fn with_event_bus(
        event_bus: Arc<EventBus>,
    ) -> impl Filter<Extract = (Arc<EventBus>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&event_bus))
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
