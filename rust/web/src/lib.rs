pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod rooms;
pub mod server;
pub mod session;

pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{EventBus, LastMove, RoomEvent, RoomTransport, LOBBY_CHANNEL};
pub use logging::{init_logging, init_test_logging, LogEntry, TestLogSubscriber};
pub use middleware::{log_response, with_request_logging};
pub use rooms::{
    GameMode, RegistryError, RoomDescriptor, RoomDirectory, RoomId, RoomListing, RoomRegistry,
    Visibility,
};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use session::{
    GameResult, PlayerSlots, RoomError, RoomSession, RoomSnapshot, SessionManager, BOT_IDENTITY,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_provides_shared_components() {
        let ctx = AppContext::new_for_tests();

        let event_bus = ctx.event_bus();
        let sessions = ctx.sessions();

        assert_eq!(event_bus.subscriber_count(), 0);
        assert!(sessions.active_rooms().is_empty());
        assert!(ctx.registry().is_empty());
    }
}
