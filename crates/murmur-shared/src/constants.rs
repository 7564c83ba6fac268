/// Default HTTP port (REST + WebSocket)
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Minimum accepted password length at registration
pub const MIN_PASSWORD_LEN: usize = 8;

/// Default capacity of a connection's outbound push queue
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Maximum size of a single live-channel text frame (64 KiB)
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Hard WebSocket message limit enforced by the transport (1 MiB). Frames
/// between [`MAX_FRAME_SIZE`] and this limit are answered with an `error`
/// event; anything larger drops the connection.
pub const MAX_TRANSPORT_MESSAGE_SIZE: usize = 16 * MAX_FRAME_SIZE;

/// Reply body for a successful send
pub const MSG_SEND_OK: &str = "Message added successfully.";
