//! Protocol constants and configuration defaults

/// Default FreeSWITCH event socket port for dial-out (inbound mode) connections
pub const DEFAULT_ESL_PORT: u16 = 8021;

/// Read size for a single transport read (64KB)
pub const SOCKET_BUF_SIZE: usize = 64 * 1024;

/// Initial allocation of the decoder buffer
pub const BUF_CHUNK: usize = 64 * 1024;

/// Largest `Content-Length` accepted for one frame (8MB)
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024 * 1024;

/// Largest amount of undecoded bytes held at once (16MB)
pub const MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Terminates every header line and every command line
pub const LINE_TERMINATOR: &str = "\n";
/// Terminates a header block or a whole command
pub const HEADER_TERMINATOR: &str = "\n\n";

/// Content-Type header values
pub const CONTENT_TYPE_AUTH_REQUEST: &str = "auth/request";
pub const CONTENT_TYPE_COMMAND_REPLY: &str = "command/reply";
pub const CONTENT_TYPE_API_RESPONSE: &str = "api/response";
pub const CONTENT_TYPE_TEXT_EVENT_PLAIN: &str = "text/event-plain";
pub const CONTENT_TYPE_TEXT_EVENT_JSON: &str = "text/event-json";
pub const CONTENT_TYPE_TEXT_EVENT_XML: &str = "text/event-xml";
pub const CONTENT_TYPE_DISCONNECT_NOTICE: &str = "text/disconnect-notice";
pub const CONTENT_TYPE_LOG_DATA: &str = "log/data";

/// Framing header: payload type.
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
/// Framing header: body length in bytes.
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
/// Framing header: command reply status.
pub const HEADER_REPLY_TEXT: &str = "Reply-Text";
/// Framing header on disconnect notices (`linger` means the socket stays open).
pub const HEADER_CONTENT_DISPOSITION: &str = "Content-Disposition";

/// Reply-Text prefix of a successful command
pub const REPLY_OK: &str = "+OK";
/// Reply-Text prefix of a failed command
pub const REPLY_ERR: &str = "-ERR";

/// Connect plus handshake timeout in milliseconds
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;

/// Capacity of each listener lane before events are dropped
pub const MAX_EVENT_QUEUE_SIZE: usize = 1000;
