//! Frame decoding: bytes in, [`EslMessage`]s out

use crate::{
    buffer::EslBuffer,
    constants::{
        CONTENT_TYPE_API_RESPONSE, CONTENT_TYPE_AUTH_REQUEST, CONTENT_TYPE_COMMAND_REPLY,
        CONTENT_TYPE_DISCONNECT_NOTICE, CONTENT_TYPE_LOG_DATA, CONTENT_TYPE_TEXT_EVENT_JSON,
        CONTENT_TYPE_TEXT_EVENT_PLAIN, CONTENT_TYPE_TEXT_EVENT_XML, HEADER_CONTENT_LENGTH,
        MAX_MESSAGE_SIZE,
    },
    error::{EslError, EslResult},
    message::EslMessage,
};
use tracing::trace;

/// Classification of a frame by its `Content-Type`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// Greeting sent by the switch before authentication
    AuthRequest,
    /// Reply to a non-api command
    CommandReply,
    /// Reply to `api`
    ApiResponse,
    /// Asynchronous event in any of the event encodings
    Event,
    /// The switch is about to close the socket
    Disconnect,
    /// Log line delivered after `log <level>`
    LogData,
    /// Anything else, with the raw content type
    Unknown(String),
}

impl MessageType {
    pub fn from_content_type(content_type: &str) -> Self {
        match content_type {
            CONTENT_TYPE_AUTH_REQUEST => MessageType::AuthRequest,
            CONTENT_TYPE_COMMAND_REPLY => MessageType::CommandReply,
            CONTENT_TYPE_API_RESPONSE => MessageType::ApiResponse,
            CONTENT_TYPE_TEXT_EVENT_PLAIN
            | CONTENT_TYPE_TEXT_EVENT_JSON
            | CONTENT_TYPE_TEXT_EVENT_XML => MessageType::Event,
            CONTENT_TYPE_DISCONNECT_NOTICE => MessageType::Disconnect,
            CONTENT_TYPE_LOG_DATA => MessageType::LogData,
            _ => MessageType::Unknown(content_type.to_string()),
        }
    }

    /// Replies consume a pending command slot.
    pub fn is_reply(&self) -> bool {
        matches!(self, MessageType::CommandReply | MessageType::ApiResponse)
    }
}

/// Decoder position inside the current frame
#[derive(Debug)]
enum ParseState {
    ReadingHeaders {
        headers: Vec<(String, String)>,
        content_length: Option<usize>,
    },
    ReadingBody {
        headers: Vec<(String, String)>,
        length: usize,
    },
}

impl Default for ParseState {
    fn default() -> Self {
        ParseState::ReadingHeaders {
            headers: Vec::new(),
            content_length: None,
        }
    }
}

/// Resumable frame decoder.
///
/// Header mode consumes `\n`-terminated lines until a blank line; if a
/// `Content-Length` header was seen the decoder switches to body mode and waits for
/// exactly that many bytes. Output does not depend on how the input was chunked.
pub struct FrameDecoder {
    buffer: EslBuffer,
    state: ParseState,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: EslBuffer::new(),
            state: ParseState::default(),
        }
    }

    /// Append received bytes.
    pub fn add_data(&mut self, data: &[u8]) -> EslResult<()> {
        self.buffer
            .extend_from_slice(data)
    }

    /// Bytes received but not yet part of an emitted frame (partial lines included).
    pub fn buffered_len(&self) -> usize {
        self.buffer
            .len()
    }

    /// Decode the next complete frame, or `Ok(None)` when more bytes are needed.
    ///
    /// Errors are fatal for the connection: the stream position is no longer trustworthy.
    pub fn parse_message(&mut self) -> EslResult<Option<EslMessage>> {
        loop {
            match &mut self.state {
                ParseState::ReadingHeaders {
                    headers,
                    content_length,
                } => {
                    let Some(raw) = self
                        .buffer
                        .extract_line()
                    else {
                        return Ok(None);
                    };
                    let line = std::str::from_utf8(&raw)
                        .map_err(|_| EslError::protocol_error("invalid UTF-8 in header line"))?;
                    let line = line
                        .strip_suffix('\r')
                        .unwrap_or(line);

                    if line.is_empty() {
                        if headers.is_empty() {
                            // stray separator between frames
                            continue;
                        }
                        let headers = std::mem::take(headers);
                        match content_length.take() {
                            Some(length) => {
                                self.state = ParseState::ReadingBody { headers, length };
                            }
                            None => {
                                let message = EslMessage::new(headers, Vec::new());
                                trace!("[RECV] {}", message);
                                return Ok(Some(message));
                            }
                        }
                        continue;
                    }

                    let (name, value) = split_header_line(line)?;
                    if name == HEADER_CONTENT_LENGTH {
                        *content_length = Some(parse_content_length(value)?);
                    }
                    headers.push((name.to_string(), value.to_string()));
                }
                ParseState::ReadingBody { headers, length } => {
                    let Some(raw) = self
                        .buffer
                        .extract_bytes(*length)
                    else {
                        return Ok(None);
                    };
                    let headers = std::mem::take(headers);
                    self.state = ParseState::default();
                    let body = String::from_utf8(raw.to_vec())
                        .map_err(|_| EslError::protocol_error("invalid UTF-8 in body"))?;
                    let message = EslMessage::new(headers, split_body_lines(&body));
                    trace!("[RECV] {}", message);
                    return Ok(Some(message));
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `Name: value` at the first colon, trimming both sides.
pub(crate) fn split_header_line(line: &str) -> EslResult<(&str, &str)> {
    let invalid = || EslError::InvalidHeader {
        header: line.to_string(),
    };
    let (name, value) = line
        .split_once(':')
        .ok_or_else(invalid)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid());
    }
    Ok((name, value.trim()))
}

fn parse_content_length(value: &str) -> EslResult<usize> {
    let length: usize = value
        .parse()
        .map_err(|_| EslError::invalid_header_value(HEADER_CONTENT_LENGTH, value))?;
    if length > MAX_MESSAGE_SIZE {
        return Err(EslError::protocol_error(format!(
            "Content-Length {} exceeds maximum {}",
            length, MAX_MESSAGE_SIZE
        )));
    }
    Ok(length)
}

/// Body text to lines; a final terminator does not produce an empty trailing line.
pub(crate) fn split_body_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::to_string)
        .collect()
}
