//! Outgoing commands and the replies they produce

use crate::{
    channel::HangupCause,
    constants::{LINE_TERMINATOR, REPLY_ERR, REPLY_OK},
    error::{EslError, EslResult},
    event::EventFormat,
    headers::EventHeader,
    message::EslMessage,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Reject values that would split into extra protocol lines.
fn validate_no_newlines(s: &str, context: &str) -> EslResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(EslError::invalid_command(format!(
            "{} must not contain newlines",
            context
        )));
    }
    Ok(())
}

fn validate_not_empty(s: &str, context: &str) -> EslResult<()> {
    if s.trim()
        .is_empty()
    {
        return Err(EslError::invalid_command(format!(
            "{} must not be empty",
            context
        )));
    }
    Ok(())
}

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, increasing identity of a submitted command.
///
/// Used in logs and on [`EslResponse`]; never sent to the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl CommandId {
    pub fn next() -> Self {
        CommandId(NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reply-Text classification.
///
/// Commands answer `+OK …` or `-ERR …`. A few (`getvar`) answer with a bare value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReplyStatus {
    /// Reply-Text starts with `+OK` or is absent/empty.
    Ok,
    /// Reply-Text starts with `-ERR`.
    Err,
    /// Reply-Text present but neither of the above.
    Other,
}

impl ReplyStatus {
    pub fn from_reply_text(reply_text: Option<&str>) -> Self {
        match reply_text {
            None | Some("") => ReplyStatus::Ok,
            Some(t) if t.starts_with(REPLY_OK) => ReplyStatus::Ok,
            Some(t) if t.starts_with(REPLY_ERR) => ReplyStatus::Err,
            Some(_) => ReplyStatus::Other,
        }
    }
}

/// The reply frame matched to a submitted command.
#[derive(Debug, Clone)]
pub struct EslResponse {
    command: String,
    command_id: CommandId,
    message: EslMessage,
    status: ReplyStatus,
}

impl EslResponse {
    pub fn new(command: impl Into<String>, command_id: CommandId, message: EslMessage) -> Self {
        let status = ReplyStatus::from_reply_text(message.reply_text());
        Self {
            command: command.into(),
            command_id,
            message,
            status,
        }
    }

    /// Redacted one-line rendering of the command that produced this reply.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn command_id(&self) -> CommandId {
        self.command_id
    }

    /// `true` if Reply-Text is `+OK` or absent.
    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    pub fn reply_status(&self) -> ReplyStatus {
        self.status
    }

    pub fn reply_text(&self) -> Option<&str> {
        self.message
            .reply_text()
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.message
            .header(name)
    }

    pub fn body_lines(&self) -> &[String] {
        self.message
            .body_lines()
    }

    /// Body lines joined with `\n` (the `api` output).
    pub fn body(&self) -> String {
        self.message
            .body()
    }

    pub fn message(&self) -> &EslMessage {
        &self.message
    }

    pub fn into_message(self) -> EslMessage {
        self.message
    }

    /// `Job-UUID` of a `bgapi` reply.
    ///
    /// The switch puts it both in Reply-Text (`+OK Job-UUID: <uuid>`) and in a
    /// dedicated header; the header is authoritative.
    pub fn job_uuid(&self) -> EslResult<Uuid> {
        let raw = self
            .header(EventHeader::JobUuid)
            .ok_or_else(|| EslError::missing_header(EventHeader::JobUuid.as_str()))?;
        raw.parse()
            .map_err(|_| EslError::invalid_header_value(EventHeader::JobUuid.as_str(), raw))
    }

    /// `Ok(self)` for `+OK`, otherwise the matching error.
    pub fn into_result(self) -> EslResult<Self> {
        match self.status {
            ReplyStatus::Ok => Ok(self),
            ReplyStatus::Err => Err(EslError::CommandFailed {
                reply_text: self
                    .reply_text()
                    .unwrap_or(REPLY_ERR)
                    .to_string(),
            }),
            ReplyStatus::Other => Err(EslError::UnexpectedReply {
                reply_text: self
                    .reply_text()
                    .unwrap_or("")
                    .to_string(),
            }),
        }
    }
}

define_parse_error! {
    /// Error returned when parsing an unknown log level.
    pub struct ParseLogLevelError => "log level"
}

define_header_enum! {
    error_type: ParseLogLevelError,
    /// Switch log levels accepted by `log <level>`, most to least severe.
    pub enum LogLevel {
        Console => "CONSOLE",
        Alert => "ALERT",
        Crit => "CRIT",
        Error => "ERR",
        Warning => "WARNING",
        Notice => "NOTICE",
        Info => "INFO",
        Debug => "DEBUG",
    }
}

/// `sendmsg` that executes a dialplan application on a channel.
///
/// Without a leg UUID the message targets the channel of a dial-in socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMsg {
    uuid: Option<String>,
    app: String,
    arg: Option<String>,
    loops: u32,
    event_lock: bool,
}

impl SendMsg {
    pub fn execute(app: impl Into<String>) -> Self {
        Self {
            uuid: None,
            app: app.into(),
            arg: None,
            loops: 1,
            event_lock: false,
        }
    }

    /// Target leg; omit on a dial-in socket.
    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    pub fn loops(mut self, loops: u32) -> Self {
        self.loops = loops;
        self
    }

    /// Queue behind earlier `sendmsg`s instead of running concurrently.
    pub fn event_lock(mut self, event_lock: bool) -> Self {
        self.event_lock = event_lock;
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app
    }

    pub fn app_arg(&self) -> Option<&str> {
        self.arg
            .as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.uuid
            .as_deref()
    }

    fn to_lines(&self) -> EslResult<Vec<String>> {
        validate_not_empty(&self.app, "execute app")?;
        validate_no_newlines(&self.app, "execute app")?;
        if let Some(arg) = &self.arg {
            validate_no_newlines(arg, "execute arg")?;
        }
        let mut lines = vec![
            sendmsg_line(self.uuid.as_deref())?,
            "call-command: execute".to_string(),
            format!("execute-app-name: {}", self.app),
            format!(
                "execute-app-arg: {}",
                self.arg
                    .as_deref()
                    .unwrap_or_default()
            ),
            format!("loops: {}", self.loops),
        ];
        if self.event_lock {
            lines.push("event-lock: true".to_string());
        }
        Ok(lines)
    }
}

fn sendmsg_line(uuid: Option<&str>) -> EslResult<String> {
    match uuid {
        Some(u) => {
            validate_no_newlines(u, "sendmsg uuid")?;
            Ok(format!("sendmsg {}", u))
        }
        None => Ok("sendmsg".to_string()),
    }
}

/// Every command the engine can put on the wire.
#[derive(Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EslCommand {
    /// `auth <password>`
    Auth { password: String },
    /// `userauth <user>:<password>`
    UserAuth { user: String, password: String },
    /// `api <command>`: synchronous API call.
    Api { command: String },
    /// `bgapi <command>`: result arrives later as `BACKGROUND_JOB`.
    BgApi { command: String },
    /// `event <format> <names>`
    Event { format: EventFormat, events: String },
    /// `nixevent <names>`
    NixEvent { events: String },
    /// `noevents`
    NoEvents,
    /// `filter <header> <value>`
    Filter { header: String, value: String },
    /// `filter delete <header> [<value>]`
    FilterDelete {
        header: String,
        value: Option<String>,
    },
    /// `log <level>`
    Log { level: LogLevel },
    /// `nolog`
    NoLog,
    /// `exit`: the switch replies then closes the socket.
    Exit,
    /// `connect`: first command on a dial-in socket.
    Connect,
    /// `myevents [<uuid>] <format>`
    MyEvents {
        format: EventFormat,
        uuid: Option<String>,
    },
    /// `linger [<seconds>]`
    Linger { timeout: Option<u32> },
    /// `nolinger`
    NoLinger,
    /// `resume`
    Resume,
    /// `divert_events on|off`
    DivertEvents { on: bool },
    /// `getvar <name>` (dial-in sockets)
    GetVar { name: String },
    /// `sendmsg` executing an application.
    SendMsg(SendMsg),
    /// `sendmsg` hanging a channel up.
    Hangup {
        uuid: Option<String>,
        cause: HangupCause,
    },
}

impl fmt::Debug for EslCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EslCommand::Auth { .. } => f
                .debug_struct("Auth")
                .field("password", &"[REDACTED]")
                .finish(),
            EslCommand::UserAuth { user, .. } => f
                .debug_struct("UserAuth")
                .field("user", user)
                .field("password", &"[REDACTED]")
                .finish(),
            other => write!(f, "{}", other),
        }
    }
}

/// First wire line, with credentials masked.
impl fmt::Display for EslCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EslCommand::Auth { .. } => f.write_str("auth [REDACTED]"),
            EslCommand::UserAuth { user, .. } => write!(f, "userauth {}:[REDACTED]", user),
            EslCommand::SendMsg(msg) => write!(
                f,
                "sendmsg{} execute {}",
                msg.target()
                    .map(|u| format!(" {}", u))
                    .unwrap_or_default(),
                msg.app_name()
            ),
            EslCommand::Hangup { uuid, cause } => write!(
                f,
                "sendmsg{} hangup {}",
                uuid.as_ref()
                    .map(|u| format!(" {}", u))
                    .unwrap_or_default(),
                cause
            ),
            other => match other.to_lines() {
                Ok(lines) => f.write_str(
                    lines
                        .first()
                        .map(String::as_str)
                        .unwrap_or_default(),
                ),
                Err(_) => f.write_str("<invalid command>"),
            },
        }
    }
}

impl EslCommand {
    /// Command word, for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            EslCommand::Auth { .. } => "auth",
            EslCommand::UserAuth { .. } => "userauth",
            EslCommand::Api { .. } => "api",
            EslCommand::BgApi { .. } => "bgapi",
            EslCommand::Event { .. } => "event",
            EslCommand::NixEvent { .. } => "nixevent",
            EslCommand::NoEvents => "noevents",
            EslCommand::Filter { .. } | EslCommand::FilterDelete { .. } => "filter",
            EslCommand::Log { .. } => "log",
            EslCommand::NoLog => "nolog",
            EslCommand::Exit => "exit",
            EslCommand::Connect => "connect",
            EslCommand::MyEvents { .. } => "myevents",
            EslCommand::Linger { .. } => "linger",
            EslCommand::NoLinger => "nolinger",
            EslCommand::Resume => "resume",
            EslCommand::DivertEvents { .. } => "divert_events",
            EslCommand::GetVar { .. } => "getvar",
            EslCommand::SendMsg(_) | EslCommand::Hangup { .. } => "sendmsg",
        }
    }

    fn simple(verb: &str, args: &[&str]) -> Vec<String> {
        let mut line = String::from(verb);
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        vec![line]
    }

    /// Validate user-supplied fields and produce the command's lines.
    pub fn to_lines(&self) -> EslResult<Vec<String>> {
        match self {
            EslCommand::Auth { password } => {
                validate_no_newlines(password, "password")?;
                Ok(Self::simple("auth", &[password]))
            }
            EslCommand::UserAuth { user, password } => {
                validate_no_newlines(user, "user")?;
                validate_no_newlines(password, "password")?;
                Ok(Self::simple(
                    "userauth",
                    &[&format!("{}:{}", user, password)],
                ))
            }
            EslCommand::Api { command } => {
                validate_not_empty(command, "api command")?;
                validate_no_newlines(command, "api command")?;
                Ok(Self::simple("api", &[command]))
            }
            EslCommand::BgApi { command } => {
                validate_not_empty(command, "bgapi command")?;
                validate_no_newlines(command, "bgapi command")?;
                Ok(Self::simple("bgapi", &[command]))
            }
            EslCommand::Event { format, events } => {
                validate_not_empty(events, "event list")?;
                validate_no_newlines(events, "event list")?;
                Ok(Self::simple("event", &[format.as_str(), events]))
            }
            EslCommand::NixEvent { events } => {
                validate_not_empty(events, "nixevent list")?;
                validate_no_newlines(events, "nixevent list")?;
                Ok(Self::simple("nixevent", &[events]))
            }
            EslCommand::NoEvents => Ok(Self::simple("noevents", &[])),
            EslCommand::Filter { header, value } => {
                validate_not_empty(header, "filter header")?;
                validate_no_newlines(header, "filter header")?;
                validate_no_newlines(value, "filter value")?;
                Ok(Self::simple("filter", &[header, value]))
            }
            EslCommand::FilterDelete { header, value } => {
                validate_not_empty(header, "filter delete header")?;
                validate_no_newlines(header, "filter delete header")?;
                match value {
                    Some(v) => {
                        validate_no_newlines(v, "filter delete value")?;
                        Ok(Self::simple("filter", &["delete", header, v]))
                    }
                    None => Ok(Self::simple("filter", &["delete", header])),
                }
            }
            EslCommand::Log { level } => Ok(Self::simple("log", &[level.as_str()])),
            EslCommand::NoLog => Ok(Self::simple("nolog", &[])),
            EslCommand::Exit => Ok(Self::simple("exit", &[])),
            EslCommand::Connect => Ok(Self::simple("connect", &[])),
            EslCommand::MyEvents { format, uuid } => match uuid {
                Some(u) => {
                    validate_no_newlines(u, "myevents uuid")?;
                    Ok(Self::simple("myevents", &[u, format.as_str()]))
                }
                None => Ok(Self::simple("myevents", &[format.as_str()])),
            },
            EslCommand::Linger { timeout } => Ok(match timeout {
                Some(secs) => Self::simple("linger", &[&secs.to_string()]),
                None => Self::simple("linger", &[]),
            }),
            EslCommand::NoLinger => Ok(Self::simple("nolinger", &[])),
            EslCommand::Resume => Ok(Self::simple("resume", &[])),
            EslCommand::DivertEvents { on } => Ok(Self::simple(
                "divert_events",
                &[if *on { "on" } else { "off" }],
            )),
            EslCommand::GetVar { name } => {
                validate_not_empty(name, "getvar name")?;
                validate_no_newlines(name, "getvar name")?;
                Ok(Self::simple("getvar", &[name]))
            }
            EslCommand::SendMsg(msg) => msg.to_lines(),
            EslCommand::Hangup { uuid, cause } => Ok(vec![
                sendmsg_line(uuid.as_deref())?,
                "call-command: hangup".to_string(),
                format!("hangup-cause: {}", cause),
            ]),
        }
    }

    /// Lines each terminated by `\n`, followed by the blank line that ends a command.
    pub fn to_wire_format(&self) -> EslResult<String> {
        let mut wire = String::new();
        for line in self.to_lines()? {
            wire.push_str(&line);
            wire.push_str(LINE_TERMINATOR);
        }
        wire.push_str(LINE_TERMINATOR);
        Ok(wire)
    }
}

impl From<SendMsg> for EslCommand {
    fn from(msg: SendMsg) -> Self {
        EslCommand::SendMsg(msg)
    }
}
