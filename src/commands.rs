//! Builders for API commands sent with `api` / `bgapi`

use crate::error::{EslError, EslResult};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// An API command: a command word plus its argument string.
///
/// `Display` renders `"<command> <argument>"`, the text passed to `api` or `bgapi`.
pub trait ApiCommand: fmt::Debug + Send + Sync {
    fn command(&self) -> &'static str;
    fn argument(&self) -> String;

    fn to_api_string(&self) -> String {
        let argument = self.argument();
        if argument.is_empty() {
            self.command()
                .to_string()
        } else {
            format!("{} {}", self.command(), argument)
        }
    }
}

/// Ordered channel variables rendered as a `{name=value,...}` prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelVariables {
    vars: Vec<(String, String)>,
}

impl ChannelVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable. Names may not contain `=`, `,`, `{` or `}`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> EslResult<()> {
        let name = name.into();
        if name.is_empty()
            || name.contains(|c: char| matches!(c, '=' | ',' | '{' | '}' | ' '))
        {
            return Err(EslError::invalid_command(format!(
                "invalid channel variable name {:?}",
                name
            )));
        }
        let value = value.into();
        match self
            .vars
            .iter_mut()
            .find(|(n, _)| *n == name)
        {
            Some(slot) => slot.1 = value,
            None => self
                .vars
                .push((name, value)),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.vars
            .is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars
            .len()
    }
}

impl fmt::Display for ChannelVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self
            .vars
            .is_empty()
        {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (name, value)) in self
            .vars
            .iter()
            .enumerate()
        {
            if i > 0 {
                f.write_str(",")?;
            }
            if value.contains(',') || value.contains(' ') {
                write!(f, "{}='{}'", name, value)?;
            } else {
                write!(f, "{}={}", name, value)?;
            }
        }
        f.write_str("}")
    }
}

/// Where an originated leg goes once answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginateTarget {
    /// `&app(arg)`
    Application { name: String, arg: Option<String> },
    /// `<extension> [<dialplan> [<context>]]`
    Extension {
        extension: String,
        dialplan: Option<String>,
        context: Option<String>,
    },
}

impl OriginateTarget {
    pub fn application(name: impl Into<String>) -> Self {
        OriginateTarget::Application {
            name: name.into(),
            arg: None,
        }
    }

    pub fn extension(extension: impl Into<String>) -> Self {
        OriginateTarget::Extension {
            extension: extension.into(),
            dialplan: None,
            context: None,
        }
    }
}

impl fmt::Display for OriginateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginateTarget::Application { name, arg } => {
                write!(f, "&{}({})", name, arg.as_deref().unwrap_or_default())
            }
            OriginateTarget::Extension {
                extension,
                dialplan,
                context,
            } => {
                f.write_str(extension)?;
                if let Some(dialplan) = dialplan {
                    write!(f, " {}", dialplan)?;
                    if let Some(context) = context {
                        write!(f, " {}", context)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// `originate {vars}<dial string> <target>`
///
/// Always sets `ignore_early_media=true`; adds `origination_uuid` and
/// `enable_heartbeat_events` when configured.
#[derive(Debug, Clone)]
pub struct Originate {
    dial_string: String,
    target: OriginateTarget,
    variables: ChannelVariables,
    origination_uuid: Option<Uuid>,
    heartbeat: Option<Duration>,
}

impl Originate {
    pub fn new(dial_string: impl Into<String>, target: OriginateTarget) -> Self {
        Self {
            dial_string: dial_string.into(),
            target,
            variables: ChannelVariables::new(),
            origination_uuid: None,
            heartbeat: None,
        }
    }

    /// Pre-assign the new leg's UUID so its events can be matched before the reply.
    pub fn origination_uuid(mut self, uuid: Uuid) -> Self {
        self.origination_uuid = Some(uuid);
        self
    }

    /// Ask for `SESSION_HEARTBEAT` events at this interval (whole seconds).
    pub fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = Some(interval);
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> EslResult<Self> {
        self.variables
            .set(name, value)?;
        Ok(self)
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.origination_uuid
    }
}

impl ApiCommand for Originate {
    fn command(&self) -> &'static str {
        "originate"
    }

    fn argument(&self) -> String {
        let mut vars = self
            .variables
            .clone();
        // names below are constants and always valid
        if let Some(uuid) = self.origination_uuid {
            let _ = vars.set("origination_uuid", uuid.to_string());
        }
        let _ = vars.set("ignore_early_media", "true");
        if let Some(interval) = self.heartbeat {
            let _ = vars.set("enable_heartbeat_events", interval.as_secs().to_string());
        }
        format!("{}{} {}", vars, self.dial_string, self.target)
    }
}

/// `uuid_getvar <uuid> <name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidGetVar {
    pub uuid: Uuid,
    pub name: String,
}

impl ApiCommand for UuidGetVar {
    fn command(&self) -> &'static str {
        "uuid_getvar"
    }

    fn argument(&self) -> String {
        format!("{} {}", self.uuid, self.name)
    }
}

/// `uuid_setvar <uuid> <name> [<value>]`; no value unsets the variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidSetVar {
    pub uuid: Uuid,
    pub name: String,
    pub value: Option<String>,
}

impl ApiCommand for UuidSetVar {
    fn command(&self) -> &'static str {
        "uuid_setvar"
    }

    fn argument(&self) -> String {
        match &self.value {
            Some(value) => format!("{} {} {}", self.uuid, self.name, value),
            None => format!("{} {}", self.uuid, self.name),
        }
    }
}

/// When a scheduled API command fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedTime {
    /// `+<secs>`: once, relative to now.
    In(Duration),
    /// `@<secs>`: repeatedly at this interval.
    Every(Duration),
    /// `<epoch>`: once, at an absolute Unix time.
    At(u64),
}

impl fmt::Display for SchedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedTime::In(d) => write!(f, "+{}", d.as_secs()),
            SchedTime::Every(d) => write!(f, "@{}", d.as_secs()),
            SchedTime::At(epoch) => write!(f, "{}", epoch),
        }
    }
}

/// `sched_api <time> <group> <command> [&]`
#[derive(Debug)]
pub struct SchedApi {
    time: SchedTime,
    group: String,
    command: String,
    background: bool,
}

impl SchedApi {
    pub fn new(time: SchedTime, group: impl Into<String>, command: &dyn ApiCommand) -> Self {
        Self::raw(time, group, command.to_api_string())
    }

    /// Schedule an already rendered command string.
    pub fn raw(time: SchedTime, group: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            time,
            group: group.into(),
            command: command.into(),
            background: false,
        }
    }

    /// Run the scheduled command in its own thread (`&` suffix).
    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }
}

impl ApiCommand for SchedApi {
    fn command(&self) -> &'static str {
        "sched_api"
    }

    fn argument(&self) -> String {
        let mut arg = format!("{} {} {}", self.time, self.group, self.command);
        if self.background {
            arg.push_str(" &");
        }
        arg
    }
}
