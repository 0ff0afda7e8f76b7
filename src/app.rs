//! Dialplan applications executed on a channel through `sendmsg`

use crate::channel::HangupCause;
use crate::command::SendMsg;
use crate::commands::ChannelVariables;
use crate::error::{EslError, EslResult};
use std::time::Duration;

define_parse_error! {
    /// Error returned when parsing an unknown `say` type.
    pub struct ParseSayTypeError => "say type"
}

define_header_enum! {
    error_type: ParseSayTypeError,
    /// What kind of value `say` reads out.
    pub enum SayType {
        Number => "NUMBER",
        Items => "ITEMS",
        Persons => "PERSONS",
        Messages => "MESSAGES",
        Currency => "CURRENCY",
        TimeMeasurement => "TIME_MEASUREMENT",
        CurrentDate => "CURRENT_DATE",
        CurrentTime => "CURRENT_TIME",
        CurrentDateTime => "CURRENT_DATE_TIME",
        TelephoneNumber => "TELEPHONE_NUMBER",
        TelephoneExtension => "TELEPHONE_EXTENSION",
        Url => "URL",
        IpAddress => "IP_ADDRESS",
        EmailAddress => "EMAIL_ADDRESS",
        PostalAddress => "POSTAL_ADDRESS",
        AccountNumber => "ACCOUNT_NUMBER",
        NameSpelled => "NAME_SPELLED",
        NamePhonetic => "NAME_PHONETIC",
        ShortDateTime => "SHORT_DATE_TIME",
    }
}

define_parse_error! {
    /// Error returned when parsing an unknown `say` method.
    pub struct ParseSayMethodError => "say method"
}

define_header_enum! {
    error_type: ParseSayMethodError,
    /// How `say` reads a value.
    pub enum SayMethod {
        NotApplicable => "N/A",
        Pronounced => "PRONOUNCED",
        Iterated => "ITERATED",
        Counted => "COUNTED",
    }
}

define_parse_error! {
    /// Error returned when parsing an unknown `say` gender.
    pub struct ParseSayGenderError => "say gender"
}

define_header_enum! {
    error_type: ParseSayGenderError,
    /// Grammatical gender for languages that need one.
    pub enum SayGender {
        Feminine => "FEMININE",
        Masculine => "MASCULINE",
        Neuter => "NEUTER",
    }
}

/// `play_and_get_digits`: play a prompt and collect DTMF into a channel variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayAndGetDigits {
    min_digits: u32,
    max_digits: u32,
    tries: u32,
    timeout: Duration,
    terminators: String,
    file: String,
    invalid_file: String,
    variable: String,
    regex: String,
    digit_timeout: Duration,
}

impl PlayAndGetDigits {
    /// Most digits the application accepts.
    pub const MAX_DIGITS: u32 = 128;

    pub fn new(file: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            min_digits: 0,
            max_digits: Self::MAX_DIGITS,
            tries: 1,
            timeout: Duration::from_millis(5000),
            terminators: "#".to_string(),
            file: file.into(),
            invalid_file: "silence_stream://150".to_string(),
            variable: variable.into(),
            regex: "\\d+".to_string(),
            digit_timeout: Duration::from_millis(2000),
        }
    }

    pub fn digits(mut self, min: u32, max: u32) -> EslResult<Self> {
        if min > max || max > Self::MAX_DIGITS {
            return Err(EslError::invalid_command(format!(
                "digit range {}..={} must satisfy min <= max <= {}",
                min,
                max,
                Self::MAX_DIGITS
            )));
        }
        self.min_digits = min;
        self.max_digits = max;
        Ok(self)
    }

    pub fn tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self
    }

    /// Wait after the prompt before retrying.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn terminators(mut self, terminators: impl Into<String>) -> Self {
        self.terminators = terminators.into();
        self
    }

    pub fn invalid_file(mut self, file: impl Into<String>) -> Self {
        self.invalid_file = file.into();
        self
    }

    pub fn regex(mut self, regex: impl Into<String>) -> Self {
        self.regex = regex.into();
        self
    }

    /// Inter-digit timeout.
    pub fn digit_timeout(mut self, timeout: Duration) -> Self {
        self.digit_timeout = timeout;
        self
    }

    fn argument(&self) -> String {
        format!(
            "{} {} {} {} '{}' '{}' {} {} {} {}",
            self.min_digits,
            self.max_digits,
            self.tries,
            self.timeout
                .as_millis(),
            self.terminators,
            self.file,
            self.invalid_file,
            self.variable,
            self.regex,
            self.digit_timeout
                .as_millis()
        )
    }
}

/// `record <path> <time limit> <silence threshold> <silence hits>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub path: String,
    /// Seconds; 0 means no limit.
    pub time_limit: u32,
    /// Energy level below which audio counts as silence.
    pub silence_threshold: u32,
    /// Seconds of silence tolerated before the recording stops.
    pub silence_hits: u32,
}

impl Record {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            time_limit: 0,
            silence_threshold: 0,
            silence_hits: 3,
        }
    }
}

/// `playback [{vars}]<file>`, optionally looped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playback {
    pub file: String,
    pub variables: ChannelVariables,
    pub loops: u32,
}

impl Playback {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            variables: ChannelVariables::new(),
            loops: 1,
        }
    }
}

/// `say <lang> <type> <method> <gender> <text>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Say {
    pub language: String,
    pub say_type: SayType,
    pub method: SayMethod,
    pub gender: SayGender,
    pub text: String,
}

/// `speak <engine>|<voice>|<text>[|<timer>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Speak {
    pub engine: String,
    pub voice: String,
    pub text: String,
    pub timer: Option<String>,
}

impl Speak {
    /// Flite with the `kal` voice.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            engine: "flite".to_string(),
            voice: "kal".to_string(),
            text: text.into(),
            timer: None,
        }
    }
}

/// A dialplan application plus its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AppCommand {
    Answer,
    Park,
    PreAnswer,
    Hangup(HangupCause),
    Playback(Playback),
    PlayAndGetDigits(PlayAndGetDigits),
    Record(Record),
    Say(Say),
    Speak(Speak),
    Sleep(Duration),
    /// `set <name>=<value>`
    Set { name: String, value: String },
    /// Any other application.
    Raw { name: String, arg: Option<String> },
}

impl AppCommand {
    pub fn app_name(&self) -> &str {
        match self {
            AppCommand::Answer => "answer",
            AppCommand::Park => "park",
            AppCommand::PreAnswer => "pre_answer",
            AppCommand::Hangup(_) => "hangup",
            AppCommand::Playback(_) => "playback",
            AppCommand::PlayAndGetDigits(_) => "play_and_get_digits",
            AppCommand::Record(_) => "record",
            AppCommand::Say(_) => "say",
            AppCommand::Speak(_) => "speak",
            AppCommand::Sleep(_) => "sleep",
            AppCommand::Set { .. } => "set",
            AppCommand::Raw { name, .. } => name.as_str(),
        }
    }

    /// Argument string, `None` for applications that take none.
    pub fn argument(&self) -> Option<String> {
        match self {
            AppCommand::Answer | AppCommand::Park | AppCommand::PreAnswer => None,
            AppCommand::Hangup(cause) => Some(cause.to_string()),
            AppCommand::Playback(p) => Some(format!("{}{}", p.variables, p.file)),
            AppCommand::PlayAndGetDigits(p) => Some(p.argument()),
            AppCommand::Record(r) => Some(format!(
                "{} {} {} {}",
                r.path, r.time_limit, r.silence_threshold, r.silence_hits
            )),
            AppCommand::Say(s) => Some(format!(
                "{} {} {} {} {}",
                s.language, s.say_type, s.method, s.gender, s.text
            )),
            AppCommand::Speak(s) => Some(match &s.timer {
                Some(timer) => format!("{}|{}|{}|{}", s.engine, s.voice, s.text, timer),
                None => format!("{}|{}|{}", s.engine, s.voice, s.text),
            }),
            AppCommand::Sleep(d) => Some(
                d.as_millis()
                    .to_string(),
            ),
            AppCommand::Set { name, value } => Some(format!("{}={}", name, value)),
            AppCommand::Raw { arg, .. } => arg.clone(),
        }
    }

    /// `sendmsg` for the dial-in socket's own channel.
    pub fn into_sendmsg(self) -> SendMsg {
        let loops = match &self {
            AppCommand::Playback(p) => p.loops,
            _ => 1,
        };
        let mut msg = SendMsg::execute(self.app_name()).loops(loops);
        if let Some(arg) = self.argument() {
            msg = msg.arg(arg);
        }
        msg
    }

    /// `sendmsg` targeting the given leg.
    pub fn execute_on(self, uuid: impl Into<String>) -> SendMsg {
        self.into_sendmsg()
            .uuid(uuid)
    }
}

impl From<AppCommand> for SendMsg {
    fn from(app: AppCommand) -> Self {
        app.into_sendmsg()
    }
}

impl From<Playback> for AppCommand {
    fn from(p: Playback) -> Self {
        AppCommand::Playback(p)
    }
}

impl From<PlayAndGetDigits> for AppCommand {
    fn from(p: PlayAndGetDigits) -> Self {
        AppCommand::PlayAndGetDigits(p)
    }
}

impl From<Record> for AppCommand {
    fn from(r: Record) -> Self {
        AppCommand::Record(r)
    }
}

impl From<Say> for AppCommand {
    fn from(s: Say) -> Self {
        AppCommand::Say(s)
    }
}

impl From<Speak> for AppCommand {
    fn from(s: Speak) -> Self {
        AppCommand::Speak(s)
    }
}
