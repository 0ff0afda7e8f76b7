//! Event model: decoding `text/event-plain` frames into [`EslEvent`]s

use crate::channel::{AnswerState, CallDirection, CallState, ChannelState, HangupCause};
use crate::constants::{
    CONTENT_TYPE_TEXT_EVENT_JSON, CONTENT_TYPE_TEXT_EVENT_PLAIN, CONTENT_TYPE_TEXT_EVENT_XML,
    HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE,
};
use crate::error::{EslError, EslResult};
use crate::headers::EventHeader;
use crate::message::EslMessage;
use crate::protocol::split_header_line;
use percent_encoding::{percent_decode_str, percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

define_parse_error! {
    /// Error returned when parsing an unknown event format name.
    pub struct ParseEventFormatError => "event format"
}

define_header_enum! {
    error_type: ParseEventFormatError,
    /// Encodings the switch can deliver events in. Only `plain` is decoded.
    pub enum EventFormat {
        Plain => "plain",
        Json => "json",
        Xml => "xml",
    }
}

impl EventFormat {
    /// Format implied by a frame's `Content-Type`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            CONTENT_TYPE_TEXT_EVENT_PLAIN => Some(Self::Plain),
            CONTENT_TYPE_TEXT_EVENT_JSON => Some(Self::Json),
            CONTENT_TYPE_TEXT_EVENT_XML => Some(Self::Xml),
            _ => None,
        }
    }
}

define_parse_error! {
    /// Error returned when parsing an unknown event type string.
    pub struct ParseEventTypeError => "event type"
}

define_header_enum! {
    error_type: ParseEventTypeError,
    /// FreeSWITCH event names, in `switch_event.c` order.
    #[derive(Serialize, Deserialize)]
    pub enum EslEventType {
        Custom => "CUSTOM",
        Clone => "CLONE",
        ChannelCreate => "CHANNEL_CREATE",
        ChannelDestroy => "CHANNEL_DESTROY",
        ChannelState => "CHANNEL_STATE",
        ChannelCallstate => "CHANNEL_CALLSTATE",
        ChannelAnswer => "CHANNEL_ANSWER",
        ChannelHangup => "CHANNEL_HANGUP",
        ChannelHangupComplete => "CHANNEL_HANGUP_COMPLETE",
        ChannelExecute => "CHANNEL_EXECUTE",
        ChannelExecuteComplete => "CHANNEL_EXECUTE_COMPLETE",
        ChannelHold => "CHANNEL_HOLD",
        ChannelUnhold => "CHANNEL_UNHOLD",
        ChannelBridge => "CHANNEL_BRIDGE",
        ChannelUnbridge => "CHANNEL_UNBRIDGE",
        ChannelProgress => "CHANNEL_PROGRESS",
        ChannelProgressMedia => "CHANNEL_PROGRESS_MEDIA",
        ChannelOutgoing => "CHANNEL_OUTGOING",
        ChannelPark => "CHANNEL_PARK",
        ChannelUnpark => "CHANNEL_UNPARK",
        ChannelApplication => "CHANNEL_APPLICATION",
        ChannelOriginate => "CHANNEL_ORIGINATE",
        ChannelUuid => "CHANNEL_UUID",
        Api => "API",
        Log => "LOG",
        InboundChan => "INBOUND_CHAN",
        OutboundChan => "OUTBOUND_CHAN",
        Startup => "STARTUP",
        Shutdown => "SHUTDOWN",
        Publish => "PUBLISH",
        Unpublish => "UNPUBLISH",
        Talk => "TALK",
        Notalk => "NOTALK",
        SessionCrash => "SESSION_CRASH",
        ModuleLoad => "MODULE_LOAD",
        ModuleUnload => "MODULE_UNLOAD",
        Dtmf => "DTMF",
        Message => "MESSAGE",
        PresenceIn => "PRESENCE_IN",
        NotifyIn => "NOTIFY_IN",
        PresenceOut => "PRESENCE_OUT",
        PresenceProbe => "PRESENCE_PROBE",
        MessageWaiting => "MESSAGE_WAITING",
        MessageQuery => "MESSAGE_QUERY",
        Roster => "ROSTER",
        Codec => "CODEC",
        BackgroundJob => "BACKGROUND_JOB",
        DetectedSpeech => "DETECTED_SPEECH",
        DetectedTone => "DETECTED_TONE",
        PrivateCommand => "PRIVATE_COMMAND",
        Heartbeat => "HEARTBEAT",
        Trap => "TRAP",
        AddSchedule => "ADD_SCHEDULE",
        DelSchedule => "DEL_SCHEDULE",
        ExeSchedule => "EXE_SCHEDULE",
        ReSchedule => "RE_SCHEDULE",
        ReloadXml => "RELOADXML",
        Notify => "NOTIFY",
        PhoneFeature => "PHONE_FEATURE",
        PhoneFeatureSubscribe => "PHONE_FEATURE_SUBSCRIBE",
        SendMessage => "SEND_MESSAGE",
        RecvMessage => "RECV_MESSAGE",
        RequestParams => "REQUEST_PARAMS",
        ChannelData => "CHANNEL_DATA",
        General => "GENERAL",
        Command => "COMMAND",
        SessionHeartbeat => "SESSION_HEARTBEAT",
        ClientDisconnected => "CLIENT_DISCONNECTED",
        ServerDisconnected => "SERVER_DISCONNECTED",
        SendInfo => "SEND_INFO",
        RecvInfo => "RECV_INFO",
        RecvRtcpMessage => "RECV_RTCP_MESSAGE",
        SendRtcpMessage => "SEND_RTCP_MESSAGE",
        CallSecure => "CALL_SECURE",
        Nat => "NAT",
        RecordStart => "RECORD_START",
        RecordStop => "RECORD_STOP",
        PlaybackStart => "PLAYBACK_START",
        PlaybackStop => "PLAYBACK_STOP",
        CallUpdate => "CALL_UPDATE",
        Failure => "FAILURE",
        SocketData => "SOCKET_DATA",
        MediaBugStart => "MEDIA_BUG_START",
        MediaBugStop => "MEDIA_BUG_STOP",
        ConferenceDataQuery => "CONFERENCE_DATA_QUERY",
        ConferenceData => "CONFERENCE_DATA",
        CallSetupReq => "CALL_SETUP_REQ",
        CallSetupResult => "CALL_SETUP_RESULT",
        CallDetail => "CALL_DETAIL",
        DeviceState => "DEVICE_STATE",
        Text => "TEXT",
        ShutdownRequested => "SHUTDOWN_REQUESTED",
        /// Subscription wildcard
        All => "ALL",
    }
}

/// An asynchronous event from the switch.
///
/// Always carries an `Event-Name` header. Header values are URL-decoded; body lines
/// are whatever followed the nested `Content-Length` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EslEvent {
    event_type: Option<EslEventType>,
    headers: HashMap<String, String>,
    body: Vec<String>,
}

impl EslEvent {
    /// Empty event of the given type, for building outgoing or test events.
    pub fn with_type(event_type: EslEventType) -> Self {
        let mut headers = HashMap::new();
        headers.insert(
            EventHeader::EventName
                .as_str()
                .to_string(),
            event_type.to_string(),
        );
        Self {
            event_type: Some(event_type),
            headers,
            body: Vec::new(),
        }
    }

    /// Decode an event frame.
    ///
    /// Only `text/event-plain` is understood. XML and JSON encodings are rejected with
    /// [`EslError::UnsupportedContentType`] rather than delivered half-parsed.
    pub fn from_message(message: &EslMessage) -> EslResult<Self> {
        match message.content_type() {
            Some(CONTENT_TYPE_TEXT_EVENT_PLAIN) => Self::from_plain_lines(message.body_lines()),
            Some(other) => Err(EslError::UnsupportedContentType {
                content_type: other.to_string(),
            }),
            None => Err(EslError::missing_header(HEADER_CONTENT_TYPE)),
        }
    }

    /// Decode the nested plain-text form: `Name: value` lines, URL-encoded values,
    /// then body lines after the inner `Content-Length` header.
    pub fn from_plain_lines<S: AsRef<str>>(lines: &[S]) -> EslResult<Self> {
        let mut headers = HashMap::new();
        let mut body = Vec::new();
        let mut in_body = false;

        for line in lines {
            let line = line.as_ref();
            if in_body {
                if !line.is_empty() {
                    body.push(line.to_string());
                }
                continue;
            }
            if line.is_empty() {
                continue;
            }
            let (name, value) = split_header_line(line)?;
            if name == HEADER_CONTENT_LENGTH {
                in_body = true;
            }
            headers.insert(name.to_string(), percent_decode(value));
        }

        Self::from_headers(headers, body)
    }

    /// Build the `CHANNEL_DATA` event carried by the reply to `connect` on a dial-in
    /// socket. Its channel headers sit directly in the reply's header block.
    pub fn from_channel_data(message: &EslMessage) -> EslResult<Self> {
        let headers = message
            .headers()
            .map(|(name, value)| (name.to_string(), percent_decode(value)))
            .collect();
        Self::from_headers(headers, message.body_lines().to_vec())
    }

    fn from_headers(headers: HashMap<String, String>, body: Vec<String>) -> EslResult<Self> {
        let name = headers
            .get(EventHeader::EventName.as_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| EslError::missing_header(EventHeader::EventName.as_str()))?;
        let event_type = EslEventType::from_str(name).ok();
        Ok(Self {
            event_type,
            headers,
            body,
        })
    }

    /// Value of `Event-Name`.
    pub fn event_name(&self) -> &str {
        self.header(EventHeader::EventName)
            .unwrap_or_default()
    }

    /// Recognised event type, `None` for names this crate does not know.
    pub fn event_type(&self) -> Option<EslEventType> {
        self.event_type
    }

    pub fn is_event_type(&self, event_type: EslEventType) -> bool {
        self.event_type == Some(event_type)
    }

    pub fn is_background_job(&self) -> bool {
        self.is_event_type(EslEventType::BackgroundJob)
    }

    /// Exact-name header lookup.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .map(|s| s.as_str())
    }

    /// Like [`header`](Self::header) but a missing header is an error.
    pub fn require_header(&self, name: impl AsRef<str>) -> EslResult<&str> {
        let name = name.as_ref();
        self.header(name)
            .ok_or_else(|| EslError::missing_header(name))
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Insert or replace a header. Setting `Event-Name` also updates the event type.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name == EventHeader::EventName.as_str() {
            self.event_type = EslEventType::from_str(&value).ok();
        }
        self.headers
            .insert(name, value);
    }

    pub fn body_lines(&self) -> &[String] {
        &self.body
    }

    /// Body lines joined with `\n`, `None` when the event has no body.
    pub fn body(&self) -> Option<String> {
        if self
            .body
            .is_empty()
        {
            None
        } else {
            Some(
                self.body
                    .join("\n"),
            )
        }
    }

    pub fn set_body_lines(&mut self, lines: Vec<String>) {
        self.body = lines;
    }

    fn parse_header<T: FromStr>(&self, header: EventHeader) -> EslResult<T> {
        let raw = self.require_header(header)?;
        raw.parse()
            .map_err(|_| EslError::invalid_header_value(header.as_str(), raw))
    }

    /// `Unique-ID`: the channel this event belongs to.
    pub fn unique_id(&self) -> EslResult<Uuid> {
        self.parse_header(EventHeader::UniqueId)
    }

    pub fn caller_unique_id(&self) -> EslResult<Uuid> {
        self.parse_header(EventHeader::CallerUniqueId)
    }

    /// `Job-UUID` of a background job.
    pub fn job_uuid(&self) -> EslResult<Uuid> {
        self.parse_header(EventHeader::JobUuid)
    }

    pub fn core_uuid(&self) -> EslResult<Uuid> {
        self.parse_header(EventHeader::CoreUuid)
    }

    /// `Event-Date-Timestamp` in microseconds since the Unix epoch.
    pub fn event_date_timestamp(&self) -> EslResult<i64> {
        self.parse_header(EventHeader::EventDateTimestamp)
    }

    pub fn event_date_local(&self) -> Option<&str> {
        self.header(EventHeader::EventDateLocal)
    }

    pub fn event_date_gmt(&self) -> Option<&str> {
        self.header(EventHeader::EventDateGmt)
    }

    pub fn event_subclass(&self) -> Option<&str> {
        self.header(EventHeader::EventSubclass)
    }

    pub fn channel_name(&self) -> Option<&str> {
        self.header(EventHeader::ChannelName)
    }

    pub fn caller_id_name(&self) -> Option<&str> {
        self.header(EventHeader::CallerCallerIdName)
    }

    pub fn caller_id_number(&self) -> Option<&str> {
        self.header(EventHeader::CallerCallerIdNumber)
    }

    /// Dialled number, from `Channel-Destination-Number` or `Caller-Destination-Number`.
    pub fn destination_number(&self) -> Option<&str> {
        self.header(EventHeader::ChannelDestinationNumber)
            .or_else(|| self.header(EventHeader::CallerDestinationNumber))
    }

    pub fn channel_state(&self) -> EslResult<ChannelState> {
        self.parse_header(EventHeader::ChannelState)
    }

    /// Channel state from the numeric `Channel-State-Number` header.
    pub fn channel_state_number(&self) -> EslResult<ChannelState> {
        let raw = self.require_header(EventHeader::ChannelStateNumber)?;
        raw.parse::<u8>()
            .ok()
            .and_then(ChannelState::from_number)
            .ok_or_else(|| {
                EslError::invalid_header_value(EventHeader::ChannelStateNumber.as_str(), raw)
            })
    }

    pub fn call_state(&self) -> EslResult<CallState> {
        self.parse_header(EventHeader::ChannelCallState)
    }

    pub fn answer_state(&self) -> EslResult<AnswerState> {
        self.parse_header(EventHeader::AnswerState)
    }

    pub fn call_direction(&self) -> EslResult<CallDirection> {
        self.parse_header(EventHeader::CallDirection)
    }

    pub fn hangup_cause(&self) -> EslResult<HangupCause> {
        self.parse_header(EventHeader::HangupCause)
    }

    /// Single digit of a `DTMF` event.
    pub fn dtmf_digit(&self) -> EslResult<char> {
        self.parse_header(EventHeader::DtmfDigit)
    }

    /// `DTMF-Duration` in samples.
    pub fn dtmf_duration(&self) -> EslResult<u64> {
        self.parse_header(EventHeader::DtmfDuration)
    }

    /// API command a background job ran.
    pub fn job_command(&self) -> Option<&str> {
        self.header(EventHeader::JobCommand)
    }

    pub fn job_command_arg(&self) -> Option<&str> {
        self.header(EventHeader::JobCommandArg)
    }

    /// Channel variable `name`, stored in the event as `variable_<name>`.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&format!("variable_{}", name))
            .map(|s| s.as_str())
    }

    /// Serialize to the nested plain-text form the switch sends.
    ///
    /// `Event-Name` comes first, the other headers follow sorted by name, and
    /// `Content-Length` is recomputed from the body.
    pub fn to_plain_format(&self) -> String {
        use std::fmt::Write;
        let mut result = String::new();

        let _ = writeln!(
            result,
            "Event-Name: {}",
            percent_encode(
                self.event_name()
                    .as_bytes(),
                NON_ALPHANUMERIC
            )
        );

        let mut sorted: Vec<_> = self
            .headers
            .iter()
            .filter(|(k, _)| {
                k.as_str() != EventHeader::EventName.as_str() && k.as_str() != HEADER_CONTENT_LENGTH
            })
            .collect();
        sorted.sort_by_key(|(k, _)| k.as_str());

        for (key, value) in sorted {
            let _ = writeln!(
                result,
                "{}: {}",
                key,
                percent_encode(value.as_bytes(), NON_ALPHANUMERIC)
            );
        }

        if !self
            .body
            .is_empty()
        {
            let body: String = self
                .body
                .iter()
                .map(|line| format!("{}\n", line))
                .collect();
            let _ = writeln!(result, "{}: {}", HEADER_CONTENT_LENGTH, body.len());
            result.push('\n');
            result.push_str(&body);
        }

        result
    }
}

impl fmt::Display for EslEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EslEvent: name=[{}] headers={}, body={} lines",
            self.event_name(),
            self.headers
                .len(),
            self.body
                .len()
        )
    }
}

fn percent_decode(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_message(body: &str) -> EslMessage {
        EslMessage::new(
            vec![
                (
                    "Content-Length".to_string(),
                    body.len()
                        .to_string(),
                ),
                ("Content-Type".to_string(), "text/event-plain".to_string()),
            ],
            body.lines()
                .map(str::to_string)
                .collect(),
        )
    }

    #[test]
    fn heartbeat_event() {
        let msg = plain_message("Event-Name: HEARTBEAT\nCore-UUID: abc\nEvent-Info: x\n");
        let event = EslEvent::from_message(&msg).unwrap();
        assert_eq!(event.event_name(), "HEARTBEAT");
        assert_eq!(event.event_type(), Some(EslEventType::Heartbeat));
        assert_eq!(event.header("Core-UUID"), Some("abc"));
        assert_eq!(event.header("Event-Info"), Some("x"));
        assert!(event
            .body_lines()
            .is_empty());
        assert!(!event.is_background_job());
    }

    #[test]
    fn header_values_are_url_decoded() {
        let msg = plain_message(
            "Event-Name: CHANNEL_CREATE\nCaller-Caller-ID-Name: John%20Doe\nEvent-Date-Local: 2024-01-01%2012%3A00%3A00\n",
        );
        let event = EslEvent::from_message(&msg).unwrap();
        assert_eq!(event.caller_id_name(), Some("John Doe"));
        assert_eq!(event.event_date_local(), Some("2024-01-01 12:00:00"));
    }

    #[test]
    fn plus_is_not_a_space() {
        let msg = plain_message("Event-Name: CUSTOM\nX-Expr: 1+1\n");
        let event = EslEvent::from_message(&msg).unwrap();
        assert_eq!(event.header("X-Expr"), Some("1+1"));
    }

    #[test]
    fn invalid_utf8_escape_keeps_raw_value() {
        let msg = plain_message("Event-Name: CUSTOM\nX-Bytes: %FF%FE\n");
        let event = EslEvent::from_message(&msg).unwrap();
        assert_eq!(event.header("X-Bytes"), Some("%FF%FE"));
    }

    #[test]
    fn background_job_body_follows_inner_content_length() {
        let job = "c7709e9c-1517-11dc-842a-d3a3942d3d63";
        let msg = plain_message(&format!(
            "Event-Name: BACKGROUND_JOB\nJob-UUID: {job}\nJob-Command: originate\nJob-Command-Arg: sofia/default/1005%20%26park\nContent-Length: 41\n\n+OK 7f4de4bc-17d7-11dd-b7a0-db4edd065621\n"
        ));
        let event = EslEvent::from_message(&msg).unwrap();
        assert!(event.is_background_job());
        assert_eq!(
            event
                .job_uuid()
                .unwrap()
                .to_string(),
            job
        );
        assert_eq!(event.job_command(), Some("originate"));
        assert_eq!(event.job_command_arg(), Some("sofia/default/1005 &park"));
        assert_eq!(
            event.body_lines(),
            &["+OK 7f4de4bc-17d7-11dd-b7a0-db4edd065621".to_string()]
        );
        assert_eq!(
            event
                .body()
                .as_deref(),
            Some("+OK 7f4de4bc-17d7-11dd-b7a0-db4edd065621")
        );
    }

    #[test]
    fn missing_event_name_fails() {
        let msg = plain_message("Core-UUID: abc\n");
        match EslEvent::from_message(&msg) {
            Err(EslError::MissingHeader { header }) => assert_eq!(header, "Event-Name"),
            other => panic!("expected MissingHeader, got {:?}", other),
        }
    }

    #[test]
    fn malformed_line_fails_whole_event() {
        let msg = plain_message("Event-Name: HEARTBEAT\nno separator here\n");
        assert!(matches!(
            EslEvent::from_message(&msg),
            Err(EslError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn xml_and_json_rejected() {
        for content_type in ["text/event-xml", "text/event-json"] {
            let msg = EslMessage::new(
                vec![("Content-Type".to_string(), content_type.to_string())],
                vec!["<event/>".to_string()],
            );
            match EslEvent::from_message(&msg) {
                Err(EslError::UnsupportedContentType { content_type: ct }) => {
                    assert_eq!(ct, content_type)
                }
                other => panic!("expected UnsupportedContentType, got {:?}", other),
            }
        }
    }

    #[test]
    fn decoding_is_idempotent() {
        let msg = plain_message("Event-Name: DTMF\nDTMF-Digit: 5\nDTMF-Duration: 2000\n");
        let first = EslEvent::from_message(&msg).unwrap();
        let second = EslEvent::from_message(&msg).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_event_name_still_decodes() {
        let msg = plain_message("Event-Name: SOMETHING_NEW\n");
        let event = EslEvent::from_message(&msg).unwrap();
        assert_eq!(event.event_name(), "SOMETHING_NEW");
        assert_eq!(event.event_type(), None);
    }

    #[test]
    fn typed_accessors() {
        let uuid = "3f1f6c1e-8a4b-4d0e-9c2a-0a1b2c3d4e5f";
        let msg = plain_message(&format!(
            "Event-Name: CHANNEL_HANGUP\nUnique-ID: {uuid}\nEvent-Date-Timestamp: 1700000000123456\nChannel-State: CS_HANGUP\nChannel-State-Number: 10\nChannel-Call-State: HANGUP\nAnswer-State: hangup\nCall-Direction: inbound\nHangup-Cause: NORMAL_CLEARING\n"
        ));
        let event = EslEvent::from_message(&msg).unwrap();
        assert_eq!(
            event
                .unique_id()
                .unwrap()
                .to_string(),
            uuid
        );
        assert_eq!(
            event
                .event_date_timestamp()
                .unwrap(),
            1_700_000_000_123_456
        );
        assert_eq!(
            event
                .channel_state()
                .unwrap(),
            ChannelState::CsHangup
        );
        assert_eq!(
            event
                .channel_state_number()
                .unwrap(),
            ChannelState::CsHangup
        );
        assert_eq!(
            event
                .call_state()
                .unwrap(),
            CallState::Hangup
        );
        assert_eq!(
            event
                .answer_state()
                .unwrap(),
            AnswerState::Hangup
        );
        assert_eq!(
            event
                .call_direction()
                .unwrap(),
            CallDirection::Inbound
        );
        assert_eq!(
            event
                .hangup_cause()
                .unwrap(),
            HangupCause::NormalClearing
        );
    }

    #[test]
    fn dtmf_accessors() {
        let msg = plain_message("Event-Name: DTMF\nDTMF-Digit: %23\nDTMF-Duration: 1600\n");
        let event = EslEvent::from_message(&msg).unwrap();
        assert_eq!(
            event
                .dtmf_digit()
                .unwrap(),
            '#'
        );
        assert_eq!(
            event
                .dtmf_duration()
                .unwrap(),
            1600
        );
    }

    #[test]
    fn typed_accessor_missing_and_malformed() {
        let msg = plain_message(
            "Event-Name: CHANNEL_STATE\nUnique-ID: not-a-uuid\nChannel-State-Number: 99\nDTMF-Digit: 12\n",
        );
        let event = EslEvent::from_message(&msg).unwrap();
        assert!(matches!(
            event.unique_id(),
            Err(EslError::InvalidHeaderValue { .. })
        ));
        assert!(matches!(
            event.channel_state_number(),
            Err(EslError::InvalidHeaderValue { .. })
        ));
        assert!(matches!(
            event.dtmf_digit(),
            Err(EslError::InvalidHeaderValue { .. })
        ));
        match event.job_uuid() {
            Err(EslError::MissingHeader { header }) => assert_eq!(header, "Job-UUID"),
            other => panic!("expected MissingHeader, got {:?}", other),
        }
        assert!(event
            .channel_state()
            .is_err());
    }

    #[test]
    fn channel_data_from_connect_reply() {
        let msg = EslMessage::new(
            vec![
                ("Content-Type".to_string(), "command/reply".to_string()),
                ("Reply-Text".to_string(), "+OK".to_string()),
                ("Event-Name".to_string(), "CHANNEL_DATA".to_string()),
                (
                    "Unique-ID".to_string(),
                    "a1b2c3d4-e5f6-4a5b-8c9d-0e1f2a3b4c5d".to_string(),
                ),
                ("Caller-Caller-ID-Number".to_string(), "1000".to_string()),
                ("Channel-Destination-Number".to_string(), "5000".to_string()),
                ("variable_sip_from_display".to_string(), "Alice%20A".to_string()),
            ],
            Vec::new(),
        );
        let event = EslEvent::from_channel_data(&msg).unwrap();
        assert!(event.is_event_type(EslEventType::ChannelData));
        assert_eq!(event.caller_id_number(), Some("1000"));
        assert_eq!(event.destination_number(), Some("5000"));
        assert_eq!(event.variable("sip_from_display"), Some("Alice A"));
        assert!(event
            .unique_id()
            .is_ok());
    }

    #[test]
    fn plain_format_reparses_to_same_event() {
        let mut original = EslEvent::with_type(EslEventType::BackgroundJob);
        original.set_header("Job-UUID", "7f4de4bc-17d7-11dd-b7a0-db4edd065621");
        original.set_header("Up-Time", "0 years, 0 days");
        original.set_body_lines(vec!["+OK done".to_string(), "second".to_string()]);

        let plain = original.to_plain_format();
        assert!(plain.starts_with("Event-Name: BACKGROUND%5FJOB\n"));
        assert!(plain.contains("Up-Time: 0%20years%2C%200%20days\n"));
        assert!(plain.contains("Content-Length: 16\n\n+OK done\nsecond\n"));

        let parsed = EslEvent::from_message(&plain_message(&plain)).unwrap();
        assert_eq!(parsed.event_type(), original.event_type());
        assert_eq!(parsed.header("Up-Time"), Some("0 years, 0 days"));
        assert_eq!(parsed.body_lines(), original.body_lines());
    }

    #[test]
    fn display_does_not_dump_headers() {
        let mut event = EslEvent::with_type(EslEventType::Custom);
        event.set_header("X-Secret", "hunter2");
        let shown = event.to_string();
        assert_eq!(shown, "EslEvent: name=[CUSTOM] headers=2, body=0 lines");
    }

    #[test]
    fn event_format_names() {
        assert_eq!("plain".parse::<EventFormat>(), Ok(EventFormat::Plain));
        assert_eq!(EventFormat::Json.to_string(), "json");
        assert_eq!(
            EventFormat::from_content_type("text/event-xml"),
            Some(EventFormat::Xml)
        );
        assert_eq!(EventFormat::from_content_type("command/reply"), None);
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            "channel_answer".parse::<EslEventType>(),
            Ok(EslEventType::ChannelAnswer)
        );
        assert_eq!(EslEventType::ReloadXml.to_string(), "RELOADXML");
        assert_ne!(EslEventType::Notify, EslEventType::NotifyIn);
        assert!("UNKNOWN_EVENT"
            .parse::<EslEventType>()
            .is_err());
    }

    #[test]
    fn serializes_to_json() {
        let event = EslEvent::with_type(EslEventType::Heartbeat);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "Heartbeat");
        assert_eq!(json["headers"]["Event-Name"], "HEARTBEAT");
    }
}
