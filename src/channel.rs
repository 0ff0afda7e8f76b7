//! Channel and call state values carried in event headers.

use serde::{Deserialize, Serialize};

define_parse_error! {
    /// Error returned when parsing an invalid channel state string.
    pub struct ParseChannelStateError => "channel state"
}

define_header_enum! {
    error_type: ParseChannelStateError,
    /// `switch_channel_state_t`, carried as a name in `Channel-State` and as an
    /// integer in `Channel-State-Number`. Declaration order is the numeric value.
    #[derive(Serialize, Deserialize)]
    pub enum ChannelState {
        CsNew => "CS_NEW",
        CsInit => "CS_INIT",
        CsRouting => "CS_ROUTING",
        CsSoftExecute => "CS_SOFT_EXECUTE",
        CsExecute => "CS_EXECUTE",
        CsExchangeMedia => "CS_EXCHANGE_MEDIA",
        CsPark => "CS_PARK",
        CsConsumeMedia => "CS_CONSUME_MEDIA",
        CsHibernate => "CS_HIBERNATE",
        CsReset => "CS_RESET",
        CsHangup => "CS_HANGUP",
        CsReporting => "CS_REPORTING",
        CsDestroy => "CS_DESTROY",
        CsNone => "CS_NONE",
    }
}

impl ChannelState {
    /// Look up the `Channel-State-Number` value.
    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL
            .get(n as usize)
            .copied()
    }

    pub fn as_number(&self) -> u8 {
        Self::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or_default() as u8
    }
}

define_parse_error! {
    /// Error returned when parsing an invalid call state string.
    pub struct ParseCallStateError => "call state"
}

define_header_enum! {
    error_type: ParseCallStateError,
    /// `switch_channel_callstate_t` from `Channel-Call-State`.
    #[derive(Serialize, Deserialize)]
    pub enum CallState {
        Down => "DOWN",
        Dialing => "DIALING",
        Ringing => "RINGING",
        Early => "EARLY",
        Active => "ACTIVE",
        Held => "HELD",
        RingWait => "RING_WAIT",
        Hangup => "HANGUP",
        Unheld => "UNHELD",
    }
}

define_parse_error! {
    /// Error returned when parsing an invalid answer state string.
    pub struct ParseAnswerStateError => "answer state"
}

define_header_enum! {
    error_type: ParseAnswerStateError,
    /// `Answer-State` header. Lowercase on the wire.
    #[derive(Serialize, Deserialize)]
    pub enum AnswerState {
        Hangup => "hangup",
        Answered => "answered",
        Early => "early",
        Ringing => "ringing",
    }
}

define_parse_error! {
    /// Error returned when parsing an invalid call direction string.
    pub struct ParseCallDirectionError => "call direction"
}

define_header_enum! {
    error_type: ParseCallDirectionError,
    /// `Call-Direction` header.
    #[derive(Serialize, Deserialize)]
    pub enum CallDirection {
        Inbound => "inbound",
        Outbound => "outbound",
    }
}

define_parse_error! {
    /// Error returned when parsing an unknown hangup cause.
    pub struct ParseHangupCauseError => "hangup cause"
}

define_header_enum! {
    error_type: ParseHangupCauseError,
    /// Q.850 based hangup causes used in `Hangup-Cause` and in `hangup` commands.
    #[derive(Serialize, Deserialize)]
    pub enum HangupCause {
        None => "NONE",
        UnallocatedNumber => "UNALLOCATED_NUMBER",
        NoRouteTransitNet => "NO_ROUTE_TRANSIT_NET",
        NoRouteDestination => "NO_ROUTE_DESTINATION",
        ChannelUnacceptable => "CHANNEL_UNACCEPTABLE",
        CallAwardedDelivered => "CALL_AWARDED_DELIVERED",
        NormalClearing => "NORMAL_CLEARING",
        UserBusy => "USER_BUSY",
        NoUserResponse => "NO_USER_RESPONSE",
        NoAnswer => "NO_ANSWER",
        SubscriberAbsent => "SUBSCRIBER_ABSENT",
        CallRejected => "CALL_REJECTED",
        NumberChanged => "NUMBER_CHANGED",
        RedirectionToNewDestination => "REDIRECTION_TO_NEW_DESTINATION",
        ExchangeRoutingError => "EXCHANGE_ROUTING_ERROR",
        DestinationOutOfOrder => "DESTINATION_OUT_OF_ORDER",
        InvalidNumberFormat => "INVALID_NUMBER_FORMAT",
        FacilityRejected => "FACILITY_REJECTED",
        ResponseToStatusEnquiry => "RESPONSE_TO_STATUS_ENQUIRY",
        NormalUnspecified => "NORMAL_UNSPECIFIED",
        NormalCircuitCongestion => "NORMAL_CIRCUIT_CONGESTION",
        NetworkOutOfOrder => "NETWORK_OUT_OF_ORDER",
        NormalTemporaryFailure => "NORMAL_TEMPORARY_FAILURE",
        SwitchCongestion => "SWITCH_CONGESTION",
        AccessInfoDiscarded => "ACCESS_INFO_DISCARDED",
        RequestedChanUnavail => "REQUESTED_CHAN_UNAVAIL",
        PreEmpted => "PRE_EMPTED",
        FacilityNotSubscribed => "FACILITY_NOT_SUBSCRIBED",
        OutgoingCallBarred => "OUTGOING_CALL_BARRED",
        IncomingCallBarred => "INCOMING_CALL_BARRED",
        BearercapabilityNotauth => "BEARERCAPABILITY_NOTAUTH",
        BearercapabilityNotavail => "BEARERCAPABILITY_NOTAVAIL",
        ServiceUnavailable => "SERVICE_UNAVAILABLE",
        BearercapabilityNotimpl => "BEARERCAPABILITY_NOTIMPL",
        ChanNotImplemented => "CHAN_NOT_IMPLEMENTED",
        FacilityNotImplemented => "FACILITY_NOT_IMPLEMENTED",
        ServiceNotImplemented => "SERVICE_NOT_IMPLEMENTED",
        InvalidCallReference => "INVALID_CALL_REFERENCE",
        IncompatibleDestination => "INCOMPATIBLE_DESTINATION",
        InvalidMsgUnspecified => "INVALID_MSG_UNSPECIFIED",
        MandatoryIeMissing => "MANDATORY_IE_MISSING",
        MessageTypeNonexist => "MESSAGE_TYPE_NONEXIST",
        WrongMessage => "WRONG_MESSAGE",
        IeNonexist => "IE_NONEXIST",
        InvalidIeContents => "INVALID_IE_CONTENTS",
        WrongCallState => "WRONG_CALL_STATE",
        RecoveryOnTimerExpire => "RECOVERY_ON_TIMER_EXPIRE",
        MandatoryIeLengthError => "MANDATORY_IE_LENGTH_ERROR",
        ProtocolError => "PROTOCOL_ERROR",
        Interworking => "INTERWORKING",
        Success => "SUCCESS",
        OriginatorCancel => "ORIGINATOR_CANCEL",
        Crash => "CRASH",
        SystemShutdown => "SYSTEM_SHUTDOWN",
        LoseRace => "LOSE_RACE",
        ManagerRequest => "MANAGER_REQUEST",
        BlindTransfer => "BLIND_TRANSFER",
        AttendedTransfer => "ATTENDED_TRANSFER",
        AllottedTimeout => "ALLOTTED_TIMEOUT",
        UserChallenge => "USER_CHALLENGE",
        MediaTimeout => "MEDIA_TIMEOUT",
        PickedOff => "PICKED_OFF",
        UserNotRegistered => "USER_NOT_REGISTERED",
        ProgressTimeout => "PROGRESS_TIMEOUT",
        GatewayDown => "GATEWAY_DOWN",
    }
}

impl Default for HangupCause {
    fn default() -> Self {
        HangupCause::NormalClearing
    }
}
