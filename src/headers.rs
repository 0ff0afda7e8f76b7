//! Typed names for the headers carried inside events.

define_parse_error! {
    /// Error returned when parsing an unrecognized event header name.
    pub struct ParseEventHeaderError => "event header"
}

define_header_enum! {
    error_type: ParseEventHeaderError,
    /// Header names found on decoded events (not framing headers like `Content-Type`).
    ///
    /// Accepted anywhere a header name is, e.g. [`EslEvent::header`](crate::EslEvent::header).
    pub enum EventHeader {
        EventName => "Event-Name",
        EventSubclass => "Event-Subclass",
        CoreUuid => "Core-UUID",
        EventDateLocal => "Event-Date-Local",
        EventDateGmt => "Event-Date-GMT",
        EventDateTimestamp => "Event-Date-Timestamp",
        UniqueId => "Unique-ID",
        CallerUniqueId => "Caller-Unique-ID",
        OtherLegUniqueId => "Other-Leg-Unique-ID",
        JobUuid => "Job-UUID",
        JobCommand => "Job-Command",
        JobCommandArg => "Job-Command-Arg",
        ChannelName => "Channel-Name",
        ChannelState => "Channel-State",
        ChannelStateNumber => "Channel-State-Number",
        ChannelCallState => "Channel-Call-State",
        ChannelDestinationNumber => "Channel-Destination-Number",
        AnswerState => "Answer-State",
        CallDirection => "Call-Direction",
        HangupCause => "Hangup-Cause",
        CallerCallerIdName => "Caller-Caller-ID-Name",
        CallerCallerIdNumber => "Caller-Caller-ID-Number",
        CallerDestinationNumber => "Caller-Destination-Number",
        CallerContext => "Caller-Context",
        CallerNetworkAddr => "Caller-Network-Addr",
        DtmfDigit => "DTMF-Digit",
        DtmfDuration => "DTMF-Duration",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(EventHeader::UniqueId.to_string(), "Unique-ID");
        assert_eq!(EventHeader::EventDateGmt.as_str(), "Event-Date-GMT");
        let h: &str = EventHeader::DtmfDigit.as_ref();
        assert_eq!(h, "DTMF-Digit");
    }

    #[test]
    fn parse_ignores_case() {
        assert_eq!(
            "job-uuid".parse::<EventHeader>(),
            Ok(EventHeader::JobUuid)
        );
        assert_eq!(
            "CHANNEL-CALL-STATE".parse::<EventHeader>(),
            Ok(EventHeader::ChannelCallState)
        );
    }

    #[test]
    fn unknown_name_is_reported() {
        let err = "X-Custom"
            .parse::<EventHeader>()
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown event header: X-Custom");
    }

    #[test]
    fn every_variant_round_trips() {
        for header in EventHeader::ALL {
            let parsed: EventHeader = header
                .as_str()
                .parse()
                .unwrap();
            assert_eq!(parsed, *header);
        }
    }
}
