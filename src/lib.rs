//! FreeSWITCH Event Socket (ESL) protocol engine for Rust
//!
//! This crate speaks the client side of FreeSWITCH's Event Socket protocol on tokio:
//! it decodes frames off the wire, matches command replies to the commands that caused
//! them, fans events out to listeners and drives the connection handshake.
//!
//! # Architecture
//!
//! - [`FrameDecoder`] turns bytes into [`EslMessage`] frames, resumable across reads.
//! - [`EslSession`] (Clone + Send) owns one connection: any task may send commands,
//!   replies are matched in send order by a FIFO of pending slots, and a background
//!   reader task routes every frame.
//! - Events go to [`EventListener`]s on two lanes, `BACKGROUND_JOB` and everything
//!   else, each drained by its own thread so a slow listener never stalls decoding.
//! - [`EslClient`] dials the switch (inbound mode); [`EslServer`] accepts the
//!   connections the `socket` dialplan application makes (outbound mode).
//!
//! # Examples
//!
//! ## Inbound Connection
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use freeswitch_esl_engine::{EslClient, EslError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EslError> {
//!     let client = EslClient::new();
//!     client.connect("localhost", 8021, "ClueCon", Duration::from_secs(5)).await?;
//!
//!     let response = client.api("status").await?;
//!     println!("Status: {}", response.body());
//!
//!     client.close().await
//! }
//! ```
//!
//! ## Listening for Events
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use freeswitch_esl_engine::{
//!     EslClient, EslEvent, EslEventType, EventFormat, EventListener, ListenerResult,
//! };
//!
//! struct Printer;
//!
//! impl EventListener for Printer {
//!     fn on_event(&self, event: &EslEvent) -> ListenerResult {
//!         println!("{} on {:?}", event.event_name(), event.channel_name());
//!         Ok(())
//!     }
//!
//!     fn on_background_job(&self, event: &EslEvent) -> ListenerResult {
//!         println!("job {} finished: {:?}", event.job_uuid()?, event.body());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EslClient::new();
//!     client.add_listener(Arc::new(Printer));
//!     client.connect("localhost", 8021, "ClueCon", Duration::from_secs(5)).await?;
//!     client.event(EventFormat::Plain, &[
//!         EslEventType::ChannelAnswer,
//!         EslEventType::ChannelHangup,
//!         EslEventType::BackgroundJob,
//!     ]).await?;
//!     let job = client.bg_api("status").await?;
//!     println!("started job {}", job);
//!     Ok(())
//! }
//! ```
//!
//! ## Outbound Mode
//!
//! FreeSWITCH connects to *your* application via the `socket` dialplan application:
//!
//! ```xml
//! <action application="socket" data="127.0.0.1:8040 async full"/>
//! ```
//!
//! ```rust,no_run
//! use freeswitch_esl_engine::{AppCommand, EslError, EslServer, EventFormat, Playback};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EslError> {
//!     let server = EslServer::bind("0.0.0.0:8040").await?;
//!     let session = server.accept().await?;
//!     if let Some(data) = session.channel_data() {
//!         println!("call from {:?}", data.caller_id_number());
//!     }
//!
//!     session.myevents(EventFormat::Plain).await?;
//!     session.linger(None).await?;
//!     session.execute(AppCommand::Answer).await?;
//!     session.execute(AppCommand::from(Playback::new("ivr/ivr-welcome.wav"))).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Command Builders
//!
//! ```rust
//! use freeswitch_esl_engine::{ApiCommand, Originate, OriginateTarget};
//!
//! let cmd = Originate::new("sofia/gateway/my_provider/18005551234", OriginateTarget::application("park"));
//! assert_eq!(
//!     cmd.to_api_string(),
//!     "originate {ignore_early_media=true}sofia/gateway/my_provider/18005551234 &park()"
//! );
//! ```

#[macro_use]
mod macros;

pub mod app;
pub mod channel;
pub mod client;
pub mod command;
pub mod commands;
pub mod connection;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod headers;
pub mod message;
pub mod protocol;
pub mod server;

pub(crate) mod buffer;
pub(crate) mod correlation;

pub use app::{
    AppCommand, PlayAndGetDigits, Playback, Record, Say, SayGender, SayMethod, SayType, Speak,
};
pub use channel::{AnswerState, CallDirection, CallState, ChannelState, HangupCause};
pub use client::EslClient;
pub use command::{CommandId, EslCommand, EslResponse, LogLevel, ReplyStatus, SendMsg};
pub use commands::{
    ApiCommand, ChannelVariables, Originate, OriginateTarget, SchedApi, SchedTime, UuidGetVar,
    UuidSetVar,
};
pub use connection::{
    ConnectionMode, DisconnectReason, EslConnectOptions, EslSession, SessionState,
};
pub use constants::DEFAULT_ESL_PORT;
pub use dispatch::{EventDispatcher, EventListener, ListenerResult, Listeners};
pub use error::{EslError, EslResult};
pub use event::{EslEvent, EslEventType, EventFormat};
pub use headers::EventHeader;
pub use message::EslMessage;
pub use protocol::{FrameDecoder, MessageType};
pub use server::EslServer;
