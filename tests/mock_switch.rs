//! End-to-end tests against a scripted switch over loopback TCP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use freeswitch_esl_engine::{
    AppCommand, DisconnectReason, EslClient, EslConnectOptions, EslError, EslEvent, EslEventType,
    EslServer, EventFormat, EventListener, ListenerResult, PlayAndGetDigits, SessionState,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const JOB: &str = "c2a45d3e-8f0b-4b7e-9d61-2f3c1b0a9e87";
const CALL: &str = "5d0f9f1a-6b3e-4c2d-8e7f-9a0b1c2d3e4f";

struct Switch {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl Switch {
    async fn send(&mut self, frame: &str) {
        self.stream
            .write_all(frame.as_bytes())
            .await
            .unwrap();
    }

    async fn command(&mut self) -> String {
        loop {
            if let Some(pos) = self
                .pending
                .windows(2)
                .position(|w| w == b"\n\n")
            {
                let raw: Vec<u8> = self
                    .pending
                    .drain(..pos + 2)
                    .collect();
                return String::from_utf8(raw)
                    .unwrap()
                    .trim_end()
                    .to_string();
            }
            let mut chunk = [0u8; 4096];
            let n = self
                .stream
                .read(&mut chunk)
                .await
                .unwrap();
            assert!(n > 0, "peer closed");
            self.pending
                .extend_from_slice(&chunk[..n]);
        }
    }

    /// Send a frame split into tiny writes to exercise resumable decoding.
    async fn send_trickled(&mut self, frame: &str) {
        for chunk in frame
            .as_bytes()
            .chunks(5)
        {
            self.stream
                .write_all(chunk)
                .await
                .unwrap();
            self.stream
                .flush()
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

fn reply(text: &str) -> String {
    format!("Content-Type: command/reply\nReply-Text: {}\n\n", text)
}

fn event(headers: &[(&str, &str)], body: Option<&str>) -> String {
    let mut inner: String = headers
        .iter()
        .map(|(n, v)| format!("{}: {}\n", n, v))
        .collect();
    match body {
        Some(body) => inner.push_str(&format!("Content-Length: {}\n\n{}", body.len(), body)),
        None => inner.push('\n'),
    }
    format!(
        "Content-Length: {}\nContent-Type: text/event-plain\n\n{}",
        inner.len(),
        inner
    )
}

#[derive(Default)]
struct Log {
    entries: Mutex<Vec<String>>,
}

struct Recorder {
    log: Arc<Log>,
    notify: mpsc::UnboundedSender<()>,
}

impl Recorder {
    fn push(&self, entry: String) {
        self.log
            .entries
            .lock()
            .unwrap()
            .push(entry);
        let _ = self
            .notify
            .send(());
    }
}

impl EventListener for Recorder {
    fn on_event(&self, event: &EslEvent) -> ListenerResult {
        self.push(format!(
            "{} {}",
            event.event_name(),
            event
                .unique_id()
                .map(|u| u.to_string())
                .unwrap_or_default()
        ));
        Ok(())
    }

    fn on_background_job(&self, event: &EslEvent) -> ListenerResult {
        self.push(format!("job {} {}", event.job_uuid()?, event.body().unwrap_or_default()));
        Ok(())
    }

    fn on_disconnect(&self, reason: &DisconnectReason) {
        self.push(format!("disconnect {}", reason));
    }
}

fn recorder() -> (Arc<Recorder>, Arc<Log>, mpsc::UnboundedReceiver<()>) {
    let log = Arc::new(Log::default());
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(Recorder {
            log: log.clone(),
            notify: tx,
        }),
        log,
        rx,
    )
}

async fn wait_for(rx: &mut mpsc::UnboundedReceiver<()>, log: &Log, count: usize) -> Vec<String> {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            if log
                .entries
                .lock()
                .unwrap()
                .len()
                >= count
            {
                break;
            }
            rx.recv()
                .await
                .unwrap();
        }
    })
    .await
    .expect("listener deliveries");
    log.entries
        .lock()
        .unwrap()
        .clone()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inbound_session_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener
        .local_addr()
        .unwrap()
        .port();

    let switch = tokio::spawn(async move {
        let (stream, _) = listener
            .accept()
            .await
            .unwrap();
        let mut switch = Switch {
            stream,
            pending: Vec::new(),
        };
        switch
            .send("Content-Type: auth/request\n\n")
            .await;
        assert_eq!(switch.command().await, "auth ClueCon");
        switch
            .send(&reply("+OK accepted"))
            .await;

        assert_eq!(
            switch.command().await,
            "event plain CHANNEL_CREATE CHANNEL_HANGUP BACKGROUND_JOB"
        );
        switch
            .send(&reply("+OK event listener enabled plain"))
            .await;

        assert_eq!(switch.command().await, "bgapi status");
        switch
            .send(&format!(
                "Content-Type: command/reply\nReply-Text: +OK Job-UUID: {0}\nJob-UUID: {0}\n\n",
                JOB
            ))
            .await;

        switch
            .send_trickled(&event(
                &[("Event-Name", "CHANNEL_CREATE"), ("Unique-ID", CALL)],
                None,
            ))
            .await;
        switch
            .send(&event(
                &[
                    ("Event-Name", "BACKGROUND_JOB"),
                    ("Job-UUID", JOB),
                    ("Job-Command", "status"),
                ],
                Some("UP 0 years\n"),
            ))
            .await;
        switch
            .send(&event(
                &[
                    ("Event-Name", "CHANNEL_HANGUP"),
                    ("Unique-ID", CALL),
                    ("Hangup-Cause", "NORMAL_CLEARING"),
                ],
                None,
            ))
            .await;

        assert_eq!(switch.command().await, "exit");
        switch
            .send(&reply("+OK bye"))
            .await;
        switch
            .send("Content-Type: text/disconnect-notice\nContent-Length: 22\n\nDisconnected, goodbye.")
            .await;
    });

    let (listener_impl, log, mut notified) = recorder();
    let client = EslClient::new();
    client.add_listener(listener_impl);
    client
        .connect("127.0.0.1", port, "ClueCon", Duration::from_secs(2))
        .await
        .unwrap();
    assert!(client.can_send());

    client
        .event(
            EventFormat::Plain,
            &[
                EslEventType::ChannelCreate,
                EslEventType::ChannelHangup,
                EslEventType::BackgroundJob,
            ],
        )
        .await
        .unwrap();
    let job = client
        .bg_api("status")
        .await
        .unwrap();
    assert_eq!(job.to_string(), JOB);

    let entries = wait_for(&mut notified, &log, 3).await;
    let channel: Vec<_> = entries
        .iter()
        .filter(|e| !e.starts_with("job"))
        .cloned()
        .collect();
    assert_eq!(
        channel,
        vec![
            format!("CHANNEL_CREATE {}", CALL),
            format!("CHANNEL_HANGUP {}", CALL)
        ]
    );
    assert!(entries.contains(&format!("job {} UP 0 years", JOB)));

    client
        .close()
        .await
        .unwrap();
    let entries = wait_for(&mut notified, &log, 4).await;
    assert_eq!(
        entries.last(),
        Some(&"disconnect client requested disconnect".to_string())
    );
    assert_eq!(
        client.state(),
        SessionState::Closed(DisconnectReason::ClientRequested)
    );
    assert!(matches!(
        client
            .api("status")
            .await,
        Err(EslError::ConnectionClosed)
    ));
    switch
        .await
        .unwrap();
}

#[tokio::test]
async fn outbound_session_end_to_end() {
    let server = EslServer::bind_with_options(
        "127.0.0.1:0",
        EslConnectOptions {
            handshake_timeout: Duration::from_secs(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let addr = server
        .local_addr()
        .unwrap();
    let (listener_impl, log, mut notified) = recorder();
    server.add_listener(listener_impl);

    let switch = tokio::spawn(async move {
        let stream = TcpStream::connect(addr)
            .await
            .unwrap();
        let mut switch = Switch {
            stream,
            pending: Vec::new(),
        };
        assert_eq!(switch.command().await, "connect");
        switch
            .send(&format!(
                "Content-Type: command/reply\nReply-Text: +OK\nEvent-Name: CHANNEL_DATA\nUnique-ID: {}\nCaller-Caller-ID-Number: 1000\nCaller-Destination-Number: 5000\n\n",
                CALL
            ))
            .await;

        assert_eq!(switch.command().await, "myevents plain");
        switch
            .send(&reply("+OK Events Enabled"))
            .await;
        assert_eq!(switch.command().await, "linger");
        switch
            .send(&reply("+OK will linger"))
            .await;

        let pagd = switch
            .command()
            .await;
        assert!(pagd.contains("execute-app-name: play_and_get_digits"));
        assert!(pagd.contains(
            "execute-app-arg: 1 4 3 5000 '#' 'ivr/enter-pin.wav' silence_stream://150 pin \\d+ 2000"
        ));
        switch
            .send(&reply("+OK"))
            .await;

        assert_eq!(switch.command().await, "getvar pin");
        switch
            .send(&reply("1234"))
            .await;

        switch
            .send("Content-Type: text/disconnect-notice\nContent-Disposition: linger\nContent-Length: 0\n\n")
            .await;
        switch
            .send(&event(
                &[("Event-Name", "CHANNEL_HANGUP_COMPLETE"), ("Unique-ID", CALL)],
                None,
            ))
            .await;
        // hang up the socket once the lingering events are out
    });

    let session = server
        .accept()
        .await
        .unwrap();
    assert_eq!(
        session
            .channel_data()
            .and_then(|d| d.destination_number()),
        Some("5000")
    );
    session
        .myevents(EventFormat::Plain)
        .await
        .unwrap();
    session
        .linger(None)
        .await
        .unwrap();
    let pin = PlayAndGetDigits::new("ivr/enter-pin.wav", "pin")
        .digits(1, 4)
        .unwrap()
        .tries(3);
    session
        .execute(AppCommand::from(pin))
        .await
        .unwrap();
    assert_eq!(
        session
            .getvar("pin")
            .await
            .unwrap(),
        "1234"
    );

    switch
        .await
        .unwrap();
    assert_eq!(
        session
            .wait_closed()
            .await,
        DisconnectReason::ConnectionClosed
    );
    let entries = wait_for(&mut notified, &log, 2).await;
    assert_eq!(
        entries,
        vec![
            format!("CHANNEL_HANGUP_COMPLETE {}", CALL),
            "disconnect connection closed".to_string()
        ]
    );
}
