#![allow(dead_code)]

use async_trait::async_trait;
use decart_rt_rs::protocol::codec;
use decart_rt_rs::sdk::{BoxFuture, RealtimeBuilder, SignalingConnector, SignalingLink};
use decart_rt_rs::{
    CodecCapability, Error, IceCandidate, MediaKind, MediaStream, MediaTrack, MediaTransport, MediaTransportFactory,
    Realtime, Result, SenderParameters, SessionDescription, SignalingChannel, SignalingMessage, TransportConfig,
    TransportEvents,
};
use decart_rt_rs::media::SdpType;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::{Message, Role};
use url::Url;

pub type ServerSocket = WebSocketStream<DuplexStream>;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
pub struct EngineLog {
    pub calls: Vec<String>,
    pub created: usize,
    pub closed: usize,
    pub codec_preferences: Vec<Vec<String>>,
    pub sender_parameters: Vec<SenderParameters>,
    pub remote_candidates: Vec<IceCandidate>,
}

/// How the mock engine behaves off the happy path.
#[derive(Debug, Clone)]
pub struct EngineScript {
    pub codecs: Vec<CodecCapability>,
    /// Every `create_offer` fails with this message.
    pub fail_offer: Option<&'static str>,
    /// `set_remote_description` fails for descriptions carrying this SDP.
    pub reject_remote_sdp: Option<&'static str>,
    /// Candidates the engine gathers while applying the local offer.
    pub gathered_on_offer: Vec<IceCandidate>,
}

impl Default for EngineScript {
    fn default() -> Self {
        Self {
            codecs: default_codecs(),
            fail_offer: None,
            reject_remote_sdp: None,
            gathered_on_offer: Vec::new(),
        }
    }
}

struct MockTransport {
    log: Arc<Mutex<EngineLog>>,
    script: EngineScript,
    events: TransportEvents,
}

const fn sdp_kind(description: &SessionDescription) -> &'static str {
    match description.sdp_type {
        SdpType::Offer => "offer",
        SdpType::Answer => "answer",
    }
}

impl MockTransport {
    fn record(&self, call: impl Into<String>) {
        self.log.lock().unwrap().calls.push(call.into());
    }
}

#[async_trait]
impl MediaTransport for MockTransport {
    fn add_local_track(&mut self, track: &MediaTrack, stream_id: &str) -> Result<()> {
        self.record(format!("add_track:{stream_id}:{}", track.id));
        Ok(())
    }

    async fn create_offer(&mut self) -> Result<SessionDescription> {
        self.record("create_offer");
        if let Some(reason) = self.script.fail_offer {
            return Err(Error::Transport(reason.to_string()));
        }
        Ok(SessionDescription::offer("mock-offer"))
    }

    async fn create_answer(&mut self) -> Result<SessionDescription> {
        self.record("create_answer");
        Ok(SessionDescription::answer("mock-answer"))
    }

    async fn set_local_description(&mut self, description: SessionDescription) -> Result<()> {
        self.record(format!("set_local:{}", sdp_kind(&description)));
        if description.sdp_type == SdpType::Offer {
            // Real engines start gathering as soon as the local description is set.
            for candidate in &self.script.gathered_on_offer {
                self.events.local_ice_candidate(candidate.clone());
            }
        }
        Ok(())
    }

    async fn set_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        self.record(format!("set_remote:{}:{}", sdp_kind(&description), description.sdp));
        if self.script.reject_remote_sdp == Some(description.sdp.as_str()) {
            return Err(Error::Transport("setRemoteDescription failed".to_string()));
        }
        Ok(())
    }

    async fn add_remote_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        self.record("add_remote_ice_candidate");
        self.log.lock().unwrap().remote_candidates.push(candidate);
        Ok(())
    }

    fn sender_codecs(&self, _kind: MediaKind) -> Vec<CodecCapability> {
        self.script.codecs.clone()
    }

    fn set_codec_preferences(&mut self, _kind: MediaKind, codecs: Vec<CodecCapability>) -> Result<()> {
        self.record("set_codec_preferences");
        let names = codecs.into_iter().map(|codec| codec.name).collect();
        self.log.lock().unwrap().codec_preferences.push(names);
        Ok(())
    }

    fn set_sender_parameters(&mut self, parameters: SenderParameters) -> Result<()> {
        self.record("set_sender_parameters");
        self.log.lock().unwrap().sender_parameters.push(parameters);
        Ok(())
    }

    async fn close(&mut self) {
        self.record("close");
        self.log.lock().unwrap().closed += 1;
    }
}

struct MockFactory {
    log: Arc<Mutex<EngineLog>>,
    script: EngineScript,
    transports: mpsc::UnboundedSender<TransportEvents>,
}

impl MediaTransportFactory for MockFactory {
    fn create(&self, _config: &TransportConfig, events: TransportEvents) -> Result<Box<dyn MediaTransport>> {
        self.log.lock().unwrap().created += 1;
        let _ = self.transports.send(events.clone());
        Ok(Box::new(MockTransport {
            log: Arc::clone(&self.log),
            script: self.script.clone(),
            events,
        }))
    }
}

/// Connector that hands the server end of an in-memory socket to the test.
struct MockConnector {
    opened: Arc<AtomicUsize>,
    servers: mpsc::UnboundedSender<ServerSocket>,
}

impl SignalingConnector for MockConnector {
    fn open<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<SignalingLink>> {
        Box::pin(async move {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let (client, server) = tokio::io::duplex(64 * 1024);
            let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
            let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
            let _ = self.servers.send(server);
            Ok(SignalingChannel::from_socket(client))
        })
    }
}

pub struct Harness {
    pub log: Arc<Mutex<EngineLog>>,
    pub opened: Arc<AtomicUsize>,
    factory: Arc<MockFactory>,
    connector: Arc<MockConnector>,
    servers: mpsc::UnboundedReceiver<ServerSocket>,
    transports: mpsc::UnboundedReceiver<TransportEvents>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(default_codecs(), None)
    }

    /// Every peer connection fails to create its offer with `reason`.
    pub fn failing_offers(reason: &'static str) -> Self {
        Self::with_engine(default_codecs(), Some(reason))
    }

    pub fn with_engine(codecs: Vec<CodecCapability>, fail_offer: Option<&'static str>) -> Self {
        Self::scripted(EngineScript {
            codecs,
            fail_offer,
            ..EngineScript::default()
        })
    }

    pub fn scripted(script: EngineScript) -> Self {
        let log = Arc::new(Mutex::new(EngineLog::default()));
        let opened = Arc::new(AtomicUsize::new(0));
        let (transports_tx, transports) = mpsc::unbounded_channel();
        let (servers_tx, servers) = mpsc::unbounded_channel();

        Self {
            factory: Arc::new(MockFactory {
                log: Arc::clone(&log),
                script,
                transports: transports_tx,
            }),
            connector: Arc::new(MockConnector {
                opened: Arc::clone(&opened),
                servers: servers_tx,
            }),
            log,
            opened,
            servers,
            transports,
        }
    }

    pub fn builder(&self) -> RealtimeBuilder {
        Realtime::builder()
            .api_key("sk-test")
            .media_transport(self.factory.clone())
            .signaling_connector(self.connector.clone())
    }

    pub async fn next_server(&mut self) -> ServerSocket {
        tokio::time::timeout(WAIT, self.servers.recv())
            .await
            .expect("no signaling socket opened")
            .expect("connector dropped")
    }

    pub async fn next_transport(&mut self) -> TransportEvents {
        tokio::time::timeout(WAIT, self.transports.recv())
            .await
            .expect("no peer connection created")
            .expect("factory dropped")
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    /// Wait until the engine has seen `call`. Inbound signaling and engine callbacks
    /// travel on separate channels, so tests sync on the engine log.
    pub async fn wait_for_call(&self, call: &str) {
        self.wait_for(|log| log.calls.iter().any(|seen| seen == call))
            .await
            .unwrap_or_else(|()| panic!("engine never saw {call}, calls: {:?}", self.calls()));
    }

    /// Poll the engine log until `done` holds. `Err` on timeout.
    pub async fn wait_for(&self, done: impl Fn(&EngineLog) -> bool) -> std::result::Result<(), ()> {
        tokio::time::timeout(WAIT, async {
            while !done(&*self.log.lock().unwrap()) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .map_err(|_| ())
    }
}

pub fn default_codecs() -> Vec<CodecCapability> {
    ["H264", "rtx", "VP8", "red"]
        .into_iter()
        .map(|name| CodecCapability::new(name, 90_000))
        .collect()
}

pub fn local_media() -> MediaStream {
    MediaStream::new("local", vec![MediaTrack::video("camera"), MediaTrack::audio("mic")])
}

/// Next signaling message written by the client, skipping control frames.
pub async fn next_message(server: &mut ServerSocket) -> SignalingMessage {
    loop {
        let frame = tokio::time::timeout(WAIT, server.next())
            .await
            .expect("no frame from client")
            .expect("socket ended")
            .expect("socket error");
        match frame {
            Message::Text(text) => return codec::decode(text.as_bytes()).expect("undecodable frame"),
            Message::Close(frame) => panic!("client closed the socket: {frame:?}"),
            _ => {}
        }
    }
}

/// Wait until the client closes the socket, returning whether a close frame arrived.
pub async fn closed_by_client(server: &mut ServerSocket) -> bool {
    loop {
        match tokio::time::timeout(WAIT, server.next()).await.expect("socket stayed open") {
            Some(Ok(Message::Close(_))) => return true,
            Some(Ok(_)) => {}
            Some(Err(_)) | None => return false,
        }
    }
}

pub async fn send_message(server: &mut ServerSocket, message: &SignalingMessage) {
    let json = codec::encode(message).unwrap();
    server.send(Message::Text(json.into())).await.unwrap();
}
