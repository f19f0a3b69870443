//! Hub connection: the WebSocket loop with fixed-delay reconnection.

use crate::agent::{UploadedAsset, ViewerAgent};
use crate::commands::{HELP, ViewerCommand};
use crate::endpoints::websocket_url;
use crate::error::Result;
use crate::player::AudioOutput;
use crate::upload::UploadClient;
use futures::{Sink, SinkExt, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tandem_core::{ClientMessage, ServerMessage, ViewerConfig};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const LOG_TARGET: &str = "tandem::viewer::session";

const UPLOAD_QUEUE_CAPACITY: usize = 8;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings resolved from [`ViewerConfig`]
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub hub_url: Url,
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
}

impl SessionSettings {
    /// # Errors
    ///
    /// Returns an error if the configured hub URL is invalid.
    pub fn from_config(config: &ViewerConfig) -> Result<Self> {
        Ok(Self {
            hub_url: config.hub_url()?,
            heartbeat_interval: config.heartbeat_interval(),
            reconnect_delay: config.reconnect_delay(),
        })
    }
}

/// Why a connection ended
enum Exit {
    Shutdown,
    Lost,
}

pub struct Session<P> {
    agent: ViewerAgent<P>,
    ws_url: Url,
    uploader: UploadClient,
    heartbeat_interval: Duration,
    reconnect_delay: Duration,
    commands: mpsc::Receiver<ViewerCommand>,
    commands_open: bool,
    uploads_tx: mpsc::Sender<Result<UploadedAsset>>,
    uploads_rx: mpsc::Receiver<Result<UploadedAsset>>,
    cancel_token: CancellationToken,
}

impl<P: AudioOutput> Session<P> {
    /// # Errors
    ///
    /// Returns an error if the hub URLs cannot be derived or the HTTP client
    /// cannot be created.
    pub fn new(
        agent: ViewerAgent<P>,
        settings: &SessionSettings,
        commands: mpsc::Receiver<ViewerCommand>,
        cancel_token: CancellationToken,
    ) -> Result<Self> {
        let (uploads_tx, uploads_rx) = mpsc::channel(UPLOAD_QUEUE_CAPACITY);
        Ok(Self {
            agent,
            ws_url: websocket_url(&settings.hub_url)?,
            uploader: UploadClient::new(&settings.hub_url)?,
            heartbeat_interval: settings.heartbeat_interval,
            reconnect_delay: settings.reconnect_delay,
            commands,
            commands_open: true,
            uploads_tx,
            uploads_rx,
            cancel_token,
        })
    }

    /// Stay connected to the hub until cancelled, retrying on a fixed delay
    pub async fn run(mut self) {
        info!(target: LOG_TARGET, "Connecting to hub at {}", self.ws_url);

        loop {
            let connected = tokio::select! {
                () = self.cancel_token.cancelled() => break,
                result = tokio_tungstenite::connect_async(self.ws_url.as_str()) => result,
            };

            match connected {
                Ok((socket, _)) => {
                    info!(target: LOG_TARGET, "Connected to hub");
                    match self.drive(socket).await {
                        Ok(Exit::Shutdown) => break,
                        Ok(Exit::Lost) => warn!(target: LOG_TARGET, "Hub closed the connection"),
                        Err(e) => warn!(target: LOG_TARGET, "Connection to hub failed: {}", e),
                    }
                }
                Err(e) => {
                    warn!(target: LOG_TARGET, "Failed to connect to {}: {}", self.ws_url, e);
                }
            }

            if !self.wait_to_reconnect().await {
                break;
            }
            debug!(target: LOG_TARGET, "Reconnecting to {}", self.ws_url);
        }

        info!(target: LOG_TARGET, "Viewer session stopped");
    }

    /// Wait out the reconnect delay, dropping remote commands meanwhile.
    ///
    /// Returns `false` if cancelled.
    async fn wait_to_reconnect(&mut self) -> bool {
        let delay = tokio::time::sleep(self.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => return false,
                () = &mut delay => return true,
                command = self.commands.recv(), if self.commands_open => {
                    match command {
                        Some(command) if command.is_remote() => {
                            warn!(target: LOG_TARGET, "Not connected to the hub, dropping {:?}", command);
                        }
                        command => {
                            let _ = self.handle_command(command);
                        }
                    }
                }
                Some(result) = self.uploads_rx.recv() => {
                    match result {
                        Ok(asset) => warn!(
                            target: LOG_TARGET,
                            "Not connected to the hub, {} was stored as {} but not added",
                            asset.title,
                            asset.filename
                        ),
                        Err(e) => warn!(target: LOG_TARGET, "Upload failed: {}", e),
                    }
                }
            }
        }
    }

    async fn drive(&mut self, socket: Socket) -> Result<Exit> {
        let (mut sink, mut stream) = socket.split();
        let mut heartbeat = tokio::time::interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(Exit::Shutdown);
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.receive(text.as_str()),
                        Some(Ok(Message::Close(_))) | None => return Ok(Exit::Lost),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                }
                _ = heartbeat.tick() => {
                    let due = [self.agent.heartbeat(), self.agent.check_ended()];
                    for message in due.into_iter().flatten() {
                        send(&mut sink, &message).await?;
                    }
                }
                command = self.commands.recv(), if self.commands_open => {
                    if let Some(message) = self.handle_command(command) {
                        send(&mut sink, &message).await?;
                    }
                }
                Some(result) = self.uploads_rx.recv() => {
                    let message = match result {
                        Ok(asset) => self.agent.announce(asset),
                        Err(e) => {
                            warn!(target: LOG_TARGET, "Upload failed: {}", e);
                            None
                        }
                    };
                    if let Some(message) = message {
                        send(&mut sink, &message).await?;
                    }
                }
            }
        }
    }

    fn receive(&mut self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => self.agent.apply(message),
            Err(e) => warn!(target: LOG_TARGET, "Dropping malformed message from hub: {}", e),
        }
    }

    /// Run one console command, returning the message to send if any
    fn handle_command(&mut self, command: Option<ViewerCommand>) -> Option<ClientMessage> {
        let Some(command) = command else {
            debug!(target: LOG_TARGET, "Console closed");
            self.commands_open = false;
            return None;
        };

        match command {
            ViewerCommand::Play => self.agent.request_play(),
            ViewerCommand::Pause => self.agent.request_pause(),
            ViewerCommand::Seek(secs) => self.agent.request_seek(secs),
            ViewerCommand::Pick(index) => self.agent.request_pick(index),
            ViewerCommand::Next => self.agent.request_next(),
            ViewerCommand::Delete(index) => self.agent.request_delete(index),
            ViewerCommand::Upload(path) => {
                self.start_upload(path);
                None
            }
            ViewerCommand::List => {
                println!("{}", self.agent.playlist_listing().trim_end());
                None
            }
            ViewerCommand::Status => {
                println!("{}", self.agent.status_line());
                None
            }
            ViewerCommand::Help => {
                println!("{HELP}");
                None
            }
        }
    }

    fn start_upload(&self, path: PathBuf) {
        if !self.agent.is_controller() {
            warn!(target: LOG_TARGET, "Ignoring upload: this viewer is not the controller");
            return;
        }
        let uploader = self.uploader.clone();
        let tx = self.uploads_tx.clone();
        tokio::spawn(async move {
            let result = uploader.upload(&path).await;
            let _ = tx.send(result).await;
        });
    }
}

async fn send<S>(sink: &mut S, message: &ClientMessage) -> Result<()>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(message)?;
    debug!(target: LOG_TARGET, "Sending {}", message.kind());
    sink.send(Message::text(json)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::ClockPlayer;
    use tandem_core::Track;
    use tokio::net::TcpListener;

    type ServerSocket = WebSocketStream<TcpStream>;

    async fn fake_hub() -> (TcpListener, SessionSettings) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let settings = SessionSettings {
            hub_url: Url::parse(&format!("http://{addr}")).unwrap(),
            heartbeat_interval: Duration::from_millis(50),
            reconnect_delay: Duration::from_millis(50),
        };
        (listener, settings)
    }

    async fn accept(listener: &TcpListener) -> ServerSocket {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(2), listener.accept())
            .await
            .unwrap()
            .unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    /// Read client frames until one of the given type arrives
    async fn expect_type(socket: &mut ServerSocket, kind: &str) -> serde_json::Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let Message::Text(text) = frame {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] == kind {
                    return value;
                }
            }
        }
    }

    fn start(
        settings: &SessionSettings,
        controller: bool,
    ) -> (
        mpsc::Sender<ViewerCommand>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let agent = ViewerAgent::new(
            ClockPlayer::default(),
            settings.hub_url.clone(),
            controller,
            0.5,
        );
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let session = Session::new(agent, settings, rx, cancel.clone()).unwrap();
        (tx, cancel, tokio::spawn(session.run()))
    }

    async fn stop(cancel: &CancellationToken, task: tokio::task::JoinHandle<()>) {
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_controller_command_reaches_hub() {
        let (listener, settings) = fake_hub().await;
        let (commands, cancel, task) = start(&settings, true);

        let mut hub = accept(&listener).await;
        let state = ServerMessage::SyncPlaylist {
            songs: vec![Track::new("1700-a.mp3", "a.mp3")],
            current_index: 0,
            is_playing: true,
            current_time: 0.0,
        };
        hub.send(Message::text(serde_json::to_string(&state).unwrap()))
            .await
            .unwrap();

        // A playing controller reports its position
        let heartbeat = expect_type(&mut hub, "updateTime").await;
        assert!(heartbeat["time"].as_f64().unwrap() >= 0.0);

        commands.send(ViewerCommand::Pause).await.unwrap();
        expect_type(&mut hub, "pause").await;

        // Heartbeats keep coming until the hub echoes the pause
        commands.send(ViewerCommand::Seek(30.0)).await.unwrap();
        loop {
            let update = expect_type(&mut hub, "updateTime").await;
            if update["time"].as_f64().unwrap() >= 30.0 {
                break;
            }
        }

        stop(&cancel, task).await;
    }

    #[tokio::test]
    async fn test_reconnects_after_connection_loss() {
        let (listener, settings) = fake_hub().await;
        let (_commands, cancel, task) = start(&settings, false);

        let first = accept(&listener).await;
        drop(first);

        let mut second = accept(&listener).await;
        second
            .send(Message::text(
                serde_json::to_string(&ServerMessage::Play).unwrap(),
            ))
            .await
            .unwrap();

        stop(&cancel, task).await;
    }

    #[tokio::test]
    async fn test_reconnect_delay_is_fixed() {
        let (listener, mut settings) = fake_hub().await;
        settings.reconnect_delay = Duration::from_millis(100);
        let (_commands, cancel, task) = start(&settings, false);

        // Refuse the handshake every time and time the attempts
        let mut attempts = Vec::new();
        for _ in 0..5 {
            let (stream, _) = tokio::time::timeout(Duration::from_secs(2), listener.accept())
                .await
                .unwrap()
                .unwrap();
            attempts.push(std::time::Instant::now());
            drop(stream);
        }

        for pair in attempts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(90), "retried after {gap:?}");
            assert!(gap < Duration::from_millis(300), "delay grew to {gap:?}");
        }

        stop(&cancel, task).await;
    }

    #[tokio::test]
    async fn test_session_stops_while_hub_is_unreachable() {
        let (listener, settings) = fake_hub().await;
        drop(listener);
        let (commands, cancel, task) = start(&settings, true);

        commands.send(ViewerCommand::Play).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        stop(&cancel, task).await;
    }
}
