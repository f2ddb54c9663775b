#[cfg(test)]
mod session_test;

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use srtp::{Context, ContextConfig, SrtpEvent};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use turn::client::{Client as TurnClient, ClientConfig as TurnClientConfig, InboundOutcome};
use util::Conn;

use crate::dtls_transport::{DtlsConfig, DtlsTransport};
use crate::error::{Error, Result};
use crate::mux::endpoint::Endpoint;
use crate::mux::{classify, OutboundPath, PacketKind, Transport, RECEIVE_MTU};

pub type OnPacketHdlrFn =
    Box<dyn (FnMut(Bytes) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>>) + Send + Sync>;

/// TURN server to allocate a relay on.
pub struct IceServerConfig {
    /// "host:port" of the TURN server.
    pub server_addr: String,
    pub username: String,
    pub password: String,
    /// Initial realm guess; the server's challenge wins.
    pub realm: String,
}

/// How the SRTP master keys come to exist.
pub enum Keying {
    /// DTLS-SRTP handshake over the media path (RFC 5764).
    Dtls(DtlsConfig),
    /// Keys provisioned by the signalling layer (SDES-style). The full
    /// profile set is available on this path.
    Preshared(srtp::Config),
}

pub struct SessionConfig {
    /// Local bind address, e.g. "0.0.0.0:0".
    pub local_addr: SocketAddr,
    /// Remote media endpoint from signalling.
    pub peer: SocketAddr,
    /// TURN relay; direct socket when absent.
    pub ice_server: Option<IceServerConfig>,
    pub keying: Keying,
    /// Budget for relay discovery.
    pub allocate_timeout: Duration,
    /// SOFTWARE attribute value in TURN traffic.
    pub software: String,
}

impl SessionConfig {
    pub fn new(local_addr: SocketAddr, peer: SocketAddr, keying: Keying) -> Self {
        SessionConfig {
            local_addr,
            peer,
            ice_server: None,
            keying,
            allocate_timeout: Duration::from_secs(8),
            software: "sipmedia".to_owned(),
        }
    }
}

/// Per-session drop counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStats {
    pub rtp_received: u64,
    pub rtcp_received: u64,
    pub rtp_dropped: u64,
    pub rtcp_dropped: u64,
    pub discarded: u64,
}

/// The four one-way contexts of a session.
struct SrtpPair {
    encode_rtp: Context,
    decode_rtp: Context,
    encode_rtcp: Context,
    decode_rtcp: Context,
}

/// Everything needed to drive a fresh handshake when the master key wears
/// out.
struct RekeyTemplate {
    config_factory: Box<dyn Fn() -> DtlsConfig + Send + Sync>,
}

/// MediaSession owns one UDP socket and binds the demultiplexer, the TURN
/// client, the DTLS transport and the four SRTP contexts into one media
/// path. All protocol state is mutated on the session I/O task.
pub struct MediaSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    transport: Arc<Transport>,
    dtls_endpoint: Arc<Endpoint>,
    turn_client: Option<Arc<TurnClient>>,
    dtls: Mutex<Option<DtlsTransport>>,
    rekey: Mutex<Option<RekeyTemplate>>,
    contexts: Mutex<Option<SrtpPair>>,
    events_tx: mpsc::Sender<SrtpEvent>,
    on_rtp: Mutex<Option<OnPacketHdlrFn>>,
    on_rtcp: Mutex<Option<OnPacketHdlrFn>>,
    cancel: CancellationToken,
    rtp_received: AtomicU64,
    rtcp_received: AtomicU64,
    rtp_dropped: AtomicU64,
    rtcp_dropped: AtomicU64,
    discarded: AtomicU64,
}

fn build_contexts(
    srtp_config: &srtp::Config,
    events: &mpsc::Sender<SrtpEvent>,
) -> Result<SrtpPair> {
    let with_events = |options: &ContextConfig| {
        let mut options = options.clone();
        options.events = Some(events.clone());
        options
    };

    let keys = &srtp_config.keys;
    let profile = srtp_config.profile;
    Ok(SrtpPair {
        encode_rtp: Context::with_config(
            &keys.local_master_key,
            &keys.local_master_salt,
            profile,
            with_events(&srtp_config.local_options),
        )?,
        encode_rtcp: Context::with_config(
            &keys.local_master_key,
            &keys.local_master_salt,
            profile,
            with_events(&srtp_config.local_options),
        )?,
        decode_rtp: Context::with_config(
            &keys.remote_master_key,
            &keys.remote_master_salt,
            profile,
            with_events(&srtp_config.remote_options),
        )?,
        decode_rtcp: Context::with_config(
            &keys.remote_master_key,
            &keys.remote_master_salt,
            profile,
            with_events(&srtp_config.remote_options),
        )?,
    })
}

impl MediaSession {
    /// Brings the media path up: relay discovery and peer permission (when
    /// a TURN server is configured), key establishment (DTLS handshake or
    /// pre-shared), then SRTP context instantiation. The demultiplexer
    /// starts first so handshake traffic can flow.
    pub async fn start(config: SessionConfig) -> Result<MediaSession> {
        let socket = UdpSocket::bind(config.local_addr).await?;
        let conn: Arc<dyn Conn + Send + Sync> = Arc::new(socket);

        let turn_client = match &config.ice_server {
            Some(ice) => Some(Arc::new(
                TurnClient::new(TurnClientConfig {
                    server_addr: ice.server_addr.clone(),
                    username: ice.username.clone(),
                    password: ice.password.clone(),
                    realm: ice.realm.clone(),
                    software: config.software.clone(),
                    conn: Arc::clone(&conn),
                })
                .await?,
            )),
            None => None,
        };

        let transport = Arc::new(Transport::new(
            Arc::clone(&conn),
            OutboundPath::Direct { peer: config.peer },
        ));
        let dtls_endpoint = Arc::new(Endpoint::new(Arc::clone(&transport)));
        let (events_tx, events_rx) = mpsc::channel(4);

        let inner = Arc::new(SessionInner {
            transport,
            dtls_endpoint,
            turn_client,
            dtls: Mutex::new(None),
            rekey: Mutex::new(None),
            contexts: Mutex::new(None),
            events_tx,
            on_rtp: Mutex::new(None),
            on_rtcp: Mutex::new(None),
            cancel: CancellationToken::new(),
            rtp_received: AtomicU64::new(0),
            rtcp_received: AtomicU64::new(0),
            rtp_dropped: AtomicU64::new(0),
            rtcp_dropped: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        });

        // The I/O task must run before anything can await a response.
        tokio::spawn(SessionInner::run(Arc::clone(&inner), events_rx));

        if let Some(client) = &inner.turn_client {
            let relay = client
                .get_relay_endpoint(config.allocate_timeout, &inner.cancel)
                .await
                .ok_or(Error::ErrTurnAllocateFailed)?;
            log::info!("media relayed via {relay}");

            client
                .create_permission(config.peer)
                .await
                .map_err(|err| {
                    log::warn!("create permission failed: {err}");
                    Error::ErrTurnPermissionFailed
                })?;

            inner.transport.set_path(OutboundPath::Relay {
                client: Arc::clone(client),
                peer: config.peer,
            });
        }

        match config.keying {
            Keying::Preshared(srtp_config) => {
                let pair = build_contexts(&srtp_config, &inner.events_tx)?;
                *inner.contexts.lock().await = Some(pair);
                log::info!("srtp keyed out of band, profile {}", srtp_config.profile);
            }
            Keying::Dtls(dtls_config) => {
                inner.start_dtls(dtls_config).await?;
            }
        }

        Ok(MediaSession { inner })
    }

    /// Protects and sends one RTP packet.
    pub async fn send_rtp(&self, packet: &[u8]) -> Result<()> {
        let protected = {
            let mut guard = self.inner.contexts.lock().await;
            let pair = guard.as_mut().ok_or(Error::ErrSessionNotStarted)?;
            pair.encode_rtp.encrypt_rtp(packet)?
        };
        self.inner.transport.write(&protected).await
    }

    /// Protects and sends one RTCP compound packet.
    pub async fn send_rtcp(&self, packet: &[u8]) -> Result<()> {
        let protected = {
            let mut guard = self.inner.contexts.lock().await;
            let pair = guard.as_mut().ok_or(Error::ErrSessionNotStarted)?;
            pair.encode_rtcp.encrypt_rtcp(packet)?
        };
        self.inner.transport.write(&protected).await
    }

    /// Delivers unprotected inbound RTP to `f`, in arrival order.
    pub async fn on_rtp(&self, f: OnPacketHdlrFn) {
        *self.inner.on_rtp.lock().await = Some(f);
    }

    /// Delivers unprotected inbound RTCP to `f`.
    pub async fn on_rtcp(&self, f: OnPacketHdlrFn) {
        *self.inner.on_rtcp.lock().await = Some(f);
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.transport.conn.local_addr()?)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            rtp_received: self.inner.rtp_received.load(Ordering::Relaxed),
            rtcp_received: self.inner.rtcp_received.load(Ordering::Relaxed),
            rtp_dropped: self.inner.rtp_dropped.load(Ordering::Relaxed),
            rtcp_dropped: self.inner.rtcp_dropped.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
        }
    }

    /// Tears the session down: cancels the I/O task and timers, releases
    /// the TURN allocation, closes DTLS and the endpoints.
    pub async fn close(&self, reason: &str) -> Result<()> {
        log::info!("closing media session: {reason}");
        self.inner.cancel.cancel();

        if let Some(client) = &self.inner.turn_client {
            client.close().await;
        }
        if let Some(mut dtls) = self.inner.dtls.lock().await.take() {
            dtls.close().await?;
        }
        self.inner.dtls_endpoint.close().await;
        if let Err(err) = self.inner.transport.conn.close().await {
            log::debug!("socket close: {err}");
        }
        Ok(())
    }
}

impl SessionInner {
    async fn start_dtls(self: &Arc<Self>, dtls_config: DtlsConfig) -> Result<()> {
        let mut dtls = DtlsTransport::new(dtls_config)?;

        // Remember how to renegotiate when a master key wears out.
        let template = dtls.rekey_config();
        *self.rekey.lock().await = Some(RekeyTemplate {
            config_factory: template,
        });

        let endpoint: Arc<dyn Conn + Send + Sync> = Arc::clone(&self.dtls_endpoint) as _;
        let keying = dtls.start(endpoint).await?;

        let pair = build_contexts(&keying.srtp_config, &self.events_tx)?;
        *self.contexts.lock().await = Some(pair);
        *self.dtls.lock().await = Some(dtls);
        Ok(())
    }

    async fn run(inner: Arc<SessionInner>, mut events_rx: mpsc::Receiver<SrtpEvent>) {
        let mut buf = vec![0u8; RECEIVE_MTU];
        loop {
            tokio::select! {
                biased;

                _ = inner.cancel.cancelled() => {
                    log::debug!("session i/o task exiting");
                    break;
                }
                event = events_rx.recv() => {
                    match event {
                        Some(event) => inner.handle_event(event).await,
                        None => break,
                    }
                }
                res = inner.transport.conn.recv_from(&mut buf) => match res {
                    Ok((n, from)) => inner.handle_packet(&buf[..n], from).await,
                    Err(err) => {
                        log::warn!("socket receive failed: {err}");
                        break;
                    }
                },
            }
        }
    }

    async fn handle_event(self: &Arc<Self>, event: SrtpEvent) {
        match event {
            SrtpEvent::RekeyingRequested { is_rtcp } => {
                log::warn!(
                    "master key lifetime reached ({}), renegotiating",
                    if is_rtcp { "rtcp" } else { "rtp" }
                );
                // The handshake needs the I/O task alive to pump its
                // flights, so it cannot run inline here.
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(err) = inner.rekey().await {
                        log::error!("rekeying failed, media path is dead: {err}");
                    }
                });
            }
        }
    }

    /// Runs a fresh handshake over the existing endpoint and swaps all four
    /// contexts at once.
    async fn rekey(self: &Arc<Self>) -> Result<()> {
        let config = {
            let guard = self.rekey.lock().await;
            let template = guard.as_ref().ok_or(Error::ErrSessionNotStarted)?;
            (template.config_factory)()
        };

        if let Some(mut old) = self.dtls.lock().await.take() {
            old.close().await?;
        }

        let mut dtls = DtlsTransport::new(config)?;
        let endpoint: Arc<dyn Conn + Send + Sync> = Arc::clone(&self.dtls_endpoint) as _;
        let keying = dtls.start(endpoint).await?;

        let pair = build_contexts(&keying.srtp_config, &self.events_tx)?;
        *self.contexts.lock().await = Some(pair);
        *self.dtls.lock().await = Some(dtls);
        log::info!("rekeyed, new srtp contexts installed");
        Ok(())
    }

    async fn handle_packet(self: &Arc<Self>, data: &[u8], from: SocketAddr) {
        match classify(data) {
            Some(PacketKind::Stun) => self.handle_stun(data, from).await,
            Some(PacketKind::Dtls) => {
                if let Err(err) = self.dtls_endpoint.feed(data).await {
                    log::debug!("dtls endpoint rejected packet: {err}");
                }
            }
            Some(PacketKind::Rtp) => self.handle_rtp(data).await,
            Some(PacketKind::Rtcp) => self.handle_rtcp(data).await,
            None => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                log::trace!("discarding unclassifiable {} byte packet", data.len());
            }
        }
    }

    async fn handle_stun(self: &Arc<Self>, data: &[u8], from: SocketAddr) {
        let client = match &self.turn_client {
            Some(client) => client,
            None => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                log::trace!("no TURN client, dropping STUN from {from}");
                return;
            }
        };
        match client.handle_inbound(data, from).await {
            Ok(InboundOutcome::Handled) => {}
            Ok(InboundOutcome::RelayedData { data, from }) => {
                // Relay payloads re-enter classification; nested STUN stops
                // here (no ICE connectivity checks on this path).
                match classify(&data) {
                    Some(PacketKind::Dtls) => {
                        if let Err(err) = self.dtls_endpoint.feed(&data).await {
                            log::debug!("dtls endpoint rejected relayed packet: {err}");
                        }
                    }
                    Some(PacketKind::Rtp) => self.handle_rtp(&data).await,
                    Some(PacketKind::Rtcp) => self.handle_rtcp(&data).await,
                    _ => {
                        self.discarded.fetch_add(1, Ordering::Relaxed);
                        log::trace!("dropping relayed packet from {from}");
                    }
                }
            }
            Err(err) => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                log::trace!("turn client dropped packet from {from}: {err}");
            }
        }
    }

    async fn handle_rtp(self: &Arc<Self>, data: &[u8]) {
        self.rtp_received.fetch_add(1, Ordering::Relaxed);
        let unprotected = {
            let mut guard = self.contexts.lock().await;
            match guard.as_mut() {
                Some(pair) => pair.decode_rtp.decrypt_rtp(data),
                None => {
                    self.rtp_dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        };
        match unprotected {
            Ok(packet) => {
                let mut handler = self.on_rtp.lock().await;
                if let Some(f) = &mut *handler {
                    f(packet).await;
                }
            }
            Err(err) => {
                // Per-packet failures drop silently; counters carry them.
                self.rtp_dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("srtp unprotect failed: {err}");
            }
        }
    }

    async fn handle_rtcp(self: &Arc<Self>, data: &[u8]) {
        self.rtcp_received.fetch_add(1, Ordering::Relaxed);
        let unprotected = {
            let mut guard = self.contexts.lock().await;
            match guard.as_mut() {
                Some(pair) => pair.decode_rtcp.decrypt_rtcp(data),
                None => {
                    self.rtcp_dropped.fetch_add(1, Ordering::Relaxed);
                    return;
                }
            }
        };
        match unprotected {
            Ok(packet) => {
                let mut handler = self.on_rtcp.lock().await;
                if let Some(f) = &mut *handler {
                    f(packet).await;
                }
            }
            Err(err) => {
                self.rtcp_dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("srtcp unprotect failed: {err}");
            }
        }
    }
}
