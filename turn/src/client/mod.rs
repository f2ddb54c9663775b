
pub mod transaction;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use base64::encode as b64encode;
use stun::attributes::*;
use stun::error_code::*;
use stun::integrity::MessageIntegrity;
use stun::message::*;
use stun::textattrs::TextAttribute;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use transaction::*;
use util::Conn;

use crate::error::*;
use crate::proto::addrfamily::RequestedAddressFamily;
use crate::proto::data::Data;
use crate::proto::lifetime::Lifetime;
use crate::proto::peeraddr::PeerAddress;
use crate::proto::relayaddr::RelayedAddress;
use crate::proto::reqtrans::RequestedTransport;
use crate::proto::PROTO_UDP;

/// Total Allocate transmissions before giving up.
const MAX_ALLOCATE_ATTEMPTS: u32 = 5;
/// How long one Allocate transmission waits for a response before the next
/// transmission goes out.
const ALLOCATE_RTX_INTERVAL: Duration = Duration::from_millis(1000);
/// Floor between two consecutive Allocate transmissions, even when the
/// server answers quickly (401 retry, redirect).
const MIN_SEND_SPACING: Duration = Duration::from_millis(500);
/// Response wait for CreatePermission and Refresh transactions.
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(3000);

const DEFAULT_ALLOCATION_LIFETIME: Duration = Duration::from_secs(600);
const DEFAULT_PERMISSION_LIFETIME: Duration = Duration::from_secs(300);
/// Refresh runs this much before the advertised expiry.
const REFRESH_GRACE: Duration = Duration::from_secs(10);

/// ClientConfig is a bag of config parameters for [`Client`].
pub struct ClientConfig {
    /// TURN server address, e.g. "turn.example.com:3478".
    pub server_addr: String,
    pub username: String,
    pub password: String,
    /// Initial realm guess; the realm returned by the server wins.
    pub realm: String,
    pub software: String,
    pub conn: Arc<dyn Conn + Send + Sync>,
}

/// Per-server allocation state. Only the session task mutates it.
#[derive(Debug)]
struct ServerState {
    server_addr: SocketAddr,
    realm: Vec<u8>,
    nonce: Option<Vec<u8>>,
    transaction_id: TransactionId,
    reflexive_addr: Option<SocketAddr>,
    relay_addr: Option<SocketAddr>,
    expires_at: Option<Instant>,
    refresh_scheduled: bool,
    requests_sent: u64,
    error_responses: u64,
    last_request_at: Option<Instant>,
    last_response_at: Option<Instant>,
}

/// Counters exposed for observability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientStats {
    pub requests_sent: u64,
    pub error_responses: u64,
}

/// What [`Client::handle_inbound`] made of a datagram.
#[derive(Debug)]
pub enum InboundOutcome {
    /// The packet was a response (or unknown) and was consumed.
    Handled,
    /// The packet was a Data indication; the unwrapped payload and the peer
    /// it originated from are handed back for reclassification.
    RelayedData { data: Vec<u8>, from: SocketAddr },
}

/// Client drives Allocate → CreatePermission → Refresh against one TURN
/// server over a caller-owned connection. Inbound STUN traffic must be fed
/// through [`Client::handle_inbound`]; the client never reads the socket.
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    conn: Arc<dyn Conn + Send + Sync>,
    username: String,
    password: String,
    software: String,
    state: Mutex<ServerState>,
    tr_map: Mutex<TransactionMap>,
    permissions: Mutex<HashMap<SocketAddr, ()>>,
    close_notify: CancellationToken,
}

impl Client {
    /// Resolves the server address and builds a client.
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let mut resolved = None;
        for addr in tokio::net::lookup_host(config.server_addr.as_str()).await? {
            resolved = Some(addr);
            if addr.is_ipv4() {
                break;
            }
        }
        let server_addr =
            resolved.ok_or_else(|| Error::ErrUnresolvableAddr(config.server_addr.clone()))?;
        log::debug!("turn server {} -> {}", config.server_addr, server_addr);

        Ok(Client {
            inner: Arc::new(ClientInner {
                conn: config.conn,
                username: config.username,
                password: config.password,
                software: config.software,
                state: Mutex::new(ServerState {
                    server_addr,
                    realm: config.realm.into_bytes(),
                    nonce: None,
                    transaction_id: TransactionId::new(),
                    reflexive_addr: None,
                    relay_addr: None,
                    expires_at: None,
                    refresh_scheduled: false,
                    requests_sent: 0,
                    error_responses: 0,
                    last_request_at: None,
                    last_response_at: None,
                }),
                tr_map: Mutex::new(TransactionMap::new()),
                permissions: Mutex::new(HashMap::new()),
                close_notify: CancellationToken::new(),
            }),
        })
    }

    /// Runs the Allocate state machine until a relay address is obtained or
    /// the attempt budget is spent.
    pub async fn allocate(&self) -> Result<SocketAddr> {
        ClientInner::allocate(&self.inner).await
    }

    /// Spec-shaped wrapper over [`Client::allocate`]: resolves to the relay
    /// endpoint, or `None` on timeout, cancellation or failure. Neither the
    /// timeout nor cancellation leaves the server state half-mutated.
    pub async fn get_relay_endpoint(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<SocketAddr> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            res = tokio::time::timeout(timeout, self.allocate()) => match res {
                Ok(Ok(relay)) => Some(relay),
                Ok(Err(err)) => {
                    log::warn!("allocate failed: {err}");
                    None
                }
                Err(_) => {
                    log::warn!("allocate timed out");
                    None
                }
            },
        }
    }

    /// Installs a permission for `peer` on the allocation and keeps it
    /// refreshed until the client closes.
    pub async fn create_permission(&self, peer: SocketAddr) -> Result<()> {
        ClientInner::create_permission(&self.inner, peer).await
    }

    /// Wraps `data` in a Send indication towards `peer`.
    pub async fn send_indication(&self, peer: SocketAddr, data: &[u8]) -> Result<()> {
        self.inner.send_indication(peer, data).await
    }

    /// Feeds one inbound STUN datagram to the client.
    pub async fn handle_inbound(&self, data: &[u8], from: SocketAddr) -> Result<InboundOutcome> {
        self.inner.handle_inbound(data, from).await
    }

    /// Returns the relay endpoint, if allocated.
    pub async fn relay_addr(&self) -> Option<SocketAddr> {
        self.inner.state.lock().await.relay_addr
    }

    /// Returns the server-reflexive endpoint, if learned.
    pub async fn reflexive_addr(&self) -> Option<SocketAddr> {
        self.inner.state.lock().await.reflexive_addr
    }

    pub async fn stats(&self) -> ClientStats {
        let st = self.inner.state.lock().await;
        ClientStats {
            requests_sent: st.requests_sent,
            error_responses: st.error_responses,
        }
    }

    /// Releases the allocation (LIFETIME = 0, best effort), cancels all
    /// timers and unblocks outstanding transactions.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl ClientInner {
    fn auth_attrs(&self, st: &ServerState) -> Option<(Vec<u8>, Vec<u8>, MessageIntegrity)> {
        let nonce = st.nonce.clone()?;
        let realm_utf8 = String::from_utf8_lossy(&st.realm).into_owned();
        let integrity =
            MessageIntegrity::new_long_term_integrity(&self.username, &realm_utf8, &self.password);
        Some((st.realm.clone(), nonce, integrity))
    }

    fn build_allocate(&self, st: &ServerState) -> Result<Message> {
        let family = if st.server_addr.is_ipv6() {
            RequestedAddressFamily::Ipv6
        } else {
            RequestedAddressFamily::Ipv4
        };

        let mut msg = Message::new();
        msg.build(&[
            &ALLOCATE_REQUEST,
            &st.transaction_id,
            &TextAttribute::new(ATTR_SOFTWARE, self.software.clone()),
            &RequestedTransport {
                protocol: PROTO_UDP,
            },
            &family,
        ])?;

        if let Some((realm, nonce, integrity)) = self.auth_attrs(st) {
            msg.add(ATTR_USERNAME, self.username.as_bytes());
            msg.add(ATTR_REALM, &realm);
            msg.add(ATTR_NONCE, &nonce);
            integrity.add_to(&mut msg)?;
        }

        Ok(msg)
    }

    async fn perform_transaction(
        &self,
        msg: &Message,
        to: SocketAddr,
        wait: Duration,
    ) -> Result<TransactionResult> {
        let key = b64encode(msg.transaction_id.0);
        let mut tr = Transaction::new(key.clone(), msg.raw.clone(), to);
        let mut result_ch = tr
            .get_result_channel()
            .ok_or(Error::ErrTransactionClosed)?;
        self.tr_map.lock().await.insert(key.clone(), tr);

        log::trace!("{} transaction {} to {}", msg.typ, key, to);
        {
            let mut st = self.state.lock().await;
            st.requests_sent += 1;
            st.last_request_at = Some(Instant::now());
        }
        if let Err(err) = self.conn.send_to(&msg.raw, to).await {
            self.tr_map.lock().await.delete(&key);
            return Err(err.into());
        }

        tokio::select! {
            _ = self.close_notify.cancelled() => {
                self.tr_map.lock().await.delete(&key);
                Err(Error::ErrClientClosed)
            }
            res = tokio::time::timeout(wait, result_ch.recv()) => match res {
                Ok(Some(tr_res)) => Ok(tr_res),
                Ok(None) => Err(Error::ErrTransactionClosed),
                Err(_) => {
                    self.tr_map.lock().await.delete(&key);
                    Err(Error::ErrTransactionTimeout)
                }
            },
        }
    }

    async fn handle_inbound(&self, data: &[u8], from: SocketAddr) -> Result<InboundOutcome> {
        if !is_message(data) {
            return Err(Error::ErrNonStunMessage);
        }

        let mut msg = Message::new();
        msg.unmarshal_binary(data)?;

        {
            let mut st = self.state.lock().await;
            if from != st.server_addr {
                log::debug!("discarding STUN from {from}, server is {}", st.server_addr);
                return Err(Error::ErrUnexpectedOrigin);
            }
            st.last_response_at = Some(Instant::now());
        }

        if msg.typ == DATA_INDICATION {
            let mut d = Data::default();
            d.get_from(&msg)?;
            let mut peer = PeerAddress::default();
            peer.get_from(&msg)?;
            return Ok(InboundOutcome::RelayedData {
                data: d.0,
                from: SocketAddr::new(peer.ip, peer.port),
            });
        }

        let key = b64encode(msg.transaction_id.0);
        if let Some(tr) = self.tr_map.lock().await.delete(&key) {
            if !tr
                .write_result(TransactionResult {
                    msg,
                    from,
                    err: None,
                })
                .await
            {
                log::debug!("no listener for transaction {key}");
            }
        } else {
            log::trace!("response for unknown transaction {key}");
        }
        Ok(InboundOutcome::Handled)
    }

    async fn allocate(self: &Arc<Self>) -> Result<SocketAddr> {
        if let Some(relay) = self.state.lock().await.relay_addr {
            return Ok(relay);
        }

        let mut attempts = 0u32;
        loop {
            if attempts >= MAX_ALLOCATE_ATTEMPTS {
                return Err(Error::ErrMaxRetriesExceeded);
            }
            attempts += 1;

            let (msg, server) = {
                let st = self.state.lock().await;
                (self.build_allocate(&st)?, st.server_addr)
            };

            let sent_at = Instant::now();
            let res = self
                .perform_transaction(&msg, server, ALLOCATE_RTX_INTERVAL)
                .await;

            let resp = match res {
                Ok(resp) => resp,
                // No response since the last send: retransmit on the next
                // loop turn. The 1 s response wait doubles as pacing.
                Err(Error::ErrTransactionTimeout) => continue,
                Err(err) => return Err(err),
            };

            match resp.msg.typ.class {
                CLASS_SUCCESS_RESPONSE => {
                    let mut relayed = RelayedAddress::default();
                    relayed.get_from(&resp.msg)?;
                    let relay = relayed.socket_addr();

                    let mut lifetime = Lifetime(DEFAULT_ALLOCATION_LIFETIME);
                    let _ = lifetime.get_from(&resp.msg);

                    let mut reflexive = stun::xoraddr::XorMappedAddress::default();
                    let srflx = reflexive
                        .get_from(&resp.msg)
                        .ok()
                        .map(|_| SocketAddr::new(reflexive.ip, reflexive.port));

                    let deadline = {
                        let mut st = self.state.lock().await;
                        st.relay_addr = Some(relay);
                        st.reflexive_addr = srflx;
                        let expires = Instant::now() + lifetime.0;
                        st.expires_at = Some(expires);
                        let schedule = !st.refresh_scheduled;
                        st.refresh_scheduled = true;
                        schedule.then_some(expires.checked_sub(REFRESH_GRACE).unwrap_or(expires))
                    };
                    if let Some(deadline) = deadline {
                        self.spawn_allocation_refresh(deadline);
                    }

                    log::info!("allocated relay {relay}, lifetime {lifetime}");
                    return Ok(relay);
                }
                CLASS_ERROR_RESPONSE => {
                    let mut ec = ErrorCodeAttribute::default();
                    ec.get_from(&resp.msg)?;
                    self.state.lock().await.error_responses += 1;

                    match ec.code {
                        CODE_UNAUTHORIZED | CODE_STALE_NONCE => {
                            self.store_auth_challenge(&resp.msg).await?;
                            log::debug!("allocate challenged ({}), retrying with auth", ec.code.0);
                        }
                        CODE_TRY_ALTERNATE => {
                            let mut alt = stun::addr::AlternateServer::default();
                            alt.get_from(&resp.msg)?;
                            let mut st = self.state.lock().await;
                            st.server_addr = SocketAddr::new(alt.ip, alt.port);
                            st.transaction_id = TransactionId::new();
                            log::info!("allocate redirected to {}", st.server_addr);
                        }
                        other => return Err(Error::ErrAllocateFailed(other.0)),
                    }

                    // A quick error response must not defeat the minimum
                    // spacing between transmissions.
                    let elapsed = sent_at.elapsed();
                    if elapsed < MIN_SEND_SPACING {
                        tokio::time::sleep(MIN_SEND_SPACING - elapsed).await;
                    }
                }
                _ => return Err(Error::ErrAllocateFailed(0)),
            }
        }
    }

    /// Caches NONCE and REALM from a 401/438 and rolls the transaction id so
    /// the retry is a fresh, authenticated request.
    async fn store_auth_challenge(&self, msg: &Message) -> Result<()> {
        let nonce = msg.get(ATTR_NONCE)?;
        let realm = msg.get(ATTR_REALM)?;
        let mut st = self.state.lock().await;
        st.nonce = Some(nonce);
        st.realm = realm;
        st.transaction_id = TransactionId::new();
        Ok(())
    }

    fn spawn_allocation_refresh(self: &Arc<Self>, first_deadline: Instant) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut deadline = first_deadline;
            loop {
                tokio::select! {
                    _ = inner.close_notify.cancelled() => break,
                    _ = tokio::time::sleep_until(deadline) => {}
                }

                match inner.refresh_allocation(DEFAULT_ALLOCATION_LIFETIME).await {
                    Ok(expires) => {
                        deadline = expires.checked_sub(REFRESH_GRACE).unwrap_or(expires);
                    }
                    Err(Error::ErrClientClosed) => break,
                    Err(err) => {
                        // Keep the allocation alive on transient failures.
                        log::warn!("allocation refresh failed: {err}");
                        deadline = Instant::now() + REFRESH_GRACE;
                    }
                }
            }
        });
    }

    async fn refresh_allocation(self: &Arc<Self>, lifetime: Duration) -> Result<Instant> {
        let mut retried = false;
        loop {
            let (msg, server) = {
                let st = self.state.lock().await;
                if st.relay_addr.is_none() {
                    return Err(Error::ErrNoAllocation);
                }
                let mut msg = Message::new();
                msg.build(&[
                    &REFRESH_REQUEST,
                    &TransactionId::new(),
                    &TextAttribute::new(ATTR_SOFTWARE, self.software.clone()),
                    &Lifetime(lifetime),
                ])?;
                if let Some((realm, nonce, integrity)) = self.auth_attrs(&st) {
                    msg.add(ATTR_USERNAME, self.username.as_bytes());
                    msg.add(ATTR_REALM, &realm);
                    msg.add(ATTR_NONCE, &nonce);
                    integrity.add_to(&mut msg)?;
                }
                (msg, st.server_addr)
            };

            let resp = self.perform_transaction(&msg, server, RESPONSE_TIMEOUT).await?;
            match resp.msg.typ.class {
                CLASS_SUCCESS_RESPONSE => {
                    let mut granted = Lifetime(lifetime);
                    let _ = granted.get_from(&resp.msg);
                    let expires = Instant::now() + granted.0;
                    self.state.lock().await.expires_at = Some(expires);
                    log::debug!("allocation refreshed for {granted}");
                    return Ok(expires);
                }
                CLASS_ERROR_RESPONSE => {
                    let mut ec = ErrorCodeAttribute::default();
                    ec.get_from(&resp.msg)?;
                    self.state.lock().await.error_responses += 1;
                    if ec.code == CODE_STALE_NONCE && !retried {
                        self.store_auth_challenge(&resp.msg).await?;
                        retried = true;
                        continue;
                    }
                    return Err(Error::ErrRefreshFailed(ec.code.0));
                }
                _ => return Err(Error::ErrRefreshFailed(0)),
            }
        }
    }

    async fn create_permission(self: &Arc<Self>, peer: SocketAddr) -> Result<()> {
        let granted = self.send_create_permission(peer).await?;

        let newly_tracked = self
            .permissions
            .lock()
            .await
            .insert(peer, ())
            .is_none();
        if newly_tracked {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let mut deadline =
                    Instant::now() + granted.checked_sub(REFRESH_GRACE).unwrap_or(granted);
                loop {
                    tokio::select! {
                        _ = inner.close_notify.cancelled() => break,
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                    match inner.send_create_permission(peer).await {
                        Ok(granted) => {
                            deadline = Instant::now()
                                + granted.checked_sub(REFRESH_GRACE).unwrap_or(granted);
                        }
                        Err(Error::ErrClientClosed) => break,
                        Err(err) => {
                            log::warn!("permission refresh for {peer} failed: {err}");
                            deadline = Instant::now() + REFRESH_GRACE;
                        }
                    }
                }
            });
        }
        Ok(())
    }

    /// One CreatePermission round trip; returns the granted lifetime.
    async fn send_create_permission(&self, peer: SocketAddr) -> Result<Duration> {
        let mut retried = false;
        loop {
            let (msg, server) = {
                let st = self.state.lock().await;
                if st.relay_addr.is_none() {
                    return Err(Error::ErrNoAllocation);
                }
                let mut msg = Message::new();
                msg.build(&[
                    &CREATE_PERMISSION_REQUEST,
                    &TransactionId::new(),
                    &TextAttribute::new(ATTR_SOFTWARE, self.software.clone()),
                    &PeerAddress::from(peer),
                ])?;
                if let Some((realm, nonce, integrity)) = self.auth_attrs(&st) {
                    msg.add(ATTR_USERNAME, self.username.as_bytes());
                    msg.add(ATTR_REALM, &realm);
                    msg.add(ATTR_NONCE, &nonce);
                    integrity.add_to(&mut msg)?;
                }
                (msg, st.server_addr)
            };

            let resp = self.perform_transaction(&msg, server, RESPONSE_TIMEOUT).await?;
            match resp.msg.typ.class {
                CLASS_SUCCESS_RESPONSE => {
                    let mut granted = Lifetime(DEFAULT_PERMISSION_LIFETIME);
                    let _ = granted.get_from(&resp.msg);
                    log::debug!("permission for {peer} granted for {granted}");
                    return Ok(granted.0);
                }
                CLASS_ERROR_RESPONSE => {
                    let mut ec = ErrorCodeAttribute::default();
                    ec.get_from(&resp.msg)?;
                    self.state.lock().await.error_responses += 1;
                    if (ec.code == CODE_STALE_NONCE || ec.code == CODE_UNAUTHORIZED) && !retried {
                        self.store_auth_challenge(&resp.msg).await?;
                        retried = true;
                        continue;
                    }
                    return Err(Error::ErrPermissionFailed(ec.code.0));
                }
                _ => return Err(Error::ErrPermissionFailed(0)),
            }
        }
    }

    async fn send_indication(&self, peer: SocketAddr, data: &[u8]) -> Result<()> {
        let server = {
            let st = self.state.lock().await;
            if st.relay_addr.is_none() {
                return Err(Error::ErrNoAllocation);
            }
            st.server_addr
        };

        let mut msg = Message::new();
        msg.build(&[
            &SEND_INDICATION,
            &TransactionId::new(),
            &PeerAddress::from(peer),
            &Data(data.to_vec()),
        ])?;
        self.conn.send_to(&msg.raw, server).await?;
        Ok(())
    }

    async fn close(&self) {
        // Release the allocation before the timers die; fire and forget.
        let release = {
            let st = self.state.lock().await;
            st.relay_addr.map(|_| {
                let mut msg = Message::new();
                let built = msg
                    .build(&[
                        &REFRESH_REQUEST,
                        &TransactionId::new(),
                        &Lifetime(Duration::from_secs(0)),
                    ])
                    .and_then(|_| {
                        if let Some((realm, nonce, integrity)) = self.auth_attrs(&st) {
                            msg.add(ATTR_USERNAME, self.username.as_bytes());
                            msg.add(ATTR_REALM, &realm);
                            msg.add(ATTR_NONCE, &nonce);
                            integrity.add_to(&mut msg)?;
                        }
                        Ok(())
                    });
                (built, msg, st.server_addr)
            })
        };
        if let Some((Ok(()), msg, server)) = release {
            if let Err(err) = self.conn.send_to(&msg.raw, server).await {
                log::debug!("allocation release failed: {err}");
            }
        }

        self.close_notify.cancel();
        self.tr_map.lock().await.close_and_delete_all();
    }
}
