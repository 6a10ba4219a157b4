//! SSH transport and SFTP subsystem bootstrap.
//!
//! Bootstrapping is a negotiation: the first attempt opens the
//! transport with aggressive transfer parameters (large packets, deep
//! request window) and, if the server rejects them as oversized,
//! reconnects exactly once with a conservative profile every SFTP
//! server accepts. Any other failure, and any failure of the
//! conservative attempt, is fatal; every failed attempt tears its
//! transport down before the error is surfaced.

use crate::core::config::{FALLBACK_PACKET_BYTES, MIN_FALLBACK_REQUESTS, PerformanceConfig};
use crate::core::error::SessionError;
use russh::client;
use russh_sftp::client::SftpSession;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ── Transfer parameters ──────────────────────────────────────────────────────

/// Per-session SFTP tuning: packet payload size and in-flight request
/// window. The negotiated pair is fixed for the session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    pub packet_bytes: usize,
    pub inflight: usize,
}

impl TransferParams {
    /// First-attempt profile, taken from the clamped user config.
    pub fn aggressive(perf: &PerformanceConfig) -> Self {
        Self {
            packet_bytes: perf.max_packet_bytes(),
            inflight: perf.concurrent_requests(),
        }
    }

    /// Conservative retry profile derived from a rejected request: the
    /// packet is halved and capped at the 32 KiB floor, the window is
    /// halved but never drops below the minimum.
    pub fn fallback(&self) -> Self {
        Self {
            packet_bytes: (self.packet_bytes / 2).min(FALLBACK_PACKET_BYTES),
            inflight: (self.inflight / 2).max(MIN_FALLBACK_REQUESTS),
        }
    }
}

/// Transport configuration carrying the requested profile: the channel
/// packet limit is the profile's packet size, and the flow-control
/// window is sized for `inflight` packets in flight at once.
fn transport_config(params: TransferParams) -> client::Config {
    let window = (params.packet_bytes as u64 * params.inflight as u64).min(u32::MAX as u64);
    client::Config {
        maximum_packet_size: params.packet_bytes as u32,
        window_size: window as u32,
        ..Default::default()
    }
}

// ── Rejection classification ─────────────────────────────────────────────────

/// Whether a bootstrap failure looks like the server refusing our
/// packet size. Server wording varies, so this matches the phrasings
/// seen in the wild rather than any single implementation.
fn is_packet_size_rejection(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    [
        "larger than",
        "maxpacket",
        "max packet",
        "payload too large",
        "packet too long",
        "packet too big",
    ]
    .iter()
    .any(|marker| lower.contains(marker))
}

// ── Negotiation ──────────────────────────────────────────────────────────────

/// Aggressive attempt, then at most one conservative retry. The opener
/// runs one full bootstrap with the given profile; it is abstract so
/// the retry logic is testable without a live server.
async fn negotiate<T, F, Fut>(
    requested: TransferParams,
    mut open: F,
) -> Result<(T, TransferParams), SessionError>
where
    F: FnMut(TransferParams) -> Fut,
    Fut: Future<Output = Result<T, SessionError>>,
{
    match open(requested).await {
        Ok(session) => Ok((session, requested)),
        Err(err) => {
            let detail = err.to_string();
            if !is_packet_size_rejection(&detail) {
                return Err(err);
            }
            let conservative = requested.fallback();
            warn!(
                "server rejected {} B packets ({detail}); reconnecting with {} B packets, {} requests in flight",
                requested.packet_bytes, conservative.packet_bytes, conservative.inflight
            );
            match open(conservative).await {
                Ok(session) => Ok((session, conservative)),
                Err(err) => Err(SessionError::Negotiation(err.to_string())),
            }
        }
    }
}

// ── SSH client handler ───────────────────────────────────────────────────────

struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host key verification is out of scope; accept and proceed.
        Ok(true)
    }
}

// ── Remote session ───────────────────────────────────────────────────────────

/// A live SSH connection with an SFTP subsystem on top.
pub struct RemoteSession {
    handle: Arc<client::Handle<ClientHandler>>,
    sftp: Arc<SftpSession>,
    params: TransferParams,
}

impl RemoteSession {
    /// Connect, authenticate, and negotiate the SFTP subsystem.
    pub async fn establish(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        perf: &PerformanceConfig,
    ) -> Result<Self, SessionError> {
        let addr = format!("{host}:{port}");
        info!("connecting to {addr} as {user}");

        let requested = TransferParams::aggressive(perf);
        let ((handle, sftp), params) =
            negotiate(requested, |params| {
                connect_with(host, port, user, password, params)
            })
            .await?;

        info!(
            "sftp ready on {addr}: {} B packets, {} requests in flight",
            params.packet_bytes, params.inflight
        );

        Ok(Self {
            handle: Arc::new(handle),
            sftp: Arc::new(sftp),
            params,
        })
    }

    pub fn sftp(&self) -> Arc<SftpSession> {
        Arc::clone(&self.sftp)
    }

    pub fn params(&self) -> TransferParams {
        self.params
    }

    /// Server-side home directory, used as the initial remote pane root.
    pub async fn home_dir(&self) -> Result<String, SessionError> {
        self.sftp
            .canonicalize(".")
            .await
            .map_err(|e| SessionError::Subsystem(e.to_string()))
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// One full bootstrap attempt under the given profile. Every failure
/// path after the transport opens disconnects it, so a retry (or the
/// caller) never inherits a half-open connection.
async fn connect_with(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    params: TransferParams,
) -> Result<(client::Handle<ClientHandler>, SftpSession), SessionError> {
    debug!(
        "opening transport ({} B packets, {} in flight)",
        params.packet_bytes, params.inflight
    );
    let config = Arc::new(transport_config(params));
    let mut handle = client::connect(config, (host, port), ClientHandler)
        .await
        .map_err(|source| SessionError::Connect {
            addr: format!("{host}:{port}"),
            source,
        })?;

    let auth = handle.authenticate_password(user, password).await?;
    if !auth.success() {
        let _ = handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await;
        return Err(SessionError::Auth {
            user: user.to_string(),
        });
    }

    match open_subsystem(&handle).await {
        Ok(sftp) => Ok((handle, sftp)),
        Err(detail) => {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await;
            Err(SessionError::Subsystem(detail))
        }
    }
}

/// SFTP subsystem on an authenticated transport. The realpath probe
/// forces init failures to surface here instead of on the first
/// transfer.
async fn open_subsystem(handle: &client::Handle<ClientHandler>) -> Result<SftpSession, String> {
    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| e.to_string())?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| e.to_string())?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| e.to_string())?;
    sftp.canonicalize(".").await.map_err(|e| e.to_string())?;
    Ok(sftp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn default_request() -> TransferParams {
        TransferParams::aggressive(&PerformanceConfig::default())
    }

    fn packet_rejection() -> SessionError {
        SessionError::Subsystem("server cannot handle sizes larger than 32KB".to_string())
    }

    #[test]
    fn packet_size_rejections_are_recognized() {
        assert!(is_packet_size_rejection(
            "server cannot handle sizes larger than 32KB"
        ));
        assert!(is_packet_size_rejection("exceeds maxpacket for channel"));
        assert!(is_packet_size_rejection("SSH_MSG_CHANNEL_DATA payload too large"));
        assert!(is_packet_size_rejection("Packet too big"));
        assert!(is_packet_size_rejection("packet too long for window"));
        assert!(!is_packet_size_rejection("permission denied"));
        assert!(!is_packet_size_rejection("connection reset by peer"));
    }

    #[test]
    fn fallback_halves_within_bounds() {
        let requested = default_request();
        let conservative = requested.fallback();
        // 1 MiB request drops to the 32 KiB floor, 128 requests to 64.
        assert_eq!(conservative.packet_bytes, 32 * 1024);
        assert_eq!(conservative.inflight, 64);

        // A minimal request never falls below the window minimum.
        let tight = TransferParams {
            packet_bytes: 32 * 1024,
            inflight: 16,
        };
        assert_eq!(tight.fallback().inflight, MIN_FALLBACK_REQUESTS);
    }

    #[test]
    fn transport_config_carries_the_profile() {
        let aggressive = transport_config(default_request());
        assert_eq!(aggressive.maximum_packet_size, 1024 * 1024);
        assert_eq!(aggressive.window_size, 128 * 1024 * 1024);

        let conservative = transport_config(default_request().fallback());
        assert_eq!(conservative.maximum_packet_size, 32 * 1024);
        assert_eq!(conservative.window_size, 64 * 32 * 1024);
    }

    #[tokio::test]
    async fn first_attempt_success_keeps_aggressive_params() {
        let attempts = AtomicUsize::new(0);
        let requested = default_request();
        let (got, params) = negotiate(requested, |p: TransferParams| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, SessionError>(p) }
        })
        .await
        .unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(params, requested);
        assert_eq!(got, requested);
    }

    #[tokio::test]
    async fn packet_rejection_reconnects_with_the_fallback_profile() {
        let attempts = AtomicUsize::new(0);
        let requested = default_request();
        let (got, params) = negotiate(requested, |p: TransferParams| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(packet_rejection())
                } else {
                    Ok(p)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        // The retry attempt really received the conservative profile.
        assert_eq!(params, requested.fallback());
        assert_eq!(got, requested.fallback());
    }

    #[tokio::test]
    async fn unrelated_failure_does_not_retry() {
        let attempts = AtomicUsize::new(0);
        let err = negotiate(default_request(), |_: TransferParams| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                Err::<TransferParams, _>(SessionError::Subsystem("permission denied".to_string()))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(err, SessionError::Subsystem(_)));
    }

    #[tokio::test]
    async fn auth_failure_passes_through_untouched() {
        let attempts = AtomicUsize::new(0);
        let err = negotiate(default_request(), |_: TransferParams| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                Err::<TransferParams, _>(SessionError::Auth {
                    user: "deploy".to_string(),
                })
            }
        })
        .await
        .unwrap_err();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(err, SessionError::Auth { .. }));
    }

    #[tokio::test]
    async fn failed_fallback_is_fatal() {
        let attempts = AtomicUsize::new(0);
        let err = negotiate(default_request(), |_: TransferParams| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                Err::<TransferParams, _>(SessionError::Subsystem(
                    "exceeds maxpacket for channel".to_string(),
                ))
            }
        })
        .await
        .unwrap_err();
        // The conservative attempt is the last one, whatever it dies of.
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert!(matches!(err, SessionError::Negotiation(_)));
    }
}
