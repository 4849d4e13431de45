use crate::engine::jitter;
use crate::engine::payload::HEADER_PAYLOAD;
use crate::engine::stream::{read_with_timeout, MeteredStream};
use crate::error::{SessionError, SessionPhase};
use slowdrip_common::{ProbeConfig, Target};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::{sleep, timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Probe connections currently open in this process.
pub static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Idle time between the last header byte and the response read.
pub const POST_SEND_PAUSE: Duration = Duration::from_millis(100);

/// Largest response chunk requested by the single read.
pub const RESPONSE_READ_LIMIT: usize = 1000;

/// Per-session timeouts, derived once from the probe config.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ProbeConfig::default())
    }
}

impl From<&ProbeConfig> for SessionSettings {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            read_timeout: config.read_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// What a finished session reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub bytes_sent: usize,
    pub bytes_received: usize,
}

struct ProbeConnectionGuard;

impl ProbeConnectionGuard {
    fn new() -> Self {
        ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst);
        Self
    }
}

impl Drop for ProbeConnectionGuard {
    fn drop(&mut self) {
        ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs `fut` unless the token fires first.
async fn until_cancelled<F>(
    cancel: &CancellationToken,
    phase: SessionPhase,
    fut: F,
) -> Result<F::Output, SessionError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled { phase }),
        out = fut => Ok(out),
    }
}

async fn resolve(target: &Target) -> Result<Vec<SocketAddr>, SessionError> {
    let resolution_error = |source: io::Error| SessionError::HostResolution {
        host: target.host.clone(),
        source,
    };
    let addrs: Vec<SocketAddr> = lookup_host((target.host.as_str(), target.port))
        .await
        .map_err(resolution_error)?
        .collect();
    if addrs.is_empty() {
        return Err(resolution_error(io::Error::new(
            io::ErrorKind::NotFound,
            "no addresses returned",
        )));
    }
    Ok(addrs)
}

fn classify_connect_error(
    target: &Target,
    settings: &SessionSettings,
    e: io::Error,
) -> SessionError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => SessionError::ConnectionRefused {
            target: target.to_string(),
            source: e,
        },
        io::ErrorKind::TimedOut => SessionError::ConnectionTimeout {
            target: target.to_string(),
            timeout: settings.connect_timeout,
        },
        _ => SessionError::Connect {
            target: target.to_string(),
            source: e,
        },
    }
}

/// Resolve and connect, bounded by the connect timeout.
async fn connect_target(
    target: &Target,
    settings: &SessionSettings,
) -> Result<TcpStream, SessionError> {
    let attempt = async {
        let addrs = resolve(target).await?;
        TcpStream::connect(&addrs[..])
            .await
            .map_err(|e| classify_connect_error(target, settings, e))
    };
    match timeout(settings.connect_timeout, attempt).await {
        Ok(res) => res,
        Err(_) => Err(SessionError::ConnectionTimeout {
            target: target.to_string(),
            timeout: settings.connect_timeout,
        }),
    }
}

/// One open probe connection, owned exclusively by its session.
struct Session {
    id: usize,
    stream: MeteredStream<TcpStream>,
    _guard: ProbeConnectionGuard,
}

impl Session {
    fn new(id: usize, stream: TcpStream) -> Self {
        Self {
            id,
            stream: MeteredStream::new(stream),
            _guard: ProbeConnectionGuard::new(),
        }
    }

    async fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.stream.write_all(&[byte]).await?;
        self.stream.flush().await
    }

    async fn send_header(&mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        debug!(session = self.id, phase = %SessionPhase::Sending, "Trickling header");
        for (offset, &byte) in HEADER_PAYLOAD.iter().enumerate() {
            until_cancelled(cancel, SessionPhase::Sending, self.write_byte(byte))
                .await?
                .map_err(|source| SessionError::WriteFailure { offset, source })?;
            until_cancelled(cancel, SessionPhase::Sending, sleep(jitter::next_delay())).await?;
        }
        debug_assert_eq!(self.stream.bytes_written(), HEADER_PAYLOAD.len());
        Ok(())
    }

    async fn receive(
        &mut self,
        settings: &SessionSettings,
        cancel: &CancellationToken,
    ) -> Result<usize, SessionError> {
        debug!(session = self.id, phase = %SessionPhase::Receiving, "Reading response");
        let mut buf = [0u8; RESPONSE_READ_LIMIT];
        let read = async {
            match settings.read_timeout {
                Some(limit) => read_with_timeout(&mut self.stream, &mut buf, limit).await,
                None => self.stream.read(&mut buf).await,
            }
        };
        until_cancelled(cancel, SessionPhase::Receiving, read)
            .await?
            .map_err(|source| SessionError::ReadFailure { source })
    }

    async fn drive(
        &mut self,
        settings: &SessionSettings,
        cancel: &CancellationToken,
    ) -> Result<SessionReport, SessionError> {
        self.send_header(cancel).await?;

        debug!(session = self.id, phase = %SessionPhase::PostSendPause, "Header sent");
        until_cancelled(cancel, SessionPhase::PostSendPause, sleep(POST_SEND_PAUSE)).await?;

        let bytes_received = self.receive(settings, cancel).await?;
        Ok(SessionReport {
            bytes_sent: self.stream.bytes_written(),
            bytes_received,
        })
    }

    /// Shuts the connection down and releases it. Consumes the session, so
    /// the handle is released exactly once.
    async fn close(self) {
        let Session { id, stream, _guard } = self;
        debug!(
            session = id,
            phase = %SessionPhase::Closing,
            bytes_sent = stream.bytes_written(),
            "Closing connection"
        );
        crate::metrics::HEADER_BYTES_SENT.inc_by(stream.bytes_written() as u64);

        let mut stream = stream.into_inner();
        if let Err(e) = stream.shutdown().await {
            debug!(session = id, error = %e, "Shutdown failed during close");
        }
        drop(stream);
    }
}

/// Runs one full probe cycle: connect, trickle the header, pause, read once,
/// close. The connection is closed on every path once it has been opened.
pub async fn run_session(
    id: usize,
    target: &Target,
    settings: &SessionSettings,
    cancel: &CancellationToken,
) -> Result<SessionReport, SessionError> {
    crate::metrics::SESSIONS_STARTED.inc();
    debug!(session = id, phase = %SessionPhase::Connecting, target_addr = %target, "Connecting");

    let connecting = connect_target(target, settings);
    let result = match until_cancelled(cancel, SessionPhase::Connecting, connecting).await {
        Ok(Ok(stream)) => {
            let mut session = Session::new(id, stream);
            let outcome = session.drive(settings, cancel).await;
            session.close().await;
            outcome
        }
        Ok(Err(e)) | Err(e) => Err(e),
    };

    match &result {
        Ok(report) => {
            crate::metrics::SESSIONS_COMPLETED.inc();
            debug!(
                session = id,
                bytes_sent = report.bytes_sent,
                bytes_received = report.bytes_received,
                "Session done"
            );
        }
        Err(e) => {
            crate::metrics::SESSIONS_FAILED.inc();
            warn!(session = id, phase = %e.phase(), error = %e, "Session failed");
        }
    }
    result
}
