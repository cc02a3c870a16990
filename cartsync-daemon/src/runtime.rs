use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::{self, error::RecvError};

use cartsync_channel::{ContextId, RemoteChannel, ResponseEnvelope, TabRegistry};
use cartsync_client::ReqwestTransport;
use cartsync_core::config::cartsync_root;
use cartsync_core::{Config, FileCredentialStore, ProgressSnapshot, SyncError};
use cartsync_sync::{ChannelRetailer, Coordinator, ObserverMessage};

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse};

/// Set to `json` for machine-readable daemon logs.
pub const LOG_FORMAT_ENV: &str = "CARTSYNC_LOG_FORMAT";

type RequestLines = Lines<BufReader<OwnedReadHalf>>;

/// Everything a socket client can reach.
struct Services {
    coordinator: Coordinator,
    channel: Arc<RemoteChannel>,
    tabs: Arc<TabRegistry>,
}

impl Services {
    fn build(home: &Path) -> Result<Self, DaemonError> {
        let config = Config::load_at(home)?;
        tracing::info!(inventory_url = %config.inventory_url, "configuration loaded");

        let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);
        let credentials = Arc::new(FileCredentialStore::at(home));
        let tabs = Arc::new(TabRegistry::new());
        let channel = Arc::new(RemoteChannel::new(tabs.clone(), config.channel_timeout()));
        let retailer = Arc::new(ChannelRetailer::new(channel.clone()));
        let coordinator = Coordinator::new(config, credentials, transport, retailer, tabs.clone());

        Ok(Self {
            coordinator,
            channel,
            tabs,
        })
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon until ctrl-c or a `stop` request.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let services = Arc::new(Services::build(&home)?);

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = socket_server_task(home, services, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    services: Arc<Services>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let services = services.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, services, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    services: Arc<Services>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match DaemonRequest::parse(&line) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(kind = err.kind(), error = %err, "rejected daemon request");
                write_line(&mut writer, &DaemonResponse::error(&err)).await?;
                continue;
            }
        };
        tracing::debug!(cmd = request.name(), "daemon request");

        let response = match request {
            DaemonRequest::Status => respond(Ok(services.coordinator.get_status().await)),
            DaemonRequest::Connect { token } => respond(services.coordinator.connect(&token).await),
            DaemonRequest::Disconnect => respond(
                services
                    .coordinator
                    .disconnect()
                    .map(|()| json!({ "connected": false })),
            ),
            DaemonRequest::Sync {
                start_date,
                end_date,
            } => respond(
                services
                    .coordinator
                    .start_sync(start_date.as_deref(), end_date.as_deref())
                    .await,
            ),
            DaemonRequest::Tab { context, open } => {
                if open {
                    services.tabs.open(context);
                } else {
                    services.tabs.close(&context);
                }
                respond(Ok(json!({ "tabs": services.tabs.open_tabs() })))
            }
            DaemonRequest::Subscribe => {
                let rx = services.coordinator.subscribe();
                write_line(&mut writer, &DaemonResponse::ok(json!({ "subscribed": true }))).await?;
                stream_progress(rx, lines, writer).await;
                return Ok(());
            }
            DaemonRequest::Attach { context } => {
                write_line(&mut writer, &DaemonResponse::ok(json!({ "attached": context }))).await?;
                return serve_retailer_connection(&services.channel, context, lines, writer).await;
            }
            DaemonRequest::Stop => {
                write_line(&mut writer, &DaemonResponse::ok(json!({ "stopping": true }))).await?;
                let _ = shutdown_tx.send(());
                break;
            }
        };

        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

fn respond<T: Serialize>(result: Result<T, SyncError>) -> DaemonResponse {
    match result.and_then(|data| serde_json::to_value(data).map_err(SyncError::from)) {
        Ok(data) => DaemonResponse::ok(data),
        Err(err) => DaemonResponse::error(&err),
    }
}

/// Forward progress to one observer until it hangs up or the publisher goes away.
async fn stream_progress(
    mut rx: broadcast::Receiver<Option<ProgressSnapshot>>,
    mut lines: RequestLines,
    mut writer: OwnedWriteHalf,
) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(progress) => {
                    if let Err(err) = write_line(&mut writer, &ObserverMessage::Progress { progress }).await {
                        tracing::debug!(error = %err, "progress observer went away");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress observer lagging, snapshots dropped");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            },
        }
    }
}

/// Relay channel requests to the page script attached on this connection and
/// hand its replies back until it disconnects or is replaced.
async fn serve_retailer_connection(
    channel: &RemoteChannel,
    context: ContextId,
    mut lines: RequestLines,
    mut writer: OwnedWriteHalf,
) -> Result<(), DaemonError> {
    let (lease, mut outbound) = channel.register(context);

    let result = loop {
        tokio::select! {
            request = outbound.recv() => {
                let Some(request) = request else { break Ok(()) };
                if let Err(err) = write_line(&mut writer, &request).await {
                    break Err(err);
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ResponseEnvelope>(&line) {
                        Ok(response) => channel.deliver(&lease, response),
                        Err(err) => tracing::warn!(
                            context = %lease.context(),
                            error = %err,
                            "malformed page script reply",
                        ),
                    }
                }
                Ok(None) => break Ok(()),
                Err(err) => break Err(io_err("daemon socket read", err)),
            },
        }
    };

    channel.disconnect(&lease);
    result
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = cartsync_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(message)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber. `RUST_LOG` filters (default `info`);
/// `CARTSYNC_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let _ = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

/// Status payload used when the daemon cannot be reached.
pub fn not_running_payload(home: &Path) -> Value {
    json!({
        "running": false,
        "socket": socket_path(home).display().to_string(),
    })
}
