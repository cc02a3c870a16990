use std::io::{BufRead, BufReader, Lines, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cartsync_channel::ContextId;
use cartsync_core::{ConnectionStatus, ErrorPayload, ProgressSnapshot, SyncError, SyncOutcome};
use cartsync_sync::ObserverMessage;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

const COMMANDS: &[&str] = &[
    "status",
    "connect",
    "disconnect",
    "sync",
    "subscribe",
    "tab",
    "attach",
    "stop",
];

/// JSON newline-delimited request, tagged by `cmd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum DaemonRequest {
    Status,
    Connect {
        token: String,
    },
    Disconnect,
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_date: Option<String>,
    },
    /// The connection becomes a progress stream.
    Subscribe,
    /// Tab presence reported by the browser side.
    Tab {
        context: ContextId,
        open: bool,
    },
    /// The connection becomes the page-script channel for `context`.
    Attach {
        context: ContextId,
    },
    Stop,
}

impl DaemonRequest {
    /// Decode one request line. A well-formed request naming a command the
    /// daemon does not serve is [`SyncError::UnknownAction`].
    pub fn parse(line: &str) -> Result<Self, SyncError> {
        let value: Value = serde_json::from_str(line)
            .map_err(|e| SyncError::Protocol(format!("invalid request JSON: {e}")))?;
        let cmd = value
            .get("cmd")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::Protocol("request has no 'cmd'".to_string()))?
            .to_string();
        if !COMMANDS.contains(&cmd.as_str()) {
            return Err(SyncError::UnknownAction(cmd));
        }
        serde_json::from_value(value)
            .map_err(|e| SyncError::Protocol(format!("malformed '{cmd}' request: {e}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DaemonRequest::Status => "status",
            DaemonRequest::Connect { .. } => "connect",
            DaemonRequest::Disconnect => "disconnect",
            DaemonRequest::Sync { .. } => "sync",
            DaemonRequest::Subscribe => "subscribe",
            DaemonRequest::Tab { .. } => "tab",
            DaemonRequest::Attach { .. } => "attach",
            DaemonRequest::Stop => "stop",
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(err: &SyncError) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(err.to_payload()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client helpers
// ---------------------------------------------------------------------------

struct Session {
    socket: PathBuf,
    reader: BufReader<UnixStream>,
}

impl Session {
    fn open(home: &Path) -> Result<Self, DaemonError> {
        let socket = socket_path(home);
        if !socket.exists() {
            return Err(DaemonError::DaemonNotRunning { socket });
        }

        let stream = UnixStream::connect(&socket).map_err(|err| {
            if matches!(
                err.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
            ) {
                DaemonError::DaemonNotRunning {
                    socket: socket.clone(),
                }
            } else {
                io_err(&socket, err)
            }
        })?;

        Ok(Self {
            socket,
            reader: BufReader::new(stream),
        })
    }

    fn send(&mut self, request: &DaemonRequest) -> Result<(), DaemonError> {
        let payload = serde_json::to_string(request)?;
        let stream = self.reader.get_mut();
        stream
            .write_all(payload.as_bytes())
            .map_err(|e| io_err(&self.socket, e))?;
        stream.write_all(b"\n").map_err(|e| io_err(&self.socket, e))?;
        stream.flush().map_err(|e| io_err(&self.socket, e))
    }

    fn receive(&mut self) -> Result<DaemonResponse, DaemonError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| io_err(&self.socket, e))?;
        if read == 0 {
            return Err(DaemonError::Protocol(
                "daemon closed connection before responding".to_string(),
            ));
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

/// Send one JSON request to the daemon socket and return one response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    let mut session = Session::open(home)?;
    session.send(request)?;
    session.receive()
}

pub fn request_status(home: &Path) -> Result<ConnectionStatus, DaemonError> {
    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(home, &DaemonRequest::Status) {
            Ok(response) => return response_into(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_connect(home: &Path, token: &str) -> Result<ConnectionStatus, DaemonError> {
    let response = send_request(
        home,
        &DaemonRequest::Connect {
            token: token.to_string(),
        },
    )?;
    response_into(response)
}

pub fn request_disconnect(home: &Path) -> Result<(), DaemonError> {
    response_into_data(send_request(home, &DaemonRequest::Disconnect)?).map(|_| ())
}

/// Run a sync and wait for it to finish. Dates are ISO `YYYY-MM-DD`.
pub fn request_sync(
    home: &Path,
    start_date: Option<String>,
    end_date: Option<String>,
) -> Result<SyncOutcome, DaemonError> {
    let response = send_request(
        home,
        &DaemonRequest::Sync {
            start_date,
            end_date,
        },
    )?;
    response_into(response)
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    response_into_data(send_request(home, &DaemonRequest::Stop)?).map(|_| ())
}

/// Blocking iterator over progress snapshots; `None` marks the end of a run.
pub struct ProgressStream {
    socket: PathBuf,
    lines: Lines<BufReader<UnixStream>>,
}

impl Iterator for ProgressStream {
    type Item = Result<Option<ProgressSnapshot>, DaemonError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(err) => return Some(Err(io_err(&self.socket, err))),
        };
        Some(
            serde_json::from_str::<ObserverMessage>(&line)
                .map(|ObserverMessage::Progress { progress }| progress)
                .map_err(DaemonError::from),
        )
    }
}

/// Subscribe to progress. Returns once the daemon has acknowledged, so every
/// snapshot published afterwards is delivered.
pub fn subscribe_progress(home: &Path) -> Result<ProgressStream, DaemonError> {
    let mut session = Session::open(home)?;
    session.send(&DaemonRequest::Subscribe)?;
    response_into_data(session.receive()?)?;
    Ok(ProgressStream {
        socket: session.socket,
        lines: session.reader.lines(),
    })
}

fn response_into<T: DeserializeOwned>(response: DaemonResponse) -> Result<T, DaemonError> {
    Ok(serde_json::from_value(response_into_data(response)?)?)
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        match response.error {
            Some(payload) => Err(DaemonError::Rejected(payload)),
            None => Err(DaemonError::Protocol("unknown daemon error".to_string())),
        }
    }
}
