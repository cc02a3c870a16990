use std::path::{Path, PathBuf};

use cartsync_core::config::cartsync_root;

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    cartsync_root(home).join(DAEMON_SOCKET)
}
