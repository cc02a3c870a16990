//! File-backed credential store: atomic writes, permissions, missing files.

use cartsync_core::credential::credential_path_at;
use cartsync_core::{CredentialStore, FileCredentialStore};
use tempfile::TempDir;

#[test]
fn missing_file_means_not_connected() {
    let home = TempDir::new().expect("home");
    let store = FileCredentialStore::at(home.path());
    assert!(store.get().expect("get").is_none());
    assert!(!store.is_present());
}

#[test]
fn set_then_get_returns_trimmed_token() {
    let home = TempDir::new().expect("home");
    let store = FileCredentialStore::at(home.path());
    store.set("  abc123\n").expect("set");
    assert_eq!(store.get().expect("get").as_deref(), Some("abc123"));

    let tmp = credential_path_at(home.path()).with_file_name("credential.tmp");
    assert!(!tmp.exists(), "tmp file must be renamed away");
}

#[test]
fn clear_is_idempotent() {
    let home = TempDir::new().expect("home");
    let store = FileCredentialStore::at(home.path());
    store.set("abc").expect("set");
    store.clear().expect("first clear");
    store.clear().expect("second clear");
    assert!(!store.is_present());
}

#[test]
fn blank_file_reads_as_absent() {
    let home = TempDir::new().expect("home");
    let path = credential_path_at(home.path());
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, "   \n").expect("write");
    assert!(FileCredentialStore::at(home.path()).get().expect("get").is_none());
}

#[cfg(unix)]
#[test]
fn credential_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let home = TempDir::new().expect("home");
    let store = FileCredentialStore::at(home.path());
    store.set("secret").expect("set");
    let mode = std::fs::metadata(store.path()).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
