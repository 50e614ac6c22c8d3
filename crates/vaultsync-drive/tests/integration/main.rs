//! Integration tests for vaultsync-drive
//!
//! Uses wiremock to simulate the files API and the token endpoint, and
//! verifies end-to-end behavior of the DriveRemoteStore: searches, folder
//! creation, uploads, downloads, batch deletes and the change feed.

mod common;

mod test_auth;
mod test_changes;
mod test_files;
mod test_search;
