use super::{apply_file_settings, normalize_database_url, prepare_database_url, Settings};

use std::{
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
}

#[test]
fn keeps_memory_and_full_urls_untouched() {
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(
        normalize_database_url("sqlite:///var/lib/comments.db"),
        "sqlite:///var/lib/comments.db"
    );
}

#[test]
fn blank_database_url_falls_back_to_default() {
    assert_eq!(normalize_database_url("   "), Settings::default().database_url);
}

#[test]
fn file_settings_override_defaults() {
    let mut settings = Settings::default();
    apply_file_settings(
        &mut settings,
        "bind_addr = \"0.0.0.0:9000\"\ndatabase_url = \"sqlite://./x.db\"\nmax_body_bytes = 1024\n",
    );
    assert_eq!(settings.server_bind, "0.0.0.0:9000");
    assert_eq!(settings.database_url, "sqlite://./x.db");
    assert_eq!(settings.max_body_bytes, 1024);
}

#[test]
fn unparseable_file_settings_are_ignored() {
    let mut settings = Settings::default();
    apply_file_settings(&mut settings, "this is = = not toml");
    assert_eq!(settings.server_bind, Settings::default().server_bind);
}

#[test]
fn creates_parent_dir_for_sqlite_url() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();

    let temp_root = env::temp_dir().join(format!("post_comments_server_test_{suffix}"));
    let db_path = temp_root.join("data").join("test.db");

    prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(temp_root.join("data").exists());

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn prepared_database_url_creates_openable_sqlite_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();

    let temp_root = env::temp_dir().join(format!("post_comments_server_open_test_{suffix}"));
    let db_path = temp_root.join("nested").join("server.db");

    let prepared = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare");
    let storage = storage::Storage::new(&prepared).await.expect("open sqlite");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should be created: {}",
        db_path.display()
    );

    fs::remove_dir_all(temp_root).expect("cleanup");
}
