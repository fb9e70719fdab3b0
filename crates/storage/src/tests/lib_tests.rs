use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn missing_key_reads_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(storage.get("theme").await.expect("get"), None);
}

#[tokio::test]
async fn set_overwrites_previous_value() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("theme", "light").await.expect("set light");
    storage.set("theme", "dark").await.expect("set dark");
    assert_eq!(
        storage.get("theme").await.expect("get").as_deref(),
        Some("dark")
    );
}

#[tokio::test]
async fn remove_reports_whether_a_value_existed() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("auth.session", "{}").await.expect("set");
    assert!(storage.remove("auth.session").await.expect("remove"));
    assert!(!storage.remove("auth.session").await.expect("remove again"));
    assert_eq!(storage.get("auth.session").await.expect("get"), None);
}

#[tokio::test]
async fn json_values_round_trip_and_reject_garbage() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .set_json("counts", &vec![1_u32, 2, 3])
        .await
        .expect("set json");
    let counts: Option<Vec<u32>> = storage.get_json("counts").await.expect("get json");
    assert_eq!(counts, Some(vec![1, 2, 3]));

    storage.set("broken", "{not json").await.expect("set raw");
    let err = storage
        .get_json::<Vec<u32>>("broken")
        .await
        .expect_err("garbage should not decode");
    assert!(err.to_string().contains("broken"));
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("prefs.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn sqlite_path_ignores_memory_and_query_suffix() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(sqlite_path("postgres://db"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/prefs.db?mode=rwc"),
        Some(PathBuf::from("./data/prefs.db"))
    );
}
