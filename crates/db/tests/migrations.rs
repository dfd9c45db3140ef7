use rusqlite::Connection;

#[test]
fn migrate_adds_synced_at_to_existing_store() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = dir.path().join("upgrade.sqlite");
    {
        let conn = Connection::open(&db_path).expect("open conn");
        let migration = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(migration).expect("migrate 0001");
        conn.execute(
            r#"
            INSERT INTO usage_entry (
              ts, route, source, model, input_tokens, output_tokens, total_tokens
            ) VALUES (
              '2025-03-01T00:00:00.000Z', 'route-a', 'src', 'gpt-4o', 10, 5, 15
            )
            "#,
            [],
        )
        .expect("insert entry");
    }

    let mut db = meter_db::Db::open(&db_path).expect("open db");
    db.migrate().expect("migrate db");
    db.migrate().expect("migrate db again");

    let conn = Connection::open(&db_path).expect("open conn");
    let synced_at: String = conn
        .query_row("SELECT synced_at FROM usage_entry", [], |row| row.get(0))
        .expect("synced_at");
    assert_eq!(synced_at, "");
    let mappings: i64 = conn
        .query_row("SELECT COUNT(*) FROM channel_mapping", [], |row| row.get(0))
        .expect("mapping table");
    assert_eq!(mappings, 0);
    assert_eq!(db.count_usage_entries(None).expect("count"), 1);
}
