use rusqlite::Connection;
use surveyhub_core::db::migrations::latest_version;
use surveyhub_core::db::{open_db, open_db_in_memory, DbError, DEFAULT_ADMIN_USERNAME};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "Governorates",
        "HealthAdministrations",
        "Users",
        "Surveys",
        "Survey_Fields",
        "Responses",
        "Response_Details",
        "GovernorateAdmins",
        "UserSurveys",
        "SurveyGovernorate",
        "AuditLog",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn bootstrap_seeds_exactly_one_admin() {
    let conn = open_db_in_memory().unwrap();

    let (count, username): (i64, String) = conn
        .query_row(
            "SELECT COUNT(*), MAX(username) FROM Users WHERE role = 'admin';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(username, DEFAULT_ADMIN_USERNAME);

    let hash: String = conn
        .query_row(
            "SELECT password_hash FROM Users WHERE username = ?1;",
            [DEFAULT_ADMIN_USERNAME],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hash.len(), 64);
}

#[test]
fn reopening_same_database_is_idempotent_and_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("surveyhub.db");

    {
        let conn = open_db(&path).unwrap();
        assert_eq!(schema_version(&conn), latest_version());
        conn.execute(
            "INSERT INTO Governorates (governorate_name) VALUES ('Cairo');",
            [],
        )
        .unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());

    // Still exactly one seeded admin, and prior data survived the restart.
    let admins: i64 = conn
        .query_row("SELECT COUNT(*) FROM Users WHERE role = 'admin';", [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(admins, 1);
    let governorates: i64 = conn
        .query_row("SELECT COUNT(*) FROM Governorates;", [], |r| r.get(0))
        .unwrap();
    assert_eq!(governorates, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();

    let err = conn
        .execute(
            "INSERT INTO HealthAdministrations (admin_name, governorate_id)
             VALUES ('Orphan', 4242);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
