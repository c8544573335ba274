use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{Sqlite, SqliteConnection},
    Connection,
};
use tracing::info;

const CREATE_MESSAGES: &str = r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document TEXT NOT NULL,
        date TEXT NOT NULL
    )
"#;

/// Creates the database and the `messages` table if they do not exist yet.
///
/// Runs once at startup; inserts open their own connections afterwards.
pub async fn init_store(database_url: &str) -> Result<(), sqlx::Error> {
    if !Sqlite::database_exists(database_url).await? {
        info!("Creating message store at {}", database_url);
        Sqlite::create_database(database_url).await?;
    }

    let mut conn = SqliteConnection::connect(database_url).await?;
    let created = sqlx::query(CREATE_MESSAGES).execute(&mut conn).await;
    conn.close().await?;

    created.map(|_| ())
}
