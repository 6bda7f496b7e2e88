/// SQLite database bootstrap and schema migrations
///
/// Opens the connection pool and applies versioned migrations tracked in the
/// `schema_migrations` table. Each migration runs once, inside its own transaction.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// A single schema migration
#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

/// Ordered list of schema migrations
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_core_tables",
        statements: &[
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                login TEXT NOT NULL UNIQUE,
                firstname TEXT NOT NULL DEFAULT '',
                lastname TEXT NOT NULL DEFAULT '',
                admin INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active'
            )
            "#,
            r#"
            CREATE TABLE groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE group_users (
                group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (group_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                builtin INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE role_permissions (
                role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
                permission TEXT NOT NULL,
                PRIMARY KEY (role_id, permission)
            )
            "#,
            r#"
            CREATE TABLE projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                created_on TEXT NOT NULL,
                updated_on TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE members (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                created_on TEXT NOT NULL,
                UNIQUE (user_id, project_id)
            )
            "#,
            r#"
            CREATE TABLE member_roles (
                member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
                PRIMARY KEY (member_id, role_id)
            )
            "#,
        ],
    },
    Migration {
        version: 2,
        name: "add_project_manager_to_projects",
        statements: &[
            "ALTER TABLE projects ADD COLUMN project_manager_id INTEGER REFERENCES users(id)",
            "CREATE INDEX idx_projects_project_manager_id ON projects(project_manager_id)",
        ],
    },
];

/// Handle to the service database
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file and apply pending migrations
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory '{}'", parent.display()))?;
            }
        }

        tracing::info!("🗄️ Opening database: {}", path);

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        let database = Self { pool };
        database.migrate().await?;
        Ok(database)
    }

    /// Private in-memory database, used by tests and throwaway runs
    ///
    /// Each call gets a fresh database. The pool is pinned to one long-lived
    /// connection so the database is never dropped while the handle is alive.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Self { pool };
        database.migrate().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration newer than the recorded schema version
    ///
    /// Safe to call multiple times.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let current = self.schema_version().await?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let mut tx = self.pool.begin().await?;
            for statement in migration.statements {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Migration {:03}_{} failed", migration.version, migration.name))?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::info!("✅ Applied migration {:03}_{}", migration.version, migration.name);
        }

        Ok(())
    }

    /// Highest applied migration version (0 for a fresh database)
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(version.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_apply_once() {
        let db = Database::in_memory().await.unwrap();
        let latest = MIGRATIONS.last().map(|m| m.version).unwrap();
        assert_eq!(db.schema_version().await.unwrap(), latest);

        db.migrate().await.unwrap();
        let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn project_manager_column_is_optional() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO projects (identifier, name, created_on, updated_on) VALUES ('p', 'P', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let manager: Option<i64> = sqlx::query_scalar("SELECT project_manager_id FROM projects WHERE identifier = 'p'")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(manager, None);
    }

    #[tokio::test]
    async fn project_manager_must_reference_a_user() {
        let db = Database::in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO projects (identifier, name, created_on, updated_on, project_manager_id) VALUES ('p', 'P', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z', 42)",
        )
        .execute(db.pool())
        .await;
        assert!(result.is_err());
    }
}
