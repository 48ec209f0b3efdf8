//! Append-only schema history.
//!
//! Each migration is a list of steps that are safe to apply more than once:
//! tables and indexes use `IF NOT EXISTS`, columns are added only when
//! missing, enum values are rows in a lookup table inserted with
//! `OR IGNORE`. A migration runs inside one transaction and is recorded in
//! `schema_migrations`. There are no down-migrations.

use anyhow::Result;
use rusqlite::{Connection, Transaction};
use tracing::info;
use uuid::Uuid;

/// Categories every fresh database starts with.
pub const DEFAULT_CATEGORIES: [&str; 7] = [
    "Electrical",
    "Plumbing",
    "Carpentry",
    "Cleaning",
    "Security",
    "Internet",
    "Other",
];

pub enum Step {
    /// Raw SQL. Must be idempotent on its own.
    Sql(&'static str),
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
    /// SQLite has no enum types; each enum is a single-column lookup table
    /// referenced by foreign key.
    AddEnumValue {
        enum_table: &'static str,
        value: &'static str,
    },
    Seed(fn(&Transaction<'_>) -> Result<()>),
}

pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub steps: &'static [Step],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial schema",
        steps: &[
            Step::Sql(
                "
                CREATE TABLE IF NOT EXISTS user_roles (name TEXT PRIMARY KEY);
                CREATE TABLE IF NOT EXISTS complaint_statuses (name TEXT PRIMARY KEY);
                ",
            ),
            Step::AddEnumValue { enum_table: "user_roles", value: "student" },
            Step::AddEnumValue { enum_table: "user_roles", value: "warden" },
            Step::AddEnumValue { enum_table: "user_roles", value: "super_admin" },
            Step::AddEnumValue { enum_table: "complaint_statuses", value: "pending" },
            Step::AddEnumValue { enum_table: "complaint_statuses", value: "resolved" },
            Step::Sql(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id              TEXT PRIMARY KEY,
                    email           TEXT NOT NULL UNIQUE,
                    password_hash   TEXT NOT NULL,
                    full_name       TEXT NOT NULL,
                    role            TEXT NOT NULL DEFAULT 'student' REFERENCES user_roles(name),
                    created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );

                CREATE TABLE IF NOT EXISTS categories (
                    id          TEXT PRIMARY KEY,
                    name        TEXT NOT NULL UNIQUE,
                    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                );

                CREATE TABLE IF NOT EXISTS complaints (
                    id          TEXT PRIMARY KEY,
                    title       TEXT NOT NULL,
                    description TEXT NOT NULL,
                    status      TEXT NOT NULL DEFAULT 'pending' REFERENCES complaint_statuses(name),
                    user_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
                    category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE RESTRICT,
                    created_at  TEXT NOT NULL,
                    updated_at  TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_complaints_user_id ON complaints(user_id);
                CREATE INDEX IF NOT EXISTS idx_complaints_category_id ON complaints(category_id);
                CREATE INDEX IF NOT EXISTS idx_complaints_status ON complaints(status);
                ",
            ),
            Step::Seed(seed_default_categories),
        ],
    },
    Migration {
        version: 2,
        name: "department accounts",
        steps: &[
            Step::AddEnumValue { enum_table: "user_roles", value: "department" },
            Step::AddColumn {
                table: "users",
                column: "category_id",
                definition: "TEXT REFERENCES categories(id) ON DELETE SET NULL",
            },
            Step::Sql("CREATE INDEX IF NOT EXISTS idx_users_category_id ON users(category_id);"),
        ],
    },
    Migration {
        version: 3,
        name: "complaint location and images",
        steps: &[
            Step::AddColumn { table: "complaints", column: "hostel_name", definition: "TEXT" },
            Step::AddColumn { table: "complaints", column: "block", definition: "TEXT" },
            Step::AddColumn { table: "complaints", column: "room_number", definition: "TEXT" },
            Step::AddColumn {
                table: "complaints",
                column: "image_paths",
                definition: "TEXT NOT NULL DEFAULT '[]'",
            },
        ],
    },
    Migration {
        version: 4,
        name: "inprogress status",
        steps: &[Step::AddEnumValue { enum_table: "complaint_statuses", value: "inprogress" }],
    },
    Migration {
        version: 5,
        name: "tracking codes",
        steps: &[
            Step::AddColumn { table: "complaints", column: "tracking_code", definition: "TEXT" },
            // Random 6-digit codes; collisions are unlikely at hostel scale.
            Step::Sql(
                "
                UPDATE complaints
                SET tracking_code = printf('%06d', abs(random()) % 1000000)
                WHERE tracking_code IS NULL;

                CREATE UNIQUE INDEX IF NOT EXISTS idx_complaints_tracking_code
                    ON complaints(tracking_code);
                ",
            ),
        ],
    },
    Migration {
        version: 6,
        name: "rejected status",
        steps: &[Step::AddEnumValue { enum_table: "complaint_statuses", value: "rejected" }],
    },
];

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            name        TEXT NOT NULL,
            applied_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );",
    )?;

    let current: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!("Running migration v{} ({})", migration.version, migration.name);
        apply(conn, migration)?;
    }

    info!("Database migrations complete");
    Ok(())
}

/// Applies one migration regardless of what `schema_migrations` says.
pub fn apply(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction()?;
    for step in migration.steps {
        apply_step(&tx, step)?;
    }
    tx.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (?1, ?2)",
        (migration.version, migration.name),
    )?;
    tx.commit()?;
    Ok(())
}

fn apply_step(tx: &Transaction<'_>, step: &Step) -> Result<()> {
    match step {
        Step::Sql(sql) => tx.execute_batch(sql)?,
        Step::AddColumn {
            table,
            column,
            definition,
        } => {
            if !column_exists(tx, table, column)? {
                tx.execute_batch(&format!(
                    "ALTER TABLE {table} ADD COLUMN {column} {definition};"
                ))?;
            }
        }
        Step::AddEnumValue { enum_table, value } => {
            tx.execute(
                &format!("INSERT OR IGNORE INTO {enum_table} (name) VALUES (?1)"),
                [value],
            )?;
        }
        Step::Seed(seed) => seed(tx)?,
    }
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        (table, column),
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

fn seed_default_categories(tx: &Transaction<'_>) -> Result<()> {
    for name in DEFAULT_CATEGORIES {
        tx.execute(
            "INSERT OR IGNORE INTO categories (id, name) VALUES (?1, ?2)",
            (Uuid::new_v4().to_string(), name),
        )?;
    }
    Ok(())
}
