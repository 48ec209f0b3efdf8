use crate::Database;
use crate::models::{CategoryRow, ComplaintRow, DepartmentSeed, NewComplaint, NewUser, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, category_id, created_at";

const COMPLAINT_SELECT: &str = "
    SELECT c.id, c.tracking_code, c.title, c.description, c.status, c.user_id,
           c.category_id, cat.name, c.hostel_name, c.block, c.room_number,
           c.image_paths, c.created_at, c.updated_at
    FROM complaints c
    JOIN categories cat ON c.category_id = cat.id";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, full_name, role, category_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.email,
                    user.password_hash,
                    user.full_name,
                    user.role,
                    user.category_id
                ],
            )?;
            Ok(())
        })
    }

    /// Inserts a department account. An existing department account with the
    /// same email is re-pointed at `category_id` and keeps its password; any
    /// other account holding that email is never touched.
    pub fn upsert_department_user(&self, user: &NewUser<'_>) -> Result<DepartmentSeed> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let outcome = match query_user(&tx, "email", user.email)? {
                None => {
                    tx.execute(
                        "INSERT INTO users (id, email, password_hash, full_name, role, category_id)
                         VALUES (?1, ?2, ?3, ?4, 'department', ?5)",
                        rusqlite::params![
                            user.id,
                            user.email,
                            user.password_hash,
                            user.full_name,
                            user.category_id
                        ],
                    )?;
                    DepartmentSeed::Inserted
                }
                Some(existing) if existing.role == "department" => {
                    tx.execute(
                        "UPDATE users SET category_id = ?1 WHERE id = ?2 AND role = 'department'",
                        (user.category_id, &existing.id),
                    )?;
                    DepartmentSeed::Repointed
                }
                Some(_) => DepartmentSeed::Skipped,
            };
            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn list_users_by_role(&self, role: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY email"
            ))?;
            let rows = stmt
                .query_map([role], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when no user has that id.
    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                (password_hash, id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Updates every super_admin account. Returns the number of rows touched.
    pub fn update_super_admin_password(&self, password_hash: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET password_hash = ?1 WHERE role = 'super_admin'",
                [password_hash],
            )?;
            Ok(changed)
        })
    }

    // -- Categories --

    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CategoryRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_category(&self, id: &str) -> Result<Option<CategoryRow>> {
        self.with_conn(|conn| query_category(conn, "id", id))
    }

    pub fn get_category_by_name(&self, name: &str) -> Result<Option<CategoryRow>> {
        self.with_conn(|conn| query_category(conn, "name", name))
    }

    pub fn create_category(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO categories (id, name) VALUES (?1, ?2)",
                (id, name),
            )?;
            Ok(())
        })
    }

    // -- Complaints --

    pub fn insert_complaint(&self, complaint: &NewComplaint<'_>) -> Result<()> {
        let image_paths = serde_json::to_string(complaint.image_paths)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO complaints (
                     id, tracking_code, title, description, status, user_id, category_id,
                     hostel_name, block, room_number, image_paths, created_at, updated_at
                 )
                 VALUES (?1, ?2, ?3, ?4, 'pending', NULL, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                rusqlite::params![
                    complaint.id,
                    complaint.tracking_code,
                    complaint.title,
                    complaint.description,
                    complaint.category_id,
                    complaint.hostel_name,
                    complaint.block,
                    complaint.room_number,
                    image_paths,
                    complaint.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_complaint(&self, id: &str) -> Result<Option<ComplaintRow>> {
        self.with_conn(|conn| query_complaint(conn, "c.id", id))
    }

    pub fn get_complaint_by_tracking_code(&self, code: &str) -> Result<Option<ComplaintRow>> {
        self.with_conn(|conn| query_complaint(conn, "c.tracking_code", code))
    }

    /// Newest first. `category_id` narrows the list to one category.
    pub fn list_complaints(&self, category_id: Option<&str>) -> Result<Vec<ComplaintRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMPLAINT_SELECT}
                 WHERE ?1 IS NULL OR c.category_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([category_id], map_complaint)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Moves a complaint from `expected` to `status`. Returns false when the
    /// complaint does not exist or is no longer in `expected`.
    pub fn update_complaint_status(
        &self,
        id: &str,
        expected: &str,
        status: &str,
        updated_at: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE complaints SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
                (status, updated_at, id, expected),
            )?;
            Ok(changed > 0)
        })
    }
}

// `column` is always one of the literals above, never caller input.

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"
    ))?;
    let row = stmt.query_row([value], map_user).optional()?;
    Ok(row)
}

fn query_category(conn: &Connection, column: &str, value: &str) -> Result<Option<CategoryRow>> {
    let mut stmt = conn.prepare(&format!("SELECT id, name FROM categories WHERE {column} = ?1"))?;
    let row = stmt
        .query_row([value], |row| {
            Ok(CategoryRow {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn query_complaint(conn: &Connection, column: &str, value: &str) -> Result<Option<ComplaintRow>> {
    let mut stmt = conn.prepare(&format!("{COMPLAINT_SELECT} WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], map_complaint).optional()?;
    Ok(row)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        full_name: row.get(3)?,
        role: row.get(4)?,
        category_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_complaint(row: &Row<'_>) -> rusqlite::Result<ComplaintRow> {
    let image_paths: String = row.get(11)?;
    let image_paths = serde_json::from_str(&image_paths).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ComplaintRow {
        id: row.get(0)?,
        tracking_code: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        user_id: row.get(5)?,
        category_id: row.get(6)?,
        category_name: row.get(7)?,
        hostel_name: row.get(8)?,
        block: row.get(9)?,
        room_number: row.get(10)?,
        image_paths,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
