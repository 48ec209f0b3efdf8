/// Database row types. These map directly to SQLite rows and stay stringly
/// typed; conversion into domain types happens in hostel-api.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub category_id: Option<String>,
    pub created_at: String,
}

pub struct CategoryRow {
    pub id: String,
    pub name: String,
}

/// A complaint joined with its category name.
pub struct ComplaintRow {
    pub id: String,
    pub tracking_code: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub user_id: Option<String>,
    pub category_id: String,
    pub category_name: String,
    pub hostel_name: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
    pub image_paths: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role: &'a str,
    pub category_id: Option<&'a str>,
}

/// What seeding a department account did to the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartmentSeed {
    Inserted,
    /// An existing department account now points at the category.
    Repointed,
    /// The email belongs to a non-department account, which was left as is.
    Skipped,
}

pub struct NewComplaint<'a> {
    pub id: &'a str,
    pub tracking_code: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub category_id: &'a str,
    pub hostel_name: Option<&'a str>,
    pub block: Option<&'a str>,
    pub room_number: Option<&'a str>,
    pub image_paths: &'a [String],
    pub created_at: &'a str,
}
