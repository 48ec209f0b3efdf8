//! Accounts and categories created outside the HTTP surface: on startup and
//! from the command line.

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use uuid::Uuid;

use hostel_db::models::{DepartmentSeed, NewUser};
use hostel_db::{Database, is_unique_violation};
use hostel_types::api::UserProfile;
use hostel_types::models::Role;

use crate::auth::{AuthService, NewAccount};
use crate::error::ApiError;

/// Creates the super admin unless an account with that email exists.
/// Returns true when an account was created.
pub async fn ensure_super_admin(
    auth: &AuthService,
    db: &Database,
    email: &str,
    password: &str,
) -> Result<bool> {
    let email = email.trim().to_lowercase();
    if db.get_user_by_email(&email)?.is_some() {
        info!("Super admin {} already present", email);
        return Ok(false);
    }

    create_user(
        auth,
        NewAccount {
            email,
            password: password.to_string(),
            full_name: "Super Admin".into(),
            role: Role::SuperAdmin,
            category_id: None,
        },
    )
    .await?;
    Ok(true)
}

/// `Plumbing` -> `plumbing@hostel.com`, `Hostel Office` -> `hosteloffice@hostel.com`.
pub fn department_email(category: &str) -> String {
    let local: String = category
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    format!("{local}@hostel.com")
}

/// One department account per category. Existing department accounts keep
/// their password and are pointed at the category; an account of any other
/// role that already holds the email is left alone. Returns how many were
/// created.
pub fn ensure_department_accounts(auth: &AuthService, db: &Database, password: &str) -> Result<usize> {
    let hash = auth.passwords().hash(password)?;
    let mut created = 0;

    for category in db.list_categories()? {
        let email = department_email(&category.name);
        let id = Uuid::new_v4().to_string();
        let full_name = format!("{} Department", category.name);

        let seeded = db.upsert_department_user(&NewUser {
            id: &id,
            email: &email,
            password_hash: &hash,
            full_name: &full_name,
            role: Role::Department.as_str(),
            category_id: Some(&category.id),
        })?;

        match seeded {
            DepartmentSeed::Inserted => {
                info!("Created department account {} for {}", email, category.name);
                created += 1;
            }
            DepartmentSeed::Repointed => {}
            DepartmentSeed::Skipped => warn!(
                "{} belongs to a non-department account; {} has no department account",
                email, category.name
            ),
        }
    }

    Ok(created)
}

pub fn add_category(db: &Database, name: &str) -> Result<Uuid> {
    let name = name.trim();
    if name.is_empty() {
        bail!("category name must not be empty");
    }

    let id = Uuid::new_v4();
    db.create_category(&id.to_string(), name).map_err(|e| {
        if is_unique_violation(&e) {
            anyhow::anyhow!("category '{}' already exists", name)
        } else {
            e
        }
    })?;

    info!("Added category {} ({})", name, id);
    Ok(id)
}

/// Looks a category up by name for the command line.
pub fn category_id_by_name(db: &Database, name: &str) -> Result<Uuid> {
    let row = db
        .get_category_by_name(name.trim())?
        .with_context(|| format!("no category named '{}'", name.trim()))?;
    row.id
        .parse()
        .with_context(|| format!("corrupt category id '{}'", row.id))
}

/// Account creation with the API's validation, reported as `anyhow` errors.
pub async fn create_user(auth: &AuthService, account: NewAccount) -> Result<UserProfile> {
    let email = account.email.clone();
    let role = account.role;
    let user = auth.create_account(account).await.map_err(|e| match e {
        ApiError::Internal(inner) => inner,
        other => anyhow::anyhow!("{}", other),
    })?;

    info!("Created {} account {}", role, email.trim().to_lowercase());
    Ok(user)
}
