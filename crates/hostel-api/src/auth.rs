use std::sync::Arc;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use hostel_db::models::{NewUser, UserRow};
use hostel_db::{Database, is_unique_violation};
use hostel_types::api::{
    AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
    ResetSuperAdminRequest, UserProfile,
};
use hostel_types::models::{Principal, Role};

use crate::error::{ApiError, run_blocking};
use crate::password::Passwords;
use crate::policy::{Action, authorize};
use crate::state::AppState;
use crate::token::TokenKeys;
use crate::validation::{check_password, is_valid_email, parse_id};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const SHORT_PASSWORD: &str = "Password must be at least 6 characters long";
const SHORT_NEW_PASSWORD: &str = "New password must be at least 6 characters long";

/// Input for creating any kind of account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub category_id: Option<Uuid>,
}

/// Accounts, credentials and session tokens.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<Database>,
    passwords: Arc<Passwords>,
    tokens: Arc<TokenKeys>,
    reset_key: Option<Arc<str>>,
}

impl AuthService {
    /// An empty or absent `reset_key` disables the break-glass reset.
    pub fn new(
        db: Arc<Database>,
        passwords: Passwords,
        tokens: TokenKeys,
        reset_key: Option<String>,
    ) -> Self {
        Self {
            db,
            passwords: Arc::new(passwords),
            tokens: Arc::new(tokens),
            reset_key: reset_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }

    pub fn tokens(&self) -> &TokenKeys {
        &self.tokens
    }

    pub fn passwords(&self) -> &Passwords {
        &self.passwords
    }

    /// Student self-registration.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
        let user = self
            .create_account(NewAccount {
                email: req.email,
                password: req.password,
                full_name: req.full_name,
                role: Role::Student,
                category_id: None,
            })
            .await?;

        let token = self
            .tokens
            .issue(user.id, &user.email, user.role, user.category_id)?;
        info!("Registered student {}", user.id);

        Ok(AuthResponse { token, user })
    }

    /// Creates an account of any role. Used by registration and provisioning.
    pub async fn create_account(&self, account: NewAccount) -> Result<UserProfile, ApiError> {
        let email = account.email.trim().to_lowercase();
        let full_name = account.full_name.trim().to_string();

        if email.is_empty() || account.password.is_empty() || full_name.is_empty() {
            return Err(ApiError::validation(
                "Email, password, and full name are required",
            ));
        }
        if !is_valid_email(&email) {
            return Err(ApiError::validation("Invalid email format"));
        }
        check_password(&account.password, SHORT_PASSWORD)?;

        let category_id = match (account.role, account.category_id) {
            (Role::Department, Some(id)) => Some(id),
            (Role::Department, None) => {
                return Err(ApiError::validation(
                    "Department accounts require a category",
                ));
            }
            (_, _) => None,
        };

        let db = self.db.clone();
        let passwords = self.passwords.clone();
        let role = account.role;
        let password = account.password;

        run_blocking(move || {
            if let Some(category_id) = category_id {
                if db.get_category(&category_id.to_string())?.is_none() {
                    return Err(ApiError::validation("Invalid category_id"));
                }
            }

            let password_hash = passwords.hash(&password)?;
            let id = Uuid::new_v4();
            let id_str = id.to_string();
            let category_str = category_id.map(|c| c.to_string());

            db.create_user(&NewUser {
                id: &id_str,
                email: &email,
                password_hash: &password_hash,
                full_name: &full_name,
                role: role.as_str(),
                category_id: category_str.as_deref(),
            })
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::conflict("Email already registered")
                } else {
                    ApiError::Internal(e)
                }
            })?;

            Ok(UserProfile {
                id,
                email,
                full_name,
                role,
                category_id,
            })
        })
        .await
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        let email = req.email.trim().to_lowercase();
        if email.is_empty() || req.password.is_empty() {
            return Err(ApiError::validation("Email and password are required"));
        }

        let db = self.db.clone();
        let passwords = self.passwords.clone();
        let password = req.password;

        let user = run_blocking(move || {
            let Some(row) = db.get_user_by_email(&email)? else {
                passwords.verify_dummy(&password);
                return Err(ApiError::auth(INVALID_CREDENTIALS));
            };
            if !passwords.verify(&password, &row.password_hash) {
                return Err(ApiError::auth(INVALID_CREDENTIALS));
            }
            Ok(profile(&row)?)
        })
        .await?;

        let token = self
            .tokens
            .issue(user.id, &user.email, user.role, user.category_id)?;
        info!("User {} logged in as {}", user.id, user.role);

        Ok(AuthResponse { token, user })
    }

    pub async fn list_departments(&self, caller: &Principal) -> Result<Vec<UserProfile>, ApiError> {
        authorize(Some(caller), Action::ListDepartments)?;

        let db = self.db.clone();
        run_blocking(move || {
            let rows = db.list_users_by_role(Role::Department.as_str())?;
            rows.iter()
                .map(|row| profile(row).map_err(ApiError::from))
                .collect()
        })
        .await
    }

    pub async fn change_password(
        &self,
        caller: &Principal,
        target_id: &str,
        new_password: String,
    ) -> Result<(), ApiError> {
        authorize(Some(caller), Action::ChangePassword)?;
        check_password(&new_password, SHORT_NEW_PASSWORD)?;

        let target = parse_id(target_id).ok_or_else(|| ApiError::not_found("User not found"))?;
        let db = self.db.clone();
        let passwords = self.passwords.clone();

        run_blocking(move || {
            let hash = passwords.hash(&new_password)?;
            if !db.update_password(&target.to_string(), &hash)? {
                return Err(ApiError::not_found("User not found"));
            }
            Ok(())
        })
        .await?;

        info!("Super admin {} changed password of user {}", caller.user_id(), target);
        Ok(())
    }

    /// Break-glass reset of every super_admin password, gated only by the
    /// shared reset key.
    pub async fn reset_super_admin_password(
        &self,
        reset_key: &str,
        new_password: String,
    ) -> Result<(), ApiError> {
        if reset_key.is_empty() || new_password.is_empty() {
            return Err(ApiError::validation("reset_key and new_password are required"));
        }

        let key_matches = self
            .reset_key
            .as_deref()
            .is_some_and(|expected| bool::from(expected.as_bytes().ct_eq(reset_key.as_bytes())));
        if !key_matches {
            warn!("Super admin reset attempted with an invalid key");
            return Err(ApiError::forbidden("Invalid reset key"));
        }

        check_password(&new_password, SHORT_NEW_PASSWORD)?;

        let db = self.db.clone();
        let passwords = self.passwords.clone();
        let updated = run_blocking(move || {
            let hash = passwords.hash(&new_password)?;
            let updated = db.update_super_admin_password(&hash)?;
            if updated == 0 {
                return Err(ApiError::not_found("Super admin user not found"));
            }
            Ok(updated)
        })
        .await?;

        warn!("Super admin password reset via reset key ({} account(s))", updated);
        Ok(())
    }
}

/// Public projection of a user row. Never carries the hash.
pub fn profile(row: &UserRow) -> anyhow::Result<UserProfile> {
    let id = row
        .id
        .parse()
        .with_context(|| format!("corrupt user id '{}'", row.id))?;
    let role: Role = row.role.parse()?;
    let category_id = row
        .category_id
        .as_deref()
        .map(str::parse)
        .transpose()
        .with_context(|| format!("corrupt category_id on user '{}'", row.id))?;

    Ok(UserProfile {
        id,
        email: row.email.clone(),
        full_name: row.full_name.clone(),
        role,
        category_id,
    })
}

// -- Handlers --

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.auth.login(req).await?;
    Ok(Json(response))
}

/// GET /auth/admin/departments
pub async fn list_departments(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let departments = state.auth.list_departments(&caller).await?;
    Ok(Json(departments))
}

/// PUT /auth/admin/users/{id}/password
pub async fn change_password(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Extension(caller): Extension<Principal>,
    WithRejection(Json(req), _): WithRejection<Json<ChangePasswordRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth
        .change_password(&caller, &user_id, req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password updated successfully".into(),
    }))
}

/// POST /auth/admin/reset-super
pub async fn reset_super_admin(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<ResetSuperAdminRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .auth
        .reset_super_admin_password(&req.reset_key, req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Super admin password reset successfully".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(reset_key: Option<&str>) -> AuthService {
        let db = Arc::new(Database::open_in_memory().unwrap());
        AuthService::new(
            db,
            Passwords::new(64, 1).unwrap(),
            TokenKeys::new("test-secret", chrono::Duration::hours(24)),
            reset_key.map(str::to_string),
        )
    }

    fn registration(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            full_name: "  Asha Rao ".into(),
        }
    }

    async fn super_admin(auth: &AuthService) -> Principal {
        let user = auth
            .create_account(NewAccount {
                email: "admin@hostel.com".into(),
                password: "admin123".into(),
                full_name: "Super Admin".into(),
                role: Role::SuperAdmin,
                category_id: None,
            })
            .await
            .unwrap();
        Principal::SuperAdmin { user_id: user.id }
    }

    fn stored_hash(auth: &AuthService, email: &str) -> String {
        auth.db.get_user_by_email(email).unwrap().unwrap().password_hash
    }

    #[tokio::test]
    async fn register_normalizes_and_hides_password() {
        let auth = service(None);
        let res = auth.register(registration("Asha@Hostel.COM", "hunter22")).await.unwrap();

        assert_eq!(res.user.email, "asha@hostel.com");
        assert_eq!(res.user.full_name, "Asha Rao");
        assert_eq!(res.user.role, Role::Student);
        assert_eq!(res.user.category_id, None);

        let json = serde_json::to_string(&res.user).unwrap();
        assert!(!json.contains("hunter22"));
        assert!(!json.contains("argon2"));
        assert!(!stored_hash(&auth, "asha@hostel.com").contains("hunter22"));

        let claims = auth.tokens().verify(&res.token).unwrap();
        assert_eq!(claims.sub, res.user.id);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let auth = service(None);

        let err = auth.register(registration("", "hunter22")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = auth.register(registration("not-an-email", "hunter22")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email format");

        let err = auth.register(registration("a@b.co", "12345")).await.unwrap_err();
        assert_eq!(err.to_string(), SHORT_PASSWORD);
    }

    #[tokio::test]
    async fn duplicate_email_in_any_case_conflicts() {
        let auth = service(None);
        auth.register(registration("asha@hostel.com", "hunter22")).await.unwrap();

        let err = auth
            .register(registration("ASHA@hostel.com", "hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[tokio::test]
    async fn login_does_not_reveal_which_part_was_wrong() {
        let auth = service(None);
        auth.register(registration("asha@hostel.com", "hunter22")).await.unwrap();

        let wrong_password = auth
            .login(LoginRequest { email: "asha@hostel.com".into(), password: "nope-nope".into() })
            .await
            .unwrap_err();
        let unknown_email = auth
            .login(LoginRequest { email: "ghost@hostel.com".into(), password: "hunter22".into() })
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, ApiError::Auth(_)));
        assert!(matches!(unknown_email, ApiError::Auth(_)));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());

        let ok = auth
            .login(LoginRequest { email: " ASHA@hostel.com ".into(), password: "hunter22".into() })
            .await
            .unwrap();
        assert_eq!(ok.user.email, "asha@hostel.com");
    }

    #[tokio::test]
    async fn department_login_embeds_category() {
        let auth = service(None);
        let plumbing = auth.db.get_category_by_name("Plumbing").unwrap().unwrap().id;
        let plumbing: Uuid = plumbing.parse().unwrap();

        auth.create_account(NewAccount {
            email: "plumbing@hostel.com".into(),
            password: "dept123".into(),
            full_name: "Plumbing Department".into(),
            role: Role::Department,
            category_id: Some(plumbing),
        })
        .await
        .unwrap();

        let res = auth
            .login(LoginRequest { email: "plumbing@hostel.com".into(), password: "dept123".into() })
            .await
            .unwrap();
        assert_eq!(
            auth.tokens().principal(&res.token).unwrap().category_id(),
            Some(plumbing)
        );
    }

    #[tokio::test]
    async fn department_account_needs_a_real_category() {
        let auth = service(None);
        let mut account = NewAccount {
            email: "x@hostel.com".into(),
            password: "dept123".into(),
            full_name: "X".into(),
            role: Role::Department,
            category_id: None,
        };
        assert!(matches!(
            auth.create_account(account.clone()).await,
            Err(ApiError::Validation(_))
        ));

        account.category_id = Some(Uuid::new_v4());
        assert_eq!(
            auth.create_account(account).await.unwrap_err().to_string(),
            "Invalid category_id"
        );
    }

    #[tokio::test]
    async fn only_super_admin_manages_accounts() {
        let auth = service(None);
        let student = auth.register(registration("asha@hostel.com", "hunter22")).await.unwrap();
        let as_student = Principal::Student { user_id: student.user.id };

        assert!(matches!(
            auth.list_departments(&as_student).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            auth.change_password(&as_student, &student.user.id.to_string(), "another1".into())
                .await,
            Err(ApiError::Forbidden(_))
        ));

        let admin = super_admin(&auth).await;
        assert!(auth.list_departments(&admin).await.unwrap().is_empty());

        auth.change_password(&admin, &student.user.id.to_string(), "another1".into())
            .await
            .unwrap();
        auth.login(LoginRequest { email: "asha@hostel.com".into(), password: "another1".into() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn change_password_checks_target_and_length() {
        let auth = service(None);
        let admin = super_admin(&auth).await;

        let err = auth
            .change_password(&admin, &Uuid::new_v4().to_string(), "another1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = auth
            .change_password(&admin, "not-a-uuid", "another1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = auth
            .change_password(&admin, &admin.user_id().to_string(), "short".into())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), SHORT_NEW_PASSWORD);
    }

    #[tokio::test]
    async fn reset_with_wrong_key_changes_nothing() {
        let auth = service(Some("break-glass"));
        super_admin(&auth).await;
        let before = stored_hash(&auth, "admin@hostel.com");

        let err = auth
            .reset_super_admin_password("guess", "newpass1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(stored_hash(&auth, "admin@hostel.com"), before);

        auth.reset_super_admin_password("break-glass", "newpass1".into())
            .await
            .unwrap();
        assert_ne!(stored_hash(&auth, "admin@hostel.com"), before);
    }

    #[tokio::test]
    async fn reset_is_disabled_without_a_configured_key() {
        let auth = service(Some(""));
        super_admin(&auth).await;
        let err = auth.reset_super_admin_password("x", "newpass1".into()).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[tokio::test]
    async fn reset_validates_password_and_needs_an_admin() {
        let auth = service(Some("break-glass"));

        let err = auth
            .reset_super_admin_password("break-glass", "short".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = auth
            .reset_super_admin_password("break-glass", "longenough".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
