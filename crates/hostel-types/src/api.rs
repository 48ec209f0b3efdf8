use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ComplaintStatus, Role};

// -- JWT Claims --

/// Session token claims. The category is only present for department
/// accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    pub exp: usize,
}

// -- Auth --

// Missing fields deserialize to empty strings so the handlers can answer with
// a specific validation message instead of a generic parse failure.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetSuperAdminRequest {
    pub reset_key: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Categories --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

// -- Complaints --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintResponse {
    pub id: Uuid,
    pub tracking_code: String,
    pub title: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub category_id: Uuid,
    pub category_name: String,
    pub hostel_name: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
    pub image_paths: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// What an anonymous visitor sees when tracking a complaint by its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicComplaintResponse {
    pub tracking_code: String,
    pub title: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub category_name: String,
    pub hostel_name: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ComplaintResponse> for PublicComplaintResponse {
    fn from(c: ComplaintResponse) -> Self {
        Self {
            tracking_code: c.tracking_code,
            title: c.title,
            description: c.description,
            status: c.status,
            category_name: c.category_name,
            hostel_name: c.hostel_name,
            block: c.block,
            room_number: c.room_number,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// The status arrives as a raw string so an unknown value can be reported
/// with the list of accepted ones.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComplaintListQuery {
    pub category_id: Option<String>,
}
