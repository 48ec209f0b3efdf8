use std::sync::Arc;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use hostel_db::models::{ComplaintRow, NewComplaint};
use hostel_db::{Database, is_unique_violation};
use hostel_types::api::{
    ComplaintListQuery, ComplaintResponse, PublicComplaintResponse, UpdateStatusRequest,
};
use hostel_types::models::{ComplaintStatus, Principal};

use crate::error::{ApiError, run_blocking};
use crate::policy::{Access, Action, Denial, authorize};
use crate::state::AppState;
use crate::storage::ImageStore;
use crate::validation::{non_blank, parse_id};

pub const MAX_IMAGES: usize = 3;
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Fresh codes drawn before giving up on a unique collision.
const TRACKING_CODE_ATTEMPTS: usize = 8;

const NOT_FOUND: &str = "Complaint not found";
const NOT_FOUND_OR_DENIED: &str = "Complaint not found or access denied";

/// One uploaded photo, fully buffered.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// A public submission as it arrives from the form.
#[derive(Debug, Default, Clone)]
pub struct ComplaintForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub hostel_name: Option<String>,
    pub block: Option<String>,
    pub room_number: Option<String>,
    pub images: Vec<Upload>,
}

#[derive(Clone)]
pub struct ComplaintService {
    db: Arc<Database>,
    images: Arc<ImageStore>,
}

impl ComplaintService {
    pub fn new(db: Arc<Database>, images: ImageStore) -> Self {
        Self {
            db,
            images: Arc::new(images),
        }
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Public submission. Images are on disk before the row is written, and
    /// are removed again if the row never lands.
    pub async fn create(&self, form: ComplaintForm) -> Result<ComplaintResponse, ApiError> {
        authorize(None, Action::SubmitComplaint)?;

        let (Some(title), Some(description), Some(category)) = (
            non_blank(form.title.as_deref()),
            non_blank(form.description.as_deref()),
            non_blank(form.category_id.as_deref()),
        ) else {
            return Err(ApiError::validation(
                "Title, description, and category_id are required",
            ));
        };

        if form.images.len() > MAX_IMAGES {
            return Err(ApiError::validation(format!(
                "At most {MAX_IMAGES} images can be attached"
            )));
        }
        if form.images.iter().any(|img| img.data.len() > MAX_IMAGE_BYTES) {
            return Err(ApiError::validation("Each image must be at most 5 MB"));
        }

        let category_id = parse_id(&category)
            .ok_or_else(|| ApiError::validation("Invalid category_id"))?
            .to_string();
        let db = self.db.clone();
        let cid = category_id.clone();
        let known = run_blocking(move || Ok(db.get_category(&cid)?.is_some())).await?;
        if !known {
            return Err(ApiError::validation("Invalid category_id"));
        }

        let mut image_paths = Vec::new();
        for image in form.images.iter().filter(|img| !img.data.is_empty()) {
            match self.images.save(image.file_name.as_deref(), &image.data).await {
                Ok(path) => image_paths.push(path),
                Err(e) => {
                    self.images.discard(&image_paths).await;
                    return Err(ApiError::Internal(e.context("failed to store complaint image")));
                }
            }
        }

        let hostel_name = non_blank(form.hostel_name.as_deref());
        let block = non_blank(form.block.as_deref());
        let room_number = non_blank(form.room_number.as_deref());

        let db = self.db.clone();
        let paths = image_paths.clone();
        let inserted = run_blocking(move || {
            let id = Uuid::new_v4().to_string();
            let created_at = timestamp(now());

            for attempt in 1..=TRACKING_CODE_ATTEMPTS {
                let code = tracking_code();
                let result = db.insert_complaint(&NewComplaint {
                    id: &id,
                    tracking_code: &code,
                    title: &title,
                    description: &description,
                    category_id: &category_id,
                    hostel_name: hostel_name.as_deref(),
                    block: block.as_deref(),
                    room_number: room_number.as_deref(),
                    image_paths: &paths,
                    created_at: &created_at,
                });

                match result {
                    Ok(()) => {
                        let row = db
                            .get_complaint(&id)?
                            .context("complaint vanished after insert")?;
                        return Ok(response(row)?);
                    }
                    Err(e) if is_unique_violation(&e) => {
                        warn!("Tracking code collision on attempt {}", attempt);
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            Err(ApiError::Internal(anyhow::anyhow!(
                "no free tracking code after {TRACKING_CODE_ATTEMPTS} attempts"
            )))
        })
        .await;

        match inserted {
            Ok(complaint) => {
                info!(
                    "Complaint {} filed under {} with {} image(s)",
                    complaint.tracking_code,
                    complaint.category_name,
                    complaint.image_paths.len()
                );
                Ok(complaint)
            }
            Err(e) => {
                self.images.discard(&image_paths).await;
                Err(e)
            }
        }
    }

    /// Newest first, narrowed to what the caller may see.
    pub async fn list(
        &self,
        caller: &Principal,
        category_filter: Option<&str>,
    ) -> Result<Vec<ComplaintResponse>, ApiError> {
        let filter = match authorize(Some(caller), Action::ListComplaints)? {
            Access::Category(own) => Some(own.to_string()),
            Access::Unrestricted => match non_blank(category_filter) {
                Some(raw) => Some(
                    parse_id(&raw)
                        .ok_or_else(|| ApiError::validation("Invalid category_id"))?
                        .to_string(),
                ),
                None => None,
            },
        };

        let db = self.db.clone();
        run_blocking(move || {
            db.list_complaints(filter.as_deref())?
                .into_iter()
                .map(|row| response(row).map_err(ApiError::from))
                .collect()
        })
        .await
    }

    pub async fn get_by_id(
        &self,
        caller: &Principal,
        id: &str,
    ) -> Result<ComplaintResponse, ApiError> {
        let id = parse_id(id).ok_or_else(|| ApiError::not_found(NOT_FOUND))?;
        let complaint = self
            .fetch(id)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

        authorize(Some(caller), Action::ReadComplaint(complaint.category_id))?;
        Ok(complaint)
    }

    /// Anonymous lookup by tracking code.
    pub async fn track(&self, tracking_code: &str) -> Result<PublicComplaintResponse, ApiError> {
        authorize(None, Action::TrackComplaint)?;

        let code = tracking_code.trim().to_string();
        let db = self.db.clone();
        let row = run_blocking(move || Ok(db.get_complaint_by_tracking_code(&code)?)).await?;
        let row = row.ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

        Ok(response(row)?.into())
    }

    pub async fn update_status(
        &self,
        caller: &Principal,
        id: &str,
        status: &str,
    ) -> Result<ComplaintResponse, ApiError> {
        // Callers without any complaint scope are refused before the lookup.
        authorize(Some(caller), Action::ListComplaints)?;

        let status = status.trim();
        if status.is_empty() {
            return Err(ApiError::validation("Status is required"));
        }
        let next: ComplaintStatus = status.parse().map_err(|_| {
            ApiError::validation(format!(
                "Invalid status. Must be one of: {}",
                ComplaintStatus::ALL.map(ComplaintStatus::as_str).join(", ")
            ))
        })?;

        let id = parse_id(id).ok_or_else(|| ApiError::not_found(NOT_FOUND_OR_DENIED))?;
        let current = self
            .fetch(id)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND_OR_DENIED))?;

        match authorize(Some(caller), Action::UpdateComplaint(current.category_id)) {
            Ok(_) => {}
            Err(Denial::WrongCategory) => return Err(ApiError::not_found(NOT_FOUND_OR_DENIED)),
            Err(denial) => return Err(denial.into()),
        }

        if current.status == next {
            return Err(ApiError::validation(format!("Complaint is already {next}")));
        }
        if !current.status.can_transition_to(next) {
            return Err(ApiError::validation(format!(
                "Cannot change status from {} to {}",
                current.status, next
            )));
        }

        let updated_at = timestamp(next_update_time(current.updated_at));
        let db = self.db.clone();
        let id_str = id.to_string();
        let expected = current.status;
        let row = run_blocking(move || {
            // Only applies if nobody moved the complaint since it was read.
            let applied = db.update_complaint_status(
                &id_str,
                expected.as_str(),
                next.as_str(),
                &updated_at,
            )?;
            let row = db
                .get_complaint(&id_str)?
                .ok_or_else(|| ApiError::not_found(NOT_FOUND_OR_DENIED))?;
            if !applied {
                return Err(ApiError::validation(format!(
                    "Complaint status changed to {} while updating; reload and try again",
                    row.status
                )));
            }
            Ok(row)
        })
        .await?;

        info!(
            "Complaint {} moved {} -> {} by user {}",
            row.tracking_code,
            current.status,
            next,
            caller.user_id()
        );
        Ok(response(row)?)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ComplaintResponse>, ApiError> {
        let db = self.db.clone();
        run_blocking(move || match db.get_complaint(&id.to_string())? {
            Some(row) => Ok(Some(response(row)?)),
            None => Ok(None),
        })
        .await
    }
}

fn tracking_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

/// Current time at the precision stored in the database.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Strictly after `previous`, even if the clock has not moved on or stepped
/// back.
fn next_update_time(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > previous {
        now
    } else {
        previous + chrono::Duration::microseconds(1)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let at = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{raw}'"))?;
    Ok(at.with_timezone(&Utc))
}

fn response(row: ComplaintRow) -> anyhow::Result<ComplaintResponse> {
    Ok(ComplaintResponse {
        id: row
            .id
            .parse()
            .with_context(|| format!("corrupt complaint id '{}'", row.id))?,
        status: row.status.parse()?,
        category_id: row
            .category_id
            .parse()
            .with_context(|| format!("corrupt category id on complaint '{}'", row.id))?,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
        tracking_code: row.tracking_code,
        title: row.title,
        description: row.description,
        category_name: row.category_name,
        hostel_name: row.hostel_name,
        block: row.block,
        room_number: row.room_number,
        image_paths: row.image_paths,
    })
}

/// Reads the submission form. Empty file parts are skipped; a fourth image
/// or an oversized one fails the whole request.
pub async fn read_form(mut multipart: Multipart) -> Result<ComplaintForm, ApiError> {
    let mut form = ComplaintForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "images" => {
                let file_name = field.file_name().map(str::to_string);
                let mut data = Vec::new();
                while let Some(chunk) = field.chunk().await? {
                    if data.len() + chunk.len() > MAX_IMAGE_BYTES {
                        return Err(ApiError::validation("Each image must be at most 5 MB"));
                    }
                    data.extend_from_slice(&chunk);
                }
                if data.is_empty() {
                    continue;
                }
                if form.images.len() == MAX_IMAGES {
                    return Err(ApiError::validation(format!(
                        "At most {MAX_IMAGES} images can be attached"
                    )));
                }
                form.images.push(Upload { file_name, data });
            }
            "title" => form.title = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "category_id" => form.category_id = Some(field.text().await?),
            "hostel_name" => form.hostel_name = Some(field.text().await?),
            "block" => form.block = Some(field.text().await?),
            "room_number" => form.room_number = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(form)
}

// -- Handlers --

/// POST /complaints
pub async fn create_complaint(
    State(state): State<AppState>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let form = read_form(multipart).await?;
    let complaint = state.complaints.create(form).await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

/// GET /complaints
pub async fn list_complaints(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
    WithRejection(Query(query), _): WithRejection<Query<ComplaintListQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let complaints = state
        .complaints
        .list(&caller, query.category_id.as_deref())
        .await?;
    Ok(Json(complaints))
}

/// GET /complaints/{id}
pub async fn get_complaint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(caller): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let complaint = state.complaints.get_by_id(&caller, &id).await?;
    Ok(Json(complaint))
}

/// GET /complaints/public/{tracking_code}
pub async fn track_complaint(
    State(state): State<AppState>,
    Path(tracking_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let complaint = state.complaints.track(&tracking_code).await?;
    Ok(Json(complaint))
}

/// PUT /complaints/{id}
pub async fn update_complaint_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(caller): Extension<Principal>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateStatusRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let complaint = state
        .complaints
        .update_status(&caller, &id, &req.status)
        .await?;
    Ok(Json(complaint))
}
