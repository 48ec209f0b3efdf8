use anyhow::Context;
use axum::{Json, extract::State, response::IntoResponse};

use hostel_types::api::Category;

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

/// GET /categories
///
/// Public. Ordered by name.
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let categories = run_blocking(move || {
        db.list_categories()?
            .into_iter()
            .map(|row| -> Result<Category, ApiError> {
                let id = row
                    .id
                    .parse()
                    .with_context(|| format!("corrupt category id '{}'", row.id))?;
                Ok(Category { id, name: row.name })
            })
            .collect::<Result<Vec<_>, _>>()
    })
    .await?;

    Ok(Json(categories))
}
