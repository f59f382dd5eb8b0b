// ============================================================================
// Profile & Onboarding Routes
// ============================================================================
//
// Endpoints:
// - GET       /api/accounts/profile/             - Profile overview
// - PUT|PATCH /api/accounts/profile/             - Partial merge update
// - GET       /api/accounts/onboarding/options/  - Static vocabularies
// - POST      /api/accounts/onboarding/complete/ - Save onboarding data
// - GET|PUT   /api/accounts/settings/            - App settings
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::context::AppContext;
use crate::db::{self, Profile, ProfileChanges, SettingsChanges};
use crate::error::AppError;
use crate::nutrition::{
    ALLERGENS, DIET_PREFERENCES, GENDERS, GOALS, HEALTH_CONDITIONS, WEIGHT_UNITS,
};
use crate::routes::extractors::AuthenticatedUser;
use crate::utils::log_safe_id;

/// Profile update payload; unknown JSON fields are rejected.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub weight_unit: Option<String>,
    pub height_cm: Option<f64>,
    pub gender: Option<String>,
    pub goal: Option<String>,
    pub diet_preference: Option<String>,
    pub health_conditions: Option<Vec<String>>,
    pub other_condition_text: Option<String>,
    pub allergies: Option<Vec<String>>,
    pub allergy_notes: Option<String>,
}

fn validate_choice(value: &str, allowed: &[&str], field: &str) -> Result<(), AppError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid {}: '{}'. Allowed values: {}",
            field,
            value,
            allowed.join(", ")
        )))
    }
}

fn validate_profile_fields(request: &UpdateProfileRequest) -> Result<(), AppError> {
    if let Some(weight_unit) = &request.weight_unit {
        validate_choice(weight_unit, &WEIGHT_UNITS, "weight_unit")?;
    }
    if let Some(gender) = &request.gender {
        validate_choice(gender, &GENDERS, "gender")?;
    }
    if let Some(goal) = &request.goal {
        validate_choice(goal, &GOALS, "goal")?;
    }
    if let Some(diet_preference) = &request.diet_preference {
        validate_choice(diet_preference, &DIET_PREFERENCES, "diet_preference")?;
    }
    if let Some(age) = request.age {
        if age <= 0 || age > 120 {
            return Err(AppError::Validation("age must be between 1 and 120".into()));
        }
    }
    if let Some(weight) = request.weight {
        if weight <= 0.0 {
            return Err(AppError::Validation("weight must be positive".into()));
        }
    }
    if let Some(height_cm) = request.height_cm {
        if height_cm <= 0.0 {
            return Err(AppError::Validation("height_cm must be positive".into()));
        }
    }
    Ok(())
}

impl From<UpdateProfileRequest> for ProfileChanges {
    fn from(request: UpdateProfileRequest) -> Self {
        ProfileChanges {
            name: request.name,
            age: request.age,
            weight: request.weight,
            weight_unit: request.weight_unit,
            height_cm: request.height_cm,
            gender: request.gender,
            goal: request.goal,
            diet_preference: request.diet_preference,
            health_conditions: request.health_conditions,
            other_condition_text: request.other_condition_text,
            allergies: request.allergies,
            allergy_notes: request.allergy_notes,
        }
    }
}

fn profile_payload(profile: &Profile, onboarding_completed: bool) -> serde_json::Value {
    json!({
        "name": profile.name,
        "age": profile.age,
        "weight": profile.weight,
        "weight_unit": profile.weight_unit,
        "height_cm": profile.height_cm,
        "gender": profile.gender,
        "goal": profile.goal,
        "diet_preference": profile.diet_preference,
        "health_conditions": profile.health_conditions.0,
        "other_condition_text": profile.other_condition_text,
        "allergies": profile.allergies.0,
        "allergy_notes": profile.allergy_notes,
        "onboarding_completed": onboarding_completed,
    })
}

fn empty_profile_payload(onboarding_completed: bool) -> serde_json::Value {
    json!({
        "name": "",
        "age": null,
        "weight": null,
        "weight_unit": "kg",
        "height_cm": null,
        "gender": null,
        "goal": null,
        "diet_preference": null,
        "health_conditions": [],
        "other_condition_text": "",
        "allergies": [],
        "allergy_notes": "",
        "onboarding_completed": onboarding_completed,
    })
}

/// GET /api/accounts/profile/
///
/// Users who never completed onboarding get an empty-default payload
/// rather than 404.
#[utoipa::path(
    get,
    path = "/api/accounts/profile/",
    responses(
        (status = 200, description = "Profile overview"),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "accounts"
)]
pub async fn get_profile(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let record = db::get_user_by_id(&ctx.db_pool, &user.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Session is invalid or expired".to_string()))?;

    let payload = match db::get_profile(&ctx.db_pool, &user.user_id).await? {
        Some(profile) => profile_payload(&profile, record.onboarding_completed),
        None => empty_profile_payload(record.onboarding_completed),
    };

    Ok((StatusCode::OK, Json(payload)))
}

/// PUT|PATCH /api/accounts/profile/
///
/// Partial merge: absent fields keep their stored values, provided fields
/// are validated against the fixed vocabularies. Last write wins.
#[utoipa::path(
    put,
    path = "/api/accounts/profile/",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "Unknown or malformed field"),
        (status = 401, description = "Missing or invalid access token"),
    ),
    tag = "accounts"
)]
pub async fn update_profile(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    // Deserialized by hand so an unknown field is a 400, not a generic 422
    let request: UpdateProfileRequest = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("Invalid profile payload: {e}")))?;

    validate_profile_fields(&request)?;

    db::upsert_profile(&ctx.db_pool, &user.user_id, &request.into()).await?;
    db::set_onboarding_completed(&ctx.db_pool, &user.user_id).await?;

    tracing::debug!(
        user_hash = %log_safe_id(&user.user_id.to_string(), &ctx.config.logging.hash_salt),
        "Profile updated"
    );

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Profile updated" })),
    ))
}

/// GET /api/accounts/onboarding/options/
pub async fn onboarding_options() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "goals": GOALS,
            "diet_preferences": DIET_PREFERENCES,
            "health_conditions": HEALTH_CONDITIONS,
            "allergies": ALLERGENS,
        })),
    )
}

/// POST /api/accounts/onboarding/complete/
///
/// Required: name, weight, height_cm, goal, diet_preference.
pub async fn onboarding_complete(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let request: UpdateProfileRequest = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("Invalid onboarding payload: {e}")))?;

    if request.name.as_deref().unwrap_or("").is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if request.weight.is_none() {
        return Err(AppError::Validation("weight is required".to_string()));
    }
    if request.height_cm.is_none() {
        return Err(AppError::Validation("height_cm is required".to_string()));
    }
    if request.goal.is_none() {
        return Err(AppError::Validation("goal is required".to_string()));
    }
    if request.diet_preference.is_none() {
        return Err(AppError::Validation(
            "diet_preference is required".to_string(),
        ));
    }

    validate_profile_fields(&request)?;

    db::upsert_profile(&ctx.db_pool, &user.user_id, &request.into()).await?;
    db::set_onboarding_completed(&ctx.db_pool, &user.user_id).await?;

    tracing::info!(
        user_hash = %log_safe_id(&user.user_id.to_string(), &ctx.config.logging.hash_salt),
        "Onboarding completed"
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Onboarding saved successfully",
            "onboarding_completed": true,
        })),
    ))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingsRequest {
    pub notifications_enabled: Option<bool>,
    pub meal_reminders_enabled: Option<bool>,
    /// "HH:MM"
    pub reminder_time: Option<String>,
    pub weekly_summary_enabled: Option<bool>,
}

fn settings_payload(settings: &db::AppSettings) -> serde_json::Value {
    json!({
        "notifications_enabled": settings.notifications_enabled,
        "meal_reminders_enabled": settings.meal_reminders_enabled,
        "reminder_time": settings.reminder_time.map(|t| t.format("%H:%M").to_string()),
        "weekly_summary_enabled": settings.weekly_summary_enabled,
    })
}

/// GET /api/accounts/settings/
pub async fn get_settings(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let settings = db::get_or_create_settings(&ctx.db_pool, &user.user_id).await?;
    Ok((StatusCode::OK, Json(settings_payload(&settings))))
}

/// PUT /api/accounts/settings/
pub async fn update_settings(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let request: UpdateSettingsRequest = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("Invalid settings payload: {e}")))?;

    let reminder_time = match &request.reminder_time {
        Some(raw) => Some(NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| {
            AppError::Validation("Invalid reminder_time format, use HH:MM".to_string())
        })?),
        None => None,
    };

    let changes = SettingsChanges {
        notifications_enabled: request.notifications_enabled,
        meal_reminders_enabled: request.meal_reminders_enabled,
        reminder_time,
        weekly_summary_enabled: request.weekly_summary_enabled,
    };

    db::update_settings(&ctx.db_pool, &user.user_id, &changes).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Settings updated" })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_rejected() {
        let body = json!({ "name": "Asha", "favourite_colour": "green" });
        let result: Result<UpdateProfileRequest, _> = serde_json::from_value(body);
        assert!(result.is_err());
    }

    #[test]
    fn test_known_fields_accepted() {
        let body = json!({
            "name": "Asha",
            "age": 28,
            "goal": "Muscle Gain",
            "diet_preference": "Veg",
            "allergies": ["Peanuts"],
        });
        let request: UpdateProfileRequest = serde_json::from_value(body).unwrap();
        assert!(validate_profile_fields(&request).is_ok());
    }

    #[test]
    fn test_invalid_goal_rejected() {
        let request = UpdateProfileRequest {
            goal: Some("Get Swole".to_string()),
            ..Default::default()
        };
        assert!(validate_profile_fields(&request).is_err());
    }

    #[test]
    fn test_invalid_diet_preference_rejected() {
        let request = UpdateProfileRequest {
            diet_preference: Some("Carnivore".to_string()),
            ..Default::default()
        };
        assert!(validate_profile_fields(&request).is_err());
    }

    #[test]
    fn test_negative_age_rejected() {
        let request = UpdateProfileRequest {
            age: Some(-3),
            ..Default::default()
        };
        assert!(validate_profile_fields(&request).is_err());
    }
}
