// ============================================================================
// Meal Log Routes
// ============================================================================
//
// Endpoints:
// - GET    /api/meals/categories/       - Meal type vocabulary
// - GET    /api/meals/day/?date=        - Day view grouped by meal type
// - POST   /api/meals/                  - Add (or accumulate) a meal entry
// - DELETE /api/meals/:entry_id/        - Remove one serving, delete at zero
// - PATCH  /api/meals/:entry_id/eaten/  - Toggle eaten, resync the summary
//
// ============================================================================

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::context::AppContext;
use crate::db::{self, MealEntry, NewMealEntry};
use crate::error::AppError;
use crate::nutrition::{self, MEAL_TYPES};
use crate::routes::extractors::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMealRequest {
    /// YYYY-MM-DD
    pub date: String,
    pub meal_type: String,
    pub name: String,
    #[serde(default)]
    pub serving: String,
    /// Per-serving calories
    pub calories: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fats_g: f64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

fn default_quantity() -> f64 {
    1.0
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Invalid date format. Use YYYY-MM-DD".to_string()))
}

fn entry_payload(entry: &MealEntry) -> serde_json::Value {
    json!({
        "id": entry.id,
        "date": entry.date.to_string(),
        "meal_type": entry.meal_type,
        "name": entry.name,
        "serving": entry.serving,
        "quantity": entry.quantity,
        "calories": entry.calories,
        "protein_g": entry.protein_g,
        "carbs_g": entry.carbs_g,
        "fats_g": entry.fats_g,
        "eaten": entry.eaten,
    })
}

/// GET /api/meals/categories/
pub async fn meal_categories() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "categories": MEAL_TYPES })))
}

/// GET /api/meals/day/?date=YYYY-MM-DD
///
/// All meals for the day grouped by meal type, with day totals.
pub async fn day_meals(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Query(query): Query<DayQuery>,
) -> Result<impl IntoResponse, AppError> {
    let date_str = query
        .date
        .ok_or_else(|| AppError::Validation("date is required as YYYY-MM-DD".to_string()))?;
    let date = parse_date(&date_str)?;

    let entries = db::list_meal_entries(&ctx.db_pool, &user.user_id, date).await?;

    // Every standard meal type appears in the response even when empty
    let mut meal_map: BTreeMap<String, Vec<serde_json::Value>> = MEAL_TYPES
        .iter()
        .map(|mt| (mt.to_string(), Vec::new()))
        .collect();

    let mut totals = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);

    for entry in &entries {
        totals.0 += entry.calories;
        totals.1 += entry.protein_g;
        totals.2 += entry.carbs_g;
        totals.3 += entry.fats_g;

        meal_map
            .entry(entry.meal_type.clone())
            .or_default()
            .push(entry_payload(entry));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "date": date.to_string(),
            "meals": meal_map,
            "totals": {
                "calories": round2(totals.0),
                "protein_g": round2(totals.1),
                "carbs_g": round2(totals.2),
                "fats_g": round2(totals.3),
            },
        })),
    ))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// POST /api/meals/
///
/// Adding the same food again for the same day and meal accumulates
/// quantity and macros. The daily summary's consumed totals follow.
pub async fn add_meal(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Json(request): Json<AddMealRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if !MEAL_TYPES.contains(&request.meal_type.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid meal_type: '{}'. Allowed values: {}",
            request.meal_type,
            MEAL_TYPES.join(", ")
        )));
    }
    if request.quantity <= 0.0 {
        return Err(AppError::Validation("quantity must be positive".to_string()));
    }
    if request.calories < 0.0 {
        return Err(AppError::Validation("calories must not be negative".to_string()));
    }

    let date = parse_date(&request.date)?;

    let added = (
        request.calories * request.quantity,
        request.protein_g * request.quantity,
        request.carbs_g * request.quantity,
        request.fats_g * request.quantity,
    );

    let entry = db::add_meal_entry(
        &ctx.db_pool,
        &user.user_id,
        &NewMealEntry {
            date,
            meal_type: &request.meal_type,
            name: &request.name,
            serving: &request.serving,
            quantity: request.quantity,
            calories: added.0,
            protein_g: added.1,
            carbs_g: added.2,
            fats_g: added.3,
        },
    )
    .await?;

    db::add_to_summary(&ctx.db_pool, &user.user_id, date, added).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "meal saved",
            "entry": entry_payload(&entry),
        })),
    ))
}

/// DELETE /api/meals/:entry_id/
///
/// Removes one serving; the row is deleted when no servings remain.
pub async fn remove_meal(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let entry = db::get_meal_entry(&ctx.db_pool, entry_id, &user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".to_string()))?;

    if entry.quantity <= 0.0 {
        // Zero-quantity rows are corrupt leftovers; drop them outright
        db::delete_meal_entry(&ctx.db_pool, entry.id).await?;
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "Entry removed" })),
        ));
    }

    // Per-serving macros, computed before the decrement
    let one = (
        entry.calories / entry.quantity,
        entry.protein_g / entry.quantity,
        entry.carbs_g / entry.quantity,
        entry.fats_g / entry.quantity,
    );

    if entry.quantity > 1.0 {
        let updated = db::update_meal_entry_amounts(
            &ctx.db_pool,
            entry.id,
            entry.quantity - 1.0,
            entry.calories - one.0,
            entry.protein_g - one.1,
            entry.carbs_g - one.2,
            entry.fats_g - one.3,
        )
        .await?;

        db::add_to_summary(
            &ctx.db_pool,
            &user.user_id,
            entry.date,
            (-one.0, -one.1, -one.2, -one.3),
        )
        .await?;

        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "one serving removed",
                "entry": entry_payload(&updated),
            })),
        ));
    }

    // Last serving: delete the row and back its macros out of the summary
    db::add_to_summary(
        &ctx.db_pool,
        &user.user_id,
        entry.date,
        (
            -entry.calories,
            -entry.protein_g,
            -entry.carbs_g,
            -entry.fats_g,
        ),
    )
    .await?;
    db::delete_meal_entry(&ctx.db_pool, entry.id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "meal entry deleted, no servings left" })),
    ))
}

/// PATCH /api/meals/:entry_id/eaten/
///
/// Toggles the eaten flag and resyncs the day's summary from the eaten
/// meals and the live profile targets.
pub async fn toggle_meal_eaten(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Path(entry_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let entry = db::toggle_meal_eaten(&ctx.db_pool, entry_id, &user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Entry not found".to_string()))?;

    let consumed = db::sum_eaten_totals(&ctx.db_pool, &user.user_id, entry.date).await?;

    let targets = db::get_profile(&ctx.db_pool, &user.user_id)
        .await?
        .map(|p| nutrition::daily_targets(&p))
        .unwrap_or_default();

    let summary =
        db::upsert_summary(&ctx.db_pool, &user.user_id, entry.date, &targets, consumed).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Meal eaten status toggled",
            "entry": entry_payload(&entry),
            "daily_summary": {
                "date": summary.date.to_string(),
                "calories": {
                    "consumed": summary.calories_consumed,
                    "target": summary.calories_target,
                    "remaining": (summary.calories_target as f64 - summary.calories_consumed).max(0.0),
                },
                "protein": {
                    "consumed": nutrition::round1(summary.protein_g),
                    "target": nutrition::round1(summary.protein_target),
                    "remaining": nutrition::round1((summary.protein_target - summary.protein_g).max(0.0)),
                },
                "carbs": {
                    "consumed": nutrition::round1(summary.carbs_g),
                    "target": nutrition::round1(summary.carbs_target),
                    "remaining": nutrition::round1((summary.carbs_target - summary.carbs_g).max(0.0)),
                },
                "fats": {
                    "consumed": nutrition::round1(summary.fats_g),
                    "target": nutrition::round1(summary.fats_target),
                    "remaining": nutrition::round1((summary.fats_target - summary.fats_g).max(0.0)),
                },
            },
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_valid() {
        assert_eq!(
            parse_date("2026-08-06").unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
        );
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date("06-08-2026").is_err());
        assert!(parse_date("2026-13-01").is_err());
        assert!(parse_date("tomorrow").is_err());
    }

    #[test]
    fn test_default_quantity_is_one() {
        let request: AddMealRequest = serde_json::from_value(json!({
            "date": "2026-08-06",
            "meal_type": "Lunch",
            "name": "Dal Tadka",
            "calories": 180.0,
        }))
        .unwrap();
        assert_eq!(request.quantity, 1.0);
        assert_eq!(request.protein_g, 0.0);
    }
}
