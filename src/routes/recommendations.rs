// ============================================================================
// Meal Recommendation Routes
// ============================================================================
//
// GET /api/meals/recommendations/?date=YYYY-MM-DD
//
// Returns recommendations for every meal type on the given date. Each meal
// type is served from the cache while its row is younger than the cache
// window; otherwise one completion call regenerates it. An upstream failure
// for one meal type is reported inline without failing the others.
//
// ============================================================================

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::db;
use crate::error::AppError;
use crate::metrics;
use crate::nutrition::{self, MEAL_TYPES};
use crate::recommender;
use crate::routes::extractors::AuthenticatedUser;
use crate::routes::meals::{parse_date, DayQuery};
use crate::utils::log_safe_id;

/// GET /api/meals/recommendations/?date=
pub async fn meal_recommendations(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Query(query): Query<DayQuery>,
) -> Result<impl IntoResponse, AppError> {
    let date = match query.date {
        Some(raw) => parse_date(&raw)?,
        None => Utc::now().date_naive(),
    };

    let profile = db::get_profile(&ctx.db_pool, &user.user_id)
        .await?
        .ok_or_else(|| AppError::Validation("Onboarding not completed".to_string()))?;

    let cache_window = Duration::days(ctx.config.security.recommendation_cache_days);
    let mut recommendations = Vec::with_capacity(MEAL_TYPES.len());

    for meal_type in MEAL_TYPES {
        let cached = db::get_recommendation(&ctx.db_pool, &user.user_id, date, meal_type).await?;

        if let Some(rec) = &cached {
            if rec.created_at + cache_window > Utc::now() {
                recommendations.push(json!({
                    "meal_type": meal_type,
                    "goal": rec.goal,
                    "diet_preference": rec.diet_preference,
                    "health_conditions": rec.health_conditions.0,
                    "target_calories": rec.target_calories,
                    "items": rec.items.0,
                    "cached": true,
                    "created_at": rec.created_at.to_rfc3339(),
                }));
                continue;
            }
            tracing::debug!(meal_type = %meal_type, "Recommendation cache expired, regenerating");
        }

        metrics::RECOMMENDATION_REQUESTS_TOTAL.inc();
        let raw = match ctx.recommender.generate(&profile, meal_type).await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::RECOMMENDATION_FAILURES_TOTAL.inc();
                tracing::error!(
                    error = %e,
                    meal_type = %meal_type,
                    user_hash = %log_safe_id(&user.user_id.to_string(), &ctx.config.logging.hash_salt),
                    "Failed to generate recommendation"
                );
                recommendations.push(json!({
                    "meal_type": meal_type,
                    "error": e.user_message(),
                }));
                continue;
            }
        };

        let mut items = recommender::parse_items(&raw);
        for item in &mut items {
            if item.image_url.is_none() {
                item.image_url = Some(recommender::fallback_image_url(&item.name));
            }
        }
        let items_json = serde_json::to_value(&items)?;

        let target_calories = nutrition::meal_target_calories(&profile, meal_type);

        let stored = db::upsert_recommendation(
            &ctx.db_pool,
            &user.user_id,
            date,
            meal_type,
            &items_json,
            profile.goal.as_deref().unwrap_or(""),
            profile.diet_preference.as_deref().unwrap_or(""),
            &profile.health_conditions.0,
            target_calories,
        )
        .await?;

        recommendations.push(json!({
            "meal_type": meal_type,
            "goal": stored.goal,
            "diet_preference": stored.diet_preference,
            "health_conditions": stored.health_conditions.0,
            "target_calories": stored.target_calories,
            "items": stored.items.0,
            "cached": false,
            "created_at": stored.created_at.to_rfc3339(),
        }));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "date": date.to_string(),
            "user_name": profile.name,
            "recommendations": recommendations,
        })),
    ))
}
