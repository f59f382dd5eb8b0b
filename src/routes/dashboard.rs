// ============================================================================
// Dashboard Routes
// ============================================================================
//
// Endpoints:
// - GET /api/dashboard/today/          - Today's summary, resynced from meals
// - GET /api/dashboard/weekly/         - Last 7 days
// - GET /api/dashboard/monthly/?month= - Calendar month (YYYY-MM)
// - GET /api/dashboard/calories-trend/ - Per-day calorie series for a range
//
// Missing days in a range are filled with the profile's current targets so
// charts always have a full series to draw.
//
// ============================================================================

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::AppContext;
use crate::db::{self, DailySummary};
use crate::error::AppError;
use crate::nutrition::{self, consumed_pct, round1, NutritionTargets};
use crate::routes::extractors::AuthenticatedUser;
use crate::routes::meals::parse_date;

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

fn metric_block(consumed: f64, target: f64) -> serde_json::Value {
    json!({
        "consumed": round1(consumed),
        "target": round1(target),
        "remaining": round1((target - consumed).max(0.0)),
        "percentage": consumed_pct(consumed, target),
    })
}

async fn user_name_and_targets(
    ctx: &AppContext,
    user_id: &uuid::Uuid,
) -> Result<(String, NutritionTargets), AppError> {
    Ok(match db::get_profile(&ctx.db_pool, user_id).await? {
        Some(profile) => {
            let name = if profile.name.is_empty() {
                "User".to_string()
            } else {
                profile.name.clone()
            };
            let targets = nutrition::daily_targets(&profile);
            (name, targets)
        }
        None => ("User".to_string(), NutritionTargets::default()),
    })
}

/// GET /api/dashboard/today/
///
/// Consumed totals come from the day's eaten meals; targets are kept in
/// sync with the live profile on every call.
pub async fn today(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();
    let (user_name, targets) = user_name_and_targets(&ctx, &user.user_id).await?;

    let consumed = db::sum_eaten_totals(&ctx.db_pool, &user.user_id, today).await?;
    let summary =
        db::upsert_summary(&ctx.db_pool, &user.user_id, today, &targets, consumed).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "user_name": user_name,
            "date": today.to_string(),
            "calories": metric_block(summary.calories_consumed, summary.calories_target as f64),
            "proteins": metric_block(summary.protein_g, summary.protein_target),
            "carbs": metric_block(summary.carbs_g, summary.carbs_target),
            "fats": metric_block(summary.fats_g, summary.fats_target),
        })),
    ))
}

struct RangeReport {
    days: Vec<serde_json::Value>,
    consumed: (f64, f64, f64, f64),
    target: (f64, f64, f64, f64),
}

/// Builds the per-day series over [from, to], filling days with no stored
/// summary from the current profile targets.
fn build_range_report(
    summaries: &[DailySummary],
    targets: &NutritionTargets,
    from: NaiveDate,
    to: NaiveDate,
) -> RangeReport {
    let by_date: HashMap<NaiveDate, &DailySummary> =
        summaries.iter().map(|s| (s.date, s)).collect();

    let mut days = Vec::new();
    let mut consumed = (0.0, 0.0, 0.0, 0.0);
    let mut target = (0.0, 0.0, 0.0, 0.0);

    let mut date = from;
    while date <= to {
        match by_date.get(&date) {
            Some(s) => {
                days.push(json!({
                    "date": date.to_string(),
                    "calories": s.calories_consumed as i64,
                    "calories_target": s.calories_target,
                    "proteins": round1(s.protein_g),
                    "proteins_target": round1(s.protein_target),
                    "carbs": round1(s.carbs_g),
                    "carbs_target": round1(s.carbs_target),
                    "fats": round1(s.fats_g),
                    "fats_target": round1(s.fats_target),
                }));
                consumed.0 += s.calories_consumed;
                consumed.1 += s.protein_g;
                consumed.2 += s.carbs_g;
                consumed.3 += s.fats_g;
                target.0 += s.calories_target as f64;
                target.1 += s.protein_target;
                target.2 += s.carbs_target;
                target.3 += s.fats_target;
            }
            None => {
                days.push(json!({
                    "date": date.to_string(),
                    "calories": 0,
                    "calories_target": targets.calories_target,
                    "proteins": 0.0,
                    "proteins_target": round1(targets.protein_target),
                    "carbs": 0.0,
                    "carbs_target": round1(targets.carbs_target),
                    "fats": 0.0,
                    "fats_target": round1(targets.fats_target),
                }));
                target.0 += targets.calories_target as f64;
                target.1 += targets.protein_target;
                target.2 += targets.carbs_target;
                target.3 += targets.fats_target;
            }
        }
        date += Duration::days(1);
    }

    RangeReport {
        days,
        consumed,
        target,
    }
}

fn range_payload(
    user_name: &str,
    report: &RangeReport,
    extra: serde_json::Value,
) -> serde_json::Value {
    let mut payload = json!({
        "user_name": user_name,
        "calories": metric_block(report.consumed.0, report.target.0),
        "proteins": metric_block(report.consumed.1, report.target.1),
        "carbs": metric_block(report.consumed.2, report.target.2),
        "fats": metric_block(report.consumed.3, report.target.3),
        "days": report.days,
    });
    if let (Some(obj), Some(extra_obj)) = (payload.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            obj.insert(k.clone(), v.clone());
        }
    }
    payload
}

/// GET /api/dashboard/weekly/
pub async fn weekly(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let today = Utc::now().date_naive();
    let start = today - Duration::days(6);

    let (user_name, targets) = user_name_and_targets(&ctx, &user.user_id).await?;
    let summaries = db::get_summaries_range(&ctx.db_pool, &user.user_id, start, today).await?;
    let report = build_range_report(&summaries, &targets, start, today);

    Ok((
        StatusCode::OK,
        Json(range_payload(
            &user_name,
            &report,
            json!({
                "start_date": start.to_string(),
                "end_date": today.to_string(),
            }),
        )),
    ))
}

/// GET /api/dashboard/monthly/?month=YYYY-MM
pub async fn monthly(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, AppError> {
    let first_day = match &query.month {
        Some(raw) => parse_month(raw)?,
        None => {
            let today = Utc::now().date_naive();
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
                .ok_or_else(|| AppError::internal("invalid current date"))?
        }
    };

    let next_month = if first_day.month() == 12 {
        NaiveDate::from_ymd_opt(first_day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first_day.year(), first_day.month() + 1, 1)
    }
    .ok_or_else(|| AppError::internal("invalid month arithmetic"))?;
    let last_day = next_month - Duration::days(1);

    let (user_name, targets) = user_name_and_targets(&ctx, &user.user_id).await?;
    let summaries =
        db::get_summaries_range(&ctx.db_pool, &user.user_id, first_day, last_day).await?;
    let report = build_range_report(&summaries, &targets, first_day, last_day);

    Ok((
        StatusCode::OK,
        Json(range_payload(
            &user_name,
            &report,
            json!({
                "month": first_day.format("%Y-%m").to_string(),
                "start_date": first_day.to_string(),
                "end_date": last_day.to_string(),
            }),
        )),
    ))
}

fn parse_month(raw: &str) -> Result<NaiveDate, AppError> {
    let mut parts = raw.split('-');
    let year: i32 = parts
        .next()
        .and_then(|y| y.parse().ok())
        .ok_or_else(|| AppError::Validation("Invalid month format. Use YYYY-MM".to_string()))?;
    let month: u32 = parts
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or_else(|| AppError::Validation("Invalid month format. Use YYYY-MM".to_string()))?;
    if parts.next().is_some() {
        return Err(AppError::Validation(
            "Invalid month format. Use YYYY-MM".to_string(),
        ));
    }
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Validation("Invalid month format. Use YYYY-MM".to_string()))
}

/// GET /api/dashboard/calories-trend/?from=YYYY-MM-DD&to=YYYY-MM-DD
///
/// Defaults to the last 7 days when the range is not given.
pub async fn calories_trend(
    State(ctx): State<Arc<AppContext>>,
    user: AuthenticatedUser,
    Query(query): Query<TrendQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (from, to) = match (&query.from, &query.to) {
        (Some(from), Some(to)) => (parse_date(from)?, parse_date(to)?),
        _ => {
            let today = Utc::now().date_naive();
            (today - Duration::days(6), today)
        }
    };

    if from > to {
        return Err(AppError::Validation(
            "from date must be <= to date".to_string(),
        ));
    }

    let summaries = db::get_summaries_range(&ctx.db_pool, &user.user_id, from, to).await?;

    let data: Vec<serde_json::Value> = summaries
        .iter()
        .map(|s| {
            json!({
                "date": s.date.to_string(),
                "calories_target": s.calories_target,
                "calories_consumed": s.calories_consumed,
                "calories_remaining": (s.calories_target as f64 - s.calories_consumed).max(0.0),
            })
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "from": from.to_string(),
            "to": to.to_string(),
            "data": data,
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc as ChronoUtc;
    use uuid::Uuid;

    fn summary(date: NaiveDate, consumed: f64, target: i32) -> DailySummary {
        DailySummary {
            id: 1,
            user_id: Uuid::new_v4(),
            date,
            calories_target: target,
            calories_consumed: consumed,
            protein_g: 40.0,
            protein_target: 120.0,
            carbs_g: 100.0,
            carbs_target: 250.0,
            fats_g: 20.0,
            fats_target: 60.0,
            updated_at: ChronoUtc::now(),
        }
    }

    #[test]
    fn test_range_report_fills_missing_days() {
        let from = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let stored = vec![summary(
            NaiveDate::from_ymd_opt(2026, 8, 3).unwrap(),
            1800.0,
            2200,
        )];
        let targets = NutritionTargets::default();

        let report = build_range_report(&stored, &targets, from, to);

        assert_eq!(report.days.len(), 7);
        // Stored day keeps its own target; six filled days use the default
        assert_eq!(report.target.0, 2200.0 + 6.0 * 2000.0);
        assert_eq!(report.consumed.0, 1800.0);
        assert_eq!(report.days[2]["calories"], 1800);
        assert_eq!(report.days[0]["calories"], 0);
    }

    #[test]
    fn test_parse_month_valid() {
        assert_eq!(
            parse_month("2026-08").unwrap(),
            NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_month_invalid() {
        assert!(parse_month("2026").is_err());
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("2026-08-01").is_err());
        assert!(parse_month("August").is_err());
    }

    #[test]
    fn test_metric_block_caps_percentage() {
        let block = metric_block(500.0, 200.0);
        assert_eq!(block["percentage"], 100);
        assert_eq!(block["remaining"], 0.0);
    }
}
