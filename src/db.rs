use anyhow::Result;
use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

pub type DbPool = Pool<Postgres>;

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    Ok(pool)
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password_hash: Option<String>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn create_user(
    pool: &DbPool,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> sqlx::Result<User> {
    let password_hash = hash(password, DEFAULT_COST)
        .map_err(|e| sqlx::Error::Protocol(format!("password hashing failed: {e}")))?;

    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
}

pub async fn get_user_by_username(pool: &DbPool, username: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_id(pool: &DbPool, user_id: &Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Looks up a user by mobile, creating one on first login.
/// Returns (user, is_new_user).
pub async fn get_or_create_user_by_mobile(
    pool: &DbPool,
    mobile: &str,
) -> sqlx::Result<(User, bool)> {
    if let Some(user) = sqlx::query_as::<_, User>("SELECT * FROM users WHERE mobile = $1")
        .bind(mobile)
        .fetch_optional(pool)
        .await?
    {
        return Ok((user, false));
    }

    // Username defaults to the mobile number, as in OTP-first signup
    let inserted = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, mobile)
        VALUES ($1, $1)
        ON CONFLICT (mobile) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(mobile)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(user) => Ok((user, true)),
        // Lost a concurrent-insert race; the row exists now
        None => {
            let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE mobile = $1")
                .bind(mobile)
                .fetch_one(pool)
                .await?;
            Ok((user, false))
        }
    }
}

pub fn verify_password(user: &User, password: &str) -> bool {
    user.password_hash
        .as_deref()
        .map(|h| bcrypt::verify(password, h).unwrap_or(false))
        .unwrap_or(false)
}

pub async fn set_onboarding_completed(pool: &DbPool, user_id: &Uuid) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET onboarding_completed = TRUE WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_user(pool: &DbPool, user_id: &Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn record_login(
    pool: &DbPool,
    user_id: &Uuid,
    mobile: &str,
    is_new_user: bool,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO login_history (user_id, mobile, is_new_user)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(user_id)
    .bind(mobile)
    .bind(is_new_user)
    .execute(pool)
    .await?;
    Ok(())
}

/// Deletes login history rows older than the given number of days.
pub async fn prune_login_history(pool: &DbPool, days: i32) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM login_history WHERE logged_at < NOW() - make_interval(days => $1)",
    )
    .bind(days)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub weight_unit: String,
    pub height_cm: Option<f64>,
    pub gender: Option<String>,
    pub goal: Option<String>,
    pub diet_preference: Option<String>,
    pub health_conditions: Json<Vec<String>>,
    pub other_condition_text: String,
    pub allergies: Json<Vec<String>>,
    pub allergy_notes: String,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update; `None` fields keep their stored value.
#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
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

pub async fn get_profile(pool: &DbPool, user_id: &Uuid) -> sqlx::Result<Option<Profile>> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Creates or partially updates the user's profile (last write wins).
pub async fn upsert_profile(
    pool: &DbPool,
    user_id: &Uuid,
    changes: &ProfileChanges,
) -> sqlx::Result<Profile> {
    sqlx::query_as::<_, Profile>(
        r#"
        INSERT INTO profiles (
            user_id, name, age, weight, weight_unit, height_cm, gender, goal,
            diet_preference, health_conditions, other_condition_text,
            allergies, allergy_notes, updated_at
        )
        VALUES (
            $1, COALESCE($2, ''), $3, $4, COALESCE($5, 'kg'), $6, $7, $8,
            $9, COALESCE($10, '[]'::jsonb), COALESCE($11, ''),
            COALESCE($12, '[]'::jsonb), COALESCE($13, ''), NOW()
        )
        ON CONFLICT (user_id) DO UPDATE SET
            name = COALESCE($2, profiles.name),
            age = COALESCE($3, profiles.age),
            weight = COALESCE($4, profiles.weight),
            weight_unit = COALESCE($5, profiles.weight_unit),
            height_cm = COALESCE($6, profiles.height_cm),
            gender = COALESCE($7, profiles.gender),
            goal = COALESCE($8, profiles.goal),
            diet_preference = COALESCE($9, profiles.diet_preference),
            health_conditions = COALESCE($10, profiles.health_conditions),
            other_condition_text = COALESCE($11, profiles.other_condition_text),
            allergies = COALESCE($12, profiles.allergies),
            allergy_notes = COALESCE($13, profiles.allergy_notes),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(changes.name.as_deref())
    .bind(changes.age)
    .bind(changes.weight)
    .bind(changes.weight_unit.as_deref())
    .bind(changes.height_cm)
    .bind(changes.gender.as_deref())
    .bind(changes.goal.as_deref())
    .bind(changes.diet_preference.as_deref())
    .bind(changes.health_conditions.clone().map(Json))
    .bind(changes.other_condition_text.as_deref())
    .bind(changes.allergies.clone().map(Json))
    .bind(changes.allergy_notes.as_deref())
    .fetch_one(pool)
    .await
}

// ============================================================================
// App settings
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppSettings {
    pub user_id: Uuid,
    pub notifications_enabled: bool,
    pub meal_reminders_enabled: bool,
    pub reminder_time: Option<NaiveTime>,
    pub weekly_summary_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct SettingsChanges {
    pub notifications_enabled: Option<bool>,
    pub meal_reminders_enabled: Option<bool>,
    pub reminder_time: Option<NaiveTime>,
    pub weekly_summary_enabled: Option<bool>,
}

pub async fn get_or_create_settings(pool: &DbPool, user_id: &Uuid) -> sqlx::Result<AppSettings> {
    sqlx::query("INSERT INTO app_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    sqlx::query_as::<_, AppSettings>("SELECT * FROM app_settings WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

pub async fn update_settings(
    pool: &DbPool,
    user_id: &Uuid,
    changes: &SettingsChanges,
) -> sqlx::Result<AppSettings> {
    sqlx::query_as::<_, AppSettings>(
        r#"
        INSERT INTO app_settings (
            user_id, notifications_enabled, meal_reminders_enabled,
            reminder_time, weekly_summary_enabled
        )
        VALUES ($1, COALESCE($2, TRUE), COALESCE($3, TRUE), $4, COALESCE($5, FALSE))
        ON CONFLICT (user_id) DO UPDATE SET
            notifications_enabled = COALESCE($2, app_settings.notifications_enabled),
            meal_reminders_enabled = COALESCE($3, app_settings.meal_reminders_enabled),
            reminder_time = COALESCE($4, app_settings.reminder_time),
            weekly_summary_enabled = COALESCE($5, app_settings.weekly_summary_enabled),
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(changes.notifications_enabled)
    .bind(changes.meal_reminders_enabled)
    .bind(changes.reminder_time)
    .bind(changes.weekly_summary_enabled)
    .fetch_one(pool)
    .await
}

// ============================================================================
// Meal entries
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MealEntry {
    pub id: i64,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub meal_type: String,
    pub name: String,
    pub serving: String,
    pub quantity: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    pub eaten: bool,
    pub created_at: DateTime<Utc>,
}

pub struct NewMealEntry<'a> {
    pub date: NaiveDate,
    pub meal_type: &'a str,
    pub name: &'a str,
    pub serving: &'a str,
    pub quantity: f64,
    /// Totals for the added quantity, not per-serving amounts
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
}

/// Inserts a meal log row; the same food added again on the same day and
/// meal accumulates quantity and macros instead of duplicating.
pub async fn add_meal_entry(
    pool: &DbPool,
    user_id: &Uuid,
    entry: &NewMealEntry<'_>,
) -> sqlx::Result<MealEntry> {
    sqlx::query_as::<_, MealEntry>(
        r#"
        INSERT INTO meal_entries (
            user_id, date, meal_type, name, serving, quantity,
            calories, protein_g, carbs_g, fats_g
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (user_id, date, meal_type, name) DO UPDATE SET
            quantity = meal_entries.quantity + EXCLUDED.quantity,
            calories = meal_entries.calories + EXCLUDED.calories,
            protein_g = meal_entries.protein_g + EXCLUDED.protein_g,
            carbs_g = meal_entries.carbs_g + EXCLUDED.carbs_g,
            fats_g = meal_entries.fats_g + EXCLUDED.fats_g,
            serving = CASE
                WHEN meal_entries.serving = '' THEN EXCLUDED.serving
                ELSE meal_entries.serving
            END
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(entry.date)
    .bind(entry.meal_type)
    .bind(entry.name)
    .bind(entry.serving)
    .bind(entry.quantity)
    .bind(entry.calories)
    .bind(entry.protein_g)
    .bind(entry.carbs_g)
    .bind(entry.fats_g)
    .fetch_one(pool)
    .await
}

pub async fn list_meal_entries(
    pool: &DbPool,
    user_id: &Uuid,
    date: NaiveDate,
) -> sqlx::Result<Vec<MealEntry>> {
    sqlx::query_as::<_, MealEntry>(
        r#"
        SELECT * FROM meal_entries
        WHERE user_id = $1 AND date = $2
        ORDER BY meal_type, id
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await
}

pub async fn get_meal_entry(
    pool: &DbPool,
    entry_id: i64,
    user_id: &Uuid,
) -> sqlx::Result<Option<MealEntry>> {
    sqlx::query_as::<_, MealEntry>("SELECT * FROM meal_entries WHERE id = $1 AND user_id = $2")
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_meal_entry_amounts(
    pool: &DbPool,
    entry_id: i64,
    quantity: f64,
    calories: f64,
    protein_g: f64,
    carbs_g: f64,
    fats_g: f64,
) -> sqlx::Result<MealEntry> {
    sqlx::query_as::<_, MealEntry>(
        r#"
        UPDATE meal_entries
        SET quantity = $2, calories = $3, protein_g = $4, carbs_g = $5, fats_g = $6
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(entry_id)
    .bind(quantity)
    .bind(calories)
    .bind(protein_g)
    .bind(carbs_g)
    .bind(fats_g)
    .fetch_one(pool)
    .await
}

pub async fn delete_meal_entry(pool: &DbPool, entry_id: i64) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM meal_entries WHERE id = $1")
        .bind(entry_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn toggle_meal_eaten(
    pool: &DbPool,
    entry_id: i64,
    user_id: &Uuid,
) -> sqlx::Result<Option<MealEntry>> {
    sqlx::query_as::<_, MealEntry>(
        r#"
        UPDATE meal_entries
        SET eaten = NOT eaten
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(entry_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Sums (calories, protein_g, carbs_g, fats_g) over the day's eaten meals.
pub async fn sum_eaten_totals(
    pool: &DbPool,
    user_id: &Uuid,
    date: NaiveDate,
) -> sqlx::Result<(f64, f64, f64, f64)> {
    sqlx::query_as::<_, (f64, f64, f64, f64)>(
        r#"
        SELECT
            COALESCE(SUM(calories), 0),
            COALESCE(SUM(protein_g), 0),
            COALESCE(SUM(carbs_g), 0),
            COALESCE(SUM(fats_g), 0)
        FROM meal_entries
        WHERE user_id = $1 AND date = $2 AND eaten = TRUE
        "#,
    )
    .bind(user_id)
    .bind(date)
    .fetch_one(pool)
    .await
}

// ============================================================================
// Daily nutrition summaries
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailySummary {
    pub id: i64,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub calories_target: i32,
    pub calories_consumed: f64,
    pub protein_g: f64,
    pub protein_target: f64,
    pub carbs_g: f64,
    pub carbs_target: f64,
    pub fats_g: f64,
    pub fats_target: f64,
    pub updated_at: DateTime<Utc>,
}

/// Overwrites the day's summary with fresh targets and consumed totals.
pub async fn upsert_summary(
    pool: &DbPool,
    user_id: &Uuid,
    date: NaiveDate,
    targets: &crate::nutrition::NutritionTargets,
    consumed: (f64, f64, f64, f64),
) -> sqlx::Result<DailySummary> {
    sqlx::query_as::<_, DailySummary>(
        r#"
        INSERT INTO daily_summaries (
            user_id, date, calories_target, calories_consumed,
            protein_g, protein_target, carbs_g, carbs_target,
            fats_g, fats_target, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
        ON CONFLICT (user_id, date) DO UPDATE SET
            calories_target = EXCLUDED.calories_target,
            calories_consumed = EXCLUDED.calories_consumed,
            protein_g = EXCLUDED.protein_g,
            protein_target = EXCLUDED.protein_target,
            carbs_g = EXCLUDED.carbs_g,
            carbs_target = EXCLUDED.carbs_target,
            fats_g = EXCLUDED.fats_g,
            fats_target = EXCLUDED.fats_target,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(targets.calories_target)
    .bind(consumed.0)
    .bind(consumed.1)
    .bind(targets.protein_target)
    .bind(consumed.2)
    .bind(targets.carbs_target)
    .bind(consumed.3)
    .bind(targets.fats_target)
    .fetch_one(pool)
    .await
}

/// Adds consumed deltas (possibly negative) to the day's summary.
pub async fn add_to_summary(
    pool: &DbPool,
    user_id: &Uuid,
    date: NaiveDate,
    deltas: (f64, f64, f64, f64),
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO daily_summaries (
            user_id, date, calories_consumed, protein_g, carbs_g, fats_g
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, date) DO UPDATE SET
            calories_consumed = daily_summaries.calories_consumed + EXCLUDED.calories_consumed,
            protein_g = daily_summaries.protein_g + EXCLUDED.protein_g,
            carbs_g = daily_summaries.carbs_g + EXCLUDED.carbs_g,
            fats_g = daily_summaries.fats_g + EXCLUDED.fats_g,
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(deltas.0)
    .bind(deltas.1)
    .bind(deltas.2)
    .bind(deltas.3)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_summaries_range(
    pool: &DbPool,
    user_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> sqlx::Result<Vec<DailySummary>> {
    sqlx::query_as::<_, DailySummary>(
        r#"
        SELECT * FROM daily_summaries
        WHERE user_id = $1 AND date >= $2 AND date <= $3
        ORDER BY date
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

// ============================================================================
// Meal recommendation cache
// ============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MealRecommendation {
    pub id: i64,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub meal_type: String,
    pub items: Json<serde_json::Value>,
    pub goal: String,
    pub diet_preference: String,
    pub health_conditions: Json<Vec<String>>,
    pub target_calories: Option<i32>,
    pub created_at: DateTime<Utc>,
}

pub async fn get_recommendation(
    pool: &DbPool,
    user_id: &Uuid,
    date: NaiveDate,
    meal_type: &str,
) -> sqlx::Result<Option<MealRecommendation>> {
    sqlx::query_as::<_, MealRecommendation>(
        r#"
        SELECT * FROM meal_recommendations
        WHERE user_id = $1 AND date = $2 AND meal_type = $3
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(meal_type)
    .fetch_optional(pool)
    .await
}

/// Stores a freshly generated recommendation, replacing any stale row.
pub async fn upsert_recommendation(
    pool: &DbPool,
    user_id: &Uuid,
    date: NaiveDate,
    meal_type: &str,
    items: &serde_json::Value,
    goal: &str,
    diet_preference: &str,
    health_conditions: &[String],
    target_calories: i32,
) -> sqlx::Result<MealRecommendation> {
    sqlx::query_as::<_, MealRecommendation>(
        r#"
        INSERT INTO meal_recommendations (
            user_id, date, meal_type, items, goal, diet_preference,
            health_conditions, target_calories, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        ON CONFLICT (user_id, date, meal_type) DO UPDATE SET
            items = EXCLUDED.items,
            goal = EXCLUDED.goal,
            diet_preference = EXCLUDED.diet_preference,
            health_conditions = EXCLUDED.health_conditions,
            target_calories = EXCLUDED.target_calories,
            created_at = NOW()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(date)
    .bind(meal_type)
    .bind(Json(items.clone()))
    .bind(goal)
    .bind(diet_preference)
    .bind(Json(health_conditions.to_vec()))
    .bind(target_calories)
    .fetch_one(pool)
    .await
}
