// ============================================================================
// Nutrition Targets
// ============================================================================
//
// Daily targets use the Mifflin-St Jeor BMR formula with a fixed activity
// multiplier; per-meal calorie targets use Harris-Benedict with a
// goal-dependent multiplier split across meal types.
//
// ============================================================================

use crate::db::Profile;

pub const MEAL_TYPES: [&str; 5] = ["Breakfast", "Brunch", "Lunch", "Evening Snacks", "Dinner"];

pub const GOALS: [&str; 3] = ["Weight Loss", "Weight Gain", "Muscle Gain"];

pub const DIET_PREFERENCES: [&str; 6] = [
    "Veg",
    "Non-Veg",
    "Vegan",
    "Eggetarian",
    "Keto / Low-Carb",
    "High Protein",
];

pub const GENDERS: [&str; 3] = ["Male", "Female", "Others"];

pub const WEIGHT_UNITS: [&str; 2] = ["kg", "lbs"];

pub const HEALTH_CONDITIONS: [&str; 8] = [
    "Diabetes",
    "Hypertension",
    "Thyroid",
    "PCOS / PCOD",
    "Digestive Issues",
    "Food Allergies",
    "Others",
    "None of These",
];

pub const ALLERGENS: [&str; 12] = [
    "Peanuts",
    "Tree Nuts",
    "Milk/Dairy",
    "Eggs",
    "Fish",
    "Shellfish",
    "Soy",
    "Wheat/Gluten",
    "Sesame",
    "Mustard",
    "Others",
    "None of These",
];

const LBS_PER_KG: f64 = 2.205;

/// Fixed activity multiplier for the daily TDEE estimate
const ACTIVITY_MULTIPLIER: f64 = 1.55;

/// Share of daily calories assigned to each meal type
const MEAL_PERCENTAGES: [(&str, f64); 5] = [
    ("Breakfast", 0.25),
    ("Brunch", 0.15),
    ("Lunch", 0.35),
    ("Evening Snacks", 0.10),
    ("Dinner", 0.30),
];

const MIN_MEAL_CALORIES: i32 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct NutritionTargets {
    pub calories_target: i32,
    pub protein_target: f64,
    pub carbs_target: f64,
    pub fats_target: f64,
}

impl Default for NutritionTargets {
    /// Fallback targets for users without a profile
    fn default() -> Self {
        Self {
            calories_target: 2000,
            protein_target: 150.0,
            carbs_target: 200.0,
            fats_target: 65.0,
        }
    }
}

fn weight_kg(profile: &Profile) -> f64 {
    match profile.weight {
        Some(w) if profile.weight_unit == "lbs" => w / LBS_PER_KG,
        Some(w) => w,
        None => 70.0,
    }
}

/// Daily nutrition targets from the profile.
///
/// Mifflin-St Jeor BMR, activity multiplier 1.55, protein 1.6 g/kg and fats
/// 0.9 g/kg body weight, carbs from the remaining calories. Macros are then
/// adjusted for health conditions and diet preference.
pub fn daily_targets(profile: &Profile) -> NutritionTargets {
    let age = profile.age.unwrap_or(30) as f64;
    let weight = weight_kg(profile);
    let height_cm = profile.height_cm.unwrap_or(170.0);
    let gender = profile.gender.as_deref().unwrap_or("Male");
    let diet_preference = profile.diet_preference.as_deref().unwrap_or("Non-Veg");
    let health_conditions = &profile.health_conditions.0;

    let bmr = if gender == "Male" {
        (10.0 * weight) + (6.25 * height_cm) - (5.0 * age) + 5.0
    } else {
        (10.0 * weight) + (6.25 * height_cm) - (5.0 * age) - 161.0
    };

    let tdee = bmr * ACTIVITY_MULTIPLIER;
    let calories_target = tdee as i32;

    let protein_multiplier = if health_conditions.iter().any(|c| c == "Diabetes") {
        1.1
    } else if health_conditions.iter().any(|c| c == "Hypertension") {
        0.95
    } else if health_conditions.iter().any(|c| c == "Thyroid") {
        1.05
    } else {
        1.0
    };

    let mut protein_target = weight * 1.6 * protein_multiplier;
    let mut fats_target = weight * 0.9;

    let carbs_kcal =
        (calories_target as f64 - (protein_target * 4.0) - (fats_target * 9.0)).max(0.0);
    let mut carbs_target = carbs_kcal / 4.0;

    match diet_preference {
        "High Protein" => {
            protein_target *= 1.25;
            carbs_target = (carbs_target * 0.85).max(0.0);
        }
        "Keto / Low-Carb" => {
            carbs_target *= 0.5;
            fats_target *= 1.2;
        }
        "Vegan" => {
            // More total protein is needed from plant sources
            protein_target *= 1.15;
        }
        _ => {}
    }

    NutritionTargets {
        calories_target,
        protein_target: round1(protein_target),
        carbs_target: round1(carbs_target),
        fats_target: round1(fats_target),
    }
}

/// Target calories for a single meal, split from a Harris-Benedict TDEE
/// by meal-type percentage, with a 300 kcal floor.
pub fn meal_target_calories(profile: &Profile, meal_type: &str) -> i32 {
    let weight = profile.weight.unwrap_or(70.0);
    let height = profile.height_cm.unwrap_or(175.0);
    let age = profile.age.unwrap_or(30) as f64;
    let gender = profile.gender.as_deref().unwrap_or("Male");
    let goal = profile.goal.as_deref().unwrap_or("Weight Loss");

    let bmr = if gender == "Female" {
        655.0 + (9.6 * weight) + (1.8 * height) - (4.7 * age)
    } else {
        88.0 + (13.4 * weight) + (4.8 * height) - (5.7 * age)
    };

    let tdee = match goal {
        "Weight Loss" => bmr * 1.4,
        "Weight Gain" => bmr * 1.6,
        _ => bmr * 1.5,
    };

    let percentage = MEAL_PERCENTAGES
        .iter()
        .find(|(mt, _)| *mt == meal_type)
        .map(|(_, p)| *p)
        .unwrap_or(0.25);

    ((tdee * percentage) as i32).max(MIN_MEAL_CALORIES)
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Percentage of target consumed, capped at 100.
pub fn consumed_pct(consumed: f64, target: f64) -> i32 {
    if target <= 0.0 {
        return 0;
    }
    ((consumed / target) * 100.0).round().min(100.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn test_profile() -> Profile {
        Profile {
            user_id: Uuid::new_v4(),
            name: "Asha".to_string(),
            age: Some(30),
            weight: Some(70.0),
            weight_unit: "kg".to_string(),
            height_cm: Some(170.0),
            gender: Some("Male".to_string()),
            goal: Some("Weight Loss".to_string()),
            diet_preference: Some("Non-Veg".to_string()),
            health_conditions: Json(vec![]),
            other_condition_text: String::new(),
            allergies: Json(vec![]),
            allergy_notes: String::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_daily_targets_male_baseline() {
        let targets = daily_targets(&test_profile());
        // BMR = 700 + 1062.5 - 150 + 5 = 1617.5; TDEE = 1617.5 * 1.55
        assert_eq!(targets.calories_target, 2507);
        assert_eq!(targets.protein_target, 112.0);
        assert_eq!(targets.fats_target, 63.0);
        assert!(targets.carbs_target > 0.0);
    }

    #[test]
    fn test_daily_targets_female_lower_bmr() {
        let mut profile = test_profile();
        profile.gender = Some("Female".to_string());
        let male = daily_targets(&test_profile());
        let female = daily_targets(&profile);
        assert!(female.calories_target < male.calories_target);
    }

    #[test]
    fn test_lbs_converted_to_kg() {
        let mut profile = test_profile();
        profile.weight = Some(154.35); // = 70 kg
        profile.weight_unit = "lbs".to_string();
        let targets = daily_targets(&profile);
        let baseline = daily_targets(&test_profile());
        assert_eq!(targets.calories_target, baseline.calories_target);
    }

    #[test]
    fn test_keto_halves_carbs_and_raises_fats() {
        let mut profile = test_profile();
        profile.diet_preference = Some("Keto / Low-Carb".to_string());
        let keto = daily_targets(&profile);
        let baseline = daily_targets(&test_profile());
        assert!((keto.carbs_target - baseline.carbs_target * 0.5).abs() < 0.2);
        assert!(keto.fats_target > baseline.fats_target);
    }

    #[test]
    fn test_diabetes_raises_protein() {
        let mut profile = test_profile();
        profile.health_conditions = Json(vec!["Diabetes".to_string()]);
        let adjusted = daily_targets(&profile);
        let baseline = daily_targets(&test_profile());
        assert!(adjusted.protein_target > baseline.protein_target);
    }

    #[test]
    fn test_meal_target_floor() {
        let mut profile = test_profile();
        profile.weight = Some(30.0);
        profile.height_cm = Some(120.0);
        profile.age = Some(80);
        let target = meal_target_calories(&profile, "Evening Snacks");
        assert!(target >= 300);
    }

    #[test]
    fn test_meal_targets_follow_percentages() {
        let profile = test_profile();
        let lunch = meal_target_calories(&profile, "Lunch");
        let snacks = meal_target_calories(&profile, "Evening Snacks");
        assert!(lunch > snacks);
    }

    #[test]
    fn test_unknown_meal_type_uses_default_share() {
        let profile = test_profile();
        let unknown = meal_target_calories(&profile, "Midnight Feast");
        let breakfast = meal_target_calories(&profile, "Breakfast");
        assert_eq!(unknown, breakfast);
    }

    #[test]
    fn test_consumed_pct_caps_at_100() {
        assert_eq!(consumed_pct(500.0, 200.0), 100);
        assert_eq!(consumed_pct(50.0, 200.0), 25);
        assert_eq!(consumed_pct(10.0, 0.0), 0);
    }

    #[test]
    fn test_defaults_without_profile() {
        let targets = NutritionTargets::default();
        assert_eq!(targets.calories_target, 2000);
        assert_eq!(targets.protein_target, 150.0);
    }
}
