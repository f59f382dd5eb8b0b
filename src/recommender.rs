// ============================================================================
// Meal Recommender - Chat Completion Client
// ============================================================================
//
// One synchronous request-response call per generation: no retries, no
// streaming, no caching at this layer. Callers persist parsed results.
//
// ============================================================================

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::config::AiConfig;
use crate::db::Profile;
use crate::error::AppError;

const SYSTEM_PROMPT: &str = "You are a nutritionist. For the given user, suggest suitable Indian food options \
for one meal (breakfast/lunch/snacks/dinner). \
Follow these rules:\n\
- Strongly respect diet_preference (Veg, Non-Veg, Vegan, Eggetarian, Keto/Low-Carb, High Protein).\n\
- STRICTLY avoid ALL allergens mentioned in allergies list.\n\
- Respect health_conditions (e.g. Diabetes -> avoid sugar, simple carbs).\n\
- Give foods that are realistic, commonly available.\n\
- Respond ONLY as JSON with a single object: \
{ \"items\": [ { \"name\", \"serving\", \"calories\", \"protein_g\", \"carbs_g\", \"fats_g\", \"note\" } ] }.\n\
- calories/macros can be approximate, but reasonable.\n\
- 8 to 10 items max.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// One recommended food item, as stored in the recommendation cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendedItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serving: String,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub fats_g: f64,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
struct RecommendationPayload {
    #[serde(default)]
    items: Vec<RecommendedItem>,
}

pub struct MealRecommender {
    client: Client,
    config: AiConfig,
}

impl MealRecommender {
    pub fn new(config: AiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Issues a single completion request for the user and meal type and
    /// returns the completion text unmodified.
    pub async fn generate(&self, profile: &Profile, meal_type: &str) -> Result<String, AppError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            AppError::Config("OPENAI_API_KEY is not set; recommendations unavailable".to_string())
        })?;

        let user_prompt = build_user_prompt(profile, meal_type);
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature: 0.5,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::UpstreamTimeout(format!("completion request timed out: {e}"))
                } else {
                    AppError::Upstream(format!("completion request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(AppError::Upstream(format!(
                "completion endpoint returned {status}: {body}"
            )));
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("completion response parse error: {e}")))?;

        let content = data
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                AppError::Upstream("completion endpoint returned no choices".to_string())
            })?;

        tracing::debug!(meal_type = %meal_type, "Generated meal recommendation");
        Ok(content)
    }
}

/// Serializes the profile facts the prompt needs into the user message.
pub fn build_user_prompt(profile: &Profile, meal_type: &str) -> serde_json::Value {
    json!({
        "meal_type": meal_type,
        "user": {
            "name": profile.name,
            "age": profile.age,
            "weight": profile.weight,
            "height_cm": profile.height_cm,
            "gender": profile.gender,
            "goal": profile.goal,
            "diet_preference": profile.diet_preference,
            "health_conditions": profile.health_conditions.0,
            "allergies": profile.allergies.0,
        },
    })
}

/// Parses the completion text into items.
///
/// A completion that is not the requested JSON shape degrades to a single
/// free-text item carrying the raw content, so a misbehaving model never
/// fails the request.
pub fn parse_items(raw: &str) -> Vec<RecommendedItem> {
    match serde_json::from_str::<RecommendationPayload>(raw) {
        Ok(payload) if !payload.items.is_empty() => {
            payload.items.into_iter().take(8).collect()
        }
        _ => vec![RecommendedItem {
            name: raw.to_string(),
            serving: String::new(),
            calories: 0.0,
            protein_g: 0.0,
            carbs_g: 0.0,
            fats_g: 0.0,
            note: String::new(),
            image_url: None,
        }],
    }
}

/// Deterministic food-photo URL for an item, keyed on its first word.
pub fn fallback_image_url(item_name: &str) -> String {
    let query: String = item_name
        .split_whitespace()
        .next()
        .unwrap_or("Food")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let query = if query.is_empty() {
        "Food".to_string()
    } else {
        query
    };
    format!("https://source.unsplash.com/400x400/?{query},food")
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
            age: Some(28),
            weight: Some(62.0),
            weight_unit: "kg".to_string(),
            height_cm: Some(164.0),
            gender: Some("Female".to_string()),
            goal: Some("Muscle Gain".to_string()),
            diet_preference: Some("Veg".to_string()),
            health_conditions: Json(vec!["Diabetes".to_string()]),
            other_condition_text: String::new(),
            allergies: Json(vec!["Peanuts".to_string()]),
            allergy_notes: String::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_prompt_carries_constraints() {
        let prompt = build_user_prompt(&test_profile(), "Lunch");
        assert_eq!(prompt["meal_type"], "Lunch");
        assert_eq!(prompt["user"]["diet_preference"], "Veg");
        assert_eq!(prompt["user"]["allergies"][0], "Peanuts");
        assert_eq!(prompt["user"]["health_conditions"][0], "Diabetes");
    }

    #[test]
    fn test_parse_items_valid_payload() {
        let raw = r#"{
            "items": [
                {"name": "Moong Dal Chilla", "serving": "2 pieces", "calories": 220,
                 "protein_g": 12, "carbs_g": 28, "fats_g": 6, "note": "High fibre"},
                {"name": "Sprout Salad", "serving": "1 bowl", "calories": 150,
                 "protein_g": 9, "carbs_g": 20, "fats_g": 3, "note": ""}
            ]
        }"#;

        let items = parse_items(raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Moong Dal Chilla");
        assert_eq!(items[1].calories, 150.0);
    }

    #[test]
    fn test_parse_items_caps_at_eight() {
        let item = r#"{"name": "Idli", "serving": "2", "calories": 120,
                       "protein_g": 4, "carbs_g": 24, "fats_g": 1, "note": ""}"#;
        let raw = format!(r#"{{"items": [{}]}}"#, vec![item; 12].join(","));

        let items = parse_items(&raw);
        assert_eq!(items.len(), 8);
    }

    #[test]
    fn test_parse_items_free_text_fallback() {
        let raw = "Sorry, I can only respond in prose today.";
        let items = parse_items(raw);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, raw);
        assert_eq!(items[0].calories, 0.0);
    }

    #[test]
    fn test_parse_items_empty_items_falls_back() {
        let items = parse_items(r#"{"items": []}"#);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_fallback_image_url_uses_first_word() {
        assert_eq!(
            fallback_image_url("Masala Dosa with chutney"),
            "https://source.unsplash.com/400x400/?Masala,food"
        );
        assert_eq!(
            fallback_image_url(""),
            "https://source.unsplash.com/400x400/?Food,food"
        );
    }

    #[test]
    fn test_recommender_without_key_is_unconfigured() {
        let recommender = MealRecommender::new(AiConfig {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 30,
        })
        .unwrap();
        assert!(!recommender.is_configured());
    }
}
