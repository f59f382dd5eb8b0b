use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SmsConfig;
use crate::error::AppError;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const SMS_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: Option<String>,
}

/// SMS delivery via the Twilio REST API.
///
/// Config gated: when the Twilio credentials are absent the notifier is
/// disabled and sends are skipped with a debug log.
pub struct SmsNotifier {
    client: Client,
    config: SmsConfig,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SMS_REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn send_sms(&self, to: &str, body: &str) -> Result<(), AppError> {
        if !self.config.enabled {
            tracing::debug!("SMS gateway disabled - skipping send");
            return Ok(());
        }

        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_BASE, self.config.account_sid
        );

        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Sms(format!("SMS request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(AppError::Sms(format!(
                "SMS gateway returned {status}: {body}"
            )));
        }

        let message: TwilioMessageResponse = response
            .json()
            .await
            .unwrap_or(TwilioMessageResponse { sid: None });

        tracing::info!(
            sid = %message.sid.as_deref().unwrap_or("unknown"),
            "SMS sent"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_notifier_skips_send() {
        let notifier = SmsNotifier::new(SmsConfig {
            enabled: false,
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
        })
        .unwrap();

        assert!(!notifier.is_enabled());

        // A disabled notifier must not attempt network I/O
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let result = rt.block_on(notifier.send_sms("+14155552671", "test"));
        assert!(result.is_ok());
    }
}
