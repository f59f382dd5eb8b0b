use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{opts, register_int_counter, Encoder, IntCounter, TextEncoder};

pub static REGISTRATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "nutrack_registrations_total",
        "Total number of user registrations"
    ))
    .unwrap()
});

pub static LOGINS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "nutrack_logins_total",
        "Total number of successful logins"
    ))
    .unwrap()
});

pub static OTP_SMS_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "nutrack_otp_sms_sent_total",
        "Total number of OTP SMS messages sent"
    ))
    .unwrap()
});

pub static RECOMMENDATION_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "nutrack_recommendation_requests_total",
        "Total number of completion-endpoint calls"
    ))
    .unwrap()
});

pub static RECOMMENDATION_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "nutrack_recommendation_failures_total",
        "Total number of failed completion-endpoint calls"
    ))
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_register_and_gather() {
        LOGINS_TOTAL.inc();
        RECOMMENDATION_REQUESTS_TOTAL.inc();

        let output = gather_metrics().unwrap();
        assert!(output.contains("nutrack_logins_total"));
        assert!(output.contains("nutrack_recommendation_requests_total"));
    }
}
