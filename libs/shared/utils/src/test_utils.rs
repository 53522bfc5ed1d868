use chrono::NaiveTime;

use shared_config::AppConfig;

/// Baseline configuration for tests. Fields are public so individual tests
/// can point clients at a wiremock server or tighten scheduling knobs.
pub fn test_config() -> AppConfig {
    AppConfig {
        calendar_base_url: "http://localhost:9101".to_string(),
        calendar_api_token: "test-calendar-token".to_string(),
        calendar_ids: vec!["primary".to_string(), "secondary".to_string()],
        messaging_base_url: "http://localhost:9102".to_string(),
        messaging_api_token: "test-messaging-token".to_string(),
        messaging_phone_id: "1234567890".to_string(),
        responder_base_url: "http://localhost:9103".to_string(),
        responder_api_key: "test-responder-key".to_string(),
        responder_model: "test-model".to_string(),
        responder_timeout_secs: 5,
        working_hours_json: r#"{"1":[["08:00","12:00"]],"2":[["08:00","12:00"],["14:00","18:00"]]}"#
            .to_string(),
        slot_duration_minutes: 60,
        slot_buffer_minutes: 0,
        min_advance_minutes: 60,
        local_utc_offset_minutes: 0,
        session_ttl_minutes: 240,
        session_sweep_minutes: 10,
        clinic_location: "Test clinic".to_string(),
        reminder_days_before: 1,
        reminder_send_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        reminder_delay_min_secs: 0,
        reminder_delay_max_secs: 0,
        reminder_batch_limit: 50,
        reminder_ledger_path: "data/reminders-test.jsonl".to_string(),
    }
}
