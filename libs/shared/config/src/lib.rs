use std::env;
use chrono::NaiveTime;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Calendar provider
    pub calendar_base_url: String,
    pub calendar_api_token: String,
    pub calendar_ids: Vec<String>,

    // Outbound messaging
    pub messaging_base_url: String,
    pub messaging_api_token: String,
    pub messaging_phone_id: String,

    // Generative responder
    pub responder_base_url: String,
    pub responder_api_key: String,
    pub responder_model: String,
    pub responder_timeout_secs: u64,

    // Availability
    pub working_hours_json: String,
    pub slot_duration_minutes: i64,
    pub slot_buffer_minutes: i64,
    pub min_advance_minutes: i64,
    pub local_utc_offset_minutes: i32,

    // Conversation store
    pub session_ttl_minutes: i64,
    pub session_sweep_minutes: u64,
    pub clinic_location: String,

    // Reminders
    pub reminder_days_before: i64,
    pub reminder_send_time: NaiveTime,
    pub reminder_delay_min_secs: u64,
    pub reminder_delay_max_secs: u64,
    pub reminder_batch_limit: usize,
    pub reminder_ledger_path: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            calendar_base_url: env_or(
                "CALENDAR_BASE_URL",
                "https://www.googleapis.com/calendar/v3",
            ),
            calendar_api_token: env::var("CALENDAR_API_TOKEN").unwrap_or_else(|_| {
                warn!("CALENDAR_API_TOKEN not set, using empty value");
                String::new()
            }),
            calendar_ids: env::var("CALENDAR_IDS")
                .unwrap_or_else(|_| {
                    warn!("CALENDAR_IDS not set, using empty value");
                    String::new()
                })
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            messaging_base_url: env_or("MESSAGING_BASE_URL", "https://graph.facebook.com/v19.0"),
            messaging_api_token: env::var("MESSAGING_API_TOKEN").unwrap_or_else(|_| {
                warn!("MESSAGING_API_TOKEN not set, using empty value");
                String::new()
            }),
            messaging_phone_id: env::var("MESSAGING_PHONE_ID").unwrap_or_else(|_| {
                warn!("MESSAGING_PHONE_ID not set, using empty value");
                String::new()
            }),
            responder_base_url: env_or("RESPONDER_BASE_URL", "https://api.openai.com/v1"),
            responder_api_key: env::var("RESPONDER_API_KEY").unwrap_or_else(|_| {
                warn!("RESPONDER_API_KEY not set, using empty value");
                String::new()
            }),
            responder_model: env_or("RESPONDER_MODEL", "gpt-4o-mini"),
            responder_timeout_secs: env_num("RESPONDER_TIMEOUT_SECS", 25),
            working_hours_json: env_or("WORKING_HOURS", "{}"),
            slot_duration_minutes: env_num("SLOT_DURATION_MINUTES", 60),
            slot_buffer_minutes: env_num("SLOT_BUFFER_MINUTES", 0),
            min_advance_minutes: env_num("MIN_ADVANCE_MINUTES", 60),
            local_utc_offset_minutes: env_num("LOCAL_UTC_OFFSET_MINUTES", 0),
            session_ttl_minutes: env_num("SESSION_TTL_MINUTES", 240),
            session_sweep_minutes: env_num("SESSION_SWEEP_MINUTES", 10),
            clinic_location: env_or("CLINIC_LOCATION", "Main clinic"),
            reminder_days_before: env_num("REMINDER_DAYS_BEFORE", 1),
            reminder_send_time: env::var("REMINDER_SEND_TIME")
                .ok()
                .and_then(|raw| NaiveTime::parse_from_str(&raw, "%H:%M").ok())
                .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            reminder_delay_min_secs: env_num("REMINDER_DELAY_MIN_SECS", 20),
            reminder_delay_max_secs: env_num("REMINDER_DELAY_MAX_SECS", 90),
            reminder_batch_limit: env_num("REMINDER_BATCH_LIMIT", 50),
            reminder_ledger_path: env_or("REMINDER_LEDGER_PATH", "data/reminders.jsonl"),
        };

        if !config.is_calendar_configured() {
            warn!("Calendar provider not fully configured - missing environment variables");
        }
        if !config.is_messaging_configured() {
            warn!("Messaging gateway not fully configured - missing environment variables");
        }
        if config.reminder_delay_min_secs > config.reminder_delay_max_secs {
            warn!(
                "REMINDER_DELAY_MIN_SECS ({}) exceeds REMINDER_DELAY_MAX_SECS ({}), the smaller bound wins",
                config.reminder_delay_min_secs, config.reminder_delay_max_secs
            );
        }

        config
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.calendar_api_token.is_empty() && !self.calendar_ids.is_empty()
    }

    pub fn is_messaging_configured(&self) -> bool {
        !self.messaging_api_token.is_empty() && !self.messaging_phone_id.is_empty()
    }

    pub fn is_responder_configured(&self) -> bool {
        !self.responder_api_key.is_empty()
    }

    /// Template key for the reminder idempotency domain. Encodes the schedule
    /// parameters so a configuration change never collides with prior history.
    pub fn reminder_template_key(&self) -> String {
        format!(
            "appointment-reminder:d{}:{}",
            self.reminder_days_before,
            self.reminder_send_time.format("%H%M")
        )
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

fn env_num<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid number, using default", key);
            default
        }),
        Err(_) => default,
    }
}
