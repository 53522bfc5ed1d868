use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use tracing::{error, info};

use shared_config::AppConfig;

use crate::services::dispatcher::ReminderDispatcher;

/// Seconds until the next occurrence of `send_time` in local clock terms.
/// If the time already passed today, the run lands tomorrow.
pub fn next_run_delay(now: DateTime<Utc>, send_time: NaiveTime, offset: FixedOffset) -> StdDuration {
    let local_now = now.with_timezone(&offset);
    let mut next = local_now.date_naive().and_time(send_time);
    if next <= local_now.naive_local() {
        next += Duration::days(1);
    }
    let wait = next - local_now.naive_local();
    wait.to_std().unwrap_or(StdDuration::ZERO)
}

/// Daily reminder loop. Sleeps until the configured local send time, runs one
/// dispatch pass, then re-arms for the next day.
pub async fn run_schedule(dispatcher: Arc<ReminderDispatcher>, config: AppConfig) {
    let offset = FixedOffset::east_opt(config.local_utc_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    let template_key = config.reminder_template_key();

    loop {
        let wait = next_run_delay(Utc::now(), config.reminder_send_time, offset);
        info!(
            "Next reminder run in {}s (template {})",
            wait.as_secs(),
            template_key
        );
        tokio::time::sleep(wait).await;

        match dispatcher
            .run_once(
                &template_key,
                config.reminder_days_before,
                config.reminder_batch_limit,
            )
            .await
        {
            Ok(summary) => info!(
                "Scheduled reminder run finished: {} sent, {} failed",
                summary.sent, summary.failed
            ),
            Err(e) => error!("Scheduled reminder run failed: {}", e),
        }
    }
}
