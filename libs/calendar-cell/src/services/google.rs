use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{BusyInterval, CalendarEvent, CreateEventRequest};

/// Calendar capability consumed by the scheduling engine.
///
/// Busy lookups always cover every configured calendar source; any overlap
/// with any source marks the period busy.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_busy(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>>;

    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    async fn create_event(&self, request: CreateEventRequest) -> Result<CalendarEvent>;

    async fn delete_event(&self, event_id: &str) -> Result<()>;

    async fn patch_event(&self, event_id: &str, fields: Value) -> Result<CalendarEvent>;
}

pub struct GoogleCalendarClient {
    client: Client,
    base_url: String,
    api_token: String,
    calendar_ids: Vec<String>,
}

impl GoogleCalendarClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.calendar_base_url.clone(),
            api_token: config.calendar_api_token.clone(),
            calendar_ids: config.calendar_ids.clone(),
        }
    }

    /// Appointments are written to and read from the first configured calendar;
    /// the remaining ids only contribute busy time.
    fn primary_calendar(&self) -> Result<&str> {
        self.calendar_ids
            .first()
            .map(|s| s.as_str())
            .ok_or_else(|| anyhow!("No calendar ids configured"))
    }

    fn get_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Calendar request: {} {}", method, url);

        let mut req = self.client.request(method, &url).headers(self.get_headers());
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Calendar API error ({}): {}", status, error_text);
            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Calendar authentication error: {}", error_text),
                404 => anyhow!("Calendar resource not found: {}", error_text),
                _ => anyhow!("Calendar API error ({}): {}", status, error_text),
            });
        }

        if status.as_u16() == 204 {
            return Ok(Value::Null);
        }
        Ok(response.json::<Value>().await.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn list_busy(
        &self,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>> {
        if self.calendar_ids.is_empty() {
            return Err(anyhow!("No calendar ids configured"));
        }

        let items: Vec<Value> = self
            .calendar_ids
            .iter()
            .map(|id| json!({ "id": id }))
            .collect();

        let body = json!({
            "timeMin": day_start.to_rfc3339(),
            "timeMax": day_end.to_rfc3339(),
            "items": items,
        });

        let result = self.request(Method::POST, "/freeBusy", Some(body)).await?;

        // Union across sources: intervals are simply accumulated, the
        // half-open overlap test downstream does not care which source
        // contributed a period.
        let mut busy = Vec::new();
        if let Some(calendars) = result["calendars"].as_object() {
            for (calendar_id, entry) in calendars {
                if !entry["errors"].is_null() {
                    return Err(anyhow!(
                        "Busy lookup failed for calendar {}: {}",
                        calendar_id,
                        entry["errors"]
                    ));
                }
                if let Some(periods) = entry["busy"].as_array() {
                    for period in periods {
                        let interval: BusyInterval = serde_json::from_value(period.clone())?;
                        busy.push(interval);
                    }
                }
            }
        }

        busy.sort_by(|a, b| a.start.cmp(&b.start));
        debug!("Found {} busy intervals in range", busy.len());
        Ok(busy)
    }

    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let calendar_id = self.primary_calendar()?;
        let path = format!(
            "/calendars/{}/events?timeMin={}&timeMax={}&singleEvents=true&orderBy=startTime",
            calendar_id,
            time_min.to_rfc3339(),
            time_max.to_rfc3339(),
        );

        let result = self.request(Method::GET, &path, None).await?;

        let events: Vec<CalendarEvent> = result["items"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<CalendarEvent>, _>>()?;

        Ok(events)
    }

    async fn create_event(&self, request: CreateEventRequest) -> Result<CalendarEvent> {
        let calendar_id = self.primary_calendar()?;
        debug!("Creating calendar event at {}", request.start);

        let body = json!({
            "summary": request.summary,
            "description": request.description,
            "location": request.location,
            "start": { "dateTime": request.start.to_rfc3339() },
            "end": { "dateTime": request.end.to_rfc3339() },
        });

        let path = format!("/calendars/{}/events", calendar_id);
        let result = self.request(Method::POST, &path, Some(body)).await?;

        let event: CalendarEvent = serde_json::from_value(result)?;
        debug!("Event created with ID: {}", event.id);
        Ok(event)
    }

    async fn delete_event(&self, event_id: &str) -> Result<()> {
        let calendar_id = self.primary_calendar()?;
        let path = format!("/calendars/{}/events/{}", calendar_id, event_id);
        self.request(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn patch_event(&self, event_id: &str, fields: Value) -> Result<CalendarEvent> {
        let calendar_id = self.primary_calendar()?;
        let path = format!("/calendars/{}/events/{}", calendar_id, event_id);
        let result = self.request(Method::PATCH, &path, Some(fields)).await?;

        let event: CalendarEvent = serde_json::from_value(result)?;
        Ok(event)
    }
}
