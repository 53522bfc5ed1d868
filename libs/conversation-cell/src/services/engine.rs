use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use regex::Regex;
use tracing::{debug, error, info, warn};

use availability_cell::{rank_by_proximity, AvailabilityResolver, Slot};
use calendar_cell::CalendarApi;
use shared_config::AppConfig;
use shared_utils::datetime::{DateTimeExtractor, DateTimeMatch};

use crate::error::ConversationError;
use crate::models::{MessageRole, Stage};
use crate::services::booking::{BookingService, CalendarCancellation, CancellationSink};
use crate::services::intent::{IntentExtractor, IntentSignals};
use crate::services::responder::Responder;
use crate::services::store::ConversationStore;

/// Availability window fetched per grounding pass.
const SEARCH_DAYS: i64 = 5;
const PER_DAY_CAP: usize = 8;
const TOTAL_CAP: usize = 20;
/// Final number of options shown to the patient.
const OFFER_LIMIT: usize = 6;
/// "More dates" advances the pagination cursor by this many days.
const PAGE_DAYS: i64 = 5;
/// An invite counts as recent for this long.
const INVITE_WINDOW_MINUTES: i64 = 5;
/// Slots already shown within this window are not re-listed.
const LIST_THROTTLE_SECONDS: i64 = 60;

const GREETING_REPLY: &str =
    "Hi! I'm the clinic's scheduling assistant. How can I help you today?";
const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a few minutes.";
const NO_AVAILABILITY_REPLY: &str =
    "I couldn't find any open times in the coming days. Would you like me to look further ahead?";

/// Drives one conversation turn: draft, intent check, optional grounding
/// against real availability, then booking/cancellation side-effects.
///
/// Skipping the grounding pass is the one failure mode this design must rule
/// out: a reply that lists times always lists times fetched from the
/// calendar, never times the responder made up.
pub struct ConversationEngine {
    store: Arc<ConversationStore>,
    resolver: AvailabilityResolver,
    responder: Arc<dyn Responder>,
    booking: Arc<BookingService>,
    cancellation: Arc<dyn CancellationSink>,
    intent: IntentExtractor,
    datetime: DateTimeExtractor,
    responder_timeout: StdDuration,
    offset: FixedOffset,
    hedging: Regex,
    whitespace: Regex,
}

impl ConversationEngine {
    pub fn new(
        config: &AppConfig,
        store: Arc<ConversationStore>,
        calendar: Arc<dyn CalendarApi>,
        responder: Arc<dyn Responder>,
    ) -> anyhow::Result<Self> {
        let offset = FixedOffset::east_opt(config.local_utc_offset_minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());

        Ok(Self {
            store,
            resolver: AvailabilityResolver::new(config, Arc::clone(&calendar))?,
            responder,
            booking: Arc::new(BookingService::new(config, Arc::clone(&calendar))),
            cancellation: Arc::new(CalendarCancellation::new(config, Arc::clone(&calendar))),
            intent: IntentExtractor::new(),
            datetime: DateTimeExtractor::new(offset),
            responder_timeout: StdDuration::from_secs(config.responder_timeout_secs),
            offset,
            hedging: Regex::new(
                r"(?i)(i'?ll check (?:the )?availab[^.!\n]*[.!]?|let me check[^.!\n]*[.!]?|let me confirm[^.!\n]*[.!]?|give me a moment[^.!\n]*[.!]?|i will (?:check|confirm)[^.!\n]*[.!]?|one moment while i[^.!\n]*[.!]?)",
            )
            .unwrap(),
            whitespace: Regex::new(r"[ \t]{2,}").unwrap(),
        })
    }

    pub async fn handle_message(&self, phone: &str, text: &str) -> String {
        self.handle_message_at(phone, text, Utc::now()).await
    }

    /// One conversation turn. Always produces a reply; internal failures
    /// degrade to the first-pass draft or the fixed fallback, never to an
    /// empty message.
    pub async fn handle_message_at(
        &self,
        phone: &str,
        raw_text: &str,
        now: DateTime<Utc>,
    ) -> String {
        if self.intent.is_reset(raw_text) {
            self.store.reset(phone).await;
            return GREETING_REPLY.to_string();
        }

        let session_arc = self.store.checkout(phone, now).await;
        // Holding the session lock for the whole turn serializes handling
        // per phone: a rapid double-send processes strictly in order.
        let mut session = session_arc.lock().await;

        // Bare "3" / "option 3" refers back to the offered list.
        let mut text = raw_text.to_string();
        if let Some(choice) = self.intent.option_choice(raw_text) {
            if choice >= 1 && choice <= session.last_slots.len() {
                let slot = &session.last_slots[choice - 1];
                let local = slot.start_time.with_timezone(&self.offset);
                text = format!(
                    "I'd like the appointment on {} at {}",
                    local.format("%Y-%m-%d"),
                    local.format("%H:%M")
                );
                debug!("Rewrote option {} to: {}", choice, text);
            }
        }

        session.push(MessageRole::Patient, &text, now);

        let draft = match self.respond_bounded(&session.render_context(), phone).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!("First-pass draft failed for {}: {}", phone, e);
                FALLBACK_REPLY.to_string()
            }
        };

        // Intent runs on the (rewritten) patient text, independent of the draft.
        let signals = self.intent.signals(&text);
        let explicit = self.datetime.extract(&text, now);
        let invite_recent = session
            .last_invite_at
            .map(|t| now - t <= Duration::minutes(INVITE_WINDOW_MINUTES))
            .unwrap_or(false);
        let intent_schedule =
            signals.schedule_keyword || explicit.is_some() || (signals.affirmation && invite_recent);
        let too_soon = session
            .last_list_at
            .map(|t| now - t <= Duration::seconds(LIST_THROTTLE_SECONDS))
            .unwrap_or(false);

        let mut final_reply = draft.clone();
        let wants_times = intent_schedule || signals.more_dates;
        if (wants_times && !too_soon) || self.intent.draft_lists_times(&draft) {
            match self
                .ground(&mut session, &draft, &signals, explicit.as_ref(), phone, now)
                .await
            {
                Ok(grounded) => final_reply = grounded,
                Err(e) => {
                    // Graceful degradation: the draft may hedge, but it is
                    // never an invented slot list with a broken pipeline.
                    warn!("Grounding failed for {}, using draft: {}", phone, e);
                }
            }
        }

        // A picked explicit time while choices were pending moves the dialog on.
        if session.stage == Stage::AwaitingSlotChoice {
            if let Some(m) = &explicit {
                if session.last_slots.iter().any(|s| s.start_time == m.start) {
                    session.stage = Stage::CollectingDetails;
                }
            }
        }

        let final_reply = self.strip_hedging(&final_reply);

        if self.booking.matches_confirmation(&final_reply) {
            session.stage = Stage::Confirmed;
        }
        self.dispatch_side_effects(phone, &final_reply, &session.render_context(), now);

        session.push(MessageRole::Assistant, &final_reply, now);
        if self.intent.is_invite(&final_reply) {
            session.last_invite_at = Some(now);
        }

        final_reply
    }

    /// Second half of the two-pass protocol: resolve the pagination cursor,
    /// fetch real slots, and re-generate against them.
    async fn ground(
        &self,
        session: &mut crate::models::ConversationSession,
        draft: &str,
        signals: &IntentSignals,
        explicit: Option<&DateTimeMatch>,
        phone: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ConversationError> {
        // Anchor: the draft's date wins, then the patient's own words.
        let anchor = self
            .datetime
            .extract(draft, now)
            .filter(|m| m.start > now)
            .or_else(|| explicit.filter(|m| m.start > now).cloned());

        let cursor = if let Some(anchor) = &anchor {
            self.local_day_start(anchor.start)
        } else if signals.more_dates {
            match session.offer_from {
                Some(prior) => prior + Duration::days(PAGE_DAYS),
                None => now,
            }
        } else {
            now
        };
        session.offer_from = Some(cursor);

        let slots = self
            .resolver
            .resolve(cursor, SEARCH_DAYS, PER_DAY_CAP, TOTAL_CAP)
            .await
            .map_err(|e| ConversationError::Availability(e.to_string()))?;

        let ranked = match &anchor {
            Some(anchor) => rank_by_proximity(slots, anchor.start),
            None => slots,
        };
        let offer: Vec<Slot> = ranked.into_iter().take(OFFER_LIMIT).collect();

        info!(
            "Grounding reply for {} with {} verified slots (anchor: {:?})",
            phone,
            offer.len(),
            anchor.as_ref().map(|a| a.start)
        );

        session.last_slots = offer.clone();
        session.last_list_at = Some(now);
        session.stage = Stage::AwaitingSlotChoice;

        if offer.is_empty() {
            return Ok(NO_AVAILABILITY_REPLY.to_string());
        }

        let context = format!(
            "{}\n{}",
            session.render_context(),
            grounding_block(&offer)
        );
        let reply = self.respond_bounded(&context, phone).await?;
        Ok(reply)
    }

    async fn respond_bounded(&self, context: &str, phone: &str) -> Result<String, ConversationError> {
        match tokio::time::timeout(self.responder_timeout, self.responder.respond(context, phone))
            .await
        {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(ConversationError::Responder(e.to_string())),
            Err(_) => Err(ConversationError::Responder(format!(
                "timed out after {:?}",
                self.responder_timeout
            ))),
        }
    }

    /// Booking and cancellation run after the reply decision, off the send
    /// path, each with its own error containment.
    fn dispatch_side_effects(
        &self,
        phone: &str,
        final_reply: &str,
        transcript: &str,
        now: DateTime<Utc>,
    ) {
        if self.booking.matches_confirmation(final_reply) {
            let booking = Arc::clone(&self.booking);
            let reply = final_reply.to_string();
            let transcript = transcript.to_string();
            let phone = phone.to_string();
            tokio::spawn(async move {
                match booking.confirm_booking(&reply, &transcript, &phone, now).await {
                    Ok(Some(event)) => info!("Booking confirmed, event {}", event.id),
                    Ok(None) => debug!("No event created for {}", phone),
                    Err(e) => error!("Booking side-effect failed for {}: {}", phone, e),
                }
            });
        }

        if self.booking.matches_cancellation(final_reply) {
            let sink = Arc::clone(&self.cancellation);
            let reply = final_reply.to_string();
            let phone = phone.to_string();
            tokio::spawn(async move {
                if let Err(e) = sink.forward(&phone, &reply).await {
                    error!("Cancellation forwarding failed for {}: {}", phone, e);
                }
            });
        }
    }

    /// Hedging left over from a first-pass draft ("I'll check availability")
    /// would mislead once the reply already carries the real answer.
    fn strip_hedging(&self, reply: &str) -> String {
        let stripped = self.hedging.replace_all(reply, "");
        let collapsed = self.whitespace.replace_all(stripped.trim(), " ");
        let cleaned = collapsed.trim().to_string();
        if cleaned.is_empty() {
            reply.to_string()
        } else {
            cleaned
        }
    }

    fn local_day_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let day = instant.with_timezone(&self.offset).date_naive();
        self.offset
            .from_local_datetime(&day.and_time(chrono::NaiveTime::MIN))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(instant)
    }
}

/// Machine-readable grounding context for the second pass.
fn grounding_block(offer: &[Slot]) -> String {
    let mut block = String::from(
        "Context: VERIFIED AVAILABILITY\n\
         The slots below were fetched from the live calendar and are free.\n\
         Rules:\n\
         - Offer ONLY times from this list. Never state or imply any other time.\n\
         - Present at most 6 options, nearest first, numbered 1-6.\n\
         - Do not offer any day not present in this list.\n\
         - Do not ask again whether they want to see times; these are the times.\n\
         - Only after the patient picks a slot, collect: full name, age, phone \
           number, reason (consultation or follow-up) and modality (in-person or \
           virtual).\n\
         - To finalize a booking reply with the exact sentence: \
           \"Your appointment is confirmed for <day> at <HH:MM>.\" using the \
           chosen slot's label.\n\
         Slots:\n",
    );
    for (i, slot) in offer.iter().enumerate() {
        block.push_str(&format!(
            "{}. {} ({})\n",
            i + 1,
            slot.display_label,
            slot.start_time.to_rfc3339()
        ));
    }
    block
}
