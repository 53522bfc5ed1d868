use regex::Regex;

/// Signals extracted from one raw patient message, independent of any
/// generated draft.
#[derive(Debug, Clone, Default)]
pub struct IntentSignals {
    pub schedule_keyword: bool,
    pub affirmation: bool,
    pub more_dates: bool,
}

/// Regex-backed intent detection over unstructured patient text and over
/// draft replies from the responder.
pub struct IntentExtractor {
    schedule: Regex,
    affirmation: Regex,
    more_dates: Regex,
    option_choice: Regex,
    reset: Regex,
    draft_lists: Regex,
    invite: Regex,
}

/// Internal marker a draft may carry to force a real availability lookup.
pub const AVAILABILITY_MARKER: &str = "[CHECK_AVAILABILITY]";

impl IntentExtractor {
    pub fn new() -> Self {
        Self {
            schedule: Regex::new(
                r"(?i)\b(appointment|book|booking|schedule|reschedule|availab\w*|free slot|slot|see the doctor|visit|consultation)\b",
            )
            .unwrap(),
            affirmation: Regex::new(
                r"(?i)^\s*(yes|yeah|yep|sure|ok|okay|sounds good|perfect|great|please)\b[\s,!.]*(please|thanks|thank you)?[\s!.]*$",
            )
            .unwrap(),
            more_dates: Regex::new(
                r"(?i)\b(more (dates|options|times|slots)|other (days|dates|times)|something later|further (ahead|out)|next week)\b",
            )
            .unwrap(),
            option_choice: Regex::new(r"(?i)^\s*(?:option\s*)?([1-9]\d?)\s*$").unwrap(),
            reset: Regex::new(r"(?i)^\s*(reset|start over|restart)\s*$").unwrap(),
            draft_lists: Regex::new(
                r"(?i)\b(here are (?:the |some )?(?:times|options|slots)|times i can offer|following (?:times|slots|options))\b",
            )
            .unwrap(),
            invite: Regex::new(
                r"(?i)\b(would you like (me )?to (see|show|check|look)|shall i (show|check)|want (me )?to (show|check)|like to see (the )?(available )?(times|dates|slots)|shall we find a time)\b",
            )
            .unwrap(),
        }
    }

    pub fn signals(&self, text: &str) -> IntentSignals {
        IntentSignals {
            schedule_keyword: self.schedule.is_match(text),
            affirmation: self.affirmation.is_match(text),
            more_dates: self.more_dates.is_match(text),
        }
    }

    /// Bare `N` or `option N` messages; returns the 1-based choice.
    pub fn option_choice(&self, text: &str) -> Option<usize> {
        self.option_choice
            .captures(text)
            .and_then(|caps| caps[1].parse().ok())
    }

    pub fn is_reset(&self, text: &str) -> bool {
        self.reset.is_match(text)
    }

    /// Does a draft reply already commit to listing times? Together with the
    /// explicit marker this catches intent the patient-side signals missed.
    pub fn draft_lists_times(&self, draft: &str) -> bool {
        draft.contains(AVAILABILITY_MARKER) || self.draft_lists.is_match(draft)
    }

    /// Inviting phrases: "would you like to see available times" and friends.
    pub fn is_invite(&self, reply: &str) -> bool {
        self.invite.is_match(reply)
    }
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_scheduling_keywords() {
        let intent = IntentExtractor::new();
        assert!(intent.signals("I need to book an appointment").schedule_keyword);
        assert!(intent.signals("when are you available?").schedule_keyword);
        assert!(!intent.signals("what are your prices?").schedule_keyword);
    }

    #[test]
    fn affirmations_must_be_short() {
        let intent = IntentExtractor::new();
        assert!(intent.signals("yes please").affirmation);
        assert!(intent.signals("Sure!").affirmation);
        assert!(!intent.signals("yes but first tell me how much a visit costs").affirmation);
    }

    #[test]
    fn detects_more_dates_requests() {
        let intent = IntentExtractor::new();
        assert!(intent.signals("can you show me more dates?").more_dates);
        assert!(intent.signals("do you have other times").more_dates);
        assert!(!intent.signals("that time works").more_dates);
    }

    #[test]
    fn option_choice_parses_bare_and_prefixed() {
        let intent = IntentExtractor::new();
        assert_eq!(intent.option_choice("3"), Some(3));
        assert_eq!(intent.option_choice(" option 2 "), Some(2));
        assert_eq!(intent.option_choice("I'll take 3"), None);
        assert_eq!(intent.option_choice("0"), None);
    }

    #[test]
    fn draft_signals_and_marker() {
        let intent = IntentExtractor::new();
        assert!(intent.draft_lists_times("Here are the times I found:"));
        assert!(intent.draft_lists_times("Sure. [CHECK_AVAILABILITY]"));
        assert!(!intent.draft_lists_times("Our clinic is on Main St."));
        // An invite is a question, not a commitment to list
        assert!(!intent.draft_lists_times("Would you like me to check available times?"));
    }

    #[test]
    fn invites_are_recognized() {
        let intent = IntentExtractor::new();
        assert!(intent.is_invite("Would you like me to check available times?"));
        assert!(!intent.is_invite("Your appointment is confirmed."));
    }

    #[test]
    fn reset_phrases() {
        let intent = IntentExtractor::new();
        assert!(intent.is_reset("reset"));
        assert!(intent.is_reset(" Start over "));
        assert!(!intent.is_reset("please reset my password"));
    }
}
