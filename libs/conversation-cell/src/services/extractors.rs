use regex::Regex;

/// Everything an extractor may draw on when pulling a patient detail out of
/// the conversation.
pub struct ExtractionContext<'a> {
    /// Rendered transcript of the bounded history.
    pub transcript: &'a str,
    /// Sender identifier from the message channel.
    pub phone: &'a str,
}

/// One strategy for recovering a patient field. Strategies are tried in
/// order; the first hit wins and the chain's fallback closes the gap, so a
/// field is never left blank.
pub trait FieldExtractor: Send + Sync {
    fn extract(&self, ctx: &ExtractionContext) -> Option<String>;
}

pub struct FieldExtractorChain {
    extractors: Vec<Box<dyn FieldExtractor>>,
    fallback: String,
}

impl FieldExtractorChain {
    pub fn new(extractors: Vec<Box<dyn FieldExtractor>>, fallback: &str) -> Self {
        Self {
            extractors,
            fallback: fallback.to_string(),
        }
    }

    pub fn resolve(&self, ctx: &ExtractionContext) -> String {
        self.extractors
            .iter()
            .find_map(|e| e.extract(ctx))
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Explicitly labeled fields, e.g. "Name: Jane Doe".
struct LabeledField {
    pattern: Regex,
}

impl FieldExtractor for LabeledField {
    fn extract(&self, ctx: &ExtractionContext) -> Option<String> {
        self.pattern
            .captures(ctx.transcript)
            .map(|caps| caps[1].trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Conversational phrasing, e.g. "my name is Jane".
struct ConversationalPhrase {
    pattern: Regex,
}

impl FieldExtractor for ConversationalPhrase {
    fn extract(&self, ctx: &ExtractionContext) -> Option<String> {
        self.pattern
            .captures(ctx.transcript)
            .map(|caps| caps[1].trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Candidates embedded anywhere in the text, mapped onto a closed value set.
struct EmbeddedCandidate {
    pattern: Regex,
    value: &'static str,
}

impl FieldExtractor for EmbeddedCandidate {
    fn extract(&self, ctx: &ExtractionContext) -> Option<String> {
        self.pattern
            .is_match(ctx.transcript)
            .then(|| self.value.to_string())
    }
}

/// A raw phone-shaped token anywhere in the transcript.
struct EmbeddedPhone {
    pattern: Regex,
}

impl FieldExtractor for EmbeddedPhone {
    fn extract(&self, ctx: &ExtractionContext) -> Option<String> {
        self.pattern
            .find(ctx.transcript)
            .map(|m| m.as_str().to_string())
    }
}

/// Metadata the channel already knows about the sender.
struct SenderPhone;

impl FieldExtractor for SenderPhone {
    fn extract(&self, ctx: &ExtractionContext) -> Option<String> {
        (!ctx.phone.is_empty()).then(|| ctx.phone.to_string())
    }
}

pub fn name_chain() -> FieldExtractorChain {
    FieldExtractorChain::new(
        vec![
            Box::new(LabeledField {
                pattern: Regex::new(r"(?im)^\s*(?:Patient:\s*)?name\s*:\s*([A-Za-z][A-Za-z .'-]{1,60})$").unwrap(),
            }),
            Box::new(ConversationalPhrase {
                pattern: Regex::new(r"(?i)\bmy name is\s+([A-Za-z][A-Za-z .'-]{1,60}?)(?:[,.!\n]|$)")
                    .unwrap(),
            }),
            Box::new(ConversationalPhrase {
                pattern: Regex::new(r"(?i)\bi(?:'| a)m\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\b").unwrap(),
            }),
        ],
        "Patient",
    )
}

pub fn phone_chain() -> FieldExtractorChain {
    FieldExtractorChain::new(
        vec![
            Box::new(LabeledField {
                pattern: Regex::new(r"(?im)\bphone\s*:\s*(\+?[\d\s-]{7,20})").unwrap(),
            }),
            Box::new(EmbeddedPhone {
                pattern: Regex::new(r"\+?\d[\d\s-]{6,14}\d").unwrap(),
            }),
            Box::new(SenderPhone),
        ],
        "unknown",
    )
}

/// Reason comes from a closed two-option set.
pub fn reason_chain() -> FieldExtractorChain {
    FieldExtractorChain::new(
        vec![
            Box::new(LabeledField {
                pattern: Regex::new(r"(?im)\breason\s*:\s*([^\n]{2,80})").unwrap(),
            }),
            Box::new(EmbeddedCandidate {
                pattern: Regex::new(r"(?i)\bfollow[\s-]?up\b").unwrap(),
                value: "follow-up",
            }),
            Box::new(EmbeddedCandidate {
                pattern: Regex::new(r"(?i)\b(consultation|check[\s-]?up|first (visit|time))\b").unwrap(),
                value: "consultation",
            }),
        ],
        "consultation",
    )
}

pub fn modality_chain() -> FieldExtractorChain {
    FieldExtractorChain::new(
        vec![
            Box::new(LabeledField {
                pattern: Regex::new(r"(?im)\bmodality\s*:\s*([^\n]{2,40})").unwrap(),
            }),
            Box::new(EmbeddedCandidate {
                pattern: Regex::new(r"(?i)\b(video|virtual|online|remote|telehealth)\b").unwrap(),
                value: "virtual",
            }),
            Box::new(EmbeddedCandidate {
                pattern: Regex::new(r"(?i)\b(in[\s-]?person|at the (clinic|office)|come in)\b").unwrap(),
                value: "in-person",
            }),
        ],
        "in-person",
    )
}
