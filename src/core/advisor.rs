//! Two-stage bug → feature classification through an external oracle.
//!
//! Stage one asks the oracle for salient keywords. Stage two sends the
//! bug, those keywords, the candidate features and any relevant past
//! corrections, and expects a three-line answer:
//!
//! ```text
//! FeatureID: <id or "undetermined">
//! Confidence: <High|Medium|Low|none>
//! Reason: <at most three sentences>
//! ```
//!
//! A failed oracle call yields an `undetermined` result instead of an
//! error so a batch keeps going. Only caller bugs (no candidates) are
//! returned as [`AdvisorError`].

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{
    feedback::FeedbackStore,
    oracle::{Oracle, OracleConfig, OracleError, OracleRequest},
    records::{FeatureRecord, UNDETERMINED},
};

const FEATURE_ID_PREFIX: &str = "FeatureID:";
const CONFIDENCE_PREFIX: &str = "Confidence:";
const REASON_PREFIX: &str = "Reason:";

/// Confidence reported when the answer carries none
pub const UNKNOWN_CONFIDENCE: &str = "unknown";

/// Caller-side precondition failures.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError
{
    #[error("no candidate features supplied; nothing to classify against")]
    NoCandidates,

    #[error("failed to encode candidate features: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Parsed oracle answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification
{
    pub feature_id: String,
    pub confidence: String,
    pub reason: String,
}

impl Default for Classification
{
    fn default() -> Self
    {
        Self {
            feature_id: UNDETERMINED.to_string(),
            confidence: UNKNOWN_CONFIDENCE.to_string(),
            reason: String::new(),
        }
    }
}

/// Coarse reading of a free-form confidence label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfidenceLevel
{
    High,
    Medium,
    Low,
    Unknown,
}

impl ConfidenceLevel
{
    pub fn from_label(label: &str) -> Self
    {
        match label
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "high" => ConfidenceLevel::High,
            "medium" => ConfidenceLevel::Medium,
            "low" => ConfidenceLevel::Low,
            _ => ConfidenceLevel::Unknown,
        }
    }
}

impl Classification
{
    pub fn confidence_level(&self) -> ConfidenceLevel
    {
        ConfidenceLevel::from_label(&self.confidence)
    }

    /// True when the oracle named an actual feature
    pub fn is_determined(&self) -> bool
    {
        !self
            .feature_id
            .eq_ignore_ascii_case(UNDETERMINED)
    }
}

/// Parse the three-line answer. Lines are matched on their exact labeled
/// prefix after trimming; the remainder, trimmed, is the value. Missing
/// or empty fields keep their defaults, and arbitrary text never fails.
pub fn parse_analysis_result(text: &str) -> Classification
{
    let mut out = Classification::default();

    for line in text.lines()
    {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(FEATURE_ID_PREFIX)
        {
            let value = rest.trim();
            if !value.is_empty()
            {
                out.feature_id = value.to_string();
            }
        }
        else if let Some(rest) = line.strip_prefix(CONFIDENCE_PREFIX)
        {
            let value = rest.trim();
            if !value.is_empty()
            {
                out.confidence = value.to_string();
            }
        }
        else if let Some(rest) = line.strip_prefix(REASON_PREFIX)
        {
            out.reason = rest
                .trim()
                .to_string();
        }
    }

    out
}

/// Result of one classification, including the raw oracle text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorOutcome
{
    pub classification: Classification,
    pub raw_response: String,
    /// Set when the oracle call failed and the result is a fallback
    pub error: Option<String>,
}

impl AdvisorOutcome
{
    fn failed(err: &OracleError) -> Self
    {
        let message = format!("oracle call failed: {err}");
        warn!(error = %err, "classification fell back to undetermined");
        Self {
            classification: Classification {
                reason: message.clone(),
                ..Default::default()
            },
            raw_response: message.clone(),
            error: Some(message),
        }
    }
}

/// Sampling parameters for the two stages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSettings
{
    pub keyword_temperature: f32,
    pub keyword_max_tokens: u32,
    pub classify_temperature: f32,
    pub classify_max_tokens: u32,
}

impl Default for StageSettings
{
    fn default() -> Self
    {
        Self::from(&OracleConfig::default())
    }
}

impl From<&OracleConfig> for StageSettings
{
    fn from(c: &OracleConfig) -> Self
    {
        Self {
            keyword_temperature: c.keyword_temperature,
            keyword_max_tokens: c.keyword_max_tokens,
            classify_temperature: c.classify_temperature,
            classify_max_tokens: c.classify_max_tokens,
        }
    }
}

/// Builds oracle requests for a bug and parses the answers.
pub struct ClassificationAdvisor<'a, O: Oracle + ?Sized>
{
    oracle: &'a O,
    feedback: Option<&'a FeedbackStore>,
    settings: StageSettings,
}

impl<'a, O: Oracle + ?Sized> ClassificationAdvisor<'a, O>
{
    pub fn new(oracle: &'a O) -> Self
    {
        Self {
            oracle,
            feedback: None,
            settings: StageSettings::default(),
        }
    }

    /// Bias requests with past corrections from `store`.
    pub fn with_feedback(
        mut self,
        store: &'a FeedbackStore,
    ) -> Self
    {
        self.feedback = Some(store);
        self
    }

    pub fn with_settings(
        mut self,
        settings: StageSettings,
    ) -> Self
    {
        self.settings = settings;
        self
    }

    /// Classify one bug against `candidates`.
    pub fn classify(
        &self,
        title: &str,
        description: &str,
        candidates: &[FeatureRecord],
    ) -> Result<AdvisorOutcome, AdvisorError>
    {
        if candidates.is_empty()
        {
            return Err(AdvisorError::NoCandidates);
        }
        let features_json = serde_json::to_string_pretty(candidates)?;

        let keywords = match self
            .oracle
            .complete(&OracleRequest {
                prompt: keyword_prompt(title, description),
                temperature: self
                    .settings
                    .keyword_temperature,
                max_tokens: self
                    .settings
                    .keyword_max_tokens,
            })
        {
            Ok(k) => k,
            Err(e) => return Ok(AdvisorOutcome::failed(&e)),
        };
        debug!(keywords = %keywords.replace('\n', ", "), "keyword stage done");

        let fragment = self
            .feedback
            .map(|store| store.render_prompt_fragment(title, description))
            .unwrap_or_default();

        let prompt = classification_prompt(title, description, &keywords, &features_json, &fragment);

        match self
            .oracle
            .complete(&OracleRequest {
                prompt,
                temperature: self
                    .settings
                    .classify_temperature,
                max_tokens: self
                    .settings
                    .classify_max_tokens,
            })
        {
            Ok(raw) =>
            {
                let classification = parse_analysis_result(&raw);
                debug!(
                    feature = %classification.feature_id,
                    confidence = %classification.confidence,
                    "classification stage done"
                );
                Ok(AdvisorOutcome {
                    classification,
                    raw_response: raw,
                    error: None,
                })
            }
            Err(e) => Ok(AdvisorOutcome::failed(&e)),
        }
    }
}

/// Stage one: keyword extraction.
pub fn keyword_prompt(
    title: &str,
    description: &str,
) -> String
{
    format!(
        "Analyze the title and description of the following bug report and extract \
         5-10 keywords or short phrases that would help decide which feature request \
         the bug belongs to.\n\
         \n\
         Title: {title}\n\
         Description: {description}\n\
         \n\
         Return only the keywords or phrases, one per line, with no other explanation.\n"
    )
}

/// Stage two: the classification request. `feedback` may be empty.
pub fn classification_prompt(
    title: &str,
    description: &str,
    keywords: &str,
    features_json: &str,
    feedback: &str,
) -> String
{
    let feedback = if feedback.is_empty()
    {
        String::new()
    }
    else
    {
        format!("{}\n\n", feedback.trim_end())
    };

    format!(
        "You are an expert in software defect triage. Match the bug below to the single \
         most relevant feature request.\n\
         \n\
         Bug:\n\
         - Title: {title}\n\
         - Description: {description}\n\
         - Extracted keywords:\n\
         {keywords}\n\
         \n\
         Candidate feature requests:\n\
         {features_json}\n\
         \n\
         {feedback}\
         Steps:\n\
         1. Read the bug title, description and keywords carefully.\n\
         2. Consider the scope and focus of each feature request.\n\
         3. Look for technical or functional overlap between the bug and each feature.\n\
         4. Consider shared code modules, user flows and functional areas.\n\
         5. Pick the most likely feature.\n\
         \n\
         Your answer must use exactly this format:\n\
         {FEATURE_ID_PREFIX} <id of the most relevant feature>\n\
         {CONFIDENCE_PREFIX} <High|Medium|Low>\n\
         {REASON_PREFIX} <short justification, at most 3 sentences>\n\
         \n\
         If no feature can be determined, answer:\n\
         {FEATURE_ID_PREFIX} {UNDETERMINED}\n\
         {CONFIDENCE_PREFIX} none\n\
         {REASON_PREFIX} <why it cannot be determined>\n"
    )
}

#[cfg(test)]
mod tests
{
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    use super::*;
    use crate::core::feedback::{FeedbackEntry, FeedbackError, FeedbackLog};

    /// Replays canned answers and remembers every prompt
    #[derive(Default)]
    struct Scripted
    {
        answers: RefCell<VecDeque<Result<String, OracleError>>>,
        prompts: RefCell<Vec<OracleRequest>>,
    }

    impl Scripted
    {
        fn new(answers: Vec<Result<String, OracleError>>) -> Self
        {
            Self {
                answers: RefCell::new(answers.into()),
                prompts: RefCell::default(),
            }
        }
    }

    impl Oracle for Scripted
    {
        fn complete(
            &self,
            request: &OracleRequest,
        ) -> Result<String, OracleError>
        {
            self.prompts
                .borrow_mut()
                .push(request.clone());
            self.answers
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(OracleError::Empty))
        }
    }

    #[derive(Default, Clone)]
    struct MemLog(Rc<RefCell<Vec<FeedbackEntry>>>);

    impl FeedbackLog for MemLog
    {
        fn load(&self) -> Result<Vec<FeedbackEntry>, FeedbackError>
        {
            Ok(self
                .0
                .borrow()
                .clone())
        }

        fn append(
            &self,
            entry: &FeedbackEntry,
        ) -> Result<(), FeedbackError>
        {
            self.0
                .borrow_mut()
                .push(entry.clone());
            Ok(())
        }
    }

    fn candidates() -> Vec<FeatureRecord>
    {
        vec![
            FeatureRecord {
                key: "FEAT-1".into(),
                summary: "User login".into(),
            },
            FeatureRecord {
                key: "FEAT-2".into(),
                summary: "Data export".into(),
            },
        ]
    }

    #[test]
    fn test_parse_well_formed()
    {
        let c = parse_analysis_result(
            "FeatureID: FEAT-2\nConfidence: High\nReason: The export button fails. It is in scope.",
        );
        assert_eq!(c.feature_id, "FEAT-2");
        assert_eq!(c.confidence, "High");
        assert_eq!(c.reason, "The export button fails. It is in scope.");
        assert_eq!(c.confidence_level(), ConfidenceLevel::High);
        assert!(c.is_determined());
    }

    #[test]
    fn test_parse_tolerates_noise_and_indentation()
    {
        let c = parse_analysis_result(
            "Sure! Here is my analysis.\n   FeatureID:   FEAT-1  \n\nConfidence: Medium\nnot a field: x\n",
        );
        assert_eq!(c.feature_id, "FEAT-1");
        assert_eq!(c.confidence, "Medium");
        assert_eq!(c.reason, "");
    }

    #[test]
    fn test_parse_unstructured_defaults()
    {
        for text in ["", "no idea", "featureid: lowercase does not count\n", "\n\n"]
        {
            assert_eq!(parse_analysis_result(text), Classification::default(), "{text:?}");
        }
    }

    #[test]
    fn test_parse_single_line_answer()
    {
        assert_eq!(parse_analysis_result("FeatureID: FEAT-9").feature_id, "FEAT-9");
    }

    #[test]
    fn test_empty_candidates_is_caller_error()
    {
        let oracle = Scripted::default();
        let advisor = ClassificationAdvisor::new(&oracle);
        let err = advisor
            .classify("t", "d", &[])
            .unwrap_err();
        assert!(matches!(err, AdvisorError::NoCandidates));
        assert!(
            oracle
                .prompts
                .borrow()
                .is_empty()
        );
    }

    #[test]
    fn test_two_stage_protocol()
    {
        let oracle = Scripted::new(vec![
            Ok("login\nsubmit button".into()),
            Ok("FeatureID: FEAT-1\nConfidence: High\nReason: Login flow.".into()),
        ]);
        let advisor = ClassificationAdvisor::new(&oracle);

        let outcome = advisor
            .classify("Login crash", "Crashes on submit", &candidates())
            .unwrap();
        assert_eq!(outcome.classification.feature_id, "FEAT-1");
        assert_eq!(outcome.error, None);

        let prompts = oracle
            .prompts
            .borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].prompt.contains("Title: Login crash"));
        assert_eq!(prompts[0].temperature, 0.3);
        assert_eq!(prompts[0].max_tokens, 150);

        let second = &prompts[1];
        assert!(second.prompt.contains("submit button"));
        assert!(second.prompt.contains("\"key\": \"FEAT-2\""));
        assert!(!second.prompt.contains("Past corrections"));
        assert_eq!(second.max_tokens, 250);
    }

    #[test]
    fn test_feedback_fragment_is_injected()
    {
        let mut store = FeedbackStore::open(MemLog::default()).unwrap();
        store
            .record(FeedbackEntry::now("B-0", "Login crash", "FEAT-2", "FEAT-1", Some("auth")))
            .unwrap();

        let oracle = Scripted::new(vec![Ok("login".into()), Ok("FeatureID: FEAT-1".into())]);
        let advisor = ClassificationAdvisor::new(&oracle).with_feedback(&store);
        advisor
            .classify("Login crash", "", &candidates())
            .unwrap();

        let prompts = oracle
            .prompts
            .borrow();
        assert!(prompts[1].prompt.contains("Past corrections for similar bugs"));
        assert!(prompts[1].prompt.contains("should be 'FEAT-1'"));
    }

    #[test]
    fn test_oracle_failure_degrades_to_undetermined()
    {
        let oracle = Scripted::new(vec![
            Ok("kw".into()),
            Err(OracleError::Status {
                status: 429,
                body: "quota".into(),
            }),
        ]);
        let advisor = ClassificationAdvisor::new(&oracle);

        let outcome = advisor
            .classify("t", "d", &candidates())
            .unwrap();
        assert_eq!(outcome.classification.feature_id, UNDETERMINED);
        assert_eq!(outcome.classification.confidence, UNKNOWN_CONFIDENCE);
        assert!(
            outcome
                .error
                .as_deref()
                .is_some_and(|e| e.contains("429"))
        );
    }

    #[test]
    fn test_keyword_failure_skips_second_stage()
    {
        let oracle = Scripted::new(vec![Err(OracleError::Empty)]);
        let advisor = ClassificationAdvisor::new(&oracle);

        let outcome = advisor
            .classify("t", "d", &candidates())
            .unwrap();
        assert!(!outcome.classification.is_determined());
        assert_eq!(
            oracle
                .prompts
                .borrow()
                .len(),
            1
        );
    }
}
