//! **buglink** - Link bugs to feature requests and grade feature quality
//!
//! An LLM oracle classifies each bug against the candidate features, biased by a
//! persistent log of past corrections. Linked bugs then drive a deterministic
//! per-feature quality score and letter grade.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core pipeline - records, scoring, similarity, feedback and classification
pub mod core {
    /// Lenient timestamp parsing and whole-day arithmetic
    pub mod timestamp;

    /// Bug/feature records, shape normalization and the bug→feature link graph
    pub mod records;
    pub use records::{BugRecord, FeatureRecord, LinkGraph};

    /// Bag-of-words Jaccard similarity over titles
    pub mod similarity;
    pub use similarity::{Jaccard, TextSimilarity, similarity};

    /// Persistent correction log with similarity retrieval
    pub mod feedback;
    pub use feedback::{CsvFeedbackLog, FeedbackEntry, FeedbackLog, FeedbackStore};

    /// Deterministic feature quality scoring and grading
    pub mod quality;
    pub use quality::{QualityGrade, QualityReport, QualityScorer, ScoringPolicy};

    /// Oracle trait and the chat-completions transport
    pub mod oracle;
    pub use oracle::{ChatCompletionsOracle, Oracle, OracleError, OracleRequest};

    /// Two-stage prompt construction and answer parsing
    pub mod advisor;
    pub use advisor::{Classification, ClassificationAdvisor, parse_analysis_result};

    /// Sequential batch classification and record enrichment
    pub mod batch;
    pub use batch::{BugClassification, classify_all, enrich_bugs};

    /// Portfolio and classification-run roll-ups
    pub mod summary;
    pub use summary::{BugStatistics, QualitySummary};
}

/// Command handlers wired from `main`
pub mod cli_ext {
    pub mod classify_cmd;
    pub mod feedback_cmd;
    pub mod score_cmd;
}

/// Infrastructure - Configuration and report output
pub mod infra {
    /// Layered configuration (file + BUGLINK__ environment) and `init`
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// JSON/CSV/table rendering and output writing
    pub mod report;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use cli_ext::{classify_cmd::run as classify_run, feedback_cmd::run as feedback_run, score_cmd::run as score_run};
pub use infra::{Config, load_config};
