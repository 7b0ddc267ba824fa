//! Heuristic task classification
//!
//! Derives category, complexity, token estimates, and timing needs from a
//! normalized request. Keyword tables are plain data so deployments can
//! tune them without code changes.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use switchyard_config::ClassifierConfig;
use switchyard_core::{CompletionRequest, Features, TaskCategory};
use tiktoken_rs::{CoreBPE, o200k_base};

/// Fewer input tokens than this is always trivial
const TRIVIAL_TOKEN_CEILING: u64 = 12;

/// More input tokens than this is at least complex
const COMPLEX_TOKEN_FLOOR: u64 = 3_000;

/// More input tokens than this is always expert
const EXPERT_TOKEN_FLOOR: u64 = 8_000;

/// Bonus hits awarded to code generation when a code fence is present
const CODE_FENCE_BONUS: usize = 2;

static BPE: LazyLock<Option<CoreBPE>> = LazyLock::new(|| o200k_base().ok());

static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```[\w+-]*\n").expect("must be valid regex"));

/// Ordered difficulty of a task
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Complexity {
    Trivial,
    Simple,
    Medium,
    Complex,
    Expert,
}

impl Complexity {
    /// One level harder, saturating at expert
    pub const fn harder(self) -> Self {
        match self {
            Self::Trivial => Self::Simple,
            Self::Simple => Self::Medium,
            Self::Medium => Self::Complex,
            Self::Complex | Self::Expert => Self::Expert,
        }
    }

    /// One level easier, saturating at trivial
    pub const fn easier(self) -> Self {
        match self {
            Self::Trivial | Self::Simple => Self::Trivial,
            Self::Medium => Self::Simple,
            Self::Complex => Self::Medium,
            Self::Expert => Self::Complex,
        }
    }

    /// Output tokens assumed when the request sets no `max_tokens`
    pub const fn default_output_tokens(self) -> u64 {
        match self {
            Self::Trivial => 100,
            Self::Simple => 300,
            Self::Medium => 800,
            Self::Complex => 1_500,
            Self::Expert => 3_000,
        }
    }
}

/// How soon the caller needs an answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeConstraint {
    Realtime,
    #[default]
    Normal,
    Batch,
}

/// How much answer quality matters
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QualityRequirement {
    Low,
    Medium,
    High,
}

/// Estimated token usage for a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

/// Everything routing needs to know about a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskClassification {
    pub complexity: Complexity,
    pub category: TaskCategory,
    pub estimated_tokens: TokenEstimate,
    pub requires_reasoning: bool,
    pub time_constraint: TimeConstraint,
    pub quality_requirement: QualityRequirement,
    /// Provider features the request cannot be served without
    pub required_features: Features,
}

/// Keyword sets per category, plus complexity and timing markers
#[derive(Debug, Clone)]
pub struct KeywordTable {
    categories: IndexMap<TaskCategory, Vec<String>>,
    reasoning: Vec<String>,
    expert_markers: Vec<String>,
    complex_markers: Vec<String>,
    simple_markers: Vec<String>,
    urgent_markers: Vec<String>,
    batch_markers: Vec<String>,
}

impl KeywordTable {
    /// Built-in tables with configured overrides applied
    ///
    /// A configured category replaces that category's default keywords;
    /// unlisted categories keep theirs.
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut table = Self::default();

        for (category, keywords) in &config.keywords {
            table
                .categories
                .insert(*category, keywords.iter().map(|k| k.to_lowercase()).collect());
        }

        if let Some(ref reasoning) = config.reasoning_keywords {
            table.reasoning = reasoning.iter().map(|k| k.to_lowercase()).collect();
        }

        table
    }

    pub fn keywords(&self, category: TaskCategory) -> &[String] {
        self.categories.get(&category).map_or(&[][..], Vec::as_slice)
    }
}

impl Default for KeywordTable {
    fn default() -> Self {
        let categories = [
            (
                TaskCategory::CodeGeneration,
                &[
                    "implement",
                    "write a function",
                    "write code",
                    "write a program",
                    "create a class",
                    "generate",
                    "scaffold",
                    "function that",
                    "script",
                ][..],
            ),
            (
                TaskCategory::CodeReview,
                &["review", "code review", "feedback on", "pull request", "is this idiomatic", "critique"][..],
            ),
            (
                TaskCategory::Debugging,
                &[
                    "debug",
                    "bug",
                    "error",
                    "exception",
                    "stack trace",
                    "panic",
                    "crash",
                    "doesn't work",
                    "fails",
                    "fix",
                ][..],
            ),
            (
                TaskCategory::Architecture,
                &[
                    "architecture",
                    "design a system",
                    "system design",
                    "microservice",
                    "scalab",
                    "high-level design",
                    "component diagram",
                ][..],
            ),
            (
                TaskCategory::Testing,
                &["unit test", "test case", "integration test", "coverage", "mock", "property test", "write tests"][..],
            ),
            (
                TaskCategory::Documentation,
                &["document", "docstring", "readme", "explain what", "comment", "tutorial", "changelog"][..],
            ),
            (
                TaskCategory::Optimization,
                &["optimiz", "performance", "faster", "speed up", "latency", "memory usage", "profil", "bottleneck"][..],
            ),
            (
                TaskCategory::Security,
                &[
                    "security",
                    "vulnerab",
                    "exploit",
                    "injection",
                    "xss",
                    "csrf",
                    "authenticat",
                    "encrypt",
                    "cve",
                ][..],
            ),
            (TaskCategory::General, &[][..]),
        ];

        Self {
            categories: categories
                .into_iter()
                .map(|(category, keywords)| (category, owned(keywords)))
                .collect(),
            reasoning: owned(&[
                "why",
                "explain",
                "step by step",
                "reason about",
                "analyze",
                "analyse",
                "compare",
                "trade-off",
                "tradeoff",
                "prove",
                "evaluate",
            ]),
            expert_markers: owned(&[
                "distributed",
                "consensus",
                "formal verification",
                "lock-free",
                "compiler",
                "cryptograph",
                "kernel",
                "zero-downtime",
            ]),
            complex_markers: owned(&[
                "concurren",
                "multi-step",
                "production",
                "refactor",
                "migrate",
                "end-to-end",
                "thread-safe",
                "async",
            ]),
            simple_markers: owned(&["simple", "quick", "just", "typo", "rename", "one-liner", "hello world"]),
            urgent_markers: owned(&["urgent", "asap", "immediately", "right now", "quickly"]),
            batch_markers: owned(&["batch", "overnight", "no rush", "whenever", "in bulk"]),
        }
    }
}

fn owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| (*k).to_owned()).collect()
}

/// Request classifier
#[derive(Debug, Clone, Default)]
pub struct TaskClassifier {
    table: KeywordTable,
}

impl TaskClassifier {
    pub const fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    /// Classify a request
    ///
    /// Pure and deterministic: the same request always yields the same
    /// classification.
    pub fn classify(&self, request: &CompletionRequest) -> TaskClassification {
        let text = request.full_text();
        let lower = text.to_lowercase();

        let input = estimate_tokens(&text);
        let category = self.categorize(&lower, &text);
        let complexity = self.assess_complexity(&lower, category, input);
        let output = request
            .max_tokens
            .map_or_else(|| complexity.default_output_tokens(), u64::from);

        let requires_reasoning = complexity >= Complexity::Complex || contains_any(&lower, &self.table.reasoning);

        let time_constraint = if request.stream || contains_any(&lower, &self.table.urgent_markers) {
            TimeConstraint::Realtime
        } else if contains_any(&lower, &self.table.batch_markers) {
            TimeConstraint::Batch
        } else {
            TimeConstraint::Normal
        };

        let quality_requirement = match complexity {
            Complexity::Complex | Complexity::Expert => QualityRequirement::High,
            _ if matches!(category, TaskCategory::Security | TaskCategory::Architecture) => QualityRequirement::High,
            Complexity::Trivial | Complexity::Simple => QualityRequirement::Low,
            Complexity::Medium => QualityRequirement::Medium,
        };

        TaskClassification {
            complexity,
            category,
            estimated_tokens: TokenEstimate {
                input,
                output,
                total: input + output,
            },
            requires_reasoning,
            time_constraint,
            quality_requirement,
            required_features: Features {
                streaming: request.stream,
                tool_calling: request.has_tools(),
                vision: request.has_images(),
            },
        }
    }

    /// Pick the category with the most keyword hits; ties go to the
    /// earlier table entry and no hits means general
    fn categorize(&self, lower: &str, original: &str) -> TaskCategory {
        let mut best = (TaskCategory::General, 0);

        for (category, keywords) in &self.table.categories {
            let mut hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
            if *category == TaskCategory::CodeGeneration && CODE_FENCE_RE.is_match(original) {
                hits += CODE_FENCE_BONUS;
            }

            if hits > best.1 {
                best = (*category, hits);
            }
        }

        best.0
    }

    fn assess_complexity(&self, lower: &str, category: TaskCategory, input_tokens: u64) -> Complexity {
        // Token counts dominate every other signal
        if input_tokens < TRIVIAL_TOKEN_CEILING {
            return Complexity::Trivial;
        }
        if input_tokens > EXPERT_TOKEN_FLOOR {
            return Complexity::Expert;
        }

        let mut complexity = match category {
            TaskCategory::General | TaskCategory::Documentation => Complexity::Simple,
            TaskCategory::Architecture | TaskCategory::Security => Complexity::Complex,
            _ => Complexity::Medium,
        };

        if contains_any(lower, &self.table.expert_markers) {
            complexity = complexity.harder().harder();
        } else if contains_any(lower, &self.table.complex_markers) {
            complexity = complexity.harder();
        } else if contains_any(lower, &self.table.simple_markers) {
            complexity = complexity.easier();
        }

        let words = lower.split_whitespace().count();
        if words > 300 {
            complexity = complexity.harder();
        } else if words < 8 {
            complexity = complexity.easier();
        }

        if input_tokens > COMPLEX_TOKEN_FLOOR {
            complexity = complexity.max(Complexity::Complex);
        }

        complexity
    }
}

fn contains_any(lower: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| lower.contains(k.as_str()))
}

/// Estimate token count using tiktoken, falling back to four bytes a token
pub fn estimate_tokens(text: &str) -> u64 {
    let count = BPE
        .as_ref()
        .map_or_else(|| text.len() / 4, |bpe| bpe.encode_with_special_tokens(text).len());
    count as u64
}
