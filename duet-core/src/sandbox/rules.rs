//! The default blocked-command deny list.

use regex::Regex;
use std::sync::LazyLock;

/// A single deny-list rule: a compiled pattern plus a human-readable label
/// surfaced in `blockedBy` and in the transfer/execution logs.
#[derive(Debug, Clone)]
pub struct BlockedPattern {
    pub label: &'static str,
    pub regex: &'static LazyLock<Regex>,
}

static RM_RF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rm\s+-rf\s+\S+").expect("invalid regex"));
static RM_RF_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rm\s+-rf\s+/\s*$").expect("invalid regex"));
static GIT_FORCE_PUSH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"git\s+push\s+.*(--force|-f)\b").expect("invalid regex"));
static DROP_DATABASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)drop\s+database").expect("invalid regex"));
static TRUNCATE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)truncate\s+table").expect("invalid regex"));
static NPM_PUBLISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"npm\s+publish").expect("invalid regex"));
static SYSTEM_SHUTDOWN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(shutdown|halt|reboot)\b").expect("invalid regex"));
static PIPED_CURL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"curl\s+[^|]*\|\s*(sudo\s+)?(bash|sh|zsh)\b").expect("invalid regex")
});

/// The mandatory minimum deny list every sandbox must include.
pub static DEFAULT_BLOCKED_PATTERNS: LazyLock<Vec<BlockedPattern>> = LazyLock::new(|| {
    vec![
        BlockedPattern {
            label: "rm -rf /",
            regex: &RM_RF_ROOT,
        },
        BlockedPattern {
            label: "rm -rf <path>",
            regex: &RM_RF,
        },
        BlockedPattern {
            label: "git push --force",
            regex: &GIT_FORCE_PUSH,
        },
        BlockedPattern {
            label: "DROP DATABASE",
            regex: &DROP_DATABASE,
        },
        BlockedPattern {
            label: "TRUNCATE TABLE",
            regex: &TRUNCATE_TABLE,
        },
        BlockedPattern {
            label: "npm publish",
            regex: &NPM_PUBLISH,
        },
        BlockedPattern {
            label: "system shutdown",
            regex: &SYSTEM_SHUTDOWN,
        },
        BlockedPattern {
            label: "piped curl to shell",
            regex: &PIPED_CURL,
        },
    ]
});
