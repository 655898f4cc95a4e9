//! The fixed rule set the scrubber applies: one regex per rule, grouped into
//! nine categories, applied in ascending priority order so a rule that
//! matches inside another rule's match (e.g. a token embedded in a URL)
//! never survives the pass.

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub enum Category {
    Credentials,
    AuthTokens,
    Secrets,
    EnvVars,
    NetworkIdentifiers,
    PersonalData,
    Identifiers,
    Paths,
    GitArtifacts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Any,
    MacOs,
    Linux,
    Windows,
}

pub struct Rule {
    pub label: &'static str,
    pub category: Category,
    pub priority: u8,
    pub platform: Platform,
    pub regex: &'static LazyLock<Regex>,
}

macro_rules! rule_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).expect("invalid regex"));
    };
}

// --- Credentials ---------------------------------------------------------
rule_regex!(AWS_ACCESS_KEY, r"\bAKIA[0-9A-Z]{16}\b");
rule_regex!(AWS_SECRET_KEY, r#"(?i)aws_secret_access_key\s*[:=]\s*['"]?[A-Za-z0-9/+=]{40}['"]?"#);
rule_regex!(GENERIC_PASSWORD, r#"(?i)\bpassword\s*[:=]\s*['"][^'"]{4,}['"]"#);
rule_regex!(BASIC_AUTH_URL, r"(?i)\b\w+://[^:\s]+:[^@\s]+@[^\s/]+");
rule_regex!(PRIVATE_KEY_BLOCK, r"(?s)-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----.*?-----END (?:RSA |EC |OPENSSH )?PRIVATE KEY-----");
rule_regex!(DB_CONNECTION_STRING, r"(?i)\b(?:postgres|postgresql|mysql|mongodb)://[^:\s]+:[^@\s]+@[^\s]+");

// --- Auth tokens -----------------------------------------------------------
rule_regex!(BEARER_TOKEN, r"(?i)\bBearer\s+[A-Za-z0-9\-._~+/]{20,}=*");
rule_regex!(JWT, r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\b");
rule_regex!(GITHUB_PAT, r"\bgh[pousr]_[A-Za-z0-9]{36,}\b");
rule_regex!(SLACK_TOKEN, r"\bxox[baprs]-[A-Za-z0-9-]{10,}\b");
rule_regex!(OAUTH_CLIENT_SECRET, r#"(?i)client_secret\s*[:=]\s*['"]?[A-Za-z0-9\-_]{16,}['"]?"#);
rule_regex!(SESSION_COOKIE, r"(?i)\bsession(?:id)?=[A-Za-z0-9%._-]{16,}");

// --- Secrets ---------------------------------------------------------------
rule_regex!(ANTHROPIC_KEY, r"\bsk-ant-[A-Za-z0-9_-]{20,}\b");
rule_regex!(OPENAI_KEY, r"\bsk-[A-Za-z0-9]{20,}\b");
rule_regex!(GENERIC_API_KEY, r#"(?i)api[_-]?key\s*[:=]\s*['"]?[A-Za-z0-9_-]{16,}['"]?"#);
rule_regex!(STRIPE_KEY, r"\b(?:sk|pk)_(?:live|test)_[A-Za-z0-9]{16,}\b");
rule_regex!(GOOGLE_API_KEY, r"\bAIza[0-9A-Za-z_-]{35}\b");
rule_regex!(NPM_TOKEN, r"\bnpm_[A-Za-z0-9]{36}\b");
rule_regex!(TWILIO_SID, r"\bAC[0-9a-fA-F]{32}\b");
rule_regex!(GCP_REFRESH_TOKEN, r"\b1//[0-9A-Za-z_-]{28,}\b");

// --- Environment variables --------------------------------------------------
rule_regex!(ENV_SECRET_LINE, r#"(?im)^[A-Z_]*(?:SECRET|TOKEN|KEY|PASSWORD)[A-Z_]*=\S+$"#);
rule_regex!(DOTENV_EXPORT, r#"(?im)^export\s+[A-Z_]+=['"]?\S+['"]?$"#);

// --- Network identifiers -----------------------------------------------------
rule_regex!(IPV4_ADDRESS, r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b");
rule_regex!(IPV6_ADDRESS, r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b");
rule_regex!(MAC_ADDRESS, r"\b(?:[0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}\b");
rule_regex!(INTERNAL_HOSTNAME, r"(?i)\b[a-z0-9-]+\.(?:internal|corp|local)\b");

// --- Personal data ------------------------------------------------------------
rule_regex!(EMAIL_ADDRESS, r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b");
rule_regex!(PHONE_NUMBER, r"\b\+?\d{1,3}[-.\s]?\(?\d{2,4}\)?[-.\s]?\d{3,4}[-.\s]?\d{3,4}\b");
rule_regex!(SSN, r"\b\d{3}-\d{2}-\d{4}\b");
rule_regex!(CREDIT_CARD, r"\b(?:\d[ -]*?){13,16}\b");

// --- Identifiers ----------------------------------------------------------
rule_regex!(UUID, r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}\b");
rule_regex!(AWS_ACCOUNT_ID, r#"(?i)account[_-]?id\s*[:=]\s*['"]?\d{12}['"]?"#);
rule_regex!(AZURE_SUBSCRIPTION_ID, r"(?i)subscription[_-]?id\s*[:=]\s*['"]?[0-9a-fA-F-]{36}['\"]?");

// --- Paths (platform-specific) --------------------------------------------
rule_regex!(MACOS_USER_HOME, r"/Users/[A-Za-z0-9_.-]+");
rule_regex!(LINUX_USER_HOME, r"/home/[A-Za-z0-9_.-]+");
rule_regex!(WINDOWS_USER_HOME, r"(?i)C:\\Users\\[A-Za-z0-9_.-]+");
rule_regex!(SSH_KEY_PATH, r"(?:/[A-Za-z0-9_.-]+)*/\.ssh/[A-Za-z0-9_.-]+");
rule_regex!(CLOUD_CONFIG_PATH, r"(?:/[A-Za-z0-9_.-]+)*/\.(?:aws|gcloud|kube|docker)/[A-Za-z0-9_./-]+");
rule_regex!(TEMP_FILE_PATH, r"(?:/tmp|/var/tmp)/[A-Za-z0-9_.-]+");

// --- Git artifacts ---------------------------------------------------------
rule_regex!(GIT_COMMIT_AUTHOR_EMAIL, r"(?im)^(?:Author|Committer):\s.*<([^>]+)>$");
rule_regex!(GIT_REMOTE_WITH_CREDENTIALS, r"(?i)\bgit@[^:\s]+:[^\s]+|\bhttps?://[^:\s]+:[^@\s]+@[^\s]+\.git\b");
rule_regex!(GIT_REFLOG_ENTRY, r"(?m)^[0-9a-f]{40}\s+(?:refs/|HEAD)");
rule_regex!(GPG_SIGNATURE_BLOCK, r"(?s)-----BEGIN PGP SIGNATURE-----.*?-----END PGP SIGNATURE-----");

pub static ALL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // priority 0-9: hard secrets, highest precedence
        Rule { label: "private_key_block", category: Category::Credentials, priority: 0, platform: Platform::Any, regex: &PRIVATE_KEY_BLOCK },
        Rule { label: "anthropic_api_key", category: Category::Secrets, priority: 1, platform: Platform::Any, regex: &ANTHROPIC_KEY },
        Rule { label: "openai_api_key", category: Category::Secrets, priority: 2, platform: Platform::Any, regex: &OPENAI_KEY },
        Rule { label: "github_pat", category: Category::AuthTokens, priority: 3, platform: Platform::Any, regex: &GITHUB_PAT },
        Rule { label: "slack_token", category: Category::AuthTokens, priority: 4, platform: Platform::Any, regex: &SLACK_TOKEN },
        Rule { label: "stripe_key", category: Category::Secrets, priority: 5, platform: Platform::Any, regex: &STRIPE_KEY },
        Rule { label: "google_api_key", category: Category::Secrets, priority: 6, platform: Platform::Any, regex: &GOOGLE_API_KEY },
        Rule { label: "npm_token", category: Category::Secrets, priority: 7, platform: Platform::Any, regex: &NPM_TOKEN },
        Rule { label: "jwt", category: Category::AuthTokens, priority: 8, platform: Platform::Any, regex: &JWT },
        Rule { label: "gpg_signature_block", category: Category::GitArtifacts, priority: 9, platform: Platform::Any, regex: &GPG_SIGNATURE_BLOCK },
        Rule { label: "twilio_account_sid", category: Category::Secrets, priority: 10, platform: Platform::Any, regex: &TWILIO_SID },
        Rule { label: "gcp_refresh_token", category: Category::Secrets, priority: 11, platform: Platform::Any, regex: &GCP_REFRESH_TOKEN },
        // priority 12-29: credentials embedded in structured text
        Rule { label: "aws_access_key", category: Category::Credentials, priority: 12, platform: Platform::Any, regex: &AWS_ACCESS_KEY },
        Rule { label: "aws_secret_key", category: Category::Credentials, priority: 13, platform: Platform::Any, regex: &AWS_SECRET_KEY },
        Rule { label: "db_connection_string", category: Category::Credentials, priority: 14, platform: Platform::Any, regex: &DB_CONNECTION_STRING },
        Rule { label: "basic_auth_url", category: Category::Credentials, priority: 15, platform: Platform::Any, regex: &BASIC_AUTH_URL },
        Rule { label: "generic_password", category: Category::Credentials, priority: 16, platform: Platform::Any, regex: &GENERIC_PASSWORD },
        Rule { label: "bearer_token", category: Category::AuthTokens, priority: 17, platform: Platform::Any, regex: &BEARER_TOKEN },
        Rule { label: "oauth_client_secret", category: Category::AuthTokens, priority: 18, platform: Platform::Any, regex: &OAUTH_CLIENT_SECRET },
        Rule { label: "session_cookie", category: Category::AuthTokens, priority: 19, platform: Platform::Any, regex: &SESSION_COOKIE },
        Rule { label: "generic_api_key", category: Category::Secrets, priority: 20, platform: Platform::Any, regex: &GENERIC_API_KEY },
        Rule { label: "git_remote_with_credentials", category: Category::GitArtifacts, priority: 21, platform: Platform::Any, regex: &GIT_REMOTE_WITH_CREDENTIALS },
        Rule { label: "env_secret_line", category: Category::EnvVars, priority: 22, platform: Platform::Any, regex: &ENV_SECRET_LINE },
        Rule { label: "dotenv_export", category: Category::EnvVars, priority: 23, platform: Platform::Any, regex: &DOTENV_EXPORT },
        // priority 30-49: network and git artifacts
        Rule { label: "ipv4_address", category: Category::NetworkIdentifiers, priority: 30, platform: Platform::Any, regex: &IPV4_ADDRESS },
        Rule { label: "ipv6_address", category: Category::NetworkIdentifiers, priority: 31, platform: Platform::Any, regex: &IPV6_ADDRESS },
        Rule { label: "mac_address", category: Category::NetworkIdentifiers, priority: 32, platform: Platform::Any, regex: &MAC_ADDRESS },
        Rule { label: "internal_hostname", category: Category::NetworkIdentifiers, priority: 33, platform: Platform::Any, regex: &INTERNAL_HOSTNAME },
        Rule { label: "git_commit_author_email", category: Category::GitArtifacts, priority: 34, platform: Platform::Any, regex: &GIT_COMMIT_AUTHOR_EMAIL },
        Rule { label: "git_reflog_entry", category: Category::GitArtifacts, priority: 35, platform: Platform::Any, regex: &GIT_REFLOG_ENTRY },
        // priority 50-69: personal data and identifiers
        Rule { label: "ssn", category: Category::PersonalData, priority: 50, platform: Platform::Any, regex: &SSN },
        Rule { label: "credit_card", category: Category::PersonalData, priority: 51, platform: Platform::Any, regex: &CREDIT_CARD },
        Rule { label: "email_address", category: Category::PersonalData, priority: 52, platform: Platform::Any, regex: &EMAIL_ADDRESS },
        Rule { label: "phone_number", category: Category::PersonalData, priority: 53, platform: Platform::Any, regex: &PHONE_NUMBER },
        Rule { label: "uuid", category: Category::Identifiers, priority: 54, platform: Platform::Any, regex: &UUID },
        Rule { label: "aws_account_id", category: Category::Identifiers, priority: 55, platform: Platform::Any, regex: &AWS_ACCOUNT_ID },
        Rule { label: "azure_subscription_id", category: Category::Identifiers, priority: 56, platform: Platform::Any, regex: &AZURE_SUBSCRIPTION_ID },
        // priority 70-89: platform-specific filesystem paths (lowest precedence;
        // these commonly overlap with already-redacted spans)
        Rule { label: "ssh_key_path", category: Category::Paths, priority: 70, platform: Platform::Any, regex: &SSH_KEY_PATH },
        Rule { label: "cloud_config_path", category: Category::Paths, priority: 71, platform: Platform::Any, regex: &CLOUD_CONFIG_PATH },
        Rule { label: "temp_file_path", category: Category::Paths, priority: 72, platform: Platform::Any, regex: &TEMP_FILE_PATH },
        Rule { label: "macos_user_home", category: Category::Paths, priority: 80, platform: Platform::MacOs, regex: &MACOS_USER_HOME },
        Rule { label: "linux_user_home", category: Category::Paths, priority: 81, platform: Platform::Linux, regex: &LINUX_USER_HOME },
        Rule { label: "windows_user_home", category: Category::Paths, priority: 82, platform: Platform::Windows, regex: &WINDOWS_USER_HOME },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_rules_have_unique_labels() {
        let mut labels: Vec<&str> = ALL_RULES.iter().map(|r| r.label).collect();
        labels.sort_unstable();
        let before = labels.len();
        labels.dedup();
        assert_eq!(before, labels.len());
    }

    #[test]
    fn priorities_are_non_decreasing_when_sorted() {
        let mut priorities: Vec<u8> = ALL_RULES.iter().map(|r| r.priority).collect();
        let original = priorities.clone();
        priorities.sort_unstable();
        assert_eq!(priorities, original, "ALL_RULES should already be declared in priority order");
    }

    #[test]
    fn rule_count_matches_documented_total() {
        assert_eq!(ALL_RULES.len(), 43);
    }
}
