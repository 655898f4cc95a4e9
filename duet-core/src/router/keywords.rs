//! Multilingual keyword buckets for the complexity factors: multi-step
//! connectors, domain vocabularies, uncertainty markers, and risk terms, each
//! in English, Korean, and Japanese.

/// One keyword bucket per domain the router and System 2 risk/step
/// extraction both reason about.
pub const DOMAIN_BUCKETS: &[(&str, &[&str])] = &[
    (
        "frontend",
        &[
            "frontend", "ui", "react", "vue", "css", "component", "프론트엔드", "화면", "컴포넌트",
            "フロントエンド", "画面", "コンポーネント",
        ],
    ),
    (
        "backend",
        &[
            "backend", "api", "server", "endpoint", "route handler", "백엔드", "서버", "엔드포인트",
            "バックエンド", "サーバー", "エンドポイント",
        ],
    ),
    (
        "database",
        &[
            "database", "sql", "query", "schema", "migration", "데이터베이스", "쿼리", "스키마",
            "データベース", "クエリ", "スキーマ",
        ],
    ),
    (
        "infrastructure",
        &[
            "infrastructure", "kubernetes", "docker", "deploy", "deployment", "인프라", "쿠버네티스",
            "배포", "インフラ", "デプロイ",
        ],
    ),
    (
        "security",
        &[
            "security", "auth", "authentication", "vulnerability", "credential", "보안", "인증",
            "취약점", "セキュリティ", "認証", "脆弱性",
        ],
    ),
    (
        "data",
        &[
            "data pipeline", "etl", "analytics", "dataset", "데이터 파이프라인", "분석", "データパイプライン",
            "分析",
        ],
    ),
    (
        "testing",
        &[
            "test", "testing", "unit test", "integration test", "테스트", "단위 테스트", "テスト",
            "単体テスト",
        ],
    ),
];

/// Multi-step connector phrases: ordinal/temporal words that link clauses
/// into a sequence, in en/ko/ja.
pub const STEP_CONNECTORS: &[&str] = &[
    "then",
    "and then",
    "after that",
    "next",
    "finally",
    "그리고",
    "그 다음",
    "그런 다음",
    "次に",
    "それから",
    "最後に",
];

/// Uncertainty markers in en/ko/ja.
pub const UNCERTAINTY_WORDS: &[&str] = &[
    "maybe", "might", "investigate", "perhaps", "not sure", "아마", "아마도", "혹시", "もしかして",
    "かもしれない", "たぶん",
];

/// Risk keywords in en/ko/ja. Compounding: more matches raise the factor.
pub const RISK_WORDS: &[&str] = &[
    "production",
    "delete",
    "drop database",
    "drop table",
    "migration",
    "force push",
    "배포",
    "삭제",
    "운영",
    "デプロイ",
    "削除",
    "本番",
];

/// Count case-insensitive, non-overlapping occurrences of any keyword in
/// `haystack` from `needles`.
pub fn count_matches(haystack: &str, needles: &[&str]) -> usize {
    let lower = haystack.to_lowercase();
    needles.iter().filter(|n| lower.contains(&n.to_lowercase())).count()
}

/// Count how many distinct domain buckets have at least one keyword match.
pub fn matched_domain_count(haystack: &str) -> usize {
    let lower = haystack.to_lowercase();
    DOMAIN_BUCKETS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(&w.to_lowercase())))
        .count()
}

/// Names of domain buckets that matched, in table order.
pub fn matched_domains(haystack: &str) -> Vec<&'static str> {
    let lower = haystack.to_lowercase();
    DOMAIN_BUCKETS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(&w.to_lowercase())))
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_english_and_korean_domain_terms() {
        assert!(matched_domains("deploy to kubernetes").contains(&"infrastructure"));
        assert!(matched_domains("배포 작업을 해줘").contains(&"infrastructure"));
    }

    #[test]
    fn counts_distinct_domains_not_keyword_hits() {
        // "database" and "migration" both belong to "database" -> still 1 domain.
        assert_eq!(matched_domain_count("database migration needed"), 1);
    }

    #[test]
    fn risk_words_compound_across_languages() {
        assert_eq!(count_matches("delete the production database", RISK_WORDS), 2);
    }
}
