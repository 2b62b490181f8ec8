//! Input validation and derived fields
//!
//! Pure functions: no store access, no clock except id generation.

use rand::Rng;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

use crate::types::ValidationError;

/// GitHub login rules: alphanumeric start, up to 39 chars, hyphens never doubled
static OWNER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,38}$").expect("owner regex"));

static REPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("repo regex"));

pub const TITLE_LEN: (usize, usize) = (3, 100);
pub const DESCRIPTION_LEN: (usize, usize) = (10, 1000);
pub const MAX_REPO_LEN: usize = 100;
pub const SUMMARY_LEN: usize = 150;

pub const MAX_TECH_STACK: usize = 20;
pub const MAX_FEATURES: usize = 20;
pub const MAX_USE_CASES: usize = 10;
pub const MAX_TECH_LEN: usize = 50;
pub const MAX_ITEM_LEN: usize = 200;

/// Reduce a GitHub repository URL to `https://github.com/<owner>/<repo>`.
/// Extra path segments, query and fragment are dropped.
pub fn canonical_github_url(raw: &str) -> Result<String, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|_| ValidationError::InvalidUrl)?;

    if url.scheme() != "https" || url.host_str() != Some("github.com") {
        return Err(ValidationError::NotGithub);
    }

    let mut segments = url
        .path_segments()
        .ok_or(ValidationError::InvalidRepoFormat)?
        .filter(|s| !s.is_empty());
    let (owner, repo) = match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) => (owner, repo),
        _ => return Err(ValidationError::InvalidRepoFormat),
    };

    if !OWNER_RE.is_match(owner) || owner.contains("--") {
        return Err(ValidationError::InvalidOwner);
    }
    if repo.len() > MAX_REPO_LEN || !REPO_RE.is_match(repo) {
        return Err(ValidationError::InvalidRepoName);
    }

    Ok(format!("https://github.com/{}/{}", owner, repo))
}

/// Check a trimmed text field's length in characters
pub fn check_length(
    field: &'static str,
    value: &str,
    (min, max): (usize, usize),
) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ValidationError::InvalidLength { field, min, max });
    }
    Ok(())
}

/// Keep the string elements of an optional JSON array.
///
/// More than `max_items` elements is an error; elements that are not
/// strings, are blank, or exceed `max_len` characters are dropped.
pub fn string_list(
    field: &'static str,
    value: Option<&Value>,
    max_items: usize,
    max_len: usize,
) -> Result<Vec<String>, ValidationError> {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return Ok(Vec::new()),
    };

    if items.len() > max_items {
        return Err(ValidationError::TooManyItems {
            field,
            max: max_items,
        });
    }

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().count() <= max_len)
        .map(str::to_string)
        .collect())
}

/// Lowercase, with every run of non-alphanumerics collapsed to `-`
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Description cut to the summary length, with an ellipsis when cut
pub fn summarize(description: &str) -> String {
    if description.chars().count() <= SUMMARY_LEN {
        return description.to_string();
    }
    let head: String = description.chars().take(SUMMARY_LEN).collect();
    format!("{}...", head)
}

/// `submission_<millis>_<9 random base36 chars>`
pub fn new_submission_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!(
        "submission_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}

pub fn new_review_id() -> String {
    format!("review_{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_url_drops_extras() {
        for raw in [
            "https://github.com/acme/widget",
            "https://github.com/acme/widget/",
            "https://github.com/acme/widget/tree/main",
            "https://github.com/acme/widget?tab=readme",
            "https://github.com//acme/widget#top",
            "  https://github.com/acme/widget  ",
        ] {
            assert_eq!(
                canonical_github_url(raw).unwrap(),
                "https://github.com/acme/widget",
                "input: {}",
                raw
            );
        }
    }

    #[test]
    fn test_non_github_rejected() {
        assert_eq!(
            canonical_github_url("https://gitlab.com/acme/widget").unwrap_err(),
            ValidationError::NotGithub
        );
        assert_eq!(
            canonical_github_url("http://github.com/acme/widget").unwrap_err(),
            ValidationError::NotGithub
        );
        assert_eq!(
            canonical_github_url("not a url").unwrap_err(),
            ValidationError::InvalidUrl
        );
    }

    #[test]
    fn test_repo_path_required() {
        assert_eq!(
            canonical_github_url("https://github.com/acme").unwrap_err(),
            ValidationError::InvalidRepoFormat
        );
        assert_eq!(
            canonical_github_url("https://github.com/").unwrap_err(),
            ValidationError::InvalidRepoFormat
        );
    }

    #[test]
    fn test_owner_rules() {
        assert!(canonical_github_url("https://github.com/a-b-c/repo").is_ok());
        assert_eq!(
            canonical_github_url("https://github.com/-acme/repo").unwrap_err(),
            ValidationError::InvalidOwner
        );
        assert_eq!(
            canonical_github_url("https://github.com/ac--me/repo").unwrap_err(),
            ValidationError::InvalidOwner
        );
        let long_owner = "a".repeat(40);
        assert_eq!(
            canonical_github_url(&format!("https://github.com/{}/repo", long_owner)).unwrap_err(),
            ValidationError::InvalidOwner
        );
    }

    #[test]
    fn test_repo_rules() {
        assert!(canonical_github_url("https://github.com/acme/my.repo_v2-x").is_ok());
        assert_eq!(
            canonical_github_url("https://github.com/acme/re%20po").unwrap_err(),
            ValidationError::InvalidRepoName
        );
        let long_repo = "r".repeat(101);
        assert_eq!(
            canonical_github_url(&format!("https://github.com/acme/{}", long_repo)).unwrap_err(),
            ValidationError::InvalidRepoName
        );
    }

    #[test]
    fn test_length_bounds() {
        assert!(check_length("title", "ab", TITLE_LEN).is_err());
        assert!(check_length("title", "abc", TITLE_LEN).is_ok());
        assert!(check_length("title", &"x".repeat(101), TITLE_LEN).is_err());
        // Counted in characters, not bytes
        assert!(check_length("title", "ééé", TITLE_LEN).is_ok());
    }

    #[test]
    fn test_string_list_filters_and_caps() {
        let value = json!(["rust", 42, "", "  tokio  ", "x".repeat(51), null]);
        assert_eq!(
            string_list("techStack", Some(&value), MAX_TECH_STACK, MAX_TECH_LEN).unwrap(),
            vec!["rust", "tokio"]
        );

        let too_many = json!(vec!["a"; 11]);
        assert_eq!(
            string_list("useCases", Some(&too_many), MAX_USE_CASES, MAX_ITEM_LEN).unwrap_err(),
            ValidationError::TooManyItems {
                field: "useCases",
                max: 10
            }
        );

        assert!(string_list("features", None, MAX_FEATURES, MAX_ITEM_LEN)
            .unwrap()
            .is_empty());
        assert!(
            string_list("features", Some(&json!("nope")), MAX_FEATURES, MAX_ITEM_LEN)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Cool App!!"), "my-cool-app");
        assert_eq!(slugify("  --Auth   Starter (v2)-- "), "auth-starter-v2");
        assert_eq!(slugify("Next.js + Stripe"), "next-js-stripe");
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize("short"), "short");
        let long = "d".repeat(200);
        let summary = summarize(&long);
        assert_eq!(summary.len(), 153);
        assert!(summary.ends_with("..."));
        assert_eq!(summarize(&"e".repeat(150)), "e".repeat(150));
    }

    #[test]
    fn test_submission_id_shape() {
        let id = new_submission_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "submission");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert_ne!(new_submission_id(), new_submission_id());
    }
}
