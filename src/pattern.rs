use anyhow::{bail, Result};
use regex::{Regex, RegexBuilder};

/// Separator class accepted between name tokens. "Claude 4 Sonnet" should
/// also hit "Claude-4-Sonnet", "Claude 4.Sonnet" and "claude4sonnet".
const TOKEN_SEP: &str = r"[\s._-]*";

/// A model name compiled into a separator-tolerant, case-insensitive matcher.
#[derive(Debug, Clone)]
pub struct ModelPattern {
    pub name: String,
    regex: Regex,
}

impl ModelPattern {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    #[cfg(test)]
    fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Compile one matcher per requested model name, in the order given.
pub fn build_patterns(names: &[String]) -> Result<Vec<ModelPattern>> {
    names.iter().map(|n| build_pattern(n)).collect()
}

/// Pure and deterministic: the same name yields the same matcher every run.
///
/// The name is split on whitespace/dash/underscore/dot runs, each token is
/// matched literally, and any run of those separators (including none) is
/// accepted between tokens. Both ends are anchored with `\b`: a letter or
/// digit continuing the last token is a different name, so "Claude 4 Sonnet"
/// matches neither "Claude 40 Sonnets" nor the plural "Claude 4 Sonnets".
pub fn build_pattern(name: &str) -> Result<ModelPattern> {
    let tokens: Vec<&str> = name
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '.'))
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        bail!("Model name is empty: {:?}", name);
    }

    let escaped: Vec<String> = tokens.iter().map(|t| regex::escape(t)).collect();
    // \b only works against a word character; skip the anchor on an edge
    // token that starts/ends with punctuation ("o1 (preview)").
    let lead = if starts_word(tokens[0]) { r"\b" } else { "" };
    let trail = if ends_word(tokens[tokens.len() - 1]) { r"\b" } else { "" };
    let pattern = format!("{}{}{}", lead, escaped.join(TOKEN_SEP), trail);
    let regex = RegexBuilder::new(&pattern).case_insensitive(true).build()?;

    Ok(ModelPattern {
        name: name.to_string(),
        regex,
    })
}

fn starts_word(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_')
}

fn ends_word(token: &str) -> bool {
    token.chars().last().is_some_and(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(name: &str) -> ModelPattern {
        build_pattern(name).unwrap()
    }

    #[test]
    fn accepts_separator_variants() {
        let p = pat("Claude 4 Sonnet");
        for hay in [
            "Claude 4 Sonnet",
            "Claude-4-Sonnet",
            "claude4sonnet",
            "Claude 4.Sonnet",
            "rank 3: claude_4_sonnet (new)",
        ] {
            assert!(p.is_match(hay), "should match {:?}", hay);
        }
    }

    #[test]
    fn rejects_other_models() {
        let p = pat("Claude 4 Sonnet");
        assert!(!p.is_match("Claude 5 Sonnet"));
        assert!(!p.is_match("Sonnet 4 Claude"));
    }

    #[test]
    fn word_boundaries_both_ends() {
        let p = pat("Claude 4 Sonnet");
        assert!(!p.is_match("Claude 40 Sonnets"));
        assert!(!p.is_match("Claude 4 Sonnets"));
        assert!(!p.is_match("xClaude 4 Sonnet"));
        assert!(p.is_match("(Claude 4 Sonnet)"));
    }

    #[test]
    fn single_token_stays_whole_word() {
        let p = pat("Opus");
        assert!(p.is_match("magnum opus of the season"));
        assert!(!p.is_match("opuscule"));
    }

    #[test]
    fn dotted_versions_tokenize() {
        let p = pat("GPT 5.1");
        assert!(p.is_match("gpt-5.1"));
        assert!(p.is_match("GPT 5 1"));
        assert!(p.is_match("gpt51"));
        assert!(!p.is_match("gpt-5.12"));
    }

    #[test]
    fn deterministic_construction() {
        assert_eq!(pat("Claude 4 Sonnet").as_str(), pat("Claude 4 Sonnet").as_str());
    }

    #[test]
    fn empty_name_is_an_error() {
        assert!(build_pattern("  . ").is_err());
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = pat("o1 (preview)");
        assert!(p.is_match("o1 (preview)"));
        assert!(!p.is_match("o1 Xpreview)"));
    }
}
