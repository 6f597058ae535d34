//! Model name and capability normalization.
//!
//! Every function here is total: unknown or empty input maps to a documented
//! default instead of failing. Rules are evaluated in order and the first match
//! wins, so specific patterns (`gpt-4o-mini`) must precede general ones (`gpt-`).

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Canonical name for anything the rules do not recognize.
pub const UNKNOWN_MODEL: &str = "unknown_model";

/// Provider for anything the rules do not recognize.
pub const UNKNOWN_PROVIDER: &str = "Unknown";

/// Family for anything the rules do not recognize.
pub const DEFAULT_FAMILY: &str = "Language Model";

/// Capability every model has.
pub const BASE_CAPABILITY: &str = "text-generation";

/// SDK wrapper type names mapped to the model id they default to.
const CLASS_NAME_DEFAULTS: &[(&str, &str)] = &[
    ("AzureChatOpenAI", "gpt-35-turbo"),
    ("ChatOpenAI", "gpt-3.5-turbo"),
    ("OpenAI", "gpt-3.5-turbo-instruct"),
    ("ChatAnthropic", "claude-3-haiku"),
    ("ChatAnthropicMessages", "claude-3-haiku"),
    ("ChatVertexAI", "gemini-pro"),
    ("ChatGoogleGenerativeAI", "gemini-pro"),
    ("ChatMistralAI", "mistral-small"),
    ("ChatOllama", "llama3"),
    ("ChatCohere", "command-r"),
];

/// How a rule pattern is matched against a cleaned, lowercase name.
#[derive(Debug, Clone, Copy)]
enum Pattern {
    Contains(&'static str),
    Prefix(&'static str),
}

impl Pattern {
    fn matches(self, name: &str) -> bool {
        match self {
            Self::Contains(needle) => name.contains(needle),
            Self::Prefix(prefix) => name.starts_with(prefix),
        }
    }
}

/// What a matching name rule produces.
#[derive(Debug, Clone, Copy)]
enum Canonical {
    /// A fixed canonical id.
    Fixed(&'static str),
    /// The cleaned input itself (known family, unlisted version).
    Cleaned,
}

const NAME_RULES: &[(Pattern, Canonical)] = &[
    (Pattern::Contains("gpt-4o-mini"), Canonical::Fixed("gpt-4o-mini")),
    (Pattern::Contains("gpt-4o"), Canonical::Fixed("gpt-4o")),
    (Pattern::Contains("gpt-4-turbo"), Canonical::Fixed("gpt-4-turbo")),
    (Pattern::Contains("gpt-4-32k"), Canonical::Fixed("gpt-4-32k")),
    (Pattern::Contains("gpt-4"), Canonical::Fixed("gpt-4")),
    (
        Pattern::Contains("gpt-3.5-turbo-instruct"),
        Canonical::Fixed("gpt-3.5-turbo-instruct"),
    ),
    (Pattern::Contains("gpt-3.5-turbo-16k"), Canonical::Fixed("gpt-3.5-turbo-16k")),
    (Pattern::Contains("gpt-3.5-turbo"), Canonical::Fixed("gpt-3.5-turbo")),
    (Pattern::Contains("gpt-"), Canonical::Cleaned),
    (Pattern::Prefix("o1-mini"), Canonical::Fixed("o1-mini")),
    (Pattern::Prefix("o1"), Canonical::Fixed("o1")),
    (Pattern::Prefix("o3-mini"), Canonical::Fixed("o3-mini")),
    (Pattern::Prefix("o3"), Canonical::Fixed("o3")),
    (Pattern::Contains("text-embedding"), Canonical::Cleaned),
    (Pattern::Contains("davinci"), Canonical::Cleaned),
    (Pattern::Contains("claude-3-5-sonnet"), Canonical::Fixed("claude-3.5-sonnet")),
    (Pattern::Contains("claude-3.5-sonnet"), Canonical::Fixed("claude-3.5-sonnet")),
    (Pattern::Contains("claude-3-5-haiku"), Canonical::Fixed("claude-3.5-haiku")),
    (Pattern::Contains("claude-3.5-haiku"), Canonical::Fixed("claude-3.5-haiku")),
    (Pattern::Contains("claude-3-opus"), Canonical::Fixed("claude-3-opus")),
    (Pattern::Contains("claude-3-sonnet"), Canonical::Fixed("claude-3-sonnet")),
    (Pattern::Contains("claude-3-haiku"), Canonical::Fixed("claude-3-haiku")),
    (Pattern::Contains("claude"), Canonical::Cleaned),
    (Pattern::Contains("gemini-1.5-pro"), Canonical::Fixed("gemini-1.5-pro")),
    (Pattern::Contains("gemini-1.5-flash"), Canonical::Fixed("gemini-1.5-flash")),
    (Pattern::Contains("gemini"), Canonical::Cleaned),
    (Pattern::Contains("llama"), Canonical::Cleaned),
    (Pattern::Contains("mixtral"), Canonical::Cleaned),
    (Pattern::Contains("mistral"), Canonical::Cleaned),
    (Pattern::Contains("command"), Canonical::Cleaned),
];

const PROVIDER_RULES: &[(Pattern, &str)] = &[
    (Pattern::Contains("gpt-"), "OpenAI"),
    (Pattern::Prefix("o1"), "OpenAI"),
    (Pattern::Prefix("o3"), "OpenAI"),
    (Pattern::Contains("davinci"), "OpenAI"),
    (Pattern::Contains("text-embedding"), "OpenAI"),
    (Pattern::Contains("openai"), "OpenAI"),
    (Pattern::Contains("claude"), "Anthropic"),
    (Pattern::Contains("anthropic"), "Anthropic"),
    (Pattern::Contains("gemini"), "Google"),
    (Pattern::Contains("bison"), "Google"),
    (Pattern::Contains("llama"), "Meta"),
    (Pattern::Contains("mixtral"), "Mistral AI"),
    (Pattern::Contains("mistral"), "Mistral AI"),
    (Pattern::Contains("command"), "Cohere"),
];

const FAMILY_RULES: &[(Pattern, &str)] = &[
    (Pattern::Contains("gpt-4o"), "GPT-4o"),
    (Pattern::Contains("gpt-4"), "GPT-4"),
    (Pattern::Contains("gpt-3.5"), "GPT-3.5"),
    (Pattern::Prefix("o1"), "o1"),
    (Pattern::Prefix("o3"), "o3"),
    (Pattern::Contains("claude-3.5"), "Claude 3.5"),
    (Pattern::Contains("claude-3"), "Claude 3"),
    (Pattern::Contains("claude"), "Claude"),
    (Pattern::Contains("gemini"), "Gemini"),
    (Pattern::Contains("llama"), "Llama"),
    (Pattern::Contains("mixtral"), "Mixtral"),
    (Pattern::Contains("mistral"), "Mistral"),
    (Pattern::Contains("command"), "Command"),
];

const CAPABILITY_RULES: &[(Pattern, &str)] = &[
    (Pattern::Contains("gpt-4"), "chat"),
    (Pattern::Contains("gpt-3.5-turbo"), "chat"),
    (Pattern::Prefix("o1"), "chat"),
    (Pattern::Prefix("o3"), "chat"),
    (Pattern::Contains("claude"), "chat"),
    (Pattern::Contains("gemini"), "chat"),
    (Pattern::Contains("mistral"), "chat"),
    (Pattern::Contains("mixtral"), "chat"),
    (Pattern::Contains("command"), "chat"),
    (Pattern::Contains("llama"), "chat"),
    (Pattern::Contains("gpt-4"), "function-calling"),
    (Pattern::Contains("gpt-3.5-turbo"), "function-calling"),
    (Pattern::Contains("claude-3"), "function-calling"),
    (Pattern::Contains("gemini"), "function-calling"),
    (Pattern::Contains("mistral-large"), "function-calling"),
    (Pattern::Contains("command-r"), "function-calling"),
    (Pattern::Contains("gpt-4o"), "vision"),
    (Pattern::Contains("gpt-4-turbo"), "vision"),
    (Pattern::Contains("claude-3"), "vision"),
    (Pattern::Contains("gemini-1.5"), "vision"),
    (Pattern::Contains("text-embedding"), "embeddings"),
];

/// Release-date and pinned-version suffixes (`-2024-07-18`, `-20240229`, `@20240229`).
static VERSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[-@](?:\d{4}-\d{2}-\d{2}|\d{8})|-\d{4})$").expect("static regex is valid")
});

/// Maps a raw platform-supplied model identifier to its canonical name.
///
/// Accepts `&str` or `Option<&str>`; empty, missing and unrecognized input
/// all yield [`UNKNOWN_MODEL`].
#[must_use]
pub fn normalize_name<'a>(raw: impl Into<Option<&'a str>>) -> String {
    let Some(raw) = raw.into().map(str::trim).filter(|raw| !raw.is_empty()) else {
        return UNKNOWN_MODEL.to_string();
    };

    let raw = class_name_default(raw).unwrap_or(raw);
    let cleaned = clean(raw);

    for (pattern, canonical) in NAME_RULES {
        if pattern.matches(&cleaned) {
            return match canonical {
                Canonical::Fixed(id) => (*id).to_string(),
                Canonical::Cleaned => cleaned,
            };
        }
    }

    UNKNOWN_MODEL.to_string()
}

/// The canonical name when the name rules recognize `name`, else its cleaned
/// form. Family and capability rules only spell canonical versions
/// (`claude-3.5`), so raw ids (`claude-3-5-sonnet-20240620`) go through
/// [`normalize_name`] first.
fn rule_key(name: &str) -> String {
    let normalized = normalize_name(name);
    if normalized == UNKNOWN_MODEL {
        clean(name)
    } else {
        normalized
    }
}

/// Returns the provider for a (raw or normalized) model name.
#[must_use]
pub fn provider_of(name: &str) -> String {
    first_match(PROVIDER_RULES, &clean(name))
        .unwrap_or(UNKNOWN_PROVIDER)
        .to_string()
}

/// Returns the model family for a (raw or normalized) model name.
#[must_use]
pub fn family_of(name: &str) -> String {
    first_match(FAMILY_RULES, &rule_key(name))
        .unwrap_or(DEFAULT_FAMILY)
        .to_string()
}

/// Returns the capability set for a (raw or normalized) model name.
///
/// Always contains [`BASE_CAPABILITY`].
#[must_use]
pub fn capabilities_of(name: &str) -> BTreeSet<String> {
    let cleaned = rule_key(name);
    let mut capabilities = BTreeSet::from([BASE_CAPABILITY.to_string()]);

    for (pattern, capability) in CAPABILITY_RULES {
        if pattern.matches(&cleaned) {
            capabilities.insert((*capability).to_string());
        }
    }

    capabilities
}

fn first_match(rules: &[(Pattern, &'static str)], name: &str) -> Option<&'static str> {
    rules
        .iter()
        .find(|(pattern, _)| pattern.matches(name))
        .map(|(_, value)| *value)
}

/// Resolves SDK class names, either bare (`ChatOpenAI`) or dotted
/// (`langchain.chat_models.openai.ChatOpenAI`).
fn class_name_default(raw: &str) -> Option<&'static str> {
    let candidate = if raw.starts_with("langchain") {
        raw.rsplit('.').next().unwrap_or(raw)
    } else {
        raw
    };

    CLASS_NAME_DEFAULTS
        .iter()
        .find(|(class_name, _)| *class_name == candidate)
        .map(|(_, model_id)| *model_id)
}

/// Lowercases, drops any `provider/` path prefix and version suffix, and
/// folds Azure's `gpt-35` spelling.
fn clean(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let base = lower.rsplit('/').next().unwrap_or(&lower);
    let base = base.replace(' ', "-").replace("gpt-35", "gpt-3.5");

    VERSION_SUFFIX.replace(&base, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_names() {
        assert_eq!(normalize_name("gpt-4"), "gpt-4");
        assert_eq!(normalize_name("gpt-4-0613"), "gpt-4");
        assert_eq!(normalize_name("GPT-4o-mini-2024-07-18"), "gpt-4o-mini");
        assert_eq!(normalize_name("openai/gpt-4o"), "gpt-4o");
        assert_eq!(normalize_name("gpt-35-turbo"), "gpt-3.5-turbo");
        assert_eq!(
            normalize_name("claude-3-5-sonnet-20240620"),
            "claude-3.5-sonnet"
        );
        assert_eq!(normalize_name("claude-3-opus@20240229"), "claude-3-opus");
        assert_eq!(normalize_name("claude-2.1"), "claude-2.1");
        assert_eq!(normalize_name("models/gemini-pro"), "gemini-pro");
    }

    #[test]
    fn test_specific_rules_win_over_general() {
        // `gpt-4o-mini` also contains `gpt-4o` and `gpt-4`
        assert_eq!(normalize_name("gpt-4o-mini"), "gpt-4o-mini");
        assert_eq!(family_of("gpt-4o-mini"), "GPT-4o");
        assert_eq!(family_of("claude-3.5-sonnet"), "Claude 3.5");
        assert_eq!(family_of("claude-3-opus"), "Claude 3");
        assert_eq!(family_of("claude-2"), "Claude");
    }

    #[test]
    fn test_raw_ids_resolve_like_canonical_names() {
        assert_eq!(family_of("claude-3-5-sonnet-20240620"), "Claude 3.5");
        assert_eq!(family_of("claude-3-5-haiku"), "Claude 3.5");
        assert_eq!(family_of("ChatOpenAI"), "GPT-3.5");
        assert_eq!(
            capabilities_of("claude-3-5-sonnet-20240620"),
            capabilities_of("claude-3.5-sonnet")
        );
        assert!(capabilities_of("claude-3-5-sonnet-20240620").contains("vision"));
    }

    #[test]
    fn test_class_names_resolve_to_default_model() {
        assert_eq!(normalize_name("ChatOpenAI"), "gpt-3.5-turbo");
        assert_eq!(normalize_name("AzureChatOpenAI"), "gpt-3.5-turbo");
        assert_eq!(
            normalize_name("langchain.chat_models.anthropic.ChatAnthropic"),
            "claude-3-haiku"
        );
    }

    #[test]
    fn test_totality_defaults() {
        for name in [normalize_name(""), normalize_name(None), normalize_name("   ")] {
            assert_eq!(name, UNKNOWN_MODEL);
        }
        assert_eq!(normalize_name("totally-unknown-xyz"), UNKNOWN_MODEL);

        assert_eq!(provider_of(""), UNKNOWN_PROVIDER);
        assert_eq!(provider_of(UNKNOWN_MODEL), UNKNOWN_PROVIDER);
        assert_eq!(family_of("totally-unknown-xyz"), DEFAULT_FAMILY);
        assert_eq!(
            capabilities_of("totally-unknown-xyz"),
            BTreeSet::from([BASE_CAPABILITY.to_string()])
        );
    }

    #[test]
    fn test_provider_of() {
        assert_eq!(provider_of("gpt-4"), "OpenAI");
        assert_eq!(provider_of("o1-mini"), "OpenAI");
        assert_eq!(provider_of("claude-2"), "Anthropic");
        assert_eq!(provider_of("gemini-1.5-pro"), "Google");
        assert_eq!(provider_of("llama3"), "Meta");
        assert_eq!(provider_of("mixtral-8x7b"), "Mistral AI");
        assert_eq!(provider_of("unknown-model"), "Unknown");
    }

    #[test]
    fn test_capabilities_of() {
        let gpt4 = capabilities_of("gpt-4");
        assert!(gpt4.contains("text-generation"));
        assert!(gpt4.contains("chat"));
        assert!(gpt4.contains("function-calling"));
        assert!(!gpt4.contains("vision"));

        assert!(capabilities_of("gpt-4o").contains("vision"));
        assert!(capabilities_of("text-embedding-3-small").contains("embeddings"));
    }
}
