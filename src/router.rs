//! Per-message provider selection.
//!
//! A line may start with a one-letter shortcut (`g:`, `o:`, `c:`) that
//! picks the provider for that message only. Without one, the configured
//! default is used. Whenever the wanted provider has no API key, the router
//! substitutes an available one and says so in a notice.

use tracing::debug;

use crate::config::ConfigStore;
use crate::error::ChatError;
use crate::types::ProviderIdentity;

/// Shortcut letter to provider name.
pub const SHORTCUTS: &[(&str, &str)] = &[("g", "gemini"), ("o", "openai"), ("c", "anthropic")];

/// The outcome of routing one input line.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub identity: ProviderIdentity,
    /// The input with any shortcut prefix removed.
    pub line: String,
    /// Set when the provider differs from the one the user asked for.
    pub fallback_notice: Option<String>,
}

pub fn select(input: &str, config: &dyn ConfigStore) -> Result<Selection, ChatError> {
    select_with(input, config, SHORTCUTS)
}

fn select_with(
    input: &str,
    config: &dyn ConfigStore,
    shortcuts: &[(&str, &str)],
) -> Result<Selection, ChatError> {
    let available = config.available_providers();
    if available.is_empty() {
        return Err(ChatError::NoProviderAvailable);
    }

    if let Some((identity, rest)) = parse_shortcut(input, shortcuts)? {
        if available.contains(&identity) {
            debug!(provider = %identity, "shortcut selected provider");
            return Ok(Selection {
                identity,
                line: rest.trim().to_string(),
                fallback_notice: None,
            });
        }
        let substitute = fallback(config, &available);
        debug!(wanted = %identity, provider = %substitute, "shortcut provider unavailable");
        return Ok(Selection {
            identity: substitute,
            line: rest.trim().to_string(),
            fallback_notice: Some(unavailable_notice(identity, substitute)),
        });
    }

    let substitute = fallback(config, &available);
    let fallback_notice = match config.default_provider() {
        Some(default) if default != substitute => Some(unavailable_notice(default, substitute)),
        _ => None,
    };
    Ok(Selection {
        identity: substitute,
        line: input.trim().to_string(),
        fallback_notice,
    })
}

/// The default provider if it is available, else the first available one.
fn fallback(config: &dyn ConfigStore, available: &[ProviderIdentity]) -> ProviderIdentity {
    match config.default_provider() {
        Some(default) if available.contains(&default) => default,
        _ => available[0],
    }
}

fn unavailable_notice(wanted: ProviderIdentity, used: ProviderIdentity) -> String {
    format!(
        "{} is unavailable (no API key configured); using {} instead.",
        wanted, used
    )
}

/// Split a leading `x:` shortcut off `input`, matching the letter
/// case-insensitively.
fn parse_shortcut<'a>(
    input: &'a str,
    shortcuts: &[(&str, &str)],
) -> Result<Option<(ProviderIdentity, &'a str)>, ChatError> {
    let trimmed = input.trim_start();
    let Some((prefix, rest)) = trimmed.split_once(':') else {
        return Ok(None);
    };
    let Some((_, target)) = shortcuts
        .iter()
        .find(|(letter, _)| letter.eq_ignore_ascii_case(prefix))
    else {
        return Ok(None);
    };
    let identity = target
        .parse::<ProviderIdentity>()
        .map_err(|_| ChatError::UnsupportedShortcut {
            prefix: prefix.to_string(),
            target: target.to_string(),
        })?;
    Ok(Some((identity, rest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::config_with_keys;
    use ProviderIdentity::*;

    #[test]
    fn test_available_shortcut_strips_prefix() {
        let config = config_with_keys(&[OpenAi, Anthropic, Gemini], Some(OpenAi));
        for (line, expected) in [
            ("g: tell me a joke", Gemini),
            ("o:hi", OpenAi),
            ("C: hello there", Anthropic),
            ("G:what", Gemini),
        ] {
            let sel = select(line, &config).unwrap();
            assert_eq!(sel.identity, expected, "line {:?}", line);
            assert!(sel.fallback_notice.is_none());
        }
        assert_eq!(select("o:hi", &config).unwrap().line, "hi");
        assert_eq!(select("C: hello there", &config).unwrap().line, "hello there");
    }

    #[test]
    fn test_shortcut_to_default_via_gemini() {
        let config = config_with_keys(&[OpenAi, Gemini], Some(OpenAi));
        let sel = select("g: tell me a joke", &config).unwrap();
        assert_eq!(sel.identity, Gemini);
        assert_eq!(sel.line, "tell me a joke");
    }

    #[test]
    fn test_unavailable_shortcut_falls_back_with_notice() {
        let config = config_with_keys(&[OpenAi], None);
        let sel = select("c: hello", &config).unwrap();
        assert_eq!(sel.identity, OpenAi);
        assert_eq!(sel.line, "hello");
        let notice = sel.fallback_notice.unwrap();
        assert!(notice.contains("Anthropic"));
        assert!(notice.contains("OpenAI"));
    }

    #[test]
    fn test_unavailable_shortcut_prefers_available_default() {
        let config = config_with_keys(&[OpenAi, Gemini], Some(Gemini));
        let sel = select("c: hello", &config).unwrap();
        assert_eq!(sel.identity, Gemini);
        assert!(sel.fallback_notice.is_some());
    }

    #[test]
    fn test_every_unavailable_shortcut_picks_another_provider() {
        let key_sets: [&[ProviderIdentity]; 4] =
            [&[OpenAi], &[Anthropic], &[Gemini], &[OpenAi, Gemini]];
        for keys in key_sets {
            let config = config_with_keys(keys, None);
            for (letter, target) in SHORTCUTS {
                let wanted: ProviderIdentity = target.parse().unwrap();
                if keys.contains(&wanted) {
                    continue;
                }
                let sel = select(&format!("{}: x", letter), &config).unwrap();
                assert_ne!(sel.identity, wanted);
                assert!(keys.contains(&sel.identity));
                assert!(!sel.fallback_notice.unwrap().is_empty());
            }
        }
    }

    #[test]
    fn test_no_prefix_uses_default() {
        let config = config_with_keys(&[OpenAi, Anthropic], Some(Anthropic));
        let sel = select("Hello", &config).unwrap();
        assert_eq!(sel.identity, Anthropic);
        assert_eq!(sel.line, "Hello");
        assert!(sel.fallback_notice.is_none());
    }

    #[test]
    fn test_no_prefix_without_default_uses_priority() {
        let config = config_with_keys(&[Anthropic], None);
        let sel = select("Hello", &config).unwrap();
        assert_eq!(sel.identity, Anthropic);
        assert!(sel.fallback_notice.is_none());

        let config = config_with_keys(&[Gemini, Anthropic], None);
        assert_eq!(select("Hello", &config).unwrap().identity, Anthropic);
    }

    #[test]
    fn test_unavailable_default_falls_back_with_notice() {
        let config = config_with_keys(&[Gemini], Some(OpenAi));
        let sel = select("Hello", &config).unwrap();
        assert_eq!(sel.identity, Gemini);
        assert!(sel.fallback_notice.unwrap().contains("OpenAI"));
    }

    #[test]
    fn test_no_providers_always_fails() {
        let config = config_with_keys(&[], Some(OpenAi));
        for line in ["anything", "g: joke", "o:", ""] {
            assert!(matches!(
                select(line, &config),
                Err(ChatError::NoProviderAvailable)
            ));
        }
    }

    #[test]
    fn test_unknown_prefix_is_plain_text() {
        let config = config_with_keys(&[OpenAi], None);
        let sel = select("note: remember milk", &config).unwrap();
        assert_eq!(sel.identity, OpenAi);
        assert_eq!(sel.line, "note: remember milk");
        assert!(sel.fallback_notice.is_none());
    }

    #[test]
    fn test_shortcut_to_unknown_provider_is_rejected() {
        let config = config_with_keys(&[OpenAi], None);
        let err = select_with("m: bonjour", &config, &[("m", "mistral")]).unwrap_err();
        assert!(matches!(err, ChatError::UnsupportedShortcut { .. }));
    }
}
