//! `jarvis setup`: interactive editing of `~/.jarvis/config.toml`.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::types::ProviderIdentity;

/// Something that can ask the user a question and return the answer.
pub trait Prompter {
    fn ask(&mut self, prompt: &str) -> Result<String>;

    fn say(&mut self, text: &str) {
        println!("{}", text);
    }
}

pub struct ConsolePrompter {
    editor: DefaultEditor,
}

impl ConsolePrompter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Prompter for ConsolePrompter {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(line.trim().to_string()),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                bail!("Setup cancelled; nothing was saved")
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Load (or recover) the config at `path`, walk the user through it, save it.
pub fn run(path: &Path, prompter: &mut dyn Prompter) -> Result<PathBuf> {
    let mut config = match AppConfig::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("config unreadable, starting from defaults: {:#}", e);
            let backup = AppConfig::backup_corrupt(path)?;
            prompter.say(&format!(
                "Existing config could not be read; moved it to {}",
                backup.display()
            ));
            AppConfig::default()
        }
    };

    prompter.say("Jarvis setup. Press Enter to keep the value in [brackets].");
    configure(&mut config, prompter)?;
    config.save_to(path)?;
    info!(path = %path.display(), "config saved");
    prompter.say(&format!("Saved {}", path.display()));
    Ok(path.to_path_buf())
}

/// Ask for keys, the default provider, and per-provider model settings.
pub fn configure(config: &mut AppConfig, prompter: &mut dyn Prompter) -> Result<()> {
    prompter.say("API keys (enter - to remove a stored key):");
    for identity in ProviderIdentity::PRIORITY {
        let current = config.settings(identity).api_key.clone();
        let shown = current.as_deref().map(mask).unwrap_or_else(|| "none".to_string());
        let answer = prompter.ask(&format!("  {} API key [{}]: ", identity, shown))?;
        match answer.as_str() {
            "" => {}
            "-" => config.settings_mut(identity).api_key = None,
            key => config.settings_mut(identity).api_key = Some(key.to_string()),
        }
    }

    let current = config
        .default_provider
        .map(|p| p.key().to_string())
        .unwrap_or_else(|| "none".to_string());
    config.default_provider = ask_parsed(
        prompter,
        &format!("Default provider (openai/anthropic/gemini) [{}]: ", current),
        config.default_provider,
        |answer| answer.parse::<ProviderIdentity>().map(Some),
    )?;

    for identity in ProviderIdentity::PRIORITY {
        if config.api_key(identity).is_none() {
            continue;
        }
        prompter.say(&format!("{} settings:", identity));

        let model = config.model(identity);
        let answer = prompter.ask(&format!("  model [{}]: ", model))?;
        if !answer.is_empty() {
            config.settings_mut(identity).model = Some(answer);
        }

        let temperature = config.settings(identity).temperature;
        config.settings_mut(identity).temperature = ask_parsed(
            prompter,
            &format!("  temperature (0-2) [{}]: ", temperature),
            temperature,
            parse_temperature,
        )?;

        let max_tokens = config.settings(identity).max_tokens;
        config.settings_mut(identity).max_tokens = ask_parsed(
            prompter,
            &format!("  max tokens [{}]: ", max_tokens),
            max_tokens,
            parse_max_tokens,
        )?;
    }
    Ok(())
}

/// Ask until the answer is empty (keep `current`) or `parse` accepts it.
fn ask_parsed<T, E: Display>(
    prompter: &mut dyn Prompter,
    prompt: &str,
    current: T,
    parse: impl Fn(&str) -> std::result::Result<T, E>,
) -> Result<T> {
    loop {
        let answer = prompter.ask(prompt)?;
        if answer.is_empty() {
            return Ok(current);
        }
        match parse(&answer) {
            Ok(value) => return Ok(value),
            Err(e) => prompter.say(&format!("  {}; try again.", e)),
        }
    }
}

fn parse_temperature(answer: &str) -> std::result::Result<f32, String> {
    match answer.parse::<f32>() {
        Ok(t) if (0.0..=2.0).contains(&t) => Ok(t),
        _ => Err(format!("'{}' is not a number between 0 and 2", answer)),
    }
}

fn parse_max_tokens(answer: &str) -> std::result::Result<u32, String> {
    match answer.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{}' is not a positive whole number", answer)),
    }
}

/// `sk-p…wxyz`: enough to recognise a key without echoing it.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::config_with_keys;
    use crate::config::ConfigStore;
    use std::collections::VecDeque;

    struct Scripted {
        answers: VecDeque<&'static str>,
        /// Answer Enter once the script runs out instead of failing.
        then_enter: bool,
        prompts: Vec<String>,
        said: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                then_enter: false,
                prompts: Vec::new(),
                said: Vec::new(),
            }
        }
    }

    impl Prompter for Scripted {
        fn ask(&mut self, prompt: &str) -> Result<String> {
            self.prompts.push(prompt.to_string());
            match self.answers.pop_front() {
                Some(answer) => Ok(answer.to_string()),
                None if self.then_enter => Ok(String::new()),
                None => bail!("out of answers at {:?}", prompt),
            }
        }

        fn say(&mut self, text: &str) {
            self.said.push(text.to_string());
        }
    }

    #[test]
    fn test_mask_hides_the_middle() {
        assert_eq!(mask("sk-proj-abcdefgh1234"), "sk-p…1234");
        assert_eq!(mask("short"), "****");
    }

    #[test]
    fn test_configure_sets_keys_and_default() {
        let mut config = config_with_keys(&[], None);
        let mut prompter = Scripted::new(&[
            "sk-openai-000000", // OpenAI key
            "",                 // Anthropic key
            "gm-key-11111111",  // Gemini key
            "gemini",           // default provider
            "",                 // OpenAI model
            "",                 // OpenAI temperature
            "",                 // OpenAI max tokens
            "gemini-2.5-pro",   // Gemini model
            "1.2",              // Gemini temperature
            "2048",             // Gemini max tokens
        ]);
        configure(&mut config, &mut prompter).unwrap();

        assert_eq!(config.default_provider, Some(ProviderIdentity::Gemini));
        assert_eq!(
            config.available_providers(),
            vec![ProviderIdentity::OpenAi, ProviderIdentity::Gemini]
        );
        assert_eq!(config.model(ProviderIdentity::OpenAi), "gpt-4o");
        assert_eq!(config.model(ProviderIdentity::Gemini), "gemini-2.5-pro");
        assert_eq!(config.providers.gemini.temperature, 1.2);
        assert_eq!(config.providers.gemini.max_tokens, 2048);
        assert!(prompter.answers.is_empty());
    }

    #[test]
    fn test_invalid_answers_reprompt() {
        let mut config = config_with_keys(&[ProviderIdentity::Anthropic], None);
        let mut prompter = Scripted::new(&[
            "", "", "", // keys unchanged
            "claude-ish", "claude", // bad then good provider
            "",    // model
            "9", "abc", "0.5", // temperature
            "0", "-3", "100", // max tokens
        ]);
        configure(&mut config, &mut prompter).unwrap();

        assert_eq!(config.default_provider, Some(ProviderIdentity::Anthropic));
        assert_eq!(config.providers.anthropic.temperature, 0.5);
        assert_eq!(config.providers.anthropic.max_tokens, 100);
        let retries = prompter
            .said
            .iter()
            .filter(|s| s.contains("try again"))
            .count();
        assert_eq!(retries, 5);
    }

    #[test]
    fn test_dash_removes_a_stored_key() {
        let mut config = config_with_keys(&[ProviderIdentity::OpenAi], Some(ProviderIdentity::OpenAi));
        let mut prompter = Scripted::new(&["-", "", "", ""]);
        configure(&mut config, &mut prompter).unwrap();
        assert!(config.providers.openai.api_key.is_none());
        assert!(config.available_providers().is_empty());
        assert_eq!(config.default_provider, Some(ProviderIdentity::OpenAi));
        assert!(prompter.prompts[0].contains("open…-key"));
    }

    #[test]
    fn test_run_saves_and_recovers_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        // Keys from the environment may add provider prompts; Enter keeps them.
        let mut prompter = Scripted::new(&["", "sk-ant-12345678", "", "anthropic"]);
        prompter.then_enter = true;
        run(&path, &mut prompter).unwrap();

        assert!(dir.path().join("config.toml.bak").exists());
        let saved = AppConfig::load_from(&path).unwrap();
        assert_eq!(saved.default_provider, Some(ProviderIdentity::Anthropic));
        assert_eq!(saved.providers.anthropic.api_key.as_deref(), Some("sk-ant-12345678"));
        assert!(prompter.said[0].contains("config.toml.bak"));
    }

    #[test]
    fn test_run_without_answers_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut prompter = Scripted::new(&["sk-openai-000000"]);
        assert!(run(&path, &mut prompter).is_err());
        assert!(!path.exists());
    }
}
