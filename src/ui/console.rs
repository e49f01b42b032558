//! Line-oriented console terminal: rustyline for input, crossterm for color.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use crossterm::style::{Color, Stylize};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::warn;

use super::{Banner, InputEvent, Terminal};
use crate::config::UiConfig;

const ART: &str = r"
     ██╗ █████╗ ██████╗ ██╗   ██╗██╗███████╗
     ██║██╔══██╗██╔══██╗██║   ██║██║██╔════╝
     ██║███████║██████╔╝██║   ██║██║███████╗
██   ██║██╔══██║██╔══██╗╚██╗ ██╔╝██║╚════██║
╚█████╔╝██║  ██║██║  ██║ ╚████╔╝ ██║███████║
 ╚════╝ ╚═╝  ╚═╝╚═╝  ╚═╝  ╚═══╝  ╚═╝╚══════╝
";

const RULE: &str = "==============================";

pub struct ConsoleTerminal {
    editor: DefaultEditor,
    color: bool,
    typewriter_delay: Duration,
}

impl ConsoleTerminal {
    pub fn new(ui: &UiConfig) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            color: ui.color && std::env::var_os("NO_COLOR").is_none(),
            typewriter_delay: Duration::from_millis(ui.typewriter_delay_ms),
        })
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        if bold {
            text.with(color).bold().to_string()
        } else {
            text.with(color).to_string()
        }
    }
}

#[async_trait(?Send)]
impl Terminal for ConsoleTerminal {
    fn read_line(&mut self) -> InputEvent {
        match self.editor.readline("You: ") {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                InputEvent::Line(line)
            }
            Err(ReadlineError::Interrupted) => InputEvent::Interrupted,
            Err(ReadlineError::Eof) => InputEvent::Eof,
            Err(e) => {
                warn!("line editor failed: {}", e);
                InputEvent::Eof
            }
        }
    }

    fn write_banner(&mut self, banner: &Banner) {
        println!("{}", self.paint(ART, Color::Blue, true));
        println!("{}", RULE);
        let online = format!(
            "{} online. Provider: {}",
            banner.name,
            banner.provider.to_string().to_uppercase()
        );
        println!("{}", self.paint(&online, Color::Red, true));
        println!("{}", RULE);
        if !banner.shortcuts.is_empty() {
            println!();
            println!("{}", self.paint("Available shortcuts:", Color::Cyan, true));
            for (prefix, identity) in &banner.shortcuts {
                println!("  • {}: for {}", prefix, identity);
            }
        }
        println!("Type /help for commands, exit to leave.");
        println!();
    }

    fn begin_reply(&mut self, label: &str) {
        print!("{} ", self.paint(&format!("{}:", label), Color::Red, true));
        let _ = io::stdout().flush();
    }

    async fn write_fragment(&mut self, text: &str) {
        let mut out = io::stdout();
        if self.typewriter_delay.is_zero() {
            let _ = write!(out, "{}", text);
            let _ = out.flush();
            return;
        }
        for ch in text.chars() {
            let _ = write!(out, "{}", ch);
            let _ = out.flush();
            tokio::time::sleep(self.typewriter_delay).await;
        }
    }

    fn end_reply(&mut self) {
        println!("\n");
    }

    fn write_notice(&mut self, text: &str) {
        println!("{}", self.paint(&format!("⚠️  {}", text), Color::Yellow, true));
    }

    fn write_error(&mut self, text: &str) {
        println!("{}", self.paint(&format!("Error: {}", text), Color::Red, true));
    }

    fn write_info(&mut self, text: &str) {
        println!("{}", text);
    }
}
