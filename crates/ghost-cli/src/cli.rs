//! Command-line flags

use std::path::PathBuf;

use clap::Parser;

/// Chat with an LLM that can call tools from external tool providers
#[derive(Parser, Debug)]
#[command(name = "ghost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Prompt template file
    #[arg(short, long, default_value = "prompt.md")]
    pub prompt: PathBuf,

    /// Name of the configured LLM to use (defaults to the first one)
    #[arg(short, long)]
    pub llm: Option<String>,

    /// Path to the config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model to use instead of the configured one
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt file
    #[arg(short, long)]
    pub system: Option<PathBuf>,
}

impl Cli {
    /// Model from the flag, falling back to the configured default
    pub fn model_or<'a>(&'a self, configured: &'a str) -> &'a str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ghost"]);
        assert_eq!(cli.prompt, PathBuf::from("prompt.md"));
        assert!(cli.llm.is_none());
        assert_eq!(cli.model_or("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "ghost", "-p", "task.md", "-l", "gemini", "-c", "ghost.toml", "-m", "flash", "-s",
            "system.md",
        ]);
        assert_eq!(cli.prompt, PathBuf::from("task.md"));
        assert_eq!(cli.llm.as_deref(), Some("gemini"));
        assert_eq!(cli.config, Some(PathBuf::from("ghost.toml")));
        assert_eq!(cli.model_or("pro"), "flash");
        assert_eq!(cli.system, Some(PathBuf::from("system.md")));
    }
}
