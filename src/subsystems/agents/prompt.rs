//! Layered prompt builder for the agent crew.
//!
//! System prompts are assembled from plain-text fragments under
//! `config/prompts/`.  Each layer is appended in order; missing files are
//! skipped so every layer is optional.
//!
//! ## Layer ordering convention
//!
//! ```text
//! 0. persona.md  — the lender and the crew's shared house style
//! 1. <role>.md   — role-specific instructions (master, sales, …)
//! 2. tools.md    — mock back-office tools the role may cite; {{tools}}
//! 3. <body>      — task template, e.g. voice.txt
//! ```
//!
//! Variable substitution uses `{{key}}` syntax and is applied once at
//! [`build()`](PromptBuilder::build) time, after all layers are joined.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const SEPARATOR: &str = "\n\n";

/// Fluent builder that assembles a layered prompt from template files.
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    /// Create a builder rooted at `prompts_dir` (e.g. `"config/prompts"`).
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            parts: Vec::new(),
            vars: HashMap::new(),
        }
    }

    /// Append a layer by loading `filename` from the prompts directory.
    /// Silently skips the layer when the file does not exist.
    pub fn layer(mut self, filename: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        match fs::read_to_string(&path) {
            Ok(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    self.parts.push(trimmed.to_string());
                }
            }
            Err(_) => {
                tracing::debug!("prompt: layer '{}' not found — skipped", path.display());
            }
        }
        self
    }

    /// Load `tools.md` and substitute `{{tools}}` with a comma-separated list
    /// of tool names.  Falls back to an inline sentence if the file is missing.
    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        let tools_str = if tools.is_empty() {
            "none".to_string()
        } else {
            tools.join(", ")
        };

        let path = self.prompts_dir.join("tools.md");
        let text = fs::read_to_string(&path)
            .unwrap_or_else(|_| "Back-office tools available to you: {{tools}}".to_string());
        let rendered = text.trim().replace("{{tools}}", &tools_str);
        if !rendered.is_empty() {
            self.parts.push(rendered);
        }
        self
    }

    /// Directly append a text fragment (e.g. an already-loaded template body).
    pub fn append(mut self, text: impl Into<String>) -> Self {
        let s = text.into();
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
        self
    }

    /// Register a single `{{key}}` → `value` substitution.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Assemble all layers, join with blank lines, and apply variable substitution.
    pub fn build(self) -> String {
        let mut prompt = self.parts.join(SEPARATOR);
        for (k, v) in &self.vars {
            let placeholder = format!("{{{{{k}}}}}");
            prompt = prompt.replace(&placeholder, v);
        }
        prompt
    }
}

/// The shared persona preamble every role starts from.
pub fn preamble(prompts_dir: impl AsRef<Path>) -> PromptBuilder {
    PromptBuilder::new(prompts_dir.as_ref()).layer("persona.md")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("config/prompts")
    }

    #[test]
    fn builder_assembles_layers_in_order() {
        let result = PromptBuilder::new(prompts_dir())
            .layer("persona.md")
            .layer("sales.md")
            .var("role", "Sales Agent")
            .build();
        let persona = result.find("NBFC").expect("persona layer present");
        let sales = result.find("Sales Agent").expect("sales layer present");
        assert!(persona < sales, "persona.md should come before sales.md");
    }

    #[test]
    fn builder_skips_missing_file() {
        let result = PromptBuilder::new(prompts_dir())
            .layer("nonexistent_file_xyz.md")
            .append("hello")
            .build();
        assert_eq!(result.trim(), "hello");
    }

    #[test]
    fn builder_substitutes_variable() {
        let result = PromptBuilder::new(prompts_dir())
            .append("Goal: {{goal}}")
            .var("goal", "verify KYC")
            .build();
        assert_eq!(result, "Goal: verify KYC");
    }

    #[test]
    fn builder_with_tools_rendered() {
        let result = PromptBuilder::new(prompts_dir())
            .with_tools(&["crm_get_customer_by_phone", "credit_bureau_get_score"])
            .build();
        assert!(result.contains("crm_get_customer_by_phone, credit_bureau_get_score"));
        assert!(!result.contains("{{tools}}"));
    }

    #[test]
    fn builder_with_empty_tools_renders_none() {
        let result = PromptBuilder::new("/nonexistent").with_tools(&[]).build();
        assert_eq!(result, "Back-office tools available to you: none");
    }
}
