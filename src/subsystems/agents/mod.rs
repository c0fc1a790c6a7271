//! Agent crew — the roles that talk to the customer.
//!
//! Each [`AgentRole`] is a thin persona: a label, a goal, a backstory and a
//! layered system prompt.  The [`Crew`] gives every role a voice through a
//! single LLM call ([`Crew::voice`]) that rewrites a drafted reply in that
//! role's persona.  The drafts themselves, and every decision behind them,
//! are produced deterministically by the conversation flow and the
//! [`Backoffice`] tasks; the LLM only phrases them.
//!
//! Voicing is best-effort: a provider failure, or a rewrite that drops any
//! figure from the draft, keeps the draft as-is.

mod backoffice;
pub mod prompt;

pub use backoffice::{Backoffice, LoanContext, PipelineOutcome, Verification};

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::LlmProvider;

/// Figures (amounts, rates, phone numbers) that a rewrite must keep verbatim.
static FIGURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,\.]*").expect("static regex"));

// ── AgentRole ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Master,
    Sales,
    Verification,
    Underwriting,
    Sanction,
}

impl AgentRole {
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Master,
        AgentRole::Sales,
        AgentRole::Verification,
        AgentRole::Underwriting,
        AgentRole::Sanction,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgentRole::Master => "Master Agent",
            AgentRole::Sales => "Sales Agent",
            AgentRole::Verification => "Verification Agent",
            AgentRole::Underwriting => "Underwriting Agent",
            AgentRole::Sanction => "Sanction Agent",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            AgentRole::Master => "🤖",
            AgentRole::Sales => "🤝",
            AgentRole::Verification => "🛂",
            AgentRole::Underwriting => "📊",
            AgentRole::Sanction => "📄",
        }
    }

    pub fn goal(self) -> &'static str {
        match self {
            AgentRole::Master => {
                "Route the customer through verification, underwriting and sanction"
            }
            AgentRole::Sales => "Collect user needs and loan parameters, persuade to proceed",
            AgentRole::Verification => "Verify KYC using CRM by phone",
            AgentRole::Underwriting => {
                "Underwrite loan per rules with credit score & pre-approved limit"
            }
            AgentRole::Sanction => "Generate a sanction letter PDF",
        }
    }

    pub fn backstory(self) -> &'static str {
        match self {
            AgentRole::Master => "Seasoned loan concierge who coordinates the specialist desk.",
            AgentRole::Sales => "Top-performing digital RM with empathy and clarity.",
            AgentRole::Verification => "Diligent KYC specialist.",
            AgentRole::Underwriting => "Risk analyst focused on objective rules.",
            AgentRole::Sanction => "Back-office document generator.",
        }
    }

    /// Back-office tools the role's answers are grounded in.
    pub fn tools(self) -> &'static [&'static str] {
        match self {
            AgentRole::Master => &[],
            AgentRole::Sales => &["offer_mart_get_preapproved_limit"],
            AgentRole::Verification => &["crm_get_customer_by_phone"],
            AgentRole::Underwriting => &[
                "credit_bureau_get_score",
                "offer_mart_get_preapproved_limit",
                "evaluate_application",
            ],
            AgentRole::Sanction => &["generate_sanction_letter"],
        }
    }

    fn prompt_file(self) -> &'static str {
        match self {
            AgentRole::Master => "master.md",
            AgentRole::Sales => "sales.md",
            AgentRole::Verification => "verification.md",
            AgentRole::Underwriting => "underwriting.md",
            AgentRole::Sanction => "sanction.md",
        }
    }

    /// Assemble this role's system prompt from the layered templates.
    pub fn system_prompt(self, prompts_dir: &Path) -> String {
        let body = std::fs::read_to_string(prompts_dir.join("voice.txt")).unwrap_or_else(|_| {
            "Rewrite the drafted message in your voice as {{role}}. \
             Keep every number exactly as written. Reply with the message only."
                .to_string()
        });
        prompt::preamble(prompts_dir)
            .layer(self.prompt_file())
            .with_tools(self.tools())
            .append(body)
            .var("role", self.label())
            .var("goal", self.goal())
            .var("backstory", self.backstory())
            .build()
    }
}

// ── Crew ──────────────────────────────────────────────────────────────────────

/// The agent crew sharing one LLM provider.
///
/// System prompts are assembled once at construction.  With `provider` set
/// to `None` voicing is disabled and every draft is returned untouched.
pub struct Crew {
    provider: Option<LlmProvider>,
    system_prompts: HashMap<AgentRole, String>,
}

impl Crew {
    pub fn new(provider: Option<LlmProvider>, prompts_dir: &Path) -> Self {
        let system_prompts = AgentRole::ALL
            .iter()
            .map(|role| (*role, role.system_prompt(prompts_dir)))
            .collect();
        Self { provider, system_prompts }
    }

    pub fn provider(&self) -> Option<&LlmProvider> {
        self.provider.as_ref()
    }

    pub fn system_prompt(&self, role: AgentRole) -> &str {
        self.system_prompts.get(&role).map(String::as_str).unwrap_or_default()
    }

    /// Rewrite `draft` in `role`'s voice with one LLM call.
    pub async fn voice(&self, role: AgentRole, draft: &str) -> String {
        let Some(provider) = &self.provider else {
            return draft.to_string();
        };

        match provider.complete(draft, Some(self.system_prompt(role))).await {
            Ok(resp) => {
                if let Some(u) = resp.usage {
                    debug!(role = role.label(), input = u.input_tokens, output = u.output_tokens, "voice tokens");
                }
                if preserves_figures(draft, &resp.text) {
                    resp.text
                } else {
                    warn!(role = role.label(), "voiced reply dropped figures — keeping draft");
                    draft.to_string()
                }
            }
            Err(e) => {
                warn!(role = role.label(), error = %e, "voicing failed — keeping draft");
                draft.to_string()
            }
        }
    }
}

/// `true` when every figure in `draft`, and the `restart` keyword if the
/// draft mentions it, also appears in `reply`.
pub fn preserves_figures(draft: &str, reply: &str) -> bool {
    let figures_kept = FIGURE_RE
        .find_iter(draft)
        .map(|m| m.as_str().trim_end_matches(['.', ',']))
        .all(|fig| reply.contains(fig));
    let keyword_kept = !draft.contains("restart") || reply.contains("restart");
    figures_kept && keyword_kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;
    use std::path::PathBuf;

    fn prompts_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("config/prompts")
    }

    #[test]
    fn system_prompt_is_fully_rendered() {
        for role in AgentRole::ALL {
            let p = role.system_prompt(&prompts_dir());
            assert!(p.contains(role.label()), "{role:?} prompt names its role");
            assert!(!p.contains("{{"), "{role:?} prompt has unresolved placeholders");
        }
    }

    #[test]
    fn underwriting_prompt_lists_its_tools() {
        let p = AgentRole::Underwriting.system_prompt(&prompts_dir());
        assert!(p.contains("credit_bureau_get_score"));
        assert!(p.contains("evaluate_application"));
    }

    #[test]
    fn figures_must_survive_rewrite() {
        let draft = "Your EMI is ₹16,607 over 36 months.";
        assert!(preserves_figures(draft, "Good news — ₹16,607 a month for 36 months."));
        assert!(!preserves_figures(draft, "Your EMI is about ₹16,600 over three years."));
    }

    #[test]
    fn restart_keyword_must_survive_rewrite() {
        let draft = "Type `restart` to begin again.";
        assert!(!preserves_figures(draft, "Say the word to begin again."));
        assert!(preserves_figures(draft, "Just type `restart` whenever you like."));
    }

    #[tokio::test]
    async fn voice_without_provider_returns_draft() {
        let crew = Crew::new(None, &prompts_dir());
        assert_eq!(crew.voice(AgentRole::Sales, "Hello ₹10,000").await, "Hello ₹10,000");
    }

    #[tokio::test]
    async fn voice_with_dummy_provider_round_trips() {
        let crew = Crew::new(Some(LlmProvider::Dummy(DummyProvider)), &prompts_dir());
        let draft = "All checks passed! Your estimated EMI comes to ₹8,885.";
        assert_eq!(crew.voice(AgentRole::Underwriting, draft).await, draft);
    }
}
