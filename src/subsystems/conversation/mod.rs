//! Conversation state machine — one per chat session.
//!
//! The master agent walks the customer through a fixed sequence of states,
//! collecting the phone number, loan amount, tenure and (optionally) salary
//! before handing the application to the [`Backoffice`] pipeline.  Rate and
//! amount negotiation can interrupt any state once a phone is on file.
//!
//! [`Conversation::handle`] is synchronous and deterministic: every reply is
//! a drafted message attributed to one [`AgentRole`].  Voicing those drafts
//! through the LLM happens afterwards, in the session service.

pub mod negotiation;
pub mod parse;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PolicyConfig;
use crate::error::AppError;
use crate::money::format_currency;
use crate::subsystems::agents::{AgentRole, Backoffice, LoanContext, PipelineOutcome};
use crate::subsystems::tools::Customer;

use negotiation::{propose_rate, wants_amount_adjustment, wants_lower_rate};
use parse::{digits_only, extract_number, is_greeting, is_negative_response, is_positive_response, parse_tenure};

/// Messages that reset the session from any state.
pub const RESTART_WORDS: &[&str] = &["restart", "reset", "start over", "new"];

const PHONE_DIGITS: usize = 10;

const GREETING: &str = "Hi there! I'm your personal loan concierge. \
    I'll keep things friendly while looping in my specialist teammates when needed. \
    To pull up your profile, could you share the mobile number you use with us?";

const PHONE_PROMPTS: [&str; 3] = [
    "I'll need the mobile number linked to your account so I can pull up the right details.",
    "As soon as I have your registered 10-digit number, I can bring up your loan options.",
    "Whenever you're ready, pop in the mobile number you use with us and I'll take it from there.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    CollectPhone,
    CollectLoan,
    CollectTenure,
    AskSalaryOption,
    CollectSalary,
    ReadyToRun,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One transcript entry.  Assistant messages name the agent that said them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub speaker: Option<AgentRole>,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, speaker: None, content: content.into() }
    }

    pub fn agent(speaker: AgentRole, content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, speaker: Some(speaker), content: content.into() }
    }

    /// `🤖 **Master Agent:** …` for agents, the bare text for the customer.
    pub fn render(&self) -> String {
        match self.speaker {
            Some(role) => format!("{} **{}:** {}", role.icon(), role.label(), self.content),
            None => self.content.clone(),
        }
    }
}

/// Everything collected about the current application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectedData {
    pub customer_phone: Option<String>,
    pub customer_name: Option<String>,
    pub customer_profile: Option<Customer>,
    pub loan_amount: Option<f64>,
    pub tenure_months: Option<u32>,
    pub annual_rate_pct: f64,
    pub monthly_salary: Option<f64>,
}

impl CollectedData {
    fn new(default_rate_pct: f64) -> Self {
        Self {
            customer_phone: None,
            customer_name: None,
            customer_profile: None,
            loan_amount: None,
            tenure_months: None,
            annual_rate_pct: default_rate_pct,
            monthly_salary: None,
        }
    }

    fn credit_score(&self) -> u32 {
        self.customer_profile.as_ref().map(|p| p.credit_score).unwrap_or(0)
    }

    /// Pre-approved limit from the profile; `None` when unknown or zero.
    fn pre_approved_limit(&self) -> Option<f64> {
        self.customer_profile
            .as_ref()
            .map(|p| p.pre_approved_limit)
            .filter(|l| *l > 0.0)
    }

    fn forget_identity(&mut self) {
        self.customer_phone = None;
        self.customer_name = None;
        self.customer_profile = None;
    }
}

/// A single customer's chat session.
#[derive(Debug, Clone)]
pub struct Conversation {
    id: String,
    policy: PolicyConfig,
    state: ConversationState,
    data: CollectedData,
    transcript: Vec<ChatMessage>,
    phone_retry_count: usize,
    latest: Option<PipelineOutcome>,
}

impl Conversation {
    pub fn new(id: impl Into<String>, policy: PolicyConfig) -> Self {
        let data = CollectedData::new(policy.default_rate_pct);
        let mut conv = Self {
            id: id.into(),
            policy,
            state: ConversationState::CollectPhone,
            data,
            transcript: Vec::new(),
            phone_retry_count: 0,
            latest: None,
        };
        conv.reset();
        conv
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn data(&self) -> &CollectedData {
        &self.data
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn latest_outcome(&self) -> Option<&PipelineOutcome> {
        self.latest.as_ref()
    }

    /// The issued sanction letter, if the latest run was an approval.
    pub fn letter_path(&self) -> Option<&Path> {
        match &self.latest {
            Some(PipelineOutcome::Approved { pdf_path, .. }) => Some(pdf_path.as_path()),
            _ => None,
        }
    }

    /// Replace an assistant message's text, e.g. with its voiced rewrite.
    pub fn set_content(&mut self, index: usize, content: String) {
        if let Some(msg) = self.transcript.get_mut(index) {
            msg.content = content;
        }
    }

    /// Start over: fresh greeting, fresh data, no outcome.
    pub fn reset(&mut self) {
        self.state = ConversationState::CollectPhone;
        self.data = CollectedData::new(self.policy.default_rate_pct);
        self.transcript = vec![ChatMessage::agent(AgentRole::Master, GREETING)];
        self.phone_retry_count = 0;
        self.latest = None;
        debug!(session = %self.id, "conversation reset");
    }

    fn say(&mut self, speaker: AgentRole, content: impl Into<String>) {
        self.transcript.push(ChatMessage::agent(speaker, content));
    }

    fn min_loan_notice(&self) -> String {
        format!(
            "The minimum loan amount is {}. Could you confirm an amount above that?",
            format_currency(Some(self.policy.min_loan))
        )
    }

    fn next_phone_prompt(&mut self) -> &'static str {
        let prompt = PHONE_PROMPTS[self.phone_retry_count % PHONE_PROMPTS.len()];
        self.phone_retry_count += 1;
        prompt
    }

    /// Process one customer message.
    ///
    /// Returns the transcript index of the first reply produced by this
    /// turn; everything from there to the end is new.  A restart replaces
    /// the transcript, so its index is 0.
    pub fn handle(&mut self, backoffice: &Backoffice, message: &str) -> Result<usize, AppError> {
        if RESTART_WORDS.contains(&message.trim().to_lowercase().as_str()) {
            self.reset();
            return Ok(0);
        }

        self.transcript.push(ChatMessage::user(message));
        let first_reply = self.transcript.len();
        let before = self.state;

        if !self.try_negotiate(backoffice, message)? {
            match self.state {
                ConversationState::Done => self.say(
                    AgentRole::Master,
                    "We're all done. Type `restart` to explore another application.",
                ),
                ConversationState::CollectPhone => self.on_phone(backoffice, message),
                ConversationState::CollectLoan => self.on_loan(message),
                ConversationState::CollectTenure => self.on_tenure(message),
                ConversationState::AskSalaryOption => self.on_salary_option(backoffice, message)?,
                ConversationState::CollectSalary => self.on_salary(backoffice, message)?,
                ConversationState::ReadyToRun => self.run_pipeline(backoffice)?,
            }
        }

        debug!(session = %self.id, from = ?before, to = ?self.state, "turn handled");
        Ok(first_reply)
    }

    // ── negotiation ──────────────────────────────────────────────────────────

    fn try_negotiate(&mut self, backoffice: &Backoffice, message: &str) -> Result<bool, AppError> {
        if self.data.customer_phone.is_none() {
            return Ok(false);
        }

        if wants_lower_rate(message) {
            if self.state == ConversationState::Done {
                self.say(
                    AgentRole::Master,
                    "We've already wrapped this ticket. Type `restart` and I'll open a fresh \
                     application so we can revisit the rate together.",
                );
                return Ok(true);
            }
            let current = self.data.annual_rate_pct;
            let score = self.data.credit_score();
            let proposed = propose_rate(current, score, extract_number(message));
            if proposed < current {
                self.data.annual_rate_pct = proposed;
                let credit_hint = if score > 0 {
                    format!(
                        " Given your credit score of {score}, I've got room to request this concession."
                    )
                } else {
                    String::new()
                };
                self.say(
                    AgentRole::Sales,
                    format!(
                        "I can pitch a rate of about {proposed:.2}% to underwriting for you.{credit_hint} \
                         Final numbers will still reflect their call, but I'll go in with this ask."
                    ),
                );
            } else {
                self.say(
                    AgentRole::Sales,
                    format!(
                        "We're already sitting at {current:.2}%. I'll flag your request and see if \
                         underwriting can sweeten the offer further when we submit."
                    ),
                );
            }
            return Ok(true);
        }

        let Some(current_amount) = self.data.loan_amount else {
            return Ok(false);
        };
        if !wants_amount_adjustment(message) {
            return Ok(false);
        }

        if self.state == ConversationState::Done {
            self.say(
                AgentRole::Master,
                "Happy to explore a different ticket size. Type `restart` and we'll tailor a fresh request.",
            );
            return Ok(true);
        }

        let new_amount = match extract_number(message) {
            Some(a) if a > 0.0 => a,
            _ => {
                self.say(
                    AgentRole::Sales,
                    "I didn't quite catch the amount you had in mind. Could you share the figure in rupees?",
                );
                return Ok(true);
            }
        };

        if new_amount >= current_amount {
            self.say(
                AgentRole::Sales,
                "I'm already championing a higher ticket with underwriting. If you'd like to go even \
                 bigger, we may need fresh documents. Shall we keep the current ask for now?",
            );
            return Ok(true);
        }

        if new_amount < self.policy.min_loan {
            self.say(AgentRole::Sales, self.min_loan_notice());
            return Ok(true);
        }

        self.data.loan_amount = Some(new_amount);
        let limit_note = match self.data.pre_approved_limit() {
            Some(limit) if new_amount > limit => format!(
                " (still a bit above your pre-approved {}, but I'll push for it)",
                format_currency(Some(limit))
            ),
            Some(limit) => {
                format!(" (comfortably within your pre-approved {})", format_currency(Some(limit)))
            }
            None => String::new(),
        };
        self.say(
            AgentRole::Sales,
            format!(
                "Got it. We'll reshape the request to {}{limit_note} and see if underwriting signs off.",
                format_currency(Some(new_amount))
            ),
        );

        if self.state == ConversationState::ReadyToRun {
            self.say(AgentRole::Master, "Let me refresh the checks with this revised amount.");
            self.run_pipeline(backoffice)?;
        }
        Ok(true)
    }

    // ── state handlers ───────────────────────────────────────────────────────

    fn on_phone(&mut self, backoffice: &Backoffice, message: &str) {
        let digits = digits_only(message);
        if digits.is_empty() {
            if is_greeting(message) {
                self.say(
                    AgentRole::Master,
                    "Hey, it's nice to meet you! Whenever you're ready, drop the 10-digit number you use with us.",
                );
                self.phone_retry_count = 0;
            } else if is_negative_response(message) {
                self.say(
                    AgentRole::Master,
                    "No problem. If now's not a great time, we can pause. When you're ready to \
                     continue, just share the mobile number you bank with.",
                );
            } else {
                let prompt = self.next_phone_prompt();
                self.say(AgentRole::Master, prompt);
            }
            return;
        }

        if digits.len() < PHONE_DIGITS {
            self.say(
                AgentRole::Master,
                "Looks like a few digits might be missing. Could you share the full 10-digit number?",
            );
            let prompt = self.next_phone_prompt();
            self.say(AgentRole::Master, prompt);
            return;
        }

        let phone = digits[digits.len() - PHONE_DIGITS..].to_string();
        self.phone_retry_count = 0;
        self.say(AgentRole::Master, format!("Perfect, thanks! Let me get {phone} verified real quick."));

        let kyc = backoffice.verify(&phone);
        if !kyc.verified {
            self.say(
                AgentRole::Verification,
                "I couldn't find a customer with that number. Could you try another number?",
            );
            return;
        }

        let profile = backoffice.directory().crm_get_customer_by_phone(&phone).cloned();
        self.data.customer_phone = Some(phone);
        self.data.customer_name = Some(kyc.name.clone());
        self.data.customer_profile = profile;

        self.say(
            AgentRole::Verification,
            format!("All set! I've confirmed {}'s details at {}.", kyc.name, kyc.address),
        );

        let mut welcome = String::from("Wonderful! ");
        if let Some(city) = self.data.customer_profile.as_ref().and_then(|p| p.city.as_deref()) {
            welcome.push_str(&format!("It's great to connect again with our {city} family. "));
        }
        match self.data.pre_approved_limit() {
            Some(limit) => welcome.push_str(&format!(
                "You're currently pre-approved for up to {}. What loan amount are you hoping to secure?",
                format_currency(Some(limit))
            )),
            None => welcome.push_str("What loan amount are you hoping to secure today?"),
        }
        self.say(AgentRole::Master, welcome);
        self.state = ConversationState::CollectLoan;
    }

    fn on_loan(&mut self, message: &str) {
        let Some(amount) = extract_number(message) else {
            self.say(AgentRole::Master, "Please specify the desired loan amount (numbers only).");
            return;
        };
        if amount < self.policy.min_loan {
            self.say(AgentRole::Master, self.min_loan_notice());
            return;
        }

        self.data.loan_amount = Some(amount);
        match self.data.pre_approved_limit() {
            Some(limit) if amount > limit => {
                self.say(
                    AgentRole::Master,
                    format!(
                        "Noted. That's a bit above your pre-approved {}, but let me see if \
                         underwriting can stretch.",
                        format_currency(Some(limit))
                    ),
                );
                self.say(
                    AgentRole::Master,
                    "Over how many months would you like to space out the repayments?",
                );
            }
            _ => self.say(
                AgentRole::Master,
                "Perfect. Now, over how many months would you like to repay the loan?",
            ),
        }
        self.state = ConversationState::CollectTenure;
    }

    fn on_tenure(&mut self, message: &str) {
        let Some(tenure) = parse_tenure(message) else {
            self.say(AgentRole::Master, "Could you share the tenure in months (or years)?");
            return;
        };
        let (min, max) = (self.policy.min_tenure_months, self.policy.max_tenure_months);
        if tenure < min || tenure > max {
            self.say(
                AgentRole::Master,
                format!("Please choose a tenure between {min} and {max} months."),
            );
            return;
        }

        self.data.tenure_months = Some(tenure);
        self.say(
            AgentRole::Master,
            "Great choice. If it's okay with you, can we note your monthly salary now? \
             You can always say no and I'll only ask again if underwriting insists.",
        );
        self.state = ConversationState::AskSalaryOption;
    }

    fn on_salary_option(&mut self, backoffice: &Backoffice, message: &str) -> Result<(), AppError> {
        if is_positive_response(message) {
            self.say(AgentRole::Master, "Appreciate it! What's your approximate monthly salary (INR)?");
            self.state = ConversationState::CollectSalary;
        } else if is_negative_response(message) {
            self.say(
                AgentRole::Master,
                "Totally fine. I'll proceed with underwriting and loop back only if they insist.",
            );
            self.state = ConversationState::ReadyToRun;
            self.run_pipeline(backoffice)?;
        } else {
            self.say(AgentRole::Master, "I caught neither a yes nor a no. Could you confirm?");
        }
        Ok(())
    }

    fn on_salary(&mut self, backoffice: &Backoffice, message: &str) -> Result<(), AppError> {
        let salary = match extract_number(message) {
            Some(s) if s > 0.0 => s,
            _ => {
                self.say(AgentRole::Master, "Please share the salary as a numeric value.");
                return Ok(());
            }
        };
        self.data.monthly_salary = Some(salary);
        self.say(
            AgentRole::Master,
            "Thanks! I'll highlight that figure while I liaise with underwriting.",
        );
        self.state = ConversationState::ReadyToRun;
        self.run_pipeline(backoffice)
    }

    // ── pipeline ─────────────────────────────────────────────────────────────

    fn run_pipeline(&mut self, backoffice: &Backoffice) -> Result<(), AppError> {
        let (Some(phone), Some(loan_amount), Some(tenure_months)) = (
            self.data.customer_phone.clone(),
            self.data.loan_amount,
            self.data.tenure_months,
        ) else {
            let missing: Vec<&str> = [
                ("customer_phone", self.data.customer_phone.is_none()),
                ("loan_amount", self.data.loan_amount.is_none()),
                ("tenure_months", self.data.tenure_months.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, absent)| absent.then_some(name))
            .collect();
            self.say(
                AgentRole::Master,
                format!(
                    "I still need a couple of things before I brief the team: {}",
                    missing.join(", ")
                ),
            );
            return Ok(());
        };

        let ctx = LoanContext {
            customer_phone: phone,
            loan_amount,
            tenure_months,
            annual_rate_pct: self.data.annual_rate_pct,
            monthly_salary: self.data.monthly_salary,
        };

        let display_name = self.data.customer_name.clone().unwrap_or_else(|| "there".to_string());
        self.say(
            AgentRole::Master,
            format!(
                "Thanks, {display_name}! I'm taking forward {} over {} months at around {:.2}% \
                 while I sync with underwriting and the docs team.",
                format_currency(Some(ctx.loan_amount)),
                ctx.tenure_months,
                ctx.annual_rate_pct
            ),
        );

        let outcome = backoffice.orchestrate(&ctx)?;
        match &outcome {
            PipelineOutcome::KycFailed { .. } => {
                self.say(
                    AgentRole::Verification,
                    "I couldn't match that number to any of our customers. Mind double-checking the digits?",
                );
                self.data.forget_identity();
                self.state = ConversationState::CollectPhone;
            }
            PipelineOutcome::RequireSalary { emi } => {
                let mut text = String::from(
                    "I'm almost there, but I do need a monthly take-home figure to close this out.",
                );
                if let Some(emi) = emi.filter(|e| *e > 0.0) {
                    text.push_str(&format!(
                        " Right now the EMI is tracking around {}.",
                        format_currency(Some(emi))
                    ));
                }
                self.say(AgentRole::Underwriting, text);
                self.say(
                    AgentRole::Master,
                    "A quick salary number will help me champion this for you. What does your monthly income look like?",
                );
                self.state = ConversationState::CollectSalary;
            }
            PipelineOutcome::Rejected { reason, .. } => {
                self.say(
                    AgentRole::Underwriting,
                    format!("I'm sorry, we have to decline this one because {reason}."),
                );
                self.say(
                    AgentRole::Master,
                    "If you'd like, I can explore a different amount or tenure. Just type `restart` \
                     and we'll try again together.",
                );
                self.state = ConversationState::Done;
            }
            PipelineOutcome::Approved { emi, .. } => {
                self.say(
                    AgentRole::Underwriting,
                    format!(
                        "All checks passed! Your estimated EMI comes to {}.",
                        format_currency(Some(*emi))
                    ),
                );
                let greeting = self
                    .data
                    .customer_name
                    .as_deref()
                    .map(|n| format!("{n}, "))
                    .unwrap_or_default();
                let city_line = self
                    .data
                    .customer_profile
                    .as_ref()
                    .and_then(|p| p.city.as_deref())
                    .map(|c| format!(" in {c}"))
                    .unwrap_or_default();
                self.say(
                    AgentRole::Sanction,
                    format!(
                        "{greeting}I've drafted your sanction letter{city_line}. Grab it below when you're ready!"
                    ),
                );
                self.say(AgentRole::Master, "Congratulations! Type `restart` to run another application.");
                self.state = ConversationState::Done;
            }
        }
        self.latest = Some(outcome);
        Ok(())
    }

    /// Serializable summary for the HTTP channel and session snapshots.
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            state: self.state,
            data: self.data.clone(),
            status: self.latest.as_ref().map(PipelineOutcome::status),
            emi: match &self.latest {
                Some(PipelineOutcome::RequireSalary { emi })
                | Some(PipelineOutcome::Rejected { emi, .. }) => *emi,
                Some(PipelineOutcome::Approved { emi, .. }) => Some(*emi),
                _ => None,
            },
            decline_reason: match &self.latest {
                Some(PipelineOutcome::Rejected { reason, .. }) => Some(reason.to_string()),
                _ => None,
            },
            letter_available: self.letter_path().is_some(),
            letter_file: self
                .letter_path()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned()),
            messages: self.transcript.iter().map(MessageView::from).collect(),
        }
    }
}

/// A transcript entry as shown to clients.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub role: ChatRole,
    pub speaker: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub content: String,
}

impl From<&ChatMessage> for MessageView {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role,
            speaker: msg.speaker.map(AgentRole::label),
            icon: msg.speaker.map(AgentRole::icon),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub state: ConversationState,
    pub data: CollectedData,
    pub status: Option<&'static str>,
    pub emi: Option<f64>,
    pub decline_reason: Option<String>,
    pub letter_available: bool,
    pub letter_file: Option<String>,
    pub messages: Vec<MessageView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::tools::CustomerDirectory;
    use std::sync::Arc;

    fn backoffice(dir: &Path) -> Backoffice {
        let dataset = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/sample_data.json");
        let directory = CustomerDirectory::load(&dataset).unwrap();
        Backoffice::new(Arc::new(directory), dir.join("letters"))
    }

    fn last(conv: &Conversation) -> &ChatMessage {
        conv.transcript().last().unwrap()
    }

    #[test]
    fn starts_with_master_greeting() {
        let conv = Conversation::new("s1", PolicyConfig::default());
        assert_eq!(conv.state(), ConversationState::CollectPhone);
        assert_eq!(conv.transcript().len(), 1);
        assert_eq!(conv.transcript()[0].speaker, Some(AgentRole::Master));
        assert!(conv.transcript()[0].render().starts_with("🤖 **Master Agent:** Hi there!"));
    }

    #[test]
    fn phone_prompts_rotate() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        let mut seen = Vec::new();
        for _ in 0..4 {
            conv.handle(&bo, "what?").unwrap();
            seen.push(last(&conv).content.clone());
        }
        assert_eq!(seen[0], PHONE_PROMPTS[0]);
        assert_eq!(seen[1], PHONE_PROMPTS[1]);
        assert_eq!(seen[2], PHONE_PROMPTS[2]);
        assert_eq!(seen[3], PHONE_PROMPTS[0]);
    }

    #[test]
    fn greeting_resets_prompt_rotation() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "what?").unwrap();
        conv.handle(&bo, "hello!").unwrap();
        assert!(last(&conv).content.starts_with("Hey, it's nice to meet you!"));
        conv.handle(&bo, "what?").unwrap();
        assert_eq!(last(&conv).content, PHONE_PROMPTS[0]);
    }

    #[test]
    fn short_number_asks_for_more_digits() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        let first = conv.handle(&bo, "98765").unwrap();
        let replies = &conv.transcript()[first..];
        assert_eq!(replies.len(), 2);
        assert!(replies[0].content.contains("few digits might be missing"));
        assert_eq!(conv.state(), ConversationState::CollectPhone);
    }

    #[test]
    fn unknown_phone_stays_in_collect_phone() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "1111111111").unwrap();
        assert_eq!(last(&conv).speaker, Some(AgentRole::Verification));
        assert_eq!(conv.state(), ConversationState::CollectPhone);
        assert!(conv.data().customer_phone.is_none());
    }

    #[test]
    fn country_code_is_trimmed_to_last_ten_digits() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "+91 98765 43210").unwrap();
        assert_eq!(conv.data().customer_phone.as_deref(), Some("9876543210"));
        assert_eq!(conv.state(), ConversationState::CollectLoan);
        assert!(last(&conv).content.contains("pre-approved for up to ₹500,000"));
    }

    #[test]
    fn loan_below_minimum_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "9876543210").unwrap();
        conv.handle(&bo, "5000").unwrap();
        assert!(last(&conv).content.contains("minimum loan amount is ₹10,000"));
        assert_eq!(conv.state(), ConversationState::CollectLoan);
    }

    #[test]
    fn oversized_figures_are_asked_again() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let huge = "9".repeat(400);
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "9988776655").unwrap();
        conv.handle(&bo, &huge).unwrap();
        assert_eq!(last(&conv).content, "Please specify the desired loan amount (numbers only).");
        assert_eq!(conv.state(), ConversationState::CollectLoan);
        assert_eq!(conv.data().loan_amount, None);

        conv.handle(&bo, "550000").unwrap();
        conv.handle(&bo, "60").unwrap();
        conv.handle(&bo, "yes").unwrap();
        conv.handle(&bo, &format!("my salary is {huge}")).unwrap();
        assert_eq!(last(&conv).content, "Please share the salary as a numeric value.");
        assert_eq!(conv.state(), ConversationState::CollectSalary);

        conv.handle(&bo, "60000").unwrap();
        assert_eq!(conv.state(), ConversationState::Done);
        assert_eq!(conv.latest_outcome().map(PipelineOutcome::status), Some("APPROVED"));
    }

    #[test]
    fn negotiated_amount_respects_minimum_loan() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "9876543210").unwrap();
        conv.handle(&bo, "200000").unwrap();
        conv.handle(&bo, "make it 500 instead").unwrap();
        assert!(last(&conv).content.contains("minimum loan amount is ₹10,000"));
        assert_eq!(last(&conv).speaker, Some(AgentRole::Sales));
        assert_eq!(conv.data().loan_amount, Some(200_000.0));
        assert_eq!(conv.state(), ConversationState::CollectTenure);
    }

    #[test]
    fn tenure_out_of_range_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "9876543210").unwrap();
        conv.handle(&bo, "300000").unwrap();
        conv.handle(&bo, "10 years").unwrap();
        assert_eq!(last(&conv).content, "Please choose a tenure between 6 and 84 months.");
        conv.handle(&bo, "3 years").unwrap();
        assert_eq!(conv.data().tenure_months, Some(36));
        assert_eq!(conv.state(), ConversationState::AskSalaryOption);
    }

    #[test]
    fn restart_replaces_transcript() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "9876543210").unwrap();
        let first = conv.handle(&bo, "  Start Over ").unwrap();
        assert_eq!(first, 0);
        assert_eq!(conv.transcript().len(), 1);
        assert_eq!(conv.state(), ConversationState::CollectPhone);
        assert!(conv.data().customer_phone.is_none());
    }

    #[test]
    fn negotiation_is_ignored_before_a_phone_is_known() {
        let tmp = tempfile::tempdir().unwrap();
        let bo = backoffice(tmp.path());
        let mut conv = Conversation::new("s1", PolicyConfig::default());
        conv.handle(&bo, "can you lower the rate").unwrap();
        assert_eq!(conv.data().annual_rate_pct, 12.0);
        assert_eq!(last(&conv).speaker, Some(AgentRole::Master));
    }

    #[test]
    fn view_serializes_state_and_messages() {
        let conv = Conversation::new("s1", PolicyConfig::default());
        let json = serde_json::to_value(conv.view()).unwrap();
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["state"], "COLLECT_PHONE");
        assert_eq!(json["messages"][0]["role"], "assistant");
        assert_eq!(json["messages"][0]["speaker"], "Master Agent");
        assert_eq!(json["letter_available"], false);
    }
}
