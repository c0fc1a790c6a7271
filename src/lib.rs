//! Loan concierge — an agentic personal-loan desk over chat.
//!
//! A master agent walks each customer through KYC, underwriting and, when
//! approved, a sanction letter.  The decisions are deterministic (mock CRM,
//! credit bureau and offer mart over a synthetic dataset, plus a fixed rule
//! table); an optional LLM only rewrites each agent's reply in its own voice.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod money;
pub mod sanction;
pub mod subsystems;
pub mod underwriting;
