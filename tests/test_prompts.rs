//! Tests for agent prompt templates under config/prompts

use std::fs;

const ROLE_FILES: [&str; 5] = ["master.md", "sales.md", "verification.md", "underwriting.md", "sanction.md"];

#[test]
fn test_persona_prompt_file_exists() {
    let text = fs::read_to_string("config/prompts/persona.md").expect("persona.md prompt file missing");
    assert!(text.contains("NBFC"), "persona.md should introduce the lender");
}

#[test]
fn test_role_prompt_template_vars() {
    for file in ROLE_FILES {
        let text = fs::read_to_string(format!("config/prompts/{file}"))
            .unwrap_or_else(|_| panic!("{file} prompt file missing"));
        for var in ["{{role}}", "{{goal}}", "{{backstory}}"] {
            assert!(text.contains(var), "{file} should contain {var} variable");
        }
    }
}

#[test]
fn test_tools_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/tools.md").unwrap();
    assert!(text.contains("{{tools}}"), "tools.md should contain {{tools}} variable");
}

#[test]
fn test_voice_prompt_template_vars() {
    let text = fs::read_to_string("config/prompts/voice.txt").unwrap();
    assert!(text.contains("{{role}}"), "voice.txt should contain {{role}} variable");
    assert!(text.contains("restart"), "voice.txt should protect the restart keyword");
}
