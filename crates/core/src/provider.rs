use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Openai,
    Grok,
    Gemini,
}

pub struct ProviderConfig {
    pub api_url: &'static str,
    pub model: &'static str,
    /// Environment variables checked for a credential, in order.
    pub env_vars: &'static [&'static str],
}

impl Provider {
    pub fn config(&self) -> ProviderConfig {
        match self {
            Provider::Openai => ProviderConfig {
                api_url: "https://api.openai.com/v1/chat/completions",
                model: "gpt-4o-mini",
                env_vars: &["OPENAI_API_KEY", "CHATGPT_API_KEY"],
            },
            Provider::Grok => ProviderConfig {
                api_url: "https://api.x.ai/v1/chat/completions",
                model: "grok-4-fast",
                env_vars: &["XAI_API_KEY"],
            },
            Provider::Gemini => ProviderConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
                model: "gemini-2.5-flash",
                env_vars: &["GEMINI_API_KEY"],
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Openai => "OpenAI",
            Provider::Grok => "Grok",
            Provider::Gemini => "Gemini",
        }
    }

    pub fn primary_env_var(&self) -> &'static str {
        self.config().env_vars[0]
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(Provider::Openai),
            "grok" | "xai" => Ok(Provider::Grok),
            "gemini" => Ok(Provider::Gemini),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}
