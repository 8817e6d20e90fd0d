//! Bearer-token authentication.
//!
//! Tokens resolve to an [`Agent`], which handlers pass explicitly into every
//! ledger call that records a creator.

use std::collections::HashMap;
use std::fmt;

use anyhow::bail;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AppError;
use crate::AppState;

/// The authenticated operator behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub name: String,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Token table, token -> agent name.
#[derive(Clone, Default)]
pub struct Credentials {
    tokens: HashMap<String, String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut agents: Vec<&String> = self.tokens.values().collect();
        agents.sort();
        f.debug_struct("Credentials").field("agents", &agents).finish()
    }
}

impl Credentials {
    /// Parse `agent=token` pairs separated by commas.
    pub fn parse(pairs: &str) -> anyhow::Result<Self> {
        let mut tokens = HashMap::new();

        for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((agent, token)) = pair.split_once('=') else {
                bail!("expected agent=token, got '{}'", pair);
            };
            let (agent, token) = (agent.trim(), token.trim());
            if agent.is_empty() || token.is_empty() {
                bail!("agent and token must both be non-empty in '{}'", pair);
            }
            if tokens.insert(token.to_string(), agent.to_string()).is_some() {
                bail!("token for '{}' is already assigned to another agent", agent);
            }
        }

        Ok(Self { tokens })
    }

    pub fn with_token(mut self, agent: &str, token: &str) -> Self {
        self.tokens.insert(token.to_string(), agent.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn authenticate(&self, token: &str) -> Option<Agent> {
        self.tokens.get(token).map(|name| Agent::new(name.as_str()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Agent {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized("missing bearer token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized("malformed authorization header"))?;

        state.credentials.authenticate(token).ok_or_else(|| {
            tracing::warn!("Rejected request with unknown bearer token");
            AppError::Unauthorized("unknown bearer token")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let creds = Credentials::parse("asha=tok-1, ravi = tok-2 ,").unwrap();

        assert_eq!(creds.authenticate("tok-1"), Some(Agent::new("asha")));
        assert_eq!(creds.authenticate("tok-2"), Some(Agent::new("ravi")));
        assert_eq!(creds.authenticate("tok-3"), None);
    }

    #[test]
    fn test_parse_rejects_malformed_pairs() {
        assert!(Credentials::parse("asha").is_err());
        assert!(Credentials::parse("=tok").is_err());
        assert!(Credentials::parse("asha=").is_err());
        assert!(Credentials::parse("asha=tok,ravi=tok").is_err());
    }

    #[test]
    fn test_debug_hides_tokens() {
        let creds = Credentials::parse("asha=super-secret").unwrap();
        let printed = format!("{:?}", creds);

        assert!(printed.contains("asha"));
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn test_empty_input_yields_no_tokens() {
        assert!(Credentials::parse("").unwrap().is_empty());
    }
}
