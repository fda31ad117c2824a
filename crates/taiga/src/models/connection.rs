use pipeline::{Connection, ConnectionId, PipelineError, RequestHeaders};
use serde::{Deserialize, Serialize};

/// A stored Taiga connection: where the API lives and how to reach it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaigaConnection {
    pub id: ConnectionId,
    pub name: String,
    /// Base URL of the Taiga API, e.g. `https://api.taiga.io`.
    pub endpoint: String,
    /// Bearer token. Empty for anonymous access to public projects.
    #[serde(default)]
    pub token: String,
    /// Requests per hour; the client default applies when absent.
    #[serde(default)]
    pub rate_limit_per_hour: Option<u32>,
}

impl TaigaConnection {
    /// A copy safe to log or print: the token is masked.
    pub fn sanitized(&self) -> Self {
        Self {
            token: mask(&self.token),
            ..self.clone()
        }
    }
}

/// Keeps the first and last two characters of long secrets.
fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => String::new(),
        n if n <= 8 => "*".repeat(n),
        n => {
            let head: String = chars[..2].iter().collect();
            let tail: String = chars[n - 2..].iter().collect();
            format!("{head}{}{tail}", "*".repeat(n - 4))
        }
    }
}

impl std::fmt::Debug for TaigaConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaigaConnection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("token", &mask(&self.token))
            .field("rate_limit_per_hour", &self.rate_limit_per_hour)
            .finish()
    }
}

impl Connection for TaigaConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn rate_limit_per_hour(&self) -> Option<u32> {
        self.rate_limit_per_hour
    }

    fn apply_authentication(&self, headers: &mut RequestHeaders) -> Result<(), PipelineError> {
        if !self.token.is_empty() {
            headers.set("Authorization", format!("Bearer {}", self.token));
        }
        Ok(())
    }
}
