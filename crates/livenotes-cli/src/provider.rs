//! Identity provider for interactive terminal sessions.
//!
//! Prompts for an email address and an optional display name and hands the
//! backend a local id token for them. Only usable when stdin is a terminal.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use livenotes_core::auth::{IdentityProvider, ProviderError, SignInResponse};
use livenotes_core::backend::IdTokenClaims;
use livenotes_core::config::IdentityProviderConfig;
use livenotes_core::util::normalize_text_option;

#[derive(Debug, Default)]
pub struct TerminalIdentityProvider {
    prompting: AtomicBool,
}

impl TerminalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for TerminalIdentityProvider {
    async fn configure(&self, config: &IdentityProviderConfig) -> Result<(), ProviderError> {
        tracing::debug!(
            "Terminal sign-in configured (client: {}, offline access: {})",
            config.web_client_id.as_deref().unwrap_or("none"),
            config.offline_access
        );
        Ok(())
    }

    async fn has_prerequisites(&self) -> Result<(), ProviderError> {
        if io::stdin().is_terminal() {
            Ok(())
        } else {
            Err(ProviderError::PrerequisitesUnavailable)
        }
    }

    async fn interactive_sign_in(&self) -> Result<SignInResponse, ProviderError> {
        if self.prompting.swap(true, Ordering::AcqRel) {
            return Err(ProviderError::InProgress);
        }

        let prompted = tokio::task::spawn_blocking(|| {
            let stdin = io::stdin();
            let stderr = io::stderr();
            prompt_claims(&mut stdin.lock(), &mut stderr.lock())
        })
        .await;
        self.prompting.store(false, Ordering::Release);

        let claims = prompted.map_err(|error| ProviderError::Other(error.to_string()))??;
        let token = claims
            .encode()
            .map_err(|error| ProviderError::Other(error.to_string()))?;
        Ok(SignInResponse::with_id_token(token))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        tracing::debug!("Terminal provider holds no session state");
        Ok(())
    }
}

/// Ask for the account details. Empty email or end of input cancels.
pub fn prompt_claims<R, W>(input: &mut R, output: &mut W) -> Result<IdTokenClaims, ProviderError>
where
    R: BufRead,
    W: Write,
{
    let Some(email) = prompt_line(input, output, "Email: ")? else {
        return Err(ProviderError::Cancelled);
    };
    if !looks_like_email(&email) {
        return Err(ProviderError::Other(format!(
            "'{email}' is not an email address"
        )));
    }
    let name = prompt_line(input, output, "Display name (optional): ")?;

    let mut claims = IdTokenClaims::new(email.to_lowercase());
    claims.email = Some(email);
    claims.name = name;
    Ok(claims)
}

fn prompt_line<R, W>(input: &mut R, output: &mut W, label: &str) -> Result<Option<String>, ProviderError>
where
    R: BufRead,
    W: Write,
{
    write!(output, "{label}")
        .and_then(|()| output.flush())
        .map_err(|error| ProviderError::Other(error.to_string()))?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|error| ProviderError::Other(error.to_string()))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(normalize_text_option(Some(line)))
}

fn looks_like_email(value: &str) -> bool {
    value
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !value.contains(char::is_whitespace)
        })
}
