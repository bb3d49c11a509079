//! Fakes and helpers shared by unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::auth::{IdentityProvider, ProviderError, SignInResponse};
use crate::backend::IdTokenClaims;
use crate::config::IdentityProviderConfig;
use crate::Note;

pub(crate) const WAIT: Duration = Duration::from_secs(2);

/// Identity provider that replays queued sign-in results.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    prerequisites: Mutex<Option<ProviderError>>,
    sign_ins: Mutex<VecDeque<Result<SignInResponse, ProviderError>>>,
    sign_out_error: Mutex<Option<ProviderError>>,
    pub(crate) configured: Mutex<Option<IdentityProviderConfig>>,
    pub(crate) sign_out_calls: Mutex<usize>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn queue_user(&self, sub: &str, name: &str) {
        let mut claims = IdTokenClaims::new(sub);
        claims.name = Some(name.to_string());
        claims.email = Some(format!("{sub}@example.com"));
        let token = claims.encode().unwrap();
        self.queue(Ok(SignInResponse::with_id_token(token)));
    }

    pub(crate) fn queue(&self, result: Result<SignInResponse, ProviderError>) {
        self.sign_ins.lock().unwrap().push_back(result);
    }

    pub(crate) fn set_prerequisites(&self, error: Option<ProviderError>) {
        *self.prerequisites.lock().unwrap() = error;
    }

    pub(crate) fn fail_sign_out(&self, error: Option<ProviderError>) {
        *self.sign_out_error.lock().unwrap() = error;
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn configure(&self, config: &IdentityProviderConfig) -> Result<(), ProviderError> {
        *self.configured.lock().unwrap() = Some(config.clone());
        Ok(())
    }

    async fn has_prerequisites(&self) -> Result<(), ProviderError> {
        match self.prerequisites.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn interactive_sign_in(&self) -> Result<SignInResponse, ProviderError> {
        self.sign_ins
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::Cancelled))
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        *self.sign_out_calls.lock().unwrap() += 1;
        match self.sign_out_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Listener that forwards every snapshot into a channel.
pub(crate) fn channel_listener() -> (
    impl FnMut(Vec<Note>) + Send + 'static,
    mpsc::UnboundedReceiver<Vec<Note>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |notes: Vec<Note>| {
            let _ = tx.send(notes);
        },
        rx,
    )
}

pub(crate) async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<Vec<Note>>) -> Vec<Note> {
    timeout(WAIT, rx.recv())
        .await
        .expect("delivery in time")
        .expect("subscription still delivering")
}

/// Assert nothing else is delivered within a short grace period.
pub(crate) async fn assert_no_delivery(rx: &mut mpsc::UnboundedReceiver<Vec<Note>>) {
    match timeout(Duration::from_millis(100), rx.recv()).await {
        Err(_) | Ok(None) => {}
        Ok(Some(notes)) => panic!("unexpected delivery: {notes:?}"),
    }
}

/// Poll `check` until it holds or the wait budget runs out.
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(WAIT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

pub(crate) fn texts(notes: &[Note]) -> Vec<&str> {
    notes.iter().map(|note| note.text.as_str()).collect()
}
