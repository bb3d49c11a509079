use livenotes_core::{SessionState, SignInOutcome, SignOutOutcome};

use crate::app::App;
use crate::commands::common::confirm_on_stdin;
use crate::error::CliError;

pub async fn run_login(app: &App) -> Result<(), CliError> {
    if let SessionState::Authenticated(identity) = app.session.wait_until_ready().await {
        tracing::info!("Refreshing session for {}", identity.id);
    }

    match app.session.sign_in().await {
        SignInOutcome::SignedIn(identity) => {
            println!("{}", identity.greeting());
            match identity.email.as_deref() {
                Some(email) => println!("Signed in as {email}"),
                None => println!("Signed in as {}", identity.display_name_or_default()),
            }
            Ok(())
        }
        SignInOutcome::Cancelled => {
            println!("Sign-in cancelled");
            Ok(())
        }
        SignInOutcome::AlreadyInProgress => {
            println!("A sign-in is already in progress");
            Ok(())
        }
        SignInOutcome::PrerequisitesUnavailable => Err(CliError::SignInFailed(
            "run `livenotes login` from an interactive terminal".to_string(),
        )),
        SignInOutcome::Failed(reason) => Err(CliError::SignInFailed(reason)),
    }
}

pub async fn run_logout(app: &App, skip_confirm: bool) -> Result<(), CliError> {
    let SessionState::Authenticated(identity) = app.session.wait_until_ready().await else {
        println!("Not signed in");
        return Ok(());
    };

    let prompt = format!("Sign out {}?", identity.display_name_or_default());
    if !skip_confirm && !confirm_on_stdin(&prompt)? {
        println!("Cancelled");
        return Ok(());
    }

    match app.session.sign_out().await {
        SignOutOutcome::SignedOut => {
            println!("Signed out");
            Ok(())
        }
        SignOutOutcome::Failed(reason) => Err(CliError::SignOutFailed(reason)),
    }
}

pub async fn run_status(app: &App) -> Result<(), CliError> {
    match app.session.wait_until_ready().await {
        SessionState::Authenticated(identity) => {
            println!("{}", identity.greeting());
            println!(
                "Signed in as {} ({})",
                identity.display_name_or_default(),
                identity.email.as_deref().unwrap_or("no email")
            );
        }
        SessionState::Unauthenticated | SessionState::Initializing => {
            println!("Not signed in");
        }
    }
    Ok(())
}
