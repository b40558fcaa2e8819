//! Account and session flows.
//!
//! Each call is checked for the error code it settles with. Failed calls
//! must leave the current session alone.

use super::profile::check_profile;
use super::{Harness, ScopedAccount, Step, unique_email};
use crate::expect::{expect_false, expect_true};
use crate::loopback::PASSWORD_PROVIDER;
use crate::pump::EventPump;
use authprobe_common::AuthError;

const UPDATED_PASSWORD: &str = "testpasswordupdated";

pub async fn account_flows<P: EventPump>(h: &mut Harness<P>) -> Step {
    h.note("Account flows");

    let op = h.service().sign_in_anonymously();
    h.wait_for_session(&op, "SignInAnonymously()", AuthError::None)
        .await?;
    let last = h.service().sign_in_anonymously_last_result();
    expect_true(
        h.sink().as_ref(),
        "SignInAnonymouslyLastResult() matches SignInAnonymously()",
        last.is_same(&op),
    );
    h.sign_out().await?;

    let account = ScopedAccount::create(h).await?;

    let op = h.service().fetch_providers(account.email());
    h.wait(&op, "FetchProvidersForEmail()", AuthError::None)
        .await?;
    expect_true(
        h.sink().as_ref(),
        "FetchProvidersForEmailLastResult() matches FetchProvidersForEmail()",
        h.service().fetch_providers_last_result().is_same(&op),
    );
    let providers = op.result().unwrap_or_default();
    expect_true(
        h.sink().as_ref(),
        "password provider listed",
        providers.iter().any(|p| p == PASSWORD_PROVIDER),
    );

    h.sign_out().await?;
    account.sign_in(h).await?;
    let session = h.service().current_session();

    let op = h
        .service()
        .sign_in_with_password(&unique_email(), account.password());
    h.wait_for_session(&op, "SignInWithEmailAndPassword() bad email", AuthError::UserNotFound)
        .await?;

    let op = h
        .service()
        .sign_in_with_password(account.email(), "wrong-password");
    h.wait_for_session(
        &op,
        "SignInWithEmailAndPassword() bad password",
        AuthError::WrongPassword,
    )
    .await?;
    expect_true(
        h.sink().as_ref(),
        "SignInWithEmailAndPasswordLastResult() matches SignInWithEmailAndPassword()",
        h.service().sign_in_with_password_last_result().is_same(&op),
    );
    expect_true(
        h.sink().as_ref(),
        "failed sign-ins keep the session",
        h.service().current_session() == session,
    );

    let op = h
        .service()
        .create_account(account.email(), account.password());
    h.wait_for_session(
        &op,
        "CreateUserWithEmailAndPassword() existing email",
        AuthError::EmailAlreadyInUse,
    )
    .await?;
    expect_true(
        h.sink().as_ref(),
        "CreateUserWithEmailAndPasswordLastResult() matches CreateUserWithEmailAndPassword()",
        h.service().create_account_last_result().is_same(&op),
    );

    let op = h.service().send_password_reset(account.email());
    h.wait(&op, "SendPasswordResetEmail()", AuthError::None)
        .await?;
    let op = h.service().send_password_reset(&unique_email());
    h.wait(&op, "SendPasswordResetEmail() bad email", AuthError::UserNotFound)
        .await?;

    account.delete(h).await
}

pub async fn session_flows<P: EventPump>(h: &mut Harness<P>) -> Step {
    h.note("Session flows");

    // An account whose email the anonymous session cannot take over.
    let taken = ScopedAccount::create(h).await?;
    h.sign_out().await?;

    let op = h.service().sign_in_anonymously();
    h.wait_for_session(&op, "SignInAnonymously()", AuthError::None)
        .await?;
    let session = h.service().current_session();
    check_profile(h, "Anonymous user", "", true);

    let email = unique_email();
    let password = h.password().to_string();
    let op = h.service().link_password(&email, &password);
    h.wait_for_session(&op, "LinkWithCredential()", AuthError::None)
        .await?;
    let op = h.service().link_password(&email, &password);
    h.wait_for_session(&op, "LinkWithCredential() again", AuthError::None)
        .await?;

    let op = h.service().link_password(taken.email(), taken.password());
    h.wait_for_session(
        &op,
        "LinkWithCredential() email in use",
        AuthError::EmailAlreadyInUse,
    )
    .await?;
    expect_true(
        h.sink().as_ref(),
        "failed link keeps the session",
        h.service().current_session() == session,
    );

    let op = h.service().refresh_token(false);
    h.wait(&op, "GetToken(false)", AuthError::None).await?;
    let cached = op.result();
    let op = h.service().refresh_token(true);
    h.wait(&op, "GetToken(true)", AuthError::None).await?;
    let refreshed = op.result();
    expect_true(h.sink().as_ref(), "GetToken() produced a token", cached.is_some());
    expect_false(
        h.sink().as_ref(),
        "forced refresh returned the cached token",
        cached == refreshed,
    );

    let op = h.service().unlink(PASSWORD_PROVIDER);
    h.wait_for_session(&op, "Unlink()", AuthError::None).await?;
    expect_true(
        h.sink().as_ref(),
        "Unlink() keeps an anonymous session",
        h.service().current_session() == session
            && h.service().current_profile().is_some_and(|p| p.is_anonymous),
    );

    // The unlinked anonymous account goes quietly; a fresh one is deleted on record.
    let op = h.service().delete_current_account();
    h.wait_quietly(&op, "Delete() unlinked account").await?;

    email_user(h).await?;

    ScopedAccount::create(h).await?;
    let op = h.service().delete_current_account();
    h.wait(&op, "Delete()", AuthError::None).await?;
    expect_false(
        h.sink().as_ref(),
        "session active after Delete()",
        h.service().current_session().is_some(),
    );

    let op = h.service().delete_current_account();
    h.wait(&op, "Delete() while signed out", AuthError::NoSignedInUser)
        .await?;

    taken.delete(h).await
}

/// Profile, reload, unlink and credential updates of a password user.
async fn email_user<P: EventPump>(h: &mut Harness<P>) -> Step {
    let mut user = ScopedAccount::create(h).await?;
    user.sign_in(h).await?;
    let email = user.email().to_string();
    check_profile(h, "Email user", &email, false);

    let op = h.service().reload();
    h.wait(&op, "Reload()", AuthError::None).await?;

    let provider_id = h.provider_id().to_string();
    let op = h.service().unlink(&provider_id);
    h.wait_for_session(&op, "Unlink() provider not linked", AuthError::NoSuchProvider)
        .await?;
    if h.service().current_session().is_none() {
        user.sign_in(h).await?;
    }

    user.update_email(h, unique_email()).await?;
    user.update_password(h, UPDATED_PASSWORD.to_string()).await?;

    let email = user.email().to_string();
    let password = user.password().to_string();
    let op = h.service().reauthenticate(&email, &password);
    h.wait(&op, "Reauthenticate()", AuthError::None).await?;

    let op = h.service().send_email_verification();
    h.wait(&op, "SendEmailVerification()", AuthError::None)
        .await?;

    user.delete(h).await
}
