//! Notification counts for each kind of session change.

use super::{Harness, Step};
use crate::counter::EventCounter;
use crate::expect::expect_true;
use crate::pump::EventPump;
use crate::service::EventKind;
use authprobe_common::AuthError;
use std::sync::Arc;

pub async fn listener_counts<P: EventPump>(h: &mut Harness<P>) -> Step {
    h.note("Listener counts");
    let auth = Arc::new(EventCounter::new(EventKind::AuthState, h.sink()));
    let token = Arc::new(EventCounter::new(EventKind::IdToken, h.sink()));

    let auth_id = h.service().add_listener(EventKind::AuthState, auth.clone());
    let token_id = h.service().add_listener(EventKind::IdToken, token.clone());
    auth.verify_exact("registration", 0);
    token.verify_exact("registration", 0);

    // Nothing to announce while signed out.
    h.sign_out().await?;
    auth.verify_exact("SignOut() while signed out", 0);
    token.verify_exact("SignOut() while signed out", 0);

    // One "about to change" and one "changed", possibly doubled by a token
    // refresh racing the sign-in.
    let op = h.service().sign_in_anonymously();
    h.wait_for_session(&op, "SignInAnonymously()", AuthError::None)
        .await?;
    auth.verify("SignInAnonymously()", 2, 4);
    token.verify("SignInAnonymously()", 2, 5);

    let op = h.service().refresh_token(true);
    h.wait(&op, "GetToken(true)", AuthError::None).await?;
    auth.verify_exact("GetToken(true)", 0);
    token.verify_exact("GetToken(true)", 1);

    h.sign_out().await?;
    auth.verify_exact("SignOut()", 1);
    token.verify_exact("SignOut()", 1);

    let service = h.service();
    let removed = service.remove_listener(auth_id) && service.remove_listener(token_id);
    expect_true(h.sink().as_ref(), "listeners removed", removed);
    Ok(())
}
