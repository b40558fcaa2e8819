//! Checks on the signed-in user's profile.

use super::Harness;
use crate::expect::{expect_false, expect_strings_equal, expect_true};
use crate::pump::EventPump;
use crate::report::Report;

/// Report every profile field of the signed-in user.
///
/// `email` is the expected address, empty for an anonymous user. Users here
/// never set a display name or photo and never verify their email. Returns
/// false if any check failed or nobody is signed in.
pub fn check_profile<P: EventPump>(h: &Harness<P>, label: &str, email: &str, anonymous: bool) -> bool {
    let sink = h.sink();
    let Some(profile) = h.service().current_profile() else {
        sink.emit(&Report::Expectation {
            detail: format!("{label} has no profile: nobody is signed in"),
            success: false,
        });
        return false;
    };
    h.note(format!("{label} uid is {}", profile.session));

    let sink = sink.as_ref();
    let checks = [
        expect_strings_equal(
            sink,
            &format!("{label} email"),
            email,
            profile.email.as_deref().unwrap_or_default(),
        ),
        expect_strings_equal(
            sink,
            &format!("{label} display name"),
            "",
            profile.display_name.as_deref().unwrap_or_default(),
        ),
        expect_strings_equal(
            sink,
            &format!("{label} photo URL"),
            "",
            profile.photo_url.as_deref().unwrap_or_default(),
        ),
        expect_strings_equal(
            sink,
            &format!("{label} provider ID"),
            h.provider_id(),
            &profile.provider_id,
        ),
        if anonymous {
            expect_true(sink, &format!("{label} is anonymous"), profile.is_anonymous)
        } else {
            expect_false(sink, &format!("{label} is anonymous"), profile.is_anonymous)
        },
        expect_false(
            sink,
            &format!("{label} email verified"),
            profile.is_email_verified,
        ),
        expect_true(
            sink,
            &format!("{label} creation time known"),
            profile.created_at.is_some(),
        ),
        expect_true(
            sink,
            &format!("{label} last sign-in time known"),
            profile.last_sign_in_at.is_some(),
        ),
    ];
    checks.iter().all(|held| *held)
}
