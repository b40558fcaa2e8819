//! Non-fatal expectation helpers. Each one emits a report and returns
//! whether the expectation held.

use crate::report::{Report, ReportSink};

pub fn expect_true(sink: &dyn ReportSink, test: &str, value: bool) -> bool {
    let detail = if value {
        format!("{test} is true, as expected")
    } else {
        format!("{test} is false instead of true")
    };
    sink.emit(&Report::Expectation {
        detail,
        success: value,
    });
    value
}

pub fn expect_false(sink: &dyn ReportSink, test: &str, value: bool) -> bool {
    let detail = if value {
        format!("{test} is true instead of false")
    } else {
        format!("{test} is false, as expected")
    };
    sink.emit(&Report::Expectation {
        detail,
        success: !value,
    });
    !value
}

pub fn expect_strings_equal(sink: &dyn ReportSink, test: &str, expected: &str, actual: &str) -> bool {
    let success = expected == actual;
    let detail = if success {
        format!("{test} is '{actual}' as expected")
    } else {
        format!("{test} is '{actual}' instead of '{expected}'")
    };
    sink.emit(&Report::Expectation { detail, success });
    success
}
