//! Test helper utilities for authprobe.
//!
//! Reusable helpers for unit and integration tests: a scripted event pump
//! that never sleeps, and a polling helper for conditions that settle on
//! other tasks. These APIs are intended for test-only code paths.

use crate::pump::EventPump;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

pub use crate::utils::logging::init_test_logging;

type TickHook = Box<dyn FnMut(u32) + Send>;

/// Event pump driven entirely by the test.
///
/// Each tick records its hint, runs the optional hook with the 1-based tick
/// number, yields once to the runtime and then answers with the next
/// scripted shutdown flag (`false` once the script runs out).
#[derive(Default)]
pub struct ScriptedPump {
    answers: VecDeque<bool>,
    hook: Option<TickHook>,
    ticks: u32,
    hints: Vec<Duration>,
}

impl ScriptedPump {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripted shutdown answers, consumed one per tick.
    pub fn with_answers(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Run `hook` on every tick, before the tick answers.
    pub fn on_tick(mut self, hook: impl FnMut(u32) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn hints(&self) -> &[Duration] {
        &self.hints
    }
}

#[async_trait]
impl EventPump for ScriptedPump {
    async fn tick(&mut self, hint: Duration) -> bool {
        self.ticks += 1;
        self.hints.push(hint);
        if let Some(hook) = self.hook.as_mut() {
            hook(self.ticks);
        }
        tokio::task::yield_now().await;
        self.answers.pop_front().unwrap_or(false)
    }
}

impl std::fmt::Debug for ScriptedPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedPump")
            .field("answers", &self.answers)
            .field("ticks", &self.ticks)
            .field("hints", &self.hints)
            .finish()
    }
}

/// Wait for a condition to become true, polling every `interval`.
///
/// Returns `true` if the condition was met before `timeout`.
pub async fn wait_for_condition<F>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    condition()
}
