//! Global `before` / `after` hooks.

use std::fmt;

use tracing::debug;

use crate::bridge::RedirectIntent;
use crate::error::Error;
use crate::event::Event;
use crate::exchange::Exchange;
use crate::executor::{execute, Verdict};
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::outcome::Outcome;

/// When a global hook runs relative to path dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After  => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most one hook per phase.
#[derive(Clone, Default)]
pub struct GlobalHooks {
    before: Option<BoxedMiddleware>,
    after: Option<BoxedMiddleware>,
}

impl GlobalHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `hook` for `phase`, replacing any previous one.
    pub fn set(&mut self, phase: Phase, hook: impl Middleware) {
        let slot = match phase {
            Phase::Before => &mut self.before,
            Phase::After  => &mut self.after,
        };
        *slot = Some(hook.into_boxed_middleware());
    }

    pub fn get(&self, phase: Phase) -> Option<&BoxedMiddleware> {
        match phase {
            Phase::Before => self.before.as_ref(),
            Phase::After  => self.after.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }
}

impl fmt::Debug for GlobalHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalHooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// What a hook produced.
#[derive(Debug)]
pub struct HookRun {
    pub outcome: Outcome,
    pub verdict: Verdict,
    /// Set when the hook redirected; the dispatcher must bridge it.
    pub intent: Option<RedirectIntent>,
}

impl HookRun {
    /// A pass-through hook result lets the pipeline carry on. Anything else
    /// (redirect, error, or a concrete response) ends the dispatch.
    pub fn ends_dispatch(&self) -> bool {
        !self.outcome.is_pass_through() || self.verdict.is_terminal()
    }
}

/// Runs the hook registered for `phase`, if any, with no prior outcome.
///
/// Returns `Ok(None)` when no hook is installed. A redirecting hook comes back
/// with its [`RedirectIntent`] captured so the dispatcher can route it
/// through [`bridge`](crate::bridge::bridge).
pub async fn run_global(
    phase: Phase,
    exchange: &Exchange,
    event: &Event,
    hooks: &GlobalHooks,
) -> Result<Option<HookRun>, Error> {
    let Some(hook) = hooks.get(phase) else {
        return Ok(None);
    };

    debug!(%phase, "running global hook");
    let done = execute(exchange.clone(), hook, None, event).await?;

    let intent = match done.verdict {
        Verdict::Redirect => RedirectIntent::from_outcome(&done.outcome),
        _ => None,
    };
    if let Some(intent) = &intent {
        debug!(%phase, location = %intent.location, "global hook redirected");
    }

    Ok(Some(HookRun { outcome: done.outcome, verdict: done.verdict, intent }))
}
