//! Pre/post transaction scripts (§3 "Transaction (schema)", §9): opaque to
//! the core, run by name if the `Transaction` declares one.
//!
//! `spec.md` explicitly treats the embedded user-scripting runtime as a
//! thin collaborator out of scope for the core (§1). [`ScriptHooks`] is the
//! seam: the header-log engine calls it by name and only cares about the
//! boolean accept/reject outcome; whatever interprets script bodies lives
//! outside this crate.

/// What one pre/post script run needs to see of the header it gates.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    /// Dataset the header targets.
    pub dataset: beehive_core::DatasetId,
    /// Name of the transaction the header invokes.
    pub transaction_name: &'a str,
}

/// Runs named pre/post scripts. `run_pre`/`run_post` return `true` to
/// accept, `false` to reject (§4.4 steps 2a, 3).
pub trait ScriptHooks: Send + Sync {
    /// Run the named pre-script, if any hook recognizes it.
    fn run_pre(&self, name: &str, ctx: HookContext<'_>) -> bool;
    /// Run the named post-script, if any hook recognizes it.
    fn run_post(&self, name: &str, ctx: HookContext<'_>) -> bool;
}

/// Accepts every header unconditionally. The default for tests and for
/// deployments with no scripting runtime wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl ScriptHooks for NoopHooks {
    fn run_pre(&self, _name: &str, _ctx: HookContext<'_>) -> bool {
        true
    }

    fn run_post(&self, _name: &str, _ctx: HookContext<'_>) -> bool {
        true
    }
}
