//! Per-evaluation state
//!
//! An [`ActionContext`] is created for one top-level evaluation and handed to
//! every builtin. It carries the security context, locale, counters, the
//! temporary key/value store, the output buffers and the collected error
//! tokens. Contexts are not shared between concurrent evaluations.

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;

use crate::core::{EntityRef, Value};

/// Number of counters addressable by `get_counter` / `inc_counter`
pub const COUNTER_LEVELS: usize = 10;

/// Who is evaluating, and with which privileges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    principal: Option<EntityRef>,
    privileged: bool,
    do_transaction_notifications: bool,
}

impl SecurityContext {
    /// Context without a principal
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            privileged: false,
            do_transaction_notifications: true,
        }
    }

    /// Context acting for the given user
    pub fn for_principal(principal: EntityRef) -> Self {
        Self {
            principal: Some(principal),
            ..Self::anonymous()
        }
    }

    /// Context that bypasses permission checks
    pub fn super_user() -> Self {
        Self {
            privileged: true,
            ..Self::anonymous()
        }
    }

    pub fn principal(&self) -> Option<&EntityRef> {
        self.principal.as_ref()
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    pub fn set_privileged(&mut self, privileged: bool) {
        self.privileged = privileged;
    }

    pub fn do_transaction_notifications(&self) -> bool {
        self.do_transaction_notifications
    }

    pub fn set_do_transaction_notifications(&mut self, enabled: bool) {
        self.do_transaction_notifications = enabled;
    }
}

impl Default for SecurityContext {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Validation error collected by the `error(...)` builtin
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorToken {
    pub status: u16,
    pub type_name: String,
    pub property: String,
    pub token: String,
    pub detail: Option<Value>,
}

/// Evaluation context handed to every builtin
#[derive(Debug, Clone)]
pub struct ActionContext {
    security: SecurityContext,
    locale: String,
    counters: [i64; COUNTER_LEVELS],
    store: IndexMap<String, Value>,
    output: String,
    binary_output: Vec<u8>,
    script: bool,
    data: Option<Value>,
    errors: Vec<ErrorToken>,
}

impl ActionContext {
    /// Anonymous template-style context with locale `en_US`
    pub fn new() -> Self {
        Self {
            security: SecurityContext::anonymous(),
            locale: "en_US".to_string(),
            counters: [0; COUNTER_LEVELS],
            store: IndexMap::new(),
            output: String::new(),
            binary_output: Vec::new(),
            script: false,
            data: None,
            errors: Vec::new(),
        }
    }

    /// Create a builder for constructing contexts
    pub fn builder() -> ActionContextBuilder {
        ActionContextBuilder::default()
    }

    pub fn security(&self) -> &SecurityContext {
        &self.security
    }

    pub fn security_mut(&mut self) -> &mut SecurityContext {
        &mut self.security
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    /// Whether the evaluation was invoked script-style (`${{...}}`)
    pub fn is_script(&self) -> bool {
        self.script
    }

    pub fn set_script(&mut self, script: bool) {
        self.script = script;
    }

    // ------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------

    /// Value of the counter at `level`; unknown levels read as 0
    pub fn counter(&self, level: i64) -> i64 {
        slot(level).map_or(0, |i| self.counters[i])
    }

    pub fn increment_counter(&mut self, level: i64) {
        if let Some(i) = slot(level) {
            self.counters[i] += 1;
        }
    }

    pub fn reset_counter(&mut self, level: i64) {
        if let Some(i) = slot(level) {
            self.counters[i] = 0;
        }
    }

    // ------------------------------------------------------------------
    // Temporary store
    // ------------------------------------------------------------------

    pub fn store_value(&mut self, key: impl Into<String>, value: Value) {
        self.store.insert(key.into(), value);
    }

    pub fn retrieve(&self, key: &str) -> Option<&Value> {
        self.store.get(key)
    }

    pub fn store(&self) -> &IndexMap<String, Value> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Append to the `print` buffer
    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Take the printed output, leaving the buffer empty
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn binary_output(&self) -> &[u8] {
        &self.binary_output
    }

    pub fn binary_output_mut(&mut self) -> &mut Vec<u8> {
        &mut self.binary_output
    }

    // ------------------------------------------------------------------
    // `data` binding and errors
    // ------------------------------------------------------------------

    /// Current element of the enclosing `each` / `filter`
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Replace the `data` binding, returning the previous one
    pub fn bind_data(&mut self, data: Option<Value>) -> Option<Value> {
        std::mem::replace(&mut self.data, data)
    }

    pub fn add_error(&mut self, error: ErrorToken) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ErrorToken] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Run with super-user privileges until the returned guard is dropped
    pub fn elevate(&mut self) -> PrivilegeGuard<'_> {
        let previous = std::mem::replace(&mut self.security, SecurityContext::super_user());
        PrivilegeGuard {
            ctx: self,
            previous: Some(previous),
        }
    }
}

/// Restores the previous security context on drop
///
/// Derefs to the elevated [`ActionContext`].
pub struct PrivilegeGuard<'a> {
    ctx: &'a mut ActionContext,
    previous: Option<SecurityContext>,
}

impl Deref for PrivilegeGuard<'_> {
    type Target = ActionContext;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for PrivilegeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for PrivilegeGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.ctx.security = previous;
        }
    }
}

impl Default for ActionContext {
    fn default() -> Self {
        Self::new()
    }
}

fn slot(level: i64) -> Option<usize> {
    usize::try_from(level).ok().filter(|i| *i < COUNTER_LEVELS)
}

/// Builder for creating action contexts
#[derive(Debug, Clone, Default)]
pub struct ActionContextBuilder {
    principal: Option<EntityRef>,
    privileged: bool,
    locale: Option<String>,
    script: bool,
    store: IndexMap<String, Value>,
}

impl ActionContextBuilder {
    /// Evaluate on behalf of this principal
    #[must_use]
    pub fn principal(mut self, principal: EntityRef) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Evaluate with super-user privileges
    #[must_use]
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Script-style invocation, selects the script usage texts
    #[must_use]
    pub fn script(mut self, script: bool) -> Self {
        self.script = script;
        self
    }

    /// Pre-populate the temporary store
    #[must_use]
    pub fn store(mut self, key: impl Into<String>, value: Value) -> Self {
        self.store.insert(key.into(), value);
        self
    }

    pub fn build(self) -> ActionContext {
        let mut ctx = ActionContext::new();
        ctx.security = match self.principal {
            Some(principal) => SecurityContext::for_principal(principal),
            None => SecurityContext::anonymous(),
        };
        ctx.security.set_privileged(self.privileged);
        if let Some(locale) = self.locale {
            ctx.locale = locale;
        }
        ctx.script = self.script;
        ctx.store = self.store;
        ctx
    }
}
