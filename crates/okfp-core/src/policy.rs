//! Auto-update policy.
//!
//! Three independent flags decide whether wire and trigger operations flush
//! or refresh device state around themselves. A per-call override wins over
//! the stored flag for that call only.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoUpdateCategory {
    /// Flush pending wire-ins after each `set_wire_in`.
    WireIn,
    /// Refresh wire-outs before each `wire_out`.
    WireOut,
    /// Refresh trigger-outs before each `is_triggered`.
    TriggerOut,
}

impl fmt::Display for AutoUpdateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoUpdateCategory::WireIn => write!(f, "wire-in"),
            AutoUpdateCategory::WireOut => write!(f, "wire-out"),
            AutoUpdateCategory::TriggerOut => write!(f, "trigger-out"),
        }
    }
}

/// Effective auto-update for one call.
pub fn resolve(stored: bool, override_flag: Option<bool>) -> bool {
    override_flag.unwrap_or(stored)
}

/// Stored auto-update flags of one device handle. All start off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoUpdatePolicy {
    wire_in: bool,
    wire_out: bool,
    trigger_out: bool,
}

impl AutoUpdatePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: AutoUpdateCategory) -> bool {
        match category {
            AutoUpdateCategory::WireIn => self.wire_in,
            AutoUpdateCategory::WireOut => self.wire_out,
            AutoUpdateCategory::TriggerOut => self.trigger_out,
        }
    }

    pub fn set(&mut self, category: AutoUpdateCategory, enabled: bool) {
        let flag = match category {
            AutoUpdateCategory::WireIn => &mut self.wire_in,
            AutoUpdateCategory::WireOut => &mut self.wire_out,
            AutoUpdateCategory::TriggerOut => &mut self.trigger_out,
        };
        *flag = enabled;
    }

    pub fn effective(&self, category: AutoUpdateCategory, override_flag: Option<bool>) -> bool {
        resolve(self.get(category), override_flag)
    }
}
