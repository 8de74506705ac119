//! Built-in inspections.  Each module exports one `inspect_*` entry point
//! registered in [`crate::inspect::INSPECTIONS`].

// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::results::{ResultParams, Results, Severity};

pub(crate) mod added;
pub(crate) mod moved;
pub(crate) mod ownership;
pub(crate) mod permissions;
pub(crate) mod removed;

/// Record an OK result for `header` if the inspection passed, and hand
/// back the outcome.
pub(crate) fn finish(results: &mut Results, header: &str, ok: bool) -> bool {
    if ok {
        results.add(ResultParams::new(header).severity(Severity::Ok));
    }
    ok
}
