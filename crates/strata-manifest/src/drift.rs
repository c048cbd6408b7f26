//! Bootstrap template drift detection
//!
//! After the Bootstrap stage runs, the canonical generator has written a
//! fresh template candidate. Comparing it with the template the stage was
//! generated from tells the orchestrator whether the bootstrap logic itself
//! changed and the stage must be re-run.

/// Result of comparing two template generations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    Unchanged,
    Changed,
}

impl Drift {
    pub fn is_changed(self) -> bool {
        self == Drift::Changed
    }
}

/// Compare a newly generated template with the committed one
pub fn detect(new_template: &str, committed_template: &str) -> Drift {
    if new_template == committed_template {
        Drift::Unchanged
    } else {
        Drift::Changed
    }
}

/// 1-based line number of the first difference, for diagnostics
pub fn first_difference(new_template: &str, committed_template: &str) -> Option<usize> {
    if new_template == committed_template {
        return None;
    }
    let mut new_lines = new_template.split_inclusive('\n');
    let mut old_lines = committed_template.split_inclusive('\n');
    let mut line = 1;
    loop {
        match (new_lines.next(), old_lines.next()) {
            (Some(a), Some(b)) if a == b => line += 1,
            _ => return Some(line),
        }
    }
}
