//! Result aggregation: order restore, known-set filtering, dedupe, link building

use std::collections::HashSet;

use crate::types::{CheckResult, CheckState, ErrorEntry, ErrorLog, KnownSet, LinkTemplate, ResultEntry, ResultSet};

/// Build the confirmed result set and error log from per-identifier results.
///
/// Results may arrive in completion order; the output follows submission
/// position. Targets in `known` and repeated targets are dropped.
pub fn aggregate(results: &[CheckResult], known: &KnownSet, template: &LinkTemplate) -> (ResultSet, ErrorLog) {
    let mut ordered: Vec<&CheckResult> = results.iter().collect();
    ordered.sort_by_key(|result| result.position);

    let mut seen = HashSet::new();
    let mut confirmed = ResultSet::new();
    let mut errors = ErrorLog::new();

    for result in ordered {
        if known.contains(&result.target) || !seen.insert(&result.target) {
            continue;
        }

        if result.state == CheckState::Confirmed && result.exists {
            confirmed.push(ResultEntry {
                identifier: result.target.clone(),
                link: template.render(&result.target),
            });
        }

        if let Some(message) = &result.error {
            errors.push(ErrorEntry {
                identifier: result.identifier.clone(),
                message: message.clone(),
            });
        }
    }

    (confirmed, errors)
}
