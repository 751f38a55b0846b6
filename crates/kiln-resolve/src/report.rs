//! Human-readable diagnostics for failed resolutions and soft warnings.

use crate::materialize::Warning;
use crate::metadata::Dependency;
use crate::solver::{Explanation, Fix, ModRef};

/// Versions as they appear in a report; aliases name their real identifier
fn describe_present(target: &str, present: &[ModRef]) -> String {
    present
        .iter()
        .map(|m| {
            if m.identifier == target {
                m.version.to_string()
            } else {
                format!("{} (provided by '{}')", m.version, m.identifier)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One sentence about a dependency of `source` and what is actually present
pub fn describe_dependency(source: &ModRef, dependency: &Dependency, present: &[ModRef]) -> String {
    let head = format!(
        "Mod {} {} {} of '{}'",
        source,
        dependency.kind.description(),
        dependency.predicate.describe(),
        dependency.target
    );

    if dependency.kind.is_positive() {
        if present.is_empty() {
            format!("{}, which is missing!", head)
        } else {
            format!(
                "{}, but only the wrong version is present: {}!",
                head,
                describe_present(&dependency.target, present)
            )
        }
    } else {
        format!(
            "{}, but {} is present!",
            head,
            describe_present(&dependency.target, present)
        )
    }
}

fn describe_fix(fix: &Fix) -> Vec<String> {
    let mut lines = vec!["A potential solution has been determined:".to_string()];

    for addition in &fix.additions {
        lines.push(format!(
            "  - Install '{}', version {}.",
            addition.id, addition.version
        ));
    }
    for replacement in &fix.replacements {
        lines.push(format!(
            "  - Replace {} with version {}.",
            replacement.old, replacement.new.version
        ));
    }
    for removal in &fix.removals {
        lines.push(format!("  - Remove mod {}.", removal));
    }

    lines
}

/// Multi-line report for an unresolvable mod set
pub fn describe_failure(explanations: &[Explanation], fix: Option<&Fix>) -> String {
    let mut lines = vec!["Unable to resolve the mod set:".to_string()];

    if explanations.is_empty() {
        lines.push("  - The mods contradict each other, but no single dependency is to blame.".to_string());
    }
    for explanation in explanations {
        lines.push(format!(
            "  - {}",
            describe_dependency(&explanation.source, &explanation.dependency, &explanation.present)
        ));
    }

    match fix {
        Some(fix) if !fix.is_empty() => lines.extend(describe_fix(fix)),
        _ => lines.push("No potential solution could be determined.".to_string()),
    }

    lines.join("\n")
}

/// One line per warning, empty if there are none
pub fn describe_warnings(warnings: &[Warning]) -> String {
    warnings
        .iter()
        .map(|w| format!("  - {}", w))
        .collect::<Vec<_>>()
        .join("\n")
}
