use crate::diff::ChangeKind;
use crate::monitor::CycleReport;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Show old and new digests under each changed path.
    pub show_diff: bool,
    /// List unchanged paths as well.
    pub show_unchanged: bool,
}

pub fn print_cycle(cycle: &CycleReport, options: ReportOptions) {
    for line in format_cycle(cycle, options) {
        println!("{}", line);
    }
}

fn format_cycle(cycle: &CycleReport, options: ReportOptions) -> Vec<String> {
    let report = &cycle.report;
    let mut lines = Vec::new();

    if !report.has_changes() && !options.show_unchanged {
        return lines;
    }

    let timestamp = cycle.started_at.format("%Y-%m-%d %H:%M:%S");
    if report.has_changes() {
        lines.push(format!("[{}] Changes detected:", timestamp));
    } else {
        lines.push(format!("[{}] No changes:", timestamp));
    }

    for (kind, path) in report.entries() {
        if kind == ChangeKind::Unchanged && !options.show_unchanged {
            continue;
        }

        lines.push(format!("{:<2} {}", kind.code(), path));

        if options.show_diff {
            lines.extend(format_digest_lines(
                kind,
                path,
                cycle.previous.as_deref(),
                &cycle.current,
            ));
        }
    }

    if !cycle.skipped.is_empty() {
        if options.show_unchanged {
            for skipped in &cycle.skipped {
                lines.push(format!("!  {} ({})", skipped.path.display(), skipped.reason));
            }
        } else {
            lines.push(format!(
                "Skipped {} entries in cycle {} (use --all to list them)",
                cycle.skipped.len(),
                cycle.cycle
            ));
        }
    }

    if report.has_changes() {
        lines.push(format!("Fingerprint: {}", report.fingerprint()));
    }

    lines
}

fn format_digest_lines(
    kind: ChangeKind,
    path: &str,
    previous: Option<&Snapshot>,
    current: &Snapshot,
) -> Vec<String> {
    let old = previous.and_then(|p| p.digest(path).map(|d| (p.algorithm(), d)));
    let new = current.digest(path).map(|d| (current.algorithm(), d));

    match (kind, old, new) {
        (ChangeKind::Removed, Some((algorithm, old)), _) => {
            vec![format!("   was: {}:{}", algorithm, truncate_digest(old))]
        }
        (ChangeKind::Modified, Some((old_algorithm, old)), Some((new_algorithm, new)))
            if old_algorithm != new_algorithm =>
        {
            vec![format!(
                "   digest: {}:{} -> {}:{}",
                old_algorithm,
                truncate_digest(old),
                new_algorithm,
                truncate_digest(new)
            )]
        }
        (ChangeKind::Modified, Some((algorithm, old)), Some((_, new))) => {
            vec![format!(
                "   {}: {} -> {}",
                algorithm,
                truncate_digest(old),
                truncate_digest(new)
            )]
        }
        _ => Vec::new(),
    }
}

fn truncate_digest(digest: &str) -> String {
    if digest.len() > 12 {
        format!("{}...", &digest[..12])
    } else {
        digest.to_string()
    }
}
