//! Human-facing summary of the parameters an operation runs with.

use crate::bundle::BundleSpec;
use std::fmt;
use std::io::{self, Write};

/// The two sync operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Pull,
    Push,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Pull => f.write_str("Pull Config"),
            Operation::Push => f.write_str("Push Config"),
        }
    }
}

/// Receives the resolved parameters once per operation, before any work.
pub trait Reporter {
    fn report(&self, operation: Operation, spec: &BundleSpec);
}

/// Writes a parameter table and the file lists to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, operation: Operation, spec: &BundleSpec) {
        let mut out = io::stdout().lock();
        // Write errors are ignored
        let _ = out.write_all(render(operation, spec).as_bytes());
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn report(&self, _operation: Operation, _spec: &BundleSpec) {}
}

/// Render the summary. The passphrase is never included.
pub fn render(operation: Operation, spec: &BundleSpec) -> String {
    let project_path = spec.project_root.display().to_string();
    let rows = [
        ("bundle_id", spec.bundle_id.as_str()),
        ("git_repo", spec.repository_url.as_str()),
        ("git_ref", spec.git_ref.as_str()),
        ("project_path", project_path.as_str()),
    ];

    // `{:<width$}` pads by chars, so widths are char counts
    let width = |s: &str| s.chars().count();
    let key_width = rows.iter().map(|(k, _)| width(k)).max().unwrap_or(0).max(width("Parameter"));
    let value_width = rows.iter().map(|(_, v)| width(v)).max().unwrap_or(0).max(width("Value"));
    let title = operation.to_string();
    let inner = (key_width + value_width + 3).max(width(&title));
    let value_width = inner - key_width - 3;

    let border = format!("+-{}-+-{}-+\n", "-".repeat(key_width), "-".repeat(value_width));
    let mut out = String::new();
    out.push('\n');
    out.push_str(&format!("+-{}-+\n", "-".repeat(inner)));
    out.push_str(&format!("| {title:^inner$} |\n"));
    out.push_str(&border);
    out.push_str(&format!("| {:<key_width$} | {:<value_width$} |\n", "Parameter", "Value"));
    out.push_str(&border);
    for (key, value) in rows {
        out.push_str(&format!("| {key:<key_width$} | {value:<value_width$} |\n"));
    }
    out.push_str(&border);
    out.push('\n');

    for (category, files) in spec.categories() {
        if files.is_empty() {
            continue;
        }
        out.push_str(category.label());
        out.push(':');
        for file in files {
            out.push_str("\n\t- ");
            out.push_str(&file.display().to_string());
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_parameters_and_files() {
        let mut spec = BundleSpec::new("com.app", "git@example.com:org/config.git");
        spec.git_ref = "release".into();
        spec.passphrase = "hunter2".into();
        spec.bundled_files = vec!["Info.plist".into()];
        spec.common_encrypted_files = vec!["keys.json".into(), "certs/dist.p12".into()];

        let text = render(Operation::Push, &spec);

        assert!(text.contains("Push Config"));
        assert!(text.contains("| bundle_id    | com.app"));
        assert!(text.contains("release"));
        assert!(text.contains("bundled_files:\n\t- Info.plist\n"));
        assert!(text.contains("common_encrypted_files:\n\t- keys.json\n\t- certs/dist.p12\n"));
        assert!(!text.contains("common_files:"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_rows_are_aligned() {
        let spec = BundleSpec::new("com.app", "repo");
        let text = render(Operation::Pull, &spec);
        let widths: Vec<usize> = text
            .lines()
            .filter(|l| l.starts_with('|') || l.starts_with('+'))
            .map(|l| l.chars().count())
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_non_ascii_rows_are_aligned() {
        let mut spec = BundleSpec::new("com.app", "https://git.example.com/équipe/réglages.git");
        spec.project_root = "/home/użytkownik/プロジェクト".into();
        let text = render(Operation::Push, &spec);

        let widths: Vec<usize> = text
            .lines()
            .filter(|l| l.starts_with('|') || l.starts_with('+'))
            .map(|l| l.chars().count())
            .collect();
        assert_eq!(widths.len(), 10);
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{text}");
        assert!(text.contains("| project_path | /home/użytkownik/プロジェクト"));
    }
}
