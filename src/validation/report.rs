//! Validation report formatting.

use super::ValidationErrors;

/// Formats validation errors into a human-readable report.
pub fn format_report(errors: &ValidationErrors) -> String {
    if errors.is_empty() {
        return "Configuration is valid.".to_string();
    }

    let mut report = String::from("\nConfig Validation Failed\n");
    report.push_str("========================\n\n");

    for message in errors.messages() {
        report.push_str(&format!("ERROR {}\n\n", message));
    }

    report.push_str("---\n");
    report.push_str(&format!("{} error(s)\n", errors.len()));
    report.push_str("Config rejected. Current config unchanged.\n");

    report
}

/// Formats a brief summary suitable for log lines.
pub fn format_brief_summary(errors: &ValidationErrors) -> String {
    if errors.is_empty() {
        "Configuration valid".to_string()
    } else {
        format!("Configuration invalid: {} error(s)", errors.len())
    }
}
