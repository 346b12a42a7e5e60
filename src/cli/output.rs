use console::style;
use std::fmt::Display;

/// Centralized output formatting for consistent CLI presentation
pub struct Output;

impl Output {
    pub fn success<T: Display>(message: T) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error<T: Display>(message: T) {
        println!("{} {}", style("✗").red(), message);
    }

    pub fn warning<T: Display>(message: T) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info<T: Display>(message: T) {
        println!("{} {}", style("ℹ").cyan(), message);
    }

    /// Print a sub-item with arrow prefix
    pub fn sub_item<T: Display>(message: T) {
        println!("  {} {}", style("→").dim(), message);
    }

    pub fn bullet<T: Display>(message: T) {
        println!("  {} {}", style("•").dim(), message);
    }

    pub fn section<T: Display>(title: T) {
        println!("\n{}", style(title).bold().underlined());
    }

    pub fn tip<T: Display>(message: T) {
        println!("{} {}", style("TIP:").cyan(), style(message).dim());
    }

    /// Print a check start message
    pub fn check_start<T: Display>(message: T) {
        println!("\n{}", style(message).bold());
    }

    pub fn solution<T: Display>(message: T) {
        println!("     {}: {}", style("Solution").yellow(), message);
    }

    /// Aligned `label: value` line
    pub fn field<L: Display, V: Display>(label: L, value: V) {
        println!("  {:<18} {}", style(format!("{label}:")).dim(), value);
    }

    pub fn divider() {
        println!("{}", style("─".repeat(50)).dim());
    }

    pub fn spacing() {
        println!();
    }
}
