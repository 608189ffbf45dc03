use chrono::Local;
use codegraft::{ProcessReport, RuleOutcome};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const RED: &str = "\x1b[31m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_header(color: bool) {
    let palette = ansi::Palette::new(color);
    println!(
        "{}",
        palette.dim(format!("codegraft demo run at {}", Local::now().format("%Y-%m-%d %H:%M:%S")))
    );
}

pub fn print_run(original_len: usize, report: &ProcessReport, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Loading: \"{}\"", report.unit), ansi::CYAN)));

    // Matching summary
    println!("\n{}", palette.paint("━━━ Matching ━━━", ansi::GRAY));
    if report.details.matched_rules.is_empty() {
        println!("{}", palette.dim("  No rule matched; unit ignored"));
    } else {
        for (idx, rule) in report.details.matched_rules.iter().enumerate() {
            println!(
                "  {} {}",
                palette.paint(format!("[{}]", idx), ansi::GRAY),
                palette.paint(rule, ansi::BLUE)
            );
        }
    }

    // Fold trace
    if !report.details.applications.is_empty() {
        println!("\n{}", palette.paint("━━━ Fold ━━━", ansi::GRAY));
        for application in &report.details.applications {
            let (mark, color_code) = match &application.outcome {
                RuleOutcome::Rewritten => ("✓ rewritten", ansi::GREEN),
                RuleOutcome::Declined => ("– declined", ansi::YELLOW),
                RuleOutcome::Failed(_) => ("✗ failed", ansi::RED),
            };
            println!(
                "  {} {} {}",
                palette.paint(&application.rule, ansi::BLUE),
                palette.paint(mark, color_code),
                palette.dim(format!("{:?}", application.duration)),
            );
            if let RuleOutcome::Failed(reason) = &application.outcome {
                println!("      {}", palette.dim(reason));
            }
        }
    }

    // Result
    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    match report.outcome.unit() {
        Some(unit) => println!(
            "  {} {}",
            palette.bold(palette.paint("rewritten", ansi::GREEN)),
            palette.paint(format!("{} → {} bytes", original_len, unit.bytes.len()), ansi::YELLOW),
        ),
        None => println!("  {}", palette.dim("unchanged; original unit passes through")),
    }

    // Timing
    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Matching: {}  │  Fold: {}",
        palette.paint(format!("{:?}", report.details.total), ansi::GREEN),
        palette.paint(format!("{:?}", report.details.matching), ansi::CYAN),
        palette.dim(format!("{:?}", report.details.fold)),
    );
}
