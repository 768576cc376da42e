use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Announces the pipeline steps as bold "[n/m]" headers.
///
/// Steps that are skipped for the chosen options are simply not announced,
/// so `total` is the number of steps this run will actually go through.
pub struct Steps {
    current: usize,
    total: usize,
}

impl Steps {
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    pub fn next(&mut self, message: &str) {
        self.current += 1;
        println!("{} {}", self.header().bold(), message);
    }

    fn header(&self) -> String {
        format!("[{}/{}]", self.current, self.total)
    }
}

/// Progress bar over `len` items of `unit`, drawn to stderr and hidden when
/// that is not a terminal.
pub fn progress_bar(len: usize, unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let template =
        format!("{{spinner:.green}} [{{elapsed_precise}}] [{{bar:45.white/black}}] {{pos}}/{{len}} {unit} ({{eta}})");
    let style = ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░");
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_headers() {
        let mut steps = Steps::new(3);
        steps.next("Reading ways...");
        assert_eq!(steps.header(), "[1/3]");
        steps.next("Reading nodes...");
        assert_eq!(steps.header(), "[2/3]");
    }

    #[test]
    fn test_progress_bar_length() {
        let pb = progress_bar(42, "ways");
        assert_eq!(pb.length(), Some(42));
        pb.finish_and_clear();
    }
}
