//! Comparing a fresh capture against the previous snapshot.

use regex::Regex;
use similar::TextDiff;

/// Lines that change on every capture without a configuration change.
const VOLATILE_LINES: &[&str] = &[
    // IOS / IOS-XE
    r"^Building configuration\.\.\.$",
    r"^Current configuration ?: ?\d+ bytes$",
    r"^! Last configuration change at ",
    r"^! NVRAM config last updated at ",
    r"^! No configuration change since last restart$",
    // NX-OS
    r"^!Time: ",
    r"^!Running configuration last done at: ",
    // IOS-XR prints the current time before the configuration
    r"^(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun) (?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) +\d{1,2} \d{2}:\d{2}:\d{2}(?:\.\d+)? \S+$",
];

/// Outcome of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeResult {
    Unchanged,

    /// `delta` is a unified diff, for logging only.
    Changed { delta: String },
}

impl ChangeResult {
    pub fn is_changed(&self) -> bool {
        matches!(self, ChangeResult::Changed { .. })
    }
}

/// Decides whether two configuration texts differ.
pub trait Differ {
    /// `previous` is `None` for a device that was never captured, which is
    /// always a change.
    fn compare(&self, previous: Option<&str>, current: &str) -> ChangeResult;
}

/// Line-based differ that ignores volatile lines and trailing whitespace.
#[derive(Debug, Clone, Default)]
pub struct LineDiffer {
    ignore: Vec<Regex>,
    context: usize,
}

impl LineDiffer {
    /// Differ with the built-in volatile line patterns.
    pub fn standard() -> Result<Self, regex::Error> {
        VOLATILE_LINES
            .iter()
            .try_fold(Self::default().with_context(3), |differ, pattern| {
                differ.with_ignore_pattern(pattern)
            })
    }

    pub fn with_ignore_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.ignore.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// Lines of context in the reported delta.
    pub fn with_context(mut self, lines: usize) -> Self {
        self.context = lines;
        self
    }

    fn significant_lines<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.lines()
            .map(str::trim_end)
            .filter(|line| !self.ignore.iter().any(|re| re.is_match(line)))
            .collect()
    }

    fn unified(&self, previous: &str, current: &str) -> String {
        TextDiff::from_lines(previous, current)
            .unified_diff()
            .context_radius(self.context)
            .header("previous", "current")
            .to_string()
    }
}

impl Differ for LineDiffer {
    fn compare(&self, previous: Option<&str>, current: &str) -> ChangeResult {
        let Some(previous) = previous else {
            return ChangeResult::Changed {
                delta: self.unified("", current),
            };
        };

        if self.significant_lines(previous) == self.significant_lines(current) {
            ChangeResult::Unchanged
        } else {
            ChangeResult::Changed {
                delta: self.unified(previous, current),
            }
        }
    }
}
