use std::ops::AddAssign;
use std::time::Duration;

/// Aggregate size of a filesystem entry or subtree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    /// Sum of reported file sizes
    pub apparent: u64,
    /// Sum of allocated blocks, in bytes
    pub actual: u64,
    /// Number of filesystem entries included
    pub count: u64,
}

impl Size {
    pub const ZERO: Size = Size {
        apparent: 0,
        actual: 0,
        count: 0,
    };

    pub fn new(apparent: u64, actual: u64, count: u64) -> Self {
        Self {
            apparent,
            actual,
            count,
        }
    }

    /// Pick the field selected by `size_type`
    pub fn get(&self, size_type: SizeType) -> u64 {
        match size_type {
            SizeType::Apparent => self.apparent,
            SizeType::Actual => self.actual,
            SizeType::Count => self.count,
        }
    }

    /// The field used to break ties when ordering by `size_type`
    pub fn secondary(&self, size_type: SizeType) -> u64 {
        match size_type {
            SizeType::Apparent => self.actual,
            SizeType::Actual | SizeType::Count => self.apparent,
        }
    }
}

impl AddAssign for Size {
    fn add_assign(&mut self, other: Size) {
        self.apparent += other.apparent;
        self.actual += other.actual;
        self.count += other.count;
    }
}

impl AddAssign<&Size> for Size {
    fn add_assign(&mut self, other: &Size) {
        *self += *other;
    }
}

/// Which size field a listing is ordered or reported by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SizeType {
    #[default]
    Apparent,
    Actual,
    Count,
}

const PREFIXES: [&str; 9] = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];

fn humanize(value: f64, exact: bool, scale: f64) -> String {
    if exact || value < scale {
        return format!("{:.0}", value);
    }

    let mut v = value;
    let mut prefix = 0;
    while v >= scale && prefix < PREFIXES.len() - 1 {
        v /= scale;
        prefix += 1;
    }
    format!("{:.1}{}", v, PREFIXES[prefix])
}

/// Format bytes into a short human-readable string (1024-based, e.g. "1.5K")
///
/// With `exact` the plain byte count is returned.
pub fn format_size(bytes: u64, exact: bool) -> String {
    humanize(bytes as f64, exact, 1024.0)
}

/// Format an entry count (1000-based, e.g. "12.3K")
///
/// With `exact` the full number is returned with thousand separators.
pub fn format_count(n: u64, exact: bool) -> String {
    if !exact {
        return humanize(n as f64, false, 1000.0);
    }
    if n < 1000 {
        return n.to_string();
    }

    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);

    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}

/// Calculate percentage of size relative to total
pub fn size_percentage(size: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (size as f64 / total as f64) * 100.0
    }
}

/// Format an elapsed time, e.g. "02 minutes, and 3.50 seconds"
pub fn format_duration(elapsed: Duration) -> String {
    let mut secs = elapsed.as_secs_f64();

    let days = (secs / 86400.0) as u64;
    secs -= (days * 86400) as f64;
    let hours = (secs / 3600.0) as u64;
    secs -= (hours * 3600) as f64;
    let mins = (secs / 60.0) as u64;
    secs -= (mins * 60) as f64;

    if days > 0 {
        format!(
            "{} days, {:02} hours, {:02} minutes, and {:.2} seconds",
            days, hours, mins, secs
        )
    } else if hours > 0 {
        format!("{:02} hours, {:02} minutes, and {:.2} seconds", hours, mins, secs)
    } else if mins > 0 {
        format!("{:02} minutes, and {:.2} seconds", mins, secs)
    } else {
        format!("{:.2} seconds", secs)
    }
}
