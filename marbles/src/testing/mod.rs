//! Random diagram generation for property tests.
//!
//! The generator produces random but reproducible diagrams: the same seed
//! always yields the same sequence. Every generated diagram is valid and
//! already in rendered form, so `render_diagram(parse(d)) == d` holds
//! exactly:
//!
//! - no trailing padding
//! - groups hold at least two values
//! - hot diagram history has no leading padding, and `^` keeps its own column
//! - terminals only appear at the very end

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Markers the generator draws values from.
pub const MARKERS: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// Configuration for diagram generation.
#[derive(Debug, Clone)]
pub struct DiagramGenConfig {
    /// Maximum columns after the subscription point.
    pub max_columns: usize,
    /// Maximum columns of hot history before `^`.
    pub max_history_columns: usize,
    /// Probability that a column holds a value (0.0 - 1.0).
    pub event_rate: f64,
    /// Probability that a column opens a synchronous group (0.0 - 1.0).
    pub group_rate: f64,
    /// Maximum values per group. Groups are only generated if this is at
    /// least 2.
    pub max_group_size: usize,
    /// Probability that the diagram ends with a terminal (0.0 - 1.0).
    pub terminal_rate: f64,
    /// Probability that a terminal is `#` rather than `|` (0.0 - 1.0).
    pub error_rate: f64,
}

impl Default for DiagramGenConfig {
    fn default() -> Self {
        Self {
            max_columns: 20,
            max_history_columns: 8,
            event_rate: 0.3,
            group_rate: 0.05,
            max_group_size: 3,
            terminal_rate: 0.7,
            error_rate: 0.3,
        }
    }
}

/// Generator for random valid diagrams.
pub struct DiagramGenerator {
    rng: StdRng,
    config: DiagramGenConfig,
}

impl DiagramGenerator {
    /// Create a new generator with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, DiagramGenConfig::default())
    }

    /// Create a new generator with custom configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: DiagramGenConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Generate a cold diagram, e.g. `"-a--(bc)-d|"`.
    pub fn next_cold(&mut self) -> String {
        let columns = self.rng.random_range(0..=self.config.max_columns);
        let mut diagram = self.columns(columns);
        self.finish(&mut diagram);
        diagram
    }

    /// Generate a hot diagram, e.g. `"a-b-^--c-|"` or `"^-a|"`.
    pub fn next_hot(&mut self) -> String {
        let history = self.rng.random_range(0..=self.config.max_history_columns);
        let mut diagram = self
            .columns(history)
            .trim_start_matches('-')
            .to_string();
        diagram.push('^');
        let columns = self.rng.random_range(0..=self.config.max_columns);
        diagram.push_str(&self.columns(columns));
        self.finish(&mut diagram);
        diagram
    }

    fn marker(&mut self) -> char {
        MARKERS[self.rng.random_range(0..MARKERS.len())]
    }

    /// At least `count` columns of padding, values, and groups.
    fn columns(&mut self, count: usize) -> String {
        let mut out = String::new();
        let mut used = 0;
        while used < count {
            if self.config.max_group_size >= 2 && self.rng.random_bool(self.config.group_rate) {
                let size = self.rng.random_range(2..=self.config.max_group_size);
                out.push('(');
                for _ in 0..size {
                    out.push(self.marker());
                }
                out.push(')');
                used += size + 2;
            } else if self.rng.random_bool(self.config.event_rate) {
                out.push(self.marker());
                used += 1;
            } else {
                out.push('-');
                used += 1;
            }
        }
        out
    }

    /// Drop trailing padding and maybe append a terminal.
    fn finish(&mut self, diagram: &mut String) {
        while diagram.ends_with('-') {
            diagram.pop();
        }
        if self.rng.random_bool(self.config.terminal_rate) {
            let terminal = if self.rng.random_bool(self.config.error_rate) {
                '#'
            } else {
                '|'
            };
            diagram.push(terminal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::parse;

    #[test]
    fn test_same_seed_same_diagrams() {
        let mut first = DiagramGenerator::new(42);
        let mut second = DiagramGenerator::new(42);
        for _ in 0..50 {
            assert_eq!(first.next_cold(), second.next_cold());
            assert_eq!(first.next_hot(), second.next_hot());
        }
    }

    #[test]
    fn test_generated_diagrams_parse() {
        let mut generator = DiagramGenerator::new(7);
        for _ in 0..200 {
            let cold = generator.next_cold();
            assert!(!cold.ends_with('-'), "trailing padding in {cold}");
            let parsed = parse::<char>(&cold, None).unwrap();
            assert_eq!(parsed.subscription_column, None);

            let hot = generator.next_hot();
            let parsed = parse::<char>(&hot, None).unwrap();
            assert!(parsed.subscription_column.is_some(), "no caret in {hot}");
            assert!(!hot.starts_with('-'), "leading padding in {hot}");
        }
    }

    #[test]
    fn test_hot_diagrams_include_empty_history() {
        let mut generator = DiagramGenerator::new(13);
        let hot: Vec<String> = (0..200).map(|_| generator.next_hot()).collect();
        assert!(hot.iter().any(|d| d.starts_with('^')));
        assert!(hot.iter().any(|d| !d.starts_with('^')));
    }

    #[test]
    fn test_groups_disabled_below_two() {
        let config = DiagramGenConfig {
            group_rate: 1.0,
            max_group_size: 1,
            ..DiagramGenConfig::default()
        };
        let mut generator = DiagramGenerator::with_config(3, config);
        for _ in 0..50 {
            assert!(!generator.next_cold().contains('('));
        }
    }
}
