//! Append-only error table of the shrink loop

use std::fmt;

/// One shrink step: perturbation norm and relative error of the analytic
/// directional derivative at that step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorRow {
    pub norm: f64,
    pub error: f64,
}

impl ErrorRow {
    /// Elementwise ratio `self / previous`
    pub fn ratio_to(&self, previous: &ErrorRow) -> ErrorRow {
        ErrorRow {
            norm: self.norm / previous.norm,
            error: self.error / previous.error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorTable {
    rows: Vec<ErrorRow>,
}

impl ErrorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, norm: f64, error: f64) {
        self.rows.push(ErrorRow { norm, error });
    }

    pub fn rows(&self) -> &[ErrorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&ErrorRow> {
        self.rows.last()
    }

    /// Consecutive ratio rows `row[p] / row[p-1]` for `p >= 1`
    pub fn ratios(&self) -> Vec<ErrorRow> {
        self.rows
            .windows(2)
            .map(|pair| pair[1].ratio_to(&pair[0]))
            .collect()
    }

    pub fn last_ratio(&self) -> Option<ErrorRow> {
        match self.rows.len() {
            0 | 1 => None,
            n => Some(self.rows[n - 1].ratio_to(&self.rows[n - 2])),
        }
    }

    /// True when the last (up to) `window` error-column ratios are all within
    /// `tolerance` of `target`. An empty ratio list never settles.
    pub fn error_ratios_settled(&self, window: usize, target: f64, tolerance: f64) -> bool {
        let ratios = self.ratios();
        if ratios.is_empty() {
            return false;
        }
        ratios
            .iter()
            .rev()
            .take(window)
            .all(|r| (r.error - target).abs() < tolerance)
    }
}

impl fmt::Display for ErrorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>5} {:>16} {:>16}", "step", "|x|", "rel. error")?;
        for (p, row) in self.rows.iter().enumerate() {
            writeln!(f, "{:>5} {:>16.8e} {:>16.8e}", p, row.norm, row.error)?;
        }
        let ratios = self.ratios();
        if !ratios.is_empty() {
            writeln!(f, "{:>5} {:>16} {:>16}", "ratio", "|x| ratio", "error ratio")?;
            for (p, row) in ratios.iter().enumerate() {
                writeln!(f, "{:>5} {:>16.12} {:>16.12}", p + 1, row.norm, row.error)?;
            }
        }
        Ok(())
    }
}
