//! Forward-only range sums over a run-length encoded step function.
//!
//! The backing data is a pair of parallel slices: `lengths[k]` is how far run
//! `k` extends past the right edge of run `k - 1` (the first run starts right
//! after position `-1`), and `values[k]` is what that run carries. A scanner
//! is a cursor into that data; it only ever moves right, so every query must
//! be strictly greater than the one before it. Callers that need several
//! independent sweeps over the same data build one scanner per sweep.

use crate::types::Pos;

/// How a run's value contributes to sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// The value is a point mass sitting on the run's right edge.
    EndValue,
    /// The value is a per-base rate over the whole run.
    Rate,
}

#[derive(Debug)]
pub struct RangeSumScanner<'a> {
    mode: ScanMode,
    lengths: &'a [Pos],
    values: &'a [f64],
    next: usize,
    cursor: Pos,
    sum: f64,
    last_query: Option<Pos>,
}

impl<'a> RangeSumScanner<'a> {
    pub fn new(mode: ScanMode, lengths: &'a [Pos], values: &'a [f64]) -> Self {
        assert_eq!(
            lengths.len(),
            values.len(),
            "run lengths and run values must be parallel"
        );
        Self {
            mode,
            lengths,
            values,
            next: 0,
            cursor: -1,
            sum: 0.0,
            last_query: None,
        }
    }

    /// Sum of everything at or left of `pos`.
    pub fn sum_through(&mut self, pos: Pos) -> f64 {
        self.check_forward(pos);
        if self.cursor < 0 && pos <= self.cursor {
            return 0.0;
        }
        assert!(
            pos > self.cursor,
            "range sum queried at {pos}, behind cursor {}",
            self.cursor
        );

        while self.next < self.lengths.len() && self.cursor + self.lengths[self.next] < pos {
            self.cursor += self.lengths[self.next];
            self.sum += self.run_total(self.next);
            self.next += 1;
        }
        if self.next == self.lengths.len() {
            return self.sum;
        }

        let open = match self.mode {
            ScanMode::EndValue => {
                if self.cursor + self.lengths[self.next] == pos {
                    self.values[self.next]
                } else {
                    0.0
                }
            }
            ScanMode::Rate => self.values[self.next] * (pos - self.cursor) as f64,
        };
        self.sum + open
    }

    /// Value of the step function at exactly `pos`.
    pub fn value_at(&mut self, pos: Pos) -> f64 {
        self.check_forward(pos);
        assert!(
            pos > self.cursor,
            "point value queried at {pos}, behind cursor {}",
            self.cursor
        );
        if self.next == self.lengths.len() {
            return 0.0;
        }

        loop {
            self.cursor += self.lengths[self.next];
            self.next += 1;
            if self.cursor >= pos || self.next == self.lengths.len() {
                break;
            }
        }
        if self.cursor < pos {
            return 0.0;
        }

        // Step back onto the run covering `pos` so the next query can reuse it.
        self.next -= 1;
        let value = match self.mode {
            ScanMode::Rate => self.values[self.next],
            ScanMode::EndValue if self.cursor == pos => self.values[self.next],
            ScanMode::EndValue => 0.0,
        };
        self.cursor -= self.lengths[self.next];
        value
    }

    fn run_total(&self, k: usize) -> f64 {
        match self.mode {
            ScanMode::EndValue => self.values[k],
            ScanMode::Rate => self.values[k] * self.lengths[k] as f64,
        }
    }

    fn check_forward(&mut self, pos: Pos) {
        if let Some(last) = self.last_query {
            assert!(
                pos > last,
                "scanner positions must increase: got {pos} after {last}"
            );
        }
        self.last_query = Some(pos);
    }
}
