//! Empirical flow-size distribution
//!
//! Flow sizes are drawn from an empirical CDF loaded from a text file of
//! ascending `(size_bytes, cumulative_probability)` pairs, one per line,
//! with the last probability equal to 1.0. Sampling uses the inverse
//! transform with linear interpolation between neighboring points.

use crate::{Error, Result};
use rand::Rng;
use std::fs;
use std::path::Path;

/// One `(value, cumulative probability)` point of the table
#[derive(Debug, Clone, Copy, PartialEq)]
struct CdfPoint {
    value: f64,
    prob: f64,
}

/// Empirical CDF over flow sizes in bytes
#[derive(Debug, Clone)]
pub struct CdfTable {
    points: Vec<CdfPoint>,
}

impl CdfTable {
    /// Load a CDF table from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read size distribution {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Parse a CDF table from its text form
    pub fn parse(text: &str) -> Result<Self> {
        let mut points: Vec<CdfPoint> = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let Some(value) = fields.next() else {
                continue; // blank line
            };
            let prob = fields.next().ok_or_else(|| {
                Error::Config(format!("size distribution line {}: missing probability", lineno + 1))
            })?;

            let value: f64 = value.parse().map_err(|_| {
                Error::Config(format!("size distribution line {}: bad size {value:?}", lineno + 1))
            })?;
            let prob: f64 = prob.parse().map_err(|_| {
                Error::Config(format!("size distribution line {}: bad probability {prob:?}", lineno + 1))
            })?;

            if !(0.0..=1.0).contains(&prob) {
                return Err(Error::Config(format!(
                    "size distribution line {}: probability {prob} outside [0, 1]",
                    lineno + 1
                )));
            }
            if let Some(prev) = points.last() {
                if prob < prev.prob || value < prev.value {
                    return Err(Error::Config(format!(
                        "size distribution line {}: entries must be ascending",
                        lineno + 1
                    )));
                }
            }

            points.push(CdfPoint { value, prob });
        }

        if points.is_empty() {
            return Err(Error::Config("size distribution is empty".into()));
        }
        let last = points[points.len() - 1].prob;
        if last <= 0.0 {
            return Err(Error::Config(
                "size distribution must end with a positive cumulative probability".into(),
            ));
        }

        Ok(Self { points })
    }

    /// Average flow size in bytes.
    ///
    /// Trapezoidal mean over the segments of the table, with the first
    /// segment anchored at `(0, 0)`.
    pub fn avg(&self) -> f64 {
        let mut avg = 0.0;
        let mut last_value = 0.0;
        let mut last_prob = 0.0;

        for point in &self.points {
            avg += (point.value + last_value) / 2.0 * (point.prob - last_prob);
            last_value = point.value;
            last_prob = point.prob;
        }

        avg
    }

    /// Draw one flow size in bytes
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let max_prob = self.points[self.points.len() - 1].prob;
        let x = rng.gen::<f64>() * max_prob;

        let mut last_value = 0.0;
        let mut last_prob = 0.0;
        for point in &self.points {
            if x <= point.prob {
                return interpolate(x, last_prob, last_value, point.prob, point.value).round() as u32;
            }
            last_value = point.value;
            last_prob = point.prob;
        }

        self.points[self.points.len() - 1].value.round() as u32
    }
}

/// Linear interpolation of `y` at `x` between `(x1, y1)` and `(x2, y2)`
fn interpolate(x: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    if (x2 - x1).abs() < f64::EPSILON {
        return y1;
    }
    y1 + (x - x1) * (y2 - y1) / (x2 - x1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const WEB_SEARCH: &str = "10000 0.15\n20000 0.2\n30000 0.3\n50000 0.4\n\
                              80000 0.53\n200000 0.6\n1000000 0.7\n2000000 0.8\n\
                              5000000 0.9\n10000000 0.97\n30000000 1.0\n";

    #[test]
    fn test_parse_and_avg_constant() {
        let table = CdfTable::parse("1000 1.0\n").unwrap();
        assert!((table.avg() - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(CdfTable::parse(""), Err(Error::Config(_))));
        assert!(matches!(CdfTable::parse("\n\n"), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_rejects_descending() {
        assert!(CdfTable::parse("1000 0.5\n2000 0.4\n").is_err());
        assert!(CdfTable::parse("2000 0.5\n1000 1.0\n").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_probability() {
        assert!(CdfTable::parse("1000 1.5\n").is_err());
        assert!(CdfTable::parse("1000 x\n").is_err());
        assert!(CdfTable::parse("1000\n").is_err());
    }

    #[test]
    fn test_avg_two_points() {
        // Segments: (0,0)-(100,0.5) and (100,0.5)-(300,1.0)
        let table = CdfTable::parse("100 0.5\n300 1.0\n").unwrap();
        let expected = (100.0 + 0.0) / 2.0 * 0.5 + (300.0 + 100.0) / 2.0 * 0.5;
        assert!((table.avg() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sample_within_bounds() {
        let table = CdfTable::parse(WEB_SEARCH).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let size = table.sample(&mut rng);
            assert!(size <= 30_000_000);
        }
    }

    #[test]
    fn test_sample_constant_distribution() {
        // A single point interpolates along (0,0)-(1000,1.0), so the
        // sample mean approaches 500, matching avg().
        let table = CdfTable::parse("1000 1.0\n").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let n = 100_000;
        let sum: u64 = (0..n).map(|_| u64::from(table.sample(&mut rng))).sum();
        let mean = sum as f64 / n as f64;
        assert!((mean - table.avg()).abs() < 10.0, "mean {mean}");
    }

    #[test]
    fn test_sample_mean_matches_avg() {
        let table = CdfTable::parse(WEB_SEARCH).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let n = 200_000;
        let sum: u64 = (0..n).map(|_| u64::from(table.sample(&mut rng))).sum();
        let mean = sum as f64 / n as f64;
        let avg = table.avg();
        assert!((mean - avg).abs() / avg < 0.05, "mean {mean} vs avg {avg}");
    }
}
