//! Reference distribution of price variations.
//!
//! Points are `linspace(1, max_variation, n)`. A variation `v` ranks as the
//! share of points strictly above `|v| + 1`: calm markets rank near 1,
//! variations past `max_variation - 1` rank 0.

#[derive(Debug, Clone, PartialEq)]
pub struct VariationHistogram {
    points: Vec<f64>,
}

impl VariationHistogram {
    pub fn new(max_variation: f64, n: usize) -> Self {
        let n = n.max(2);
        let step = (max_variation - 1.0) / (n - 1) as f64;
        let points = (0..n).map(|i| 1.0 + step * i as f64).collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rank of `variation` (percent) in `[0, 1)`.
    pub fn rank(&self, variation: f64) -> f64 {
        let threshold = variation.abs() + 1.0;
        let above = self.points.iter().filter(|x| **x > threshold).count();
        above as f64 / self.points.len() as f64
    }

    /// `(1 - rank) * min_flex + rank`, in `[min_flex, 1]`.
    pub fn scale(&self, variation: f64, min_flex: f64) -> f64 {
        let rank = self.rank(variation);
        (1.0 - rank) * min_flex + rank
    }
}
