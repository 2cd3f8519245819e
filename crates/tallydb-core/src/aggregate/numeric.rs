//! Numeric fold helpers shared by the accumulators and the array functions.

use crate::value::Value;

///
/// Welford
///
/// Running count, mean and sum of squared deviations (M2). Partial states
/// from different shards combine with the pairwise update of Chan et al.
///

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Welford {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    #[must_use]
    pub const fn from_parts(count: u64, mean: f64, m2: f64) -> Self {
        Self { count, mean, m2 }
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    #[must_use]
    pub const fn m2(&self) -> f64 {
        self.m2
    }

    #[expect(clippy::cast_precision_loss)]
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    #[expect(clippy::cast_precision_loss)]
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let count = self.count + other.count;
        let (left, right, total) = (self.count as f64, other.count as f64, count as f64);
        let delta = other.mean - self.mean;

        self.mean += delta * right / total;
        self.m2 += other.m2 + delta * delta * left * right / total;
        self.count = count;
    }

    /// M2 / count, or `None` with no values.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn variance_population(&self) -> Option<f64> {
        (self.count >= 1).then(|| self.m2 / self.count as f64)
    }

    /// M2 / (count - 1), or `None` with fewer than two values.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn variance_sample(&self) -> Option<f64> {
        (self.count >= 2).then(|| self.m2 / (self.count - 1) as f64)
    }
}

///
/// BitOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

impl BitOp {
    #[must_use]
    pub const fn apply(self, left: u32, right: u32) -> u32 {
        match self {
            Self::And => left & right,
            Self::Or => left | right,
            Self::Xor => left ^ right,
        }
    }
}

/// Interpret a value as a bit-aggregate operand.
///
/// Only integral numbers in `[0, 2^32)` qualify; anything else poisons.
#[must_use]
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn bit_operand(value: &Value) -> Option<u32> {
    let n = value.as_number()?;
    if n.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&n) {
        return None;
    }

    Some(n as u32)
}

/// Map a non-finite numeric result to null.
#[must_use]
pub fn finite_or_null(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Null
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn welford(values: &[f64]) -> Welford {
        let mut w = Welford::default();
        for v in values {
            w.push(*v);
        }
        w
    }

    #[test]
    fn welford_matches_textbook_variance() {
        let w = welford(&[19.0, 23.0]);

        assert_eq!(w.variance_population(), Some(4.0));
        assert_eq!(w.variance_sample(), Some(8.0));
    }

    #[test]
    fn welford_small_counts_have_no_variance() {
        assert_eq!(Welford::default().variance_population(), None);
        assert_eq!(welford(&[5.0]).variance_population(), Some(0.0));
        assert_eq!(welford(&[5.0]).variance_sample(), None);
    }

    #[test]
    fn chan_merge_matches_single_pass() {
        let all = welford(&[1.0, 2.0, 4.0, 8.0, 16.0, 3.0]);
        let mut left = welford(&[1.0, 2.0, 4.0]);
        left.merge(&welford(&[8.0, 16.0, 3.0]));
        left.merge(&Welford::default());

        assert_eq!(left.count(), all.count());
        assert!((left.mean() - all.mean()).abs() < 1e-9);
        assert!((left.m2() - all.m2()).abs() < 1e-9);
    }

    #[test]
    fn bit_operands_must_be_u32_integers() {
        assert_eq!(bit_operand(&Value::from(42)), Some(42));
        assert_eq!(bit_operand(&Value::from(4_294_967_295_u32)), Some(u32::MAX));
        assert_eq!(bit_operand(&Value::from(4_294_967_296_u64)), None);
        assert_eq!(bit_operand(&Value::from(-1)), None);
        assert_eq!(bit_operand(&Value::from(1.5)), None);
        assert_eq!(bit_operand(&Value::from("1")), None);
        assert_eq!(bit_operand(&Value::from(f64::NAN)), None);
    }

    #[test]
    fn bit_ops_fold_as_expected() {
        assert_eq!(BitOp::And.apply(19, 23), 19);
        assert_eq!(BitOp::Or.apply(19, 23), 23);
        assert_eq!(BitOp::Xor.apply(19, 23), 4);
    }
}
