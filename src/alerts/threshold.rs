use crate::error::AlertError;
use std::fmt;
use std::str::FromStr;

/// Comparison applied between a measured value and its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// value > threshold
    Gt,
    /// value < threshold
    Lt,
    /// value == threshold
    Eq,
}

impl Operator {
    /// Whether `value` satisfies the comparison against `threshold`
    pub fn evaluate(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Eq => value == threshold,
        }
    }
}

impl FromStr for Operator {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gt" => Ok(Operator::Gt),
            "lt" => Ok(Operator::Lt),
            "eq" => Ok(Operator::Eq),
            other => Err(AlertError::UnknownOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Eq => "eq",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_operator_parsing() {
        assert_eq!("gt".parse::<Operator>().unwrap(), Operator::Gt);
        assert_eq!("lt".parse::<Operator>().unwrap(), Operator::Lt);
        assert_eq!("eq".parse::<Operator>().unwrap(), Operator::Eq);
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        for raw in ["xyz", "GT", ">", "", "gte"] {
            match raw.parse::<Operator>() {
                Err(AlertError::UnknownOperator(op)) => assert_eq!(op, raw),
                other => panic!("expected UnknownOperator for {:?}, got {:?}", raw, other),
            }
        }
    }

    #[test]
    fn test_operator_display_round_trips() {
        for op in [Operator::Gt, Operator::Lt, Operator::Eq] {
            assert_eq!(op.to_string().parse::<Operator>().unwrap(), op);
        }
    }

    #[test]
    fn test_evaluate() {
        assert!(Operator::Gt.evaluate(5.0, 3.0));
        assert!(!Operator::Gt.evaluate(2.0, 3.0));
        assert!(!Operator::Gt.evaluate(3.0, 3.0));
        assert!(Operator::Lt.evaluate(2.0, 3.0));
        assert!(!Operator::Lt.evaluate(3.0, 3.0));
        assert!(Operator::Eq.evaluate(3.0, 3.0));
        assert!(!Operator::Eq.evaluate(3.0, 3.5));
    }

    #[quickcheck]
    fn prop_gt_and_lt_are_mirrored(value: i32, threshold: i32) -> bool {
        let (value, threshold) = (f64::from(value), f64::from(threshold));
        Operator::Gt.evaluate(value, threshold) == Operator::Lt.evaluate(threshold, value)
    }

    #[quickcheck]
    fn prop_exactly_one_comparison_holds(value: i32, threshold: i32) -> bool {
        let (value, threshold) = (f64::from(value), f64::from(threshold));
        let held = [Operator::Gt, Operator::Lt, Operator::Eq]
            .iter()
            .filter(|op| op.evaluate(value, threshold))
            .count();
        held == 1
    }
}
