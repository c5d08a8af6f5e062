use std::fmt;

/// Value of a compile-time constant expression, as computed during resolution
///
/// `byte`, `short` and `char` constants are stored as `Int` (the type of the expression says how
/// they should be treated).
#[derive(Clone, PartialEq, Debug)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
}

impl ConstantValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Is this the numeric zero (or `false`) of its type?
    ///
    /// `-0.0` is not: comparing against it cannot be replaced with a comparison against `0`
    /// once the sign matters (`1 / x`), so only positive zero qualifies.
    pub fn is_zero(&self) -> bool {
        match self {
            ConstantValue::Int(i) => *i == 0,
            ConstantValue::Long(l) => *l == 0,
            ConstantValue::Float(f) => f.to_bits() == 0,
            ConstantValue::Double(d) => d.to_bits() == 0,
            ConstantValue::Boolean(b) => !*b,
            ConstantValue::String(_) => false,
        }
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(i) => write!(f, "{}", i),
            ConstantValue::Long(l) => write!(f, "{}L", l),
            ConstantValue::Float(x) => write!(f, "{}f", x),
            ConstantValue::Double(x) => write!(f, "{}d", x),
            ConstantValue::Boolean(b) => write!(f, "{}", b),
            ConstantValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zeros() {
        assert!(ConstantValue::Int(0).is_zero());
        assert!(ConstantValue::Boolean(false).is_zero());
        assert!(ConstantValue::Double(0.0).is_zero());
        assert!(!ConstantValue::Double(-0.0).is_zero());
        assert!(!ConstantValue::Long(3).is_zero());
        assert!(!ConstantValue::String(String::new()).is_zero());
    }
}
