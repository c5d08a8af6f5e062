use crate::jvm::OrdComparison;
use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    UShr,

    /// `&` (bitwise, or non-short-circuit on booleans)
    And,

    /// `|` (bitwise, or non-short-circuit on booleans)
    Or,

    Xor,

    /// `&&`
    AndAnd,

    /// `||`
    OrOr,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOperator {
    /// Operators producing a `boolean` from two operands of a possibly different type
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(
            self,
            BinaryOperator::Shl | BinaryOperator::Shr | BinaryOperator::UShr
        )
    }

    pub fn comparison(self) -> Option<OrdComparison> {
        Some(match self {
            BinaryOperator::Eq => OrdComparison::EQ,
            BinaryOperator::Ne => OrdComparison::NE,
            BinaryOperator::Lt => OrdComparison::LT,
            BinaryOperator::Le => OrdComparison::LE,
            BinaryOperator::Gt => OrdComparison::GT,
            BinaryOperator::Ge => OrdComparison::GE,
            _ => return None,
        })
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::UShr => ">>>",
            BinaryOperator::And => "&",
            BinaryOperator::Or => "|",
            BinaryOperator::Xor => "^",
            BinaryOperator::AndAnd => "&&",
            BinaryOperator::OrOr => "||",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
        };
        f.write_str(symbol)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum UnaryOperator {
    /// `-`
    Minus,

    /// `+` (only promotes the operand)
    Plus,

    /// `!`
    Not,

    /// `~`
    Complement,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum IncrementKind {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl IncrementKind {
    pub fn is_prefix(self) -> bool {
        matches!(
            self,
            IncrementKind::PreIncrement | IncrementKind::PreDecrement
        )
    }

    /// `1` or `-1`
    pub fn delta(self) -> i16 {
        match self {
            IncrementKind::PreIncrement | IncrementKind::PostIncrement => 1,
            IncrementKind::PreDecrement | IncrementKind::PostDecrement => -1,
        }
    }
}
