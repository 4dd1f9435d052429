//! Operator tags for binary, unary, type-test and jump nodes.

use std::fmt;

/// Binary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    AddChecked,
    Subtract,
    SubtractChecked,
    Multiply,
    MultiplyChecked,
    Divide,
    Modulo,
    Power,
    // Bitwise / logical (non-short-circuit)
    And,
    Or,
    ExclusiveOr,
    LeftShift,
    RightShift,
    // Short-circuit
    AndAlso,
    OrElse,
    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    // Other
    Coalesce,
    ArrayIndex,
    // Assignment
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
}

impl BinaryOp {
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub const fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    pub const fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }

    pub const fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubtractAssign
                | BinaryOp::MultiplyAssign
                | BinaryOp::DivideAssign
        )
    }

    pub const fn is_checked(self) -> bool {
        matches!(
            self,
            BinaryOp::AddChecked | BinaryOp::SubtractChecked | BinaryOp::MultiplyChecked
        )
    }

    pub const fn is_shift(self) -> bool {
        matches!(self, BinaryOp::LeftShift | BinaryOp::RightShift)
    }

    /// Whether a conversion lambda may be attached.
    ///
    /// Only coalescing and compound assignment use one.
    pub const fn accepts_conversion(self) -> bool {
        matches!(
            self,
            BinaryOp::Coalesce
                | BinaryOp::AddAssign
                | BinaryOp::SubtractAssign
                | BinaryOp::MultiplyAssign
                | BinaryOp::DivideAssign
        )
    }

    /// Arithmetic operator a compound assignment applies.
    pub const fn compound_operator(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::SubtractAssign => Some(BinaryOp::Subtract),
            BinaryOp::MultiplyAssign => Some(BinaryOp::Multiply),
            BinaryOp::DivideAssign => Some(BinaryOp::Divide),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::AddChecked => "checked(+)",
            BinaryOp::Subtract => "-",
            BinaryOp::SubtractChecked => "checked(-)",
            BinaryOp::Multiply => "*",
            BinaryOp::MultiplyChecked => "checked(*)",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "**",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::ExclusiveOr => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::Coalesce => "??",
            BinaryOp::ArrayIndex => "[]",
            BinaryOp::Assign => "=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubtractAssign => "-=",
            BinaryOp::MultiplyAssign => "*=",
            BinaryOp::DivideAssign => "/=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    NegateChecked,
    UnaryPlus,
    Not,
    OnesComplement,
    Increment,
    Decrement,
    IsTrue,
    IsFalse,
    Convert,
    ConvertChecked,
    TypeAs,
    Unbox,
    ArrayLength,
    Quote,
    Throw,
}

impl UnaryOp {
    /// Operators whose result type cannot be derived from the operand.
    pub const fn requires_type(self) -> bool {
        matches!(
            self,
            UnaryOp::Convert | UnaryOp::ConvertChecked | UnaryOp::TypeAs | UnaryOp::Unbox
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::NegateChecked => "checked(-)",
            UnaryOp::UnaryPlus => "+",
            UnaryOp::Not => "!",
            UnaryOp::OnesComplement => "~",
            UnaryOp::Increment => "increment",
            UnaryOp::Decrement => "decrement",
            UnaryOp::IsTrue => "is_true",
            UnaryOp::IsFalse => "is_false",
            UnaryOp::Convert => "convert",
            UnaryOp::ConvertChecked => "convert_checked",
            UnaryOp::TypeAs => "as",
            UnaryOp::Unbox => "unbox",
            UnaryOp::ArrayLength => "length",
            UnaryOp::Quote => "quote",
            UnaryOp::Throw => "throw",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type test operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeBinaryOp {
    /// Assignability test (`is`).
    TypeIs,
    /// Exact runtime type test.
    TypeEqual,
}

/// Flavor of a jump; all four share one node shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GotoKind {
    Goto,
    Return,
    Break,
    Continue,
}
