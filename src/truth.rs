//! Three-valued truth.
//!
//! Comparisons between abstract indices may be undecidable, so they return a
//! [`Truth`] rather than a `bool`. The connectives follow strong Kleene logic:
//!
//! ```text
//!  and | F  T  U        or | F  T  U
//!  ----+---------       ---+---------
//!   F  | F  F  F         F | F  T  U
//!   T  | F  T  U         T | T  T  T
//!   U  | F  U  U         U | U  T  U
//! ```

use std::fmt::{Display, Formatter};
use std::ops::{BitAnd, BitOr, Not};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Truth {
    False,
    True,
    Unknown,
}

impl Truth {
    pub const fn from_bool(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }

    pub const fn is_true(self) -> bool {
        matches!(self, Truth::True)
    }
    pub const fn is_false(self) -> bool {
        matches!(self, Truth::False)
    }
    pub const fn is_unknown(self) -> bool {
        matches!(self, Truth::Unknown)
    }

    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Unknown,
        }
    }

    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Unknown,
        }
    }

    pub const fn not(self) -> Self {
        match self {
            Truth::False => Truth::True,
            Truth::True => Truth::False,
            Truth::Unknown => Truth::Unknown,
        }
    }

    /// Plain tag: `f`, `t` or `u`.
    pub const fn tag(self) -> char {
        match self {
            Truth::False => 'f',
            Truth::True => 't',
            Truth::Unknown => 'u',
        }
    }

    pub const fn from_tag(c: char) -> Option<Self> {
        match c {
            'f' => Some(Truth::False),
            't' => Some(Truth::True),
            'u' => Some(Truth::Unknown),
            _ => None,
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        Truth::from_bool(b)
    }
}

impl BitAnd for Truth {
    type Output = Truth;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for Truth {
    type Output = Truth;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl Not for Truth {
    type Output = Truth;

    fn not(self) -> Self::Output {
        Truth::not(self)
    }
}

impl Display for Truth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Truth::False => write!(f, "false"),
            Truth::True => write!(f, "true"),
            Truth::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    pub(super) const ALL: [Truth; 3] = [Truth::False, Truth::True, Truth::Unknown];

    #[test]
    fn test_order() {
        assert!(Truth::False < Truth::True);
        assert!(Truth::True < Truth::Unknown);
    }

    #[test]
    fn test_predicates() {
        assert!(Truth::True.is_true() && !Truth::True.is_unknown());
        assert!(Truth::False.is_false() && !Truth::False.is_true());
        assert!(Truth::Unknown.is_unknown() && !Truth::Unknown.is_false());
        assert!(Truth::from(true).is_true());
    }

    #[test]
    fn test_tables() {
        use Truth::*;
        assert_eq!(True & Unknown, Unknown);
        assert_eq!(False & Unknown, False);
        assert_eq!(True | Unknown, True);
        assert_eq!(False | Unknown, Unknown);
        assert_eq!(!Unknown, Unknown);
        assert_eq!(!True, False);
    }

    #[test]
    fn test_tags() {
        for t in ALL {
            assert_eq!(Truth::from_tag(t.tag()), Some(t));
        }
        assert_eq!(Truth::from_tag('x'), None);
    }
}
