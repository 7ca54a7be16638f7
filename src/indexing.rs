//! Abstract integers for array and slice indices.
//!
//! The solver consumes index values only through [`Index`]; how values are
//! produced and compared is a capability chosen per package:
//!
//! - [`ConstIndexing`]: constants, plus one anonymous unknown with no identity.
//! - [`VarIndexing`]: constants and linear terms `scale * v + offset` over
//!   fresh variables, so that `i` and `i + 1` compare as different.
//!
//! Soundness requirement for every implementation: `equal(a, b) == True`
//! only if `a` and `b` denote the same integer in every concretization.

use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::DecodeError;
use crate::truth::Truth;

/// An abstract index value.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Index {
    Const(i64),
    /// `scale * var + offset`; `var == 0` is the anonymous unknown.
    Var { var: u32, scale: i64, offset: i64 },
}

impl Index {
    pub const ZERO: Index = Index::Const(0);
    pub const ONE: Index = Index::Const(1);
    pub const ANON: Index = Index::Var {
        var: 0,
        scale: 1,
        offset: 0,
    };

    pub const fn as_const(self) -> Option<i64> {
        match self {
            Index::Const(c) => Some(c),
            Index::Var { .. } => None,
        }
    }

    pub const fn is_var(self) -> bool {
        matches!(self, Index::Var { .. })
    }

    pub const fn is_anon(self) -> bool {
        matches!(self, Index::Var { var: 0, .. })
    }

    /// Drop variable identity. Used when a value crosses a package boundary.
    pub const fn anonymize(self) -> Index {
        match self {
            Index::Const(_) => self,
            Index::Var { .. } => Index::ANON,
        }
    }

    fn linear(var: u32, scale: i64, offset: i64) -> Index {
        if var == 0 {
            Index::ANON
        } else if scale == 0 {
            Index::Const(offset)
        } else {
            Index::Var { var, scale, offset }
        }
    }
}

impl Display for Index {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Index::Const(c) => write!(f, "{}", c),
            Index::Var { var: 0, .. } => write!(f, "?"),
            Index::Var { var, scale, offset } => write!(f, "v{}*{}+{}", var, scale, offset),
        }
    }
}

/// Operations over abstract integers.
pub trait Indexing: Debug + Send + Sync {
    /// Short name recorded with encoded packages.
    fn name(&self) -> &'static str;

    fn zero(&self) -> Index {
        Index::ZERO
    }
    fn one(&self) -> Index {
        Index::ONE
    }
    fn from_int(&self, i: i64) -> Index {
        Index::Const(i)
    }
    fn to_int(&self, v: Index) -> Option<i64> {
        v.as_const()
    }
    fn is_var(&self, v: Index) -> bool {
        v.is_var()
    }

    /// A fresh unknown value.
    fn var(&self) -> Index;

    fn plus(&self, a: Index, b: Index) -> Index;
    fn times(&self, a: Index, b: Index) -> Index;

    fn band(&self, a: Index, b: Index) -> Index {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Index::Const(x & y),
            (Index::Const(0), _) | (_, Index::Const(0)) => Index::ZERO,
            _ => Index::ANON,
        }
    }

    fn bnot(&self, a: Index) -> Index {
        match a {
            Index::Const(x) => Index::Const(!x),
            _ => Index::ANON,
        }
    }

    /// Quotient and whether it is defined.
    fn div(&self, a: Index, b: Index) -> (Index, Truth) {
        divide(a, b, i64::wrapping_div)
    }

    fn rem(&self, a: Index, b: Index) -> (Index, Truth) {
        divide(a, b, i64::wrapping_rem)
    }

    fn lshift(&self, a: Index, s: Index) -> (Index, Truth) {
        shift(a, s, |x, n| if n >= 64 { 0 } else { x.wrapping_shl(n) })
    }

    fn rshift(&self, a: Index, s: Index) -> (Index, Truth) {
        shift(a, s, |x, n| if n >= 64 { x >> 63 } else { x >> n })
    }

    fn less(&self, a: Index, b: Index) -> Truth;
    fn equal(&self, a: Index, b: Index) -> Truth;

    fn encode(&self, v: Index, out: &mut String) {
        out.push_str(&v.to_string());
    }

    fn decode(&self, token: &str) -> Result<Index, DecodeError>;
}

fn divide(a: Index, b: Index, op: fn(i64, i64) -> i64) -> (Index, Truth) {
    match (a, b) {
        (_, Index::Const(0)) => (Index::ZERO, Truth::False),
        (Index::Const(x), Index::Const(y)) => (Index::Const(op(x, y)), Truth::True),
        (Index::Var { .. }, Index::Const(_)) => (Index::ANON, Truth::True),
        (_, Index::Var { .. }) => (Index::ANON, Truth::Unknown),
    }
}

fn shift(a: Index, s: Index, op: fn(i64, u32) -> i64) -> (Index, Truth) {
    match (a, s) {
        (_, Index::Const(n)) if n < 0 => (Index::ZERO, Truth::False),
        (Index::Const(x), Index::Const(n)) => {
            let n = u32::try_from(n).unwrap_or(u32::MAX);
            (Index::Const(op(x, n)), Truth::True)
        }
        _ => (Index::ANON, Truth::Unknown),
    }
}

fn decode_const(token: &str) -> Result<Index, DecodeError> {
    if token == "?" {
        return Ok(Index::ANON);
    }
    token
        .parse::<i64>()
        .map(Index::Const)
        .map_err(|_| DecodeError::BadNumber(token.to_string()))
}

/// Constants only; every unknown is the same anonymous value.
#[derive(Debug, Default, Copy, Clone)]
pub struct ConstIndexing;

impl Indexing for ConstIndexing {
    fn name(&self) -> &'static str {
        "const"
    }

    fn var(&self) -> Index {
        Index::ANON
    }

    fn plus(&self, a: Index, b: Index) -> Index {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Index::Const(x.wrapping_add(y)),
            _ => Index::ANON,
        }
    }

    fn times(&self, a: Index, b: Index) -> Index {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Index::Const(x.wrapping_mul(y)),
            (Index::Const(0), _) | (_, Index::Const(0)) => Index::ZERO,
            _ => Index::ANON,
        }
    }

    fn less(&self, a: Index, b: Index) -> Truth {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Truth::from(x < y),
            _ => Truth::Unknown,
        }
    }

    fn equal(&self, a: Index, b: Index) -> Truth {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Truth::from(x == y),
            _ => Truth::Unknown,
        }
    }

    fn decode(&self, token: &str) -> Result<Index, DecodeError> {
        decode_const(token)
    }
}

/// Constants and linear terms over fresh variables.
#[derive(Debug)]
pub struct VarIndexing {
    next: AtomicU32,
}

impl Default for VarIndexing {
    fn default() -> Self {
        Self::new()
    }
}

impl VarIndexing {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Number of variables handed out so far.
    pub fn num_vars(&self) -> u32 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Indexing for VarIndexing {
    fn name(&self) -> &'static str {
        "var"
    }

    fn var(&self) -> Index {
        let var = self.next.fetch_add(1, Ordering::Relaxed);
        Index::linear(var, 1, 0)
    }

    fn plus(&self, a: Index, b: Index) -> Index {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Index::Const(x.wrapping_add(y)),
            (Index::Var { var, scale, offset }, Index::Const(c))
            | (Index::Const(c), Index::Var { var, scale, offset }) => {
                Index::linear(var, scale, offset.wrapping_add(c))
            }
            (
                Index::Var {
                    var: v1,
                    scale: s1,
                    offset: o1,
                },
                Index::Var {
                    var: v2,
                    scale: s2,
                    offset: o2,
                },
            ) if v1 == v2 => Index::linear(v1, s1.wrapping_add(s2), o1.wrapping_add(o2)),
            _ => Index::ANON,
        }
    }

    fn times(&self, a: Index, b: Index) -> Index {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Index::Const(x.wrapping_mul(y)),
            (Index::Const(0), _) | (_, Index::Const(0)) => Index::ZERO,
            (Index::Var { var, scale, offset }, Index::Const(c))
            | (Index::Const(c), Index::Var { var, scale, offset }) => {
                Index::linear(var, scale.wrapping_mul(c), offset.wrapping_mul(c))
            }
            _ => Index::ANON,
        }
    }

    fn less(&self, a: Index, b: Index) -> Truth {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Truth::from(x < y),
            (
                Index::Var {
                    var: v1,
                    scale: s1,
                    offset: o1,
                },
                Index::Var {
                    var: v2,
                    scale: s2,
                    offset: o2,
                },
            ) if v1 != 0 && v1 == v2 && s1 == s2 => Truth::from(o1 < o2),
            _ => Truth::Unknown,
        }
    }

    fn equal(&self, a: Index, b: Index) -> Truth {
        match (a, b) {
            (Index::Const(x), Index::Const(y)) => Truth::from(x == y),
            (
                Index::Var {
                    var: v1,
                    scale: s1,
                    offset: o1,
                },
                Index::Var {
                    var: v2,
                    scale: s2,
                    offset: o2,
                },
            ) if v1 != 0 && v1 == v2 && s1 == s2 => Truth::from(o1 == o2),
            _ => Truth::Unknown,
        }
    }

    fn decode(&self, token: &str) -> Result<Index, DecodeError> {
        let Some(rest) = token.strip_prefix('v') else {
            return decode_const(token);
        };
        let bad = || DecodeError::BadNumber(token.to_string());
        let (var, rest) = rest.split_once('*').ok_or_else(bad)?;
        let (scale, offset) = rest.split_once('+').ok_or_else(bad)?;
        let var: u32 = var.parse().map_err(|_| bad())?;
        let scale: i64 = scale.parse().map_err(|_| bad())?;
        let offset: i64 = offset.parse().map_err(|_| bad())?;
        if var == 0 || scale == 0 {
            return Err(bad());
        }
        // Later fresh variables must not collide with decoded ones.
        self.next.fetch_max(var.checked_add(1).ok_or_else(bad)?, Ordering::Relaxed);
        Ok(Index::linear(var, scale, offset))
    }
}

/// Look up an index algebra by its [`Indexing::name`].
pub fn by_name(name: &str) -> Option<std::sync::Arc<dyn Indexing>> {
    match name {
        "const" => Some(std::sync::Arc::new(ConstIndexing)),
        "var" => Some(std::sync::Arc::new(VarIndexing::new())),
        _ => None,
    }
}
