//! Location handles, classes and attributes.

use std::fmt::{Display, Formatter};

use bitflags::bitflags;

use crate::error::DecodeError;
use crate::plain::{decode_hex32, encode_hex32, Plain};

/// A handle to an abstract memory location (index into the model's arena).
///
/// # Invariants
///
/// - `Loc(0)` is [`Loc::NONE`], never a real location
/// - `Loc(1)` is [`Loc::ZERO`], the nil location, which points nowhere
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Loc(u32);

impl Loc {
    pub const NONE: Loc = Loc(0);
    pub const ZERO: Loc = Loc(1);

    pub const fn new(index: u32) -> Self {
        Loc(index)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 1
    }

    /// Location `n` slots after this one.
    pub fn offset(self, n: u32) -> Loc {
        Loc(self.0.checked_add(n).expect("location index overflow"))
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0 => write!(f, "-"),
            1 => write!(f, "nil"),
            n => write!(f, "@{}", n),
        }
    }
}

impl From<Loc> for usize {
    fn from(loc: Loc) -> Self {
        loc.index()
    }
}

impl Plain for Loc {
    fn plain_encode(&self, out: &mut String) {
        encode_hex32(self.0, out);
    }

    fn plain_decode(token: &str) -> Result<Self, DecodeError> {
        decode_hex32(token).map(Loc)
    }
}

/// Storage class of a location.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Class {
    Zero,
    Global,
    Local,
    Heap,
}

impl Class {
    pub const fn tag(self) -> char {
        match self {
            Class::Zero => 'z',
            Class::Local => 'l',
            Class::Global => 'g',
            Class::Heap => 'h',
        }
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl Plain for Class {
    fn plain_encode(&self, out: &mut String) {
        out.push(self.tag());
    }

    fn plain_decode(token: &str) -> Result<Self, DecodeError> {
        match token {
            "z" => Ok(Class::Zero),
            "l" => Ok(Class::Local),
            "g" => Ok(Class::Global),
            "h" => Ok(Class::Heap),
            _ => Err(DecodeError::UnknownTag(token.to_string())),
        }
    }
}

bitflags! {
    /// Attribute bits of a location.
    #[derive(Default)]
    pub struct Attrs: u8 {
        /// Unknown contents coming from outside the compilation unit.
        const OPAQUE = 1;
        const FUNC = 1 << 1;
        const PARAM = 1 << 2;
        const RETURN = 1 << 3;
    }
}

impl Attrs {
    pub const NONE: Attrs = Attrs::empty();

    /// Plain-format letter of each flag, in encoding order.
    const LETTERS: [(Attrs, char); 4] = [
        (Attrs::OPAQUE, 'o'),
        (Attrs::FUNC, 'f'),
        (Attrs::PARAM, 'p'),
        (Attrs::RETURN, 'r'),
    ];

    pub const fn is_opaque(self) -> bool {
        self.contains(Attrs::OPAQUE)
    }
}

impl Display for Attrs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_plain())
    }
}

impl Plain for Attrs {
    fn plain_encode(&self, out: &mut String) {
        for (bit, c) in Attrs::LETTERS {
            out.push(c);
            out.push(if self.contains(bit) { '+' } else { '-' });
        }
    }

    fn plain_decode(token: &str) -> Result<Self, DecodeError> {
        let bytes = token.as_bytes();
        if bytes.len() != 8 {
            return Err(DecodeError::Invalid(format!("attrs {:?} must be 8 bytes", token)));
        }
        let mut attrs = Attrs::NONE;
        for (i, (bit, c)) in Attrs::LETTERS.into_iter().enumerate() {
            let (name, flag) = (bytes[2 * i] as char, bytes[2 * i + 1] as char);
            if name != c {
                return Err(DecodeError::BadByte {
                    byte: name,
                    token: token.to_string(),
                });
            }
            match flag {
                '+' => attrs |= bit,
                '-' => {}
                _ => {
                    return Err(DecodeError::BadByte {
                        byte: flag,
                        token: token.to_string(),
                    })
                }
            }
        }
        Ok(attrs)
    }
}
