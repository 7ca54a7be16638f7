//! Source positions attached to locations, for diagnostics.

use std::fmt::{Display, Formatter};

use crate::error::{DecodeContext, DecodeError};
use crate::loc::Loc;
use crate::model::ImportMap;
use crate::plain::{Plain, Reader, Tokens};

/// What created a location.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SrcKind {
    TypeVar,
    Func,
    MakeArray,
    MakeSlice,
    MakeChan,
    MakeInterface,
    MakeClosure,
    New,
    AddressOf,
}

impl SrcKind {
    const ALL: [(SrcKind, &'static str); 9] = [
        (SrcKind::TypeVar, "var"),
        (SrcKind::Func, "func"),
        (SrcKind::MakeArray, "array"),
        (SrcKind::MakeSlice, "slice"),
        (SrcKind::MakeChan, "chan"),
        (SrcKind::MakeInterface, "iface"),
        (SrcKind::MakeClosure, "closure"),
        (SrcKind::New, "new"),
        (SrcKind::AddressOf, "addr"),
    ];

    pub fn name(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(k, _)| *k == self)
            .map(|(_, n)| *n)
            .unwrap_or("?")
    }
}

impl Plain for SrcKind {
    fn plain_encode(&self, out: &mut String) {
        out.push_str(self.name());
    }

    fn plain_decode(token: &str) -> Result<Self, DecodeError> {
        Self::ALL
            .iter()
            .find(|(_, n)| *n == token)
            .map(|(k, _)| *k)
            .ok_or_else(|| DecodeError::UnknownTag(token.to_string()))
    }
}

/// An opaque source position, as handed out by the translator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Pos(pub u32);

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SrcInfo {
    pub kind: SrcKind,
    pub pos: Pos,
}

impl Display for SrcInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.kind.name(), self.pos)
    }
}

/// Source info indexed by location.
#[derive(Debug, Clone, Default)]
pub struct SrcInfos {
    infos: Vec<Option<SrcInfo>>,
}

impl SrcInfos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, m: Loc, info: SrcInfo) {
        if self.infos.len() <= m.index() {
            self.infos.resize(m.index() + 1, None);
        }
        self.infos[m.index()] = Some(info);
    }

    pub fn get(&self, m: Loc) -> Option<SrcInfo> {
        self.infos.get(m.index()).copied().flatten()
    }

    /// Number of locations with source info.
    pub fn len(&self) -> usize {
        self.infos.iter().filter(|i| i.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Loc, SrcInfo)> + '_ {
        self.infos
            .iter()
            .enumerate()
            .filter_map(|(i, info)| info.map(|info| (Loc::new(i as u32), info)))
    }

    /// Apply an export permutation, dropping info of removed locations.
    pub fn remap(&mut self, perm: &[Loc]) {
        let old = std::mem::take(&mut self.infos);
        for (i, info) in old.into_iter().enumerate() {
            if let (Some(info), Some(&m)) = (info, perm.get(i)) {
                if !m.is_none() {
                    self.set(m, info);
                }
            }
        }
    }

    pub fn import(&mut self, other: &SrcInfos, map: &ImportMap) {
        for (m, info) in other.iter() {
            self.set(map.loc(m), info);
        }
    }

    pub fn encode(&self, out: &mut String) {
        out.push_str(&format!("{}\n", self.len()));
        for (m, info) in self.iter() {
            m.plain_encode(out);
            out.push(' ');
            info.kind.plain_encode(out);
            out.push_str(&format!(" {}\n", info.pos.0));
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<SrcInfos, DecodeError> {
        let count = r.count("source infos")?;
        let mut infos = SrcInfos::new();
        for i in 0..count {
            let mut decode_one = || -> Result<(), DecodeError> {
                let mut toks = Tokens::new(r.next_line("source info")?);
                let m: Loc = toks.decode("location")?;
                let kind: SrcKind = toks.decode("source kind")?;
                let pos = toks.usize("position")?;
                toks.finish()?;
                let pos = u32::try_from(pos).map_err(|_| DecodeError::BadNumber(pos.to_string()))?;
                infos.set(m, SrcInfo { kind, pos: Pos(pos) });
                Ok(())
            };
            decode_one().with_context(|| format!("source info {}", i))?;
        }
        Ok(infos)
    }
}
