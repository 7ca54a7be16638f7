//! The memory model: a flat arena of abstract locations plus constraints.
//!
//! Every storage object is laid out as a pre-order run of locations: the
//! object's root comes first and its children follow contiguously.
//!
//! ```text
//! struct { f *int; a [2]*int }    @4  root        lsize 5
//!                                 @5  .f          lsize 1
//!                                 @6  .a          lsize 3
//!                                 @7  .a[0]       lsize 1
//!                                 @8  .a[1]       lsize 1
//! ```
//!
//! Locations 0 and 1 are reserved: [`Loc::NONE`] and the nil location
//! [`Loc::ZERO`].
//!
//! Constraints are stored on the location they constrain:
//!
//! | Kind     | Written | Stored on | Meaning                                  |
//! |----------|---------|-----------|------------------------------------------|
//! | PointsTo | `a = &b`    | `a`   | `b ∈ PT(a)`                              |
//! | Load     | `d = *s`    | `d`   | `∀ v ∈ PT(s): PT(v) ⊆ PT(d)`             |
//! | Store    | `*d = s`    | `d`   | `∀ v ∈ PT(d): PT(s) ⊆ PT(v)`             |
//! | Transfer | `d = s + i` | `d`   | `PT(walk(s, i)) ⊆ PT(d)`                 |

use std::fmt::{Display, Formatter};

use log::{debug, info};

use crate::bitset::BitSet;
use crate::error::{DecodeContext, DecodeError};
use crate::indexing::{Index, Indexing};
use crate::loc::{Attrs, Class, Loc};
use crate::plain::{Plain, Reader, Tokens};
use crate::types::{Kind, Type, TypeSet};

/// Per-location record.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LocInfo {
    pub class: Class,
    pub attrs: Attrs,
    /// First location of the enclosing storage object.
    pub root: Loc,
    /// Immediately enclosing location; roots are their own parent.
    pub parent: Loc,
    /// Number of locations in the subtree rooted here.
    pub lsize: u32,
    /// Root of the pointee storage, for pointers whose target is known.
    pub obj: Loc,
    pub ty: Type,
}

impl LocInfo {
    fn reserved(class: Class, loc: Loc) -> Self {
        Self {
            class,
            attrs: Attrs::NONE,
            root: loc,
            parent: loc,
            lsize: 1,
            obj: Loc::NONE,
            ty: Type::NO_TYPE,
        }
    }
}

/// A transfer source with its optional index.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Transfer {
    pub src: Loc,
    pub index: Option<Index>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Edges {
    pub(crate) points_to: Vec<Loc>,
    pub(crate) loads: Vec<Loc>,
    pub(crate) stores: Vec<Loc>,
    pub(crate) transfers: Vec<Transfer>,
}

impl Edges {
    fn len(&self) -> usize {
        self.points_to.len() + self.loads.len() + self.stores.len() + self.transfers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every location this record refers to.
    fn sources(&self) -> impl Iterator<Item = Loc> + '_ {
        self.points_to
            .iter()
            .chain(&self.loads)
            .chain(&self.stores)
            .copied()
            .chain(self.transfers.iter().map(|t| t.src))
    }

    fn map<F: Fn(Loc) -> Loc>(&self, f: F, anonymize: bool) -> Edges {
        Edges {
            points_to: self.points_to.iter().map(|&l| f(l)).collect(),
            loads: self.loads.iter().map(|&l| f(l)).collect(),
            stores: self.stores.iter().map(|&l| f(l)).collect(),
            transfers: self
                .transfers
                .iter()
                .map(|t| Transfer {
                    src: f(t.src),
                    index: if anonymize { t.index.map(Index::anonymize) } else { t.index },
                })
                .collect(),
        }
    }
}

/// A single constraint, as yielded by [`Model::constraints`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Constraint {
    PointsTo { dst: Loc, src: Loc },
    Load { dst: Loc, src: Loc },
    Store { dst: Loc, src: Loc },
    Transfer { dst: Loc, src: Loc, index: Option<Index> },
}

impl Constraint {
    pub const fn tag(&self) -> &'static str {
        match self {
            Constraint::PointsTo { .. } => "ad",
            Constraint::Load { .. } => "ld",
            Constraint::Store { .. } => "st",
            Constraint::Transfer { .. } => "tr",
        }
    }

    pub const fn dst(&self) -> Loc {
        match *self {
            Constraint::PointsTo { dst, .. }
            | Constraint::Load { dst, .. }
            | Constraint::Store { dst, .. }
            | Constraint::Transfer { dst, .. } => dst,
        }
    }

    pub const fn src(&self) -> Loc {
        match *self {
            Constraint::PointsTo { src, .. }
            | Constraint::Load { src, .. }
            | Constraint::Store { src, .. }
            | Constraint::Transfer { src, .. } => src,
        }
    }

    pub fn encode(&self, ix: &dyn Indexing, out: &mut String) {
        out.push_str(self.tag());
        out.push(' ');
        self.dst().plain_encode(out);
        out.push(' ');
        self.src().plain_encode(out);
        if let Constraint::Transfer { index, .. } = self {
            out.push(' ');
            match index {
                Some(i) => ix.encode(*i, out),
                None => out.push('-'),
            }
        }
    }

    pub fn decode(line: &str, ix: &dyn Indexing) -> Result<Constraint, DecodeError> {
        let mut toks = Tokens::new(line);
        let tag = toks.next("constraint kind")?;
        let dst: Loc = toks.decode("dest")?;
        let src: Loc = toks.decode("src")?;
        let c = match tag {
            "ad" => Constraint::PointsTo { dst, src },
            "ld" => Constraint::Load { dst, src },
            "st" => Constraint::Store { dst, src },
            "tr" => {
                let index = match toks.next("index")? {
                    "-" => None,
                    tok => Some(ix.decode(tok).with_context(|| "index")?),
                };
                Constraint::Transfer { dst, src, index }
            }
            _ => return Err(DecodeError::UnknownTag(tag.to_string())),
        };
        toks.finish()?;
        Ok(c)
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Constraint::PointsTo { dst, src } => write!(f, "{} = &{}", dst, src),
            Constraint::Load { dst, src } => write!(f, "{} = *{}", dst, src),
            Constraint::Store { dst, src } => write!(f, "*{} = {}", dst, src),
            Constraint::Transfer { dst, src, index: None } => write!(f, "{} = {}", dst, src),
            Constraint::Transfer {
                dst,
                src,
                index: Some(i),
            } => write!(f, "{} = {}[{}]", dst, src, i),
        }
    }
}

/// Location and type renaming produced by [`Model::import`].
#[derive(Debug, Clone)]
pub struct ImportMap {
    offset: u32,
    types: Vec<Type>,
}

impl ImportMap {
    /// The importer's name for a location of the imported model.
    pub fn loc(&self, l: Loc) -> Loc {
        if l.index() < 2 {
            l
        } else {
            l.offset(self.offset)
        }
    }

    /// The importer's name for a type of the imported model.
    pub fn ty(&self, t: Type) -> Type {
        self.types[t.index()]
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }
}

/// Attributes that keep a local location alive across [`Model::export`].
const EXPORTED_ATTRS: Attrs = Attrs::OPAQUE.union(Attrs::FUNC).union(Attrs::PARAM).union(Attrs::RETURN);

#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) locs: Vec<LocInfo>,
    pub(crate) edges: Vec<Edges>,
    pub(crate) pts: Vec<BitSet>,
    pub(crate) types: TypeSet,
    pub(crate) solved: bool,
}

impl Default for Model {
    fn default() -> Self {
        Model::new(TypeSet::default())
    }
}

impl Model {
    pub fn new(types: TypeSet) -> Self {
        Self::with_capacity(types, 0)
    }

    pub fn with_capacity(types: TypeSet, capacity: usize) -> Self {
        let capacity = capacity.max(2);
        let mut locs = Vec::with_capacity(capacity);
        locs.push(LocInfo::reserved(Class::Zero, Loc::NONE));
        locs.push(LocInfo::reserved(Class::Zero, Loc::ZERO));
        let mut edges = Vec::with_capacity(capacity);
        edges.resize_with(2, Edges::default);
        let mut pts = Vec::with_capacity(capacity);
        pts.resize_with(2, BitSet::new);
        Self {
            locs,
            edges,
            pts,
            types,
            solved: true,
        }
    }

    /// Number of locations, the two reserved ones included.
    pub fn len(&self) -> usize {
        self.locs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locs.len() <= 2
    }

    pub fn types(&self) -> &TypeSet {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeSet {
        &mut self.types
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Iterate over all non-reserved locations.
    pub fn locs(&self) -> impl Iterator<Item = Loc> {
        (2..self.len() as u32).map(Loc::new)
    }

    // ------------------------------------------------------------------
    // Structured allocation
    // ------------------------------------------------------------------

    /// Allocate a storage object of type `ty` and return its root.
    pub fn add(&mut self, ty: Type, class: Class, attrs: Attrs) -> Loc {
        assert_ne!(class, Class::Zero, "Only the nil location has class Zero");
        let root = Loc::new(u32::try_from(self.len()).expect("location arena is full"));
        let mut sum = 0;
        let m = self.add_rec(ty, class, attrs, root, root, &mut sum);
        debug_assert_eq!(sum, self.types.lsize(ty));
        debug!(
            "add: {} {} {} {} lsize={}",
            m,
            class,
            attrs,
            self.types.type_string(ty),
            sum
        );
        m
    }

    fn add_rec(&mut self, ty: Type, class: Class, attrs: Attrs, parent: Loc, root: Loc, sum: &mut u32) -> Loc {
        let m = self.push(LocInfo {
            class,
            attrs,
            root,
            parent,
            lsize: 0,
            obj: Loc::NONE,
            ty,
        });
        let entry = *sum;
        *sum += 1;
        match self.types.kind(ty) {
            Kind::Array => {
                let elem = self.types.elem(ty);
                for _ in 0..self.types.array_len(ty) {
                    self.add_rec(elem, class, attrs, m, root, sum);
                }
            }
            Kind::Struct | Kind::Tuple => {
                for i in 0..self.types.num_fields(ty) {
                    let fty = self.types.field(ty, i).ty;
                    self.add_rec(fty, class, attrs, m, root, sum);
                }
            }
            _ => {}
        }
        self.locs[m.index()].lsize = *sum - entry;
        m
    }

    fn push(&mut self, info: LocInfo) -> Loc {
        let m = u32::try_from(self.len())
            .ok()
            .filter(|&n| n < u32::MAX)
            .expect("location arena is full");
        self.locs.push(info);
        self.edges.push(Edges::default());
        self.pts.push(BitSet::new());
        Loc::new(m)
    }

    pub fn local(&mut self, ty: Type, attrs: Attrs) -> Loc {
        self.add(ty, Class::Local, attrs)
    }

    pub fn global(&mut self, ty: Type, attrs: Attrs) -> Loc {
        self.add(ty, Class::Global, attrs)
    }

    pub fn heap(&mut self, ty: Type, attrs: Attrs) -> Loc {
        self.add(ty, Class::Heap, attrs)
    }

    /// Allocate storage of type `ty` and a pointer to it; returns the pointer.
    pub fn gen_with_pointer(&mut self, ty: Type, class: Class, attrs: Attrs) -> Loc {
        let storage = self.add(ty, class, attrs);
        let ptr_ty = self.types.pointer_to(ty);
        let ptr = self.add(ptr_ty, class, attrs);
        self.set_obj(ptr, storage);
        self.gen_points_to(ptr, storage);
        ptr
    }

    /// The `i`-th field of a struct or tuple location.
    pub fn field(&self, m: Loc, i: usize) -> Loc {
        let ty = self.ty(m);
        let kind = self.types.kind(ty);
        assert!(
            matches!(kind, Kind::Struct | Kind::Tuple),
            "field {} of {} which has {:?} type",
            i,
            m,
            kind
        );
        m.offset(self.types.field(ty, i).offset)
    }

    /// The `i`-th element of an array location.
    pub fn array_index(&self, m: Loc, i: usize) -> Loc {
        let ty = self.ty(m);
        assert_eq!(self.types.kind(ty), Kind::Array, "array_index of non-array {}", m);
        let len = self.types.array_len(ty);
        assert!(i < len, "index {} out of range for {} of length {}", i, m, len);
        let stride = self.types.lsize(self.types.elem(ty));
        m.offset(1 + i as u32 * stride)
    }

    /// Direct children of `m`, in order.
    pub fn children(&self, m: Loc) -> impl Iterator<Item = Loc> + '_ {
        let end = m.index() + self.lsize(m) as usize;
        let mut cur = m.index() + 1;
        std::iter::from_fn(move || {
            if cur < end {
                let c = cur;
                cur += self.locs[c].lsize.max(1) as usize;
                Some(Loc::new(c as u32))
            } else {
                None
            }
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn loc_info(&self, m: Loc) -> &LocInfo {
        assert!(m.index() < self.len(), "Unknown location {}", m);
        &self.locs[m.index()]
    }

    pub fn class(&self, m: Loc) -> Class {
        self.loc_info(m).class
    }

    pub fn attrs(&self, m: Loc) -> Attrs {
        self.loc_info(m).attrs
    }

    pub fn add_attrs(&mut self, m: Loc, attrs: Attrs) {
        self.check_loc(m);
        self.locs[m.index()].attrs |= attrs;
    }

    pub fn set_attrs(&mut self, m: Loc, attrs: Attrs) {
        self.check_loc(m);
        self.locs[m.index()].attrs = attrs;
    }

    pub fn parent(&self, m: Loc) -> Loc {
        self.loc_info(m).parent
    }

    pub fn root(&self, m: Loc) -> Loc {
        self.loc_info(m).root
    }

    pub fn lsize(&self, m: Loc) -> u32 {
        self.loc_info(m).lsize
    }

    pub fn obj(&self, m: Loc) -> Loc {
        self.loc_info(m).obj
    }

    pub fn ty(&self, m: Loc) -> Type {
        self.loc_info(m).ty
    }

    pub fn set_obj(&mut self, p: Loc, obj: Loc) {
        self.check_loc(p);
        assert!(
            obj.is_none() || self.root(obj) == obj,
            "pointee {} of {} is not a root",
            obj,
            p
        );
        self.locs[p.index()].obj = obj;
    }

    fn check_loc(&self, m: Loc) {
        assert!(!m.is_none(), "NONE used as a location");
        assert!(m.index() < self.len(), "Unknown location {}", m);
    }

    // ------------------------------------------------------------------
    // Constraint generation
    // ------------------------------------------------------------------

    /// `a = &b`.
    pub fn gen_points_to(&mut self, a: Loc, b: Loc) {
        self.check_loc(a);
        self.check_loc(b);
        assert!(!a.is_zero(), "the nil location cannot point to {}", b);
        debug!("gen: {} = &{}", a, b);
        self.edges[a.index()].points_to.push(b);
        self.solved = false;
    }

    /// `dst = *src`.
    pub fn gen_load(&mut self, dst: Loc, src: Loc) {
        self.check_loc(dst);
        self.check_loc(src);
        assert!(!dst.is_zero(), "load into the nil location");
        debug!("gen: {} = *{}", dst, src);
        self.edges[dst.index()].loads.push(src);
        self.solved = false;
    }

    /// `*dst = src`.
    pub fn gen_store(&mut self, dst: Loc, src: Loc) {
        self.check_loc(dst);
        self.check_loc(src);
        debug!("gen: *{} = {}", dst, src);
        self.edges[dst.index()].stores.push(src);
        self.solved = false;
    }

    /// `dst = src`.
    pub fn gen_transfer(&mut self, dst: Loc, src: Loc) {
        self.push_transfer(dst, src, None);
    }

    /// `dst = src[index]`: a field, array element, or slice element of `src`.
    pub fn gen_transfer_index(&mut self, dst: Loc, src: Loc, index: Index) {
        self.push_transfer(dst, src, Some(index));
    }

    fn push_transfer(&mut self, dst: Loc, src: Loc, index: Option<Index>) {
        self.check_loc(dst);
        self.check_loc(src);
        assert!(!dst.is_zero(), "transfer into the nil location");
        let c = Constraint::Transfer { dst, src, index };
        debug!("gen: {}", c);
        self.edges[dst.index()].transfers.push(Transfer { src, index });
        self.solved = false;
    }

    pub fn points_to_edges(&self, m: Loc) -> &[Loc] {
        &self.edges[m.index()].points_to
    }

    pub fn loads(&self, m: Loc) -> &[Loc] {
        &self.edges[m.index()].loads
    }

    pub fn stores(&self, m: Loc) -> &[Loc] {
        &self.edges[m.index()].stores
    }

    pub fn transfers(&self, m: Loc) -> &[Transfer] {
        &self.edges[m.index()].transfers
    }

    /// All constraints in location order; within a location: points-to,
    /// loads, stores, transfers, each in insertion order.
    pub fn constraints(&self) -> impl Iterator<Item = Constraint> + '_ {
        self.edges.iter().enumerate().flat_map(|(i, e)| {
            let dst = Loc::new(i as u32);
            e.points_to
                .iter()
                .map(move |&src| Constraint::PointsTo { dst, src })
                .chain(e.loads.iter().map(move |&src| Constraint::Load { dst, src }))
                .chain(e.stores.iter().map(move |&src| Constraint::Store { dst, src }))
                .chain(e.transfers.iter().map(move |t| Constraint::Transfer {
                    dst,
                    src: t.src,
                    index: t.index,
                }))
        })
    }

    pub fn num_constraints(&self) -> usize {
        self.edges.iter().map(Edges::len).sum()
    }

    fn add_constraint(&mut self, c: Constraint) {
        let e = &mut self.edges[c.dst().index()];
        match c {
            Constraint::PointsTo { src, .. } => e.points_to.push(src),
            Constraint::Load { src, .. } => e.loads.push(src),
            Constraint::Store { src, .. } => e.stores.push(src),
            Constraint::Transfer { src, index, .. } => e.transfers.push(Transfer { src, index }),
        }
    }

    // ------------------------------------------------------------------
    // Points-to queries
    // ------------------------------------------------------------------

    /// Append the points-to set of `p` to `out`, in ascending order.
    pub fn points_to_for(&self, out: &mut Vec<Loc>, p: Loc) {
        out.extend(self.points_to(p));
    }

    /// The points-to set of `p`. Meaningful once the model is solved.
    pub fn points_to(&self, p: Loc) -> impl Iterator<Item = Loc> + '_ {
        self.pts[p.index()].iter().map(|i| Loc::new(i as u32))
    }

    pub fn points_to_len(&self, p: Loc) -> usize {
        self.pts[p.index()].len()
    }

    /// True if `a` and `b` may point to a common location.
    pub fn may_alias(&self, a: Loc, b: Loc) -> bool {
        self.pts[a.index()].intersects(&self.pts[b.index()])
    }

    // ------------------------------------------------------------------
    // Structural checks
    // ------------------------------------------------------------------

    /// Assert every structural invariant of the arena.
    ///
    /// # Panics
    ///
    /// Panics with the violated rule on the first inconsistency found.
    pub fn check(&self) {
        let n = self.len();
        assert!(n >= 2, "model lacks the reserved locations");
        let zero = &self.locs[1];
        assert_eq!(zero.class, Class::Zero, "nil location has class {:?}", zero.class);
        assert_eq!(zero.lsize, 1, "nil location has children");
        assert!(self.edges[1].points_to.is_empty(), "nil location points to something");

        for i in 2..n {
            let m = Loc::new(i as u32);
            let info = &self.locs[i];
            assert_ne!(info.class, Class::Zero, "{} has class Zero", m);
            assert!(info.parent <= m, "{}: parent {} comes after it", m, info.parent);
            assert!(info.root <= info.parent, "{}: root {} after parent {}", m, info.root, info.parent);
            assert!(
                i + info.lsize as usize <= n,
                "{}: subtree of size {} runs off the arena",
                m,
                info.lsize
            );
            if info.parent == m {
                assert_eq!(info.root, m, "{}: root location has root {}", m, info.root);
            } else {
                assert!(info.parent.index() >= 2, "{}: parent is reserved", m);
                let p = &self.locs[info.parent.index()];
                assert_eq!(info.root, p.root, "{}: root differs from parent's root", m);
                assert!(
                    i + info.lsize as usize <= info.parent.index() + p.lsize as usize,
                    "{}: extends past its parent {}",
                    m,
                    info.parent
                );
            }

            let mut kids = 0;
            for c in self.children(m) {
                assert_eq!(self.locs[c.index()].parent, m, "{}: child {} has another parent", m, c);
                kids += self.locs[c.index()].lsize;
            }
            assert_eq!(info.lsize, 1 + kids, "{}: lsize is not 1 + children", m);
            assert_eq!(
                info.lsize,
                self.types.lsize(info.ty),
                "{}: lsize disagrees with type {}",
                m,
                self.types.type_string(info.ty)
            );

            if !info.obj.is_none() {
                assert!(info.obj.index() < n, "{}: unknown pointee {}", m, info.obj);
                assert_eq!(self.locs[info.obj.index()].root, info.obj, "{}: pointee {} is not a root", m, info.obj);
            }
        }

        for c in self.constraints() {
            assert!(
                c.src().index() < n && !c.src().is_none(),
                "constraint {} refers to an unknown location",
                c
            );
        }
    }

    // ------------------------------------------------------------------
    // Export and import
    // ------------------------------------------------------------------

    /// Drop local storage nothing exported can reach, renumbering the rest.
    ///
    /// A root survives if it is not `Local`, carries an attribute in
    /// [`EXPORTED_ATTRS`], or is reachable from a survivor through its
    /// points-to set, its `obj` link, or a constraint source. Survivors keep
    /// their relative order. The solved points-to sets are baked in as
    /// points-to constraints so a re-solve reproduces them.
    ///
    /// Returns the permutation: old index to new location, or [`Loc::NONE`]
    /// for dropped locations.
    pub fn export(&mut self) -> Vec<Loc> {
        if !self.solved {
            self.solve();
        }
        let n = self.len();

        let mut keep = BitSet::with_capacity(n);
        keep.insert(Loc::NONE.index());
        keep.insert(Loc::ZERO.index());
        let mut stack: Vec<Loc> = self
            .locs()
            .filter(|&m| {
                let info = &self.locs[m.index()];
                info.class != Class::Local || info.attrs.intersects(EXPORTED_ATTRS)
            })
            .map(|m| self.locs[m.index()].root)
            .collect();
        while let Some(r) = stack.pop() {
            if keep.contains(r.index()) {
                continue;
            }
            let end = r.index() + self.locs[r.index()].lsize as usize;
            keep.extend(r.index()..end);
            for i in r.index()..end {
                let targets = self.pts[i]
                    .iter()
                    .map(|v| Loc::new(v as u32))
                    .chain(std::iter::once(self.locs[i].obj))
                    .chain(self.edges[i].sources());
                for v in targets.filter(|v| !v.is_none()) {
                    let root = self.locs[v.index()].root;
                    if !keep.contains(root.index()) {
                        stack.push(root);
                    }
                }
            }
        }

        let mut perm = vec![Loc::NONE; n];
        let mut next = 0u32;
        for i in keep.iter() {
            perm[i] = Loc::new(next);
            next += 1;
        }
        let map = |l: Loc| perm[l.index()];

        let mut locs = Vec::with_capacity(keep.len());
        let mut edges = Vec::with_capacity(keep.len());
        let mut pts = Vec::with_capacity(keep.len());
        let mut baked = 0;
        for i in keep.iter() {
            let info = &self.locs[i];
            locs.push(LocInfo {
                root: map(info.root),
                parent: map(info.parent),
                obj: map(info.obj),
                ..*info
            });
            let mut e = self.edges[i].map(map, false);
            let pt: BitSet = self.pts[i].iter().map(|v| perm[v].index()).collect();
            let mut facts: BitSet = e.points_to.iter().map(|l| l.index()).collect();
            for v in pt.iter() {
                if facts.insert(v) {
                    e.points_to.push(Loc::new(v as u32));
                    baked += 1;
                }
            }
            edges.push(e);
            pts.push(pt);
        }
        info!("export: kept {} of {} locations, baked {} points-to facts", locs.len(), n, baked);

        self.locs = locs;
        self.edges = edges;
        self.pts = pts;
        perm
    }

    /// Append the locations of `other` after the current ones.
    ///
    /// Types are re-interned, transfer indices lose their variable
    /// identity, and solved points-to sets are carried over.
    pub fn import(&mut self, other: &Model) -> ImportMap {
        let offset = u32::try_from(self.len() - 2).expect("location arena is full");
        let types = self.types.import(&other.types);
        let map = ImportMap { offset, types };
        assert!(
            (self.len() + other.len()) < u32::MAX as usize,
            "location arena is full"
        );
        for i in 2..other.len() {
            let info = &other.locs[i];
            self.locs.push(LocInfo {
                root: map.loc(info.root),
                parent: map.loc(info.parent),
                obj: map.loc(info.obj),
                ty: map.ty(info.ty),
                ..*info
            });
            self.edges.push(other.edges[i].map(|l| map.loc(l), true));
            let pt = if other.solved {
                other.pts[i].iter().map(|v| map.loc(Loc::new(v as u32)).index()).collect()
            } else {
                BitSet::new()
            };
            self.pts.push(pt);
        }
        self.solved = false;
        debug!("import: {} locations at offset {}", other.len() - 2, offset);
        map
    }

    // ------------------------------------------------------------------
    // Plain encoding
    // ------------------------------------------------------------------

    /// Encode location lines, constraints and the type set.
    ///
    /// Roots and subtree sizes are not written; the decoder recomputes them
    /// from parent links.
    pub fn encode(&self, ix: &dyn Indexing, out: &mut String) {
        for info in &self.locs {
            info.class.plain_encode(out);
            out.push(' ');
            info.attrs.plain_encode(out);
            out.push(' ');
            info.parent.plain_encode(out);
            out.push(' ');
            info.obj.plain_encode(out);
            out.push(' ');
            info.ty.plain_encode(out);
            out.push('\n');
        }
        out.push_str(&format!("{}\n", self.num_constraints()));
        for c in self.constraints() {
            c.encode(ix, out);
            out.push('\n');
        }
        self.types.encode(out);
    }

    /// Decode a model of `n_locs` locations. The result is unsolved.
    pub fn decode(r: &mut Reader<'_>, n_locs: usize, ix: &dyn Indexing) -> Result<Model, DecodeError> {
        if n_locs < 2 {
            return Err(DecodeError::Invalid(format!("{} locations is below the reserved two", n_locs)));
        }
        let mut locs: Vec<LocInfo> = Vec::with_capacity(r.capacity_for(n_locs));
        for i in 0..n_locs {
            let info = decode_loc(r, &locs, i).with_context(|| format!("location {}", i))?;
            locs.push(info);
        }
        for i in (2..n_locs).rev() {
            let p = locs[i].parent.index();
            if p != i {
                locs[p].lsize += locs[i].lsize;
            }
        }

        let mut model = Model {
            edges: vec![Edges::default(); n_locs],
            pts: vec![BitSet::new(); n_locs],
            locs,
            types: TypeSet::default(),
            solved: false,
        };

        let count = r.count("constraints")?;
        for i in 0..count {
            let line = r.next_line("constraint").with_context(|| format!("constraint {}", i))?;
            let c = Constraint::decode(line, ix).with_context(|| format!("constraint {}", i))?;
            for l in [c.dst(), c.src()] {
                if l.is_none() || l.index() >= n_locs {
                    return Err(DecodeError::Invalid(format!("constraint {} refers to unknown {}", i, l)));
                }
            }
            model.add_constraint(c);
        }

        model.types = TypeSet::decode(r)?;
        for (i, info) in model.locs.iter().enumerate() {
            if info.ty.index() >= model.types.len() {
                return Err(DecodeError::Invalid(format!("location {} has unknown type {}", i, info.ty.raw())));
            }
            if info.obj.index() >= n_locs {
                return Err(DecodeError::Invalid(format!("location {} has unknown pointee {}", i, info.obj)));
            }
        }
        Ok(model)
    }
}

fn decode_loc(r: &mut Reader<'_>, prev: &[LocInfo], i: usize) -> Result<LocInfo, DecodeError> {
    let mut toks = Tokens::new(r.next_line("location")?);
    let class: Class = toks.decode("class")?;
    let attrs: Attrs = toks.decode("attrs")?;
    let parent: Loc = toks.decode("parent")?;
    let obj: Loc = toks.decode("obj")?;
    let ty: Type = toks.decode("type")?;
    toks.finish()?;
    let root = match parent.index() {
        p if p == i => parent,
        p if p < i => prev[p].root,
        _ => return Err(DecodeError::Invalid(format!("parent {} comes after its child", parent))),
    };
    Ok(LocInfo {
        class,
        attrs,
        root,
        parent,
        lsize: 1,
        obj,
        ty,
    })
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::indexing::{ConstIndexing, VarIndexing};
    use crate::types::SourceType;

    fn ptr_int(m: &mut Model) -> Type {
        m.types_mut().pointer_to(Type::INT)
    }

    #[test]
    fn test_reserved() {
        let m = Model::default();
        assert_eq!(m.len(), 2);
        assert!(m.is_empty());
        assert_eq!(m.class(Loc::ZERO), Class::Zero);
        m.check();
    }

    #[test]
    fn test_struct_layout() {
        let mut m = Model::default();
        let p = ptr_int(&mut m);
        let arr = m.types_mut().array_of(p, 2);
        let s = m.types_mut().struct_of(vec![("f".into(), p), ("a".into(), arr)]);
        let x = m.local(s, Attrs::NONE);
        assert_eq!(x, Loc::new(2));
        assert_eq!(m.lsize(x), 5);
        assert_eq!(m.field(x, 0), Loc::new(3));
        assert_eq!(m.field(x, 1), Loc::new(4));
        let a = m.field(x, 1);
        assert_eq!(m.array_index(a, 0), Loc::new(5));
        assert_eq!(m.array_index(a, 1), Loc::new(6));
        assert_eq!(m.root(Loc::new(6)), x);
        assert_eq!(m.parent(Loc::new(6)), a);
        assert_eq!(m.children(x).collect::<Vec<_>>(), vec![Loc::new(3), Loc::new(4)]);
        assert_eq!(m.ty(a), arr);
        m.check();
    }

    #[test]
    fn test_array_of_structs() {
        let mut m = Model::default();
        let p = ptr_int(&mut m);
        let s = m.types_mut().struct_of(vec![("f".into(), p), ("g".into(), p)]);
        let arr = m.types_mut().array_of(s, 3);
        let a = m.heap(arr, Attrs::NONE);
        assert_eq!(m.lsize(a), 1 + 3 * 3);
        let e2 = m.array_index(a, 2);
        assert_eq!(e2, a.offset(7));
        assert_eq!(m.field(e2, 1), a.offset(9));
        assert_eq!(m.class(m.field(e2, 1)), Class::Heap);
        m.check();
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_array_index_out_of_range() {
        let mut m = Model::default();
        let arr = m.types_mut().array_of(Type::INT, 2);
        let a = m.local(arr, Attrs::NONE);
        m.array_index(a, 2);
    }

    #[test]
    #[should_panic(expected = "has Pointer type")]
    fn test_field_of_pointer() {
        let mut m = Model::default();
        let p = ptr_int(&mut m);
        let x = m.local(p, Attrs::NONE);
        m.field(x, 0);
    }

    #[test]
    fn test_gen_with_pointer() {
        let mut m = Model::default();
        let p = ptr_int(&mut m);
        let ptr = m.gen_with_pointer(p, Class::Global, Attrs::NONE);
        let storage = m.obj(ptr);
        assert_eq!(m.root(storage), storage);
        assert_eq!(m.points_to_edges(ptr), &[storage]);
        assert_eq!(m.types().elem(m.ty(ptr)), p);
        assert_eq!(m.class(ptr), Class::Global);
        m.check();
    }

    #[test]
    fn test_attrs() {
        let mut m = Model::default();
        let x = m.local(Type::INT, Attrs::PARAM);
        m.add_attrs(x, Attrs::OPAQUE);
        assert_eq!(m.attrs(x), Attrs::PARAM | Attrs::OPAQUE);
        m.set_attrs(x, Attrs::RETURN);
        assert_eq!(m.attrs(x), Attrs::RETURN);
    }

    #[test]
    fn test_constraint_lists() {
        let mut m = Model::default();
        let p = ptr_int(&mut m);
        let a = m.local(p, Attrs::NONE);
        let b = m.local(p, Attrs::NONE);
        m.gen_points_to(a, b);
        m.gen_load(b, a);
        m.gen_store(a, b);
        m.gen_transfer(b, a);
        m.gen_transfer_index(b, a, Index::ZERO);
        assert_eq!(m.num_constraints(), 5);
        let all: Vec<_> = m.constraints().collect();
        assert_eq!(all[0], Constraint::PointsTo { dst: a, src: b });
        assert_eq!(all[1], Constraint::Store { dst: a, src: b });
        assert_eq!(all[2], Constraint::Load { dst: b, src: a });
        assert_eq!(all[4].to_string(), "@3 = @2[0]");
        assert!(!m.is_solved());
    }

    #[test]
    #[should_panic(expected = "nil location cannot point")]
    fn test_zero_cannot_point() {
        let mut m = Model::default();
        let x = m.local(Type::INT, Attrs::NONE);
        m.gen_points_to(Loc::ZERO, x);
    }

    #[test]
    #[should_panic(expected = "runs off the arena")]
    fn test_check_detects_bad_lsize() {
        let mut m = Model::default();
        let s = m.types_mut().struct_of(vec![("f".into(), Type::INT)]);
        let x = m.local(s, Attrs::NONE);
        m.locs[x.index()].lsize = 3;
        m.check();
    }

    #[test]
    fn test_constraint_plain() {
        let ix = VarIndexing::new();
        let v = ix.var();
        let cs = [
            Constraint::PointsTo {
                dst: Loc::new(2),
                src: Loc::new(3),
            },
            Constraint::Transfer {
                dst: Loc::new(4),
                src: Loc::new(2),
                index: None,
            },
            Constraint::Transfer {
                dst: Loc::new(4),
                src: Loc::new(2),
                index: Some(v),
            },
        ];
        let mut s = String::new();
        cs[1].encode(&ix, &mut s);
        assert_eq!(s, "tr 00000004 00000002 -");
        for c in cs {
            let mut s = String::new();
            c.encode(&ix, &mut s);
            assert_eq!(Constraint::decode(&s, &ix), Ok(c));
        }
        assert!(matches!(
            Constraint::decode("xx 00000001 00000002", &ix),
            Err(DecodeError::UnknownTag(_))
        ));
        assert!(Constraint::decode("ld 00000001", &ix).is_err());
    }

    #[test]
    fn test_encode_decode() {
        let ix = ConstIndexing;
        let mut m = Model::default();
        let st = SourceType::structure([
            ("next", SourceType::pointer(SourceType::Basic(crate::types::BasicKind::Int))),
            ("tag", SourceType::Basic(crate::types::BasicKind::String)),
        ]);
        let s = m.types_mut().from_source_type(&st);
        let x = m.gen_with_pointer(s, Class::Heap, Attrs::OPAQUE);
        let y = m.local(s, Attrs::NONE);
        m.gen_transfer_index(y, m.obj(x), Index::ONE);
        m.gen_store(x, m.field(y, 0));

        let mut out = String::new();
        m.encode(&ix, &mut out);
        let decoded = Model::decode(&mut Reader::new(&out), m.len(), &ix).unwrap();
        decoded.check();
        assert_eq!(decoded.locs, m.locs);
        let mut again = String::new();
        decoded.encode(&ix, &mut again);
        assert_eq!(out, again);
    }

    #[test]
    fn test_decode_rejects_forward_parent() {
        let ix = ConstIndexing;
        let text = "z o-f-p-r- 00000000 00000000 00000000\n\
                    z o-f-p-r- 00000001 00000000 00000000\n\
                    l o-f-p-r- 00000003 00000000 00000002\n";
        let err = Model::decode(&mut Reader::new(text), 3, &ix).unwrap_err();
        assert!(err.to_string().starts_with("location 2: "), "{}", err);
    }

    #[test]
    fn test_import_offsets() {
        let mut a = Model::default();
        let p = ptr_int(&mut a);
        let x = a.global(p, Attrs::NONE);
        let y = a.global(p, Attrs::NONE);
        a.gen_points_to(x, y);
        a.gen_transfer_index(y, x, VarIndexing::new().var());

        let mut b = Model::default();
        b.local(Type::INT, Attrs::NONE);
        let map = b.import(&a);
        assert_eq!(map.offset(), 1);
        assert_eq!(map.loc(Loc::ZERO), Loc::ZERO);
        let (x2, y2) = (map.loc(x), map.loc(y));
        assert_eq!(x2, Loc::new(3));
        assert_eq!(b.points_to_edges(x2), &[y2]);
        assert_eq!(b.transfers(y2)[0].index, Some(Index::ANON));
        assert_eq!(b.types().elem(b.ty(x2)), Type::INT);
        assert!(!b.is_solved());
        b.check();
    }
}
