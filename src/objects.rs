//! Typed views over groups of locations.
//!
//! An object bundles the locations that together model one value of the
//! analyzed program, and knows which constraints its operations emit:
//!
//! | Object    | Locations                    | Operations                         |
//! |-----------|------------------------------|------------------------------------|
//! | Array     | root, `n` elements           | `at(i)`                            |
//! | Struct    | root, fields                 | `field(i)`                         |
//! | Tuple     | root, slots                  | `field(i)`                         |
//! | Map       | pointer, key, elem storage   | `update(k, v)`, `lookup(d)`        |
//! | Chan      | pointer, buffer slot         | `send(s)`, `recv(d)`               |
//! | Slice     | pointer, indexed elements    | `slot(i)`, `get`, `set`            |
//! | Interface | pointer, concrete storage    |                                    |
//! | Pointer   | one slot                     |                                    |
//! | Func      | identity, param/result ptrs  | `call(args, d)`                    |

use log::debug;

use crate::error::{DecodeContext, DecodeError};
use crate::indexing::{Index, Indexing};
use crate::loc::{Attrs, Class, Loc};
use crate::model::Model;
use crate::plain::{Plain, Tokens};
use crate::truth::Truth;
use crate::types::Kind;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ArrayObj {
    pub loc: Loc,
    pub elem_size: u32,
    pub n: u32,
}

impl ArrayObj {
    pub fn new(model: &Model, loc: Loc) -> Self {
        let ty = model.ty(loc);
        let types = model.types();
        assert_eq!(types.kind(ty), Kind::Array, "array object over {}", loc);
        Self {
            loc,
            elem_size: types.lsize(types.elem(ty)),
            n: types.array_len(ty) as u32,
        }
    }

    pub fn at(&self, i: u32) -> Loc {
        assert!(i < self.n, "index {} out of range for array of length {}", i, self.n);
        self.loc.offset(1 + i * self.elem_size)
    }
}

/// A struct or a tuple: a root and its fields.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StructObj {
    pub loc: Loc,
    pub fields: Vec<Loc>,
}

impl StructObj {
    pub fn new(model: &Model, loc: Loc) -> Self {
        let n = model.types().num_fields(model.ty(loc));
        Self {
            loc,
            fields: (0..n).map(|i| model.field(loc, i)).collect(),
        }
    }

    pub fn field(&self, i: usize) -> Loc {
        self.fields[i]
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MapObj {
    pub loc: Loc,
    pub key: Loc,
    pub elem: Loc,
}

impl MapObj {
    /// Allocate key and element storage behind the map slot `loc`.
    pub fn new(model: &mut Model, loc: Loc) -> Self {
        let ty = model.ty(loc);
        assert_eq!(model.types().kind(ty), Kind::Map, "map object over {}", loc);
        let (kt, et) = (model.types().key(ty), model.types().elem(ty));
        let attrs = model.attrs(loc);
        let key = model.heap(kt, attrs);
        let elem = model.heap(et, attrs);
        model.gen_points_to(loc, key);
        model.gen_points_to(loc, elem);
        Self { loc, key, elem }
    }

    /// `m[k] = v`.
    pub fn update(&self, model: &mut Model, k: Loc, v: Loc) {
        model.gen_transfer(self.key, k);
        model.gen_transfer(self.elem, v);
    }

    /// `d = m[_]`. Keys are compared by equality, so any element may be read.
    pub fn lookup(&self, model: &mut Model, d: Loc) {
        model.gen_transfer(d, self.elem);
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChanObj {
    pub loc: Loc,
    pub slot: Loc,
}

impl ChanObj {
    pub fn new(model: &mut Model, loc: Loc) -> Self {
        let ty = model.ty(loc);
        assert_eq!(model.types().kind(ty), Kind::Chan, "chan object over {}", loc);
        let et = model.types().elem(ty);
        let slot = model.heap(et, model.attrs(loc));
        model.set_obj(loc, slot);
        model.gen_points_to(loc, slot);
        Self { loc, slot }
    }

    /// `c <- s`.
    pub fn send(&self, model: &mut Model, s: Loc) {
        model.gen_store(self.loc, s);
    }

    /// `d = <-c`.
    pub fn recv(&self, model: &mut Model, d: Loc) {
        model.gen_load(d, self.loc);
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SliceObj {
    pub loc: Loc,
    pub len: Index,
    pub cap: Index,
    pub slots: Vec<(Index, Loc)>,
}

impl SliceObj {
    pub fn new(model: &Model, loc: Loc, len: Index, cap: Index) -> Self {
        assert_eq!(model.types().kind(model.ty(loc)), Kind::Slice, "slice object over {}", loc);
        Self {
            loc,
            len,
            cap,
            slots: Vec::new(),
        }
    }

    /// The element location for index `i`.
    ///
    /// Reuses a slot whose index is provably equal. All anonymous indices
    /// share one slot. A new slot flows both ways with every slot it may alias.
    pub fn slot(&mut self, model: &mut Model, ix: &dyn Indexing, i: Index) -> Loc {
        let mut aliases = Vec::new();
        for &(j, l) in &self.slots {
            if i.is_anon() && j.is_anon() {
                return l;
            }
            match ix.equal(i, j) {
                Truth::True => return l,
                Truth::Unknown => aliases.push(l),
                Truth::False => {}
            }
        }
        let et = model.types().elem(model.ty(self.loc));
        let l = model.heap(et, Attrs::NONE);
        model.gen_points_to(self.loc, l);
        for a in aliases {
            model.gen_transfer(l, a);
            model.gen_transfer(a, l);
        }
        debug!("slice {}: slot {} for index {}", self.loc, l, i);
        self.slots.push((i, l));
        l
    }

    /// `d = s[i]`.
    pub fn get(&mut self, model: &mut Model, ix: &dyn Indexing, i: Index, d: Loc) {
        let l = self.slot(model, ix, i);
        model.gen_transfer(d, l);
    }

    /// `s[i] = v`.
    pub fn set(&mut self, model: &mut Model, ix: &dyn Indexing, i: Index, v: Loc) {
        let l = self.slot(model, ix, i);
        model.gen_transfer(l, v);
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InterfaceObj {
    pub loc: Loc,
    pub concrete: Loc,
}

impl InterfaceObj {
    /// Box a value of the concrete type `ty` behind the interface slot `loc`.
    pub fn new(model: &mut Model, loc: Loc, ty: crate::types::Type) -> Self {
        assert_eq!(model.types().kind(model.ty(loc)), Kind::Interface, "interface object over {}", loc);
        let concrete = model.heap(ty, model.attrs(loc));
        model.set_obj(loc, concrete);
        model.gen_points_to(loc, concrete);
        Self { loc, concrete }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FuncObj {
    pub loc: Loc,
    /// Pointers to the receiver, parameter and result storage.
    pub recv: Option<Loc>,
    pub params: Vec<Loc>,
    pub results: Vec<Loc>,
}

impl FuncObj {
    /// Allocate parameter and result storage for the function at `loc`.
    pub fn new(model: &mut Model, loc: Loc) -> Self {
        let ty = model.ty(loc);
        assert_eq!(model.types().kind(ty), Kind::Func, "func object over {}", loc);
        model.add_attrs(loc, Attrs::FUNC);
        let types = model.types();
        let recv_ty = types.recv(ty);
        let param_tys: Vec<_> = types.params(ty).iter().map(|f| f.ty).collect();
        let result_tys: Vec<_> = types.results(ty).iter().map(|f| f.ty).collect();

        let recv = recv_ty.map(|t| model.gen_with_pointer(t, Class::Local, Attrs::PARAM));
        let params = param_tys
            .into_iter()
            .map(|t| model.gen_with_pointer(t, Class::Local, Attrs::PARAM))
            .collect();
        let results = result_tys
            .into_iter()
            .map(|t| model.gen_with_pointer(t, Class::Local, Attrs::RETURN))
            .collect();
        Self {
            loc,
            recv,
            params,
            results,
        }
    }

    /// Storage of parameter `i`, as seen from the function body.
    pub fn param(&self, model: &Model, i: usize) -> Loc {
        model.obj(self.params[i])
    }

    pub fn receiver(&self, model: &Model) -> Option<Loc> {
        self.recv.map(|p| model.obj(p))
    }

    /// Storage of result `i`, as seen from the function body.
    pub fn result(&self, model: &Model, i: usize) -> Loc {
        model.obj(self.results[i])
    }

    /// Emit the constraints of a call `d = f(args)`.
    ///
    /// `args` holds the receiver first, if the function has one. With
    /// several results `d` must be a tuple location.
    pub fn call(&self, model: &mut Model, args: &[Loc], d: Option<Loc>) {
        let formals: Vec<Loc> = self.recv.iter().chain(&self.params).copied().collect();
        assert_eq!(
            args.len(),
            formals.len(),
            "call of {} with {} arguments, expected {}",
            self.loc,
            args.len(),
            formals.len()
        );
        for (&p, &a) in formals.iter().zip(args) {
            model.gen_store(p, a);
        }
        let Some(d) = d else {
            return;
        };
        match self.results.as_slice() {
            [] => panic!("call of {} has no results to assign to {}", self.loc, d),
            [r] => model.gen_load(d, *r),
            results => {
                for (i, &r) in results.iter().enumerate() {
                    let slot = model.field(d, i);
                    model.gen_load(slot, r);
                }
            }
        }
    }
}

/// Any object, keyed by its location in package results.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Object {
    Array(ArrayObj),
    Struct(StructObj),
    Tuple(StructObj),
    Map(MapObj),
    Chan(ChanObj),
    Slice(SliceObj),
    Interface(InterfaceObj),
    Pointer(Loc),
    Func(FuncObj),
}

impl Object {
    pub fn loc(&self) -> Loc {
        match self {
            Object::Array(o) => o.loc,
            Object::Struct(o) | Object::Tuple(o) => o.loc,
            Object::Map(o) => o.loc,
            Object::Chan(o) => o.loc,
            Object::Slice(o) => o.loc,
            Object::Interface(o) => o.loc,
            Object::Pointer(l) => *l,
            Object::Func(o) => o.loc,
        }
    }

    pub const fn tag(&self) -> char {
        match self {
            Object::Array(_) => 'a',
            Object::Struct(_) => 's',
            Object::Tuple(_) => 't',
            Object::Map(_) => 'm',
            Object::Chan(_) => 'c',
            Object::Slice(_) => 'l',
            Object::Interface(_) => 'i',
            Object::Pointer(_) => 'p',
            Object::Func(_) => 'f',
        }
    }

    pub fn as_func(&self) -> Option<&FuncObj> {
        match self {
            Object::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Rename every location through `f`.
    ///
    /// Returns `None` if the object's own location was dropped. Slice slots
    /// that were dropped disappear; with `anonymize`, slice indices lose
    /// their variable identity.
    pub fn map_locs<F: Fn(Loc) -> Loc>(&self, f: F, anonymize: bool) -> Option<Object> {
        if f(self.loc()).is_none() {
            return None;
        }
        let locs = |v: &[Loc]| v.iter().map(|&l| f(l)).collect::<Vec<_>>();
        let index = |i: Index| if anonymize { i.anonymize() } else { i };
        let o = match self {
            Object::Array(o) => Object::Array(ArrayObj { loc: f(o.loc), ..*o }),
            Object::Struct(o) => Object::Struct(StructObj {
                loc: f(o.loc),
                fields: locs(&o.fields),
            }),
            Object::Tuple(o) => Object::Tuple(StructObj {
                loc: f(o.loc),
                fields: locs(&o.fields),
            }),
            Object::Map(o) => Object::Map(MapObj {
                loc: f(o.loc),
                key: f(o.key),
                elem: f(o.elem),
            }),
            Object::Chan(o) => Object::Chan(ChanObj {
                loc: f(o.loc),
                slot: f(o.slot),
            }),
            Object::Slice(o) => Object::Slice(SliceObj {
                loc: f(o.loc),
                len: index(o.len),
                cap: index(o.cap),
                slots: o
                    .slots
                    .iter()
                    .map(|&(i, l)| (index(i), f(l)))
                    .filter(|(_, l)| !l.is_none())
                    .collect(),
            }),
            Object::Interface(o) => Object::Interface(InterfaceObj {
                loc: f(o.loc),
                concrete: f(o.concrete),
            }),
            Object::Pointer(l) => Object::Pointer(f(*l)),
            Object::Func(o) => Object::Func(FuncObj {
                loc: f(o.loc),
                recv: o.recv.map(&f),
                params: locs(&o.params),
                results: locs(&o.results),
            }),
        };
        Some(o)
    }

    pub fn encode(&self, ix: &dyn Indexing, out: &mut String) {
        out.push(self.tag());
        let put = |l: Loc, out: &mut String| {
            out.push(' ');
            l.plain_encode(out);
        };
        put(self.loc(), out);
        let put_list = |v: &[Loc], out: &mut String| {
            out.push_str(&format!(" {}", v.len()));
            for l in v {
                out.push(' ');
                l.plain_encode(out);
            }
        };
        match self {
            Object::Array(o) => out.push_str(&format!(" {} {}", o.elem_size, o.n)),
            Object::Struct(o) | Object::Tuple(o) => put_list(&o.fields, out),
            Object::Map(o) => {
                put(o.key, out);
                put(o.elem, out);
            }
            Object::Chan(o) => put(o.slot, out),
            Object::Slice(o) => {
                for i in [o.len, o.cap] {
                    out.push(' ');
                    ix.encode(i, out);
                }
                out.push_str(&format!(" {}", o.slots.len()));
                for &(i, l) in &o.slots {
                    out.push(' ');
                    ix.encode(i, out);
                    put(l, out);
                }
            }
            Object::Interface(o) => put(o.concrete, out),
            Object::Pointer(_) => {}
            Object::Func(o) => {
                put(o.recv.unwrap_or(Loc::NONE), out);
                put_list(&o.params, out);
                put_list(&o.results, out);
            }
        }
    }

    pub fn decode(line: &str, ix: &dyn Indexing) -> Result<Object, DecodeError> {
        let mut toks = Tokens::new(line);
        let tag = toks.next("object tag")?;
        let loc: Loc = toks.decode("location")?;
        let o = match tag {
            "a" => {
                let elem_size = decode_u32(&mut toks, "element size")?;
                let n = decode_u32(&mut toks, "length")?;
                Object::Array(ArrayObj { loc, elem_size, n })
            }
            "s" | "t" => {
                let fields = decode_list(&mut toks)?;
                let o = StructObj { loc, fields };
                if tag == "s" {
                    Object::Struct(o)
                } else {
                    Object::Tuple(o)
                }
            }
            "m" => Object::Map(MapObj {
                loc,
                key: toks.decode("key")?,
                elem: toks.decode("elem")?,
            }),
            "c" => Object::Chan(ChanObj {
                loc,
                slot: toks.decode("slot")?,
            }),
            "l" => {
                let len = ix.decode(toks.next("len")?).with_context(|| "len")?;
                let cap = ix.decode(toks.next("cap")?).with_context(|| "cap")?;
                let n = toks.usize("slot count")?;
                let mut slots = Vec::with_capacity(toks.capacity_for(n));
                for _ in 0..n {
                    let i = ix.decode(toks.next("slot index")?).with_context(|| "slot index")?;
                    slots.push((i, toks.decode("slot")?));
                }
                Object::Slice(SliceObj { loc, len, cap, slots })
            }
            "i" => Object::Interface(InterfaceObj {
                loc,
                concrete: toks.decode("concrete")?,
            }),
            "p" => Object::Pointer(loc),
            "f" => {
                let recv: Loc = toks.decode("receiver")?;
                let params = decode_list(&mut toks)?;
                let results = decode_list(&mut toks)?;
                Object::Func(FuncObj {
                    loc,
                    recv: (!recv.is_none()).then_some(recv),
                    params,
                    results,
                })
            }
            _ => return Err(DecodeError::UnknownTag(tag.to_string())),
        };
        toks.finish()?;
        Ok(o)
    }
}

fn decode_u32(toks: &mut Tokens<'_>, what: &'static str) -> Result<u32, DecodeError> {
    let n = toks.usize(what)?;
    u32::try_from(n).map_err(|_| DecodeError::BadNumber(n.to_string()).context(what))
}

fn decode_list(toks: &mut Tokens<'_>) -> Result<Vec<Loc>, DecodeError> {
    let n = toks.usize("list length")?;
    (0..n).map(|_| toks.decode("list item")).collect()
}
