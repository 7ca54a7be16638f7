//! Translator-facing facade over a package's model.
//!
//! A [`Builder`] carries the allocation settings (class, attributes, type,
//! source position and kind) between calls, so a translator configures once
//! and then generates locations and objects:
//!
//! ```
//! use std::sync::Arc;
//! use pal_rs::builder::Builder;
//! use pal_rs::indexing::ConstIndexing;
//! use pal_rs::loc::Class;
//! use pal_rs::results::PkgRes;
//! use pal_rs::types::Type;
//!
//! let mut res = PkgRes::new("main", Arc::new(ConstIndexing));
//! let mut b = Builder::new(&mut res);
//! let int_ptr = b.types_mut().pointer_to(Type::INT);
//! let a = b.class(Class::Local).ty(Type::INT).gen_loc();
//! let x = b.ty(int_ptr).gen_loc();
//! b.gen_points_to(x, a);
//! b.model_mut().solve();
//! assert_eq!(b.model().points_to(x).collect::<Vec<_>>(), vec![a]);
//! ```

use log::debug;

use crate::indexing::{Index, Indexing};
use crate::loc::{Attrs, Class, Loc};
use crate::model::Model;
use crate::objects::{ArrayObj, ChanObj, FuncObj, InterfaceObj, MapObj, Object, SliceObj, StructObj};
use crate::results::PkgRes;
use crate::srcinfo::{Pos, SrcInfo, SrcKind};
use crate::types::{Kind, SourceType, Type, TypeSet};

pub struct Builder<'a> {
    res: &'a mut PkgRes,
    class: Class,
    attrs: Attrs,
    ty: Type,
    pos: Pos,
    src_kind: Option<SrcKind>,
}

impl<'a> Builder<'a> {
    pub fn new(res: &'a mut PkgRes) -> Self {
        Self {
            res,
            class: Class::Local,
            attrs: Attrs::NONE,
            ty: Type::NO_TYPE,
            pos: Pos::default(),
            src_kind: None,
        }
    }

    pub fn class(&mut self, class: Class) -> &mut Self {
        self.class = class;
        self
    }

    pub fn attrs(&mut self, attrs: Attrs) -> &mut Self {
        self.attrs = attrs;
        self
    }

    pub fn ty(&mut self, ty: Type) -> &mut Self {
        self.ty = ty;
        self
    }

    /// Intern `t` and use it for the next allocations.
    pub fn source_type(&mut self, t: &SourceType) -> &mut Self {
        self.ty = self.types_mut().from_source_type(t);
        self
    }

    pub fn pos(&mut self, pos: Pos) -> &mut Self {
        self.pos = pos;
        self
    }

    /// Record source info for the next allocations; `None` stops recording.
    pub fn src_kind(&mut self, kind: Option<SrcKind>) -> &mut Self {
        self.src_kind = kind;
        self
    }

    pub fn res(&self) -> &PkgRes {
        &*self.res
    }

    pub fn model(&self) -> &Model {
        self.res.model()
    }

    pub fn model_mut(&mut self) -> &mut Model {
        self.res.model_mut()
    }

    pub fn types(&self) -> &TypeSet {
        self.res.types()
    }

    pub fn types_mut(&mut self) -> &mut TypeSet {
        self.res.model_mut().types_mut()
    }

    pub fn indexing(&self) -> &dyn Indexing {
        self.res.indexing()
    }

    fn record(&mut self, m: Loc) {
        if let Some(kind) = self.src_kind {
            self.res.set_src_info(m, SrcInfo { kind, pos: self.pos });
        }
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Allocate storage with the current settings.
    pub fn gen_loc(&mut self) -> Loc {
        let (ty, class, attrs) = (self.ty, self.class, self.attrs);
        let m = self.model_mut().add(ty, class, attrs);
        self.record(m);
        m
    }

    /// Allocate storage with the current settings plus a pointer to it.
    pub fn gen_with_pointer(&mut self) -> Loc {
        let (ty, class, attrs) = (self.ty, self.class, self.attrs);
        let p = self.model_mut().gen_with_pointer(ty, class, attrs);
        let storage = self.model().obj(p);
        self.record(storage);
        p
    }

    /// An opaque heap object of type `ty` that points to itself.
    ///
    /// Stands in for values the package cannot see into: foreign pointers,
    /// reflection results, `unsafe.Pointer` arithmetic.
    pub fn gen_opaque(&mut self, ty: Type) -> Loc {
        let m = self.model_mut().heap(ty, Attrs::OPAQUE);
        self.model_mut().gen_points_to(m, m);
        self.record(m);
        debug!("opaque: {}", m);
        m
    }

    /// Allocate a value of the current type and wrap it in the matching object.
    ///
    /// Slices start with unknown length and capacity. Interfaces box an
    /// opaque value until the translator knows the concrete type.
    pub fn gen_object(&mut self) -> Object {
        let m = self.gen_loc();
        let kind = self.types().kind(self.ty);
        let object = match kind {
            Kind::Array => Object::Array(ArrayObj::new(self.model(), m)),
            Kind::Struct => Object::Struct(StructObj::new(self.model(), m)),
            Kind::Tuple => Object::Tuple(StructObj::new(self.model(), m)),
            Kind::Map => Object::Map(MapObj::new(self.model_mut(), m)),
            Kind::Chan => Object::Chan(ChanObj::new(self.model_mut(), m)),
            Kind::Slice => {
                let len = self.indexing().var();
                let cap = self.indexing().var();
                Object::Slice(SliceObj::new(self.model(), m, len, cap))
            }
            Kind::Interface => {
                let concrete = self.gen_opaque(Type::UNSAFE_POINTER);
                self.model_mut().set_obj(m, concrete);
                self.model_mut().gen_points_to(m, concrete);
                Object::Interface(InterfaceObj { loc: m, concrete })
            }
            Kind::Func => Object::Func(FuncObj::new(self.model_mut(), m)),
            Kind::Basic | Kind::Pointer => Object::Pointer(m),
        };
        self.res.add_object(object.clone());
        object
    }

    /// Declare a function of type `ty`: a global with parameter and result storage.
    pub fn gen_func(&mut self, ty: Type) -> FuncObj {
        let saved = (self.class, self.ty);
        self.class(Class::Global).ty(ty);
        let m = self.gen_loc();
        (self.class, self.ty) = saved;
        let f = FuncObj::new(self.model_mut(), m);
        self.res.add_object(Object::Func(f.clone()));
        f
    }

    /// Box a value of type `concrete` into a fresh interface of the current type.
    pub fn gen_interface(&mut self, concrete: Type) -> InterfaceObj {
        let m = self.gen_loc();
        let obj = InterfaceObj::new(self.model_mut(), m, concrete);
        self.res.add_object(Object::Interface(obj.clone()));
        obj
    }

    /// A slice of the current type with the given length and capacity.
    pub fn gen_slice(&mut self, len: Index, cap: Index) -> Loc {
        let m = self.gen_loc();
        let s = SliceObj::new(self.model(), m, len, cap);
        self.res.add_object(Object::Slice(s));
        m
    }

    /// `d = s[i]` on a registered slice.
    pub fn slice_get(&mut self, s: Loc, i: Index, d: Loc) {
        let (model, ix, objects) = self.res.parts_mut();
        match objects.get_mut(&s) {
            Some(Object::Slice(obj)) => obj.get(model, ix, i, d),
            _ => panic!("{} is not a slice object", s),
        }
    }

    /// `s[i] = v` on a registered slice.
    pub fn slice_set(&mut self, s: Loc, i: Index, v: Loc) {
        let (model, ix, objects) = self.res.parts_mut();
        match objects.get_mut(&s) {
            Some(Object::Slice(obj)) => obj.set(model, ix, i, v),
            _ => panic!("{} is not a slice object", s),
        }
    }

    /// `d = f(args)` for a registered function.
    pub fn call(&mut self, f: Loc, args: &[Loc], d: Option<Loc>) {
        let func = match self.res.object(f) {
            Some(Object::Func(func)) => func.clone(),
            _ => panic!("{} is not a function object", f),
        };
        func.call(self.model_mut(), args, d);
    }

    // ------------------------------------------------------------------
    // Navigation and constraints
    // ------------------------------------------------------------------

    pub fn field(&self, m: Loc, i: usize) -> Loc {
        self.model().field(m, i)
    }

    pub fn array_index(&self, m: Loc, i: usize) -> Loc {
        self.model().array_index(m, i)
    }

    pub fn gen_points_to(&mut self, a: Loc, b: Loc) {
        self.model_mut().gen_points_to(a, b);
    }

    pub fn gen_load(&mut self, dst: Loc, src: Loc) {
        self.model_mut().gen_load(dst, src);
    }

    pub fn gen_store(&mut self, dst: Loc, src: Loc) {
        self.model_mut().gen_store(dst, src);
    }

    pub fn gen_transfer(&mut self, dst: Loc, src: Loc) {
        self.model_mut().gen_transfer(dst, src);
    }

    pub fn gen_transfer_index(&mut self, dst: Loc, src: Loc, index: Index) {
        self.model_mut().gen_transfer_index(dst, src, index);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::indexing::{ConstIndexing, VarIndexing};
    use crate::types::BasicKind;

    fn pt(b: &Builder<'_>, p: Loc) -> Vec<Loc> {
        b.model().points_to(p).collect()
    }

    #[test]
    fn test_settings_persist() {
        let mut res = PkgRes::new("p", Arc::new(ConstIndexing));
        let mut b = Builder::new(&mut res);
        b.class(Class::Heap).attrs(Attrs::PARAM).ty(Type::INT).pos(Pos(3)).src_kind(Some(SrcKind::New));
        let x = b.gen_loc();
        let y = b.gen_loc();
        assert_eq!(b.model().class(y), Class::Heap);
        assert_eq!(b.model().attrs(x), Attrs::PARAM);
        b.src_kind(None);
        let z = b.gen_loc();
        assert_eq!(b.res().src_info(x), Some(SrcInfo { kind: SrcKind::New, pos: Pos(3) }));
        assert_eq!(b.res().src_info(z), None);
    }

    #[test]
    fn test_gen_with_pointer_records_storage() {
        let mut res = PkgRes::new("p", Arc::new(ConstIndexing));
        let mut b = Builder::new(&mut res);
        b.source_type(&SourceType::Basic(BasicKind::String))
            .src_kind(Some(SrcKind::AddressOf));
        let p = b.gen_with_pointer();
        let storage = b.model().obj(p);
        assert_eq!(b.model().ty(storage), Type::STRING);
        assert!(b.res().src_info(storage).is_some());
        assert!(b.res().src_info(p).is_none());
    }

    #[test]
    fn test_gen_opaque() {
        let mut res = PkgRes::new("p", Arc::new(ConstIndexing));
        let mut b = Builder::new(&mut res);
        let p = b.types_mut().pointer_to(Type::INT);
        let o = b.gen_opaque(p);
        let x = b.ty(p).gen_loc();
        b.gen_load(x, o);
        b.model_mut().solve();
        assert!(b.model().attrs(o).is_opaque());
        assert_eq!(pt(&b, o), vec![o]);
        assert_eq!(pt(&b, x), vec![o]);
    }

    #[test]
    fn test_gen_object_kinds() {
        let mut res = PkgRes::new("p", Arc::new(VarIndexing::new()));
        let mut b = Builder::new(&mut res);
        let p = b.types_mut().pointer_to(Type::INT);
        let cases = [
            (b.types_mut().array_of(p, 2), 'a'),
            (b.types_mut().struct_of(vec![("f".into(), p)]), 's'),
            (b.types_mut().tuple_of(vec![p, p]), 't'),
            (b.types_mut().map_of(Type::INT, p), 'm'),
            (b.types_mut().chan_of(p), 'c'),
            (b.types_mut().slice_of(p), 'l'),
            (b.types_mut().interface_of(vec![]), 'i'),
            (b.types_mut().func_of(None, vec![], vec![], false), 'f'),
            (p, 'p'),
        ];
        for (ty, tag) in cases {
            let o = b.ty(ty).gen_object();
            assert_eq!(o.tag(), tag);
            assert_eq!(b.res().object(o.loc()), Some(&o));
        }
        b.model().check();
    }

    #[test]
    fn test_gen_interface() {
        let mut res = PkgRes::new("p", Arc::new(ConstIndexing));
        let mut b = Builder::new(&mut res);
        let p = b.types_mut().pointer_to(Type::INT);
        let it = b.types_mut().interface_of(vec![]);
        let iface = b.ty(it).gen_interface(p);
        assert_eq!(b.model().ty(iface.concrete), p);
        assert_eq!(b.res().object(iface.loc), Some(&Object::Interface(iface.clone())));

        let a = b.ty(Type::INT).gen_loc();
        b.gen_points_to(iface.concrete, a);
        let d = b.ty(it).gen_loc();
        b.gen_transfer(d, iface.loc);
        b.model_mut().solve();
        assert_eq!(pt(&b, d), vec![iface.concrete]);
        assert_eq!(pt(&b, iface.concrete), vec![a]);
    }

    #[test]
    fn test_slice_through_builder() {
        let mut res = PkgRes::new("p", Arc::new(VarIndexing::new()));
        let mut b = Builder::new(&mut res);
        let p = b.types_mut().pointer_to(Type::INT);
        let st = b.types_mut().slice_of(p);
        let a = b.ty(Type::INT).gen_loc();
        let v = b.ty(p).gen_loc();
        let d = b.gen_loc();
        b.gen_points_to(v, a);
        let s = b.ty(st).gen_slice(Index::Const(2), Index::Const(2));
        let i = b.indexing().var();
        b.slice_set(s, Index::ONE, v);
        b.slice_get(s, i, d);
        b.model_mut().solve();
        assert_eq!(pt(&b, d), vec![a]);
    }

    #[test]
    fn test_call_through_builder() {
        let mut res = PkgRes::new("p", Arc::new(ConstIndexing));
        let mut b = Builder::new(&mut res);
        let p = b.types_mut().pointer_to(Type::INT);
        let ft = b.types_mut().func_of(None, vec![("x".into(), p)], vec![("".into(), p)], false);
        let f = b.gen_func(ft);
        assert_eq!(b.model().class(f.loc), Class::Global);
        let (x, r) = (f.param(b.model(), 0), f.result(b.model(), 0));
        b.gen_transfer(r, x);

        let a = b.ty(Type::INT).gen_loc();
        let arg = b.ty(p).gen_loc();
        let d = b.gen_loc();
        assert_eq!(b.model().class(d), Class::Local);
        b.gen_points_to(arg, a);
        b.call(f.loc, &[arg], Some(d));
        b.model_mut().solve();
        assert_eq!(pt(&b, d), vec![a]);
    }
}
