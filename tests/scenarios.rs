//! End-to-end scenarios: small programs, their constraints and expected points-to sets.

use std::sync::Arc;

use pal_rs::builder::Builder;
use pal_rs::indexing::{Index, Indexing, VarIndexing};
use pal_rs::loc::{Attrs, Loc};
use pal_rs::model::Model;
use pal_rs::objects::{FuncObj, StructObj};
use pal_rs::results::PkgRes;
use pal_rs::types::Type;
use test_log::test;

fn pt(m: &Model, p: Loc) -> Vec<Loc> {
    m.points_to(p).collect()
}

// ─── Direct flow ───────────────────────────────────────────────────────────

#[test]
fn test_simple_alias() {
    let mut m = Model::default();
    let int_ptr = m.types_mut().pointer_to(Type::INT);
    let a = m.local(Type::INT, Attrs::NONE);
    let x = m.local(int_ptr, Attrs::NONE);
    let y = m.local(int_ptr, Attrs::NONE);
    m.gen_points_to(x, a);
    m.gen_transfer_index(y, x, Index::ZERO);

    let stats = m.solve();
    assert!(stats.completed);
    assert_eq!(pt(&m, x), vec![a]);
    assert_eq!(pt(&m, y), vec![a]);
    assert!(m.may_alias(x, y));
    assert!(m.is_fixed_point());
}

// ─── Indirection ───────────────────────────────────────────────────────────

#[test]
fn test_load_indirection() {
    let mut m = Model::default();
    let int_ptr = m.types_mut().pointer_to(Type::INT);
    let int_ptr_ptr = m.types_mut().pointer_to(int_ptr);
    let a = m.local(Type::INT, Attrs::NONE);
    let x = m.local(int_ptr, Attrs::NONE);
    let p = m.local(int_ptr_ptr, Attrs::NONE);
    let q = m.local(int_ptr, Attrs::NONE);
    m.gen_points_to(p, x);
    m.gen_points_to(x, a);
    m.gen_load(q, p);

    m.solve();
    assert_eq!(pt(&m, q), vec![a]);
    assert_eq!(pt(&m, p), vec![x]);
}

#[test]
fn test_store_indirection() {
    let mut m = Model::default();
    let int_ptr = m.types_mut().pointer_to(Type::INT);
    let int_ptr_ptr = m.types_mut().pointer_to(int_ptr);
    let a = m.local(Type::INT, Attrs::NONE);
    let x = m.local(int_ptr, Attrs::NONE);
    let p = m.local(int_ptr_ptr, Attrs::NONE);
    let q = m.local(int_ptr, Attrs::NONE);
    m.gen_points_to(p, x);
    m.gen_points_to(q, a);
    m.gen_store(p, q);

    m.solve();
    assert_eq!(pt(&m, x), vec![a]);
}

#[test]
fn test_nil_is_not_dereferenced() {
    let mut m = Model::default();
    let int_ptr = m.types_mut().pointer_to(Type::INT);
    let int_ptr_ptr = m.types_mut().pointer_to(int_ptr);
    let a = m.local(Type::INT, Attrs::NONE);
    let p = m.local(int_ptr_ptr, Attrs::NONE);
    let q = m.local(int_ptr, Attrs::NONE);
    // p = nil; *p = &a
    m.gen_points_to(p, Loc::ZERO);
    m.gen_points_to(q, a);
    m.gen_store(p, q);

    m.solve();
    assert_eq!(pt(&m, p), vec![Loc::ZERO]);
    assert!(pt(&m, Loc::ZERO).is_empty());
}

// ─── Aggregates ────────────────────────────────────────────────────────────

#[test]
fn test_struct_field() {
    let mut m = Model::default();
    let int_ptr = m.types_mut().pointer_to(Type::INT);
    let s = m
        .types_mut()
        .struct_of(vec![("f".into(), int_ptr), ("g".into(), int_ptr)]);
    let a = m.local(Type::INT, Attrs::NONE);
    let b = m.local(Type::INT, Attrs::NONE);
    let s1 = m.local(s, Attrs::NONE);
    let s2 = m.local(s, Attrs::NONE);
    let v1 = StructObj::new(&m, s1);
    let v2 = StructObj::new(&m, s2);
    m.gen_points_to(v1.field(0), a);
    m.gen_points_to(v2.field(1), b);

    m.solve();
    assert_eq!(pt(&m, m.field(s1, 0)), vec![a]);
    assert!(pt(&m, m.field(s1, 1)).is_empty());
    assert_eq!(pt(&m, m.field(s2, 1)), vec![b]);
    assert!(pt(&m, m.field(s2, 0)).is_empty());
}

#[test]
fn test_array_element_collapse() {
    let ix = VarIndexing::new();
    let mut m = Model::default();
    let int_ptr = m.types_mut().pointer_to(Type::INT);
    let arr = m.types_mut().array_of(int_ptr, 3);
    let a = m.local(Type::INT, Attrs::NONE);
    let b = m.local(Type::INT, Attrs::NONE);
    let big_a = m.local(arr, Attrs::NONE);
    let x = m.local(int_ptr, Attrs::NONE);
    let y = m.local(int_ptr, Attrs::NONE);
    m.gen_points_to(m.array_index(big_a, 0), a);
    m.gen_points_to(m.array_index(big_a, 1), b);
    m.gen_transfer_index(x, big_a, ix.var());
    m.gen_transfer_index(y, big_a, ix.one());

    m.solve();
    let pt_x = pt(&m, x);
    assert!(pt_x.contains(&a) && pt_x.contains(&b), "{:?}", pt_x);
    assert_eq!(pt(&m, y), vec![b]);
}

// ─── Calls ─────────────────────────────────────────────────────────────────

#[test]
fn test_call_transfer() {
    let mut m = Model::default();
    let int_ptr = m.types_mut().pointer_to(Type::INT);
    // func id(p *int) *int { return p }
    let ft = m
        .types_mut()
        .func_of(None, vec![("p".into(), int_ptr)], vec![("".into(), int_ptr)], false);
    let fl = m.global(ft, Attrs::NONE);
    let f = FuncObj::new(&mut m, fl);
    m.gen_transfer(f.result(&m, 0), f.param(&m, 0));

    // r := id(&a)
    let a = m.local(Type::INT, Attrs::NONE);
    let arg = m.local(int_ptr, Attrs::NONE);
    let r = m.local(int_ptr, Attrs::NONE);
    m.gen_points_to(arg, a);
    f.call(&mut m, &[arg], Some(r));

    m.solve();
    assert_eq!(pt(&m, r), vec![a]);
    m.check();
}

#[test]
fn test_call_through_builder() {
    let mut res = PkgRes::new("main", Arc::new(VarIndexing::new()));
    let mut b = Builder::new(&mut res);
    let int_ptr = b.types_mut().pointer_to(Type::INT);
    let ft = b
        .types_mut()
        .func_of(None, vec![("p".into(), int_ptr)], vec![("".into(), int_ptr)], false);
    let f = b.gen_func(ft);
    let (p, ret) = (f.param(b.model(), 0), f.result(b.model(), 0));
    b.gen_transfer(ret, p);

    let a = b.ty(Type::INT).gen_loc();
    let c = b.gen_loc();
    let (x, y) = (b.ty(int_ptr).gen_loc(), b.gen_loc());
    let (r1, r2) = (b.gen_loc(), b.gen_loc());
    b.gen_points_to(x, a);
    b.gen_points_to(y, c);
    b.call(f.loc, &[x], Some(r1));
    b.call(f.loc, &[y], Some(r2));

    b.model_mut().solve();
    // Context-insensitive: both call sites see both arguments.
    assert_eq!(pt(b.model(), r1), vec![a, c]);
    assert_eq!(pt(b.model(), r2), vec![a, c]);
}
