//! Algebraic laws of the solver over random constraint sets.

use std::collections::BTreeSet;

use pal_rs::indexing::{Index, Indexing, VarIndexing};
use pal_rs::loc::{Attrs, Loc};
use pal_rs::model::Model;
use pal_rs::types::Type;
use proptest::prelude::*;

/// `(kind, dst, src)`. Kinds 0..4 are points-to, load, store and plain
/// transfer between cells; kind 4 is an indexed transfer selected by `src`.
type RawConstraint = (u8, usize, usize);

/// Untyped pointer locals.
const POOL: usize = 12;
const ARRAY_LEN: usize = 3;
const FIELDS: usize = 2;
/// Pointer-typed locations: the pool, the array elements and the struct fields.
const CELLS: usize = POOL + ARRAY_LEN + FIELDS;
/// Points-to targets: every cell plus the array and struct roots.
const TARGETS: usize = CELLS + 2;
/// Indexed transfer shapes: array constants (one out of range), array
/// variable, array anonymous, then each struct field.
const SHAPES: usize = ARRAY_LEN + 3 + FIELDS;

fn constraint() -> impl Strategy<Value = RawConstraint> {
    (0u8..5, 0..CELLS, 0..TARGETS)
}

/// A constraint as the reference solver sees it, over location indices.
#[derive(Debug, Clone)]
enum Rule {
    PointsTo(usize, usize),
    Load(usize, usize),
    Store(usize, usize),
    Copy(usize, Vec<usize>),
}

struct Fixture {
    model: Model,
    ix: VarIndexing,
    cells: Vec<Loc>,
    targets: Vec<Loc>,
    arr: Loc,
    st: Loc,
    rules: Vec<Rule>,
}

impl Fixture {
    fn new() -> Self {
        let mut m = Model::default();
        let pool: Vec<Loc> = (0..POOL)
            .map(|_| m.local(Type::UNSAFE_POINTER, Attrs::NONE))
            .collect();
        let at = m.types_mut().array_of(Type::UNSAFE_POINTER, ARRAY_LEN);
        let fields = (0..FIELDS)
            .map(|i| (format!("f{}", i), Type::UNSAFE_POINTER))
            .collect();
        let stt = m.types_mut().struct_of(fields);
        let arr = m.local(at, Attrs::NONE);
        let st = m.local(stt, Attrs::NONE);

        let mut cells = pool;
        cells.extend((0..ARRAY_LEN).map(|k| m.array_index(arr, k)));
        cells.extend((0..FIELDS).map(|k| m.field(st, k)));
        let mut targets = cells.clone();
        targets.extend([arr, st]);
        Self {
            model: m,
            ix: VarIndexing::new(),
            cells,
            targets,
            arr,
            st,
            rules: Vec::new(),
        }
    }

    fn build(constraints: &[RawConstraint]) -> Self {
        let mut f = Self::new();
        f.add(constraints);
        f
    }

    fn add(&mut self, constraints: &[RawConstraint]) {
        for &(kind, d, s) in constraints {
            let dst = self.cells[d];
            let cell = self.cells[s % CELLS];
            let m = &mut self.model;
            let rule = match kind {
                0 => {
                    let target = self.targets[s];
                    m.gen_points_to(dst, target);
                    Rule::PointsTo(dst.index(), target.index())
                }
                1 => {
                    m.gen_load(dst, cell);
                    Rule::Load(dst.index(), cell.index())
                }
                2 => {
                    m.gen_store(dst, cell);
                    Rule::Store(dst.index(), cell.index())
                }
                3 => {
                    m.gen_transfer(dst, cell);
                    Rule::Copy(dst.index(), vec![cell.index()])
                }
                _ => {
                    let shape = s % SHAPES;
                    let elem = |k: usize| self.arr.index() + 1 + k;
                    let (src, index, from) = if shape <= ARRAY_LEN {
                        let from = if shape < ARRAY_LEN { vec![elem(shape)] } else { vec![] };
                        (self.arr, Index::Const(shape as i64), from)
                    } else if shape == ARRAY_LEN + 1 {
                        (self.arr, self.ix.var(), (0..ARRAY_LEN).map(elem).collect())
                    } else if shape == ARRAY_LEN + 2 {
                        (self.arr, Index::ANON, (0..ARRAY_LEN).map(elem).collect())
                    } else {
                        let k = shape - ARRAY_LEN - 3;
                        (self.st, Index::Const(k as i64), vec![self.st.index() + 1 + k])
                    };
                    m.gen_transfer_index(dst, src, index);
                    Rule::Copy(dst.index(), from)
                }
            };
            self.rules.push(rule);
        }
    }

    /// Saturate the rules by brute force, one pass over everything at a time.
    fn reference(&self) -> Vec<BTreeSet<usize>> {
        let mut pts = vec![BTreeSet::new(); self.model.len()];
        let pointees = |set: &BTreeSet<usize>| -> Vec<usize> {
            set.iter().copied().filter(|&v| v > Loc::ZERO.index()).collect()
        };
        let mut changed = true;
        while changed {
            changed = false;
            for rule in &self.rules {
                let mut flows: Vec<(usize, usize)> = Vec::new();
                match rule {
                    &Rule::PointsTo(d, s) => changed |= pts[d].insert(s),
                    &Rule::Load(d, s) => flows.extend(pointees(&pts[s]).into_iter().map(|v| (v, d))),
                    &Rule::Store(d, s) => flows.extend(pointees(&pts[d]).into_iter().map(|v| (s, v))),
                    Rule::Copy(d, from) => flows.extend(from.iter().map(|&s| (s, *d))),
                }
                for (from, to) in flows {
                    let add: Vec<usize> = pts[from].difference(&pts[to]).copied().collect();
                    changed |= !add.is_empty();
                    pts[to].extend(add);
                }
            }
        }
        pts
    }

    fn snapshot(&self) -> Vec<Vec<Loc>> {
        (0..self.model.len())
            .map(|i| self.model.points_to(Loc::new(i as u32)).collect())
            .collect()
    }

    fn cell_snapshot(&self) -> Vec<Vec<Loc>> {
        self.cells.iter().map(|&l| self.model.points_to(l).collect()).collect()
    }
}

proptest! {
    #[test]
    fn prop_solution_matches_reference(cs in prop::collection::vec(constraint(), 0..40)) {
        let mut f = Fixture::build(&cs);
        let stats = f.model.solve();
        prop_assert!(stats.completed);
        let expected: Vec<Vec<Loc>> = f
            .reference()
            .into_iter()
            .map(|set| set.into_iter().map(|i| Loc::new(i as u32)).collect())
            .collect();
        prop_assert_eq!(f.snapshot(), expected);
    }

    #[test]
    fn prop_solution_is_fixed_point(cs in prop::collection::vec(constraint(), 0..40)) {
        let mut f = Fixture::build(&cs);
        let stats = f.model.solve();
        prop_assert!(stats.completed);
        prop_assert!(f.model.is_solved());
        prop_assert!(f.model.is_fixed_point());
    }

    #[test]
    fn prop_adding_constraints_never_shrinks(
        cs in prop::collection::vec(constraint(), 0..30),
        extra in prop::collection::vec(constraint(), 1..10),
    ) {
        let mut f = Fixture::build(&cs);
        f.model.solve();
        let before = f.cell_snapshot();

        let mut all = cs.clone();
        all.extend(&extra);
        let mut bigger = Fixture::build(&all);
        bigger.model.solve();
        let after = bigger.cell_snapshot();

        for (b, a) in before.iter().zip(&after) {
            prop_assert!(b.iter().all(|l| a.contains(l)), "{:?} not within {:?}", b, a);
        }
    }

    #[test]
    fn prop_incremental_solve_matches_batch(
        cs in prop::collection::vec(constraint(), 0..30),
        extra in prop::collection::vec(constraint(), 1..10),
    ) {
        let mut f = Fixture::build(&cs);
        f.model.solve();
        f.add(&extra);
        prop_assert!(!f.model.is_solved());
        f.model.solve();

        let mut all = cs.clone();
        all.extend(&extra);
        let mut batch = Fixture::build(&all);
        batch.model.solve();
        prop_assert_eq!(f.snapshot(), batch.snapshot());
    }

    #[test]
    fn prop_solve_is_idempotent(cs in prop::collection::vec(constraint(), 0..40)) {
        let mut f = Fixture::build(&cs);
        f.model.solve();
        let first = f.snapshot();
        f.model.solve();
        prop_assert_eq!(first, f.snapshot());
    }
}
