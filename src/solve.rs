//! Inclusion-based (Andersen style) points-to solver.
//!
//! Transfers are resolved up front into static copy edges `src -> dst`.
//! Loads and stores add copy edges while the solver runs: popping `n` with
//! `v ∈ PT(n)` adds `v -> d` for every load `d = *n` and `s -> v` for every
//! store `*n = s`. Points-to sets then flow along copy edges until the
//! worklist drains.

use log::{info, trace, warn};

use crate::bitset::BitSet;
use crate::indexing::Index;
use crate::loc::Loc;
use crate::model::Model;
use crate::types::Kind;

/// Solver limits.
#[derive(Debug, Clone, Default)]
pub struct SolveConfig {
    /// Stop after this many worklist pops. The model stays unsolved if hit.
    pub max_iterations: Option<usize>,
}

impl SolveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SolveStats {
    /// Worklist pops.
    pub iterations: usize,
    /// Copy edges derived from transfers.
    pub copy_edges: usize,
    /// Copy edges discovered through loads and stores.
    pub dynamic_edges: usize,
    /// Sum of all points-to set sizes at the end.
    pub pt_total: usize,
    /// False if the iteration limit stopped the solver early.
    pub completed: bool,
}

/// `pts[dst] |= pts[src]`.
fn union_into(pts: &mut [BitSet], dst: usize, src: usize) -> bool {
    if dst == src {
        return false;
    }
    if dst < src {
        let (lo, hi) = pts.split_at_mut(src);
        lo[dst].union_with(&hi[0])
    } else {
        let (lo, hi) = pts.split_at_mut(dst);
        hi[0].union_with(&lo[src])
    }
}

/// Real locations in a points-to set: the nil location points nowhere.
fn pointees(set: &BitSet) -> impl Iterator<Item = usize> + '_ {
    set.iter().filter(|&v| v > Loc::ZERO.index())
}

impl Model {
    pub fn solve(&mut self) -> SolveStats {
        self.solve_with(&SolveConfig::default())
    }

    pub fn solve_with(&mut self, config: &SolveConfig) -> SolveStats {
        let n = self.len();
        let mut stats = SolveStats::default();

        let mut succ: Vec<BitSet> = vec![BitSet::new(); n];
        let mut load_users: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sources = Vec::new();
        for d in 0..n {
            for &b in &self.edges[d].points_to {
                self.pts[d].insert(b.index());
            }
            for &s in &self.edges[d].loads {
                load_users[s.index()].push(d);
            }
            for t in &self.edges[d].transfers {
                sources.clear();
                self.transfer_sources(t.src, t.index, &mut sources);
                for s in &sources {
                    if s.index() != d && succ[s.index()].insert(d) {
                        stats.copy_edges += 1;
                    }
                }
            }
        }

        let mut worklist = BitSet::with_capacity(n);
        for m in 0..n {
            if !self.pts[m].is_empty() || !self.edges[m].is_empty() {
                worklist.insert(m);
            }
        }

        while let Some(i) = worklist.pop_first() {
            if config.max_iterations.is_some_and(|max| stats.iterations >= max) {
                warn!("solve: stopped after {} iterations", stats.iterations);
                worklist.insert(i);
                break;
            }
            stats.iterations += 1;
            let cur = self.pts[i].clone();
            trace!("solve: pop @{} with {} pointees", i, cur.len());

            // d = *i
            for &d in &load_users[i] {
                for v in pointees(&cur) {
                    if succ[v].insert(d) {
                        stats.dynamic_edges += 1;
                        if union_into(&mut self.pts, d, v) {
                            worklist.insert(d);
                        }
                    }
                }
            }

            // *i = s
            for s in &self.edges[i].stores {
                let s = s.index();
                for v in pointees(&cur) {
                    if succ[s].insert(v) {
                        stats.dynamic_edges += 1;
                        if union_into(&mut self.pts, v, s) {
                            worklist.insert(v);
                        }
                    }
                }
            }

            for t in succ[i].iter() {
                if self.pts[t].union_with(&cur) {
                    worklist.insert(t);
                }
            }
        }

        stats.completed = worklist.is_empty();
        stats.pt_total = self.pts.iter().map(BitSet::len).sum();
        self.solved = stats.completed;
        info!(
            "solve: {} locations, {} constraints, {} iterations, {} + {} edges, {} pointees",
            n,
            self.num_constraints(),
            stats.iterations,
            stats.copy_edges,
            stats.dynamic_edges,
            stats.pt_total
        );
        stats
    }

    /// Locations whose points-to sets flow into `dst` for `dst = src[index]`.
    ///
    /// # Panics
    ///
    /// Panics on a variable index into a struct or tuple, a field index out
    /// of range, or a non-zero index into a scalar.
    pub fn transfer_sources(&self, src: Loc, index: Option<Index>, out: &mut Vec<Loc>) {
        let Some(index) = index else {
            out.push(src);
            return;
        };
        let ty = self.ty(src);
        let kind = self.types.kind(ty);
        match (kind, index) {
            (Kind::Array, Index::Const(k)) => {
                let len = self.types.array_len(ty);
                match usize::try_from(k).ok().filter(|&k| k < len) {
                    Some(k) => out.push(self.array_index(src, k)),
                    None => warn!("transfer: index {} out of range for {} of length {}", k, src, len),
                }
            }
            (Kind::Array, Index::Var { .. }) => {
                let len = self.types.array_len(ty);
                out.extend((0..len).map(|i| self.array_index(src, i)));
            }
            (Kind::Struct | Kind::Tuple, Index::Const(k)) => {
                let n = self.types.num_fields(ty);
                let k = usize::try_from(k)
                    .ok()
                    .filter(|&k| k < n)
                    .unwrap_or_else(|| panic!("field {} of {} which has {} fields", k, src, n));
                out.push(self.field(src, k));
            }
            (Kind::Struct | Kind::Tuple, Index::Var { .. }) => {
                panic!("variable index into {} of {} type", src, kind.name())
            }
            (Kind::Slice, _) | (_, Index::Const(0)) => out.push(src),
            (_, i) => panic!("index {} into {} of {} type", i, src, kind.name()),
        }
    }

    /// True if applying any constraint to the current points-to sets adds nothing.
    pub fn is_fixed_point(&self) -> bool {
        let mut sources = Vec::new();
        for d in 0..self.len() {
            let pt = &self.pts[d];
            let e = &self.edges[d];
            if !e.points_to.iter().all(|b| pt.contains(b.index())) {
                return false;
            }
            for s in &e.loads {
                if !pointees(&self.pts[s.index()]).all(|v| self.pts[v].is_subset(pt)) {
                    return false;
                }
            }
            for s in &e.stores {
                let from = &self.pts[s.index()];
                if !pointees(pt).all(|v| from.is_subset(&self.pts[v])) {
                    return false;
                }
            }
            for t in &e.transfers {
                sources.clear();
                self.transfer_sources(t.src, t.index, &mut sources);
                if !sources.iter().all(|w| self.pts[w.index()].is_subset(pt)) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::loc::{Attrs, Class};
    use crate::types::Type;

    fn setup() -> (Model, Type) {
        let mut m = Model::default();
        let p = m.types_mut().pointer_to(Type::INT);
        (m, p)
    }

    fn pt(m: &Model, p: Loc) -> Vec<Loc> {
        let mut out = Vec::new();
        m.points_to_for(&mut out, p);
        out
    }

    #[test]
    fn test_copy_chain() {
        let (mut m, p) = setup();
        let a = m.local(Type::INT, Attrs::NONE);
        let xs: Vec<Loc> = (0..4).map(|_| m.local(p, Attrs::NONE)).collect();
        m.gen_points_to(xs[0], a);
        for w in xs.windows(2) {
            m.gen_transfer(w[1], w[0]);
        }
        let stats = m.solve();
        assert!(stats.completed);
        assert_eq!(stats.copy_edges, 3);
        for &x in &xs {
            assert_eq!(pt(&m, x), vec![a]);
        }
        assert!(m.is_solved());
        assert!(m.is_fixed_point());
    }

    #[test]
    fn test_cycle_terminates() {
        let (mut m, p) = setup();
        let a = m.local(Type::INT, Attrs::NONE);
        let x = m.local(p, Attrs::NONE);
        let y = m.local(p, Attrs::NONE);
        m.gen_points_to(x, a);
        m.gen_transfer(y, x);
        m.gen_transfer(x, y);
        m.solve();
        assert_eq!(pt(&m, y), vec![a]);
        assert!(m.is_fixed_point());
    }

    #[test]
    fn test_self_points_to() {
        let (mut m, p) = setup();
        let x = m.heap(p, Attrs::OPAQUE);
        m.gen_points_to(x, x);
        let y = m.local(p, Attrs::NONE);
        m.gen_load(y, x);
        m.solve();
        assert_eq!(pt(&m, x), vec![x]);
        assert_eq!(pt(&m, y), vec![x]);
    }

    #[test]
    fn test_nil_is_inert() {
        let (mut m, p) = setup();
        let a = m.local(Type::INT, Attrs::NONE);
        let x = m.local(p, Attrs::NONE);
        let q = m.local(p, Attrs::NONE);
        let y = m.local(p, Attrs::NONE);
        m.gen_points_to(x, Loc::ZERO);
        m.gen_points_to(q, a);
        m.gen_store(x, q);
        m.gen_load(y, x);
        m.solve();
        assert_eq!(pt(&m, x), vec![Loc::ZERO]);
        assert!(pt(&m, y).is_empty());
        assert_eq!(m.points_to_len(Loc::ZERO), 0);
    }

    #[test]
    fn test_store_then_load() {
        let (mut m, p) = setup();
        let pp = m.types_mut().pointer_to(p);
        let a = m.local(Type::INT, Attrs::NONE);
        let x = m.local(p, Attrs::NONE);
        let px = m.local(pp, Attrs::NONE);
        let q = m.local(p, Attrs::NONE);
        let r = m.local(p, Attrs::NONE);
        m.gen_points_to(px, x);
        m.gen_points_to(q, a);
        m.gen_store(px, q);
        m.gen_load(r, px);
        let stats = m.solve();
        assert_eq!(pt(&m, x), vec![a]);
        assert_eq!(pt(&m, r), vec![a]);
        assert_eq!(stats.dynamic_edges, 2);
        assert!(m.may_alias(q, r));
        assert!(!m.may_alias(q, px));
    }

    #[test]
    fn test_array_indices() {
        let (mut m, p) = setup();
        let arr = m.types_mut().array_of(p, 3);
        let a = m.local(Type::INT, Attrs::NONE);
        let b = m.local(Type::INT, Attrs::NONE);
        let xs = m.local(arr, Attrs::NONE);
        let (e0, e2) = (m.array_index(xs, 0), m.array_index(xs, 2));
        m.gen_points_to(e0, a);
        m.gen_points_to(e2, b);
        let d0 = m.local(p, Attrs::NONE);
        let dv = m.local(p, Attrs::NONE);
        let oob = m.local(p, Attrs::NONE);
        m.gen_transfer_index(d0, xs, Index::ZERO);
        m.gen_transfer_index(dv, xs, Index::ANON);
        m.gen_transfer_index(oob, xs, Index::Const(7));
        m.solve();
        assert_eq!(pt(&m, d0), vec![a]);
        assert_eq!(pt(&m, dv), vec![a, b]);
        assert!(pt(&m, oob).is_empty());
    }

    #[test]
    fn test_slice_index_is_the_slice() {
        let (mut m, p) = setup();
        let sl = m.types_mut().slice_of(p);
        let elem = m.heap(p, Attrs::NONE);
        let s = m.local(sl, Attrs::NONE);
        let d = m.local(sl, Attrs::NONE);
        m.gen_points_to(s, elem);
        m.gen_transfer_index(d, s, Index::ANON);
        m.solve();
        assert_eq!(pt(&m, d), vec![elem]);
    }

    #[test]
    #[should_panic(expected = "variable index into")]
    fn test_variable_index_into_struct() {
        let (mut m, p) = setup();
        let s = m.types_mut().struct_of(vec![("f".into(), p)]);
        let x = m.local(s, Attrs::NONE);
        let d = m.local(p, Attrs::NONE);
        m.gen_transfer_index(d, x, Index::ANON);
        m.solve();
    }

    #[test]
    #[should_panic(expected = "index 2 into")]
    fn test_nonzero_index_into_pointer() {
        let (mut m, p) = setup();
        let x = m.local(p, Attrs::NONE);
        let d = m.local(p, Attrs::NONE);
        m.gen_transfer_index(d, x, Index::Const(2));
        m.solve();
    }

    #[test]
    fn test_iteration_limit() {
        let (mut m, p) = setup();
        let a = m.local(Type::INT, Attrs::NONE);
        let xs: Vec<Loc> = (0..10).map(|_| m.local(p, Attrs::NONE)).collect();
        m.gen_points_to(xs[0], a);
        for w in xs.windows(2) {
            m.gen_transfer(w[1], w[0]);
        }
        let stats = m.solve_with(&SolveConfig::new().with_max_iterations(2));
        assert!(!stats.completed);
        assert!(!m.is_solved());
        let stats = m.solve();
        assert!(stats.completed);
        assert_eq!(pt(&m, xs[9]), vec![a]);
    }

    #[test]
    fn test_resolve_is_stable() {
        let (mut m, p) = setup();
        let x = m.gen_with_pointer(p, Class::Global, Attrs::NONE);
        let y = m.local(p, Attrs::NONE);
        m.gen_transfer(y, x);
        let first = m.solve();
        let again = m.solve();
        assert_eq!(first.pt_total, again.pt_total);
        assert_eq!(pt(&m, y), vec![m.obj(x)]);
    }
}
