//! Per-package analysis results.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use log::{debug, info};

use crate::error::{DecodeContext, DecodeError};
use crate::indexing::Indexing;
use crate::loc::Loc;
use crate::model::{ImportMap, Model};
use crate::objects::Object;
use crate::plain::{parse_usize, Reader};
use crate::srcinfo::{SrcInfo, SrcInfos};
use crate::types::TypeSet;

/// Everything the analysis knows about one package.
///
/// Locations below [`start`](PkgRes::start) were imported from
/// dependencies; the rest belong to this package.
#[derive(Debug, Clone)]
pub struct PkgRes {
    path: String,
    indexing: Arc<dyn Indexing>,
    start: usize,
    model: Model,
    src_infos: SrcInfos,
    objects: BTreeMap<Loc, Object>,
}

impl PkgRes {
    pub fn new(path: impl Into<String>, indexing: Arc<dyn Indexing>) -> Self {
        Self {
            path: path.into(),
            indexing,
            start: 2,
            model: Model::default(),
            src_infos: SrcInfos::new(),
            objects: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn indexing(&self) -> &dyn Indexing {
        self.indexing.as_ref()
    }

    /// First location belonging to this package.
    pub fn start(&self) -> usize {
        self.start
    }

    /// True if `m` was imported from a dependency.
    pub fn is_imported(&self, m: Loc) -> bool {
        m.index() >= 2 && m.index() < self.start
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn types(&self) -> &TypeSet {
        self.model.types()
    }

    pub fn src_infos(&self) -> &SrcInfos {
        &self.src_infos
    }

    pub fn src_info(&self, m: Loc) -> Option<SrcInfo> {
        self.src_infos.get(m)
    }

    pub fn set_src_info(&mut self, m: Loc, info: SrcInfo) {
        self.src_infos.set(m, info);
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn object(&self, m: Loc) -> Option<&Object> {
        self.objects.get(&m)
    }

    pub fn add_object(&mut self, object: Object) {
        self.objects.insert(object.loc(), object);
    }

    /// Split borrow for object operations that emit constraints.
    pub fn parts_mut(&mut self) -> (&mut Model, &dyn Indexing, &mut BTreeMap<Loc, Object>) {
        (&mut self.model, self.indexing.as_ref(), &mut self.objects)
    }

    /// Import an exported dependency.
    ///
    /// # Panics
    ///
    /// Panics if this package already allocated locations of its own.
    pub fn import(&mut self, other: &PkgRes) -> ImportMap {
        assert_eq!(
            self.model.len(),
            self.start,
            "{}: import of {} after own locations were allocated",
            self.path,
            other.path
        );
        let map = self.model.import(&other.model);
        self.src_infos.import(&other.src_infos, &map);
        for o in other.objects.values() {
            if let Some(o) = o.map_locs(|l| map.loc(l), true) {
                self.objects.insert(o.loc(), o);
            }
        }
        self.start = self.model.len();
        debug!("{}: imported {}, start is now {}", self.path, other.path, self.start);
        map
    }

    /// Solve if needed, then drop unreachable locals and renumber.
    ///
    /// Returns the export permutation of [`Model::export`].
    pub fn export(&mut self) -> Vec<Loc> {
        let perm = self.model.export();
        self.src_infos.remap(&perm);
        let objects = std::mem::take(&mut self.objects);
        self.objects = objects
            .into_values()
            .filter_map(|o| o.map_locs(|l| perm.get(l.index()).copied().unwrap_or(Loc::NONE), false))
            .map(|o| (o.loc(), o))
            .collect();
        self.start = 2 + perm[2..self.start].iter().filter(|l| !l.is_none()).count();
        info!(
            "{}: exported {} locations, {} objects",
            self.path,
            self.model.len(),
            self.objects.len()
        );
        perm
    }

    // ------------------------------------------------------------------
    // Plain encoding
    // ------------------------------------------------------------------

    pub fn encode(&self) -> String {
        let mut out = format!("{}:{}:{}\n", self.path, self.start, self.model.len());
        self.model.encode(self.indexing(), &mut out);
        self.src_infos.encode(&mut out);
        out.push_str(&format!("{}\n", self.objects.len()));
        for o in self.objects.values() {
            o.encode(self.indexing(), &mut out);
            out.push('\n');
        }
        out
    }

    /// Decode a package. The model comes back unsolved.
    pub fn decode(input: &str, indexing: Arc<dyn Indexing>) -> Result<PkgRes, DecodeError> {
        let mut r = Reader::new(input);
        let header = r.next_line("package header")?;
        let mut parts = header.rsplitn(3, ':');
        let (n_locs, start, path) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(s), Some(p)) => (n, s, p),
            _ => return Err(DecodeError::Invalid(format!("package header {:?}", header))),
        };
        let n_locs = parse_usize(n_locs).with_context(|| "location count")?;
        let start = parse_usize(start).with_context(|| "start")?;
        if start < 2 || start > n_locs {
            return Err(DecodeError::Invalid(format!("start {} outside 2..={}", start, n_locs)));
        }

        let ctx = || format!("package {}", path);
        let model = Model::decode(&mut r, n_locs, indexing.as_ref()).with_context(ctx)?;
        let src_infos = SrcInfos::decode(&mut r).with_context(ctx)?;
        let count = r.count("objects").with_context(ctx)?;
        let mut objects = BTreeMap::new();
        for i in 0..count {
            let line = r.next_line("object").with_context(ctx)?;
            let o = Object::decode(line, indexing.as_ref())
                .with_context(|| format!("package {}: object {}", path, i))?;
            objects.insert(o.loc(), o);
        }
        if !r.is_eof() {
            return Err(DecodeError::Invalid(format!("trailing input after line {}", r.line_no())).context(ctx()));
        }
        Ok(PkgRes {
            path: path.to_string(),
            indexing,
            start,
            model,
            src_infos,
            objects,
        })
    }
}
