//! Debug utilities for inspecting a model.
//!
//! These are primarily useful in tests and while writing a translator.

use std::fmt::{Display, Formatter};

use crate::loc::{Attrs, Class, Loc};
use crate::model::{Constraint, Model};

/// Everything known about one location.
#[derive(Debug, Clone)]
pub struct LocDump {
    pub loc: Loc,
    /// Distance from the root of the enclosing storage object.
    pub depth: usize,
    pub class: Class,
    pub attrs: Attrs,
    pub ty: String,
    pub obj: Loc,
    /// Points-to set, empty while the model is unsolved.
    pub pts: Vec<Loc>,
}

impl Display for LocDump {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:indent$}{} {} {} {}",
            "",
            self.loc,
            self.class,
            self.attrs,
            self.ty,
            indent = 2 * self.depth
        )?;
        if !self.obj.is_none() {
            write!(f, " obj={}", self.obj)?;
        }
        if !self.pts.is_empty() {
            write!(f, " pts={{")?;
            for (i, l) in self.pts.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", l)?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

/// Whole-model dump: locations in arena order, then constraints.
#[derive(Debug, Clone)]
pub struct ModelDump {
    pub solved: bool,
    pub locs: Vec<LocDump>,
    pub constraints: Vec<String>,
}

impl Display for ModelDump {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Model ({} locations, {} constraints{}):",
            self.locs.len(),
            self.constraints.len(),
            if self.solved { ", solved" } else { "" }
        )?;
        for l in &self.locs {
            writeln!(f, "  {}", l)?;
        }
        for c in &self.constraints {
            writeln!(f, "  {}", c)?;
        }
        Ok(())
    }
}

impl Model {
    pub fn loc_dump(&self, m: Loc) -> LocDump {
        let mut depth = 0;
        let mut p = m;
        while self.parent(p) != p {
            p = self.parent(p);
            depth += 1;
        }
        let pts = if self.is_solved() { self.points_to(m).collect() } else { Vec::new() };
        LocDump {
            loc: m,
            depth,
            class: self.class(m),
            attrs: self.attrs(m),
            ty: self.types().type_string(self.ty(m)),
            obj: self.obj(m),
            pts,
        }
    }

    pub fn dump(&self) -> ModelDump {
        ModelDump {
            solved: self.is_solved(),
            locs: self.locs().map(|m| self.loc_dump(m)).collect(),
            constraints: self.constraints().map(|c: Constraint| c.to_string()).collect(),
        }
    }

    /// Multi-line listing of the whole model.
    pub fn debug_string(&self) -> String {
        self.dump().to_string()
    }
}
