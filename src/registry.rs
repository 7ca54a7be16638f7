//! Registry of exported package results.
//!
//! The registry is passed explicitly to whoever needs it. Workers may
//! analyze independent packages in parallel; a package is stored once its
//! export is final and is read-only from then on.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::error::RegistryError;
use crate::model::ImportMap;
use crate::results::PkgRes;

#[derive(Debug, Default)]
pub struct Registry {
    packages: Mutex<HashMap<String, Arc<PkgRes>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the results of a finished package.
    pub fn put(&self, res: PkgRes) -> Result<Arc<PkgRes>, RegistryError> {
        let mut packages = self.packages.lock();
        if packages.contains_key(res.path()) {
            return Err(RegistryError::Duplicate(res.path().to_string()));
        }
        debug!("registry: put {} ({} locations)", res.path(), res.model().len());
        let res = Arc::new(res);
        packages.insert(res.path().to_string(), Arc::clone(&res));
        Ok(res)
    }

    pub fn get(&self, path: &str) -> Result<Arc<PkgRes>, RegistryError> {
        self.packages
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| RegistryError::MissingDependency(path.to_string()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.packages.lock().contains_key(path)
    }

    /// Registered package paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.packages.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.packages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Import every dependency of `res`, in the given order.
    ///
    /// All dependencies are looked up before anything is imported, so a
    /// missing one leaves `res` untouched.
    pub fn import_deps<S: AsRef<str>>(&self, res: &mut PkgRes, deps: &[S]) -> Result<Vec<ImportMap>, RegistryError> {
        let found = deps
            .iter()
            .map(|d| self.get(d.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(found.iter().map(|dep| res.import(dep)).collect())
    }
}
