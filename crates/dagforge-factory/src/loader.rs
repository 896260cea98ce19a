//! Directory aggregation
//!
//! Walks a directory tree depth-first and runs one factory cycle per
//! configuration file, all against the same namespace. Workflows generated
//! from files under the root that no longer exist are retracted at the end
//! of a successful walk.

use dagforge_core::{WorkflowId, WorkflowNamespace};
use dagforge_dsl::resolver::validate_config_path;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::FactoryConfig;
use crate::error::{FactoryError, FactoryResult};
use crate::factory::WorkflowFactory;

/// What a directory walk did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryReport {
    /// Configuration files processed, in visiting order
    pub files: Vec<PathBuf>,

    /// Workflows published, in publishing order
    pub published: Vec<WorkflowId>,

    /// Stale workflows removed, in removal order
    pub removed: Vec<String>,
}

enum Work {
    Dir(PathBuf),
    File(PathBuf),
}

/// Run a build, publish and retract cycle for every configuration file under `root`.
///
/// Directory entries are visited in file-name order and symbolic links are
/// followed; a directory reached twice is only walked once. Broken links,
/// entries that are neither files nor directories, and files without a
/// configured suffix are skipped. The first file that fails stops the walk;
/// files after it are not processed and nothing is retracted.
///
/// After the walk, generated workflows whose source file lies under `root`
/// but was not visited are removed.
pub fn load_directory(
    root: impl AsRef<Path>,
    config: &FactoryConfig,
    namespace: &(impl WorkflowNamespace + ?Sized),
) -> FactoryResult<DirectoryReport> {
    let root = root.as_ref();
    validate_config_path(root)?;

    let mut report = DirectoryReport::default();
    let mut seen_dirs = HashSet::new();
    let mut stack = vec![Work::Dir(root.to_path_buf())];

    while let Some(work) = stack.pop() {
        match work {
            Work::Dir(dir) => {
                let canonical = fs::canonicalize(&dir).map_err(io_error(&dir))?;
                if !seen_dirs.insert(canonical) {
                    debug!(dir = %dir.display(), "Skipping directory already walked");
                    continue;
                }

                let children = list_dir(&dir, config)?;
                debug!(dir = %dir.display(), entries = children.len(), "Scanning directory");
                stack.extend(children.into_iter().rev());
            }
            Work::File(path) => {
                let cycle = WorkflowFactory::from_path(&path)
                    .and_then(|factory| factory.run_cycle(namespace))
                    .map_err(|source| FactoryError::Source {
                        path: path.clone(),
                        source: Box::new(source),
                    })?;

                report.published.extend(cycle.published);
                report.removed.extend(cycle.removed);
                report.files.push(path);
            }
        }
    }

    let orphans = retract_missing_files(root, &report.files, namespace)?;
    report.removed.extend(orphans);

    info!(
        root = %root.display(),
        files = report.files.len(),
        published = report.published.len(),
        removed = report.removed.len(),
        "Loaded workflow directory"
    );

    Ok(report)
}

/// Remove workflows generated from files under `root` that the walk did not visit
fn retract_missing_files(
    root: &Path,
    visited: &[PathBuf],
    namespace: &(impl WorkflowNamespace + ?Sized),
) -> FactoryResult<Vec<String>> {
    let visited: HashSet<&Path> = visited.iter().map(PathBuf::as_path).collect();

    let orphans: Vec<(String, PathBuf)> = namespace
        .snapshot()?
        .into_iter()
        .filter_map(|(name, entry)| {
            let path = entry.marker()?.source.path()?;
            (path.starts_with(root) && !visited.contains(path)).then(|| (name, path.to_path_buf()))
        })
        .collect();

    let mut removed = Vec::with_capacity(orphans.len());
    for (name, path) in orphans {
        namespace.remove(&name)?;
        info!(
            source = %path.display(),
            workflow = %name,
            "Removed workflow of missing configuration file"
        );
        removed.push(name);
    }

    Ok(removed)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> FactoryError {
    let path = path.to_path_buf();
    move |source| FactoryError::Io { path, source }
}

/// Subdirectories and configuration files of `dir`, sorted by name.
/// Symbolic links are resolved; broken ones are skipped.
fn list_dir(dir: &Path, config: &FactoryConfig) -> FactoryResult<Vec<Work>> {
    let mut entries = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(dir))?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut children = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Skipping broken link");
                continue;
            }
            Err(err) => return Err(io_error(&path)(err)),
        };

        if metadata.is_dir() {
            children.push(Work::Dir(path));
        } else if metadata.is_file() && config.is_config_file(&path) {
            children.push(Work::File(path));
        }
    }

    Ok(children)
}
