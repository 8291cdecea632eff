use log::{debug, info};

use crate::{
    build,
    model::{Manifest, ProjectConfig, Source},
    workspace::{SourceEntry, Workspace},
};
use std::{error::Error, path::Path};

/// Handler to sync command
/// Brings the source directories of the selected projects and their dependencies up to date
pub fn do_sync(
    root: &Path,
    manifest_file_name: &Path,
    cache_directory: &Path,
    projects: &[String],
    clean: bool,
) -> Result<(), Box<dyn Error>> {
    let manifest = load_manifest(root, manifest_file_name)?;
    let selected = select_projects(&manifest, projects)?;
    let workspace = load_workspace(root, cache_directory, &selected)?;

    workspace.update_all(clean)?;
    info!("Synchronized {} project(s)", workspace.len());
    Ok(())
}

/// Handler to build command
/// Synchronizes, builds and installs the selected projects and their dependencies in manifest order
pub fn do_build(
    root: &Path,
    manifest_file_name: &Path,
    cache_directory: &Path,
    projects: &[String],
    clean: bool,
) -> Result<(), Box<dyn Error>> {
    let manifest = load_manifest(root, manifest_file_name)?;
    let selected = select_projects(&manifest, projects)?;
    let workspace = load_workspace(root, cache_directory, &selected)?;

    for project in selected {
        workspace.update(&project.name, clean)?;
        if clean {
            remove_build_dir(&workspace, &project.name)?;
        }
        build::build_project(project, &workspace)?;
    }
    Ok(())
}

pub fn do_clear_cache(cache_directory: &Path) -> Result<(), Box<dyn Error>> {
    if cache_directory.exists() {
        info!(
            "Clearing prefix download cache {}.",
            cache_directory.display()
        );
        std::fs::remove_dir_all(cache_directory)?;
        Ok(())
    } else {
        Ok(())
    }
}

fn load_manifest(root: &Path, manifest_file_name: &Path) -> Result<Manifest, Box<dyn Error>> {
    let manifest = Manifest::from_file(&root.join(manifest_file_name))?;
    debug!("Manifest defines {} project(s)", manifest.projects.len());
    Ok(manifest)
}

/// The projects named in `names` plus everything they depend on, in manifest order.
/// No names selects every project.
fn select_projects<'a>(
    manifest: &'a Manifest,
    names: &[String],
) -> Result<Vec<&'a ProjectConfig>, Box<dyn Error>> {
    if names.is_empty() {
        return Ok(manifest.projects.iter().collect());
    }

    let mut wanted: Vec<&str> = Vec::new();
    let mut pending: Vec<&str> = names.iter().map(String::as_str).collect();
    while let Some(name) = pending.pop() {
        if wanted.contains(&name) {
            continue;
        }
        let project = manifest
            .project(name)
            .ok_or_else(|| format!("Unknown project `{name}`"))?;
        wanted.push(name);
        pending.extend(project.deps.iter().map(String::as_str));
    }

    Ok(manifest
        .projects
        .iter()
        .filter(|project| wanted.contains(&project.name.as_str()))
        .collect())
}

fn load_workspace(
    root: &Path,
    cache_directory: &Path,
    projects: &[&ProjectConfig],
) -> Result<Workspace, Box<dyn Error>> {
    let mut workspace = Workspace::with_cache_dir(root, cache_directory);
    for project in projects {
        let source = Source::from_config(
            workspace.src_dir_for(&project.name),
            project.source.clone(),
        )?;
        workspace.add(SourceEntry::new(project.name.clone(), source))?;
    }
    Ok(workspace)
}

fn remove_build_dir(workspace: &Workspace, project: &str) -> Result<(), Box<dyn Error>> {
    let build_dir = workspace.build_dir_for(project);
    match std::fs::remove_dir_all(&build_dir) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} is already removed, nothing to do", build_dir.display());
            Ok(())
        }
        otherwise => otherwise,
    }?;
    Ok(())
}
