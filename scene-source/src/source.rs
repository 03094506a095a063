use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;

/// Environment variable overriding the folder scanned by [`list_available_scenes`].
pub const SCENE_FOLDER_ENV: &str = "DEFAULT_SCENE_FOLDER";

pub fn default_scene_folder() -> PathBuf {
    std::env::var_os(SCENE_FOLDER_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("scenes"))
}

/// Names of the entries directly inside the scene folder, sorted.
///
/// When no folder is given, [`default_scene_folder`] is used.
pub fn list_available_scenes(scene_folder: Option<&Path>) -> Result<Vec<String>> {
    let folder = scene_folder.map_or_else(default_scene_folder, Path::to_path_buf);

    let mut names = vec![];
    for entry in WalkDir::new(&folder).min_depth(1).max_depth(1) {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}
