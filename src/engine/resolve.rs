use log::trace;
use std::path::PathBuf;

/// Resolves a program name against a `PATH`-style search list.
///
/// Names containing a path separator are returned untouched. Otherwise each entry of
/// `path_var` is searched for an executable file with that name; when `path_var` is `None`
/// the shell's own `PATH` is used. If nothing matches, the name comes back unchanged and
/// the later exec reports it as not found.
pub fn resolve(name: &str, path_var: Option<&str>) -> String {
    if name.is_empty() || name.contains('/') {
        return name.to_string();
    }

    let search = match path_var {
        Some(p) => p.to_string(),
        None => match std::env::var("PATH") {
            Ok(p) => p,
            Err(_) => return name.to_string(),
        },
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match which::which_in(name, Some(&search), cwd) {
        Ok(found) => {
            let found = found.to_string_lossy().into_owned();
            trace!("resolved {} -> {}", name, found);
            found
        }
        Err(_) => {
            trace!("{} not found in PATH", name);
            name.to_string()
        }
    }
}
