use std::path::PathBuf;

/// Value parser for input files that must exist before anything runs.
pub fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else if path.is_dir() {
        Err(format!("{value:?} is a directory, expected a file"))
    } else {
        Err(format!("File {value:?} does not exist"))
    }
}
