//! Link handling for generation pointers and reused artifacts.

use std::fs;
use std::io;
use std::path::Path;

use crate::config::LinkType;

/// Remove whatever occupies `path`: a symlink, a file or a whole directory.
/// A missing path is not an error.
pub fn remove_any(path: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Point `link` at `target`, replacing any previous occupant of `link`.
#[cfg(unix)]
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    remove_any(link)?;
    std::os::unix::fs::symlink(target, link)
}

/// Move `source` to `destination` and leave a link to the new location behind.
pub fn swap_file_for_link(source: &Path, destination: &Path, link_type: LinkType) -> io::Result<()> {
    if !source.exists() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Source file does not exist: {}", source.display()),
        ));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::rename(source, destination)?;

    match link_type {
        LinkType::Hard => fs::hard_link(destination, source),
        #[cfg(unix)]
        LinkType::Symbolic => std::os::unix::fs::symlink(destination, source),
        #[cfg(not(unix))]
        LinkType::Symbolic => Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are only supported on unix",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replace_symlink_over_every_kind() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let target = temp_dir.path().join("target");
        fs::create_dir(&target)?;
        let link = temp_dir.path().join("last");

        // Directory in the way
        fs::create_dir(&link)?;
        fs::write(link.join("stale"), b"x")?;
        replace_symlink(&target, &link)?;
        assert_eq!(fs::read_link(&link)?, target);

        // Existing symlink
        let other = temp_dir.path().join("other");
        fs::create_dir(&other)?;
        replace_symlink(&other, &link)?;
        assert_eq!(fs::read_link(&link)?, other);

        // Plain file
        fs::remove_file(&link)?;
        fs::write(&link, b"file")?;
        replace_symlink(&target, &link)?;
        assert_eq!(fs::read_link(&link)?, target);
        Ok(())
    }

    #[test]
    fn test_remove_any_missing_is_ok() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        remove_any(&temp_dir.path().join("nothing"))
    }

    #[test]
    fn test_swap_file_for_hard_link() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("prev/db.sql.gz");
        let destination = temp_dir.path().join("cur/db.sql.gz");
        fs::create_dir(temp_dir.path().join("prev"))?;
        fs::write(&source, b"payload")?;

        swap_file_for_link(&source, &destination, LinkType::Hard)?;

        assert_eq!(fs::read(&destination)?, b"payload");
        assert_eq!(fs::read(&source)?, b"payload");
        assert!(!fs::symlink_metadata(&source)?.file_type().is_symlink());
        Ok(())
    }

    #[test]
    fn test_swap_file_for_symbolic_link() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("db.timestamp");
        let destination = temp_dir.path().join("cur/db.timestamp");
        fs::write(&source, b"2024-01-01T00:00:00")?;

        swap_file_for_link(&source, &destination, LinkType::Symbolic)?;

        assert_eq!(fs::read_link(&source)?, destination);
        assert_eq!(fs::read(&source)?, b"2024-01-01T00:00:00");
        Ok(())
    }

    #[test]
    fn test_swap_missing_source() {
        let err = swap_file_for_link(
            Path::new("/nonexistent/a"),
            Path::new("/nonexistent/b"),
            LinkType::Hard,
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
