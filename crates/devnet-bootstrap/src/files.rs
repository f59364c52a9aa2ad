//! File writing helpers.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// Writes a file readable only by its owner, replacing existing content.
pub(crate) fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    // The mode above only applies when the file is created.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn mode(path: &Path) -> u32 {
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn private_files_are_owner_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("password.txt");
        std::fs::write(&path, "old").unwrap();

        write_private(&path, b"secret\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "secret\n");
        assert_eq!(mode(&path), 0o600);
    }
}
