// ABOUTME: Packages a code payload as a single-entry tar archive for container transfer
// ABOUTME: The archive carries exactly one file, the sandbox image's entry script

use std::io::Cursor;
use tar::{Builder, Header};

/// Entry script filename inside the execution environment's code directory.
pub const ENTRY_FILENAME: &str = "main.py";

/// Build an in-memory tar archive holding the code as the entry script.
/// Content goes in as-is; isolation is environmental, not content-based.
pub fn package_code(code: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut archive = Builder::new(Vec::new());

    let mut header = Header::new_gnu();
    header.set_size(code.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    archive.append_data(&mut header, ENTRY_FILENAME, Cursor::new(code))?;

    archive.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tar::Archive;

    #[test]
    fn archive_holds_single_entry_script() {
        let code = b"print('hello')\n";
        let data = package_code(code).unwrap();

        let mut archive = Archive::new(data.as_slice());
        let mut entries = archive.entries().unwrap();

        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some(ENTRY_FILENAME));

        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, code);

        assert!(entries.next().is_none());
    }

    #[test]
    fn empty_code_is_still_packaged() {
        let data = package_code(b"").unwrap();
        let mut archive = Archive::new(data.as_slice());
        assert_eq!(archive.entries().unwrap().count(), 1);
    }
}
