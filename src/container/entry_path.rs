use camino::Utf8PathBuf;
use thiserror::Error;

/// Cabinets written for Windows use backslashes, so both separators are accepted.
const SEPARATORS: [char; 2] = ['/', '\\'];

/// The separator entry names are written with.
pub const ENTRY_SEPARATOR: char = '\\';

#[derive(Debug, Error, Eq, PartialEq)]
pub enum UnsafeEntryPath {
    #[error("entry name is empty")]
    Empty,
    #[error("entry {0:?} is an absolute path")]
    Absolute(String),
    #[error("entry {0:?} escapes the destination folder")]
    ParentTraversal(String),
    #[error("entry {0:?} contains a drive or stream separator")]
    Colon(String),
}

/// Splits a container entry name into its path components, rejecting any name that could
/// resolve outside the folder it is extracted into.
///
/// `.` components and repeated separators are dropped. `..` is rejected wherever it appears,
/// even where it would collapse to a path inside the destination (`a/../b`).
pub fn entry_components(name: &str) -> Result<Vec<&str>, UnsafeEntryPath> {
    if name.is_empty() {
        return Err(UnsafeEntryPath::Empty);
    }

    if name.starts_with(SEPARATORS) {
        return Err(UnsafeEntryPath::Absolute(name.to_owned()));
    }

    let mut components = Vec::new();
    for component in name.split(SEPARATORS) {
        match component {
            "" | "." => {}
            ".." => return Err(UnsafeEntryPath::ParentTraversal(name.to_owned())),
            component if component.contains(':') => {
                return Err(UnsafeEntryPath::Colon(name.to_owned()));
            }
            component => components.push(component),
        }
    }

    if components.is_empty() {
        return Err(UnsafeEntryPath::Empty);
    }

    Ok(components)
}

/// Resolves an entry name to a path relative to the extraction folder.
pub fn relative_entry_path(name: &str) -> Result<Utf8PathBuf, UnsafeEntryPath> {
    entry_components(name).map(|components| components.into_iter().collect())
}

/// The name an entry is stored under inside a cabinet.
pub fn cabinet_entry_name(name: &str) -> Result<String, UnsafeEntryPath> {
    entry_components(name).map(|components| components.join(&ENTRY_SEPARATOR.to_string()))
}

/// A case-insensitive key identifying the file an entry extracts to.
pub fn collision_key(name: &str) -> Result<String, UnsafeEntryPath> {
    entry_components(name).map(|components| components.join("/").to_lowercase())
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use rstest::rstest;

    use super::{UnsafeEntryPath, cabinet_entry_name, collision_key, relative_entry_path};

    #[rstest]
    #[case("a.txt", "a.txt")]
    #[case("redist/vc_redist.x64.exe", "redist/vc_redist.x64.exe")]
    #[case(r"redist\vc_redist.x64.exe", "redist/vc_redist.x64.exe")]
    #[case("./nested//file.msi", "nested/file.msi")]
    fn accepted(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(relative_entry_path(name).unwrap(), Utf8PathBuf::from(expected));
    }

    #[rstest]
    #[case("../../evil.exe")]
    #[case(r"..\..\evil.exe")]
    #[case("payloads/../../evil.exe")]
    #[case("payloads/..")]
    fn parent_traversal(#[case] name: &str) {
        assert_eq!(
            relative_entry_path(name),
            Err(UnsafeEntryPath::ParentTraversal(name.to_owned()))
        );
    }

    #[rstest]
    #[case("/etc/passwd")]
    #[case(r"\Windows\System32\evil.dll")]
    fn absolute(#[case] name: &str) {
        assert_eq!(
            relative_entry_path(name),
            Err(UnsafeEntryPath::Absolute(name.to_owned()))
        );
    }

    #[rstest]
    #[case(r"C:\evil.exe")]
    #[case("setup.exe:Zone.Identifier")]
    fn colon(#[case] name: &str) {
        assert_eq!(
            relative_entry_path(name),
            Err(UnsafeEntryPath::Colon(name.to_owned()))
        );
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("./")]
    fn empty(#[case] name: &str) {
        assert_eq!(relative_entry_path(name), Err(UnsafeEntryPath::Empty));
    }

    #[test]
    fn cabinet_names_use_backslashes() {
        assert_eq!(cabinet_entry_name("a/b/c.dll").unwrap(), r"a\b\c.dll");
    }

    #[test]
    fn collision_keys_ignore_case_and_separator() {
        assert_eq!(
            collision_key(r"Redist\Setup.EXE").unwrap(),
            collision_key("redist/setup.exe").unwrap()
        );
    }
}
