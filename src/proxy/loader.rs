//! Address list loading and export

use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::Path;

/// Split text into proxy addresses.
///
/// Lines are trimmed and blank lines dropped. Order and duplicates are kept;
/// no syntax check happens here, the connector decides what it can parse.
pub fn parse_addresses(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read addresses from a file
pub fn load_addresses<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read address list {:?}", path))?;
    Ok(parse_addresses(&content))
}

/// Write one address per line
pub fn save_addresses<P: AsRef<Path>>(addresses: &[String], path: P) -> Result<()> {
    let path = path.as_ref();
    let content: String = addresses.iter().map(|a| format!("{}\n", a)).collect();
    fs::write(path, content).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_drops_blank_lines() {
        let content = "  1.1.1.1:8080  \n\n\t\n2.2.2.2:3128\r\nbad addr\n";
        assert_eq!(
            parse_addresses(content),
            vec!["1.1.1.1:8080", "2.2.2.2:3128", "bad addr"]
        );
    }

    #[test]
    fn test_parse_keeps_duplicates_and_order() {
        let content = "b:2\na:1\nb:2\n";
        assert_eq!(parse_addresses(content), vec!["b:2", "a:1", "b:2"]);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_addresses("").is_empty());
        assert!(parse_addresses("\n   \n").is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("good.txt");
        let addresses = vec!["1.1.1.1:8080".to_string(), "socks.example:1080".to_string()];

        save_addresses(&addresses, &path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1.1.1.1:8080\nsocks.example:1080\n"
        );
        assert_eq!(load_addresses(&path).unwrap(), addresses);
    }

    #[test]
    fn test_save_empty_list_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        save_addresses(&[], &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_addresses(dir.path().join("missing.txt")).unwrap_err();
        assert!(err.to_string().contains("failed to read address list"));
    }
}
