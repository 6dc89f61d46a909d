//! Common functionality.

use std::{
    fs::File,
    io::BufRead,
    path::Path,
};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod table;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Read all lines of a text file into memory.
pub fn read_lines<P>(path: P) -> Result<Vec<String>, anyhow::Error>
where
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())
        .map_err(|e| anyhow::anyhow!("failed to open {:?}: {}", path.as_ref(), e))?;
    let lines = std::io::BufReader::new(file)
        .lines()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

/// Return the base name of `path` as a `String`.
pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Strip `suffix` from `value` if present, mirroring the pipeline's file
/// naming conventions (no-op if the suffix does not match).
pub fn snip(value: &str, suffix: &str) -> String {
    value
        .strip_suffix(suffix)
        .unwrap_or(value)
        .to_string()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    #[rstest::rstest]
    #[case("sample1.bam.duplicate_metrics", ".duplicate_metrics", "sample1.bam")]
    #[case("sample1.alignstats", ".alignstats", "sample1")]
    #[case("sample1.alignstats", ".bam", "sample1.alignstats")]
    fn snip(#[case] value: &str, #[case] suffix: &str, #[case] expected: &str) {
        assert_eq!(super::snip(value, suffix), expected);
    }

    #[test]
    fn basename() {
        assert_eq!(super::basename("a/b/sample1.alignstats"), "sample1.alignstats");
        assert_eq!(super::basename("sample1.alignstats"), "sample1.alignstats");
    }

    #[test]
    fn read_lines() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("lines.txt");
        std::fs::write(&path, "first\nsecond\n\nfourth\n")?;

        let lines = super::read_lines(&path)?;
        assert_eq!(lines, vec!["first", "second", "", "fourth"]);

        Ok(())
    }
}
