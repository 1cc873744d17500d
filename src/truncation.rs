//! Truncation guard for oversized tool outputs (engine component C4).
//!
//! Tool output that exceeds either limit is clipped to a head or tail preview that
//! respects both limits simultaneously, the full content is spilled to a temp file, and
//! the preview is annotated with a recovery hint pointing back at it.

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEFAULT_MAX_LINES: usize = 2000;
const DEFAULT_MAX_BYTES: usize = 50 * 1024;
const OUTPUT_SUBDIR: &str = "open-agent-sdk-output";
const SWEEP_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Which end of the content to keep when truncating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Keep {
    #[default]
    Head,
    Tail,
}

/// Configuration for the truncation guard, constructed with sane engine defaults.
#[derive(Debug, Clone, Copy)]
pub struct TruncationConfig {
    pub max_lines: usize,
    pub max_bytes: usize,
    pub keep: Keep,
}

impl Default for TruncationConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            max_bytes: DEFAULT_MAX_BYTES,
            keep: Keep::Head,
        }
    }
}

/// Which limit (if any) triggered truncation, used to word the marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitHit {
    Lines,
    Bytes,
}

/// Check `content` against the configured limits, spilling to a temp file and returning
/// a replacement string if either limit is exceeded. Returns `content` unchanged
/// otherwise.
pub fn guard(content: &str, config: &TruncationConfig, temp_dir: &Path) -> Result<String> {
    let line_count = content.lines().count();
    let byte_count = content.len();

    if line_count <= config.max_lines && byte_count <= config.max_bytes {
        return Ok(content.to_string());
    }

    let limit_hit = if line_count > config.max_lines {
        LimitHit::Lines
    } else {
        LimitHit::Bytes
    };
    let unit = match limit_hit {
        LimitHit::Lines => "lines",
        LimitHit::Bytes => "bytes",
    };

    let lines: Vec<&str> = content.lines().collect();
    let preview_lines = select_slice(&lines, config);
    let preview = preview_lines.join("\n");

    let path = spill(content, temp_dir)?;

    let truncated_count = match limit_hit {
        LimitHit::Lines => line_count.saturating_sub(preview_lines.len()),
        LimitHit::Bytes => byte_count.saturating_sub(preview.len()),
    };
    let marker = format!("...{} {} truncated...", truncated_count, unit);
    let hint = format!(
        "Full output ({} bytes) saved to {}. Use the Read or Grep tools to inspect it.",
        byte_count,
        path.display()
    );

    let combined = match config.keep {
        Keep::Head => format!("{}\n{}\n{}", preview, marker, hint),
        Keep::Tail => format!("{}\n{}\n{}", hint, marker, preview),
    };
    Ok(combined)
}

/// Grow a head or tail slice of `lines`, line by line, until adding the next line would
/// violate either the line-count or byte-count limit.
fn select_slice<'a>(lines: &[&'a str], config: &TruncationConfig) -> Vec<&'a str> {
    let mut kept: Vec<&str> = Vec::new();
    let mut bytes = 0usize;

    let ordered: Box<dyn Iterator<Item = &&str>> = match config.keep {
        Keep::Head => Box::new(lines.iter()),
        Keep::Tail => Box::new(lines.iter().rev()),
    };

    for line in ordered {
        let next_bytes = bytes + line.len() + 1;
        if kept.len() + 1 > config.max_lines || next_bytes > config.max_bytes {
            break;
        }
        kept.push(line);
        bytes = next_bytes;
    }

    if config.keep == Keep::Tail {
        kept.reverse();
    }
    kept
}

fn spill(content: &str, temp_dir: &Path) -> Result<PathBuf> {
    let dir = temp_dir.join(OUTPUT_SUBDIR);
    std::fs::create_dir_all(&dir)?;

    let epoch_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix = random_base36(6);
    let path = dir.join(format!("tool_{}_{}.txt", epoch_millis, suffix));

    std::fs::write(&path, content)?;
    Ok(path)
}

fn random_base36(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rand::Rng::gen_range(&mut rng, 0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

/// Delete `tool_*.txt` files older than 7 days under `temp_dir`'s output subdirectory,
/// based on the epoch-millis embedded in the filename (not filesystem mtime, which
/// survives copies/restores that don't preserve it).
pub fn sweep_old_outputs(temp_dir: &Path) -> Result<usize> {
    let dir = temp_dir.join(OUTPUT_SUBDIR);
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let mut removed = 0;

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else { continue };
        let Some(epoch_millis) = parse_epoch_millis(name) else { continue };

        let age = now.saturating_sub(Duration::from_millis(epoch_millis));
        if age > SWEEP_MAX_AGE {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn parse_epoch_millis(file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix("tool_")?;
    let (millis_str, _) = rest.split_once('_')?;
    millis_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_within_limits_is_unchanged() {
        let config = TruncationConfig::default();
        let content = "line one\nline two";
        let dir = tempfile::tempdir().unwrap();
        let result = guard(content, &config, dir.path()).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn oversized_line_count_triggers_head_truncation() {
        let config = TruncationConfig {
            max_lines: 5,
            max_bytes: 1_000_000,
            keep: Keep::Head,
        };
        let content: String = (0..20).map(|i| format!("line{}\n", i)).collect();
        let dir = tempfile::tempdir().unwrap();
        let result = guard(content.trim_end(), &config, dir.path()).unwrap();

        assert!(result.starts_with("line0\nline1\nline2\nline3\nline4"));
        assert!(result.contains("truncated"));
        assert!(result.contains("Read or Grep"));
    }

    #[test]
    fn tail_keep_places_preview_after_hint() {
        let config = TruncationConfig {
            max_lines: 3,
            max_bytes: 1_000_000,
            keep: Keep::Tail,
        };
        let content: String = (0..10).map(|i| format!("line{}\n", i)).collect();
        let dir = tempfile::tempdir().unwrap();
        let result = guard(content.trim_end(), &config, dir.path()).unwrap();

        let hint_pos = result.find("saved to").unwrap();
        let preview_pos = result.find("line9").unwrap();
        assert!(hint_pos < preview_pos);
    }

    #[test]
    fn spill_writes_full_content_to_temp_file() {
        let config = TruncationConfig {
            max_lines: 1,
            max_bytes: 1_000_000,
            keep: Keep::Head,
        };
        let content = "a\nb\nc\nd\n";
        let dir = tempfile::tempdir().unwrap();
        let result = guard(content, &config, dir.path()).unwrap();
        assert!(result.contains("saved to"));

        let out_dir = dir.path().join(OUTPUT_SUBDIR);
        let files: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        let spilled = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(spilled, content);
    }

    #[test]
    fn sweep_removes_only_files_older_than_seven_days() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join(OUTPUT_SUBDIR);
        std::fs::create_dir_all(&out_dir).unwrap();

        let now_millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
        let old_millis = now_millis - Duration::from_secs(8 * 24 * 60 * 60).as_millis();

        std::fs::write(out_dir.join(format!("tool_{}_abc123.txt", old_millis)), "old").unwrap();
        std::fs::write(out_dir.join(format!("tool_{}_def456.txt", now_millis)), "new").unwrap();

        let removed = sweep_old_outputs(dir.path()).unwrap();
        assert_eq!(removed, 1);

        let remaining: Vec<_> = std::fs::read_dir(&out_dir).unwrap().collect();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn sweep_on_missing_directory_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(sweep_old_outputs(dir.path()).unwrap(), 0);
    }
}
