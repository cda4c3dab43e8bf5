// ==========================================
// 定长监管报送文件导入系统 - 行来源
// ==========================================
// 职责: 按文件读取非空文本行
// 编码: 非 UTF-8 字节按 lossy 解码, 交由校验层报告
// ==========================================

use crate::importer::error::{IngestError, IngestResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

// ==========================================
// LineSource Trait
// ==========================================
pub trait LineSource: Send + Sync {
    /// 来源名称（日志 / 错误信息用）
    fn name(&self) -> &str;

    /// 读取全部非空行（去掉行尾换行符, 保持原样不 TRIM）
    fn read_lines(&self) -> IngestResult<Vec<String>>;
}

fn strip_line_ending(buf: &mut Vec<u8>) {
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

// ==========================================
// FileLineSource - 本地文件
// ==========================================
pub struct FileLineSource {
    path: PathBuf,
    name: String,
}

impl FileLineSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LineSource for FileLineSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_lines(&self) -> IngestResult<Vec<String>> {
        if !self.path.exists() {
            return Err(IngestError::FileNotFound(self.path.display().to_string()));
        }

        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| IngestError::FileReadError(format!("{}: {}", self.name, e)))?;
            if read == 0 {
                break;
            }
            strip_line_ending(&mut buf);
            let line = String::from_utf8_lossy(&buf).into_owned();
            // 跳过空白行
            if is_blank(&line) {
                continue;
            }
            lines.push(line);
        }

        Ok(lines)
    }
}

// ==========================================
// MemoryLineSource - 内存文本（测试 / 上游已下载内容）
// ==========================================
pub struct MemoryLineSource {
    name: String,
    lines: Vec<String>,
}

impl MemoryLineSource {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, text.lines().map(|l| l.to_string()).collect())
    }
}

impl LineSource for MemoryLineSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_lines(&self) -> IngestResult<Vec<String>> {
        Ok(self
            .lines
            .iter()
            .map(|l| l.trim_end_matches(['\r', '\n']).to_string())
            .filter(|l| !is_blank(l))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_source_skips_blank_lines_and_crlf() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"first\r\n\r\n   \nsecond\nthird").unwrap();

        let source = FileLineSource::new(file.path());
        let lines = source.read_lines().unwrap();
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_file_source_lossy_decodes_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc\xffdef\n").unwrap();

        let lines = FileLineSource::new(file.path()).read_lines().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("abc"));
        assert!(lines[0].ends_with("def"));
    }

    #[test]
    fn test_missing_file() {
        let source = FileLineSource::new("/definitely/not/here.txt");
        assert!(matches!(
            source.read_lines(),
            Err(IngestError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_memory_source() {
        let source = MemoryLineSource::from_text("mem", "a\n\nb\n");
        assert_eq!(source.read_lines().unwrap(), vec!["a", "b"]);
        assert_eq!(source.name(), "mem");
    }
}
