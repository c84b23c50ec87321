use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use loupe_core::tool::{Error as ToolError, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tokio::task::spawn_blocking;
use tokio::time::timeout;

const IMPORTERS_PROGRAM: &str = "tldr";
const IMPORTERS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileParameters {
    #[schemars(description = "Absolute path to the file to read.")]
    path: String,
    #[schemars(
        description = "First line to read (1-indexed, inclusive), default \
                       to 1.",
        range(min = 1)
    )]
    start_line: Option<usize>,
    #[schemars(
        description = "Last line to read (inclusive). Reads to the end if \
                       not set.",
        range(min = 1)
    )]
    end_line: Option<usize>,
}

/// A tool for reading file content with line numbers.
///
/// The output is headed by the path, the line range when only part of the
/// file is read, and the files importing the module when an `importers`
/// scanner is installed.
#[derive(Clone, Debug)]
pub struct ReadFileTool {
    importers_program: String,
}

impl ReadFileTool {
    /// Creates a new read file tool.
    #[inline]
    pub fn new() -> Self {
        Self {
            importers_program: IMPORTERS_PROGRAM.to_owned(),
        }
    }

    /// Sets the program asked for the importers of a module, `tldr` by
    /// default.
    #[inline]
    pub fn with_importers_program<S: Into<String>>(
        mut self,
        program: S,
    ) -> Self {
        self.importers_program = program.into();
        self
    }
}

impl Default for ReadFileTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFileParameters;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Supports reading specific line ranges."
    }

    fn execute(
        &self,
        input: ReadFileParameters,
    ) -> impl Future<Output = Result<String, ToolError>> + Send + 'static {
        let program = self.importers_program.clone();
        async move {
            if !Path::new(&input.path).is_absolute() {
                return Err(ToolError::tool(format!(
                    "Path must be absolute. Got '{}'.",
                    input.path
                )));
            }

            let path = input.path.clone();
            let content = spawn_blocking(move || read_text(&path))
                .await
                .map_err(|err| {
                    ToolError::unexpected("JoinError", err.to_string())
                })??;

            let mut section = Section::new(&input, &content)?;
            section.importers =
                find_importers(&program, Path::new(&input.path)).await;
            Ok(section.to_string())
        }
    }
}

fn read_text(path: &str) -> Result<String, ToolError> {
    let metadata = fs::metadata(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ToolError::tool(format!(
            "File '{path}' not found. Check the path exists."
        )),
        ErrorKind::PermissionDenied => {
            ToolError::tool(format!("Permission denied reading '{path}'."))
        }
        _ => err.into(),
    })?;
    if !metadata.is_file() {
        return Err(ToolError::tool(format!(
            "Path '{path}' is not a file. Use a file path."
        )));
    }

    let bytes = fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::PermissionDenied => {
            ToolError::tool(format!("Permission denied reading '{path}'."))
        }
        _ => err.into(),
    })?;
    String::from_utf8(bytes).map_err(|_| {
        ToolError::tool(format!("File '{path}' is not valid UTF-8 text."))
    })
}

struct Section<'a> {
    path: &'a str,
    // 1-based, inclusive.
    start_line: usize,
    end_line: usize,
    total_lines: usize,
    show_range: bool,
    lines: Vec<&'a str>,
    importers: Vec<String>,
}

impl<'a> Section<'a> {
    fn new(
        input: &'a ReadFileParameters,
        content: &'a str,
    ) -> Result<Self, ToolError> {
        let lines: Vec<_> = content.lines().collect();
        let total_lines = lines.len();
        let start_line = input.start_line.unwrap_or(1).max(1);
        if start_line > total_lines {
            return Err(ToolError::tool(format!(
                "Start line {start_line} exceeds file length ({total_lines})."
            )));
        }
        let end_line = input
            .end_line
            .map_or(total_lines, |end| end.min(total_lines));

        let lines = if end_line >= start_line {
            lines[start_line - 1..end_line].to_vec()
        } else {
            Vec::new()
        };
        Ok(Self {
            path: &input.path,
            start_line,
            end_line,
            total_lines,
            show_range: input.end_line.is_some() || start_line > 1,
            lines,
            importers: Vec::new(),
        })
    }
}

impl std::fmt::Display for Section<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[file: {}]", self.path)?;
        if self.show_range {
            writeln!(
                f,
                "[lines: {}-{} of {}]",
                self.start_line, self.end_line, self.total_lines
            )?;
        }
        if !self.importers.is_empty() {
            writeln!(f, "[used_by: {}]", self.importers.join(", "))?;
        }
        writeln!(f)?;
        for (offset, line) in self.lines.iter().enumerate() {
            if offset > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {line}", self.start_line + offset)?;
        }
        Ok(())
    }
}

/// Asks `program` for the non-test files importing the module at `path`.
///
/// Any failure of the scanner yields an empty list.
async fn find_importers(program: &str, path: &Path) -> Vec<String> {
    let Some(module) = module_name(path) else {
        return Vec::new();
    };
    let output = Command::new(program)
        .args(["importers", &module, "."])
        .kill_on_drop(true)
        .output();

    let output = match timeout(IMPORTERS_TIMEOUT, output).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            debug!("failed to run {program}: {err}");
            return Vec::new();
        }
        Err(_) => {
            debug!("{program} timed out looking for importers of {module}");
            return Vec::new();
        }
    };
    if !output.status.success() {
        debug!("{program} exited with {}", output.status);
        return Vec::new();
    }
    parse_importers(&output.stdout)
}

fn module_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem == "__init__" {
        let parent = path.parent()?.file_name()?.to_str()?;
        return Some(parent.to_owned());
    }
    Some(stem.to_owned())
}

fn parse_importers(stdout: &[u8]) -> Vec<String> {
    let Ok(report) = serde_json::from_slice::<Value>(stdout) else {
        return Vec::new();
    };
    let Some(items) = report.get("importers").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut importers: Vec<String> = Vec::new();
    for file in items
        .iter()
        .filter_map(|item| item.get("file").and_then(Value::as_str))
    {
        let is_test = file.starts_with("tests/") || file.contains("test_");
        if !file.is_empty()
            && !is_test
            && !importers.iter().any(|seen| seen == file)
        {
            importers.push(file.to_owned());
        }
    }
    importers
}
