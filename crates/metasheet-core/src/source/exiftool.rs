use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{MetadataFields, MetadataSource};
use crate::error::ExtractionError;

pub const DEFAULT_PROGRAM: &str = "exiftool";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON output, numeric values, decimal GPS coordinates with 6 places.
const TOOL_FLAGS: [&str; 4] = ["-j", "-n", "-c", "%.6f"];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs `exiftool` once per file.
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: PathBuf,
    /// Placed before the fixed flags.
    extra_args: Vec<String>,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_args(&self, path: &Path) -> Vec<OsString> {
        self.extra_args
            .iter()
            .map(OsString::from)
            .chain(TOOL_FLAGS.iter().map(OsString::from))
            .chain(std::iter::once(path.as_os_str().to_os_string()))
            .collect()
    }
}

impl MetadataSource for ExifTool {
    fn inspect(&self, path: &Path) -> Result<MetadataFields, ExtractionError> {
        let output = run_with_timeout(&self.program, &self.command_args(path), self.timeout)?;
        if !output.status.success() {
            return Err(ExtractionError::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        MetadataFields::parse_tool_output(&output.stdout)
    }

    fn name(&self) -> &str {
        DEFAULT_PROGRAM
    }
}

struct ToolOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(handle: JoinHandle<io::Result<Vec<u8>>>) -> Result<Vec<u8>, ExtractionError> {
    handle
        .join()
        .map_err(|_| io::Error::other("output reader panicked"))?
        .map_err(ExtractionError::from)
}

/// Run `program`, killing it once `timeout` elapses.
fn run_with_timeout(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
) -> Result<ToolOutput, ExtractionError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExtractionError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    // Pipes are drained on their own threads so a chatty child never blocks on a full pipe.
    let stdout = child
        .stdout
        .take()
        .map(drain)
        .ok_or_else(|| io::Error::other("stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .map(drain)
        .ok_or_else(|| io::Error::other("stderr not captured"))?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            debug!("{} killed after {:?}", program.display(), timeout);
            return Err(ExtractionError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(ToolOutput {
        status,
        stdout: collect(stdout)?,
        stderr: collect(stderr)?,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    /// `sh -c <script> exiftool <flags...> <path>`: the fixed flags land in `$1..$4`
    /// and the file path in `$5`.
    fn scripted(script: &str) -> ExifTool {
        ExifTool::new("sh").with_args(["-c", script, "exiftool"])
    }

    #[test]
    fn test_passes_flags_and_path() {
        let tool = scripted(r#"printf '[{"SourceFile":"%s","Flags":"%s %s %s %s"}]' "$5" "$1" "$2" "$3" "$4""#);
        let fields = tool.inspect(Path::new("/photos/IMG_0001.JPG")).unwrap();
        assert_eq!(fields.get("SourceFile"), Some(&json!("/photos/IMG_0001.JPG")));
        assert_eq!(fields.get("Flags"), Some(&json!("-j -n -c %.6f")));
    }

    #[test]
    fn test_no_output_is_empty() {
        let fields = scripted("true").inspect(Path::new("a.bin")).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn test_nonzero_exit() {
        let err = scripted("echo 'Unknown file type' >&2; exit 1")
            .inspect(Path::new("a.bin"))
            .unwrap_err();
        match err {
            ExtractionError::ExitStatus { stderr, .. } => assert_eq!(stderr, "Unknown file type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_output() {
        let err = scripted("echo not-json").inspect(Path::new("a.bin")).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[test]
    fn test_missing_program() {
        let err = ExifTool::new("/nonexistent/metasheet-exiftool")
            .inspect(Path::new("a.bin"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Spawn { .. }));
    }

    #[test]
    fn test_timeout_kills_child() {
        let tool = scripted("exec sleep 5").with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = tool.inspect(Path::new("a.bin")).unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
