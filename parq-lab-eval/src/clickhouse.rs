//! ClickHouse through its command-line tools: `clickhouse-local` for querying Parquet files in
//! place and `clickhouse-client` for a running server.

use std::{
  env,
  ffi::OsStr,
  fs::File,
  io::{self, Read, Write},
  path::{Path, PathBuf},
  process::{Command, Stdio},
  thread,
};

use thiserror::Error;

pub const CLICKHOUSE_LOCAL: &str = "clickhouse-local";
pub const CLICKHOUSE_CLIENT: &str = "clickhouse-client";
/// Bytes written to `clickhouse-client` per write while streaming a Parquet file.
pub const INSERT_CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Error)]
pub enum ClickhouseError {
  #[error("Cannot find {0}. Is it in the PATH?")]
  ExecutableNotFound(String),
  #[error("Clickhouse password for user {0} not specified. Set CH_PASSWORD")]
  MissingPassword(String),
  #[error("{program} failed ({status}): {stderr}")]
  CommandFailed {
    program: String,
    status: std::process::ExitStatus,
    stderr: String,
  },
  #[error(transparent)]
  Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ClickhouseError>;

/// First executable file called `name` in the directories of `path_var`.
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
  env::split_paths(path_var)
    .map(|dir| dir.join(name))
    .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
  use std::os::unix::fs::PermissionsExt;
  path
    .metadata()
    .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
    .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
  path.is_file()
}

pub fn find_executable(name: &str) -> Result<PathBuf> {
  let path_var = env::var_os("PATH").unwrap_or_default();
  find_in_path(name, &path_var).ok_or_else(|| ClickhouseError::ExecutableNotFound(name.to_string()))
}

fn run(program: &Path, args: &[String]) -> Result<String> {
  let output = Command::new(program).args(args).output()?;
  if !output.status.success() {
    return Err(ClickhouseError::CommandFailed {
      program: program.display().to_string(),
      status: output.status,
      stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }
  Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Locate `name` on PATH and return it with its `--version` output.
pub fn check_executable(name: &str) -> Result<(PathBuf, String)> {
  let program = find_executable(name)?;
  let version = run(&program, &["--version".to_string()])?;
  tracing::info!(program = %program.display(), %version, "found executable");
  Ok((program, version))
}

fn quote(value: &str) -> String {
  format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// The `file()` table function over a Parquet file with an explicit structure.
pub fn file_source(path: &Path, structure: &str) -> String {
  format!(
    "file({}, Parquet, {})",
    quote(&path.display().to_string()),
    quote(structure)
  )
}

/// Run `sql` with `clickhouse-local` and return its trimmed output.
pub fn local_query(program: &Path, sql: &str) -> Result<String> {
  let sql = sql.replace('\n', " ");
  tracing::debug!(%sql, "clickhouse-local query");
  run(program, &["--query".to_string(), sql])
}

/// Connection settings for `clickhouse-client`.
#[derive(Debug, Clone)]
pub struct ClickhouseClient {
  pub program: PathBuf,
  pub host: String,
  pub user: String,
  pub password: Option<String>,
  pub database: Option<String>,
}

impl ClickhouseClient {
  pub fn new(host: impl Into<String>, user: impl Into<String>, password: Option<String>) -> Self {
    ClickhouseClient {
      program: PathBuf::from(CLICKHOUSE_CLIENT),
      host: host.into(),
      user: user.into(),
      password,
      database: None,
    }
  }

  pub fn with_program(mut self, program: PathBuf) -> Self {
    self.program = program;
    self
  }

  pub fn with_database(mut self, database: impl Into<String>) -> Self {
    self.database = Some(database.into());
    self
  }

  pub fn require_password(&self) -> Result<&str> {
    self
      .password
      .as_deref()
      .ok_or_else(|| ClickhouseError::MissingPassword(self.user.clone()))
  }

  fn args(&self, query: &str) -> Vec<String> {
    let mut args = vec![
      "--host".to_string(),
      self.host.clone(),
      "--user".to_string(),
      self.user.clone(),
    ];
    if let Some(password) = &self.password {
      args.push("--password".to_string());
      args.push(password.clone());
    }
    if let Some(database) = &self.database {
      args.push("--database".to_string());
      args.push(database.clone());
    }
    args.push("--query".to_string());
    args.push(query.replace('\n', " "));
    args
  }

  pub fn query(&self, sql: &str) -> Result<String> {
    tracing::debug!(host = %self.host, %sql, "clickhouse-client query");
    run(&self.program, &self.args(sql))
  }

  /// Stream a Parquet file into `table` through `INSERT ... FORMAT Parquet`.
  pub fn insert_parquet(&self, table: &str, parquet_file: &Path) -> Result<String> {
    let mut source = File::open(parquet_file)?;
    let mut child = Command::new(&self.program)
      .args(self.args(&format!("INSERT INTO {table} FORMAT Parquet")))
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()?;
    let mut stdin = child
      .stdin
      .take()
      .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "stdin not captured"))?;

    // The client drains stdout/stderr while we write, otherwise large outputs would block it.
    let writer = thread::spawn(move || -> io::Result<u64> {
      let mut buffer = vec![0; INSERT_CHUNK_SIZE];
      let mut sent = 0;
      loop {
        let read = source.read(&mut buffer)?;
        if read == 0 {
          break;
        }
        stdin.write_all(&buffer[..read])?;
        sent += read as u64;
      }
      stdin.flush()?;
      Ok(sent)
    });
    let output = child.wait_with_output()?;
    let written = writer
      .join()
      .map_err(|_| io::Error::new(io::ErrorKind::Other, "writer thread panicked"))?;

    // A client that exits early closes its stdin, so its stderr explains the broken pipe
    if !output.status.success() {
      return Err(ClickhouseError::CommandFailed {
        program: self.program.display().to_string(),
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    let sent = written?;
    tracing::info!(file = %parquet_file.display(), bytes = sent, table, "inserted parquet file");
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Insert every file in order, printing progress as `processing i/n file`.
  pub fn load_parquet_files(&self, table: &str, files: &[PathBuf]) -> Result<()> {
    let mut files = files.to_vec();
    files.sort();
    println!("There are {} files", files.len());
    for (idx, file) in files.iter().enumerate() {
      println!("processing {}/{} {}", idx + 1, files.len(), file.display());
      let output = self.insert_parquet(table, file)?;
      if !output.is_empty() {
        println!("{output}");
      }
    }
    Ok(())
  }
}
