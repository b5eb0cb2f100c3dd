//! Recording doubles for handler tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::accounts::AccountDatabase;
use super::privilege::PrivilegeGate;
use super::registry::HandlerContext;
use crate::command::CommandRunner;
use crate::download::{ArtifactFetcher, DownloadTask};
use crate::error::{HelperError, HelperResult};

/// Runner that records commands and reports every program as present.
#[derive(Clone, Default)]
pub struct Recorder {
    commands: Arc<Mutex<Vec<String>>>,
    missing: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Make `exists(program)` return false.
    pub fn hide(&self, program: &str) {
        self.missing.lock().unwrap().push(program.to_string());
    }
}

impl CommandRunner for Recorder {
    fn run(&self, command: &str) -> HelperResult<String> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(String::new())
    }

    fn exists(&self, program: &str) -> bool {
        !self.missing.lock().unwrap().iter().any(|p| p == program)
    }
}

pub struct FixedGate(pub bool);

impl PrivilegeGate for FixedGate {
    fn is_privileged(&self) -> bool {
        self.0
    }

    fn escalate(&self) -> HelperResult<()> {
        Err(HelperError::PrivilegeFailure("escalation disabled in tests".to_string()))
    }
}

/// Empty account database.
pub struct NoAccounts;

impl AccountDatabase for NoAccounts {
    fn user_exists(&self, _name: &str) -> bool {
        false
    }

    fn group_exists(&self, _name: &str) -> bool {
        false
    }

    fn ids(&self, _name: &str) -> Option<(u32, u32)> {
        None
    }
}

pub fn context(privileged: bool) -> (HandlerContext, Recorder) {
    let recorder = Recorder::default();
    let ctx = HandlerContext {
        runner: Arc::new(recorder.clone()),
        privilege: Arc::new(FixedGate(privileged)),
        accounts: Arc::new(NoAccounts),
    };
    (ctx, recorder)
}

/// Fetcher writing the same body for every URL.
pub struct StaticFetcher {
    scratch: PathBuf,
    body: String,
    urls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(scratch: PathBuf, body: &str) -> Self {
        fs::create_dir_all(&scratch).unwrap();
        Self {
            scratch,
            body: body.to_string(),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl ArtifactFetcher for StaticFetcher {
    fn fetch(&self, url: &str, dest_name: &str) -> HelperResult<PathBuf> {
        self.fetch_task(&DownloadTask::new(url, self.scratch.join(dest_name)))
    }

    fn fetch_task(&self, task: &DownloadTask) -> HelperResult<PathBuf> {
        self.urls.lock().unwrap().push(task.url.clone());
        fs::write(&task.destination, &self.body).unwrap();
        Ok(task.destination.clone())
    }

    fn scratch_dir(&self) -> &Path {
        &self.scratch
    }
}
