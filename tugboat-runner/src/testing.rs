//! Recording fakes of the external tool traits

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tugboat_core::domain::release::ReleaseIdentifier;

use crate::tools::{BuildTool, DeployRequest, DeployTool, SourceControl, ToolOutput};

/// Fake build, source control and deploy tools that record every call
///
/// Calls are recorded as short strings such as `"run_tests"`,
/// `"deploy eu v1.2.3"` or `"status eu"`.
pub(crate) struct FakeTools {
    pub branch: String,
    pub tags: Vec<String>,
    pub fail_tests: bool,
    pub fail_image: bool,
    pub fail_tag: bool,
    pub fail_deploy: HashSet<String>,
    pub fail_status: HashSet<String>,
    pub deploy_delay: Duration,
    calls: Mutex<Vec<String>>,
    access_seen: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            branch: "main".to_string(),
            tags: Vec::new(),
            fail_tests: false,
            fail_image: false,
            fail_tag: false,
            fail_deploy: HashSet::new(),
            fail_status: HashSet::new(),
            deploy_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            access_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn failing_deploy(mut self, environment: &str) -> Self {
        self.fail_deploy.insert(environment.to_string());
        self
    }

    pub fn failing_status(mut self, environment: &str) -> Self {
        self.fail_status.insert(environment.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls whose name starts with `prefix`
    pub fn calls_to(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Credential file contents observed by deploy/status calls, per call
    pub fn access_seen(&self) -> Vec<(String, Option<String>)> {
        self.access_seen.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn observe(&self, environment: &str, access: &Path) {
        let contents = std::fs::read_to_string(access).ok();
        self.access_seen
            .lock()
            .unwrap()
            .push((environment.to_string(), contents));
    }

    fn output(fail: bool) -> ToolOutput {
        ToolOutput {
            exit_code: if fail { 1 } else { 0 },
            stdout: String::new(),
            stderr: if fail {
                "simulated failure".to_string()
            } else {
                String::new()
            },
        }
    }
}

#[async_trait]
impl BuildTool for FakeTools {
    async fn run_tests(&self) -> io::Result<ToolOutput> {
        self.record("run_tests".to_string());
        Ok(Self::output(self.fail_tests))
    }

    async fn build_and_push_image(
        &self,
        repository: &str,
        release: &ReleaseIdentifier,
        _registry_auth: Option<&Path>,
    ) -> io::Result<ToolOutput> {
        self.record(format!("build_and_push_image {}:{}", repository, release));
        Ok(Self::output(self.fail_image))
    }
}

#[async_trait]
impl SourceControl for FakeTools {
    async fn current_branch(&self) -> io::Result<String> {
        self.record("current_branch".to_string());
        Ok(self.branch.clone())
    }

    async fn list_tags(&self) -> io::Result<Vec<String>> {
        self.record("list_tags".to_string());
        Ok(self.tags.clone())
    }

    async fn create_and_push_tag(
        &self,
        release: &ReleaseIdentifier,
        _auth: Option<&Path>,
    ) -> io::Result<ToolOutput> {
        self.record(format!("create_and_push_tag {}", release));
        Ok(Self::output(self.fail_tag))
    }
}

#[async_trait]
impl DeployTool for FakeTools {
    async fn deploy(&self, request: &DeployRequest<'_>, access: &Path) -> io::Result<ToolOutput> {
        self.record(format!("deploy {} {}", request.environment, request.release));
        self.observe(request.environment, access);
        if !self.deploy_delay.is_zero() {
            tokio::time::sleep(self.deploy_delay).await;
        }
        Ok(Self::output(self.fail_deploy.contains(request.environment)))
    }

    async fn status(&self, environment: &str, access: &Path) -> io::Result<ToolOutput> {
        self.record(format!("status {}", environment));
        self.observe(environment, access);
        Ok(Self::output(self.fail_status.contains(environment)))
    }
}
