use once_cell::sync::Lazy;
use std::{
    env,
    ffi::OsStr,
    path::PathBuf,
    process::Command,
    sync::atomic::{AtomicUsize, Ordering},
};

static NEXT_CONFIG: AtomicUsize = AtomicUsize::new(0);

static CLI_PATH: Lazy<PathBuf> = Lazy::new(|| {
    env::current_exe()
        .ok()
        .and_then(|path| Some(path.parent()?.parent()?.join("wr")))
        .expect("Could not resolve CLI executable from test executable")
});

/// Runs the `wr` binary against its own throwaway config file.
pub struct TestCli {
    config_path: PathBuf,
}

impl TestCli {
    pub fn new() -> Self {
        let config_path = env::temp_dir().join(format!(
            "wr-test-{}-{}.json",
            std::process::id(),
            NEXT_CONFIG.fetch_add(1, Ordering::SeqCst)
        ));
        Self { config_path }
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&*CLI_PATH);
        command
            .env("CLICOLOR", "0")
            .arg("--config-file")
            .arg(&self.config_path);
        command
    }

    pub fn run(&self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> String {
        let output = self.command().args(args).output().unwrap();

        if !output.status.success() {
            panic!(
                "failed to run command:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        String::from_utf8(output.stdout).unwrap()
    }

    pub fn run_and_error(&self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> String {
        let output = self.command().args(args).output().unwrap();

        if output.status.success() {
            panic!(
                "succeeded running command (expected failure):\n{}",
                String::from_utf8_lossy(&output.stdout)
            );
        }

        String::from_utf8(output.stderr).unwrap()
    }
}

impl Drop for TestCli {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.config_path);
    }
}
