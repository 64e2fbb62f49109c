use std::ffi::OsStr;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use assert_fs::fixture::TempDir;
use assert_fs::prelude::*;
use port_check::{free_local_port, is_port_reachable};
use rstest::fixture;

/// Error type used by tests
pub type Error = Box<dyn std::error::Error>;

/// Credentials of [`authenticated_server`]
pub static USERNAME: &str = "testuser";
pub static PASSWORD: &str = "testpassword";

/// File names for testing purpose
#[allow(dead_code)]
pub static FILES: &[&str] = &["test.txt", "test.html", "test \" ' & < >.csv"];

/// Directory names for testing purpose
#[allow(dead_code)]
pub static DIRECTORIES: &[&str] = &["dira/", "dirb/"];

/// Test fixture which creates a temporary directory with a few files and directories inside.
/// The directories also contain files.
#[fixture]
pub fn tmpdir() -> TempDir {
    let tmpdir = assert_fs::TempDir::new().expect("Couldn't create a temp dir for tests");
    for &file in FILES {
        tmpdir
            .child(file)
            .write_str("Test Hello Yes")
            .expect("Couldn't write to file");
    }
    for &directory in DIRECTORIES {
        for &file in FILES {
            tmpdir
                .child(format!("{directory}{file}"))
                .write_str(&format!("This is {directory}{file}"))
                .expect("Couldn't write to file");
        }
    }
    tmpdir
}

/// Get a free port.
#[fixture]
pub fn port() -> u16 {
    free_local_port().expect("Couldn't find a free local port")
}

/// Run the server on a free port, serving a fresh [`tmpdir`].
///
/// The server refuses to start without credentials or `--allow-anonymous` in `args`.
#[fixture]
pub fn server<I>(#[default(&[] as &[&str])] args: I) -> TestServer
where
    I: IntoIterator + Clone,
    I::Item: AsRef<OsStr>,
{
    let port = port();
    let tmpdir = tmpdir();
    let child = Command::cargo_bin("davserve")
        .expect("Couldn't find test binary")
        .arg(tmpdir.path())
        .arg("-p")
        .arg(port.to_string())
        .arg("-i")
        .arg("127.0.0.1")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Couldn't run test binary");

    wait_for_port(port);
    TestServer::new(port, tmpdir, child)
}

/// Same as [`server`] but with anonymous access.
#[fixture]
#[allow(dead_code)]
pub fn anonymous_server() -> TestServer {
    server(&["--allow-anonymous"])
}

/// Same as [`server`] but requiring [`USERNAME`] and [`PASSWORD`].
#[fixture]
#[allow(dead_code)]
pub fn authenticated_server() -> TestServer {
    server(&["-u", USERNAME, "--password", PASSWORD])
}

fn wait_for_port(port: u16) {
    let start = Instant::now();
    while !is_port_reachable(("127.0.0.1", port)) {
        sleep(Duration::from_millis(100));
        if start.elapsed().as_secs() > 10 {
            panic!("timeout waiting for port {port}");
        }
    }
}

pub struct TestServer {
    port: u16,
    tmpdir: TempDir,
    child: Child,
}

#[allow(dead_code)]
impl TestServer {
    pub fn new(port: u16, tmpdir: TempDir, child: Child) -> Self {
        Self {
            port,
            tmpdir,
            child,
        }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn path(&self) -> &Path {
        self.tmpdir.path()
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
