mod fixtures;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use clap::{crate_name, crate_version};
use fixtures::{Error, tmpdir};
use predicates::str::contains;
use rstest::rstest;
use std::process::Command;

#[test]
/// Show help and exit.
fn help_shows() -> Result<(), Error> {
    Command::cargo_bin("davserve")?
        .arg("-h")
        .assert()
        .success()
        .stdout(contains("--allow-anonymous"));

    Ok(())
}

#[test]
/// Show version and exit.
fn version_shows() -> Result<(), Error> {
    Command::cargo_bin("davserve")?
        .arg("-V")
        .assert()
        .success()
        .stdout(format!("{} {}\n", crate_name!(), crate_version!()));

    Ok(())
}

#[rstest]
#[case("bash", "_davserve()")]
#[case("zsh", "#compdef davserve")]
#[case("fish", "complete -c davserve")]
fn print_completions(#[case] shell: &str, #[case] marker: &str) -> Result<(), Error> {
    Command::cargo_bin("davserve")?
        .args(["--print-completions", shell])
        .assert()
        .success()
        .stdout(contains(marker));

    Ok(())
}

#[test]
fn print_manpage() -> Result<(), Error> {
    Command::cargo_bin("davserve")?
        .arg("--print-manpage")
        .assert()
        .success()
        .stdout(contains(".TH davserve"));

    Ok(())
}

#[test]
/// Refuse to start unless credentials or anonymous access are configured.
fn missing_credentials_fail() -> Result<(), Error> {
    let tmpdir = tmpdir();
    Command::cargo_bin("davserve")?
        .arg(tmpdir.path())
        .assert()
        .failure()
        .stderr(contains("No credentials configured"));

    Ok(())
}

#[rstest]
#[case(&["-u", "someone"])]
#[case(&["--password", "secret"])]
fn half_credentials_fail(#[case] args: &[&str]) -> Result<(), Error> {
    let tmpdir = tmpdir();
    Command::cargo_bin("davserve")?
        .arg(tmpdir.path())
        .args(args)
        .assert()
        .failure()
        .stderr(contains("must be given together"));

    Ok(())
}

#[rstest]
#[case("md5:abcd", "not a valid hashing method")]
#[case("sha256", "Expected sha256:hash or sha512:hash")]
#[case("sha256:xyz", "Expected hex code")]
fn bad_password_hash_fails(#[case] hash: &str, #[case] message: &str) -> Result<(), Error> {
    Command::cargo_bin("davserve")?
        .args(["-u", "someone", "--password-hash", hash])
        .assert()
        .failure()
        .stderr(contains(message));

    Ok(())
}

#[test]
/// A root that is a file cannot be served.
fn file_as_root_fails() -> Result<(), Error> {
    let tmpdir = tmpdir();
    Command::cargo_bin("davserve")?
        .arg(tmpdir.child("test.txt").path())
        .arg("--allow-anonymous")
        .assert()
        .failure()
        .stderr(contains("is not a directory"));

    Ok(())
}

#[test]
/// A missing root is created on startup.
fn missing_root_is_created() -> Result<(), Error> {
    let tmpdir = tmpdir();
    let root = tmpdir.child("fresh/root");

    let mut child = Command::cargo_bin("davserve")?
        .arg(root.path())
        .args(["-p", "0", "-i", "127.0.0.1", "--allow-anonymous", "-q"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    let start = std::time::Instant::now();
    while !root.path().is_dir() && start.elapsed().as_secs() < 10 {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    child.kill()?;
    child.wait()?;

    root.assert(predicates::path::is_dir());
    Ok(())
}

#[test]
/// Environment variables configure the server like flags do.
fn env_vars_configure() -> Result<(), Error> {
    let tmpdir = tmpdir();
    Command::cargo_bin("davserve")?
        .arg(tmpdir.path())
        .env("DAVSERVE_USERNAME", "someone")
        .assert()
        .failure()
        .stderr(contains("must be given together"));

    Ok(())
}
