mod fixtures;

use fixtures::{Error, PASSWORD, TestServer, USERNAME, authenticated_server, server};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use rstest::rstest;

static SHA256_PASSWORD: &str =
    "sha256:9f735e0df9a1ddc702bf0a1a7b83033f9f7153a00c29de82cedadc9957289b05";
static SHA512_PASSWORD: &str = "sha512:e9e633097ab9ceb3e48ec3f70ee2beba41d05d5420efee5da85f97d97005727587fda33ef4ff2322088f4c79e8133cc9cd9f3512f4d3a303cbdb5bc585415a00";

#[rstest]
fn plain_credentials_are_accepted(
    #[from(authenticated_server)] server: TestServer,
) -> Result<(), Error> {
    let resp = Client::new()
        .get(server.url())
        .basic_auth(USERNAME, Some(PASSWORD))
        .send()?;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text()?.contains("Index of /"));
    Ok(())
}

#[rstest]
#[case(SHA256_PASSWORD)]
#[case(SHA512_PASSWORD)]
fn hashed_credentials_are_accepted(#[case] hash: &str) -> Result<(), Error> {
    let server = server(&["-u", USERNAME, "--password-hash", hash]);
    let client = Client::new();

    let resp = client
        .get(server.url())
        .basic_auth(USERNAME, Some(PASSWORD))
        .send()?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(server.url())
        .basic_auth(USERNAME, Some("not the password"))
        .send()?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[rstest]
#[case(None, None)]
#[case(Some(USERNAME), Some("wrong"))]
#[case(Some("intruder"), Some(PASSWORD))]
#[case(Some(USERNAME), None)]
fn bad_credentials_are_challenged(
    #[from(authenticated_server)] server: TestServer,
    #[case] username: Option<&str>,
    #[case] password: Option<&str>,
) -> Result<(), Error> {
    let mut request = Client::new().get(server.url());
    if let Some(username) = username {
        request = request.basic_auth(username, password);
    }
    let resp = request.send()?;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers()["www-authenticate"],
        "Basic realm=\"WebDAV\""
    );
    Ok(())
}

#[rstest]
fn repeated_failures_block_the_client(
    #[with(&["-u", USERNAME, "--password", PASSWORD, "--max-failed-attempts", "2"])]
    server: TestServer,
) -> Result<(), Error> {
    let client = Client::new();
    let attempt = |password: &str| {
        client
            .get(server.url())
            .basic_auth(USERNAME, Some(password))
            .send()
            .map(|resp| resp.status())
    };

    assert_eq!(attempt("wrong")?, StatusCode::UNAUTHORIZED);
    assert_eq!(attempt("wrong")?, StatusCode::UNAUTHORIZED);

    // Blocked clients are refused before credentials are looked at
    assert_eq!(attempt(PASSWORD)?, StatusCode::FORBIDDEN);
    Ok(())
}

#[rstest]
fn block_expires(
    #[with(&[
        "-u", USERNAME, "--password", PASSWORD,
        "--max-failed-attempts", "1", "--block-duration", "1",
    ])]
    server: TestServer,
) -> Result<(), Error> {
    let client = Client::new();
    let attempt = |password: &str| {
        client
            .get(server.url())
            .basic_auth(USERNAME, Some(password))
            .send()
            .map(|resp| resp.status())
    };

    assert_eq!(attempt("wrong")?, StatusCode::UNAUTHORIZED);
    assert_eq!(attempt(PASSWORD)?, StatusCode::FORBIDDEN);

    std::thread::sleep(std::time::Duration::from_millis(1500));
    assert_eq!(attempt(PASSWORD)?, StatusCode::OK);
    Ok(())
}

#[rstest]
fn anonymous_access_skips_credentials(
    #[with(&["-u", USERNAME, "--password", PASSWORD, "--allow-anonymous"])] server: TestServer,
) -> Result<(), Error> {
    let resp = Client::new().get(server.url()).send()?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

#[rstest]
#[case(&["--allow-anonymous", "--enable-ip-whitelist", "--whitelist", "127.0.0.1"], StatusCode::OK)]
#[case(&["--allow-anonymous", "--enable-ip-whitelist", "--whitelist", "127.0.0.0/8"], StatusCode::OK)]
#[case(&["--allow-anonymous", "--enable-ip-whitelist", "--whitelist", "10.0.0.0/8"], StatusCode::FORBIDDEN)]
#[case(&["--allow-anonymous", "--whitelist", "10.0.0.0/8"], StatusCode::OK)]
fn whitelist_gates_clients(
    #[case] args: &[&str],
    #[case] expected: StatusCode,
) -> Result<(), Error> {
    let server = server(args);
    let resp = Client::new().get(server.url()).send()?;
    assert_eq!(resp.status(), expected);
    Ok(())
}
