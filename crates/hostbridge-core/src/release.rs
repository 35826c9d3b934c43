use semver::Version;
use serde::Deserialize;
use thiserror::Error;

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = "hostbridge";

/// GitHub repository that publishes release payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFeed {
    pub repo: String,
    pub api_base: String,
}

impl ReleaseFeed {
    #[must_use]
    pub fn github(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            api_base: GITHUB_API.to_string(),
        }
    }

    #[must_use]
    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repo
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct AvailableUpdate {
    pub current_version: String,
    pub latest_version: String,
    pub release_url: String,
    /// `None` when the release carries no verifiable payload for this platform.
    pub asset: Option<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
    size: u64,
    #[serde(default)]
    digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    html_url: String,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Error)]
pub enum ReleaseCheckError {
    #[error("failed to check for update: {0}")]
    Request(#[source] reqwest::Error),
    #[error("update check failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse release response: {0}")]
    Parse(#[source] reqwest::Error),
}

/// Payload name published for the running platform, if there is one.
#[must_use]
pub fn asset_name(version: &str) -> Option<String> {
    let name = if cfg!(target_os = "macos") && cfg!(target_arch = "aarch64") {
        format!("hostbridge-{version}-macos-arm64.zip")
    } else if cfg!(target_os = "macos") && cfg!(target_arch = "x86_64") {
        format!("hostbridge-{version}-macos-x64.zip")
    } else if cfg!(target_os = "linux") && cfg!(target_arch = "x86_64") {
        format!("hostbridge-{version}-linux-x64.zip")
    } else if cfg!(target_os = "linux") && cfg!(target_arch = "aarch64") {
        format!("hostbridge-{version}-linux-arm64.zip")
    } else if cfg!(target_os = "windows") && cfg!(target_arch = "x86_64") {
        format!("hostbridge-{version}-windows-x64.msi")
    } else {
        return None;
    };
    Some(name)
}

/// Look up the latest release and report it when it is newer than
/// `current_version`.
///
/// # Errors
/// Returns an error when the request fails, the API answers with a non-success
/// status, or the response cannot be parsed.
pub async fn check_latest(
    client: &reqwest::Client,
    feed: &ReleaseFeed,
    current_version: &str,
) -> Result<Option<AvailableUpdate>, ReleaseCheckError> {
    let response = client
        .get(feed.latest_release_url())
        .header("User-Agent", USER_AGENT)
        .send()
        .await
        .map_err(ReleaseCheckError::Request)?;

    if !response.status().is_success() {
        let status = response.status();
        let body_snippet = response
            .text()
            .await
            .ok()
            .map(|body| response_snippet(&body, 160))
            .unwrap_or_default();
        return Err(ReleaseCheckError::HttpStatus {
            status,
            body_snippet,
        });
    }

    let release: GitHubRelease = response.json().await.map_err(ReleaseCheckError::Parse)?;

    let latest = release
        .tag_name
        .strip_prefix('v')
        .unwrap_or(&release.tag_name);
    let current = current_version.strip_prefix('v').unwrap_or(current_version);

    if !is_newer_version(latest, current) {
        return Ok(None);
    }

    let asset = asset_name(latest).and_then(|expected| {
        release
            .assets
            .iter()
            .find(|asset| asset.name == expected)
            .and_then(|asset| {
                let sha256 = parse_sha256_digest(asset.digest.as_deref()?)?;
                Some(ReleaseAsset {
                    name: asset.name.clone(),
                    download_url: asset.browser_download_url.clone(),
                    size: asset.size,
                    sha256,
                })
            })
    });

    Ok(Some(AvailableUpdate {
        current_version: current.to_string(),
        latest_version: latest.to_string(),
        release_url: release.html_url,
        asset,
    }))
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[must_use]
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    match (parse_lenient(latest), parse_lenient(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => latest != current,
    }
}

fn parse_lenient(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    let (core, suffix) = version.split_at(suffix_idx);
    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().map(str::parse::<u64>).transpose().ok()?;
    let patch = parts.next().map(str::parse::<u64>).transpose().ok()?;

    if parts.next().is_some() {
        return None;
    }

    Version::parse(&format!(
        "{major}.{}.{}{suffix}",
        minor.unwrap_or(0),
        patch.unwrap_or(0)
    ))
    .ok()
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const DIGEST: &str = "0ad4f20730a154676d1a1d72a9813310508c861fc68098928b9f69101cb6c29e";

    fn feed_for(server: &MockServer) -> ReleaseFeed {
        ReleaseFeed {
            repo: "acme/hostbridge".to_string(),
            api_base: server.uri(),
        }
    }

    #[test]
    fn version_comparison_handles_partial_and_prerelease() {
        assert!(is_newer_version("1.0.1", "1.0.0"));
        assert!(is_newer_version("2.0.0", "1.9.9"));
        assert!(is_newer_version("1.2", "1.1.9"));
        assert!(is_newer_version("1", "0.99.0"));
        assert!(is_newer_version("1.0.0", "1.0.0-beta.2"));
        assert!(!is_newer_version("1.0.0", "1.0.0"));
        assert!(!is_newer_version("1.2", "1.2.0"));
        assert!(!is_newer_version("1.0.0-beta.2", "1.0.0-beta.10"));
        assert!(!is_newer_version("0.9.0", "1.0.0"));
    }

    #[test]
    fn sha256_digest_parsing_rejects_other_algorithms() {
        assert_eq!(
            parse_sha256_digest(&format!("sha256:{DIGEST}")).as_deref(),
            Some(DIGEST)
        );
        assert!(parse_sha256_digest("sha1:abc").is_none());
        assert!(parse_sha256_digest("sha256:not-hex").is_none());
        assert!(parse_sha256_digest("sha256:abcd").is_none());
    }

    #[test]
    fn latest_release_url_joins_repo() {
        let feed = ReleaseFeed::github("acme/hostbridge");
        assert_eq!(
            feed.latest_release_url(),
            "https://api.github.com/repos/acme/hostbridge/releases/latest"
        );
    }

    #[tokio::test]
    async fn newer_release_with_platform_asset_is_reported() {
        let Some(expected_asset) = asset_name("1.4.0") else {
            return;
        };
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/hostbridge/releases/latest"))
            .and(header("user-agent", "hostbridge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v1.4.0",
                "html_url": "https://github.com/acme/hostbridge/releases/tag/v1.4.0",
                "assets": [
                    {
                        "name": expected_asset,
                        "browser_download_url": "https://example.test/payload",
                        "size": 42,
                        "digest": format!("sha256:{DIGEST}")
                    }
                ]
            })))
            .mount(&server)
            .await;

        let update = check_latest(&reqwest::Client::new(), &feed_for(&server), "1.3.2")
            .await
            .expect("release check should succeed")
            .expect("newer release should be reported");

        assert_eq!(update.latest_version, "1.4.0");
        assert_eq!(update.current_version, "1.3.2");
        let asset = update.asset.expect("platform asset should be selected");
        assert_eq!(asset.size, 42);
        assert_eq!(asset.sha256, DIGEST);
    }

    #[tokio::test]
    async fn asset_without_digest_is_not_offered() {
        let Some(expected_asset) = asset_name("1.4.0") else {
            return;
        };
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "1.4.0",
                "html_url": "https://github.com/acme/hostbridge/releases/tag/1.4.0",
                "assets": [
                    {
                        "name": expected_asset,
                        "browser_download_url": "https://example.test/payload",
                        "size": 42
                    }
                ]
            })))
            .mount(&server)
            .await;

        let update = check_latest(&reqwest::Client::new(), &feed_for(&server), "1.3.2")
            .await
            .expect("release check should succeed")
            .expect("newer release should be reported");

        assert!(update.asset.is_none());
    }

    #[tokio::test]
    async fn same_version_is_not_an_update() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v1.3.2",
                "html_url": "https://github.com/acme/hostbridge/releases/tag/v1.3.2"
            })))
            .mount(&server)
            .await;

        let update = check_latest(&reqwest::Client::new(), &feed_for(&server), "v1.3.2")
            .await
            .expect("release check should succeed");

        assert!(update.is_none());
    }

    #[tokio::test]
    async fn error_status_includes_body_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let error = check_latest(&reqwest::Client::new(), &feed_for(&server), "1.0.0")
            .await
            .expect_err("403 should be reported as an error");

        assert!(matches!(
            &error,
            ReleaseCheckError::HttpStatus { status, .. } if status.as_u16() == 403
        ));
        assert!(error.to_string().contains("rate limited"));
    }
}
