//! Spec string parser
//!
//! Turns free-form command line arguments into typed specs:
//!
//! | Input | Result |
//! |-------|--------|
//! | `-` | the default (stdin) reader |
//! | `/abs/path` | `File` |
//! | `git::<url>`, `helm::<url>` | forced `Git` / `Helm` |
//! | `github.com/org/repo[/ctx][?ref=..]` | `Git` |
//! | `ssh://..`, `git@host:path`, Git hosting URLs | `Git` |
//! | `https://artifacthub.io/packages/helm/..` | `Helm` |
//! | `http(s)://..` | `HTTP` |
//! | `k8s:<namespace>/<types>[?labelSelector=..]` | `Kubernetes` |
//! | anything else | `File` |

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use url::{Position, Url};

use konjure_core::spec::{FileSpec, GitSpec, HelmSpec, HttpSpec, KubernetesSpec, Spec};

use crate::artifacthub::{ArtifactHubClient, ChartResolver};
use crate::error::{EngineError, Result};
use crate::readers::Reader;

/// `[user@]host:path` shorthand understood by Git
static SCP_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:([^@/]+)@)?([^:/]+):(.*)$").expect("valid SCP regex"));

/// Result of decoding a spec string
pub enum Parsed {
    /// A typed spec to expand
    Spec(Spec),
    /// A reader producing nodes directly (the default input)
    Reader(Box<dyn Reader>),
}

impl std::fmt::Debug for Parsed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parsed::Spec(spec) => f.debug_tuple("Spec").field(spec).finish(),
            Parsed::Reader(_) => f.write_str("Reader"),
        }
    }
}

type ReaderFactory = Box<dyn Fn() -> Box<dyn Reader>>;

/// Decodes spec strings
pub struct SpecParser {
    default_reader: Option<ReaderFactory>,
    resolver: Box<dyn ChartResolver>,
}

impl Default for SpecParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecParser {
    /// Parser without a default reader, resolving charts with Artifact Hub
    pub fn new() -> Self {
        Self {
            default_reader: None,
            resolver: Box::new(ArtifactHubClient::new()),
        }
    }

    /// Reader returned for the `-` sentinel
    pub fn with_default_reader(mut self, factory: impl Fn() -> Box<dyn Reader> + 'static) -> Self {
        self.default_reader = Some(Box::new(factory));
        self
    }

    /// Replace the Artifact Hub chart resolver
    pub fn with_chart_resolver(mut self, resolver: impl ChartResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Decode a spec string
    ///
    /// Returns `Ok(None)` for `-` when no default reader is configured.
    pub fn decode(&self, spec: &str) -> Result<Option<Parsed>> {
        if spec == "-" {
            return Ok(self.default_reader.as_ref().map(|factory| Parsed::Reader(factory())));
        }
        self.decode_spec(spec).map(|s| Some(Parsed::Spec(s)))
    }

    /// Decode a spec string that must yield a typed spec
    pub fn decode_spec(&self, spec: &str) -> Result<Spec> {
        if Path::new(spec).is_absolute() {
            return Ok(Spec::File(FileSpec::new(spec)));
        }

        if let Some((scheme, rest)) = split_scheme_override(spec) {
            return match scheme {
                "git" => Ok(Spec::Git(parse_git(rest)?)),
                "helm" => Ok(Spec::Helm(self.parse_helm(rest)?)),
                other => Err(EngineError::UnknownScheme {
                    scheme: other.to_string(),
                    spec: spec.to_string(),
                }),
            };
        }

        if spec.starts_with("github.com/") {
            return Ok(Spec::Git(parse_git(&format!("https://{}", spec))?));
        }

        match parse_location(spec)? {
            Some(Location::Scp { .. }) => Ok(Spec::Git(parse_git(spec)?)),
            Some(Location::Url(url)) => self.decode_url(spec, &url),
            None => Ok(Spec::File(FileSpec::new(spec))),
        }
    }

    fn decode_url(&self, spec: &str, url: &Url) -> Result<Spec> {
        match url.scheme() {
            "k8s" => Ok(Spec::Kubernetes(parse_kubernetes(url))),
            "ssh" | "git" => Ok(Spec::Git(parse_git(spec)?)),
            _ if url.username() == "git" => Ok(Spec::Git(parse_git(spec)?)),
            "http" | "https" => {
                if is_artifact_hub(url) {
                    Ok(Spec::Helm(self.parse_helm(spec)?))
                } else if is_git_url(url) {
                    Ok(Spec::Git(parse_git(spec)?))
                } else {
                    Ok(Spec::Http(HttpSpec {
                        url: spec.to_string(),
                    }))
                }
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| url.path().to_string());
                Ok(Spec::File(FileSpec::new(path)))
            }
            _ => Ok(Spec::File(FileSpec::new(spec))),
        }
    }

    /// Parse a Helm chart URL
    pub fn parse_helm(&self, spec: &str) -> Result<HelmSpec> {
        let unresolvable = || EngineError::UnresolvableHelmChart {
            spec: spec.to_string(),
        };

        let url = Url::parse(spec).map_err(|_| unresolvable())?;
        if url.cannot_be_a_base() {
            return Err(unresolvable());
        }

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let param = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let mut base = url.clone();
        base.set_query(None);
        base.set_fragment(None);

        let mut helm = HelmSpec::default();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        if url.scheme() == "oci" {
            helm.chart = base.to_string();
        } else if is_artifact_hub(&url) {
            let ["packages", "helm", repo, chart, rest @ ..] = segments.as_slice() else {
                return Err(unresolvable());
            };
            let version = rest.first().map(|v| v.to_string()).or_else(|| param("version"));
            let resolved = self.resolver.resolve(repo, chart, version.as_deref())?;
            helm.chart = resolved.name;
            helm.version = resolved.version;
            helm.repository = resolved.repository;
        } else if let Some(archive) = segments.last().and_then(|s| s.strip_suffix(".tgz")) {
            let (chart, version) = split_archive_name(archive);
            helm.chart = chart.to_string();
            helm.version = version.to_string();
            helm.repository = base
                .as_str()
                .rsplit_once('/')
                .map(|(repo, _)| repo.to_string())
                .unwrap_or_default();
        } else {
            helm.repository = base.as_str().trim_end_matches('/').to_string();
        }

        if let Some(chart) = param("chart") {
            helm.chart = chart;
        }
        if let Some(version) = param("version") {
            helm.version = version;
        }
        if let Some(release_name) = param("releaseName") {
            helm.release_name = release_name;
        }
        if let Some(namespace) = param("namespace") {
            helm.release_namespace = namespace;
        }

        if helm.chart.is_empty() {
            return Err(unresolvable());
        }
        Ok(helm)
    }
}

/// `git::rest` style prefix; the scheme must look like a URL scheme
fn split_scheme_override(spec: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = spec.split_once("::")?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some((scheme, rest))
}

/// Split `chart-1.2.3` at the last dash
fn split_archive_name(name: &str) -> (&str, &str) {
    name.rsplit_once('-').unwrap_or((name, ""))
}

// =============================================================================
// URL CLASSIFICATION
// =============================================================================

enum Location {
    Url(Url),
    Scp {
        user: Option<String>,
        host: String,
        path: String,
    },
}

/// Parse a URL, falling back to SCP-like shorthand
///
/// `None` means the string is neither and should be treated as a path.
fn parse_location(spec: &str) -> Result<Option<Location>> {
    match Url::parse(spec) {
        // `github.com:org/repo` parses with `github.com` as the scheme
        Ok(url) if url.cannot_be_a_base() && url.scheme().contains('.') => Ok(parse_scp(spec)),
        Ok(url) => Ok(Some(Location::Url(url))),
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(parse_scp(spec)),
        Err(e) => Err(EngineError::MalformedSpec {
            spec: spec.to_string(),
            message: e.to_string(),
        }),
    }
}

fn parse_scp(spec: &str) -> Option<Location> {
    let caps = SCP_LIKE.captures(spec)?;
    Some(Location::Scp {
        user: caps.get(1).map(|m| m.as_str().to_string()),
        host: caps.get(2)?.as_str().to_string(),
        path: caps.get(3)?.as_str().to_string(),
    })
}

fn is_artifact_hub(url: &Url) -> bool {
    url.host_str() == Some("artifacthub.io") && url.path().starts_with("/packages/helm/")
}

const GIT_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org", "dev.azure.com"];

fn is_git_url(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default();
    let path = url.path();
    GIT_HOSTS.contains(&host)
        || host.ends_with(".visualstudio.com")
        || host.starts_with("git-codecommit.")
        || path.contains("/_git/")
        || path.ends_with(".git")
        || path.contains(".git/")
        || path.get(1..).is_some_and(|p| p.contains("//"))
}

fn parse_kubernetes(url: &Url) -> KubernetesSpec {
    let mut spec = KubernetesSpec::default();
    let body = url.path().trim_matches('/');
    let (namespace, types) = match body.split_once('/') {
        Some((namespace, types)) => (namespace, types),
        None => ("", body),
    };
    if !namespace.is_empty() {
        spec.namespaces.push(namespace.to_string());
    }
    spec.types = types
        .split(',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "labelSelector" => spec.label_selector = value.into_owned(),
            "fieldSelector" => spec.field_selector = value.into_owned(),
            _ => {}
        }
    }
    spec
}

// =============================================================================
// GIT
// =============================================================================

/// Normalize a Git repository URL into repository, refspec and context
///
/// The query keys `ref` or `version` select the refspec. The context
/// directory is everything after `_git/<repo>/`, `.git/`, `//` or, failing
/// those, after the repository path components of the host.
pub fn parse_git(spec: &str) -> Result<GitSpec> {
    let (base, query) = match spec.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (spec, None),
    };

    let refspec = query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == "ref" || k == "version")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_default();

    let location = parse_location(base)?.ok_or_else(|| EngineError::MalformedSpec {
        spec: spec.to_string(),
        message: "not a Git repository URL".to_string(),
    })?;

    let (prefix, host, path) = match location {
        Location::Url(url) => {
            let mut prefix = url[..Position::BeforePath].to_string();
            if url.scheme() == "https" && url.host_str() == Some("github.com") {
                prefix = "https://github.com".to_string();
            }
            let host = url.host_str().unwrap_or_default().to_string();
            (prefix, host, url.path().to_string())
        }
        Location::Scp { user, host, path } => {
            let prefix = match user {
                Some(user) => format!("{}@{}:", user, host),
                None => format!("{}:", host),
            };
            (prefix, host, path)
        }
    };

    let components = repository_components(&host);
    let (repo_path, context) = split_repository_path(&path, components);
    let mut repository = format!("{}{}", prefix, repo_path);
    if prefix == "https://github.com" && !repository.ends_with(".git") {
        repository.push_str(".git");
    }

    Ok(GitSpec {
        repository,
        refspec,
        context,
    })
}

/// Number of path components naming a repository on a host
fn repository_components(host: &str) -> usize {
    if host.starts_with("git-codecommit.") {
        // /v1/repos/<name>
        3
    } else if host == "ssh.dev.azure.com" || host == "vs-ssh.visualstudio.com" {
        // /v3/<org>/<project>/<repo>
        4
    } else {
        2
    }
}

fn split_repository_path(path: &str, components: usize) -> (String, String) {
    let context = |rest: &str| rest.trim_matches('/').to_string();

    if let Some(idx) = path.find("/_git/") {
        let start = idx + "/_git/".len();
        let end = path[start..]
            .find('/')
            .map(|i| start + i)
            .unwrap_or(path.len());
        return (path[..end].to_string(), context(&path[end..]));
    }

    if let Some(idx) = path.find(".git/") {
        let end = idx + ".git".len();
        return (path[..end].to_string(), context(&path[end..]));
    }

    if let Some(idx) = path.get(1..).and_then(|p| p.find("//")).map(|i| i + 1) {
        return (path[..idx].to_string(), context(&path[idx..]));
    }

    let leading = if path.starts_with('/') { "/" } else { "" };
    let parts: Vec<&str> = path
        .trim_start_matches('/')
        .splitn(components + 1, '/')
        .collect();
    if parts.len() > components {
        (
            format!("{}{}", leading, parts[..components].join("/")),
            context(parts[components]),
        )
    } else {
        (path.trim_end_matches('/').to_string(), String::new())
    }
}

// =============================================================================
// CANONICAL FORM
// =============================================================================

/// Canonical spec string for specs that have one
///
/// Decoding the returned string yields the same spec.
pub fn format_spec(spec: &Spec) -> Option<String> {
    match spec {
        Spec::File(file) if !file.recurse => {
            let path = &file.path;
            let plain = !path.is_empty() && path != "-" && !path.contains(':');
            plain.then(|| path.clone())
        }
        Spec::Http(http) => {
            let url = Url::parse(&http.url).ok()?;
            let plain = matches!(url.scheme(), "http" | "https")
                && !is_git_url(&url)
                && !is_artifact_hub(&url)
                && url.username() != "git";
            plain.then(|| http.url.clone())
        }
        Spec::Git(git) => format_git(git),
        Spec::Kubernetes(k8s) => format_kubernetes(k8s),
        _ => None,
    }
}

fn format_git(git: &GitSpec) -> Option<String> {
    let query = if git.refspec.is_empty() {
        String::new()
    } else {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("ref", &git.refspec)
            .finish();
        format!("?{}", encoded)
    };

    let mut candidates = Vec::new();
    if git.context.is_empty() {
        candidates.push(format!("git::{}{}", git.repository, query));
        candidates.push(format!("git::{}//{}", git.repository, query));
    } else {
        candidates.push(format!("git::{}//{}{}", git.repository, git.context, query));
    }

    candidates
        .into_iter()
        .find(|c| parse_git(&c["git::".len()..]).ok().as_ref() == Some(git))
}

fn format_kubernetes(k8s: &KubernetesSpec) -> Option<String> {
    let simple = k8s.namespaces.len() <= 1
        && !k8s.types.is_empty()
        && k8s.namespace_selector.is_empty()
        && k8s.kubeconfig.is_empty()
        && k8s.context.is_empty()
        && k8s.types.iter().all(|t| !t.contains('/') && !t.is_empty())
        && k8s.namespaces.iter().all(|n| !n.is_empty() && !n.contains('/'));
    if !simple {
        return None;
    }

    let mut out = String::from("k8s:");
    if let Some(namespace) = k8s.namespaces.first() {
        out.push_str(namespace);
        out.push('/');
    }
    out.push_str(&k8s.types.join(","));

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    if !k8s.label_selector.is_empty() {
        query.append_pair("labelSelector", &k8s.label_selector);
    }
    if !k8s.field_selector.is_empty() {
        query.append_pair("fieldSelector", &k8s.field_selector);
    }
    let query = query.finish();
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacthub::ResolvedChart;
    use crate::readers::StreamReader;

    struct StubResolver;

    impl ChartResolver for StubResolver {
        fn resolve(&self, repo: &str, chart: &str, version: Option<&str>) -> Result<ResolvedChart> {
            Ok(ResolvedChart {
                name: chart.to_string(),
                version: version.unwrap_or("9.9.9").to_string(),
                repository: format!("https://charts.example.com/{}", repo),
            })
        }
    }

    fn parser() -> SpecParser {
        SpecParser::new().with_chart_resolver(StubResolver)
    }

    fn decode(spec: &str) -> Spec {
        parser().decode_spec(spec).unwrap()
    }

    fn git(repository: &str, refspec: &str, context: &str) -> Spec {
        Spec::Git(GitSpec {
            repository: repository.into(),
            refspec: refspec.into(),
            context: context.into(),
        })
    }

    #[test]
    fn test_github_shorthand() {
        assert_eq!(
            decode("github.com/org/repo/sub?ref=v1.2.3"),
            git("https://github.com/org/repo.git", "v1.2.3", "sub")
        );
        assert_eq!(
            decode("github.com/org/repo"),
            git("https://github.com/org/repo.git", "", "")
        );
    }

    #[test]
    fn test_kubernetes_url() {
        assert_eq!(
            decode("k8s:default/deployments?labelSelector=app%3Dfoo"),
            Spec::Kubernetes(KubernetesSpec {
                namespaces: vec!["default".into()],
                types: vec!["deployments".into()],
                label_selector: "app=foo".into(),
                ..Default::default()
            })
        );
        assert_eq!(
            decode("k8s:deployments,services"),
            Spec::Kubernetes(KubernetesSpec {
                types: vec!["deployments".into(), "services".into()],
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_files() {
        assert_eq!(decode("/etc/manifests"), Spec::File(FileSpec::new("/etc/manifests")));
        assert_eq!(decode("manifests/app.yaml"), Spec::File(FileSpec::new("manifests/app.yaml")));
        assert_eq!(decode("file:///tmp/x.yaml"), Spec::File(FileSpec::new("/tmp/x.yaml")));
    }

    #[test]
    fn test_git_forms() {
        assert_eq!(
            decode("git@github.com:org/repo.git/deploy?version=main"),
            git("git@github.com:org/repo.git", "main", "deploy")
        );
        assert_eq!(
            decode("ssh://git@example.com/org/repo.git"),
            git("ssh://git@example.com/org/repo.git", "", "")
        );
        assert_eq!(
            decode("https://dev.azure.com/org/project/_git/repo/path/to/ctx"),
            git("https://dev.azure.com/org/project/_git/repo", "", "path/to/ctx")
        );
        assert_eq!(
            decode("https://git.example.com/team/repo//overlays/prod"),
            git("https://git.example.com/team/repo", "", "overlays/prod")
        );
        assert_eq!(
            decode("git::https://git.example.com/a/b/c"),
            git("https://git.example.com/a/b", "", "c")
        );
        assert_eq!(
            decode("https://git-codecommit.us-east-1.amazonaws.com/v1/repos/name/sub"),
            git("https://git-codecommit.us-east-1.amazonaws.com/v1/repos/name", "", "sub")
        );
    }

    #[test]
    fn test_http() {
        assert_eq!(
            decode("https://example.com/manifests/app.yaml"),
            Spec::Http(HttpSpec {
                url: "https://example.com/manifests/app.yaml".into()
            })
        );
    }

    #[test]
    fn test_helm_archive() {
        let Spec::Helm(helm) = decode("helm::https://charts.example.com/stable/nginx-1.2.3.tgz") else {
            panic!("expected a Helm spec");
        };
        assert_eq!(helm.chart, "nginx");
        assert_eq!(helm.version, "1.2.3");
        assert_eq!(helm.repository, "https://charts.example.com/stable");
    }

    #[test]
    fn test_helm_query_parameters() {
        let Spec::Helm(helm) = decode(
            "helm::https://charts.example.com/stable?chart=redis&version=17.0.0&releaseName=cache&namespace=data",
        ) else {
            panic!("expected a Helm spec");
        };
        assert_eq!(helm.chart, "redis");
        assert_eq!(helm.version, "17.0.0");
        assert_eq!(helm.repository, "https://charts.example.com/stable");
        assert_eq!(helm.release_name, "cache");
        assert_eq!(helm.release_namespace, "data");
    }

    #[test]
    fn test_helm_artifact_hub() {
        let Spec::Helm(helm) = decode("https://artifacthub.io/packages/helm/bitnami/mysql/9.4.1")
        else {
            panic!("expected a Helm spec");
        };
        assert_eq!(helm.chart, "mysql");
        assert_eq!(helm.version, "9.4.1");
        assert_eq!(helm.repository, "https://charts.example.com/bitnami");
    }

    #[test]
    fn test_helm_oci() {
        let Spec::Helm(helm) = decode("helm::oci://registry.example.com/charts/app?version=1.0.0")
        else {
            panic!("expected a Helm spec");
        };
        assert_eq!(helm.chart, "oci://registry.example.com/charts/app");
        assert_eq!(helm.version, "1.0.0");
    }

    #[test]
    fn test_errors() {
        let p = parser();
        assert!(matches!(
            p.decode_spec("svn::https://example.com/repo"),
            Err(EngineError::UnknownScheme { .. })
        ));
        assert!(matches!(
            p.decode_spec("helm::stable/nginx"),
            Err(EngineError::UnresolvableHelmChart { .. })
        ));
        assert!(matches!(
            p.decode_spec("helm::https://charts.example.com/stable"),
            Err(EngineError::UnresolvableHelmChart { .. })
        ));
        assert!(matches!(
            p.decode_spec("https://exa mple.com/x"),
            Err(EngineError::MalformedSpec { .. })
        ));
    }

    #[test]
    fn test_default_reader() {
        assert!(parser().decode("-").unwrap().is_none());

        let p = parser().with_default_reader(|| Box::new(StreamReader::new("test", "a: 1\n".as_bytes())));
        assert!(matches!(p.decode("-").unwrap(), Some(Parsed::Reader(_))));
    }

    #[test]
    fn test_split_archive_name() {
        assert_eq!(split_archive_name("nginx-1.2.3"), ("nginx", "1.2.3"));
        assert_eq!(split_archive_name("nginx"), ("nginx", ""));
    }

    #[test]
    fn test_format_round_trips() {
        let p = parser();
        let inputs = [
            "github.com/org/repo/sub?ref=v1.2.3",
            "git@github.com:org/repo.git",
            "https://git.example.com/team/repo//overlays",
            "https://dev.azure.com/org/project/_git/repo",
            "k8s:default/deployments?labelSelector=app%3Dfoo",
            "k8s:configmaps,secrets",
            "https://example.com/manifests/app.yaml",
            "manifests/app.yaml",
            "/etc/manifests",
        ];

        for input in inputs {
            let decoded = p.decode_spec(input).unwrap();
            let formatted = format_spec(&decoded)
                .unwrap_or_else(|| panic!("{input} should have a canonical form"));
            assert_eq!(p.decode_spec(&formatted).unwrap(), decoded, "{input} via {formatted}");
        }
    }

    #[test]
    fn test_no_canonical_form() {
        assert!(format_spec(&Spec::Helm(HelmSpec::default())).is_none());
        assert!(
            format_spec(&Spec::File(FileSpec {
                path: "a".into(),
                recurse: true
            }))
            .is_none()
        );
    }
}
