use octocrab::Error as OctocrabError;

#[derive(Debug)]
pub enum GitHubError {
    TokenNotFound(String),
    ConfigNotFound(String),
    ApiError(OctocrabError),
    IoError(std::io::Error),
    MissingTicketLabel {
        pr_number: u64,
        prefixes: Vec<String>,
    },
}

impl From<OctocrabError> for GitHubError {
    fn from(err: OctocrabError) -> Self {
        GitHubError::ApiError(err)
    }
}

impl From<std::io::Error> for GitHubError {
    fn from(err: std::io::Error) -> Self {
        GitHubError::IoError(err)
    }
}

impl std::fmt::Display for GitHubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitHubError::TokenNotFound(msg) => {
                writeln!(f, "GitHub Authentication Error")?;
                writeln!(f, "──────────────────────────")?;
                write!(f, "🔑 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → In a workflow: pass `GITHUB_TOKEN: ${{{{ secrets.GITHUB_TOKEN }}}}` as env")?;
                write!(f, "   → Locally: export GITHUB_TOKEN=\"$(gh auth token)\"")
            }
            GitHubError::ConfigNotFound(msg) => {
                writeln!(f, "GitHub Configuration Error")?;
                writeln!(f, "─────────────────────────")?;
                write!(f, "📂 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → Set GITHUB_REPOSITORY=owner/name (set automatically in Actions)")?;
                write!(f, "   → Or set [github] repository in itsm-flow.toml")
            }
            GitHubError::ApiError(octocrab_err) => {
                writeln!(f, "GitHub API Error")?;
                writeln!(f, "────────────────")?;

                match octocrab_err {
                    octocrab::Error::GitHub { source, .. } => {
                        writeln!(f, "🌐 HTTP {}: {}", source.status_code, source.message)?;
                        writeln!(f)?;

                        match source.status_code.as_u16() {
                            401 => {
                                writeln!(f, "🔧 AUTHENTICATION FAILED:")?;
                                write!(f, "   → Token is invalid or expired")
                            }
                            403 => {
                                writeln!(f, "🔧 PERMISSION DENIED:")?;
                                writeln!(f, "   → Token lacks required permissions")?;
                                write!(f, "   → The workflow needs `pull-requests: write` and `issues: write`")
                            }
                            404 => {
                                writeln!(f, "🔧 RESOURCE NOT FOUND:")?;
                                writeln!(f, "   → Pull request or repository may not exist")?;
                                write!(f, "   → Check GITHUB_REPOSITORY and --pr-number")
                            }
                            _ => {
                                writeln!(f, "🔧 TROUBLESHOOTING:")?;
                                writeln!(f, "   → Check authentication: gh auth status")?;
                                write!(f, "   → Check rate limits: gh api rate_limit")
                            }
                        }
                    }
                    _ => {
                        write!(f, "🌐 {octocrab_err}\n\n")?;
                        writeln!(f, "🔧 TROUBLESHOOTING:")?;
                        writeln!(f, "   → Test connection: curl -I https://api.github.com")?;
                        write!(f, "   → GitHub status page: https://status.github.com")
                    }
                }
            }
            GitHubError::IoError(io_err) => {
                writeln!(f, "File System Error")?;
                writeln!(f, "─────────────────")?;
                write!(f, "📁 {io_err}\n\n")?;
                writeln!(f, "🔧 POSSIBLE CAUSES:")?;
                write!(f, "   → GITHUB_OUTPUT points to an unwritable file")
            }
            GitHubError::MissingTicketLabel { pr_number, prefixes } => {
                let wanted: Vec<String> = prefixes.iter().map(|p| format!("{p}-")).collect();
                write!(
                    f,
                    "Pull request #{pr_number} does not have an {} label",
                    wanted.join(" or ")
                )
            }
        }
    }
}

impl std::error::Error for GitHubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GitHubError::ApiError(err) => Some(err),
            GitHubError::IoError(err) => Some(err),
            _ => None,
        }
    }
}
