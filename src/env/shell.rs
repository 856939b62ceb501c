//! Render an environment as shell assignments for `eval`

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Target shell dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    /// bash, zsh, sh and anything unrecognized
    #[default]
    Posix,
    Fish,
    Powershell,
    Cmd,
    Tcsh,
    Emacs,
}

impl Shell {
    /// Parse a shell name (`bash`, `fish`, `powershell`, ...)
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "fish" => Shell::Fish,
            "powershell" | "pwsh" => Shell::Powershell,
            "cmd" => Shell::Cmd,
            "tcsh" | "csh" => Shell::Tcsh,
            "emacs" => Shell::Emacs,
            _ => Shell::Posix,
        }
    }

    /// Detect the operator's shell from the environment.
    ///
    /// Returns `None` when `SHELL` is unset.
    pub fn detect<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let shell = lookup("SHELL").filter(|s| !s.is_empty())?;
        if lookup("__fish_bin_dir").is_some() {
            return Some(Shell::Fish);
        }
        let name = Path::new(&shell)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(shell);
        Some(Self::from_name(&name))
    }

    fn assignment(&self, key: &str, value: &str) -> String {
        match self {
            Shell::Posix => format!("export {}=\"{}\"\n", key, value),
            Shell::Fish => format!("set -gx {} \"{}\";\n", key, value),
            Shell::Powershell => format!("$Env:{} = \"{}\"\n", key, value),
            Shell::Cmd => format!("SET {}={}\n", key, value),
            Shell::Tcsh => format!("setenv {} \"{}\";\n", key, value),
            Shell::Emacs => format!("(setenv \"{}\" \"{}\")\n", key, value),
        }
    }

    /// Comment marker and the eval invocation for `command`
    fn usage_hint(&self, command: &str) -> (&'static str, String) {
        match self {
            Shell::Posix => ("#", format!("eval $({})", command)),
            Shell::Fish => ("#", format!("eval ({})", command)),
            Shell::Powershell => (
                "#",
                format!(
                    "{} | ForEach-Object {{If (-Not[string]::IsNullOrEmpty($_)) {{ $_ | Invoke-Expression }}}}",
                    command
                ),
            ),
            Shell::Cmd => ("REM", format!("\t@FOR /f \"tokens=*\" %i IN ({}) DO @%i", command)),
            Shell::Tcsh => (":", format!("eval `{}`", command)),
            Shell::Emacs => (
                ";;",
                format!(
                    "(with-temp-buffer (shell-command {} (current-buffer))(eval-buffer))",
                    command
                ),
            ),
        }
    }
}

/// Render `env` as assignments sorted by key, followed by a usage hint
/// telling the operator how to evaluate `command`.
pub fn render(shell: Shell, command: &str, env: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in env {
        out.push_str(&shell.assignment(key, value));
    }
    let (comment, hint) = shell.usage_hint(command);
    let _ = writeln!(out, "{} Run this command to configure your shell:", comment);
    let _ = writeln!(out, "{} {}", comment, hint);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("B_KEY".to_string(), "two".to_string()),
            ("A_KEY".to_string(), "one".to_string()),
        ])
    }

    #[test]
    fn test_posix_sorted() {
        let out = render(Shell::Posix, "stolos env", &env());
        assert!(out.starts_with("export A_KEY=\"one\"\nexport B_KEY=\"two\"\n"));
        assert!(out.ends_with("# eval $(stolos env)\n"));
    }

    #[test]
    fn test_fish() {
        let out = render(Shell::Fish, "stolos env", &env());
        assert!(out.contains("set -gx A_KEY \"one\";\n"));
        assert!(out.contains("# eval (stolos env)"));
    }

    #[test]
    fn test_cmd_and_powershell() {
        assert!(render(Shell::Cmd, "stolos env", &env()).contains("SET A_KEY=one\n"));
        assert!(render(Shell::Powershell, "stolos env", &env()).contains("$Env:A_KEY = \"one\"\n"));
    }

    #[test]
    fn test_detect() {
        let lookup = |k: &str| match k {
            "SHELL" => Some("/usr/bin/zsh".to_string()),
            _ => None,
        };
        assert_eq!(Shell::detect(lookup), Some(Shell::Posix));

        let fish = |k: &str| match k {
            "SHELL" => Some("/bin/bash".to_string()),
            "__fish_bin_dir" => Some("/usr/bin".to_string()),
            _ => None,
        };
        assert_eq!(Shell::detect(fish), Some(Shell::Fish));

        let tcsh = |k: &str| (k == "SHELL").then(|| "/bin/tcsh".to_string());
        assert_eq!(Shell::detect(tcsh), Some(Shell::Tcsh));

        assert_eq!(Shell::detect(|_| None), None);
    }
}
