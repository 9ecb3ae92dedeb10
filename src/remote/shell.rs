//! Path segment validation, quoting and the remote command lines.
//!
//! User logins and folder names come from HTTP requests. They are checked
//! against a strict allow-list before any command is composed, and every
//! path interpolated into a command is POSIX single-quoted on top of that.
//! All shell lines the core sends are built here so their exact text is
//! defined in one place.

use super::error::RemoteError;

const MAX_SEGMENT_LEN: usize = 255;

/// Validate one path segment (a user login or a folder name).
///
/// Allowed: ASCII letters, digits, `.`, `_`, `-`; non-empty; not `.` or `..`;
/// at most 255 bytes.
pub fn validate_segment<'a>(kind: &'static str, value: &'a str) -> Result<&'a str, RemoteError> {
    let valid = !value.is_empty()
        && value.len() <= MAX_SEGMENT_LEN
        && value != "."
        && value != ".."
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));

    if valid {
        Ok(value)
    } else {
        Err(RemoteError::InvalidPathSegment {
            kind,
            value: value.to_string(),
        })
    }
}

/// Whether an absolute remote path is safe to query: absolute, no `..`
/// component, no control characters.
pub fn is_safe_remote_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.split('/').any(|component| component == "..")
        && !path.chars().any(|c| c.is_control())
}

/// POSIX single-quote a string for the remote shell.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Parent directory of an absolute path, `None` for `/` itself.
pub fn parent_dir(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(idx) => Some(&trimmed[..idx]),
    }
}

/// Prints `1` when `path` is a directory, `0` otherwise. Always exits 0.
pub(crate) fn dir_exists_command(path: &str) -> String {
    format!("test -d {} && echo 1 || echo 0", quote(path))
}

/// Prints `1` when `path` exists (any file type), `0` otherwise.
pub(crate) fn path_exists_command(path: &str) -> String {
    format!("test -e {} && echo 1 || echo 0", quote(path))
}

pub(crate) fn mkdir_command<S: AsRef<str>>(paths: &[S]) -> String {
    let quoted: Vec<String> = paths.iter().map(|p| quote(p.as_ref())).collect();
    format!("mkdir -p {}", quoted.join(" "))
}

pub(crate) fn chown_command(owner: &str, path: &str) -> String {
    format!("chown -R {} {}", quote(&format!("{0}:{0}", owner)), quote(path))
}

pub(crate) fn chmod_command(mode: &str, path: &str, recursive: bool) -> String {
    if recursive {
        format!("chmod -R {} {}", quote(mode), quote(path))
    } else {
        format!("chmod {} {}", quote(mode), quote(path))
    }
}

/// Three lines in one round trip: existence flag, regular file count, and
/// total size in bytes. A missing directory prints only `0`.
pub(crate) fn folder_info_command(path: &str) -> String {
    let p = quote(path);
    format!(
        "if [ -d {p} ]; then echo 1; find {p} -type f | wc -l; du -sb {p} | cut -f1; else echo 0; fi"
    )
}

/// Long listing of a single entry: mode, links, owner, group, size, ...
pub(crate) fn listing_command(path: &str) -> String {
    format!("ls -ld {}", quote(path))
}

/// Writes stdin to `path`, replacing any existing file.
pub(crate) fn upload_command(path: &str) -> String {
    format!("cat > {}", quote(path))
}

pub(crate) fn remove_command(path: &str) -> String {
    format!("rm -f {}", quote(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod segments {
        use super::*;

        #[test]
        fn test_accepts_typical_logins_and_folders() {
            assert!(validate_segment("user login", "alice").is_ok());
            assert!(validate_segment("user login", "bob_92").is_ok());
            assert!(validate_segment("folder name", "clips-2024.v2").is_ok());
        }

        #[test]
        fn test_rejects_traversal() {
            assert!(validate_segment("folder name", "..").is_err());
            assert!(validate_segment("folder name", ".").is_err());
            assert!(validate_segment("folder name", "a/b").is_err());
        }

        #[test]
        fn test_rejects_shell_metacharacters() {
            for bad in ["a;rm -rf /", "$(id)", "a b", "x'y", "`id`", "a\nb", ""] {
                let err = validate_segment("user login", bad).unwrap_err();
                assert!(matches!(err, RemoteError::InvalidPathSegment { kind: "user login", .. }));
            }
        }

        #[test]
        fn test_rejects_overlong_segment() {
            let long = "a".repeat(MAX_SEGMENT_LEN + 1);
            assert!(validate_segment("folder name", &long).is_err());
            assert!(validate_segment("folder name", &long[1..]).is_ok());
        }
    }

    mod paths {
        use super::*;

        #[test]
        fn test_safe_remote_path() {
            assert!(is_safe_remote_path("/home/streaming/alice/clips"));
            assert!(!is_safe_remote_path("home/streaming"));
            assert!(!is_safe_remote_path("/home/streaming/../../etc"));
            assert!(!is_safe_remote_path("/home/a\nb"));
        }

        #[test]
        fn test_parent_dir() {
            assert_eq!(parent_dir("/home/streaming/alice/v.mp4"), Some("/home/streaming/alice"));
            assert_eq!(parent_dir("/home/streaming/alice/"), Some("/home/streaming"));
            assert_eq!(parent_dir("/home"), Some("/"));
            assert_eq!(parent_dir("/"), None);
            assert_eq!(parent_dir("relative"), None);
        }
    }

    mod quoting {
        use super::*;

        #[test]
        fn test_quote_plain() {
            assert_eq!(quote("/home/streaming/alice"), "'/home/streaming/alice'");
        }

        #[test]
        fn test_quote_embedded_single_quote() {
            assert_eq!(quote("it's"), "'it'\\''s'");
        }
    }

    mod commands {
        use super::*;

        #[test]
        fn test_mkdir_quotes_every_path() {
            assert_eq!(
                mkdir_command(&["/home/streaming/a", "/home/streaming/a/videos"]),
                "mkdir -p '/home/streaming/a' '/home/streaming/a/videos'"
            );
        }

        #[test]
        fn test_dir_exists_always_succeeds() {
            assert_eq!(
                dir_exists_command("/x"),
                "test -d '/x' && echo 1 || echo 0"
            );
        }

        #[test]
        fn test_chown_uses_owner_for_group() {
            assert_eq!(
                chown_command("streaming", "/home/streaming/a"),
                "chown -R 'streaming:streaming' '/home/streaming/a'"
            );
        }

        #[test]
        fn test_folder_info_is_single_round_trip() {
            let cmd = folder_info_command("/home/streaming/a");
            assert!(cmd.starts_with("if [ -d '/home/streaming/a' ]"));
            assert!(cmd.contains("find '/home/streaming/a' -type f | wc -l"));
            assert!(cmd.contains("du -sb '/home/streaming/a'"));
        }

        #[test]
        fn test_upload_command_redirects_stdin() {
            assert_eq!(upload_command("/home/streaming/a/v.mp4"), "cat > '/home/streaming/a/v.mp4'");
        }
    }
}
