/// Node.js core module names.
const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "sea",
    "sqlite",
    "stream",
    "string_decoder",
    "sys",
    "test",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// True for `fs`, `fs/promises`, `node:fs`, `node:test`, ...
pub fn is_builtin(specifier: &str) -> bool {
    let (bare, prefixed) = match specifier.strip_prefix("node:") {
        Some(rest) => (rest, true),
        None => (specifier, false),
    };
    let head = bare.split('/').next().unwrap_or(bare);
    // `test`, `sqlite` and `sea` only exist under the `node:` prefix
    if !prefixed && matches!(head, "test" | "sqlite" | "sea") {
        return false;
    }
    NODE_BUILTINS.contains(&head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins() {
        assert!(is_builtin("fs"));
        assert!(is_builtin("fs/promises"));
        assert!(is_builtin("node:path"));
        assert!(is_builtin("node:test"));
        assert!(!is_builtin("test"));
        assert!(!is_builtin("test/foo"));
        assert!(!is_builtin("sea/x"));
        assert!(is_builtin("node:test/reporters"));
        assert!(!is_builtin("lodash"));
        assert!(!is_builtin("@scope/fs"));
    }
}
