//! Binary Startup Tests
//!
//! Misconfigured processes must exit with status 1 after logging a single
//! fatal JSON line to stdout.

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use serde_json::Value;

    const TRACEHOP_ENV: [&str; 7] = [
        "TRACEHOP_CONFIG",
        "FORMAT",
        "BACKEND_ENDPOINT",
        "GATEWAY_ENDPOINT",
        "OTEL_EXPORTER_OTLP_ENDPOINT",
        "OTEL_SERVICE_NAME",
        "RUST_LOG",
    ];

    fn command(bin: &str) -> Command {
        let mut cmd = Command::cargo_bin(bin).unwrap();
        for key in TRACEHOP_ENV {
            cmd.env_remove(key);
        }
        cmd
    }

    fn fatal_line(stdout: &[u8]) -> Value {
        let stdout = String::from_utf8_lossy(stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .expect("no output");
        serde_json::from_str(line).expect("fatal line is not JSON")
    }

    #[test]
    fn test_backend_requires_format() {
        let output = command("backend").output().unwrap();

        assert_eq!(output.status.code(), Some(1));
        let line = fatal_line(&output.stdout);
        assert_eq!(line["level"], "ERROR");
        assert_eq!(line["fatal"], true);
        assert!(line["message"]
            .as_str()
            .unwrap()
            .contains("environment variable FORMAT (XRAY or OTEL) not set"));
    }

    #[test]
    fn test_client_requires_format() {
        command("client")
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains(
                "environment variable FORMAT (XRAY or OTEL) not set",
            ));
    }

    #[test]
    fn test_gateway_requires_backend_endpoint() {
        command("api-gateway")
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains(
                "environment variable BACKEND_ENDPOINT not set",
            ));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        command("backend")
            .env("FORMAT", "zipkin")
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains("Invalid trace format 'zipkin'"));
    }

    #[test]
    fn test_client_fails_when_gateway_unreachable() {
        command("client")
            .env("FORMAT", "OTEL")
            .env("OTEL_EXPORTER_OTLP_ENDPOINT", "127.0.0.1:9")
            .args(["--url", "http://127.0.0.1:9/", "--wait", "0"])
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains("Failed to retrieve response"))
            .stdout(predicate::str::contains("Response Received").not());
    }

    #[test]
    fn test_client_failure_flushes_before_fatal_line() {
        let output = command("client")
            .env("FORMAT", "OTEL")
            .env("OTEL_EXPORTER_OTLP_ENDPOINT", "127.0.0.1:9")
            .args(["--url", "http://127.0.0.1:9/", "--wait", "0"])
            .output()
            .unwrap();

        assert_eq!(output.status.code(), Some(1));
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            let line: Value = serde_json::from_str(line).expect("log line is not JSON");
            if line["level"] == "WARN" && line["target"] == "client" {
                assert_eq!(line["message"], "Failed to flush spans on shutdown");
            }
        }

        let line = fatal_line(&output.stdout);
        assert_eq!(line["fatal"], true);
        assert!(line["message"]
            .as_str()
            .unwrap()
            .contains("Failed to retrieve response"));
    }

    #[test]
    fn test_missing_config_file() {
        command("backend")
            .args(["--config", "/nonexistent/tracehop.yaml"])
            .assert()
            .failure()
            .code(1)
            .stdout(predicate::str::contains("Failed to load configuration"));
    }

    #[test]
    fn test_help_lists_overrides() {
        command("api-gateway")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--port"))
            .stdout(predicate::str::contains("--config"));
    }
}
