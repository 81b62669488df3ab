pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGTAIL CONFIGURATION
# =============================================================================
# Tails the remote log stream of a test run and prints every entry locally.
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logtail/config.yml
#   3. /etc/logtail/config.yml
#
# Values may reference environment variables with $env{NAME}.

# =============================================================================
# CLOUD
# =============================================================================
cloud:
  # Websocket endpoint of the logs tail service (ws:// or wss://)
  logs_tail_url: wss://cloudlogs.example.com/api/v1/tail
  # Sent as `token=<token>` in the websocket subprotocol header
  token: $env{LOGTAIL_TOKEN}

# =============================================================================
# TAIL
# =============================================================================
tail:
  # Test run whose logs are streamed
  reference_id: "1"
  # How far back the first connection starts
  tail_from: 5m

# =============================================================================
# RETRY (optional)
# =============================================================================
# Dial attempts for the initial connection and for every reconnect.
# Waits base_interval^n seconds plus up to 1s of jitter, capped at max_interval.
retry:
  attempts: 3
  base_interval: 5s
  max_interval: 2m

# =============================================================================
# PIPELINE (optional)
# =============================================================================
pipeline:
  # Messages buffered between the connection and the printer. When full the
  # connection is not read until space frees up.
  buffer_limit: 10
  # Upper bound for the close handshake on shutdown
  close_deadline: 1s
"#
    .to_string()
}
