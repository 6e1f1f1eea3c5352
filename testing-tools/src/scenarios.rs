use anyhow::Result;
use colored::*;
use events::PgEventLog;
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};

use crate::api_client::ApiClient;
use crate::auth::{TestIdentity, TokenMinter};
use crate::output::{print_event, TestResult};
use crate::sse_client::{Connection, UNNAMED_EVENT};

const WAIT: Duration = Duration::from_secs(5);

/// Marking carried by probe events; only the cleared identity may see it.
pub const PROBE_MARKING: &str = "TLP:AMBER";

pub async fn test_connection(
    cleared: &TestIdentity,
    restricted: &TestIdentity,
    sse1: &mut Connection,
    sse2: &mut Connection,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Connection Test ===".bright_cyan().bold());
    println!(
        "{}",
        "Testing that each stream opens with connected and heartbeat frames".bright_white()
    );

    for (identity, sse) in [(cleared, sse1), (restricted, sse2)] {
        let connected = match sse.wait_for_event("connected", WAIT).await {
            Ok(event) => event,
            Err(e) => {
                return Ok(TestResult::fail(
                    "connection_test",
                    start,
                    format!("{} got no connected frame: {}", identity.label, e),
                ))
            }
        };
        print_event(&sse.label, &connected);

        if connected.data.get("clients").is_none() {
            return Ok(TestResult::fail(
                "connection_test",
                start,
                "connected frame has no client count",
            ));
        }

        if let Err(e) = sse.wait_for_event("heartbeat", WAIT).await {
            return Ok(TestResult::fail(
                "connection_test",
                start,
                format!("{} got no heartbeat: {}", identity.label, e),
            ));
        }
        println!(
            "{} {} ({}) stream is live",
            "✓".green(),
            identity.label,
            identity.id
        );
    }

    Ok(TestResult::pass("connection_test", start))
}

pub async fn test_unauthorized(api_client: &ApiClient) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Unauthorized ===".bright_cyan().bold());
    println!("{} Opening a stream with a token signed by another key...", "→".blue());

    let forger = TokenMinter::new(&uuid::Uuid::new_v4().to_string());
    let forged = forger.mint("Forged", "forged", &[PROBE_MARKING], true)?;

    let status = api_client.stream_status(&forged.token).await?;
    if status == StatusCode::UNAUTHORIZED {
        println!("{} Stream refused with 401", "✓".green());
        Ok(TestResult::pass("unauthorized", start))
    } else {
        Ok(TestResult::fail(
            "unauthorized",
            start,
            format!("Expected 401, got {}", status),
        ))
    }
}

/// Opens a second stream for the identity behind `existing` and checks that
/// the first one gets closed. On success `existing` is replaced by the new stream.
pub async fn test_single_session(
    api_client: &ApiClient,
    identity: &TestIdentity,
    existing: &mut Connection,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Single Session ===".bright_cyan().bold());
    println!("{} {} opening a second stream...", "→".blue(), identity.label);

    let mut replacement = Connection::establish(
        api_client.base_url(),
        &identity.token,
        format!("{} (replacement)", identity.label),
    )
    .await?;

    if let Err(e) = replacement.wait_for_event("connected", WAIT).await {
        return Ok(TestResult::fail(
            "single_session",
            start,
            format!("Replacement stream did not open: {}", e),
        ));
    }

    println!("{} Waiting for the first stream to be closed...", "→".blue());
    match existing.wait_for_close(WAIT).await {
        Ok(()) => {
            println!("{} First stream closed by the server", "✓".green());
            *existing = replacement;
            Ok(TestResult::pass("single_session", start))
        }
        Err(e) => Ok(TestResult::fail("single_session", start, e.to_string())),
    }
}

pub async fn test_history(
    api_client: &ApiClient,
    minter: &TokenMinter,
    identity: &TestIdentity,
    sse: &mut Connection,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: History Replay ===".bright_cyan().bold());

    println!("{} Requesting history without an open stream...", "→".blue());
    let stranger = minter.mint("Stranger", "stranger", &[], false)?;
    let (status, body) = api_client.history(&stranger.token, "-", 10).await?;
    if status != StatusCode::UNAUTHORIZED || body["success"] != json!(false) {
        return Ok(TestResult::fail(
            "history",
            start,
            format!("Expected 401 success=false, got {} {}", status, body),
        ));
    }
    println!("{} Refused: {}", "✓".green(), body["error"]);

    println!("{} Requesting history with an invalid cursor...", "→".blue());
    let (status, _) = api_client.history(&identity.token, "yesterday", 10).await?;
    if status != StatusCode::BAD_REQUEST {
        return Ok(TestResult::fail(
            "history",
            start,
            format!("Expected 400 for an invalid cursor, got {}", status),
        ));
    }
    println!("{} Invalid cursor rejected", "✓".green());

    println!("{} {} replaying from the start of the log...", "→".blue(), identity.label);
    let (status, body) = api_client.history(&identity.token, "-", 5).await?;
    if status != StatusCode::OK || body["success"] != json!(true) {
        return Ok(TestResult::fail(
            "history",
            start,
            format!("Expected 200 success=true, got {} {}", status, body),
        ));
    }

    let mut replayed = 0;
    while let Ok(event) = sse.wait_for_log_event(Duration::from_secs(1)).await {
        print_event(&sse.label, &event);
        replayed += 1;
    }
    println!("{} {} event(s) replayed into the stream", "✓".green(), replayed);

    Ok(TestResult::pass("history", start))
}

/// Appends a probe event straight into the Postgres log and checks what each
/// identity receives.
pub async fn test_marking_filter(
    publisher: &PgEventLog,
    cleared: &TestIdentity,
    restricted: &TestIdentity,
    sse1: &mut Connection,
    sse2: &mut Connection,
) -> Result<TestResult> {
    let start = Instant::now();

    println!("\n{}", "=== TEST: Marking Filter ===".bright_cyan().bold());
    println!("{} Appending a {} probe event...", "→".blue(), PROBE_MARKING);

    let event = publisher
        .append(
            "create",
            json!({"type": "indicator", "name": "sse-test-client probe"}),
            vec![PROBE_MARKING.to_string()],
        )
        .await?;
    let expected_id = event.id.to_string();

    let full = match sse1.wait_for_event("create", WAIT).await {
        Ok(event) => event,
        Err(e) => return Ok(TestResult::fail("marking_filter", start, e.to_string())),
    };
    print_event(&sse1.label, &full);

    let redacted = match sse2.wait_for_event(UNNAMED_EVENT, WAIT).await {
        Ok(event) => event,
        Err(e) => return Ok(TestResult::fail("marking_filter", start, e.to_string())),
    };
    print_event(&sse2.label, &redacted);

    let checks = [
        (full.id.as_deref() == Some(expected_id.as_str()), "cleared stream got another event id"),
        (full.data["granted"] == json!(true), "cleared stream was not granted"),
        (full.data.get("data").is_some(), "cleared stream is missing the payload"),
        (redacted.id.as_deref() == Some(expected_id.as_str()), "restricted stream got another event id"),
        (redacted.data["granted"] == json!(false), "restricted stream was granted"),
        (redacted.data.get("data").is_none(), "restricted stream leaked the payload"),
        (
            redacted.data["markings"] == json!([PROBE_MARKING]),
            "restricted stream is missing the markings",
        ),
    ];

    match checks.iter().find(|(ok, _)| !ok) {
        None => {
            println!("{} Each identity received its own view", "✓".green());
            Ok(TestResult::pass("marking_filter", start))
        }
        Some((_, failure)) => {
            println!("{} {}", "✗".red(), failure);
            Ok(TestResult::fail("marking_filter", start, *failure))
        }
    }
}
