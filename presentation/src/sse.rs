//! Server-Sent Events framing for execution logs.

use futures::Stream;
use std::time::Duration;
use taskforge_application::LogSubscription;
use tokio::time::{Instant, MissedTickBehavior};

/// Comment frame sent while the log is quiet.
pub const KEEPALIVE_FRAME: &str = ": keepalive\n\n";

pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

/// Headers an SSE response carries.
pub const SSE_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
];

/// `data: <line>\n\n`; embedded newlines become continuation `data:` lines.
pub fn data_frame(line: &str) -> String {
    let mut frame: String = line
        .split('\n')
        .map(|part| format!("data: {}\n", part.trim_end_matches('\r')))
        .collect();
    frame.push('\n');
    frame
}

/// Frames for a log subscription: one data frame per line, keepalive
/// comments after every `keepalive` of silence. Ends when the log closes.
pub fn event_stream(
    subscription: LogSubscription,
    keepalive: Duration,
) -> impl Stream<Item = String> + Send {
    let period = keepalive.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    futures::stream::unfold(
        (subscription, ticker),
        |(mut subscription, mut ticker)| async move {
            let frame = tokio::select! {
                line = subscription.next_line() => data_frame(&line?),
                _ = ticker.tick() => KEEPALIVE_FRAME.to_string(),
            };
            Some((frame, (subscription, ticker)))
        },
    )
}
