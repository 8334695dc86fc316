//! Per-request system instruction.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

const CITY_HEADER: &str = "x-vercel-ip-city";
const TIMEZONE_HEADER: &str = "x-vercel-ip-timezone";
const UNKNOWN_LOCATION: &str = "unknown";

/// Where the caller appears to be, as reported by the edge proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerContext {
    pub city: Option<String>,
    pub timezone: Option<String>,
}

impl CallerContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            // The proxy percent-encodes non-ASCII city names.
            city: header_value(headers, CITY_HEADER).map(|raw| {
                urlencoding::decode(&raw)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or(raw)
            }),
            timezone: header_value(headers, TIMEZONE_HEADER),
        }
    }

    pub fn location(&self) -> &str {
        self.city.as_deref().unwrap_or(UNKNOWN_LOCATION)
    }

    /// Wall-clock time in the caller's zone, or UTC when the zone is unknown.
    pub fn time(&self, now: DateTime<Utc>) -> String {
        let zone = self.timezone.as_deref().and_then(|name| match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(_) => {
                debug!(timezone = name, "Unknown caller timezone, using UTC");
                None
            }
        });
        match zone {
            Some(tz) => format!("{} ({})", now.with_timezone(&tz).format("%H:%M"), tz.name()),
            None => now.format("%H:%M UTC").to_string(),
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Fill `{location}` and `{time}` in the configured template.
pub fn render_system_prompt(template: &str, caller: &CallerContext, now: DateTime<Utc>) -> String {
    template
        .replace("{location}", caller.location())
        .replace("{time}", &caller.time(now))
}
