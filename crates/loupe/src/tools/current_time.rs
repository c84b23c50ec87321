use std::future::ready;

use chrono::Utc;
use chrono_tz::Tz;
use loupe_core::tool::{Error as ToolError, Tool};
use schemars::JsonSchema;
use serde::Deserialize;

const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Deserialize, JsonSchema)]
pub struct CurrentTimeParameters {
    #[schemars(
        description = "IANA timezone name like 'UTC' or 'America/New_York', \
                       default to UTC."
    )]
    timezone: Option<String>,
}

/// A tool telling the current time in a timezone.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    type Input = CurrentTimeParameters;

    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current time for a given IANA timezone."
    }

    fn execute(
        &self,
        input: CurrentTimeParameters,
    ) -> impl Future<Output = Result<String, ToolError>> + Send + 'static {
        let timezone = input
            .timezone
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_owned());
        ready(current_time(&timezone))
    }
}

fn current_time(timezone: &str) -> Result<String, ToolError> {
    let tz: Tz = timezone.parse().map_err(|_| {
        ToolError::tool(format!(
            "Invalid timezone '{timezone}'. Use IANA format like 'UTC' or \
             'America/New_York'."
        ))
    })?;
    let now = Utc::now().with_timezone(&tz);
    Ok(now.format("%Y-%m-%d %H:%M:%S %Z").to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;

    #[tokio::test]
    async fn test_default_timezone() {
        let input = CurrentTimeParameters { timezone: None };
        let output = CurrentTimeTool.execute(input).await.unwrap();
        let (datetime, zone) = output.rsplit_once(' ').unwrap();
        assert_eq!(zone, "UTC");
        assert!(
            NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M:%S")
                .is_ok()
        );
    }

    #[test]
    fn test_named_timezone() {
        let output = current_time("Asia/Tokyo").unwrap();
        assert!(output.ends_with(" JST"), "{output}");
    }

    #[test]
    fn test_invalid_timezone() {
        let err = current_time("Mars/Olympus").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid timezone 'Mars/Olympus'. Use IANA format like 'UTC' or \
             'America/New_York'."
        );
    }
}
