use std::future::ready;

use chrono::NaiveDate;
use loupe_core::tool::{Error as ToolError, Tool};
use rand::Rng;
use schemars::JsonSchema;
use serde::Deserialize;

const DEFAULT_START_YEAR: i32 = 2000;
const DEFAULT_END_YEAR: i32 = 2030;

#[derive(Deserialize, JsonSchema)]
pub struct RandomDateParameters {
    #[schemars(description = "First year of the range, default to 2000.")]
    start_year: Option<i32>,
    #[schemars(
        description = "Last year of the range (inclusive), default to 2030."
    )]
    end_year: Option<i32>,
}

/// A tool picking a random date within a range of years.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomDateTool;

impl Tool for RandomDateTool {
    type Input = RandomDateParameters;

    fn name(&self) -> &str {
        "get_random_date"
    }

    fn description(&self) -> &str {
        "Generate a random date within a specified year range."
    }

    fn execute(
        &self,
        input: RandomDateParameters,
    ) -> impl Future<Output = Result<String, ToolError>> + Send + 'static {
        let start_year = input.start_year.unwrap_or(DEFAULT_START_YEAR);
        let end_year = input.end_year.unwrap_or(DEFAULT_END_YEAR);
        ready(random_date(start_year, end_year, &mut rand::thread_rng()))
    }
}

fn random_date<R: Rng>(
    start_year: i32,
    end_year: i32,
    rng: &mut R,
) -> Result<String, ToolError> {
    if start_year > end_year {
        return Err(ToolError::tool(format!(
            "start_year ({start_year}) must not be after end_year \
             ({end_year})."
        )));
    }
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(start_year, 1, 1),
        NaiveDate::from_ymd_opt(end_year, 12, 31),
    ) else {
        return Err(ToolError::tool(format!(
            "Years {start_year}-{end_year} are out of the supported range."
        )));
    };

    let span = (last - first).num_days();
    let date = first + chrono::Days::new(rng.gen_range(0..=span) as u64);
    Ok(date.format("%Y-%m-%d").to_string())
}
