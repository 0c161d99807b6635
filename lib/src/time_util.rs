// Copyright 2025 The Szz Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Parsing of issue-report dates from the input dataset.

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

/// Parses a loosely formatted date string into UNIX seconds.
///
/// Dates in the dataset carry no time zone; UTC is assumed whenever the
/// string has no explicit offset. Parsing is attempted in three steps:
/// RFC 3339, then `YYYY-MM-DD HH:MM:SS`, then a bare `YYYY-MM-DD`.
pub fn parse_issue_date(s: &str) -> Option<i64> {
    let trimmed = s.trim();
    if let Ok(date_time) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(date_time.timestamp());
    }
    if let Ok(date_time) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(date_time.and_utc().timestamp());
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("2019-03-20T11:25:33+00:00", 1553081133; "rfc3339")]
    #[test_case("2019-03-20T12:25:33+01:00", 1553081133; "rfc3339 with offset")]
    #[test_case("2019-03-20 11:25:33", 1553081133; "naive datetime is utc")]
    #[test_case("2019-03-20", 1553040000; "bare date is utc midnight")]
    #[test_case("  2019-03-20  ", 1553040000; "surrounding whitespace")]
    fn test_parse_issue_date(input: &str, expected: i64) {
        assert_eq!(parse_issue_date(input), Some(expected));
    }

    #[test_case(""; "empty")]
    #[test_case("not a date"; "garbage")]
    #[test_case("20/03/2019"; "unsupported layout")]
    fn test_parse_issue_date_rejects(input: &str) {
        assert_eq!(parse_issue_date(input), None);
    }
}
