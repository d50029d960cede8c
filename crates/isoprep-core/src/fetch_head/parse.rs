//! Parse HTTP response header lines into HeadResult.

use super::HeadResult;

pub(crate) fn parse_headers(status: u32, lines: &[String]) -> HeadResult {
    let mut head = HeadResult {
        status,
        ..HeadResult::default()
    };

    for line in lines {
        let Some((name, value)) = line.trim().split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            head.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("etag") {
            head.etag = Some(value.trim_matches('"').to_string());
        } else if name.eq_ignore_ascii_case("last-modified") {
            head.last_modified = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-type") {
            head.content_type = Some(value.to_string());
        }
    }
    head
}
