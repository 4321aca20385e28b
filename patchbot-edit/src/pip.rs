//! Pinned requirements text (`package==version`).

use crate::DialectPatch;
use regex::{Captures, Regex};

/// Version characters accepted in a pin.
const VERSION_CHARS: &str = r"[0-9A-Za-z.\-]+";

/// Pin pattern for `package`, as recorded in the manifest edit.
pub(crate) fn pin_pattern(package: &str) -> String {
    format!("{}=={}", regex::escape(package), VERSION_CHARS)
}

fn pin_regex(package: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?m)^(?P<lead>[ \t]*)(?P<name>{})(?P<extras>\[[^\]\n]*\])?==(?P<version>{})",
        regex::escape(package),
        VERSION_CHARS
    ))
}

pub(crate) fn patch(contents: &str, package: &str, safe_version: &str) -> anyhow::Result<DialectPatch> {
    let re = pin_regex(package)?;

    let mut previous = Vec::new();
    let mut locations = Vec::new();
    for caps in re.captures_iter(contents) {
        let version = &caps["version"];
        if version == safe_version {
            return Ok(DialectPatch::AlreadySafe);
        }
        let start = caps.get(0).map(|m| m.start()).unwrap_or(0);
        previous.push(version.to_string());
        locations.push(format!("line {}", line_of(contents, start)));
    }

    if previous.is_empty() {
        return Ok(DialectPatch::NotFound);
    }

    let after = re
        .replace_all(contents, |caps: &Captures| {
            format!(
                "{}{}{}=={}",
                &caps["lead"],
                &caps["name"],
                caps.name("extras").map(|m| m.as_str()).unwrap_or(""),
                safe_version
            )
        })
        .into_owned();

    Ok(DialectPatch::Edited {
        after,
        previous,
        locations,
    })
}

fn line_of(contents: &str, offset: usize) -> usize {
    contents[..offset].matches('\n').count() + 1
}
