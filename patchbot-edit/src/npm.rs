//! `package.json` dependency sections.

use crate::DialectPatch;
use serde_json::Value;

/// Sections consulted, in the order they are reported.
pub(crate) const SECTIONS: [&str; 2] = ["dependencies", "devDependencies"];

/// Set `package` to the exact `safe_version` in every section that declares it.
///
/// Existing constraints are overwritten unconditionally; a caret or tilde range
/// collapses to an exact pin.
pub(crate) fn patch(contents: &str, package: &str, safe_version: &str) -> serde_json::Result<DialectPatch> {
    let mut doc: Value = serde_json::from_str(contents)?;

    let mut previous = Vec::new();
    let mut locations = Vec::new();
    for section in SECTIONS {
        let Some(deps) = doc.get_mut(section).and_then(Value::as_object_mut) else {
            continue;
        };
        let Some(entry) = deps.get_mut(package) else {
            continue;
        };
        previous.push(match entry.as_str() {
            Some(s) => s.to_string(),
            None => entry.to_string(),
        });
        locations.push(section.to_string());
        *entry = Value::String(safe_version.to_string());
    }

    if previous.is_empty() {
        return Ok(DialectPatch::NotFound);
    }
    if previous.iter().all(|p| p == safe_version) {
        return Ok(DialectPatch::AlreadySafe);
    }

    let mut after = serde_json::to_string_pretty(&doc)?;
    after.push('\n');

    Ok(DialectPatch::Edited {
        after,
        previous,
        locations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"{
  "name": "web",
  "version": "1.0.0",
  "dependencies": {
    "express": "^4.18.0",
    "react": "18.2.0"
  },
  "devDependencies": {
    "lodash": "~4.17.15",
    "jest": "29.0.0"
  }
}
"#;

    #[test]
    fn updates_only_the_declaring_section() {
        let DialectPatch::Edited {
            after,
            previous,
            locations,
        } = patch(MANIFEST, "lodash", "4.17.21").unwrap()
        else {
            panic!("expected edit");
        };
        assert_eq!(previous, vec!["~4.17.15"]);
        assert_eq!(locations, vec!["devDependencies"]);
        assert_eq!(after, MANIFEST.replace("~4.17.15", "4.17.21"));
    }

    #[test]
    fn updates_both_sections_when_declared_twice() {
        let doc = r#"{"dependencies":{"a":"1.0.0"},"devDependencies":{"a":"^1.0.0"}}"#;
        let DialectPatch::Edited { after, locations, .. } = patch(doc, "a", "1.2.0").unwrap() else {
            panic!("expected edit");
        };
        assert_eq!(locations, vec!["dependencies", "devDependencies"]);
        let v: Value = serde_json::from_str(&after).unwrap();
        assert_eq!(v["dependencies"]["a"], "1.2.0");
        assert_eq!(v["devDependencies"]["a"], "1.2.0");
    }

    #[test]
    fn output_has_two_space_indent_and_trailing_newline() {
        let doc = r#"{"dependencies":{"a":"1.0.0"}}"#;
        let DialectPatch::Edited { after, .. } = patch(doc, "a", "1.2.0").unwrap() else {
            panic!("expected edit");
        };
        assert_eq!(after, "{\n  \"dependencies\": {\n    \"a\": \"1.2.0\"\n  }\n}\n");
    }

    #[test]
    fn exact_pins_everywhere_are_already_safe() {
        let doc = r#"{"dependencies":{"a":"1.2.0"},"devDependencies":{"a":"1.2.0"}}"#;
        assert!(matches!(patch(doc, "a", "1.2.0").unwrap(), DialectPatch::AlreadySafe));
    }

    #[test]
    fn range_equal_to_target_text_is_still_rewritten() {
        let doc = r#"{"dependencies":{"a":"^1.2.0"}}"#;
        assert!(matches!(patch(doc, "a", "1.2.0").unwrap(), DialectPatch::Edited { .. }));
    }

    #[test]
    fn other_sections_do_not_count() {
        let doc = r#"{"peerDependencies":{"a":"1.0.0"},"optionalDependencies":{"a":"1.0.0"}}"#;
        assert!(matches!(patch(doc, "a", "1.2.0").unwrap(), DialectPatch::NotFound));
    }

    #[test]
    fn non_object_document_has_no_sections() {
        assert!(matches!(patch("[1, 2]", "a", "1.2.0").unwrap(), DialectPatch::NotFound));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(patch("{ not json", "a", "1.2.0").is_err());
    }
}
