//! Property-based tests for requirements patching.
//!
//! - Idempotency: patching the output again is a no-op
//! - Locality: lines not pinning the package are untouched

use camino::Utf8Path;
use patchbot_edit::{PatchOutcome, patch_contents};
use patchbot_types::manifest::Dialect;
use proptest::prelude::*;

fn arb_name() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-z][a-z0-9_]{1,8}").unwrap()
}

fn arb_version() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[0-9]{1,2}\.[0-9]{1,2}\.[0-9]{1,2}").unwrap()
}

fn arb_requirements() -> impl Strategy<Value = (String, Vec<(String, String)>)> {
    (arb_name(), prop::collection::vec((arb_name(), arb_version()), 0..6)).prop_map(
        |(target, others)| {
            let others: Vec<_> = others.into_iter().filter(|(n, _)| *n != target).collect();
            (target, others)
        },
    )
}

proptest! {
    #[test]
    fn second_patch_is_already_safe(
        (target, others) in arb_requirements(),
        old in arb_version(),
        new in arb_version(),
    ) {
        prop_assume!(old != new);
        let mut lines: Vec<String> = others.iter().map(|(n, v)| format!("{n}=={v}")).collect();
        lines.insert(lines.len() / 2, format!("{target}=={old}"));
        let contents = lines.join("\n") + "\n";
        let path = Utf8Path::new("requirements.txt");

        let first = patch_contents(Dialect::Pip, path, &contents, &target, &new).unwrap();
        let PatchOutcome::Patched(patch) = first else {
            return Err(TestCaseError::fail("expected a patch"));
        };

        let second = patch_contents(Dialect::Pip, path, &patch.after, &target, &new).unwrap();
        prop_assert!(matches!(second, PatchOutcome::AlreadySafe { .. }), "expected AlreadySafe on second pass");

        for (before, after) in contents.lines().zip(patch.after.lines()) {
            if before.starts_with(&format!("{target}==")) {
                prop_assert_eq!(after.to_string(), format!("{target}=={new}"));
            } else {
                prop_assert_eq!(before, after);
            }
        }
    }
}
