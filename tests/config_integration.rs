//! Integration tests for plan files: parsing, validation, rule compilation
//! and running the shipped TypeScript catalogue against fixtures.

use rulefix::config::{load_from_path, load_from_str, parse_config, ConfigError, ValidationIssue};
use rulefix::{DefinitionError, FailurePolicy, PatchEngine, RuleFlags, Runner};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn catalogue(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixes").join(name)
}

#[test]
fn test_load_plan_basic() {
    let toml = r#"
[meta]
name = "renames"
description = "Rename selectors"
version_range = ">=1.0.0"
multiline = true

[[fixes]]
file = "src/screens/MyAssignments.tsx"

[[fixes.rules]]
description = "selector was renamed"
pattern = 'employeeAssignments'
replacement = 'assignments'

[[fixes.rules]]
pattern = '^import'
replacement = 'import'
dot_matches_new_line = true
multiline = false
"#;

    let plan = load_from_str(toml).expect("Failed to parse plan");

    assert_eq!(plan.name(), "renames");
    assert_eq!(plan.description(), Some("Rename selectors"));
    assert_eq!(plan.version_range(), Some(">=1.0.0"));
    assert_eq!(plan.len(), 1);

    let fix = &plan.fixes()[0];
    assert_eq!(fix.target(), Path::new("src/screens/MyAssignments.tsx"));

    let rules: Vec<_> = fix.rules().iter().collect();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].description(), Some("selector was renamed"));
    assert_eq!(
        rules[0].flags(),
        RuleFlags {
            multiline: true,
            dot_matches_new_line: false
        }
    );
    assert_eq!(
        rules[1].flags(),
        RuleFlags {
            multiline: false,
            dot_matches_new_line: true
        }
    );
}

#[test]
fn test_empty_plan_rejected() {
    let err = load_from_str("[meta]\nname = \"empty\"\n").unwrap_err();
    match err {
        ConfigError::Validation { source, .. } => {
            assert!(matches!(source.issues[0], ValidationIssue::EmptyFixList));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_fix_without_rules_rejected() {
    let toml = r#"
[[fixes]]
file = "a.ts"

[[fixes]]
file = ""

[[fixes.rules]]
pattern = 'a'
replacement = 'b'
"#;
    let err = parse_config(toml).unwrap_err();
    let ConfigError::Validation { source, .. } = err else {
        panic!("expected validation error");
    };
    assert_eq!(source.issues.len(), 2);
    let message = source.to_string();
    assert!(message.contains("fix for 'a.ts' has no rules"));
    assert!(message.contains("fix #2 missing required field 'file'"));
}

#[test]
fn test_bad_pattern_is_definition_error() {
    let toml = r#"
[[fixes]]
file = "a.ts"

[[fixes.rules]]
pattern = 'ok'
replacement = 'fine'

[[fixes.rules]]
pattern = 'showToast('
replacement = 'x'
"#;
    let err = load_from_str(toml).unwrap_err();
    match &err {
        ConfigError::Definition {
            file, rule, source, ..
        } => {
            assert_eq!(file, "a.ts");
            assert_eq!(*rule, 2);
            assert!(matches!(source, DefinitionError::InvalidPattern { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("invalid rule #2 for 'a.ts'"));
}

#[test]
fn test_missing_group_is_definition_error() {
    let toml = r#"
[[fixes]]
file = "a.ts"

[[fixes.rules]]
pattern = '(selectKPIs,)'
replacement = '\1\n  selectDailyTrends,\n\2'
"#;
    let err = load_from_str(toml).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Definition {
            source: DefinitionError::UnknownGroup { .. },
            ..
        }
    ));
}

#[test]
fn test_malformed_toml() {
    let err = load_from_str("[[fixes]\nfile = ").unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
}

#[test]
fn test_load_from_path_names_plan_after_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unused-params.toml");
    fs::write(
        &path,
        r#"
[[fixes]]
file = "slice.ts"

[[fixes.rules]]
pattern = '\(state, action\)'
replacement = '(state, _action)'
"#,
    )
    .unwrap();

    let plan = load_from_path(&path).unwrap();
    assert_eq!(plan.name(), "unused-params");
}

#[test]
fn test_load_from_path_errors_carry_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[[fixes]]\nfile = \"a.ts\"\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));

    let missing = load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));
}

#[test]
fn test_shipped_catalogue_compiles() {
    let api = load_from_path(catalogue("01-typescript-api.toml")).unwrap();
    assert_eq!(api.name(), "typescript-api");
    assert_eq!(api.len(), 8);

    let structure = load_from_path(catalogue("02-typescript-structure.toml")).unwrap();
    assert_eq!(structure.name(), "typescript-structure");
    assert_eq!(structure.len(), 8);
    assert!(structure
        .iter()
        .flat_map(|fix| fix.rules().iter())
        .all(|rule| rule.flags() == RuleFlags::NONE));
}

#[test]
fn test_catalogue_rewrites_fixture_project() {
    let dir = TempDir::new().unwrap();
    let write = |rel: &str, content: &str| {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    };

    write(
        "src/components/business/AyskaCheckInComponent.tsx",
        r#"import { FormValidator, CommonValidators } from '../../validation/AyskaFormValidator';

const schema = {
    notes: [
      CommonValidators.maxLength(500, 'Notes too long'),
    ],
};

function submit() {
  const context = new FormValidator();
  showToast({
    type: 'success',
    title: 'Check-in Successful!',
    message: `You have successfully checked in with ${doctorName || 'the doctor'}.`,
  });
}
"#,
    );
    write(
        "src/components/business/AyskaDoctorFormComponent.tsx",
        "import { FormValidator } from '../../validation/AyskaFormValidator';\nconst context = new FormValidator();\n",
    );
    write(
        "src/components/business/AyskaNotificationListComponent.tsx",
        r#"<Title weight={item.read ? 'normal' : 'semibold'}>{item.title}</Title>
showToast({
  type: 'success',
  title: 'Success',
  message: `${selectedNotifications.length} notifications marked as read.`,
});
"#,
    );
    write(
        "src/components/business/AyskaAnalyticsDashboardComponent.tsx",
        "import {\n  selectKPIs,\n} from '../../store/slices/AyskaAnalyticsSlice';\n",
    );
    write(
        "src/components/feedback/AyskaErrorBoundaryComponent.tsx",
        "<Icon name=\"wifi-off\" />\n",
    );
    write(
        "src/store/slices/AyskaCheckInSlice.ts",
        "const s = state.checkin;\n",
    );
    write(
        "src/components/business/AyskaDoctorListComponent.tsx",
        "<EmptyState actionText=\"Add doctor\" />\n",
    );

    let plan = load_from_path(catalogue("01-typescript-api.toml")).unwrap();
    let summary = Runner::new(PatchEngine::new(dir.path()))
        .policy(FailurePolicy::FailFast)
        .run(&plan);
    assert!(summary.is_success(), "{summary}");
    assert_eq!(summary.succeeded(), 8);

    let read = |rel: &str| fs::read_to_string(dir.path().join(rel)).unwrap();

    let check_in = read("src/components/business/AyskaCheckInComponent.tsx");
    assert!(check_in.contains(
        "AyskaFormValidator';\nimport { ValidationContext } from '../../validation/AyskaValidationContext';"
    ));
    assert!(check_in.contains("const context = new ValidationContext();"));
    assert!(check_in.contains("// Optional field, no required validator"));
    assert!(check_in.contains(
        "showToast(`You have successfully checked in with ${doctorName || 'the doctor'}.`, 'success');"
    ));

    let list = read("src/components/business/AyskaNotificationListComponent.tsx");
    assert!(list.contains("weight=\"semibold\""));
    assert!(list.contains(
        "showToast(`${selectedNotifications.length} notifications marked as read.`, 'success');"
    ));

    assert_eq!(
        read("src/components/business/AyskaAnalyticsDashboardComponent.tsx"),
        "import {\n  selectKPIs,\n  selectDailyTrends,\n} from '../../store/slices/AyskaAnalyticsSlice';\n"
    );
    assert_eq!(read("src/store/slices/AyskaCheckInSlice.ts"), "const s = state.checkIn;\n");

    // Only the two import insertions are not terminal: they match again
    let again = Runner::new(PatchEngine::new(dir.path())).run(&plan);
    assert!(again.is_success());
    assert_eq!(again.changed(), 2);
}
