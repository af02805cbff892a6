use super::*;

#[test]
fn test_format_message_replaces_placeholders() {
    let text = format_message("No binding found for '{0}' in '{1}'.", &["Foo", "AppComponent"]);
    assert_eq!(text, "No binding found for 'Foo' in 'AppComponent'.");
}

#[test]
fn test_format_message_repeated_placeholder() {
    assert_eq!(format_message("{0} and {0}", &["a"]), "a and a");
}

#[test]
fn test_every_code_has_a_message() {
    use diagnostic_codes::*;
    for code in [
        NO_BINDING_FOUND,
        MULTIPLE_BINDINGS_FOUND,
        CIRCULAR_DEPENDENCY,
        DUPLICATE_COLLECTION_ENTRY,
        OVERRIDE_NOT_ALLOWED,
        RESOLUTION_TOO_DEEP,
        UNKNOWN_CLASSIFIER,
        MODULE_INCLUDES_ITSELF,
        RESOLUTION_STEP_BUDGET_EXCEEDED,
        REQUIRED_BY,
        CANDIDATE_DECLARED_AT,
        CYCLE_MEMBER,
    ] {
        assert!(get_diagnostic_message(code).is_some(), "missing message for {code}");
    }
}

#[test]
fn test_unknown_code_formats_empty() {
    assert!(get_message_template(42).is_none());
    assert_eq!(format_code(42, &["x"]), "");
}

#[test]
fn test_render_includes_related_information() {
    let diagnostic = Diagnostic::error(
        "app.Module.foo".to_string(),
        format_code(diagnostic_codes::MULTIPLE_BINDINGS_FOUND, &["explicit", "Foo"]),
        diagnostic_codes::MULTIPLE_BINDINGS_FOUND,
    )
    .with_related("app.a".to_string(), "candidate".to_string())
    .with_related(String::new(), "no origin".to_string());

    let rendered = diagnostic.render();
    assert!(rendered.starts_with("error G1002: Multiple explicit bindings found for 'Foo'."));
    assert!(rendered.contains("\n    candidate (app.a)"));
    assert!(rendered.ends_with("\n    no origin"));
}

#[test]
fn test_diagnostic_serializes_without_empty_related() {
    let diagnostic = Diagnostic::error("o".to_string(), "m".to_string(), 1);
    let json = serde_json::to_string(&diagnostic).expect("serializes");
    assert!(!json.contains("related_information"));
    assert!(json.contains("\"category\":\"Error\""));
}
