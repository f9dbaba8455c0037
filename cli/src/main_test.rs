use super::*;

#[test]
fn parse_field_splits_on_first_equals() {
    assert_eq!(parse_field("role=admin").unwrap(), ("role".to_owned(), "admin".to_owned()));
    assert_eq!(parse_field("note=a=b").unwrap(), ("note".to_owned(), "a=b".to_owned()));
    assert_eq!(parse_field("email=").unwrap(), ("email".to_owned(), String::new()));
}

#[test]
fn parse_field_rejects_missing_key() {
    assert!(matches!(parse_field("=x"), Err(CliError::InvalidField(_))));
    assert!(matches!(parse_field("novalue"), Err(CliError::InvalidField(_))));
}

#[test]
fn registered_resource_uses_its_schema() {
    let schema = schema_for("users", &ResourceSubcommand::List);
    assert!(schema.field("role").unwrap().kind.is_select());
}

#[test]
fn unknown_resource_gets_text_fields_from_flags() {
    let command = ResourceSubcommand::Create {
        fields: vec![("name".to_owned(), "Ops".to_owned()), ("lead".to_owned(), "none".to_owned())],
    };
    let schema = schema_for("teams", &command);
    let mut editor = Editor::new();
    editor.open_create(&schema);
    apply_fields(&mut editor, &schema, &[("lead".to_owned(), "none".to_owned())]).unwrap();

    // Text fields send the literal string; only selects map the sentinel.
    assert_eq!(editor.payload(&schema)["lead"], json!("none"));
}

#[test]
fn undeclared_field_is_rejected() {
    let schema = resources::users();
    let mut editor = Editor::new();
    editor.open_create(&schema);
    let err = apply_fields(&mut editor, &schema, &[("password".to_owned(), "x".to_owned())]).unwrap_err();
    assert!(matches!(err, CliError::UnknownField { .. }));
}

#[test]
fn cli_parses_resource_update() {
    let cli = Cli::try_parse_from([
        "orgdesk-cli",
        "resource",
        "users",
        "update",
        "4",
        "--field",
        "role=none",
    ])
    .unwrap();
    match cli.command {
        Command::Resource(ResourceCommand { path, command: ResourceSubcommand::Update { id, fields } }) => {
            assert_eq!(path, "users");
            assert_eq!(id, "4");
            assert_eq!(fields, vec![("role".to_owned(), "none".to_owned())]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
