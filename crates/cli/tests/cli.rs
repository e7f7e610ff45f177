use assert_cmd::Command;

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("folio")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for subcommand in ["serve", "migrate", "create-user", "openapi"] {
        assert!(stdout.contains(subcommand), "missing {subcommand}");
    }
}

#[test]
fn unknown_role_is_rejected() {
    Command::cargo_bin("folio")
        .unwrap()
        .args(["create-user", "--username", "x", "--password", "password123", "--role", "Janitor"])
        .assert()
        .failure();
}
