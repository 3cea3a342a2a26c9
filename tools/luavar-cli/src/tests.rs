#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use pretty_assertions::assert_eq;

use super::*;

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_owned()).collect()
}

// -- Argument parsing --

#[test]
fn parses_target_and_prints() {
    let parsed = Invocation::parse(&strings(&["x = 1", "--print", "x", "--print=y.z"])).unwrap();
    assert_eq!(
        parsed,
        Invocation {
            target: String::from("x = 1"),
            prints: strings(&["x", "y.z"]),
        }
    );
}

#[test]
fn rejects_bad_arguments() {
    assert!(Invocation::parse(&strings(&[])).is_err());
    assert!(Invocation::parse(&strings(&["a", "--print"])).is_err());
    assert!(Invocation::parse(&strings(&["a", "--verbose"])).is_err());
    assert!(Invocation::parse(&strings(&["a", "b"])).is_err());
}

// -- Paths --

#[test]
fn integer_segments_are_numeric_keys() {
    assert_eq!(
        parse_path("servers.1.host").unwrap(),
        vec![Value::from("servers"), Value::from(1), Value::from("host")]
    );
    assert_eq!(parse_path("a..b"), None);
    assert_eq!(parse_path(""), None);
}

// -- Execution --

#[test]
fn eval_prints_results_and_paths() {
    let lines = execute(
        Source::Chunk("servers = { { host = 'a' } } return 1, 'two'"),
        &strings(&["servers.1.host", "missing"]),
    )
    .unwrap();
    assert_eq!(
        lines,
        strings(&["1", "\"two\"", "servers.1.host = \"a\"", "missing = nil"])
    );
}

#[test]
fn tables_render_sorted() {
    let lines = execute(Source::Chunk("return { b = 2, a = 1, [3] = true }"), &[]).unwrap();
    assert_eq!(lines, strings(&["{ [3] = true, a = 1, b = 2 }"]));
}

#[test]
fn errors_propagate() {
    let err = execute(Source::Chunk("error('stop')"), &[]).unwrap_err();
    assert!(matches!(err, Error::Lua(_)));
    let err = execute(Source::Chunk("x = 1"), &strings(&["x..y"])).unwrap_err();
    assert!(matches!(err, Error::External(_)));
}
