//! Binary snapshots of compiled programs: `Runner::dump` / `Runner::load`.

use dinterp::{AccumulatingLog, Runner};
use pretty_assertions::assert_eq;

fn compile(code: &str) -> Runner {
    let mut log = AccumulatingLog::new();
    Runner::compile(code, "test.d", &mut log).expect("expected the program to compile")
}

#[test]
fn round_trip_preserves_behavior() {
    let code = "\
var f := func(n) is
    if n <= 1 then return 1 end
    return n * f(n - 1)
end
print f(6)
";
    let runner = compile(code);
    let bytes = runner.dump().expect("serializes");
    let restored = Runner::load(&bytes).expect("deserializes");
    assert_eq!(restored.run_collect(&[]).expect("runs"), "720");
    assert_eq!(runner.run_collect(&[]).expect("runs"), "720");
}

#[test]
fn round_trip_preserves_the_rewritten_tree() {
    let runner = compile("var x := 2 + 3 * 4\nprint x");
    let bytes = runner.dump().expect("serializes");
    let restored = Runner::load(&bytes).expect("deserializes");
    assert_eq!(restored.program(), runner.program());
    assert_eq!(restored.source().text(), runner.source().text());
}

#[test]
fn snapshots_carry_input_driven_programs() {
    let code = "\
var line := input()
print line.Upper
";
    let bytes = compile(code).dump().expect("serializes");
    let restored = Runner::load(&bytes).expect("deserializes");
    assert_eq!(restored.run_collect(&["shout"]).expect("runs"), "SHOUT");
}
