//! End-to-end program runs: compile with `Runner`, execute against scripted
//! input, and compare collected stdout.

use dinterp::{AccumulatingLog, CollectStringPrint, ErrorKind, NoopTracer, Runner, RuntimeFailure, SliceInput};
use pretty_assertions::assert_eq;

fn compile(code: &str) -> Runner {
    let mut log = AccumulatingLog::new();
    match Runner::compile(code, "test.d", &mut log) {
        Some(runner) => runner,
        None => panic!(
            "expected the program to compile; log:\n{}",
            log.render(dinterp::Severity::Info, &dinterp::SourceFile::new("test.d", code), &dinterp::FormatOptions::default())
        ),
    }
}

fn run(code: &str) -> String {
    compile(code).run_collect(&[]).expect("expected a clean run")
}

fn run_with_input(code: &str, lines: &[&str]) -> String {
    compile(code).run_collect(lines).expect("expected a clean run")
}

fn run_err(code: &str) -> RuntimeFailure {
    compile(code).run_collect(&[]).expect_err("expected a runtime error")
}

// === Whole-pipeline basics ===

#[test]
fn hello_world() {
    assert_eq!(run("print \"Hello, world!\\n\""), "Hello, world!\n");
}

#[test]
fn folded_arithmetic() {
    assert_eq!(run("var x := 2 + 3 * 4\nprint x"), "14");
}

#[test]
fn while_counter() {
    assert_eq!(run("var i := 1\nwhile i <= 5 loop print i; i := i + 1; end"), "12345");
}

#[test]
fn recursive_factorial() {
    let code = "\
var f := func(n) is
    if n <= 1 then return 1 end
    return n * f(n - 1)
end
print f(5)
";
    assert_eq!(run(code), "120");
}

#[test]
fn array_element_assignment() {
    assert_eq!(run("var a := [ 1, 2, 3 ]\na[2] := 99\nprint a[2]"), "99");
}

// === Arithmetic & values ===

#[test]
fn big_integer_arithmetic() {
    let code = "\
var acc := 1
for i in 1..100 loop acc := acc * i end
print acc
";
    let expected = "9332621544394415268169923885626670049071596826438162146859296389521759999322991\
5608941463976156518286253697920827223758251185210916864000000000000000000000000";
    assert_eq!(run(code), expected);
}

#[test]
fn real_arithmetic_and_rendering() {
    assert_eq!(run("print 0.5 + 2"), "2.5");
    assert_eq!(run("print 1.75.Frac"), "0.75");
    assert_eq!(run("print 1.75.Ceil, 1.75.Floor"), "21");
}

#[test]
fn real_division_by_zero_is_infinite() {
    assert_eq!(run("print 1.0 / 0"), "inf");
}

#[test]
fn prefix_signs_fold() {
    assert_eq!(run("print -5 + 3"), "-2");
    assert_eq!(run("print +5 - -3"), "8");
}

#[test]
fn typecheck_operator() {
    assert_eq!(run("print 5 is int, \"a\" is string, 5 is real"), "truetruefalse");
    assert_eq!(run("print [1] is [], {x := 1} is {}"), "truetrue");
    assert_eq!(run("var f := func() => 1\nprint f is func"), "true");
}

#[test]
fn none_renders_as_none() {
    let code = "\
var f := func() is return end
print f()
";
    assert_eq!(run(code), "none");
}

// === Strings ===

#[test]
fn string_fields_and_methods() {
    assert_eq!(run("print \"hello\".Length"), "5");
    assert_eq!(run("print \"HeLLo\".Upper, \" \", \"HeLLo\".Lower"), "HELLO hello");
    assert_eq!(run("print \"a,b,c\".Split(\",\")"), "[ [1] a, [2] b, [3] c ]");
    assert_eq!(run("print \" one\ttwo \".SplitWS()"), "[ [1] one, [2] two ]");
    assert_eq!(run("print \"-\".Join([\"x\", \"y\", \"z\"])"), "x-y-z");
}

#[test]
fn string_slice_rules() {
    // 1-based, stop exclusive, out-of-range prefix skipped.
    assert_eq!(run("print \"123456789\".Slice(-7, 9, 4)"), "15");
    assert_eq!(run("print \"abcdef\".Slice(5, 1, -2)"), "ec");
}

#[test]
fn string_subscript_is_one_based() {
    assert_eq!(run("print \"abc\"[1], \"abc\"[3]"), "ac");
}

#[test]
fn string_concat_and_comparison() {
    assert_eq!(run("print \"ab\" + \"cd\""), "abcd");
    assert_eq!(run("print \"abc\" < \"abd\", \"b\" < \"a\""), "truefalse");
}

// === Arrays & tuples ===

#[test]
fn array_concat_rekeys() {
    assert_eq!(run("print [1] + [2, 3]"), "[ [1] 1, [2] 2, [3] 3 ]");
}

#[test]
fn sparse_array_keys() {
    let code = "\
var a := [\"a\"]
a[3] := \"c\"
a[10] := \"d\"
print a
print a = [\"a\"], \"\\n\"
print a[3]
";
    assert_eq!(run(code), "[ [1] a, [3] c, [10] d ]false\nc");
}

#[test]
fn array_equality() {
    assert_eq!(run("print [1, 2] = [1, 2], [1] = [2]"), "truefalse");
}

#[test]
fn tuple_fields_and_rendering() {
    let code = "\
var t := { e := 80, 98, -1 }
print t.e, t.2
t.e := 81
print t.(1)
";
    assert_eq!(run(code), "809881");
}

#[test]
fn tuple_render_format() {
    assert_eq!(run("print { e := 80, 98 }"), "{\n    e := 80\n    2 := 98\n}");
}

#[test]
fn tuple_concat_prefers_left_names() {
    let code = "\
var t := { x := 1 } + { x := 2, y := 3 }
print t.x, t.y
";
    assert_eq!(run(code), "13");
}

#[test]
fn arrays_alias_on_assignment() {
    let code = "\
var a := [1, 2]
var b := a
b[1] := 9
print a[1]
";
    assert_eq!(run(code), "9");
}

// === Control flow ===

#[test]
fn if_else_at_runtime() {
    let code = "\
var c := input() = \"y\"
if c then print \"yes\" else print \"no\" end
";
    assert_eq!(run_with_input(code, &["y"]), "yes");
    assert_eq!(run_with_input(code, &["n"]), "no");
}

#[test]
fn short_if() {
    let code = "\
var c := input() = \"y\"
if c => print \"hit\"
print \"done\"
";
    assert_eq!(run_with_input(code, &["y"]), "hitdone");
    assert_eq!(run_with_input(code, &["n"]), "done");
}

#[test]
fn for_over_range_is_inclusive() {
    assert_eq!(run("for i in 1..3 loop print i end"), "123");
    assert_eq!(run("for i in 3..1 loop print i end"), "");
}

#[test]
fn for_over_array_and_tuple() {
    let code = "\
var total := 0
for v in [1, 2, 3] loop total := total + v end
print total
";
    assert_eq!(run(code), "6");
    assert_eq!(run("for v in { a := 1, 2 } loop print v end"), "12");
}

#[test]
fn loop_with_exit() {
    let code = "\
var i := 0
loop
    i := i + 1
    if i = 3 => exit
end
print i
";
    assert_eq!(run(code), "3");
}

#[test]
fn exit_leaves_only_the_innermost_loop() {
    let code = "\
for i in 1..2 loop
    for j in 1..5 loop
        if j = 2 => exit
        print j
    end
    print \"|\"
end
";
    assert_eq!(run(code), "1|1|");
}

#[test]
fn merged_branches_keep_programs_running() {
    let code = "\
var x := 1
var c := input() = \"y\"
if c then x := 2 else x := 3 end
print x
";
    assert_eq!(run_with_input(code, &["n"]), "3");
}

// === Logic ===

#[test]
fn or_short_circuits() {
    let code = "\
var f := func(s) is
    print s
    return true
end
if f(\"a\") or f(\"b\") then print \"!\" end
";
    assert_eq!(run(code), "a!");
}

#[test]
fn and_short_circuits() {
    let code = "\
var f := func(s) is
    print s
    return false
end
if f(\"a\") and f(\"b\") then print \"!\" end
print \".\"
";
    assert_eq!(run(code), "a.");
}

#[test]
fn xor_never_short_circuits() {
    let code = "\
var f := func(s) is
    print s
    return true
end
if f(\"a\") xor f(\"b\") then print \"!\" end
print \".\"
";
    assert_eq!(run(code), "ab.");
}

#[test]
fn known_logic_operands_fold() {
    let code = "\
var x := input() = \"y\"
print false and x
print true or x
";
    assert_eq!(run_with_input(code, &["y"]), "falsetrue");
}

#[test]
fn comparison_chains() {
    assert_eq!(run("print 1 < 2 < 3"), "true");
    assert_eq!(run("print 3 < 2 < 9"), "false");
    let code = "\
var n := input().Length
print 0 <= n <= 3
";
    assert_eq!(run_with_input(code, &["ab"]), "true");
    assert_eq!(run_with_input(code, &["abcdef"]), "false");
}

// === Closures ===

#[test]
fn closures_snapshot_captured_values() {
    let code = "\
var x := 1
var f := func() => x
x := 2
print f()
";
    assert_eq!(run(code), "1");
}

#[test]
fn closure_wrapping() {
    let code = "\
var wrap := func(f) is
    return func() is
        print \"[\"
        f()
        print \"]\"
    end
end
var hello := func() is print \"hi\" end
var wrapped := wrap(hello)
wrapped()
";
    assert_eq!(run(code), "[hi]");
}

#[test]
fn fibonacci_by_loop() {
    let code = "\
var a := 0, b := 1
for i in 1..10 loop
    var next := a + b
    a := b
    b := next
end
print a
";
    assert_eq!(run(code), "55");
}

#[test]
fn closure_renders_its_signature() {
    let code = "\
var f := func(n) => n
print f
";
    assert_eq!(run(code), "<closure: (pure)function (object?) -> object?>");
}

#[test]
fn builtin_renders_its_signature() {
    assert_eq!(run("print input"), "<built-in function input() -> string>");
}

// === Input ===

#[test]
fn input_reads_lines() {
    let code = "\
var name := input()
print \"Hello, \", name, \"!\"
";
    assert_eq!(run_with_input(code, &["World"]), "Hello, World!");
}

#[test]
fn input_past_eof_is_empty() {
    assert_eq!(run("print \"[\", input(), \"]\""), "[]");
}

#[test]
fn input_driven_loop() {
    let code = "\
var total := 0
var line := input()
while line /= \"\" loop
    total := total + line.Length
    line := input()
end
print total
";
    assert_eq!(run_with_input(code, &["ab", "cde", ""]), "5");
}

// === Runtime errors ===

#[test]
fn missing_array_key_throws() {
    let failure = run_err("var a := [1]\nprint a[2]");
    assert_eq!(failure.error().kind, ErrorKind::MissingKey);
}

#[test]
fn runtime_zero_division_throws() {
    let code = "\
var d := input().Length - 5
print 10 / d
";
    let failure = compile(code).run_collect(&["hello"]).expect_err("division by zero");
    assert_eq!(failure.error().kind, ErrorKind::ZeroDivision);
}

#[test]
fn calling_a_non_function_throws() {
    // The element type of an array is unknown statically, so the call only
    // fails at run time.
    let code = "\
var a := [input()]
a[1]()
";
    let failure = compile(code).run_collect(&["zzz"]).expect_err("not callable");
    assert_eq!(failure.error().kind, ErrorKind::NotCallable);
}

#[test]
fn runtime_condition_type_mismatch_throws() {
    let code = "\
var a := [input()]
if a[1] then print 1 end
";
    let failure = compile(code).run_collect(&["zzz"]).expect_err("non-boolean condition");
    assert_eq!(failure.error().kind, ErrorKind::TypeMismatch);
}

#[test]
fn stack_overflow_throws_with_elided_backtrace() {
    let code = "\
var f := func() => f()
f()
";
    let runner = compile(code);
    let mut input = SliceInput::new(&[]);
    let mut output = CollectStringPrint::new();
    let failure = runner
        .run_with_limits(&mut input, &mut output, &mut NoopTracer, 50, 6)
        .expect_err("stack overflow");
    assert_eq!(failure.error().kind, ErrorKind::StackOverflow);
    let rendered = failure.trace().render(runner.source());
    assert!(rendered.contains("Skipping 44 calls..."), "got:\n{rendered}");
}

#[test]
fn failure_report_names_the_position() {
    let failure = run_err("var a := [1]\nprint a[2]");
    let report = failure.to_string();
    assert!(report.contains("[Runtime error]"), "got:\n{report}");
    assert!(report.contains("test.d:2:"), "got:\n{report}");
}
